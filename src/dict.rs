//! Dictionary-like access to groups of child elements.

use crate::access::{ElementAccess, FromElement};
use crate::document::Document;
use crate::element::Element;
use crate::error::{Error, Result};
use indexmap::{Equivalent, IndexMap};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

/// Builds a member value from a child element.
pub type Constructor<T> = Rc<dyn Fn(&Document, Element) -> Result<T>>;

/// Types usable as [`ElementDict`] keys, converted from the key attribute's text.
pub trait DictKey: Clone + Eq + Hash + fmt::Display + fmt::Debug {
    fn from_attr(value: &str) -> Result<Self>;
}

impl DictKey for String {
    fn from_attr(value: &str) -> Result<Self> {
        Ok(value.to_owned())
    }
}

macro_rules! integer_keys {
    ($($t:ty),*) => {
        $(
            impl DictKey for $t {
                fn from_attr(value: &str) -> Result<Self> {
                    value.trim().parse().map_err(|_| {
                        Error::TypeMismatch(format!(
                            "key '{}' is not a valid {}",
                            value,
                            stringify!($t)
                        ))
                    })
                }
            }
        )*
    };
}

integer_keys!(u32, u64, usize, i32, i64);

/// Which children of the parent become members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Only children with this tag name.
    Tag(String),
    /// Only children carrying this attribute.
    HasAttribute(String),
}

/// What the member type is looked up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSelector {
    /// The value of this attribute of the child.
    Attribute(String),
    /// The child's tag name.
    TagName,
    /// The member's key.
    Key,
}

/// How a member element becomes a value of `T`.
pub enum MemberTypes<T> {
    /// Every member is built the same way.
    Single(Constructor<T>),
    /// The member is built by the constructor registered for its kind.
    Dispatch {
        selector: TypeSelector,
        table: HashMap<String, Constructor<T>>,
        default: Option<Constructor<T>>,
    },
}

impl<T: 'static> MemberTypes<T> {
    pub fn single<F>(constructor: F) -> Self
    where
        F: Fn(&Document, Element) -> Result<T> + 'static,
    {
        MemberTypes::Single(Rc::new(constructor))
    }

    /// Every member wrapped as `U`, then converted into `T`.
    pub fn of<U>() -> Self
    where
        U: FromElement + Into<T> + 'static,
    {
        Self::single(|doc, element| U::from_element(doc, element).map(Into::into))
    }

    pub fn dispatch(selector: TypeSelector) -> Self {
        MemberTypes::Dispatch {
            selector,
            table: HashMap::new(),
            default: None,
        }
    }

    /// Registers the constructor for members of kind `kind`.
    ///
    /// Has no effect on [`MemberTypes::Single`].
    pub fn variant<F>(mut self, kind: &str, constructor: F) -> Self
    where
        F: Fn(&Document, Element) -> Result<T> + 'static,
    {
        if let MemberTypes::Dispatch { table, .. } = &mut self {
            table.insert(kind.to_owned(), Rc::new(constructor));
        }
        self
    }

    /// Constructor for members whose kind isn't registered.
    ///
    /// Has no effect on [`MemberTypes::Single`].
    pub fn default_type<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&Document, Element) -> Result<T> + 'static,
    {
        if let MemberTypes::Dispatch { default, .. } = &mut self {
            *default = Some(Rc::new(constructor));
        }
        self
    }
}

impl<T> MemberTypes<T> {
    /// The kind a member resolves to. `None` for [`MemberTypes::Single`], where
    /// there is nothing to choose.
    ///
    /// A missing selector attribute reads as the empty string.
    pub fn kind_of<K: DictKey>(&self, doc: &Document, element: Element, key: &K) -> Option<String> {
        match self {
            MemberTypes::Single(_) => None,
            MemberTypes::Dispatch { selector, .. } => Some(match selector {
                TypeSelector::Attribute(name) => {
                    element.attribute(doc, name).unwrap_or_default().to_owned()
                }
                TypeSelector::TagName => element.name(doc).to_owned(),
                TypeSelector::Key => key.to_string(),
            }),
        }
    }

    fn constructor_for<K: DictKey>(&self, doc: &Document, element: Element, key: &K) -> Result<&Constructor<T>> {
        match self {
            MemberTypes::Single(constructor) => Ok(constructor),
            MemberTypes::Dispatch { table, default, .. } => {
                let kind = self.kind_of(doc, element, key).unwrap_or_default();
                table
                    .get(&kind)
                    .or(default.as_ref())
                    .ok_or_else(|| Error::NotFound(format!("member type for '{}'", kind)))
            }
        }
    }
}

impl<T> fmt::Debug for MemberTypes<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberTypes::Single(_) => f.write_str("Single"),
            MemberTypes::Dispatch {
                selector,
                table,
                default,
            } => f
                .debug_struct("Dispatch")
                .field("selector", selector)
                .field("kinds", &table.keys().collect::<Vec<_>>())
                .field("has_default", &default.is_some())
                .finish(),
        }
    }
}

/// Container which provides access to a group of child elements.
///
/// Works like an ordered map from a key, taken from `key_attr` or from the
/// position among the selected children, to the element. Instead of the element,
/// lookups return a member value built by the configured [`MemberTypes`].
///
/// The map is built once. Changes to the tree made around the dict are not
/// seen by it; use [`ElementDict::append`] and [`ElementDict::delete`].
/// When two children produce the same key the later one wins and the earlier
/// one is left in the tree, unreachable through the dict.
pub struct ElementDict<K: DictKey, T> {
    access: ElementAccess,
    key_attr: Option<String>,
    types: MemberTypes<T>,
    members: IndexMap<K, Element>,
}

impl<K: DictKey, T: 'static> ElementDict<K, T> {
    pub fn build(types: MemberTypes<T>) -> ElementDictBuilder<K, T> {
        ElementDictBuilder {
            key_attr: None,
            selection: Selection::All,
            types,
            _key: std::marker::PhantomData,
        }
    }
}

impl<K: DictKey, T> ElementDict<K, T> {
    /// Element holding the members.
    pub fn access(&self) -> &ElementAccess {
        &self.access
    }

    pub fn key_attr(&self) -> Option<&str> {
        self.key_attr.as_deref()
    }

    /// Builds the member for `key`. A new value is built on every call.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: no member under `key`, or no member type for it.
    /// - Whatever the member constructor returns.
    pub fn get<Q>(&self, doc: &Document, key: &Q) -> Result<T>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Display,
    {
        let (stored, element) = self
            .members
            .get_key_value(key)
            .ok_or_else(|| Error::NotFound(format!("{}", key)))?;
        let constructor = self.types.constructor_for(doc, *element, stored)?;
        constructor(doc, *element)
    }

    /// The member's element without wrapping it.
    pub fn element<Q>(&self, key: &Q) -> Result<Element>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Display,
    {
        self.members
            .get(key)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("{}", key)))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.members.contains_key(key)
    }

    /// Removes the member's element from the tree and the key from the dict.
    pub fn delete<Q>(&mut self, doc: &mut Document, key: &Q) -> Result<()>
    where
        Q: ?Sized + Hash + Equivalent<K> + fmt::Display,
    {
        let element = self.element(key)?;
        element.detach(doc)?;
        self.members.shift_remove(key);
        Ok(())
    }

    /// Registers an element that is already attached to the tree.
    pub fn append(&mut self, key: K, element: Element) {
        self.members.insert(key, element);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Keys in dict order: document order at construction, appended keys last.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.members.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> + '_ {
        self.keys()
    }

    /// Read-only view of the keys.
    pub fn names(&self) -> Names<'_, K> {
        Names {
            members: &self.members,
        }
    }
}

impl<T> ElementDict<u32, T> {
    /// One past the highest key, or `first` for an empty dict.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfRange`]: the highest key is already `u32::MAX`.
    pub fn next_key(&self, first: u32) -> Result<u32> {
        match self.members.keys().max() {
            Some(&last) => last
                .checked_add(1)
                .ok_or_else(|| Error::OutOfRange(format!("no key after {}", last))),
            None => Ok(first),
        }
    }
}

impl<'a, K: DictKey, T> IntoIterator for &'a ElementDict<K, T> {
    type Item = &'a K;
    type IntoIter = indexmap::map::Keys<'a, K, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.keys()
    }
}

impl<K: DictKey, T> fmt::Debug for ElementDict<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementDict")
            .field("element", &self.access.element())
            .field("key_attr", &self.key_attr)
            .field("types", &self.types)
            .field("keys", &self.members.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Keys of an [`ElementDict`]. There is no way to change them through here.
#[derive(Debug, Clone, Copy)]
pub struct Names<'a, K> {
    members: &'a IndexMap<K, Element>,
}

impl<'a, K: DictKey> Names<'a, K> {
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.members.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Keys<'a, K, Element> {
        self.members.keys()
    }

    pub fn to_vec(&self) -> Vec<K> {
        self.iter().cloned().collect()
    }
}

impl<'a, K: DictKey> IntoIterator for Names<'a, K> {
    type Item = &'a K;
    type IntoIter = indexmap::map::Keys<'a, K, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.keys()
    }
}

/// Returned by [`ElementDict::build`].
pub struct ElementDictBuilder<K, T> {
    key_attr: Option<String>,
    selection: Selection,
    types: MemberTypes<T>,
    _key: std::marker::PhantomData<K>,
}

impl<K: DictKey, T> ElementDictBuilder<K, T> {
    /// Key members by this attribute. Without it members are keyed `0`, `1`, ...
    /// in document order.
    pub fn key_attr(mut self, name: &str) -> Self {
        self.key_attr = Some(name.to_owned());
        self
    }

    /// Select only children with this tag name. Replaces any attribute filter.
    pub fn tag_filter(mut self, name: &str) -> Self {
        self.selection = Selection::Tag(name.to_owned());
        self
    }

    /// Select only children carrying this attribute. Replaces any tag filter.
    pub fn attr_filter(mut self, name: &str) -> Self {
        self.selection = Selection::HasAttribute(name.to_owned());
        self
    }

    /// Reads the selected children of `parent` into the dict.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeMismatch`]: a key attribute doesn't convert to `K`.
    pub fn finish(self, doc: &Document, parent: Element) -> Result<ElementDict<K, T>> {
        let selected: Vec<Element> = parent
            .child_elements(doc)
            .into_iter()
            .filter(|child| match &self.selection {
                Selection::All => true,
                Selection::Tag(name) => child.name(doc) == name,
                Selection::HasAttribute(name) => child.has_attribute(doc, name),
            })
            .collect();

        let mut members = IndexMap::with_capacity(selected.len());
        for (position, child) in selected.into_iter().enumerate() {
            let key = match &self.key_attr {
                Some(name) => K::from_attr(child.attribute(doc, name).unwrap_or_default())?,
                None => K::from_attr(&position.to_string())?,
            };
            members.insert(key, child);
        }
        Ok(ElementDict {
            access: ElementAccess::new(doc, parent),
            key_attr: self.key_attr,
            types: self.types,
            members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[derive(Debug, PartialEq)]
    enum Block {
        IRef(Element),
        ORef(Element),
        Other(String),
    }

    const SHEET: &str = r#"<?xml version="1.0"?>
<Sheet Number="1">
<IRef ID="0" Operand="a"/>
<ORef ID="1" Operand="b"/>
<TextBox ID="4" Width="0"/>
<Wire FromID="0" ToID="1"/>
<Wire FromID="1" ToID="4"/>
</Sheet>"#;

    fn blocks() -> MemberTypes<Block> {
        MemberTypes::dispatch(TypeSelector::TagName)
            .variant("IRef", |_, e| Ok(Block::IRef(e)))
            .variant("ORef", |_, e| Ok(Block::ORef(e)))
            .default_type(|doc, e| Ok(Block::Other(e.name(doc).to_owned())))
    }

    fn setup() -> (Document, Element) {
        let doc = Document::from_str(SHEET).unwrap();
        let sheet = doc.root_element().unwrap();
        (doc, sheet)
    }

    #[test]
    fn test_sequential_keys() {
        let (doc, sheet) = setup();
        let wires: ElementDict<String, Element> = ElementDict::build(MemberTypes::single(|_, e| Ok(e)))
            .tag_filter("Wire")
            .finish(&doc, sheet)
            .unwrap();
        assert_eq!(wires.len(), 2);
        assert_eq!(wires.names().to_vec(), vec!["0", "1"]);
        let second = wires.get(&doc, "1").unwrap();
        assert_eq!(second.attribute(&doc, "ToID"), Some("4"));
    }

    #[test]
    fn test_dispatch_by_tag_name() {
        let (doc, sheet) = setup();
        let blocks: ElementDict<u32, Block> = ElementDict::build(blocks())
            .key_attr("ID")
            .attr_filter("ID")
            .finish(&doc, sheet)
            .unwrap();
        assert_eq!(blocks.keys().copied().collect::<Vec<_>>(), vec![0, 1, 4]);
        assert!(matches!(blocks.get(&doc, &0u32).unwrap(), Block::IRef(_)));
        assert!(matches!(blocks.get(&doc, &1u32).unwrap(), Block::ORef(_)));
        assert_eq!(blocks.get(&doc, &4u32).unwrap(), Block::Other("TextBox".to_string()));
        assert!(matches!(blocks.get(&doc, &2u32), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_dispatch_by_attribute_and_key() {
        let (doc, sheet) = setup();
        let by_operand: ElementDict<String, Block> = ElementDict::build(
            MemberTypes::dispatch(TypeSelector::Attribute("Operand".to_string()))
                .variant("a", |_, e| Ok(Block::IRef(e))),
        )
        .key_attr("ID")
        .attr_filter("ID")
        .finish(&doc, sheet)
        .unwrap();
        assert!(matches!(
            by_operand.get(&doc, "0").unwrap(),
            Block::IRef(_)
        ));
        // no default registered
        assert!(matches!(
            by_operand.get(&doc, "1"),
            Err(Error::NotFound(_))
        ));

        let by_key: ElementDict<String, Block> = ElementDict::build(
            MemberTypes::dispatch(TypeSelector::Key)
                .variant("1", |_, e| Ok(Block::ORef(e)))
                .default_type(|_, _| Ok(Block::Other("default".to_string()))),
        )
        .tag_filter("Wire")
        .finish(&doc, sheet)
        .unwrap();
        assert!(matches!(by_key.get(&doc, "1").unwrap(), Block::ORef(_)));
        assert_eq!(
            by_key.get(&doc, "0").unwrap(),
            Block::Other("default".to_string())
        );
    }

    #[test]
    fn test_single_type_wins_over_element() {
        let (doc, sheet) = setup();
        let types = MemberTypes::single(|_, e| Ok(Block::ORef(e)));
        assert_eq!(types.kind_of(&doc, sheet, &0u32), None);
        let all: ElementDict<String, Block> = ElementDict::build(types)
            .finish(&doc, sheet)
            .unwrap();
        assert_eq!(all.len(), 5);
        for key in &all {
            assert!(matches!(all.get(&doc, key).unwrap(), Block::ORef(_)));
        }
    }

    #[test]
    fn test_delete_and_append() {
        let (mut doc, sheet) = setup();
        let mut blocks: ElementDict<u32, Block> = ElementDict::build(blocks())
            .key_attr("ID")
            .attr_filter("ID")
            .finish(&doc, sheet)
            .unwrap();
        let oref = blocks.element(&1u32).unwrap();
        blocks.delete(&mut doc, &1u32).unwrap();
        assert!(!blocks.names().contains(&1u32));
        assert!(!oref.has_parent(&doc));
        assert!(!sheet.child_elements(&doc).contains(&oref));
        assert!(matches!(blocks.get(&doc, &1u32), Err(Error::NotFound(_))));
        assert!(matches!(blocks.delete(&mut doc, &1u32), Err(Error::NotFound(_))));

        let new = Element::build("ORef")
            .attribute("ID", "5")
            .push_to(&mut doc, sheet)
            .unwrap();
        blocks.append(5, new);
        assert_eq!(blocks.get(&doc, &5u32).unwrap(), Block::ORef(new));
        assert_eq!(blocks.keys().copied().collect::<Vec<_>>(), vec![0, 4, 5]);
    }

    #[test]
    fn test_next_key() {
        let (doc, sheet) = setup();
        let placed: ElementDict<u32, Block> = ElementDict::build(blocks())
            .key_attr("ID")
            .attr_filter("ID")
            .finish(&doc, sheet)
            .unwrap();
        assert_eq!(placed.next_key(0).unwrap(), 5);
        let empty: ElementDict<u32, Block> = ElementDict::build(blocks())
            .key_attr("ID")
            .tag_filter("Block")
            .finish(&doc, sheet)
            .unwrap();
        assert_eq!(empty.next_key(1).unwrap(), 1);

        let doc = Document::from_str(r#"<?xml version="1.0"?><Sheet><IRef ID="4294967295"/></Sheet>"#).unwrap();
        let full: ElementDict<u32, Block> = ElementDict::build(blocks())
            .key_attr("ID")
            .finish(&doc, doc.root_element().unwrap())
            .unwrap();
        assert!(matches!(full.next_key(0), Err(Error::OutOfRange(_))));
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let doc = Document::from_str(
            r#"<?xml version="1.0"?><Tags><Tag Name="a" N="1"/><Tag Name="b"/><Tag Name="a" N="2"/></Tags>"#,
        )
        .unwrap();
        let tags: ElementDict<String, Element> = ElementDict::build(MemberTypes::single(|_, e| Ok(e)))
            .key_attr("Name")
            .finish(&doc, doc.root_element().unwrap())
            .unwrap();
        assert_eq!(tags.len(), 2);
        let a = tags.get(&doc, "a").unwrap();
        assert_eq!(a.attribute(&doc, "N"), Some("2"));
    }

    #[test]
    fn test_bad_integer_key() {
        let doc = Document::from_str(r#"<?xml version="1.0"?><Ports><Port Id="x"/></Ports>"#).unwrap();
        let ports = ElementDict::<u32, Element>::build(MemberTypes::single(|_, e| Ok(e)))
            .key_attr("Id")
            .finish(&doc, doc.root_element().unwrap());
        assert!(matches!(ports, Err(Error::TypeMismatch(_))));
    }
}
