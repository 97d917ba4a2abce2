use crate::document::{Document, Node};
use crate::error::{Error, Result};
use indexmap::IndexMap;

#[derive(Debug)]
pub(crate) struct ElementData {
    full_name: String,
    attributes: IndexMap<String, String>, // document order is kept for writing
    // Start tag text after the name, as parsed. Dropped on the first attribute edit.
    raw_attributes: Option<String>,
    parent: Option<Element>,
    children: Vec<Node>,
}

/// Represents an XML element.
///
/// This struct only contains a unique usize id and implements trait `Copy`.
/// So you do not need to bother with having a reference.
///
/// Because the actual data of the element is stored in [`Document`],
/// most methods takes `&Document` or `&mut Document` as its first argument.
///
/// Note that an element may only interact with elements of the same document,
/// but the crate doesn't know which document an element is from.
/// Trying to push an element from a different document may result in unexpected errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Element {
    id: usize,
}

impl Element {
    /// Create a new empty element with name.
    ///
    /// The element is detached; attach it with [`Element::push_child`] or
    /// [`Element::insert_before`].
    pub fn new<S: Into<String>>(doc: &mut Document, name: S) -> Element {
        Self::with_data(doc, name.into(), IndexMap::new())
    }

    /// Chain methods to build an element easily.
    /// The chain can be finished with `.finish()` or `.push_to(parent)`.
    ///
    /// # Example
    /// ```
    /// use l5x::{Document, Element};
    ///
    /// let mut doc = Document::new();
    /// let container = doc.container();
    /// let tag = Element::build("Tag")
    ///     .attribute("Name", "start_pb")
    ///     .attribute("DataType", "BOOL")
    ///     .push_to(&mut doc, container)
    ///     .unwrap();
    /// assert_eq!(tag.attribute(&doc, "DataType"), Some("BOOL"));
    /// ```
    pub fn build<S: Into<String>>(name: S) -> ElementBuilder {
        ElementBuilder::new(name.into())
    }

    pub(crate) fn with_data(
        doc: &mut Document,
        full_name: String,
        attributes: IndexMap<String, String>,
    ) -> Element {
        let elem = Element { id: doc.store.len() };
        doc.store.push(ElementData {
            full_name,
            attributes,
            raw_attributes: None,
            parent: None,
            children: vec![],
        });
        elem
    }

    pub(crate) fn set_raw_attributes(&self, doc: &mut Document, raw: String) {
        self.mut_data(doc).raw_attributes = Some(raw);
    }

    /// Attribute text as read from the source, while no attribute was changed.
    pub(crate) fn raw_attributes<'a>(&self, doc: &'a Document) -> Option<&'a str> {
        self.data(doc).raw_attributes.as_deref()
    }

    /// The container is the invisible element that holds the top-level nodes.
    pub(crate) fn container() -> (Element, ElementData) {
        let elem_data = ElementData {
            full_name: String::new(),
            attributes: IndexMap::new(),
            raw_attributes: None,
            parent: None,
            children: Vec::new(),
        };
        (Element { id: 0 }, elem_data)
    }

    /// Returns `true` if element is a container.
    ///
    /// See [`Document::container()`] for more information on 'container'.
    pub fn is_container(&self) -> bool {
        self.id == 0
    }
}

impl Element {
    // Elements are only ever created through a `Document`, so the id is valid for it.
    fn data<'a>(&self, doc: &'a Document) -> &'a ElementData {
        &doc.store[self.id]
    }

    fn mut_data<'a>(&self, doc: &'a mut Document) -> &'a mut ElementData {
        &mut doc.store[self.id]
    }

    /// Tag name of the element.
    pub fn name<'a>(&self, doc: &'a Document) -> &'a str {
        &self.data(doc).full_name
    }

    /// All attributes in document order.
    pub fn attributes<'a>(&self, doc: &'a Document) -> &'a IndexMap<String, String> {
        &self.data(doc).attributes
    }

    pub fn attribute<'a>(&self, doc: &'a Document, name: &str) -> Option<&'a str> {
        self.attributes(doc).get(name).map(String::as_str)
    }

    pub fn has_attribute(&self, doc: &Document, name: &str) -> bool {
        self.attributes(doc).contains_key(name)
    }

    /// Sets an attribute. An existing attribute keeps its position.
    pub fn set_attribute<S, T>(&self, doc: &mut Document, name: S, value: T)
    where
        S: Into<String>,
        T: Into<String>,
    {
        let data = self.mut_data(doc);
        data.raw_attributes = None;
        data.attributes.insert(name.into(), value.into());
    }

    /// Removes an attribute, returning its value if it existed.
    pub fn remove_attribute(&self, doc: &mut Document, name: &str) -> Option<String> {
        let data = self.mut_data(doc);
        let removed = data.attributes.shift_remove(name);
        if removed.is_some() {
            data.raw_attributes = None;
        }
        removed
    }

    pub fn parent(&self, doc: &Document) -> Option<Element> {
        self.data(doc).parent
    }

    pub fn has_parent(&self, doc: &Document) -> bool {
        self.parent(doc).is_some()
    }

    /// Walks parent links up to the element without a parent.
    ///
    /// For an attached element this is the document's container.
    pub fn root_of(&self, doc: &Document) -> Element {
        let mut elem = *self;
        while let Some(parent) = elem.parent(doc) {
            elem = parent;
        }
        elem
    }

    pub fn children<'a>(&self, doc: &'a Document) -> &'a [Node] {
        &self.data(doc).children
    }

    pub fn has_children(&self, doc: &Document) -> bool {
        !self.children(doc).is_empty()
    }

    /// Child elements in document order, skipping text and other nodes.
    pub fn child_elements(&self, doc: &Document) -> Vec<Element> {
        self.children(doc)
            .iter()
            .filter_map(|node| node.as_element())
            .collect()
    }

    /// First child element with tag `name`.
    pub fn find(&self, doc: &Document, name: &str) -> Option<Element> {
        self.children(doc)
            .iter()
            .filter_map(|node| node.as_element())
            .find(|elem| elem.name(doc) == name)
    }

    /// All child elements with tag `name`.
    pub fn find_all(&self, doc: &Document, name: &str) -> Vec<Element> {
        self.children(doc)
            .iter()
            .filter_map(|node| node.as_element())
            .filter(|elem| elem.name(doc) == name)
            .collect()
    }

    /// First descendant element with tag `name`, depth-first in document order.
    pub fn find_descendant(&self, doc: &Document, name: &str) -> Option<Element> {
        for child in self.child_elements(doc) {
            if child.name(doc) == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(doc, name) {
                return Some(found);
            }
        }
        None
    }

    /// Index of `element` among this element's child nodes.
    pub fn child_position(&self, doc: &Document, element: Element) -> Option<usize> {
        self.children(doc)
            .iter()
            .position(|node| node.as_element() == Some(element))
    }

    /// Content of the first CDATA child, the data block of this element.
    pub fn cdata<'a>(&self, doc: &'a Document) -> Option<&'a str> {
        self.children(doc).iter().find_map(|node| match node {
            Node::CData(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Sets the data block, leaving exactly one CDATA child.
    ///
    /// Other CDATA and non-blank text children are removed. The block takes the
    /// place of the first of them, so blank text used as layout stays around it.
    pub fn set_cdata<S: Into<String>>(&self, doc: &mut Document, content: S) {
        let children = &mut self.mut_data(doc).children;
        let index = children.iter().position(is_payload).unwrap_or(children.len());
        children.retain(|node| !is_payload(node));
        children.insert(index, Node::CData(content.into()));
    }

    fn adopt(&self, doc: &mut Document, node: &Node) -> Result<()> {
        if let Node::Element(elem) = node {
            if elem.is_container() {
                return Err(Error::ContainerCannotMove);
            }
            let mut ancestor = Some(*self);
            while let Some(current) = ancestor {
                if current == *elem {
                    return Err(Error::CyclicInsert);
                }
                ancestor = current.parent(doc);
            }
            let data = elem.mut_data(doc);
            if data.parent.is_some() {
                return Err(Error::HasAParent);
            }
            data.parent = Some(*self);
        }
        Ok(())
    }

    /// Equivalent to `vec.push()`.
    ///
    /// # Errors
    ///
    /// - [`Error::HasAParent`]: If node is an element, it must not have a parent.
    /// Call `elem.detach()` before.
    /// - [`Error::ContainerCannotMove`]: The container element cannot be a child.
    /// - [`Error::CyclicInsert`]: The element is this element or one of its ancestors.
    pub fn push_child(&self, doc: &mut Document, node: Node) -> Result<()> {
        self.adopt(doc, &node)?;
        self.mut_data(doc).children.push(node);
        Ok(())
    }

    /// Equivalent to `vec.insert()`.
    ///
    /// # Errors
    ///
    /// Same as [`Element::push_child`].
    pub fn insert_child(&self, doc: &mut Document, index: usize, node: Node) -> Result<()> {
        self.adopt(doc, &node)?;
        self.mut_data(doc).children.insert(index, node);
        Ok(())
    }

    /// Inserts `node` directly before the child element `reference`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: `reference` is not a child of this element.
    /// - Same as [`Element::push_child`].
    pub fn insert_before(&self, doc: &mut Document, node: Node, reference: Element) -> Result<()> {
        let index = self
            .child_position(doc, reference)
            .ok_or_else(|| Error::NotFound(format!("child <{}>", reference.name(doc))))?;
        self.insert_child(doc, index, node)
    }

    /// Remove child element by value.
    ///
    /// # Errors
    ///
    /// - [Error::NotFound]: Element was not found among its children.
    pub fn remove_child_elem(&self, doc: &mut Document, element: Element) -> Result<()> {
        let pos = self
            .child_position(doc, element)
            .ok_or_else(|| Error::NotFound(format!("child <{}>", element.name(doc))))?;
        self.mut_data(doc).children.remove(pos);
        element.mut_data(doc).parent = None;
        Ok(())
    }

    /// Remove element from its parent. Does nothing if it has no parent.
    pub fn detach(&self, doc: &mut Document) -> Result<()> {
        if self.is_container() {
            return Err(Error::ContainerCannotMove);
        }
        match self.parent(doc) {
            Some(parent) => parent.remove_child_elem(doc, *self),
            None => Ok(()),
        }
    }
}

// Content that belongs to the data block, as opposed to layout whitespace.
fn is_payload(node: &Node) -> bool {
    match node {
        Node::CData(_) => true,
        Node::Text(text) => !text.trim().is_empty(),
        _ => false,
    }
}

/// Returned by [`Element::build`].
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    name: String,
    attributes: IndexMap<String, String>,
    cdata: Option<String>,
}

impl ElementBuilder {
    fn new(name: String) -> ElementBuilder {
        ElementBuilder {
            name,
            attributes: IndexMap::new(),
            cdata: None,
        }
    }

    pub fn attribute<S, T>(mut self, name: S, value: T) -> Self
    where
        S: Into<String>,
        T: Into<String>,
    {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attributes<'a, I>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in attributes {
            self.attributes.insert(name.to_owned(), value.to_owned());
        }
        self
    }

    /// Give the element a CDATA data block.
    pub fn cdata<S: Into<String>>(mut self, content: S) -> Self {
        self.cdata = Some(content.into());
        self
    }

    /// Create a detached element.
    pub fn finish(self, doc: &mut Document) -> Element {
        let elem = Element::with_data(doc, self.name, self.attributes);
        if let Some(content) = self.cdata {
            elem.mut_data(doc).children.push(Node::CData(content));
        }
        elem
    }

    /// Create the element and push it to `parent`.
    pub fn push_to(self, doc: &mut Document, parent: Element) -> Result<Element> {
        let elem = self.finish(doc);
        parent.push_child(doc, Node::Element(elem))?;
        Ok(elem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn names(doc: &Document, elem: Element) -> Vec<&str> {
        elem.child_elements(doc)
            .into_iter()
            .map(|e| e.name(doc))
            .collect()
    }

    #[test]
    fn test_children() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Controller Name="PLC">
    <Tags>
        <Tag Name="a"/>
    </Tags>
    <Programs/>
</Controller>"#;
        let doc = Document::from_str(xml).unwrap();
        let controller = doc.root_element().unwrap();
        let tags = controller.find(&doc, "Tags").unwrap();
        let tag = tags.find(&doc, "Tag").unwrap();
        assert_eq!(names(&doc, controller), vec!["Tags", "Programs"]);
        assert_eq!(controller.children(&doc).len(), 5);
        assert_eq!(tag.parent(&doc), Some(tags));
        assert_eq!(tag.root_of(&doc), doc.container());
        assert_eq!(controller.find_descendant(&doc, "Tag"), Some(tag));
        assert!(controller.find(&doc, "Modules").is_none());
    }

    #[test]
    fn test_attribute_order_kept() {
        let mut doc = Document::new();
        let container = doc.container();
        let elem = Element::build("Tag")
            .attribute("Name", "a")
            .attribute("DataType", "BOOL")
            .attribute("Radix", "Decimal")
            .push_to(&mut doc, container)
            .unwrap();
        elem.set_attribute(&mut doc, "Name", "b");
        assert_eq!(elem.remove_attribute(&mut doc, "DataType").unwrap(), "BOOL");
        assert!(elem.remove_attribute(&mut doc, "DataType").is_none());
        elem.set_attribute(&mut doc, "Constant", "false");
        let keys: Vec<&str> = elem.attributes(&doc).keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Name", "Radix", "Constant"]);
        assert_eq!(elem.attribute(&doc, "Name"), Some("b"));
    }

    #[test]
    fn test_insert_and_detach() {
        let mut doc = Document::new();
        let container = doc.container();
        let parent = Element::new(&mut doc, "P");
        container.push_child(&mut doc, Node::Element(parent)).unwrap();
        let a = Element::build("A").push_to(&mut doc, parent).unwrap();
        let c = Element::build("C").push_to(&mut doc, parent).unwrap();
        let b = Element::new(&mut doc, "B");
        parent.insert_before(&mut doc, Node::Element(b), c).unwrap();
        assert_eq!(names(&doc, parent), vec!["A", "B", "C"]);

        assert!(matches!(
            parent.push_child(&mut doc, Node::Element(a)),
            Err(Error::HasAParent)
        ));
        assert!(matches!(
            parent.push_child(&mut doc, Node::Element(container)),
            Err(Error::ContainerCannotMove)
        ));

        b.detach(&mut doc).unwrap();
        assert!(!b.has_parent(&doc));
        assert_eq!(names(&doc, parent), vec!["A", "C"]);
        b.detach(&mut doc).unwrap();
        assert!(matches!(
            parent.insert_before(&mut doc, Node::Element(a), b),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_set_cdata_keeps_single_block() {
        let mut doc = Document::new();
        let elem = Element::new(&mut doc, "Description");
        assert_eq!(elem.cdata(&doc), None);
        elem.set_cdata(&mut doc, "first");
        elem.push_child(&mut doc, Node::Text("\n".to_string())).unwrap();
        elem.push_child(&mut doc, Node::CData("stray".to_string()))
            .unwrap();
        elem.set_cdata(&mut doc, "second");
        assert_eq!(elem.cdata(&doc), Some("second"));
        let blocks = elem
            .children(&doc)
            .iter()
            .filter(|n| matches!(n, Node::CData(_)))
            .count();
        assert_eq!(blocks, 1);
        assert_eq!(elem.children(&doc).len(), 2);
    }

    #[test]
    fn test_set_cdata_replaces_plain_text() {
        let doc_str =
            "<?xml version=\"1.0\"?><Text>\n<![CDATA[OTE(b);]]>\n<![CDATA[stray]]>\nXIC(a)</Text>";
        let mut doc = Document::from_str(doc_str).unwrap();
        let text = doc.root_element().unwrap();
        text.set_cdata(&mut doc, "XIC(a)OTE(b);");
        assert_eq!(
            text.children(&doc),
            &[
                Node::Text("\n".to_string()),
                Node::CData("XIC(a)OTE(b);".to_string()),
                Node::Text("\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_ancestor_cannot_become_child() {
        let mut doc = Document::new();
        let routine = Element::new(&mut doc, "Routine");
        let content = Element::build("RLLContent").push_to(&mut doc, routine).unwrap();
        let rung = Element::build("Rung").push_to(&mut doc, content).unwrap();
        assert!(matches!(
            rung.push_child(&mut doc, Node::Element(routine)),
            Err(Error::CyclicInsert)
        ));
        assert!(matches!(
            routine.insert_child(&mut doc, 0, Node::Element(routine)),
            Err(Error::CyclicInsert)
        ));
        assert!(!routine.has_parent(&doc));
        assert_eq!(rung.root_of(&doc), routine);
    }

    #[test]
    fn test_attribute_edit_drops_source_text() {
        let mut doc = Document::from_str("<?xml version=\"1.0\"?><Tag Name='a' />").unwrap();
        let tag = doc.root_element().unwrap();
        assert_eq!(tag.raw_attributes(&doc), Some(" Name='a' "));
        assert!(tag.remove_attribute(&mut doc, "Radix").is_none());
        assert!(tag.raw_attributes(&doc).is_some());
        tag.set_attribute(&mut doc, "Name", "b");
        assert_eq!(tag.raw_attributes(&doc), None);
    }
}
