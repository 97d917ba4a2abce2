use crate::document::{Document, Node};
use crate::element::Element;
use crate::error::{Error, Result};

/// A view of one element, the context every binding reads and writes through.
///
/// Holds no borrow of the [`Document`]; the document root is found once, by
/// walking parent links, when the view is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementAccess {
    element: Element,
    root: Element,
}

impl ElementAccess {
    pub fn new(doc: &Document, element: Element) -> ElementAccess {
        ElementAccess {
            element,
            root: element.root_of(doc),
        }
    }

    pub fn element(&self) -> Element {
        self.element
    }

    /// Top of the tree this element belonged to when the view was created.
    pub fn root(&self) -> Element {
        self.root
    }

    pub fn child_elements(&self, doc: &Document) -> Vec<Element> {
        self.element.child_elements(doc)
    }

    /// Finds the first child element with tag `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: no such child.
    pub fn get_child_element(&self, doc: &Document, name: &str) -> Result<Element> {
        self.element.find(doc, name).ok_or_else(|| {
            Error::NotFound(format!("<{}> in <{}>", name, self.element.name(doc)))
        })
    }

    /// Creates a detached element with the given attributes.
    pub fn create_element(doc: &mut Document, name: &str, attributes: &[(&str, &str)]) -> Element {
        Element::build(name)
            .attributes(attributes.iter().copied())
            .finish(doc)
    }

    /// Creates an element and appends it to `parent`.
    pub fn create_append_element(
        doc: &mut Document,
        parent: Element,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> Result<Element> {
        let new = Self::create_element(doc, name, attributes);
        parent.push_child(doc, Node::Element(new))?;
        Ok(new)
    }

    /// Appends a node to the element's children.
    pub fn append_child(&self, doc: &mut Document, node: Node) -> Result<()> {
        self.element.push_child(doc, node)
    }
}

/// Wraps an element in a domain type.
///
/// Constructors may fail, usually with [`Error::NotFound`] when a required
/// child element is missing.
pub trait FromElement: Sized {
    fn from_element(doc: &Document, element: Element) -> Result<Self>;
}

/// Generates a getter and setter pair per attribute binding.
///
/// The type must have an `access: ElementAccess` field.
macro_rules! attribute_fields {
    ($($(#[$meta:meta])* $get:ident, $set:ident => $binding:expr;)*) => {
        $(
            $(#[$meta])*
            pub fn $get(&self, doc: &$crate::Document) -> $crate::Result<Option<String>> {
                $binding.get(doc, &self.access)
            }

            $(#[$meta])*
            pub fn $set(&self, doc: &mut $crate::Document, value: Option<&str>) -> $crate::Result<()> {
                $binding.set(doc, &self.access, value.map(str::to_owned))
            }
        )*
    };
}

pub(crate) use attribute_fields;
