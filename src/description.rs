//! Bindings from text fields to CDATA data blocks in dedicated child elements.

use crate::access::ElementAccess;
use crate::document::{Document, Node};
use crate::element::Element;
use crate::error::Result;

/// Access to the CDATA content of one element, such as a tag description or a
/// rung's logic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CDataElement {
    element: Element,
}

impl CDataElement {
    pub fn new(element: Element) -> CDataElement {
        CDataElement { element }
    }

    /// Creates a detached element holding an empty data block.
    pub fn create(doc: &mut Document, name: &str) -> CDataElement {
        let element = Element::build(name).cdata("").finish(doc);
        CDataElement { element }
    }

    pub fn element(&self) -> Element {
        self.element
    }

    /// Current content. An element without a data block reads as empty.
    pub fn get<'a>(&self, doc: &'a Document) -> &'a str {
        self.element.cdata(doc).unwrap_or("")
    }

    pub fn set(&self, doc: &mut Document, content: &str) {
        self.element.set_cdata(doc, content);
    }
}

/// Places `new` among `parent`'s children: directly before the first child
/// element whose tag is in `follow`, or as the very first child when none is.
///
/// The relative order of the existing children is unchanged.
pub fn insert_preserving_order(
    doc: &mut Document,
    parent: Element,
    new: Element,
    follow: &[&str],
) -> Result<()> {
    let anchor = {
        let doc: &Document = doc;
        parent
            .child_elements(doc)
            .into_iter()
            .find(|child| follow.contains(&child.name(doc)))
    };
    match anchor {
        Some(anchor) => parent.insert_before(doc, Node::Element(new), anchor),
        None => parent.insert_child(doc, 0, Node::Element(new)),
    }
}

/// Maps a text field to the data block of a child element, `Description` by
/// default.
///
/// `follow` lists the sibling tags the child must come before when it has to be
/// created.
#[derive(Debug, Clone, Copy)]
pub struct ElementDescription {
    follow: &'static [&'static str],
    use_element: &'static str,
}

impl ElementDescription {
    pub const fn new(follow: &'static [&'static str]) -> Self {
        ElementDescription {
            follow,
            use_element: "Description",
        }
    }

    /// The data block lives in a child named `use_element` instead of `Description`.
    pub const fn hosted_in(follow: &'static [&'static str], use_element: &'static str) -> Self {
        ElementDescription {
            follow,
            use_element,
        }
    }

    pub fn use_element(&self) -> &'static str {
        self.use_element
    }

    fn find(&self, doc: &Document, access: &ElementAccess) -> Option<CDataElement> {
        access
            .element()
            .find(doc, self.use_element)
            .map(CDataElement::new)
    }

    /// Current text, `None` when the hosting element doesn't exist.
    pub fn get(&self, doc: &Document, access: &ElementAccess) -> Result<Option<String>> {
        Ok(self.find(doc, access).map(|cdata| cdata.get(doc).to_owned()))
    }

    /// Like [`ElementDescription::get`], reading a missing element as empty text.
    pub fn get_or_empty(&self, doc: &Document, access: &ElementAccess) -> Result<String> {
        Ok(self.get(doc, access)?.unwrap_or_default())
    }

    /// Sets the text, creating the hosting element if needed. `None` removes the
    /// hosting element, and does nothing if there is none.
    pub fn set(&self, doc: &mut Document, access: &ElementAccess, value: Option<&str>) -> Result<()> {
        match value {
            Some(text) => {
                let cdata = match self.find(doc, access) {
                    Some(cdata) => cdata,
                    None => self.create(doc, access)?,
                };
                cdata.set(doc, text);
            }
            None => {
                if let Some(cdata) = self.find(doc, access) {
                    cdata.element().detach(doc)?;
                }
            }
        }
        Ok(())
    }

    fn create(&self, doc: &mut Document, access: &ElementAccess) -> Result<CDataElement> {
        let new = CDataElement::create(doc, self.use_element);
        insert_preserving_order(doc, access.element(), new.element(), self.follow)?;
        Ok(new)
    }
}
