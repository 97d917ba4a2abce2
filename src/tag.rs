use crate::access::{attribute_fields, ElementAccess, FromElement};
use crate::attribute::AttributeDescriptor;
use crate::description::ElementDescription;
use crate::dict::{ElementDict, MemberTypes};
use crate::document::Document;
use crate::element::Element;
use crate::error::{Error, Result};
use tracing::trace;

const DESCRIPTION: ElementDescription = ElementDescription::new(&["Comments", "Data"]);

/// A controller or program scope tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    access: ElementAccess,
}

impl FromElement for Tag {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        Ok(Tag {
            access: ElementAccess::new(doc, element),
        })
    }
}

impl Tag {
    attribute_fields! {
        name, set_name => AttributeDescriptor::new("Name");
        /// `Base`, `Alias`, `Produced` or `Consumed`.
        tag_type, set_tag_type => AttributeDescriptor::new("TagType");
        data_type, set_data_type => AttributeDescriptor::new("DataType");
        radix, set_radix => AttributeDescriptor::new("Radix");
        constant, set_constant => AttributeDescriptor::new("Constant");
        /// `Read/Write`, `Read Only` or `None`.
        external_access, set_external_access => AttributeDescriptor::new("ExternalAccess");
    }

    pub fn element(&self) -> Element {
        self.access.element()
    }

    pub fn description(&self, doc: &Document) -> Result<Option<String>> {
        DESCRIPTION.get(doc, &self.access)
    }

    pub fn set_description(&self, doc: &mut Document, value: Option<&str>) -> Result<()> {
        DESCRIPTION.set(doc, &self.access, value)
    }

    /// Adds a base tag to `tags` and the tree.
    ///
    /// Fails [`Error::AlreadyExists`] if a tag with that name exists already.
    pub fn create(
        doc: &mut Document,
        tags: &mut ElementDict<String, Tag>,
        name: &str,
        data_type: &str,
        description: Option<&str>,
    ) -> Result<Tag> {
        if tags.contains_key(name) {
            return Err(Error::AlreadyExists(format!("Tag '{}'", name)));
        }
        let mut attributes = vec![("Name", name), ("TagType", "Base"), ("DataType", data_type)];
        if let Some(radix) = default_radix(data_type) {
            attributes.push(("Radix", radix));
        }
        attributes.push(("Constant", "false"));
        attributes.push(("ExternalAccess", "Read/Write"));

        let element =
            ElementAccess::create_append_element(doc, tags.access().element(), "Tag", &attributes)?;
        let tag = Tag::from_element(doc, element)?;
        if let Some(text) = description {
            tag.set_description(doc, Some(text))?;
        }
        tags.append(name.to_owned(), element);
        trace!(name, data_type, "created tag");
        Ok(tag)
    }
}

fn default_radix(data_type: &str) -> Option<&'static str> {
    match data_type {
        "BOOL" | "SINT" | "INT" | "DINT" | "LINT" => Some("Decimal"),
        "REAL" => Some("Float"),
        _ => None,
    }
}

/// Collection of the tags under a `Tags` element, keyed by name.
pub(crate) fn tags_of(doc: &Document, scope: &ElementAccess) -> Result<ElementDict<String, Tag>> {
    let tags = scope.get_child_element(doc, "Tags")?;
    ElementDict::build(MemberTypes::of::<Tag>())
        .key_attr("Name")
        .tag_filter("Tag")
        .finish(doc, tags)
}
