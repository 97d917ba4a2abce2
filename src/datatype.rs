//! User-defined data types and add-on instruction definitions.
//!
//! Only the name and description are exposed; members and logic are left
//! untouched in the tree.

use crate::access::{attribute_fields, ElementAccess, FromElement};
use crate::attribute::AttributeDescriptor;
use crate::description::ElementDescription;
use crate::document::Document;
use crate::element::Element;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataType {
    access: ElementAccess,
}

impl FromElement for DataType {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        Ok(DataType {
            access: ElementAccess::new(doc, element),
        })
    }
}

impl DataType {
    const DESCRIPTION: ElementDescription = ElementDescription::new(&["Members"]);

    attribute_fields! {
        name, set_name => AttributeDescriptor::new("Name");
    }

    pub fn element(&self) -> Element {
        self.access.element()
    }

    pub fn description(&self, doc: &Document) -> Result<Option<String>> {
        Self::DESCRIPTION.get(doc, &self.access)
    }

    pub fn set_description(&self, doc: &mut Document, value: Option<&str>) -> Result<()> {
        Self::DESCRIPTION.set(doc, &self.access, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOnInstruction {
    access: ElementAccess,
}

impl FromElement for AddOnInstruction {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        Ok(AddOnInstruction {
            access: ElementAccess::new(doc, element),
        })
    }
}

impl AddOnInstruction {
    const DESCRIPTION: ElementDescription = ElementDescription::new(&[
        "RevisionNote",
        "AdditionalHelpText",
        "Parameters",
        "LocalTags",
        "Routines",
    ]);

    attribute_fields! {
        name, set_name => AttributeDescriptor::new("Name");
        revision, set_revision => AttributeDescriptor::new("Revision");
    }

    pub fn element(&self) -> Element {
        self.access.element()
    }

    pub fn description(&self, doc: &Document) -> Result<Option<String>> {
        Self::DESCRIPTION.get(doc, &self.access)
    }

    pub fn set_description(&self, doc: &mut Document, value: Option<&str>) -> Result<()> {
        Self::DESCRIPTION.set(doc, &self.access, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_description_goes_before_members() {
        let mut doc = Document::from_str(
            r#"<?xml version="1.0"?><DataType Name="Motor" Family="NoFamily" Class="User"><Members/></DataType>"#,
        )
        .unwrap();
        let udt = DataType::from_element(&doc, doc.root_element().unwrap()).unwrap();
        assert_eq!(udt.name(&doc).unwrap().as_deref(), Some("Motor"));
        udt.set_description(&mut doc, Some("Drive")).unwrap();
        assert_eq!(
            doc.write_str().unwrap(),
            r#"<?xml version="1.0"?><DataType Name="Motor" Family="NoFamily" Class="User"><Description><![CDATA[Drive]]></Description><Members/></DataType>"#
        );
    }

    #[test]
    fn test_add_on_fields() {
        let mut doc = Document::from_str(
            r#"<?xml version="1.0"?><AddOnInstructionDefinition Name="Valve" Revision="1.0"><Parameters/><Routines/></AddOnInstructionDefinition>"#,
        )
        .unwrap();
        let aoi = AddOnInstruction::from_element(&doc, doc.root_element().unwrap()).unwrap();
        assert_eq!(aoi.revision(&doc).unwrap().as_deref(), Some("1.0"));
        aoi.set_revision(&mut doc, Some("1.1")).unwrap();
        aoi.set_description(&mut doc, Some("Two position valve")).unwrap();
        assert_eq!(
            aoi.element().child_elements(&doc)[0].name(&doc),
            "Description"
        );
        assert_eq!(aoi.element().attribute(&doc, "Revision"), Some("1.1"));
    }
}
