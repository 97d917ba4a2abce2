//! Function block diagram content: sheets, the blocks placed on them and the
//! wires between blocks.

use crate::access::{ElementAccess, FromElement};
use crate::attribute::{AttributeDescriptor, Codec};
use crate::description::ElementDescription;
use crate::dict::{ElementDict, MemberTypes, TypeSelector};
use crate::document::Document;
use crate::element::Element;
use crate::error::Result;
use tracing::trace;

// Size names paired with their full attribute text.
const SHEET_SIZES: &[(&str, &str)] = &[
    ("Letter", "Letter - 8.5x11 in"),
    ("Legal", "Legal - 8.5x14 in"),
    ("Tabloid", "Tabloid - 11x17 in"),
    ("A4", "A4 - 210x297 mm"),
    ("A3", "A3 - 297x420 mm"),
    ("A2", "A2 - 420x594 mm"),
    ("A1", "A1 - 594x841 mm"),
];

fn sheet_size_from_xml(raw: &str) -> Result<String> {
    let name = match raw.split_once(" - ") {
        Some((name, _)) => name,
        None => raw,
    };
    Ok(name.to_owned())
}

fn sheet_size_to_xml(value: &String) -> Result<String> {
    let full = SHEET_SIZES
        .iter()
        .find(|(name, _)| name == value)
        .map_or(value.as_str(), |(_, full)| *full);
    Ok(full.to_owned())
}

/// Sheet size names such as `A4`, stored as `A4 - 210x297 mm`.
///
/// Names outside the known set are written unchanged.
pub const SHEET_SIZE: Codec<String> = Codec {
    from_xml: sheet_size_from_xml,
    to_xml: sheet_size_to_xml,
};

const X: AttributeDescriptor<i32> = AttributeDescriptor::with_codec("X", false, None, Codec::parsed());
const Y: AttributeDescriptor<i32> = AttributeDescriptor::with_codec("Y", false, None, Codec::parsed());
const ID: AttributeDescriptor<u32> = AttributeDescriptor::with_codec("ID", true, None, Codec::parsed());

/// Position and identity shared by everything placed on a sheet.
pub trait FbdObject {
    fn access(&self) -> &ElementAccess;

    fn element(&self) -> Element {
        self.access().element()
    }

    fn x(&self, doc: &Document) -> Result<Option<i32>> {
        X.get(doc, self.access())
    }

    fn set_x(&self, doc: &mut Document, value: i32) -> Result<()> {
        X.set(doc, self.access(), Some(value))
    }

    fn y(&self, doc: &Document) -> Result<Option<i32>> {
        Y.get(doc, self.access())
    }

    fn set_y(&self, doc: &mut Document, value: i32) -> Result<()> {
        Y.set(doc, self.access(), Some(value))
    }

    /// Key of the object within its sheet's blocks.
    fn id(&self, doc: &Document) -> Result<Option<u32>> {
        ID.get(doc, self.access())
    }
}

macro_rules! fbd_object {
    ($($name:ident),*) => {
        $(
            impl FromElement for $name {
                fn from_element(doc: &Document, element: Element) -> Result<Self> {
                    Ok($name {
                        access: ElementAccess::new(doc, element),
                    })
                }
            }

            impl FbdObject for $name {
                fn access(&self) -> &ElementAccess {
                    &self.access
                }
            }
        )*
    };
}

const OPERAND: AttributeDescriptor = AttributeDescriptor::read_only("Operand");
const HIDE_DESC: AttributeDescriptor = AttributeDescriptor::read_only("HideDesc");

/// Input reference: reads a tag into the diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IRef {
    access: ElementAccess,
}

impl IRef {
    pub fn operand(&self, doc: &Document) -> Result<Option<String>> {
        OPERAND.get(doc, &self.access)
    }

    pub fn hide_desc(&self, doc: &Document) -> Result<Option<String>> {
        HIDE_DESC.get(doc, &self.access)
    }
}

/// Output reference: writes a diagram value to a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ORef {
    access: ElementAccess,
}

impl ORef {
    pub fn operand(&self, doc: &Document) -> Result<Option<String>> {
        OPERAND.get(doc, &self.access)
    }

    pub fn hide_desc(&self, doc: &Document) -> Result<Option<String>> {
        HIDE_DESC.get(doc, &self.access)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBox {
    access: ElementAccess,
}

impl TextBox {
    const TEXT: ElementDescription = ElementDescription::hosted_in(&[], "Text");
    const WIDTH: AttributeDescriptor<u32> =
        AttributeDescriptor::with_codec("Width", true, None, Codec::parsed());

    pub fn text(&self, doc: &Document) -> Result<String> {
        Self::TEXT.get_or_empty(doc, &self.access)
    }

    pub fn set_text(&self, doc: &mut Document, value: Option<&str>) -> Result<()> {
        Self::TEXT.set(doc, &self.access, value)
    }

    pub fn width(&self, doc: &Document) -> Result<Option<u32>> {
        Self::WIDTH.get(doc, &self.access)
    }
}

/// Any block without a dedicated type, such as function blocks and connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtherBlock {
    access: ElementAccess,
}

impl OtherBlock {
    /// Tag name of the block, like `Block` or `ICon`.
    pub fn kind<'a>(&self, doc: &'a Document) -> &'a str {
        self.access.element().name(doc)
    }
}

fbd_object!(IRef, ORef, TextBox, OtherBlock);

/// A member of [`Sheet::blocks`], typed by its tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    IRef(IRef),
    ORef(ORef),
    TextBox(TextBox),
    Other(OtherBlock),
}

impl Block {
    fn types() -> MemberTypes<Block> {
        MemberTypes::dispatch(TypeSelector::TagName)
            .variant("IRef", |doc, e| IRef::from_element(doc, e).map(Block::IRef))
            .variant("ORef", |doc, e| ORef::from_element(doc, e).map(Block::ORef))
            .variant("TextBox", |doc, e| TextBox::from_element(doc, e).map(Block::TextBox))
            .default_type(|doc, e| OtherBlock::from_element(doc, e).map(Block::Other))
    }

    pub fn as_object(&self) -> &dyn FbdObject {
        match self {
            Block::IRef(block) => block,
            Block::ORef(block) => block,
            Block::TextBox(block) => block,
            Block::Other(block) => block,
        }
    }
}

/// Connection from an output of one block to an input of another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wire {
    access: ElementAccess,
}

impl FromElement for Wire {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        Ok(Wire {
            access: ElementAccess::new(doc, element),
        })
    }
}

impl Wire {
    const FROM_ID: AttributeDescriptor<u32> =
        AttributeDescriptor::with_codec("FromID", true, None, Codec::parsed());
    const TO_ID: AttributeDescriptor<u32> =
        AttributeDescriptor::with_codec("ToID", true, None, Codec::parsed());
    const TEXT: ElementDescription = ElementDescription::hosted_in(&[], "Text");

    pub fn element(&self) -> Element {
        self.access.element()
    }

    pub fn from_id(&self, doc: &Document) -> Result<Option<u32>> {
        Self::FROM_ID.get(doc, &self.access)
    }

    pub fn to_id(&self, doc: &Document) -> Result<Option<u32>> {
        Self::TO_ID.get(doc, &self.access)
    }

    /// Label drawn on the wire, if it has one.
    pub fn text(&self, doc: &Document) -> Result<Option<String>> {
        Self::TEXT.get(doc, &self.access)
    }

    pub fn set_text(&self, doc: &mut Document, value: Option<&str>) -> Result<()> {
        Self::TEXT.set(doc, &self.access, value)
    }
}

/// One page of a function block routine.
#[derive(Debug)]
pub struct Sheet {
    access: ElementAccess,
    /// Everything on the sheet carrying an `ID`, keyed by it.
    pub blocks: ElementDict<u32, Block>,
    /// Keyed `0`, `1`, ... in document order.
    pub wires: ElementDict<u32, Wire>,
}

impl FromElement for Sheet {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        let blocks = ElementDict::build(Block::types())
            .key_attr("ID")
            .attr_filter("ID")
            .finish(doc, element)?;
        let wires = ElementDict::build(MemberTypes::of::<Wire>())
            .tag_filter("Wire")
            .finish(doc, element)?;
        Ok(Sheet {
            access: ElementAccess::new(doc, element),
            blocks,
            wires,
        })
    }
}

impl Sheet {
    const NUMBER: AttributeDescriptor<u32> =
        AttributeDescriptor::with_codec("Number", true, None, Codec::parsed());
    const DESCRIPTION: ElementDescription = ElementDescription::new(&[]);

    pub fn element(&self) -> Element {
        self.access.element()
    }

    pub fn number(&self, doc: &Document) -> Result<Option<u32>> {
        Self::NUMBER.get(doc, &self.access)
    }

    pub fn description(&self, doc: &Document) -> Result<Option<String>> {
        Self::DESCRIPTION.get(doc, &self.access)
    }

    pub fn set_description(&self, doc: &mut Document, value: Option<&str>) -> Result<()> {
        Self::DESCRIPTION.set(doc, &self.access, value)
    }

    fn append_block(&mut self, doc: &mut Document, name: &str, attributes: &[(&str, &str)]) -> Result<Element> {
        let id = self.blocks.next_key(0)?;
        let id_text = id.to_string();
        let mut all = vec![("ID", id_text.as_str())];
        all.extend_from_slice(attributes);
        let element = ElementAccess::create_append_element(doc, self.access.element(), name, &all)?;
        self.blocks.append(id, element);
        trace!(block = name, id, "created block");
        Ok(element)
    }

    /// Adds an input reference under the next free `ID`.
    pub fn create_iref(&mut self, doc: &mut Document, operand: &str, x: i32, y: i32) -> Result<IRef> {
        let (x, y) = (x.to_string(), y.to_string());
        let element = self.append_block(
            doc,
            "IRef",
            &[("X", x.as_str()), ("Y", y.as_str()), ("Operand", operand), ("HideDesc", "false")],
        )?;
        IRef::from_element(doc, element)
    }

    /// Adds an output reference under the next free `ID`.
    pub fn create_oref(&mut self, doc: &mut Document, operand: &str, x: i32, y: i32) -> Result<ORef> {
        let (x, y) = (x.to_string(), y.to_string());
        let element = self.append_block(
            doc,
            "ORef",
            &[("X", x.as_str()), ("Y", y.as_str()), ("Operand", operand), ("HideDesc", "false")],
        )?;
        ORef::from_element(doc, element)
    }

    pub fn create_text_box(&mut self, doc: &mut Document, text: &str, x: i32, y: i32, width: u32) -> Result<TextBox> {
        let (x, y, width) = (x.to_string(), y.to_string(), width.to_string());
        let element = self.append_block(doc, "TextBox", &[("X", x.as_str()), ("Y", y.as_str()), ("Width", width.as_str())])?;
        Element::build("Text").cdata(text).push_to(doc, element)?;
        TextBox::from_element(doc, element)
    }

    /// Connects two blocks of this sheet.
    pub fn create_wire(&mut self, doc: &mut Document, from_id: u32, to_id: u32) -> Result<Wire> {
        let key = self.wires.next_key(0)?;
        let (from, to) = (from_id.to_string(), to_id.to_string());
        let element = ElementAccess::create_append_element(
            doc,
            self.access.element(),
            "Wire",
            &[("FromID", from.as_str()), ("ToID", to.as_str())],
        )?;
        self.wires.append(key, element);
        trace!(from_id, to_id, "created wire");
        Wire::from_element(doc, element)
    }
}
