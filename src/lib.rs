//! Read and modify Logix 5000 L5X project exports.
//!
//! An L5X file is parsed into a [`Document`], an in-memory tree that keeps
//! everything it was read with, so an unmodified document writes back byte for
//! byte. On top of the tree sit typed views such as [`Controller`], [`Tag`] and
//! [`Routine`]. Their fields are bindings to attributes or to CDATA blocks of
//! child elements, and groups of children are exposed through [`ElementDict`].
//!
//! Views hold no borrow of the document. Reads take `&Document` and writes take
//! `&mut Document`.
//!
//! # Example
//! ```
//! use l5x::Project;
//!
//! let mut project = Project::new()?;
//! project.controller.set_processor_type(&mut project.doc, "1756-L75")?.into_result()?;
//! project.controller.set_major_revision(&mut project.doc, "20")?.into_result()?;
//!
//! let local = project.modules.get(&project.doc, "Local")?;
//! assert_eq!(local.catalog_number(&project.doc)?.as_deref(), Some("1756-L75"));
//! assert_eq!(project.software_revision()?.as_deref(), Some("20.0"));
//! # Ok::<(), l5x::Error>(())
//! ```
//!
//! Lower level, [`Element`] handles work on any XML:
//! ```
//! use l5x::{Document, Element};
//! use std::str::FromStr;
//!
//! let mut doc = Document::from_str(r#"<?xml version="1.0"?><Tags><Tag Name="a"/></Tags>"#)?;
//! let tags = doc.root_element().unwrap();
//! Element::build("Tag").attribute("Name", "b").push_to(&mut doc, tags)?;
//! assert_eq!(tags.find_all(&doc, "Tag").len(), 2);
//! # Ok::<(), l5x::Error>(())
//! ```

mod access;
mod attribute;
mod datatype;
mod description;
mod dict;
mod document;
mod element;
mod error;
mod fbd;
mod module;
mod parser;
mod program;
mod project;
mod tag;

pub use crate::access::{ElementAccess, FromElement};
pub use crate::attribute::{AttributeDescriptor, Codec, Mirror, MirrorReport, MirroredAttribute};
pub use crate::datatype::{AddOnInstruction, DataType};
pub use crate::description::{insert_preserving_order, CDataElement, ElementDescription};
pub use crate::dict::{
    Constructor, DictKey, ElementDict, ElementDictBuilder, MemberTypes, Names, Selection,
    TypeSelector,
};
pub use crate::document::{Document, Node, WriteOptions};
pub use crate::element::{Element, ElementBuilder};
pub use crate::error::{Error, Result};
pub use crate::fbd::{Block, FbdObject, IRef, ORef, OtherBlock, Sheet, TextBox, Wire, SHEET_SIZE};
pub use crate::module::{Module, Port};
pub use crate::parser::ReadOptions;
pub use crate::program::{Program, Routine, RoutineType, Rung};
pub use crate::project::{Controller, Project};
pub use crate::tag::Tag;
