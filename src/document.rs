use crate::element::{Element, ElementData};
use crate::error::{Error, Result};
use crate::parser::{DocumentParser, ReadOptions};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const UTF8_BOM: &[u8] = &[0xef, 0xbb, 0xbf];

/// Represents an XML node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// XML Element
    Element(Element),
    /// XML Character Data, kept as written with its entity references.
    /// Use [`Node::text`] to make one from plain text.
    Text(String),
    /// Comment
    Comment(String),
    /// CDATA data block, stored verbatim.
    CData(String),
    /// Processing Instruction
    PI(String),
    /// Document Type Declaration
    DocType(String),
}

impl Node {
    /// Text node for plain `content`, escaping `&`, `<` and `>`.
    pub fn text(content: &str) -> Node {
        let escaped = escape(content, b"&<>");
        Node::Text(String::from_utf8_lossy(&escaped).into_owned())
    }

    /// Useful to use inside `filter_map`.
    pub fn as_element(&self) -> Option<Element> {
        match self {
            Self::Element(elem) => Some(*elem),
            _ => None,
        }
    }
}

/// Options when writing xml.
///
/// `indent`: indent nested elements by this many spaces. Leave `None` to keep the
/// document's own whitespace, which is what makes an unmodified document write
/// back byte for byte.
///
/// `write_bom`: override whether a UTF-8 byte order mark is written. `None`
/// writes one only if the parsed source had one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub indent: Option<usize>,
    pub write_bom: Option<bool>,
}

/// Represents an XML document or a document fragment.
///
/// All element data lives here; [`Element`] is a cheap handle into it.
///
/// # Examples
/// ```
/// use l5x::Document;
/// use std::str::FromStr;
///
/// let mut doc = Document::from_str(r#"<?xml version="1.0" encoding="UTF-8"?>
/// <RSLogix5000Content SchemaRevision="1.0">
///     <Controller Name="PLC"/>
/// </RSLogix5000Content>"#).unwrap();
/// let controller = doc.root_element().unwrap().find(&doc, "Controller").unwrap();
/// controller.set_attribute(&mut doc, "Name", "Line1");
/// let xml = doc.write_str().unwrap();
/// assert!(xml.contains(r#"<Controller Name="Line1"/>"#));
/// ```
#[derive(Debug)]
pub struct Document {
    pub(crate) store: Vec<ElementData>,
    container: Element,

    pub(crate) version: String,
    pub(crate) standalone: Option<bool>,
    pub(crate) bom: bool,
    // Declaration as read, when it can be written back unchanged.
    pub(crate) raw_decl: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a blank new xml document.
    pub fn new() -> Document {
        let (container, container_data) = Element::container();
        Document {
            store: vec![container_data],
            container,
            version: String::from("1.0"),
            standalone: None,
            bom: false,
            raw_decl: None,
        }
    }

    /// Get 'container' element of Document.
    ///
    /// The document consists of nodes, at the top level. The container holds
    /// those nodes; it has no name and is never written.
    pub fn container(&self) -> Element {
        self.container
    }

    /// Returns `true` if document doesn't have any nodes.
    pub fn is_empty(&self) -> bool {
        !self.container.has_children(self)
    }

    /// Get first element of document.
    pub fn root_element(&self) -> Option<Element> {
        self.container.child_elements(self).first().copied()
    }

    /// Get top-level nodes of document.
    pub fn root_nodes(&self) -> &[Node] {
        self.container.children(self)
    }

    /// Push a node to the end of the top-level nodes.
    pub fn push_root_node(&mut self, node: Node) -> Result<()> {
        let container = self.container;
        container.push_child(self, node)
    }

    /// Standalone value of the XML declaration, if it had one.
    pub fn standalone(&self) -> Option<bool> {
        self.standalone
    }
}

// Read and write
impl Document {
    /// Parses xml string.
    ///
    /// # Errors
    ///
    /// Same as [`Document::parse_reader`].
    pub fn parse_str(str: &str) -> Result<Document> {
        DocumentParser::parse_reader(str.as_bytes(), ReadOptions::default())
    }

    pub fn parse_str_with_opts(str: &str, opts: ReadOptions) -> Result<Document> {
        DocumentParser::parse_reader(str.as_bytes(), opts)
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Document> {
        Self::parse_file_with_opts(path, ReadOptions::default())
    }

    pub fn parse_file_with_opts<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<Document> {
        let path = path.as_ref();
        debug!(path = %path.display(), "parsing document");
        let file = File::open(path)?;
        DocumentParser::parse_reader(file, opts)
    }

    /// Parses xml from a reader. The whole input is read before parsing.
    ///
    /// # Errors
    ///
    /// - [`Error::CannotDecode`]: Could not decode XML.
    /// - [`Error::MalformedXML`]: Could not read XML.
    /// - [`Error::Io`]: IO Error
    pub fn parse_reader<R: Read>(reader: R) -> Result<Document> {
        DocumentParser::parse_reader(reader, ReadOptions::default())
    }

    pub fn parse_reader_with_opts<R: Read>(reader: R, opts: ReadOptions) -> Result<Document> {
        DocumentParser::parse_reader(reader, opts)
    }

    /// Writes document as xml string.
    pub fn write_str(&self) -> Result<String> {
        self.write_str_with_opts(&WriteOptions {
            write_bom: Some(false),
            ..WriteOptions::default()
        })
    }

    pub fn write_str_with_opts(&self, opts: &WriteOptions) -> Result<String> {
        let mut buf: Vec<u8> = Vec::with_capacity(200);
        self.write_with_opts(&mut buf, opts)?;
        Ok(String::from_utf8(buf)?)
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_file_with_opts(path, &WriteOptions::default())
    }

    pub fn write_file_with_opts<P: AsRef<Path>>(&self, path: P, opts: &WriteOptions) -> Result<()> {
        let path = path.as_ref();
        let mut buf: Vec<u8> = Vec::with_capacity(4096);
        self.write_with_opts(&mut buf, opts)?;
        std::fs::write(path, &buf)?;
        debug!(path = %path.display(), bytes = buf.len(), "wrote document");
        Ok(())
    }

    /// Write document to writer. Will be written in UTF-8.
    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        self.write_with_opts(writer, &WriteOptions::default())
    }

    pub fn write_with_opts(&self, writer: &mut impl Write, opts: &WriteOptions) -> Result<()> {
        if opts.write_bom.unwrap_or(self.bom) {
            writer.write_all(UTF8_BOM)?;
        }
        let container = self.container();
        let mut writer = match opts.indent {
            Some(size) => Writer::new_with_indent(writer, b' ', size),
            None => Writer::new(writer),
        };
        self.write_decl(&mut writer)?;
        self.write_nodes(&mut writer, container.children(self))?;
        writer.write_event(Event::Eof)?;
        Ok(())
    }

    // Output is UTF-8, so a parsed declaration naming another encoding is rebuilt.
    fn write_decl(&self, writer: &mut Writer<impl Write>) -> Result<()> {
        if let Some(raw) = &self.raw_decl {
            let start = BytesStart::borrowed(raw.as_bytes(), 3);
            writer.write_event(Event::Decl(BytesDecl::from_start(start)))?;
            return Ok(());
        }
        let standalone = self.standalone.map(|s| match s {
            true => "yes".as_bytes(),
            false => "no".as_bytes(),
        });
        writer.write_event(Event::Decl(BytesDecl::new(
            self.version.as_bytes(),
            Some("UTF-8".as_bytes()),
            standalone,
        )))?;
        Ok(())
    }

    fn write_nodes(&self, writer: &mut Writer<impl Write>, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            match node {
                Node::Element(eid) => self.write_element(writer, *eid)?,
                Node::Text(text) => {
                    writer.write_event(Event::Text(BytesText::from_escaped_str(text)))?
                }
                // DocType, Comment, CData, and PI content is not escaped.
                Node::DocType(text) => {
                    writer.write_event(Event::DocType(BytesText::from_escaped_str(text)))?
                }
                Node::Comment(text) => {
                    writer.write_event(Event::Comment(BytesText::from_escaped_str(text)))?
                }
                Node::CData(text) => {
                    writer.write_event(Event::CData(BytesText::from_escaped_str(text)))?
                }
                Node::PI(text) => {
                    writer.write_event(Event::PI(BytesText::from_escaped_str(text)))?
                }
            };
        }
        Ok(())
    }

    fn write_element(&self, writer: &mut Writer<impl Write>, element: Element) -> Result<()> {
        let name = element.name(self);
        let name_bytes = name.as_bytes();
        let start = match element.raw_attributes(self) {
            Some(raw) => BytesStart::owned(format!("{}{}", name, raw), name.len()),
            None => {
                let mut start = BytesStart::borrowed_name(name_bytes);
                for (key, val) in element.attributes(self) {
                    start.push_attribute(Attribute {
                        key: key.as_bytes(),
                        value: escape(val, b"&<\"\n\r\t"),
                    });
                }
                start
            }
        };
        if element.has_children(self) {
            writer.write_event(Event::Start(start))?;
            self.write_nodes(writer, element.children(self))?;
            writer.write_event(Event::End(BytesEnd::borrowed(name_bytes)))?;
        } else {
            writer.write_event(Event::Empty(start))?;
        }
        Ok(())
    }
}

/// Escapes only the characters in `special`, leaving the rest as found in the source.
fn escape<'a>(raw: &'a str, special: &[u8]) -> Cow<'a, [u8]> {
    let bytes = raw.as_bytes();
    if !bytes.iter().any(|b| special.contains(b)) {
        return Cow::Borrowed(bytes);
    }
    let mut escaped = Vec::with_capacity(bytes.len() + 8);
    for &b in bytes {
        if special.contains(&b) {
            let entity: &[u8] = match b {
                b'&' => b"&amp;",
                b'<' => b"&lt;",
                b'>' => b"&gt;",
                b'"' => b"&quot;",
                b'\n' => b"&#10;",
                b'\r' => b"&#13;",
                b'\t' => b"&#9;",
                _ => b"&apos;",
            };
            escaped.extend_from_slice(entity);
        } else {
            escaped.push(b);
        }
    }
    Cow::Owned(escaped)
}

impl FromStr for Document {
    type Err = Error;

    fn from_str(s: &str) -> Result<Document> {
        Document::parse_str(s)
    }
}
