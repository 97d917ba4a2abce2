use crate::document::{Document, Node};
use crate::element::Element;
use crate::error::{Error, Result};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::Read;
use tracing::debug;

// Enough to hold any XML declaration.
const DECL_SNIFF_LEN: usize = 256;

/// Options when parsing xml.
///
/// `empty_text_node`: `<tag></tag>` will have a `Node::Text("")` as its children, while `<tag />` won't.
/// Keeping it on lets both forms write back as they were read.
///
/// `require_decl`: Returns error if document doesn't start with XML declaration.
/// If this is set to false, the parser won't be able to decode encodings other than UTF-8,
/// unless a BOM or UTF-16 signature is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    pub empty_text_node: bool,
    pub require_decl: bool,
}

impl Default for ReadOptions {
    fn default() -> ReadOptions {
        ReadOptions {
            empty_text_node: true,
            require_decl: true,
        }
    }
}

pub(crate) struct DocumentParser {
    doc: Document,
    read_opts: ReadOptions,
}

impl DocumentParser {
    pub(crate) fn parse_reader<R: Read>(mut reader: R, opts: ReadOptions) -> Result<Document> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let mut parser = DocumentParser {
            doc: Document::new(),
            read_opts: opts,
        };
        let text = parser.decode(&bytes)?;
        parser.parse_content(&text)?;
        Ok(parser.doc)
    }

    // Look at the BOM and document decl and figure out the document encoding.
    fn decode<'b>(&mut self, bytes: &'b [u8]) -> Result<Cow<'b, str>> {
        let (sniffed, bom_len) = match Encoding::for_bom(bytes) {
            Some(found) => found,
            None => match bytes {
                [0x00, 0x3c, 0x00, 0x3f, ..] => (UTF_16BE, 0),
                [0x3c, 0x00, 0x3f, 0x00, ..] => (UTF_16LE, 0),
                _ => (UTF_8, 0),
            },
        };
        self.doc.bom = sniffed == UTF_8 && bom_len > 0;
        let body = &bytes[bom_len..];

        let mut encoding = sniffed;
        if bom_len == 0 && sniffed == UTF_8 {
            let head = String::from_utf8_lossy(&body[..body.len().min(DECL_SNIFF_LEN)]);
            if let Some(declared) = declared_encoding(&head)? {
                // "UTF-16" in an ASCII-compatible file is a lie we can't act on.
                if declared.is_ascii_compatible() {
                    encoding = declared;
                }
            }
        }
        debug!(encoding = encoding.name(), bom = self.doc.bom, "decoding document");
        encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .ok_or(Error::CannotDecode)
    }

    fn parse_content(&mut self, text: &str) -> Result<()> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(false);
        let mut buf = Vec::with_capacity(200); // reduce time increasing capacity at start.
        let mut element_stack: Vec<Element> = vec![self.doc.container()]; // container element in element_stack

        let mut first = true;
        loop {
            let finished = {
                let ev = reader.read_event(&mut buf)?;
                // Untrimmed, quick-xml reports a zero-length text between adjacent markup.
                if matches!(&ev, Event::Text(text) if text.escaped().is_empty()) {
                    false
                } else {
                    if first && self.read_opts.require_decl && !matches!(ev, Event::Decl(_)) {
                        return Err(Error::MalformedXML(
                            "Didn't find XML Declaration at the start of file".to_string(),
                        ));
                    }
                    first = false;
                    self.handle_event(&mut element_stack, ev)?
                }
            };
            if finished {
                break;
            }
            buf.clear();
        }
        if element_stack.len() > 1 {
            let open = element_stack
                .last()
                .map(|elem| elem.name(&self.doc).to_string())
                .unwrap_or_default();
            return Err(Error::MalformedXML(format!(
                "Reached end of file with <{}> still open",
                open
            )));
        }
        Ok(())
    }

    // Returns if document parsing is finished.
    fn handle_event(&mut self, element_stack: &mut Vec<Element>, event: Event) -> Result<bool> {
        match event {
            Event::Start(ref ev) => {
                let element = self.handle_bytes_start(element_stack, ev)?;
                element_stack.push(element);
            }
            Event::End(_) => {
                if element_stack.len() <= 1 {
                    return Err(Error::MalformedXML(
                        "Closing tag without an opening tag".to_string(),
                    ));
                }
                if let Some(elem) = element_stack.pop() {
                    // distinguish <tag></tag> and <tag />
                    if self.read_opts.empty_text_node && !elem.has_children(&self.doc) {
                        elem.push_child(&mut self.doc, Node::Text(String::new()))?;
                    }
                }
            }
            Event::Empty(ref ev) => {
                self.handle_bytes_start(element_stack, ev)?;
            }
            // Text keeps its entity references, once they are known to be valid.
            Event::Text(ev) => {
                ev.unescaped()?;
                let content = String::from_utf8(ev.escaped().to_vec())?;
                self.push_node(element_stack, Node::Text(content))?;
            }
            // quick-xml hands CDATA over escaped.
            Event::CData(ev) => {
                let content = String::from_utf8(ev.unescaped()?.to_vec())?;
                self.push_node(element_stack, Node::CData(content))?;
            }
            // DocType, Comment, and PI content is kept as written.
            Event::DocType(ev) => {
                let content = String::from_utf8(ev.to_vec())?;
                self.push_node(element_stack, Node::DocType(content))?;
            }
            Event::Comment(ev) => {
                let content = String::from_utf8(ev.to_vec())?;
                self.push_node(element_stack, Node::Comment(content))?;
            }
            Event::PI(ev) => {
                let content = String::from_utf8(ev.to_vec())?;
                self.push_node(element_stack, Node::PI(content))?;
            }
            Event::Decl(ev) => self.handle_decl(&ev)?,
            Event::Eof => return Ok(true),
        }
        Ok(false)
    }

    fn push_node(&mut self, element_stack: &[Element], node: Node) -> Result<()> {
        match element_stack.last() {
            Some(parent) => parent.push_child(&mut self.doc, node),
            None => Err(Error::MalformedXML("Node outside of document".to_string())),
        }
    }

    fn handle_decl(&mut self, ev: &BytesDecl) -> Result<()> {
        self.doc.version = String::from_utf8(ev.version()?.to_vec())?;
        self.doc.standalone = match ev.standalone() {
            Some(res) => {
                let val = std::str::from_utf8(&res?)?.to_lowercase();
                match val.as_str() {
                    "yes" => Some(true),
                    "no" => Some(false),
                    _ => {
                        return Err(Error::MalformedXML(
                            "Standalone Document Declaration has non boolean value".to_string(),
                        ))
                    }
                }
            }
            None => None,
        };
        let utf8 = match ev.encoding() {
            Some(label) => Encoding::for_label(&label?) == Some(UTF_8),
            None => true,
        };
        self.doc.raw_decl = match utf8 {
            true => Some(String::from_utf8(ev.to_vec())?),
            false => None,
        };
        Ok(())
    }

    fn handle_bytes_start(&mut self, element_stack: &[Element], ev: &BytesStart) -> Result<Element> {
        let full_name = String::from_utf8(ev.name().to_vec())?;
        let mut attributes = IndexMap::new();
        for attr in ev.attributes() {
            let attr = attr?;
            let key = String::from_utf8(attr.key.to_vec())?;
            let value = String::from_utf8(attr.unescaped_value()?.to_vec())?;
            attributes.insert(key, value);
        }
        let element = Element::with_data(&mut self.doc, full_name, attributes);
        element.set_raw_attributes(&mut self.doc, String::from_utf8(ev.attributes_raw().to_vec())?);
        self.push_node(element_stack, Node::Element(element))?;
        Ok(element)
    }
}

fn declared_encoding(head: &str) -> Result<Option<&'static Encoding>> {
    let mut reader = Reader::from_str(head);
    reader.trim_text(true);
    let mut buf = Vec::new();
    match reader.read_event(&mut buf) {
        Ok(Event::Decl(ev)) => match ev.encoding() {
            Some(label) => Encoding::for_label(&label?)
                .map(Some)
                .ok_or(Error::CannotDecode),
            None => Ok(None),
        },
        _ => Ok(None),
    }
}
