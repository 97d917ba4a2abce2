//! Bindings from typed fields to element attributes.

use crate::access::ElementAccess;
use crate::document::Document;
use crate::element::Element;
use crate::error::{Error, Result};
use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;

/// Conversion pair between attribute text and a field's value.
///
/// `to_xml` must invert `from_xml` for every value it claims to support.
pub struct Codec<V> {
    pub from_xml: fn(&str) -> Result<V>,
    pub to_xml: fn(&V) -> Result<String>,
}

impl<V> Clone for Codec<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Codec<V> {}

impl<V> std::fmt::Debug for Codec<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").finish_non_exhaustive()
    }
}

fn string_from_xml(raw: &str) -> Result<String> {
    Ok(raw.to_owned())
}

fn string_to_xml(value: &String) -> Result<String> {
    Ok(value.clone())
}

fn parse_from_xml<V: FromStr>(raw: &str) -> Result<V> {
    raw.trim().parse().map_err(|_| {
        Error::TypeMismatch(format!(
            "'{}' is not a valid {}",
            raw,
            std::any::type_name::<V>()
        ))
    })
}

fn display_to_xml<V: Display>(value: &V) -> Result<String> {
    Ok(value.to_string())
}

impl Codec<String> {
    /// Attribute text as is.
    pub const fn identity() -> Codec<String> {
        Codec {
            from_xml: string_from_xml,
            to_xml: string_to_xml,
        }
    }
}

impl<V: FromStr + Display> Codec<V> {
    /// Parses on read, fails with [`Error::TypeMismatch`] on text that doesn't parse.
    pub const fn parsed() -> Codec<V> {
        Codec {
            from_xml: parse_from_xml::<V>,
            to_xml: display_to_xml::<V>,
        }
    }
}

/// Maps a field to an attribute of the context element, or of one of its
/// child elements when `use_element` is set.
///
/// Declared once per domain type, usually as a `const`.
pub struct AttributeDescriptor<V = String> {
    name: &'static str,
    read_only: bool,
    use_element: Option<&'static str>,
    codec: Codec<V>,
}

impl<V> Clone for AttributeDescriptor<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for AttributeDescriptor<V> {}

impl<V> std::fmt::Debug for AttributeDescriptor<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("read_only", &self.read_only)
            .field("use_element", &self.use_element)
            .finish()
    }
}

impl AttributeDescriptor<String> {
    pub const fn new(name: &'static str) -> Self {
        AttributeDescriptor {
            name,
            read_only: false,
            use_element: None,
            codec: Codec::identity(),
        }
    }

    pub const fn read_only(name: &'static str) -> Self {
        AttributeDescriptor {
            name,
            read_only: true,
            use_element: None,
            codec: Codec::identity(),
        }
    }

    /// The attribute lives on the first child element named `use_element`.
    pub const fn on_child(name: &'static str, use_element: &'static str) -> Self {
        AttributeDescriptor {
            name,
            read_only: false,
            use_element: Some(use_element),
            codec: Codec::identity(),
        }
    }
}

impl<V> AttributeDescriptor<V> {
    pub const fn with_codec(
        name: &'static str,
        read_only: bool,
        use_element: Option<&'static str>,
        codec: Codec<V>,
    ) -> Self {
        AttributeDescriptor {
            name,
            read_only,
            use_element,
            codec,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn target(&self, doc: &Document, access: &ElementAccess) -> Result<Element> {
        match self.use_element {
            Some(child) => access.get_child_element(doc, child),
            None => Ok(access.element()),
        }
    }

    /// Reads the field. An absent attribute is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: the `use_element` child is missing.
    /// - Whatever the codec returns for unreadable text.
    pub fn get(&self, doc: &Document, access: &ElementAccess) -> Result<Option<V>> {
        let target = self.target(doc, access)?;
        match target.attribute(doc, self.name) {
            Some(raw) => (self.codec.from_xml)(raw).map(Some),
            None => Ok(None),
        }
    }

    /// Writes the field. `None` removes the attribute, and does nothing if it is
    /// already absent.
    ///
    /// # Errors
    ///
    /// - [`Error::ReadOnly`]: the binding is read-only.
    /// - [`Error::NotFound`]: the `use_element` child is missing.
    /// - Whatever the codec returns for values it can't encode.
    pub fn set(&self, doc: &mut Document, access: &ElementAccess, value: Option<V>) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly(format!("Attribute '{}'", self.name)));
        }
        let target = self.target(doc, access)?;
        match value {
            Some(value) => {
                let raw = (self.codec.to_xml)(&value)?;
                target.set_attribute(doc, self.name, raw);
            }
            None => {
                target.remove_attribute(doc, self.name);
            }
        }
        Ok(())
    }
}

/// One extra location a [`MirroredAttribute`] writes to.
#[derive(Clone, Copy)]
pub struct Mirror {
    /// Finds the element to write, starting from the primary context.
    pub locate: fn(&Document, &ElementAccess) -> Result<Element>,
    pub attribute: &'static str,
    /// Builds the new attribute text from its previous text and the written value.
    pub compose: fn(Option<&str>, &str) -> String,
}

impl Mirror {
    /// Mirror that copies the value unchanged.
    pub const fn copy(
        locate: fn(&Document, &ElementAccess) -> Result<Element>,
        attribute: &'static str,
    ) -> Mirror {
        Mirror {
            locate,
            attribute,
            compose: copy_value,
        }
    }
}

impl std::fmt::Debug for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror")
            .field("attribute", &self.attribute)
            .finish_non_exhaustive()
    }
}

fn copy_value(_previous: Option<&str>, value: &str) -> String {
    value.to_owned()
}

/// Outcome of a [`MirroredAttribute`] write that got past the primary attribute.
///
/// `written` counts the locations updated, the primary included. The writes
/// before `failure` stay in place.
#[derive(Debug)]
#[must_use]
pub struct MirrorReport {
    pub written: usize,
    pub failure: Option<Error>,
}

impl MirrorReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Turns a partial application into [`Error::PartialWrite`].
    pub fn into_result(self) -> Result<()> {
        match self.failure {
            None => Ok(()),
            Some(err) => Err(Error::PartialWrite {
                written: self.written,
                source: Box::new(err),
            }),
        }
    }
}

/// An attribute whose value is duplicated to other elements on write.
///
/// The writes happen one after another with no rollback.
#[derive(Debug, Clone, Copy)]
pub struct MirroredAttribute {
    primary: AttributeDescriptor,
    mirrors: &'static [Mirror],
}

impl MirroredAttribute {
    pub const fn new(primary: AttributeDescriptor, mirrors: &'static [Mirror]) -> Self {
        MirroredAttribute { primary, mirrors }
    }

    pub fn get(&self, doc: &Document, access: &ElementAccess) -> Result<Option<String>> {
        self.primary.get(doc, access)
    }

    /// Writes the primary attribute, then each mirror in order.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when the primary write fails, in which case nothing
    /// changed. A failing mirror stops the remaining ones and is reported in
    /// [`MirrorReport::failure`].
    pub fn set(&self, doc: &mut Document, access: &ElementAccess, value: &str) -> Result<MirrorReport> {
        self.primary.set(doc, access, Some(value.to_owned()))?;
        let mut written = 1;
        for mirror in self.mirrors {
            match (mirror.locate)(doc, access) {
                Ok(target) => {
                    let previous = target.attribute(doc, mirror.attribute);
                    let raw = (mirror.compose)(previous, value);
                    target.set_attribute(doc, mirror.attribute, raw);
                    written += 1;
                }
                Err(err) => {
                    warn!(
                        attribute = self.primary.name(),
                        mirror = mirror.attribute,
                        written,
                        "mirrored write stopped: {}",
                        err
                    );
                    return Ok(MirrorReport {
                        written,
                        failure: Some(err),
                    });
                }
            }
        }
        Ok(MirrorReport {
            written,
            failure: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    const NAME: AttributeDescriptor = AttributeDescriptor::new("Name");
    const TYPE: AttributeDescriptor = AttributeDescriptor::read_only("Type");
    const ENABLED: AttributeDescriptor = AttributeDescriptor::on_child("Enabled", "RedundancyInfo");
    const X: AttributeDescriptor<i32> = AttributeDescriptor::with_codec("X", false, None, Codec::parsed());

    fn info(doc: &Document, access: &ElementAccess) -> Result<Element> {
        access.get_child_element(doc, "RedundancyInfo")
    }

    fn missing(doc: &Document, access: &ElementAccess) -> Result<Element> {
        access.get_child_element(doc, "Modules")
    }

    fn with_suffix(previous: Option<&str>, value: &str) -> String {
        format!("{}/{}", value, previous.unwrap_or("-"))
    }

    const MIRRORED: MirroredAttribute = MirroredAttribute::new(
        AttributeDescriptor::new("Major"),
        &[
            Mirror::copy(info, "Major"),
            Mirror {
                locate: info,
                attribute: "Combined",
                compose: with_suffix,
            },
        ],
    );

    const BROKEN: MirroredAttribute = MirroredAttribute::new(
        AttributeDescriptor::new("Minor"),
        &[Mirror::copy(info, "Minor"), Mirror::copy(missing, "Minor")],
    );

    fn setup() -> (Document, ElementAccess) {
        let doc = Document::from_str(
            r#"<?xml version="1.0"?>
<Controller Name="PLC" Type="Main" X="12"><RedundancyInfo Enabled="false" Combined="old"/></Controller>"#,
        )
        .unwrap();
        let access = ElementAccess::new(&doc, doc.root_element().unwrap());
        (doc, access)
    }

    #[test]
    fn test_get_set_remove() {
        let (mut doc, access) = setup();
        assert_eq!(NAME.get(&doc, &access).unwrap().as_deref(), Some("PLC"));
        NAME.set(&mut doc, &access, Some("Line1".to_string())).unwrap();
        assert_eq!(NAME.get(&doc, &access).unwrap().as_deref(), Some("Line1"));
        NAME.set(&mut doc, &access, None).unwrap();
        assert_eq!(NAME.get(&doc, &access).unwrap(), None);
        assert!(!access.element().has_attribute(&doc, "Name"));
        // removing again is not an error
        NAME.set(&mut doc, &access, None).unwrap();
    }

    #[test]
    fn test_read_only() {
        let (mut doc, access) = setup();
        assert_eq!(TYPE.get(&doc, &access).unwrap().as_deref(), Some("Main"));
        assert!(matches!(
            TYPE.set(&mut doc, &access, Some("Other".to_string())),
            Err(Error::ReadOnly(_))
        ));
        assert!(matches!(
            TYPE.set(&mut doc, &access, None),
            Err(Error::ReadOnly(_))
        ));
        assert_eq!(TYPE.get(&doc, &access).unwrap().as_deref(), Some("Main"));
    }

    #[test]
    fn test_child_element() {
        let (mut doc, access) = setup();
        assert_eq!(ENABLED.get(&doc, &access).unwrap().as_deref(), Some("false"));
        ENABLED.set(&mut doc, &access, Some("true".to_string())).unwrap();
        let info = access.get_child_element(&doc, "RedundancyInfo").unwrap();
        assert_eq!(info.attribute(&doc, "Enabled"), Some("true"));
        assert!(!access.element().has_attribute(&doc, "Enabled"));

        info.detach(&mut doc).unwrap();
        assert!(matches!(ENABLED.get(&doc, &access), Err(Error::NotFound(_))));
        assert!(matches!(
            ENABLED.set(&mut doc, &access, None),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_parsed_codec() {
        let (mut doc, access) = setup();
        assert_eq!(X.get(&doc, &access).unwrap(), Some(12));
        X.set(&mut doc, &access, Some(-40)).unwrap();
        assert_eq!(access.element().attribute(&doc, "X"), Some("-40"));
        access.element().set_attribute(&mut doc, "X", "left");
        assert!(matches!(X.get(&doc, &access), Err(Error::TypeMismatch(_))));
    }

    #[test]
    fn test_mirrored_write() {
        let (mut doc, access) = setup();
        let report = MIRRORED.set(&mut doc, &access, "19").unwrap();
        assert!(report.is_complete());
        assert_eq!(report.written, 3);
        let info = access.get_child_element(&doc, "RedundancyInfo").unwrap();
        assert_eq!(MIRRORED.get(&doc, &access).unwrap().as_deref(), Some("19"));
        assert_eq!(info.attribute(&doc, "Major"), Some("19"));
        assert_eq!(info.attribute(&doc, "Combined"), Some("19/old"));
    }

    #[test]
    fn test_mirrored_write_reports_partial() {
        let (mut doc, access) = setup();
        let report = BROKEN.set(&mut doc, &access, "7").unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.written, 2);
        // the writes before the failure stay
        let info = access.get_child_element(&doc, "RedundancyInfo").unwrap();
        assert_eq!(access.element().attribute(&doc, "Minor"), Some("7"));
        assert_eq!(info.attribute(&doc, "Minor"), Some("7"));
        assert!(matches!(
            report.into_result(),
            Err(Error::PartialWrite { written: 2, .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_string_round_trip(value in "\\PC*") {
            let (mut doc, access) = setup();
            NAME.set(&mut doc, &access, Some(value.clone())).unwrap();
            prop_assert_eq!(NAME.get(&doc, &access).unwrap(), Some(value));
        }

        #[test]
        fn prop_integer_round_trip(value in any::<i32>()) {
            let (mut doc, access) = setup();
            X.set(&mut doc, &access, Some(value)).unwrap();
            prop_assert_eq!(X.get(&doc, &access).unwrap(), Some(value));
        }
    }
}
