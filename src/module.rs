use crate::access::{attribute_fields, ElementAccess, FromElement};
use crate::attribute::{AttributeDescriptor, Codec};
use crate::description::ElementDescription;
use crate::dict::{ElementDict, MemberTypes};
use crate::document::Document;
use crate::element::Element;
use crate::error::{Error, Result};

// Safety network numbers are 48 bits wide.
const SNN_MAX: u64 = 0xffff_ffff_ffff;

fn snn_from_xml(raw: &str) -> Result<u64> {
    let mismatch = || Error::TypeMismatch(format!("'{}' is not a safety network number", raw));
    let digits = raw.trim().strip_prefix("16#").ok_or_else(mismatch)?.replace('_', "");
    u64::from_str_radix(&digits, 16).map_err(|_| mismatch())
}

fn snn_to_xml(value: &u64) -> Result<String> {
    if *value > SNN_MAX {
        return Err(Error::OutOfRange(format!(
            "safety network number {:#x} is wider than 48 bits",
            value
        )));
    }
    let digits = format!("{:016x}", value);
    Ok(format!(
        "16#{}_{}_{}_{}",
        &digits[0..4],
        &digits[4..8],
        &digits[8..12],
        &digits[12..16]
    ))
}

/// Safety network number, stored as hex groups like `16#0000_4c33_031d_ae3d`.
pub const SAFETY_NETWORK_NUMBER: Codec<u64> = Codec {
    from_xml: snn_from_xml,
    to_xml: snn_to_xml,
};

pub(crate) const SAFETY_NETWORK: AttributeDescriptor<u64> =
    AttributeDescriptor::with_codec("SafetyNetwork", false, None, SAFETY_NETWORK_NUMBER);

/// A hardware module from the I/O configuration.
///
/// The first module under `Modules` is the controller itself.
#[derive(Debug)]
pub struct Module {
    access: ElementAccess,
    ports: Option<ElementDict<u32, Port>>,
}

impl FromElement for Module {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        let access = ElementAccess::new(doc, element);
        let ports = match element.find(doc, "Ports") {
            Some(ports) => Some(
                ElementDict::build(MemberTypes::of::<Port>())
                    .key_attr("Id")
                    .tag_filter("Port")
                    .finish(doc, ports)?,
            ),
            None => None,
        };
        Ok(Module { access, ports })
    }
}

impl Module {
    const DESCRIPTION: ElementDescription =
        ElementDescription::new(&["EKey", "Ports", "Communications", "ExtendedProperties"]);

    attribute_fields! {
        name, set_name => AttributeDescriptor::new("Name");
        catalog_number, set_catalog_number => AttributeDescriptor::new("CatalogNumber");
        vendor, set_vendor => AttributeDescriptor::new("Vendor");
        product_type, set_product_type => AttributeDescriptor::new("ProductType");
        product_code, set_product_code => AttributeDescriptor::new("ProductCode");
        major, set_major => AttributeDescriptor::new("Major");
        minor, set_minor => AttributeDescriptor::new("Minor");
        parent_module, set_parent_module => AttributeDescriptor::new("ParentModule");
        inhibited, set_inhibited => AttributeDescriptor::new("Inhibited");
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

    /// Safety network number of a safety module.
    pub fn snn(&self, doc: &Document) -> Result<Option<u64>> {
        SAFETY_NETWORK.get(doc, &self.access)
    }

    /// # Errors
    ///
    /// - [`Error::OutOfRange`]: `value` doesn't fit in 48 bits.
    pub fn set_snn(&self, doc: &mut Document, value: u64) -> Result<()> {
        SAFETY_NETWORK.set(doc, &self.access, Some(value))
    }

    /// Ports keyed by their `Id`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: the module has no `Ports` element.
    pub fn ports(&self) -> Result<&ElementDict<u32, Port>> {
        self.ports
            .as_ref()
            .ok_or_else(|| Error::NotFound("<Ports> in <Module>".to_string()))
    }

    pub fn ports_mut(&mut self) -> Result<&mut ElementDict<u32, Port>> {
        self.ports
            .as_mut()
            .ok_or_else(|| Error::NotFound("<Ports> in <Module>".to_string()))
    }

    /// Creates the controller's own module with one backplane port.
    pub(crate) fn create_controller(doc: &mut Document, modules: Element) -> Result<Element> {
        let module = ElementAccess::create_append_element(
            doc,
            modules,
            "Module",
            &[
                ("Name", "Local"),
                ("CatalogNumber", ""),
                ("Vendor", "1"),
                ("ProductType", "14"),
                ("ProductCode", ""),
                ("Major", ""),
                ("Minor", ""),
                ("ParentModule", "Local"),
                ("ParentModPortId", "1"),
                ("Inhibited", "false"),
                ("MajorFault", "true"),
            ],
        )?;
        ElementAccess::create_append_element(doc, module, "EKey", &[("State", "Disabled")])?;
        let ports = ElementAccess::create_append_element(doc, module, "Ports", &[])?;
        let port = ElementAccess::create_append_element(
            doc,
            ports,
            "Port",
            &[("Id", "1"), ("Address", "0"), ("Type", "ICP"), ("Upstream", "false")],
        )?;
        ElementAccess::create_append_element(doc, port, "Bus", &[("Size", "10")])?;
        Ok(module)
    }
}

/// A communication port of a [`Module`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    access: ElementAccess,
}

impl FromElement for Port {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        Ok(Port {
            access: ElementAccess::new(doc, element),
        })
    }
}

impl Port {
    attribute_fields! {
        id, set_id => AttributeDescriptor::new("Id");
        /// Slot number on a backplane, or a network address.
        address, set_address => AttributeDescriptor::new("Address");
        port_type, set_port_type => AttributeDescriptor::new("Type");
        upstream, set_upstream => AttributeDescriptor::new("Upstream");
    }

    pub fn element(&self) -> Element {
        self.access.element()
    }
}
