//! The top-level L5X project and its controller.

use crate::access::{attribute_fields, ElementAccess, FromElement};
use crate::attribute::{AttributeDescriptor, Mirror, MirrorReport, MirroredAttribute};
use crate::datatype::{AddOnInstruction, DataType};
use crate::description::ElementDescription;
use crate::dict::{ElementDict, MemberTypes};
use crate::document::{Document, WriteOptions};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::module::{Module, SAFETY_NETWORK};
use crate::parser::ReadOptions;
use crate::program::{Program, Routine, RoutineType};
use crate::tag::{tags_of, Tag};
use std::path::Path;
use tracing::{debug, trace};

const ROOT_TAG: &str = "RSLogix5000Content";

/// An L5X project export.
///
/// The project owns the [`Document`]; every other value is a view into it.
/// Field accessors on the views take the document as an argument, so the
/// `doc` field is public to allow borrowing it next to the collections.
///
/// # Examples
/// ```no_run
/// use l5x::Project;
///
/// let mut project = Project::open("line1.L5X")?;
/// let tag = project.controller.tags.get(&project.doc, "start_pb")?;
/// tag.set_description(&mut project.doc, Some("Start pushbutton"))?;
/// project
///     .controller
///     .set_major_revision(&mut project.doc, "33")?
///     .into_result()?;
/// project.write_file("line1_v33.L5X")?;
/// # Ok::<(), l5x::Error>(())
/// ```
#[derive(Debug)]
pub struct Project {
    pub doc: Document,
    access: ElementAccess,
    pub controller: Controller,
    pub datatypes: ElementDict<String, DataType>,
    pub addons: ElementDict<String, AddOnInstruction>,
    pub programs: ElementDict<String, Program>,
    pub modules: ElementDict<String, Module>,
}

// Accessors for attributes of the document element. The project owns its
// document, so unlike the views these don't take one.
macro_rules! project_fields {
    ($($(#[$meta:meta])* $get:ident, $set:ident => $name:literal;)*) => {
        $(
            $(#[$meta])*
            pub fn $get(&self) -> Result<Option<String>> {
                AttributeDescriptor::new($name).get(&self.doc, &self.access)
            }

            $(#[$meta])*
            pub fn $set(&mut self, value: Option<&str>) -> Result<()> {
                AttributeDescriptor::new($name).set(&mut self.doc, &self.access, value.map(str::to_owned))
            }
        )*
    };
}

impl Project {
    /// Reads and binds an L5X file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Project> {
        Self::open_with_opts(path, ReadOptions::default())
    }

    pub fn open_with_opts<P: AsRef<Path>>(path: P, opts: ReadOptions) -> Result<Project> {
        let path = path.as_ref();
        let doc = Document::parse_file_with_opts(path, opts)?;
        let project = Self::from_document(doc)?;
        debug!(
            path = %path.display(),
            programs = project.programs.len(),
            modules = project.modules.len(),
            "opened project"
        );
        Ok(project)
    }

    /// Binds a parsed document.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidFile`]: the document element isn't `RSLogix5000Content`.
    /// - [`Error::NotFound`]: the controller or one of its collections is missing.
    pub fn from_document(doc: Document) -> Result<Project> {
        let root = match doc.root_element() {
            Some(root) if root.name(&doc) == ROOT_TAG => root,
            Some(root) => {
                return Err(Error::InvalidFile(format!(
                    "document element is <{}>, not <{}>",
                    root.name(&doc),
                    ROOT_TAG
                )))
            }
            None => return Err(Error::InvalidFile("document has no element".to_string())),
        };
        let access = ElementAccess::new(&doc, root);
        let controller = Controller::from_element(&doc, access.get_child_element(&doc, "Controller")?)?;
        let scope = controller.access;
        let datatypes = named(&doc, &scope, "DataTypes", MemberTypes::of::<DataType>())?;
        let addons = named(
            &doc,
            &scope,
            "AddOnInstructionDefinitions",
            MemberTypes::of::<AddOnInstruction>(),
        )?;
        let programs = named(&doc, &scope, "Programs", MemberTypes::of::<Program>())?;
        let modules = named(&doc, &scope, "Modules", MemberTypes::of::<Module>())?;
        Ok(Project {
            doc,
            access,
            controller,
            datatypes,
            addons,
            programs,
            modules,
        })
    }

    /// Creates a blank project: an unnamed controller, its `Local` module and a
    /// `MainProgram` whose `MainRoutine` is an empty ladder routine.
    pub fn new() -> Result<Project> {
        let mut doc = Document::new();
        doc.standalone = Some(true);
        let container = doc.container();
        let root = Element::build(ROOT_TAG)
            .attributes([
                ("SchemaRevision", "1.0"),
                ("SoftwareRevision", ""),
                ("TargetName", ""),
                ("TargetType", "Controller"),
                ("ContainsContext", "false"),
                ("Owner", "Default"),
                ("ExportDate", ""),
                ("ExportOptions", "DecoratedData ForceProtectedEncoding AllProjDocTrans"),
            ])
            .push_to(&mut doc, container)?;
        let controller = Controller::create(&mut doc, root)?;
        let modules = ElementAccess::new(&doc, controller).get_child_element(&doc, "Modules")?;
        Module::create_controller(&mut doc, modules)?;

        let mut project = Project::from_document(doc)?;
        let mut program = Program::create(&mut project.doc, &mut project.programs, "MainProgram")?;
        Routine::create(&mut project.doc, &mut program.routines, "MainRoutine", RoutineType::Ladder)?;
        program
            .element()
            .set_attribute(&mut project.doc, "MainRoutineName", "MainRoutine");
        trace!("created blank project");
        Ok(project)
    }

    /// Wraps the document element.
    pub fn access(&self) -> &ElementAccess {
        &self.access
    }

    project_fields! {
        schema_revision, set_schema_revision => "SchemaRevision";
        /// Written together with the controller's revisions; see
        /// [`Controller::set_major_revision`].
        software_revision, set_software_revision => "SoftwareRevision";
        target_name, set_target_name => "TargetName";
        target_type, set_target_type => "TargetType";
        contains_context, set_contains_context => "ContainsContext";
        owner, set_owner => "Owner";
        export_date, set_export_date => "ExportDate";
        export_options, set_export_options => "ExportOptions";
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.doc.write_file(path)
    }

    pub fn write_file_with_opts<P: AsRef<Path>>(&self, path: P, opts: &WriteOptions) -> Result<()> {
        self.doc.write_file_with_opts(path, opts)
    }

    pub fn write_str(&self) -> Result<String> {
        self.doc.write_str()
    }
}

fn named<T: 'static>(
    doc: &Document,
    scope: &ElementAccess,
    container: &str,
    types: MemberTypes<T>,
) -> Result<ElementDict<String, T>> {
    ElementDict::build(types)
        .key_attr("Name")
        .finish(doc, scope.get_child_element(doc, container)?)
}

// The controller's own module is the first module of the I/O tree.
fn controller_module(doc: &Document, access: &ElementAccess) -> Result<Element> {
    access
        .get_child_element(doc, "Modules")?
        .find(doc, "Module")
        .ok_or_else(|| Error::NotFound("controller <Module>".to_string()))
}

fn project_root(doc: &Document, access: &ElementAccess) -> Result<Element> {
    match access.element().parent(doc) {
        Some(parent) if !parent.is_container() => Ok(parent),
        _ => Err(Error::NotFound(format!("<{}>", ROOT_TAG))),
    }
}

fn revision_part(revision: Option<&str>, index: usize) -> &str {
    revision
        .and_then(|rev| rev.split('.').nth(index))
        .filter(|part| !part.is_empty())
        .unwrap_or("0")
}

fn with_major(previous: Option<&str>, major: &str) -> String {
    format!("{}.{}", major, revision_part(previous, 1))
}

fn with_minor(previous: Option<&str>, minor: &str) -> String {
    format!("{}.{}", revision_part(previous, 0), minor)
}

const PROCESSOR_TYPE: MirroredAttribute = MirroredAttribute::new(
    AttributeDescriptor::new("ProcessorType"),
    &[Mirror::copy(controller_module, "CatalogNumber")],
);

const MAJOR_REVISION: MirroredAttribute = MirroredAttribute::new(
    AttributeDescriptor::new("MajorRev"),
    &[
        Mirror::copy(controller_module, "Major"),
        Mirror {
            locate: project_root,
            attribute: "SoftwareRevision",
            compose: with_major,
        },
    ],
);

const MINOR_REVISION: MirroredAttribute = MirroredAttribute::new(
    AttributeDescriptor::new("MinorRev"),
    &[
        Mirror::copy(controller_module, "Minor"),
        Mirror {
            locate: project_root,
            attribute: "SoftwareRevision",
            compose: with_minor,
        },
    ],
);

const TARGET_NAME: MirroredAttribute = MirroredAttribute::new(
    AttributeDescriptor::new("Name"),
    &[Mirror::copy(project_root, "TargetName")],
);

const SLOT: AttributeDescriptor = AttributeDescriptor::new("Address");

/// Controller settings and controller scope tags.
#[derive(Debug)]
pub struct Controller {
    access: ElementAccess,
    pub tags: ElementDict<String, Tag>,
}

impl FromElement for Controller {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        let access = ElementAccess::new(doc, element);
        let tags = tags_of(doc, &access)?;
        Ok(Controller { access, tags })
    }
}

impl Controller {
    const DESCRIPTION: ElementDescription = ElementDescription::new(&[]);

    attribute_fields! {
        /// Path used to go online, like `AB_ETHIP-1\192.168.1.10\Backplane\0`.
        comm_path, set_comm_path => AttributeDescriptor::new("CommPath");
        /// `Target` for a full controller export, `Context` otherwise.
        use_, set_use => AttributeDescriptor::new("Use");
        /// Percentage of processor time given to communications.
        time_slice, set_time_slice => AttributeDescriptor::new("TimeSlice");
        share_unused_time_slice, set_share_unused_time_slice => AttributeDescriptor::new("ShareUnusedTimeSlice");
        project_creation_date, set_project_creation_date => AttributeDescriptor::new("ProjectCreationDate");
        last_modified_date, set_last_modified_date => AttributeDescriptor::new("LastModifiedDate");
        sfc_execution_control, set_sfc_execution_control => AttributeDescriptor::new("SFCExecutionControl");
        sfc_restart_position, set_sfc_restart_position => AttributeDescriptor::new("SFCRestartPosition");
        sfc_last_scan, set_sfc_last_scan => AttributeDescriptor::new("SFCLastScan");
        /// Serial number the project is bound to, like `16#0000_0000`.
        project_sn, set_project_sn => AttributeDescriptor::new("ProjectSN");
        match_project_to_controller, set_match_project_to_controller => AttributeDescriptor::new("MatchProjectToController");
        can_use_rpi_from_producer, set_can_use_rpi_from_producer => AttributeDescriptor::new("CanUseRPIFromProducer");
        inhibit_automatic_firmware_update, set_inhibit_automatic_firmware_update => AttributeDescriptor::new("InhibitAutomaticFirmwareUpdate");
        redundancy_enabled, set_redundancy_enabled => AttributeDescriptor::on_child("Enabled", "RedundancyInfo");
        redundancy_keep_test_edits_on_switchover, set_redundancy_keep_test_edits_on_switchover =>
            AttributeDescriptor::on_child("KeepTestEditsOnSwitchOver", "RedundancyInfo");
        redundancy_io_memory_pad_percentage, set_redundancy_io_memory_pad_percentage =>
            AttributeDescriptor::on_child("IOMemoryPadPercentage", "RedundancyInfo");
        redundancy_datatable_pad_percentage, set_redundancy_datatable_pad_percentage =>
            AttributeDescriptor::on_child("DataTablePadPercentage", "RedundancyInfo");
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

    /// Catalog number of the processor, like `1756-L75`.
    pub fn processor_type(&self, doc: &Document) -> Result<Option<String>> {
        PROCESSOR_TYPE.get(doc, &self.access)
    }

    /// Also sets the controller module's `CatalogNumber`.
    pub fn set_processor_type(&self, doc: &mut Document, value: &str) -> Result<MirrorReport> {
        PROCESSOR_TYPE.set(doc, &self.access, value)
    }

    pub fn major_revision(&self, doc: &Document) -> Result<Option<String>> {
        MAJOR_REVISION.get(doc, &self.access)
    }

    /// Also sets the controller module's `Major` and the major part of the
    /// project's `SoftwareRevision`.
    pub fn set_major_revision(&self, doc: &mut Document, value: &str) -> Result<MirrorReport> {
        MAJOR_REVISION.set(doc, &self.access, value)
    }

    pub fn minor_revision(&self, doc: &Document) -> Result<Option<String>> {
        MINOR_REVISION.get(doc, &self.access)
    }

    /// Also sets the controller module's `Minor` and the minor part of the
    /// project's `SoftwareRevision`.
    pub fn set_minor_revision(&self, doc: &mut Document, value: &str) -> Result<MirrorReport> {
        MINOR_REVISION.set(doc, &self.access, value)
    }

    /// The controller's `Name`.
    pub fn target_name(&self, doc: &Document) -> Result<Option<String>> {
        TARGET_NAME.get(doc, &self.access)
    }

    /// Also sets the project's `TargetName`.
    pub fn set_target_name(&self, doc: &mut Document, value: &str) -> Result<MirrorReport> {
        TARGET_NAME.set(doc, &self.access, value)
    }

    /// Safety network number, kept on the controller module.
    pub fn snn(&self, doc: &Document) -> Result<Option<u64>> {
        let module = ElementAccess::new(doc, controller_module(doc, &self.access)?);
        SAFETY_NETWORK.get(doc, &module)
    }

    /// # Errors
    ///
    /// - [`Error::OutOfRange`]: `value` doesn't fit in 48 bits.
    /// - [`Error::NotFound`]: there is no controller module.
    pub fn set_snn(&self, doc: &mut Document, value: u64) -> Result<()> {
        let module = ElementAccess::new(doc, controller_module(doc, &self.access)?);
        SAFETY_NETWORK.set(doc, &module, Some(value))
    }

    fn slot_port(&self, doc: &Document) -> Result<ElementAccess> {
        let module = controller_module(doc, &self.access)?;
        let port = module
            .find(doc, "Ports")
            .and_then(|ports| ports.find(doc, "Port"))
            .ok_or_else(|| Error::NotFound("<Port> of the controller module".to_string()))?;
        Ok(ElementAccess::new(doc, port))
    }

    /// Chassis slot, stored as the address of the controller module's first port.
    pub fn slot(&self, doc: &Document) -> Result<Option<String>> {
        SLOT.get(doc, &self.slot_port(doc)?)
    }

    pub fn set_slot(&self, doc: &mut Document, value: &str) -> Result<()> {
        let port = self.slot_port(doc)?;
        SLOT.set(doc, &port, Some(value.to_owned()))
    }

    /// Builds the controller skeleton under `root`: settings with empty
    /// revisions, and the empty collections a project expects.
    pub(crate) fn create(doc: &mut Document, root: Element) -> Result<Element> {
        let controller = ElementAccess::create_append_element(
            doc,
            root,
            "Controller",
            &[
                ("Use", "Target"),
                ("Name", ""),
                ("ProcessorType", ""),
                ("MajorRev", ""),
                ("MinorRev", ""),
                ("TimeSlice", "20"),
                ("ShareUnusedTimeSlice", "1"),
                ("ProjectCreationDate", ""),
                ("LastModifiedDate", ""),
                ("SFCExecutionControl", "CurrentActive"),
                ("SFCRestartPosition", "MostRecent"),
                ("SFCLastScan", "DontScan"),
                ("ProjectSN", "16#0000_0000"),
                ("MatchProjectToController", "false"),
            ],
        )?;
        ElementAccess::create_append_element(
            doc,
            controller,
            "RedundancyInfo",
            &[
                ("Enabled", "false"),
                ("KeepTestEditsOnSwitchOver", "false"),
                ("IOMemoryPadPercentage", "90"),
                ("DataTablePadPercentage", "50"),
            ],
        )?;
        ElementAccess::create_append_element(
            doc,
            controller,
            "Security",
            &[("Code", "0"), ("ChangesToDetect", "16#ffff_ffff_ffff_ffff")],
        )?;
        for name in [
            "SafetyInfo",
            "DataTypes",
            "Modules",
            "AddOnInstructionDefinitions",
            "Tags",
            "Programs",
        ] {
            ElementAccess::create_append_element(doc, controller, name, &[])?;
        }
        trace!("created controller");
        Ok(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const PROJECT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<RSLogix5000Content SchemaRevision="1.0" SoftwareRevision="20.01" TargetName="PLC" TargetType="Controller">
<Controller Use="Target" Name="PLC" ProcessorType="1756-L75" MajorRev="20" MinorRev="11">
<DataTypes/>
<Modules>
<Module Name="Local" CatalogNumber="1756-L75" Major="20" Minor="11" SafetyNetwork="16#0000_4c33_031d_ae3d">
<Ports>
<Port Id="1" Address="0" Type="ICP" Upstream="false"/>
</Ports>
</Module>
</Modules>
<AddOnInstructionDefinitions/>
<Tags/>
<Programs/>
</Controller>
</RSLogix5000Content>"#;

    fn project() -> Project {
        Project::from_document(Document::from_str(PROJECT).unwrap()).unwrap()
    }

    #[test]
    fn test_revision_parts() {
        assert_eq!(with_major(Some("20.01"), "19"), "19.01");
        assert_eq!(with_minor(Some("20.01"), "11"), "20.11");
        assert_eq!(with_major(None, "19"), "19.0");
        assert_eq!(with_minor(Some(""), "3"), "0.3");
    }

    #[test]
    fn test_major_revision_is_mirrored() {
        let mut project = project();
        let report = project
            .controller
            .set_major_revision(&mut project.doc, "19")
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.written, 3);
        let local = project.modules.get(&project.doc, "Local").unwrap();
        assert_eq!(local.major(&project.doc).unwrap().as_deref(), Some("19"));
        assert_eq!(project.software_revision().unwrap().as_deref(), Some("19.01"));
        assert_eq!(
            project.controller.major_revision(&project.doc).unwrap().as_deref(),
            Some("19")
        );
    }

    #[test]
    fn test_missing_controller_module_is_reported() {
        let mut project = project();
        project
            .modules
            .delete(&mut project.doc, "Local")
            .unwrap();
        let report = project
            .controller
            .set_processor_type(&mut project.doc, "1756-L73")
            .unwrap();
        assert_eq!(report.written, 1);
        assert!(matches!(report.failure, Some(Error::NotFound(_))));
        assert_eq!(
            project.controller.processor_type(&project.doc).unwrap().as_deref(),
            Some("1756-L73")
        );
        assert!(matches!(
            project.controller.slot(&project.doc),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_slot_and_target_name() {
        let mut project = project();
        assert_eq!(project.controller.slot(&project.doc).unwrap().as_deref(), Some("0"));
        project.controller.set_slot(&mut project.doc, "2").unwrap();
        let local = project.modules.get(&project.doc, "Local").unwrap();
        let port = local.ports().unwrap().get(&project.doc, &1u32).unwrap();
        assert_eq!(port.address(&project.doc).unwrap().as_deref(), Some("2"));

        project
            .controller
            .set_target_name(&mut project.doc, "Line2")
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(project.target_name().unwrap().as_deref(), Some("Line2"));
    }

    #[test]
    fn test_safety_network_number() {
        let mut project = project();
        let controller = &project.controller;
        assert_eq!(controller.snn(&project.doc).unwrap(), Some(0x4c33_031d_ae3d));
        controller.set_snn(&mut project.doc, 0x1234).unwrap();
        let local = project.modules.get(&project.doc, "Local").unwrap();
        assert_eq!(
            local.element().attribute(&project.doc, "SafetyNetwork"),
            Some("16#0000_0000_0000_1234")
        );
        assert!(matches!(
            controller.set_snn(&mut project.doc, 1 << 48),
            Err(Error::OutOfRange(_))
        ));
        assert_eq!(local.snn(&project.doc).unwrap(), Some(0x1234));
    }

    #[test]
    fn test_not_an_l5x_file() {
        let doc = Document::from_str(r#"<?xml version="1.0"?><Project/>"#).unwrap();
        assert!(matches!(
            Project::from_document(doc),
            Err(Error::InvalidFile(_))
        ));
        let doc = Document::from_str(r#"<?xml version="1.0"?><RSLogix5000Content/>"#).unwrap();
        assert!(matches!(
            Project::from_document(doc),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_new_project() {
        let project = Project::new().unwrap();
        let doc = &project.doc;
        assert_eq!(project.controller.time_slice(doc).unwrap().as_deref(), Some("20"));
        assert_eq!(project.controller.target_name(doc).unwrap().as_deref(), Some(""));
        assert_eq!(project.controller.slot(doc).unwrap().as_deref(), Some("0"));
        assert_eq!(project.programs.names().to_vec(), vec!["MainProgram"]);
        assert_eq!(project.modules.names().to_vec(), vec!["Local"]);

        let program = project.programs.get(doc, "MainProgram").unwrap();
        assert_eq!(program.main_routine_name(doc).unwrap().as_deref(), Some("MainRoutine"));
        let main = program.routines.get(doc, "MainRoutine").unwrap();
        assert!(main.rungs().unwrap().is_empty());

        let xml = project.write_str().unwrap();
        assert!(xml.starts_with(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><RSLogix5000Content SchemaRevision="1.0""#
        ));
    }
}
