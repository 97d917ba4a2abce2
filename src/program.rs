use crate::access::{attribute_fields, ElementAccess, FromElement};
use crate::attribute::{AttributeDescriptor, Codec};
use crate::description::ElementDescription;
use crate::dict::{ElementDict, MemberTypes};
use crate::document::Document;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::fbd::{Sheet, SHEET_SIZE};
use crate::tag::{tags_of, Tag};
use std::fmt;
use tracing::trace;

/// A program: a scope of tags plus the routines that use them.
#[derive(Debug)]
pub struct Program {
    access: ElementAccess,
    pub tags: ElementDict<String, Tag>,
    pub routines: ElementDict<String, Routine>,
}

impl FromElement for Program {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        let access = ElementAccess::new(doc, element);
        let tags = tags_of(doc, &access)?;
        let routines = ElementDict::build(MemberTypes::of::<Routine>())
            .key_attr("Name")
            .tag_filter("Routine")
            .finish(doc, access.get_child_element(doc, "Routines")?)?;
        Ok(Program {
            access,
            tags,
            routines,
        })
    }
}

impl Program {
    const DESCRIPTION: ElementDescription = ElementDescription::new(&["Tags", "Routines"]);

    attribute_fields! {
        name, set_name => AttributeDescriptor::new("Name");
        test_edits, set_test_edits => AttributeDescriptor::read_only("TestEdits");
        main_routine_name, set_main_routine_name => AttributeDescriptor::read_only("MainRoutineName");
        disabled, set_disabled => AttributeDescriptor::read_only("Disabled");
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

    /// Adds an empty program to `programs` and the tree.
    pub fn create(doc: &mut Document, programs: &mut ElementDict<String, Program>, name: &str) -> Result<Program> {
        if programs.contains_key(name) {
            return Err(Error::AlreadyExists(format!("Program '{}'", name)));
        }
        let element = ElementAccess::create_append_element(
            doc,
            programs.access().element(),
            "Program",
            &[("Name", name), ("TestEdits", "false"), ("Disabled", "false")],
        )?;
        ElementAccess::create_append_element(doc, element, "Tags", &[])?;
        ElementAccess::create_append_element(doc, element, "Routines", &[])?;
        programs.append(name.to_owned(), element);
        trace!(name, "created program");
        Program::from_element(doc, element)
    }
}

/// Language of a routine's logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineType {
    Ladder,
    FunctionBlock,
    StructuredText,
    SequentialFunctionChart,
}

impl RoutineType {
    /// Value of the routine's `Type` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutineType::Ladder => "RLL",
            RoutineType::FunctionBlock => "FBD",
            RoutineType::StructuredText => "ST",
            RoutineType::SequentialFunctionChart => "SFC",
        }
    }

    fn content_tag(&self) -> &'static str {
        match self {
            RoutineType::Ladder => "RLLContent",
            RoutineType::FunctionBlock => "FBDContent",
            RoutineType::StructuredText => "STContent",
            RoutineType::SequentialFunctionChart => "SFCContent",
        }
    }
}

impl fmt::Display for RoutineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Routine {
    access: ElementAccess,
    rungs: Option<ElementDict<u32, Rung>>,
    sheets: Option<ElementDict<u32, Sheet>>,
}

impl FromElement for Routine {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        let rungs = match element.find(doc, "RLLContent") {
            Some(content) => Some(
                ElementDict::build(MemberTypes::of::<Rung>())
                    .key_attr("Number")
                    .tag_filter("Rung")
                    .finish(doc, content)?,
            ),
            None => None,
        };
        let sheets = match element.find(doc, "FBDContent") {
            Some(content) => Some(
                ElementDict::build(MemberTypes::of::<Sheet>())
                    .key_attr("Number")
                    .tag_filter("Sheet")
                    .finish(doc, content)?,
            ),
            None => None,
        };
        Ok(Routine {
            access: ElementAccess::new(doc, element),
            rungs,
            sheets,
        })
    }
}

impl Routine {
    const DESCRIPTION: ElementDescription =
        ElementDescription::new(&["RLLContent", "FBDContent", "STContent", "SFCContent"]);

    attribute_fields! {
        name, set_name => AttributeDescriptor::new("Name");
        /// `RLL`, `FBD`, `ST` or `SFC`.
        routine_type, set_routine_type => AttributeDescriptor::read_only("Type");
        /// Function block routines only. Reads the size name, like `Letter`.
        sheet_size, set_sheet_size => AttributeDescriptor::with_codec("SheetSize", false, Some("FBDContent"), SHEET_SIZE);
        /// Function block routines only.
        sheet_orientation, set_sheet_orientation => AttributeDescriptor::on_child("SheetOrientation", "FBDContent");
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

    /// Rungs of a ladder routine, keyed by `Number`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: the routine has no ladder content.
    pub fn rungs(&self) -> Result<&ElementDict<u32, Rung>> {
        self.rungs.as_ref().ok_or_else(|| self.missing("RLLContent"))
    }

    pub fn rungs_mut(&mut self) -> Result<&mut ElementDict<u32, Rung>> {
        match self.rungs.as_mut() {
            Some(rungs) => Ok(rungs),
            None => Err(Error::NotFound("<RLLContent> in <Routine>".to_string())),
        }
    }

    /// Sheets of a function block routine, keyed by `Number`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`]: the routine has no function block content.
    pub fn sheets(&self) -> Result<&ElementDict<u32, Sheet>> {
        self.sheets.as_ref().ok_or_else(|| self.missing("FBDContent"))
    }

    pub fn sheets_mut(&mut self) -> Result<&mut ElementDict<u32, Sheet>> {
        match self.sheets.as_mut() {
            Some(sheets) => Ok(sheets),
            None => Err(Error::NotFound("<FBDContent> in <Routine>".to_string())),
        }
    }

    fn missing(&self, content: &str) -> Error {
        Error::NotFound(format!("<{}> in <Routine>", content))
    }

    /// Rung by number, failing [`Error::OutOfRange`] for numbers the routine
    /// doesn't have.
    pub fn rung(&self, doc: &Document, number: u32) -> Result<Rung> {
        let rungs = self.rungs()?;
        if !rungs.contains_key(&number) {
            return Err(Error::OutOfRange(format!(
                "rung {} of a routine with {} rung(s)",
                number,
                rungs.len()
            )));
        }
        rungs.get(doc, &number)
    }

    /// Sheet by number, failing [`Error::OutOfRange`] for numbers the routine
    /// doesn't have.
    pub fn sheet(&self, doc: &Document, number: u32) -> Result<Sheet> {
        let sheets = self.sheets()?;
        if !sheets.contains_key(&number) {
            return Err(Error::OutOfRange(format!(
                "sheet {} of a routine with {} sheet(s)",
                number,
                sheets.len()
            )));
        }
        sheets.get(doc, &number)
    }

    /// Appends a rung holding `text` after the highest numbered one.
    pub fn create_rung(&mut self, doc: &mut Document, text: &str) -> Result<Rung> {
        let rungs = self.rungs_mut()?;
        let number = rungs.next_key(0)?;
        let number_text = number.to_string();
        let element = ElementAccess::create_append_element(
            doc,
            rungs.access().element(),
            "Rung",
            &[("Number", number_text.as_str()), ("Type", "N")],
        )?;
        Element::build("Text").cdata(text).push_to(doc, element)?;
        rungs.append(number, element);
        trace!(number, "created rung");
        Rung::from_element(doc, element)
    }

    /// Appends an empty sheet after the highest numbered one. Sheets count from 1.
    pub fn create_sheet(&mut self, doc: &mut Document) -> Result<Sheet> {
        let sheets = self.sheets_mut()?;
        let number = sheets.next_key(1)?;
        let number_text = number.to_string();
        let element = ElementAccess::create_append_element(
            doc,
            sheets.access().element(),
            "Sheet",
            &[("Number", number_text.as_str())],
        )?;
        sheets.append(number, element);
        trace!(number, "created sheet");
        Sheet::from_element(doc, element)
    }

    /// Adds a routine with empty content of the given type.
    ///
    /// Function block routines start as `Letter` sized, landscape, with no sheets.
    pub fn create(
        doc: &mut Document,
        routines: &mut ElementDict<String, Routine>,
        name: &str,
        routine_type: RoutineType,
    ) -> Result<Routine> {
        if routines.contains_key(name) {
            return Err(Error::AlreadyExists(format!("Routine '{}'", name)));
        }
        let element = ElementAccess::create_append_element(
            doc,
            routines.access().element(),
            "Routine",
            &[("Name", name), ("Type", routine_type.as_str())],
        )?;
        let content = Element::build(routine_type.content_tag());
        let content = match routine_type {
            RoutineType::FunctionBlock => content
                .attribute("SheetSize", "Letter - 8.5x11 in")
                .attribute("SheetOrientation", "Landscape"),
            _ => content,
        };
        content.push_to(doc, element)?;
        routines.append(name.to_owned(), element);
        trace!(name, routine_type = routine_type.as_str(), "created routine");
        Routine::from_element(doc, element)
    }
}

/// One rung of ladder logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rung {
    access: ElementAccess,
}

impl FromElement for Rung {
    fn from_element(doc: &Document, element: Element) -> Result<Self> {
        Ok(Rung {
            access: ElementAccess::new(doc, element),
        })
    }
}

impl Rung {
    const NUMBER: AttributeDescriptor<u32> =
        AttributeDescriptor::with_codec("Number", true, None, Codec::parsed());
    const TEXT: ElementDescription = ElementDescription::hosted_in(&[], "Text");
    const COMMENT: ElementDescription = ElementDescription::hosted_in(&["Text"], "Comment");

    attribute_fields! {
        rung_type, set_rung_type => AttributeDescriptor::new("Type");
    }

    pub fn element(&self) -> Element {
        self.access.element()
    }

    pub fn number(&self, doc: &Document) -> Result<Option<u32>> {
        Self::NUMBER.get(doc, &self.access)
    }

    /// The rung's logic, like `XIC(start)OTE(motor);`.
    pub fn text(&self, doc: &Document) -> Result<String> {
        Self::TEXT.get_or_empty(doc, &self.access)
    }

    pub fn set_text(&self, doc: &mut Document, value: &str) -> Result<()> {
        Self::TEXT.set(doc, &self.access, Some(value))
    }

    pub fn comment(&self, doc: &Document) -> Result<Option<String>> {
        Self::COMMENT.get(doc, &self.access)
    }

    pub fn set_comment(&self, doc: &mut Document, value: Option<&str>) -> Result<()> {
        Self::COMMENT.set(doc, &self.access, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use std::str::FromStr;

    const PROGRAM: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Program Name="MainProgram" TestEdits="false" MainRoutineName="MainRoutine" Disabled="false">
<Tags>
<Tag Name="boolean2" TagType="Base" DataType="BOOL" Radix="Decimal" Constant="false" ExternalAccess="Read/Write"/>
</Tags>
<Routines>
<Routine Name="MainRoutine" Type="RLL">
<RLLContent>
<Rung Number="0" Type="N">
<Text>
<![CDATA[JSR(TestFunctionBlockRoutine,0);]]>
</Text>
</Rung>
<Rung Number="1" Type="N">
<Comment>
<![CDATA[Ladder]]>
</Comment>
<Text>
<![CDATA[JSR(TestLadderRoutine,0);]]>
</Text>
</Rung>
</RLLContent>
</Routine>
<Routine Name="TestFunctionBlockRoutine" Type="FBD">
<FBDContent SheetSize="Letter - 8.5x11 in" SheetOrientation="Landscape">
<Sheet Number="1">
</Sheet>
</FBDContent>
</Routine>
</Routines>
</Program>"#;

    fn setup() -> (Document, Program) {
        let doc = Document::from_str(PROGRAM).unwrap();
        let program = Program::from_element(&doc, doc.root_element().unwrap()).unwrap();
        (doc, program)
    }

    #[test]
    fn test_program_fields() {
        let (mut doc, program) = setup();
        assert_eq!(program.main_routine_name(&doc).unwrap().as_deref(), Some("MainRoutine"));
        assert!(matches!(
            program.set_main_routine_name(&mut doc, Some("Other")),
            Err(Error::ReadOnly(_))
        ));
        assert_eq!(program.tags.names().to_vec(), vec!["boolean2"]);
        assert_eq!(
            program.routines.names().to_vec(),
            vec!["MainRoutine", "TestFunctionBlockRoutine"]
        );

        program.set_description(&mut doc, Some("Test Program Description")).unwrap();
        let names = program.element().child_elements(&doc).iter().map(|e| e.name(&doc)).join(",");
        assert_eq!(names, "Description,Tags,Routines");
    }

    #[test]
    fn test_rungs() {
        let (mut doc, program) = setup();
        let mut routine = program.routines.get(&doc, "MainRoutine").unwrap();
        assert_eq!(routine.routine_type(&doc).unwrap().as_deref(), Some("RLL"));
        assert!(matches!(routine.sheets(), Err(Error::NotFound(_))));
        assert!(matches!(routine.sheet_size(&doc), Err(Error::NotFound(_))));

        let first = routine.rung(&doc, 0).unwrap();
        assert_eq!(first.text(&doc).unwrap(), "JSR(TestFunctionBlockRoutine,0);");
        assert_eq!(first.comment(&doc).unwrap(), None);
        let second = routine.rung(&doc, 1).unwrap();
        assert_eq!(second.comment(&doc).unwrap().as_deref(), Some("Ladder"));
        assert!(matches!(routine.rung(&doc, 2), Err(Error::OutOfRange(_))));

        first.set_comment(&mut doc, Some("Call the diagram")).unwrap();
        let names = first.element().child_elements(&doc).iter().map(|e| e.name(&doc)).join(",");
        assert_eq!(names, "Comment,Text");

        let rung = routine.create_rung(&mut doc, "XIC(boolean1)OTE(boolean2);").unwrap();
        assert_eq!(rung.number(&doc).unwrap(), Some(2));
        assert_eq!(routine.rung(&doc, 2).unwrap(), rung);
        assert_eq!(rung.text(&doc).unwrap(), "XIC(boolean1)OTE(boolean2);");
    }

    #[test]
    fn test_function_block_routine() {
        let (mut doc, program) = setup();
        let mut routine = program.routines.get(&doc, "TestFunctionBlockRoutine").unwrap();
        assert_eq!(routine.sheet_size(&doc).unwrap().as_deref(), Some("Letter"));
        assert_eq!(routine.sheet_orientation(&doc).unwrap().as_deref(), Some("Landscape"));
        assert!(matches!(routine.rungs(), Err(Error::NotFound(_))));

        routine.set_sheet_size(&mut doc, Some("A4")).unwrap();
        let content = routine.element().find(&doc, "FBDContent").unwrap();
        assert_eq!(content.attribute(&doc, "SheetSize"), Some("A4 - 210x297 mm"));
        assert_eq!(routine.sheet_size(&doc).unwrap().as_deref(), Some("A4"));

        assert_eq!(routine.sheet(&doc, 1).unwrap().number(&doc).unwrap(), Some(1));
        assert!(matches!(routine.sheet(&doc, 0), Err(Error::OutOfRange(_))));
        let sheet = routine.create_sheet(&mut doc).unwrap();
        assert_eq!(sheet.number(&doc).unwrap(), Some(2));
        assert_eq!(routine.sheets().unwrap().len(), 2);
    }

    #[test]
    fn test_create_program_and_routines() {
        let mut doc = Document::from_str(r#"<?xml version="1.0"?><Programs/>"#).unwrap();
        let mut programs: ElementDict<String, Program> = ElementDict::build(MemberTypes::of::<Program>())
            .key_attr("Name")
            .finish(&doc, doc.root_element().unwrap())
            .unwrap();
        let mut program = Program::create(&mut doc, &mut programs, "Conveyor").unwrap();
        assert!(matches!(
            Program::create(&mut doc, &mut programs, "Conveyor"),
            Err(Error::AlreadyExists(_))
        ));

        let mut fbd = Routine::create(&mut doc, &mut program.routines, "Diagram", RoutineType::FunctionBlock).unwrap();
        Routine::create(&mut doc, &mut program.routines, "Logic", RoutineType::StructuredText).unwrap();
        assert_eq!(fbd.sheet_size(&doc).unwrap().as_deref(), Some("Letter"));
        let sheet = fbd.create_sheet(&mut doc).unwrap();
        assert_eq!(sheet.number(&doc).unwrap(), Some(1));

        let reread = programs.get(&doc, "Conveyor").unwrap();
        assert_eq!(reread.routines.names().to_vec(), vec!["Diagram", "Logic"]);
        assert_eq!(
            doc.write_str().unwrap(),
            concat!(
                r#"<?xml version="1.0"?><Programs><Program Name="Conveyor" TestEdits="false" Disabled="false">"#,
                r#"<Tags/><Routines><Routine Name="Diagram" Type="FBD"><FBDContent SheetSize="Letter - 8.5x11 in" SheetOrientation="Landscape">"#,
                r#"<Sheet Number="1"/></FBDContent></Routine><Routine Name="Logic" Type="ST"><STContent/></Routine></Routines></Program></Programs>"#
            )
        );
    }
}
