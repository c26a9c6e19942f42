//! The flow-object event protocol.
//!
//! The upstream style evaluator walks an already-styled document and
//! announces every flow object through this protocol, strictly in document
//! order. The protocol is a single sum type: structural operations,
//! atomic content, compound flow-object brackets, and inherited
//! characteristic settings are all [`Event`] variants, and a backend is a
//! state machine consuming the stream.
//!
//! Calling conventions the evaluator guarantees (preconditions, not
//! runtime-checked in the hot path):
//! - `Start`/`End` bracket every compound flow object and nest like
//!   parentheses. Characteristic settings accumulate on the *next* context
//!   and are captured by the following `Start`.
//! - Atomic flow objects (`ExternalGraphic`, `Rule`, `PageNumber`,
//!   `CurrentNodePageNumber`) read the *next* context directly; the
//!   evaluator issues `Atomic` afterwards to reset it, so a setting
//!   between two sibling atomic objects affects only the first of them.
//! - Non-inherited characteristics ride on the start events as `*Nic`
//!   structs.

use crate::length::Pt;
use crate::fot::space::{BreakKind, DisplaySpace};

/// An RGB color. Converted to the output format's color model at emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Color {
        Color { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontWeight {
    Light,
    #[default]
    Medium,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontPosture {
    #[default]
    Upright,
    Italic,
    Oblique,
}

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quadding {
    #[default]
    Start,
    End,
    Center,
    Justify,
}

/// Score placement relative to the scored characters: a line before
/// (overline), through (strike-out), or after (underline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    Before,
    Through,
    After,
}

/// A border or rule line description carried as an inherited characteristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderSpec {
    pub present: bool,
    pub thickness: Pt,
    /// Number of parallel lines (1 = single, 2 = double).
    pub repeat: u32,
    /// Gap between parallel lines when `repeat > 1`.
    pub separation: Pt,
    pub color: Color,
    pub priority: i32,
}

impl Default for BorderSpec {
    fn default() -> Self {
        BorderSpec {
            present: false,
            thickness: Pt(1.0),
            repeat: 1,
            separation: Pt::ZERO,
            color: Color::BLACK,
            priority: 0,
        }
    }
}

/// A reference to a source-document node.
///
/// `grove` selects the source document (multiple groves can feed one run),
/// `element` is the node's ordinal within it, and `sgml_id` its declared
/// identifier, when it has one. Cross-reference bookkeeping prefers the
/// identifier and falls back to the ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub grove: u32,
    pub element: u32,
    pub sgml_id: Option<String>,
}

impl NodeRef {
    pub fn new(grove: u32, element: u32) -> NodeRef {
        NodeRef {
            grove,
            element,
            sgml_id: None,
        }
    }

    pub fn with_id(grove: u32, element: u32, id: impl Into<String>) -> NodeRef {
        NodeRef {
            grove,
            element,
            sgml_id: Some(id.into()),
        }
    }
}

/// Non-inherited characteristics shared by every display-level flow object.
#[derive(Debug, Clone, Default)]
pub struct DisplayNic {
    pub space_before: DisplaySpace,
    pub space_after: DisplaySpace,
    pub break_before: Option<BreakKind>,
    pub break_after: Option<BreakKind>,
    pub keep_with_previous: bool,
    pub keep_with_next: bool,
}

/// Non-inherited characteristics of a table.
#[derive(Debug, Clone, Default)]
pub struct TableNic {
    pub display: DisplayNic,
    /// Total table width. `None` uses the inherited display size.
    pub width: Option<Pt>,
}

/// Column width specification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnWidth {
    Fixed(Pt),
    /// A unit factor; the proportional unit is what remains of the table
    /// width after fixed columns, divided by the sum of all factors.
    Proportional(f64),
}

/// Non-inherited characteristics of a table column declaration.
#[derive(Debug, Clone)]
pub struct ColumnNic {
    pub index: usize,
    pub width: Option<ColumnWidth>,
}

/// Non-inherited characteristics of a table cell.
#[derive(Debug, Clone)]
pub struct CellNic {
    /// Starting column. `None` continues after the previous cell in the row.
    pub column: Option<usize>,
    pub n_columns_spanned: usize,
    pub n_rows_spanned: usize,
}

impl Default for CellNic {
    fn default() -> Self {
        CellNic {
            column: None,
            n_columns_spanned: 1,
            n_rows_spanned: 1,
        }
    }
}

/// Non-inherited characteristics of an external graphic.
#[derive(Debug, Clone, Default)]
pub struct GraphicNic {
    /// `Some` for a display graphic, `None` for an inline one.
    pub display: Option<DisplayNic>,
    /// Location of the graphic data: a `file:` URL or a native path.
    pub location: Option<String>,
    pub width: Option<Pt>,
    pub height: Option<Pt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrientation {
    Horizontal,
    Vertical,
}

/// Non-inherited characteristics of a rule.
#[derive(Debug, Clone)]
pub struct RuleNic {
    /// `Some` for a display rule, `None` for an inline one.
    pub display: Option<DisplayNic>,
    pub orientation: RuleOrientation,
    /// Rule length. `None` fills the inherited display size.
    pub length: Option<Pt>,
}

impl Default for RuleNic {
    fn default() -> Self {
        RuleNic {
            display: None,
            orientation: RuleOrientation::Horizontal,
            length: None,
        }
    }
}

/// Non-inherited characteristics of a hyperlink.
#[derive(Debug, Clone)]
pub struct LinkNic {
    pub target: NodeRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HfRegion {
    Header,
    Footer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HfPosition {
    Left,
    Center,
    Right,
}

/// One of the six header/footer sub-regions of a simple page sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HfPart {
    pub region: HfRegion,
    pub position: HfPosition,
}

/// An inherited characteristic setting.
///
/// Each variant mutates only the *next* formatting context (the one the
/// following flow object will capture), never the stack itself.
#[derive(Debug, Clone)]
pub enum Characteristic {
    // Character properties
    FontFamily(String),
    FontSize(Pt),
    FontWeight(FontWeight),
    FontPosture(FontPosture),
    Color(Color),
    Language(Option<String>),
    Country(Option<String>),
    Hyphenate(bool),

    // Paragraph properties
    StartIndent(Pt),
    EndIndent(Pt),
    FirstLineStartIndent(Pt),
    Quadding(Quadding),
    LineSpacing(Pt),
    DisplaySize(Pt),

    // Line descriptor used by rules and scores
    LineThickness(Pt),
    LineRepeat(u32),
    LineSep(Pt),

    // Cell-level borders
    CellBeforeRowBorder(BorderSpec),
    CellAfterRowBorder(BorderSpec),
    CellBeforeColumnBorder(BorderSpec),
    CellAfterColumnBorder(BorderSpec),

    // Table-level borders
    TableBorder(BorderSpec),
    TableBeforeRowBorder(BorderSpec),
    TableAfterRowBorder(BorderSpec),
    TableBeforeColumnBorder(BorderSpec),
    TableAfterColumnBorder(BorderSpec),

    // Table-cell margins
    CellBeforeRowMargin(Pt),
    CellAfterRowMargin(Pt),
    CellBeforeColumnMargin(Pt),
    CellAfterColumnMargin(Pt),

    // Page geometry
    PageWidth(Pt),
    PageHeight(Pt),
    LeftMargin(Pt),
    RightMargin(Pt),
    TopMargin(Pt),
    BottomMargin(Pt),
    HeaderMargin(Pt),
    FooterMargin(Pt),
}

/// One flow-object protocol operation.
#[derive(Debug, Clone)]
pub enum Event {
    /// Push a copy of the accumulated *next* context (compound object entry).
    Start,
    /// Pop the context stack (compound object exit).
    End,
    /// Reset the *next* context to the current top without pushing.
    Atomic,

    StartNode { node: NodeRef, mode: Option<String> },
    EndNode,

    Characters(String),
    /// Raw text passed through to the output unescaped.
    FormattingInstruction(String),
    Characteristic(Characteristic),

    StartParagraph(DisplayNic),
    EndParagraph,
    StartDisplayGroup(DisplayNic),
    EndDisplayGroup,
    StartScroll,
    EndScroll,

    StartLink(LinkNic),
    EndLink,
    StartLeader,
    EndLeader,
    StartScore(ScoreKind),
    EndScore(ScoreKind),

    StartTable(TableNic),
    EndTable,
    TableColumn(ColumnNic),
    StartTablePart(DisplayNic),
    EndTablePart,
    StartTableHeader,
    EndTableHeader,
    StartTableFooter,
    EndTableFooter,
    StartTableRow,
    EndTableRow,
    StartTableCell(CellNic),
    EndTableCell,

    StartSimplePageSequence,
    EndSimplePageSequence,
    StartHeaderFooter(HfPart),
    EndHeaderFooter(HfPart),

    ExternalGraphic(GraphicNic),
    Rule(RuleNic),
    PageNumber,
    CurrentNodePageNumber(NodeRef),
}
