//! The inherited-characteristic context stack.
//!
//! Inherited characteristics propagate down the flow-object nesting unless
//! overridden. The stack holds one [`FormatContext`] snapshot per open
//! compound flow object, with strict value semantics: entering a compound
//! object pushes a copy, exiting restores the parent's copy. Setters only
//! ever touch the *next* context — the snapshot the following flow object
//! will capture — so a setting issued between two siblings affects exactly
//! one of them.

use crate::error::{Error, Result};
use crate::fot::event::{
    BorderSpec, Characteristic, Color, FontPosture, FontWeight, Quadding,
};
use crate::length::Pt;

/// Inherited character properties.
#[derive(Debug, Clone, PartialEq)]
pub struct CharProps {
    pub font_family: String,
    pub font_size: Pt,
    pub font_weight: FontWeight,
    pub font_posture: FontPosture,
    pub color: Color,
    pub language: Option<String>,
    pub country: Option<String>,
    pub hyphenate: bool,
    // Score state toggled by start/endScore
    pub underline: bool,
    pub overline: bool,
    pub strike: bool,
}

impl Default for CharProps {
    fn default() -> Self {
        CharProps {
            font_family: "Times".to_string(),
            font_size: Pt(10.0),
            font_weight: FontWeight::Medium,
            font_posture: FontPosture::Upright,
            color: Color::BLACK,
            language: None,
            country: None,
            hyphenate: true,
            underline: false,
            overline: false,
            strike: false,
        }
    }
}

/// Margins between a table cell's edges and its content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMargins {
    pub before_row: Pt,
    pub after_row: Pt,
    pub before_column: Pt,
    pub after_column: Pt,
}

impl Default for CellMargins {
    fn default() -> Self {
        CellMargins {
            before_row: Pt(2.0),
            after_row: Pt(2.0),
            before_column: Pt(2.0),
            after_column: Pt(2.0),
        }
    }
}

/// Inherited paragraph and table properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ParaProps {
    pub start_indent: Pt,
    pub end_indent: Pt,
    pub first_line_start_indent: Pt,
    pub quadding: Quadding,
    pub line_spacing: Pt,
    /// Width available to display flow objects at this nesting level.
    pub display_size: Pt,

    // Line descriptor consulted by rules and scores
    pub line_thickness: Pt,
    pub line_repeat: u32,
    pub line_sep: Pt,

    pub cell_before_row_border: BorderSpec,
    pub cell_after_row_border: BorderSpec,
    pub cell_before_column_border: BorderSpec,
    pub cell_after_column_border: BorderSpec,

    pub table_before_row_border: BorderSpec,
    pub table_after_row_border: BorderSpec,
    pub table_before_column_border: BorderSpec,
    pub table_after_column_border: BorderSpec,

    pub cell_margins: CellMargins,
}

impl Default for ParaProps {
    fn default() -> Self {
        ParaProps {
            start_indent: Pt::ZERO,
            end_indent: Pt::ZERO,
            first_line_start_indent: Pt::ZERO,
            quadding: Quadding::Start,
            line_spacing: Pt(12.0),
            display_size: Pt::inches(6.5),
            line_thickness: Pt(1.0),
            line_repeat: 1,
            line_sep: Pt::ZERO,
            cell_before_row_border: BorderSpec::default(),
            cell_after_row_border: BorderSpec::default(),
            cell_before_column_border: BorderSpec::default(),
            cell_after_column_border: BorderSpec::default(),
            table_before_row_border: BorderSpec::default(),
            table_after_row_border: BorderSpec::default(),
            table_before_column_border: BorderSpec::default(),
            table_after_column_border: BorderSpec::default(),
            cell_margins: CellMargins::default(),
        }
    }
}

/// Inherited page geometry, captured when a page sequence starts.
#[derive(Debug, Clone, PartialEq)]
pub struct PageProps {
    pub page_width: Pt,
    pub page_height: Pt,
    pub left_margin: Pt,
    pub right_margin: Pt,
    pub top_margin: Pt,
    pub bottom_margin: Pt,
    pub header_margin: Pt,
    pub footer_margin: Pt,
}

impl Default for PageProps {
    fn default() -> Self {
        PageProps {
            page_width: Pt::inches(8.5),
            page_height: Pt::inches(11.0),
            left_margin: Pt::inches(1.0),
            right_margin: Pt::inches(1.0),
            top_margin: Pt::inches(1.0),
            bottom_margin: Pt::inches(1.0),
            header_margin: Pt::inches(0.375),
            footer_margin: Pt::inches(0.375),
        }
    }
}

/// One snapshot of every inherited characteristic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormatContext {
    pub char: CharProps,
    pub para: ParaProps,
    pub page: PageProps,
}

impl FormatContext {
    /// Apply one characteristic setting in place.
    pub fn apply(&mut self, c: &Characteristic) {
        use Characteristic::*;
        match c {
            FontFamily(v) => self.char.font_family = v.clone(),
            FontSize(v) => self.char.font_size = *v,
            FontWeight(v) => self.char.font_weight = *v,
            FontPosture(v) => self.char.font_posture = *v,
            Color(v) => self.char.color = *v,
            Language(v) => self.char.language = v.clone(),
            Country(v) => self.char.country = v.clone(),
            Hyphenate(v) => self.char.hyphenate = *v,

            StartIndent(v) => self.para.start_indent = *v,
            EndIndent(v) => self.para.end_indent = *v,
            FirstLineStartIndent(v) => self.para.first_line_start_indent = *v,
            Quadding(v) => self.para.quadding = *v,
            LineSpacing(v) => self.para.line_spacing = *v,
            DisplaySize(v) => self.para.display_size = *v,

            LineThickness(v) => self.para.line_thickness = *v,
            LineRepeat(v) => self.para.line_repeat = *v,
            LineSep(v) => self.para.line_sep = *v,

            CellBeforeRowBorder(v) => self.para.cell_before_row_border = *v,
            CellAfterRowBorder(v) => self.para.cell_after_row_border = *v,
            CellBeforeColumnBorder(v) => self.para.cell_before_column_border = *v,
            CellAfterColumnBorder(v) => self.para.cell_after_column_border = *v,

            TableBorder(v) => {
                self.para.table_before_row_border = *v;
                self.para.table_after_row_border = *v;
                self.para.table_before_column_border = *v;
                self.para.table_after_column_border = *v;
            }
            TableBeforeRowBorder(v) => self.para.table_before_row_border = *v,
            TableAfterRowBorder(v) => self.para.table_after_row_border = *v,
            TableBeforeColumnBorder(v) => self.para.table_before_column_border = *v,
            TableAfterColumnBorder(v) => self.para.table_after_column_border = *v,

            CellBeforeRowMargin(v) => self.para.cell_margins.before_row = *v,
            CellAfterRowMargin(v) => self.para.cell_margins.after_row = *v,
            CellBeforeColumnMargin(v) => self.para.cell_margins.before_column = *v,
            CellAfterColumnMargin(v) => self.para.cell_margins.after_column = *v,

            PageWidth(v) => self.page.page_width = *v,
            PageHeight(v) => self.page.page_height = *v,
            LeftMargin(v) => self.page.left_margin = *v,
            RightMargin(v) => self.page.right_margin = *v,
            TopMargin(v) => self.page.top_margin = *v,
            BottomMargin(v) => self.page.bottom_margin = *v,
            HeaderMargin(v) => self.page.header_margin = *v,
            FooterMargin(v) => self.page.footer_margin = *v,
        }
    }
}

/// The context stack: one entry per open compound flow object, plus the
/// pending *next* context that setters accumulate into.
///
/// The stack is constructed with a single default entry and is never empty
/// afterwards; popping the base entry is a protocol violation.
#[derive(Debug, Clone)]
pub struct ContextStack {
    stack: Vec<FormatContext>,
    next: FormatContext,
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStack {
    pub fn new() -> ContextStack {
        ContextStack {
            stack: vec![FormatContext::default()],
            next: FormatContext::default(),
        }
    }

    /// The context of the innermost open compound flow object.
    pub fn current(&self) -> &FormatContext {
        // Invariant: the stack is never empty (end() refuses to pop the base).
        self.stack.last().expect("context stack is never empty")
    }

    /// The context the next flow object will capture.
    pub fn next(&self) -> &FormatContext {
        &self.next
    }

    /// Apply a characteristic setting to the *next* context only.
    pub fn set(&mut self, c: &Characteristic) {
        self.next.apply(c);
    }

    /// Enter a compound flow object: push a copy of the *next* context.
    pub fn start(&mut self) {
        self.stack.push(self.next.clone());
    }

    /// Exit a compound flow object: pop, and restore *next* from the parent.
    pub fn end(&mut self) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(Error::protocol(
                "end of compound flow object with no matching start",
            ));
        }
        self.stack.pop();
        self.next = self.current().clone();
        Ok(())
    }

    /// Reset the *next* context to the current top without pushing, after
    /// an atomic flow object has consumed its settings.
    pub fn atomic(&mut self) {
        self.next = self.current().clone();
    }

    /// Mutate the innermost open context in place. Used for state that is
    /// part of a compound flow object itself rather than a characteristic
    /// setting, such as score flags and cell display sizes.
    pub(crate) fn current_mut(&mut self) -> &mut FormatContext {
        self.stack.last_mut().expect("context stack is never empty")
    }

    pub(crate) fn next_mut(&mut self) -> &mut FormatContext {
        &mut self.next
    }

    /// Nesting depth, counting the base entry.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_depth_balances() {
        let mut stack = ContextStack::new();
        let depth = stack.depth();
        stack.start();
        stack.start();
        stack.end().unwrap();
        stack.end().unwrap();
        assert_eq!(stack.depth(), depth);
    }

    #[test]
    fn test_setting_does_not_leak_to_parent() {
        let mut stack = ContextStack::new();
        stack.set(&Characteristic::FontSize(Pt(14.0)));
        stack.start();
        assert_eq!(stack.current().char.font_size, Pt(14.0));

        stack.set(&Characteristic::FontSize(Pt(8.0)));
        stack.start();
        assert_eq!(stack.current().char.font_size, Pt(8.0));
        stack.end().unwrap();

        // After end, next is restored from the parent copy.
        assert_eq!(stack.next().char.font_size, Pt(14.0));
        stack.end().unwrap();
        assert_eq!(stack.next().char.font_size, Pt(10.0));
    }

    #[test]
    fn test_atomic_resets_next_for_sibling() {
        let mut stack = ContextStack::new();
        stack.start();
        stack.set(&Characteristic::FontWeight(FontWeight::Bold));
        assert_eq!(stack.next().char.font_weight, FontWeight::Bold);
        // The atomic object consumed the setting; the next sibling must not.
        stack.atomic();
        assert_eq!(stack.next().char.font_weight, FontWeight::Medium);
    }

    #[test]
    fn test_unbalanced_end_is_protocol_error() {
        let mut stack = ContextStack::new();
        assert!(stack.end().is_err());
        stack.start();
        assert!(stack.end().is_ok());
        assert!(stack.end().is_err());
    }

    #[test]
    fn test_table_border_sets_all_four_edges() {
        let mut stack = ContextStack::new();
        let spec = BorderSpec {
            present: true,
            thickness: Pt(2.0),
            ..BorderSpec::default()
        };
        stack.set(&Characteristic::TableBorder(spec));
        assert!(stack.next().para.table_before_row_border.present);
        assert!(stack.next().para.table_after_row_border.present);
        assert!(stack.next().para.table_before_column_border.present);
        assert!(stack.next().para.table_after_column_border.present);
    }
}
