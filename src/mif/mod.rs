//! The document-assembly backend.
//!
//! [`MifBuilder`] consumes the flow-object event stream and assembles
//! page-layout interchange book components: inherited characteristics go
//! through the context stack, display spacing through the combiner,
//! paragraph and cell content into buffered tag streams, unresolvable
//! values into cross-reference placeholders, and everything is committed
//! to files by [`MifBuilder::finish`].

pub mod book;
pub mod border;
pub mod catalog;
pub mod escape;
pub mod stream;
pub mod table;
pub mod xref;

use std::path::PathBuf;

use log::warn;

use crate::error::{Error, Result};
use crate::fot::context::{CharProps, ContextStack, FormatContext};
use crate::fot::event::{
    CellNic, DisplayNic, Event, GraphicNic, HfPart, LinkNic, NodeRef, RuleNic, RuleOrientation,
    ScoreKind, TableNic,
};
use crate::fot::space::{BreakKind, SpaceCombiner};
use crate::length::Pt;
use crate::mif::book::{Assembler, Frame};
use crate::mif::catalog::{ParaFormat, Placement, posture_name, weight_name};
use crate::mif::escape::{escape_string, special_char_token, to_di_path};
use crate::mif::stream::{StreamKind, TagStream};
use crate::mif::table::{Cell, RowGroup, Table, TablePart};
use crate::mif::xref::{CrossRefInfo, CrossRefTable, ElementKey, ElementRegistry, RefKind};

/// Backend configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuilderOptions {
    /// Output path; numbered variants and the manifest derive from it
    /// when more than one book component is produced.
    pub output: PathBuf,
    /// Column at which long cross-reference substitutions wrap.
    pub wrap_column: usize,
}

impl BuilderOptions {
    pub fn new(output: impl Into<PathBuf>) -> BuilderOptions {
        BuilderOptions {
            output: output.into(),
            wrap_column: 78,
        }
    }
}

impl Default for BuilderOptions {
    fn default() -> Self {
        BuilderOptions::new("book.mif")
    }
}

/// One logical paragraph. `phys` is the physical paragraph currently
/// receiving content; it is `None` while the paragraph is interrupted by
/// a display object and gets reopened by the next inline content.
#[derive(Debug)]
struct ParaSlot {
    format: ParaFormat,
    phys: Option<TagStream>,
    reopened: bool,
}

/// A table under construction.
#[derive(Debug)]
struct TableBuild {
    table: Table,
    group: RowGroup,
    nic: TableNic,
    open_cell: Option<Cell>,
}

/// The flow-object-tree rendering backend.
///
/// Strictly single-threaded and push-driven: the evaluator calls
/// [`handle`](MifBuilder::handle) once per event, in document order, and
/// [`finish`](MifBuilder::finish) once at the end. Protocol violations
/// (unbalanced brackets, unresolvable placeholders) surface as
/// [`Error::Protocol`] and end the run.
#[derive(Debug)]
pub struct MifBuilder {
    options: BuilderOptions,
    contexts: ContextStack,
    spaces: SpaceCombiner,
    refs: CrossRefTable,
    elements: ElementRegistry,
    assembler: Assembler,
    /// Cell and header/footer streams, innermost last.
    streams: Vec<TagStream>,
    /// Logical paragraph nesting, innermost last.
    paras: Vec<ParaSlot>,
    /// Open display groups, for their space-after requests.
    groups: Vec<DisplayNic>,
    tables: Vec<TableBuild>,
    node_depth: usize,
    link_depth: usize,
    score_depth: usize,
    next_table_id: usize,
    /// Character properties last emitted as an inline font statement.
    last_font: Option<CharProps>,
}

impl MifBuilder {
    pub fn new(options: BuilderOptions) -> MifBuilder {
        MifBuilder {
            options,
            contexts: ContextStack::new(),
            spaces: SpaceCombiner::new(),
            refs: CrossRefTable::new(),
            elements: ElementRegistry::new(),
            assembler: Assembler::new(),
            streams: Vec::new(),
            paras: Vec::new(),
            groups: Vec::new(),
            tables: Vec::new(),
            node_depth: 0,
            link_depth: 0,
            score_depth: 0,
            next_table_id: 1,
            last_font: None,
        }
    }

    /// Process one protocol event.
    pub fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Start => {
                self.contexts.start();
                Ok(())
            }
            Event::End => self.contexts.end(),
            Event::Atomic => {
                self.contexts.atomic();
                Ok(())
            }

            Event::StartNode { node, .. } => self.start_node(node),
            Event::EndNode => self.end_node(),

            Event::Characters(text) => self.characters(&text),
            Event::FormattingInstruction(text) => {
                self.sink().write(&text);
                Ok(())
            }
            Event::Characteristic(c) => {
                self.contexts.set(&c);
                Ok(())
            }

            Event::StartParagraph(nic) => self.start_paragraph(nic),
            Event::EndParagraph => self.end_paragraph(),
            Event::StartDisplayGroup(nic) => self.start_display_group(nic),
            Event::EndDisplayGroup => self.end_display_group(),
            Event::StartScroll => {
                self.assembler.current_index();
                Ok(())
            }
            Event::EndScroll => Ok(()),

            Event::StartLink(nic) => self.start_link(nic),
            Event::EndLink => self.end_link(),
            Event::StartLeader => {
                self.reopen_if_needed();
                self.sink().write("  <Char Tab>\n");
                Ok(())
            }
            Event::EndLeader => Ok(()),
            Event::StartScore(kind) => {
                self.set_score(kind, true);
                self.score_depth += 1;
                Ok(())
            }
            Event::EndScore(kind) => {
                if self.score_depth == 0 {
                    return Err(Error::protocol("end of score with no open score"));
                }
                self.score_depth -= 1;
                self.set_score(kind, false);
                Ok(())
            }

            Event::StartTable(nic) => self.start_table(nic),
            Event::EndTable => self.end_table(),
            Event::TableColumn(nic) => {
                let table = self.table_mut()?;
                table.table.declare_column(nic.index, nic.width);
                Ok(())
            }
            Event::StartTablePart(nic) => self.start_table_part(nic),
            Event::EndTablePart => self.end_table_part(),
            Event::StartTableHeader => self.set_row_group(RowGroup::Header),
            Event::EndTableHeader => self.set_row_group(RowGroup::Body),
            Event::StartTableFooter => self.set_row_group(RowGroup::Footer),
            Event::EndTableFooter => self.set_row_group(RowGroup::Body),
            Event::StartTableRow => self.start_table_row(),
            Event::EndTableRow => Ok(()),
            Event::StartTableCell(nic) => self.start_table_cell(nic),
            Event::EndTableCell => self.end_table_cell(),

            Event::StartSimplePageSequence => {
                let page = self.contexts.current().page.clone();
                self.assembler.enter_page_sequence(page);
                Ok(())
            }
            Event::EndSimplePageSequence => Ok(()),
            Event::StartHeaderFooter(_) => {
                self.streams.push(TagStream::new(StreamKind::HeaderFooter));
                Ok(())
            }
            Event::EndHeaderFooter(part) => self.end_header_footer(part),

            Event::ExternalGraphic(nic) => self.external_graphic(nic),
            Event::Rule(nic) => self.rule(nic),
            Event::PageNumber => {
                self.reopen_if_needed();
                self.sink()
                    .write("  <Variable <VariableName `Current Page #'>>\n");
                Ok(())
            }
            Event::CurrentNodePageNumber(node) => self.current_node_page_number(node),
        }
    }

    /// Assemble every book component, resolve all buffered streams, and
    /// write the output files (plus a manifest when more than one
    /// component exists). Returns the paths written.
    pub fn finish(self) -> Result<Vec<PathBuf>> {
        if !self.paras.is_empty()
            || !self.tables.is_empty()
            || !self.streams.is_empty()
            || !self.groups.is_empty()
            || self.link_depth != 0
            || self.node_depth != 0
            || self.contexts.depth() != 1
        {
            return Err(Error::protocol(
                "document ended with unbalanced flow objects",
            ));
        }
        let MifBuilder {
            options,
            refs,
            elements,
            mut assembler,
            ..
        } = self;
        // An empty document still produces one (empty) component.
        assembler.current_index();
        assembler.finish(&options.output, &refs, &elements, options.wrap_column)
    }

    /// Number of book components so far.
    pub fn component_count(&self) -> usize {
        self.assembler.len()
    }

    /// Render one component to a string without touching the filesystem.
    /// Intended for inspection and tests; `finish` is the normal commit.
    pub fn render_component(&mut self, index: usize) -> Result<String> {
        self.assembler.current_index();
        self.assembler.render_component(
            index,
            &self.options.output,
            &self.refs,
            &self.elements,
            self.options.wrap_column,
        )
    }

    // ------------------------------------------------------------------
    // Output plumbing
    // ------------------------------------------------------------------

    /// The stream currently receiving output: the open physical
    /// paragraph, else the innermost cell/header stream, else the current
    /// component's main text flow.
    fn sink(&mut self) -> &mut TagStream {
        let in_para = self.paras.last().is_some_and(|slot| slot.phys.is_some());
        if in_para {
            return self
                .paras
                .last_mut()
                .and_then(|slot| slot.phys.as_mut())
                .expect("open physical paragraph");
        }
        if !self.streams.is_empty() {
            return self.streams.last_mut().expect("stream stack not empty");
        }
        &mut self.assembler.current().flow
    }

    fn placement_of(brk: Option<BreakKind>) -> Placement {
        match brk {
            None => Placement::Anywhere,
            Some(BreakKind::Page) => Placement::PageTop,
            Some(BreakKind::Column) => Placement::ColumnTop,
        }
    }

    /// Paragraph format captured from a context snapshot; spacing and
    /// placement are folded in by the caller.
    fn para_format(&mut self, ctx: &FormatContext, nic: &DisplayNic) -> ParaFormat {
        let color = self.assembler.current().colors.register(ctx.char.color);
        ParaFormat {
            quadding: ctx.para.quadding,
            start_indent: ctx.para.start_indent,
            end_indent: ctx.para.end_indent,
            first_line_start_indent: ctx.para.first_line_start_indent,
            line_spacing: ctx.para.line_spacing,
            space_before: Pt::ZERO,
            placement: Placement::Anywhere,
            keep_with_previous: nic.keep_with_previous,
            keep_with_next: nic.keep_with_next,
            hyphenate: ctx.char.hyphenate,
            language: ctx.char.language.clone(),
            font_family: ctx.char.font_family.clone(),
            font_size: ctx.char.font_size,
            font_weight: ctx.char.font_weight,
            font_posture: ctx.char.font_posture,
            color,
        }
    }

    // ------------------------------------------------------------------
    // Paragraphs and the reopening machine
    // ------------------------------------------------------------------

    fn start_paragraph(&mut self, nic: DisplayNic) -> Result<()> {
        // A paragraph starting inside another one interrupts the outer
        // physical paragraph.
        self.close_physical(true);
        if let Some(displaced) = self.spaces.request(&nic.space_before, nic.break_before) {
            self.emit_empty_para(displaced);
        }

        let ctx = self.contexts.current().clone();
        let mut format = self.para_format(&ctx, &nic);
        let (space, brk) = self.spaces.take();
        if let Some(space) = space {
            format.space_before = space.nominal;
        }
        format.placement = Self::placement_of(brk);

        self.paras.push(ParaSlot {
            format,
            phys: Some(TagStream::new(StreamKind::Paragraph)),
            reopened: false,
        });
        self.last_font = Some(ctx.char);
        Ok(())
    }

    fn end_paragraph(&mut self) -> Result<()> {
        self.close_physical(false);
        self.paras
            .pop()
            .ok_or_else(|| Error::protocol("end of paragraph with no open paragraph"))?;
        Ok(())
    }

    /// Close the open physical paragraph, if any, committing its content
    /// to the enclosing stream. An interruption glues the committed
    /// paragraph to whatever display object interrupted it.
    fn close_physical(&mut self, interrupted: bool) {
        let Some(slot) = self.paras.last_mut() else {
            return;
        };
        let Some(content) = slot.phys.take() else {
            return;
        };
        let mut format = slot.format.clone();
        if slot.reopened {
            format.space_before = Pt::ZERO;
            format.placement = Placement::Anywhere;
            format.keep_with_previous = false;
            format.keep_with_next = false;
        } else if interrupted {
            format.keep_with_next = true;
        }
        self.last_font = None;
        let name = self.assembler.current().formats.register(&format);
        let sink = self.sink();
        sink.write(&format!("<Para\n <PgfTag `{name}'>\n <ParaLine\n"));
        sink.append(content);
        sink.write(" >\n>\n");
    }

    /// Reopen a physical paragraph for the interrupted logical one. The
    /// reopened paragraph inherits alignment and indents through the
    /// saved format; spacing and keeps are stripped at close.
    fn reopen_if_needed(&mut self) {
        let needs = self.paras.last().is_some_and(|slot| slot.phys.is_none());
        if needs {
            let ctx_font = self.contexts.next().char.clone();
            let slot = self.paras.last_mut().expect("paragraph slot checked");
            slot.reopened = true;
            slot.phys = Some(TagStream::new(StreamKind::Paragraph));
            self.last_font = Some(ctx_font);
        }
    }

    fn emit_empty_para(&mut self, brk: BreakKind) {
        let ctx = self.contexts.current().clone();
        let mut format = self.para_format(&ctx, &DisplayNic::default());
        format.placement = Self::placement_of(Some(brk));
        let name = self.assembler.current().formats.register(&format);
        self.sink()
            .write(&format!("<Para\n <PgfTag `{name}'>\n <ParaLine >\n>\n"));
    }

    /// An anchor paragraph carrying a frame or table reference; it absorbs
    /// the queued display spacing like any paragraph boundary.
    fn emit_anchor_para(&mut self, content: &str) {
        let ctx = self.contexts.next().clone();
        let mut format = self.para_format(&ctx, &DisplayNic::default());
        let (space, brk) = self.spaces.take();
        if let Some(space) = space {
            format.space_before = space.nominal;
        }
        format.placement = Self::placement_of(brk);
        let name = self.assembler.current().formats.register(&format);
        self.sink().write(&format!(
            "<Para\n <PgfTag `{name}'>\n <ParaLine\n{content} >\n>\n"
        ));
    }

    // ------------------------------------------------------------------
    // Inline content
    // ------------------------------------------------------------------

    fn characters(&mut self, text: &str) -> Result<()> {
        self.reopen_if_needed();

        // Emit an inline font override when the character context has
        // drifted from what the paragraph is currently set to.
        let in_para = self.paras.last().is_some_and(|slot| slot.phys.is_some());
        if in_para {
            let props = self.contexts.next().char.clone();
            if self.last_font.as_ref() != Some(&props) {
                let statement = self.font_statement(&props);
                self.sink().write(&statement);
                self.last_font = Some(props);
            }
        }

        let mut run = String::new();
        for c in text.chars() {
            if let Some(token) = special_char_token(c) {
                self.flush_run(&mut run);
                self.sink().write("  ");
                self.sink().write(token);
                self.sink().write("\n");
            } else {
                run.push(c);
            }
        }
        self.flush_run(&mut run);
        Ok(())
    }

    fn flush_run(&mut self, run: &mut String) {
        if run.is_empty() {
            return;
        }
        let escaped = escape_string(run).into_owned();
        self.sink().write(&format!("  <String `{escaped}'>\n"));
        run.clear();
    }

    fn font_statement(&mut self, props: &CharProps) -> String {
        let color = self.assembler.current().colors.register(props.color);
        let mut s = format!(
            "  <Font <FFamily `{}'> <FSize {}> <FWeight `{}'> <FAngle `{}'> <FColor `{color}'>",
            escape_string(&props.font_family),
            props.font_size,
            weight_name(props.font_weight),
            posture_name(props.font_posture),
        );
        if props.underline {
            s.push_str(" <FUnderlining FSingle>");
        }
        if props.overline {
            s.push_str(" <FOverline Yes>");
        }
        if props.strike {
            s.push_str(" <FStrike Yes>");
        }
        s.push_str(">\n");
        s
    }

    fn set_score(&mut self, kind: ScoreKind, on: bool) {
        fn apply(ctx: &mut FormatContext, kind: ScoreKind, on: bool) {
            match kind {
                ScoreKind::Before => ctx.char.overline = on,
                ScoreKind::Through => ctx.char.strike = on,
                ScoreKind::After => ctx.char.underline = on,
            }
        }
        apply(self.contexts.current_mut(), kind, on);
        apply(self.contexts.next_mut(), kind, on);
    }

    // ------------------------------------------------------------------
    // Display groups
    // ------------------------------------------------------------------

    fn start_display_group(&mut self, nic: DisplayNic) -> Result<()> {
        self.close_physical(true);
        if let Some(displaced) = self.spaces.request(&nic.space_before, nic.break_before) {
            self.emit_empty_para(displaced);
        }
        self.groups.push(nic);
        Ok(())
    }

    fn end_display_group(&mut self) -> Result<()> {
        let nic = self
            .groups
            .pop()
            .ok_or_else(|| Error::protocol("end of display group with no open group"))?;
        if let Some(displaced) = self.spaces.request(&nic.space_after, nic.break_after) {
            self.emit_empty_para(displaced);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Nodes, links, cross-references
    // ------------------------------------------------------------------

    fn start_node(&mut self, node: NodeRef) -> Result<()> {
        let key = ElementKey::from_node(&node);
        let component = self.assembler.current_index();
        self.elements.set_component(&key, component)?;
        // A potential destination marker: it resolves to marker text only
        // if something ends up referencing this node.
        let column = self.sink().column();
        let index = self.refs.add(CrossRefInfo {
            key,
            kind: RefKind::PotentialMarker,
            column,
        });
        self.sink().write_ref(index);
        self.node_depth += 1;
        Ok(())
    }

    fn end_node(&mut self) -> Result<()> {
        if self.node_depth == 0 {
            return Err(Error::protocol("end of node with no open node"));
        }
        self.node_depth -= 1;
        Ok(())
    }

    fn start_link(&mut self, nic: LinkNic) -> Result<()> {
        self.reopen_if_needed();
        let key = ElementKey::from_node(&nic.target);
        self.elements.note_reference(&key, RefKind::HypertextLink);
        let column = self.sink().column();
        let index = self.refs.add(CrossRefInfo {
            key,
            kind: RefKind::HypertextLink,
            column,
        });
        self.sink().write_ref(index);
        self.link_depth += 1;
        Ok(())
    }

    fn end_link(&mut self) -> Result<()> {
        if self.link_depth == 0 {
            return Err(Error::protocol("end of link with no open link"));
        }
        self.link_depth -= 1;
        Ok(())
    }

    fn current_node_page_number(&mut self, node: NodeRef) -> Result<()> {
        self.reopen_if_needed();
        let key = ElementKey::from_node(&node);
        self.elements.note_reference(&key, RefKind::XRef);
        let column = self.sink().column();
        let index = self.refs.add(CrossRefInfo {
            key,
            kind: RefKind::XRef,
            column,
        });
        self.sink().write_ref(index);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    fn table_mut(&mut self) -> Result<&mut TableBuild> {
        self.tables
            .last_mut()
            .ok_or_else(|| Error::protocol("table operation with no open table"))
    }

    fn start_table(&mut self, nic: TableNic) -> Result<()> {
        self.close_physical(true);
        if let Some(displaced) = self
            .spaces
            .request(&nic.display.space_before, nic.display.break_before)
        {
            self.emit_empty_para(displaced);
        }
        let id = self.next_table_id;
        self.next_table_id += 1;
        self.emit_anchor_para(&format!("  <ATbl {id}>\n"));
        let ctx = self.contexts.current().clone();
        self.tables.push(TableBuild {
            table: Table::new(id, nic.width, &ctx),
            group: RowGroup::Body,
            nic,
            open_cell: None,
        });
        Ok(())
    }

    fn end_table(&mut self) -> Result<()> {
        let mut build = self
            .tables
            .pop()
            .ok_or_else(|| Error::protocol("end of table with no open table"))?;
        let component = self.assembler.current();
        build.table.finalize(
            &mut component.colors,
            &mut component.rulings,
            &mut component.table_formats,
        );
        component.tables.push(build.table);
        if let Some(displaced) = self
            .spaces
            .request(&build.nic.display.space_after, build.nic.display.break_after)
        {
            self.emit_empty_para(displaced);
        }
        Ok(())
    }

    fn start_table_part(&mut self, nic: DisplayNic) -> Result<()> {
        let _ = self.spaces.request(&nic.space_before, nic.break_before);
        let build = self.table_mut()?;
        build.table.parts.push(TablePart::new());
        build.group = RowGroup::Body;
        Ok(())
    }

    fn end_table_part(&mut self) -> Result<()> {
        let build = self.table_mut()?;
        build.group = RowGroup::Body;
        Ok(())
    }

    fn set_row_group(&mut self, group: RowGroup) -> Result<()> {
        let build = self.table_mut()?;
        build.group = group;
        Ok(())
    }

    fn start_table_row(&mut self) -> Result<()> {
        let build = self.table_mut()?;
        if build.table.parts.is_empty() {
            build.table.parts.push(TablePart::new());
        }
        let group = build.group;
        build
            .table
            .parts
            .last_mut()
            .expect("table part just ensured")
            .push_row(group);
        Ok(())
    }

    fn start_table_cell(&mut self, nic: CellNic) -> Result<()> {
        let ctx = self.contexts.current().clone();
        let build = self.table_mut()?;
        if build.open_cell.is_some() {
            return Err(Error::protocol("table cell started inside another cell"));
        }
        let part = build
            .table
            .parts
            .last()
            .ok_or_else(|| Error::protocol("table cell outside any table part"))?;
        let row = part
            .rows
            .last()
            .ok_or_else(|| Error::protocol("table cell outside any row"))?;
        let next_free = row
            .cells
            .iter()
            .map(|&id| {
                let cell = &part.cells[id];
                cell.column + cell.cols
            })
            .max()
            .unwrap_or(0);
        let column = nic.column.unwrap_or(next_free);
        build
            .table
            .ensure_columns(column + nic.n_columns_spanned.max(1));
        let display_size = build
            .table
            .cell_display_size(column, nic.n_columns_spanned.max(1));
        build.open_cell = Some(Cell::new(column, &nic, &ctx, display_size));

        // Content nested in the cell lays out against the cell width.
        self.contexts.current_mut().para.display_size = display_size;
        self.contexts.next_mut().para.display_size = display_size;

        // Stale display spacing from the table machinery has no paragraph
        // boundary to land on inside the cell.
        let _ = self.spaces.take();

        self.streams.push(TagStream::new(StreamKind::Cell));
        Ok(())
    }

    fn end_table_cell(&mut self) -> Result<()> {
        self.close_physical(false);
        let stream = match self.streams.pop() {
            Some(stream) if stream.kind() == StreamKind::Cell => stream,
            _ => return Err(Error::protocol("end of cell with no open cell stream")),
        };
        let build = self.table_mut()?;
        let mut cell = build
            .open_cell
            .take()
            .ok_or_else(|| Error::protocol("end of cell with no open cell"))?;
        cell.content = stream;
        let part = build
            .table
            .parts
            .last_mut()
            .ok_or_else(|| Error::protocol("end of cell outside any table part"))?;
        part.add_cell(cell)
            .ok_or_else(|| Error::protocol("end of cell outside any row"))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Header/footer regions
    // ------------------------------------------------------------------

    fn end_header_footer(&mut self, part: HfPart) -> Result<()> {
        self.close_physical(false);
        let stream = match self.streams.pop() {
            Some(stream) if stream.kind() == StreamKind::HeaderFooter => stream,
            _ => {
                return Err(Error::protocol(
                    "end of header/footer with no open region stream",
                ));
            }
        };
        self.assembler.current().set_header_footer(part, stream);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Atomic display objects
    // ------------------------------------------------------------------

    fn external_graphic(&mut self, nic: GraphicNic) -> Result<()> {
        let Some(location) = nic.location.as_deref() else {
            warn!("external graphic with no location; omitted");
            return Ok(());
        };
        let Some(di) = to_di_path(location) else {
            warn!("cannot translate graphic location `{location}`; graphic omitted");
            return Ok(());
        };
        let width = nic.width.unwrap_or(Pt::inches(1.0));
        let height = nic.height.unwrap_or(Pt::inches(1.0));
        let markup = |id: usize| {
            format!(
                " <Frame\n  <ID {id}>\n  <FrameType Below>\n  <ShapeRect 0 0 {width} {height}>\n  <ImportObject <ImportObFileDI `{di}'> <ShapeRect 0 0 {width} {height}>>\n >\n"
            )
        };
        let component = self.assembler.current();
        let id = component.frames.len() + 1;
        component.frames.push(Frame {
            id,
            markup: markup(id),
        });
        self.anchor_frame(id, nic.display)
    }

    fn rule(&mut self, nic: RuleNic) -> Result<()> {
        let ctx = self.contexts.next().clone();
        let length = nic.length.unwrap_or(ctx.para.display_size);
        let thickness = ctx.para.line_thickness;
        let (w, h, x2, y2) = match nic.orientation {
            RuleOrientation::Horizontal => (length, thickness, length, Pt::ZERO),
            RuleOrientation::Vertical => (thickness, length, Pt::ZERO, length),
        };
        let component = self.assembler.current();
        let id = component.frames.len() + 1;
        component.frames.push(Frame {
            id,
            markup: format!(
                " <Frame\n  <ID {id}>\n  <FrameType Below>\n  <ShapeRect 0 0 {w} {h}>\n  <PolyLine <PenWidth {thickness}> <NumPoints 2> <Point 0 0> <Point {x2} {y2}>>\n >\n"
            ),
        });
        self.anchor_frame(id, nic.display)
    }

    /// Anchor a frame in the running text: display frames interrupt the
    /// open paragraph and get their own anchor paragraph, inline frames
    /// reopen it.
    fn anchor_frame(&mut self, id: usize, display: Option<DisplayNic>) -> Result<()> {
        match display {
            Some(nic) => {
                self.close_physical(true);
                if let Some(displaced) = self.spaces.request(&nic.space_before, nic.break_before) {
                    self.emit_empty_para(displaced);
                }
                self.emit_anchor_para(&format!("  <AFrame {id}>\n"));
                if let Some(displaced) = self.spaces.request(&nic.space_after, nic.break_after) {
                    self.emit_empty_para(displaced);
                }
            }
            None => {
                self.reopen_if_needed();
                self.sink().write(&format!("  <AFrame {id}>\n"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fot::space::DisplaySpace;

    fn builder() -> MifBuilder {
        MifBuilder::new(BuilderOptions::new("test.mif"))
    }

    fn para_events(text: &str) -> Vec<Event> {
        vec![
            Event::Start,
            Event::StartParagraph(DisplayNic::default()),
            Event::Characters(text.to_string()),
            Event::EndParagraph,
            Event::End,
        ]
    }

    fn drive(builder: &mut MifBuilder, events: Vec<Event>) {
        for event in events {
            builder.handle(event).unwrap();
        }
    }

    #[test]
    fn test_simple_paragraph_renders() {
        let mut b = builder();
        drive(&mut b, para_events("Hello, world"));
        let out = b.render_component(0).unwrap();
        assert!(out.contains("<Para"));
        assert!(out.contains("<String `Hello, world'>"));
        assert!(out.contains("<PgfCatalog"));
    }

    #[test]
    fn test_space_before_lands_on_paragraph_format() {
        let mut b = builder();
        let nic = DisplayNic {
            space_before: DisplaySpace::fixed(Pt(18.0)),
            ..DisplayNic::default()
        };
        drive(
            &mut b,
            vec![
                Event::Start,
                Event::StartParagraph(nic),
                Event::Characters("x".to_string()),
                Event::EndParagraph,
                Event::End,
            ],
        );
        let out = b.render_component(0).unwrap();
        assert!(out.contains("<PgfSpBefore 18>"));
    }

    #[test]
    fn test_paragraph_interrupted_by_graphic_reopens() {
        let mut b = builder();
        drive(
            &mut b,
            vec![
                Event::Start,
                Event::StartParagraph(DisplayNic::default()),
                Event::Characters("a".to_string()),
                Event::ExternalGraphic(GraphicNic {
                    display: Some(DisplayNic::default()),
                    location: Some("/pics/fig.tif".to_string()),
                    width: None,
                    height: None,
                }),
                Event::Atomic,
                Event::Characters("b".to_string()),
                Event::EndParagraph,
                Event::End,
            ],
        );
        let out = b.render_component(0).unwrap();
        // Three physical paragraphs: interrupted half, anchor, reopened half.
        assert_eq!(out.matches("<Para\n").count(), 3);
        assert!(out.contains("<String `a'>"));
        assert!(out.contains("<String `b'>"));
        assert!(out.contains("<AFrame 1>"));
        // Keep-with-next binds the interrupted half to the graphic; the
        // reopened half carries no keep.
        assert_eq!(out.matches("<PgfWithNext Yes>").count(), 1);
    }

    #[test]
    fn test_unbalanced_end_paragraph_is_protocol_error() {
        let mut b = builder();
        assert!(b.handle(Event::EndParagraph).is_err());
    }

    #[test]
    fn test_finish_rejects_unbalanced_document() {
        let mut b = builder();
        b.handle(Event::Start).unwrap();
        b.handle(Event::StartParagraph(DisplayNic::default())).unwrap();
        assert!(b.finish().is_err());
    }

    #[test]
    fn test_untranslatable_graphic_is_omitted() {
        let mut b = builder();
        drive(
            &mut b,
            vec![
                Event::Start,
                Event::StartParagraph(DisplayNic::default()),
                Event::ExternalGraphic(GraphicNic {
                    display: None,
                    location: Some("http://example.com/pic.png".to_string()),
                    width: None,
                    height: None,
                }),
                Event::Atomic,
                Event::EndParagraph,
                Event::End,
            ],
        );
        let out = b.render_component(0).unwrap();
        assert!(!out.contains("<AFrame"));
        assert!(!out.contains("<AFrames"));
    }

    #[test]
    fn test_score_toggles_inline_font() {
        let mut b = builder();
        drive(
            &mut b,
            vec![
                Event::Start,
                Event::StartParagraph(DisplayNic::default()),
                Event::Characters("plain ".to_string()),
                Event::Start,
                Event::StartScore(ScoreKind::After),
                Event::Characters("scored".to_string()),
                Event::EndScore(ScoreKind::After),
                Event::End,
                Event::EndParagraph,
                Event::End,
            ],
        );
        let out = b.render_component(0).unwrap();
        assert!(out.contains("<FUnderlining FSingle>"));
    }
}
