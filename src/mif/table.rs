//! Table construction and layout.
//!
//! A table is built incrementally from the event stream: declared
//! columns, then one or more parts, each a sequence of rows of cells.
//! When the table ends, rows are normalized so every grid position is
//! covered by exactly one canonical cell, column widths are computed,
//! and borders are resolved edge-by-edge against facing neighbors.

use std::fmt::Write;

use log::warn;

use crate::error::Result;
use crate::fot::context::{CellMargins, FormatContext};
use crate::fot::event::{CellNic, ColumnWidth};
use crate::length::Pt;
use crate::mif::border::Border;
use crate::mif::catalog::{ColorCatalog, Ruling, RulingCatalog, TableFormat, TblCatalog};
use crate::mif::stream::{StreamKind, TagStream};
use crate::mif::xref::RefResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowGroup {
    Header,
    Body,
    Footer,
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub column: usize,
    pub cols: usize,
    pub rows: usize,
    pub before_row: Border,
    pub after_row: Border,
    pub before_column: Border,
    pub after_column: Border,
    pub content: TagStream,
    /// Width available to the cell's content.
    pub display_size: Pt,
    pub synthesized: bool,
    // Ruling catalog names, assigned after border resolution.
    pub ruling_before_row: Option<String>,
    pub ruling_after_row: Option<String>,
    pub ruling_before_column: Option<String>,
    pub ruling_after_column: Option<String>,
}

impl Cell {
    pub fn new(column: usize, nic: &CellNic, ctx: &FormatContext, display_size: Pt) -> Cell {
        Cell {
            column,
            cols: nic.n_columns_spanned.max(1),
            rows: nic.n_rows_spanned.max(1),
            before_row: Border::from_spec(&ctx.para.cell_before_row_border, true),
            after_row: Border::from_spec(&ctx.para.cell_after_row_border, true),
            before_column: Border::from_spec(&ctx.para.cell_before_column_border, true),
            after_column: Border::from_spec(&ctx.para.cell_after_column_border, true),
            content: TagStream::new(StreamKind::Cell),
            display_size,
            synthesized: false,
            ruling_before_row: None,
            ruling_after_row: None,
            ruling_before_column: None,
            ruling_after_column: None,
        }
    }

    fn missing(column: usize) -> Cell {
        Cell {
            column,
            cols: 1,
            rows: 1,
            before_row: Border::absent(),
            after_row: Border::absent(),
            before_column: Border::absent(),
            after_column: Border::absent(),
            content: TagStream::new(StreamKind::Cell),
            display_size: Pt::ZERO,
            synthesized: true,
            ruling_before_row: None,
            ruling_after_row: None,
            ruling_before_column: None,
            ruling_after_column: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    pub group: RowGroup,
    pub cells: Vec<usize>,
}

/// One row group produced by a table-part bracket. Cells live in a flat
/// arena; rows hold indices into it, so two cells can be borrowed
/// mutably at once during border resolution.
#[derive(Debug, Default)]
pub struct TablePart {
    pub cells: Vec<Cell>,
    pub rows: Vec<Row>,
}

impl TablePart {
    pub fn new() -> TablePart {
        TablePart::default()
    }

    pub fn push_row(&mut self, group: RowGroup) {
        self.rows.push(Row {
            group,
            cells: Vec::new(),
        });
    }

    pub fn add_cell(&mut self, cell: Cell) -> Option<usize> {
        let id = self.cells.len();
        let row = self.rows.last_mut()?;
        row.cells.push(id);
        self.cells.push(cell);
        Some(id)
    }
}

#[derive(Debug)]
pub struct Table {
    pub id: usize,
    width: Option<Pt>,
    display_size: Pt,
    pub columns: Vec<ColumnWidth>,
    pub parts: Vec<TablePart>,
    pub needs_column_reprocessing: bool,
    before_row_border: Border,
    after_row_border: Border,
    before_column_border: Border,
    after_column_border: Border,
    pub margins: CellMargins,
    pub format_name: Option<String>,
}

impl Table {
    pub fn new(id: usize, width: Option<Pt>, ctx: &FormatContext) -> Table {
        Table {
            id,
            width,
            display_size: ctx.para.display_size,
            columns: Vec::new(),
            parts: Vec::new(),
            needs_column_reprocessing: false,
            before_row_border: Border::from_spec(&ctx.para.table_before_row_border, false),
            after_row_border: Border::from_spec(&ctx.para.table_after_row_border, false),
            before_column_border: Border::from_spec(&ctx.para.table_before_column_border, false),
            after_column_border: Border::from_spec(&ctx.para.table_after_column_border, false),
            margins: ctx.para.cell_margins,
            format_name: None,
        }
    }

    pub fn table_width(&self) -> Pt {
        self.width.unwrap_or(self.display_size)
    }

    /// Declare (or redeclare) a column. Gaps up to `index` are filled
    /// with unit proportional columns.
    pub fn declare_column(&mut self, index: usize, width: Option<ColumnWidth>) {
        while self.columns.len() <= index {
            self.columns.push(ColumnWidth::Proportional(1.0));
        }
        self.columns[index] = width.unwrap_or(ColumnWidth::Proportional(1.0));
    }

    /// Make sure columns `0..end` exist. A cell referencing a column that
    /// was never declared is a structural problem in the input, but one
    /// worth surviving: the missing columns are synthesized as unit
    /// proportional columns and widths are recomputed.
    pub fn ensure_columns(&mut self, end: usize) {
        if end > self.columns.len() {
            warn!(
                "table {}: cell references undeclared column {}; synthesizing {} proportional column(s)",
                self.id,
                end - 1,
                end - self.columns.len(),
            );
            while self.columns.len() < end {
                self.columns.push(ColumnWidth::Proportional(1.0));
            }
            self.needs_column_reprocessing = true;
        }
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Final column widths: fixed columns keep their length; the space
    /// left over is divided among proportional columns by unit factor.
    pub fn column_widths(&self) -> Vec<Pt> {
        let total = self.table_width();
        let mut fixed_sum = Pt::ZERO;
        let mut factor_sum = 0.0;
        for column in &self.columns {
            match column {
                ColumnWidth::Fixed(w) => fixed_sum += *w,
                ColumnWidth::Proportional(f) => factor_sum += f,
            }
        }
        let available = (total - fixed_sum).max(Pt::ZERO);
        let unit = if factor_sum > 0.0 {
            available / factor_sum
        } else {
            Pt::ZERO
        };
        self.columns
            .iter()
            .map(|column| match column {
                ColumnWidth::Fixed(w) => *w,
                ColumnWidth::Proportional(f) => (unit * *f).rounded(),
            })
            .collect()
    }

    /// Content width available to a cell spanning `span` columns from
    /// `column`.
    pub fn cell_display_size(&self, column: usize, span: usize) -> Pt {
        let widths = self.column_widths();
        let end = (column + span.max(1)).min(widths.len());
        let mut w = Pt::ZERO;
        for width in widths.iter().take(end).skip(column) {
            w += *width;
        }
        (w - self.margins.before_column - self.margins.after_column).max(Pt::ZERO)
    }

    /// Position → canonical covering cell, first claim wins. A spanning
    /// cell therefore owns every position it covers and is resolved
    /// exactly once.
    fn occupancy(part: &TablePart, n_cols: usize) -> Vec<Vec<Option<usize>>> {
        let n_rows = part.rows.len();
        let mut grid = vec![vec![None; n_cols]; n_rows];
        for (r, row) in part.rows.iter().enumerate() {
            for &id in &row.cells {
                let cell = &part.cells[id];
                for rr in r..(r + cell.rows).min(n_rows) {
                    for slot in grid[rr]
                        .iter_mut()
                        .take((cell.column + cell.cols).min(n_cols))
                        .skip(cell.column)
                    {
                        if slot.is_none() {
                            *slot = Some(id);
                        }
                    }
                }
            }
        }
        grid
    }

    /// Synthesize cells for every grid position nothing covers, so each
    /// row effectively spans the full declared column count.
    fn normalize_part(part: &mut TablePart, n_cols: usize) {
        let grid = Self::occupancy(part, n_cols);
        for (r, occupied) in grid.into_iter().enumerate() {
            for (c, owner) in occupied.into_iter().enumerate() {
                if owner.is_none() {
                    let id = part.cells.len();
                    part.cells.push(Cell::missing(c));
                    part.rows[r].cells.push(id);
                }
            }
        }
    }

    /// Normalize all parts and resolve every border. Idempotent: running
    /// it again does not re-apply any projection.
    pub fn resolve_borders(&mut self) {
        let n_cols = self.n_columns();
        if n_cols == 0 {
            return;
        }
        for part in &mut self.parts {
            Self::normalize_part(part, n_cols);
        }

        // Table-level borders are never consumed, so resolving against
        // copies is equivalent.
        let mut table_before_row = self.before_row_border;
        let mut table_after_row = self.after_row_border;
        let mut table_before_column = self.before_column_border;
        let mut table_after_column = self.after_column_border;

        let n_parts = self.parts.len();
        for (pi, part) in self.parts.iter_mut().enumerate() {
            let first_part = pi == 0;
            let last_part = pi + 1 == n_parts;
            let n_rows = part.rows.len();
            if n_rows == 0 {
                continue;
            }
            let grid = Self::occupancy(part, n_cols);

            for r in 0..n_rows {
                let ids = part.rows[r].cells.clone();
                for id in ids {
                    let (col, col_end, row_end) = {
                        let cell = &part.cells[id];
                        (
                            cell.column,
                            (cell.column + cell.cols).min(n_cols),
                            (r + cell.rows).min(n_rows),
                        )
                    };

                    // Row-before edge
                    if r == 0 {
                        if first_part {
                            part.cells[id].before_row.resolve(&mut table_before_row);
                        }
                    } else {
                        for cc in col..col_end {
                            if let Some(nid) = grid[r - 1][cc]
                                && nid != id
                            {
                                let (cell, neighbor) = two_cells(&mut part.cells, id, nid);
                                cell.before_row.resolve(&mut neighbor.after_row);
                            }
                        }
                    }

                    // Row-after edge
                    if row_end >= n_rows {
                        if last_part {
                            part.cells[id].after_row.resolve(&mut table_after_row);
                        }
                    } else {
                        for cc in col..col_end {
                            if let Some(nid) = grid[row_end][cc]
                                && nid != id
                            {
                                let (cell, neighbor) = two_cells(&mut part.cells, id, nid);
                                cell.after_row.resolve(&mut neighbor.before_row);
                            }
                        }
                    }

                    // Column-before edge
                    if col == 0 {
                        part.cells[id]
                            .before_column
                            .resolve(&mut table_before_column);
                    } else {
                        for rr in r..row_end {
                            if let Some(nid) = grid[rr][col - 1]
                                && nid != id
                            {
                                let (cell, neighbor) = two_cells(&mut part.cells, id, nid);
                                cell.before_column.resolve(&mut neighbor.after_column);
                            }
                        }
                    }

                    // Column-after edge
                    if col_end >= n_cols {
                        part.cells[id].after_column.resolve(&mut table_after_column);
                    } else {
                        for rr in r..row_end {
                            if let Some(nid) = grid[rr][col_end]
                                && nid != id
                            {
                                let (cell, neighbor) = two_cells(&mut part.cells, id, nid);
                                cell.after_column.resolve(&mut neighbor.before_column);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Resolve borders, register every present border's ruling, and
    /// register the table format.
    pub fn finalize(
        &mut self,
        colors: &mut ColorCatalog,
        rulings: &mut RulingCatalog,
        formats: &mut TblCatalog,
    ) {
        self.resolve_borders();

        for part in &mut self.parts {
            for cell in &mut part.cells {
                cell.ruling_before_row = register_ruling(&cell.before_row, colors, rulings);
                cell.ruling_after_row = register_ruling(&cell.after_row, colors, rulings);
                cell.ruling_before_column = register_ruling(&cell.before_column, colors, rulings);
                cell.ruling_after_column = register_ruling(&cell.after_column, colors, rulings);
            }
        }

        self.format_name = Some(formats.register(&TableFormat {
            column_widths: self.column_widths(),
            margins: self.margins,
        }));
    }

    /// Emit the table definition, resolving buffered cell content.
    pub fn emit(&self, refs: &RefResolver<'_>) -> Result<String> {
        let mut out = String::new();
        let _ = write!(
            out,
            " <Tbl\n  <TblID {}>\n  <TblTag `{}'>\n",
            self.id,
            self.format_name.as_deref().unwrap_or(""),
        );
        for part in &self.parts {
            let mut group: Option<RowGroup> = None;
            for row in &part.rows {
                if group != Some(row.group) {
                    if group.is_some() {
                        out.push_str("  >\n");
                    }
                    out.push_str(match row.group {
                        RowGroup::Header => "  <TblH\n",
                        RowGroup::Body => "  <TblBody\n",
                        RowGroup::Footer => "  <TblF\n",
                    });
                    group = Some(row.group);
                }
                out.push_str("   <Row\n");
                for &id in &row.cells {
                    let cell = &part.cells[id];
                    out.push_str("    <Cell\n");
                    if cell.cols > 1 {
                        let _ = write!(out, "     <CellColumns {}>\n", cell.cols);
                    }
                    if cell.rows > 1 {
                        let _ = write!(out, "     <CellRows {}>\n", cell.rows);
                    }
                    emit_ruling(&mut out, "CellTRuling", &cell.ruling_before_row);
                    emit_ruling(&mut out, "CellBRuling", &cell.ruling_after_row);
                    emit_ruling(&mut out, "CellLRuling", &cell.ruling_before_column);
                    emit_ruling(&mut out, "CellRRuling", &cell.ruling_after_column);
                    out.push_str("     <CellContent\n");
                    out.push_str(&cell.content.resolve(refs)?);
                    out.push_str("     >\n    >\n");
                }
                out.push_str("   >\n");
            }
            if group.is_some() {
                out.push_str("  >\n");
            }
        }
        out.push_str(" >\n");
        Ok(out)
    }
}

fn register_ruling(
    border: &Border,
    colors: &mut ColorCatalog,
    rulings: &mut RulingCatalog,
) -> Option<String> {
    if !border.present {
        return None;
    }
    let color = colors.register(border.color);
    Some(rulings.register(&Ruling {
        thickness: border.thickness,
        repeat: border.repeat,
        separation: border.separation,
        color,
    }))
}

fn emit_ruling(out: &mut String, tag: &str, name: &Option<String>) {
    if let Some(name) = name {
        let _ = write!(out, "     <{tag} `{name}'>\n");
    }
}

fn two_cells(cells: &mut [Cell], a: usize, b: usize) -> (&mut Cell, &mut Cell) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = cells.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = cells.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fot::event::BorderSpec;
    use proptest::prelude::*;

    fn ctx() -> FormatContext {
        FormatContext::default()
    }

    fn cell(column: usize, cols: usize, rows: usize) -> Cell {
        Cell::new(
            column,
            &CellNic {
                column: Some(column),
                n_columns_spanned: cols,
                n_rows_spanned: rows,
            },
            &ctx(),
            Pt(100.0),
        )
    }

    #[test]
    fn test_column_widths_fixed_and_proportional() {
        let mut table = Table::new(1, Some(Pt(400.0)), &ctx());
        table.declare_column(0, Some(ColumnWidth::Fixed(Pt(100.0))));
        table.declare_column(1, Some(ColumnWidth::Proportional(1.0)));
        table.declare_column(2, Some(ColumnWidth::Proportional(2.0)));
        let widths = table.column_widths();
        assert_eq!(widths, vec![Pt(100.0), Pt(100.0), Pt(200.0)]);
        // Proportional widths sum to the leftover and keep the 1:2 ratio.
        assert_eq!(widths[1] + widths[2], Pt(300.0));
    }

    #[test]
    fn test_undeclared_column_is_synthesized() {
        let mut table = Table::new(1, Some(Pt(300.0)), &ctx());
        table.declare_column(0, Some(ColumnWidth::Fixed(Pt(100.0))));
        table.ensure_columns(3);
        assert!(table.needs_column_reprocessing);
        assert_eq!(table.n_columns(), 3);
        let widths = table.column_widths();
        assert_eq!(widths[1], Pt(100.0));
        assert_eq!(widths[2], Pt(100.0));
    }

    #[test]
    fn test_normalization_synthesizes_missing_cells() {
        let mut table = Table::new(1, Some(Pt(300.0)), &ctx());
        table.declare_column(2, None);
        table.parts.push(TablePart::new());
        let part = table.parts.last_mut().unwrap();
        part.push_row(RowGroup::Body);
        part.add_cell(cell(0, 2, 1));
        part.push_row(RowGroup::Body);
        part.add_cell(cell(0, 1, 1));
        table.resolve_borders();

        let part = &table.parts[0];
        // Row 0: one real spanning cell + one synthesized; row 1: one
        // real + two synthesized.
        assert_eq!(part.rows[0].cells.len(), 2);
        assert_eq!(part.rows[1].cells.len(), 3);
        let synthesized = part.cells.iter().filter(|c| c.synthesized).count();
        assert_eq!(synthesized, 3);
    }

    #[test]
    fn test_spanning_cell_owns_covered_positions() {
        let mut part = TablePart::new();
        part.push_row(RowGroup::Body);
        part.add_cell(cell(0, 2, 2));
        part.add_cell(cell(2, 1, 1));
        part.push_row(RowGroup::Body);
        part.add_cell(cell(2, 1, 1));
        let grid = Table::occupancy(&part, 3);
        assert_eq!(grid[0][0], Some(0));
        assert_eq!(grid[0][1], Some(0));
        assert_eq!(grid[1][0], Some(0));
        assert_eq!(grid[1][1], Some(0));
        assert_eq!(grid[0][2], Some(1));
        assert_eq!(grid[1][2], Some(2));
    }

    fn bordered_cell(column: usize, cols: usize, rows: usize, priority: i32) -> Cell {
        let spec = BorderSpec {
            present: true,
            thickness: Pt(priority as f64 + 1.0),
            priority,
            ..BorderSpec::default()
        };
        let mut c = ctx();
        c.para.cell_before_row_border = spec;
        c.para.cell_after_row_border = spec;
        c.para.cell_before_column_border = spec;
        c.para.cell_after_column_border = spec;
        Cell::new(
            column,
            &CellNic {
                column: Some(column),
                n_columns_spanned: cols,
                n_rows_spanned: rows,
            },
            &c,
            Pt(100.0),
        )
    }

    fn two_by_two_with_span(priorities: [i32; 3]) -> Table {
        let mut table = Table::new(1, Some(Pt(200.0)), &ctx());
        table.declare_column(1, None);
        table.parts.push(TablePart::new());
        let part = table.parts.last_mut().unwrap();
        part.push_row(RowGroup::Body);
        // Cell spanning both rows in column 0, with two single cells
        // stacked in column 1 — a spanning-cell corner.
        part.add_cell(bordered_cell(0, 1, 2, priorities[0]));
        part.add_cell(bordered_cell(1, 1, 1, priorities[1]));
        part.push_row(RowGroup::Body);
        part.add_cell(bordered_cell(1, 1, 1, priorities[2]));
        table
    }

    #[test]
    fn test_spanning_cell_resolved_once_per_edge() {
        let mut table = two_by_two_with_span([0, 2, 1]);
        table.resolve_borders();
        let part = &table.parts[0];
        // The spanning cell's right edge faced the higher-priority cell
        // in row 0 first; that neighbor donated and was consumed.
        assert_eq!(part.cells[0].after_column.thickness, Pt(3.0));
        assert!(!part.cells[1].before_column.present);
    }

    #[test]
    fn test_border_resolution_is_idempotent_on_table() {
        let mut once = two_by_two_with_span([0, 2, 1]);
        once.resolve_borders();
        let mut twice = two_by_two_with_span([0, 2, 1]);
        twice.resolve_borders();
        twice.resolve_borders();
        for (a, b) in once.parts[0].cells.iter().zip(twice.parts[0].cells.iter()) {
            assert_eq!(a.before_row, b.before_row);
            assert_eq!(a.after_row, b.after_row);
            assert_eq!(a.before_column, b.before_column);
            assert_eq!(a.after_column, b.after_column);
        }
    }

    proptest! {
        #[test]
        fn prop_resolution_idempotent_across_span_corners(
            p0 in 0i32..3,
            p1 in 0i32..3,
            p2 in 0i32..3,
        ) {
            let mut once = two_by_two_with_span([p0, p1, p2]);
            once.resolve_borders();
            let mut twice = two_by_two_with_span([p0, p1, p2]);
            twice.resolve_borders();
            twice.resolve_borders();
            for (a, b) in once.parts[0].cells.iter().zip(twice.parts[0].cells.iter()) {
                prop_assert_eq!(a.before_row, b.before_row);
                prop_assert_eq!(a.after_row, b.after_row);
                prop_assert_eq!(a.before_column, b.before_column);
                prop_assert_eq!(a.after_column, b.after_column);
            }
        }

        #[test]
        fn prop_proportional_widths_sum_to_leftover(
            fixed in 10.0f64..200.0,
            f1 in 1.0f64..4.0,
            f2 in 1.0f64..4.0,
            total in 300.0f64..800.0,
        ) {
            let mut table = Table::new(1, Some(Pt(total)), &ctx());
            table.declare_column(0, Some(ColumnWidth::Fixed(Pt(fixed))));
            table.declare_column(1, Some(ColumnWidth::Proportional(f1)));
            table.declare_column(2, Some(ColumnWidth::Proportional(f2)));
            let widths = table.column_widths();
            let leftover = total - fixed;
            let sum = widths[1].0 + widths[2].0;
            prop_assert!((sum - leftover).abs() < 0.01);
            // Ratio f1:f2 within rounding.
            prop_assert!((widths[1].0 * f2 - widths[2].0 * f1).abs() < leftover * 0.01 + 1.0);
        }
    }
}
