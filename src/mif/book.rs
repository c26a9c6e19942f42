//! Book components and final document assembly.
//!
//! One book component corresponds to one physical output file, bracketed
//! by a page-sequence boundary. Content arriving before any explicit page
//! sequence opens an implicit default component; the first explicit page
//! sequence reuses that default once, later ones open fresh components.
//! On commit every buffered stream is resolved and written out in a fixed
//! order; when more than one component exists, a manifest file ties them
//! together.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use log::error;

use crate::error::{Error, Result};
use crate::fot::context::PageProps;
use crate::fot::event::{HfPart, HfPosition, HfRegion};
use crate::length::Pt;
use crate::mif::catalog::{ColorCatalog, PgfCatalog, RulingCatalog, TblCatalog};
use crate::mif::escape::to_di_path;
use crate::mif::stream::{StreamKind, TagStream};
use crate::mif::table::Table;
use crate::mif::xref::{CrossRefTable, ElementRegistry, RefResolver};

/// Page geometry settings for one component, captured from the inherited
/// context when its page sequence starts.
#[derive(Debug, Clone, Default)]
pub struct DocumentSettings {
    pub page: PageProps,
}

/// An anchored frame (imported graphic or rule), referenced from running
/// text by id.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: usize,
    pub markup: String,
}

const HF_SLOTS: usize = 6;

fn hf_slot(part: HfPart) -> usize {
    let base = match part.region {
        HfRegion::Header => 0,
        HfRegion::Footer => 3,
    };
    base + match part.position {
        HfPosition::Left => 0,
        HfPosition::Center => 1,
        HfPosition::Right => 2,
    }
}

fn hf_tag(slot: usize) -> &'static str {
    ["HL", "HC", "HR", "FL", "FC", "FR"][slot]
}

/// One physical output unit: catalogs, settings, tables, frames, pages
/// and text flows, committed together.
#[derive(Debug)]
pub struct BookComponent {
    pub settings: DocumentSettings,
    pub colors: ColorCatalog,
    pub formats: PgfCatalog,
    pub rulings: RulingCatalog,
    pub table_formats: TblCatalog,
    pub frames: Vec<Frame>,
    pub tables: Vec<Table>,
    hf: [Option<TagStream>; HF_SLOTS],
    pub flow: TagStream,
    pub has_page_sequence: bool,
}

impl BookComponent {
    fn new() -> BookComponent {
        BookComponent {
            settings: DocumentSettings::default(),
            colors: ColorCatalog::default(),
            formats: PgfCatalog::default(),
            rulings: RulingCatalog::default(),
            table_formats: TblCatalog::default(),
            frames: Vec::new(),
            tables: Vec::new(),
            hf: Default::default(),
            flow: TagStream::new(StreamKind::TextFlow),
            has_page_sequence: false,
        }
    }

    pub fn set_header_footer(&mut self, part: HfPart, stream: TagStream) {
        self.hf[hf_slot(part)] = Some(stream);
    }

    pub fn is_empty(&self) -> bool {
        self.flow.is_empty()
            && self.tables.is_empty()
            && self.frames.is_empty()
            && self.hf.iter().all(Option::is_none)
    }

    /// Render the whole component to text, resolving every buffered
    /// stream. Catalogs first, then settings, tables, frames, pages, and
    /// finally the text flows.
    pub fn render(&self, refs: &RefResolver<'_>) -> Result<String> {
        let mut out = String::new();
        out.push_str("<MIFFile 5.50> # Generated by folio\n");

        self.colors.emit(&mut out);
        self.formats.emit(&mut out);
        self.rulings.emit(&mut out);
        self.table_formats.emit(&mut out);

        self.emit_document(&mut out);

        if !self.tables.is_empty() {
            out.push_str("<Tbls\n");
            for table in &self.tables {
                out.push_str(&table.emit(refs)?);
            }
            out.push_str(">\n");
        }

        if !self.frames.is_empty() {
            out.push_str("<AFrames\n");
            for frame in &self.frames {
                out.push_str(&frame.markup);
            }
            out.push_str(">\n");
        }

        self.emit_pages(&mut out);
        self.emit_flows(refs, &mut out)?;
        Ok(out)
    }

    fn emit_document(&self, out: &mut String) {
        let p = &self.settings.page;
        let _ = write!(
            out,
            "<Document\n <DPageSize {} {}>\n <DMargins {} {} {} {}>\n <DColumns 1>\n>\n",
            p.page_width, p.page_height, p.left_margin, p.top_margin, p.right_margin, p.bottom_margin,
        );
    }

    /// Text rectangle geometry shared by the master and body pages.
    fn body_rect(&self) -> (Pt, Pt, Pt, Pt) {
        let p = &self.settings.page;
        (
            p.left_margin,
            p.top_margin,
            (p.page_width - p.left_margin - p.right_margin).max(Pt::ZERO),
            (p.page_height - p.top_margin - p.bottom_margin).max(Pt::ZERO),
        )
    }

    fn emit_pages(&self, out: &mut String) {
        let p = &self.settings.page;
        let (x, y, w, h) = self.body_rect();

        out.push_str("<Page\n <PageType MasterPage>\n <PageTag `Master'>\n");
        if self.hf[0..3].iter().any(Option::is_some) {
            let _ = write!(
                out,
                " <TextRect <TRID 1> <ShapeRect {x} {} {w} {}>>\n",
                p.header_margin,
                (p.top_margin - p.header_margin).max(Pt::ZERO),
            );
        }
        let _ = write!(out, " <TextRect <TRID 2> <ShapeRect {x} {y} {w} {h}>>\n");
        if self.hf[3..6].iter().any(Option::is_some) {
            let _ = write!(
                out,
                " <TextRect <TRID 3> <ShapeRect {x} {} {w} {}>>\n",
                p.page_height - p.bottom_margin,
                (p.bottom_margin - p.footer_margin).max(Pt::ZERO),
            );
        }
        out.push_str(">\n");

        let _ = write!(
            out,
            "<Page\n <PageType BodyPage>\n <TextRect <TRID 4> <ShapeRect {x} {y} {w} {h}>>\n>\n"
        );
    }

    fn emit_flows(&self, refs: &RefResolver<'_>, out: &mut String) -> Result<()> {
        for (slot, stream) in self.hf.iter().enumerate() {
            if let Some(stream) = stream {
                let rect = if slot < 3 { 1 } else { 3 };
                let _ = write!(
                    out,
                    "<TextFlow\n <TFTag `{}'>\n <TextRectID {rect}>\n",
                    hf_tag(slot)
                );
                out.push_str(&stream.resolve(refs)?);
                out.push_str(">\n");
            }
        }
        out.push_str("<TextFlow\n <TFTag `A'>\n <TFAutoConnect Yes>\n <TextRectID 4>\n");
        out.push_str(&self.flow.resolve(refs)?);
        out.push_str(">\n");
        Ok(())
    }
}

/// Collects book components as the document is processed and commits
/// them (plus the manifest, when needed) at the end of the run.
#[derive(Debug)]
pub struct Assembler {
    components: Vec<BookComponent>,
    /// The implicit default component may be adopted by the first
    /// explicit page sequence, but only once.
    default_reusable: bool,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler {
            components: Vec::new(),
            default_reusable: false,
        }
    }

    /// Index of the open component, creating the implicit default if no
    /// component is open yet.
    pub fn current_index(&mut self) -> usize {
        if self.components.is_empty() {
            self.components.push(BookComponent::new());
            self.default_reusable = true;
        }
        self.components.len() - 1
    }

    pub fn current(&mut self) -> &mut BookComponent {
        let index = self.current_index();
        &mut self.components[index]
    }

    /// Enter a page sequence: reuse the implicit default component once,
    /// otherwise open a fresh component.
    pub fn enter_page_sequence(&mut self, page: PageProps) -> usize {
        let reuse = self.default_reusable && !self.components.is_empty();
        if !reuse {
            self.components.push(BookComponent::new());
        }
        self.default_reusable = false;
        let component = self.components.last_mut().expect("component just ensured");
        component.has_page_sequence = true;
        component.settings.page = page;
        self.components.len() - 1
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Filenames the components will be committed under, in order: the
    /// output path itself for a single component, numbered stems when
    /// there are several.
    pub fn component_filenames(&self, output: &Path) -> Vec<String> {
        let n = self.components.len();
        if n <= 1 {
            return vec![file_name_of(output)];
        }
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "book".to_string());
        let ext = output
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (1..=n).map(|i| format!("{stem}{i}{ext}")).collect()
    }

    /// Commit every component and, when more than one exists, the
    /// manifest. A component whose file cannot be written is reported
    /// and skipped; the rest are still committed. Returns the paths
    /// actually written.
    pub fn finish(
        self,
        output: &Path,
        table: &CrossRefTable,
        registry: &ElementRegistry,
        wrap_column: usize,
    ) -> Result<Vec<PathBuf>> {
        let filenames = self.component_filenames(output);
        let dir = output.parent().unwrap_or_else(|| Path::new(""));
        let refs = RefResolver {
            table,
            registry,
            filenames: &filenames,
            wrap_column,
        };

        let multiple = self.components.len() > 1;
        let mut written = Vec::new();
        for (component, filename) in self.components.iter().zip(&filenames) {
            let path = dir.join(filename);
            // Contract violations inside render are fatal; I/O failures
            // cost only this component.
            let text = component.render(&refs)?;
            match write_file(&path, &text) {
                Ok(()) => written.push(path),
                Err(e) => error!("skipping book component: {e}"),
            }
        }

        if multiple {
            let manifest = self.render_manifest(&filenames);
            let path = output.with_extension("book");
            match write_file(&path, &manifest) {
                Ok(()) => written.push(path),
                Err(e) => error!("skipping book manifest: {e}"),
            }
        }

        Ok(written)
    }

    fn render_manifest(&self, filenames: &[String]) -> String {
        let mut out = String::new();
        out.push_str("<BookFile 5.50> # Generated by folio\n");
        for filename in filenames {
            let di = to_di_path(filename).unwrap_or_else(|| format!("<c\\>{filename}"));
            let _ = write!(out, "<BookComponent\n <FileName `{di}'>\n>\n");
        }
        out
    }

    /// Render a single component to a string; commit-time helper for
    /// callers that want in-memory output.
    pub fn render_component(
        &self,
        index: usize,
        output: &Path,
        table: &CrossRefTable,
        registry: &ElementRegistry,
        wrap_column: usize,
    ) -> Result<String> {
        let filenames = self.component_filenames(output);
        let refs = RefResolver {
            table,
            registry,
            filenames: &filenames,
            wrap_column,
        };
        let component = self
            .components
            .get(index)
            .ok_or_else(|| Error::protocol(format!("no book component {index}")))?;
        component.render(&refs)
    }
}

fn write_file(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book.mif".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mif::xref::{CrossRefTable, ElementRegistry};

    #[test]
    fn test_default_component_reused_once() {
        let mut assembler = Assembler::new();
        assembler.current().flow.write("preamble");
        assert_eq!(assembler.len(), 1);
        // First explicit page sequence adopts the default component.
        assert_eq!(assembler.enter_page_sequence(PageProps::default()), 0);
        assert_eq!(assembler.len(), 1);
        // The next one opens a fresh component.
        assert_eq!(assembler.enter_page_sequence(PageProps::default()), 1);
        assert_eq!(assembler.len(), 2);
    }

    #[test]
    fn test_single_component_filename_is_output_path() {
        let mut assembler = Assembler::new();
        assembler.current();
        let names = assembler.component_filenames(Path::new("out/doc.mif"));
        assert_eq!(names, vec!["doc.mif".to_string()]);
    }

    #[test]
    fn test_multiple_components_get_numbered_filenames() {
        let mut assembler = Assembler::new();
        assembler.enter_page_sequence(PageProps::default());
        assembler.enter_page_sequence(PageProps::default());
        let names = assembler.component_filenames(Path::new("doc.mif"));
        assert_eq!(names, vec!["doc1.mif".to_string(), "doc2.mif".to_string()]);
    }

    #[test]
    fn test_render_contains_fixed_section_order() {
        let mut assembler = Assembler::new();
        assembler.current().flow.write("<Para >\n");
        let table = CrossRefTable::new();
        let registry = ElementRegistry::new();
        let text = assembler
            .render_component(0, Path::new("doc.mif"), &table, &registry, 78)
            .unwrap();
        let color = text.find("<ColorCatalog").unwrap();
        let pgf = text.find("<PgfCatalog").unwrap();
        let ruling = text.find("<RulingCatalog").unwrap();
        let document = text.find("<Document").unwrap();
        let flow = text.find("<TextFlow").unwrap();
        assert!(color < pgf && pgf < ruling && ruling < document && document < flow);
    }
}
