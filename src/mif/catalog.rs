//! Document-wide catalogs.
//!
//! Paragraph formats, colors, rulings and table formats are each
//! registered once per unique definition and referenced by generated name
//! everywhere else. Deduplication is by a canonical key string; assignment
//! order is emission order, so output is stable for a given event stream.

use std::collections::HashMap;
use std::fmt::Write;

use crate::fot::context::CellMargins;
use crate::fot::event::{Color, FontPosture, FontWeight, Quadding};
use crate::length::Pt;

/// Paragraph placement at the next boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Anywhere,
    ColumnTop,
    PageTop,
}

impl Placement {
    fn as_str(self) -> &'static str {
        match self {
            Placement::Anywhere => "Anywhere",
            Placement::ColumnTop => "ColumnTop",
            Placement::PageTop => "PageTop",
        }
    }
}

/// One paragraph format: everything the output needs to lay a paragraph
/// out, captured from the formatting context when the paragraph commits.
#[derive(Debug, Clone, PartialEq)]
pub struct ParaFormat {
    pub quadding: Quadding,
    pub start_indent: Pt,
    pub end_indent: Pt,
    pub first_line_start_indent: Pt,
    pub line_spacing: Pt,
    pub space_before: Pt,
    pub placement: Placement,
    pub keep_with_previous: bool,
    pub keep_with_next: bool,
    pub hyphenate: bool,
    pub language: Option<String>,
    pub font_family: String,
    pub font_size: Pt,
    pub font_weight: FontWeight,
    pub font_posture: FontPosture,
    /// Catalog name of the text color.
    pub color: String,
}

impl ParaFormat {
    fn key(&self) -> String {
        format!(
            "{:?}|{}|{}|{}|{}|{}|{:?}|{}{}{}|{}|{}|{}|{:?}|{:?}|{}",
            self.quadding,
            self.start_indent,
            self.end_indent,
            self.first_line_start_indent,
            self.line_spacing,
            self.space_before,
            self.placement,
            u8::from(self.keep_with_previous),
            u8::from(self.keep_with_next),
            u8::from(self.hyphenate),
            self.language.as_deref().unwrap_or(""),
            self.font_family,
            self.font_size,
            self.font_weight,
            self.font_posture,
            self.color,
        )
    }

    fn alignment(&self) -> &'static str {
        match self.quadding {
            Quadding::Start => "Left",
            Quadding::End => "Right",
            Quadding::Center => "Center",
            Quadding::Justify => "LeftRight",
        }
    }

    fn emit(&self, tag: &str, out: &mut String) {
        let _ = write!(
            out,
            " <Pgf\n  <PgfTag `{tag}'>\n  <PgfAlignment {}>\n  <PgfFIndent {}>\n  <PgfLIndent {}>\n  <PgfRIndent {}>\n  <PgfLineSpacing {}>\n  <PgfSpBefore {}>\n  <PgfPlacement {}>\n  <PgfWithPrev {}>\n  <PgfWithNext {}>\n  <PgfHyphenate {}>\n",
            self.alignment(),
            self.first_line_start_indent,
            self.start_indent,
            self.end_indent,
            self.line_spacing,
            self.space_before,
            self.placement.as_str(),
            yes_no(self.keep_with_previous),
            yes_no(self.keep_with_next),
            yes_no(self.hyphenate),
        );
        if let Some(lang) = &self.language {
            let _ = write!(out, "  <PgfLanguage `{lang}'>\n");
        }
        let _ = write!(
            out,
            "  <PgfFont <FFamily `{}'> <FSize {}> <FWeight `{}'> <FAngle `{}'> <FColor `{}'>>\n >\n",
            self.font_family,
            self.font_size,
            weight_name(self.font_weight),
            posture_name(self.font_posture),
            self.color,
        );
    }
}

pub(crate) fn yes_no(v: bool) -> &'static str {
    if v { "Yes" } else { "No" }
}

pub(crate) fn weight_name(w: FontWeight) -> &'static str {
    match w {
        FontWeight::Light => "Light",
        FontWeight::Medium => "Regular",
        FontWeight::Bold => "Bold",
    }
}

pub(crate) fn posture_name(p: FontPosture) -> &'static str {
    match p {
        FontPosture::Upright => "Regular",
        FontPosture::Italic => "Italic",
        FontPosture::Oblique => "Oblique",
    }
}

/// Key → generated name registry shared by all four catalogs.
#[derive(Debug)]
struct Registry<T> {
    prefix: &'static str,
    by_key: HashMap<String, usize>,
    entries: Vec<(String, T)>,
}

impl<T> Registry<T> {
    fn new(prefix: &'static str) -> Registry<T> {
        Registry {
            prefix,
            by_key: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Register `make()` under `key`, or return the existing name.
    fn intern_with(&mut self, key: String, make: impl FnOnce() -> T) -> String {
        if let Some(&i) = self.by_key.get(&key) {
            return self.entries[i].0.clone();
        }
        let name = format!("{}{}", self.prefix, self.entries.len() + 1);
        self.by_key.insert(key, self.entries.len());
        self.entries.push((name.clone(), make()));
        name
    }

    fn iter(&self) -> impl Iterator<Item = &(String, T)> {
        self.entries.iter()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Paragraph format catalog.
#[derive(Debug)]
pub struct PgfCatalog {
    reg: Registry<ParaFormat>,
}

impl Default for PgfCatalog {
    fn default() -> Self {
        PgfCatalog {
            reg: Registry::new("P"),
        }
    }
}

impl PgfCatalog {
    pub fn register(&mut self, format: &ParaFormat) -> String {
        self.reg.intern_with(format.key(), || format.clone())
    }

    pub fn len(&self) -> usize {
        self.reg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reg.len() == 0
    }

    pub fn emit(&self, out: &mut String) {
        out.push_str("<PgfCatalog\n");
        for (name, format) in self.reg.iter() {
            format.emit(name, out);
        }
        out.push_str(">\n");
    }
}

/// Color catalog; colors are emitted in the output's CMYK model.
#[derive(Debug)]
pub struct ColorCatalog {
    reg: Registry<Color>,
}

impl Default for ColorCatalog {
    fn default() -> Self {
        ColorCatalog {
            reg: Registry::new("Color"),
        }
    }
}

impl ColorCatalog {
    pub fn register(&mut self, color: Color) -> String {
        self.reg
            .intern_with(format!("{},{},{}", color.r, color.g, color.b), || color)
    }

    pub fn emit(&self, out: &mut String) {
        out.push_str("<ColorCatalog\n");
        for (name, color) in self.reg.iter() {
            let (c, m, y, k) = rgb_to_cmyk(*color);
            let _ = write!(
                out,
                " <Color <ColorTag `{name}'> <ColorCyan {}> <ColorMagenta {}> <ColorYellow {}> <ColorBlack {}>>\n",
                Pt(c).rounded(),
                Pt(m).rounded(),
                Pt(y).rounded(),
                Pt(k).rounded(),
            );
        }
        out.push_str(">\n");
    }
}

/// CMYK percentages for an RGB color.
fn rgb_to_cmyk(color: Color) -> (f64, f64, f64, f64) {
    let r = color.r as f64 / 255.0;
    let g = color.g as f64 / 255.0;
    let b = color.b as f64 / 255.0;
    let k = 1.0 - r.max(g).max(b);
    if k >= 1.0 {
        return (0.0, 0.0, 0.0, 100.0);
    }
    let c = (1.0 - r - k) / (1.0 - k) * 100.0;
    let m = (1.0 - g - k) / (1.0 - k) * 100.0;
    let y = (1.0 - b - k) / (1.0 - k) * 100.0;
    (c, m, y, k * 100.0)
}

/// One line style shared by every border that resolves to the same
/// thickness, repeat count, gap and color.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruling {
    pub thickness: Pt,
    pub repeat: u32,
    pub separation: Pt,
    /// Catalog name of the line color.
    pub color: String,
}

/// Ruling catalog.
#[derive(Debug)]
pub struct RulingCatalog {
    reg: Registry<Ruling>,
}

impl Default for RulingCatalog {
    fn default() -> Self {
        RulingCatalog {
            reg: Registry::new("R"),
        }
    }
}

impl RulingCatalog {
    pub fn register(&mut self, ruling: &Ruling) -> String {
        let key = format!(
            "{}|{}|{}|{}",
            ruling.thickness, ruling.repeat, ruling.separation, ruling.color
        );
        self.reg.intern_with(key, || ruling.clone())
    }

    pub fn emit(&self, out: &mut String) {
        out.push_str("<RulingCatalog\n");
        for (name, r) in self.reg.iter() {
            let _ = write!(
                out,
                " <Ruling <RulingTag `{name}'> <RulingPenWidth {}> <RulingLines {}> <RulingGap {}> <RulingColor `{}'>>\n",
                r.thickness, r.repeat, r.separation, r.color,
            );
        }
        out.push_str(">\n");
    }
}

/// One table format: resolved column widths plus cell margins.
#[derive(Debug, Clone, PartialEq)]
pub struct TableFormat {
    pub column_widths: Vec<Pt>,
    pub margins: CellMargins,
}

/// Table format catalog.
#[derive(Debug)]
pub struct TblCatalog {
    reg: Registry<TableFormat>,
}

impl Default for TblCatalog {
    fn default() -> Self {
        TblCatalog {
            reg: Registry::new("Format"),
        }
    }
}

impl TblCatalog {
    pub fn register(&mut self, format: &TableFormat) -> String {
        let mut key = String::new();
        for w in &format.column_widths {
            let _ = write!(key, "{w},");
        }
        let _ = write!(
            key,
            "|{}|{}|{}|{}",
            format.margins.before_column,
            format.margins.after_column,
            format.margins.before_row,
            format.margins.after_row,
        );
        self.reg.intern_with(key, || format.clone())
    }

    pub fn emit(&self, out: &mut String) {
        out.push_str("<TblCatalog\n");
        for (name, f) in self.reg.iter() {
            let _ = write!(
                out,
                " <TblFormat\n  <TblTag `{name}'>\n  <TblCellMargins {} {} {} {}>\n",
                f.margins.before_column,
                f.margins.before_row,
                f.margins.after_column,
                f.margins.after_row,
            );
            for (i, w) in f.column_widths.iter().enumerate() {
                let _ = write!(
                    out,
                    "  <TblColumn <TblColumnNum {i}> <TblColumnWidth {w}>>\n"
                );
            }
            out.push_str(" >\n");
        }
        out.push_str(">\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> ParaFormat {
        ParaFormat {
            quadding: Quadding::Start,
            start_indent: Pt::ZERO,
            end_indent: Pt::ZERO,
            first_line_start_indent: Pt::ZERO,
            line_spacing: Pt(12.0),
            space_before: Pt::ZERO,
            placement: Placement::Anywhere,
            keep_with_previous: false,
            keep_with_next: false,
            hyphenate: true,
            language: None,
            font_family: "Times".to_string(),
            font_size: Pt(10.0),
            font_weight: FontWeight::Medium,
            font_posture: FontPosture::Upright,
            color: "Color1".to_string(),
        }
    }

    #[test]
    fn test_identical_formats_share_a_name() {
        let mut catalog = PgfCatalog::default();
        let a = catalog.register(&format());
        let b = catalog.register(&format());
        assert_eq!(a, b);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_different_formats_get_distinct_names() {
        let mut catalog = PgfCatalog::default();
        let a = catalog.register(&format());
        let b = catalog.register(&ParaFormat {
            font_size: Pt(14.0),
            ..format()
        });
        assert_ne!(a, b);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_ruling_dedup_by_line_style() {
        let mut catalog = RulingCatalog::default();
        let ruling = Ruling {
            thickness: Pt(1.0),
            repeat: 1,
            separation: Pt::ZERO,
            color: "Color1".to_string(),
        };
        let a = catalog.register(&ruling);
        let b = catalog.register(&ruling.clone());
        assert_eq!(a, b);
        let c = catalog.register(&Ruling {
            repeat: 2,
            ..ruling
        });
        assert_ne!(a, c);
    }

    #[test]
    fn test_rgb_to_cmyk() {
        assert_eq!(rgb_to_cmyk(Color::BLACK), (0.0, 0.0, 0.0, 100.0));
        let (c, m, y, k) = rgb_to_cmyk(Color::new(255, 0, 0));
        assert_eq!((c, m, y, k), (0.0, 100.0, 100.0, 0.0));
    }

    #[test]
    fn test_color_emission() {
        let mut catalog = ColorCatalog::default();
        let name = catalog.register(Color::BLACK);
        let mut out = String::new();
        catalog.emit(&mut out);
        assert!(out.contains(&format!("<ColorTag `{name}'>")));
        assert!(out.contains("<ColorBlack 100>"));
    }
}
