//! Deferred cross-reference resolution.
//!
//! Page numbers and hyperlink targets depend on final pagination: which
//! book component a node lands in is known only once the whole document
//! has been processed. Markup for a node, however, must be written the
//! moment the node is visited. The split: emission writes an opaque
//! placeholder (an index into an append-only side table) into the
//! buffered stream, and commit substitutes the resolved textual form,
//! built from the target's by-then-known book component and identifier.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::fot::event::NodeRef;
use crate::mif::escape::escape_string;

/// What a placeholder stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// A destination marker emitted at every visited node; resolves to
    /// marker text only if something ended up referencing the node.
    PotentialMarker,
    /// A page-number cross-reference to a node.
    XRef,
    /// An active hyperlink to a node.
    HypertextLink,
    /// An unconditional hyperlink destination.
    HypertextDestination,
}

/// Identifies an element within a grove, preferring its declared
/// identifier over its ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementIdent {
    Ordinal(u32),
    SgmlId(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementKey {
    pub grove: u32,
    pub ident: ElementIdent,
}

impl ElementKey {
    pub fn from_node(node: &NodeRef) -> ElementKey {
        ElementKey {
            grove: node.grove,
            ident: match &node.sgml_id {
                Some(id) => ElementIdent::SgmlId(id.clone()),
                None => ElementIdent::Ordinal(node.element),
            },
        }
    }

    /// The identifier text used inside markers and reference sources.
    pub fn ident_text(&self) -> String {
        match &self.ident {
            ElementIdent::SgmlId(id) => escape_string(id).into_owned(),
            ElementIdent::Ordinal(n) => format!("n{}.{}", self.grove, n),
        }
    }
}

/// One pending cross-reference, recorded at emission time.
#[derive(Debug, Clone)]
pub struct CrossRefInfo {
    pub key: ElementKey,
    pub kind: RefKind,
    /// Output column at the point of emission, used to wrap long
    /// substituted text.
    pub column: usize,
}

/// The append-only side table placeholders index into.
#[derive(Debug, Default)]
pub struct CrossRefTable {
    entries: Vec<CrossRefInfo>,
}

impl CrossRefTable {
    pub fn new() -> CrossRefTable {
        CrossRefTable::default()
    }

    pub fn add(&mut self, info: CrossRefInfo) -> usize {
        self.entries.push(info);
        self.entries.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&CrossRefInfo> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Flag word layout: 2 bits of reference-kind mask, then the book-component
// index in the remaining 14 bits (stored +1 so zero means "not placed").
const PAGE_TARGET: u16 = 1 << 0;
const LINK_TARGET: u16 = 1 << 1;
const COMPONENT_SHIFT: u16 = 2;

/// Highest book-component index the flag word can record.
pub const MAX_COMPONENT_INDEX: usize = (1 << 14) - 2;

/// Per-element bookkeeping: which reference kinds have targeted the
/// element, and which book component it was placed in. Entries are only
/// ever added or promoted, never removed.
#[derive(Debug, Default)]
pub struct ElementRegistry {
    flags: HashMap<ElementKey, u16>,
}

impl ElementRegistry {
    pub fn new() -> ElementRegistry {
        ElementRegistry::default()
    }

    /// Record that a reference of `kind` targets `key`.
    pub fn note_reference(&mut self, key: &ElementKey, kind: RefKind) {
        let bit = match kind {
            RefKind::XRef => PAGE_TARGET,
            RefKind::HypertextLink => LINK_TARGET,
            RefKind::PotentialMarker | RefKind::HypertextDestination => return,
        };
        *self.flags.entry(key.clone()).or_insert(0) |= bit;
    }

    /// Record the book component the element was placed in.
    pub fn set_component(&mut self, key: &ElementKey, component: usize) -> Result<()> {
        if component > MAX_COMPONENT_INDEX {
            return Err(Error::protocol(format!(
                "book component index {component} does not fit the element flag word"
            )));
        }
        let word = self.flags.entry(key.clone()).or_insert(0);
        *word = (*word & (PAGE_TARGET | LINK_TARGET))
            | (((component + 1) as u16) << COMPONENT_SHIFT);
        Ok(())
    }

    pub fn component_of(&self, key: &ElementKey) -> Option<usize> {
        let word = *self.flags.get(key)?;
        let stored = word >> COMPONENT_SHIFT;
        if stored == 0 {
            None
        } else {
            Some(stored as usize - 1)
        }
    }

    pub fn is_page_target(&self, key: &ElementKey) -> bool {
        self.flags.get(key).is_some_and(|w| w & PAGE_TARGET != 0)
    }

    pub fn is_link_target(&self, key: &ElementKey) -> bool {
        self.flags.get(key).is_some_and(|w| w & LINK_TARGET != 0)
    }
}

/// Everything needed to turn a placeholder into its final textual form.
pub struct RefResolver<'a> {
    pub table: &'a CrossRefTable,
    pub registry: &'a ElementRegistry,
    /// Book component index → committed filename, in emission order.
    pub filenames: &'a [String],
    /// Wrap column for long substitutions.
    pub wrap_column: usize,
}

impl RefResolver<'_> {
    /// Substitute placeholder `index` into `out`.
    pub fn substitute(&self, index: usize, out: &mut String) -> Result<()> {
        let info = self.table.get(index).ok_or_else(|| {
            Error::protocol(format!("cross-reference index {index} out of bounds"))
        })?;
        let ident = info.key.ident_text();

        let text = match info.kind {
            RefKind::PotentialMarker => {
                let mut t = String::new();
                if self.registry.is_page_target(&info.key) {
                    t.push_str(&format!("<Marker <MType 9> <MText `{ident}'>>"));
                }
                if self.registry.is_link_target(&info.key) {
                    if !t.is_empty() {
                        t.push(' ');
                    }
                    t.push_str(&format!("<Marker <MType 8> <MText `newlink {ident}'>>"));
                }
                t
            }
            RefKind::HypertextDestination => {
                format!("<Marker <MType 8> <MText `newlink {ident}'>>")
            }
            RefKind::XRef => {
                let file = self.component_file(&info.key)?;
                format!(
                    "<XRef <XRefName `Page'> <XRefSrcText `{ident}'> <XRefSrcFile `{file}'>> <XRefEnd>"
                )
            }
            RefKind::HypertextLink => {
                let file = self.component_file(&info.key)?;
                format!("<Marker <MType 8> <MText `gotolink {file}:{ident}'>>")
            }
        };

        if !text.is_empty() {
            if info.column + text.len() > self.wrap_column {
                out.push('\n');
            }
            out.push_str(&text);
        }
        Ok(())
    }

    fn component_file(&self, key: &ElementKey) -> Result<&str> {
        let component = self.registry.component_of(key).ok_or_else(|| {
            Error::protocol(format!(
                "cross-reference target {} was never placed in a book component",
                key.ident_text()
            ))
        })?;
        self.filenames
            .get(component)
            .map(String::as_str)
            .ok_or_else(|| {
                Error::protocol(format!("book component {component} has no filename"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> ElementKey {
        ElementKey {
            grove: 0,
            ident: ElementIdent::SgmlId(id.to_string()),
        }
    }

    #[test]
    fn test_component_round_trip() {
        let mut reg = ElementRegistry::new();
        let k = key("fig1");
        reg.note_reference(&k, RefKind::XRef);
        reg.set_component(&k, 2).unwrap();
        assert_eq!(reg.component_of(&k), Some(2));
        assert!(reg.is_page_target(&k));
        assert!(!reg.is_link_target(&k));
    }

    #[test]
    fn test_component_zero_is_distinct_from_unplaced() {
        let mut reg = ElementRegistry::new();
        let k = key("a");
        assert_eq!(reg.component_of(&k), None);
        reg.set_component(&k, 0).unwrap();
        assert_eq!(reg.component_of(&k), Some(0));
    }

    #[test]
    fn test_component_index_must_fit() {
        let mut reg = ElementRegistry::new();
        assert!(reg.set_component(&key("a"), MAX_COMPONENT_INDEX).is_ok());
        assert!(
            reg.set_component(&key("b"), MAX_COMPONENT_INDEX + 1)
                .is_err()
        );
    }

    #[test]
    fn test_reference_bits_survive_placement() {
        let mut reg = ElementRegistry::new();
        let k = key("x");
        reg.note_reference(&k, RefKind::HypertextLink);
        reg.set_component(&k, 7).unwrap();
        assert!(reg.is_link_target(&k));
        assert_eq!(reg.component_of(&k), Some(7));
    }

    #[test]
    fn test_resolve_link_encodes_component_and_ident() {
        let mut table = CrossRefTable::new();
        let mut reg = ElementRegistry::new();
        let k = key("fig1");
        reg.note_reference(&k, RefKind::HypertextLink);
        let idx = table.add(CrossRefInfo {
            key: k.clone(),
            kind: RefKind::HypertextLink,
            column: 0,
        });
        reg.set_component(&k, 2).unwrap();

        let filenames = vec![
            "doc1.mif".to_string(),
            "doc2.mif".to_string(),
            "doc3.mif".to_string(),
        ];
        let resolver = RefResolver {
            table: &table,
            registry: &reg,
            filenames: &filenames,
            wrap_column: 160,
        };
        let mut out = String::new();
        resolver.substitute(idx, &mut out).unwrap();
        assert!(out.contains("doc3.mif"));
        assert!(out.contains("fig1"));
    }

    #[test]
    fn test_resolve_before_placement_is_protocol_error() {
        let mut table = CrossRefTable::new();
        let reg = ElementRegistry::new();
        let idx = table.add(CrossRefInfo {
            key: key("ghost"),
            kind: RefKind::XRef,
            column: 0,
        });
        let resolver = RefResolver {
            table: &table,
            registry: &reg,
            filenames: &[],
            wrap_column: 160,
        };
        let mut out = String::new();
        assert!(resolver.substitute(idx, &mut out).is_err());
    }

    #[test]
    fn test_resolve_out_of_bounds_is_protocol_error() {
        let table = CrossRefTable::new();
        let reg = ElementRegistry::new();
        let resolver = RefResolver {
            table: &table,
            registry: &reg,
            filenames: &[],
            wrap_column: 160,
        };
        let mut out = String::new();
        assert!(resolver.substitute(9, &mut out).is_err());
    }

    #[test]
    fn test_unreferenced_potential_marker_resolves_to_nothing() {
        let mut table = CrossRefTable::new();
        let mut reg = ElementRegistry::new();
        let k = key("quiet");
        reg.set_component(&k, 0).unwrap();
        let idx = table.add(CrossRefInfo {
            key: k,
            kind: RefKind::PotentialMarker,
            column: 0,
        });
        let resolver = RefResolver {
            table: &table,
            registry: &reg,
            filenames: &["doc.mif".to_string()],
            wrap_column: 160,
        };
        let mut out = String::new();
        resolver.substitute(idx, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
