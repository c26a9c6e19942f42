//! # folio
//!
//! A rendering backend for flow-object trees: it consumes a stream of
//! structural and styling events describing an already-laid-out abstract
//! document — paragraphs, tables, links, scores, page sequences,
//! inherited characteristics — and emits page-layout interchange books.
//!
//! ## Features
//!
//! - Inherited-characteristic context stack with strict value semantics
//! - Display-space and break-request combination across nested displays
//! - Deferred cross-references: page numbers and hyperlink targets are
//!   emitted as placeholders and resolved once the whole document has
//!   been assembled into book components
//! - Table layout with proportional columns, spanning cells and
//!   neighbor-aware border resolution
//! - Multi-component book assembly with a manifest file
//!
//! ## Quick Start
//!
//! ```
//! use folio::{BuilderOptions, DisplayNic, Event, MifBuilder};
//!
//! let mut builder = MifBuilder::new(BuilderOptions::new("out/doc.mif"));
//! builder.handle(Event::Start)?;
//! builder.handle(Event::StartParagraph(DisplayNic::default()))?;
//! builder.handle(Event::Characters("Hello, world".to_string()))?;
//! builder.handle(Event::EndParagraph)?;
//! builder.handle(Event::End)?;
//! let markup = builder.render_component(0)?;
//! assert!(markup.contains("<String `Hello, world'>"));
//! # Ok::<(), folio::Error>(())
//! ```
//!
//! The upstream style evaluator, source-document parsing and option
//! handling are external collaborators; this crate starts at the event
//! protocol ([`Event`]) and ends at committed output files
//! ([`MifBuilder::finish`]).

pub mod error;
pub mod fot;
pub mod length;
pub mod mif;

pub use error::{Error, Result};
pub use fot::{
    BorderSpec, BreakKind, CellNic, Characteristic, Color, ColumnNic, ColumnWidth, ContextStack,
    DisplayNic, DisplaySpace, Event, FontPosture, FontWeight, FormatContext, GraphicNic, HfPart,
    HfPosition, HfRegion, LinkNic, NodeRef, Quadding, RuleNic, RuleOrientation, ScoreKind,
    SpaceCombiner, TableNic,
};
pub use length::Pt;
pub use mif::{BuilderOptions, MifBuilder};
