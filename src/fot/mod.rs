//! Flow-object machinery shared by every rendering backend.
//!
//! This module contains:
//! - The event protocol the upstream style evaluator drives (one tagged
//!   variant per flow-object operation)
//! - The inherited-characteristic context stack
//! - Display-space and break-request combination

pub mod context;
pub mod event;
pub mod space;

pub use context::{CellMargins, CharProps, ContextStack, FormatContext, PageProps, ParaProps};
pub use event::{
    BorderSpec, CellNic, Characteristic, Color, ColumnNic, ColumnWidth, DisplayNic, Event,
    FontPosture, FontWeight, GraphicNic, HfPart, HfPosition, HfRegion, LinkNic, NodeRef, Quadding,
    RuleNic, RuleOrientation, ScoreKind, TableNic,
};
pub use space::{BreakKind, DisplaySpace, SpaceCombiner};
