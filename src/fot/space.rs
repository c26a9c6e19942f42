//! Display-space and break-request combination.
//!
//! Nested display flow objects each contribute a space-before/space-after
//! request and possibly a page or column break request. All of them collapse
//! onto the single physical boundary of the next paragraph: the combiner
//! queues requests as they arrive and folds them when the paragraph opens.

use crate::length::Pt;

/// A page or column break request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    Page,
    Column,
}

/// A requested amount of blank vertical space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySpace {
    pub nominal: Pt,
    pub min: Pt,
    pub max: Pt,
    pub priority: i32,
    /// A conditional space is dropped at the top of a page or column.
    pub conditional: bool,
    /// Forced spaces accumulate instead of competing by priority.
    pub force: bool,
}

impl Default for DisplaySpace {
    fn default() -> Self {
        DisplaySpace {
            nominal: Pt::ZERO,
            min: Pt::ZERO,
            max: Pt::ZERO,
            priority: 0,
            conditional: true,
            force: false,
        }
    }
}

impl DisplaySpace {
    pub fn fixed(nominal: Pt) -> DisplaySpace {
        DisplaySpace {
            nominal,
            min: nominal,
            max: nominal,
            ..DisplaySpace::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        self.nominal.is_zero() && self.min.is_zero() && self.max.is_zero()
    }

    /// Fold another request into this one.
    ///
    /// A forced space adds to an already-forced total, or replaces a
    /// non-forced one outright. Between non-forced spaces the higher
    /// priority wins; at equal priority the larger nominal wins; equal
    /// nominals widen the `[min, max]` envelope.
    pub fn combine(&mut self, other: &DisplaySpace) {
        if other.force {
            if self.force {
                self.nominal += other.nominal;
                self.min += other.min;
                self.max += other.max;
            } else {
                *self = *other;
            }
            return;
        }
        if self.force {
            return;
        }
        if other.priority > self.priority {
            *self = *other;
        } else if other.priority == self.priority {
            if other.nominal > self.nominal {
                *self = *other;
            } else if other.nominal == self.nominal {
                self.min = self.min.min(other.min);
                self.max = self.max.max(other.max);
                self.conditional = self.conditional && other.conditional;
            }
        }
    }
}

/// Collects the space and break requests queued between two paragraph
/// boundaries and folds them into one effective decision.
#[derive(Debug, Default)]
pub struct SpaceCombiner {
    queued: Vec<DisplaySpace>,
    pending_break: Option<BreakKind>,
}

impl SpaceCombiner {
    pub fn new() -> SpaceCombiner {
        SpaceCombiner::default()
    }

    /// Queue one (space, break) request pair from a display flow object
    /// boundary.
    ///
    /// A break request clears the space accumulated so far. If a break was
    /// already pending, the earlier one is returned: the caller must
    /// synthesize an empty paragraph to carry it, since one paragraph
    /// boundary can absorb only one break.
    pub fn request(
        &mut self,
        space: &DisplaySpace,
        brk: Option<BreakKind>,
    ) -> Option<BreakKind> {
        let mut displaced = None;
        if let Some(b) = brk {
            self.queued.clear();
            displaced = self.pending_break.replace(b);
        }
        if !space.is_zero() || space.force {
            self.queued.push(*space);
        }
        displaced
    }

    /// True if a break request is waiting for the next paragraph.
    pub fn break_pending(&self) -> bool {
        self.pending_break.is_some()
    }

    /// Drain the queue at a paragraph boundary.
    ///
    /// Returns the effective space-before (if any) and the pending break.
    /// Conditional spaces are dropped when a break is pending, since they
    /// would land at the top of a page or column.
    pub fn take(&mut self) -> (Option<DisplaySpace>, Option<BreakKind>) {
        let brk = self.pending_break.take();
        let mut effective: Option<DisplaySpace> = None;
        for space in self.queued.drain(..) {
            if brk.is_some() && space.conditional {
                continue;
            }
            match effective.as_mut() {
                Some(acc) => acc.combine(&space),
                None => effective = Some(space),
            }
        }
        (effective, brk)
    }
}
