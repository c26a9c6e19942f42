//! Border descriptors and edge resolution.
//!
//! Every table cell carries four borders; tables carry edge defaults.
//! Adjacent cells share physical edges, so each edge must end up with
//! exactly one line style: resolution projects the winning border onto
//! the receiving edge and switches off a donating cell-level border so
//! the shared line is drawn once.

use crate::fot::event::{BorderSpec, Color};
use crate::length::Pt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Border {
    pub present: bool,
    pub priority: i32,
    pub thickness: Pt,
    pub repeat: u32,
    pub separation: Pt,
    pub color: Color,
    /// Cell-level borders may be consumed during resolution;
    /// table-level borders never are.
    pub cell_level: bool,
}

impl Border {
    pub fn from_spec(spec: &BorderSpec, cell_level: bool) -> Border {
        Border {
            present: spec.present,
            priority: spec.priority,
            thickness: spec.thickness,
            repeat: spec.repeat,
            separation: spec.separation,
            color: spec.color,
            cell_level,
        }
    }

    pub fn absent() -> Border {
        Border {
            present: false,
            priority: 0,
            thickness: Pt(1.0),
            repeat: 1,
            separation: Pt::ZERO,
            color: Color::BLACK,
            cell_level: true,
        }
    }

    /// Resolve this edge against the facing neighbor border.
    ///
    /// The neighbor's values are kept when the neighbor has strictly
    /// higher priority, or equal priority and the neighbor is a present
    /// table-level border. A donating cell-level neighbor has its own
    /// presence turned off: its line has been projected onto this edge.
    pub fn resolve(&mut self, neighbor: &mut Border) {
        let adopt = neighbor.priority > self.priority
            || (neighbor.priority == self.priority && !neighbor.cell_level && neighbor.present);
        if adopt {
            self.present = neighbor.present;
            self.priority = neighbor.priority;
            self.thickness = neighbor.thickness;
            self.repeat = neighbor.repeat;
            self.separation = neighbor.separation;
            self.color = neighbor.color;
            if neighbor.cell_level {
                neighbor.present = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn border(priority: i32, present: bool, cell_level: bool) -> Border {
        Border {
            present,
            priority,
            thickness: Pt(priority as f64 + 1.0),
            repeat: 1,
            separation: Pt::ZERO,
            color: Color::BLACK,
            cell_level,
        }
    }

    #[test]
    fn test_higher_priority_neighbor_donates() {
        let mut edge = border(0, true, true);
        let mut neighbor = border(5, true, true);
        edge.resolve(&mut neighbor);
        assert_eq!(edge.thickness, Pt(6.0));
        assert_eq!(edge.priority, 5);
        // The donating cell-level border is consumed.
        assert!(!neighbor.present);
    }

    #[test]
    fn test_equal_priority_cell_neighbor_does_not_donate() {
        let mut edge = border(3, true, true);
        let mut neighbor = border(3, true, true);
        let before = edge;
        edge.resolve(&mut neighbor);
        assert_eq!(edge, before);
        assert!(neighbor.present);
    }

    #[test]
    fn test_equal_priority_table_border_donates_without_consumption() {
        let mut edge = border(3, false, true);
        let mut table_edge = border(3, true, false);
        edge.resolve(&mut table_edge);
        assert!(edge.present);
        assert_eq!(edge.thickness, Pt(4.0));
        assert!(table_edge.present);
    }

    #[test]
    fn test_absent_table_border_does_not_donate_at_equal_priority() {
        let mut edge = border(3, true, true);
        let mut table_edge = border(3, false, false);
        let before = edge;
        edge.resolve(&mut table_edge);
        assert_eq!(edge, before);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut edge = border(0, true, true);
        let mut neighbor = border(5, true, true);
        edge.resolve(&mut neighbor);
        let (edge1, neighbor1) = (edge, neighbor);
        edge.resolve(&mut neighbor);
        assert_eq!(edge, edge1);
        assert_eq!(neighbor, neighbor1);
    }

    fn arb_border() -> impl Strategy<Value = Border> {
        (
            any::<bool>(),
            0i32..4,
            1u32..3,
            any::<bool>(),
            0u8..3,
        )
            .prop_map(|(present, priority, repeat, cell_level, shade)| Border {
                present,
                priority,
                thickness: Pt(priority as f64 * 0.5 + 0.5),
                repeat,
                separation: Pt::ZERO,
                color: Color::new(shade * 100, 0, 0),
                cell_level,
            })
    }

    proptest! {
        #[test]
        fn prop_resolve_twice_equals_resolve_once(
            a in arb_border(),
            b in arb_border(),
        ) {
            let mut edge1 = a;
            let mut neighbor1 = b;
            edge1.resolve(&mut neighbor1);
            let mut edge2 = edge1;
            let mut neighbor2 = neighbor1;
            edge2.resolve(&mut neighbor2);
            prop_assert_eq!(edge1, edge2);
            prop_assert_eq!(neighbor1, neighbor2);
        }

        #[test]
        fn prop_consumed_neighbor_is_always_cell_level(
            a in arb_border(),
            b in arb_border(),
        ) {
            let mut edge = a;
            let mut neighbor = b;
            edge.resolve(&mut neighbor);
            if b.present && !neighbor.present {
                prop_assert!(b.cell_level);
            }
        }

        #[test]
        fn prop_table_level_neighbor_never_mutated(
            a in arb_border(),
            b in arb_border().prop_map(|mut b| { b.cell_level = false; b }),
        ) {
            let mut edge = a;
            let mut neighbor = b;
            edge.resolve(&mut neighbor);
            prop_assert_eq!(neighbor, b);
        }
    }
}
