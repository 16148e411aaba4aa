//! The Golle–Modadugu augmented scheme.
//!
//! Parameterized by strength `a` (redundant long-range chains to a future
//! signature) and period `p` (length of the repeating offset template).
//! Each index class `i mod p` has a fixed list of destination offsets
//! (`doffsets`); the source offsets are their algebraic inverse. Offset
//! templates repeat modulo `p`, but actual stream indices are plain
//! integers with no modular reduction.

use alta_core::error::AltaError;
use alta_core::types::Index;

use crate::Scheme;

// ── Period construction ──────────────────────────────────────────────────────

/// One node of the within-period DAG, arena-indexed. `edges` point at the
/// nodes that will carry this node's hash; `pred` is the insertion-order
/// predecessor chain used to flatten the graph.
struct PeriodNode {
    edges: Vec<usize>,
    pred: Option<usize>,
}

/// Builder for the within-period DAG of an odd period >= 3.
///
/// Starts with two nodes A and B. Each `augment` step inserts two nodes
/// between the current insertion point and its predecessor, doubling up the
/// short-range chains. After (p-1)/2 steps the predecessor chain holds
/// p + 1 nodes; the first and last are identified with index class 0 of
/// adjacent periods, and the interior nodes yield the offset template.
struct AugmentedPeriod {
    nodes: Vec<PeriodNode>,
    tail: usize,
    next_insert: usize,
}

impl AugmentedPeriod {
    fn new() -> Self {
        let a = PeriodNode {
            edges: Vec::new(),
            pred: None,
        };
        let b = PeriodNode {
            edges: Vec::new(),
            pred: Some(0),
        };
        Self {
            nodes: vec![a, b],
            tail: 1,
            next_insert: 1,
        }
    }

    fn augment(&mut self) {
        let q = self.next_insert;
        let p = self.nodes[q].pred.expect("insertion point always has a predecessor");
        let n1 = self.nodes.len();
        self.nodes.push(PeriodNode {
            edges: vec![p, q],
            pred: Some(p),
        });
        let n2 = self.nodes.len();
        self.nodes.push(PeriodNode {
            edges: vec![n1, q],
            pred: Some(n1),
        });
        self.nodes[q].pred = Some(n2);
        self.next_insert = n2;
    }

    /// Flatten in reverse-predecessor order and emit the sorted destination
    /// offsets of each interior node.
    fn doffsets(&self) -> Vec<Vec<i64>> {
        let mut chain = Vec::with_capacity(self.nodes.len());
        let mut n = Some(self.tail);
        while let Some(i) = n {
            chain.push(i);
            n = self.nodes[i].pred;
        }
        chain.reverse();

        let mut idx_of = vec![0i64; self.nodes.len()];
        for (pos, &node) in chain.iter().enumerate() {
            idx_of[node] = pos as i64;
        }

        chain[1..chain.len() - 1]
            .iter()
            .map(|&node| {
                let mut offs: Vec<i64> = self.nodes[node]
                    .edges
                    .iter()
                    .map(|&d| idx_of[d] - idx_of[node])
                    .collect();
                offs.sort_unstable();
                offs
            })
            .collect()
    }
}

// ── AugmentedScheme ──────────────────────────────────────────────────────────

pub struct AugmentedScheme {
    a: u32,
    p: u32,
    doffsets: Vec<Vec<i64>>,
    soffsets: Vec<Vec<i64>>,
}

impl AugmentedScheme {
    /// Build the offset tables for strength `a >= 1` and period
    /// `p in {1, 2} or odd >= 3`.
    pub fn new(a: u32, p: u32) -> Result<Self, AltaError> {
        if a < 1 {
            return Err(AltaError::InvalidParameter { a, p });
        }
        let a64 = a as i64;
        let p64 = p as i64;

        let doffsets: Vec<Vec<i64>> = match p {
            1 => vec![vec![1, a64]],
            2 => vec![vec![2, 2 * a64], vec![-1, 1]],
            _ if p >= 3 && p % 2 == 1 => {
                let mut period = AugmentedPeriod::new();
                for _ in 0..(p - 1) / 2 {
                    period.augment();
                }
                // Long-range anchor chains for index class 0, then the
                // interior template.
                let mut d = vec![vec![p64, p64 * a64]];
                d.extend(period.doffsets());
                d
            }
            _ => return Err(AltaError::InvalidParameter { a, p }),
        };

        // Invert: a destination offset o out of class i is a source offset
        // -o into class (i + o) mod p.
        let mut soffsets: Vec<Vec<i64>> = vec![Vec::new(); p as usize];
        for (idx, dofs) in doffsets.iter().enumerate() {
            for &o in dofs {
                let class = (idx as i64 + o).rem_euclid(p64) as usize;
                soffsets[class].push(-o);
            }
        }

        Ok(Self {
            a,
            p,
            doffsets,
            soffsets,
        })
    }

    pub fn strength(&self) -> u32 {
        self.a
    }

    pub fn period(&self) -> u32 {
        self.p
    }

    /// Destination offset template, one list per index class.
    pub fn doffsets(&self) -> &[Vec<i64>] {
        &self.doffsets
    }

    /// Source offset template, one list per index class.
    pub fn soffsets(&self) -> &[Vec<i64>] {
        &self.soffsets
    }

    fn clip(offsets: &[i64], index: Index, first: Option<Index>, last: Option<Index>) -> Vec<Index> {
        let lo = first.map_or(0, |f| f as i64);
        let hi = last.map_or(Index::MAX as i64, |l| l as i64);
        let mut out: Vec<i64> = offsets
            .iter()
            .map(|&o| index as i64 + o)
            .filter(|&j| j >= lo && j <= hi)
            .collect();
        out.sort_unstable();
        out.dedup();
        out.into_iter().map(|j| j as Index).collect()
    }
}

impl Scheme for AugmentedScheme {
    fn sources(&self, index: Index, first: Option<Index>, last: Option<Index>) -> Vec<Index> {
        Self::clip(&self.soffsets[(index % self.p) as usize], index, first, last)
    }

    fn destinations(&self, index: Index, first: Option<Index>, last: Option<Index>) -> Vec<Index> {
        Self::clip(&self.doffsets[(index % self.p) as usize], index, first, last)
    }

    fn is_ready(&self, want_send_index: Index, latest_index: Index) -> bool {
        latest_index as i64 - want_send_index as i64 >= self.p as i64 - 1
    }

    fn in_write_window(&self, query_index: Index, latest_index: Index) -> bool {
        latest_index as i64 - query_index as i64 <= (self.a * self.p) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_one_tables() {
        let s = AugmentedScheme::new(1, 1).unwrap();
        assert_eq!(s.doffsets(), &[vec![1, 1]]);
        // Dedupe: both chains land one index back.
        assert_eq!(s.sources(5, None, None), vec![4]);

        let s = AugmentedScheme::new(3, 1).unwrap();
        assert_eq!(s.doffsets(), &[vec![1, 3]]);
        assert_eq!(s.sources(5, None, None), vec![2, 4]);
        assert_eq!(s.destinations(5, None, None), vec![6, 8]);
    }

    #[test]
    fn period_two_tables() {
        let s = AugmentedScheme::new(2, 2).unwrap();
        assert_eq!(s.doffsets(), &[vec![2, 4], vec![-1, 1]]);
        // Odd classes chain nothing; even classes carry everything.
        assert_eq!(s.sources(7, None, None), Vec::<Index>::new());
        assert_eq!(s.sources(8, None, None), vec![4, 6, 7, 9]);
    }

    #[test]
    fn a3_p5_tables_match_construction() {
        let s = AugmentedScheme::new(3, 5).unwrap();
        assert_eq!(
            s.doffsets(),
            &[
                vec![5, 15],
                vec![-1, 4],
                vec![-1, 2],
                vec![-1, 1],
                vec![-3, 1],
            ]
        );
        assert_eq!(s.sources(5, None, None), vec![0, 1, 4, 6]);
        assert_eq!(s.sources(0, Some(0), None), Vec::<Index>::new());
        assert_eq!(s.destinations(0, None, None), vec![5, 15]);
    }

    #[test]
    fn source_destination_symmetry() {
        for (a, p) in [(1u32, 1u32), (2, 2), (3, 5), (2, 7), (1, 9), (4, 11)] {
            let s = AugmentedScheme::new(a, p).unwrap();
            for (idx, dofs) in s.doffsets().iter().enumerate() {
                for &o in dofs {
                    let class = (idx as i64 + o).rem_euclid(p as i64) as usize;
                    assert!(
                        s.soffsets()[class].contains(&-o),
                        "a={a} p={p}: doffset {o} of class {idx} missing inverse"
                    );
                }
            }
            let total_d: usize = s.doffsets().iter().map(Vec::len).sum();
            let total_s: usize = s.soffsets().iter().map(Vec::len).sum();
            assert_eq!(total_d, total_s);
        }
    }

    #[test]
    fn clipping_bounds_inclusive() {
        let s = AugmentedScheme::new(3, 5).unwrap();
        assert_eq!(s.sources(5, Some(1), Some(4)), vec![1, 4]);
        assert_eq!(s.sources(5, None, Some(5)), vec![0, 1, 4]);
        assert_eq!(s.destinations(0, None, Some(5)), vec![5]);
    }

    #[test]
    fn readiness_window() {
        let s = AugmentedScheme::new(3, 5).unwrap();
        assert!(!s.is_ready(10, 13));
        assert!(s.is_ready(10, 14));
        assert!(s.is_ready(10, 20));

        let s1 = AugmentedScheme::new(1, 1).unwrap();
        assert!(s1.is_ready(10, 10));
    }

    #[test]
    fn write_window() {
        let s = AugmentedScheme::new(3, 5).unwrap();
        assert!(s.in_write_window(5, 20));
        assert!(!s.in_write_window(4, 20));
        // Future indices are trivially still needed.
        assert!(s.in_write_window(25, 20));
    }

    #[test]
    fn invalid_parameters_rejected() {
        assert!(matches!(
            AugmentedScheme::new(3, 4),
            Err(AltaError::InvalidParameter { .. })
        ));
        assert!(matches!(
            AugmentedScheme::new(3, 0),
            Err(AltaError::InvalidParameter { .. })
        ));
        assert!(matches!(
            AugmentedScheme::new(0, 5),
            Err(AltaError::InvalidParameter { .. })
        ));
        assert!(AugmentedScheme::new(1, 7).is_ok());
    }
}
