//! Candidate-pair generation for the full graph's shared-taxonomy pass.
//!
//! Strategies only decide which item pairs have intersecting term-id sets;
//! which taxonomy (if any) is attributed to the edge is decided afterwards by
//! [`super::TaxonomyIndexer::shared_taxonomy_of`], so swapping strategies never
//! changes the output.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::content::TermId;

/// Yields `(i, j)` with `i < j`, sorted, for every pair of positions whose
/// term sets intersect.
pub trait PairStrategy: Send + Sync {
    fn candidate_pairs(&self, term_sets: &[BTreeSet<TermId>]) -> Vec<(usize, usize)>;
}

/// Compares every pair: O(n²) set intersections.
pub struct PairwiseScan;

impl PairStrategy for PairwiseScan {
    fn candidate_pairs(&self, term_sets: &[BTreeSet<TermId>]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..term_sets.len() {
            for j in (i + 1)..term_sets.len() {
                if !term_sets[i].is_disjoint(&term_sets[j]) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }
}

/// Term id → positions index; only items that share a term are ever paired.
pub struct InvertedIndex;

impl PairStrategy for InvertedIndex {
    fn candidate_pairs(&self, term_sets: &[BTreeSet<TermId>]) -> Vec<(usize, usize)> {
        let mut postings: HashMap<TermId, Vec<usize>> = HashMap::new();
        for (position, terms) in term_sets.iter().enumerate() {
            for term in terms {
                postings.entry(*term).or_default().push(position);
            }
        }

        let mut pairs = BTreeSet::new();
        for positions in postings.values() {
            for (k, &i) in positions.iter().enumerate() {
                for &j in &positions[k + 1..] {
                    pairs.insert((i, j));
                }
            }
        }
        pairs.into_iter().collect()
    }
}

/// Configurable choice of [`PairStrategy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStrategyKind {
    #[default]
    Pairwise,
    InvertedIndex,
}

impl PairStrategyKind {
    pub fn strategy(self) -> Box<dyn PairStrategy> {
        match self {
            Self::Pairwise => Box::new(PairwiseScan),
            Self::InvertedIndex => Box::new(InvertedIndex),
        }
    }
}
