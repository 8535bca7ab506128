//! Sparsity map: which block addresses satisfy the selection rule.
//!
//! The map is a dense table over lexicographic block ordinals, rebuilt
//! whenever a tensor is resized. Lookup is O(1); the sorted storage vector
//! of the owning tensor holds the actual slot for materialized blocks.

use smallvec::SmallVec;

use crate::block::BlockIndex;
use crate::symmetry::{QnSpace, QuantumNumber};

/// Allowed-block table over ordinal block addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparsityMap {
    block_shape: SmallVec<[usize; 8]>,
    allowed: Vec<bool>,
    n_allowed: usize,
}

impl SparsityMap {
    /// Enumerate every block-index combination and mark the addresses whose
    /// combined labels equal `q_total`.
    pub fn build<Q: QuantumNumber>(q_total: &Q, spaces: &[QnSpace<Q>]) -> Self {
        let block_shape: SmallVec<[usize; 8]> = spaces.iter().map(|s| s.nblocks()).collect();
        let n_total: usize = block_shape.iter().product();

        let mut allowed = vec![false; n_total];
        let mut n_allowed = 0;
        for (ordinal, slot) in allowed.iter_mut().enumerate() {
            let index = BlockIndex::from_ordinal(ordinal, &block_shape);
            let mut q = Q::zero();
            for (m, space) in spaces.iter().enumerate() {
                q = q.combine(space.label(index[m]));
            }
            if q == *q_total {
                *slot = true;
                n_allowed += 1;
            }
        }

        SparsityMap {
            block_shape,
            allowed,
            n_allowed,
        }
    }

    /// Per-mode block counts.
    #[inline]
    pub fn block_shape(&self) -> &[usize] {
        &self.block_shape
    }

    /// Total number of block addresses.
    #[inline]
    pub fn num_addresses(&self) -> usize {
        self.allowed.len()
    }

    /// Number of addresses satisfying the selection rule.
    #[inline]
    pub fn num_allowed(&self) -> usize {
        self.n_allowed
    }

    /// Whether the address at `ordinal` satisfies the selection rule.
    #[inline]
    pub fn is_allowed(&self, ordinal: usize) -> bool {
        self.allowed.get(ordinal).copied().unwrap_or(false)
    }

    /// Ascending iterator over allowed ordinals.
    pub fn iter_allowed(&self) -> impl Iterator<Item = usize> + '_ {
        self.allowed
            .iter()
            .enumerate()
            .filter_map(|(t, &ok)| ok.then_some(t))
    }
}
