//! Block multi-index for quantum-number block-sparse tensors.
//!
//! A [`BlockIndex`] identifies one block by its per-mode block position.
//! Blocks are addressed by a lexicographic (row-major) ordinal with respect
//! to the per-mode block counts; the sorted storage vector and every
//! merge-scan in the contraction path rely on that ordering.

use smallvec::SmallVec;

use crate::error::TensorError;
use crate::strides::{linear_index, row_major_strides, row_major_unravel};

/// Per-mode block positions of one block.
///
/// Uses `SmallVec<[usize; 8]>`: stack allocation for rank <= 8 with a heap
/// fallback above that.
///
/// # Example
/// ```
/// use qntensors::block::BlockIndex;
///
/// let b = BlockIndex::new(&[1, 0, 2]);
/// assert_eq!(b.rank(), 3);
/// assert_eq!(b[2], 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockIndex {
    coords: SmallVec<[usize; 8]>,
}

impl BlockIndex {
    /// Create a block index from per-mode positions.
    pub fn new(coords: &[usize]) -> Self {
        Self {
            coords: coords.iter().copied().collect(),
        }
    }

    /// Collect a block index from an iterator of positions.
    pub fn collect_from<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            coords: iter.into_iter().collect(),
        }
    }

    /// Decode a lexicographic ordinal back into a block index.
    pub fn from_ordinal(ordinal: usize, block_shape: &[usize]) -> Self {
        Self {
            coords: row_major_unravel(ordinal, block_shape),
        }
    }

    /// Number of modes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.coords.len()
    }

    /// Per-mode positions as a slice.
    #[inline]
    pub fn coords(&self) -> &[usize] {
        &self.coords
    }

    /// Lexicographic ordinal of this index for the given per-mode block
    /// counts. Positions are range-checked.
    pub fn ordinal(&self, block_shape: &[usize]) -> Result<usize, TensorError> {
        if self.coords.len() != block_shape.len() {
            return Err(TensorError::WrongNumberOfModes {
                expected: block_shape.len(),
                actual: self.coords.len(),
            });
        }
        for (&pos, &count) in self.coords.iter().zip(block_shape.iter()) {
            if pos >= count {
                return Err(TensorError::IndexOutOfRange {
                    index: pos,
                    dim_size: count,
                });
            }
        }
        Ok(linear_index(&self.coords, &row_major_strides(block_shape)))
    }

    /// Reordered copy: coordinate `i` of the result is `self[perm[i]]`.
    pub fn permute(&self, perm: &[usize]) -> Self {
        debug_assert_eq!(perm.len(), self.rank());
        Self {
            coords: perm.iter().map(|&i| self.coords[i]).collect(),
        }
    }

    /// Concatenation of two block indices.
    pub fn concat(&self, other: &BlockIndex) -> Self {
        Self {
            coords: self.coords.iter().chain(other.coords.iter()).copied().collect(),
        }
    }

    /// Split into leading `k` and trailing positions.
    pub fn split(&self, k: usize) -> (BlockIndex, BlockIndex) {
        (
            BlockIndex::new(&self.coords[..k]),
            BlockIndex::new(&self.coords[k..]),
        )
    }
}

impl std::ops::Index<usize> for BlockIndex {
    type Output = usize;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.coords[index]
    }
}

impl std::fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockIndex(")?;
        for (i, &c) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

impl<const N: usize> From<[usize; N]> for BlockIndex {
    fn from(coords: [usize; N]) -> Self {
        Self::new(&coords)
    }
}

impl From<&[usize]> for BlockIndex {
    fn from(coords: &[usize]) -> Self {
        Self::new(coords)
    }
}

impl From<Vec<usize>> for BlockIndex {
    fn from(coords: Vec<usize>) -> Self {
        Self::new(&coords)
    }
}
