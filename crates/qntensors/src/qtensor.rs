//! Quantum-number block-sparse tensor.
//!
//! [`QnTensor`] owns a total label, one [`QnSpace`] per mode, a
//! [`SparsityMap`] over block addresses, and a storage vector of dense
//! blocks kept sorted by lexicographic ordinal. A block may hold data only
//! if its per-mode labels combine to the total label.
//!
//! Storage is a sorted vector used as an associative map: `O(log nnz)`
//! lookup, positional insert on [`reserve`](QnTensor::reserve). Callers get
//! ordinals and short-lived borrows rather than storage positions, since
//! insertion shifts positions.

use smallvec::SmallVec;

use crate::block::BlockIndex;
use crate::dense::DenseBlock;
use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::sparsity::SparsityMap;
use crate::symmetry::{QnSpace, QuantumNumber};

/// Block-sparse tensor with an abelian quantum-number selection rule.
///
/// # Example
///
/// ```
/// use qntensors::block::BlockIndex;
/// use qntensors::qtensor::QnTensor;
/// use qntensors::symmetry::{QnSpace, U1};
///
/// let s = QnSpace::new(vec![U1(-1), U1(1)], vec![2, 2]).unwrap();
/// let mut t = QnTensor::<f64, U1>::new(U1(0), vec![s.clone(), s]).unwrap();
///
/// // (-1, +1) couples to 0: allowed
/// t.reserve(&BlockIndex::new(&[0, 1])).unwrap();
/// // (+1, +1) couples to +2: forbidden
/// assert!(t.reserve(&BlockIndex::new(&[1, 1])).is_err());
/// assert_eq!(t.nnzblocks(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QnTensor<T: Scalar, Q: QuantumNumber> {
    q_total: Q,
    spaces: Vec<QnSpace<Q>>,
    sparsity: SparsityMap,
    blocks: Vec<(usize, DenseBlock<T>)>,
}

/// Metadata and ordered block list of a [`QnTensor`], sufficient for exact
/// reconstruction. The sparsity map is derived state and rebuilt on
/// reassembly; the wire format belongs to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct QnTensorParts<T: Scalar, Q: QuantumNumber> {
    pub q_total: Q,
    pub spaces: Vec<QnSpace<Q>>,
    pub blocks: Vec<(usize, DenseBlock<T>)>,
}

impl<T: Scalar, Q: QuantumNumber> QnTensor<T, Q> {
    /// Create an empty tensor with the given total label and mode spaces.
    ///
    /// # Errors
    ///
    /// [`TensorError::Shape`] if `spaces` is empty; rank-0 tensors are not
    /// representable (scalar results go through `dotu`/`dotc`).
    pub fn new(q_total: Q, spaces: Vec<QnSpace<Q>>) -> Result<Self, TensorError> {
        if spaces.is_empty() {
            return Err(TensorError::shape("tensor needs at least one mode"));
        }
        let sparsity = SparsityMap::build(&q_total, &spaces);
        Ok(QnTensor {
            q_total,
            spaces,
            sparsity,
            blocks: Vec::new(),
        })
    }

    /// Replace all metadata, rebuild the sparsity map, and discard storage
    /// unconditionally. Fails like [`new`](Self::new) on an empty mode list,
    /// leaving the tensor untouched.
    pub fn resize(&mut self, q_total: Q, spaces: Vec<QnSpace<Q>>) -> Result<(), TensorError> {
        if spaces.is_empty() {
            return Err(TensorError::shape("tensor needs at least one mode"));
        }
        self.sparsity = SparsityMap::build(&q_total, &spaces);
        self.q_total = q_total;
        self.spaces = spaces;
        self.blocks.clear();
        Ok(())
    }

    /// Number of modes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.spaces.len()
    }

    /// Total quantum label.
    #[inline]
    pub fn q(&self) -> &Q {
        &self.q_total
    }

    /// Mode space of mode `i`.
    #[inline]
    pub fn qspace(&self, i: usize) -> &QnSpace<Q> {
        &self.spaces[i]
    }

    /// All mode spaces.
    #[inline]
    pub fn spaces(&self) -> &[QnSpace<Q>] {
        &self.spaces
    }

    /// Per-mode block counts.
    #[inline]
    pub fn block_shape(&self) -> &[usize] {
        self.sparsity.block_shape()
    }

    /// Sparsity map over block addresses.
    #[inline]
    pub fn sparsity(&self) -> &SparsityMap {
        &self.sparsity
    }

    /// Number of materialized blocks.
    #[inline]
    pub fn nnzblocks(&self) -> usize {
        self.blocks.len()
    }

    /// Dense extents of the block at `index`.
    pub fn block_dims(&self, index: &BlockIndex) -> SmallVec<[usize; 8]> {
        self.spaces
            .iter()
            .enumerate()
            .map(|(m, s)| s.extent(index[m]))
            .collect()
    }

    /// Lexicographic ordinal of `index`, range-checked.
    pub fn ordinal_of(&self, index: &BlockIndex) -> Result<usize, TensorError> {
        index.ordinal(self.sparsity.block_shape())
    }

    /// Whether `index` satisfies the selection rule.
    pub fn is_allowed(&self, index: &BlockIndex) -> Result<bool, TensorError> {
        Ok(self.sparsity.is_allowed(self.ordinal_of(index)?))
    }

    /// Materialize the block at `index`, zero-initialized if absent, and
    /// return a borrow of it.
    ///
    /// # Errors
    ///
    /// [`TensorError::BlockNotAllowed`] if the address fails the selection
    /// rule; [`TensorError::IndexOutOfRange`] for bad positions. On error
    /// the storage vector and sparsity map are untouched.
    pub fn reserve(&mut self, index: &BlockIndex) -> Result<&mut DenseBlock<T>, TensorError> {
        let ordinal = self.ordinal_of(index)?;
        if !self.sparsity.is_allowed(ordinal) {
            return Err(TensorError::BlockNotAllowed {
                block: index.coords().to_vec(),
            });
        }
        Ok(self.reserve_allowed(ordinal))
    }

    /// [`reserve`](Self::reserve) addressed by ordinal.
    pub fn reserve_ordinal(&mut self, ordinal: usize) -> Result<&mut DenseBlock<T>, TensorError> {
        if ordinal >= self.sparsity.num_addresses() {
            return Err(TensorError::IndexOutOfRange {
                index: ordinal,
                dim_size: self.sparsity.num_addresses(),
            });
        }
        if !self.sparsity.is_allowed(ordinal) {
            let index = BlockIndex::from_ordinal(ordinal, self.sparsity.block_shape());
            return Err(TensorError::BlockNotAllowed {
                block: index.coords().to_vec(),
            });
        }
        Ok(self.reserve_allowed(ordinal))
    }

    fn reserve_allowed(&mut self, ordinal: usize) -> &mut DenseBlock<T> {
        let pos = match self.blocks.binary_search_by_key(&ordinal, |(t, _)| *t) {
            Ok(pos) => pos,
            Err(pos) => {
                let index = BlockIndex::from_ordinal(ordinal, self.sparsity.block_shape());
                let dims = self.block_dims(&index);
                self.blocks.insert(pos, (ordinal, DenseBlock::zeros(&dims)));
                pos
            }
        };
        &mut self.blocks[pos].1
    }

    /// Insert a block at `index`, accumulating into an existing block.
    ///
    /// The block shape must equal the declared extents of the address.
    pub fn insertblock(
        &mut self,
        index: &BlockIndex,
        block: DenseBlock<T>,
    ) -> Result<(), TensorError> {
        let dims = self.block_dims(index);
        if block.shape() != &dims[..] {
            return Err(TensorError::ShapeMismatch {
                expected: dims.iter().product(),
                actual: block.len(),
            });
        }
        let dst = self.reserve(index)?;
        dst.axpy(T::one(), &block)
    }

    /// Borrow the block at `index`, if materialized.
    pub fn blockview(&self, index: &BlockIndex) -> Option<&DenseBlock<T>> {
        let ordinal = index.ordinal(self.sparsity.block_shape()).ok()?;
        self.blockview_ordinal(ordinal)
    }

    /// Mutably borrow the block at `index`, if materialized.
    pub fn blockview_mut(&mut self, index: &BlockIndex) -> Option<&mut DenseBlock<T>> {
        let ordinal = index.ordinal(self.sparsity.block_shape()).ok()?;
        let pos = self.blocks.binary_search_by_key(&ordinal, |(t, _)| *t).ok()?;
        Some(&mut self.blocks[pos].1)
    }

    /// Borrow the block stored at `ordinal`, if materialized.
    pub fn blockview_ordinal(&self, ordinal: usize) -> Option<&DenseBlock<T>> {
        let pos = self.blocks.binary_search_by_key(&ordinal, |(t, _)| *t).ok()?;
        Some(&self.blocks[pos].1)
    }

    /// Materialized blocks as `(ordinal, block)`, ascending by ordinal.
    #[inline]
    pub fn blocks(&self) -> &[(usize, DenseBlock<T>)] {
        &self.blocks
    }

    /// Mutable access to the materialized blocks, ascending by ordinal.
    /// Ordinals must not be modified.
    #[inline]
    pub fn blocks_mut(&mut self) -> &mut [(usize, DenseBlock<T>)] {
        &mut self.blocks
    }

    /// Iterate `(BlockIndex, block)` in ascending ordinal order.
    pub fn iter_blocks(&self) -> impl Iterator<Item = (BlockIndex, &DenseBlock<T>)> + '_ {
        let shape = self.sparsity.block_shape();
        self.blocks
            .iter()
            .map(move |(t, b)| (BlockIndex::from_ordinal(*t, shape), b))
    }

    /// Drop all materialized blocks; metadata is kept.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Negate the total label and every per-mode label in place. Numeric
    /// data is untouched; the sparsity map is unchanged because negation
    /// maps allowed addresses to allowed addresses.
    pub fn conjugate_in_place(&mut self) {
        self.q_total = self.q_total.negate();
        for s in &mut self.spaces {
            s.conjugate_in_place();
        }
    }

    /// Conjugated copy: all labels negated, data unchanged.
    pub fn conjugate(&self) -> Self {
        let mut c = self.clone();
        c.conjugate_in_place();
        c
    }

    /// Materialize every allowed block and fill it with `value`.
    pub fn fill(&mut self, value: T) {
        let allowed: Vec<usize> = self.sparsity.iter_allowed().collect();
        for ordinal in allowed {
            self.reserve_allowed(ordinal).fill(value);
        }
    }

    /// Decompose into metadata plus the ordered block list.
    pub fn into_parts(self) -> QnTensorParts<T, Q> {
        QnTensorParts {
            q_total: self.q_total,
            spaces: self.spaces,
            blocks: self.blocks,
        }
    }

    /// Reassemble a tensor from [`QnTensorParts`], rebuilding the sparsity
    /// map and validating every stored block against it.
    pub fn from_parts(parts: QnTensorParts<T, Q>) -> Result<Self, TensorError> {
        let sparsity = SparsityMap::build(&parts.q_total, &parts.spaces);
        let mut prev = None;
        for (ordinal, _) in &parts.blocks {
            if prev.is_some_and(|p| p >= *ordinal) {
                return Err(TensorError::shape("block list is not sorted by ordinal"));
            }
            prev = Some(*ordinal);
            if !sparsity.is_allowed(*ordinal) {
                let index = BlockIndex::from_ordinal(*ordinal, sparsity.block_shape());
                return Err(TensorError::BlockNotAllowed {
                    block: index.coords().to_vec(),
                });
            }
        }
        Ok(QnTensor {
            q_total: parts.q_total,
            spaces: parts.spaces,
            sparsity,
            blocks: parts.blocks,
        })
    }

    /// Materialize the full dense tensor, placing each block at its
    /// per-mode label offsets. Intended for small verification problems.
    pub fn to_dense(&self) -> DenseBlock<T> {
        let full_shape: SmallVec<[usize; 8]> =
            self.spaces.iter().map(|s| s.total_dim()).collect();
        let mut out = DenseBlock::zeros(&full_shape);

        // running dense offset of each block along each mode
        let offsets: Vec<Vec<usize>> = self
            .spaces
            .iter()
            .map(|s| {
                let mut acc = 0;
                s.extents()
                    .iter()
                    .map(|&e| {
                        let o = acc;
                        acc += e;
                        o
                    })
                    .collect()
            })
            .collect();

        for (index, block) in self.iter_blocks() {
            let dims = block.shape().to_vec();
            if block.is_empty() {
                continue;
            }
            let base: SmallVec<[usize; 8]> = (0..self.rank())
                .map(|m| offsets[m][index[m]])
                .collect();
            let mut idx: SmallVec<[usize; 8]> = SmallVec::from_elem(0, dims.len());
            for &v in block.data() {
                let dst: SmallVec<[usize; 8]> =
                    idx.iter().zip(base.iter()).map(|(&i, &o)| i + o).collect();
                // both walks are column-major, so this visits in data order
                out.set(&dst, v).expect("offsets stay in range");
                for (i, &d) in idx.iter_mut().zip(dims.iter()) {
                    *i += 1;
                    if *i < d {
                        break;
                    }
                    *i = 0;
                }
            }
        }
        out
    }
}
