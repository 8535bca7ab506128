//! Reversible packing of contiguous modes into one merged axis.
//!
//! [`MergeInfo`] is a pure value derived from a run of mode spaces: the
//! packed Cartesian product of their labels and extents, the deduplicated
//! merged label list, and the map from merged positions back to packed
//! positions with running element offsets. It holds no reference to any
//! tensor and can be reused across tensors sharing those modes.
//!
//! [`merge`] brings a block-sparse tensor into matrix form for dense
//! matrix kernels (SVD, QR); [`expand`] is its exact inverse. This is a
//! block-structure-preserving reshape, not a generic one: each source block
//! lands as a sub-rectangle of a merged block at its packed offset.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::block::BlockIndex;
use crate::error::TensorError;
use crate::qtensor::QnTensor;
use crate::scalar::Scalar;
use crate::symmetry::{QnSpace, QuantumNumber};

/// Packing descriptor for a run of contiguous modes.
#[derive(Debug, Clone)]
pub struct MergeInfo<Q: QuantumNumber> {
    spaces: Vec<QnSpace<Q>>,
    mode_shape: SmallVec<[usize; 8]>,
    packed_labels: Vec<Q>,
    packed_extents: Vec<usize>,
    packed_to_merged: Vec<usize>,
    packed_offsets: Vec<usize>,
    merged_labels: Vec<Q>,
    merged_extents: Vec<usize>,
    merged_to_packed: Vec<Vec<usize>>,
}

impl<Q: QuantumNumber> MergeInfo<Q> {
    /// Build packing metadata for the given mode run.
    ///
    /// Packed positions walk block-index combinations lexicographically.
    /// Merged labels keep first-seen order, which is stable for one build
    /// but not canonical across different mode runs.
    pub fn build(spaces: &[QnSpace<Q>]) -> Result<Self, TensorError> {
        if spaces.is_empty() {
            return Err(TensorError::shape("cannot merge an empty mode run"));
        }
        let mode_shape: SmallVec<[usize; 8]> = spaces.iter().map(|s| s.nblocks()).collect();
        let n_packed: usize = mode_shape.iter().product();

        let mut packed_labels = Vec::with_capacity(n_packed);
        let mut packed_extents = Vec::with_capacity(n_packed);
        let mut packed_to_merged = Vec::with_capacity(n_packed);
        let mut merged_labels: Vec<Q> = Vec::new();
        let mut merged_extents: Vec<usize> = Vec::new();
        let mut merged_to_packed: Vec<Vec<usize>> = Vec::new();
        let mut seen: HashMap<Q, usize> = HashMap::new();

        let mut packed_offsets = Vec::with_capacity(n_packed);
        for p in 0..n_packed {
            let index = BlockIndex::from_ordinal(p, &mode_shape);
            let mut q = Q::zero();
            let mut extent = 1;
            for (m, space) in spaces.iter().enumerate() {
                q = q.combine(space.label(index[m]));
                extent *= space.extent(index[m]);
            }

            let merged = *seen.entry(q.clone()).or_insert_with(|| {
                merged_labels.push(q.clone());
                merged_extents.push(0);
                merged_to_packed.push(Vec::new());
                merged_labels.len() - 1
            });

            packed_offsets.push(merged_extents[merged]);
            merged_extents[merged] += extent;
            merged_to_packed[merged].push(p);
            packed_labels.push(q);
            packed_extents.push(extent);
            packed_to_merged.push(merged);
        }

        Ok(MergeInfo {
            spaces: spaces.to_vec(),
            mode_shape,
            packed_labels,
            packed_extents,
            packed_to_merged,
            packed_offsets,
            merged_labels,
            merged_extents,
            merged_to_packed,
        })
    }

    /// Number of modes in the packed run.
    pub fn num_modes(&self) -> usize {
        self.spaces.len()
    }

    /// The original mode spaces.
    pub fn spaces(&self) -> &[QnSpace<Q>] {
        &self.spaces
    }

    /// Per-mode block counts of the run.
    pub fn mode_shape(&self) -> &[usize] {
        &self.mode_shape
    }

    /// Number of packed label combinations.
    pub fn num_packed(&self) -> usize {
        self.packed_labels.len()
    }

    /// Number of distinct merged labels.
    pub fn num_merged(&self) -> usize {
        self.merged_labels.len()
    }

    /// The merged axis as a mode space.
    pub fn merged_space(&self) -> QnSpace<Q> {
        QnSpace::new(self.merged_labels.clone(), self.merged_extents.clone())
            .expect("merged labels and extents are built in lockstep")
    }

    /// Packed position of a block sub-index within the run.
    pub fn packed_position(&self, index: &BlockIndex) -> Result<usize, TensorError> {
        index.ordinal(&self.mode_shape)
    }

    /// Block sub-index of a packed position.
    pub fn packed_index(&self, p: usize) -> BlockIndex {
        BlockIndex::from_ordinal(p, &self.mode_shape)
    }

    /// Merged position a packed position maps to.
    pub fn merged_of_packed(&self, p: usize) -> usize {
        self.packed_to_merged[p]
    }

    /// Element offset of a packed position within its merged extent.
    pub fn offset_of_packed(&self, p: usize) -> usize {
        self.packed_offsets[p]
    }

    /// Element count of a packed position.
    pub fn packed_extent(&self, p: usize) -> usize {
        self.packed_extents[p]
    }

    /// Label of a packed position.
    pub fn packed_label(&self, p: usize) -> &Q {
        &self.packed_labels[p]
    }

    /// Every packed position sharing merged position `m`, ascending.
    pub fn packed_of_merged(&self, m: usize) -> &[usize] {
        &self.merged_to_packed[m]
    }

    fn check_modes<T: Scalar>(
        &self,
        a: &QnTensor<T, Q>,
        start: usize,
    ) -> Result<(), TensorError> {
        for (m, space) in self.spaces.iter().enumerate() {
            let got = a.qspace(start + m);
            if got.labels() != space.labels() {
                return Err(TensorError::symmetry("mode labels differ from merge info"));
            }
            if got.extents() != space.extents() {
                return Err(TensorError::ShapeMismatch {
                    expected: space.total_dim(),
                    actual: got.total_dim(),
                });
            }
        }
        Ok(())
    }
}

/// Fold a rank `(K + L)` tensor into matrix form using a row run of K
/// modes and a column run of L modes.
pub fn merge<T: Scalar, Q: QuantumNumber>(
    a: &QnTensor<T, Q>,
    rows: &MergeInfo<Q>,
    cols: &MergeInfo<Q>,
) -> Result<QnTensor<T, Q>, TensorError> {
    let k = rows.num_modes();
    if a.rank() != k + cols.num_modes() {
        return Err(TensorError::WrongNumberOfModes {
            expected: k + cols.num_modes(),
            actual: a.rank(),
        });
    }
    rows.check_modes(a, 0)?;
    cols.check_modes(a, k)?;

    let mut out = QnTensor::new(
        a.q().clone(),
        vec![rows.merged_space(), cols.merged_space()],
    )?;

    for (index, block) in a.iter_blocks() {
        if block.is_empty() {
            continue;
        }
        let (ri, ci) = index.split(k);
        let pr = rows.packed_position(&ri)?;
        let pc = cols.packed_position(&ci)?;
        let mr = rows.merged_of_packed(pr);
        let mc = cols.merged_of_packed(pc);
        let r_sub = rows.packed_extent(pr);
        let c_sub = cols.packed_extent(pc);
        let r_off = rows.offset_of_packed(pr);
        let c_off = cols.offset_of_packed(pc);

        let dst = out.reserve(&BlockIndex::new(&[mr, mc]))?;
        let r_full = dst.shape()[0];
        let src = block.data();
        let data = dst.data_mut();
        for c in 0..c_sub {
            let to = r_off + (c_off + c) * r_full;
            data[to..to + r_sub].copy_from_slice(&src[c * r_sub..(c + 1) * r_sub]);
        }
    }
    Ok(out)
}

/// Exact inverse of [`merge`]: slice merged blocks back into packed
/// sub-blocks at their original positions. Sub-blocks whose source block
/// was absent come back as explicit zeros.
pub fn expand<T: Scalar, Q: QuantumNumber>(
    a: &QnTensor<T, Q>,
    rows: &MergeInfo<Q>,
    cols: &MergeInfo<Q>,
) -> Result<QnTensor<T, Q>, TensorError> {
    check_merged_axis(a, 0, rows)?;
    check_merged_axis(a, 1, cols)?;

    let mut spaces = rows.spaces().to_vec();
    spaces.extend_from_slice(cols.spaces());
    let mut out = QnTensor::new(a.q().clone(), spaces)?;

    for (index, block) in a.iter_blocks() {
        if block.is_empty() {
            continue;
        }
        let (mr, mc) = (index[0], index[1]);
        let r_full = block.shape()[0];
        for &pr in rows.packed_of_merged(mr) {
            for &pc in cols.packed_of_merged(mc) {
                let r_sub = rows.packed_extent(pr);
                let c_sub = cols.packed_extent(pc);
                if r_sub * c_sub == 0 {
                    continue;
                }
                let r_off = rows.offset_of_packed(pr);
                let c_off = cols.offset_of_packed(pc);
                let dst_index = rows.packed_index(pr).concat(&cols.packed_index(pc));
                let src = block.data();
                let dst = out.reserve(&dst_index)?;
                let data = dst.data_mut();
                for c in 0..c_sub {
                    let from = r_off + (c_off + c) * r_full;
                    data[c * r_sub..(c + 1) * r_sub]
                        .copy_from_slice(&src[from..from + r_sub]);
                }
            }
        }
    }
    Ok(out)
}

/// Expand only the row axis of a rank-2 tensor whose column axis is a
/// native (unmerged) mode. Produces rank `K + 1`.
pub fn expand_rows<T: Scalar, Q: QuantumNumber>(
    a: &QnTensor<T, Q>,
    rows: &MergeInfo<Q>,
) -> Result<QnTensor<T, Q>, TensorError> {
    check_merged_axis(a, 0, rows)?;

    let mut spaces = rows.spaces().to_vec();
    spaces.push(a.qspace(1).clone());
    let mut out = QnTensor::new(a.q().clone(), spaces)?;

    for (index, block) in a.iter_blocks() {
        if block.is_empty() {
            continue;
        }
        let (mr, j) = (index[0], index[1]);
        let r_full = block.shape()[0];
        let ncols = block.shape()[1];
        for &pr in rows.packed_of_merged(mr) {
            let r_sub = rows.packed_extent(pr);
            if r_sub == 0 {
                continue;
            }
            let r_off = rows.offset_of_packed(pr);
            let mut dst_index = rows.packed_index(pr);
            dst_index = dst_index.concat(&BlockIndex::new(&[j]));
            let src = block.data();
            let dst = out.reserve(&dst_index)?;
            let data = dst.data_mut();
            for c in 0..ncols {
                let from = r_off + c * r_full;
                data[c * r_sub..(c + 1) * r_sub].copy_from_slice(&src[from..from + r_sub]);
            }
        }
    }
    Ok(out)
}

/// Expand only the column axis of a rank-2 tensor whose row axis is a
/// native (unmerged) mode. Produces rank `1 + K`.
pub fn expand_cols<T: Scalar, Q: QuantumNumber>(
    a: &QnTensor<T, Q>,
    cols: &MergeInfo<Q>,
) -> Result<QnTensor<T, Q>, TensorError> {
    check_merged_axis(a, 1, cols)?;

    let mut spaces = vec![a.qspace(0).clone()];
    spaces.extend_from_slice(cols.spaces());
    let mut out = QnTensor::new(a.q().clone(), spaces)?;

    for (index, block) in a.iter_blocks() {
        if block.is_empty() {
            continue;
        }
        let (i, mc) = (index[0], index[1]);
        let r_full = block.shape()[0];
        for &pc in cols.packed_of_merged(mc) {
            let c_sub = cols.packed_extent(pc);
            if c_sub == 0 {
                continue;
            }
            let c_off = cols.offset_of_packed(pc);
            let dst_index = BlockIndex::new(&[i]).concat(&cols.packed_index(pc));
            let src = block.data();
            let dst = out.reserve(&dst_index)?;
            // whole columns are contiguous in column-major layout
            dst.data_mut()
                .copy_from_slice(&src[c_off * r_full..(c_off + c_sub) * r_full]);
        }
    }
    Ok(out)
}

fn check_merged_axis<T: Scalar, Q: QuantumNumber>(
    a: &QnTensor<T, Q>,
    mode: usize,
    info: &MergeInfo<Q>,
) -> Result<(), TensorError> {
    if a.rank() != 2 {
        return Err(TensorError::WrongNumberOfModes {
            expected: 2,
            actual: a.rank(),
        });
    }
    let merged = info.merged_space();
    let got = a.qspace(mode);
    if got.labels() != merged.labels() {
        return Err(TensorError::symmetry(
            "merged axis labels differ from merge info",
        ));
    }
    if got.extents() != merged.extents() {
        return Err(TensorError::ShapeMismatch {
            expected: merged.total_dim(),
            actual: got.total_dim(),
        });
    }
    Ok(())
}
