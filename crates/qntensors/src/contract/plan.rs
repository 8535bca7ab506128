//! Mode-pairing analysis for block-sparse contraction.
//!
//! A [`ContractionPlan`] is pure metadata: given the ranks of the two
//! operands and the list of contracted mode pairs, it decides how each
//! operand maps onto a matrix for the dense kernel. When the contracted
//! modes of an operand sit at a contiguous edge in kernel order the operand
//! is used in place, possibly through a transposed view; otherwise the plan
//! records a mode permutation that brings it into place.

use crate::error::TensorError;

/// Dense kernel family a contraction reduces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    /// Outer product, no contracted modes.
    Ger,
    /// One operand fully contracted; the result keeps modes of one side only.
    Gemv,
    /// General matrix-matrix product.
    Gemm,
}

/// How an operand's block data maps onto the kernel matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperandLayout {
    /// Blocks are matrix-shaped as stored.
    NoTrans,
    /// Blocks are matrix-shaped as stored, used through a transposed view.
    Trans,
    /// Blocks need a mode permutation before the kernel can run.
    Permute(Vec<usize>),
}

impl OperandLayout {
    /// Whether this layout requires a data copy.
    pub fn needs_permute(&self) -> bool {
        matches!(self, OperandLayout::Permute(_))
    }
}

/// Analysis of one contraction, independent of block content.
#[derive(Debug, Clone)]
pub struct ContractionPlan {
    rank_a: usize,
    rank_b: usize,
    /// Contracted `(mode of a, mode of b)` pairs, sorted by the `a` mode.
    pairs: Vec<(usize, usize)>,
    uncontracted_a: Vec<usize>,
    uncontracted_b: Vec<usize>,
    a_layout: OperandLayout,
    b_layout: OperandLayout,
    kernel: KernelKind,
}

impl ContractionPlan {
    /// Analyze a contraction of `modes_a` of a rank-`rank_a` operand with
    /// `modes_b` of a rank-`rank_b` operand, pairing `modes_a[t]` with
    /// `modes_b[t]`.
    ///
    /// # Errors
    ///
    /// Rejects pair lists of different lengths, out-of-range modes,
    /// duplicate modes on either side, and contractions whose result would
    /// have rank zero.
    pub fn build(
        rank_a: usize,
        modes_a: &[usize],
        rank_b: usize,
        modes_b: &[usize],
    ) -> Result<Self, TensorError> {
        if modes_a.len() != modes_b.len() {
            return Err(TensorError::WrongNumberOfModes {
                expected: modes_a.len(),
                actual: modes_b.len(),
            });
        }
        check_modes(modes_a, rank_a)?;
        check_modes(modes_b, rank_b)?;

        let ncon = modes_a.len();
        if rank_a + rank_b == 2 * ncon {
            return Err(TensorError::shape(
                "contraction result would have rank zero; use dotu or dotc",
            ));
        }

        let mut pairs: Vec<(usize, usize)> = modes_a
            .iter()
            .copied()
            .zip(modes_b.iter().copied())
            .collect();
        pairs.sort_unstable_by_key(|&(am, _)| am);

        let uncontracted_a: Vec<usize> =
            (0..rank_a).filter(|m| !modes_a.contains(m)).collect();
        let uncontracted_b: Vec<usize> =
            (0..rank_b).filter(|m| !modes_b.contains(m)).collect();

        // A maps onto (rows = uncontracted, cols = contracted). In place if
        // the contracted modes are a trailing run (NoTrans) or a leading run
        // (Trans); contracted mode order is ascending either way, matching
        // the pair order.
        let a_sorted: Vec<usize> = pairs.iter().map(|&(am, _)| am).collect();
        let a_layout = if is_run(&a_sorted, rank_a - ncon) {
            OperandLayout::NoTrans
        } else if is_run(&a_sorted, 0) {
            OperandLayout::Trans
        } else {
            let mut perm = uncontracted_a.clone();
            perm.extend(a_sorted.iter().copied());
            OperandLayout::Permute(perm)
        };

        // B maps onto (rows = contracted, cols = uncontracted). The flatten
        // order of the contracted run must equal the pair order exactly.
        let b_paired: Vec<usize> = pairs.iter().map(|&(_, bm)| bm).collect();
        let b_layout = if is_run(&b_paired, 0) {
            OperandLayout::NoTrans
        } else if is_run(&b_paired, rank_b - ncon) {
            OperandLayout::Trans
        } else {
            let mut perm = b_paired.clone();
            perm.extend(uncontracted_b.iter().copied());
            OperandLayout::Permute(perm)
        };

        let kernel = if ncon == 0 {
            KernelKind::Ger
        } else if uncontracted_a.is_empty() || uncontracted_b.is_empty() {
            KernelKind::Gemv
        } else {
            KernelKind::Gemm
        };

        Ok(ContractionPlan {
            rank_a,
            rank_b,
            pairs,
            uncontracted_a,
            uncontracted_b,
            a_layout,
            b_layout,
            kernel,
        })
    }

    pub fn rank_a(&self) -> usize {
        self.rank_a
    }

    pub fn rank_b(&self) -> usize {
        self.rank_b
    }

    /// Number of contracted mode pairs.
    pub fn num_contracted(&self) -> usize {
        self.pairs.len()
    }

    /// Contracted pairs, sorted by the `a` mode.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Surviving modes of `a`, ascending.
    pub fn uncontracted_a(&self) -> &[usize] {
        &self.uncontracted_a
    }

    /// Surviving modes of `b`, ascending.
    pub fn uncontracted_b(&self) -> &[usize] {
        &self.uncontracted_b
    }

    pub fn a_layout(&self) -> &OperandLayout {
        &self.a_layout
    }

    pub fn b_layout(&self) -> &OperandLayout {
        &self.b_layout
    }

    pub fn kernel(&self) -> KernelKind {
        self.kernel
    }

    /// Rank of the contraction result.
    pub fn rank_out(&self) -> usize {
        self.uncontracted_a.len() + self.uncontracted_b.len()
    }
}

fn check_modes(modes: &[usize], rank: usize) -> Result<(), TensorError> {
    let mut seen = vec![false; rank];
    for &m in modes {
        if m >= rank {
            return Err(TensorError::IndexOutOfRange {
                index: m,
                dim_size: rank,
            });
        }
        if std::mem::replace(&mut seen[m], true) {
            return Err(TensorError::shape(format!(
                "mode {} contracted more than once",
                m
            )));
        }
    }
    Ok(())
}

/// Whether `modes` is exactly `start, start+1, ...`.
fn is_run(modes: &[usize], start: usize) -> bool {
    modes.iter().enumerate().all(|(t, &m)| m == start + t)
}
