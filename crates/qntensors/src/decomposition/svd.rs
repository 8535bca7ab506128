//! Truncated symmetry-preserving SVD.
//!
//! The input is folded into matrix form by merging its leading modes into a
//! row axis and its trailing modes into a column axis. The selection rule
//! makes the folded matrix block diagonal, so one thin dense SVD per
//! diagonal block suffices; those run as scheduler jobs writing disjoint
//! result slots. Truncation is global: singular values from all blocks
//! compete against one cutoff, kept singular-value blocks are renumbered
//! consecutively, and the factors are expanded back through the merge
//! metadata.

use faer::linalg::solvers::{Svd, SvdError};
use faer_traits::math_utils::from_f64;

use crate::dense::DenseBlock;
use crate::error::TensorError;
use crate::merge::{MergeInfo, expand_cols, expand_rows, merge};
use crate::qtensor::QnTensor;
use crate::scalar::Scalar;
use crate::scheduler::{Scheduler, Task};
use crate::symmetry::{QnSpace, QuantumNumber};

/// Which factor absorbs the total label of the input.
///
/// With `Left`, `u` carries total zero and `vt` carries the input's total;
/// singular-value blocks are labeled by the merged row labels. With
/// `Right` the roles mirror and singular-value blocks carry the negated
/// merged column labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvdSide {
    Left,
    Right,
}

/// Truncation policy.
#[derive(Debug, Clone, Copy)]
pub struct SvdOptions {
    /// Positive: keep that many singular values, never dipping below
    /// `floor`. Negative `d`: keep values at or above `tolerance * 10^d`.
    /// Zero: keep values at or above `floor`.
    pub max_kept: isize,
    /// Numerical floor below which singular values are noise.
    pub floor: f64,
    /// Prefactor of the relative cutoff used when `max_kept` is negative.
    pub tolerance: f64,
}

impl Default for SvdOptions {
    fn default() -> Self {
        SvdOptions {
            max_kept: 0,
            floor: 1e-16,
            tolerance: 1.0,
        }
    }
}

/// Factors of a truncated SVD.
#[derive(Debug, Clone)]
pub struct TruncatedSvd<T: Scalar, Q: QuantumNumber> {
    /// Left factor: the row modes of the input followed by the
    /// singular-value mode.
    pub u: QnTensor<T, Q>,
    /// Kept singular values per singular-value block, descending within
    /// each block, in block order.
    pub spectrum: Vec<(Q, Vec<<T as Scalar>::Real>)>,
    /// Right factor: the singular-value mode followed by the column modes
    /// of the input.
    pub vt: QnTensor<T, Q>,
    /// Sum of squared discarded singular values.
    pub discarded: <T as Scalar>::Real,
}

struct BlockSvd<T: Scalar> {
    /// `r x min`, column-major.
    u: Vec<T>,
    s: Vec<<T as Scalar>::Real>,
    /// `min x c`, column-major.
    vt: Vec<T>,
}

struct SvdTask<'a, T: Scalar> {
    block: &'a DenseBlock<T>,
    rows: usize,
    cols: usize,
    slot: &'a mut Option<BlockSvd<T>>,
}

impl<T: Scalar> Task for SvdTask<'_, T> {
    fn cost(&self) -> u64 {
        (self.rows * self.cols * self.rows.min(self.cols)) as u64
    }

    fn run(&mut self) -> Result<(), TensorError> {
        let (r, c) = (self.rows, self.cols);
        let min = r.min(c);
        let mat = self.block.as_faer_mat(r, c);
        let svd: Svd<T> = Svd::new_thin(mat).map_err(|e: SvdError| TensorError::Svd {
            message: format!("{:?}", e),
        })?;

        let u_mat = svd.U();
        let s_diag = svd.S();
        let v_mat = svd.V();

        let mut u = Vec::with_capacity(r * min);
        for j in 0..min {
            for i in 0..r {
                u.push(u_mat[(i, j)]);
            }
        }
        let s: Vec<<T as Scalar>::Real> = (0..min).map(|k| s_diag[k].real_part()).collect();
        let mut vt = Vec::with_capacity(min * c);
        for j in 0..c {
            for i in 0..min {
                vt.push(v_mat[(j, i)].conj_val());
            }
        }
        *self.slot = Some(BlockSvd { u, s, vt });
        Ok(())
    }
}

/// Truncated SVD of `a`, split after its first `n_row_modes` modes.
///
/// Every diagonal block of the folded matrix is decomposed by a thin dense
/// SVD; the kept part of the spectrum is chosen globally by
/// [`SvdOptions`]. Contracting `u`, the spectrum and `vt` over the
/// singular-value mode recovers `a` exactly when nothing is discarded.
pub fn truncated_svd<T: Scalar, Q: QuantumNumber>(
    a: &QnTensor<T, Q>,
    n_row_modes: usize,
    side: SvdSide,
    opts: &SvdOptions,
    sched: &Scheduler,
) -> Result<TruncatedSvd<T, Q>, TensorError> {
    if n_row_modes == 0 || n_row_modes >= a.rank() {
        return Err(TensorError::shape(format!(
            "cannot split a rank-{} tensor after mode {}",
            a.rank(),
            n_row_modes
        )));
    }
    let rows = MergeInfo::build(&a.spaces()[..n_row_modes])?;
    let cols = MergeInfo::build(&a.spaces()[n_row_modes..])?;
    let folded = merge(a, &rows, &cols)?;

    // diagonal blocks in ascending order; empty ones carry no weight
    let jobs: Vec<(usize, usize, &DenseBlock<T>)> = folded
        .iter_blocks()
        .filter(|(_, b)| !b.is_empty())
        .map(|(index, b)| (index[0], index[1], b))
        .collect();

    let row_space = rows.merged_space();
    let col_space = cols.merged_space();
    let mut slots: Vec<Option<BlockSvd<T>>> = Vec::new();
    slots.resize_with(jobs.len(), || None);
    let tasks: Vec<SvdTask<'_, T>> = jobs
        .iter()
        .zip(slots.iter_mut())
        .map(|(&(mr, mc, block), slot)| SvdTask {
            block,
            rows: row_space.extent(mr),
            cols: col_space.extent(mc),
            slot,
        })
        .collect();
    sched.run(tasks)?;

    let decomposed: Vec<BlockSvd<T>> = slots
        .into_iter()
        .map(|slot| {
            slot.ok_or_else(|| TensorError::Svd {
                message: "block decomposition produced no result".to_string(),
            })
        })
        .collect::<Result<_, _>>()?;

    // global truncation across all blocks
    let mut entries: Vec<(<T as Scalar>::Real, usize, usize)> = Vec::new();
    for (p, d) in decomposed.iter().enumerate() {
        for (w, &v) in d.s.iter().enumerate() {
            entries.push((v, p, w));
        }
    }
    entries.sort_by(|x, y| {
        y.0.partial_cmp(&x.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(x.1.cmp(&y.1))
            .then(x.2.cmp(&y.2))
    });

    let n_keep = if opts.max_kept > 0 {
        // the numerical floor still applies when the count is generous
        let floor: <T as Scalar>::Real = from_f64(opts.floor.abs());
        let above = entries.iter().take_while(|e| e.0 >= floor).count();
        above.min(opts.max_kept as usize)
    } else {
        let cutoff: <T as Scalar>::Real = if opts.max_kept < 0 {
            from_f64(opts.tolerance.abs() * 10f64.powi(opts.max_kept as i32))
        } else {
            from_f64(opts.floor.abs())
        };
        entries.iter().take_while(|e| e.0 >= cutoff).count()
    };

    let mut discarded = <<T as Scalar>::Real as Scalar>::zero();
    for &(v, _, _) in &entries[n_keep..] {
        discarded = discarded + v * v;
    }

    // within a block values are descending, so the kept set is a prefix
    let mut kept = vec![0usize; jobs.len()];
    for &(_, p, _) in &entries[..n_keep] {
        kept[p] += 1;
    }

    // renumber surviving singular-value blocks consecutively
    let mut sval_labels: Vec<Q> = Vec::new();
    let mut sval_extents: Vec<usize> = Vec::new();
    let mut kept_pairs: Vec<(usize, usize, usize, usize)> = Vec::new();
    for (p, &(mr, mc, _)) in jobs.iter().enumerate() {
        if kept[p] == 0 {
            continue;
        }
        let label = match side {
            SvdSide::Left => row_space.label(mr).clone(),
            SvdSide::Right => col_space.label(mc).negate(),
        };
        kept_pairs.push((p, mr, mc, sval_labels.len()));
        sval_labels.push(label);
        sval_extents.push(kept[p]);
    }
    let spectrum_labels = sval_labels.clone();
    let sval_space = QnSpace::new(sval_labels, sval_extents)?;

    let (u_total, vt_total) = match side {
        SvdSide::Left => (Q::zero(), a.q().clone()),
        SvdSide::Right => (a.q().clone(), Q::zero()),
    };
    let mut u_folded =
        QnTensor::<T, Q>::new(u_total, vec![row_space.clone(), sval_space.conjugated()])?;
    let mut vt_folded = QnTensor::<T, Q>::new(vt_total, vec![sval_space, col_space.clone()])?;
    let mut spectrum: Vec<(Q, Vec<<T as Scalar>::Real>)> = Vec::with_capacity(kept_pairs.len());

    for &(p, mr, mc, b) in &kept_pairs {
        let d = &decomposed[p];
        let kc = kept[p];
        let r = row_space.extent(mr);
        let c = col_space.extent(mc);
        let min = r.min(c);

        // kept columns of U are a contiguous column-major prefix
        let ub = u_folded.reserve(&[mr, b].into())?;
        ub.data_mut().copy_from_slice(&d.u[..r * kc]);

        let vb = vt_folded.reserve(&[b, mc].into())?;
        let data = vb.data_mut();
        for j in 0..c {
            data[j * kc..(j + 1) * kc].copy_from_slice(&d.vt[j * min..j * min + kc]);
        }

        spectrum.push((spectrum_labels[b].clone(), d.s[..kc].to_vec()));
    }

    Ok(TruncatedSvd {
        u: expand_rows(&u_folded, &rows)?,
        spectrum,
        vt: expand_cols(&vt_folded, &cols)?,
        discarded,
    })
}
