//! Block-sparse contraction driver.
//!
//! The driver walks only materialized blocks. Each operand's block list is
//! remapped to `(contracted-composite, surviving-composite)` keys and
//! sorted; a linear merge on the contracted composite enumerates every
//! contributing block pair without touching forbidden addresses. Pairs are
//! grouped by destination block, so each destination gets exactly one job
//! and jobs write disjoint memory. Jobs then run on the [`Scheduler`],
//! longest first, each a plain GEMM accumulating into its destination.

use std::collections::BTreeMap;

use faer::linalg::matmul::matmul;
use faer::{Accum, Par};
use smallvec::SmallVec;

use crate::block::BlockIndex;
use crate::contract::plan::{ContractionPlan, OperandLayout};
use crate::dense::DenseBlock;
use crate::error::TensorError;
use crate::operations::{permutedims, scale};
use crate::qtensor::QnTensor;
use crate::scalar::Scalar;
use crate::scheduler::{Scheduler, Task};
use crate::symmetry::{QnSpace, QuantumNumber};

/// Contract `modes_a` of `a` with `modes_b` of `b`, pairing
/// `modes_a[t]` with `modes_b[t]`: `c = alpha * a . b`.
///
/// Paired modes must have inverse labels block by block (`qa[p] ==
/// -qb[p]`) and equal extents. The result carries the surviving modes of
/// `a` followed by the surviving modes of `b`, with total label
/// `a.q() . b.q()`.
pub fn contract<T: Scalar, Q: QuantumNumber>(
    alpha: T,
    a: &QnTensor<T, Q>,
    modes_a: &[usize],
    b: &QnTensor<T, Q>,
    modes_b: &[usize],
    sched: &Scheduler,
) -> Result<QnTensor<T, Q>, TensorError> {
    let plan = ContractionPlan::build(a.rank(), modes_a, b.rank(), modes_b)?;
    check_operands(&plan, a, b)?;
    let mut c = QnTensor::new(a.q().combine(b.q()), output_spaces(&plan, a, b))?;
    execute(alpha, a, b, &plan, &mut c, sched)?;
    Ok(c)
}

/// Contract into an existing tensor: `c = alpha * a . b + beta * c`.
///
/// `c` must already carry the metadata [`contract`] would produce. Only
/// materialized blocks of `c` are scaled by `beta`; with `beta` one this
/// accumulates, the common case when summing partial contractions.
pub fn contract_into<T: Scalar, Q: QuantumNumber>(
    alpha: T,
    a: &QnTensor<T, Q>,
    modes_a: &[usize],
    b: &QnTensor<T, Q>,
    modes_b: &[usize],
    beta: T,
    c: &mut QnTensor<T, Q>,
    sched: &Scheduler,
) -> Result<(), TensorError> {
    let plan = ContractionPlan::build(a.rank(), modes_a, b.rank(), modes_b)?;
    check_operands(&plan, a, b)?;
    check_output(&plan, a, b, c)?;
    scale(beta, c);
    execute(alpha, a, b, &plan, c, sched)
}

/// Contract against the adjoint of `b`: `c = alpha * a . conj(b)`.
///
/// Element data of `b` is conjugated and every label of `b` is negated, so
/// paired modes must have equal labels block by block (`qa[p] == qb[p]`)
/// and the result's total label is `a.q() . (-b.q())`.
pub fn contract_conj<T: Scalar, Q: QuantumNumber>(
    alpha: T,
    a: &QnTensor<T, Q>,
    modes_a: &[usize],
    b: &QnTensor<T, Q>,
    modes_b: &[usize],
    sched: &Scheduler,
) -> Result<QnTensor<T, Q>, TensorError> {
    let bc = adjoint_operand(b);
    contract(alpha, a, modes_a, &bc, modes_b, sched)
}

/// Label-negated, element-conjugated copy.
fn adjoint_operand<T: Scalar, Q: QuantumNumber>(b: &QnTensor<T, Q>) -> QnTensor<T, Q> {
    let mut c = b.conjugate();
    for (_, block) in c.blocks_mut() {
        for v in block.data_mut() {
            *v = v.conj_val();
        }
    }
    c
}

fn output_spaces<T: Scalar, Q: QuantumNumber>(
    plan: &ContractionPlan,
    a: &QnTensor<T, Q>,
    b: &QnTensor<T, Q>,
) -> Vec<QnSpace<Q>> {
    let mut spaces: Vec<QnSpace<Q>> = plan
        .uncontracted_a()
        .iter()
        .map(|&m| a.qspace(m).clone())
        .collect();
    spaces.extend(plan.uncontracted_b().iter().map(|&m| b.qspace(m).clone()));
    spaces
}

fn check_operands<T: Scalar, Q: QuantumNumber>(
    plan: &ContractionPlan,
    a: &QnTensor<T, Q>,
    b: &QnTensor<T, Q>,
) -> Result<(), TensorError> {
    for &(am, bm) in plan.pairs() {
        let sa = a.qspace(am);
        let sb = b.qspace(bm);
        if sa.nblocks() != sb.nblocks() || sa.extents() != sb.extents() {
            return Err(TensorError::ShapeMismatch {
                expected: sa.total_dim(),
                actual: sb.total_dim(),
            });
        }
        for p in 0..sa.nblocks() {
            if *sa.label(p) != sb.label(p).negate() {
                return Err(TensorError::symmetry(format!(
                    "contracted modes {} and {} carry labels that are not inverse at block {}",
                    am, bm, p
                )));
            }
        }
    }
    Ok(())
}

fn check_output<T: Scalar, Q: QuantumNumber>(
    plan: &ContractionPlan,
    a: &QnTensor<T, Q>,
    b: &QnTensor<T, Q>,
    c: &QnTensor<T, Q>,
) -> Result<(), TensorError> {
    if *c.q() != a.q().combine(b.q()) {
        return Err(TensorError::symmetry(
            "output total label differs from combined operand labels",
        ));
    }
    let expected = output_spaces(plan, a, b);
    if c.rank() != expected.len() {
        return Err(TensorError::WrongNumberOfModes {
            expected: expected.len(),
            actual: c.rank(),
        });
    }
    for (m, space) in expected.iter().enumerate() {
        let got = c.qspace(m);
        if got.labels() != space.labels() {
            return Err(TensorError::symmetry("output mode labels differ"));
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

/// One GEMM job: every contributing block pair of a single destination.
struct GemmTask<'a, T: Scalar> {
    alpha: T,
    m: usize,
    n: usize,
    trans_a: bool,
    trans_b: bool,
    pairs: Vec<(&'a DenseBlock<T>, &'a DenseBlock<T>)>,
    dest: &'a mut DenseBlock<T>,
}

impl<T: Scalar> Task for GemmTask<'_, T> {
    fn cost(&self) -> u64 {
        self.pairs
            .iter()
            .map(|(ab, _)| (self.m * self.n * (ab.len() / self.m)) as u64)
            .sum()
    }

    fn run(&mut self) -> Result<(), TensorError> {
        let mut dst = self.dest.as_faer_mat_mut(self.m, self.n);
        for (ab, bb) in &self.pairs {
            let k = ab.len() / self.m;
            let lhs = if self.trans_a {
                ab.as_faer_mat(k, self.m).transpose()
            } else {
                ab.as_faer_mat(self.m, k)
            };
            let rhs = if self.trans_b {
                bb.as_faer_mat(self.n, k).transpose()
            } else {
                bb.as_faer_mat(k, self.n)
            };
            matmul(dst.as_mut(), Accum::Add, lhs, rhs, self.alpha, Par::Seq);
        }
        Ok(())
    }
}

/// Operand mode roles after any fallback permutation: surviving modes
/// ascending, contracted modes in pair order. The fallback places the
/// contracted run trailing for the left operand and leading for the right.
fn working_modes(
    layout: &OperandLayout,
    rank: usize,
    uncontracted: &[usize],
    contracted_paired: &[usize],
    contracted_lead: bool,
) -> (Vec<usize>, Vec<usize>) {
    match layout {
        OperandLayout::Permute(_) => {
            let ncon = contracted_paired.len();
            if contracted_lead {
                ((ncon..rank).collect(), (0..ncon).collect())
            } else {
                ((0..rank - ncon).collect(), (rank - ncon..rank).collect())
            }
        }
        OperandLayout::NoTrans | OperandLayout::Trans => {
            (uncontracted.to_vec(), contracted_paired.to_vec())
        }
    }
}

fn execute<T: Scalar, Q: QuantumNumber>(
    alpha: T,
    a: &QnTensor<T, Q>,
    b: &QnTensor<T, Q>,
    plan: &ContractionPlan,
    c: &mut QnTensor<T, Q>,
    sched: &Scheduler,
) -> Result<(), TensorError> {
    // fallback permutations materialize once, before block pairing
    let a_work;
    let a = match plan.a_layout() {
        OperandLayout::Permute(perm) => {
            a_work = permutedims(a, perm)?;
            &a_work
        }
        _ => a,
    };
    let b_work;
    let b = match plan.b_layout() {
        OperandLayout::Permute(perm) => {
            b_work = permutedims(b, perm)?;
            &b_work
        }
        _ => b,
    };
    // permuted operands flattened the fallback into NoTrans order
    let trans_a = *plan.a_layout() == OperandLayout::Trans;
    let trans_b = *plan.b_layout() == OperandLayout::Trans;

    let a_con_paired: Vec<usize> = plan.pairs().iter().map(|&(am, _)| am).collect();
    let b_con_paired: Vec<usize> = plan.pairs().iter().map(|&(_, bm)| bm).collect();
    let (a_unc, a_con) = working_modes(
        plan.a_layout(),
        plan.rank_a(),
        plan.uncontracted_a(),
        &a_con_paired,
        false,
    );
    let (b_unc, b_con) = working_modes(
        plan.b_layout(),
        plan.rank_b(),
        plan.uncontracted_b(),
        &b_con_paired,
        true,
    );

    // block counts of the contracted composite, in pair order
    let k_shape: SmallVec<[usize; 8]> =
        a_con.iter().map(|&m| a.block_shape()[m]).collect();

    let a_entries = remap_blocks(a, &a_unc, &a_con, &k_shape)?;
    let b_entries = remap_blocks(b, &b_unc, &b_con, &k_shape)?;

    // linear merge on the contracted composite, then cross the slabs
    let j_count: usize = b_unc.iter().map(|&m| b.block_shape()[m]).product();
    let mut by_dest: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
    let (mut ia, mut ib) = (0, 0);
    while ia < a_entries.len() && ib < b_entries.len() {
        let ka = a_entries[ia].0;
        let kb = b_entries[ib].0;
        if ka < kb {
            ia += 1;
            continue;
        }
        if kb < ka {
            ib += 1;
            continue;
        }
        let ea = ia + a_entries[ia..].iter().take_while(|e| e.0 == ka).count();
        let eb = ib + b_entries[ib..].iter().take_while(|e| e.0 == ka).count();
        for &(_, i, pa) in &a_entries[ia..ea] {
            for &(_, j, pb) in &b_entries[ib..eb] {
                by_dest.entry(i * j_count + j).or_default().push((pa, pb));
            }
        }
        ia = ea;
        ib = eb;
    }

    for &dest in by_dest.keys() {
        c.reserve_ordinal(dest)?;
    }

    // hand each destination job its disjoint mutable block; both the job
    // list and the storage vector are ascending by ordinal
    let n_unc_a = a_unc.len();
    let mut tasks: Vec<GemmTask<'_, T>> = Vec::with_capacity(by_dest.len());
    let mut remaining = &mut c.blocks_mut()[..];
    for (dest, pairs) in by_dest {
        loop {
            let slice = std::mem::take(&mut remaining);
            let (head, tail) = slice
                .split_first_mut()
                .ok_or_else(|| TensorError::shape("destination block missing from storage"))?;
            remaining = tail;
            if head.0 == dest {
                if head.1.is_empty() {
                    break;
                }
                let m: usize = head.1.shape()[..n_unc_a].iter().product();
                let n: usize = head.1.shape()[n_unc_a..].iter().product();
                tasks.push(GemmTask {
                    alpha,
                    m,
                    n,
                    trans_a,
                    trans_b,
                    pairs: pairs
                        .iter()
                        .map(|&(pa, pb)| (&a.blocks()[pa].1, &b.blocks()[pb].1))
                        .collect(),
                    dest: &mut head.1,
                });
                break;
            }
        }
    }

    sched.run(tasks)
}

/// Remap materialized blocks to `(contracted composite, surviving
/// composite, storage position)`, sorted by contracted composite.
fn remap_blocks<T: Scalar, Q: QuantumNumber>(
    t: &QnTensor<T, Q>,
    unc: &[usize],
    con: &[usize],
    k_shape: &[usize],
) -> Result<Vec<(usize, usize, usize)>, TensorError> {
    let unc_shape: SmallVec<[usize; 8]> = unc.iter().map(|&m| t.block_shape()[m]).collect();
    let mut entries = Vec::with_capacity(t.nnzblocks());
    for (pos, (ordinal, block)) in t.blocks().iter().enumerate() {
        if block.is_empty() {
            continue;
        }
        let index = BlockIndex::from_ordinal(*ordinal, t.block_shape());
        let k = BlockIndex::collect_from(con.iter().map(|&m| index[m])).ordinal(k_shape)?;
        let u = BlockIndex::collect_from(unc.iter().map(|&m| index[m])).ordinal(&unc_shape)?;
        entries.push((k, u, pos));
    }
    entries.sort_unstable();
    Ok(entries)
}
