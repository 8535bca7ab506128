//! Block-sparse level-1 operations, mode permutation and direct sums.
//!
//! These operate block-by-block on [`QnTensor`]s with compatible metadata.
//! Two tensors are compatible when their total labels, per-mode labels and
//! extents all agree; anything else is a caller error and is rejected.

use crate::block::BlockIndex;
use crate::error::TensorError;
use crate::qtensor::QnTensor;
use crate::scalar::Scalar;
use crate::symmetry::{QnSpace, QuantumNumber};

fn check_same_metadata<T: Scalar, Q: QuantumNumber>(
    x: &QnTensor<T, Q>,
    y: &QnTensor<T, Q>,
) -> Result<(), TensorError> {
    if x.q() != y.q() {
        return Err(TensorError::symmetry("total labels differ"));
    }
    if x.rank() != y.rank() {
        return Err(TensorError::WrongNumberOfModes {
            expected: x.rank(),
            actual: y.rank(),
        });
    }
    for (sx, sy) in x.spaces().iter().zip(y.spaces().iter()) {
        if sx.labels() != sy.labels() {
            return Err(TensorError::symmetry("per-mode labels differ"));
        }
        if sx.extents() != sy.extents() {
            return Err(TensorError::ShapeMismatch {
                expected: sx.total_dim(),
                actual: sy.total_dim(),
            });
        }
    }
    Ok(())
}

/// Scale every materialized block: `x <- alpha * x`.
pub fn scale<T: Scalar, Q: QuantumNumber>(alpha: T, x: &mut QnTensor<T, Q>) {
    for (_, block) in x.blocks_mut() {
        block.scale(alpha);
    }
}

/// `y <- y + alpha * x`, materializing in `y` any block present in `x`.
pub fn axpy<T: Scalar, Q: QuantumNumber>(
    alpha: T,
    x: &QnTensor<T, Q>,
    y: &mut QnTensor<T, Q>,
) -> Result<(), TensorError> {
    check_same_metadata(x, y)?;
    for (ordinal, block) in x.blocks() {
        let dst = y.reserve_ordinal(*ordinal)?;
        dst.axpy(alpha, block)?;
    }
    Ok(())
}

/// Unconjugated inner product `sum_i x_i y_i` over matching blocks.
pub fn dotu<T: Scalar, Q: QuantumNumber>(
    x: &QnTensor<T, Q>,
    y: &QnTensor<T, Q>,
) -> Result<T, TensorError> {
    dot_impl(x, y, false)
}

/// Conjugated inner product `sum_i conj(x_i) y_i` over matching blocks.
pub fn dotc<T: Scalar, Q: QuantumNumber>(
    x: &QnTensor<T, Q>,
    y: &QnTensor<T, Q>,
) -> Result<T, TensorError> {
    dot_impl(x, y, true)
}

fn dot_impl<T: Scalar, Q: QuantumNumber>(
    x: &QnTensor<T, Q>,
    y: &QnTensor<T, Q>,
    conj_x: bool,
) -> Result<T, TensorError> {
    check_same_metadata(x, y)?;
    let mut sum = T::zero();
    // both lists are sorted by ordinal
    let mut ys = y.blocks().iter().peekable();
    for (tx, bx) in x.blocks() {
        while let Some((ty, _)) = ys.peek() {
            if ty < tx {
                ys.next();
            } else {
                break;
            }
        }
        if let Some((ty, by)) = ys.peek() {
            if ty == tx {
                for (&xv, &yv) in bx.data().iter().zip(by.data().iter()) {
                    let xv = if conj_x { xv.conj_val() } else { xv };
                    sum = sum + xv * yv;
                }
            }
        }
    }
    Ok(sum)
}

/// Frobenius norm over all materialized blocks.
pub fn norm<T: Scalar, Q: QuantumNumber>(x: &QnTensor<T, Q>) -> <T as Scalar>::Real {
    let mut acc = <<T as Scalar>::Real as Scalar>::zero();
    for (_, block) in x.blocks() {
        for &v in block.data() {
            acc = acc + v.abs_sq();
        }
    }
    T::sqrt_real(acc)
}

/// Scale `x` to unit Frobenius norm. A zero tensor is left untouched.
pub fn normalize<T: Scalar, Q: QuantumNumber>(x: &mut QnTensor<T, Q>) {
    let n = norm(x);
    if n > <<T as Scalar>::Real as Scalar>::zero() {
        scale(T::one() / T::from_real(n), x);
    }
}

/// Reorder tensor modes: mode `i` of the result is mode `perm[i]` of `a`.
/// Block metadata, the sparsity map and every dense block are permuted
/// consistently.
pub fn permutedims<T: Scalar, Q: QuantumNumber>(
    a: &QnTensor<T, Q>,
    perm: &[usize],
) -> Result<QnTensor<T, Q>, TensorError> {
    let ndim = a.rank();
    if perm.len() != ndim || {
        let mut seen = vec![false; ndim];
        perm.iter().any(|&p| p >= ndim || std::mem::replace(&mut seen[p], true))
    } {
        return Err(TensorError::InvalidPermutation {
            perm: perm.to_vec(),
            ndim,
        });
    }

    let spaces: Vec<QnSpace<Q>> = perm.iter().map(|&p| a.qspace(p).clone()).collect();
    let mut out = QnTensor::new(a.q().clone(), spaces)?;

    for (index, block) in a.iter_blocks() {
        let new_index: BlockIndex = index.permute(perm);
        let permuted = block.permuted(perm)?;
        let dst = out.reserve(&new_index)?;
        *dst = permuted;
    }
    Ok(out)
}

/// Direct sum `x (+) y`, concatenating block structure along every mode not
/// listed in `shared`.
///
/// Shared modes keep a common space that must agree between the operands;
/// every other mode of the result carries `x`'s labels and extents followed
/// by `y`'s. Blocks are copied into disjoint regions, so for a matrix with
/// no shared modes the result is the block-diagonal embedding
/// `[[x, 0], [0, y]]`. Both operands must carry the same total label.
pub fn dsum<T: Scalar, Q: QuantumNumber>(
    x: &QnTensor<T, Q>,
    y: &QnTensor<T, Q>,
    shared: &[usize],
) -> Result<QnTensor<T, Q>, TensorError> {
    if x.rank() != y.rank() {
        return Err(TensorError::WrongNumberOfModes {
            expected: x.rank(),
            actual: y.rank(),
        });
    }
    if x.q() != y.q() {
        return Err(TensorError::symmetry("total labels differ"));
    }
    let ndim = x.rank();
    let mut is_shared = vec![false; ndim];
    for &m in shared {
        if m >= ndim {
            return Err(TensorError::IndexOutOfRange {
                index: m,
                dim_size: ndim,
            });
        }
        if std::mem::replace(&mut is_shared[m], true) {
            return Err(TensorError::shape(format!("shared mode {} listed twice", m)));
        }
    }
    if shared.len() == ndim {
        return Err(TensorError::shape("direct sum needs at least one summed mode"));
    }

    let mut spaces = Vec::with_capacity(ndim);
    for m in 0..ndim {
        let (sx, sy) = (x.qspace(m), y.qspace(m));
        if is_shared[m] {
            if sx.labels() != sy.labels() {
                return Err(TensorError::symmetry(format!(
                    "shared mode {} has differing labels",
                    m
                )));
            }
            if sx.extents() != sy.extents() {
                return Err(TensorError::ShapeMismatch {
                    expected: sx.total_dim(),
                    actual: sy.total_dim(),
                });
            }
            spaces.push(sx.clone());
        } else {
            let labels = sx.labels().iter().chain(sy.labels()).cloned().collect();
            let extents = sx.extents().iter().chain(sy.extents()).copied().collect();
            spaces.push(QnSpace::new(labels, extents)?);
        }
    }

    let mut z = QnTensor::new(x.q().clone(), spaces)?;
    for (index, block) in x.iter_blocks() {
        z.insertblock(&index, block.clone())?;
    }
    for (index, block) in y.iter_blocks() {
        // y's block positions shift past x's along every summed mode
        let shifted = BlockIndex::collect_from((0..ndim).map(|m| {
            if is_shared[m] {
                index[m]
            } else {
                index[m] + x.qspace(m).nblocks()
            }
        }));
        z.insertblock(&shifted, block.clone())?;
    }
    Ok(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::U1;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tensor(seed: u64) -> QnTensor<f64, U1> {
        let s = QnSpace::new(vec![U1(-1), U1(1)], vec![2, 3]).unwrap();
        let mut t = QnTensor::new(U1(0), vec![s.clone(), s]).unwrap();
        t.randomize(&mut StdRng::seed_from_u64(seed));
        t
    }

    #[test]
    fn test_scale_norm() {
        let mut t = tensor(0);
        let n = norm(&t);
        scale(2.0, &mut t);
        assert_relative_eq!(norm(&t), 2.0 * n, epsilon = 1e-12);
    }

    #[test]
    fn test_axpy() {
        let x = tensor(1);
        let mut y = tensor(2);
        let y0 = y.clone();
        axpy(0.5, &x, &mut y).unwrap();
        for ((_, by), ((_, bx), (_, b0))) in
            y.blocks().iter().zip(x.blocks().iter().zip(y0.blocks().iter()))
        {
            for ((&v, &xv), &v0) in by.data().iter().zip(bx.data()).zip(b0.data()) {
                assert_relative_eq!(v, v0 + 0.5 * xv, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_axpy_rejects_mismatched_labels() {
        let x = tensor(1);
        let s = QnSpace::new(vec![U1(-1), U1(1)], vec![2, 3]).unwrap();
        let mut y = QnTensor::<f64, U1>::new(U1(2), vec![s.clone(), s]).unwrap();
        assert!(matches!(
            axpy(1.0, &x, &mut y),
            Err(TensorError::SymmetryMismatch { .. })
        ));
    }

    #[test]
    fn test_dot_matches_norm() {
        let t = tensor(3);
        let n = norm(&t);
        let d = dotc(&t, &t).unwrap();
        assert_relative_eq!(d, n * n, epsilon = 1e-12);
        assert_relative_eq!(dotu(&t, &t).unwrap(), d, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize() {
        let mut t = tensor(4);
        normalize(&mut t);
        assert_relative_eq!(norm(&t), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_zero_is_noop() {
        let s = QnSpace::new(vec![U1(-1), U1(1)], vec![1, 1]).unwrap();
        let mut t = QnTensor::<f64, U1>::new(U1(0), vec![s.clone(), s]).unwrap();
        normalize(&mut t);
        assert_eq!(t.nnzblocks(), 0);
    }

    #[test]
    fn test_permutedims_roundtrip() {
        let t = tensor(5);
        let p = permutedims(&t, &[1, 0]).unwrap();
        assert_eq!(p.qspace(0).labels(), t.qspace(1).labels());
        let back = permutedims(&p, &[1, 0]).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_permutedims_values() {
        let t = tensor(6);
        let p = permutedims(&t, &[1, 0]).unwrap();
        let d = t.to_dense();
        let pd = p.to_dense();
        for i in 0..d.shape()[0] {
            for j in 0..d.shape()[1] {
                assert_relative_eq!(*pd.get(&[j, i]).unwrap(), *d.get(&[i, j]).unwrap());
            }
        }
    }

    #[test]
    fn test_permutedims_invalid() {
        let t = tensor(7);
        assert!(permutedims(&t, &[0, 0]).is_err());
        assert!(permutedims(&t, &[0]).is_err());
    }

    #[test]
    fn test_dsum_block_diagonal_embedding() {
        let x = tensor(8);
        let y = tensor(9);
        let z = dsum(&x, &y, &[]).unwrap();

        assert_eq!(z.qspace(0).nblocks(), 4);
        assert_eq!(
            z.qspace(0).total_dim(),
            x.qspace(0).total_dim() + y.qspace(0).total_dim()
        );
        // disjoint placement keeps the weights separate
        assert_relative_eq!(
            norm(&z).powi(2),
            norm(&x).powi(2) + norm(&y).powi(2),
            epsilon = 1e-12
        );

        let d = z.to_dense();
        let dx = x.to_dense();
        let (rx, cx) = (x.qspace(0).total_dim(), x.qspace(1).total_dim());
        for i in 0..d.shape()[0] {
            for j in 0..d.shape()[1] {
                let v = *d.get(&[i, j]).unwrap();
                if i < rx && j < cx {
                    assert_eq!(v, *dx.get(&[i, j]).unwrap());
                } else if i < rx || j < cx {
                    // off-diagonal regions stay empty
                    assert_eq!(v, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_dsum_shared_mode() {
        let s = QnSpace::new(vec![U1(-1), U1(1)], vec![1, 1]).unwrap();
        let mut x = QnTensor::<f64, U1>::new(U1(1), vec![s.clone(), s.clone(), s.clone()]).unwrap();
        let mut y = QnTensor::<f64, U1>::new(U1(1), vec![s.clone(), s.clone(), s.clone()]).unwrap();
        x.randomize(&mut StdRng::seed_from_u64(10));
        y.randomize(&mut StdRng::seed_from_u64(11));

        // physical mode 1 is shared, the bond modes 0 and 2 are summed
        let z = dsum(&x, &y, &[1]).unwrap();
        assert_eq!(z.qspace(1), &s);
        assert_eq!(z.qspace(0).nblocks(), 4);
        assert_eq!(z.qspace(2).nblocks(), 4);
        assert_relative_eq!(
            norm(&z).powi(2),
            norm(&x).powi(2) + norm(&y).powi(2),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_dsum_rejects_mismatches() {
        let x = tensor(12);
        let y = tensor(13);
        // every mode shared leaves nothing to sum
        assert!(dsum(&x, &y, &[0, 1]).is_err());
        assert!(dsum(&x, &y, &[5]).is_err());

        let s = QnSpace::new(vec![U1(-1), U1(1)], vec![2, 3]).unwrap();
        let w = QnTensor::<f64, U1>::new(U1(2), vec![s.clone(), s.clone()]).unwrap();
        assert!(matches!(
            dsum(&x, &w, &[]),
            Err(TensorError::SymmetryMismatch { .. })
        ));

        // shared mode with differing extents
        let t = QnSpace::new(vec![U1(-1), U1(1)], vec![1, 1]).unwrap();
        let v = QnTensor::<f64, U1>::new(U1(0), vec![t.clone(), t]).unwrap();
        assert!(dsum(&x, &v, &[0]).is_err());
    }
}
