//! Truncated SVD integration tests: reconstruction, global truncation and
//! factor orthogonality.

use approx::assert_relative_eq;
use qntensors::operations::norm;
use qntensors::{
    QnSpace, QnTensor, QuantumNumber, Scheduler, SchedulerConfig, SvdOptions, SvdSide, U1,
    contract, contract_conj, truncated_svd,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn sched() -> Scheduler {
    Scheduler::new(SchedulerConfig { num_threads: 2 }).unwrap()
}

fn spin(ext: &[usize]) -> QnSpace<U1> {
    QnSpace::new(vec![U1(-1), U1(1)], ext.to_vec()).unwrap()
}

fn scale_singular_columns(f: &mut QnTensor<f64, U1>, spectrum: &[(U1, Vec<f64>)]) {
    let sval_mode = f.rank() - 1;
    let indices: Vec<_> = f.iter_blocks().map(|(i, _)| i).collect();
    for index in indices {
        let svals = spectrum[index[sval_mode]].1.clone();
        let block = f.blockview_mut(&index).unwrap();
        let ncols = *block.shape().last().unwrap();
        let nrows = block.len() / ncols;
        let data = block.data_mut();
        for (j, &s) in svals.iter().enumerate().take(ncols) {
            for v in &mut data[j * nrows..(j + 1) * nrows] {
                *v *= s;
            }
        }
    }
}

#[test]
fn test_rank3_reconstruction() {
    let spaces = vec![spin(&[2, 2]), spin(&[3, 2]), spin(&[2, 3])];
    let mut t = QnTensor::<f64, U1>::new(U1(0), spaces).unwrap();
    t.randomize(&mut StdRng::seed_from_u64(81));

    let sch = sched();
    let f = truncated_svd(&t, 2, SvdSide::Left, &SvdOptions::default(), &sch).unwrap();
    assert!(f.discarded < 1e-20);

    let mut u_scaled = f.u.clone();
    scale_singular_columns(&mut u_scaled, &f.spectrum);
    let back = contract(1.0, &u_scaled, &[2], &f.vt, &[0], &sch).unwrap();

    let (d0, d1) = (t.to_dense(), back.to_dense());
    assert_eq!(d0.shape(), d1.shape());
    for (&x, &y) in d0.data().iter().zip(d1.data().iter()) {
        assert_relative_eq!(x, y, epsilon = 1e-10);
    }
}

#[test]
fn test_left_factor_is_isometric() {
    let spaces = vec![spin(&[3, 3]), spin(&[2, 2])];
    let mut t = QnTensor::<f64, U1>::new(U1(0), spaces).unwrap();
    t.randomize(&mut StdRng::seed_from_u64(83));

    let sch = sched();
    let f = truncated_svd(&t, 1, SvdSide::Left, &SvdOptions::default(), &sch).unwrap();

    // u^H u over the row mode is the identity on the singular mode
    let gram = contract_conj(1.0, &f.u, &[0], &f.u, &[0], &sch).unwrap();
    for (index, block) in gram.iter_blocks() {
        assert_eq!(index[0], index[1]);
        let n = block.shape()[0];
        for i in 0..n {
            for j in 0..n {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(*block.get(&[i, j]).unwrap(), expected, epsilon = 1e-10);
            }
        }
    }
}

#[test]
fn test_truncation_keeps_largest_values_globally() {
    let spaces = vec![spin(&[4, 4]), spin(&[4, 4])];
    let mut t = QnTensor::<f64, U1>::new(U1(0), spaces).unwrap();
    t.randomize(&mut StdRng::seed_from_u64(85));

    let sch = sched();
    let full = truncated_svd(&t, 1, SvdSide::Left, &SvdOptions::default(), &sch).unwrap();
    let mut all: Vec<f64> = full
        .spectrum
        .iter()
        .flat_map(|(_, v)| v.iter().copied())
        .collect();
    all.sort_by(|a, b| b.partial_cmp(a).unwrap());

    let opts = SvdOptions {
        max_kept: 3,
        ..SvdOptions::default()
    };
    let cut = truncated_svd(&t, 1, SvdSide::Left, &opts, &sch).unwrap();
    let mut kept: Vec<f64> = cut
        .spectrum
        .iter()
        .flat_map(|(_, v)| v.iter().copied())
        .collect();
    kept.sort_by(|a, b| b.partial_cmp(a).unwrap());

    assert_eq!(kept.len(), 3);
    for (&k, &a) in kept.iter().zip(all.iter()) {
        assert_relative_eq!(k, a, epsilon = 1e-12);
    }

    let tail_sq: f64 = all[3..].iter().map(|&s| s * s).sum();
    assert_relative_eq!(cut.discarded, tail_sq, epsilon = 1e-10);
}

#[test]
fn test_truncated_factors_stay_symmetric() {
    let spaces = vec![spin(&[3, 3]), spin(&[3, 3]), spin(&[2, 2])];
    let mut t = QnTensor::<f64, U1>::new(U1(0), spaces).unwrap();
    t.randomize(&mut StdRng::seed_from_u64(87));

    let opts = SvdOptions {
        max_kept: 4,
        ..SvdOptions::default()
    };
    let f = truncated_svd(&t, 1, SvdSide::Left, &opts, &sched()).unwrap();

    for (index, _) in f.u.iter_blocks() {
        let q = f
            .u
            .spaces()
            .iter()
            .enumerate()
            .fold(U1(0), |acc, (m, s)| acc.combine(s.label(index[m])));
        assert_eq!(q, U1(0));
    }
    for (index, _) in f.vt.iter_blocks() {
        let q = f
            .vt
            .spaces()
            .iter()
            .enumerate()
            .fold(U1(0), |acc, (m, s)| acc.combine(s.label(index[m])));
        assert_eq!(q, *f.vt.q());
    }
}

#[test]
fn test_norm_splits_between_kept_and_discarded() {
    let spaces = vec![spin(&[3, 2]), spin(&[2, 3])];
    let mut t = QnTensor::<f64, U1>::new(U1(0), spaces).unwrap();
    t.randomize(&mut StdRng::seed_from_u64(89));

    let opts = SvdOptions {
        max_kept: 2,
        ..SvdOptions::default()
    };
    let f = truncated_svd(&t, 1, SvdSide::Left, &opts, &sched()).unwrap();
    let kept_sq: f64 = f
        .spectrum
        .iter()
        .flat_map(|(_, v)| v.iter())
        .map(|&s| s * s)
        .sum();
    assert_relative_eq!(kept_sq + f.discarded, norm(&t).powi(2), epsilon = 1e-10);
}
