//! Merge/expand round-trip tests over multi-mode tensors.

use approx::assert_relative_eq;
use qntensors::operations::norm;
use qntensors::{MergeInfo, QnSpace, QnTensor, U1, expand, merge};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn spin(ext: &[usize]) -> QnSpace<U1> {
    QnSpace::new(vec![U1(-1), U1(1)], ext.to_vec()).unwrap()
}

#[test]
fn test_roundtrip_rank4() {
    let spaces = vec![spin(&[2, 3]), spin(&[1, 2]), spin(&[3, 1]), spin(&[2, 2])];
    let mut t = QnTensor::<f64, U1>::new(U1(0), spaces.clone()).unwrap();
    t.randomize(&mut StdRng::seed_from_u64(71));

    let rows = MergeInfo::build(&spaces[..2]).unwrap();
    let cols = MergeInfo::build(&spaces[2..]).unwrap();

    let folded = merge(&t, &rows, &cols).unwrap();
    assert_eq!(folded.rank(), 2);
    assert_relative_eq!(norm(&folded), norm(&t), epsilon = 1e-12);
    // folding never changes the total label
    assert_eq!(folded.q(), t.q());

    let back = expand(&folded, &rows, &cols).unwrap();
    assert_eq!(back.spaces(), t.spaces());
    for (index, block) in t.iter_blocks() {
        assert_eq!(back.blockview(&index).unwrap(), block);
    }
}

#[test]
fn test_roundtrip_uneven_split() {
    // three modes merged into rows, one native-sized column run
    let spaces = vec![spin(&[1, 2]), spin(&[2, 1]), spin(&[2, 2]), spin(&[3, 3])];
    let mut t = QnTensor::<f64, U1>::new(U1(2), spaces.clone()).unwrap();
    t.randomize(&mut StdRng::seed_from_u64(73));

    let rows = MergeInfo::build(&spaces[..3]).unwrap();
    let cols = MergeInfo::build(&spaces[3..]).unwrap();

    let folded = merge(&t, &rows, &cols).unwrap();
    let back = expand(&folded, &rows, &cols).unwrap();
    for (index, block) in t.iter_blocks() {
        assert_eq!(back.blockview(&index).unwrap(), block);
    }
}

#[test]
fn test_merged_axis_dimensions() {
    let spaces = vec![spin(&[2, 3]), spin(&[4, 5])];
    let rows = MergeInfo::build(&spaces).unwrap();

    let merged = rows.merged_space();
    // total dimension survives the fold
    assert_eq!(
        merged.total_dim(),
        spaces.iter().map(|s| s.total_dim()).product::<usize>()
    );
    // labels -2, 0, +2 with extents 2*4, 2*5 + 3*4, 3*5
    assert_eq!(merged.labels(), &[U1(-2), U1(0), U1(2)]);
    assert_eq!(merged.extents(), &[8, 22, 15]);
}
