//! Quantum-number labels and per-mode label/extent metadata.
//!
//! A block-sparse tensor attaches a [`QuantumNumber`] to every block of
//! every mode. A block may hold data only when its per-mode labels combine
//! to the tensor's total label (the selection rule).

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::TensorError;

/// Abelian symmetry label.
///
/// Implementors form a group under [`combine`](QuantumNumber::combine) with
/// identity [`zero`](QuantumNumber::zero) and inverse
/// [`negate`](QuantumNumber::negate). Negation corresponds to reversing the
/// arrow direction of a tensor mode.
pub trait QuantumNumber: Clone + Eq + Hash + Debug + Send + Sync + 'static {
    /// The identity label.
    fn zero() -> Self;

    /// Group combination (associative, here also commutative).
    fn combine(&self, other: &Self) -> Self;

    /// Group inverse.
    fn negate(&self) -> Self;

    /// Whether this is the identity label.
    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

/// Single U(1) conserved charge, e.g. particle number or S_z in half-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct U1(pub i32);

impl QuantumNumber for U1 {
    fn zero() -> Self {
        U1(0)
    }

    fn combine(&self, other: &Self) -> Self {
        U1(self.0 + other.0)
    }

    fn negate(&self) -> Self {
        U1(-self.0)
    }
}

/// Z2 parity label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Parity(pub bool);

impl Parity {
    pub const EVEN: Parity = Parity(false);
    pub const ODD: Parity = Parity(true);
}

impl QuantumNumber for Parity {
    fn zero() -> Self {
        Parity::EVEN
    }

    fn combine(&self, other: &Self) -> Self {
        Parity(self.0 ^ other.0)
    }

    fn negate(&self) -> Self {
        // every element of Z2 is its own inverse
        *self
    }
}

/// Product group: two conserved numbers tracked together, e.g. (N, S_z).
impl<A: QuantumNumber, B: QuantumNumber> QuantumNumber for (A, B) {
    fn zero() -> Self {
        (A::zero(), B::zero())
    }

    fn combine(&self, other: &Self) -> Self {
        (self.0.combine(&other.0), self.1.combine(&other.1))
    }

    fn negate(&self) -> Self {
        (self.0.negate(), self.1.negate())
    }
}

/// Labels and block extents of one tensor mode.
///
/// The two lists are parallel: block `i` along this mode carries label
/// `labels[i]` and holds `extents[i]` dense rows/columns. An extent of
/// zero marks a block slot that is declared but not yet sized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QnSpace<Q: QuantumNumber> {
    labels: Vec<Q>,
    extents: Vec<usize>,
}

impl<Q: QuantumNumber> QnSpace<Q> {
    /// Create a mode space from parallel label and extent lists.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::Shape`] if the lists have different lengths.
    pub fn new(labels: Vec<Q>, extents: Vec<usize>) -> Result<Self, TensorError> {
        if labels.len() != extents.len() {
            return Err(TensorError::shape(format!(
                "mode has {} labels but {} extents",
                labels.len(),
                extents.len()
            )));
        }
        Ok(QnSpace { labels, extents })
    }

    /// Number of blocks along this mode.
    pub fn nblocks(&self) -> usize {
        self.labels.len()
    }

    /// Label of block `i`.
    pub fn label(&self, i: usize) -> &Q {
        &self.labels[i]
    }

    /// Extent of block `i`.
    pub fn extent(&self, i: usize) -> usize {
        self.extents[i]
    }

    pub fn labels(&self) -> &[Q] {
        &self.labels
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Total dense dimension of this mode.
    pub fn total_dim(&self) -> usize {
        self.extents.iter().sum()
    }

    /// The same space with every label negated (arrow reversed).
    pub fn conjugated(&self) -> Self {
        QnSpace {
            labels: self.labels.iter().map(|q| q.negate()).collect(),
            extents: self.extents.clone(),
        }
    }

    /// Negate all labels in place.
    pub fn conjugate_in_place(&mut self) {
        for q in &mut self.labels {
            *q = q.negate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u1_group_laws() {
        let a = U1(2);
        let b = U1(-3);
        assert_eq!(a.combine(&b), U1(-1));
        assert_eq!(a.combine(&a.negate()), U1::zero());
        assert!(U1::zero().is_zero());
        assert_eq!(a.combine(&U1::zero()), a);
    }

    #[test]
    fn test_parity_self_inverse() {
        assert_eq!(Parity::ODD.combine(&Parity::ODD), Parity::EVEN);
        assert_eq!(Parity::ODD.negate(), Parity::ODD);
        assert_eq!(Parity::EVEN.combine(&Parity::ODD), Parity::ODD);
    }

    #[test]
    fn test_product_group() {
        let a = (U1(1), Parity::ODD);
        let b = (U1(2), Parity::ODD);
        assert_eq!(a.combine(&b), (U1(3), Parity::EVEN));
        assert_eq!(a.negate(), (U1(-1), Parity::ODD));
        assert_eq!(<(U1, Parity)>::zero(), (U1(0), Parity::EVEN));
    }

    #[test]
    fn test_qnspace_new() {
        let s = QnSpace::new(vec![U1(-1), U1(0), U1(1)], vec![1, 2, 1]).unwrap();
        assert_eq!(s.nblocks(), 3);
        assert_eq!(s.total_dim(), 4);
        assert_eq!(*s.label(2), U1(1));
        assert_eq!(s.extent(1), 2);
    }

    #[test]
    fn test_qnspace_length_mismatch() {
        let err = QnSpace::new(vec![U1(0), U1(1)], vec![2]).unwrap_err();
        assert!(matches!(err, TensorError::Shape { .. }));
    }

    #[test]
    fn test_qnspace_conjugated() {
        let s = QnSpace::new(vec![U1(-1), U1(1)], vec![2, 3]).unwrap();
        let c = s.conjugated();
        assert_eq!(c.labels(), &[U1(1), U1(-1)]);
        assert_eq!(c.extents(), s.extents());
    }
}
