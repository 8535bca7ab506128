//! Random block-sparse tensor construction.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::scalar::{Scalar, c64};
use crate::qtensor::QnTensor;
use crate::symmetry::QuantumNumber;

/// Trait for types that can be randomly sampled from a uniform distribution.
pub trait RandomUniform: Scalar {
    /// Sample a random value from the uniform distribution [0, 1).
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self;
}

impl RandomUniform for f64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardUniform)
    }
}

impl RandomUniform for c64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        c64::new(rng.sample(StandardUniform), rng.sample(StandardUniform))
    }
}

/// Trait for types that can be randomly sampled from a normal distribution.
pub trait RandomNormal: Scalar {
    /// Sample a random value from the standard normal distribution.
    fn sample_normal<R: Rng>(rng: &mut R) -> Self;
}

impl RandomNormal for f64 {
    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl RandomNormal for c64 {
    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        // Standard complex normal: real and imaginary parts are independent
        // N(0, 1/2) so that |z|^2 has mean 1
        let scale = std::f64::consts::FRAC_1_SQRT_2;
        c64::new(
            rng.sample::<f64, _>(StandardNormal) * scale,
            rng.sample::<f64, _>(StandardNormal) * scale,
        )
    }
}

impl<T: Scalar + RandomUniform, Q: QuantumNumber> QnTensor<T, Q> {
    /// Materialize every allowed block and fill it with uniform samples
    /// from [0, 1).
    ///
    /// # Example
    ///
    /// ```
    /// use qntensors::qtensor::QnTensor;
    /// use qntensors::symmetry::{QnSpace, U1};
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let s = QnSpace::new(vec![U1(-1), U1(1)], vec![2, 2]).unwrap();
    /// let mut t = QnTensor::<f64, U1>::new(U1(0), vec![s.clone(), s]).unwrap();
    /// t.randomize(&mut StdRng::seed_from_u64(42));
    /// assert_eq!(t.nnzblocks(), t.sparsity().num_allowed());
    /// ```
    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        self.fill(T::zero());
        for (_, block) in self.blocks_mut() {
            for v in block.data_mut() {
                *v = T::sample_uniform(rng);
            }
        }
    }
}

impl<T: Scalar + RandomNormal, Q: QuantumNumber> QnTensor<T, Q> {
    /// Materialize every allowed block and fill it with standard normal
    /// samples.
    pub fn randomize_normal<R: Rng>(&mut self, rng: &mut R) {
        self.fill(T::zero());
        for (_, block) in self.blocks_mut() {
            for v in block.data_mut() {
                *v = T::sample_normal(rng);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::{QnSpace, U1};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tensor() -> QnTensor<f64, U1> {
        let s = QnSpace::new(vec![U1(-1), U1(1)], vec![2, 3]).unwrap();
        QnTensor::new(U1(0), vec![s.clone(), s]).unwrap()
    }

    #[test]
    fn test_randomize_fills_allowed() {
        let mut t = tensor();
        t.randomize(&mut StdRng::seed_from_u64(1));
        assert_eq!(t.nnzblocks(), t.sparsity().num_allowed());
        for (_, b) in t.blocks() {
            assert!(b.data().iter().all(|&v| (0.0..1.0).contains(&v)));
        }
    }

    #[test]
    fn test_randomize_reproducible() {
        let mut t1 = tensor();
        let mut t2 = tensor();
        t1.randomize(&mut StdRng::seed_from_u64(7));
        t2.randomize(&mut StdRng::seed_from_u64(7));
        assert_eq!(t1, t2);
    }

    #[test]
    fn test_randomize_normal_statistics() {
        let s = QnSpace::new(vec![U1(0)], vec![200]).unwrap();
        let mut t = QnTensor::<f64, U1>::new(U1(0), vec![s]).unwrap();
        t.randomize_normal(&mut StdRng::seed_from_u64(3));
        let data = t.blocks()[0].1.data();
        let mean: f64 = data.iter().sum::<f64>() / data.len() as f64;
        assert!(mean.abs() < 0.5, "mean {} too far from 0", mean);
    }

    #[test]
    fn test_randomize_c64() {
        let s = QnSpace::new(vec![U1(-1), U1(1)], vec![1, 1]).unwrap();
        let mut t = QnTensor::<c64, U1>::new(U1(0), vec![s.clone(), s]).unwrap();
        t.randomize(&mut StdRng::seed_from_u64(5));
        assert_eq!(t.nnzblocks(), 2);
    }
}
