//! Symmetry-preserving tensor decomposition.
//!
//! A block-sparse tensor with an abelian selection rule becomes block
//! diagonal once its modes are folded into matrix form: every merged row
//! label pairs with at most one merged column label. Decompositions exploit
//! that by running one dense kernel per diagonal block and assembling the
//! factors back into block-sparse tensors.
//!
//! # Example
//!
//! ```
//! use qntensors::decomposition::{SvdOptions, SvdSide, truncated_svd};
//! use qntensors::qtensor::QnTensor;
//! use qntensors::scheduler::{Scheduler, SchedulerConfig};
//! use qntensors::symmetry::{QnSpace, U1};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let s = QnSpace::new(vec![U1(-1), U1(1)], vec![2, 2]).unwrap();
//! let mut t = QnTensor::<f64, U1>::new(U1(0), vec![s.clone(), s.clone(), s.clone(), s]).unwrap();
//! t.randomize(&mut StdRng::seed_from_u64(0));
//!
//! let sched = Scheduler::new(SchedulerConfig::default()).unwrap();
//! let f = truncated_svd(&t, 2, SvdSide::Left, &SvdOptions::default(), &sched).unwrap();
//! assert_eq!(f.u.rank(), 3);
//! assert_eq!(f.vt.rank(), 3);
//! ```

mod svd;

pub use svd::{SvdOptions, SvdSide, TruncatedSvd, truncated_svd};
