//! Block-sparse tensor contraction.
//!
//! Contractions pair modes positionally: `modes_a[t]` of the left operand
//! sums against `modes_b[t]` of the right. Paired modes must carry inverse
//! quantum labels block by block (equal labels for the adjoint form) and
//! equal extents. The result keeps the surviving modes of the left operand
//! followed by those of the right.
//!
//! [`ContractionPlan`] decides how each operand maps onto a dense matrix;
//! the driver in `blocksparse` enumerates contributing block pairs by a
//! sorted merge and runs one GEMM job per destination block on a
//! [`Scheduler`](crate::scheduler::Scheduler).
//!
//! # Example
//!
//! ```
//! use qntensors::contract::contract;
//! use qntensors::qtensor::QnTensor;
//! use qntensors::scheduler::{Scheduler, SchedulerConfig};
//! use qntensors::symmetry::{QnSpace, U1};
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//!
//! let row = QnSpace::new(vec![U1(-1), U1(1)], vec![2, 2]).unwrap();
//! let shared = QnSpace::new(vec![U1(-1), U1(1)], vec![3, 3]).unwrap();
//!
//! let mut a = QnTensor::<f64, U1>::new(U1(0), vec![row.clone(), shared.conjugated()]).unwrap();
//! let mut b = QnTensor::<f64, U1>::new(U1(0), vec![shared, row]).unwrap();
//! a.randomize(&mut StdRng::seed_from_u64(0));
//! b.randomize(&mut StdRng::seed_from_u64(1));
//!
//! let sched = Scheduler::new(SchedulerConfig::default()).unwrap();
//! let c = contract(1.0, &a, &[1], &b, &[0], &sched).unwrap();
//! assert_eq!(c.rank(), 2);
//! assert_eq!(*c.q(), U1(0));
//! ```

mod blocksparse;
mod plan;

pub use blocksparse::{contract, contract_conj, contract_into};
pub use plan::{ContractionPlan, KernelKind, OperandLayout};
