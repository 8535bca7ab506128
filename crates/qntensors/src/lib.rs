//! qntensors - quantum-number block-sparse tensors
//!
//! This crate provides symmetry-adapted block-sparse tensor storage and
//! algebra for many-body physics applications (DMRG and friends). A tensor
//! mode is divided into labeled blocks; a block of the tensor may hold data
//! only when its per-mode labels combine to the tensor's total label, and
//! only such blocks are ever stored or touched.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Block-sparse API
//!     → QnTensor, contract, truncated_svd, merge/expand
//!
//! Level 2: Block pairing and packing metadata
//!     → ContractionPlan, MergeInfo, SparsityMap
//!
//! Level 3: Dense kernels on a worker pool
//!     → DenseBlock (faer views), Scheduler (rayon pool)
//! ```
//!
//! # Example
//!
//! ```
//! use qntensors::{BlockIndex, QnSpace, QnTensor, U1};
//!
//! // one mode with a spin-down and a spin-up block
//! let s = QnSpace::new(vec![U1(-1), U1(1)], vec![2, 2]).unwrap();
//! let mut t = QnTensor::<f64, U1>::new(U1(0), vec![s.clone(), s]).unwrap();
//!
//! // only label-conserving blocks may hold data
//! t.reserve(&BlockIndex::new(&[0, 1])).unwrap().fill(1.0);
//! assert!(t.reserve(&BlockIndex::new(&[0, 0])).is_err());
//! ```

pub mod block;
pub mod contract;
pub mod decomposition;
pub mod dense;
pub mod error;
pub mod merge;
pub mod operations;
pub mod qtensor;
pub mod random;
pub mod scalar;
pub mod scheduler;
pub mod sparsity;
pub mod strides;
pub mod symmetry;

pub use block::BlockIndex;
pub use contract::{contract, contract_conj, contract_into};
pub use decomposition::{SvdOptions, SvdSide, TruncatedSvd, truncated_svd};
pub use dense::DenseBlock;
pub use error::TensorError;
pub use merge::{MergeInfo, expand, expand_cols, expand_rows, merge};
pub use operations::dsum;
pub use qtensor::{QnTensor, QnTensorParts};
pub use scalar::{Scalar, c64};
pub use scheduler::{Scheduler, SchedulerConfig, Task};
pub use sparsity::SparsityMap;
pub use symmetry::{Parity, QnSpace, QuantumNumber, U1};
