//! Dense per-block storage.
//!
//! Every nonzero block of a [`QnTensor`](crate::qtensor::QnTensor) owns a
//! [`DenseBlock`]: a flat column-major buffer with a runtime-rank shape.
//! Rank-2 interpretations expose zero-copy faer matrix views so dense
//! kernels (GEMM, SVD) run directly on block data.

use faer::{MatMut, MatRef};
use smallvec::SmallVec;

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::strides::{col_major_strides, linear_index};

/// A dense column-major block of a block-sparse tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseBlock<T: Scalar> {
    shape: SmallVec<[usize; 8]>,
    data: Vec<T>,
}

impl<T: Scalar> DenseBlock<T> {
    /// Zero-initialized block of the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.iter().copied().collect(),
            data: vec![T::zero(); len],
        }
    }

    /// Build a block from column-major data.
    ///
    /// # Errors
    ///
    /// Returns [`TensorError::ShapeMismatch`] if the data length does not
    /// match the shape.
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self, TensorError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(TensorError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape: shape.iter().copied().collect(),
            data,
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Element at a multi-index (column-major).
    pub fn get(&self, indices: &[usize]) -> Option<&T> {
        if indices.len() != self.shape.len() {
            return None;
        }
        if indices.iter().zip(self.shape.iter()).any(|(&i, &d)| i >= d) {
            return None;
        }
        let strides = col_major_strides(&self.shape);
        self.data.get(linear_index(indices, &strides))
    }

    /// Set the element at a multi-index (column-major).
    pub fn set(&mut self, indices: &[usize], value: T) -> Result<(), TensorError> {
        if indices.len() != self.shape.len() {
            return Err(TensorError::WrongNumberOfModes {
                expected: self.shape.len(),
                actual: indices.len(),
            });
        }
        for (&i, &d) in indices.iter().zip(self.shape.iter()) {
            if i >= d {
                return Err(TensorError::IndexOutOfRange {
                    index: i,
                    dim_size: d,
                });
            }
        }
        let strides = col_major_strides(&self.shape);
        self.data[linear_index(indices, &strides)] = value;
        Ok(())
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Scale all elements in place.
    pub fn scale(&mut self, alpha: T) {
        for v in &mut self.data {
            *v = *v * alpha;
        }
    }

    /// `self += alpha * other`. Shapes must match exactly.
    pub fn axpy(&mut self, alpha: T, other: &DenseBlock<T>) -> Result<(), TensorError> {
        if self.shape != other.shape {
            return Err(TensorError::ShapeMismatch {
                expected: self.len(),
                actual: other.len(),
            });
        }
        for (y, &x) in self.data.iter_mut().zip(other.data.iter()) {
            *y = *y + alpha * x;
        }
        Ok(())
    }

    /// View the block data as an immutable column-major faer matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols != self.len()`.
    pub fn as_faer_mat(&self, rows: usize, cols: usize) -> MatRef<'_, T> {
        assert_eq!(
            rows * cols,
            self.data.len(),
            "matrix view ({} x {}) must match block size {}",
            rows,
            cols,
            self.data.len()
        );
        MatRef::from_column_major_slice(&self.data, rows, cols)
    }

    /// View the block data as a mutable column-major faer matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols != self.len()`.
    pub fn as_faer_mat_mut(&mut self, rows: usize, cols: usize) -> MatMut<'_, T> {
        assert_eq!(
            rows * cols,
            self.data.len(),
            "matrix view ({} x {}) must match block size {}",
            rows,
            cols,
            self.data.len()
        );
        MatMut::from_column_major_slice_mut(&mut self.data, rows, cols)
    }

    /// Copy with modes reordered: mode `i` of the result is mode `perm[i]`
    /// of `self`.
    pub fn permuted(&self, perm: &[usize]) -> Result<DenseBlock<T>, TensorError> {
        let ndim = self.rank();
        if perm.len() != ndim || {
            let mut seen = vec![false; ndim];
            perm.iter().any(|&p| p >= ndim || std::mem::replace(&mut seen[p], true))
        } {
            return Err(TensorError::InvalidPermutation {
                perm: perm.to_vec(),
                ndim,
            });
        }

        let new_shape: SmallVec<[usize; 8]> = perm.iter().map(|&p| self.shape[p]).collect();
        let old_strides = col_major_strides(&self.shape);
        let mut out = vec![T::zero(); self.data.len()];

        // walk the output in storage order, gathering from the source
        let mut idx: SmallVec<[usize; 8]> = SmallVec::from_elem(0, ndim);
        for slot in out.iter_mut() {
            let mut src = 0;
            for (m, &i) in idx.iter().enumerate() {
                src += i * old_strides[perm[m]];
            }
            *slot = self.data[src];

            for (m, &dim) in idx.iter_mut().zip(new_shape.iter()) {
                *m += 1;
                if *m < dim {
                    break;
                }
                *m = 0;
            }
        }

        Ok(DenseBlock {
            shape: new_shape,
            data: out,
        })
    }
}
