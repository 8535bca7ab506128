//! Stride computation utilities.
//!
//! Dense block data uses column-major (Fortran) order to match faer.
//! Block *addresses* use row-major (lexicographic) order, so that the
//! sorted storage vector walks block indices lexicographically.

use smallvec::SmallVec;

/// Compute column-major strides from a shape.
///
/// For shape [d0, d1, d2, ...], returns strides [1, d0, d0*d1, ...].
///
/// # Examples
///
/// ```
/// use qntensors::strides::col_major_strides;
///
/// assert_eq!(&col_major_strides(&[3, 4, 5])[..], &[1, 3, 12]);
/// assert_eq!(&col_major_strides(&[5])[..], &[1]);
/// ```
pub fn col_major_strides(shape: &[usize]) -> SmallVec<[usize; 8]> {
    let mut strides = SmallVec::with_capacity(shape.len());
    let mut stride = 1;
    for &dim in shape.iter() {
        strides.push(stride);
        stride *= dim;
    }
    strides
}

/// Compute row-major strides from a shape.
///
/// For shape [d0, d1, d2], returns strides [d1*d2, d2, 1]. Linear
/// addresses computed with these strides order multi-indices
/// lexicographically.
pub fn row_major_strides(shape: &[usize]) -> SmallVec<[usize; 8]> {
    let mut strides: SmallVec<[usize; 8]> = SmallVec::from_elem(0, shape.len());
    let mut stride = 1;
    for (s, &dim) in strides.iter_mut().rev().zip(shape.iter().rev()) {
        *s = stride;
        stride *= dim;
    }
    strides
}

/// Dot product of a multi-index with strides.
#[inline]
pub fn linear_index(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Convert a column-major linear index back to a multi-index.
pub fn col_major_unravel(mut linear: usize, shape: &[usize]) -> SmallVec<[usize; 8]> {
    let mut indices = SmallVec::with_capacity(shape.len());
    for &dim in shape.iter() {
        indices.push(linear % dim);
        linear /= dim;
    }
    indices
}

/// Convert a row-major linear index back to a multi-index.
pub fn row_major_unravel(mut linear: usize, shape: &[usize]) -> SmallVec<[usize; 8]> {
    let mut indices: SmallVec<[usize; 8]> = SmallVec::from_elem(0, shape.len());
    for (idx, &dim) in indices.iter_mut().rev().zip(shape.iter().rev()) {
        *idx = linear % dim;
        linear /= dim;
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_major_strides() {
        assert_eq!(&col_major_strides(&[3, 4, 5])[..], &[1, 3, 12]);
        assert_eq!(&col_major_strides(&[2, 3])[..], &[1, 2]);
        assert!(col_major_strides(&[]).is_empty());
    }

    #[test]
    fn test_row_major_strides() {
        assert_eq!(&row_major_strides(&[3, 4, 5])[..], &[20, 5, 1]);
        assert_eq!(&row_major_strides(&[2, 3])[..], &[3, 1]);
        assert!(row_major_strides(&[]).is_empty());
    }

    #[test]
    fn test_linear_index_col_major() {
        let strides = col_major_strides(&[3, 4, 5]);
        // index [i, j, k] -> i + 3*j + 12*k
        assert_eq!(linear_index(&[0, 0, 0], &strides), 0);
        assert_eq!(linear_index(&[1, 0, 0], &strides), 1);
        assert_eq!(linear_index(&[0, 1, 0], &strides), 3);
        assert_eq!(linear_index(&[2, 3, 4], &strides), 2 + 3 * 3 + 4 * 12);
    }

    #[test]
    fn test_row_major_is_lexicographic() {
        let shape = [2, 3, 2];
        let strides = row_major_strides(&shape);
        let mut prev = None;
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..2 {
                    let lin = linear_index(&[i, j, k], &strides);
                    if let Some(p) = prev {
                        assert_eq!(lin, p + 1);
                    }
                    prev = Some(lin);
                }
            }
        }
    }

    #[test]
    fn test_roundtrip() {
        let shape = [3, 4, 5];
        let cm = col_major_strides(&shape);
        let rm = row_major_strides(&shape);
        let total: usize = shape.iter().product();

        for linear in 0..total {
            let c = col_major_unravel(linear, &shape);
            assert_eq!(linear_index(&c, &cm), linear);
            let r = row_major_unravel(linear, &shape);
            assert_eq!(linear_index(&r, &rm), linear);
        }
    }
}
