//! Dense matrix arithmetic for the SOC filter
//!
//! Runtime-dimensioned, row-major `f32` storage. The filter only ever builds
//! 1x1, 1x2, 2x1 and 2x2 shapes, but the container stays dimension-generic so
//! the arithmetic can be tested independently of the filter.
//!
//! Shape rules are enforced loudly: every binary operation asserts that the
//! operand dimensions conform and panics with a dimension message otherwise.
//! The filter's shapes are fixed at design time, so a mismatch here is a
//! programming error, not a runtime condition to recover from.

use std::ops::{Add, Index, IndexMut, Mul};

/// Rectangular matrix of `f32` values, row-major, dimensions fixed at
/// construction. Cloning deep-copies the storage; `std::mem::take` leaves an
/// empty 0x0 matrix behind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Matrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Create a `rows x cols` matrix filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create an `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    /// Create a matrix from a flat slice in row-major order.
    ///
    /// Panics if `values.len() != rows * cols`.
    pub fn from_rows(rows: usize, cols: usize, values: &[f32]) -> Self {
        assert_eq!(
            values.len(),
            rows * cols,
            "value count {} does not match {}x{} matrix",
            values.len(),
            rows,
            cols,
        );
        Self {
            data: values.to_vec(),
            rows,
            cols,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// True for a 0x0 matrix with no storage (the moved-from/default state).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// New matrix with rows and columns swapped. The original is unmodified.
    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out[(j, i)] = self[(i, j)];
            }
        }
        out
    }

    /// Extract the sole element of a 1x1 matrix as a plain number.
    ///
    /// Panics if the matrix is not 1x1.
    pub fn scalar(&self) -> f32 {
        assert!(
            self.rows == 1 && self.cols == 1,
            "cannot take scalar of {}x{} matrix",
            self.rows,
            self.cols,
        );
        self.data[0]
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f32;

    #[inline]
    fn index(&self, (r, c): (usize, usize)) -> &f32 {
        assert!(
            r < self.rows && c < self.cols,
            "index ({}, {}) out of bounds for {}x{} matrix",
            r,
            c,
            self.rows,
            self.cols,
        );
        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    #[inline]
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f32 {
        assert!(
            r < self.rows && c < self.cols,
            "index ({}, {}) out of bounds for {}x{} matrix",
            r,
            c,
            self.rows,
            self.cols,
        );
        &mut self.data[r * self.cols + c]
    }
}

// ─── Matrix product ──────────────────────────────────────────────────────────

fn mul_mat(a: &Matrix, b: &Matrix) -> Matrix {
    assert_eq!(
        a.cols, b.rows,
        "dimension mismatch: {}x{} * {}x{}",
        a.rows, a.cols, b.rows, b.cols,
    );
    let mut out = Matrix::zeros(a.rows, b.cols);
    for i in 0..a.rows {
        for j in 0..b.cols {
            let mut sum = 0.0;
            for k in 0..a.cols {
                sum += a[(i, k)] * b[(k, j)];
            }
            out[(i, j)] = sum;
        }
    }
    out
}

impl Mul for &Matrix {
    type Output = Matrix;
    fn mul(self, rhs: &Matrix) -> Matrix {
        mul_mat(self, rhs)
    }
}

impl Mul<Matrix> for &Matrix {
    type Output = Matrix;
    fn mul(self, rhs: Matrix) -> Matrix {
        mul_mat(self, &rhs)
    }
}

impl Mul<&Matrix> for Matrix {
    type Output = Matrix;
    fn mul(self, rhs: &Matrix) -> Matrix {
        mul_mat(&self, rhs)
    }
}

impl Mul for Matrix {
    type Output = Matrix;
    fn mul(self, rhs: Matrix) -> Matrix {
        mul_mat(&self, &rhs)
    }
}

// ─── Elementwise sum ─────────────────────────────────────────────────────────

fn add_mat(a: &Matrix, b: &Matrix) -> Matrix {
    assert_eq!(
        (a.rows, a.cols),
        (b.rows, b.cols),
        "dimension mismatch: {}x{} + {}x{}",
        a.rows,
        a.cols,
        b.rows,
        b.cols,
    );
    let mut out = Matrix::zeros(a.rows, a.cols);
    for (o, (&x, &y)) in out.data.iter_mut().zip(a.data.iter().zip(b.data.iter())) {
        *o = x + y;
    }
    out
}

impl Add for &Matrix {
    type Output = Matrix;
    fn add(self, rhs: &Matrix) -> Matrix {
        add_mat(self, rhs)
    }
}

impl Add<Matrix> for &Matrix {
    type Output = Matrix;
    fn add(self, rhs: Matrix) -> Matrix {
        add_mat(self, &rhs)
    }
}

impl Add<&Matrix> for Matrix {
    type Output = Matrix;
    fn add(self, rhs: &Matrix) -> Matrix {
        add_mat(&self, rhs)
    }
}

impl Add for Matrix {
    type Output = Matrix;
    fn add(self, rhs: Matrix) -> Matrix {
        add_mat(&self, &rhs)
    }
}

// ─── Scalar scaling ──────────────────────────────────────────────────────────

fn scale_mat(a: &Matrix, scalar: f32) -> Matrix {
    let mut out = a.clone();
    for v in out.data.iter_mut() {
        *v *= scalar;
    }
    out
}

impl Mul<f32> for &Matrix {
    type Output = Matrix;
    fn mul(self, scalar: f32) -> Matrix {
        scale_mat(self, scalar)
    }
}

impl Mul<f32> for Matrix {
    type Output = Matrix;
    fn mul(self, scalar: f32) -> Matrix {
        scale_mat(&self, scalar)
    }
}

impl Mul<&Matrix> for f32 {
    type Output = Matrix;
    fn mul(self, rhs: &Matrix) -> Matrix {
        scale_mat(rhs, self)
    }
}

impl Mul<Matrix> for f32 {
    type Output = Matrix;
    fn mul(self, rhs: Matrix) -> Matrix {
        scale_mat(&rhs, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zeros_shape() {
        let m = Matrix::zeros(2, 3);
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 3);
        assert_eq!(m[(1, 2)], 0.0);
    }

    #[test]
    fn test_from_rows_layout() {
        let m = Matrix::from_rows(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(0, 2)], 3.0);
        assert_eq!(m[(1, 0)], 4.0);
        assert_eq!(m[(1, 2)], 6.0);
    }

    #[test]
    #[should_panic(expected = "value count")]
    fn test_from_rows_count_mismatch() {
        let _ = Matrix::from_rows(2, 2, &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_multiply() {
        let a = Matrix::from_rows(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = Matrix::from_rows(3, 2, &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
        let c = &a * &b;
        assert_eq!(c.rows(), 2);
        assert_eq!(c.cols(), 2);
        assert_eq!(c[(0, 0)], 58.0);
        assert_eq!(c[(0, 1)], 64.0);
        assert_eq!(c[(1, 0)], 139.0);
        assert_eq!(c[(1, 1)], 154.0);
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn test_multiply_incompatible_shapes() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 2);
        let _ = a * b;
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn test_add_incompatible_shapes() {
        let a = Matrix::zeros(2, 2);
        let b = Matrix::zeros(2, 1);
        let _ = a + b;
    }

    #[test]
    fn test_add_elementwise() {
        let a = Matrix::from_rows(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = Matrix::from_rows(2, 2, &[0.5, 0.5, 0.5, 0.5]);
        let c = &a + &b;
        assert_eq!(c[(0, 0)], 1.5);
        assert_eq!(c[(1, 1)], 4.5);
    }

    #[test]
    fn test_scale_commutes() {
        let a = Matrix::from_rows(2, 2, &[1.0, -2.0, 3.0, -4.0]);
        let left = 2.5 * &a;
        let right = &a * 2.5;
        assert_eq!(left, right);
        assert_eq!(left[(0, 1)], -5.0);
    }

    #[test]
    fn test_transpose_involution() {
        let a = Matrix::from_rows(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(a.transpose().transpose(), a);
    }

    #[test]
    fn test_transpose_of_product() {
        // (A*B)^T == B^T * A^T
        let a = Matrix::from_rows(2, 3, &[0.3, -1.2, 2.1, 4.0, 0.07, -3.3]);
        let b = Matrix::from_rows(3, 2, &[1.5, 0.2, -0.8, 2.2, 0.9, -1.1]);
        let lhs = (&a * &b).transpose();
        let rhs = &b.transpose() * &a.transpose();
        for i in 0..lhs.rows() {
            for j in 0..lhs.cols() {
                assert_relative_eq!(lhs[(i, j)], rhs[(i, j)], max_relative = 1e-5);
            }
        }
    }

    #[test]
    fn test_scalar_extraction() {
        let m = Matrix::from_rows(1, 1, &[42.5]);
        assert_eq!(m.scalar(), 42.5);
    }

    #[test]
    #[should_panic(expected = "cannot take scalar")]
    fn test_scalar_rejects_non_1x1() {
        let m = Matrix::zeros(2, 1);
        let _ = m.scalar();
    }

    #[test]
    fn test_identity_product() {
        let a = Matrix::from_rows(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let i = Matrix::identity(2);
        assert_eq!(&i * &a, a);
        assert_eq!(&a * &i, a);
    }

    #[test]
    fn test_take_leaves_empty() {
        let mut a = Matrix::from_rows(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let taken = std::mem::take(&mut a);
        assert_eq!(taken.rows(), 2);
        assert!(a.is_empty());
        assert_eq!(a.rows(), 0);
        assert_eq!(a.cols(), 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_index_out_of_bounds() {
        let m = Matrix::zeros(2, 2);
        let _ = m[(2, 0)];
    }
}
