use crate::{complex, Complex, Float, Vector};
use core::ops;

#[macro_export]
macro_rules! matrix {
    ( $( [ $( $val:expr ),* $(,)? ] );* $(;)? ) => {{
        let __rows: Vec<Vec<_>> = vec![ $( vec![ $( $val ),* ] ),* ];
        let __nrows = __rows.len();
        let __ncols = __rows[0].len();
        let __data: Vec<_> = __rows.into_iter().flatten().collect();
        $crate::Matrix::new(__nrows, __ncols, __data)
    }};
}

/// Dense row-major matrix. Used for small (per-site / per-gate) operator
/// matrices — never for the full `D x D` or `D^2 x D^2` assembled
/// super-operator, which lives in [`crate::sparse::SparseMatrix`].
#[derive(Clone, Debug)]
pub struct Matrix<T: Float> {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Complex<T>>,
}

impl<T: Float> Matrix<T> {
    pub fn new(rows: usize, cols: usize, data: Vec<Complex<T>>) -> Self {
        assert_eq!(
            rows * cols,
            data.len(),
            "matrix data length must equal rows * cols"
        );
        Matrix { rows, cols, data }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![complex!(T::zero(), T::zero()); rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Matrix::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = complex!(T::one(), T::zero());
        }
        m
    }

    pub fn get(&self, r: usize, c: usize) -> Complex<T> {
        self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, v: Complex<T>) {
        self.data[r * self.cols + c] = v;
    }

    /// Matrix product; `None` on dimension mismatch rather than a panic,
    /// since callers (e.g. kernel fusion) use this to probe compatibility.
    pub fn dot(&self, other: &Matrix<T>) -> Option<Matrix<T>> {
        if self.cols != other.rows {
            return None;
        }
        let mut result = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for j in 0..other.cols {
                let mut sum = complex!(T::zero(), T::zero());
                for k in 0..self.cols {
                    sum = sum + self.get(i, k) * other.get(k, j);
                }
                result.set(i, j, sum);
            }
        }
        Some(result)
    }

    pub fn mul_vector(&self, v: &Vector<T>) -> Vector<T> {
        assert_eq!(self.cols, v.size(), "matrix/vector dimension mismatch");
        let mut out = Vector::zeros(self.rows);
        for i in 0..self.rows {
            let mut sum = complex!(T::zero(), T::zero());
            for j in 0..self.cols {
                sum = sum + self.get(i, j) * v.get(j);
            }
            out.set(i, sum);
        }
        out
    }

    pub fn conjugate_transpose(&self) -> Matrix<T> {
        let mut out = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.set(j, i, self.get(i, j).get_conjugate());
            }
        }
        out
    }

    /// `self ⊗ other`.
    pub fn kronecker(&self, other: &Matrix<T>) -> Matrix<T> {
        let rows = self.rows * other.rows;
        let cols = self.cols * other.cols;
        let mut out = Matrix::zeros(rows, cols);
        for i1 in 0..self.rows {
            for j1 in 0..self.cols {
                let a = self.get(i1, j1);
                for i2 in 0..other.rows {
                    for j2 in 0..other.cols {
                        let b = other.get(i2, j2);
                        out.set(
                            i1 * other.rows + i2,
                            j1 * other.cols + j2,
                            a * b,
                        );
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(r: f64, i: f64) -> Complex<f64> {
        complex!(r, i)
    }

    #[test]
    fn identity_is_neutral_for_dot() {
        let id = Matrix::<f64>::identity(2);
        let m = Matrix::new(2, 2, vec![c(1.0, 0.0), c(2.0, 0.0), c(3.0, 0.0), c(4.0, 0.0)]);
        let prod = id.dot(&m).unwrap();
        for i in 0..4 {
            assert_eq!(prod.data[i].real, m.data[i].real);
        }
    }

    #[test]
    fn kronecker_dimensions() {
        let a = Matrix::<f64>::identity(2);
        let b = Matrix::<f64>::identity(3);
        let k = a.kronecker(&b);
        assert_eq!(k.rows, 6);
        assert_eq!(k.cols, 6);
    }
}
