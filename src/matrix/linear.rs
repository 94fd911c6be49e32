//! Linear solves: A x = b via LU with partial pivoting.
//!
//! The factorization is kept so that the simplified Newton iteration can
//! reuse it for many right-hand sides (and across steps).

use crate::{Error, Float};

use super::base::Matrix;

/// LU factors of a square matrix, `P A = L U`, packed in one buffer.
#[derive(Debug, Clone)]
pub(crate) struct Lu {
    n: usize,
    lu: Vec<Float>,
    perm: Vec<usize>,
}

impl Lu {
    /// Factor `a`. Fails with [`Error::SingularMatrix`] when a pivot vanishes
    /// or is not finite.
    pub fn factor(a: &Matrix) -> Result<Self, Error> {
        let n = a.dim();
        let mut lu = a.data.clone();
        let mut perm: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // pivot
            let mut pivot_row = k;
            let mut pivot_val = lu[k * n + k].abs();
            for i in (k + 1)..n {
                let val = lu[i * n + k].abs();
                if val > pivot_val {
                    pivot_val = val;
                    pivot_row = i;
                }
            }
            if pivot_val == 0.0 || !pivot_val.is_finite() {
                return Err(Error::SingularMatrix);
            }
            if pivot_row != k {
                for j in 0..n {
                    lu.swap(k * n + j, pivot_row * n + j);
                }
                perm.swap(k, pivot_row);
            }
            // Eliminate below the pivot
            let akk = lu[k * n + k];
            for i in (k + 1)..n {
                let factor = lu[i * n + k] / akk;
                lu[i * n + k] = factor;
                if factor != 0.0 {
                    for j in (k + 1)..n {
                        lu[i * n + j] -= factor * lu[k * n + j];
                    }
                }
            }
        }

        Ok(Self { n, lu, perm })
    }

    /// In-place solve: overwrites `b` with `x`.
    pub fn solve_mut(&self, b: &mut [Float], scratch: &mut [Float]) {
        let n = self.n;
        debug_assert_eq!(b.len(), n, "dimension mismatch in LU solve");
        debug_assert!(scratch.len() >= n);

        // Apply the row permutation
        for i in 0..n {
            scratch[i] = b[self.perm[i]];
        }
        // Forward solve Ly = Pb
        for i in 0..n {
            let mut sum = scratch[i];
            for k in 0..i {
                sum -= self.lu[i * n + k] * scratch[k];
            }
            scratch[i] = sum;
        }
        // Backward solve Ux = y
        for i in (0..n).rev() {
            let mut sum = scratch[i];
            for k in (i + 1)..n {
                sum -= self.lu[i * n + k] * b[k];
            }
            b[i] = sum / self.lu[i * n + i];
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::Lu;
    use crate::{Error, Float, matrix::Matrix};

    #[test]
    fn solve_full_2x2() {
        // A = [[3, 2],[1, 4]], b = [5, 6] -> x = [0.8, 1.3]
        let mut a = Matrix::zeros(2);
        a[(0, 0)] = 3.0;
        a[(0, 1)] = 2.0;
        a[(1, 0)] = 1.0;
        a[(1, 1)] = 4.0;
        let lu = Lu::factor(&a).unwrap();
        let mut b = vec![5.0, 6.0];
        let mut scratch = vec![0.0; 2];
        lu.solve_mut(&mut b, &mut scratch);
        assert_relative_eq!(b[0], 0.8, epsilon = 1e-12);
        assert_relative_eq!(b[1], 1.3, epsilon = 1e-12);
    }

    #[test]
    fn pivoting_and_reuse() {
        // Zero leading entry forces a row swap.
        let mut a = Matrix::zeros(3);
        let rows = [[0.0, 2.0, 1.0], [1.0, 1.0, 0.0], [2.0, 0.0, 3.0]];
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                a[(r, c)] = *v;
            }
        }
        let lu = Lu::factor(&a).unwrap();
        let mut scratch = vec![0.0; 3];
        for x in [[1.0, -2.0, 0.5], [3.0, 0.0, -1.0]] {
            let mut b: Vec<Float> = (0..3)
                .map(|r| (0..3).map(|c| a[(r, c)] * x[c]).sum::<Float>())
                .collect();
            lu.solve_mut(&mut b, &mut scratch);
            for i in 0..3 {
                assert_relative_eq!(b[i], x[i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn singular_matrix_is_an_error() {
        let mut a = Matrix::zeros(2);
        a[(0, 0)] = 1.0;
        a[(0, 1)] = 2.0;
        a[(1, 0)] = 2.0;
        a[(1, 1)] = 4.0;
        assert_eq!(Lu::factor(&a).unwrap_err(), Error::SingularMatrix);
    }
}
