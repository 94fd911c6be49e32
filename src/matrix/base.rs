//! Row-major dense square matrix.

use std::ops::{Index, IndexMut};

use crate::Float;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Matrix {
    pub(crate) n: usize,
    pub(crate) data: Vec<Float>,
}

impl Matrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn dim(&self) -> usize {
        self.n
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Float;

    fn index(&self, (r, c): (usize, usize)) -> &Self::Output {
        &self.data[r * self.n + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut Self::Output {
        &mut self.data[r * self.n + c]
    }
}
