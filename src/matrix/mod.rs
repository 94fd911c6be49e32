//! Dense square matrices and LU solves used by the implicit methods.

mod base;
mod linear;

pub(crate) use base::Matrix;
pub(crate) use linear::Lu;
