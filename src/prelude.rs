//! Convenient prelude: import the most commonly used traits and types.
//!
//! Bring this into scope with:
//!
//! ```rust
//! use odestep::prelude::*;
//! ```
//!
//! Re-exports included:
//! - Model and engine traits: `ODE`, `AdaptiveSolver`, `Interpolate`.
//! - Solver handle and its configuration: `Solver`, `Method`, `Settings`,
//!   `Predictor`, `Tolerance`.
//! - Uniform-grid stepping: `FixedStepAdapter`.
//! - Diagnostics: `ErrorCode`, `Error`, `Stats`.

pub use crate::{
    AdaptiveSolver, Error, ErrorCode, FixedStepAdapter, Float, Interpolate, Method, ODE, Settings,
    Solver, Stats, Tolerance, methods::settings::Predictor,
};
