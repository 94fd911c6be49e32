//! Adaptive step-size engines for ordinary differential equations.
//!
//! The crate provides embedded explicit Runge–Kutta steppers (Dormand–Prince
//! 5(4) in two flavours), an implicit Radau IIA(5) stepper for stiff systems,
//! dense output inside every accepted step, and a [`FixedStepAdapter`] that
//! turns any of them into a uniform-grid stepper.
//!
//! Engines never own the model. Each call to [`AdaptiveSolver::step`] borrows
//! an [`ODE`] implementation, reads its state, advances it by one adaptive step
//! and writes the result back in place.

mod error;
mod fixed_step;
mod interpolate;
mod matrix;
mod ode;
mod solver;
mod status;
mod tolerance;

pub mod methods;
pub mod prelude;

pub use error::Error;
pub use fixed_step::FixedStepAdapter;
pub use interpolate::Interpolate;
pub use methods::{Method, settings::Settings};
pub use ode::ODE;
pub use solver::{AdaptiveSolver, Solver, Stats};
pub use status::ErrorCode;
pub use tolerance::Tolerance;

// Prevent selecting two incompatible float precision features at once.
#[cfg(all(feature = "f32", feature = "f64"))]
compile_error!(
    "features 'f32' and 'f64' cannot both be enabled; pick exactly one Float precision feature"
);

/// Floating point type used throughout the crate.
#[cfg(feature = "f32")]
pub type Float = f32;
#[cfg(feature = "f64")]
pub type Float = f64;
