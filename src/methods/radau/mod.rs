//! Implicit Runge–Kutta integrators (Radau IIA)

mod error_estimate;
mod newton;
mod radau5;

pub use radau5::Radau5;
