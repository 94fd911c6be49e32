//! Embedded explicit Runge-Kutta integrators (Dopri5, DormandPrince45)

mod explicit;
pub mod tableau;

pub use explicit::ExplicitRK;
