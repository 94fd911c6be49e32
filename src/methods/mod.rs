// Numerical methods

mod hinit;

pub mod controller;
pub mod radau;
pub mod rk;
pub mod settings;

pub use hinit::hinit;

/// Integration methods available through [`crate::Solver`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    /// Dormand–Prince 5(4) with RMS error norm and quartic dense output.
    #[default]
    Dopri5,
    /// Dormand–Prince 4/5 pair with max-norm error control and Hermite
    /// dense output.
    DormandPrince45,
    /// Implicit Radau IIA of order 5 for stiff problems.
    Radau5,
}
