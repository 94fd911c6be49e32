//! Dense output contract

use crate::{Error, Float};

/// Continuous extension of the most recent accepted step.
///
/// `t_local` is measured from the start of the step, so `0` gives the
/// state the step started from and `taken_step_size` gives the committed
/// state. Values outside that range extrapolate the step polynomial.
///
/// The coefficients are only valid until the next call to `step`.
pub trait Interpolate {
    /// Write the interpolated state at offset `t_local` into `out`.
    ///
    /// Fails with [`Error::InterpolateIntoLiveState`] if `out` is the model
    /// buffer the solver integrates, and with [`Error::DimensionMismatch`]
    /// if `out` has the wrong length. Before the solver has been attached to
    /// a model by `initialize` or `step` it fails with
    /// [`Error::NotInitialized`]. Nothing is written on failure.
    fn interpolate(&mut self, t_local: Float, out: &mut [Float]) -> Result<(), Error>;
}
