//! Settings for numerical integrators

use bon::Builder;

use crate::{Error, Float};

/// Optional knobs for the integrators.
///
/// Every field left as `None` falls back to the default of the selected
/// method (see [`crate::Method`]); the defaults are suitable for most
/// problems.
#[derive(Builder, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    /// The rounding unit, typically machine epsilon
    pub uround: Option<Float>,
    /// safety factor in step-size prediction.
    pub safety_factor: Option<Float>,
    /// Lower bound of `hnew / hold` for a single update.
    pub scale_min: Option<Float>,
    /// Upper bound of `hnew / hold` for a single update.
    pub scale_max: Option<Float>,
    /// Beta factor for stabilized step size control. Positive values of Beta
    /// ( <= 0.04 ) make the step size control more stable. Negative values
    /// are not accepted. Explicit methods only.
    pub beta: Option<Float>,
    /// Maximal step size magnitude.
    pub max_step: Option<Float>,
    /// Initial step size. None will result in an initial guess
    /// provided by the [`crate::methods::hinit`] function (explicit methods)
    /// or the nominal step (Radau5).
    pub initial_step: Option<Float>,
    /// Maximum number of attempts for a single step before giving up with
    /// [`crate::ErrorCode::DidNotConverge`].
    pub max_retries: Option<usize>,
    /// Max number of iterations in Newton solver.
    pub newton_maxiter: Option<usize>,
    /// Newton iteration tolerance. Derived from the tolerance if not given.
    pub newton_tol: Option<Float>,
    /// Contraction rate below which the Jacobian is kept for the next step.
    pub jacobian_reuse: Option<Float>,
    /// Interval `[lo, hi]` of `hnew / hold` inside which Radau5 keeps the old
    /// step size, saving an LU decomposition.
    pub keep_step: Option<(Float, Float)>,
    /// Start value for the Newton iteration of Radau5.
    pub predictor: Option<Predictor>,
}

/// How Radau5 guesses the stage increments of a new step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub enum Predictor {
    /// Evaluate the previous step's collocation polynomial at the new nodes.
    #[default]
    Extrapolate,
    /// Scale the previous increments by the step size ratio.
    Scale,
}

pub(crate) fn uround(value: Option<Float>) -> Result<Float, Error> {
    match value {
        Some(u) if u > 1e-35 && u < 1.0 => Ok(u),
        Some(u) => Err(Error::URoundOutOfRange(u)),
        None => Ok(2.3e-16),
    }
}

pub(crate) fn safety_factor(value: Option<Float>) -> Result<Float, Error> {
    match value {
        Some(s) if s > 1e-4 && s < 1.0 => Ok(s),
        Some(s) => Err(Error::SafetyFactorOutOfRange(s)),
        None => Ok(0.9),
    }
}

pub(crate) fn scale_bounds(
    scale_min: Option<Float>,
    scale_max: Option<Float>,
    defaults: (Float, Float),
) -> Result<(Float, Float), Error> {
    let lo = scale_min.unwrap_or(defaults.0);
    let hi = scale_max.unwrap_or(defaults.1);
    if lo > 0.0 && lo < 1.0 && hi > 1.0 && hi.is_finite() {
        Ok((lo, hi))
    } else {
        Err(Error::InvalidScaleFactors(lo, hi))
    }
}

pub(crate) fn beta(value: Option<Float>) -> Result<Float, Error> {
    match value {
        Some(b) if (0.0..=0.2).contains(&b) => Ok(b),
        Some(b) => Err(Error::BetaTooLarge(b)),
        None => Ok(0.0),
    }
}

pub(crate) fn max_retries(value: Option<usize>, default: usize) -> Result<usize, Error> {
    match value {
        Some(0) => Err(Error::MaxRetriesMustBePositive(0)),
        Some(n) => Ok(n),
        None => Ok(default),
    }
}

pub(crate) fn step_size(h: Float) -> Result<Float, Error> {
    if h.is_finite() && h != 0.0 {
        Ok(h)
    } else {
        Err(Error::InvalidStepSize(h))
    }
}

pub(crate) fn optional_step(h: Option<Float>) -> Result<Option<Float>, Error> {
    h.map(step_size).transpose()
}
