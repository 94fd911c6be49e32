//! Butcher tableaux of the embedded explicit methods.

use crate::{Float, Method, methods::controller::StepControl};

/// How the per-component error estimates are reduced to one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorNorm {
    /// Root mean square of the weighted components.
    Rms,
    /// Largest weighted component.
    Max,
}

/// Coefficients of an embedded explicit Runge–Kutta pair.
///
/// `a[s - 1]` holds the coefficients of stage `s` (stage 0 is the rate at the
/// initial state). `e` holds the error weights; when it is one entry longer
/// than `b` the last weight belongs to the rate at the new state. `dense`,
/// when present, gives the extra coefficient vector of a quartic continuous
/// extension (same indexing as `e`); without it the interpolant is the cubic
/// Hermite polynomial through both step ends.
#[derive(Debug)]
pub struct ButcherTableau {
    pub method: Method,
    pub order: usize,
    pub a: &'static [&'static [Float]],
    pub b: &'static [Float],
    pub e: &'static [Float],
    pub dense: Option<&'static [Float]>,
    pub norm: ErrorNorm,
    pub control: StepControl,
    /// Default bounds of `hnew / hold`.
    pub scale: (Float, Float),
    pub max_retries: usize,
    /// Tolerances below this value are raised to it.
    pub min_tolerance: Float,
}

impl ButcherTableau {
    pub fn stages(&self) -> usize {
        self.b.len()
    }

    /// Whether the error estimate needs the rate at the new state.
    pub fn error_uses_end_rate(&self) -> bool {
        self.e.len() > self.b.len()
    }
}

/// Dormand–Prince 5(4) with a fourth order continuous extension.
pub const DOPRI5: ButcherTableau = ButcherTableau {
    method: Method::Dopri5,
    order: 5,
    a: &[
        &[0.2],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
        &[9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
    ],
    b: &[35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
    e: &[
        71.0 / 57600.0,
        0.0,
        -71.0 / 16695.0,
        71.0 / 1920.0,
        -17253.0 / 339200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ],
    dense: Some(&[
        -12715105075.0 / 11282082432.0,
        0.0,
        87487479700.0 / 32700410799.0,
        -10690763975.0 / 1880347072.0,
        701980252875.0 / 199316789632.0,
        -1453857185.0 / 822651844.0,
        69997945.0 / 29380423.0,
    ]),
    norm: ErrorNorm::Rms,
    control: StepControl::Stabilized,
    scale: (0.33, 6.0),
    max_retries: 500,
    min_tolerance: 0.0,
};

/// Six stage Dormand–Prince 4/5 pair advancing with the fifth order
/// solution, max-norm error control with a dead-band controller and Hermite
/// dense output.
pub const DORMAND_PRINCE45: ButcherTableau = ButcherTableau {
    method: Method::DormandPrince45,
    order: 5,
    a: &[
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[3.0 / 10.0, -9.0 / 10.0, 6.0 / 5.0],
        &[226.0 / 729.0, -25.0 / 27.0, 880.0 / 729.0, 55.0 / 729.0],
        &[-181.0 / 270.0, 5.0 / 2.0, -266.0 / 297.0, -91.0 / 27.0, 189.0 / 55.0],
    ],
    b: &[19.0 / 216.0, 0.0, 1000.0 / 2079.0, -125.0 / 216.0, 81.0 / 88.0, 5.0 / 56.0],
    // difference between the 4th and 5th order weights
    e: &[-11.0 / 360.0, 0.0, 10.0 / 63.0, -55.0 / 72.0, 27.0 / 40.0, -11.0 / 280.0],
    dense: None,
    norm: ErrorNorm::Max,
    control: StepControl::Deadband,
    scale: (0.1, 10.0),
    max_retries: 10,
    min_tolerance: 1.0e-12,
};
