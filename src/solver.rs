//! Solver contract and the uniform solver handle.

use bon::bon;

use crate::{
    Error, ErrorCode, FixedStepAdapter, Float, Interpolate, Method, ODE, Settings, Tolerance,
    methods::{
        radau::Radau5,
        rk::{
            ExplicitRK,
            tableau::{DOPRI5, DORMAND_PRINCE45},
        },
    },
};

/// Counters accumulated since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde-derive", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    /// Rate evaluations (including Jacobian columns).
    pub nfev: usize,
    /// Jacobian evaluations.
    pub njev: usize,
    /// LU decompositions of the iteration matrices.
    pub ndec: usize,
    /// Accepted step attempts.
    pub naccpt: usize,
    /// Rejected step attempts.
    pub nrejct: usize,
}

/// An adaptive one-step engine.
///
/// The engine does not own the model: every [`step`](Self::step) borrows it,
/// reads its state, advances it by one adaptive step and writes it back.
pub trait AdaptiveSolver {
    /// Bind to `model`'s state buffer and set the nominal step. The next
    /// step starts over with a fresh initial step estimate.
    fn initialize<M: ODE + ?Sized>(&mut self, model: &M, step_size: Float) -> Result<(), Error>;

    /// Take one adaptive step and return its (signed) size. Returns `0` if
    /// no step could be committed.
    fn step<M: ODE + ?Sized>(&mut self, model: &mut M) -> Float;

    /// Set the size of the next step attempt. The sign selects the
    /// direction of integration.
    fn set_step_size(&mut self, step_size: Float) -> Result<(), Error>;

    /// Size proposed for the next step.
    fn step_size(&self) -> Float;

    /// Size of the most recent committed step, `0` before the first one.
    fn taken_step_size(&self) -> Float;

    /// Use `tol` as both the absolute and the relative tolerance.
    fn set_tolerance(&mut self, tol: Float) -> Result<(), Error> {
        let tol = Tolerance::Scalar(tol.abs());
        self.set_tolerances(tol.clone(), tol)
    }

    fn set_tolerances(&mut self, atol: Tolerance, rtol: Tolerance) -> Result<(), Error>;

    /// The (largest) relative tolerance.
    fn tolerance(&self) -> Float;

    fn error_code(&self) -> ErrorCode;

    fn stats(&self) -> Stats;
}

/// A solver for any [`Method`], selected at run time.
///
/// # Example
///
/// ```
/// use odestep::prelude::*;
///
/// struct Decay {
///     state: Vec<Float>,
/// }
///
/// impl ODE for Decay {
///     fn state(&self) -> &[Float] {
///         &self.state
///     }
///     fn state_mut(&mut self) -> &mut [Float] {
///         &mut self.state
///     }
///     fn rate(&self, state: &[Float], rate: &mut [Float]) {
///         rate[0] = -state[0];
///         rate[1] = 1.0;
///     }
/// }
///
/// let mut model = Decay { state: vec![1.0, 0.0] };
/// let mut solver = Solver::builder()
///     .method(Method::Radau5)
///     .step_size(0.1)
///     .rtol(1e-8)
///     .atol(1e-10)
///     .build()
///     .unwrap();
///
/// while model.state[1] < 1.0 {
///     solver.step(&mut model);
/// }
/// let exact = (-model.state[1]).exp();
/// assert!((model.state[0] - exact).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub enum Solver {
    Explicit(ExplicitRK),
    Radau5(Radau5),
}

#[bon]
impl Solver {
    /// Create a solver.
    ///
    /// # Arguments
    /// - `method`: integration method (default [`Method::Dopri5`]).
    /// - `step_size`: nominal first step; its sign is the direction of
    ///   integration (default `0.1`).
    /// - `rtol`, `atol`: relative and absolute tolerances, scalar or per
    ///   component (default `1e-6`).
    /// - `settings`: optional knobs, see [`Settings`].
    #[builder]
    pub fn new(
        #[builder(default)] method: Method,
        #[builder(default = 0.1)] step_size: Float,
        #[builder(default = Tolerance::Scalar(1e-6), into)] rtol: Tolerance,
        #[builder(default = Tolerance::Scalar(1e-6), into)] atol: Tolerance,
        #[builder(default)] settings: Settings,
    ) -> Result<Self, Error> {
        Ok(match method {
            Method::Dopri5 => {
                Solver::Explicit(ExplicitRK::new(&DOPRI5, step_size, atol, rtol, &settings)?)
            }
            Method::DormandPrince45 => Solver::Explicit(ExplicitRK::new(
                &DORMAND_PRINCE45,
                step_size,
                atol,
                rtol,
                &settings,
            )?),
            Method::Radau5 => Solver::Radau5(Radau5::new(step_size, atol, rtol, &settings)?),
        })
    }

    /// Wrap the solver so that every step has the fixed size `dt`.
    pub fn fixed_step(self, dt: Float) -> Result<FixedStepAdapter<Self>, Error> {
        FixedStepAdapter::new(self, dt)
    }

    pub fn method(&self) -> Method {
        match self {
            Solver::Explicit(e) => e.method(),
            Solver::Radau5(_) => Method::Radau5,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $s:ident => $body:expr) => {
        match $self {
            Solver::Explicit($s) => $body,
            Solver::Radau5($s) => $body,
        }
    };
}

impl AdaptiveSolver for Solver {
    fn initialize<M: ODE + ?Sized>(&mut self, model: &M, step_size: Float) -> Result<(), Error> {
        dispatch!(self, s => s.initialize(model, step_size))
    }

    fn step<M: ODE + ?Sized>(&mut self, model: &mut M) -> Float {
        dispatch!(self, s => s.step(model))
    }

    fn set_step_size(&mut self, step_size: Float) -> Result<(), Error> {
        dispatch!(self, s => s.set_step_size(step_size))
    }

    fn step_size(&self) -> Float {
        dispatch!(self, s => s.step_size())
    }

    fn taken_step_size(&self) -> Float {
        dispatch!(self, s => s.taken_step_size())
    }

    fn set_tolerances(&mut self, atol: Tolerance, rtol: Tolerance) -> Result<(), Error> {
        dispatch!(self, s => s.set_tolerances(atol, rtol))
    }

    fn tolerance(&self) -> Float {
        dispatch!(self, s => s.tolerance())
    }

    fn error_code(&self) -> ErrorCode {
        dispatch!(self, s => s.error_code())
    }

    fn stats(&self) -> Stats {
        dispatch!(self, s => s.stats())
    }
}

impl Interpolate for Solver {
    fn interpolate(&mut self, t_local: Float, out: &mut [Float]) -> Result<(), Error> {
        dispatch!(self, s => s.interpolate(t_local, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let s = Solver::builder().build().unwrap();
        assert_eq!(s.method(), Method::Dopri5);
        assert_eq!(s.step_size(), 0.1);
        assert_eq!(s.taken_step_size(), 0.0);
        assert_eq!(s.tolerance(), 1e-6);
        assert_eq!(s.error_code(), ErrorCode::NoError);
        assert_eq!(s.stats(), Stats::default());
    }

    #[test]
    fn builder_reports_invalid_settings() {
        let err = Solver::builder()
            .method(Method::Radau5)
            .settings(Settings::builder().newton_maxiter(0).build())
            .build()
            .unwrap_err();
        assert_eq!(err, Error::NewtonMaxIterMustBePositive(0));

        let err = Solver::builder().step_size(0.0).build().unwrap_err();
        assert_eq!(err, Error::InvalidStepSize(0.0));

        let err = Solver::builder().rtol(-1.0).build().unwrap_err();
        assert_eq!(err, Error::InvalidTolerance(-1.0));
    }

    #[test]
    fn set_tolerance_sets_both() {
        for method in [Method::Dopri5, Method::DormandPrince45, Method::Radau5] {
            let mut s = Solver::builder().method(method).build().unwrap();
            s.set_tolerance(-1e-4).unwrap();
            assert_eq!(s.tolerance(), 1e-4, "{method:?}");
            assert_eq!(s.set_tolerance(0.0), Err(Error::InvalidTolerance(0.0)));
        }
    }

    #[test]
    fn interpolation_needs_a_model() {
        for method in [Method::Dopri5, Method::DormandPrince45, Method::Radau5] {
            let mut s = Solver::builder().method(method).build().unwrap();
            let mut out = [7.0; 2];
            assert_eq!(s.interpolate(0.0, &mut out), Err(Error::NotInitialized));
            assert_eq!(out, [7.0; 2]);
        }
    }

    #[test]
    fn step_size_sign_is_kept() {
        let mut s = Solver::builder().method(Method::DormandPrince45).build().unwrap();
        s.set_step_size(-0.25).unwrap();
        assert_eq!(s.step_size(), -0.25);
        assert!(s.set_step_size(Float::NAN).is_err());
    }
}
