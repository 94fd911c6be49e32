//! Radau IIA(5) - implicit Runge–Kutta step engine for stiff problems
//!
//! Reference
//! - E. Hairer and G. Wanner, "Solving Ordinary Differential Equations II.
//!   Stiff and Differential-Algebraic Problems", 2nd ed., Springer (1996).
//!
//! Original Fortran implementation and supporting material
//! - https://www.unige.ch/~hairer/software.html
//!

use crate::{
    Error, ErrorCode, Float, Interpolate, ODE, Settings, Tolerance,
    methods::{
        controller::{NewtonStepController, limit_magnitude},
        settings::{self, Predictor},
    },
    ode::StateId,
    solver::{AdaptiveSolver, Stats},
};

use super::{
    error_estimate::{first_approximation, second_approximation},
    newton::{self, IterationMatrices, NewtonFailure, NewtonParams, Workspace},
};

/// Radau IIA(5) engine.
///
/// Every step solves the three-stage collocation equations by simplified
/// Newton iteration against a numerical Jacobian. The Jacobian and the LU
/// factors of the iteration matrices are kept across steps while the
/// iteration contracts fast, and the step size is kept when the controller
/// would change it only slightly, saving a decomposition.
///
/// # Settings
///
/// Fields of [`Settings`] left as `None` use these defaults:
///
/// - `uround` (default `2.3e-16`)
/// - `safety_factor` (default `0.9`)
/// - `scale_min` / `scale_max` (default `0.2` / `8.0`)
/// - `newton_maxiter` (default `7`)
/// - `newton_tol` (derived from the relative tolerance)
/// - `jacobian_reuse` (default `0.001`; negative values recompute the
///   Jacobian after every accepted step)
/// - `keep_step` (default `(1.0, 1.2)`)
/// - `predictor` (default [`Predictor::Extrapolate`])
/// - `max_retries` (default `100`)
/// - `initial_step` (default: the nominal step size)
/// - `max_step` (default: unbounded)
#[derive(Debug, Clone)]
pub struct Radau5 {
    step_size: Float,
    taken: Float,
    atol: Tolerance,
    rtol: Tolerance,
    uround: Float,
    newton_maxiter: usize,
    newton_tol: Option<Float>,
    jacobian_reuse: Float,
    keep_step: (Float, Float),
    predictor: Predictor,
    max_step: Option<Float>,
    initial_step: Option<Float>,
    max_retries: usize,
    controller: NewtonStepController,

    binding: Option<StateId>,
    ws: Workspace,
    // dense output of the last accepted step, and of the last converged attempt
    cont: [Vec<Float>; 4],
    cont_try: [Vec<Float>; 4],
    lu: Option<IterationMatrices>,
    atol_t: Vec<Float>,
    rtol_t: Vec<Float>,
    fnewt: Float,

    start: bool,
    first: bool,
    caljac: bool,
    need_jac: bool,
    h_old: Float,
    faccon: Float,
    theta: Float,

    status: ErrorCode,
    stats: Stats,
}

impl Radau5 {
    pub fn new(
        step_size: Float,
        atol: Tolerance,
        rtol: Tolerance,
        settings: &Settings,
    ) -> Result<Self, Error> {
        let step_size = settings::step_size(step_size)?;
        let uround = settings::uround(settings.uround)?;
        let safety = settings::safety_factor(settings.safety_factor)?;
        let (scale_min, scale_max) =
            settings::scale_bounds(settings.scale_min, settings.scale_max, (0.2, 8.0))?;
        let newton_maxiter = match settings.newton_maxiter {
            Some(0) => return Err(Error::NewtonMaxIterMustBePositive(0)),
            Some(n) => n,
            None => 7,
        };
        let newton_tol = match settings.newton_tol {
            Some(tol) if !(tol.is_finite() && tol > 0.0) => {
                return Err(Error::InvalidTolerance(tol));
            }
            tol => tol,
        };
        let keep_step = settings.keep_step.unwrap_or((1.0, 1.2));
        if !(keep_step.0 <= 1.0 && keep_step.1 >= 1.0) {
            return Err(Error::InvalidScaleFactors(keep_step.0, keep_step.1));
        }
        let max_retries = settings::max_retries(settings.max_retries, 100)?;
        let max_step = settings::optional_step(settings.max_step)?.map(Float::abs);
        let initial_step = settings::optional_step(settings.initial_step)?;
        atol.validate(None)?;
        rtol.validate(None)?;
        let jacobian_reuse = settings.jacobian_reuse.unwrap_or(0.001);

        Ok(Self {
            step_size,
            taken: 0.0,
            atol,
            rtol,
            uround,
            newton_maxiter,
            newton_tol,
            jacobian_reuse,
            keep_step,
            predictor: settings.predictor.unwrap_or_default(),
            max_step,
            initial_step,
            max_retries,
            controller: NewtonStepController::new(scale_min, scale_max, safety, newton_maxiter),
            binding: None,
            ws: Workspace::new(&[]),
            cont: Default::default(),
            cont_try: Default::default(),
            lu: None,
            atol_t: Vec::new(),
            rtol_t: Vec::new(),
            fnewt: 0.0,
            start: true,
            first: true,
            caljac: false,
            need_jac: true,
            h_old: step_size,
            faccon: 1.0,
            theta: jacobian_reuse,
            status: ErrorCode::NoError,
            stats: Stats::default(),
        })
    }

    /// Attach to `state`, reallocating scratch and restarting if it is a
    /// different buffer.
    fn bind(&mut self, state: &[Float]) -> Result<(), Error> {
        let id = StateId::of(state);
        if self.binding == Some(id) {
            return Ok(());
        }
        let n = state.len();
        self.atol.validate(Some(n))?;
        self.rtol.validate(Some(n))?;
        if self.binding.is_some() {
            log::debug!("Radau5: model state buffer changed, restarting with {n} components");
        }

        self.ws = Workspace::new(state);
        self.cont = std::array::from_fn(|_| vec![0.0; n]);
        self.cont_try = std::array::from_fn(|_| vec![0.0; n]);
        self.binding = Some(id);
        self.transform_tolerances();

        self.taken = 0.0;
        self.start = true;
        self.first = true;
        self.caljac = false;
        self.need_jac = true;
        self.lu = None;
        self.faccon = 1.0;
        self.theta = self.jacobian_reuse;
        self.controller.reset();
        Ok(())
    }

    /// Radau5 works with `rtol' = 0.1 rtol^(2/3)` and `atol' = rtol' atol / rtol`.
    fn transform_tolerances(&mut self) {
        let n = self.ws.len();
        self.atol_t.clear();
        self.rtol_t.clear();
        for i in 0..n {
            let quot = self.atol[i] / self.rtol[i];
            let rtol = 0.1 * self.rtol[i].powf(2.0 / 3.0);
            self.rtol_t.push(rtol);
            self.atol_t.push(rtol * quot);
        }

        let rtol_min = self.rtol_t.iter().copied().fold(Float::INFINITY, Float::min);
        let rtol_min = if rtol_min.is_finite() {
            rtol_min
        } else {
            0.1 * self.rtol.max().powf(2.0 / 3.0)
        };
        self.fnewt = self.newton_tol.unwrap_or_else(|| {
            (10.0 * self.uround / rtol_min).max((0.03 as Float).min(rtol_min.sqrt()))
        });
    }

    /// Forward-difference Jacobian at `ws.y0`.
    fn jacobian<M: ODE + ?Sized>(&mut self, model: &M) {
        let ws = &mut self.ws;
        let n = ws.len();
        ws.y.copy_from_slice(&ws.y0);
        for j in 0..n {
            let ysafe = ws.y[j];
            let delt = (self.uround * ysafe.abs().max(1e-5)).sqrt();
            ws.y[j] = ysafe + delt;
            model.rate(&ws.y, &mut ws.k[0]);
            for i in 0..n {
                ws.jac[(i, j)] = (ws.k[0][i] - ws.f0[i]) / delt;
            }
            ws.y[j] = ysafe;
        }
        self.stats.nfev += n;
        self.stats.njev += 1;
        self.caljac = true;
        self.need_jac = false;
        self.lu = None;
        log::debug!("Radau5: new Jacobian ({} so far)", self.stats.njev);
    }

    /// Newton start values for a step of size `h`.
    fn predict(&mut self, h: Float) {
        let ws = &mut self.ws;
        if self.first {
            for s in 0..3 {
                ws.z[s].fill(0.0);
                ws.f[s].fill(0.0);
            }
            return;
        }

        let c3q = h / self.h_old;
        match self.predictor {
            Predictor::Extrapolate => {
                let c1q = C1 * c3q;
                let c2q = C2 * c3q;
                let [_, ak1, ak2, ak3] = &self.cont;
                let [z1, z2, z3] = &mut ws.z;
                for i in 0..z1.len() {
                    z1[i] = c1q * (ak1[i] + (c1q - C2M1) * (ak2[i] + (c1q - C1M1) * ak3[i]));
                    z2[i] = c2q * (ak1[i] + (c2q - C2M1) * (ak2[i] + (c2q - C1M1) * ak3[i]));
                    z3[i] = c3q * (ak1[i] + (c3q - C2M1) * (ak2[i] + (c3q - C1M1) * ak3[i]));
                }
            }
            Predictor::Scale => {
                for (z, z_acc) in ws.z.iter_mut().zip(&ws.z_acc) {
                    for (zi, za) in z.iter_mut().zip(z_acc) {
                        *zi = c3q * za;
                    }
                }
            }
        }
        ws.transform_increments();
    }

    /// Store the converged attempt in `cont_try` (and its increments in
    /// `ws.z_try`); `cont_try[0]` is the new state. Returns false if it is
    /// not finite.
    fn candidate(&mut self) -> bool {
        if self.predictor == Predictor::Scale {
            for (keep, z) in self.ws.z_try.iter_mut().zip(&self.ws.z) {
                keep.copy_from_slice(z);
            }
        }
        let ws = &self.ws;
        let [z1, z2, z3] = &ws.z;
        let [c0, c1, c2, c3] = &mut self.cont_try;
        let mut finite = true;
        for i in 0..ws.len() {
            c0[i] = ws.y0[i] + z3[i];
            c1[i] = (z2[i] - z3[i]) / C2M1;
            let ak = (z1[i] - z2[i]) / C1MC2;
            let acont3 = (ak - z1[i] / C1) / C2;
            c2[i] = (ak - c1[i]) / C1M1;
            c3[i] = c2[i] - acont3;
            finite &= c0[i].is_finite();
        }
        finite
    }

    /// Commit the attempt held in `cont_try`.
    fn commit<M: ODE + ?Sized>(&mut self, model: &mut M, h: Float) {
        std::mem::swap(&mut self.cont, &mut self.cont_try);
        if self.predictor == Predictor::Scale {
            std::mem::swap(&mut self.ws.z_acc, &mut self.ws.z_try);
        }
        model.state_mut().copy_from_slice(&self.cont[0]);
        self.first = false;
        self.h_old = h;
        self.taken = h;
    }
}

impl AdaptiveSolver for Radau5 {
    fn initialize<M: ODE + ?Sized>(&mut self, model: &M, step_size: Float) -> Result<(), Error> {
        let step_size = settings::step_size(step_size)?;
        self.binding = None;
        self.bind(model.state())?;
        self.step_size = step_size;
        self.status = ErrorCode::NoError;
        Ok(())
    }

    fn step<M: ODE + ?Sized>(&mut self, model: &mut M) -> Float {
        if let Err(e) = self.bind(model.state()) {
            log::warn!("Radau5: cannot step: {e}");
            return 0.0;
        }
        self.status = ErrorCode::NoError;
        if std::mem::take(&mut self.start) {
            if let Some(h0) = self.initial_step {
                self.step_size = h0.abs().copysign(self.step_size);
            }
        }

        self.ws.y0.copy_from_slice(model.state());
        model.rate(&self.ws.y0, &mut self.ws.f0);
        self.stats.nfev += 1;
        for i in 0..self.ws.len() {
            self.ws.scal[i] = self.atol_t[i] + self.rtol_t[i] * self.ws.y0[i].abs();
        }

        let params = NewtonParams {
            max_iter: self.newton_maxiter,
            tol: self.fnewt,
            uround: self.uround,
            theta0: self.jacobian_reuse,
        };
        let mut h = match self.max_step {
            Some(max) => limit_magnitude(self.step_size, max),
            None => self.step_size,
        };
        let mut rejected = false;
        let mut converged: Option<Float> = None;
        let mut attempts = 0;

        loop {
            attempts += 1;
            if self.need_jac {
                self.jacobian(&*model);
            }

            let lu = match self.lu.take() {
                Some(lu) if lu.h == h => Ok(lu),
                _ => {
                    self.stats.ndec += 1;
                    IterationMatrices::new(&self.ws.jac, h)
                }
            };

            match lu {
                Err(e) => {
                    log::debug!("Radau5: {e} for h = {h:e}, halving the step");
                    h *= 0.5;
                }
                Ok(lu) => {
                    self.predict(h);
                    let outcome = newton::solve(
                        &*model,
                        &mut self.ws,
                        &lu,
                        &params,
                        &mut self.faccon,
                        &mut self.stats.nfev,
                    );

                    match outcome {
                        Err(NewtonFailure::Diverged) => {
                            log::debug!("Radau5: Newton iteration diverged for h = {h:e}");
                            h *= 0.5;
                        }
                        Err(NewtonFailure::TooSlow {
                            violation,
                            iteration,
                        }) => {
                            log::debug!(
                                "Radau5: Newton converges too slowly for h = {h:e} (iteration {iteration})"
                            );
                            let qnewt = violation.min(20.0).max(1e-4);
                            let expo = -1.0 / (4.0 + params.max_iter as Float - 1.0 - iteration as Float);
                            h *= 0.8 * qnewt.powf(expo);
                        }
                        Ok(conv) => {
                            self.theta = conv.theta;
                            let mut err = first_approximation(&mut self.ws, &lu.real, h);
                            if err >= 1.0 && (self.first || rejected) {
                                err = second_approximation(
                                    &*model,
                                    &mut self.ws,
                                    &lu.real,
                                    &mut self.stats.nfev,
                                );
                            }
                            converged = self.candidate().then_some(h);

                            let proposal = self.controller.propose(err, conv.iterations, h, self.first);
                            if proposal.accepted {
                                self.stats.naccpt += 1;
                                let mut hnew = proposal.step_size;
                                if let Some(max) = self.max_step {
                                    hnew = limit_magnitude(hnew, max);
                                }
                                if rejected {
                                    hnew = limit_magnitude(hnew, h);
                                }

                                let qt = hnew / h;
                                let (lo, hi) = self.keep_step;
                                let fast = self.theta <= self.jacobian_reuse;
                                self.step_size = if fast && qt >= lo && qt <= hi { h } else { hnew };
                                self.need_jac = !fast;
                                self.caljac = false;
                                self.lu = Some(lu);
                                self.commit(model, h);
                                return h;
                            }

                            log::trace!("Radau5: rejected h = {h:e} (err = {err:e})");
                            h = proposal.step_size;
                        }
                    }
                    self.lu = Some(lu);
                }
            }

            self.stats.nrejct += 1;
            rejected = true;
            self.need_jac = !self.caljac;

            if attempts >= self.max_retries {
                self.status = ErrorCode::DidNotConverge;
                self.step_size = h;
                self.need_jac = true;
                return match converged {
                    Some(hc) => {
                        log::warn!(
                            "Radau5: no acceptable step after {attempts} attempts, committing h = {hc:e}"
                        );
                        self.commit(model, hc);
                        hc
                    }
                    None => {
                        log::warn!(
                            "Radau5: no converged step after {attempts} attempts, state left unchanged"
                        );
                        self.taken = 0.0;
                        0.0
                    }
                };
            }
        }
    }

    fn set_step_size(&mut self, step_size: Float) -> Result<(), Error> {
        self.step_size = settings::step_size(step_size)?;
        Ok(())
    }

    fn step_size(&self) -> Float {
        self.step_size
    }

    fn taken_step_size(&self) -> Float {
        self.taken
    }

    fn set_tolerances(&mut self, atol: Tolerance, rtol: Tolerance) -> Result<(), Error> {
        let n = self.binding.map(|id| id.len());
        atol.validate(n)?;
        rtol.validate(n)?;
        self.atol = atol;
        self.rtol = rtol;
        self.transform_tolerances();
        Ok(())
    }

    /// The relative tolerance as given, not its internal transform.
    fn tolerance(&self) -> Float {
        self.rtol.max()
    }

    fn error_code(&self) -> ErrorCode {
        self.status
    }

    fn stats(&self) -> Stats {
        self.stats
    }
}

impl Interpolate for Radau5 {
    fn interpolate(&mut self, t_local: Float, out: &mut [Float]) -> Result<(), Error> {
        if self.binding.is_some_and(|id| id.overlaps(out)) {
            log::warn!("Radau5: interpolation target is the live model state, nothing written");
            return Err(Error::InterpolateIntoLiveState);
        }
        if self.binding.is_none() {
            return Err(Error::NotInitialized);
        }
        let n = self.ws.len();
        if out.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: out.len(),
            });
        }
        if self.taken == 0.0 {
            out.copy_from_slice(&self.ws.y0);
            return Ok(());
        }

        let h = self.taken;
        let s = (t_local - h) / h;
        let [c0, c1, c2, c3] = &self.cont;
        for i in 0..n {
            out[i] = c0[i] + s * (c1[i] + (s - C2M1) * (c2[i] + (s - C1M1) * c3[i]));
        }
        Ok(())
    }
}

// Nodes (abscissae) in [0,1]
pub(super) const C1: Float = 0.155_051_025_721_682_2;
pub(super) const C2: Float = 0.644_948_974_278_317_8;
pub(super) const C1M1: Float = C1 - 1.0;
pub(super) const C2M1: Float = C2 - 1.0;
pub(super) const C1MC2: Float = C1 - C2;

// Error estimation and splitting constants
pub(super) const DD1: Float = -10.048_809_399_827_416;
pub(super) const DD2: Float = 1.382_142_733_160_749;
pub(super) const DD3: Float = -0.333_333_333_333_333_3;
pub(super) const U1: Float = 3.637_834_252_744_496; // real eigenvalue of A^{-1}
pub(super) const ALPH: Float = 2.681_082_873_627_752_3;
pub(super) const BETA: Float = 3.050_430_199_247_410_5;

// Transformation matrix T (3x3); T21 = 1, T22 = 0
pub(super) const T00: Float = 9.123_239_487_089_295E-2;
pub(super) const T01: Float = -1.412_552_950_209_542E-1;
pub(super) const T02: Float = -3.002_919_410_514_742_4E-2;
pub(super) const T10: Float = 2.417_179_327_071_07E-1;
pub(super) const T11: Float = 2.041_293_522_937_999_4E-1;
pub(super) const T12: Float = 3.829_421_127_572_619E-1;
pub(super) const T20: Float = 9.660_481_826_150_93E-1;

// Inverse transformation matrix T^{-1}
pub(super) const TINV00: Float = 4.325_579_890_063_155;
pub(super) const TINV01: Float = 3.391_992_518_158_098_4E-1;
pub(super) const TINV02: Float = 5.417_705_399_358_749E-1;
pub(super) const TINV10: Float = -4.178_718_591_551_905;
pub(super) const TINV11: Float = -3.276_828_207_610_623_7E-1;
pub(super) const TINV12: Float = 4.766_235_545_005_504_4E-1;
pub(super) const TINV20: Float = -5.028_726_349_457_868E-1;
pub(super) const TINV21: Float = 2.571_926_949_855_605;
pub(super) const TINV22: Float = -5.960_392_048_282_249E-1;
