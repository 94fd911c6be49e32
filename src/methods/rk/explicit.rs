//! Adaptive step engine for embedded explicit Runge–Kutta pairs
//!
//! Reference
//! - E. Hairer, S. P. Nørsett, and G. Wanner, "Solving Ordinary Differential
//!   Equations I. Nonstiff Problems", 2nd ed., Springer (1993).
//! - J. R. Dormand and P. J. Prince, "A family of embedded Runge-Kutta
//!   formulae", J. Comp. Appl. Math. 6 (1980).

use crate::{
    Error, ErrorCode, Float, Interpolate, Method, ODE, Settings, Tolerance,
    methods::{
        controller::{ExplicitController, limit_magnitude},
        hinit, settings,
    },
    ode::StateId,
    solver::{AdaptiveSolver, Stats},
};

use super::tableau::{ButcherTableau, ErrorNorm};

/// Explicit embedded Runge–Kutta engine driven by a [`ButcherTableau`].
///
/// Each [`step`](AdaptiveSolver::step) evaluates the stages, estimates the
/// local error with the embedded pair and retries with a smaller step until
/// the error is within tolerance or the retry budget runs out. Dense output
/// coefficients are built on the first interpolation request after a step.
#[derive(Debug, Clone)]
pub struct ExplicitRK {
    tableau: &'static ButcherTableau,
    step_size: Float,
    taken: Float,
    atol: Tolerance,
    rtol: Tolerance,
    controller: ExplicitController,
    max_step: Option<Float>,
    initial_step: Option<Float>,
    max_retries: usize,

    binding: Option<StateId>,
    y0: Vec<Float>,
    y1: Vec<Float>,
    // stage rates plus the rate at the new state
    k: Vec<Vec<Float>>,
    cont: [Vec<Float>; 5],
    coeffs_valid: bool,

    status: ErrorCode,
    stats: Stats,
}

impl ExplicitRK {
    /// Create an engine for `tableau`.
    ///
    /// `settings` fields left as `None` use the tableau's defaults (scale
    /// bounds and retry budget) or the common ones (`safety_factor = 0.9`,
    /// `beta = 0`).
    pub fn new(
        tableau: &'static ButcherTableau,
        step_size: Float,
        atol: Tolerance,
        rtol: Tolerance,
        settings: &Settings,
    ) -> Result<Self, Error> {
        let step_size = settings::step_size(step_size)?;
        let safety = settings::safety_factor(settings.safety_factor)?;
        let (scale_min, scale_max) =
            settings::scale_bounds(settings.scale_min, settings.scale_max, tableau.scale)?;
        let beta = settings::beta(settings.beta)?;
        let max_retries = settings::max_retries(settings.max_retries, tableau.max_retries)?;
        let max_step = settings::optional_step(settings.max_step)?.map(Float::abs);
        let initial_step = settings::optional_step(settings.initial_step)?;
        atol.validate(None)?;
        rtol.validate(None)?;

        Ok(Self {
            tableau,
            step_size,
            taken: 0.0,
            atol,
            rtol,
            controller: ExplicitController::new(
                tableau.control,
                tableau.order,
                scale_min,
                scale_max,
                safety,
                beta,
            ),
            max_step,
            initial_step,
            max_retries,
            binding: None,
            y0: Vec::new(),
            y1: Vec::new(),
            k: Vec::new(),
            cont: Default::default(),
            coeffs_valid: false,
            status: ErrorCode::NoError,
            stats: Stats::default(),
        })
    }

    pub fn method(&self) -> Method {
        self.tableau.method
    }

    /// Attach to `state`, reallocating scratch if it is a different buffer.
    fn bind(&mut self, state: &[Float]) -> Result<(), Error> {
        let id = StateId::of(state);
        if self.binding == Some(id) {
            return Ok(());
        }
        let n = state.len();
        self.atol.validate(Some(n))?;
        self.rtol.validate(Some(n))?;
        if self.binding.is_some() {
            log::debug!(
                "{:?}: model state buffer changed, restarting with {n} components",
                self.tableau.method
            );
        }

        self.y0 = state.to_vec();
        self.y1 = state.to_vec();
        self.k = vec![vec![0.0; n]; self.tableau.stages() + 1];
        self.cont = std::array::from_fn(|_| vec![0.0; n]);
        self.binding = Some(id);
        self.taken = 0.0;
        self.coeffs_valid = false;
        self.controller.reset();
        Ok(())
    }

    /// Evaluate all stages for a step of size `h` from `y0`, leaving the
    /// new state in `y1`.
    fn attempt<M: ODE + ?Sized>(&mut self, model: &M, h: Float) {
        let tableau = self.tableau;
        let n = self.y0.len();
        let stages = tableau.stages();

        for (s, row) in tableau.a.iter().enumerate() {
            let (done, rest) = self.k.split_at_mut(s + 1);
            for i in 0..n {
                let incr: Float = row.iter().zip(done.iter()).map(|(a, k)| a * k[i]).sum();
                self.y1[i] = self.y0[i] + h * incr;
            }
            model.rate(&self.y1, &mut rest[0]);
        }
        self.stats.nfev += tableau.a.len();

        for i in 0..n {
            let incr: Float = tableau
                .b
                .iter()
                .zip(&self.k[..stages])
                .map(|(b, k)| b * k[i])
                .sum();
            self.y1[i] = self.y0[i] + h * incr;
        }

        if tableau.error_uses_end_rate() {
            model.rate(&self.y1, &mut self.k[stages]);
            self.stats.nfev += 1;
        }
    }

    /// Normalized local error of the last attempt.
    fn error_norm(&self, h: Float) -> Float {
        let n = self.y0.len();
        if n == 0 {
            return 0.0;
        }
        let tableau = self.tableau;
        let floor = tableau.min_tolerance;

        let mut acc: Float = 0.0;
        for i in 0..n {
            let trunc: Float = h * tableau
                .e
                .iter()
                .zip(&self.k)
                .map(|(e, k)| e * k[i])
                .sum::<Float>();
            let sk = self.atol[i].max(floor)
                + self.rtol[i].max(floor) * self.y0[i].abs().max(self.y1[i].abs());
            let r = trunc / sk;
            match tableau.norm {
                ErrorNorm::Rms => acc += r * r,
                ErrorNorm::Max => {
                    if r.is_nan() {
                        return Float::NAN;
                    }
                    acc = acc.max(r.abs());
                }
            }
        }

        match tableau.norm {
            ErrorNorm::Rms => (acc / n as Float).sqrt(),
            ErrorNorm::Max => acc,
        }
    }

    fn build_dense(&mut self) {
        let h = self.taken;
        let tableau = self.tableau;
        let end = tableau.stages();
        let [c0, c1, c2, c3, c4] = &mut self.cont;

        for i in 0..self.y0.len() {
            let ydiff = self.y1[i] - self.y0[i];
            let bspl = h * self.k[0][i] - ydiff;
            c0[i] = self.y0[i];
            c1[i] = ydiff;
            c2[i] = bspl;
            c3[i] = ydiff - h * self.k[end][i] - bspl;
            c4[i] = match tableau.dense {
                Some(d) => h * d.iter().zip(&self.k).map(|(d, k)| d * k[i]).sum::<Float>(),
                None => 0.0,
            };
        }
        self.coeffs_valid = true;
    }
}

impl AdaptiveSolver for ExplicitRK {
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
            log::warn!("{:?}: cannot step: {e}", self.tableau.method);
            return 0.0;
        }
        let stages = self.tableau.stages();
        self.status = ErrorCode::NoError;
        self.coeffs_valid = false;

        self.y0.copy_from_slice(model.state());
        model.rate(&self.y0, &mut self.k[0]);
        self.stats.nfev += 1;

        if self.taken == 0.0 {
            self.step_size = match self.initial_step {
                Some(h0) => h0.abs().copysign(self.step_size),
                None => {
                    let (k0, scratch) = self.k.split_at_mut(1);
                    self.stats.nfev += 1;
                    hinit(
                        &*model,
                        &self.y0,
                        self.step_size,
                        &k0[0],
                        &mut scratch[0],
                        &mut self.y1,
                        self.tableau.order,
                        self.step_size,
                        &self.atol,
                        &self.rtol,
                    )
                }
            };
        }
        if let Some(max) = self.max_step {
            self.step_size = limit_magnitude(self.step_size, max);
        }

        let mut h = self.step_size;
        let mut rejected = false;
        let mut attempts = 0;
        let next = loop {
            attempts += 1;
            self.attempt(&*model, h);
            let err = self.error_norm(h);
            let proposal = self.controller.propose(err, h);

            if proposal.accepted {
                self.stats.naccpt += 1;
                break if rejected {
                    limit_magnitude(proposal.step_size, h)
                } else {
                    proposal.step_size
                };
            }

            self.stats.nrejct += 1;
            if attempts >= self.max_retries {
                self.status = ErrorCode::DidNotConverge;
                log::warn!(
                    "{:?}: error {err:e} above tolerance after {attempts} attempts, committing h = {h:e}",
                    self.tableau.method
                );
                break proposal.step_size;
            }
            log::trace!("{:?}: rejected h = {h:e} (err = {err:e})", self.tableau.method);
            h = proposal.step_size;
            rejected = true;
        };

        if !self.tableau.error_uses_end_rate() {
            // Hermite dense output needs the rate at the new state
            model.rate(&self.y1, &mut self.k[stages]);
            self.stats.nfev += 1;
        }

        model.state_mut().copy_from_slice(&self.y1);
        self.taken = h;
        self.step_size = match self.max_step {
            Some(max) => limit_magnitude(next, max),
            None => next,
        };
        h
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
        Ok(())
    }

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

impl Interpolate for ExplicitRK {
    fn interpolate(&mut self, t_local: Float, out: &mut [Float]) -> Result<(), Error> {
        if self.binding.is_some_and(|id| id.overlaps(out)) {
            log::warn!(
                "{:?}: interpolation target is the live model state, nothing written",
                self.tableau.method
            );
            return Err(Error::InterpolateIntoLiveState);
        }
        if self.binding.is_none() {
            return Err(Error::NotInitialized);
        }
        let n = self.y1.len();
        if out.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: out.len(),
            });
        }
        if self.taken == 0.0 {
            out.copy_from_slice(&self.y1);
            return Ok(());
        }
        if !self.coeffs_valid {
            self.build_dense();
        }

        let theta = t_local / self.taken;
        let theta1 = 1.0 - theta;
        let [c0, c1, c2, c3, c4] = &self.cont;
        for i in 0..n {
            out[i] = c0[i] + theta * (c1[i] + theta1 * (c2[i] + theta * (c3[i] + theta1 * c4[i])));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::methods::rk::tableau::{DOPRI5, DORMAND_PRINCE45};

    /// x' = -lambda x, t' = 1
    struct Decay {
        state: Vec<Float>,
        lambda: Float,
    }

    impl Decay {
        fn new(lambda: Float) -> Self {
            Self {
                state: vec![1.0, 0.0],
                lambda,
            }
        }
    }

    impl ODE for Decay {
        fn state(&self) -> &[Float] {
            &self.state
        }
        fn state_mut(&mut self) -> &mut [Float] {
            &mut self.state
        }
        fn rate(&self, state: &[Float], rate: &mut [Float]) {
            rate[0] = -self.lambda * state[0];
            rate[1] = 1.0;
        }
    }

    fn engine(tableau: &'static ButcherTableau, settings: Settings) -> ExplicitRK {
        ExplicitRK::new(tableau, 0.1, 1e-8.into(), 1e-8.into(), &settings).unwrap()
    }

    #[test]
    fn decay_is_accurate() {
        for tableau in [&DOPRI5, &DORMAND_PRINCE45] {
            let mut rk = engine(tableau, Settings::default());
            let mut model = Decay::new(1.0);
            while model.state[1] < 2.0 {
                assert!(rk.step(&mut model) > 0.0, "{:?}", tableau.method);
                assert_eq!(rk.error_code(), ErrorCode::NoError);
            }
            let exact = (-model.state[1]).exp();
            assert_relative_eq!(model.state[0], exact, max_relative = 1e-5);
        }
    }

    #[test]
    fn stage_evaluations_are_counted() {
        for tableau in [&DOPRI5, &DORMAND_PRINCE45] {
            let settings = Settings::builder().initial_step(0.01).build();
            let mut rk = engine(tableau, settings);
            let mut model = Decay::new(1.0);
            assert_eq!(rk.step(&mut model), 0.01);
            let stats = rk.stats();
            assert_eq!((stats.naccpt, stats.nrejct), (1, 0));
            // start rate + remaining stages + rate at the new state
            assert_eq!(stats.nfev, 7, "{:?}", tableau.method);
        }
    }

    #[test]
    fn rejected_step_is_retried_smaller() {
        for tableau in [&DOPRI5, &DORMAND_PRINCE45] {
            let settings = Settings::builder().initial_step(1.0).build();
            let mut rk = ExplicitRK::new(tableau, 1.0, 1e-8.into(), 1e-8.into(), &settings).unwrap();
            let mut model = Decay::new(50.0);
            let h = rk.step(&mut model);
            assert!(rk.stats().nrejct >= 1);
            assert!(h > 0.0 && h < 1.0);
            assert_eq!(rk.error_code(), ErrorCode::NoError);
            assert_relative_eq!(model.state[0], (-50.0 * h).exp(), max_relative = 1e-5);
        }
    }

    #[test]
    fn interpolation_hits_both_step_ends() {
        for tableau in [&DOPRI5, &DORMAND_PRINCE45] {
            let mut rk = engine(tableau, Settings::default());
            let mut model = Decay::new(3.0);
            let start = model.state.clone();
            let h = rk.step(&mut model);

            let mut out = vec![0.0; 2];
            rk.interpolate(0.0, &mut out).unwrap();
            assert_relative_eq!(out[0], start[0], epsilon = 1e-14);
            assert_relative_eq!(out[1], start[1], epsilon = 1e-14);
            rk.interpolate(h, &mut out).unwrap();
            assert_relative_eq!(out[0], model.state[0], epsilon = 1e-14);
            assert_relative_eq!(out[1], model.state[1], epsilon = 1e-14);

            rk.interpolate(0.5 * h, &mut out).unwrap();
            assert_relative_eq!(out[1], 0.5 * h, epsilon = 1e-14);
            assert_relative_eq!(out[0], (-1.5 * h).exp(), max_relative = 1e-6);
        }
    }

    #[test]
    fn interpolation_before_first_step_copies_state() {
        let mut rk = engine(&DOPRI5, Settings::default());
        let model = Decay::new(1.0);
        rk.initialize(&model, 0.1).unwrap();
        let mut out = vec![9.0; 2];
        rk.interpolate(0.05, &mut out).unwrap();
        assert_eq!(out, model.state);

        let mut short = vec![0.0; 1];
        assert_eq!(
            rk.interpolate(0.0, &mut short),
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn max_step_bounds_every_step() {
        let settings = Settings::builder().max_step(0.02).build();
        let mut rk = engine(&DOPRI5, settings);
        let mut model = Decay::new(0.1);
        for _ in 0..20 {
            let h = rk.step(&mut model);
            assert!(h > 0.0 && h <= 0.02);
        }
        assert!(rk.step_size() <= 0.02);
    }

    #[test]
    fn negative_step_integrates_backwards() {
        let mut rk = ExplicitRK::new(&DOPRI5, -0.1, 1e-9.into(), 1e-9.into(), &Settings::default())
            .unwrap();
        let mut model = Decay::new(1.0);
        while model.state[1] > -1.0 {
            assert!(rk.step(&mut model) < 0.0);
        }
        assert_relative_eq!(model.state[0], (-model.state[1]).exp(), max_relative = 1e-6);
    }

    #[test]
    fn vector_tolerance_must_match_the_model() {
        let mut rk = ExplicitRK::new(
            &DOPRI5,
            0.1,
            vec![1e-6; 3].into(),
            1e-6.into(),
            &Settings::default(),
        )
        .unwrap();
        let mut model = Decay::new(1.0);
        assert_eq!(
            rk.initialize(&model, 0.1),
            Err(Error::DimensionMismatch {
                expected: 2,
                found: 3
            })
        );
        assert_eq!(rk.step(&mut model), 0.0);
        assert_eq!(model.state, vec![1.0, 0.0]);
    }
}
