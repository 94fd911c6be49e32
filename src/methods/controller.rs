//! Step size selection shared by the explicit and implicit engines.

use crate::Float;

/// Proposal made by a controller after one attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proposal {
    /// Whether the attempt's error was within tolerance.
    pub accepted: bool,
    /// Step size for the next attempt (or the next step when accepted).
    pub step_size: Float,
}

/// Classical error-per-step controller with optional Lund stabilization.
///
/// `hnew / h` stays within `[scale_min, scale_max]`. With `beta > 0` the
/// previous accepted error damps the update (PI control).
#[derive(Debug, Clone)]
pub struct StepSizeController {
    order: usize,
    scale_min: Float,
    scale_max: Float,
    safety: Float,
    beta: Float,
    err_old: Float,
}

impl StepSizeController {
    pub fn new(order: usize, scale_min: Float, scale_max: Float, safety: Float, beta: Float) -> Self {
        Self {
            order,
            scale_min,
            scale_max,
            safety,
            beta,
            err_old: 1e-4,
        }
    }

    /// Forget the error history.
    pub fn reset(&mut self) {
        self.err_old = 1e-4;
    }

    /// Propose the next step size from the normalized error `err` of an
    /// attempt of size `h`.
    ///
    /// A rejected attempt always yields a strictly smaller step, also for
    /// infinite or NaN errors.
    pub fn propose(&mut self, err: Float, h: Float) -> Proposal {
        let expo = 1.0 / self.order as Float - self.beta * 0.75;
        let (fac11, fac) = if err != 0.0 {
            let fac11 = err.powf(expo);
            // Lund-Stabilization
            let fac = fac11 / self.err_old.powf(self.beta);
            // We require scale_min <= hnew/h <= scale_max
            (fac11, clamp(fac / self.safety, 1.0 / self.scale_max, 1.0 / self.scale_min))
        } else {
            (1.0 / self.scale_min, 1.0 / self.scale_max)
        };

        if err <= 1.0 {
            self.err_old = err.max(1e-4);
            Proposal {
                accepted: true,
                step_size: h / fac,
            }
        } else {
            // NaN compares false everywhere; min() then picks the bound.
            Proposal {
                accepted: false,
                step_size: h / (1.0 / self.scale_min).min(fac11 / self.safety),
            }
        }
    }
}

/// Step size policy of an explicit tableau.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    /// [`StepSizeController`]: one exponent for growth and shrinkage,
    /// optional Lund stabilization.
    Stabilized,
    /// [`DeadbandController`]: separate exponents and no change while the
    /// error is between a tenth of the tolerance and the tolerance.
    Deadband,
}

/// Controller with a dead band.
///
/// Rejected attempts shrink by `safety·err^(-1/4)`, never below
/// `scale_min`. Accepted steps with `err < 0.1` grow by
/// `safety·err^(-1/5)`, never above `scale_max`; any other accepted step
/// keeps its size. Ignores `beta`.
#[derive(Debug, Clone)]
pub struct DeadbandController {
    scale_min: Float,
    scale_max: Float,
    safety: Float,
}

impl DeadbandController {
    pub fn new(scale_min: Float, scale_max: Float, safety: Float) -> Self {
        Self {
            scale_min,
            scale_max,
            safety,
        }
    }

    pub fn propose(&self, err: Float, h: Float) -> Proposal {
        // too small to be meaningful: grow by the largest factor
        let err = if err <= Float::MIN_POSITIVE { 1e-5 } else { err };
        if !(err <= 1.0) {
            // NaN.max(lo) is lo
            let fac = self.safety * err.powf(-0.25);
            return Proposal {
                accepted: false,
                step_size: h * fac.max(self.scale_min),
            };
        }
        let mut step_size = h;
        if err < 0.1 {
            let fac = self.safety * err.powf(-0.2);
            if fac > 1.0 {
                step_size = h * fac.min(self.scale_max);
            }
        }
        Proposal {
            accepted: true,
            step_size,
        }
    }
}

/// The controller selected by a tableau's [`StepControl`].
#[derive(Debug, Clone)]
pub enum ExplicitController {
    Stabilized(StepSizeController),
    Deadband(DeadbandController),
}

impl ExplicitController {
    pub fn new(
        control: StepControl,
        order: usize,
        scale_min: Float,
        scale_max: Float,
        safety: Float,
        beta: Float,
    ) -> Self {
        match control {
            StepControl::Stabilized => ExplicitController::Stabilized(StepSizeController::new(
                order, scale_min, scale_max, safety, beta,
            )),
            StepControl::Deadband => {
                ExplicitController::Deadband(DeadbandController::new(scale_min, scale_max, safety))
            }
        }
    }

    pub fn propose(&mut self, err: Float, h: Float) -> Proposal {
        match self {
            ExplicitController::Stabilized(c) => c.propose(err, h),
            ExplicitController::Deadband(c) => c.propose(err, h),
        }
    }

    pub fn reset(&mut self) {
        if let ExplicitController::Stabilized(c) = self {
            c.reset();
        }
    }
}

/// Step size control of Radau5: Newton-iteration aware factor combined
/// with the predictive controller of Gustafsson.
#[derive(Debug, Clone)]
pub struct NewtonStepController {
    safety: Float,
    quot_min: Float,
    quot_max: Float,
    max_newton: usize,
    h_acc: Float,
    err_acc: Float,
}

impl NewtonStepController {
    pub fn new(scale_min: Float, scale_max: Float, safety: Float, max_newton: usize) -> Self {
        Self {
            safety,
            quot_min: 1.0 / scale_max,
            quot_max: 1.0 / scale_min,
            max_newton,
            h_acc: 1.0,
            err_acc: 1.0,
        }
    }

    pub fn reset(&mut self) {
        self.h_acc = 1.0;
        self.err_acc = 1.0;
    }

    /// Propose the next step after a converged Newton iteration that took
    /// `newton_iters` iterations. `first` is true while no step has been
    /// accepted yet.
    pub fn propose(&mut self, err: Float, newton_iters: usize, h: Float, first: bool) -> Proposal {
        let nit = self.max_newton as Float;
        let cfac = self.safety * (1.0 + 2.0 * nit);
        let fac = self.safety.min(cfac / (newton_iters as Float + 2.0 * nit));
        let mut quot = clamp(err.powf(0.25) / fac, self.quot_min, self.quot_max);
        let mut hnew = h / quot;

        if err < 1.0 {
            // predictive controller of Gustafsson
            if !first {
                let facgus = (self.h_acc / h) * (err * err / self.err_acc).powf(0.25) / self.safety;
                let facgus = clamp(facgus, self.quot_min, self.quot_max);
                quot = quot.max(facgus);
                hnew = h / quot;
            }
            self.h_acc = h;
            self.err_acc = err.max(1e-2);
            Proposal {
                accepted: true,
                step_size: hnew,
            }
        } else {
            if first {
                hnew = h * 0.1;
            }
            Proposal {
                accepted: false,
                step_size: hnew,
            }
        }
    }
}

/// Clamp that maps NaN to the upper bound.
fn clamp(v: Float, lo: Float, hi: Float) -> Float {
    lo.max(hi.min(v))
}

/// Limit `|h|` to `|limit|` keeping the sign of `h`.
pub(crate) fn limit_magnitude(h: Float, limit: Float) -> Float {
    if h.abs() > limit.abs() {
        limit.abs().copysign(h)
    } else {
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dopri() -> StepSizeController {
        StepSizeController::new(5, 0.33, 6.0, 0.9, 0.0)
    }

    #[test]
    fn rejected_proposals_always_shrink() {
        for err in [1.0000001, 1.5, 10.0, 1e3, 1e30, Float::INFINITY, Float::NAN] {
            for h in [0.1, -0.1, 1e-8] {
                let p = dopri().propose(err, h);
                assert!(!p.accepted);
                assert!(p.step_size.abs() < h.abs(), "err = {err}, h = {h}");
                assert_eq!(p.step_size.signum(), h.signum());
            }
        }
    }

    #[test]
    fn accepted_growth_is_bounded() {
        let mut c = dopri();
        let p = c.propose(0.0, 0.1);
        assert!(p.accepted);
        assert!((p.step_size - 0.6).abs() < 1e-12);

        let p = c.propose(1e-12, 0.1);
        assert!(p.step_size <= 0.6 + 1e-12);

        // err == 1 is still accepted but shrinks by the safety factor
        let p = c.propose(1.0, 0.1);
        assert!(p.accepted);
        assert!(p.step_size < 0.1);
    }

    #[test]
    fn stabilized_control_uses_error_history() {
        let mut plain = StepSizeController::new(5, 0.2, 10.0, 0.9, 0.0);
        let mut pi = StepSizeController::new(5, 0.2, 10.0, 0.9, 0.04);
        plain.propose(0.5, 0.1);
        pi.propose(0.5, 0.1);
        let a = plain.propose(0.01, 0.1).step_size;
        let b = pi.propose(0.01, 0.1).step_size;
        assert_ne!(a, b);
    }

    #[test]
    fn newton_controller_cuts_first_rejection_by_ten() {
        let mut c = NewtonStepController::new(0.2, 8.0, 0.9, 7);
        let p = c.propose(4.0, 3, 0.01, true);
        assert!(!p.accepted);
        assert!((p.step_size - 0.001).abs() < 1e-15);

        let p = c.propose(4.0, 3, 0.01, false);
        assert!(!p.accepted);
        assert!(p.step_size < 0.01);
    }

    #[test]
    fn newton_controller_penalizes_many_iterations() {
        let mut fast = NewtonStepController::new(0.2, 8.0, 0.9, 7);
        let mut slow = NewtonStepController::new(0.2, 8.0, 0.9, 7);
        let a = fast.propose(0.1, 1, 0.01, true).step_size;
        let b = slow.propose(0.1, 7, 0.01, true).step_size;
        assert!(a >= b);
    }

    #[test]
    fn deadband_keeps_step_inside_the_band() {
        let c = DeadbandController::new(0.1, 10.0, 0.9);
        for err in [0.1, 0.5, 1.0] {
            let p = c.propose(err, 0.2);
            assert!(p.accepted);
            assert_eq!(p.step_size, 0.2);
        }
        // growth uses the 1/5 exponent and is capped
        let p = c.propose(1e-3, 0.2);
        let expected = 0.2 * 0.9 * (1e-3 as Float).powf(-0.2);
        assert!((p.step_size - expected).abs() < 1e-12);
        // a vanishing error counts as 1e-5 of the tolerance
        assert!((c.propose(0.0, 0.2).step_size - 0.2 * 9.0).abs() < 1e-12);
    }

    #[test]
    fn deadband_shrinks_with_quarter_exponent() {
        let c = DeadbandController::new(0.1, 10.0, 0.9);
        let p = c.propose(16.0, -0.4);
        assert!(!p.accepted);
        assert!((p.step_size - (-0.4 * 0.9 * 0.5)).abs() < 1e-12);
        for err in [1e12, Float::INFINITY, Float::NAN] {
            let p = c.propose(err, 0.4);
            assert!(!p.accepted);
            assert!((p.step_size - 0.04).abs() < 1e-12, "err = {err}");
        }
    }

    #[test]
    fn magnitude_limit_keeps_sign() {
        assert_eq!(limit_magnitude(-2.0, 0.5), -0.5);
        assert_eq!(limit_magnitude(0.1, -0.5), 0.1);
    }
}
