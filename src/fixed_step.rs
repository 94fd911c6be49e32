//! Uniform-grid stepping on top of an adaptive engine.

use crate::{
    AdaptiveSolver, Error, ErrorCode, Float, Interpolate, ODE, Stats, methods::settings,
    ode::StateId,
};

/// Drives an adaptive engine on a private copy of the model state and
/// writes interpolated values on a uniform grid back to the model.
///
/// Every call to [`step`](Self::step) advances the model by exactly the
/// fixed step. The engine takes as many (or as few) adaptive steps as it
/// needs and the output is read from its dense output, so the fixed step
/// does not limit the accuracy.
///
/// # Example
///
/// ```
/// use odestep::prelude::*;
///
/// struct Clock {
///     state: [Float; 1],
/// }
///
/// impl ODE for Clock {
///     fn state(&self) -> &[Float] {
///         &self.state
///     }
///     fn state_mut(&mut self) -> &mut [Float] {
///         &mut self.state
///     }
///     fn rate(&self, _state: &[Float], rate: &mut [Float]) {
///         rate[0] = 1.0;
///     }
/// }
///
/// let mut clock = Clock { state: [0.0] };
/// let mut stepper = Solver::builder().build().unwrap().fixed_step(0.1).unwrap();
/// for k in 1..=10 {
///     assert_eq!(stepper.step(&mut clock), 0.1);
///     assert!((clock.state[0] - 0.1 * k as Float).abs() < 1e-12);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FixedStepAdapter<E> {
    engine: E,
    fixed_step: Float,
    // offset of the next output point from the end of the engine's last step
    remainder: Float,
    shadow: Vec<Float>,
    model_id: Option<StateId>,
}

/// The model seen by the engine: the adapter's state copy with the user's
/// rate function.
struct Shadow<'a, M: ?Sized> {
    state: &'a mut [Float],
    model: &'a M,
}

impl<M: ODE + ?Sized> ODE for Shadow<'_, M> {
    fn state(&self) -> &[Float] {
        &*self.state
    }

    fn state_mut(&mut self) -> &mut [Float] {
        &mut *self.state
    }

    fn rate(&self, state: &[Float], rate: &mut [Float]) {
        self.model.rate(state, rate);
    }
}

impl<E: AdaptiveSolver + Interpolate> FixedStepAdapter<E> {
    pub fn new(engine: E, fixed_step: Float) -> Result<Self, Error> {
        let fixed_step = settings::step_size(fixed_step)?;
        Ok(Self {
            engine,
            fixed_step,
            remainder: fixed_step,
            shadow: Vec::new(),
            model_id: None,
        })
    }

    /// Start over from `model`'s current state with the fixed step
    /// `fixed_step`.
    pub fn initialize<M: ODE + ?Sized>(&mut self, model: &M, fixed_step: Float) -> Result<(), Error> {
        self.fixed_step = settings::step_size(fixed_step)?;
        self.model_id = None;
        self.sync(model)
    }

    /// Copy the model state if the adapter is not yet attached to this
    /// model buffer.
    fn sync<M: ODE + ?Sized>(&mut self, model: &M) -> Result<(), Error> {
        let id = StateId::of(model.state());
        if self.model_id == Some(id) {
            return Ok(());
        }
        self.shadow.clear();
        self.shadow.extend_from_slice(model.state());
        self.remainder = self.fixed_step;
        let shadow = Shadow {
            state: &mut self.shadow,
            model,
        };
        self.engine.initialize(&shadow, self.fixed_step)?;
        self.model_id = Some(id);
        Ok(())
    }

    /// Advance `model` by the fixed step and return it. Returns `0` and
    /// leaves the model untouched if the engine stops making progress; see
    /// [`error_code`](Self::error_code).
    pub fn step<M: ODE + ?Sized>(&mut self, model: &mut M) -> Float {
        if let Err(e) = self.sync(&*model) {
            log::warn!("fixed step: cannot attach to the model: {e}");
            return 0.0;
        }

        while self.fixed_step * self.remainder > 0.0 {
            let mut shadow = Shadow {
                state: &mut self.shadow,
                model: &*model,
            };
            let taken = self.engine.step(&mut shadow);
            if taken == 0.0 {
                log::warn!(
                    "fixed step: engine made no progress ({:?}), model left unchanged",
                    self.engine.error_code()
                );
                return 0.0;
            }
            self.remainder -= taken;
        }

        let t_local = self.remainder + self.engine.taken_step_size();
        if let Err(e) = self.engine.interpolate(t_local, model.state_mut()) {
            log::warn!("fixed step: interpolation failed: {e}");
            return 0.0;
        }
        self.remainder += self.fixed_step;
        self.fixed_step
    }

    /// Change the fixed step. A change of sign reverses the engine too.
    pub fn set_step_size(&mut self, fixed_step: Float) -> Result<(), Error> {
        let fixed_step = settings::step_size(fixed_step)?;
        if fixed_step.signum() != self.fixed_step.signum() {
            self.engine.set_step_size(-self.engine.step_size())?;
        }
        self.remainder += fixed_step - self.fixed_step;
        self.fixed_step = fixed_step;
        Ok(())
    }

    pub fn step_size(&self) -> Float {
        self.fixed_step
    }

    pub fn set_tolerance(&mut self, tol: Float) -> Result<(), Error> {
        self.engine.set_tolerance(tol)
    }

    pub fn tolerance(&self) -> Float {
        self.engine.tolerance()
    }

    pub fn error_code(&self) -> ErrorCode {
        self.engine.error_code()
    }

    pub fn stats(&self) -> Stats {
        self.engine.stats()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_inner(self) -> E {
        self.engine
    }
}
