#![allow(dead_code)]

use odestep::{Float, ODE};

/// x' = -λx, t' = 1. State `[x, t]`.
pub struct Decay {
    pub lambda: Float,
    pub state: Vec<Float>,
}

impl Decay {
    pub fn new(lambda: Float, x0: Float) -> Self {
        Self {
            lambda,
            state: vec![x0, 0.0],
        }
    }

    pub fn exact(&self, x0: Float) -> Float {
        x0 * (-self.lambda * self.state[1]).exp()
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

/// Simple harmonic oscillator x'' = -x. State `[x, v, t]`, starting at
/// `[1, 0, 0]` so that `x = cos t`.
pub struct Oscillator {
    pub state: Vec<Float>,
}

impl Oscillator {
    pub fn new() -> Self {
        Self {
            state: vec![1.0, 0.0, 0.0],
        }
    }
}

impl ODE for Oscillator {
    fn state(&self) -> &[Float] {
        &self.state
    }
    fn state_mut(&mut self) -> &mut [Float] {
        &mut self.state
    }
    fn rate(&self, state: &[Float], rate: &mut [Float]) {
        rate[0] = state[1];
        rate[1] = -state[0];
        rate[2] = 1.0;
    }
}

/// Stiff relaxation onto `cos t`: x' = -λ(x - cos t) - sin t. With
/// `x(0) = 1` the solution is `x = cos t`. State `[x, t]`.
pub struct Relaxation {
    pub lambda: Float,
    pub state: Vec<Float>,
}

impl Relaxation {
    pub fn new(lambda: Float) -> Self {
        Self {
            lambda,
            state: vec![1.0, 0.0],
        }
    }
}

impl ODE for Relaxation {
    fn state(&self) -> &[Float] {
        &self.state
    }
    fn state_mut(&mut self) -> &mut [Float] {
        &mut self.state
    }
    fn rate(&self, state: &[Float], rate: &mut [Float]) {
        let t = state[1];
        rate[0] = -self.lambda * (state[0] - t.cos()) - t.sin();
        rate[1] = 1.0;
    }
}

/// Van der Pol oscillator in Liénard form with stiffness `mu`.
/// State `[x, y, t]`.
pub struct VanDerPol {
    pub mu: Float,
    pub state: Vec<Float>,
}

impl VanDerPol {
    pub fn new(mu: Float) -> Self {
        Self {
            mu,
            state: vec![2.0, 0.0, 0.0],
        }
    }
}

impl ODE for VanDerPol {
    fn state(&self) -> &[Float] {
        &self.state
    }
    fn state_mut(&mut self) -> &mut [Float] {
        &mut self.state
    }
    fn rate(&self, state: &[Float], rate: &mut [Float]) {
        let (x, y) = (state[0], state[1]);
        rate[0] = y;
        rate[1] = self.mu * ((1.0 - x * x) * y - x);
        rate[2] = 1.0;
    }
}

/// Step `solver` until the time component at `t_index` reaches `t_end`.
/// Panics if a step makes no progress.
pub fn integrate_to<S: odestep::AdaptiveSolver, M: ODE>(
    solver: &mut S,
    model: &mut M,
    t_index: usize,
    t_end: Float,
) -> usize {
    let mut steps = 0;
    while model.state()[t_index] < t_end {
        let h = solver.step(model);
        assert!(h != 0.0, "no progress at t = {}", model.state()[t_index]);
        steps += 1;
    }
    steps
}
