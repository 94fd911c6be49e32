//! Example demonstrating fixed-step sampling of a harmonic oscillator with
//! each of the available methods.

use odestep::prelude::*;

struct HarmonicOscillator {
    // [x, v, t]
    state: Vec<Float>,
}

impl ODE for HarmonicOscillator {
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

fn main() -> Result<(), Error> {
    for method in [Method::Dopri5, Method::DormandPrince45, Method::Radau5] {
        let mut model = HarmonicOscillator {
            state: vec![1.0, 0.0, 0.0],
        };
        let mut stepper = Solver::builder()
            .method(method)
            .rtol(1e-9)
            .atol(1e-9)
            .build()?
            .fixed_step(0.25)?;

        let mut max_error: Float = 0.0;
        for _ in 0..40 {
            stepper.step(&mut model);
            let t = model.state[2];
            max_error = max_error.max((model.state[0] - t.cos()).abs());
        }

        let stats = stepper.stats();
        println!(
            "{method:?}: t = {:.2}, x = {:.9}, max |x - cos t| = {max_error:.2e}, nfev = {}, accepted = {}, rejected = {}",
            model.state[2], model.state[0], stats.nfev, stats.naccpt, stats.nrejct
        );
    }
    Ok(())
}
