//! # Example: Exponential Decay
//!
//! Step the exponential decay equation with the default solver and sample
//! it on a uniform grid through the dense output.
//!
//! Equations:
//! dy/dt = -y
//! dt/dt = 1
//!
//! Initial condition: y(0) = 1.0
//!

use odestep::prelude::*;

struct Decay {
    state: [Float; 2],
}

impl ODE for Decay {
    fn state(&self) -> &[Float] {
        &self.state
    }

    fn state_mut(&mut self) -> &mut [Float] {
        &mut self.state
    }

    fn rate(&self, state: &[Float], rate: &mut [Float]) {
        rate[0] = -state[0];
        rate[1] = 1.0;
    }
}

fn main() {
    let mut model = Decay { state: [1.0, 0.0] };

    // Default method is Dopri5
    let mut solver = match Solver::builder().rtol(1e-6).atol(1e-6).build() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return;
        }
    };

    let mut next_sample = 0.0;
    let mut out = [0.0; 2];
    while model.state[1] < 5.0 {
        let h = solver.step(&mut model);
        if h == 0.0 {
            eprintln!("Integration stalled: {:?}", solver.error_code());
            return;
        }
        // every sample point inside the step just taken
        while next_sample <= model.state[1] && next_sample <= 5.0 {
            let t_local = h - (model.state[1] - next_sample);
            if solver.interpolate(t_local, &mut out).is_ok() {
                println!("t = {:.4}, y = {:.8}, exact = {:.8}", out[1], out[0], (-out[1]).exp());
            }
            next_sample += 0.5;
        }
    }

    let stats = solver.stats();
    println!("Final state: t = {:.5}, y = {:.8}", model.state[1], model.state[0]);
    println!("Number of function evaluations: {}", stats.nfev);
    println!("Number of accepted steps: {}", stats.naccpt);
    println!("Number of rejected steps: {}", stats.nrejct);
}
