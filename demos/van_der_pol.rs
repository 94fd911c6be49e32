//! # Example: Van der Pol oscillator
//!
//! Solve the stiff Van der Pol oscillator with Radau5 and compare the work
//! with the explicit Dopri5 method.
//!
//! Equations:
//! dy0/dt = y1
//! dy1/dt = ((1 - y0^2) * y1 - y0) / eps
//!
//! Initial conditions: y0(0) = 2.0, y1(0) = 0.0
//!

use odestep::prelude::*;

struct VanDerPol {
    eps: Float,
    // [y0, y1, t]
    state: Vec<Float>,
}

impl ODE for VanDerPol {
    fn state(&self) -> &[Float] {
        &self.state
    }

    fn state_mut(&mut self) -> &mut [Float] {
        &mut self.state
    }

    fn rate(&self, state: &[Float], rate: &mut [Float]) {
        rate[0] = state[1];
        rate[1] = ((1.0 - state[0] * state[0]) * state[1] - state[0]) / self.eps;
        rate[2] = 1.0;
    }
}

fn main() -> Result<(), Error> {
    let t_end = 2.0;
    for method in [Method::Radau5, Method::Dopri5] {
        let mut model = VanDerPol {
            eps: 1e-3,
            state: vec![2.0, 0.0, 0.0],
        };
        let mut solver = Solver::builder()
            .method(method)
            .rtol(1e-6)
            .atol(1e-6)
            .settings(Settings::builder().predictor(Predictor::Extrapolate).build())
            .build()?;

        while model.state[2] < t_end {
            if solver.step(&mut model) == 0.0 {
                eprintln!("{method:?} stalled: {:?}", solver.error_code());
                break;
            }
        }

        let stats = solver.stats();
        println!("{method:?}");
        println!("  Final state: t = {:.5}, y = {:?}", model.state[2], &model.state[..2]);
        println!("  Number of function evaluations: {}", stats.nfev);
        println!("  Number of Jacobian evaluations: {}", stats.njev);
        println!("  Number of LU decompositions: {}", stats.ndec);
        println!("  Number of accepted steps: {}", stats.naccpt);
        println!("  Number of rejected steps: {}", stats.nrejct);
    }
    Ok(())
}
