//! Simplified Newton iteration for the Radau IIA stage equations.
//!
//! The iteration runs in the variables transformed by `T^{-1}`, where the
//! 3n×3n system splits into one real n×n system and one complex n×n system
//! (solved as a 2n×2n real system).

use crate::{
    Error, Float, ODE,
    matrix::{Lu, Matrix},
};

use super::radau5::{
    ALPH, BETA, T00, T01, T02, T10, T11, T12, T20, TINV00, TINV01, TINV02, TINV10, TINV11,
    TINV12, TINV20, TINV21, TINV22, U1,
};

/// Scratch owned by one engine, sized once per binding.
#[derive(Debug, Clone)]
pub(super) struct Workspace {
    /// State at the start of the step.
    pub y0: Vec<Float>,
    /// Stage state / trial state.
    pub y: Vec<Float>,
    /// Rate at `y0`.
    pub f0: Vec<Float>,
    pub scal: Vec<Float>,
    /// Stage increments.
    pub z: [Vec<Float>; 3],
    /// Transformed stage increments, `f = T^{-1} z`.
    pub f: [Vec<Float>; 3],
    /// Stage rates, then Newton corrections.
    pub k: [Vec<Float>; 3],
    /// Increments of the last accepted step.
    pub z_acc: [Vec<Float>; 3],
    /// Increments of the last converged attempt.
    pub z_try: [Vec<Float>; 3],
    /// `Σ (d_i / h) z_i` of the error estimate.
    pub tmp: Vec<Float>,
    pub err: Vec<Float>,
    pub rhs23: Vec<Float>,
    pub scratch: Vec<Float>,
    pub jac: Matrix,
}

impl Workspace {
    pub fn new(state: &[Float]) -> Self {
        let n = state.len();
        let v = || vec![0.0; n];
        Self {
            y0: state.to_vec(),
            y: state.to_vec(),
            f0: v(),
            scal: v(),
            z: [v(), v(), v()],
            f: [v(), v(), v()],
            k: [v(), v(), v()],
            z_acc: [v(), v(), v()],
            z_try: [v(), v(), v()],
            tmp: v(),
            err: v(),
            rhs23: vec![0.0; 2 * n],
            scratch: vec![0.0; 2 * n],
            jac: Matrix::zeros(n),
        }
    }

    pub fn len(&self) -> usize {
        self.y0.len()
    }

    /// Set `f = T^{-1} z`.
    pub fn transform_increments(&mut self) {
        let [z1, z2, z3] = &self.z;
        let [f1, f2, f3] = &mut self.f;
        for i in 0..z1.len() {
            f1[i] = TINV00 * z1[i] + TINV01 * z2[i] + TINV02 * z3[i];
            f2[i] = TINV10 * z1[i] + TINV11 * z2[i] + TINV12 * z3[i];
            f3[i] = TINV20 * z1[i] + TINV21 * z2[i] + TINV22 * z3[i];
        }
    }
}

/// LU factors of `E1 = (u1/h) I - J` and of the 2n real form of
/// `((α + iβ)/h) I - J`, valid for the step size `h` they were built with.
#[derive(Debug, Clone)]
pub(super) struct IterationMatrices {
    pub real: Lu,
    pub complex: Lu,
    pub h: Float,
}

impl IterationMatrices {
    pub fn new(jac: &Matrix, h: Float) -> Result<Self, Error> {
        let n = jac.dim();
        let fac1 = U1 / h;
        let alphn = ALPH / h;
        let betan = BETA / h;

        let mut e1 = Matrix::zeros(n);
        let mut e2 = Matrix::zeros(2 * n);
        for r in 0..n {
            for c in 0..n {
                let diag = if r == c { 1.0 } else { 0.0 };
                let j = jac[(r, c)];
                e1[(r, c)] = fac1 * diag - j;
                let e2r = alphn * diag - j;
                let e2i = betan * diag;
                e2[(r, c)] = e2r;
                e2[(r, c + n)] = -e2i;
                e2[(r + n, c)] = e2i;
                e2[(r + n, c + n)] = e2r;
            }
        }

        Ok(Self {
            real: Lu::factor(&e1)?,
            complex: Lu::factor(&e2)?,
            h,
        })
    }
}

/// Parameters of one Newton solve.
#[derive(Debug, Clone, Copy)]
pub(super) struct NewtonParams {
    pub max_iter: usize,
    pub tol: Float,
    pub uround: Float,
    /// Contraction rate assumed before two iterates are available.
    pub theta0: Float,
}

/// A converged Newton solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Converged {
    pub iterations: usize,
    /// Last estimate of the contraction rate.
    pub theta: Float,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum NewtonFailure {
    /// Contraction rate at or above 0.99.
    Diverged,
    /// The predicted (or final) residual exceeds the tolerance by
    /// `violation` after `iteration` iterations.
    TooSlow { violation: Float, iteration: usize },
}

/// Solve the stage equations for a step of size `h` starting from the
/// increments in `ws.z` / `ws.f`.
///
/// `faccon` carries the convergence factor across steps. On success `ws.z`
/// holds the converged increments.
pub(super) fn solve<M: ODE + ?Sized>(
    model: &M,
    ws: &mut Workspace,
    lu: &IterationMatrices,
    params: &NewtonParams,
    faccon: &mut Float,
    nfev: &mut usize,
) -> Result<Converged, NewtonFailure> {
    let n = ws.len();
    let h = lu.h;
    let fac1 = U1 / h;
    let alphn = ALPH / h;
    let betan = BETA / h;
    let nit = params.max_iter;

    *faccon = faccon.max(params.uround).powf(0.8);
    let mut theta = params.theta0.abs();
    let mut dyno: Float = 0.0;
    let mut dynold: Float = 0.0;
    let mut thqold: Float = 0.0;
    let mut newt = 0;

    loop {
        if newt >= nit {
            return Err(NewtonFailure::TooSlow {
                violation: *faccon * dyno / params.tol,
                iteration: newt,
            });
        }

        for s in 0..3 {
            for i in 0..n {
                ws.y[i] = ws.y0[i] + ws.z[s][i];
            }
            model.rate(&ws.y, &mut ws.k[s]);
        }
        *nfev += 3;

        {
            let [k1, k2, k3] = &mut ws.k;
            let [f1, f2, f3] = &ws.f;
            for i in 0..n {
                let (a1, a2, a3) = (k1[i], k2[i], k3[i]);
                let s2 = -f2[i];
                let s3 = -f3[i];
                k1[i] = TINV00 * a1 + TINV01 * a2 + TINV02 * a3 - f1[i] * fac1;
                k2[i] = TINV10 * a1 + TINV11 * a2 + TINV12 * a3 + s2 * alphn - s3 * betan;
                k3[i] = TINV20 * a1 + TINV21 * a2 + TINV22 * a3 + s3 * alphn + s2 * betan;
            }
        }

        lu.real.solve_mut(&mut ws.k[0], &mut ws.scratch);
        ws.rhs23[..n].copy_from_slice(&ws.k[1]);
        ws.rhs23[n..].copy_from_slice(&ws.k[2]);
        lu.complex.solve_mut(&mut ws.rhs23, &mut ws.scratch);
        ws.k[1].copy_from_slice(&ws.rhs23[..n]);
        ws.k[2].copy_from_slice(&ws.rhs23[n..]);
        newt += 1;

        dyno = 0.0;
        if n > 0 {
            for i in 0..n {
                let denom = ws.scal[i];
                for dz in &ws.k {
                    dyno += (dz[i] / denom) * (dz[i] / denom);
                }
            }
            dyno = (dyno / (3 * n) as Float).sqrt();
        }

        if newt > 1 && newt < nit {
            let thq = dyno / dynold;
            theta = if newt == 2 { thq } else { (thq * thqold).sqrt() };
            thqold = thq;
            if theta < 0.99 {
                *faccon = theta / (1.0 - theta);
                let dyth = *faccon * dyno * theta.powi((nit - 1 - newt) as i32) / params.tol;
                if dyth >= 1.0 {
                    return Err(NewtonFailure::TooSlow {
                        violation: dyth,
                        iteration: newt,
                    });
                }
            } else {
                // also catches NaN
                return Err(NewtonFailure::Diverged);
            }
        }

        dynold = dyno.max(params.uround);
        {
            let [d1, d2, d3] = &ws.k;
            let [f1, f2, f3] = &mut ws.f;
            let [z1, z2, z3] = &mut ws.z;
            for i in 0..n {
                f1[i] += d1[i];
                f2[i] += d2[i];
                f3[i] += d3[i];
                z1[i] = T00 * f1[i] + T01 * f2[i] + T02 * f3[i];
                z2[i] = T10 * f1[i] + T11 * f2[i] + T12 * f3[i];
                z3[i] = T20 * f1[i] + f2[i];
            }
        }

        if *faccon * dyno <= params.tol {
            return Ok(Converged {
                iterations: newt,
                theta,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    /// x' = -x
    struct Linear {
        state: Vec<Float>,
    }

    impl ODE for Linear {
        fn state(&self) -> &[Float] {
            &self.state
        }
        fn state_mut(&mut self) -> &mut [Float] {
            &mut self.state
        }
        fn rate(&self, state: &[Float], rate: &mut [Float]) {
            rate[0] = -state[0];
        }
    }

    fn setup(h: Float) -> (Linear, Workspace, IterationMatrices) {
        let model = Linear { state: vec![1.0] };
        let mut ws = Workspace::new(&model.state);
        ws.jac[(0, 0)] = -1.0;
        ws.scal[0] = 1e-6;
        let lu = IterationMatrices::new(&ws.jac, h).unwrap();
        (model, ws, lu)
    }

    const PARAMS: NewtonParams = NewtonParams {
        max_iter: 7,
        tol: 1e-3,
        uround: 1e-16,
        theta0: 1e-3,
    };

    #[test]
    fn exact_jacobian_converges_quickly() {
        let h = 0.1;
        let (model, mut ws, lu) = setup(h);
        let mut faccon = 1.0;
        let mut nfev = 0;
        let conv = solve(&model, &mut ws, &lu, &PARAMS, &mut faccon, &mut nfev).unwrap();
        assert!(conv.iterations <= 3);
        assert_eq!(nfev, 3 * conv.iterations);
        // The last stage of Radau IIA(5) is the step end; compare with the
        // (2,3)-Padé approximant of exp(-h), accurate to O(h^6).
        assert_relative_eq!(ws.y0[0] + ws.z[2][0], (-h).exp(), max_relative = 1e-8);
    }

    #[test]
    fn wrong_jacobian_is_detected() {
        let h = 0.1;
        let (model, mut ws, _) = setup(h);
        // Jacobian with the wrong sign makes the iteration expand
        ws.jac[(0, 0)] = 1e3;
        let lu = IterationMatrices::new(&ws.jac, h).unwrap();
        let mut faccon = 1.0;
        let mut nfev = 0;
        let err = solve(&model, &mut ws, &lu, &PARAMS, &mut faccon, &mut nfev).unwrap_err();
        assert!(matches!(
            err,
            NewtonFailure::Diverged | NewtonFailure::TooSlow { .. }
        ));
    }

    #[test]
    fn singular_iteration_matrix_is_reported() {
        // u1/h - J vanishes for J = u1/h
        let mut jac = Matrix::zeros(1);
        jac[(0, 0)] = U1;
        assert_eq!(IterationMatrices::new(&jac, 1.0).unwrap_err(), Error::SingularMatrix);
    }
}
