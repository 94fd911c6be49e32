//! Local error estimate of Radau IIA(5).
//!
//! The embedded formula of Hairer & Wanner is filtered through `E1` so that
//! the estimate stays bounded for stiff components.

use crate::{Float, ODE, matrix::Lu};

use super::{
    newton::Workspace,
    radau5::{DD1, DD2, DD3},
};

/// First approximation: solve `E1 err = f(y0) + Σ (d_i/h) z_i`.
///
/// Leaves `Σ (d_i/h) z_i` in `ws.tmp` for [`second_approximation`].
pub(super) fn first_approximation(ws: &mut Workspace, e1: &Lu, h: Float) -> Float {
    let hee1 = DD1 / h;
    let hee2 = DD2 / h;
    let hee3 = DD3 / h;
    let [z1, z2, z3] = &ws.z;
    for i in 0..ws.tmp.len() {
        ws.tmp[i] = hee1 * z1[i] + hee2 * z2[i] + hee3 * z3[i];
        ws.err[i] = ws.f0[i] + ws.tmp[i];
    }
    e1.solve_mut(&mut ws.err, &mut ws.scratch);
    scaled_rms(&ws.err, &ws.scal)
}

/// Second approximation, with one rate evaluation at `y0 + err`. Used when
/// the first estimate is too pessimistic at the start of an integration or
/// after a rejection.
pub(super) fn second_approximation<M: ODE + ?Sized>(
    model: &M,
    ws: &mut Workspace,
    e1: &Lu,
    nfev: &mut usize,
) -> Float {
    for i in 0..ws.y.len() {
        ws.y[i] = ws.y0[i] + ws.err[i];
    }
    model.rate(&ws.y, &mut ws.k[0]);
    *nfev += 1;
    for i in 0..ws.err.len() {
        ws.err[i] = ws.k[0][i] + ws.tmp[i];
    }
    e1.solve_mut(&mut ws.err, &mut ws.scratch);
    scaled_rms(&ws.err, &ws.scal)
}

fn scaled_rms(v: &[Float], scal: &[Float]) -> Float {
    if v.is_empty() {
        return 1e-10;
    }
    let sum: Float = v.iter().zip(scal).map(|(v, s)| (v / s) * (v / s)).sum();
    let rms = (sum / v.len() as Float).sqrt();
    if rms.is_nan() { rms } else { rms.max(1e-10) }
}
