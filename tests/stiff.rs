use approx::assert_relative_eq;
use odestep::prelude::*;

mod common;
use common::{Decay, VanDerPol, integrate_to};

/// Value of the model at `t_end` read from the last step's dense output.
fn state_at<S: AdaptiveSolver + Interpolate>(
    solver: &mut S,
    state: &[Float],
    t_index: usize,
    t_end: Float,
) -> Vec<Float> {
    let mut out = vec![0.0; state.len()];
    let t_local = solver.taken_step_size() - (state[t_index] - t_end);
    solver.interpolate(t_local, &mut out).unwrap();
    out
}

#[test]
fn explicit_method_blows_up_where_radau_stays_stable() {
    let settings = Settings::builder()
        .initial_step(0.01)
        .max_retries(1)
        .build();

    let mut final_x = Vec::new();
    for method in [Method::Dopri5, Method::Radau5] {
        let mut s = Solver::builder()
            .method(method)
            .step_size(0.01)
            .settings(settings.clone())
            .build()
            .unwrap();
        // hλ = -100, far outside the explicit stability region
        let mut model = Decay::new(1e4, 1.0);
        for _ in 0..50 {
            s.set_step_size(0.01).unwrap();
            s.step(&mut model);
        }
        final_x.push(model.state[0]);
    }

    let (dopri, radau) = (final_x[0], final_x[1]);
    assert!(!(dopri.abs() < 10.0), "Dopri5 stayed bounded: {dopri}");
    assert!(radau.abs() < 10.0, "Radau5 diverged: {radau}");
}

#[test]
fn van_der_pol_is_cheaper_with_radau() {
    let mu = 1e3;
    let t_end = 1.0;

    let mut dopri = Solver::builder().rtol(1e-6).atol(1e-6).build().unwrap();
    let mut model = VanDerPol::new(mu);
    integrate_to(&mut dopri, &mut model, 2, t_end);
    let x_dopri = state_at(&mut dopri, &model.state, 2, t_end);

    let mut radau = Solver::builder()
        .method(Method::Radau5)
        .rtol(1e-6)
        .atol(1e-6)
        .build()
        .unwrap();
    let mut model = VanDerPol::new(mu);
    integrate_to(&mut radau, &mut model, 2, t_end);
    let x_radau = state_at(&mut radau, &model.state, 2, t_end);

    assert_relative_eq!(x_dopri[0], x_radau[0], epsilon = 1e-3);
    assert_relative_eq!(x_dopri[2], t_end, epsilon = 1e-10);
    assert_relative_eq!(x_radau[2], t_end, epsilon = 1e-10);
    assert!(
        2 * radau.stats().nfev < dopri.stats().nfev,
        "Radau5 {:?} vs Dopri5 {:?}",
        radau.stats(),
        dopri.stats()
    );
}
