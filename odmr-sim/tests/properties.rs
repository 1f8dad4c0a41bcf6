#![allow(non_snake_case)]

use approx::{ assert_abs_diff_eq, assert_relative_eq };
use ndarray as nd;
use rand::{ Rng, SeedableRng, rngs::StdRng };
use odmr_sim::{
    contrast::{ self, ContrastMethod, Signal },
    solver::{ self, Method, OdeOptions },
    model::MHZ,
    Error,
    RateModel,
    RateParams,
    SevenLevelModel,
    SevenLevelRates,
};

fn max_abs<'a, I>(iter: I) -> f64
where I: IntoIterator<Item = &'a f64>
{
    iter.into_iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

// a fully connected model with random rates up to `k_max` MHz
fn random_model(rng: &mut StdRng, n: usize, k_max: f64) -> RateModel {
    let mut model = RateModel::new(n).unwrap();
    for i in 0..n {
        for j in 0..n {
            if i != j { model.set_rate(i, j, rng.gen_range(0.1..k_max)).unwrap(); }
        }
    }
    model.add_dynamic_rate("drive", 0, n - 1, 1.0).unwrap();
    model
}

fn random_distribution(rng: &mut StdRng, n: usize) -> nd::Array1<f64> {
    let P: nd::Array1<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let total = P.sum();
    P / total
}

fn scenario_model() -> RateModel {
    let mut model = RateModel::new(3).unwrap();
    model.set_rates([((1, 0), 50.0), ((1, 2), 10.0), ((2, 0), 5.0)]).unwrap();
    model.add_dynamic_rate("gamma", 0, 1, 1.0).unwrap();
    model
}

#[test]
fn generator_columns_sum_to_zero() {
    let mut rng = StdRng::seed_from_u64(10546);
    for n in 2..8 {
        let model = random_model(&mut rng, n, 3000.0);
        let params = RateParams::new().with("drive", rng.gen_range(0.0..100.0));
        let W = model.build(&params);
        for col in W.columns() {
            assert_abs_diff_eq!(col.sum(), 0.0, epsilon = 1e-6);
        }
    }
    let nv = SevenLevelModel::new(SevenLevelRates::default()).unwrap();
    for col in nv.build(12.8, 3.0, 3.0).columns() {
        assert_abs_diff_eq!(col.sum(), 0.0, epsilon = 1e-6);
    }
}

#[test]
fn evolution_conserves_probability() {
    let mut rng = StdRng::seed_from_u64(2718);
    let t = nd::array![0.0, 1e-9, 1e-7, 1e-5, 1e-3, 1e-1];
    for n in 2..8 {
        let model = random_model(&mut rng, n, 100.0);
        let W = model.build(&RateParams::new().with("drive", 1.0));
        let P0 = random_distribution(&mut rng, n);
        let P = solver::evolve(&W, &P0, &t).unwrap();
        for row in P.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-6);
        }
    }
}

#[test]
fn evolution_at_zero_is_identity() {
    let mut rng = StdRng::seed_from_u64(31415);
    let model = random_model(&mut rng, 5, 1000.0);
    let W = model.build(&RateParams::new());
    let P0 = random_distribution(&mut rng, 5);
    let P = solver::evolve(&W, &P0, &nd::array![0.0]).unwrap();
    assert_eq!(P.row(0), P0);
}

#[test]
fn steady_state_is_stationary() {
    let mut rng = StdRng::seed_from_u64(1618);
    for n in 2..8 {
        let model = random_model(&mut rng, n, 10.0);
        let W = model.build(&RateParams::new().with("drive", 2.0));
        let P_ss = solver::steady_state_unique(&W).unwrap();
        assert_abs_diff_eq!(P_ss.sum(), 1.0, epsilon = 1e-12);
        assert!(P_ss.iter().all(|&p| p >= -1e-10));
        assert!(max_abs(W.dot(&P_ss).iter()) < 1e-6);
    }
}

#[test]
fn seven_level_steady_state_is_stationary() {
    // entries of W reach ~2e9 1/s, so rounding alone can leave a residual
    // near 1e-6; the absolute bound is applied in MHz instead
    let nv = SevenLevelModel::new(SevenLevelRates::default()).unwrap();
    let W = nv.build(0.1, 0.5, 0.5);
    let P_ss = solver::steady_state(&W).unwrap();
    assert_abs_diff_eq!(P_ss.sum(), 1.0, epsilon = 1e-12);
    assert!(P_ss.iter().all(|&p| p >= -1e-10));
    assert!(max_abs(W.dot(&P_ss).iter()) / max_abs(W.iter()) < 1e-12);
    let W_mhz = &W / MHZ;
    assert!(max_abs(W_mhz.dot(&P_ss).iter()) < 1e-6);
}

#[test]
fn two_state_steady_state() {
    let mut model = RateModel::with_labels(2, ["A", "B"]).unwrap();
    model.set_rates([((0, 1), 10.0), ((1, 0), 5.0)]).unwrap();
    let P_ss = solver::steady_state(&model.build(&RateParams::new())).unwrap();
    assert_abs_diff_eq!(P_ss[0], 1.0 / 3.0, epsilon = 1e-4);
    assert_abs_diff_eq!(P_ss[1], 2.0 / 3.0, epsilon = 1e-4);
}

#[test]
fn reducible_graph_is_flagged() {
    // {0, 1} and {2, 3} never exchange population
    let mut model = RateModel::new(4).unwrap();
    model.set_rates([((0, 1), 1.0), ((1, 0), 2.0), ((2, 3), 3.0), ((3, 2), 4.0)])
        .unwrap();
    let W = model.build(&RateParams::new());
    assert!(matches!(solver::steady_state_unique(&W), Err(Error::Solver(_))));
    let P_ss = solver::steady_state(&W).unwrap();
    assert_abs_diff_eq!(P_ss.sum(), 1.0, epsilon = 1e-12);
}

#[test]
fn contrast_zero_guard() {
    let model = scenario_model();
    let W_ref = model.build(&RateParams::new().with("gamma", 1.0));
    let W_pert = model.build(&RateParams::new().with("gamma", 2.0));
    let P0 = nd::array![1.0, 0.0, 0.0];
    let dark = Signal::new([1, 2], [0.0, 0.0]).unwrap();
    let methods = [
        ContrastMethod::SteadyState,
        ContrastMethod::Transient { t_final: 1e-6 },
        ContrastMethod::TimeIntegrated { t_final: 1e-6, n_points: 100 },
    ];
    for method in methods {
        assert_eq!(
            contrast::contrast(method, &W_ref, &W_pert, &P0, &dark).unwrap(),
            0.0,
        );
    }
}

#[test]
fn undriven_seven_level_ground_state_is_frozen() {
    let nv = SevenLevelModel::new(SevenLevelRates::default()).unwrap();
    let W = nv.build(0.0, 0.0, 0.0);
    let P0 = nv.initial_state(SevenLevelModel::GS_MINUS).unwrap();
    let t: nd::Array1<f64> = nd::Array1::logspace(10.0, -9.0, -1.0, 9);
    let P = solver::evolve(&W, &P0, &t).unwrap();
    for row in P.rows() {
        assert_abs_diff_eq!(row[SevenLevelModel::GS_MINUS], 1.0, epsilon = 1e-9);
    }
}

#[test]
fn invalid_construction() {
    assert!(matches!(RateModel::new(1), Err(Error::Configuration(_))));
    assert!(matches!(
        RateModel::with_labels(3, ["a", "b"]),
        Err(Error::Configuration(_)),
    ));
    let mut model = RateModel::new(3).unwrap();
    assert!(matches!(model.set_rate(0, 0, 1.0), Err(Error::Domain(_))));
    assert!(matches!(model.set_rate(0, 3, 1.0), Err(Error::Range { .. })));
}

#[test]
fn three_state_scenario() {
    let model = scenario_model();
    let W = model.build(&RateParams::new().with("gamma", 1.0));
    let P0 = nd::array![1.0, 0.0, 0.0];
    let P_ss = solver::steady_state_unique(&W).unwrap();
    assert_abs_diff_eq!(P_ss.sum(), 1.0, epsilon = 1e-12);
    assert!(max_abs(W.dot(&P_ss).iter()) < 1e-6);

    // slowest relaxation is ~(5 MHz)^-1, so 1 ms is many time constants
    let P = solver::evolve(&W, &P0, &nd::array![1e-3]).unwrap();
    for (p, p_ss) in P.row(0).iter().zip(P_ss.iter()) {
        assert_abs_diff_eq!(p, p_ss, epsilon = 1e-9);
    }

    let traj = solver::integrate(
        &W,
        &P0,
        (0.0, 2e-6),
        Some(&nd::Array1::linspace(0.0, 2e-6, 5)),
        Method::Dopri5 { abs_tol: 1e-12, rel_tol: 1e-10 },
        OdeOptions::default(),
    )
    .unwrap();
    let exact = solver::evolve(&W, &P0, &traj.time).unwrap();
    for (a, b) in traj.populations.iter().zip(exact.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn contrast_methods_agree_on_two_state_system() {
    let mut model = RateModel::new(2).unwrap();
    model.set_rates([((0, 1), 10.0), ((1, 0), 5.0)]).unwrap();
    model.add_dynamic_rate("kmw", 1, 0, 1.0).unwrap();
    let reference = RateParams::new();
    let perturbed = RateParams::new().with("kmw", 5.0);
    let signal = Signal::uniform([1]);
    let P0 = nd::array![1.0, 0.0];
    // P_B: 2/3 without drive, 1/2 with drive
    let expected = 0.25;
    let methods = [
        (ContrastMethod::SteadyState, 1e-6),
        (ContrastMethod::Transient { t_final: 1e-4 }, 1e-6),
        (ContrastMethod::TimeIntegrated { t_final: 1e-4, n_points: 10_000 }, 1e-3),
    ];
    for (method, tol) in methods {
        let c = contrast::compare(
            &model, &reference, &perturbed, method, Some(&P0), Some(&signal),
        )
        .unwrap();
        assert_relative_eq!(c, expected, max_relative = tol / expected);
    }
}
