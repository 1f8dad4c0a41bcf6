//! An eight-level defect model with a two-step metastable path, built from
//! scratch with the generic rate model: initialization, readout from each
//! ground spin state, and the steady-state ODMR contrast.

use std::path::PathBuf;
use ndarray as nd;
use tracing::info;
use odmr_sim::{
    contrast::{ self, ContrastMethod, Signal },
    mkdir,
    write_npz,
    simulations::{
        InitializationParams,
        InitializationSim,
        ReadoutInitial,
        ReadoutParams,
        ReadoutSim,
    },
    RateModel,
    RateParams,
    RateResult,
};

const LABELS: [&str; 8] = [
    "GS|0>", "GS|->", "GS|+>", "ES|0>", "ES|->", "ES|+>", "MS1", "MS2",
];

fn eight_level() -> RateResult<RateModel> {
    let mut model = RateModel::with_labels(8, LABELS)?;
    model.set_rates([
        // radiative decay
        ((3, 0), 62.5), ((4, 1), 62.5), ((5, 2), 62.5),
        // intersystem crossing into the first metastable state
        ((3, 6), 10.5), ((4, 6), 76.9), ((5, 6), 76.9),
        ((6, 7), 1000.0),
        // return to the ground manifold
        ((7, 0), 3.0), ((7, 1), 2.63), ((7, 2), 2.63),
    ])?;
    for k in 0..3 {
        model.add_dynamic_rate("gamma", k, k + 3, 1.0)?;
    }
    for (param, gs) in [("kmw_minus", 1), ("kmw_plus", 2)] {
        model.add_dynamic_rate(param, 0, gs, 1.0)?;
        model.add_dynamic_rate(param, gs, 0, 1.0)?;
    }
    Ok(model)
}

fn main() -> anyhow::Result<()> {
    lib::init_logging();
    let outdir = PathBuf::from("output");
    mkdir!(outdir)?;

    let model = eight_level()?;
    for ((from, to), k) in model.rates() {
        info!("{} -> {}: {} MHz", LABELS[from], LABELS[to], k);
    }

    let mixed = model.initial_state_mixed((0..3).map(|k| (k, 1.0 / 3.0)))?;
    let init = InitializationSim::new(&model).run(
        &InitializationParams { P0: Some(mixed.clone()), ..Default::default() })?;
    let last = init.populations.row(init.populations.nrows() - 1);
    info!(
        gs0 = last[0],
        gs_minus = last[1],
        gs_plus = last[2],
        "ground populations after initialization",
    );

    let readout_sim = ReadoutSim::new(&model);
    let readout_params = ReadoutParams::default();
    let mut es_total: nd::Array2<f64>
        = nd::Array2::zeros((3, readout_params.n_points));
    let mut readout_time_ns: nd::Array1<f64> = nd::Array1::zeros(readout_params.n_points);
    let excited = Signal::uniform([3, 4, 5]);
    for (k, mut row) in es_total.rows_mut().into_iter().enumerate() {
        let res = readout_sim.run(
            &ReadoutParams {
                initial: ReadoutInitial::Index(k),
                ..readout_params.clone()
            }
        )?;
        row.assign(&excited.evaluate(&res.populations)?);
        readout_time_ns = res.time_ns;
        info!(initial = LABELS[k], peak = row.fold(0.0_f64, |m, p| m.max(*p)), "readout");
    }

    let reference = RateParams::new().with("gamma", 0.1);
    let c: Vec<f64>
        = ["kmw_minus", "kmw_plus"].into_iter()
        .map(|param| {
            let mut perturbed = reference.clone();
            perturbed.set(param, 1.0);
            contrast::compare(
                &model,
                &reference,
                &perturbed,
                ContrastMethod::SteadyState,
                Some(&mixed),
                Some(&excited),
            )
        })
        .collect::<RateResult<_>>()?;
    info!(kmw_minus_pct = 100.0 * c[0], kmw_plus_pct = 100.0 * c[1], "steady-state contrast");

    let outfile = outdir.join("custom_eight_level.npz");
    write_npz!(
        outfile.clone(),
        arrays: {
            "init_time_ns" => &init.time_ns,
            "init_populations" => &init.populations,
            "readout_time_ns" => &readout_time_ns,
            "readout_es_total" => &es_total,
            "contrast" => &nd::Array1::from_vec(c),
        }
    )?;
    info!(path = %outfile.display(), "wrote results");
    Ok(())
}
