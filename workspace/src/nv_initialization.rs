//! Spin polarization of a preset seven-level model under optical pumping.
//!
//! Usage: `nv_initialization [preset]` (default `g11_gm9_30dp`).

use std::path::PathBuf;
use ndarray as nd;
use tracing::info;
use odmr_sim::{
    mkdir,
    write_npz,
    simulations::{ InitializationParams, InitializationSim },
    SevenLevelModel,
};
use lib::presets::Presets;

fn main() -> anyhow::Result<()> {
    lib::init_logging();
    let preset = std::env::args().nth(1)
        .unwrap_or_else(|| "g11_gm9_30dp".to_string());
    let outdir = PathBuf::from("output");
    mkdir!(outdir)?;

    let presets = Presets::builtin()?;
    let model = presets.model(&preset)?;
    info!(preset = %preset, "{}", presets.info(&preset)?.description);
    info!("\n{}", model.rate_summary());

    let sim = InitializationSim::new(&model);
    let params = InitializationParams::default();
    let gammas = [0.01, 0.1, 1.0, 10.0];
    let results = sim.run_sweep_gamma(&gammas, &params)?;

    let mut populations: nd::Array3<f64>
        = nd::Array3::zeros((gammas.len(), params.n_points, model.num_states()));
    for (mut slot, (res, gamma)) in populations.outer_iter_mut()
        .zip(results.iter().zip(gammas))
    {
        slot.assign(&res.populations);
        let last = res.populations.row(params.n_points - 1);
        info!(
            gamma,
            gs0 = last[SevenLevelModel::GS_0],
            gs_minus = last[SevenLevelModel::GS_MINUS],
            gs_plus = last[SevenLevelModel::GS_PLUS],
            "final ground-state populations",
        );
    }

    let time_ns = results.first()
        .map(|res| res.time_ns.clone())
        .unwrap_or_else(|| nd::Array1::zeros(0));
    let outfile = outdir.join(format!("initialization_{}.npz", preset));
    write_npz!(
        outfile.clone(),
        arrays: {
            "time_ns" => &time_ns,
            "gamma" => &nd::Array1::from_vec(gammas.to_vec()),
            "populations" => &populations,
        }
    )?;
    info!(path = %outfile.display(), "wrote results");
    Ok(())
}
