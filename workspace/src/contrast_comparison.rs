//! Comparison of the steady-state, transient, and time-integrated contrast
//! definitions over a range of excitation rates.
//!
//! Usage: `contrast_comparison [preset]` (default `g11_gm9_30dp`).

use std::path::PathBuf;
use ndarray as nd;
use tracing::info;
use odmr_sim::{
    contrast::ContrastMethod,
    mkdir,
    write_npz,
    simulations::{ ContrastParams, OdmrSim },
};
use lib::presets::Presets;

fn main() -> anyhow::Result<()> {
    lib::init_logging();
    let preset = std::env::args().nth(1)
        .unwrap_or_else(|| "g11_gm9_30dp".to_string());
    let outdir = PathBuf::from("output");
    mkdir!(outdir)?;

    let model = Presets::builtin()?.model(&preset)?;
    let sim = OdmrSim::new(&model);
    let gammas: Vec<f64> = nd::Array1::logspace(10.0, -2.0, 1.0, 16).to_vec();
    let methods: Vec<(&str, ContrastMethod)>
        = ["steady_state", "transient", "time_integrated"].into_iter()
        .map(|name| name.parse().map(|method| (name, method)))
        .collect::<Result<_, _>>()?;

    let mut contrast: nd::Array2<f64> = nd::Array2::zeros((methods.len(), gammas.len()));
    for (mut row, (name, method)) in contrast.rows_mut().into_iter().zip(&methods) {
        let params = ContrastParams {
            kmw_minus: 1.0,
            kmw_plus: 1.0,
            method: *method,
            ..Default::default()
        };
        row.assign(&sim.sweep_gamma(&gammas, &params)?);
        info!(
            method = name,
            low_gamma_pct = 100.0 * row[0],
            high_gamma_pct = 100.0 * row[gammas.len() - 1],
            "contrast",
        );
    }

    let outfile = outdir.join(format!("contrast_comparison_{}.npz", preset));
    write_npz!(
        outfile.clone(),
        arrays: {
            "gamma" => &nd::Array1::from_vec(gammas),
            "contrast" => &contrast,
        }
    )?;
    info!(path = %outfile.display(), "wrote results");
    Ok(())
}
