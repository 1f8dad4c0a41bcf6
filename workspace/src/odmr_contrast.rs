//! ODMR spectrum and excitation-rate dependence of the contrast for a preset
//! seven-level model.
//!
//! Usage: `odmr_contrast [preset]` (default `g11_gm9_30dp`).

use std::path::PathBuf;
use ndarray as nd;
use tracing::info;
use odmr_sim::{
    mkdir,
    write_npz,
    simulations::{ ContrastParams, OdmrSim, SpectrumParams },
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

    for (kmw_minus, kmw_plus) in [(1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
        let c = sim.compute_contrast(
            &ContrastParams { kmw_minus, kmw_plus, ..Default::default() })?;
        info!(kmw_minus, kmw_plus, contrast_pct = 100.0 * c, "steady-state contrast");
    }

    let spectrum = sim.run_spectrum(&SpectrumParams::default())?;
    let (k_max, c_max) = spectrum.contrast.iter().copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (k, c)| if c > acc.1 { (k, c) } else { acc });
    info!(
        freq_ghz = spectrum.frequencies[k_max],
        contrast_pct = 100.0 * c_max,
        "maximum spectrum contrast",
    );

    let gammas: nd::Array1<f64> = nd::Array1::logspace(10.0, -3.0, 2.0, 51);
    let sweep = sim.sweep_gamma(
        gammas.as_slice().unwrap_or(&[]),
        &ContrastParams { kmw_minus: 1.0, kmw_plus: 1.0, ..Default::default() },
    )?;

    let outfile = outdir.join(format!("odmr_{}.npz", preset));
    write_npz!(
        outfile.clone(),
        arrays: {
            "frequencies" => &spectrum.frequencies,
            "spectrum" => &spectrum.contrast,
            "gamma" => &gammas,
            "gamma_contrast" => &sweep,
        }
    )?;
    info!(path = %outfile.display(), "wrote results");
    Ok(())
}
