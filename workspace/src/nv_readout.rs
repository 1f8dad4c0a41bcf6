//! Optical readout of a preset seven-level model from each ground spin
//! state.
//!
//! Usage: `nv_readout [preset]` (default `g11_gm9_30dp`).

use std::path::PathBuf;
use ndarray as nd;
use tracing::info;
use odmr_sim::{
    contrast::relative_drop,
    mkdir,
    write_npz,
    simulations::{ ReadoutParams, ReadoutSim },
    solver::{ trapz, trapz_prog },
    GroundState,
};
use lib::presets::Presets;

fn main() -> anyhow::Result<()> {
    lib::init_logging();
    let preset = std::env::args().nth(1)
        .unwrap_or_else(|| "g11_gm9_30dp".to_string());
    let outdir = PathBuf::from("output");
    mkdir!(outdir)?;

    let model = Presets::builtin()?.model(&preset)?;
    let sim = ReadoutSim::new(&model);
    let params = ReadoutParams::default();
    let results = sim.run_comparison(&params)?;

    let mut es_total: nd::Array2<f64>
        = nd::Array2::zeros((results.len(), params.n_points));
    let mut cumulative: nd::Array2<f64>
        = nd::Array2::zeros((results.len(), params.n_points));
    let mut photons: Vec<f64> = Vec::with_capacity(results.len());
    let rows = es_total.rows_mut().into_iter()
        .zip(cumulative.rows_mut());
    for ((mut row, mut cum), (state, res)) in rows.zip(&results) {
        let es = res.es_total.as_ref()
            .ok_or_else(|| anyhow::anyhow!("model has no excited manifold"))?;
        row.assign(es);
        cum.assign(&trapz_prog(es, &res.time)?);
        let n = trapz(es, &res.time)?;
        info!(state = %state, peak = es.fold(0.0_f64, |m, p| m.max(*p)), "readout");
        photons.push(n);
    }
    let n0 = photons[GroundState::Zero.index()];
    for state in [GroundState::Minus, GroundState::Plus] {
        info!(
            state = %state,
            contrast = relative_drop(n0, photons[state.index()]),
            "integrated readout contrast relative to gs0",
        );
    }

    let time_ns = results.get(&GroundState::Zero)
        .map(|res| res.time_ns.clone())
        .unwrap_or_else(|| nd::Array1::zeros(0));
    let outfile = outdir.join(format!("readout_{}.npz", preset));
    write_npz!(
        outfile.clone(),
        arrays: {
            "time_ns" => &time_ns,
            "es_total" => &es_total,
            "es_integrated" => &cumulative,
        }
    )?;
    info!(path = %outfile.display(), "wrote results");
    Ok(())
}
