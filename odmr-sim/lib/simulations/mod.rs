//! Experiment drivers built on top of the rate models and solvers.
//!
//! Each driver borrows a model and produces named result bundles that are
//! ready to be written to disk or plotted.

use ndarray as nd;
use crate::error::{ Error, RateResult };

pub mod initialization;
pub mod readout;
pub mod odmr;

pub use initialization::{
    InitializationParams,
    InitializationResult,
    InitializationSim,
};
pub use readout::{
    ReadoutInitial,
    ReadoutModel,
    ReadoutParams,
    ReadoutResult,
    ReadoutSim,
};
pub use odmr::{
    ContrastParams,
    OdmrSim,
    SpectrumParams,
    SpectrumResult,
};

/// Seconds to nanoseconds.
pub const NS: f64 = 1e9;

/// Generate a time grid of `n_points` between `t_min` and `t_max` (seconds),
/// with logarithmic or linear spacing.
///
/// Logarithmic spacing requires `t_min > 0`.
pub fn time_grid(t_min: f64, t_max: f64, n_points: usize, log: bool)
    -> RateResult<nd::Array1<f64>>
{
    if n_points == 0 {
        return Err(Error::Configuration(
            "time grid must have at least one point".into()));
    }
    if !(t_min.is_finite() && t_max.is_finite() && t_min >= 0.0 && t_max >= t_min) {
        return Err(Error::Domain(
            format!("invalid time range [{}, {}]", t_min, t_max)));
    }
    if log {
        if t_min <= 0.0 {
            return Err(Error::Domain(
                "logarithmic time grid requires t_min > 0".into()));
        }
        Ok(nd::Array1::logspace(10.0, t_min.log10(), t_max.log10(), n_points))
    } else {
        Ok(nd::Array1::linspace(t_min, t_max, n_points))
    }
}
