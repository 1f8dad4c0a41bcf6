//! Comparison of a weighted observable between two generators.
//!
//! Contrast is the fractional drop of a fluorescence-like signal when the
//! system is moved from a *reference* configuration (e.g. microwave off) to a
//! *perturbed* one (e.g. microwave on):
//! ```text
//! C = (I_ref - I_pert) / I_ref
//! ```
//! with `C = 0` whenever `I_ref == 0`.

use std::str::FromStr;
use ndarray as nd;
use tracing::debug;
use crate::{
    error::{ Error, RateResult },
    model::{ RateBuild, RateParams },
    solver::{ evolve, steady_state, trapz, weighted_observable },
};

/// Default final time for the transient and time-integrated methods, in
/// seconds.
pub const DEFAULT_T_FINAL: f64 = 1e-3;

/// Default number of grid points for the time-integrated method.
pub const DEFAULT_N_POINTS: usize = 10_000;

/// A weighted sum over a subset of state populations.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    pub(crate) indices: Vec<usize>,
    pub(crate) weights: Vec<f64>,
}

impl Signal {
    /// Create a new signal from parallel lists of state indices and weights.
    ///
    /// Fails with [`Error::Dimension`] if the lengths differ. Indices are
    /// checked against the population arrays when the signal is evaluated.
    pub fn new<I, W>(indices: I, weights: W) -> RateResult<Self>
    where
        I: IntoIterator<Item = usize>,
        W: IntoIterator<Item = f64>,
    {
        let indices: Vec<usize> = indices.into_iter().collect();
        let weights: Vec<f64> = weights.into_iter().collect();
        if indices.len() != weights.len() {
            return Err(Error::Dimension(format!(
                "signal has {} state indices but {} weights",
                indices.len(),
                weights.len(),
            )));
        }
        Ok(Self { indices, weights })
    }

    /// Create a new signal with unit weight on each state.
    pub fn uniform<I>(indices: I) -> Self
    where I: IntoIterator<Item = usize>
    {
        let indices: Vec<usize> = indices.into_iter().collect();
        let weights = vec![1.0; indices.len()];
        Self { indices, weights }
    }

    pub fn indices(&self) -> &[usize] { &self.indices }

    pub fn weights(&self) -> &[f64] { &self.weights }

    /// Evaluate the signal for every time row of a population array.
    pub fn evaluate(&self, populations: &nd::Array2<f64>)
        -> RateResult<nd::Array1<f64>>
    {
        weighted_observable(populations, &self.weights, &self.indices)
    }

    /// Evaluate the signal for a single population vector.
    pub fn evaluate_one(&self, P: &nd::Array1<f64>) -> RateResult<f64> {
        let P2 = P.view().insert_axis(nd::Axis(0)).to_owned();
        Ok(self.evaluate(&P2)?[0])
    }
}

/// Method used to compare two configurations.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ContrastMethod {
    /// Compare stationary distributions (`t -> ∞`).
    SteadyState,
    /// Compare the signal at a single final time, starting from a shared
    /// initial distribution.
    Transient { t_final: f64 },
    /// Compare the signal integrated over `[0, t_final]` by the trapezoidal
    /// rule on a uniform grid of `n_points`.
    TimeIntegrated { t_final: f64, n_points: usize },
}

impl Default for ContrastMethod {
    fn default() -> Self { Self::SteadyState }
}

impl FromStr for ContrastMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steady_state" => Ok(Self::SteadyState),
            "transient" => Ok(Self::Transient { t_final: DEFAULT_T_FINAL }),
            "time_integrated" => Ok(Self::TimeIntegrated {
                t_final: DEFAULT_T_FINAL,
                n_points: DEFAULT_N_POINTS,
            }),
            _ => Err(Error::Configuration(format!(
                "unknown contrast method '{}'; expected one of steady_state, \
                transient, time_integrated",
                s,
            ))),
        }
    }
}

/// Compute `(reference - perturbed) / reference`, or zero if `reference` is
/// zero.
pub fn relative_drop(reference: f64, perturbed: f64) -> f64 {
    if reference == 0.0 { 0.0 } else { (reference - perturbed) / reference }
}

/// Contrast between the steady states of two generators.
pub fn contrast_steady_state(
    W_ref: &nd::Array2<f64>,
    W_pert: &nd::Array2<f64>,
    signal: &Signal,
) -> RateResult<f64>
{
    let I_ref = signal.evaluate_one(&steady_state(W_ref)?)?;
    let I_pert = signal.evaluate_one(&steady_state(W_pert)?)?;
    Ok(relative_drop(I_ref, I_pert))
}

/// Contrast between the signals of two generators at `t_final`, both evolved
/// from `P0`.
pub fn contrast_transient(
    W_ref: &nd::Array2<f64>,
    W_pert: &nd::Array2<f64>,
    P0: &nd::Array1<f64>,
    t_final: f64,
    signal: &Signal,
) -> RateResult<f64>
{
    check_time(t_final)?;
    let t = nd::array![t_final];
    let I_ref = signal.evaluate(&evolve(W_ref, P0, &t)?)?[0];
    let I_pert = signal.evaluate(&evolve(W_pert, P0, &t)?)?[0];
    Ok(relative_drop(I_ref, I_pert))
}

/// Contrast between the time-integrated signals of two generators over
/// `[0, t_final]`, both evolved from `P0`.
pub fn contrast_time_integrated(
    W_ref: &nd::Array2<f64>,
    W_pert: &nd::Array2<f64>,
    P0: &nd::Array1<f64>,
    t_final: f64,
    n_points: usize,
    signal: &Signal,
) -> RateResult<f64>
{
    check_time(t_final)?;
    if n_points < 2 {
        return Err(Error::Configuration(format!(
            "time-integrated contrast needs at least 2 grid points, got {}",
            n_points,
        )));
    }
    let t: nd::Array1<f64> = nd::Array1::linspace(0.0, t_final, n_points);
    let I_ref = trapz(&signal.evaluate(&evolve(W_ref, P0, &t)?)?, &t)?;
    let I_pert = trapz(&signal.evaluate(&evolve(W_pert, P0, &t)?)?, &t)?;
    Ok(relative_drop(I_ref, I_pert))
}

fn check_time(t_final: f64) -> RateResult<()> {
    (t_final.is_finite() && t_final >= 0.0).then_some(())
        .ok_or_else(|| Error::Domain(
            format!("final time must be finite and non-negative, got {}", t_final)))
}

/// Compute the contrast of two generators with the given method.
///
/// `P0` is ignored by [`ContrastMethod::SteadyState`].
pub fn contrast(
    method: ContrastMethod,
    W_ref: &nd::Array2<f64>,
    W_pert: &nd::Array2<f64>,
    P0: &nd::Array1<f64>,
    signal: &Signal,
) -> RateResult<f64>
{
    let c = match method {
        ContrastMethod::SteadyState
            => contrast_steady_state(W_ref, W_pert, signal)?,
        ContrastMethod::Transient { t_final }
            => contrast_transient(W_ref, W_pert, P0, t_final, signal)?,
        ContrastMethod::TimeIntegrated { t_final, n_points }
            => contrast_time_integrated(
                W_ref, W_pert, P0, t_final, n_points, signal)?,
    };
    debug!(?method, contrast = c, "computed contrast");
    Ok(c)
}

/// Compute the contrast between two parameter sets of the same model.
///
/// If `P0` or `signal` are not given, the model's defaults are used; a model
/// without a default signal is a configuration error.
pub fn compare<M>(
    model: &M,
    reference: &RateParams,
    perturbed: &RateParams,
    method: ContrastMethod,
    P0: Option<&nd::Array1<f64>>,
    signal: Option<&Signal>,
) -> RateResult<f64>
where M: RateBuild + ?Sized
{
    let default_signal;
    let signal = match signal {
        Some(s) => s,
        None => {
            default_signal = model.signal()
                .ok_or_else(|| Error::Configuration(
                    "model defines no default signal".into()))?;
            &default_signal
        },
    };
    let default_P0;
    let P0 = match P0 {
        Some(p) => p,
        None => {
            default_P0 = model.default_initial_state();
            &default_P0
        },
    };
    let W_ref = model.build_with(reference);
    let W_pert = model.build_with(perturbed);
    contrast(method, &W_ref, &W_pert, P0, signal)
}
