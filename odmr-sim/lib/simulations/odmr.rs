//! Optically detected magnetic resonance (ODMR) contrast.
//!
//! Contrast is the fractional drop in photoluminescence when a resonant
//! microwave drive is applied:
//! ```text
//! C = (I_noMW - I_MW) / I_noMW
//! ```

use ndarray as nd;
use rayon::prelude::*;
use tracing::debug;
use crate::{
    contrast::{ self, ContrastMethod },
    error::{ Error, RateResult },
    seven_level::SevenLevelModel,
};

/// Lorentzian profile with unit peak height, `lw^2 / ((x - x0)^2 + lw^2)`.
pub fn lorentzian(x: f64, x0: f64, lw: f64) -> f64 {
    lw.powi(2) / ((x - x0).powi(2) + lw.powi(2))
}

/// Parameters of a single contrast computation.
#[derive(Clone, Debug, PartialEq)]
pub struct ContrastParams {
    /// Optical excitation rate (MHz).
    pub gamma: f64,
    /// Microwave rate for |0> ↔ |-> (MHz) with the drive on.
    pub kmw_minus: f64,
    /// Microwave rate for |0> ↔ |+> (MHz) with the drive on.
    pub kmw_plus: f64,
    /// Initial distribution for the time-resolved methods; the mixed ground
    /// state if `None`.
    pub P0: Option<nd::Array1<f64>>,
    pub method: ContrastMethod,
}

impl Default for ContrastParams {
    fn default() -> Self {
        Self {
            gamma: 0.1,
            kmw_minus: 0.0,
            kmw_plus: 0.0,
            P0: None,
            method: ContrastMethod::SteadyState,
        }
    }
}

/// Parameters of a simulated spectrum, with frequencies in GHz.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumParams {
    /// Optical excitation rate (MHz).
    pub gamma: f64,
    pub freq_center: f64,
    /// Half-width of the frequency sweep.
    pub freq_width: f64,
    pub n_points: usize,
    /// Resonance of the |0> ↔ |-> transition; `freq_center - freq_width / 4`
    /// if `None`.
    pub peak_freq_minus: Option<f64>,
    /// Resonance of the |0> ↔ |+> transition; `freq_center + freq_width / 4`
    /// if `None`.
    pub peak_freq_plus: Option<f64>,
    /// Lorentzian linewidth.
    pub linewidth: f64,
    /// Microwave rate on resonance (MHz).
    pub kmw_amplitude: f64,
    pub method: ContrastMethod,
}

impl Default for SpectrumParams {
    fn default() -> Self {
        Self {
            gamma: 0.1,
            freq_center: 3.0,
            freq_width: 0.5,
            n_points: 101,
            peak_freq_minus: None,
            peak_freq_plus: None,
            linewidth: 0.05,
            kmw_amplitude: 1.0,
            method: ContrastMethod::SteadyState,
        }
    }
}

impl SpectrumParams {
    pub fn peak_minus(&self) -> f64 {
        self.peak_freq_minus
            .unwrap_or(self.freq_center - self.freq_width / 4.0)
    }

    pub fn peak_plus(&self) -> f64 {
        self.peak_freq_plus
            .unwrap_or(self.freq_center + self.freq_width / 4.0)
    }
}

/// Output of [`OdmrSim::run_spectrum`].
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumResult {
    /// Microwave frequencies (GHz).
    pub frequencies: nd::Array1<f64>,
    pub contrast: nd::Array1<f64>,
    /// Resolved resonance frequencies (GHz).
    pub peak_freq_minus: f64,
    pub peak_freq_plus: f64,
    pub params: SpectrumParams,
}

/// Driver for ODMR contrast computations on the seven-level model.
#[derive(Copy, Clone, Debug)]
pub struct OdmrSim<'a> {
    model: &'a SevenLevelModel,
}

impl<'a> OdmrSim<'a> {
    pub fn new(model: &'a SevenLevelModel) -> Self { Self { model } }

    pub fn model(&self) -> &'a SevenLevelModel { self.model }

    /// Compute the contrast between microwave off (reference) and on
    /// (perturbed).
    ///
    /// The steady-state and time-integrated methods compare the
    /// fluorescence signal (excited-state populations weighted by their
    /// radiative rates); the transient method compares the total
    /// excited-state population at the final time.
    pub fn compute_contrast(&self, params: &ContrastParams) -> RateResult<f64> {
        let W_ref = self.model.build(params.gamma, 0.0, 0.0);
        let W_pert
            = self.model.build(params.gamma, params.kmw_minus, params.kmw_plus);
        let signal
            = match params.method {
                ContrastMethod::Transient { .. } => self.model.excited_total(),
                _ => self.model.excited_signal(),
            };
        let P0 = params.P0.clone()
            .unwrap_or_else(|| self.model.ground_state_mixed());
        if P0.len() != self.model.num_states() {
            return Err(Error::Dimension(format!(
                "initial state has length {}, but model has {} states",
                P0.len(),
                self.model.num_states(),
            )));
        }
        contrast::contrast(params.method, &W_ref, &W_pert, &P0, &signal)
    }

    /// Compute the contrast at each excitation rate, in parallel.
    ///
    /// All other settings are taken from `params`.
    pub fn sweep_gamma(&self, gammas: &[f64], params: &ContrastParams)
        -> RateResult<nd::Array1<f64>>
    {
        let contrasts: Vec<f64>
            = gammas.par_iter()
            .map(|&gamma| {
                self.compute_contrast(&ContrastParams { gamma, ..params.clone() })
            })
            .collect::<RateResult<_>>()?;
        Ok(contrasts.into())
    }

    /// Simulate a spectrum by sweeping the microwave frequency across both
    /// spin resonances.
    ///
    /// At each frequency the microwave rates are the on-resonance amplitude
    /// scaled by a Lorentzian profile centered on each resonance.
    pub fn run_spectrum(&self, params: &SpectrumParams)
        -> RateResult<SpectrumResult>
    {
        if params.n_points == 0 {
            return Err(Error::Configuration(
                "spectrum must have at least one point".into()));
        }
        let frequencies: nd::Array1<f64> = nd::Array1::linspace(
            params.freq_center - params.freq_width,
            params.freq_center + params.freq_width,
            params.n_points,
        );
        let f_minus = params.peak_minus();
        let f_plus = params.peak_plus();
        let contrast: Vec<f64>
            = frequencies.to_vec().into_par_iter()
            .map(|f| {
                let p = ContrastParams {
                    gamma: params.gamma,
                    kmw_minus: params.kmw_amplitude
                        * lorentzian(f, f_minus, params.linewidth),
                    kmw_plus: params.kmw_amplitude
                        * lorentzian(f, f_plus, params.linewidth),
                    P0: None,
                    method: params.method,
                };
                self.compute_contrast(&p)
            })
            .collect::<RateResult<_>>()?;
        debug!(n_points = params.n_points, f_minus, f_plus, "computed spectrum");
        Ok(SpectrumResult {
            frequencies,
            contrast: contrast.into(),
            peak_freq_minus: f_minus,
            peak_freq_plus: f_plus,
            params: params.clone(),
        })
    }
}
