//! Seven-level rate model for NV-like spin defects.
//!
//! States:
//! - `0`: GS|0>, ground state with m_s = 0
//! - `1`: GS|->, ground state with m_s = -1 (or the lower of a split pair)
//! - `2`: GS|+>, ground state with m_s = +1 (or the upper of a split pair)
//! - `3`: ES|0>, excited state with m_s = 0
//! - `4`: ES|->, excited state with m_s = -1
//! - `5`: ES|+>, excited state with m_s = +1
//! - `6`: SS, metastable singlet
//!
//! Fixed rates (MHz) cover radiative decay ES → GS (`k41`, `k52`, `k63`), the
//! upper intersystem crossing ES → SS (`k47`, `k57`, `k67`), and the lower
//! intersystem crossing SS → GS (`k71`, `k72`, `k73`). Optical excitation
//! (`gamma`, each GS → ES) and microwave driving (`kmw_minus` for GS|0> ↔
//! GS|->, `kmw_plus` for GS|0> ↔ GS|+>) are dynamic.
//!
//! References:
//! - L. Robledo et al., New J. Phys. 13, 025013 (2011)
//! - S. Ahmadi et al., Phys. Rev. Applied 8, 034001 (2017)
//! - Y. Masuyama et al., Sci. Rep. 14, 18135 (2024)

use std::{ fmt, ops::Deref, str::FromStr };
use ndarray as nd;
use serde::{ Deserialize, Serialize };
use crate::{
    contrast::Signal,
    error::{ Error, RateResult },
    model::{ RateBuild, RateModel, RateParams },
};

pub const LABELS_SPLIT: [&str; 7]
    = ["GS|0>", "GS|->", "GS|+>", "ES|0>", "ES|->", "ES|+>", "SS"];

pub const LABELS_DEGENERATE: [&str; 7]
    = ["GS|0>", "GS|-1>", "GS|+1>", "ES|0>", "ES|-1>", "ES|+1>", "SS"];

/// Name of the optical excitation parameter.
pub const GAMMA: &str = "gamma";
/// Name of the GS|0> ↔ GS|-> microwave parameter.
pub const KMW_MINUS: &str = "kmw_minus";
/// Name of the GS|0> ↔ GS|+> microwave parameter.
pub const KMW_PLUS: &str = "kmw_plus";

/// Fixed transition rates of a [`SevenLevelModel`], in MHz.
///
/// `k52` and `k63` default to `k41` if unset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SevenLevelRates {
    pub k41: f64,
    pub k52: Option<f64>,
    pub k63: Option<f64>,
    pub k47: f64,
    pub k57: f64,
    pub k67: f64,
    pub k71: f64,
    pub k72: f64,
    pub k73: f64,
    /// Label the m_s = ±1 states as `|±1>` instead of `|±>`.
    pub use_degenerate_labels: bool,
}

impl Default for SevenLevelRates {
    fn default() -> Self {
        Self {
            k41: 62.5,
            k52: None,
            k63: None,
            k47: 4.4,
            k57: 0.005,
            k67: 44.1,
            k71: 2336.0,
            k72: 3.1,
            k73: 0.001,
            use_degenerate_labels: false,
        }
    }
}

impl SevenLevelRates {
    pub fn k52(&self) -> f64 { self.k52.unwrap_or(self.k41) }

    pub fn k63(&self) -> f64 { self.k63.unwrap_or(self.k41) }
}

/// A pure ground spin state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroundState {
    Zero,
    Minus,
    Plus,
}

impl GroundState {
    pub const ALL: [Self; 3] = [Self::Zero, Self::Minus, Self::Plus];

    /// Index of the state in a [`SevenLevelModel`].
    pub fn index(self) -> usize {
        match self {
            Self::Zero => SevenLevelModel::GS_0,
            Self::Minus => SevenLevelModel::GS_MINUS,
            Self::Plus => SevenLevelModel::GS_PLUS,
        }
    }
}

impl fmt::Display for GroundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => write!(f, "gs0"),
            Self::Minus => write!(f, "gs_minus"),
            Self::Plus => write!(f, "gs_plus"),
        }
    }
}

impl FromStr for GroundState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gs0" | "gs_0" | "100" => Ok(Self::Zero),
            "gs_minus" | "gs-" | "010" => Ok(Self::Minus),
            "gs_plus" | "gs+" | "001" => Ok(Self::Plus),
            _ => Err(Error::Configuration(
                format!("unknown initial state '{}'", s))),
        }
    }
}

/// Seven-level NV-like rate model.
///
/// Dereferences to the underlying [`RateModel`] for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct SevenLevelModel {
    rates: SevenLevelRates,
    model: RateModel,
}

impl Deref for SevenLevelModel {
    type Target = RateModel;

    fn deref(&self) -> &Self::Target { &self.model }
}

impl SevenLevelModel {
    pub const GS_0: usize = 0;
    pub const GS_MINUS: usize = 1;
    pub const GS_PLUS: usize = 2;
    pub const ES_0: usize = 3;
    pub const ES_MINUS: usize = 4;
    pub const ES_PLUS: usize = 5;
    pub const SINGLET: usize = 6;

    pub const GROUND: [usize; 3] = [Self::GS_0, Self::GS_MINUS, Self::GS_PLUS];
    pub const EXCITED: [usize; 3] = [Self::ES_0, Self::ES_MINUS, Self::ES_PLUS];

    /// Create a new model.
    ///
    /// Fails if any rate is negative or non-finite.
    pub fn new(rates: SevenLevelRates) -> RateResult<Self> {
        let labels
            = if rates.use_degenerate_labels {
                LABELS_DEGENERATE
            } else {
                LABELS_SPLIT
            };
        let mut model = RateModel::with_labels(7, labels)?;
        model.set_rates([
            // radiative decay
            ((Self::ES_0, Self::GS_0), rates.k41),
            ((Self::ES_MINUS, Self::GS_MINUS), rates.k52()),
            ((Self::ES_PLUS, Self::GS_PLUS), rates.k63()),
            // upper ISC
            ((Self::ES_0, Self::SINGLET), rates.k47),
            ((Self::ES_MINUS, Self::SINGLET), rates.k57),
            ((Self::ES_PLUS, Self::SINGLET), rates.k67),
            // lower ISC
            ((Self::SINGLET, Self::GS_0), rates.k71),
            ((Self::SINGLET, Self::GS_MINUS), rates.k72),
            ((Self::SINGLET, Self::GS_PLUS), rates.k73),
        ])?;
        for (g, e) in Self::GROUND.into_iter().zip(Self::EXCITED) {
            model.add_dynamic_rate(GAMMA, g, e, 1.0)?;
        }
        model.add_dynamic_rate(KMW_MINUS, Self::GS_0, Self::GS_MINUS, 1.0)?;
        model.add_dynamic_rate(KMW_MINUS, Self::GS_MINUS, Self::GS_0, 1.0)?;
        model.add_dynamic_rate(KMW_PLUS, Self::GS_0, Self::GS_PLUS, 1.0)?;
        model.add_dynamic_rate(KMW_PLUS, Self::GS_PLUS, Self::GS_0, 1.0)?;
        Ok(Self { rates, model })
    }

    pub fn rates(&self) -> &SevenLevelRates { &self.rates }

    /// Collect drive values (MHz) into a parameter set.
    pub fn params(gamma: f64, kmw_minus: f64, kmw_plus: f64) -> RateParams {
        RateParams::new()
            .with(GAMMA, gamma)
            .with(KMW_MINUS, kmw_minus)
            .with(KMW_PLUS, kmw_plus)
    }

    /// Build the generator matrix (1/s) for the given drive values (MHz).
    pub fn build(&self, gamma: f64, kmw_minus: f64, kmw_plus: f64)
        -> nd::Array2<f64>
    {
        self.model.build(&Self::params(gamma, kmw_minus, kmw_plus))
    }

    /// Equal population 1/3 in each ground state.
    pub fn ground_state_mixed(&self) -> nd::Array1<f64> {
        let mut P0: nd::Array1<f64> = nd::Array1::zeros(7);
        Self::GROUND.into_iter().for_each(|g| { P0[g] = 1.0 / 3.0; });
        P0
    }

    /// All population in a single ground state.
    pub fn ground_state(&self, state: GroundState) -> nd::Array1<f64> {
        let mut P0: nd::Array1<f64> = nd::Array1::zeros(7);
        P0[state.index()] = 1.0;
        P0
    }

    /// Fluorescence signal: excited-state populations weighted by their
    /// radiative rates.
    pub fn excited_signal(&self) -> Signal {
        Signal {
            indices: Self::EXCITED.to_vec(),
            weights: vec![self.rates.k41, self.rates.k52(), self.rates.k63()],
        }
    }

    /// Total excited-state population.
    pub fn excited_total(&self) -> Signal { Signal::uniform(Self::EXCITED) }

    /// Formatted summary of all fixed rates.
    pub fn rate_summary(&self) -> String {
        let r = &self.rates;
        format!(
            "Radiative rates: k41={}, k52={}, k63={} MHz\n\
            Upper ISC rates: k47={}, k57={}, k67={} MHz\n\
            Lower ISC rates: k71={}, k72={}, k73={} MHz",
            r.k41, r.k52(), r.k63(),
            r.k47, r.k57, r.k67,
            r.k71, r.k72, r.k73,
        )
    }
}

impl RateBuild for SevenLevelModel {
    fn rate_model(&self) -> &RateModel { &self.model }

    fn default_initial_state(&self) -> nd::Array1<f64> {
        self.ground_state_mixed()
    }

    fn signal(&self) -> Option<Signal> { Some(self.excited_signal()) }
}
