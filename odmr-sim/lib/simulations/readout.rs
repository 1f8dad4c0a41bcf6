//! Optical readout from a prepared spin state.

use indexmap::IndexMap;
use ndarray as nd;
use tracing::debug;
use crate::{
    contrast::Signal,
    error::{ Error, RateResult },
    model::{ RateBuild, RateModel, RateParams },
    seven_level::{ GAMMA, GroundState, KMW_MINUS, KMW_PLUS, SevenLevelModel },
    simulations::{ NS, time_grid },
    solver::evolve,
};

/// Models that can name their ground spin states and excited manifold.
///
/// Generic models name neither, so only index- or array-specified initial
/// states are available for them.
pub trait ReadoutModel: RateBuild {
    /// State index of a pure ground spin state, if the model defines one.
    fn ground_index(&self, _state: GroundState) -> Option<usize> { None }

    /// Unit-weighted sum over the excited manifold, if the model defines one.
    fn excited_manifold(&self) -> Option<Signal> { None }
}

impl ReadoutModel for RateModel { }

impl ReadoutModel for SevenLevelModel {
    fn ground_index(&self, state: GroundState) -> Option<usize> {
        Some(state.index())
    }

    fn excited_manifold(&self) -> Option<Signal> {
        Some(self.excited_total())
    }
}

/// Initial state of a readout run.
#[derive(Clone, Debug, PartialEq)]
pub enum ReadoutInitial {
    /// A pure ground spin state.
    Ground(GroundState),
    /// All population in a single state.
    Index(usize),
    /// An explicit distribution.
    Array(nd::Array1<f64>),
}

impl Default for ReadoutInitial {
    fn default() -> Self { Self::Ground(GroundState::Zero) }
}

impl From<GroundState> for ReadoutInitial {
    fn from(state: GroundState) -> Self { Self::Ground(state) }
}

impl From<usize> for ReadoutInitial {
    fn from(index: usize) -> Self { Self::Index(index) }
}

impl From<nd::Array1<f64>> for ReadoutInitial {
    fn from(P0: nd::Array1<f64>) -> Self { Self::Array(P0) }
}

impl ReadoutInitial {
    /// Resolve to a population vector for `model`.
    pub fn resolve<M>(&self, model: &M) -> RateResult<nd::Array1<f64>>
    where M: ReadoutModel + ?Sized
    {
        let rate_model = model.rate_model();
        match self {
            Self::Ground(state) => {
                let index = model.ground_index(*state)
                    .ok_or_else(|| Error::Configuration(format!(
                        "initial state '{}' is only defined for models with \
                        named ground states",
                        state,
                    )))?;
                rate_model.initial_state(index)
            },
            Self::Index(index) => rate_model.initial_state(*index),
            Self::Array(P0) => {
                if P0.len() != rate_model.num_states() {
                    return Err(Error::Dimension(format!(
                        "initial state has length {}, but model has {} states",
                        P0.len(),
                        rate_model.num_states(),
                    )));
                }
                Ok(P0.clone())
            },
        }
    }
}

/// Parameters of a readout run.
///
/// No microwave drive is applied during readout.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadoutParams {
    /// Optical excitation rate (MHz).
    pub gamma: f64,
    /// Values of any other dynamic parameters the model defines; microwave
    /// rates given here are overridden with zero.
    pub extra: RateParams,
    pub initial: ReadoutInitial,
    /// Time range in seconds.
    pub t_min: f64,
    pub t_max: f64,
    pub n_points: usize,
    /// Use logarithmic time spacing; ignored if `t_min == 0`.
    pub log_time: bool,
}

impl Default for ReadoutParams {
    fn default() -> Self {
        Self {
            gamma: 12.8,
            extra: RateParams::new(),
            initial: ReadoutInitial::default(),
            t_min: 0.0,
            t_max: 1e-5,
            n_points: 1000,
            log_time: false,
        }
    }
}

/// Output of a readout run.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadoutResult {
    /// Time in seconds.
    pub time: nd::Array1<f64>,
    /// Time in nanoseconds.
    pub time_ns: nd::Array1<f64>,
    /// Populations, with rows corresponding to `time`.
    pub populations: nd::Array2<f64>,
    /// Total excited-state population, if the model defines an excited
    /// manifold.
    pub es_total: Option<nd::Array1<f64>>,
    pub labels: Vec<String>,
    pub initial: ReadoutInitial,
    /// Dynamic parameter values used.
    pub params: RateParams,
    /// Initial distribution used.
    pub P0: nd::Array1<f64>,
}

/// Driver for readout runs.
pub struct ReadoutSim<'a, M: ?Sized> {
    model: &'a M,
}

impl<M: ?Sized> Clone for ReadoutSim<'_, M> {
    fn clone(&self) -> Self { *self }
}

impl<M: ?Sized> Copy for ReadoutSim<'_, M> { }

impl<'a, M> ReadoutSim<'a, M>
where M: ReadoutModel + ?Sized
{
    pub fn new(model: &'a M) -> Self { Self { model } }

    pub fn model(&self) -> &'a M { self.model }

    /// Evolve the model from the requested initial state under optical
    /// excitation.
    pub fn run(&self, params: &ReadoutParams) -> RateResult<ReadoutResult> {
        let rate_params = params.extra.clone()
            .with(GAMMA, params.gamma)
            .with(KMW_MINUS, 0.0)
            .with(KMW_PLUS, 0.0);
        let W = self.model.build_with(&rate_params);
        let P0 = params.initial.resolve(self.model)?;
        let log = params.log_time && params.t_min > 0.0;
        let time = time_grid(params.t_min, params.t_max, params.n_points, log)?;
        let populations = evolve(&W, &P0, &time)?;
        let es_total = self.model.excited_manifold()
            .map(|signal| signal.evaluate(&populations))
            .transpose()?;
        debug!(
            gamma = params.gamma,
            initial = ?params.initial,
            "finished readout run",
        );
        Ok(ReadoutResult {
            time_ns: &time * NS,
            time,
            populations,
            es_total,
            labels: self.model.rate_model().labels().to_vec(),
            initial: params.initial.clone(),
            params: rate_params,
            P0,
        })
    }

    /// Perform [`run`][Self::run] from each of the three ground spin states.
    ///
    /// The `initial` field of `params` is ignored. Fails for models without
    /// named ground states.
    pub fn run_comparison(&self, params: &ReadoutParams)
        -> RateResult<IndexMap<GroundState, ReadoutResult>>
    {
        GroundState::ALL.into_iter()
            .map(|state| {
                let p = ReadoutParams {
                    initial: ReadoutInitial::Ground(state),
                    ..params.clone()
                };
                self.run(&p).map(|res| (state, res))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use crate::seven_level::SevenLevelRates;
    use super::*;

    fn nv() -> SevenLevelModel {
        SevenLevelModel::new(SevenLevelRates::default()).unwrap()
    }

    #[test]
    fn readout_from_ground_state() {
        let model = nv();
        let sim = ReadoutSim::new(&model);
        let params = ReadoutParams {
            initial: "gs_minus".parse::<GroundState>().unwrap().into(),
            n_points: 101,
            ..Default::default()
        };
        let res = sim.run(&params).unwrap();
        assert_eq!(res.P0, model.ground_state(GroundState::Minus));
        assert_eq!(res.time[0], 0.0);
        assert_eq!(res.populations.row(0), res.P0);
        let es_total = res.es_total.unwrap();
        assert_eq!(es_total.len(), 101);
        assert_eq!(es_total[0], 0.0);
        assert!(es_total.iter().all(|&p| (0.0..=1.0 + 1e-9).contains(&p)));
        assert!(es_total.iter().any(|&p| p > 0.0));
        for row in res.populations.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn comparison_covers_all_ground_states() {
        let model = nv();
        let sim = ReadoutSim::new(&model);
        let params = ReadoutParams { n_points: 51, ..Default::default() };
        let results = sim.run_comparison(&params).unwrap();
        assert_eq!(
            results.keys().copied().collect::<Vec<_>>(),
            GroundState::ALL.to_vec(),
        );
        for (state, res) in results.iter() {
            assert_eq!(res.initial, ReadoutInitial::Ground(*state));
            assert_eq!(res.P0[state.index()], 1.0);
        }
        // m_s = +1 is shelved in the singlet fastest and fluoresces least
        let total = |s: GroundState| -> f64 {
            results[&s].es_total.as_ref().unwrap().sum()
        };
        assert!(total(GroundState::Plus) < total(GroundState::Zero));
    }

    #[test]
    fn generic_model_initial_states() {
        let mut model = RateModel::new(3).unwrap();
        model.set_rates([((1, 0), 50.0), ((1, 2), 10.0), ((2, 0), 5.0)])
            .unwrap();
        model.add_dynamic_rate("gamma", 0, 1, 1.0).unwrap();
        let sim = ReadoutSim::new(&model);

        let by_index = ReadoutParams {
            initial: ReadoutInitial::Index(2),
            n_points: 11,
            ..Default::default()
        };
        let res = sim.run(&by_index).unwrap();
        assert_eq!(res.P0, nd::array![0.0, 0.0, 1.0]);
        assert!(res.es_total.is_none());

        let by_array = ReadoutParams {
            initial: nd::array![0.5, 0.5, 0.0].into(),
            ..by_index.clone()
        };
        assert_eq!(sim.run(&by_array).unwrap().P0, nd::array![0.5, 0.5, 0.0]);

        let named = ReadoutParams {
            initial: GroundState::Zero.into(),
            ..by_index.clone()
        };
        assert!(matches!(sim.run(&named), Err(Error::Configuration(_))));
        assert!(matches!(
            sim.run_comparison(&by_index),
            Err(Error::Configuration(_)),
        ));

        let out_of_range = ReadoutParams {
            initial: ReadoutInitial::Index(3),
            ..by_index
        };
        assert!(matches!(sim.run(&out_of_range), Err(Error::Range { .. })));
    }

    #[test]
    fn microwave_stays_off() {
        let model = nv();
        let sim = ReadoutSim::new(&model);
        let plain = ReadoutParams { n_points: 21, ..Default::default() };
        let driven = ReadoutParams {
            extra: RateParams::new().with(KMW_MINUS, 5.0).with(KMW_PLUS, 5.0),
            ..plain.clone()
        };
        let res = sim.run(&driven).unwrap();
        assert_eq!(res.params.get(KMW_MINUS), 0.0);
        assert_eq!(res.params.get(KMW_PLUS), 0.0);
        assert_eq!(res.populations, sim.run(&plain).unwrap().populations);
    }
}
