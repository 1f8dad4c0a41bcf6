//! Spin initialization (polarization) under optical pumping.

use ndarray as nd;
use rayon::prelude::*;
use tracing::debug;
use crate::{
    error::{ Error, RateResult },
    model::{ RateBuild, RateParams },
    seven_level::{ GAMMA, KMW_MINUS, KMW_PLUS },
    simulations::{ NS, time_grid },
    solver::evolve,
};

/// Parameters of an initialization run.
#[derive(Clone, Debug, PartialEq)]
pub struct InitializationParams {
    /// Optical excitation rate (MHz).
    pub gamma: f64,
    /// Microwave rate for |0> ↔ |-> (MHz).
    pub kmw_minus: f64,
    /// Microwave rate for |0> ↔ |+> (MHz).
    pub kmw_plus: f64,
    /// Values of any other dynamic parameters the model defines.
    pub extra: RateParams,
    /// Initial distribution; the model's default if `None`.
    pub P0: Option<nd::Array1<f64>>,
    /// Time range in seconds.
    pub t_min: f64,
    pub t_max: f64,
    pub n_points: usize,
    /// Use logarithmic time spacing.
    pub log_time: bool,
}

impl Default for InitializationParams {
    fn default() -> Self {
        Self {
            gamma: 0.1,
            kmw_minus: 0.0,
            kmw_plus: 0.0,
            extra: RateParams::new(),
            P0: None,
            t_min: 1e-9,
            t_max: 1e-1,
            n_points: 1000,
            log_time: true,
        }
    }
}

impl InitializationParams {
    /// Dynamic parameter values for the generator.
    pub fn rate_params(&self) -> RateParams {
        self.extra.clone()
            .with(GAMMA, self.gamma)
            .with(KMW_MINUS, self.kmw_minus)
            .with(KMW_PLUS, self.kmw_plus)
    }
}

/// Output of an initialization run.
#[derive(Clone, Debug, PartialEq)]
pub struct InitializationResult {
    /// Time in seconds.
    pub time: nd::Array1<f64>,
    /// Time in nanoseconds.
    pub time_ns: nd::Array1<f64>,
    /// Populations, with rows corresponding to `time`.
    pub populations: nd::Array2<f64>,
    pub labels: Vec<String>,
    /// Dynamic parameter values used.
    pub params: RateParams,
    /// Initial distribution used.
    pub P0: nd::Array1<f64>,
}

/// Driver for initialization runs.
pub struct InitializationSim<'a, M: ?Sized> {
    model: &'a M,
}

impl<M: ?Sized> Clone for InitializationSim<'_, M> {
    fn clone(&self) -> Self { *self }
}

impl<M: ?Sized> Copy for InitializationSim<'_, M> { }

impl<'a, M> InitializationSim<'a, M>
where M: RateBuild + ?Sized
{
    pub fn new(model: &'a M) -> Self { Self { model } }

    pub fn model(&self) -> &'a M { self.model }

    /// Evolve the model's populations over the requested time grid.
    pub fn run(&self, params: &InitializationParams)
        -> RateResult<InitializationResult>
    {
        let rate_params = params.rate_params();
        let W = self.model.build_with(&rate_params);
        let P0 = params.P0.clone()
            .unwrap_or_else(|| self.model.default_initial_state());
        let n = self.model.rate_model().num_states();
        if P0.len() != n {
            return Err(Error::Dimension(format!(
                "initial state has length {}, but model has {} states",
                P0.len(), n,
            )));
        }
        let time = time_grid(
            params.t_min, params.t_max, params.n_points, params.log_time)?;
        let populations = evolve(&W, &P0, &time)?;
        debug!(
            gamma = params.gamma,
            n_points = params.n_points,
            "finished initialization run",
        );
        Ok(InitializationResult {
            time_ns: &time * NS,
            time,
            populations,
            labels: self.model.rate_model().labels().to_vec(),
            params: rate_params,
            P0,
        })
    }

    /// Perform [`run`][Self::run] for each excitation rate, in parallel.
    ///
    /// All other settings are taken from `params`; results follow the order of
    /// `gammas`.
    pub fn run_sweep_gamma(&self, gammas: &[f64], params: &InitializationParams)
        -> RateResult<Vec<InitializationResult>>
    where M: Sync
    {
        gammas.par_iter()
            .map(|&gamma| {
                self.run(&InitializationParams { gamma, ..params.clone() })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use crate::{
        model::RateModel,
        seven_level::{ SevenLevelModel, SevenLevelRates },
    };
    use super::*;

    #[test]
    fn seven_level_defaults() {
        let model = SevenLevelModel::new(SevenLevelRates::default()).unwrap();
        let sim = InitializationSim::new(&model);
        let params = InitializationParams { n_points: 50, ..Default::default() };
        let res = sim.run(&params).unwrap();
        assert_eq!(res.populations.dim(), (50, 7));
        assert_eq!(res.labels.len(), 7);
        assert_eq!(res.P0, model.ground_state_mixed());
        assert_eq!(res.params.get("gamma"), 0.1);
        assert_abs_diff_eq!(res.time_ns[0], 1.0, epsilon = 1e-9);
        for row in res.populations.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-6);
        }
        // pumping moves population out of GS|+>
        let last = res.populations.row(49);
        assert!(last[SevenLevelModel::GS_PLUS] < 1.0 / 3.0);
    }

    #[test]
    fn generic_model_default_state() {
        let mut model = RateModel::new(4).unwrap();
        model.set_rates([((2, 0), 10.0), ((3, 1), 10.0)]).unwrap();
        model.add_dynamic_rate("gamma", 0, 2, 1.0).unwrap();
        model.add_dynamic_rate("gamma", 1, 3, 1.0).unwrap();
        let sim = InitializationSim::new(&model);
        let params = InitializationParams {
            n_points: 5,
            log_time: false,
            t_min: 0.0,
            t_max: 1e-6,
            ..Default::default()
        };
        let res = sim.run(&params).unwrap();
        assert_eq!(res.P0, nd::array![0.5, 0.5, 0.0, 0.0]);
        assert_eq!(res.populations.row(0), res.P0);
    }

    #[test]
    fn mismatched_initial_state() {
        let model = RateModel::new(3).unwrap();
        let sim = InitializationSim::new(&model);
        let params = InitializationParams {
            P0: Some(nd::array![1.0, 0.0]),
            ..Default::default()
        };
        assert!(matches!(sim.run(&params), Err(Error::Dimension(_))));
    }

    #[test]
    fn sweep_preserves_order() {
        let model = SevenLevelModel::new(SevenLevelRates::default()).unwrap();
        let sim = InitializationSim::new(&model);
        let params = InitializationParams { n_points: 10, ..Default::default() };
        let gammas = [0.01, 0.1, 1.0, 10.0];
        let results = sim.run_sweep_gamma(&gammas, &params).unwrap();
        assert_eq!(results.len(), 4);
        for (res, gamma) in results.iter().zip(gammas) {
            assert_eq!(res.params.get("gamma"), gamma);
            let single = sim.run(&InitializationParams { gamma, ..params.clone() })
                .unwrap();
            assert_eq!(res, &single);
        }
    }
}
