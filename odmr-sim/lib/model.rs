//! Construction of conservative rate (generator) matrices from a sparse
//! description of state-to-state transitions.
//!
//! Rates are specified in MHz and converted to units of 1/s when a generator
//! is built. The generated matrix `W` follows the convention that `W[[j, i]]`
//! (`j != i`) is the total rate from state `i` to state `j`, so that the
//! population vector evolves as `dP/dt = W P` and every column of `W` sums to
//! zero.

use indexmap::IndexMap;
use ndarray as nd;
use rustc_hash::FxHashMap as HashMap;
use tracing::debug;
use crate::{
    contrast::Signal,
    error::{ Error, RateResult, check_index },
};

/// Conversion factor from rates given in MHz to rates in 1/s.
pub const MHZ: f64 = 1e6;

/// Values of named dynamic rate parameters (e.g. an optical excitation rate or
/// a microwave drive rate), in MHz.
///
/// Parameters that are not set evaluate to zero.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RateParams {
    values: HashMap<String, f64>,
}

impl<S> FromIterator<(S, f64)> for RateParams
where S: Into<String>
{
    fn from_iter<I>(iter: I) -> Self
    where I: IntoIterator<Item = (S, f64)>
    {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect()
        }
    }
}

impl RateParams {
    /// Create a new, empty set of parameters.
    pub fn new() -> Self { Self::default() }

    /// Set a parameter value, returning `self`.
    pub fn with<S: Into<String>>(mut self, name: S, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Set a parameter value.
    pub fn set<S: Into<String>>(&mut self, name: S, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Get a parameter value, defaulting to zero.
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }
}

/// A single contribution of a dynamic parameter to the transition `from ->
/// to`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DynamicTerm {
    pub from: usize,
    pub to: usize,
    pub coefficient: f64,
}

/// Builder for the generator matrix of an `N`-level rate-equation system.
///
/// Fixed rates are stored per ordered state pair (last write wins); dynamic
/// rates are stored as a list of [`DynamicTerm`]s per parameter name and are
/// resolved against a [`RateParams`] every time a generator is built. The
/// generator itself is never cached.
#[derive(Clone, Debug, PartialEq)]
pub struct RateModel {
    n_states: usize,
    labels: Vec<String>,
    rates: IndexMap<(usize, usize), f64>,
    dynamic: IndexMap<String, Vec<DynamicTerm>>,
}

impl RateModel {
    /// Create a new model with `n_states` states labeled `"State 0"`, `"State
    /// 1"`, ....
    ///
    /// Fails if `n_states < 2`.
    pub fn new(n_states: usize) -> RateResult<Self> {
        Self::with_labels(
            n_states,
            (0..n_states).map(|k| format!("State {}", k)),
        )
    }

    /// Create a new model with the given state labels.
    ///
    /// Fails if `n_states < 2` or the number of labels differs from
    /// `n_states`.
    pub fn with_labels<I, L>(n_states: usize, labels: I) -> RateResult<Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        if n_states < 2 {
            return Err(Error::Configuration(
                "model must have at least 2 states".into()));
        }
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.len() != n_states {
            return Err(Error::Configuration(format!(
                "number of labels ({}) must match number of states ({})",
                labels.len(),
                n_states,
            )));
        }
        Ok(Self {
            n_states,
            labels,
            rates: IndexMap::new(),
            dynamic: IndexMap::new(),
        })
    }

    /// Return the number of states.
    pub fn num_states(&self) -> usize { self.n_states }

    /// Return the state labels, ordered by state index.
    pub fn labels(&self) -> &[String] { &self.labels }

    /// Return the label of a single state.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Set a fixed transition rate, in MHz, from one state to another.
    ///
    /// Fails if either index is out of bounds, if `from == to`, or if `rate` is
    /// negative or not finite.
    pub fn set_rate(&mut self, from: usize, to: usize, rate: f64)
        -> RateResult<()>
    {
        self.check_transition(from, to)?;
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::Domain(format!(
                "rate {} -> {} must be finite and non-negative, got {}",
                from, to, rate,
            )));
        }
        self.rates.insert((from, to), rate);
        Ok(())
    }

    /// Set several fixed transition rates, in MHz, at once.
    ///
    /// Entries are applied in order and each is validated independently;
    /// entries preceding the first invalid one remain set.
    pub fn set_rates<I>(&mut self, rates: I) -> RateResult<()>
    where I: IntoIterator<Item = ((usize, usize), f64)>
    {
        rates.into_iter()
            .try_for_each(|((from, to), rate)| self.set_rate(from, to, rate))
    }

    /// Get the fixed transition rate, in MHz, from one state to another, if
    /// set.
    pub fn rate(&self, from: usize, to: usize) -> Option<f64> {
        self.rates.get(&(from, to)).copied()
    }

    /// Iterate over all fixed rates as `((from, to), rate)`, in insertion
    /// order.
    pub fn rates(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        self.rates.iter().map(|(k, r)| (*k, *r))
    }

    /// Register a dynamic rate: at build time, the value of the parameter
    /// `param` times `coefficient` is added to the `from -> to` rate.
    ///
    /// The same parameter may be registered against any number of
    /// transitions.
    pub fn add_dynamic_rate(
        &mut self,
        param: &str,
        from: usize,
        to: usize,
        coefficient: f64,
    ) -> RateResult<()>
    {
        self.check_transition(from, to)?;
        if !coefficient.is_finite() {
            return Err(Error::Domain(format!(
                "coefficient for '{}' on {} -> {} must be finite, got {}",
                param, from, to, coefficient,
            )));
        }
        self.dynamic.entry(param.to_string())
            .or_default()
            .push(DynamicTerm { from, to, coefficient });
        Ok(())
    }

    /// Iterate over the names of all registered dynamic parameters.
    pub fn dynamic_params(&self) -> impl Iterator<Item = &str> + '_ {
        self.dynamic.keys().map(String::as_str)
    }

    /// Get the terms registered for a dynamic parameter.
    pub fn dynamic_terms(&self, param: &str) -> Option<&[DynamicTerm]> {
        self.dynamic.get(param).map(Vec::as_slice)
    }

    /// Compute the generator matrix for the given parameter values, in units of
    /// 1/s.
    ///
    /// Parameters missing from `params` contribute nothing. The main diagonal
    /// is recomputed so that every column sums to zero.
    pub fn build(&self, params: &RateParams) -> nd::Array2<f64> {
        let n = self.n_states;
        let mut W: nd::Array2<f64> = nd::Array2::zeros((n, n));
        for (&(from, to), &rate) in self.rates.iter() {
            W[[to, from]] += rate;
        }
        for (param, terms) in self.dynamic.iter() {
            let value = params.get(param);
            for DynamicTerm { from, to, coefficient } in terms.iter() {
                W[[*to, *from]] += value * coefficient;
            }
        }
        for i in 0..n {
            W[[i, i]] = 0.0;
            let outflow: f64 = W.column(i).sum();
            W[[i, i]] = -outflow;
        }
        debug!(
            n_states = n,
            n_fixed = self.rates.len(),
            n_dynamic = self.dynamic.len(),
            "built generator matrix",
        );
        W * MHZ
    }

    /// Get a population vector with all population in a single state.
    pub fn initial_state(&self, index: usize) -> RateResult<nd::Array1<f64>> {
        check_index("state_index", index, self.n_states)?;
        let mut P0: nd::Array1<f64> = nd::Array1::zeros(self.n_states);
        P0[index] = 1.0;
        Ok(P0)
    }

    /// Get a population vector from `(state, population)` pairs.
    ///
    /// The result is *not* renormalized; the caller is responsible for
    /// supplying populations that sum to 1.
    pub fn initial_state_mixed<I>(&self, populations: I)
        -> RateResult<nd::Array1<f64>>
    where I: IntoIterator<Item = (usize, f64)>
    {
        let mut P0: nd::Array1<f64> = nd::Array1::zeros(self.n_states);
        for (index, population) in populations.into_iter() {
            check_index("state_index", index, self.n_states)?;
            P0[index] = population;
        }
        Ok(P0)
    }

    fn check_transition(&self, from: usize, to: usize) -> RateResult<()> {
        check_index("from_state", from, self.n_states)?;
        check_index("to_state", to, self.n_states)?;
        if from == to {
            return Err(Error::Domain(
                format!("cannot set a rate from state {} to itself", from)));
        }
        Ok(())
    }
}

/// Common interface for anything that can describe a rate-equation system to
/// the experiment drivers.
pub trait RateBuild {
    /// Return the underlying generator builder.
    fn rate_model(&self) -> &RateModel;

    /// Build the generator matrix for the given parameter values.
    fn build_with(&self, params: &RateParams) -> nd::Array2<f64> {
        self.rate_model().build(params)
    }

    /// Initial distribution used by drivers when none is given.
    ///
    /// By default this places equal population in the first half of the
    /// states, which are assumed to be the ground manifold.
    fn default_initial_state(&self) -> nd::Array1<f64> {
        let n = self.rate_model().num_states();
        let n_ground = n / 2;
        (0..n)
            .map(|k| if k < n_ground { 1.0 / n_ground as f64 } else { 0.0 })
            .collect()
    }

    /// Fluorescence-like signal of the system, if one is defined.
    fn signal(&self) -> Option<Signal> { None }
}

impl RateBuild for RateModel {
    fn rate_model(&self) -> &RateModel { self }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rand::{ Rng, SeedableRng, rngs::StdRng };
    use super::*;

    fn three_level() -> RateModel {
        let mut model = RateModel::with_labels(3, ["A", "B", "C"]).unwrap();
        model.set_rates([((0, 1), 10.0), ((1, 0), 5.0), ((1, 2), 2.0)])
            .unwrap();
        model
    }

    #[test]
    fn labels_default_and_custom() {
        let model = RateModel::new(3).unwrap();
        assert_eq!(model.labels(), ["State 0", "State 1", "State 2"]);
        let model = three_level();
        assert_eq!(model.num_states(), 3);
        assert_eq!(model.label(2), Some("C"));
        assert_eq!(model.label(3), None);
    }

    #[test]
    fn invalid_construction() {
        assert!(matches!(RateModel::new(1), Err(Error::Configuration(_))));
        assert!(matches!(RateModel::new(0), Err(Error::Configuration(_))));
        assert!(matches!(
            RateModel::with_labels(3, ["a", "b"]),
            Err(Error::Configuration(_)),
        ));
    }

    #[test]
    fn invalid_rates_leave_model_untouched() {
        let mut model = three_level();
        let before = model.clone();
        assert!(matches!(model.set_rate(0, 0, 1.0), Err(Error::Domain(_))));
        assert!(matches!(
            model.set_rate(0, 3, 1.0),
            Err(Error::Range { name: "to_state", index: 3, n_states: 3 }),
        ));
        assert!(matches!(
            model.set_rate(7, 0, 1.0),
            Err(Error::Range { name: "from_state", .. }),
        ));
        assert!(matches!(model.set_rate(0, 1, -1.0), Err(Error::Domain(_))));
        assert!(matches!(
            model.set_rate(0, 1, f64::NAN),
            Err(Error::Domain(_)),
        ));
        assert!(matches!(
            model.add_dynamic_rate("gamma", 2, 2, 1.0),
            Err(Error::Domain(_)),
        ));
        assert_eq!(model, before);
    }

    #[test]
    fn set_rates_stops_at_first_invalid_entry() {
        let mut model = RateModel::new(3).unwrap();
        let res = model.set_rates([((0, 1), 1.0), ((2, 2), 1.0), ((1, 2), 1.0)]);
        assert!(matches!(res, Err(Error::Domain(_))));
        assert_eq!(model.rate(0, 1), Some(1.0));
        assert_eq!(model.rate(1, 2), None);
    }

    #[test]
    fn last_write_wins() {
        let mut model = three_level();
        model.set_rate(0, 1, 3.0).unwrap();
        assert_eq!(model.rate(0, 1), Some(3.0));
        let W = model.build(&RateParams::new());
        assert_abs_diff_eq!(W[[1, 0]], 3.0 * MHZ);
    }

    #[test]
    fn generator_layout_and_scaling() {
        let model = three_level();
        let W = model.build(&RateParams::new());
        assert_eq!(W.dim(), (3, 3));
        assert_abs_diff_eq!(W[[1, 0]], 10.0e6);
        assert_abs_diff_eq!(W[[0, 1]], 5.0e6);
        assert_abs_diff_eq!(W[[2, 1]], 2.0e6);
        assert_abs_diff_eq!(W[[0, 0]], -10.0e6);
        assert_abs_diff_eq!(W[[1, 1]], -7.0e6);
        assert_abs_diff_eq!(W[[2, 2]], 0.0);
    }

    #[test]
    fn dynamic_rates_accumulate_on_fixed_rates() {
        let mut model = three_level();
        model.add_dynamic_rate("gamma", 0, 1, 1.0).unwrap();
        model.add_dynamic_rate("gamma", 2, 0, 0.5).unwrap();
        model.add_dynamic_rate("kmw", 2, 1, 2.0).unwrap();
        assert_eq!(model.dynamic_params().collect::<Vec<_>>(), ["gamma", "kmw"]);
        assert_eq!(model.dynamic_terms("gamma").map(<[_]>::len), Some(2));

        let unset = model.build(&RateParams::new());
        assert_eq!(unset, model.build(&RateParams::new().with("kmw", 0.0)));
        assert_abs_diff_eq!(unset[[0, 2]], 0.0);

        let W = model.build(&RateParams::new().with("gamma", 4.0));
        assert_abs_diff_eq!(W[[1, 0]], 14.0e6);
        assert_abs_diff_eq!(W[[0, 2]], 2.0e6);
        assert_abs_diff_eq!(W[[1, 2]], 0.0);
    }

    #[test]
    fn random_generators_conserve_probability() {
        let mut rng = StdRng::seed_from_u64(10101);
        for _ in 0..50 {
            let n: usize = rng.gen_range(2..10);
            let mut model = RateModel::new(n).unwrap();
            for _ in 0..3 * n {
                let from = rng.gen_range(0..n);
                let to = rng.gen_range(0..n);
                if from == to { continue; }
                model.set_rate(from, to, rng.gen_range(0.0..3000.0)).unwrap();
                model.add_dynamic_rate("p", to, from, rng.gen_range(0.0..2.0))
                    .unwrap();
            }
            let params = RateParams::new().with("p", rng.gen_range(0.0..50.0));
            let W = model.build(&params);
            for col in W.columns() {
                assert_abs_diff_eq!(col.sum(), 0.0, epsilon = 1e-6);
            }
            assert!(W.diag().iter().all(|w| *w <= 0.0));
        }
    }

    #[test]
    fn initial_states() {
        let model = three_level();
        let P0 = model.initial_state(1).unwrap();
        assert_eq!(P0.to_vec(), vec![0.0, 1.0, 0.0]);
        assert!(matches!(model.initial_state(3), Err(Error::Range { .. })));

        let P0 = model.initial_state_mixed([(0, 0.25), (2, 0.25)]).unwrap();
        assert_eq!(P0.to_vec(), vec![0.25, 0.0, 0.25]);
        assert!(model.initial_state_mixed([(5, 1.0)]).is_err());
    }

    #[test]
    fn default_initial_state_fills_lower_half() {
        let model = RateModel::new(5).unwrap();
        let P0 = model.default_initial_state();
        assert_abs_diff_eq!(P0[0], 0.5);
        assert_abs_diff_eq!(P0[1], 0.5);
        assert_abs_diff_eq!(P0.sum(), 1.0);
    }
}
