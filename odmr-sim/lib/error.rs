//! Error taxonomy shared by the model builders, solvers, and drivers.

use thiserror::Error;

/// Result alias for every fallible operation in this crate.
pub type RateResult<T> = Result<T, Error>;

/// Errors raised while setting up or solving a rate-equation system.
///
/// All validation happens at the offending call; nothing is deferred to
/// generator-build time.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid state count, label count, preset, or driver option.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A state index outside `[0, n_states)`.
    #[error("{name}={index} is out of bounds for a model with {n_states} states")]
    Range {
        name: &'static str,
        index: usize,
        n_states: usize,
    },

    /// A value outside the domain of an operation (self-loop rate, negative
    /// or non-finite rate, out-of-span evaluation time).
    #[error("domain error: {0}")]
    Domain(String),

    /// Mismatched array shapes or lengths.
    #[error("dimension mismatch: {0}")]
    Dimension(String),

    /// Failure of an underlying eigen-decomposition, linear solve, or ODE
    /// integration, carrying the backend's diagnostic.
    #[error("solver error: {0}")]
    Solver(String),
}

impl From<ndarray_linalg::error::LinalgError> for Error {
    fn from(err: ndarray_linalg::error::LinalgError) -> Self {
        Self::Solver(err.to_string())
    }
}

impl From<ode_solvers::dop_shared::IntegrationError> for Error {
    fn from(err: ode_solvers::dop_shared::IntegrationError) -> Self {
        Self::Solver(format!("ODE integration failed: {:?}", err))
    }
}

/// Check that `index` names a state of an `n_states`-level system.
pub(crate) fn check_index(name: &'static str, index: usize, n_states: usize)
    -> RateResult<()>
{
    (index < n_states).then_some(())
        .ok_or(Error::Range { name, index, n_states })
}
