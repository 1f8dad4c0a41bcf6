//! Solutions of the rate equation `dP/dt = W P` for a time-independent
//! generator `W`.
//!
//! Population trajectories are returned as 2D arrays whose rows correspond to
//! time and whose columns correspond to states. Generators are expected in
//! units of 1/s and times in seconds.

use itertools::Itertools;
use ndarray as nd;
use ndarray_linalg::Eig;
use num_complex::Complex64 as C64;
use tracing::{ debug, warn };
use crate::error::{ Error, RateResult, check_index };

pub mod expm;
pub mod ode;
pub use ode::{ integrate, Method, OdeOptions, Trajectory };

/// Eigenvalues within this multiple of `‖W‖₁` of zero are treated as zero when
/// checking the steady state for uniqueness.
pub const ZERO_EIGENVALUE_RTOL: f64 = 1e-12;

pub(crate) fn check_system(W: &nd::Array2<f64>, P0: &nd::Array1<f64>)
    -> RateResult<()>
{
    check_generator(W)?;
    if P0.len() != W.nrows() {
        return Err(Error::Dimension(format!(
            "population vector has length {}, but generator is {} x {}",
            P0.len(), W.nrows(), W.ncols(),
        )));
    }
    Ok(())
}

pub(crate) fn check_generator(W: &nd::Array2<f64>) -> RateResult<()> {
    let (n, m) = W.dim();
    if n != m || n == 0 {
        return Err(Error::Dimension(
            format!("generator must be square and non-empty, got {} x {}", n, m)));
    }
    Ok(())
}

/// Compute `P(t) = exp(W t) P0` at each of the requested times.
///
/// Times need not be sorted; each is evaluated independently and the rows of
/// the result follow the order of `t`.
pub fn evolve(
    W: &nd::Array2<f64>,
    P0: &nd::Array1<f64>,
    t: &nd::Array1<f64>,
) -> RateResult<nd::Array2<f64>>
{
    check_system(W, P0)?;
    let n = P0.len();
    let mut P: nd::Array2<f64> = nd::Array2::zeros((t.len(), n));
    for (tk, mut Pk) in t.iter().zip(P.rows_mut()) {
        let propagator = expm::expm(&(W * *tk))?;
        Pk.assign(&propagator.dot(P0));
    }
    debug!(n_states = n, n_times = t.len(), "evolved population vector");
    Ok(P)
}

/// Eigen-decompose `W` and return the real part of the eigenvector belonging
/// to the eigenvalue closest to zero, along with the number of eigenvalues
/// that are numerically zero.
fn null_vector(W: &nd::Array2<f64>) -> RateResult<(nd::Array1<f64>, usize)> {
    check_generator(W)?;
    let (E, V): (nd::Array1<C64>, nd::Array2<C64>) = W.eig()?;
    let k0 = E.iter()
        .map(|e| e.norm())
        .position_min_by(|a, b| a.total_cmp(b))
        .ok_or_else(|| Error::Solver("empty eigenvalue spectrum".into()))?;
    let tol = ZERO_EIGENVALUE_RTOL * expm::norm_1(W).max(1.0);
    let n_zero = E.iter().filter(|e| e.norm() <= tol).count();
    let v: nd::Array1<f64> = V.column(k0).mapv(|v| v.re);
    Ok((v, n_zero))
}

/// Normalize to unit sum, clip negative entries to zero, and renormalize.
fn normalize_clipped(v: nd::Array1<f64>) -> RateResult<nd::Array1<f64>> {
    let total = v.sum();
    if total == 0.0 || !total.is_finite() {
        return Err(Error::Solver(
            "steady-state eigenvector cannot be normalized".into()));
    }
    let clipped = (v / total).mapv(|p| p.max(0.0));
    let total = clipped.sum();
    if total == 0.0 {
        return Err(Error::Solver(
            "steady-state eigenvector has no positive component".into()));
    }
    Ok(clipped / total)
}

/// Compute the stationary distribution `P` with `W P = 0`, normalized to unit
/// sum with all entries non-negative.
///
/// The eigenvector belonging to the eigenvalue of smallest magnitude is used.
/// If the state graph is reducible, `W` has more than one zero eigenvalue and
/// the selection is arbitrary; this is logged but not treated as an error. See
/// [`steady_state_unique`] for a strict version.
pub fn steady_state(W: &nd::Array2<f64>) -> RateResult<nd::Array1<f64>> {
    let (v, n_zero) = null_vector(W)?;
    if n_zero > 1 {
        warn!(
            n_zero,
            "generator has a degenerate zero eigenvalue; steady state is not unique",
        );
    }
    normalize_clipped(v)
}

/// Like [`steady_state`], but fails if more than one eigenvalue is zero to
/// within [`ZERO_EIGENVALUE_RTOL`]` · ‖W‖₁`, i.e. if the stationary
/// distribution is not unique.
pub fn steady_state_unique(W: &nd::Array2<f64>)
    -> RateResult<nd::Array1<f64>>
{
    let (v, n_zero) = null_vector(W)?;
    if n_zero > 1 {
        return Err(Error::Solver(format!(
            "generator has {} zero eigenvalues; the state graph is reducible",
            n_zero,
        )));
    }
    normalize_clipped(v)
}

/// Compute `sum_k weights[k] * P[t, indices[k]]` for every time row `t` of a
/// population array.
pub fn weighted_observable(
    populations: &nd::Array2<f64>,
    weights: &[f64],
    indices: &[usize],
) -> RateResult<nd::Array1<f64>>
{
    if weights.len() != indices.len() {
        return Err(Error::Dimension(format!(
            "number of weights ({}) must match number of state indices ({})",
            weights.len(),
            indices.len(),
        )));
    }
    let n = populations.ncols();
    let mut signal: nd::Array1<f64> = nd::Array1::zeros(populations.nrows());
    for (&w, &k) in weights.iter().zip(indices) {
        check_index("state_index", k, n)?;
        signal.scaled_add(w, &populations.column(k));
    }
    Ok(signal)
}

/// Integrate `y(x)` by the trapezoidal rule on a possibly nonuniform grid.
pub fn trapz(y: &nd::Array1<f64>, x: &nd::Array1<f64>) -> RateResult<f64> {
    check_same_len(y, x)?;
    Ok(
        y.iter().tuple_windows()
            .zip(x.iter().tuple_windows())
            .map(|((yk, ykp1), (xk, xkp1))| (xkp1 - xk) * (yk + ykp1) / 2.0)
            .sum()
    )
}

/// Compute the "progressive" integral of `y(x)` using the trapezoidal rule on
/// a possibly nonuniform grid.
///
/// The progressive integral is defined as
/// ```text
/// I(x) = \int_{x_0}^x y(x') dx'
/// ```
pub fn trapz_prog(y: &nd::Array1<f64>, x: &nd::Array1<f64>)
    -> RateResult<nd::Array1<f64>>
{
    check_same_len(y, x)?;
    if y.is_empty() { return Ok(nd::Array1::zeros(0)); }
    let mut acc: f64 = 0.0;
    Ok(
        [0.0].into_iter()
            .chain(
                y.iter().tuple_windows()
                .zip(x.iter().tuple_windows())
                .map(|((yk, ykp1), (xk, xkp1))| {
                    acc += (xkp1 - xk) * (yk + ykp1) / 2.0;
                    acc
                })
            )
            .collect()
    )
}

fn check_same_len(y: &nd::Array1<f64>, x: &nd::Array1<f64>) -> RateResult<()> {
    (y.len() == x.len()).then_some(())
        .ok_or_else(|| Error::Dimension(format!(
            "trapz: unequal array lengths {} and {}", y.len(), x.len())))
}
