//! General-purpose numerical integration of `dP/dt = W P`.
//!
//! This is a fallback for cases where the exact propagator of
//! [`evolve`][super::evolve] is not wanted, e.g. to cross-check it or to sample
//! the trajectory on the integrator's own adaptive grid.

use std::cell::RefCell;
use ndarray as nd;
use ode_solvers::{ DVector, Dop853, Dopri5, Rk4, System, dop_shared::OutputType };
use tracing::debug;
use crate::{
    error::{ Error, RateResult },
    solver::check_system,
};

/// Supported integration methods.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Method {
    /// Classic fixed-step fourth-order Runge-Kutta.
    ///
    /// The step is shrunk as needed so that every output time is hit exactly.
    Rk4 { step: f64 },

    /// Adaptive Dormand-Prince 5(4).
    Dopri5 { abs_tol: f64, rel_tol: f64 },

    /// Adaptive Dormand-Prince 8(5, 3).
    Dop853 { abs_tol: f64, rel_tol: f64 },
}

impl Default for Method {
    fn default() -> Self { Self::Dopri5 { abs_tol: 1e-10, rel_tol: 1e-8 } }
}

/// Further options for [`integrate`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OdeOptions {
    /// Output spacing for the adaptive methods when no evaluation times are
    /// given; zero means that every accepted step is reported. A dense grid
    /// starts at the beginning of the span and need not include its end.
    pub output_step: f64,
}

impl Default for OdeOptions {
    fn default() -> Self { Self { output_step: 0.0 } }
}

/// Output of [`integrate`].
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    /// Time coordinates in seconds.
    pub time: nd::Array1<f64>,
    /// Populations, with rows corresponding to `time`.
    pub populations: nd::Array2<f64>,
}

// iteration budget and stiffness-check period of the adaptive steppers
const N_MAX: u32 = 100_000;
const N_STIFF: u32 = 1000;

struct RateSystem<'a> {
    W: &'a nd::Array2<f64>,
    // times of accepted steps; Dop853's sparse output records only the
    // initial time for every step, so they're tracked here instead
    accepted: &'a RefCell<Vec<f64>>,
}

impl System<f64, DVector<f64>> for RateSystem<'_> {
    fn system(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        *dy = DVector::from_iterator(
            self.W.nrows(),
            self.W.rows().into_iter()
                .map(|row| row.iter().zip(y.iter()).map(|(w, p)| w * p).sum::<f64>()),
        );
    }

    fn solout(&mut self, t: f64, _y: &DVector<f64>, _dy: &DVector<f64>) -> bool {
        self.accepted.borrow_mut().push(t);
        false
    }
}

// smallest step >= `span / ceil(span / step)` for which a stepper counting
// `ceil(span / h)` steps lands on the end of the span instead of one step past
// it
fn fixed_step(span: f64, step: f64) -> f64 {
    let n_steps = (span / step).ceil().max(1.0);
    let mut h = span / n_steps;
    while (span / h).ceil() > n_steps {
        h = f64::from_bits(h.to_bits() + 1);
    }
    h
}

fn output_type(output_step: f64) -> OutputType {
    if output_step > 0.0 { OutputType::Dense } else { OutputType::Sparse }
}

impl Method {
    fn validate(&self) -> RateResult<()> {
        let ok = match *self {
            Self::Rk4 { step } => step.is_finite() && step > 0.0,
            Self::Dopri5 { abs_tol, rel_tol } | Self::Dop853 { abs_tol, rel_tol }
                => abs_tol > 0.0 && rel_tol > 0.0,
        };
        ok.then_some(())
            .ok_or_else(|| Error::Domain(format!("invalid integration method {:?}", self)))
    }

    // integrate over a single interval, returning the stepper's output grid:
    // every accepted step (ending exactly at `t1`) if `output_step` is zero,
    // otherwise a dense grid `t0, t0 + output_step, ...`
    fn run(
        &self,
        W: &nd::Array2<f64>,
        y0: DVector<f64>,
        (t0, t1): (f64, f64),
        output_step: f64,
    ) -> RateResult<(Vec<f64>, Vec<DVector<f64>>)>
    {
        let accepted = RefCell::new(vec![t0]);
        let sys = RateSystem { W, accepted: &accepted };
        let dense = output_step > 0.0;
        let (dense_time, y) = match *self {
            Self::Rk4 { step } => {
                let h = fixed_step(t1 - t0, step);
                let mut stepper = Rk4::new(sys, t0, y0, t1, h);
                stepper.integrate()?;
                (None, stepper.y_out().clone())
            },
            Self::Dopri5 { abs_tol, rel_tol } => {
                let mut stepper = Dopri5::from_param(
                    sys, t0, t1, output_step, y0, rel_tol, abs_tol,
                    0.9, 0.04, 0.2, 10.0, t1 - t0, 0.0, N_MAX, N_STIFF,
                    output_type(output_step),
                );
                stepper.integrate()?;
                (dense.then(|| stepper.x_out().clone()), stepper.y_out().clone())
            },
            Self::Dop853 { abs_tol, rel_tol } => {
                let mut stepper = Dop853::from_param(
                    sys, t0, t1, output_step, y0, rel_tol, abs_tol,
                    0.9, 0.0, 0.333, 6.0, t1 - t0, 0.0, N_MAX, N_STIFF,
                    output_type(output_step),
                );
                stepper.integrate()?;
                (dense.then(|| stepper.x_out().clone()), stepper.y_out().clone())
            },
        };
        let time
            = match dense_time {
                Some(time) => time,
                None => {
                    let mut time = accepted.into_inner();
                    // the last step is clamped onto t1
                    if let Some(last) = time.last_mut() { *last = t1; }
                    time
                },
            };
        if time.len() != y.len() {
            return Err(Error::Solver(format!(
                "integrator reported {} states for {} times",
                y.len(),
                time.len(),
            )));
        }
        Ok((time, y))
    }
}

fn to_dvector(P: &nd::Array1<f64>) -> DVector<f64> {
    DVector::from_iterator(P.len(), P.iter().copied())
}

fn stack_rows(n: usize, rows: &[DVector<f64>]) -> nd::Array2<f64> {
    nd::Array2::from_shape_fn((rows.len(), n), |(i, j)| rows[i][j])
}

/// Numerically integrate `dP/dt = W P` from `P0` over `span = (t0, t1)`.
///
/// If `eval_times` is given, the returned trajectory is sampled exactly at
/// those times, which must be non-decreasing and lie within `span`; otherwise
/// the integrator's own output grid is returned. Integrator failures (e.g. a
/// stiff problem exhausting the step budget of an explicit method) are
/// reported as [`Error::Solver`].
pub fn integrate(
    W: &nd::Array2<f64>,
    P0: &nd::Array1<f64>,
    span: (f64, f64),
    eval_times: Option<&nd::Array1<f64>>,
    method: Method,
    options: OdeOptions,
) -> RateResult<Trajectory>
{
    check_system(W, P0)?;
    method.validate()?;
    let (t0, t1) = span;
    if !(t0.is_finite() && t1.is_finite() && t1 > t0) {
        return Err(Error::Domain(
            format!("invalid integration span ({}, {})", t0, t1)));
    }
    if !(options.output_step.is_finite() && options.output_step >= 0.0) {
        return Err(Error::Domain(format!(
            "output step must be finite and non-negative, got {}",
            options.output_step,
        )));
    }
    if options.output_step > 0.0 && eval_times.is_none() && t0 < 0.0 {
        return Err(Error::Domain(
            "dense output requires a non-negative start time".into()));
    }
    let n = P0.len();
    debug!(n_states = n, t0, t1, ?method, "integrating rate equation");

    let Some(eval_times) = eval_times else {
        let (time, y) = method.run(W, to_dvector(P0), span, options.output_step)?;
        return Ok(Trajectory {
            populations: stack_rows(n, &y),
            time: time.into(),
        });
    };

    let in_span = eval_times.iter().all(|t| (t0..=t1).contains(t));
    let sorted = eval_times.iter().zip(eval_times.iter().skip(1))
        .all(|(a, b)| a <= b);
    if !in_span || !sorted {
        return Err(Error::Domain(
            "evaluation times must be non-decreasing and lie within the span"
                .into()
        ));
    }
    let mut rows: Vec<DVector<f64>> = Vec::with_capacity(eval_times.len());
    let mut t_cur = t0;
    let mut y_cur = to_dvector(P0);
    for &te in eval_times.iter() {
        if te > t_cur {
            let (_, y) = method.run(W, y_cur.clone(), (t_cur, te), 0.0)?;
            y_cur = y.last().cloned()
                .ok_or_else(|| Error::Solver("integrator produced no output".into()))?;
            t_cur = te;
        }
        rows.push(y_cur.clone());
    }
    Ok(Trajectory {
        time: eval_times.clone(),
        populations: stack_rows(n, &rows),
    })
}
