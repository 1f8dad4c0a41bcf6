//! Matrix exponential of real matrices via scaling-and-squaring with a
//! diagonal Padé(13) approximant.
//!
//! See N. J. Higham, "The Scaling and Squaring Method for the Matrix
//! Exponential Revisited", SIAM J. Matrix Anal. Appl. 26(4), 1179 (2005).

use ndarray as nd;
use ndarray_linalg::InverseInto;
use crate::error::{ Error, RateResult };

/// Largest 1-norm for which the Padé(13) approximant is accurate to double
/// precision without scaling.
const THETA_13: f64 = 5.371920351148152;

/// Padé(13, 13) coefficients `b_k / b_0`.
const PADE_13: [f64; 14] = [
    1.0,
    0.5,
    0.12,
    1.833_333_333_333_333_4e-2,
    1.992_753_623_188_405_8e-3,
    1.630_434_782_608_696e-4,
    1.035_196_687_401_6e-5,
    5.175_983_437_008_01e-7,
    2.043_151_356_652_5e-8,
    6.306_022_705_717_593e-10,
    1.483_770_048_404_14e-11,
    2.529_153_491_597_966e-13,
    2.810_170_546_219_962_4e-15,
    1.544_049_750_670_309e-17,
];

/// Compute `exp(A)` for a square real matrix.
///
/// Fails if `A` is not square or the Padé denominator cannot be inverted.
pub fn expm(A: &nd::Array2<f64>) -> RateResult<nd::Array2<f64>> {
    let (n, m) = A.dim();
    if n != m {
        return Err(Error::Dimension(
            format!("expm: expected a square matrix, got {} x {}", n, m)));
    }
    if n == 0 { return Ok(nd::Array2::zeros((0, 0))); }
    if A.iter().any(|a| !a.is_finite()) {
        return Err(Error::Solver("expm: matrix has non-finite entries".into()));
    }

    let norm = norm_1(A);
    let s: i32
        = if norm > THETA_13 {
            (norm / THETA_13).log2().ceil() as i32
        } else {
            0
        };
    let A_s: nd::Array2<f64> = A * 2.0_f64.powi(-s);
    let mut E = pade13(&A_s)?;
    for _ in 0..s {
        E = E.dot(&E);
    }
    Ok(E)
}

/// Maximum absolute column sum.
pub(crate) fn norm_1(A: &nd::Array2<f64>) -> f64 {
    A.columns().into_iter()
        .map(|col| col.iter().map(|a| a.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

fn pade13(A: &nd::Array2<f64>) -> RateResult<nd::Array2<f64>> {
    let b = &PADE_13;
    let eye: nd::Array2<f64> = nd::Array2::eye(A.nrows());
    let A2 = A.dot(A);
    let A4 = A2.dot(&A2);
    let A6 = A2.dot(&A4);

    let W1: nd::Array2<f64> = &A6 * b[13] + &A4 * b[11] + &A2 * b[9];
    let W2: nd::Array2<f64>
        = W1.dot(&A6) + &A6 * b[7] + &A4 * b[5] + &A2 * b[3] + &eye * b[1];
    let U = A.dot(&W2);

    let Z1: nd::Array2<f64> = &A6 * b[12] + &A4 * b[10] + &A2 * b[8];
    let V: nd::Array2<f64>
        = Z1.dot(&A6) + &A6 * b[6] + &A4 * b[4] + &A2 * b[2] + &eye * b[0];

    // exp(A) ≈ (V - U)^-1 (V + U)
    let Q_inv = (&V - &U).inv_into()?;
    Ok(Q_inv.dot(&(&V + &U)))
}
