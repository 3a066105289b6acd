//! Log-domain special functions for the Beta recall model.
//!
//! Everything is kept in logs: Beta function values for the shape
//! parameters seen in practice underflow long before the ratios we care
//! about do.

use std::f64::consts::PI;

use crate::error::{Error, Result};

const LANCZOS_G: f64 = 7.0;

const LANCZOS_COEFFS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the Gamma function for `x > 0` (Lanczos approximation).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection: Γ(x)Γ(1-x) = π / sin(πx)
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS_COEFFS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEFFS[0], |acc, (i, c)| acc + c / (x + i as f64));

    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// Natural log of the Beta function B(a, b).
pub fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// ln(exp(a) - exp(b)) for `a > b`.
///
/// Fails when `a <= b`, where the difference is zero or negative.
pub fn ln_sub_exp(a: f64, b: f64) -> Result<f64> {
    if !(a > b) {
        return Err(Error::model(format!(
            "cannot subtract exp({b}) from exp({a})"
        )));
    }
    Ok(a + (-(b - a).exp()).ln_1p())
}

/// Beta shape parameters with the given mean and variance.
pub fn beta_from_moments(mean: f64, variance: f64) -> Result<(f64, f64)> {
    if !(mean > 0.0 && mean < 1.0) || !(variance > 0.0) {
        return Err(Error::model(format!(
            "no Beta distribution with mean {mean} and variance {variance}"
        )));
    }
    let common = mean * (1.0 - mean) / variance - 1.0;
    if !(common > 0.0) {
        return Err(Error::model(format!(
            "variance {variance} too large for mean {mean}"
        )));
    }
    Ok((mean * common, (1.0 - mean) * common))
}
