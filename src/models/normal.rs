use statrs::function::erf::erfc;
use std::f64::consts::{PI, SQRT_2};

/// Standard normal CDF.
///
/// N(x) = 0.5 * erfc(-x / sqrt(2))
///
/// The erfc form keeps N(-x) = 1 - N(x) to machine precision, which the
/// put-call relationship of the closed-form pricer relies on. Saturates to
/// 0 / 1 for extreme arguments, never NaN for finite input.
#[inline]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal density.
#[inline]
pub fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}
