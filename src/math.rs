// src/math.rs
use rust_decimal::Decimal;

/// Largest exponent magnitude `Decimal` can represent exactly
const MAX_SCALE: i32 = 28;

/// Scale a fixed-point mantissa by `10^expo` without going through floats.
///
/// Returns `None` when the result does not fit a `Decimal`.
pub fn scale_mantissa(mantissa: i128, expo: i32) -> Option<Decimal> {
    if expo <= 0 {
        if -expo > MAX_SCALE {
            return None;
        }
        Decimal::try_from_i128_with_scale(mantissa, expo.unsigned_abs()).ok()
    } else {
        let factor = 10i128.checked_pow(expo.unsigned_abs())?;
        let scaled = mantissa.checked_mul(factor)?;
        Decimal::try_from_i128_with_scale(scaled, 0).ok()
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Sample standard deviation (n - 1). Zero for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Percentage change from `old_value` to `new_value`; zero when `old_value` is zero
pub fn percentage_change(old_value: f64, new_value: f64) -> f64 {
    if old_value != 0.0 {
        ((new_value - old_value) / old_value) * 100.0
    } else {
        0.0
    }
}
