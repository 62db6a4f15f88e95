//! Small population-statistics helpers shared by the classifier and tracker.
//!
//! All helpers return `0.0` for empty input rather than `NaN`, so callers can
//! feed them histories of any length without guarding.

/// Arithmetic mean, or `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance, or `0.0` for an empty slice.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Slope of the ordinary least-squares fit of `values` against their index.
///
/// Fewer than two points carry no trend and yield `0.0`.
pub fn linear_trend(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);

    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        });

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// The trailing `window` values of `values` (all of them if shorter).
pub fn trailing(values: &[f64], window: usize) -> &[f64] {
    &values[values.len().saturating_sub(window)..]
}
