/// Nearest-rank percentile of `samples`
///
/// Sorts a copy of the samples ascending and returns the element at
/// `ceil(p / 100 * n) - 1`, clamped into range. No interpolation takes place,
/// so the result is always one of the samples; for ten samples both p95 and
/// p99 resolve to the maximum. Returns `0.0` for an empty input.
pub fn percentile(samples: &[f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (p.clamp(0.0, 100.0) / 100.0 * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index]
}

/// Arithmetic mean, or `None` for an empty input
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        None
    } else {
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}
