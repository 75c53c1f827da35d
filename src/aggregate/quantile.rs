//! Quantiles and quantile-based segmentation.

/// Quantile `q` (0..=1) of `values` by linear interpolation between the
/// two nearest order statistics. `None` for an empty slice.
///
/// `values` need not be sorted; NaN never appears here because
/// [`crate::model::Value::decimal`] rejects it upstream.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(quantile_sorted(&sorted, q))
}

pub(crate) fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Bucket index for `value` given ascending `thresholds`: the number of
/// thresholds it strictly exceeds. A value equal to a threshold stays in
/// the lower bucket. Missing values land in bucket 0.
pub fn segment_index(value: Option<f64>, thresholds: &[f64]) -> usize {
    match value {
        Some(v) => thresholds.iter().take_while(|t| v > **t).count(),
        None => 0,
    }
}
