//! Ratio helpers for KPI post formulas.
//!
//! All division operations are safe against zero denominators. KPIs are
//! meant to always render a number, so the helpers used by the catalog fall
//! back to an explicit value rather than NaN, infinity or null.

/// Percentage safe against zero denominator. Returns 0.0 when the
/// denominator is zero. Unrounded; callers round to their precision.
pub fn safe_pct(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        (numerator / denominator) * 100.0
    }
}

/// Safe division returning `None` when the denominator is zero.
pub fn safe_div(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Division with an explicit zero-denominator fallback of 0.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    safe_div(numerator, denominator).unwrap_or(0.0)
}

/// Change between the last two points of a series.
///
/// `Change` yields `(last − prev) / prev × 100`; `Ratio` yields
/// `last / prev × 100`. `fallback` is returned when the series has fewer
/// than two points or the previous point is missing or not positive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LastTwo {
    Change,
    Ratio,
}

pub fn last_two(series: &[Option<f64>], mode: LastTwo, fallback: f64) -> f64 {
    let [.., prev, last] = series else {
        return fallback;
    };
    match (*prev, *last) {
        (Some(p), Some(l)) if p > 0.0 => match mode {
            LastTwo::Change => (l - p) / p * 100.0,
            LastTwo::Ratio => l / p * 100.0,
        },
        _ => fallback,
    }
}
