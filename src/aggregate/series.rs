//! Period-over-period change on an already grouped, time-ordered series.

/// `change[i] = (v[i] − v[i−1]) / v[i−1] × 100`.
///
/// The first element is always `None`, as is any element whose previous
/// value is zero or missing, or whose own value is missing.
pub fn percent_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for (i, v) in values.iter().enumerate() {
        let change = match (i, prev, *v) {
            (0, _, _) => None,
            (_, Some(p), Some(c)) if p != 0.0 => Some((c - p) / p * 100.0),
            _ => None,
        };
        out.push(change);
        prev = *v;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_is_undefined() {
        assert_eq!(percent_change(&[Some(5.0)]), vec![None]);
        assert!(percent_change(&[]).is_empty());
    }

    #[test]
    fn elementwise_change() {
        let out = percent_change(&[Some(100.0), Some(150.0), Some(75.0)]);
        assert_eq!(out, vec![None, Some(50.0), Some(-50.0)]);
    }

    #[test]
    fn zero_previous_is_undefined_not_zero() {
        let out = percent_change(&[Some(0.0), Some(10.0), Some(20.0)]);
        assert_eq!(out, vec![None, None, Some(100.0)]);
    }

    #[test]
    fn gaps_propagate() {
        let out = percent_change(&[Some(10.0), None, Some(20.0)]);
        assert_eq!(out, vec![None, None, None]);
    }
}
