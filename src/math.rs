use nalgebra as na;

/// Forward difference `out[i] = v[i + 1] - v[i]`.
pub fn diff(v: &na::DVector<f64>) -> na::DVector<f64> {
    let n = v.len().saturating_sub(1);

    na::DVector::from_fn(n, |i, _| v[i + 1] - v[i])
}

/// Difference applied twice, `len - 2` elements.
#[inline]
pub fn diff2(v: &na::DVector<f64>) -> na::DVector<f64> {
    diff(&diff(v))
}

/// Largest absolute value, `None` for an empty vector.
pub fn peak_abs(v: &na::DVector<f64>) -> Option<f64> {
    if v.is_empty() {
        None
    } else {
        Some(v.amax())
    }
}

/// Arithmetic mean, minimum and maximum in one pass.
pub fn mean_min_max(values: &[f64]) -> Option<(f64, f64, f64)> {
    let (first, rest) = values.split_first()?;

    let (sum, min, max) = rest
        .iter()
        .fold((*first, *first, *first), |(s, lo, hi), &v| (s + v, lo.min(v), hi.max(v)));

    Some((sum / values.len() as f64, min, max))
}
