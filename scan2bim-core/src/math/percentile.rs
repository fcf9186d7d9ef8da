use float_ord::FloatOrd;

/// Computes the `percentile`-th percentile of `values`, interpolating linearly between the two closest ranks.
/// `percentile` is given in `[0, 100]`, so `percentile(values, 0.0)` is the minimum and `percentile(values, 100.0)`
/// the maximum. Returns `None` if `values` is empty or `percentile` is out of range
///
/// ```
/// # use scan2bim_core::math::percentile;
/// let values = [4.0, 1.0, 3.0, 2.0, 5.0];
/// assert_eq!(Some(1.0), percentile(&values, 0.0));
/// assert_eq!(Some(3.0), percentile(&values, 50.0));
/// assert_eq!(Some(4.5), percentile(&values, 87.5));
/// ```
pub fn percentile(values: &[f64], percentile: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&percentile) {
        return None;
    }
    let mut sorted = values.iter().copied().map(FloatOrd).collect::<Vec<_>>();
    sorted.sort_unstable();

    let rank = percentile / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    let FloatOrd(low) = sorted[lower];
    let FloatOrd(high) = sorted[upper];
    Some(low + (high - low) * fraction)
}
