//! Numeric primitives shared by the analysis and anomaly engines.
//!
//! Every function is total: empty input, a single observation, or zero
//! variance yield `None` instead of a NaN or a panic. NaN inputs are skipped.

use std::cmp::Ordering;

/// Sum that ignores NaN entries. An empty input sums to zero.
pub fn nansum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().filter(|v| !v.is_nan()).sum()
}

fn observed(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let values = observed(values);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    let mut values = observed(values);
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Sample (n - 1) standard deviation; undefined below two observations.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let values = observed(values);
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (n - 1.0)).sqrt())
}

pub fn min(values: &[f64]) -> Option<f64> {
    observed(values).into_iter().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    observed(values).into_iter().reduce(f64::max)
}

/// Pearson correlation over the pairs where both sides are observed.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(x, y)| (*x, *y))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Percentile with linear interpolation between the closest ranks.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    let mut values = observed(values);
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let position = (pct / 100.0).clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(values[lower] + (values[upper] - values[lower]) * fraction)
}

/// Percentile rank (0-100] of every value, in input order. Ties share the
/// average of the ranks they span.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut start = 0;
    while start < n {
        let mut end = start;
        while end + 1 < n && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1..=end+1 averaged
        let average = (start + end) as f64 / 2.0 + 1.0;
        for &index in &order[start..=end] {
            ranks[index] = average / n as f64 * 100.0;
        }
        start = end + 1;
    }
    ranks
}

/// Index range covered by a centered window of `window` points at `index`,
/// or `None` when the window does not fit inside a series of `len` points.
pub fn centered_window(len: usize, window: usize, index: usize) -> Option<std::ops::Range<usize>> {
    if window == 0 {
        return None;
    }
    let start = index.checked_sub(window / 2)?;
    let end = start + window;
    (end <= len).then_some(start..end)
}

/// Applies `stat` to every full centered window of the series.
pub fn rolling_centered<F>(values: &[f64], window: usize, stat: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    (0..values.len())
        .map(|index| {
            let range = centered_window(values.len(), window, index)?;
            let slice = &values[range];
            if slice.iter().any(|v| v.is_nan()) {
                return None;
            }
            stat(slice)
        })
        .collect()
}
