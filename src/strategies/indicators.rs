// src/strategies/indicators.rs

use std::collections::VecDeque;

/// Highest value over the trailing `period` samples, inclusive of the
/// current one. The first `period - 1` outputs are NaN.
pub fn rolling_highest(values: &[f64], period: usize) -> Vec<f64> {
    rolling_extreme(values, period, |new, old| new >= old)
}

/// Lowest value over the trailing `period` samples. See [`rolling_highest`].
pub fn rolling_lowest(values: &[f64], period: usize) -> Vec<f64> {
    rolling_extreme(values, period, |new, old| new <= old)
}

/// Monotonic-deque window extreme; `dominates(new, old)` evicts `old`.
fn rolling_extreme(values: &[f64], period: usize, dominates: impl Fn(f64, f64) -> bool) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let mut window: VecDeque<usize> = VecDeque::with_capacity(period);

    for (i, &x) in values.iter().enumerate() {
        while window.back().is_some_and(|&j| dominates(x, values[j])) {
            window.pop_back();
        }
        window.push_back(i);
        if window.front().is_some_and(|&j| j + period <= i) {
            window.pop_front();
        }
        if i + 1 >= period {
            if let Some(&j) = window.front() {
                out[i] = values[j];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(values: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
        (0..values.len())
            .map(|i| {
                if i + 1 < period {
                    f64::NAN
                } else {
                    values[i + 1 - period..=i].iter().copied().reduce(pick).unwrap()
                }
            })
            .collect()
    }

    fn same(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
    }

    #[test]
    fn matches_naive_window() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0, 5.0];
        for period in 1..5 {
            assert!(same(&rolling_highest(&values, period), &naive(&values, period, f64::max)));
            assert!(same(&rolling_lowest(&values, period), &naive(&values, period, f64::min)));
        }
    }

    #[test]
    fn warmup_is_nan() {
        let out = rolling_highest(&[1.0, 2.0, 3.0], 3);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_eq!(out[2], 3.0);
        assert!(rolling_lowest(&[1.0], 0)[0].is_nan());
    }
}
