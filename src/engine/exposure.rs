// src/engine/exposure.rs

/// Realized equity after each closed deal: `initial` followed by the running
/// sum of `pnls`. Length is one more than the number of deals.
pub fn equity_curve(initial: f64, pnls: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut curve = Vec::with_capacity(pnls.size_hint().0 + 1);
    let mut equity = initial;
    curve.push(equity);
    for pnl in pnls {
        equity += pnl;
        curve.push(equity);
    }
    curve
}

/// Largest peak-to-trough fall, `(absolute, percent)`.
///
/// Forward walk keeping the running maximum; measured only on bars where
/// equity fell. The percentage uses the running maximum at that point as the
/// denominator, not the global peak.
pub fn max_drawdown(equity: &[f64]) -> (f64, f64) {
    let Some(&first) = equity.first() else {
        return (0.0, 0.0);
    };
    let mut peak = first;
    let (mut max_abs, mut max_pct) = (0.0_f64, 0.0_f64);

    for i in 1..equity.len() {
        peak = peak.max(equity[i]);
        if equity[i] < equity[i - 1] {
            let trough = equity[i];
            max_abs = max_abs.max(peak - trough);
            max_pct = max_pct.max((1.0 - trough / peak) * 100.0);
        }
    }
    (max_abs, max_pct)
}

/// Largest trough-to-peak rise, `(absolute, percent)`. Mirror of
/// [`max_drawdown`] using the running minimum.
pub fn max_run_up(equity: &[f64]) -> (f64, f64) {
    let Some(&first) = equity.first() else {
        return (0.0, 0.0);
    };
    let mut floor = first;
    let (mut max_abs, mut max_pct) = (0.0_f64, 0.0_f64);

    for i in 1..equity.len() {
        floor = floor.min(equity[i]);
        if equity[i] > equity[i - 1] {
            let top = equity[i];
            max_abs = max_abs.max(top - floor);
            max_pct = max_pct.max((top / floor - 1.0) * 100.0);
        }
    }
    (max_abs, max_pct)
}
