// prepare_inputs.rs

use crate::engine::bars::BarSeries;
use crate::error::{BacktestError, Result};

/// Reject a series the bar loop cannot run over: empty, unordered in time,
/// or carrying a non-finite price. Returns the bar count.
pub fn prepare_inputs(bars: &BarSeries) -> Result<usize> {
    let n = bars.len();
    if n == 0 {
        return Err(BacktestError::EmptySeries);
    }
    if let Some(index) = bars.time().windows(2).position(|w| w[1] <= w[0]) {
        return Err(BacktestError::UnorderedTime { index: index + 1 });
    }
    for (field, column) in [
        ("open", bars.open()),
        ("high", bars.high()),
        ("low", bars.low()),
        ("close", bars.close()),
    ] {
        if let Some(index) = column.iter().position(|x| !x.is_finite()) {
            return Err(BacktestError::NonFinite { field, index });
        }
    }
    Ok(n)
}
