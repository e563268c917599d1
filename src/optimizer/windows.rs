// src/optimizer/windows.rs

use std::ops::Range;

use crate::engine::bars::BarSeries;
use crate::error::{BacktestError, Result};

/// Fewest bars either window may hold.
pub const MIN_WINDOW_BARS: usize = 2;

/// Train window first, validation immediately after it.
#[derive(Debug, Clone)]
pub struct Windows {
    pub train:            BarSeries,
    pub validation:       BarSeries,
    pub train_range:      Range<usize>,
    pub validation_range: Range<usize>,
}

/// Split `bars` by fraction. Sizes are floored; the validation window is
/// clipped to whatever follows the train window.
pub fn split_windows(bars: &BarSeries, train: f64, validation: f64) -> Result<Windows> {
    let n = bars.len();
    let train_len = (n as f64 * train) as usize;
    let validation_len = ((n as f64 * validation) as usize).min(n - train_len.min(n));

    if train_len < MIN_WINDOW_BARS || validation_len < MIN_WINDOW_BARS {
        let needed = ((MIN_WINDOW_BARS as f64 / train.min(validation).max(f64::EPSILON)).ceil()) as usize;
        return Err(BacktestError::NotEnoughBars { needed, got: n });
    }

    let train_range = 0..train_len;
    let validation_range = train_len..train_len + validation_len;
    Ok(Windows {
        train:            bars.slice(train_range.clone()),
        validation:       bars.slice(validation_range.clone()),
        train_range,
        validation_range,
    })
}
