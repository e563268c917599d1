// src/engine/bars.rs

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// One OHLCV sample. `time` is the bar open time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time:   i64,
    pub open:   f64,
    pub high:   f64,
    pub low:    f64,
    pub close:  f64,
    pub volume: f64,
}

/// Column-oriented bar storage. Strategies index the columns by bar number,
/// the simulator reads one `Bar` per step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSeries {
    time:   Vec<i64>,
    open:   Vec<f64>,
    high:   Vec<f64>,
    low:    Vec<f64>,
    close:  Vec<f64>,
    volume: Vec<f64>,
}

impl BarSeries {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            time:   Vec::with_capacity(n),
            open:   Vec::with_capacity(n),
            high:   Vec::with_capacity(n),
            low:    Vec::with_capacity(n),
            close:  Vec::with_capacity(n),
            volume: Vec::with_capacity(n),
        }
    }

    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut series = Self::with_capacity(bars.len());
        for bar in bars {
            series.push(*bar);
        }
        series
    }

    /// Build from parallel columns; every column must match `time` in length.
    pub fn from_columns(
        time:   Vec<i64>,
        open:   Vec<f64>,
        high:   Vec<f64>,
        low:    Vec<f64>,
        close:  Vec<f64>,
        volume: Vec<f64>,
    ) -> Result<Self> {
        let n = time.len();
        for (name, len) in [
            ("open", open.len()),
            ("high", high.len()),
            ("low", low.len()),
            ("close", close.len()),
            ("volume", volume.len()),
        ] {
            if len != n {
                return Err(BacktestError::LengthMismatch { name, expected: n, got: len });
            }
        }
        Ok(Self { time, open, high, low, close, volume })
    }

    pub fn push(&mut self, bar: Bar) {
        self.time.push(bar.time);
        self.open.push(bar.open);
        self.high.push(bar.high);
        self.low.push(bar.low);
        self.close.push(bar.close);
        self.volume.push(bar.volume);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    #[inline]
    pub fn bar(&self, i: usize) -> Bar {
        Bar {
            time:   self.time[i],
            open:   self.open[i],
            high:   self.high[i],
            low:    self.low[i],
            close:  self.close[i],
            volume: self.volume[i],
        }
    }

    pub fn last(&self) -> Option<Bar> {
        self.len().checked_sub(1).map(|i| self.bar(i))
    }

    pub fn time(&self) -> &[i64] { &self.time }
    pub fn open(&self) -> &[f64] { &self.open }
    pub fn high(&self) -> &[f64] { &self.high }
    pub fn low(&self) -> &[f64] { &self.low }
    pub fn close(&self) -> &[f64] { &self.close }
    pub fn volume(&self) -> &[f64] { &self.volume }


    /// Owned copy of a contiguous window.
    pub fn slice(&self, range: Range<usize>) -> BarSeries {
        BarSeries {
            time:   self.time[range.clone()].to_vec(),
            open:   self.open[range.clone()].to_vec(),
            high:   self.high[range.clone()].to_vec(),
            low:    self.low[range.clone()].to_vec(),
            close:  self.close[range.clone()].to_vec(),
            volume: self.volume[range].to_vec(),
        }
    }

    /// The last `n` bars, or all of them when there are fewer.
    pub fn tail(&self, n: usize) -> BarSeries {
        self.slice(self.len().saturating_sub(n)..self.len())
    }

    pub fn iter(&self) -> impl Iterator<Item = Bar> + '_ {
        (0..self.len()).map(move |i| self.bar(i))
    }
}

impl FromIterator<Bar> for BarSeries {
    fn from_iter<I: IntoIterator<Item = Bar>>(iter: I) -> Self {
        let mut series = BarSeries::default();
        for bar in iter {
            series.push(bar);
        }
        series
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time: i64, close: f64) -> Bar {
        Bar { time, open: close, high: close, low: close, close, volume: 1.0 }
    }

    #[test]
    fn slice_and_tail() {
        let series: BarSeries = (0..5).map(|i| bar(i * 60_000, 100.0 + i as f64)).collect();
        let window = series.slice(1..3);
        assert_eq!(window.len(), 2);
        assert_eq!(window.bar(0).close, 101.0);
        assert_eq!(window.last().map(|b| b.time), Some(120_000));

        assert_eq!(series.tail(2).time(), &[180_000, 240_000]);
        assert_eq!(series.tail(9).len(), 5);
    }

    #[test]
    fn column_lengths_must_match() {
        let err = BarSeries::from_columns(
            vec![0, 1],
            vec![1.0, 1.0],
            vec![1.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
            vec![1.0, 1.0],
        )
        .unwrap_err();
        assert_eq!(err, BacktestError::LengthMismatch { name: "high", expected: 2, got: 1 });
    }
}
