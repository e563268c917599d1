// src/strategies/mod.rs

pub mod channel_breakout;
pub mod indicators;

pub use channel_breakout::{BreakoutParams, ChannelBreakout};
