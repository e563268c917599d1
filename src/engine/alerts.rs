// src/engine/alerts.rs

use serde::Serialize;

use crate::engine::position::Side;

/// Per-bar intent flags. Reset at the start of every bar; the only channel
/// from the engine to the order-execution layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Alerts {
    pub cancel:           bool,
    pub open_long:        bool,
    pub open_short:       bool,
    pub close_long:       bool,
    pub close_short:      bool,
    pub stop_moved_long:  bool,
    pub stop_moved_short: bool,
    pub scaled_long:      bool,
    pub scaled_short:     bool,
}

impl Alerts {
    pub fn reset(&mut self) {
        *self = Alerts::default();
    }

    pub fn any(&self) -> bool {
        *self != Alerts::default()
    }

    pub fn set_open(&mut self, side: Side) {
        match side {
            Side::Long => self.open_long = true,
            Side::Short => self.open_short = true,
        }
    }

    pub fn set_close(&mut self, side: Side) {
        match side {
            Side::Long => self.close_long = true,
            Side::Short => self.close_short = true,
        }
    }

    pub fn set_stop_moved(&mut self, side: Side) {
        match side {
            Side::Long => self.stop_moved_long = true,
            Side::Short => self.stop_moved_short = true,
        }
    }

    pub fn set_scaled(&mut self, side: Side) {
        match side {
            Side::Long => self.scaled_long = true,
            Side::Short => self.scaled_short = true,
        }
    }

    pub fn opened(&self, side: Side) -> bool {
        side.pick(self.open_long, self.open_short)
    }

    pub fn closed(&self, side: Side) -> bool {
        side.pick(self.close_long, self.close_short)
    }

    pub fn stop_moved(&self, side: Side) -> bool {
        side.pick(self.stop_moved_long, self.stop_moved_short)
    }

    pub fn scaled(&self, side: Side) -> bool {
        side.pick(self.scaled_long, self.scaled_short)
    }
}
