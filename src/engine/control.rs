//! Control state and gain resolution
//!
//! Control-Change messages on the listening channel move the volume and
//! balance axes. Gain factors are only recomputed when an axis moved.

use super::curves::{CurveTables, CENTER_BALANCE, MAX_CONTROL_VALUE};
use super::midi::MidiPacket;
use crate::config::BalancerConfig;

/// Which control axis a message addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Volume,
    Balance,
}

/// An accepted control change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEvent {
    pub axis: Axis,
    pub controller: u8,
    pub value: u8,
}

/// Per-channel gain multipliers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainFactors {
    pub left: f32,
    pub right: f32,
}

/// Derived gain, before and after the first resolution
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GainState {
    #[default]
    Uninitialized,
    Computed(GainFactors),
}

impl GainState {
    /// Current factors, if resolved
    pub fn factors(&self) -> Option<GainFactors> {
        match *self {
            GainState::Uninitialized => None,
            GainState::Computed(factors) => Some(factors),
        }
    }
}

/// Last seen axis values and the gain derived from them
#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    channel: u8,
    volume_cc: u8,
    balance_cc: u8,
    gain: f64,
    volume: u8,
    balance: u8,
    state: GainState,
}

impl ControlState {
    /// Create control state at full volume and center balance
    pub fn new(config: &BalancerConfig) -> Self {
        Self {
            channel: config.channel,
            volume_cc: config.volume_cc,
            balance_cc: config.balance_cc,
            gain: config.gain,
            volume: MAX_CONTROL_VALUE,
            balance: CENTER_BALANCE,
            state: GainState::Uninitialized,
        }
    }

    /// Current volume axis value
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Current balance axis value
    pub fn balance(&self) -> u8 {
        self.balance
    }

    /// Current derived gain
    pub fn gain_state(&self) -> GainState {
        self.state
    }

    /// Apply one raw message.
    ///
    /// Returns the event if the message moved an axis. Malformed messages,
    /// other channels, other message types and unmapped controllers are
    /// ignored.
    pub fn apply(&mut self, packet: &MidiPacket) -> Option<ControlEvent> {
        let cc = packet.as_control_change()?;
        if cc.channel != self.channel {
            return None;
        }

        let axis = if cc.controller == self.volume_cc {
            self.volume = cc.value;
            Axis::Volume
        } else if cc.controller == self.balance_cc {
            self.balance = cc.value;
            Axis::Balance
        } else {
            return None;
        };

        Some(ControlEvent {
            axis,
            controller: cc.controller,
            value: cc.value,
        })
    }

    /// Apply a block's messages in arrival order.
    ///
    /// `observe` sees every accepted event. Returns whether any axis moved.
    pub fn apply_all<I, F>(&mut self, packets: I, mut observe: F) -> bool
    where
        I: IntoIterator<Item = MidiPacket>,
        F: FnMut(&ControlEvent),
    {
        let mut changed = false;
        for packet in packets {
            if let Some(event) = self.apply(&packet) {
                observe(&event);
                changed = true;
            }
        }
        changed
    }

    /// Resolve gain factors.
    ///
    /// Recomputes when `changed` is set or nothing has been computed yet.
    /// Returns the new factors when a recompute happened.
    pub fn resolve(&mut self, tables: &CurveTables, changed: bool) -> Option<GainFactors> {
        if !changed && matches!(self.state, GainState::Computed(_)) {
            return None;
        }

        let volume = tables.volume(self.volume);
        let (left, right) = tables.balance(self.balance);
        let factors = GainFactors {
            left: (volume * left * self.gain) as f32,
            right: (volume * right * self.gain) as f32,
        };

        self.state = GainState::Computed(factors);
        Some(factors)
    }
}
