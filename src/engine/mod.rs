//! Audio engine for Balancer
//!
//! The [`Engine`] owns the curve tables and control state. The real-time
//! callback holds it by exclusive reference and runs one
//! [`Engine::process_block`] per audio block.

mod control;
mod curves;
mod host;
mod midi;
mod scaler;

pub use control::{Axis, ControlEvent, ControlState, GainFactors, GainState};
pub use curves::{CurveTables, CENTER_BALANCE, CONTROL_STEPS, MAX_CONTROL_VALUE};
pub use host::{list_audio_devices, AudioDeviceInfo, DropCounts, Host, Notice, NoticeReceiver};
pub use midi::{list_midi_ports, ControlChange, MidiListener, MidiPacket, MAX_MIDI_MESSAGE_BYTES};
pub use scaler::{scale, scale_stereo};

use crate::config::BalancerConfig;

/// The gain engine
pub struct Engine {
    tables: CurveTables,
    control: ControlState,
}

impl Engine {
    /// Build the curve tables and set up control state
    pub fn new(config: &BalancerConfig) -> Self {
        Self {
            tables: CurveTables::build(),
            control: ControlState::new(config),
        }
    }

    /// The precomputed curves
    pub fn tables(&self) -> &CurveTables {
        &self.tables
    }

    /// Current control state
    pub fn control(&self) -> &ControlState {
        &self.control
    }

    /// Current derived gain
    pub fn gain_state(&self) -> GainState {
        self.control.gain_state()
    }

    /// Process one block, ignoring individual control events.
    ///
    /// Returns the new gain factors if they were recomputed.
    pub fn process_block<I>(&mut self, packets: I, input: [&[f32]; 2], output: [&mut [f32]; 2]) -> Option<GainFactors>
    where
        I: IntoIterator<Item = MidiPacket>,
    {
        self.process_block_observed(packets, input, output, |_| {})
    }

    /// Process one block.
    ///
    /// Applies the block's MIDI messages, resolves the gain and scales the
    /// input into the output. `observe` sees each accepted control event.
    pub fn process_block_observed<I, F>(
        &mut self,
        packets: I,
        input: [&[f32]; 2],
        output: [&mut [f32]; 2],
        observe: F,
    ) -> Option<GainFactors>
    where
        I: IntoIterator<Item = MidiPacket>,
        F: FnMut(&ControlEvent),
    {
        let changed = self.control.apply_all(packets, observe);
        let recomputed = self.control.resolve(&self.tables, changed);

        // Resolve always leaves the state computed
        if let GainState::Computed(factors) = self.control.gain_state() {
            scale_stereo(factors, input, output);
        }

        recomputed
    }
}
