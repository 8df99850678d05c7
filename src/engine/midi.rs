//! MIDI input for Balancer.
//!
//! Incoming messages are reduced to fixed-size [`MidiPacket`]s on the MIDI
//! thread and handed to the audio callback through a lock-free ring buffer.

use anyhow::{anyhow, Context, Result};
use log::info;
use midir::{Ignore, MidiInput, MidiInputConnection};
use rtrb::Producer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Largest message accepted; anything longer is dropped unread.
pub const MAX_MIDI_MESSAGE_BYTES: usize = 4096;

/// Status nibble of a Control-Change message
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Capacity of the MIDI ring buffer between the MIDI and audio threads
pub const MIDI_QUEUE_CAPACITY: usize = 1024;

/// A raw MIDI message as seen by the audio callback.
///
/// Only the first three bytes are kept; `size` records the original length
/// so the callback can still reject short and oversized messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MidiPacket {
    bytes: [u8; 3],
    size: usize,
}

impl MidiPacket {
    /// Capture a message from its raw bytes.
    pub fn from_bytes(message: &[u8]) -> Self {
        let mut bytes = [0u8; 3];
        let n = message.len().min(bytes.len());
        bytes[..n].copy_from_slice(&message[..n]);
        Self {
            bytes,
            size: message.len(),
        }
    }

    /// Control change: channel (0-15), controller (0-127), value (0-127)
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::from_bytes(&[CONTROL_CHANGE | (channel & 0x0F), controller & 0x7F, value & 0x7F])
    }

    /// Original message length in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// The retained leading bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.size.min(self.bytes.len())]
    }

    /// Decode as a Control-Change message.
    ///
    /// Returns `None` for short or oversized messages and for any other
    /// message type.
    pub fn as_control_change(&self) -> Option<ControlChange> {
        if self.size < 3 || self.size > MAX_MIDI_MESSAGE_BYTES {
            return None;
        }

        let status = self.bytes[0];
        if status & 0xF0 != CONTROL_CHANGE {
            return None;
        }

        Some(ControlChange {
            channel: status & 0x0F,
            controller: self.bytes[1],
            value: self.bytes[2] & 0x7F,
        })
    }
}

/// A decoded Control-Change message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChange {
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

/// Producer end of the MIDI ring, owned by the MIDI input callback.
///
/// With JACK the callback runs on the real-time thread, so it only pushes;
/// overflow is counted and reported from the main thread.
pub struct MidiSink {
    queue: Producer<MidiPacket>,
    dropped: Arc<AtomicUsize>,
}

impl MidiSink {
    pub fn new(queue: Producer<MidiPacket>, dropped: Arc<AtomicUsize>) -> Self {
        Self { queue, dropped }
    }
}

/// Open MIDI input feeding the audio callback.
pub struct MidiListener {
    // Dropping the connection closes the port
    _connection: MidiInputConnection<MidiSink>,
    port_name: String,
}

impl MidiListener {
    /// Connect to a MIDI input.
    ///
    /// With `port_filter`, the first port whose name contains it is used.
    /// Without, a virtual `control` port is created where the platform
    /// supports it, else the first available port is used.
    pub fn connect(client_name: &str, port_filter: Option<&str>, sink: MidiSink) -> Result<Self> {
        let mut midi_in = MidiInput::new(client_name).context("failed to create MIDI input")?;
        midi_in.ignore(Ignore::None);

        match port_filter {
            Some(filter) => Self::connect_matching(midi_in, filter, sink),
            None => Self::connect_default(midi_in, client_name, sink),
        }
    }

    /// Name of the connected or created port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn connect_matching(midi_in: MidiInput, filter: &str, sink: MidiSink) -> Result<Self> {
        let ports = midi_in.ports();
        let port = ports
            .iter()
            .find(|p| midi_in.port_name(p).map(|n| n.contains(filter)).unwrap_or(false))
            .ok_or_else(|| anyhow!("MIDI port '{}' not found", filter))?
            .clone();

        let port_name = midi_in.port_name(&port)?;
        let connection = midi_in
            .connect(&port, "control", forward_packet, sink)
            .map_err(|e| anyhow!("failed to connect to MIDI port '{}': {}", port_name, e))?;

        info!("MIDI input connected to: {}", port_name);
        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    #[cfg(unix)]
    fn connect_default(midi_in: MidiInput, client_name: &str, sink: MidiSink) -> Result<Self> {
        use midir::os::unix::VirtualInput;

        let connection = midi_in
            .create_virtual("control", forward_packet, sink)
            .map_err(|e| anyhow!("failed to create virtual MIDI port: {}", e))?;

        let port_name = format!("{}:control", client_name);
        info!("Created virtual MIDI input: {}", port_name);
        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    #[cfg(not(unix))]
    fn connect_default(midi_in: MidiInput, _client_name: &str, sink: MidiSink) -> Result<Self> {
        let ports = midi_in.ports();
        let port = ports
            .first()
            .ok_or_else(|| anyhow!("No MIDI input ports available"))?
            .clone();

        let port_name = midi_in.port_name(&port)?;
        let connection = midi_in
            .connect(&port, "control", forward_packet, sink)
            .map_err(|e| anyhow!("failed to connect to MIDI port '{}': {}", port_name, e))?;

        info!("MIDI input connected to: {}", port_name);
        Ok(Self {
            _connection: connection,
            port_name,
        })
    }
}

fn forward_packet(_timestamp: u64, message: &[u8], sink: &mut MidiSink) {
    if sink.queue.push(MidiPacket::from_bytes(message)).is_err() {
        sink.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// List available MIDI input ports.
pub fn list_midi_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("balancer-list")?;
    let ports = midi_in.ports();

    let names: Vec<String> = ports
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect();

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_change_packet() {
        let packet = MidiPacket::control_change(0, 7, 100);
        assert_eq!(packet.bytes(), &[0xB0, 7, 100]);
        assert_eq!(packet.size(), 3);
    }

    #[test]
    fn test_control_change_packet_channel() {
        let packet = MidiPacket::control_change(5, 8, 0);
        assert_eq!(packet.bytes()[0], 0xB5);
    }

    #[test]
    fn test_decode_control_change() {
        let cc = MidiPacket::from_bytes(&[0xB3, 8, 42]).as_control_change().unwrap();
        assert_eq!(
            cc,
            ControlChange {
                channel: 3,
                controller: 8,
                value: 42
            }
        );
    }

    #[test]
    fn test_decode_ignores_other_types() {
        // Note on
        assert!(MidiPacket::from_bytes(&[0x90, 60, 100]).as_control_change().is_none());
        // Pitch bend
        assert!(MidiPacket::from_bytes(&[0xE0, 0, 64]).as_control_change().is_none());
    }

    #[test]
    fn test_decode_rejects_short_message() {
        let packet = MidiPacket::from_bytes(&[0xB0, 7]);
        assert_eq!(packet.size(), 2);
        assert!(packet.as_control_change().is_none());
        assert!(MidiPacket::from_bytes(&[]).as_control_change().is_none());
    }

    #[test]
    fn test_decode_rejects_oversized_message() {
        let mut message = vec![0u8; MAX_MIDI_MESSAGE_BYTES + 1];
        message[..3].copy_from_slice(&[0xB0, 7, 0]);

        let packet = MidiPacket::from_bytes(&message);
        assert_eq!(packet.size(), 4097);
        assert!(packet.as_control_change().is_none());
    }

    #[test]
    fn test_decode_accepts_max_size_message() {
        let mut message = vec![0u8; MAX_MIDI_MESSAGE_BYTES];
        message[..3].copy_from_slice(&[0xB0, 7, 10]);

        assert!(MidiPacket::from_bytes(&message).as_control_change().is_some());
    }

    #[test]
    fn test_decode_masks_value() {
        let cc = MidiPacket::from_bytes(&[0xB0, 7, 0xFF]).as_control_change().unwrap();
        assert_eq!(cc.value, 127);
    }

    #[test]
    fn test_forward_packet_pushes_to_queue() {
        let (producer, mut consumer) = rtrb::RingBuffer::new(2);
        let dropped = Arc::new(AtomicUsize::new(0));
        let mut sink = MidiSink::new(producer, dropped.clone());

        forward_packet(0, &[0xB0, 7, 1], &mut sink);
        forward_packet(0, &[0xB0, 7, 2], &mut sink);
        assert_eq!(dropped.load(Ordering::Relaxed), 0);

        // Full: dropped and counted
        forward_packet(0, &[0xB0, 7, 3], &mut sink);
        forward_packet(0, &[0xB0, 7, 4], &mut sink);
        assert_eq!(dropped.load(Ordering::Relaxed), 2);

        assert_eq!(consumer.pop().unwrap(), MidiPacket::control_change(0, 7, 1));
        assert_eq!(consumer.pop().unwrap(), MidiPacket::control_change(0, 7, 2));
        assert!(consumer.pop().is_err());
    }
}
