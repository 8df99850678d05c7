//! Balancer - volume and balance of a stereo signal from a MIDI controller
//!
//! Control-Change messages pick entries from precomputed volume and balance
//! curves. The resulting per-channel gain is applied to every block inside
//! the real-time audio callback.

pub mod config;
pub mod engine;

pub use config::{BalancerConfig, HostConfig};
pub use engine::Engine;
