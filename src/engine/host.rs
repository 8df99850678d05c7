//! Real-time audio host using cpal
//!
//! Input audio and MIDI reach the output callback through `rtrb` ring
//! buffers. The output callback owns the [`Engine`] and is the only place
//! it is touched while streams run. Nothing in the callbacks locks or
//! allocates; status goes back to the main thread as [`Notice`]s.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use log::{debug, error, info, trace, warn};
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::control::{Axis, ControlEvent, GainFactors};
use super::midi::{MidiListener, MidiPacket, MidiSink, MIDI_QUEUE_CAPACITY};
use super::Engine;
use crate::config::HostConfig;

/// Frames processed per engine call; longer callbacks are split
const MAX_BLOCK_FRAMES: usize = 4096;

/// Silent frames queued ahead of the first input so the output does not
/// start in underrun. Also the backlog the renderer falls back to.
const PREFILL_FRAMES: usize = 1024;

/// Backlog above which the oldest input frames are skipped
const HIGH_WATER_FRAMES: usize = PREFILL_FRAMES + PREFILL_FRAMES / 2;

/// Capacity of the input frame ring
const FRAME_QUEUE_CAPACITY: usize = 2 * PREFILL_FRAMES;

/// Capacity of the notice ring back to the main thread
const NOTICE_QUEUE_CAPACITY: usize = 256;

/// Status reported from the audio callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notice {
    /// A control change moved an axis
    Control(ControlEvent),
    /// Gain factors were recomputed
    Gain {
        volume: u8,
        balance: u8,
        factors: GainFactors,
    },
}

impl Notice {
    /// Log this notice at the level matching its verbosity
    pub fn log(&self) {
        match self {
            Notice::Control(event) => {
                let axis = match event.axis {
                    Axis::Volume => "volume",
                    Axis::Balance => "balance",
                };
                trace!("Control event: cc {:02x} ({}) = {:02x}", event.controller, axis, event.value);
            }
            Notice::Gain {
                volume,
                balance,
                factors,
            } => {
                debug!(
                    "Vol: {:3}, PanStep: {:3} => {:.6}/{:.6}",
                    volume, balance, factors.left, factors.right
                );
            }
        }
    }
}

/// Messages lost to full rings since the last check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub midi: usize,
    pub notices: usize,
}

/// Main-thread end of the notice ring
pub struct NoticeReceiver {
    queue: Consumer<Notice>,
}

impl NoticeReceiver {
    /// Hand every pending notice to `f`; returns how many were drained
    pub fn drain<F: FnMut(Notice)>(&mut self, mut f: F) -> usize {
        let mut count = 0;
        while let Ok(notice) = self.queue.pop() {
            f(notice);
            count += 1;
        }
        count
    }
}

/// Output-callback state: the engine plus preallocated scratch buffers
struct Renderer {
    engine: Engine,
    midi: Consumer<MidiPacket>,
    frames: Consumer<[f32; 2]>,
    notices: Producer<Notice>,
    notices_dropped: Arc<AtomicUsize>,
    channels: usize,
    in_left: Vec<f32>,
    in_right: Vec<f32>,
    out_left: Vec<f32>,
    out_right: Vec<f32>,
}

impl Renderer {
    fn new(
        engine: Engine,
        midi: Consumer<MidiPacket>,
        frames: Consumer<[f32; 2]>,
        notices: Producer<Notice>,
        notices_dropped: Arc<AtomicUsize>,
        channels: usize,
    ) -> Self {
        Self {
            engine,
            midi,
            frames,
            notices,
            notices_dropped,
            channels: channels.max(1),
            in_left: vec![0.0; MAX_BLOCK_FRAMES],
            in_right: vec![0.0; MAX_BLOCK_FRAMES],
            out_left: vec![0.0; MAX_BLOCK_FRAMES],
            out_right: vec![0.0; MAX_BLOCK_FRAMES],
        }
    }

    /// Render one interleaved output buffer
    fn render<T: Sample + FromSample<f32>>(&mut self, data: &mut [T]) {
        let channels = self.channels;
        let Self {
            engine,
            midi,
            frames,
            notices,
            notices_dropped,
            in_left,
            in_right,
            out_left,
            out_right,
            ..
        } = self;

        // Input running ahead of output: drop the oldest frames so latency
        // stays bounded
        let backlog = frames.slots();
        if backlog > HIGH_WATER_FRAMES {
            if let Ok(stale) = frames.read_chunk(backlog - PREFILL_FRAMES) {
                stale.commit_all();
            }
        }

        for chunk in data.chunks_mut(channels * MAX_BLOCK_FRAMES) {
            let n = chunk.len() / channels;

            for i in 0..n {
                // Underrun plays silence
                let [left, right] = frames.pop().unwrap_or([0.0; 2]);
                in_left[i] = left;
                in_right[i] = right;
            }

            let recomputed = engine.process_block_observed(
                std::iter::from_fn(|| midi.pop().ok()),
                [&in_left[..n], &in_right[..n]],
                [&mut out_left[..n], &mut out_right[..n]],
                |event| {
                    if notices.push(Notice::Control(*event)).is_err() {
                        notices_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                },
            );

            if let Some(factors) = recomputed {
                let notice = Notice::Gain {
                    volume: engine.control().volume(),
                    balance: engine.control().balance(),
                    factors,
                };
                if notices.push(notice).is_err() {
                    notices_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }

            for (i, frame) in chunk.chunks_exact_mut(channels).enumerate() {
                for (ch, sample) in frame.iter_mut().enumerate() {
                    let value = match ch {
                        0 => out_left[i],
                        1 => out_right[i],
                        _ => 0.0,
                    };
                    *sample = T::from_sample(value);
                }
            }
        }
    }
}

/// Push interleaved input frames into the frame ring.
///
/// A mono input feeds both channels; channels past the second are
/// ignored. Frames are dropped while the ring is full.
fn capture<T>(queue: &mut Producer<[f32; 2]>, data: &[T], channels: usize)
where
    T: Sample,
    f32: FromSample<T>,
{
    for frame in data.chunks_exact(channels.max(1)) {
        let left = frame[0].to_sample::<f32>();
        let right = frame.get(1).map(|s| s.to_sample::<f32>()).unwrap_or(left);
        if queue.push([left, right]).is_err() {
            break;
        }
    }
}

/// Running audio and MIDI connections
pub struct Host {
    _input: Stream,
    _output: Stream,
    midi: MidiListener,
    failed: Arc<AtomicBool>,
    midi_dropped: Arc<AtomicUsize>,
    notices_dropped: Arc<AtomicUsize>,
    sample_rate: u32,
}

impl Host {
    /// Open devices, hand the engine to the output callback and start
    /// streaming.
    pub fn start(engine: Engine, config: &HostConfig) -> Result<(Self, NoticeReceiver)> {
        let host = audio_host()?;
        info!("Using audio host: {}", host.id().name());

        let output_device = find_device(&host, config.output_device.as_deref(), false)?;
        let input_device = find_device(&host, config.input_device.as_deref(), true)?;

        let output_config = output_device
            .default_output_config()
            .context("failed to query output device configuration")?;
        let input_defaults = input_device
            .default_input_config()
            .context("failed to query input device configuration")?;

        let sample_rate = output_config.sample_rate();
        if input_defaults.sample_rate() != sample_rate {
            warn!(
                "Input device runs at {} Hz, requesting {} Hz to match output",
                input_defaults.sample_rate().0,
                sample_rate.0
            );
        }

        let output_format = output_config.sample_format();
        let output_stream_config: StreamConfig = output_config.into();
        if output_stream_config.channels < 2 {
            warn!("Output device has a single channel, only the left signal is played");
        }

        let input_format = input_defaults.sample_format();
        let input_stream_config = StreamConfig {
            channels: input_defaults.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let (midi_producer, midi_consumer) = RingBuffer::new(MIDI_QUEUE_CAPACITY);
        let (mut frame_producer, frame_consumer) = RingBuffer::new(FRAME_QUEUE_CAPACITY);
        let (notice_producer, notice_consumer) = RingBuffer::new(NOTICE_QUEUE_CAPACITY);

        for _ in 0..PREFILL_FRAMES {
            let _ = frame_producer.push([0.0; 2]);
        }

        let midi_dropped = Arc::new(AtomicUsize::new(0));
        let notices_dropped = Arc::new(AtomicUsize::new(0));

        let midi = MidiListener::connect(
            &config.client_name,
            config.midi_port.as_deref(),
            MidiSink::new(midi_producer, midi_dropped.clone()),
        )?;

        let failed = Arc::new(AtomicBool::new(false));
        let renderer = Renderer::new(
            engine,
            midi_consumer,
            frame_consumer,
            notice_producer,
            notices_dropped.clone(),
            output_stream_config.channels as usize,
        );

        let output = match output_format {
            SampleFormat::F32 => build_output_stream::<f32>(&output_device, &output_stream_config, renderer, failed.clone())?,
            SampleFormat::I16 => build_output_stream::<i16>(&output_device, &output_stream_config, renderer, failed.clone())?,
            SampleFormat::U16 => build_output_stream::<u16>(&output_device, &output_stream_config, renderer, failed.clone())?,
            other => return Err(anyhow!("Unsupported output sample format: {:?}", other)),
        };

        let input = match input_format {
            SampleFormat::F32 => build_input_stream::<f32>(&input_device, &input_stream_config, frame_producer, failed.clone())?,
            SampleFormat::I16 => build_input_stream::<i16>(&input_device, &input_stream_config, frame_producer, failed.clone())?,
            SampleFormat::U16 => build_input_stream::<u16>(&input_device, &input_stream_config, frame_producer, failed.clone())?,
            other => return Err(anyhow!("Unsupported input sample format: {:?}", other)),
        };

        input.play().context("cannot start input stream")?;
        output.play().context("cannot start output stream")?;

        info!(
            "Streaming at {} Hz ({} in / {} out channels)",
            sample_rate.0, input_stream_config.channels, output_stream_config.channels
        );

        Ok((
            Self {
                _input: input,
                _output: output,
                midi,
                failed,
                midi_dropped,
                notices_dropped,
                sample_rate: sample_rate.0,
            },
            NoticeReceiver { queue: notice_consumer },
        ))
    }

    /// Whether a stream reported a fatal error
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Take the counts of messages dropped since the last call
    pub fn take_dropped(&self) -> DropCounts {
        DropCounts {
            midi: self.midi_dropped.swap(0, Ordering::Relaxed),
            notices: self.notices_dropped.swap(0, Ordering::Relaxed),
        }
    }

    /// Stream sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Name of the MIDI input in use
    pub fn midi_port(&self) -> &str {
        self.midi.port_name()
    }
}

fn build_output_stream<T>(device: &Device, config: &StreamConfig, mut renderer: Renderer, failed: Arc<AtomicBool>) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| renderer.render(data),
            move |err| {
                error!("Audio output stream error: {}", err);
                failed.store(true, Ordering::SeqCst);
            },
            None,
        )
        .context("failed to build output stream")?;

    Ok(stream)
}

fn build_input_stream<T>(device: &Device, config: &StreamConfig, mut queue: Producer<[f32; 2]>, failed: Arc<AtomicBool>) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| capture(&mut queue, data, channels),
            move |err| {
                error!("Audio input stream error: {}", err);
                failed.store(true, Ordering::SeqCst);
            },
            None,
        )
        .context("failed to build input stream")?;

    Ok(stream)
}

#[cfg(all(feature = "jack", target_os = "linux"))]
fn audio_host() -> Result<cpal::Host> {
    cpal::host_from_id(cpal::HostId::Jack).context("Unable to connect to JACK server")
}

#[cfg(not(all(feature = "jack", target_os = "linux")))]
fn audio_host() -> Result<cpal::Host> {
    Ok(cpal::default_host())
}

fn find_device(host: &cpal::Host, name: Option<&str>, input: bool) -> Result<Device> {
    let kind = if input { "input" } else { "output" };

    match name {
        Some(name) => {
            let matches = |d: &Device| d.name().map(|n| n == name).unwrap_or(false);
            let device = if input {
                host.input_devices()?.find(matches)
            } else {
                host.output_devices()?.find(matches)
            };
            device.ok_or_else(|| anyhow!("Audio {} device '{}' not found", kind, name))
        }
        None => {
            let device = if input {
                host.default_input_device()
            } else {
                host.default_output_device()
            };
            device.ok_or_else(|| anyhow!("No {} device available", kind))
        }
    }
}

/// An audio device and its default stream settings
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// List input and output devices of the active audio host
pub fn list_audio_devices() -> Result<(Vec<AudioDeviceInfo>, Vec<AudioDeviceInfo>)> {
    let host = audio_host()?;

    let mut inputs = Vec::new();
    for device in host.input_devices()? {
        if let (Ok(name), Ok(config)) = (device.name(), device.default_input_config()) {
            inputs.push(AudioDeviceInfo {
                name,
                sample_rate: config.sample_rate().0,
                channels: config.channels(),
            });
        }
    }

    let mut outputs = Vec::new();
    for device in host.output_devices()? {
        if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
            outputs.push(AudioDeviceInfo {
                name,
                sample_rate: config.sample_rate().0,
                channels: config.channels(),
            });
        }
    }

    Ok((inputs, outputs))
}
