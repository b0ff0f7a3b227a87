//! No-operation drivers for every category
//!
//! Useful as test backends and as fallbacks on systems with no audio
//! hardware: every request completes instantly with the expected status,
//! no bytes ever reach a device.

use crate::driver::{
    AudioProperty, DecoderDriver, DriverCategory, DriverDescriptor, DriverOps, MediaSource,
    PcmDriver, PlayerDriver, RecorderDriver,
};
use crate::error::{MediaError, MediaResult};
use crate::pcm::PcmStream;
use crate::recorder::{AudioFrame, FrameSink};
use crate::registry::DriverRegistry;
use crate::signal::{DriverSink, MediaEvent, PlaybackState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Player backend that plays nothing and completes everything.
#[derive(Debug, Default)]
pub struct NullPlayerDriver {
    duration_ms: Option<u64>,
}

impl NullPlayerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend every source has this duration.
    pub fn with_duration(duration_ms: u64) -> Self {
        Self {
            duration_ms: Some(duration_ms),
        }
    }
}

impl PlayerDriver for NullPlayerDriver {
    fn open(&self, _source: &MediaSource, sink: &DriverSink) -> MediaResult<()> {
        if let Some(duration_ms) = self.duration_ms {
            sink.emit_duration(duration_ms);
        }
        sink.emit_event(MediaEvent::Loaded);
        Ok(())
    }

    fn start(&self, sink: &DriverSink) -> MediaResult<()> {
        sink.emit_status(PlaybackState::Playing);
        Ok(())
    }

    fn stop(&self, sink: &DriverSink) -> MediaResult<()> {
        sink.emit_status(PlaybackState::Stopped);
        Ok(())
    }

    fn pause(&self, sink: &DriverSink) -> MediaResult<()> {
        sink.emit_status(PlaybackState::Paused);
        Ok(())
    }

    fn resume(&self, sink: &DriverSink) -> MediaResult<()> {
        sink.emit_status(PlaybackState::Playing);
        Ok(())
    }

    fn seek(&self, sink: &DriverSink, position_ms: u64) -> MediaResult<()> {
        sink.emit_position(position_ms);
        Ok(())
    }

    fn close(&self, _instance: u64) {}
}

/// Pcm backend that drains pushed bytes into the void.
#[derive(Debug, Default)]
pub struct NullPcmDriver;

impl NullPcmDriver {
    pub fn new() -> Self {
        Self
    }

    fn drain(stream: &PcmStream) {
        let mut scratch = [0u8; 4096];
        while stream.read(&mut scratch) > 0 {}
    }
}

impl PcmDriver for NullPcmDriver {
    fn open(
        &self,
        _property: &AudioProperty,
        _stream: &PcmStream,
        _sink: &DriverSink,
    ) -> MediaResult<()> {
        Ok(())
    }

    fn start(&self, stream: &PcmStream, sink: &DriverSink) -> MediaResult<()> {
        Self::drain(stream);
        sink.emit_status(PlaybackState::Playing);
        Ok(())
    }

    fn stop(&self, sink: &DriverSink) -> MediaResult<()> {
        sink.emit_status(PlaybackState::Stopped);
        Ok(())
    }

    fn pause(&self, sink: &DriverSink) -> MediaResult<()> {
        sink.emit_status(PlaybackState::Paused);
        Ok(())
    }

    fn resume(&self, stream: &PcmStream, sink: &DriverSink) -> MediaResult<()> {
        Self::drain(stream);
        sink.emit_status(PlaybackState::Playing);
        Ok(())
    }

    fn notify_data(&self, stream: &PcmStream, sink: &DriverSink) {
        Self::drain(stream);
        if stream.eof() {
            sink.emit_event(MediaEvent::EndOfStream);
        }
    }

    fn close(&self, _instance: u64) {}
}

/// Recorder backend that captures silence.
#[derive(Default)]
pub struct NullRecorderDriver {
    /// Zero-frames pushed per start, for pipelines that need data flowing.
    frames_on_start: usize,
    sessions: Mutex<HashMap<u64, (AudioProperty, FrameSink)>>,
}

impl NullRecorderDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frames(frames_on_start: usize) -> Self {
        Self {
            frames_on_start,
            ..Self::default()
        }
    }
}

impl RecorderDriver for NullRecorderDriver {
    fn open(
        &self,
        property: &AudioProperty,
        frames: &FrameSink,
        sink: &DriverSink,
    ) -> MediaResult<()> {
        self.sessions
            .lock()
            .insert(sink.instance(), (*property, frames.clone()));
        Ok(())
    }

    fn start(&self, sink: &DriverSink) -> MediaResult<()> {
        let session = self.sessions.lock().get(&sink.instance()).cloned();
        let (property, frames) = session.ok_or_else(|| {
            MediaError::Driver(format!("recorder instance {} not open", sink.instance()))
        })?;
        sink.emit_status(PlaybackState::Playing);
        for _ in 0..self.frames_on_start {
            frames.push(AudioFrame {
                samples: vec![0i16; 160],
                sample_rate: property.sample_rate,
                channels: property.channels,
            });
        }
        Ok(())
    }

    fn stop(&self, sink: &DriverSink) -> MediaResult<()> {
        sink.emit_status(PlaybackState::Stopped);
        Ok(())
    }

    fn close(&self, instance: u64) {
        self.sessions.lock().remove(&instance);
    }
}

/// Decoder backend that passes input through untouched.
#[derive(Debug, Default)]
pub struct NullDecoderDriver;

impl NullDecoderDriver {
    pub fn new() -> Self {
        Self
    }
}

impl DecoderDriver for NullDecoderDriver {
    fn decode(&self, _instance: u64, input: &[u8]) -> MediaResult<Vec<u8>> {
        Ok(input.to_vec())
    }
}

/// Register a null driver for every category, named "null". Intended for
/// tests and headless deployments; real plugins registered afterwards with
/// the default flag take over.
pub fn register_null_drivers(registry: &DriverRegistry) -> MediaResult<()> {
    registry.register(
        DriverDescriptor::new("null", DriverCategory::Player),
        DriverOps::Player(Arc::new(NullPlayerDriver::new())),
    )?;
    registry.register(
        DriverDescriptor::new("null", DriverCategory::Pcm),
        DriverOps::Pcm(Arc::new(NullPcmDriver::new())),
    )?;
    registry.register(
        DriverDescriptor::new("null", DriverCategory::Recorder),
        DriverOps::Recorder(Arc::new(NullRecorderDriver::new())),
    )?;
    registry.register(
        DriverDescriptor::new("null", DriverCategory::Decoder),
        DriverOps::Decoder(Arc::new(NullDecoderDriver::new())),
    )?;
    Ok(())
}
