//! Driver plugin contracts
//!
//! Any hardware/codec backend implements one of these traits and is
//! registered with the [`DriverRegistry`](crate::registry::DriverRegistry)
//! under a descriptor. The engines never assume anything about a backend
//! beyond the trait surface: requests must not block the caller, and
//! completions are reported through the [`DriverSink`] handed in with each
//! request.

use crate::error::MediaResult;
use crate::pcm::PcmStream;
use crate::recorder::FrameSink;
use crate::signal::DriverSink;
use std::fmt;

/// The four pluggable backend categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverCategory {
    Decoder,
    Pcm,
    Player,
    Recorder,
}

impl DriverCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverCategory::Decoder => "decoder",
            DriverCategory::Pcm => "pcm",
            DriverCategory::Player => "player",
            DriverCategory::Recorder => "recorder",
        }
    }
}

impl fmt::Display for DriverCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata a plugin supplies when registering a driver.
#[derive(Debug, Clone)]
pub struct DriverDescriptor {
    /// Unique within its category (e.g. "gstreamer", "alsa")
    pub name: String,
    pub category: DriverCategory,
    pub version: String,
    /// Marks this driver as the category default, replacing any prior
    /// default atomically. The first driver registered for a category
    /// becomes the default regardless.
    pub default_driver: bool,
}

impl DriverDescriptor {
    pub fn new(name: impl Into<String>, category: DriverCategory) -> Self {
        Self {
            name: name.into(),
            category,
            version: "0.1.0".into(),
            default_driver: false,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn as_default(mut self) -> Self {
        self.default_driver = true;
        self
    }
}

/// A playback source bound to a player instance.
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub uri: String,
    /// Explicit driver selection; `None` uses the configured or registered
    /// default for the category.
    pub preferred_driver: Option<String>,
}

impl MediaSource {
    pub fn url(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            preferred_driver: None,
        }
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.preferred_driver = Some(driver.into());
        self
    }
}

/// Raw sample format of a pcm/recorder stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    S16Le,
    S32Le,
    F32Le,
}

/// Stream properties negotiated with pcm and recorder backends.
#[derive(Debug, Clone, Copy)]
pub struct AudioProperty {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
}

impl Default for AudioProperty {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            channels: 1,
            format: SampleFormat::S16Le,
        }
    }
}

/// Media playback backend (URI/stream sources with transport control).
///
/// Every request receives the sink minted for it; the backend keeps the
/// sink of the operation it is completing and emits through it from its own
/// threads. Requests must return quickly — queue and go.
pub trait PlayerDriver: Send + Sync {
    /// Whether this backend can play the source. Consulted at bind time.
    fn accepts(&self, source: &MediaSource) -> bool {
        let _ = source;
        true
    }

    /// Bind a source. Expected follow-ups: `Loaded` or `LoadFailed` event,
    /// and a duration report once known.
    fn open(&self, source: &MediaSource, sink: &DriverSink) -> MediaResult<()>;

    /// Begin playback; complete with a `Playing` status.
    fn start(&self, sink: &DriverSink) -> MediaResult<()>;

    /// Halt playback; complete with a `Stopped` status.
    fn stop(&self, sink: &DriverSink) -> MediaResult<()>;

    /// Complete with a `Paused` status.
    fn pause(&self, sink: &DriverSink) -> MediaResult<()>;

    /// Complete with a `Playing` status.
    fn resume(&self, sink: &DriverSink) -> MediaResult<()>;

    /// Jump to `position_ms`; report the new position when applied.
    fn seek(&self, sink: &DriverSink, position_ms: u64) -> MediaResult<()>;

    /// Apply an output volume in [0, 100]. Best effort.
    fn set_volume(&self, sink: &DriverSink, volume: i32) -> MediaResult<()> {
        let _ = (sink, volume);
        Ok(())
    }

    /// Release everything held for this instance.
    fn close(&self, instance: u64);
}

/// PCM sink backend: drains a byte stream pushed by the client (TTS audio
/// attachments) into the hardware output.
pub trait PcmDriver: Send + Sync {
    /// Prepare an output stream with the given properties. `stream` is the
    /// backend's read handle onto the channel buffer.
    fn open(
        &self,
        property: &AudioProperty,
        stream: &PcmStream,
        sink: &DriverSink,
    ) -> MediaResult<()>;

    fn start(&self, stream: &PcmStream, sink: &DriverSink) -> MediaResult<()>;

    fn stop(&self, sink: &DriverSink) -> MediaResult<()>;

    fn pause(&self, sink: &DriverSink) -> MediaResult<()>;

    fn resume(&self, stream: &PcmStream, sink: &DriverSink) -> MediaResult<()>;

    /// Called after new bytes were pushed. Pull-based backends may ignore.
    fn notify_data(&self, stream: &PcmStream, sink: &DriverSink) {
        let _ = (stream, sink);
    }

    fn set_volume(&self, sink: &DriverSink, volume: i32) -> MediaResult<()> {
        let _ = (sink, volume);
        Ok(())
    }

    fn close(&self, instance: u64);
}

/// Opaque codec backend. Internals are the plugin's business.
pub trait DecoderDriver: Send + Sync {
    fn decode(&self, instance: u64, input: &[u8]) -> MediaResult<Vec<u8>>;

    fn close(&self, instance: u64) {
        let _ = instance;
    }
}

/// Capture backend feeding PCM frames to the ASR pipeline.
pub trait RecorderDriver: Send + Sync {
    /// Prepare a capture stream. Captured frames go through `frames`;
    /// lifecycle status through `sink`.
    fn open(
        &self,
        property: &AudioProperty,
        frames: &FrameSink,
        sink: &DriverSink,
    ) -> MediaResult<()>;

    /// Begin capturing; complete with a `Playing` status.
    fn start(&self, sink: &DriverSink) -> MediaResult<()>;

    /// Halt capturing; complete with a `Stopped` status.
    fn stop(&self, sink: &DriverSink) -> MediaResult<()>;

    fn close(&self, instance: u64);
}

/// The registered operation object, tagged by category.
#[derive(Clone)]
pub enum DriverOps {
    Decoder(std::sync::Arc<dyn DecoderDriver>),
    Pcm(std::sync::Arc<dyn PcmDriver>),
    Player(std::sync::Arc<dyn PlayerDriver>),
    Recorder(std::sync::Arc<dyn RecorderDriver>),
}

impl DriverOps {
    pub fn category(&self) -> DriverCategory {
        match self {
            DriverOps::Decoder(_) => DriverCategory::Decoder,
            DriverOps::Pcm(_) => DriverCategory::Pcm,
            DriverOps::Player(_) => DriverCategory::Player,
            DriverOps::Recorder(_) => DriverCategory::Recorder,
        }
    }
}
