//! Driver registry and media engines for VoxKit
//!
//! Hardware audio I/O goes through swappable driver backends, one trait per
//! category (decoder, pcm, player, recorder). The registry holds the
//! plugins; the player engine, pcm channel, and recorder session consume
//! them. Driver callbacks are marshaled onto engine control tasks before
//! touching any shared state.

pub mod driver;
pub mod drivers;
pub mod error;
pub mod pcm;
pub mod player;
pub mod recorder;
pub mod registry;
pub mod signal;

pub use driver::{
    AudioProperty, DecoderDriver, DriverCategory, DriverDescriptor, DriverOps, MediaSource,
    PcmDriver, PlayerDriver, RecorderDriver, SampleFormat,
};
pub use error::{MediaError, MediaResult};
pub use pcm::{PcmChannel, PcmStream};
pub use player::{PlayerEngine, PlayerSnapshot};
pub use recorder::{AudioFrame, FrameSink, RecorderSession};
pub use registry::{DriverEntry, DriverRegistry};
pub use signal::{DriverSink, MediaEvent, PlaybackState, PlayerId};
