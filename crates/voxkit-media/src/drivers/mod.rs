//! Built-in driver implementations

pub mod null;

pub use null::{
    register_null_drivers, NullDecoderDriver, NullPcmDriver, NullPlayerDriver, NullRecorderDriver,
};
