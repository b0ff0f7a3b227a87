//! Capability contracts for VoxKit
//!
//! Defines the three flat capability-facing roles: handlers receive
//! directives, listeners receive domain events, observers receive generic
//! lifecycle status. Concrete agents live in `voxkit-client`.

pub mod error;
pub mod handler;
pub mod listener;
pub mod notify;
pub mod observer;
pub mod types;

pub use error::{CapabilityError, CapabilityResult};
pub use handler::CapabilityHandler;
pub use listener::CapabilityListener;
pub use notify::ListenerSet;
pub use observer::{CapabilityObserver, CapabilitySignal};
pub use types::{CapabilityEvent, CapabilityKind, Directive};
