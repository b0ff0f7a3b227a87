//! Client orchestrator and built-in capability agents for VoxKit
//!
//! Ties the pieces together: inbound directives from the network seam are
//! routed to capability agents built on demand by the capability builder;
//! agent status and events fan out to local listeners and back upstream.

pub mod builder;
pub mod capabilities;
pub mod client;
pub mod error;
pub mod hub;
pub mod network;
pub mod wakeup;

pub use builder::{CapabilityBuilder, CapabilityContext, CapabilityFactory};
pub use capabilities::default_factories;
pub use client::VoxClient;
pub use error::{ClientError, ClientResult};
pub use hub::{CapabilityEmitter, CapabilityHub};
pub use network::{NetworkError, NetworkManager, NetworkManagerListener, NoopNetworkManager};
pub use wakeup::{WakeupDetectState, WakeupHandler, WakeupListener};
