pub mod client_metrics;

pub use client_metrics::ClientMetrics;
