use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared metrics for cross-thread client monitoring
#[derive(Clone)]
pub struct ClientMetrics {
    // Directive routing
    pub directives_dispatched: Arc<AtomicU64>,
    pub directives_unknown: Arc<AtomicU64>, // no builder for capability type
    pub directives_failed: Arc<AtomicU64>,  // handler returned an error
    pub events_emitted: Arc<AtomicU64>,
    pub events_upstream: Arc<AtomicU64>, // forwarded to the network manager

    // Player engine
    pub players_created: Arc<AtomicU64>,
    pub players_destroyed: Arc<AtomicU64>,
    pub players_live: Arc<AtomicUsize>,
    pub player_transitions: Arc<AtomicU64>,
    pub stale_signals_dropped: Arc<AtomicU64>, // generation check
    pub invalid_transitions_dropped: Arc<AtomicU64>,
    pub signal_queue_overflows: Arc<AtomicU64>,
    pub driver_errors: Arc<AtomicU64>,

    // PCM channel
    pub pcm_bytes_pushed: Arc<AtomicU64>,
    pub pcm_bytes_read: Arc<AtomicU64>,

    // Recorder
    pub recorder_frames: Arc<AtomicU64>,
    pub recorder_frames_dropped: Arc<AtomicU64>,

    // Activity
    pub last_directive_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self {
            directives_dispatched: Arc::new(AtomicU64::new(0)),
            directives_unknown: Arc::new(AtomicU64::new(0)),
            directives_failed: Arc::new(AtomicU64::new(0)),
            events_emitted: Arc::new(AtomicU64::new(0)),
            events_upstream: Arc::new(AtomicU64::new(0)),

            players_created: Arc::new(AtomicU64::new(0)),
            players_destroyed: Arc::new(AtomicU64::new(0)),
            players_live: Arc::new(AtomicUsize::new(0)),
            player_transitions: Arc::new(AtomicU64::new(0)),
            stale_signals_dropped: Arc::new(AtomicU64::new(0)),
            invalid_transitions_dropped: Arc::new(AtomicU64::new(0)),
            signal_queue_overflows: Arc::new(AtomicU64::new(0)),
            driver_errors: Arc::new(AtomicU64::new(0)),

            pcm_bytes_pushed: Arc::new(AtomicU64::new(0)),
            pcm_bytes_read: Arc::new(AtomicU64::new(0)),

            recorder_frames: Arc::new(AtomicU64::new(0)),
            recorder_frames_dropped: Arc::new(AtomicU64::new(0)),

            last_directive_time: Arc::new(RwLock::new(None)),
        }
    }
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_directive(&self) {
        self.directives_dispatched.fetch_add(1, Ordering::Relaxed);
        *self.last_directive_time.write() = Some(Instant::now());
    }

    pub fn mark_transition(&self) {
        self.player_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_stale_signal(&self) {
        self.stale_signals_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_invalid_transition(&self) {
        self.invalid_transitions_dropped
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_driver_error(&self) {
        self.driver_errors.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_shared_across_clones() {
        let metrics = ClientMetrics::new();
        let clone = metrics.clone();
        clone.mark_directive();
        clone.mark_stale_signal();
        assert_eq!(metrics.directives_dispatched.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.stale_signals_dropped.load(Ordering::Relaxed), 1);
        assert!(metrics.last_directive_time.read().is_some());
    }
}
