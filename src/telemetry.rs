//! Telemetry utilities for workflow timing and span construction.

use std::time::Instant;

/// Guard for timing a moderation workflow and recording its duration.
///
/// Records latency when dropped, so early returns are measured too.
pub struct ActionTimer {
    action: &'static str,
    start: Instant,
}

impl ActionTimer {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            start: Instant::now(),
        }
    }
}

impl Drop for ActionTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_duration(self.action, duration);
    }
}

/// Standardized span constructors for moderation workflows.
pub mod spans {
    use tracing::{Span, info_span};

    pub fn lock_workflow(thread: u64, actor: &str) -> Span {
        info_span!("lock_workflow", thread = thread, actor = %actor)
    }

    pub fn confirmation(thread: u64, owner: u64) -> Span {
        info_span!("confirmation", thread = thread, owner = owner)
    }

    pub fn auto_delete(thread: u64, guild: &str) -> Span {
        info_span!("auto_delete", thread = thread, guild = %guild)
    }

    pub fn command(name: &str, actor: &str) -> Span {
        info_span!("command", name = %name, actor = %actor)
    }
}
