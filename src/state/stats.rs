//! Keep-alive statistics.
//!
//! Provides atomic counters for the uptime sidecar. Constructed once in
//! `main` and handed to the HTTP server; nothing else reads it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// User-Agent fragments identifying external uptime monitors.
const MONITOR_AGENTS: [&str; 4] = ["uptimerobot", "pingdom", "monitor", "uptime"];

/// Uptime and ping counters.
///
/// All counters use relaxed ordering. Exact consistency is not required for
/// statistics.
#[derive(Debug)]
pub struct UptimeStats {
    started_at: DateTime<Utc>,
    started: Instant,
    ping_count: AtomicU64,
    external_pings: AtomicU64,
    uptime_checks: AtomicU64,
    last_ping: Mutex<DateTime<Utc>>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_pings: u64,
    pub external_pings: u64,
    pub uptime_checks: u64,
    pub last_ping: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
}

impl UptimeStats {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            started: Instant::now(),
            ping_count: AtomicU64::new(0),
            external_pings: AtomicU64::new(0),
            uptime_checks: AtomicU64::new(0),
            last_ping: Mutex::new(now),
        }
    }

    /// Record a `/ping` hit. Returns the new total ping count.
    pub fn record_ping(&self, user_agent: Option<&str>) -> u64 {
        *self.last_ping.lock() = Utc::now();
        if user_agent.is_some_and(is_external_monitor) {
            self.external_pings.fetch_add(1, Ordering::Relaxed);
        }
        self.ping_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record an `/uptime` query.
    pub fn record_uptime_check(&self) {
        self.uptime_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_pings: self.ping_count.load(Ordering::Relaxed),
            external_pings: self.external_pings.load(Ordering::Relaxed),
            uptime_checks: self.uptime_checks.load(Ordering::Relaxed),
            last_ping: *self.last_ping.lock(),
            start_time: self.started_at,
        }
    }
}

impl Default for UptimeStats {
    fn default() -> Self {
        Self::new()
    }
}

fn is_external_monitor(user_agent: &str) -> bool {
    let agent = user_agent.to_ascii_lowercase();
    MONITOR_AGENTS.iter().any(|m| agent.contains(m))
}

/// Format seconds as `1d 2h 3m`.
pub fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let days = hours / 24;
    format!("{}d {}h {}m", days, hours % 24, (seconds % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_counting() {
        let stats = UptimeStats::new();
        assert_eq!(stats.record_ping(Some("curl/8.0")), 1);
        assert_eq!(stats.record_ping(Some("UptimeRobot/2.0")), 2);
        assert_eq!(stats.record_ping(None), 3);

        let snap = stats.snapshot();
        assert_eq!(snap.total_pings, 3);
        assert_eq!(snap.external_pings, 1);
        assert!(snap.last_ping >= snap.start_time);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0), "0d 0h 0m");
        assert_eq!(format_uptime(90_061), "1d 1h 1m");
    }
}
