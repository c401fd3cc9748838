//! Time utilities for the real-time core

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Physics tick target: ~60 Hz regardless of message volume
pub const PHYSICS_TICK_MS: u64 = 16;

/// Interval between idle-timeout sweeps of the plaza registry
pub const IDLE_SWEEP_SECS: u64 = 30;
