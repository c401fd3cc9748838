//! Rate limiting utilities
//!
//! Transport-level flood protection for raw inbound frames. The chat
//! engine's fixed-window limiter is separate and lives in `world::chat`;
//! this one sits in front of message parsing and silently drops floods.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Frame cap per connection. Sized well above legitimate traffic: a football
/// client streaming position at 60 Hz must pass untouched.
pub const FRAME_RATE_LIMIT: u32 = 120;

/// Per-connection frame limiter
#[derive(Clone)]
pub struct SocketRateLimiter {
    frame_limiter: Arc<Limiter>,
}

impl SocketRateLimiter {
    pub fn new() -> Self {
        Self {
            frame_limiter: create_limiter(FRAME_RATE_LIMIT),
        }
    }

    /// Check if an inbound frame is allowed (returns true if allowed)
    pub fn check_frame(&self) -> bool {
        self.frame_limiter.check().is_ok()
    }
}

impl Default for SocketRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
