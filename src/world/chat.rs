//! Proximity chat engine
//!
//! Owns the per-connection fixed-window rate limit table and message
//! sanitization. The hub decides who receives a composed message; this
//! module only decides whether a message may be sent and what its final
//! text is. Windows are cleared on disconnect.

use rand::Rng;
use std::collections::HashMap;
use uuid::Uuid;

use crate::world::registry::PlazaPlayer;
use crate::ws::protocol::ProximityMessage;

/// Tunables for the chat engine
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Accepted messages per window, per connection
    pub max_per_window: u32,
    /// Fixed window length. Resets when the window expires, not sliding.
    pub window_ms: u64,
    /// Maximum message length after trimming, in chars
    pub max_len: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_per_window: 5,
            window_ms: 1_000,
            max_len: 200,
        }
    }
}

/// Per-connection fixed-window counter
#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    reset_at_ms: u64,
}

/// Outcome of a compose attempt
#[derive(Debug)]
pub enum ChatOutcome {
    /// Deliverable message: echo to the sender, fan out to neighbors
    Message(ProximityMessage),
    /// Over the per-window cap; surfaced to the sender only
    RateLimited,
    /// Nothing left after sanitization; silent no-op
    Empty,
}

/// The chat engine
pub struct ChatEngine {
    cfg: ChatConfig,
    windows: HashMap<Uuid, RateLimitWindow>,
}

impl ChatEngine {
    pub fn new(cfg: ChatConfig) -> Self {
        Self {
            cfg,
            windows: HashMap::new(),
        }
    }

    /// Rate-limit, sanitize, and build a message from `sender`.
    ///
    /// The rate limit is checked before sanitization, so empty messages
    /// still consume window budget (matching the cap on send attempts,
    /// not on deliveries).
    pub fn compose(&mut self, sender: &PlazaPlayer, raw: &str, now_ms: u64) -> ChatOutcome {
        if !self.allow(sender.id, now_ms) {
            return ChatOutcome::RateLimited;
        }

        let Some(text) = sanitize(raw, self.cfg.max_len) else {
            return ChatOutcome::Empty;
        };

        ChatOutcome::Message(ProximityMessage {
            id: message_id(now_ms),
            sender_id: sender.id,
            nickname: sender.nickname.clone(),
            avatar: sender.avatar.clone(),
            message: text,
            x: sender.x,
            y: sender.y,
            timestamp: now_ms,
        })
    }

    /// Drop rate-limit state for a departed connection
    pub fn forget(&mut self, conn_id: Uuid) {
        self.windows.remove(&conn_id);
    }

    /// Fixed-window check: count resets when the window has expired
    fn allow(&mut self, conn_id: Uuid, now_ms: u64) -> bool {
        let window = self.windows.entry(conn_id).or_insert(RateLimitWindow {
            count: 0,
            reset_at_ms: now_ms + self.cfg.window_ms,
        });

        if now_ms > window.reset_at_ms {
            window.count = 0;
            window.reset_at_ms = now_ms + self.cfg.window_ms;
        }

        window.count += 1;
        window.count <= self.cfg.max_per_window
    }
}

/// Trim, truncate, and escape. Returns `None` when nothing remains.
fn sanitize(raw: &str, max_len: usize) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let truncated: String = trimmed.chars().take(max_len).collect();

    // The only injection defense: no downstream layer strips HTML
    let mut escaped = String::with_capacity(truncated.len());
    for c in truncated.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }

    Some(escaped)
}

/// Time+random composite id. Collision-resistant enough for client-side
/// display ordering, nothing more.
fn message_id(now_ms: u64) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}-{:08x}", now_ms, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> PlazaPlayer {
        PlazaPlayer {
            id: Uuid::new_v4(),
            user_id: Some("u-1".to_string()),
            nickname: "alice".to_string(),
            avatar: "cat".to_string(),
            x: 12.0,
            y: 34.0,
            last_update_ms: 0,
        }
    }

    fn engine() -> ChatEngine {
        ChatEngine::new(ChatConfig::default())
    }

    #[test]
    fn sixth_message_in_window_is_rate_limited() {
        let mut chat = engine();
        let p = sender();

        for i in 0..5 {
            let out = chat.compose(&p, "hello", 1_000 + i);
            assert!(matches!(out, ChatOutcome::Message(_)), "message {} blocked", i);
        }
        assert!(matches!(chat.compose(&p, "hello", 1_500), ChatOutcome::RateLimited));
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let mut chat = engine();
        let p = sender();

        for _ in 0..6 {
            chat.compose(&p, "hi", 1_000);
        }
        // First compose at 1_000 opened the window until 2_000
        assert!(matches!(chat.compose(&p, "hi", 2_001), ChatOutcome::Message(_)));
    }

    #[test]
    fn forget_clears_the_window() {
        let mut chat = engine();
        let p = sender();

        for _ in 0..6 {
            chat.compose(&p, "hi", 1_000);
        }
        chat.forget(p.id);
        assert!(matches!(chat.compose(&p, "hi", 1_001), ChatOutcome::Message(_)));
    }

    #[test]
    fn markup_is_escaped() {
        let mut chat = engine();
        let p = sender();

        match chat.compose(&p, r#"<script>alert("x")</script>"#, 1_000) {
            ChatOutcome::Message(msg) => {
                assert_eq!(msg.message, "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;");
            }
            other => panic!("wrong outcome: {:?}", other),
        }
    }

    #[test]
    fn whitespace_only_message_is_a_silent_noop() {
        let mut chat = engine();
        let p = sender();
        assert!(matches!(chat.compose(&p, "   \n\t  ", 1_000), ChatOutcome::Empty));
    }

    #[test]
    fn long_message_is_truncated_before_escaping() {
        let mut chat = engine();
        let p = sender();
        let raw = "a".repeat(300);

        match chat.compose(&p, &raw, 1_000) {
            ChatOutcome::Message(msg) => assert_eq!(msg.message.chars().count(), 200),
            other => panic!("wrong outcome: {:?}", other),
        }
    }

    #[test]
    fn message_snapshots_sender_position_and_identity() {
        let mut chat = engine();
        let p = sender();

        match chat.compose(&p, "over here", 5_000) {
            ChatOutcome::Message(msg) => {
                assert_eq!(msg.sender_id, p.id);
                assert_eq!(msg.nickname, "alice");
                assert_eq!(msg.x, 12.0);
                assert_eq!(msg.y, 34.0);
                assert_eq!(msg.timestamp, 5_000);
                assert!(msg.id.starts_with("5000-"));
            }
            other => panic!("wrong outcome: {:?}", other),
        }
    }
}
