//! Plaza player registry and presence lifecycle
//!
//! Exclusive owner of every live plaza Connection entry: created on join,
//! mutated on position updates, destroyed on leave/disconnect/duplicate
//! eviction/idle sweep. Proximity queries are O(n) scans over live
//! connections, compared on squared distance; the square root is only taken
//! for the reported distance value. The linear scan is a scalability bound,
//! not a correctness concern, at plaza connection counts.

use std::collections::HashMap;

use uuid::Uuid;

use crate::ws::protocol::{NearbyPlayer, PlayerSnapshot};

/// Identity supplied for a joining connection, after token pinning
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Option<String>,
    pub nickname: String,
    pub avatar: String,
}

/// Tunables for the plaza world
#[derive(Debug, Clone)]
pub struct PlazaConfig {
    /// Radius for chat fan-out and `players:nearby` (world units)
    pub proximity_radius: f64,
    /// Minimum spacing between accepted position updates
    pub position_throttle_ms: u64,
    /// Entries whose last update is older than this get swept
    pub idle_timeout_ms: u64,
}

impl Default for PlazaConfig {
    fn default() -> Self {
        Self {
            proximity_radius: 300.0,
            position_throttle_ms: 50,
            idle_timeout_ms: 5 * 60 * 1000,
        }
    }
}

/// Live plaza entry (authoritative)
#[derive(Debug, Clone)]
pub struct PlazaPlayer {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub nickname: String,
    pub avatar: String,
    pub x: f64,
    pub y: f64,
    /// Set on join and on each accepted position update; drives both the
    /// throttle and the idle sweep
    pub last_update_ms: u64,
}

impl PlazaPlayer {
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            user_id: self.user_id.clone(),
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            x: self.x,
            y: self.y,
        }
    }
}

/// Result of a join: who got evicted, who joined, and the roster reply
#[derive(Debug)]
pub struct JoinResult {
    /// Other sessions removed by the duplicate-identity scan. Each one must
    /// be announced as left and have its network session terminated.
    pub evicted: Vec<PlayerSnapshot>,
    pub joined: PlayerSnapshot,
    /// Current roster for the joiner, excluding the joiner itself
    pub roster: Vec<PlayerSnapshot>,
}

/// Result of an accepted position update
#[derive(Debug)]
pub struct MoveResult {
    pub moved: PlayerSnapshot,
    /// Neighbor list delivered back to the mover
    pub nearby: Vec<NearbyPlayer>,
}

/// The plaza registry
pub struct PlazaRegistry {
    cfg: PlazaConfig,
    players: HashMap<Uuid, PlazaPlayer>,
}

impl PlazaRegistry {
    pub fn new(cfg: PlazaConfig) -> Self {
        Self {
            cfg,
            players: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, conn_id: Uuid) -> bool {
        self.players.contains_key(&conn_id)
    }

    pub fn get(&self, conn_id: Uuid) -> Option<&PlazaPlayer> {
        self.players.get(&conn_id)
    }

    /// Insert a joining connection.
    ///
    /// A previous entry for the same connection id is replaced silently
    /// (re-join on the same socket). Any OTHER entry whose external user id
    /// or nickname matches the incoming identity is evicted: duplicate tabs
    /// and stale reconnects lose to the newest session.
    pub fn join(&mut self, conn_id: Uuid, identity: Identity, x: f64, y: f64, now_ms: u64) -> JoinResult {
        self.players.remove(&conn_id);

        let nickname = normalized_nickname(&identity.nickname, conn_id);

        let duplicate_ids: Vec<Uuid> = self
            .players
            .values()
            .filter(|p| {
                let same_user = match (&identity.user_id, &p.user_id) {
                    (Some(incoming), Some(existing)) => incoming == existing,
                    _ => false,
                };
                same_user || p.nickname == nickname
            })
            .map(|p| p.id)
            .collect();

        let mut evicted = Vec::with_capacity(duplicate_ids.len());
        for id in duplicate_ids {
            if let Some(old) = self.players.remove(&id) {
                evicted.push(old.snapshot());
            }
        }

        let player = PlazaPlayer {
            id: conn_id,
            user_id: identity.user_id,
            nickname,
            avatar: identity.avatar,
            x,
            y,
            last_update_ms: now_ms,
        };
        let joined = player.snapshot();

        let roster: Vec<PlayerSnapshot> = self.players.values().map(PlazaPlayer::snapshot).collect();

        self.players.insert(conn_id, player);

        JoinResult {
            evicted,
            joined,
            roster,
        }
    }

    /// Apply a position update. Returns `None` for unknown connections and
    /// for updates arriving before the throttle interval has elapsed.
    pub fn update_position(&mut self, conn_id: Uuid, x: f64, y: f64, now_ms: u64) -> Option<MoveResult> {
        let throttle = self.cfg.position_throttle_ms;
        let player = self.players.get_mut(&conn_id)?;

        if now_ms.saturating_sub(player.last_update_ms) < throttle {
            return None;
        }

        player.x = x;
        player.y = y;
        player.last_update_ms = now_ms;
        let moved = player.snapshot();

        Some(MoveResult {
            moved,
            nearby: self.neighbors_of(conn_id),
        })
    }

    /// Remove an entry. Idempotent: absent entries return `None` and cause
    /// no broadcast upstream.
    pub fn remove(&mut self, conn_id: Uuid) -> Option<PlayerSnapshot> {
        self.players.remove(&conn_id).map(|p| p.snapshot())
    }

    /// Sweep entries whose last update is older than the idle timeout.
    /// Returns the removed snapshots so the hub can notify and announce.
    pub fn sweep_idle(&mut self, now_ms: u64) -> Vec<PlayerSnapshot> {
        let timeout = self.cfg.idle_timeout_ms;
        let stale: Vec<Uuid> = self
            .players
            .values()
            .filter(|p| now_ms.saturating_sub(p.last_update_ms) > timeout)
            .map(|p| p.id)
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.players.remove(&id))
            .map(|p| p.snapshot())
            .collect()
    }

    /// Neighbor list for one connection: everyone within the proximity
    /// radius (inclusive), with the reported distance.
    pub fn neighbors_of(&self, conn_id: Uuid) -> Vec<NearbyPlayer> {
        let Some(origin) = self.players.get(&conn_id) else {
            return Vec::new();
        };
        let radius_sq = self.cfg.proximity_radius * self.cfg.proximity_radius;

        self.players
            .values()
            .filter(|p| p.id != conn_id)
            .filter_map(|p| {
                let dx = p.x - origin.x;
                let dy = p.y - origin.y;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq <= radius_sq {
                    Some(NearbyPlayer {
                        id: p.id,
                        nickname: p.nickname.clone(),
                        avatar: p.avatar.clone(),
                        x: p.x,
                        y: p.y,
                        distance: dist_sq.sqrt(),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Connection ids within the proximity radius of `conn_id` (inclusive),
    /// excluding `conn_id` itself. No square roots taken.
    pub fn ids_within(&self, conn_id: Uuid) -> Vec<Uuid> {
        let Some(origin) = self.players.get(&conn_id) else {
            return Vec::new();
        };
        let radius_sq = self.cfg.proximity_radius * self.cfg.proximity_radius;

        self.players
            .values()
            .filter(|p| {
                if p.id == conn_id {
                    return false;
                }
                let dx = p.x - origin.x;
                let dy = p.y - origin.y;
                dx * dx + dy * dy <= radius_sq
            })
            .map(|p| p.id)
            .collect()
    }
}

/// Trimmed nickname, or a generated guest name when the client sent blank
fn normalized_nickname(raw: &str, conn_id: Uuid) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        format!("Guest_{}", &conn_id.to_string()[..8])
    } else {
        trimmed.to_string()
    }
}
