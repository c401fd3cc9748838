//! The hub: single owner of all real-time state
//!
//! Connection tasks translate WebSocket frames into `HubEvent`s; the hub
//! drains them and multiplexes with the physics tick and the idle sweep
//! via `tokio::select!`. Every handler runs to completion before the next
//! is dispatched, so the plaza registry, chat windows, football room, and
//! outbox table need no locks. Nothing here is fatal: bad input degrades
//! to a no-op.

pub mod outbox;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::football::{FootballConfig, FootballRoom};
use crate::util::time::{unix_millis, IDLE_SWEEP_SECS, PHYSICS_TICK_MS};
use crate::world::{ChatConfig, ChatEngine, ChatOutcome, Identity, PlazaConfig, PlazaRegistry};
use crate::ws::protocol::{ClientMsg, ServerMsg, Team};

use outbox::{OutboxTable, FOOTBALL_ROOM};

/// Identity pinned at upgrade from a verified token. When present, the
/// `player:join` payload cannot claim a different external user id.
#[derive(Debug, Clone)]
pub struct PinnedIdentity {
    pub user_id: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
}

/// Events from connection tasks to the hub
#[derive(Debug)]
pub enum HubEvent {
    /// A socket finished the upgrade handshake
    Connected {
        conn_id: Uuid,
        pinned: Option<PinnedIdentity>,
        outbox: mpsc::UnboundedSender<ServerMsg>,
    },
    /// One parsed inbound frame
    Frame { conn_id: Uuid, msg: ClientMsg },
    /// The socket closed (client close, error, or forced termination)
    Disconnected { conn_id: Uuid },
}

/// Live counters for the health endpoint
#[derive(Debug, Default)]
pub struct HubGauges {
    pub connections: AtomicUsize,
    pub plaza_players: AtomicUsize,
    pub football_players: AtomicUsize,
}

/// Hub tunables, one sub-config per component
#[derive(Debug, Clone, Default)]
pub struct HubConfig {
    pub plaza: PlazaConfig,
    pub chat: ChatConfig,
    pub football: FootballConfig,
}

/// Cloneable handle for connection tasks
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    /// Queue an event for the hub. Errors only when the hub task is gone,
    /// at which point the connection is shutting down anyway.
    pub async fn send(&self, event: HubEvent) {
        let _ = self.tx.send(event).await;
    }
}

/// The hub task state
pub struct Hub {
    plaza: PlazaRegistry,
    chat: ChatEngine,
    football: FootballRoom,
    outbox: OutboxTable,
    pinned: HashMap<Uuid, PinnedIdentity>,
    gauges: Arc<HubGauges>,
    rx: mpsc::Receiver<HubEvent>,
}

impl Hub {
    pub fn new(cfg: HubConfig, seed: u64) -> (Self, HubHandle, Arc<HubGauges>) {
        let (tx, rx) = mpsc::channel(256);
        let gauges = Arc::new(HubGauges::default());

        let hub = Self {
            plaza: PlazaRegistry::new(cfg.plaza),
            chat: ChatEngine::new(cfg.chat),
            football: FootballRoom::new(cfg.football, seed),
            outbox: OutboxTable::new(),
            pinned: HashMap::new(),
            gauges: gauges.clone(),
            rx,
        };

        (hub, HubHandle { tx }, gauges)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!("hub started");

        let mut tick = interval(Duration::from_millis(PHYSICS_TICK_MS));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep = interval(Duration::from_secs(IDLE_SWEEP_SECS));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => self.handle_event(event, unix_millis()),
                    None => break,
                },
                _ = tick.tick() => self.on_tick(unix_millis()),
                _ = sweep.tick() => self.on_sweep(unix_millis()),
            }
        }

        info!("hub stopped");
    }

    fn handle_event(&mut self, event: HubEvent, now_ms: u64) {
        match event {
            HubEvent::Connected {
                conn_id,
                pinned,
                outbox,
            } => {
                self.outbox.register(conn_id, outbox);
                if let Some(pinned) = pinned {
                    debug!(conn_id = %conn_id, user_id = %pinned.user_id, "connection pinned to identity");
                    self.pinned.insert(conn_id, pinned);
                }
            }
            HubEvent::Frame { conn_id, msg } => self.handle_frame(conn_id, msg, now_ms),
            HubEvent::Disconnected { conn_id } => self.handle_disconnect(conn_id),
        }
        self.refresh_gauges();
    }

    fn handle_frame(&mut self, conn_id: Uuid, msg: ClientMsg, now_ms: u64) {
        match msg {
            ClientMsg::PlayerJoin {
                user_id,
                nickname,
                avatar,
                x,
                y,
            } => self.handle_plaza_join(conn_id, user_id, nickname, avatar, x, y, now_ms),
            ClientMsg::PlayerPosition { x, y } => self.handle_plaza_position(conn_id, x, y, now_ms),
            ClientMsg::PlayerLeave => self.remove_from_plaza(conn_id),
            ClientMsg::ChatMessage { message } => self.handle_chat(conn_id, &message, now_ms),
            ClientMsg::FootballJoin { team } => self.handle_football_join(conn_id, team, now_ms),
            ClientMsg::FootballLeave => self.handle_football_leave(conn_id),
            ClientMsg::FootballPosition { x, y, vx, vy } => {
                if let Some(moved) = self.football.update_position(conn_id, x, y, vx, vy, now_ms) {
                    self.outbox.publish_room_except(
                        FOOTBALL_ROOM,
                        conn_id,
                        &ServerMsg::FootballPlayerMoved { player: moved },
                    );
                }
            }
            ClientMsg::FootballKick { vx, vy, spin } => {
                // Out-of-band ball sync for responsive kick feedback
                if let Some(ball) = self.football.kick(conn_id, vx, vy, spin, now_ms) {
                    self.outbox
                        .publish_room(FOOTBALL_ROOM, &ServerMsg::FootballBallUpdate { ball });
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_plaza_join(
        &mut self,
        conn_id: Uuid,
        user_id: Option<String>,
        nickname: String,
        avatar: String,
        x: f64,
        y: f64,
        now_ms: u64,
    ) {
        let identity = self.claimed_identity(conn_id, user_id, nickname, avatar);
        let result = self.plaza.join(conn_id, identity, x, y, now_ms);

        // Duplicate tabs and stale reconnects lose to the newest session:
        // announce them as left, then terminate their sockets.
        for evicted in result.evicted {
            info!(conn_id = %evicted.id, nickname = %evicted.nickname, "evicting duplicate session");
            self.chat.forget(evicted.id);
            self.outbox
                .broadcast_except(evicted.id, &ServerMsg::PlayerLeft { player: evicted.clone() });
            self.outbox.unregister(evicted.id);
        }

        info!(
            conn_id = %conn_id,
            nickname = %result.joined.nickname,
            plaza_count = self.plaza.len(),
            "player joined plaza"
        );
        self.outbox.broadcast_except(
            conn_id,
            &ServerMsg::PlayerJoined {
                player: result.joined,
            },
        );
        self.outbox.send_to(
            conn_id,
            &ServerMsg::PlayersList {
                players: result.roster,
            },
        );
    }

    fn handle_plaza_position(&mut self, conn_id: Uuid, x: f64, y: f64, now_ms: u64) {
        // None covers both unknown connections and throttled updates
        let Some(result) = self.plaza.update_position(conn_id, x, y, now_ms) else {
            return;
        };
        self.outbox.broadcast_except(
            conn_id,
            &ServerMsg::PlayerMoved {
                player: result.moved,
            },
        );
        self.outbox.send_to(
            conn_id,
            &ServerMsg::PlayersNearby {
                players: result.nearby,
            },
        );
    }

    fn handle_chat(&mut self, conn_id: Uuid, raw: &str, now_ms: u64) {
        let Some(sender) = self.plaza.get(conn_id) else {
            return;
        };

        match self.chat.compose(sender, raw, now_ms) {
            ChatOutcome::Message(message) => {
                let recipients = self.plaza.ids_within(conn_id);
                debug!(
                    conn_id = %conn_id,
                    recipient_count = recipients.len(),
                    "chat fan-out"
                );
                let msg = ServerMsg::ChatReceived { message };
                self.outbox.send_to(conn_id, &msg);
                self.outbox.send_many(&recipients, &msg);
            }
            ChatOutcome::RateLimited => {
                self.outbox.send_to(
                    conn_id,
                    &ServerMsg::ChatError {
                        reason: "rate limit exceeded".to_string(),
                    },
                );
            }
            ChatOutcome::Empty => {}
        }
    }

    fn handle_football_join(&mut self, conn_id: Uuid, team: Option<Team>, now_ms: u64) {
        let identity = self.resolve_identity(conn_id);
        let result = self.football.join(conn_id, identity, team, now_ms);

        info!(
            conn_id = %conn_id,
            team = ?result.joined.team,
            room_count = self.football.len(),
            "player joined football"
        );
        self.outbox.publish_room_except(
            FOOTBALL_ROOM,
            conn_id,
            &ServerMsg::FootballPlayerJoined {
                player: result.joined,
            },
        );
        self.outbox.join_room(FOOTBALL_ROOM, conn_id);
        self.outbox.send_to(
            conn_id,
            &ServerMsg::FootballPlayersList {
                players: result.roster,
            },
        );
        self.outbox.send_to(
            conn_id,
            &ServerMsg::FootballGameState {
                ball: result.game.ball,
                score: result.game.score,
                is_playing: result.game.is_playing,
            },
        );
    }

    fn handle_football_leave(&mut self, conn_id: Uuid) {
        self.outbox.leave_room(FOOTBALL_ROOM, conn_id);
        if let Some(left) = self.football.leave(conn_id) {
            info!(conn_id = %conn_id, room_count = self.football.len(), "player left football");
            self.outbox
                .publish_room(FOOTBALL_ROOM, &ServerMsg::FootballPlayerLeft { player: left });
        }
    }

    /// Full disconnect: plaza and football clean up independently
    fn handle_disconnect(&mut self, conn_id: Uuid) {
        self.remove_from_plaza(conn_id);
        self.handle_football_leave(conn_id);
        self.pinned.remove(&conn_id);
        self.outbox.unregister(conn_id);
        debug!(conn_id = %conn_id, "connection closed");
    }

    /// Remove from the plaza and announce. Idempotent: a second call for
    /// the same connection broadcasts nothing.
    fn remove_from_plaza(&mut self, conn_id: Uuid) {
        self.chat.forget(conn_id);
        if let Some(left) = self.plaza.remove(conn_id) {
            info!(conn_id = %conn_id, nickname = %left.nickname, plaza_count = self.plaza.len(), "player left plaza");
            self.outbox
                .broadcast_except(conn_id, &ServerMsg::PlayerLeft { player: left });
        }
    }

    fn on_tick(&mut self, now_ms: u64) {
        let out = self.football.tick(now_ms);

        if let Some(game) = out.reset {
            self.outbox.publish_room(
                FOOTBALL_ROOM,
                &ServerMsg::FootballGameState {
                    ball: game.ball,
                    score: game.score,
                    is_playing: game.is_playing,
                },
            );
        }
        if let Some(goal) = out.goal {
            info!(team = ?goal.team, red = goal.score.red, blue = goal.score.blue, "goal scored");
            self.outbox.publish_room(
                FOOTBALL_ROOM,
                &ServerMsg::FootballGoalScored {
                    team: goal.team,
                    score: goal.score,
                    last_kicker_id: goal.last_kicker_id,
                },
            );
        }
        if let Some(ball) = out.sync {
            self.outbox
                .publish_room(FOOTBALL_ROOM, &ServerMsg::FootballBallUpdate { ball });
        }
    }

    /// Idle sweep: stale plaza entries are notified, removed, and
    /// announced. The socket itself stays open; the client may rejoin.
    fn on_sweep(&mut self, now_ms: u64) {
        let swept = self.plaza.sweep_idle(now_ms);
        for player in swept {
            info!(conn_id = %player.id, nickname = %player.nickname, "idle timeout");
            self.chat.forget(player.id);
            self.outbox.send_to(player.id, &ServerMsg::ConnectionTimeout);
            self.outbox
                .broadcast_except(player.id, &ServerMsg::PlayerLeft { player: player.clone() });
        }
        self.refresh_gauges();
    }

    /// Join identity after token pinning: a pinned user id always wins
    /// over whatever the payload claims.
    fn claimed_identity(
        &self,
        conn_id: Uuid,
        user_id: Option<String>,
        nickname: String,
        avatar: String,
    ) -> Identity {
        match self.pinned.get(&conn_id) {
            Some(pinned) => Identity {
                user_id: Some(pinned.user_id.clone()),
                nickname: if nickname.trim().is_empty() {
                    pinned.nickname.clone().unwrap_or(nickname)
                } else {
                    nickname
                },
                avatar: pinned.avatar.clone().unwrap_or(avatar),
            },
            None => Identity {
                user_id,
                nickname,
                avatar,
            },
        }
    }

    /// Identity for a football join: the plaza entry if one exists, else
    /// the pinned token identity, else an anonymous guest.
    fn resolve_identity(&self, conn_id: Uuid) -> Identity {
        if let Some(player) = self.plaza.get(conn_id) {
            return Identity {
                user_id: player.user_id.clone(),
                nickname: player.nickname.clone(),
                avatar: player.avatar.clone(),
            };
        }
        match self.pinned.get(&conn_id) {
            Some(pinned) => Identity {
                user_id: Some(pinned.user_id.clone()),
                nickname: pinned
                    .nickname
                    .clone()
                    .unwrap_or_else(|| format!("Guest_{}", &conn_id.to_string()[..8])),
                avatar: pinned.avatar.clone().unwrap_or_else(|| "default".to_string()),
            },
            None => Identity {
                user_id: None,
                nickname: format!("Guest_{}", &conn_id.to_string()[..8]),
                avatar: "default".to_string(),
            },
        }
    }

    fn refresh_gauges(&self) {
        self.gauges
            .connections
            .store(self.outbox.len(), Ordering::Relaxed);
        self.gauges
            .plaza_players
            .store(self.plaza.len(), Ordering::Relaxed);
        self.gauges
            .football_players
            .store(self.football.len(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn hub() -> Hub {
        Hub::new(HubConfig::default(), 42).0
    }

    fn connect(hub: &mut Hub, now_ms: u64) -> (Uuid, UnboundedReceiver<ServerMsg>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.handle_event(
            HubEvent::Connected {
                conn_id,
                pinned: None,
                outbox: tx,
            },
            now_ms,
        );
        (conn_id, rx)
    }

    fn join_plaza(hub: &mut Hub, conn_id: Uuid, nickname: &str, x: f64, y: f64, now_ms: u64) {
        hub.handle_event(
            HubEvent::Frame {
                conn_id,
                msg: ClientMsg::PlayerJoin {
                    user_id: Some(format!("u-{}", nickname)),
                    nickname: nickname.to_string(),
                    avatar: "default".to_string(),
                    x,
                    y,
                },
            },
            now_ms,
        );
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn chat_reaches_neighbors_within_radius_only() {
        let mut hub = hub();
        let (a, mut rx_a) = connect(&mut hub, 1_000);
        let (b, mut rx_b) = connect(&mut hub, 1_000);
        let (c, mut rx_c) = connect(&mut hub, 1_000);

        join_plaza(&mut hub, a, "alice", 0.0, 0.0, 1_000);
        // Exactly on the 300-unit radius: counts as within
        join_plaza(&mut hub, b, "bob", 300.0, 0.0, 1_000);
        join_plaza(&mut hub, c, "carol", 301.0, 0.0, 1_000);
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        hub.handle_event(
            HubEvent::Frame {
                conn_id: a,
                msg: ClientMsg::ChatMessage {
                    message: "  <b>hi</b>  ".to_string(),
                },
            },
            2_000,
        );

        // Sender echo, with sanitized text
        let echoed = drain(&mut rx_a);
        assert_eq!(echoed.len(), 1);
        match &echoed[0] {
            ServerMsg::ChatReceived { message } => {
                assert_eq!(message.message, "&lt;b&gt;hi&lt;/b&gt;");
                assert_eq!(message.sender_id, a);
            }
            other => panic!("expected chat echo, got {:?}", other),
        }

        assert_eq!(drain(&mut rx_b).len(), 1);
        assert!(drain(&mut rx_c).is_empty());
    }

    #[test]
    fn sixth_chat_message_gets_error_and_no_fanout() {
        let mut hub = hub();
        let (a, mut rx_a) = connect(&mut hub, 1_000);
        let (b, mut rx_b) = connect(&mut hub, 1_000);
        join_plaza(&mut hub, a, "alice", 0.0, 0.0, 1_000);
        join_plaza(&mut hub, b, "bob", 10.0, 0.0, 1_000);
        drain(&mut rx_a);
        drain(&mut rx_b);

        for _ in 0..6 {
            hub.handle_event(
                HubEvent::Frame {
                    conn_id: a,
                    msg: ClientMsg::ChatMessage {
                        message: "spam".to_string(),
                    },
                },
                1_500,
            );
        }

        let to_sender = drain(&mut rx_a);
        assert_eq!(to_sender.len(), 6);
        assert!(matches!(to_sender[4], ServerMsg::ChatReceived { .. }));
        assert!(matches!(to_sender[5], ServerMsg::ChatError { .. }));
        // The neighbor saw only the five accepted messages
        assert_eq!(drain(&mut rx_b).len(), 5);
    }

    #[test]
    fn duplicate_join_evicts_and_terminates_old_session() {
        let mut hub = hub();
        let (old, mut rx_old) = connect(&mut hub, 1_000);
        let (observer, mut rx_obs) = connect(&mut hub, 1_000);
        join_plaza(&mut hub, old, "alice", 0.0, 0.0, 1_000);
        join_plaza(&mut hub, observer, "bob", 5.0, 0.0, 1_000);
        drain(&mut rx_old);
        drain(&mut rx_obs);

        let (new, mut rx_new) = connect(&mut hub, 2_000);
        join_plaza(&mut hub, new, "alice", 1.0, 0.0, 2_000);

        // Observer sees the eviction as a leave, then the fresh join
        let seen = drain(&mut rx_obs);
        assert!(matches!(&seen[0], ServerMsg::PlayerLeft { player } if player.id == old));
        assert!(matches!(&seen[1], ServerMsg::PlayerJoined { player } if player.id == new));

        // The losing session's outbox was dropped: forced termination
        drain(&mut rx_old);
        assert!(matches!(rx_old.try_recv(), Err(TryRecvError::Disconnected)));

        // The winner got a roster without the evicted entry
        let to_new = drain(&mut rx_new);
        match &to_new[0] {
            ServerMsg::PlayersList { players } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[0].id, observer);
            }
            other => panic!("expected roster, got {:?}", other),
        }
    }

    #[test]
    fn second_leave_broadcasts_nothing() {
        let mut hub = hub();
        let (a, mut rx_a) = connect(&mut hub, 1_000);
        let (b, mut rx_b) = connect(&mut hub, 1_000);
        join_plaza(&mut hub, a, "alice", 0.0, 0.0, 1_000);
        join_plaza(&mut hub, b, "bob", 5.0, 0.0, 1_000);
        drain(&mut rx_a);
        drain(&mut rx_b);

        hub.handle_event(
            HubEvent::Frame {
                conn_id: a,
                msg: ClientMsg::PlayerLeave,
            },
            2_000,
        );
        assert_eq!(drain(&mut rx_b).len(), 1);

        hub.handle_event(
            HubEvent::Frame {
                conn_id: a,
                msg: ClientMsg::PlayerLeave,
            },
            2_100,
        );
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn throttled_position_update_is_not_broadcast() {
        let mut hub = hub();
        let (a, mut rx_a) = connect(&mut hub, 1_000);
        let (b, mut rx_b) = connect(&mut hub, 1_000);
        join_plaza(&mut hub, a, "alice", 0.0, 0.0, 1_000);
        join_plaza(&mut hub, b, "bob", 5.0, 0.0, 1_000);
        drain(&mut rx_a);
        drain(&mut rx_b);

        let send_pos = |hub: &mut Hub, now| {
            hub.handle_event(
                HubEvent::Frame {
                    conn_id: a,
                    msg: ClientMsg::PlayerPosition { x: 1.0, y: 1.0 },
                },
                now,
            );
        };

        send_pos(&mut hub, 1_060);
        // 30 ms later: under the 50 ms throttle, silently dropped
        send_pos(&mut hub, 1_090);

        let seen = drain(&mut rx_b);
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], ServerMsg::PlayerMoved { .. }));
        // The mover got exactly one nearby list back
        let to_a = drain(&mut rx_a);
        assert_eq!(to_a.len(), 1);
        assert!(matches!(to_a[0], ServerMsg::PlayersNearby { .. }));
    }

    #[test]
    fn idle_sweep_notifies_and_announces() {
        let mut hub = hub();
        let (stale, mut rx_stale) = connect(&mut hub, 0);
        let (fresh, mut rx_fresh) = connect(&mut hub, 0);
        join_plaza(&mut hub, stale, "old", 0.0, 0.0, 0);
        join_plaza(&mut hub, fresh, "new", 0.0, 0.0, 280_000);
        drain(&mut rx_stale);
        drain(&mut rx_fresh);

        hub.on_sweep(300_001);

        let to_stale = drain(&mut rx_stale);
        assert!(matches!(to_stale[0], ServerMsg::ConnectionTimeout));
        let to_fresh = drain(&mut rx_fresh);
        assert!(matches!(&to_fresh[0], ServerMsg::PlayerLeft { player } if player.id == stale));
    }

    #[test]
    fn football_flow_join_kick_and_goal_broadcast() {
        let mut hub = hub();
        let (a, mut rx_a) = connect(&mut hub, 1_000);
        let (b, mut rx_b) = connect(&mut hub, 1_000);

        hub.handle_event(
            HubEvent::Frame {
                conn_id: a,
                msg: ClientMsg::FootballJoin {
                    team: Some(Team::Red),
                },
            },
            1_000,
        );
        hub.handle_event(
            HubEvent::Frame {
                conn_id: b,
                msg: ClientMsg::FootballJoin {
                    team: Some(Team::Blue),
                },
            },
            1_000,
        );

        // Joiner a got roster + game state; then saw b arrive
        let to_a = drain(&mut rx_a);
        assert!(matches!(to_a[0], ServerMsg::FootballPlayersList { .. }));
        assert!(matches!(to_a[1], ServerMsg::FootballGameState { .. }));
        assert!(matches!(&to_a[2], ServerMsg::FootballPlayerJoined { player } if player.id == b));
        drain(&mut rx_b);

        // Kick: immediate out-of-band ball update to the whole room
        hub.handle_event(
            HubEvent::Frame {
                conn_id: a,
                msg: ClientMsg::FootballKick {
                    vx: -15.0,
                    vy: 0.0,
                    spin: 0.0,
                },
            },
            2_000,
        );
        assert!(matches!(
            drain(&mut rx_a)[0],
            ServerMsg::FootballBallUpdate { .. }
        ));
        drain(&mut rx_b);

        // Drive the ball into the left goal mouth
        let ball = hub.football.ball_mut();
        ball.x = 12.0;
        ball.y = 250.0;
        ball.vx = -10.0;
        hub.on_tick(3_000);

        let to_b = drain(&mut rx_b);
        match to_b.last() {
            Some(ServerMsg::FootballGoalScored {
                team,
                score,
                last_kicker_id,
            }) => {
                assert_eq!(*team, Team::Blue);
                assert_eq!(score.blue, 1);
                assert_eq!(*last_kicker_id, Some(a));
            }
            other => panic!("expected goal broadcast, got {:?}", other),
        }

        // Reset fires 3000 ms later and re-broadcasts game state
        hub.on_tick(6_000);
        let to_b = drain(&mut rx_b);
        match &to_b[0] {
            ServerMsg::FootballGameState {
                ball, is_playing, ..
            } => {
                assert!(*is_playing);
                assert_eq!(ball.x, 400.0);
                assert_eq!(ball.vx, 0.0);
            }
            other => panic!("expected game state, got {:?}", other),
        }
    }

    #[test]
    fn disconnect_cleans_up_plaza_and_football_independently() {
        let mut hub = hub();
        let (a, _rx_a) = connect(&mut hub, 1_000);
        let (b, mut rx_b) = connect(&mut hub, 1_000);
        join_plaza(&mut hub, a, "alice", 0.0, 0.0, 1_000);
        join_plaza(&mut hub, b, "bob", 5.0, 0.0, 1_000);
        hub.handle_event(
            HubEvent::Frame {
                conn_id: a,
                msg: ClientMsg::FootballJoin { team: None },
            },
            1_000,
        );
        hub.handle_event(
            HubEvent::Frame {
                conn_id: b,
                msg: ClientMsg::FootballJoin { team: None },
            },
            1_000,
        );
        drain(&mut rx_b);

        hub.handle_event(HubEvent::Disconnected { conn_id: a }, 2_000);

        let seen = drain(&mut rx_b);
        assert!(seen
            .iter()
            .any(|m| matches!(m, ServerMsg::PlayerLeft { player } if player.id == a)));
        assert!(seen
            .iter()
            .any(|m| matches!(m, ServerMsg::FootballPlayerLeft { player } if player.id == a)));
        assert_eq!(hub.plaza.len(), 1);
        assert_eq!(hub.football.len(), 1);
    }

    #[tokio::test]
    async fn hub_task_serves_events_sent_through_the_handle() {
        let (hub, handle, _gauges) = Hub::new(HubConfig::default(), 1);
        tokio::spawn(hub.run());

        let conn_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle
            .send(HubEvent::Connected {
                conn_id,
                pinned: None,
                outbox: tx,
            })
            .await;
        handle
            .send(HubEvent::Frame {
                conn_id,
                msg: ClientMsg::PlayerJoin {
                    user_id: None,
                    nickname: "solo".to_string(),
                    avatar: "default".to_string(),
                    x: 0.0,
                    y: 0.0,
                },
            })
            .await;

        let reply = rx.recv().await.expect("roster reply");
        match reply {
            ServerMsg::PlayersList { players } => assert!(players.is_empty()),
            other => panic!("expected roster, got {:?}", other),
        }
    }

    #[test]
    fn pinned_identity_overrides_claimed_user_id() {
        let mut hub = hub();
        let conn_id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.handle_event(
            HubEvent::Connected {
                conn_id,
                pinned: Some(PinnedIdentity {
                    user_id: "real-user".to_string(),
                    nickname: None,
                    avatar: None,
                }),
                outbox: tx,
            },
            1_000,
        );

        hub.handle_event(
            HubEvent::Frame {
                conn_id,
                msg: ClientMsg::PlayerJoin {
                    user_id: Some("spoofed".to_string()),
                    nickname: "mallory".to_string(),
                    avatar: "default".to_string(),
                    x: 0.0,
                    y: 0.0,
                },
            },
            1_000,
        );

        assert_eq!(
            hub.plaza.get(conn_id).unwrap().user_id.as_deref(),
            Some("real-user")
        );
    }
}
