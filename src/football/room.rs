//! Football room: player registry, score state, and tick orchestration
//!
//! A second spatial registry independent of the plaza: the same
//! connection may hold an entry in both, and leaves them independently.
//! All methods take an explicit `now_ms` so simulated time drives the
//! tests; the hub supplies the wall clock.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use uuid::Uuid;

use crate::world::registry::Identity;
use crate::ws::protocol::{BallState, FootballSnapshot, Score, Team};

use super::physics::{Ball, PitchConfig};

/// Room tunables beyond pitch geometry
#[derive(Debug, Clone)]
pub struct FootballConfig {
    pub pitch: PitchConfig,
    /// Minimum spacing between accepted kicks, per player
    pub kick_cooldown_ms: u64,
    /// Pause between a goal and the ball re-centering
    pub reset_delay_ms: u64,
    /// Elapsed-time gate on the periodic ball broadcast
    pub sync_interval_ms: u64,
}

impl Default for FootballConfig {
    fn default() -> Self {
        Self {
            pitch: PitchConfig::default(),
            kick_cooldown_ms: 300,
            reset_delay_ms: 3_000,
            sync_interval_ms: 50,
        }
    }
}

/// Live football entry (authoritative)
#[derive(Debug, Clone)]
pub struct FootballPlayer {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub nickname: String,
    pub avatar: String,
    pub team: Team,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub last_update_ms: u64,
    pub last_kick_ms: u64,
}

impl FootballPlayer {
    pub fn snapshot(&self) -> FootballSnapshot {
        FootballSnapshot {
            id: self.id,
            user_id: self.user_id.clone(),
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            team: self.team,
            x: self.x,
            y: self.y,
            vx: self.vx,
            vy: self.vy,
        }
    }
}

/// Result of a room join
#[derive(Debug)]
pub struct FootballJoinResult {
    pub joined: FootballSnapshot,
    /// Full room roster, joiner included
    pub roster: Vec<FootballSnapshot>,
    pub game: GameSnapshot,
}

/// Full game state as replied to joiners and broadcast on reset
#[derive(Debug, Clone)]
pub struct GameSnapshot {
    pub ball: BallState,
    pub score: Score,
    pub is_playing: bool,
}

/// A scored goal, for the room broadcast
#[derive(Debug, Clone)]
pub struct GoalEvent {
    pub team: Team,
    pub score: Score,
    pub last_kicker_id: Option<Uuid>,
}

/// What one tick produced. Fields are independent: a reset can fire on
/// the same tick that later syncs the ball.
#[derive(Debug, Default)]
pub struct TickOutput {
    /// The goal-reset deadline fired: game state to broadcast
    pub reset: Option<GameSnapshot>,
    /// A goal was detected this tick
    pub goal: Option<GoalEvent>,
    /// Periodic ball sync came due
    pub sync: Option<BallState>,
}

/// The football room
pub struct FootballRoom {
    cfg: FootballConfig,
    players: HashMap<Uuid, FootballPlayer>,
    ball: Ball,
    score: Score,
    is_playing: bool,
    /// Bumped on every goal; a scheduled reset applies only when its
    /// generation still matches
    goal_generation: u64,
    pending_reset: Option<PendingReset>,
    last_sync_ms: u64,
    rng: ChaCha8Rng,
}

#[derive(Debug, Clone, Copy)]
struct PendingReset {
    deadline_ms: u64,
    generation: u64,
}

impl FootballRoom {
    pub fn new(cfg: FootballConfig, seed: u64) -> Self {
        let ball = Ball::centered(&cfg.pitch);
        Self {
            cfg,
            players: HashMap::new(),
            ball,
            score: Score::default(),
            is_playing: true,
            goal_generation: 0,
            pending_reset: None,
            last_sync_ms: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn ball_state(&self) -> BallState {
        self.ball.state()
    }

    #[cfg(test)]
    pub(crate) fn ball_mut(&mut self) -> &mut Ball {
        &mut self.ball
    }

    pub fn game_snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            ball: self.ball.state(),
            score: self.score,
            is_playing: self.is_playing,
        }
    }

    /// Insert a joining connection. An explicit team request wins;
    /// otherwise the smaller team, with ties broken by the room RNG.
    /// Re-joining replaces the previous entry for the same connection.
    pub fn join(
        &mut self,
        conn_id: Uuid,
        identity: Identity,
        team: Option<Team>,
        now_ms: u64,
    ) -> FootballJoinResult {
        self.players.remove(&conn_id);

        let team = team.unwrap_or_else(|| self.balanced_team());
        let (x, y) = self.spawn_point(team);

        let player = FootballPlayer {
            id: conn_id,
            user_id: identity.user_id,
            nickname: identity.nickname,
            avatar: identity.avatar,
            team,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            last_update_ms: now_ms,
            last_kick_ms: 0,
        };
        let joined = player.snapshot();
        self.players.insert(conn_id, player);

        FootballJoinResult {
            joined,
            roster: self.roster(),
            game: self.game_snapshot(),
        }
    }

    /// Remove an entry. Idempotent.
    pub fn leave(&mut self, conn_id: Uuid) -> Option<FootballSnapshot> {
        self.players.remove(&conn_id).map(|p| p.snapshot())
    }

    /// Apply a position/velocity update. `None` for unknown connections.
    pub fn update_position(
        &mut self,
        conn_id: Uuid,
        x: f64,
        y: f64,
        vx: f64,
        vy: f64,
        now_ms: u64,
    ) -> Option<FootballSnapshot> {
        let player = self.players.get_mut(&conn_id)?;
        player.x = x;
        player.y = y;
        player.vx = vx;
        player.vy = vy;
        player.last_update_ms = now_ms;
        Some(player.snapshot())
    }

    /// Kick the ball: velocity and spin are overwritten, not summed.
    ///
    /// `None` (silent no-op) when the connection is not a room member,
    /// the match is paused, or the player's own kick cooldown has not
    /// elapsed. The cooldown is per-player, tracked on the player record.
    pub fn kick(
        &mut self,
        conn_id: Uuid,
        vx: f64,
        vy: f64,
        spin: f64,
        now_ms: u64,
    ) -> Option<BallState> {
        if !self.is_playing {
            return None;
        }
        let cooldown = self.cfg.kick_cooldown_ms;
        let player = self.players.get_mut(&conn_id)?;

        if player.last_kick_ms != 0 && now_ms.saturating_sub(player.last_kick_ms) < cooldown {
            return None;
        }
        player.last_kick_ms = now_ms;

        self.ball.vx = vx;
        self.ball.vy = vy;
        self.ball.spin = spin;
        self.ball.last_kicker = Some(conn_id);
        self.ball.last_kick_ms = now_ms;

        Some(self.ball.state())
    }

    /// One physics tick. Fires a due goal reset first, then (with players
    /// present and the match playing) integrates the ball, scores goals,
    /// and gates the periodic sync.
    pub fn tick(&mut self, now_ms: u64) -> TickOutput {
        let mut out = TickOutput::default();

        if let Some(pending) = self.pending_reset {
            if now_ms >= pending.deadline_ms {
                self.pending_reset = None;
                if pending.generation == self.goal_generation {
                    self.ball = Ball::centered(&self.cfg.pitch);
                    self.is_playing = true;
                    out.reset = Some(self.game_snapshot());
                }
            }
        }

        if self.players.is_empty() || !self.is_playing {
            return out;
        }

        if let Some(team) = self.ball.step(&self.cfg.pitch) {
            self.score.add(team);
            self.is_playing = false;
            self.goal_generation += 1;
            self.pending_reset = Some(PendingReset {
                deadline_ms: now_ms + self.cfg.reset_delay_ms,
                generation: self.goal_generation,
            });
            out.goal = Some(GoalEvent {
                team,
                score: self.score,
                last_kicker_id: self.ball.last_kicker,
            });
            // No sync on a goal tick: the goal broadcast carries the score
            return out;
        }

        if now_ms.saturating_sub(self.last_sync_ms) >= self.cfg.sync_interval_ms {
            self.last_sync_ms = now_ms;
            out.sync = Some(self.ball.state());
        }

        out
    }

    pub fn roster(&self) -> Vec<FootballSnapshot> {
        self.players.values().map(FootballPlayer::snapshot).collect()
    }

    fn balanced_team(&mut self) -> Team {
        let red = self.players.values().filter(|p| p.team == Team::Red).count();
        let blue = self.players.len() - red;
        match red.cmp(&blue) {
            std::cmp::Ordering::Less => Team::Red,
            std::cmp::Ordering::Greater => Team::Blue,
            std::cmp::Ordering::Equal => {
                if self.rng.gen_bool(0.5) {
                    Team::Red
                } else {
                    Team::Blue
                }
            }
        }
    }

    /// Each team spawns on its own half, red defending the left goal
    fn spawn_point(&self, team: Team) -> (f64, f64) {
        let pitch = &self.cfg.pitch;
        let x = match team {
            Team::Red => pitch.width * 0.25,
            Team::Blue => pitch.width * 0.75,
        };
        (x, pitch.height / 2.0)
    }
}
