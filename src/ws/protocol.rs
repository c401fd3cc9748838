//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is one JSON object tagged by `type`, carrying the event name
//! used by the web client (`player:join`, `chat:message`, ...). Payload
//! fields are camelCase on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Football team assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

fn default_avatar() -> String {
    "default".to_string()
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Enter the plaza world with an identity and a starting position
    #[serde(rename = "player:join", rename_all = "camelCase")]
    PlayerJoin {
        /// External account id from the platform API, absent for guests
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        nickname: String,
        #[serde(default = "default_avatar")]
        avatar: String,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
    },

    /// Position update for the plaza world (server-side throttled)
    #[serde(rename = "player:position")]
    PlayerPosition { x: f64, y: f64 },

    /// Explicitly leave the plaza world (socket stays open)
    #[serde(rename = "player:leave")]
    PlayerLeave,

    /// Proximity chat message (rate-limited, sanitized)
    #[serde(rename = "chat:message")]
    ChatMessage { message: String },

    /// Join the football room, optionally requesting a team
    #[serde(rename = "football:join")]
    FootballJoin {
        #[serde(default)]
        team: Option<Team>,
    },

    /// Leave the football room
    #[serde(rename = "football:leave")]
    FootballLeave,

    /// Position/velocity update inside the football room
    #[serde(rename = "football:position")]
    FootballPosition {
        x: f64,
        y: f64,
        #[serde(default)]
        vx: f64,
        #[serde(default)]
        vy: f64,
    },

    /// Kick the ball: overwrites ball velocity and spin
    #[serde(rename = "football:kick")]
    FootballKick {
        vx: f64,
        vy: f64,
        #[serde(default)]
        spin: f64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMsg {
    /// A player entered the plaza (sent to everyone else)
    #[serde(rename = "player:joined")]
    PlayerJoined { player: PlayerSnapshot },

    /// A player left the plaza (leave, disconnect, eviction, or timeout)
    #[serde(rename = "player:left")]
    PlayerLeft { player: PlayerSnapshot },

    /// A player moved (sent to everyone else)
    #[serde(rename = "player:moved")]
    PlayerMoved { player: PlayerSnapshot },

    /// Full plaza roster, sent to a joining player (excludes the joiner)
    #[serde(rename = "players:list")]
    PlayersList { players: Vec<PlayerSnapshot> },

    /// Players within the proximity radius of the recipient
    #[serde(rename = "players:nearby")]
    PlayersNearby { players: Vec<NearbyPlayer> },

    /// Chat delivery: echo to the sender plus fan-out to nearby players
    #[serde(rename = "chat:received")]
    ChatReceived { message: ProximityMessage },

    /// Chat rejection, sent only to the offending connection
    #[serde(rename = "chat:error")]
    ChatError { reason: String },

    /// Idle eviction notice: the plaza entry was swept
    #[serde(rename = "connection:timeout")]
    ConnectionTimeout,

    #[serde(rename = "football:playerJoined")]
    FootballPlayerJoined { player: FootballSnapshot },

    #[serde(rename = "football:playerLeft")]
    FootballPlayerLeft { player: FootballSnapshot },

    #[serde(rename = "football:playerMoved")]
    FootballPlayerMoved { player: FootballSnapshot },

    /// Current football roster, sent to a joining player
    #[serde(rename = "football:playersList")]
    FootballPlayersList { players: Vec<FootballSnapshot> },

    /// Full game snapshot: ball, score, play state
    #[serde(rename = "football:gameState", rename_all = "camelCase")]
    FootballGameState {
        ball: BallState,
        score: Score,
        is_playing: bool,
    },

    /// Periodic (or kick-triggered) ball sync
    #[serde(rename = "football:ballUpdate")]
    FootballBallUpdate { ball: BallState },

    /// A goal was scored; play pauses until the scheduled reset
    #[serde(rename = "football:goalScored", rename_all = "camelCase")]
    FootballGoalScored {
        team: Team,
        score: Score,
        last_kicker_id: Option<Uuid>,
    },
}

/// Plaza player state as seen on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Connection id (ephemeral, minted at socket accept)
    pub id: Uuid,
    pub user_id: Option<String>,
    pub nickname: String,
    pub avatar: String,
    pub x: f64,
    pub y: f64,
}

/// Neighbor entry for `players:nearby`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyPlayer {
    pub id: Uuid,
    pub nickname: String,
    pub avatar: String,
    pub x: f64,
    pub y: f64,
    /// Euclidean distance to the recipient at delivery time
    pub distance: f64,
}

/// A delivered chat message. Transient: constructed, fanned out, discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityMessage {
    /// Time+random composite, collision-resistant for display ordering only
    pub id: String,
    pub sender_id: Uuid,
    pub nickname: String,
    pub avatar: String,
    /// Sanitized text, at most 200 chars
    pub message: String,
    /// Sender position snapshot at send time
    pub x: f64,
    pub y: f64,
    pub timestamp: u64,
}

/// Football player state as seen on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FootballSnapshot {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub nickname: String,
    pub avatar: String,
    pub team: Team,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

/// Ball state as seen on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallState {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub spin: f64,
    pub last_kicker_id: Option<Uuid>,
}

/// Score tally per team
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub red: u32,
    pub blue: u32,
}

impl Score {
    /// Increment the tally for one team
    pub fn add(&mut self, team: Team) {
        match team {
            Team::Red => self.red += 1,
            Team::Blue => self.blue += 1,
        }
    }
}
