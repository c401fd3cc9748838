//! Football minigame: room registry and ball physics

pub mod physics;
pub mod room;

pub use physics::{Ball, PitchConfig};
pub use room::{FootballConfig, FootballPlayer, FootballRoom, GameSnapshot, GoalEvent, TickOutput};
