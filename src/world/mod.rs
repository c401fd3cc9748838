//! Plaza world: player registry, presence lifecycle, proximity chat

pub mod chat;
pub mod registry;

pub use chat::{ChatConfig, ChatEngine, ChatOutcome};
pub use registry::{Identity, PlazaConfig, PlazaPlayer, PlazaRegistry};
