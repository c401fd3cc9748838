//! WebSocket transport: upgrade auth, session tasks, wire protocol

pub mod auth;
pub mod handler;
pub mod protocol;
