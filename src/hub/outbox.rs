//! Per-connection outboxes and room membership
//!
//! Fan-out goes through explicit publish operations over this table, not
//! through framework broadcast channels: the hub decides the audience per
//! message. Dropping a connection's sender is how the hub forcibly
//! terminates the underlying session (the socket writer observes the
//! channel close and shuts the socket down).

use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ws::protocol::ServerMsg;

/// The football activity's broadcast scope
pub const FOOTBALL_ROOM: &str = "football";

/// Outbox table: connection senders plus named room membership sets
#[derive(Default)]
pub struct OutboxTable {
    senders: HashMap<Uuid, mpsc::UnboundedSender<ServerMsg>>,
    rooms: HashMap<String, HashSet<Uuid>>,
}

impl OutboxTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Register a connection's outbox sender
    pub fn register(&mut self, conn_id: Uuid, tx: mpsc::UnboundedSender<ServerMsg>) {
        self.senders.insert(conn_id, tx);
    }

    /// Remove a connection entirely: sender dropped, room memberships
    /// cleared. Idempotent.
    pub fn unregister(&mut self, conn_id: Uuid) {
        self.senders.remove(&conn_id);
        for members in self.rooms.values_mut() {
            members.remove(&conn_id);
        }
    }

    /// Deliver to one connection. Send failures mean the receiving task
    /// already went away; the disconnect event will clean up.
    pub fn send_to(&self, conn_id: Uuid, msg: &ServerMsg) {
        if let Some(tx) = self.senders.get(&conn_id) {
            let _ = tx.send(msg.clone());
        }
    }

    /// Deliver to a set of connections
    pub fn send_many(&self, conn_ids: &[Uuid], msg: &ServerMsg) {
        for &id in conn_ids {
            self.send_to(id, msg);
        }
    }

    /// Deliver to every connection except one
    pub fn broadcast_except(&self, exclude: Uuid, msg: &ServerMsg) {
        for (&id, tx) in &self.senders {
            if id != exclude {
                let _ = tx.send(msg.clone());
            }
        }
    }

    pub fn join_room(&mut self, room: &str, conn_id: Uuid) {
        self.rooms.entry(room.to_string()).or_default().insert(conn_id);
    }

    pub fn leave_room(&mut self, room: &str, conn_id: Uuid) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&conn_id);
        }
    }

    /// Deliver to every member of a room
    pub fn publish_room(&self, room: &str, msg: &ServerMsg) {
        let Some(members) = self.rooms.get(room) else {
            return;
        };
        for &id in members {
            self.send_to(id, msg);
        }
    }

    /// Deliver to every member of a room except one
    pub fn publish_room_except(&self, room: &str, exclude: Uuid, msg: &ServerMsg) {
        let Some(members) = self.rooms.get(room) else {
            return;
        };
        for &id in members {
            if id != exclude {
                self.send_to(id, msg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(n: usize) -> (OutboxTable, Vec<(Uuid, mpsc::UnboundedReceiver<ServerMsg>)>) {
        let mut table = OutboxTable::new();
        let mut conns = Vec::new();
        for _ in 0..n {
            let id = Uuid::new_v4();
            let (tx, rx) = mpsc::unbounded_channel();
            table.register(id, tx);
            conns.push((id, rx));
        }
        (table, conns)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMsg>) -> usize {
        let mut n = 0;
        while rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    #[test]
    fn broadcast_except_skips_the_excluded_connection() {
        let (table, mut conns) = table_with(3);
        let excluded = conns[0].0;

        table.broadcast_except(excluded, &ServerMsg::ConnectionTimeout);

        assert_eq!(drain(&mut conns[0].1), 0);
        assert_eq!(drain(&mut conns[1].1), 1);
        assert_eq!(drain(&mut conns[2].1), 1);
    }

    #[test]
    fn publish_room_reaches_only_members() {
        let (mut table, mut conns) = table_with(3);
        table.join_room(FOOTBALL_ROOM, conns[0].0);
        table.join_room(FOOTBALL_ROOM, conns[1].0);

        table.publish_room(FOOTBALL_ROOM, &ServerMsg::ConnectionTimeout);

        assert_eq!(drain(&mut conns[0].1), 1);
        assert_eq!(drain(&mut conns[1].1), 1);
        assert_eq!(drain(&mut conns[2].1), 0);
    }

    #[test]
    fn unregister_closes_the_sender_and_leaves_rooms() {
        let (mut table, mut conns) = table_with(2);
        let (gone, rx) = &mut conns[0];
        table.join_room(FOOTBALL_ROOM, *gone);

        table.unregister(*gone);

        table.publish_room(FOOTBALL_ROOM, &ServerMsg::ConnectionTimeout);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn send_to_unknown_connection_is_a_noop() {
        let (table, _conns) = table_with(1);
        table.send_to(Uuid::new_v4(), &ServerMsg::ConnectionTimeout);
    }
}
