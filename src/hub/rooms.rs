//! Room membership index.
//!
//! [`RoomIndex`] maps a room name to the set of member [`ConnId`]s behind a
//! single [`tokio::sync::RwLock`]. Membership queries issued by room
//! broadcasts vastly outnumber joins and leaves, so reads share the lock.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::ConnId;

/// Thread-safe mapping from room name to member connection identifiers.
///
/// Rooms are created implicitly on the first join and removed as soon as
/// their last member leaves, so churn of short-lived room names cannot
/// grow the map without bound.
#[derive(Debug, Default)]
pub struct RoomIndex {
    rooms: RwLock<HashMap<String, HashSet<ConnId>>>,
}

impl RoomIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn_id` to `room`, creating the room if absent.
    ///
    /// Returns `false` if the connection was already a member.
    pub async fn join(&self, conn_id: ConnId, room: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        rooms.entry(room.to_string()).or_default().insert(conn_id)
    }

    /// Removes `conn_id` from `room`, dropping the room once it is empty.
    ///
    /// Returns `false` if the connection was not a member.
    pub async fn leave(&self, conn_id: ConnId, room: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(&conn_id);
        if members.is_empty() {
            rooms.remove(room);
        }
        removed
    }

    /// Removes `conn_id` from every room it belongs to.
    ///
    /// Returns the number of rooms the connection was removed from.
    pub async fn leave_all(&self, conn_id: ConnId) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut left = 0;
        rooms.retain(|_, members| {
            if members.remove(&conn_id) {
                left += 1;
            }
            !members.is_empty()
        });
        left
    }

    /// Returns a snapshot of the members of `room`.
    ///
    /// The lock is released before this returns, so callers may deliver to
    /// the members without blocking joins and leaves.
    pub async fn members(&self, room: &str) -> Vec<ConnId> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the number of members in `room` (zero if it does not exist).
    pub async fn count(&self, room: &str) -> usize {
        self.rooms.read().await.get(room).map_or(0, HashSet::len)
    }

    /// Returns `true` if `conn_id` is a member of `room`.
    pub async fn contains(&self, conn_id: ConnId, room: &str) -> bool {
        self.rooms
            .read()
            .await
            .get(room)
            .is_some_and(|members| members.contains(&conn_id))
    }

    /// Returns the names of all non-empty rooms, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns every connection identifier that belongs to at least one room.
    pub(crate) async fn all_members(&self) -> HashSet<ConnId> {
        self.rooms
            .read()
            .await
            .values()
            .flat_map(|members| members.iter().copied())
            .collect()
    }

    /// Removes every room.
    pub(crate) async fn clear(&self) {
        self.rooms.write().await.clear();
    }
}
