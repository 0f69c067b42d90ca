//! Type-safe connection identifier.
//!
//! [`ConnId`] is a newtype wrapper around [`uuid::Uuid`] (v4). Room
//! membership stores identifiers rather than connection handles, so a
//! collision would merge two clients' memberships; random v4 UUIDs make
//! that practically impossible for the lifetime of a hub.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for one live client connection.
///
/// Generated once when the connection wrapper is constructed and immutable
/// thereafter. Used as the key of the hub's identifier index and as the
/// member type of every room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(uuid::Uuid);

impl ConnId {
    /// Creates a new random `ConnId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `ConnId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for ConnId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}
