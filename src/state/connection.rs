//! Connection tracking.
//!
//! The engine holds no transport state. A session only remembers which opaque
//! handle currently speaks for which player, so the transport knows where to
//! fan out snapshots and a dropped player can come back under the same id.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::player::PlayerId;

/// Default grace period for reconnection.
pub fn default_reconnect_grace() -> Duration {
    Duration::seconds(60)
}

/// Opaque transport handle (socket id, channel key, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionHandle(pub String);

impl ConnectionHandle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,

    /// Dropped, may come back until `grace_until`.
    Disconnected {
        since: DateTime<Utc>,
        grace_until: DateTime<Utc>,
    },

    Expired,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_reconnectable(&self) -> bool {
        match self {
            Self::Disconnected { grace_until, .. } => Utc::now() < *grace_until,
            _ => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self {
            Self::Expired => true,
            Self::Disconnected { grace_until, .. } => Utc::now() >= *grace_until,
            Self::Connected => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("reconnection grace period expired")]
    Expired,
}

/// The handle currently attached to one player.
#[derive(Debug, Clone)]
pub struct Connection {
    pub player_id: PlayerId,
    pub handle: ConnectionHandle,
    pub status: ConnectionStatus,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Connection {
    pub fn new(player_id: PlayerId, handle: ConnectionHandle) -> Self {
        let now = Utc::now();
        Self {
            player_id,
            handle,
            status: ConnectionStatus::Connected,
            connected_at: now,
            last_activity: now,
        }
    }

    pub fn disconnect(&mut self) {
        self.disconnect_with_grace(default_reconnect_grace());
    }

    pub fn disconnect_with_grace(&mut self, grace: Duration) {
        let now = Utc::now();
        self.status = ConnectionStatus::Disconnected {
            since: now,
            grace_until: now + grace,
        };
    }

    /// Bring the player back under a (possibly new) handle.
    pub fn reconnect(&mut self, handle: ConnectionHandle) -> Result<(), ConnectionError> {
        if self.status.is_expired() {
            return Err(ConnectionError::Expired);
        }
        self.handle = handle;
        self.status = ConnectionStatus::Connected;
        self.touch();
        Ok(())
    }

    pub fn expire(&mut self) {
        self.status = ConnectionStatus::Expired;
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn idle_time(&self) -> Duration {
        Utc::now() - self.last_activity
    }
}

/// Whether `attach` resumed an existing connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attached {
    New,
    Reconnected,
}

/// Connections for one session, indexed both ways.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: HashMap<PlayerId, Connection>,
    handles: HashMap<ConnectionHandle, PlayerId>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `handle` with `player_id`, replacing any previous handle.
    pub fn attach(&mut self, player_id: PlayerId, handle: ConnectionHandle) -> Attached {
        // A handle speaks for at most one player.
        if let Some(previous) = self.handles.remove(&handle) {
            if previous != player_id {
                self.connections.remove(&previous);
            }
        }

        if let Some(conn) = self.connections.get_mut(&player_id) {
            let old = conn.handle.clone();
            if conn.reconnect(handle.clone()).is_ok() {
                self.handles.remove(&old);
                self.handles.insert(handle, player_id);
                return Attached::Reconnected;
            }
            self.handles.remove(&old);
        }

        self.handles.insert(handle.clone(), player_id);
        self.connections.insert(player_id, Connection::new(player_id, handle));
        Attached::New
    }

    /// Mark the player behind `handle` as disconnected.
    pub fn detach(&mut self, handle: &ConnectionHandle) -> Option<PlayerId> {
        self.detach_with_grace(handle, default_reconnect_grace())
    }

    pub fn detach_with_grace(&mut self, handle: &ConnectionHandle, grace: Duration) -> Option<PlayerId> {
        let player_id = *self.handles.get(handle)?;
        if let Some(conn) = self.connections.get_mut(&player_id) {
            conn.disconnect_with_grace(grace);
        }
        Some(player_id)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&Connection> {
        self.connections.get(&player_id)
    }

    pub fn player_for(&self, handle: &ConnectionHandle) -> Option<PlayerId> {
        self.handles.get(handle).copied()
    }

    pub fn touch(&mut self, player_id: PlayerId) {
        if let Some(conn) = self.connections.get_mut(&player_id) {
            conn.touch();
        }
    }

    pub fn remove(&mut self, player_id: PlayerId) -> Option<Connection> {
        let conn = self.connections.remove(&player_id)?;
        self.handles.remove(&conn.handle);
        Some(conn)
    }

    /// Drop connections whose grace period ran out.
    /// Returns the affected players.
    pub fn expire_stale(&mut self) -> Vec<PlayerId> {
        let mut expired: Vec<PlayerId> = Vec::new();
        for (player_id, conn) in &mut self.connections {
            if conn.status.is_expired() {
                conn.expire();
                expired.push(*player_id);
            }
        }
        for player_id in &expired {
            self.remove(*player_id);
        }
        expired.sort();
        expired
    }

    /// Handles of every live connection, in a stable order.
    pub fn broadcast_targets(&self) -> Vec<ConnectionHandle> {
        let mut targets: Vec<ConnectionHandle> = self
            .connections
            .values()
            .filter(|c| c.status.is_connected())
            .map(|c| c.handle.clone())
            .collect();
        targets.sort();
        targets
    }

    pub fn connected_count(&self) -> usize {
        self.connections.values().filter(|c| c.status.is_connected()).count()
    }

    pub fn total_count(&self) -> usize {
        self.connections.len()
    }
}
