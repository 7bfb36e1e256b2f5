//! Session registry.
//!
//! Owns every live session. The session map and each session sit behind
//! separate locks: the map lock is held only long enough to clone a session's
//! `Arc`, so different sessions run in parallel while actions for one session
//! are applied one at a time.
//!
//! ```text
//! SessionRegistry
//!   RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>
//!                                   │
//!                                   ├─ Game               (rules, board, players)
//!                                   └─ ConnectionManager  (handle ↔ player)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use super::actions::{ActionReport, PlayerAction};
use super::board::Position;
use super::config::EngineConfig;
use super::connection::{default_reconnect_grace, Attached, ConnectionHandle, ConnectionManager};
use super::game::{Game, GameError};
use super::player::PlayerId;
use super::rng::GameRng;
use super::snapshot::GameSnapshot;

/// Length of a session id.
pub const SESSION_ID_LEN: usize = 8;

/// Short uppercase session code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Fresh id from a random uuid.
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self(raw[..SESSION_ID_LEN].to_uppercase())
    }

    /// Normalize user input; lookups are case-insensitive.
    pub fn parse(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("the session is full")]
    SessionFull,
    #[error("session not found")]
    SessionNotFound,
    #[error("that name is taken")]
    DuplicateName,
    #[error("the game is already in progress")]
    GameInProgress,
    #[error("this connection does not speak for that player")]
    NotYourSeat,
    #[error(transparent)]
    Game(GameError),
}

impl RegistryError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionFull => "session_full",
            Self::SessionNotFound => "session_not_found",
            Self::DuplicateName => "duplicate_name",
            Self::GameInProgress => "game_in_progress",
            Self::NotYourSeat => "not_your_seat",
            Self::Game(e) => e.kind(),
        }
    }
}

impl From<GameError> for RegistryError {
    fn from(e: GameError) -> Self {
        match e {
            GameError::SessionFull => Self::SessionFull,
            GameError::DuplicateName => Self::DuplicateName,
            GameError::AlreadyStarted => Self::GameInProgress,
            other => Self::Game(other),
        }
    }
}

/// One session: its game plus who is listening.
#[derive(Debug)]
pub struct Session {
    pub game: Game,
    pub connections: ConnectionManager,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn new(game: Game) -> Self {
        let now = Utc::now();
        Self {
            game,
            connections: ConnectionManager::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn idle_time(&self) -> Duration {
        Utc::now() - self.last_activity
    }
}

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    pub player_id: PlayerId,
    pub player_count: usize,
    pub max_players: usize,
    /// The join reached the auto-start count and started the game.
    pub started: bool,
}

/// All live sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    config: EngineConfig,
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
    next_player_id: AtomicU64,
    seeds: Mutex<GameRng>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SessionRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_seed(config, rand::random())
    }

    /// Registry whose sessions are seeded deterministically from `seed`.
    pub fn with_seed(config: EngineConfig, seed: u64) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            next_player_id: AtomicU64::new(1),
            seeds: Mutex::new(GameRng::new(seed)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn allocate_player_id(&self) -> PlayerId {
        PlayerId(self.next_player_id.fetch_add(1, Ordering::Relaxed))
    }

    fn next_seed(&self) -> u64 {
        self.seeds.lock().unwrap_or_else(PoisonError::into_inner).next_seed()
    }

    fn lookup(&self, id: &SessionId) -> Result<Arc<Mutex<Session>>, RegistryError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(id).cloned().ok_or(RegistryError::SessionNotFound)
    }

    /// Run `f` with exclusive access to one session.
    ///
    /// The map lock is released before the session lock is taken. A poisoned
    /// session is still consistent because every action validates before it
    /// mutates, so poisoning is recovered.
    pub fn with_session<R>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut Session) -> Result<R, RegistryError>,
    ) -> Result<R, RegistryError> {
        let session = self.lookup(id)?;
        let mut guard: MutexGuard<'_, Session> = session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    // -- lifecycle ------------------------------------------------------------

    /// Open a new session and seat the host as player #1.
    pub fn create_session(&self, host_name: &str) -> Result<(SessionId, PlayerId), RegistryError> {
        let host = self.allocate_player_id();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let mut id = SessionId::generate();
        while sessions.contains_key(&id) {
            id = SessionId::generate();
        }

        let mut game = Game::new(id.as_str(), self.config.clone(), self.next_seed());
        game.add_player(host, host_name)?;
        sessions.insert(id.clone(), Arc::new(Mutex::new(Session::new(game))));
        log::info!("session {} created by {} ({})", id, host_name, host);
        Ok((id, host))
    }

    /// Seat another player, starting the game if the auto-start count is hit.
    pub fn join(&self, id: &SessionId, player_name: &str) -> Result<Joined, RegistryError> {
        let player_id = self.allocate_player_id();
        let auto_start = self.config.auto_start_players;
        self.with_session(id, |session| {
            session.game.add_player(player_id, player_name)?;
            session.touch();
            let player_count = session.game.player_count();
            log::info!("session {}: {} joined as {} ({} seated)", id, player_name, player_id, player_count);

            let started = auto_start == Some(player_count);
            if started {
                session.game.start()?;
                log::info!("session {} auto-started", id);
            }
            Ok(Joined {
                player_id,
                player_count,
                max_players: session.game.config().max_players,
                started,
            })
        })
    }

    pub fn start_session(&self, id: &SessionId) -> Result<GameSnapshot, RegistryError> {
        self.with_session(id, |session| {
            session.game.start()?;
            session.touch();
            log::info!("session {} started", id);
            Ok(session.game.snapshot())
        })
    }

    pub fn place_pawn(
        &self,
        id: &SessionId,
        player_id: PlayerId,
        position: Position,
    ) -> Result<GameSnapshot, RegistryError> {
        self.with_session(id, |session| {
            session.game.place_pawn(player_id, position)?;
            session.touch();
            session.connections.touch(player_id);
            Ok(session.game.snapshot())
        })
    }

    /// Apply one player action to its session.
    pub fn route_action(
        &self,
        id: &SessionId,
        player_id: PlayerId,
        action: &PlayerAction,
    ) -> Result<(ActionReport, GameSnapshot), RegistryError> {
        self.with_session(id, |session| {
            let report = session.game.apply_action(player_id, action)?;
            session.touch();
            session.connections.touch(player_id);
            Ok((report, session.game.snapshot()))
        })
    }

    pub fn snapshot(&self, id: &SessionId) -> Result<GameSnapshot, RegistryError> {
        self.with_session(id, |session| Ok(session.game.snapshot()))
    }

    // -- connections ----------------------------------------------------------

    /// Attach a transport handle to a seated player. Returns the current
    /// snapshot so a reconnecting client can resync.
    pub fn attach_connection(
        &self,
        id: &SessionId,
        player_id: PlayerId,
        handle: ConnectionHandle,
    ) -> Result<GameSnapshot, RegistryError> {
        self.with_session(id, |session| {
            if !session.game.has_player(player_id) {
                return Err(GameError::PlayerNotFound.into());
            }
            if session.connections.attach(player_id, handle) == Attached::Reconnected {
                log::info!("session {}: {} reconnected", id, player_id);
            }
            Ok(session.game.snapshot())
        })
    }

    /// Bring a seated player back under `handle`.
    ///
    /// Refused when the seat is live under another handle, or when `handle`
    /// already speaks for someone else.
    pub fn reconnect(
        &self,
        id: &SessionId,
        player_id: PlayerId,
        handle: ConnectionHandle,
    ) -> Result<GameSnapshot, RegistryError> {
        self.with_session(id, |session| {
            if !session.game.has_player(player_id) {
                return Err(GameError::PlayerNotFound.into());
            }
            let other_player = session.connections.player_for(&handle).is_some_and(|p| p != player_id);
            let seat_live = session
                .connections
                .get(player_id)
                .is_some_and(|c| c.status.is_connected() && c.handle != handle);
            if other_player || seat_live {
                return Err(RegistryError::NotYourSeat);
            }
            session.connections.attach(player_id, handle);
            log::info!("session {}: {} reconnected", id, player_id);
            session.touch();
            Ok(session.game.snapshot())
        })
    }

    /// The player `handle` speaks for in this session, if any.
    pub fn player_for(&self, id: &SessionId, handle: &ConnectionHandle) -> Result<Option<PlayerId>, RegistryError> {
        self.with_session(id, |session| Ok(session.connections.player_for(handle)))
    }

    pub fn detach_connection(
        &self,
        id: &SessionId,
        handle: &ConnectionHandle,
    ) -> Result<Option<PlayerId>, RegistryError> {
        self.detach_connection_with_grace(id, handle, default_reconnect_grace())
    }

    pub fn detach_connection_with_grace(
        &self,
        id: &SessionId,
        handle: &ConnectionHandle,
        grace: Duration,
    ) -> Result<Option<PlayerId>, RegistryError> {
        self.with_session(id, |session| {
            let player = session.connections.detach_with_grace(handle, grace);
            if let Some(player_id) = player {
                log::debug!("session {}: {} disconnected", id, player_id);
            }
            Ok(player)
        })
    }

    /// Handles that should receive post-action snapshots.
    pub fn broadcast_targets(&self, id: &SessionId) -> Result<Vec<ConnectionHandle>, RegistryError> {
        self.with_session(id, |session| Ok(session.connections.broadcast_targets()))
    }

    // -- teardown -------------------------------------------------------------

    pub fn remove_session(&self, id: &SessionId) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.remove(id).is_some();
        if removed {
            log::info!("session {} removed", id);
        }
        removed
    }

    /// Drop every session whose game has finished.
    pub fn cleanup_finished(&self) -> Vec<SessionId> {
        self.remove_where(|session| session.game.state().is_terminal())
    }

    /// Drop every session with no activity for at least `max_idle`.
    pub fn expire_idle(&self, max_idle: Duration) -> Vec<SessionId> {
        self.remove_where(|session| session.idle_time() >= max_idle)
    }

    /// Forget connections whose reconnection grace ran out. The players keep
    /// their seats and may come back through `reconnect`.
    pub fn expire_connections(&self) -> Vec<(SessionId, PlayerId)> {
        let sessions: Vec<(SessionId, Arc<Mutex<Session>>)> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, s)| (id.clone(), Arc::clone(s)))
            .collect();

        let mut expired = Vec::new();
        for (id, session) in sessions {
            let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
            for player_id in guard.connections.expire_stale() {
                log::info!("session {}: {} timed out", id, player_id);
                expired.push((id.clone(), player_id));
            }
        }
        expired.sort();
        expired
    }

    fn remove_where(&self, pred: impl Fn(&Session) -> bool) -> Vec<SessionId> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let mut doomed: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, s)| pred(&s.lock().unwrap_or_else(PoisonError::into_inner)))
            .map(|(id, _)| id.clone())
            .collect();
        doomed.sort();

        for id in &doomed {
            sessions.remove(id);
            log::info!("session {} removed", id);
        }
        doomed
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).contains_key(id)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<SessionId> = sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn count(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::SessionState;
    use pretty_assertions::assert_eq;

    fn registry() -> SessionRegistry {
        SessionRegistry::with_seed(EngineConfig::default(), 5)
    }

    #[test]
    fn test_session_id_shape() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), SESSION_ID_LEN);
        assert_eq!(id.as_str(), id.as_str().to_uppercase());
        assert_eq!(SessionId::parse(" abc123 "), SessionId::parse("ABC123"));
    }

    #[test]
    fn test_create_seats_host() {
        let registry = registry();
        let (id, host) = registry.create_session("Host").unwrap();
        let snap = registry.snapshot(&id).unwrap();
        assert_eq!(snap.state, SessionState::WaitingForPlayers);
        assert_eq!(snap.players.len(), 1);
        assert_eq!(snap.players[0].id, host);
        assert_eq!(snap.players[0].player_number, 1);
    }

    #[test]
    fn test_join_errors() {
        let registry = registry();
        let (id, _) = registry.create_session("Host").unwrap();

        assert_eq!(
            registry.join(&SessionId::parse("NOPE"), "X"),
            Err(RegistryError::SessionNotFound)
        );
        assert_eq!(registry.join(&id, "host"), Err(RegistryError::DuplicateName));

        for i in 0..5 {
            registry.join(&id, &format!("P{}", i)).unwrap();
        }
        assert_eq!(registry.join(&id, "Late"), Err(RegistryError::SessionFull));
    }

    #[test]
    fn test_join_after_start_is_rejected() {
        let registry = registry();
        let (id, _) = registry.create_session("Host").unwrap();
        registry.join(&id, "Guest").unwrap();
        registry.start_session(&id).unwrap();
        assert_eq!(registry.join(&id, "Late"), Err(RegistryError::GameInProgress));
        assert_eq!(registry.start_session(&id).unwrap_err(), RegistryError::GameInProgress);
    }

    #[test]
    fn test_auto_start() {
        let config = EngineConfig {
            auto_start_players: Some(3),
            ..EngineConfig::default()
        };
        let registry = SessionRegistry::with_seed(config, 1);
        let (id, _) = registry.create_session("Host").unwrap();
        assert!(!registry.join(&id, "B").unwrap().started);
        let joined = registry.join(&id, "C").unwrap();
        assert!(joined.started);
        assert_eq!(joined.player_count, 3);
        assert_eq!(registry.snapshot(&id).unwrap().state, SessionState::PawnPlacement);
    }

    #[test]
    fn test_player_ids_are_registry_wide() {
        let registry = registry();
        let (a, host_a) = registry.create_session("A").unwrap();
        let (_, host_b) = registry.create_session("B").unwrap();
        let guest = registry.join(&a, "C").unwrap().player_id;
        assert!(host_a != host_b && host_b != guest && host_a != guest);
    }

    #[test]
    fn test_route_action_unknown_session() {
        let registry = registry();
        let err = registry
            .route_action(&SessionId::parse("MISSING"), PlayerId(1), &PlayerAction::Roll)
            .unwrap_err();
        assert_eq!(err, RegistryError::SessionNotFound);
        assert_eq!(err.kind(), "session_not_found");
    }

    #[test]
    fn test_connections_and_broadcast_targets() {
        let registry = registry();
        let (id, host) = registry.create_session("Host").unwrap();
        let guest = registry.join(&id, "Guest").unwrap().player_id;

        registry.attach_connection(&id, host, ConnectionHandle::new("h")).unwrap();
        registry.attach_connection(&id, guest, ConnectionHandle::new("g")).unwrap();
        assert_eq!(
            registry.broadcast_targets(&id).unwrap(),
            vec![ConnectionHandle::new("g"), ConnectionHandle::new("h")]
        );

        assert_eq!(registry.detach_connection(&id, &ConnectionHandle::new("g")).unwrap(), Some(guest));
        assert_eq!(registry.broadcast_targets(&id).unwrap(), vec![ConnectionHandle::new("h")]);

        registry.attach_connection(&id, guest, ConnectionHandle::new("g2")).unwrap();
        assert_eq!(registry.broadcast_targets(&id).unwrap().len(), 2);

        let err = registry
            .attach_connection(&id, PlayerId(999), ConnectionHandle::new("x"))
            .unwrap_err();
        assert_eq!(err, RegistryError::Game(GameError::PlayerNotFound));
    }

    #[test]
    fn test_reconnect_only_to_own_or_dropped_seat() {
        let registry = registry();
        let (id, host) = registry.create_session("Host").unwrap();
        let guest = registry.join(&id, "Guest").unwrap().player_id;
        let (h, g) = (ConnectionHandle::new("h"), ConnectionHandle::new("g"));
        registry.attach_connection(&id, host, h.clone()).unwrap();
        registry.attach_connection(&id, guest, g.clone()).unwrap();

        // A live seat cannot be taken over, and a handle cannot hop seats
        let thief = ConnectionHandle::new("thief");
        assert_eq!(registry.reconnect(&id, host, thief.clone()), Err(RegistryError::NotYourSeat));
        assert_eq!(registry.reconnect(&id, host, g.clone()), Err(RegistryError::NotYourSeat));
        assert_eq!(registry.player_for(&id, &h).unwrap(), Some(host));

        registry.detach_connection(&id, &h).unwrap();
        let h2 = ConnectionHandle::new("h2");
        registry.reconnect(&id, host, h2.clone()).unwrap();
        assert_eq!(registry.player_for(&id, &h2).unwrap(), Some(host));
        assert_eq!(registry.player_for(&id, &h).unwrap(), None);

        assert_eq!(
            registry.reconnect(&id, PlayerId(999), thief),
            Err(RegistryError::Game(GameError::PlayerNotFound))
        );
    }

    #[test]
    fn test_expire_connections() {
        let registry = registry();
        let (id, host) = registry.create_session("Host").unwrap();
        let guest = registry.join(&id, "Guest").unwrap().player_id;
        let (h, g) = (ConnectionHandle::new("h"), ConnectionHandle::new("g"));
        registry.attach_connection(&id, host, h.clone()).unwrap();
        registry.attach_connection(&id, guest, g.clone()).unwrap();

        registry.detach_connection(&id, &h).unwrap();
        registry.detach_connection_with_grace(&id, &g, Duration::zero()).unwrap();
        assert_eq!(registry.expire_connections(), vec![(id.clone(), guest)]);
        assert_eq!(registry.player_for(&id, &g).unwrap(), None);
        assert_eq!(registry.player_for(&id, &h).unwrap(), Some(host));

        // The seat survives the expiry
        registry.reconnect(&id, guest, ConnectionHandle::new("g2")).unwrap();
        assert_eq!(registry.broadcast_targets(&id).unwrap(), vec![ConnectionHandle::new("g2")]);
    }

    #[test]
    fn test_teardown() {
        let registry = registry();
        let (a, _) = registry.create_session("A").unwrap();
        let (b, _) = registry.create_session("B").unwrap();
        assert_eq!(registry.count(), 2);

        assert!(registry.cleanup_finished().is_empty());
        assert!(registry.expire_idle(Duration::hours(1)).is_empty());

        assert!(registry.remove_session(&a));
        assert!(!registry.remove_session(&a));
        assert_eq!(registry.expire_idle(Duration::zero()), vec![b]);
        assert_eq!(registry.count(), 0);
    }
}
