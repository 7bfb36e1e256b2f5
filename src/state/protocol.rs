//! Message shapes exchanged with clients, and a dispatcher from inbound
//! messages to registry calls.
//!
//! The transport is someone else's job. `dispatch` only decides what the
//! sender hears back and what, if anything, every connection in the session
//! hears. Rejected requests are answered to the sender alone.

use serde::{Deserialize, Serialize};

use super::actions::{ActionReport, PlayerAction};
use super::board::Position;
use super::connection::ConnectionHandle;
use super::player::PlayerId;
use super::registry::{RegistryError, SessionId, SessionRegistry};
use super::snapshot::GameSnapshot;

/// Inbound messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateSession {
        host_name: String,
    },
    JoinSession {
        session_id: String,
        player_name: String,
    },
    StartSession {
        session_id: String,
    },
    PlacePawn {
        session_id: String,
        player_id: PlayerId,
        position: Position,
    },
    PlayerAction {
        session_id: String,
        player_id: PlayerId,
        action: PlayerAction,
    },
    /// Re-associate this connection with an existing player.
    Reconnect {
        session_id: String,
        player_id: PlayerId,
    },
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSession { .. } => "create_session",
            Self::JoinSession { .. } => "join_session",
            Self::StartSession { .. } => "start_session",
            Self::PlacePawn { .. } => "place_pawn",
            Self::PlayerAction { .. } => "player_action",
            Self::Reconnect { .. } => "reconnect",
        }
    }
}

/// Outbound events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    SessionCreated {
        session_id: SessionId,
        player_id: PlayerId,
    },
    SessionJoined {
        session_id: SessionId,
        player_id: PlayerId,
        player_count: usize,
        max_players: usize,
    },
    SessionStarted {
        state: Box<GameSnapshot>,
    },
    StateUpdate {
        state: Box<GameSnapshot>,
        last_action_result: Option<ActionReport>,
    },
    ActionResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Error {
        kind: String,
        message: String,
    },
}

impl ServerEvent {
    fn accepted() -> Self {
        Self::ActionResult {
            success: true,
            reason: None,
        }
    }

    fn rejected(e: &RegistryError) -> Self {
        Self::ActionResult {
            success: false,
            reason: Some(e.kind().to_string()),
        }
    }

    fn error(e: &RegistryError) -> Self {
        Self::Error {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }

    fn update(state: GameSnapshot, report: Option<ActionReport>) -> Self {
        Self::StateUpdate {
            state: Box::new(state),
            last_action_result: report,
        }
    }

    fn started(state: GameSnapshot) -> Self {
        Self::SessionStarted { state: Box::new(state) }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// One event for every live connection in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    pub session_id: SessionId,
    pub targets: Vec<ConnectionHandle>,
    pub event: ServerEvent,
}

/// What to send after handling one inbound message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dispatch {
    /// For the sender only.
    pub replies: Vec<ServerEvent>,
    pub broadcast: Option<Broadcast>,
}

impl Dispatch {
    fn reply(event: ServerEvent) -> Self {
        Self {
            replies: vec![event],
            broadcast: None,
        }
    }

    fn with_broadcast(
        registry: &SessionRegistry,
        session_id: SessionId,
        replies: Vec<ServerEvent>,
        event: ServerEvent,
    ) -> Self {
        let targets = registry.broadcast_targets(&session_id).unwrap_or_default();
        Self {
            replies,
            broadcast: Some(Broadcast {
                session_id,
                targets,
                event,
            }),
        }
    }
}

/// In-turn requests must come from the handle attached to that player.
fn check_seat(
    registry: &SessionRegistry,
    session_id: &SessionId,
    sender: &ConnectionHandle,
    player_id: PlayerId,
) -> Result<(), RegistryError> {
    match registry.player_for(session_id, sender)? {
        Some(speaker) if speaker == player_id => Ok(()),
        _ => Err(RegistryError::NotYourSeat),
    }
}

/// Handle one inbound message from `sender`.
pub fn dispatch(registry: &SessionRegistry, sender: &ConnectionHandle, message: ClientMessage) -> Dispatch {
    log::debug!("{} from {}", message.name(), sender);
    match message {
        ClientMessage::CreateSession { host_name } => match registry.create_session(&host_name) {
            Ok((session_id, player_id)) => {
                if let Err(e) = registry.attach_connection(&session_id, player_id, sender.clone()) {
                    return Dispatch::reply(ServerEvent::error(&e));
                }
                Dispatch::reply(ServerEvent::SessionCreated { session_id, player_id })
            }
            Err(e) => Dispatch::reply(ServerEvent::error(&e)),
        },

        ClientMessage::JoinSession {
            session_id,
            player_name,
        } => {
            let session_id = SessionId::parse(&session_id);
            let joined = match registry.join(&session_id, &player_name) {
                Ok(joined) => joined,
                Err(e) => return Dispatch::reply(ServerEvent::error(&e)),
            };
            let state = match registry.attach_connection(&session_id, joined.player_id, sender.clone()) {
                Ok(state) => state,
                Err(e) => return Dispatch::reply(ServerEvent::error(&e)),
            };
            let reply = ServerEvent::SessionJoined {
                session_id: session_id.clone(),
                player_id: joined.player_id,
                player_count: joined.player_count,
                max_players: joined.max_players,
            };
            let event = if joined.started {
                ServerEvent::started(state)
            } else {
                ServerEvent::update(state, None)
            };
            Dispatch::with_broadcast(registry, session_id, vec![reply], event)
        }

        ClientMessage::StartSession { session_id } => {
            let session_id = SessionId::parse(&session_id);
            match registry.start_session(&session_id) {
                Ok(state) => Dispatch::with_broadcast(
                    registry,
                    session_id,
                    vec![ServerEvent::accepted()],
                    ServerEvent::started(state),
                ),
                Err(e) => Dispatch::reply(ServerEvent::error(&e)),
            }
        }

        ClientMessage::PlacePawn {
            session_id,
            player_id,
            position,
        } => {
            let session_id = SessionId::parse(&session_id);
            if let Err(e) = check_seat(registry, &session_id, sender, player_id) {
                return Dispatch::reply(ServerEvent::rejected(&e));
            }
            match registry.place_pawn(&session_id, player_id, position) {
                Ok(state) => Dispatch::with_broadcast(
                    registry,
                    session_id,
                    vec![ServerEvent::accepted()],
                    ServerEvent::update(state, None),
                ),
                Err(e) => Dispatch::reply(ServerEvent::rejected(&e)),
            }
        }

        ClientMessage::PlayerAction {
            session_id,
            player_id,
            action,
        } => {
            let session_id = SessionId::parse(&session_id);
            if let Err(e) = check_seat(registry, &session_id, sender, player_id) {
                return Dispatch::reply(ServerEvent::rejected(&e));
            }
            match registry.route_action(&session_id, player_id, &action) {
                Ok((report, state)) => Dispatch::with_broadcast(
                    registry,
                    session_id,
                    vec![ServerEvent::accepted()],
                    ServerEvent::update(state, Some(report)),
                ),
                Err(e) => Dispatch::reply(ServerEvent::rejected(&e)),
            }
        }

        ClientMessage::Reconnect {
            session_id,
            player_id,
        } => {
            let session_id = SessionId::parse(&session_id);
            match registry.reconnect(&session_id, player_id, sender.clone()) {
                Ok(state) => Dispatch::reply(ServerEvent::update(state, None)),
                Err(e) => Dispatch::reply(ServerEvent::error(&e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::config::EngineConfig;
    use crate::state::game::SessionState;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn handle(raw: &str) -> ConnectionHandle {
        ConnectionHandle::new(raw)
    }

    fn created(registry: &SessionRegistry) -> (SessionId, PlayerId) {
        let out = dispatch(
            registry,
            &handle("host"),
            ClientMessage::CreateSession {
                host_name: "Host".into(),
            },
        );
        match &out.replies[..] {
            [ServerEvent::SessionCreated { session_id, player_id }] => (session_id.clone(), *player_id),
            other => panic!("unexpected replies: {:?}", other),
        }
    }

    #[test]
    fn test_client_message_wire_shape() {
        let raw = json!({
            "type": "player_action",
            "session_id": "abcd1234",
            "player_id": 3,
            "action": {"type": "move", "data": {"path": []}}
        });
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.name(), "player_action");

        let raw = json!({"type": "create_session", "host_name": "Ada"});
        let msg: ClientMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateSession {
                host_name: "Ada".into()
            }
        );
    }

    #[test]
    fn test_error_event_shape() {
        let event = ServerEvent::error(&RegistryError::SessionNotFound);
        assert_eq!(
            event.to_json(),
            json!({"type": "error", "kind": "session_not_found", "message": "session not found"})
        );
        assert_eq!(
            ServerEvent::accepted().to_json(),
            json!({"type": "action_result", "success": true})
        );
    }

    #[test]
    fn test_create_and_join_flow() {
        let registry = SessionRegistry::with_seed(EngineConfig::default(), 3);
        let (session_id, _) = created(&registry);

        let out = dispatch(
            &registry,
            &handle("guest"),
            ClientMessage::JoinSession {
                session_id: session_id.as_str().to_lowercase(),
                player_name: "Guest".into(),
            },
        );
        match &out.replies[..] {
            [ServerEvent::SessionJoined {
                player_count,
                max_players,
                ..
            }] => assert_eq!((*player_count, *max_players), (2, 6)),
            other => panic!("unexpected replies: {:?}", other),
        }
        let broadcast = out.broadcast.unwrap();
        assert_eq!(broadcast.targets, vec![handle("guest"), handle("host")]);
        assert!(matches!(broadcast.event, ServerEvent::StateUpdate { .. }));

        let out = dispatch(
            &registry,
            &handle("host"),
            ClientMessage::StartSession {
                session_id: session_id.to_string(),
            },
        );
        assert_eq!(out.replies, vec![ServerEvent::accepted()]);
        match out.broadcast.map(|b| b.event) {
            Some(ServerEvent::SessionStarted { state }) => {
                assert_eq!(state.state, SessionState::PawnPlacement);
                assert!(state.placement.is_some());
            }
            other => panic!("unexpected broadcast: {:?}", other),
        }
    }

    #[test]
    fn test_rejected_action_is_not_broadcast() {
        let registry = SessionRegistry::with_seed(EngineConfig::default(), 3);
        let (session_id, host) = created(&registry);

        let out = dispatch(
            &registry,
            &handle("host"),
            ClientMessage::PlayerAction {
                session_id: session_id.to_string(),
                player_id: host,
                action: PlayerAction::Roll,
            },
        );
        assert_eq!(
            out.replies,
            vec![ServerEvent::ActionResult {
                success: false,
                reason: Some("not_playing".into()),
            }]
        );
        assert!(out.broadcast.is_none());
    }

    #[test]
    fn test_connection_cannot_act_for_another_player() {
        let registry = SessionRegistry::with_seed(EngineConfig::default(), 3);
        let (session_id, host) = created(&registry);
        dispatch(
            &registry,
            &handle("guest"),
            ClientMessage::JoinSession {
                session_id: session_id.to_string(),
                player_name: "Guest".into(),
            },
        );
        let before = registry.snapshot(&session_id).unwrap();

        let out = dispatch(
            &registry,
            &handle("guest"),
            ClientMessage::PlayerAction {
                session_id: session_id.to_string(),
                player_id: host,
                action: PlayerAction::EndTurn,
            },
        );
        assert_eq!(
            out.replies,
            vec![ServerEvent::ActionResult {
                success: false,
                reason: Some("not_your_seat".into()),
            }]
        );
        assert!(out.broadcast.is_none());

        let out = dispatch(
            &registry,
            &handle("stranger"),
            ClientMessage::PlacePawn {
                session_id: session_id.to_string(),
                player_id: host,
                position: Position::new(2, 2, 2, 0, 0),
            },
        );
        assert_eq!(out.replies[0], ServerEvent::rejected(&RegistryError::NotYourSeat));

        let out = dispatch(
            &registry,
            &handle("stranger"),
            ClientMessage::Reconnect {
                session_id: session_id.to_string(),
                player_id: host,
            },
        );
        assert_eq!(out.replies, vec![ServerEvent::error(&RegistryError::NotYourSeat)]);
        assert_eq!(registry.snapshot(&session_id).unwrap(), before);
        assert_eq!(registry.broadcast_targets(&session_id).unwrap(), vec![handle("guest"), handle("host")]);
    }

    #[test]
    fn test_unknown_session() {
        let registry = SessionRegistry::default();
        let out = dispatch(
            &registry,
            &handle("x"),
            ClientMessage::JoinSession {
                session_id: "ZZZZZZZZ".into(),
                player_name: "Nobody".into(),
            },
        );
        assert_eq!(
            out.replies,
            vec![ServerEvent::error(&RegistryError::SessionNotFound)]
        );
        assert!(out.broadcast.is_none());
    }

    #[test]
    fn test_reconnect_resends_state() {
        let registry = SessionRegistry::with_seed(EngineConfig::default(), 3);
        let (session_id, host) = created(&registry);
        registry.detach_connection(&session_id, &handle("host")).unwrap();
        assert!(registry.broadcast_targets(&session_id).unwrap().is_empty());

        let out = dispatch(
            &registry,
            &handle("host-again"),
            ClientMessage::Reconnect {
                session_id: session_id.to_string(),
                player_id: host,
            },
        );
        assert!(matches!(&out.replies[..], [ServerEvent::StateUpdate { .. }]));
        assert_eq!(registry.broadcast_targets(&session_id).unwrap(), vec![handle("host-again")]);
    }
}
