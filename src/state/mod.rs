//! State management for NMB sessions.
//!
//! - `config` - Tunable rule constants
//! - `rng` - Seeded randomness shared by everything in a session
//! - `board` - Floors, tiles, squares, zones and corrosion
//! - `cards` - Card catalog and decks
//! - `player` - Disorder, movement, hand and timed effects
//! - `game` - The turn engine: lifecycle, turn order, phases, outcome
//! - `actions` - Validation and application of in-turn actions
//! - `effects` - Resolution of event, anomaly and item cards
//! - `snapshot` - Serializable full state
//! - `connection` - Which transport handle speaks for which player
//! - `registry` - Live sessions, routing and teardown
//! - `protocol` - Inbound/outbound message shapes and dispatch
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          SessionRegistry                             │
//! │                                                                      │
//! │   session_id → Arc<Mutex<Session>>                                   │
//! │                                                                      │
//! │   ┌──────────────────────────────────────────────────────────────┐   │
//! │   │ Session                                                      │   │
//! │   │                                                              │   │
//! │   │  ┌────────────────────────────┐   ┌───────────────────────┐  │   │
//! │   │  │ Game                       │   │ ConnectionManager     │  │   │
//! │   │  │                            │   │                       │  │   │
//! │   │  │  Board   Decks   Players   │   │ player_id → handle    │  │   │
//! │   │  │  GameRng  phase  outcome   │   │ handle → player_id    │  │   │
//! │   │  └────────────────────────────┘   └───────────────────────┘  │   │
//! │   └──────────────────────────────────────────────────────────────┘   │
//! │                                                                      │
//! │   WaitingForPlayers ──▶ PawnPlacement ──▶ Playing ──▶ Finished       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use nmb_engine::state::{
//!     actions::PlayerAction,
//!     board::Position,
//!     registry::SessionRegistry,
//! };
//!
//! let registry = SessionRegistry::default();
//! let (session, host) = registry.create_session("Ada").unwrap();
//! let guest = registry.join(&session, "Grace").unwrap().player_id;
//!
//! let snapshot = registry.start_session(&session).unwrap();
//! for (i, id) in snapshot.turn_order.iter().enumerate() {
//!     let seed = Position::new(2, 2, 2, i as u8, 0);
//!     registry.place_pawn(&session, *id, seed).unwrap();
//! }
//!
//! let first = registry.snapshot(&session).unwrap().active_player.unwrap();
//! assert!(first == host || first == guest);
//! registry.route_action(&session, first, &PlayerAction::Roll).unwrap();
//! ```

pub mod actions;
pub mod board;
pub mod cards;
pub mod config;
pub mod connection;
pub mod effects;
pub mod game;
pub mod player;
pub mod protocol;
pub mod registry;
pub mod rng;
pub mod snapshot;

// Re-export commonly used types
pub use actions::{ActionReport, PlayerAction};
pub use board::{Board, BoardError, CorrosionMark, Direction, Position, TileCoord, Vertical};
pub use cards::{Card, CardId, DeckError};
pub use config::{ConfigError, EngineConfig};
pub use connection::{ConnectionHandle, ConnectionManager, ConnectionStatus};
pub use game::{Game, GameError, Outcome, Phase, SessionState};
pub use player::{Player, PlayerError, PlayerId};
pub use protocol::{dispatch, ClientMessage, Dispatch, ServerEvent};
pub use registry::{RegistryError, Session, SessionId, SessionRegistry};
pub use snapshot::GameSnapshot;
