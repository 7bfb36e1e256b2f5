//! NMB Engine
//!
//! Server-authoritative state for NMB, a cooperative horror board game played
//! on a shifting multi-floor building.
//!
//! # Overview
//!
//! - **Turn Engine** - One `Game` per session walks players through pawn
//!   placement and then strict turn order. Every action is validated in full
//!   before any state changes, so a rejected action leaves no trace.
//!
//! - **Board** - Five floors of 5×5 tile slots, each tile a 4×4 grid of
//!   squares. Tiles are drawn and placed as players explore, zones hide their
//!   names until entered, and corrosion spreads once the building mutates.
//!
//! - **Cards** - Path tiles, items, events, anomalies, elevator buttons and
//!   zone names, all drawn from seeded decks.
//!
//! - **Sessions** - A `SessionRegistry` owns every live game, serializes
//!   actions per session and tracks which connections to notify.
//!
//! # Design Principles
//!
//! 1. **Validate, then mutate** - Errors are returned, never half-applied.
//!
//! 2. **Deterministic** - All randomness in a session comes from one seed.
//!
//! 3. **No networking** - The transport lives elsewhere; this crate only
//!    shapes the messages.
//!
//! 4. **Serialization-ready** - Snapshots and messages are plain serde types.
//!
//! # Example
//!
//! ```rust
//! use nmb_engine::{dispatch, ClientMessage, ConnectionHandle, ServerEvent, SessionRegistry};
//!
//! let registry = SessionRegistry::default();
//! let out = dispatch(
//!     &registry,
//!     &ConnectionHandle::new("socket-1"),
//!     ClientMessage::CreateSession { host_name: "Ada".into() },
//! );
//! assert!(matches!(out.replies[0], ServerEvent::SessionCreated { .. }));
//! assert!(out.broadcast.is_none());
//! ```

pub mod state;

// Re-export everything from state module at crate root
pub use state::*;
