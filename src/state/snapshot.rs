//! Full-state snapshots.
//!
//! A snapshot is everything a client needs to render a session: it is sent on
//! start and after every accepted action. Zone names appear only once
//! revealed. Maps are ordered so the same state always serializes the same way.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::board::{CorrosionMark, Position, Tile, TileCoord};
use super::cards::{AnomalyKind, ItemCard};
use super::game::{Game, LogEntry, Outcome, Phase, SessionState};
use super::player::{Player, PlayerId, TimedEffect};

/// Log entries carried in a snapshot.
pub const SNAPSHOT_LOG_ENTRIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub session_id: String,
    pub state: SessionState,
    pub phase: Phase,
    pub round: u32,
    pub total_actions: u32,
    pub active_player: Option<PlayerId>,
    pub turn_order: Vec<PlayerId>,
    pub players: Vec<PlayerSnapshot>,
    pub board: BoardSnapshot,
    /// Present only during pawn placement.
    pub placement: Option<PlacementProgress>,
    pub outcome: Option<Outcome>,
    pub decks: DeckCounts,
    pub active_sources: Vec<AnomalyKind>,
    pub purified_sources: usize,
    pub power_surge: bool,
    pub log: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub player_number: u8,
    pub disorder: u32,
    pub floor: i32,
    pub position: Option<Position>,
    pub movement_budget: u32,
    pub movement_used: u32,
    pub hand: Vec<ItemCard>,
    pub effects: Vec<TimedEffect>,
    pub order_roll: Option<u32>,
}

impl From<&Player> for PlayerSnapshot {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            player_number: p.player_number,
            disorder: p.disorder(),
            floor: p.floor,
            position: p.position,
            movement_budget: p.movement_budget(),
            movement_used: p.movement_used(),
            hand: p.hand().to_vec(),
            effects: p.effects().to_vec(),
            order_roll: p.order_roll,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Tiles per floor.
    pub floors: BTreeMap<i32, Vec<Tile>>,
    pub zones: Vec<ZoneSnapshot>,
    pub corroded_tiles: usize,
    /// Highest corroded/placed ratio reached so far.
    pub corrosion_peak: CorrosionMark,
    pub seed: TileCoord,
    pub escape_exit: Option<TileCoord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub letter: char,
    pub entered: bool,
    /// Set only once the zone's card has been revealed.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementProgress {
    pub placed: usize,
    pub total: usize,
    pub next: Option<PlayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckCounts {
    pub path_tiles: usize,
    pub effects: usize,
    pub effect_discards: usize,
    pub buttons: usize,
}

impl GameSnapshot {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.id == id)
    }
}

impl Game {
    /// Capture the full state.
    pub fn snapshot(&self) -> GameSnapshot {
        let board = self.board();
        let mut floors: BTreeMap<i32, Vec<Tile>> = BTreeMap::new();
        for tile in board.tiles() {
            floors.entry(tile.coord.floor).or_default().push(tile.clone());
        }

        let placement = (self.state() == SessionState::PawnPlacement).then(|| PlacementProgress {
            placed: self.pawns_placed(),
            total: self.turn_order().len(),
            next: self.next_to_place(),
        });

        let log: Vec<LogEntry> = self.log().cloned().collect();
        let log = log[log.len().saturating_sub(SNAPSHOT_LOG_ENTRIES)..].to_vec();

        GameSnapshot {
            session_id: self.id.clone(),
            state: self.state(),
            phase: self.phase(),
            round: self.round(),
            total_actions: self.total_actions(),
            active_player: self.active_player_id(),
            turn_order: self.turn_order().to_vec(),
            players: self.players().map(PlayerSnapshot::from).collect(),
            board: BoardSnapshot {
                floors,
                zones: board
                    .zones()
                    .map(|z| ZoneSnapshot {
                        letter: z.letter,
                        entered: z.entered,
                        name: z.revealed_name().map(str::to_string),
                    })
                    .collect(),
                corroded_tiles: board.corroded_count(),
                corrosion_peak: board.corrosion_peak(),
                seed: board.seed(),
                escape_exit: board.escape_exit(),
            },
            placement,
            outcome: self.outcome().cloned(),
            decks: DeckCounts {
                path_tiles: self.decks().path_tiles.remaining(),
                effects: self.decks().effects.remaining(),
                effect_discards: self.decks().effects.discarded(),
                buttons: self.decks().buttons.remaining(),
            },
            active_sources: self.active_sources().iter().map(|s| s.kind).collect(),
            purified_sources: self.purified_sources(),
            power_surge: self.power_surge(),
            log,
        }
    }

    /// Snapshot rendered as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        self.snapshot().to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::config::{EngineConfig, DEFAULT_ZONE_NAMES};
    use pretty_assertions::assert_eq;

    fn placed_game() -> Game {
        let mut game = Game::new("SNAP", EngineConfig::default(), 21);
        game.add_player(PlayerId(1), "A").unwrap();
        game.add_player(PlayerId(2), "B").unwrap();
        game.start().unwrap();
        game
    }

    #[test]
    fn test_placement_progress() {
        let mut game = placed_game();
        let snap = game.snapshot();
        let progress = snap.placement.unwrap();
        assert_eq!((progress.placed, progress.total), (0, 2));
        assert_eq!(progress.next, Some(game.turn_order()[0]));

        let order = game.turn_order().to_vec();
        game.place_pawn(order[0], Position::new(2, 2, 2, 0, 0)).unwrap();
        game.place_pawn(order[1], Position::new(2, 2, 2, 1, 0)).unwrap();
        let snap = game.snapshot();
        assert!(snap.placement.is_none());
        assert_eq!(snap.active_player, Some(order[0]));
    }

    #[test]
    fn test_zone_names_hidden_until_revealed() {
        let mut game = placed_game();
        let order = game.turn_order().to_vec();
        game.place_pawn(order[0], Position::new(2, 2, 2, 0, 0)).unwrap();

        let snap = game.snapshot();
        let zone_b = snap.board.zones.iter().find(|z| z.letter == 'B').unwrap();
        assert!(zone_b.entered);
        assert_eq!(zone_b.name, None);
        let json = snap.to_json().to_string();
        for name in DEFAULT_ZONE_NAMES {
            assert!(!json.contains(name));
        }
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut game = placed_game();
        let order = game.turn_order().to_vec();
        game.place_pawn(order[0], Position::new(2, 2, 2, 0, 0)).unwrap();
        game.place_pawn(order[1], Position::new(2, 2, 2, 1, 0)).unwrap();

        let snap = game.snapshot();
        let text = serde_json::to_string(&snap).unwrap();
        let back: GameSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snap);
        assert_eq!(serde_json::to_string(&back).unwrap(), text);
    }

    #[test]
    fn test_round_trip_with_partial_corrosion() {
        use crate::state::cards::{CardId, PathTileCard, SquareKind, TileKind};
        use crate::state::rng::GameRng;

        let mut game = placed_game();
        let mut rng = GameRng::new(5);
        let slots = [(1, 1), (2, 1), (3, 1), (1, 2), (3, 2), (1, 3), (2, 3), (3, 3), (0, 2), (4, 2)];
        for (i, (x, y)) in slots.into_iter().enumerate() {
            let card = PathTileCard { id: CardId(900 + i as u32), kind: TileKind::Basic, layout: [SquareKind::Normal; 16] };
            game.board_mut().place_tile(TileCoord::new(2, x, y), card, &mut rng).unwrap();
        }
        assert!(game.board_mut().corrode(TileCoord::new(2, 4, 2)));

        let snap = game.snapshot();
        assert_eq!(snap.board.corrosion_peak, CorrosionMark::new(1, 11));
        assert_eq!(snap.board.corroded_tiles, 1);

        let text = serde_json::to_string(&snap).unwrap();
        let back: GameSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snap);
        assert_eq!(back.board.corrosion_peak.fraction(), game.board().corroded_fraction());
    }

    #[test]
    fn test_snapshot_log_is_trimmed() {
        let mut game = placed_game();
        for i in 0..30 {
            game.record(None, format!("line {}", i));
        }
        let snap = game.snapshot();
        assert_eq!(snap.log.len(), SNAPSHOT_LOG_ENTRIES);
        assert_eq!(snap.log.last().unwrap().message, "line 29");
    }
}
