//! Game session state: the turn engine.
//!
//! One `Game` owns the board, the roster, the decks and the seeded RNG of a
//! single session and is the only thing allowed to mutate them. Every entry
//! point validates completely before it mutates, so a rejected call leaves
//! the game exactly as it was.
//!
//! # Session states
//!
//! ```text
//! ┌───────────────────┐  start   ┌───────────────┐  last pawn  ┌─────────┐  outcome  ┌──────────┐
//! │ WaitingForPlayers │─────────▶│ PawnPlacement │────────────▶│ Playing │──────────▶│ Finished │
//! └───────────────────┘          └───────────────┘             └─────────┘           └──────────┘
//! ```
//!
//! A turn inside `Playing` follows roll → move → explore/fall → interaction →
//! end turn, enforced by the per-turn flags in [`TurnFlags`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::board::{Board, BoardError, Position, TileCoord};
use super::cards::{AnomalyCard, DeckError, Decks, EffectCard, ItemKind};
use super::config::EngineConfig;
use super::player::{Player, PlayerError, PlayerId};
use super::rng::GameRng;

/// Re-roll rounds used to break order ties before falling back to join order.
const ORDER_TIE_REROLLS: usize = 3;

/// Session state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Accepting joins
    #[default]
    WaitingForPlayers,
    /// Players place pawns on the seed tile in turn order
    PawnPlacement,
    /// Turns in progress
    Playing,
    /// Outcome decided
    Finished,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitingForPlayers => "waiting_for_players",
            Self::PawnPlacement => "pawn_placement",
            Self::Playing => "playing",
            Self::Finished => "finished",
        }
    }

    /// Check if turns can be played.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Board phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Exploration,
    Mutation,
    EndGame,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exploration => "exploration",
            Self::Mutation => "mutation",
            Self::EndGame => "end_game",
        }
    }

    /// Mutation and EndGame: anomalies are biased, elevators can fail and
    /// corrosion spreads.
    pub fn is_mutated(&self) -> bool {
        !matches!(self, Self::Exploration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictoryKind {
    Escape,
    Research,
    Purification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefeatReason {
    Corrosion,
}

/// How a finished game ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Victory { kind: VictoryKind, winners: Vec<PlayerId> },
    Defeat { reason: DefeatReason },
}

/// What the active player has done this turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnFlags {
    pub rolled: bool,
    /// Squares whose pass-through effect already fired this turn.
    pub fired: Vec<Position>,
    /// Stairwell tile passed this turn.
    pub stairwell_access: Option<Position>,
    /// Elevator room passed this turn.
    pub elevator_access: Option<Position>,
    /// The elevator malfunctioned; no more rides this turn.
    pub elevator_jammed: bool,
    pub explored: u32,
    pub fell: bool,
    pub interacted: bool,
}

/// One line of the game log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: chrono::DateTime<chrono::Utc>,
    pub round: u32,
    pub player: Option<PlayerId>,
    pub message: String,
}

/// Game errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("it's not your turn")]
    NotYourTurn,
    #[error("invalid destination")]
    InvalidDestination,
    #[error("another pawn is in the way")]
    TileOccupied,
    #[error("the elevator malfunctioned")]
    ElevatorMalfunction,
    #[error("the game is not in progress")]
    NotPlaying,
    #[error("the game is over")]
    GameFinished,
    #[error("movement already rolled this turn")]
    AlreadyRolled,
    #[error("roll for movement first")]
    NotRolled,
    #[error("not at the end of a path")]
    PathNotEnded,
    #[error("exploration is not available")]
    ExploreUnavailable,
    #[error("falling is not available")]
    FallUnavailable,
    #[error("that action is out of sequence")]
    OutOfSequence,
    #[error("disorder levels are too far apart")]
    DisorderGapTooLarge,
    #[error("already interacted this turn")]
    InteractionUsed,
    #[error("players are not on the same tile")]
    NotOnSameTile,
    #[error("that item can't be used now")]
    ItemNotUsable,
    #[error("no elevator within reach")]
    NotAnElevator,
    #[error("not enough players to start")]
    NotEnoughPlayers,
    #[error("the game has already started")]
    AlreadyStarted,
    #[error("player not found")]
    PlayerNotFound,
    #[error("the session is full")]
    SessionFull,
    #[error("that name is taken")]
    DuplicateName,
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Player(#[from] PlayerError),
}

impl GameError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotYourTurn => "not_your_turn",
            Self::InvalidDestination => "invalid_destination",
            Self::TileOccupied => "tile_occupied",
            Self::ElevatorMalfunction => "elevator_malfunction",
            Self::NotPlaying => "not_playing",
            Self::GameFinished => "game_finished",
            Self::AlreadyRolled => "already_rolled",
            Self::NotRolled => "not_rolled",
            Self::PathNotEnded => "path_not_ended",
            Self::ExploreUnavailable => "explore_unavailable",
            Self::FallUnavailable => "fall_unavailable",
            Self::OutOfSequence => "out_of_sequence",
            Self::DisorderGapTooLarge => "disorder_gap_too_large",
            Self::InteractionUsed => "interaction_used",
            Self::NotOnSameTile => "not_on_same_tile",
            Self::ItemNotUsable => "item_not_usable",
            Self::NotAnElevator => "not_an_elevator",
            Self::NotEnoughPlayers => "not_enough_players",
            Self::AlreadyStarted => "already_started",
            Self::PlayerNotFound => "player_not_found",
            Self::SessionFull => "session_full",
            Self::DuplicateName => "duplicate_name",
            Self::Board(e) => e.kind(),
            Self::Deck(DeckError::Exhausted) => "deck_exhausted",
            Self::Player(e) => e.kind(),
        }
    }
}

/// Authoritative state of one session.
#[derive(Debug, Clone)]
pub struct Game {
    /// Session identifier
    pub id: String,

    pub(crate) config: EngineConfig,
    pub(crate) rng: GameRng,

    state: SessionState,
    pub(crate) phase: Phase,

    /// Current round (1-indexed once playing)
    pub(crate) round: u32,

    /// Accepted player actions so far
    pub(crate) total_actions: u32,

    /// Players in join order
    pub(crate) players: Vec<Player>,

    /// Turn order fixed at start
    turn_order: Vec<PlayerId>,

    /// Index into `turn_order` of the active player
    active_index: usize,

    /// Pawns placed so far during `PawnPlacement`
    placed: usize,

    pub(crate) board: Board,
    pub(crate) decks: Decks,
    pub(crate) flags: TurnFlags,

    /// Source anomalies in play
    pub(crate) active_sources: Vec<AnomalyCard>,
    pub(crate) purified_sources: usize,

    /// Elevators are out until the round ends
    pub(crate) power_surge: bool,

    outcome: Option<Outcome>,
    log: VecDeque<LogEntry>,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Game {
    /// Create a game with freshly shuffled standard decks.
    pub fn new(id: impl Into<String>, config: EngineConfig, seed: u64) -> Self {
        let mut rng = GameRng::new(seed);
        let decks = Decks::standard(&config, &mut rng);
        Self::build(id.into(), config, rng, decks)
    }

    /// Create a game over pre-built decks.
    pub fn with_decks(id: impl Into<String>, config: EngineConfig, seed: u64, decks: Decks) -> Self {
        Self::build(id.into(), config, GameRng::new(seed), decks)
    }

    fn build(id: String, config: EngineConfig, rng: GameRng, mut decks: Decks) -> Self {
        let seed_id = decks.allocate_id();
        let names = std::mem::take(&mut decks.zone_names);
        let board = Board::new(&config, seed_id, names);
        Self {
            id,
            config,
            rng,
            state: SessionState::WaitingForPlayers,
            phase: Phase::Exploration,
            round: 0,
            total_actions: 0,
            players: Vec::new(),
            turn_order: Vec::new(),
            active_index: 0,
            placed: 0,
            board,
            decks,
            flags: TurnFlags::default(),
            active_sources: Vec::new(),
            purified_sources: 0,
            power_surge: false,
            outcome: None,
            log: VecDeque::new(),
            created_at: chrono::Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    // -- lifecycle ------------------------------------------------------------

    /// Seat a player. Only valid while waiting for players.
    pub fn add_player(&mut self, id: PlayerId, name: &str) -> Result<(), GameError> {
        if self.state != SessionState::WaitingForPlayers {
            return Err(GameError::AlreadyStarted);
        }
        if self.players.len() >= self.config.max_players {
            return Err(GameError::SessionFull);
        }
        if self.players.iter().any(|p| p.name.eq_ignore_ascii_case(name)) {
            return Err(GameError::DuplicateName);
        }
        let number = self.players.len() as u8 + 1;
        self.players.push(Player::new(id, name, number, self.config.starting_floor));
        self.record(Some(id), format!("{} joined", name));
        Ok(())
    }

    /// Fix turn order, deal starting hands and move to pawn placement.
    pub fn start(&mut self) -> Result<(), GameError> {
        if self.state != SessionState::WaitingForPlayers {
            return Err(GameError::AlreadyStarted);
        }
        if self.players.len() < self.config.min_players {
            return Err(GameError::NotEnoughPlayers);
        }

        let all: Vec<usize> = (0..self.players.len()).collect();
        let order = self.roll_order(all, 0);
        self.turn_order = order.iter().map(|&i| self.players[i].id).collect();

        let hand_limit = self.config.hand_limit;
        for index in 0..self.players.len() {
            for _ in 0..self.config.starting_hand {
                let Some(EffectCard::Item(card)) = self.decks.effects.draw_where(&mut self.rng, EffectCard::is_item)
                else {
                    break;
                };
                if let Err(PlayerError::HandFull) = self.players[index].add_to_hand(card, hand_limit) {
                    self.decks.effects.discard(EffectCard::Item(card));
                }
            }
        }

        self.state = SessionState::PawnPlacement;
        self.placed = 0;
        self.started_at = Some(chrono::Utc::now());
        log::info!("game {} started with {} players", self.id, self.players.len());
        self.record(None, "turn order fixed".to_string());
        Ok(())
    }

    /// Order `indices` by descending d12 roll, re-rolling ties among the tied
    /// players. Join order settles whatever is still tied.
    fn roll_order(&mut self, indices: Vec<usize>, depth: usize) -> Vec<usize> {
        let mut rolled: Vec<(u32, usize)> = indices
            .into_iter()
            .map(|i| (self.rng.roll(self.config.order_die), i))
            .collect();
        if depth == 0 {
            for &(roll, i) in &rolled {
                self.players[i].order_roll = Some(roll);
            }
        }
        rolled.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut order = Vec::with_capacity(rolled.len());
        let mut start = 0;
        while start < rolled.len() {
            let roll = rolled[start].0;
            let end = start + rolled[start..].iter().take_while(|(r, _)| *r == roll).count();
            let group: Vec<usize> = rolled[start..end].iter().map(|(_, i)| *i).collect();
            if group.len() > 1 && depth < ORDER_TIE_REROLLS {
                order.extend(self.roll_order(group, depth + 1));
            } else {
                order.extend(group);
            }
            start = end;
        }
        order
    }

    /// Place the next pawn on the seed tile. The last placement starts play.
    pub fn place_pawn(&mut self, player_id: PlayerId, position: Position) -> Result<(), GameError> {
        if self.state == SessionState::Finished {
            return Err(GameError::GameFinished);
        }
        if self.state != SessionState::PawnPlacement {
            return Err(GameError::OutOfSequence);
        }
        if self.player(player_id).is_none() {
            return Err(GameError::PlayerNotFound);
        }
        if self.turn_order.get(self.placed) != Some(&player_id) {
            return Err(GameError::NotYourTurn);
        }
        if position.tile() != self.board.seed() || !self.board.is_movable(&position, false) {
            return Err(GameError::InvalidDestination);
        }
        if self.is_occupied(&position, player_id) {
            return Err(GameError::TileOccupied);
        }

        let zone = self.board.tile_at(&position).map(|t| t.zone);
        if let Some(player) = self.player_mut(player_id) {
            player.position = Some(position);
            player.floor = position.floor;
        }
        if let Some(zone) = zone {
            self.board.enter_zone(zone, &mut self.rng);
        }
        self.placed += 1;
        self.record(Some(player_id), "placed a pawn".to_string());

        if self.placed == self.turn_order.len() {
            self.state = SessionState::Playing;
            self.round = 1;
            self.active_index = 0;
            self.begin_turn();
            log::info!("game {} is now playing", self.id);
        }
        Ok(())
    }

    // -- turns ------------------------------------------------------------------

    pub(crate) fn begin_turn(&mut self) {
        self.flags = TurnFlags::default();
        if let Some(id) = self.active_player_id() {
            if let Some(player) = self.player_mut(id) {
                player.clear_movement();
            }
        }
    }

    /// Pass the turn on; wrapping the order closes the round.
    pub(crate) fn advance_turn(&mut self) -> (Option<PlayerId>, u32) {
        if let Some(id) = self.active_player_id() {
            if let Some(player) = self.player_mut(id) {
                player.clear_movement();
            }
        }
        self.active_index = (self.active_index + 1) % self.turn_order.len().max(1);
        if self.active_index == 0 {
            self.end_round();
            self.round += 1;
        }
        self.begin_turn();
        (self.active_player_id(), self.round)
    }

    fn end_round(&mut self) {
        if self.phase.is_mutated() {
            let chance = self.config.corrosion_spread_chance
                + self.config.anomaly_source_pressure * self.active_sources.len() as f64;
            let spread = self.board.spread_corrosion(chance, &mut self.rng);
            if !spread.is_empty() {
                self.record(None, format!("corrosion spread to {} tiles", spread.len()));
            }
        }
        for index in 0..self.players.len() {
            for card in self.players[index].tick_effects() {
                self.decks.effects.discard(EffectCard::Item(card));
            }
        }
        self.power_surge = false;
    }

    /// Advance the phase when its action or round threshold is reached.
    pub(crate) fn check_phase(&mut self) {
        let phases = self.config.phases.clone();
        if self.phase == Phase::Exploration && self.reached(phases.mutation_after_actions, phases.mutation_at_round) {
            self.enter_phase(Phase::Mutation);
        }
        if self.phase == Phase::Mutation && self.reached(phases.end_game_after_actions, phases.end_game_at_round) {
            self.enter_phase(Phase::EndGame);
        }
    }

    fn reached(&self, actions: u32, round: Option<u32>) -> bool {
        self.total_actions >= actions || round.is_some_and(|r| self.round >= r)
    }

    fn enter_phase(&mut self, phase: Phase) {
        self.phase = phase;
        log::info!("game {} entered {} phase", self.id, phase.as_str());
        self.record(None, format!("the building shifts: {} phase", phase.as_str()));
        match phase {
            Phase::Mutation => {
                if self.board.corroded_count() == 0 {
                    self.board.corrode_random(&mut self.rng);
                }
            }
            Phase::EndGame => {
                let id = self.decks.allocate_id();
                match self.board.spawn_escape_exit(id, &mut self.rng) {
                    Some(exit) => self.record(None, format!("an exit appeared on floor {}", exit.floor)),
                    None => log::warn!("game {}: no free top-floor slot for the escape exit", self.id),
                }
            }
            Phase::Exploration => {}
        }
    }

    // -- outcome ----------------------------------------------------------------

    /// Decide victory or defeat. Victory is checked first; the acting player
    /// is considered before the rest of the turn order.
    pub(crate) fn evaluate_outcome(&mut self, actor: Option<PlayerId>) {
        if self.state == SessionState::Finished {
            return;
        }
        let mut candidates: Vec<PlayerId> = actor.into_iter().collect();
        candidates.extend(self.turn_order.iter().copied().filter(|id| Some(*id) != actor));

        let victory = candidates
            .iter()
            .find_map(|&id| self.victory_for(id).map(|kind| (id, kind)));

        if let Some((trigger, kind)) = victory {
            let winners = self.companions_of(trigger);
            log::info!("game {} won by {:?} ({:?})", self.id, winners, kind);
            self.record(Some(trigger), format!("{:?} victory", kind));
            self.finish(Outcome::Victory { kind, winners });
        } else if self.board.corroded_fraction() >= self.config.collective_failure_fraction {
            log::info!("game {} lost to corrosion", self.id);
            self.record(None, "the building is consumed by corrosion".to_string());
            self.finish(Outcome::Defeat { reason: DefeatReason::Corrosion });
        }
    }

    fn victory_for(&self, id: PlayerId) -> Option<VictoryKind> {
        let player = self.player(id)?;
        let on_exit = player
            .position
            .is_some_and(|p| self.board.is_escape_exit(p.tile()) && p.floor == self.board.top_floor());
        if on_exit && player.count_matching(&self.config.escape_items) >= self.config.escape_items_required {
            return Some(VictoryKind::Escape);
        }
        if player.count_items(ItemKind::ExperimentReport) >= self.config.experiment_reports_required {
            return Some(VictoryKind::Research);
        }
        if self.decks.anomaly_sources > 0 && self.purified_sources >= self.decks.anomaly_sources {
            return Some(VictoryKind::Purification);
        }
        None
    }

    /// The player plus everyone standing on the same tile.
    fn companions_of(&self, trigger: PlayerId) -> Vec<PlayerId> {
        let tile = self.player(trigger).and_then(|p| p.position).map(|p| p.tile());
        let mut winners = vec![trigger];
        winners.extend(
            self.turn_order
                .iter()
                .copied()
                .filter(|id| *id != trigger)
                .filter(|id| tile.is_some() && self.player(*id).and_then(|p| p.position).map(|p| p.tile()) == tile),
        );
        winners
    }

    fn finish(&mut self, outcome: Outcome) {
        self.outcome = Some(outcome);
        self.state = SessionState::Finished;
        self.ended_at = Some(chrono::Utc::now());
        for player in &mut self.players {
            player.clear_movement();
        }
    }

    // -- queries ----------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn total_actions(&self) -> u32 {
        self.total_actions
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Direct board access for scenario setup.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn decks(&self) -> &Decks {
        &self.decks
    }

    pub fn flags(&self) -> &TurnFlags {
        &self.flags
    }

    pub fn active_sources(&self) -> &[AnomalyCard] {
        &self.active_sources
    }

    pub fn purified_sources(&self) -> usize {
        self.purified_sources
    }

    pub fn power_surge(&self) -> bool {
        self.power_surge
    }

    pub fn log(&self) -> impl Iterator<Item = &LogEntry> {
        self.log.iter()
    }

    pub fn turn_order(&self) -> &[PlayerId] {
        &self.turn_order
    }

    /// Pawns placed so far during placement.
    pub fn pawns_placed(&self) -> usize {
        self.placed
    }

    /// Whose pawn is expected next during placement.
    pub fn next_to_place(&self) -> Option<PlayerId> {
        if self.state == SessionState::PawnPlacement {
            self.turn_order.get(self.placed).copied()
        } else {
            None
        }
    }

    /// The player holding the turn. Only set while playing.
    pub fn active_player_id(&self) -> Option<PlayerId> {
        if self.state == SessionState::Playing {
            self.turn_order.get(self.active_index).copied()
        } else {
            None
        }
    }

    pub fn is_player_turn(&self, id: PlayerId) -> bool {
        self.active_player_id() == Some(id)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Direct player access for scenario setup.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn has_player(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Whether a pawn other than `except` stands on `pos`.
    pub fn is_occupied(&self, pos: &Position, except: PlayerId) -> bool {
        self.players.iter().any(|p| p.id != except && p.position.as_ref() == Some(pos))
    }

    /// Pawns other than `except` standing on the tile.
    pub fn pawns_on_tile(&self, tile: TileCoord, except: PlayerId) -> Vec<Position> {
        self.players
            .iter()
            .filter(|p| p.id != except)
            .filter_map(|p| p.position)
            .filter(|p| p.tile() == tile)
            .collect()
    }

    pub(crate) fn record(&mut self, player: Option<PlayerId>, message: String) {
        if self.log.len() >= self.config.log_capacity.max(1) {
            self.log.pop_front();
        }
        self.log.push_back(LogEntry {
            at: chrono::Utc::now(),
            round: self.round,
            player,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::cards::{CardId, ItemCard};
    use pretty_assertions::assert_eq;

    fn make_game(players: u64) -> Game {
        let mut game = Game::new("TEST", EngineConfig::default(), 42);
        for i in 1..=players {
            game.add_player(PlayerId(i), &format!("Player{}", i)).unwrap();
        }
        game
    }

    fn started(players: u64) -> Game {
        let mut game = make_game(players);
        game.start().unwrap();
        let order = game.turn_order().to_vec();
        for (i, id) in order.into_iter().enumerate() {
            game.place_pawn(id, Position::new(2, 2, 2, i as u8, 0)).unwrap();
        }
        game
    }

    #[test]
    fn test_game_new() {
        let game = make_game(0);
        assert_eq!(game.state(), SessionState::WaitingForPlayers);
        assert_eq!(game.phase(), Phase::Exploration);
        assert_eq!(game.board().tile_count(), 1);
        assert!(game.active_player_id().is_none());
    }

    #[test]
    fn test_add_players() {
        let mut game = make_game(2);
        assert_eq!(game.add_player(PlayerId(9), "player1"), Err(GameError::DuplicateName));
        for i in 3..=6 {
            game.add_player(PlayerId(i), &format!("P{}", i)).unwrap();
        }
        assert_eq!(game.add_player(PlayerId(7), "Seventh"), Err(GameError::SessionFull));
        assert_eq!(game.players().map(|p| p.player_number).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_start_requires_players() {
        let mut game = make_game(1);
        assert_eq!(game.start(), Err(GameError::NotEnoughPlayers));
        game.add_player(PlayerId(2), "Two").unwrap();
        game.start().unwrap();
        assert_eq!(game.state(), SessionState::PawnPlacement);
        assert_eq!(game.start(), Err(GameError::AlreadyStarted));
        assert_eq!(game.add_player(PlayerId(3), "Late"), Err(GameError::AlreadyStarted));
    }

    #[test]
    fn test_turn_order_and_starting_hands() {
        let mut game = make_game(4);
        game.start().unwrap();
        let order = game.turn_order().to_vec();
        assert_eq!(order.len(), 4);

        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, vec![PlayerId(1), PlayerId(2), PlayerId(3), PlayerId(4)]);

        let first_rolls: Vec<u32> = order
            .iter()
            .map(|id| game.player(*id).unwrap().order_roll.unwrap())
            .collect();
        assert!(first_rolls.windows(2).all(|w| w[0] >= w[1]));

        for player in game.players() {
            assert_eq!(player.hand().len(), 3);
        }
        assert_eq!(game.decks().effects.remaining(), 80 - 12);
    }

    #[test]
    fn test_pawn_placement_order() {
        let mut game = make_game(2);
        game.start().unwrap();
        let order = game.turn_order().to_vec();

        // Out of order
        let err = game.place_pawn(order[1], Position::new(2, 2, 2, 0, 0));
        assert_eq!(err, Err(GameError::NotYourTurn));

        // Off the seed tile
        let err = game.place_pawn(order[0], Position::new(2, 3, 2, 0, 0));
        assert_eq!(err, Err(GameError::InvalidDestination));

        game.place_pawn(order[0], Position::new(2, 2, 2, 0, 0)).unwrap();
        assert_eq!(game.next_to_place(), Some(order[1]));

        let err = game.place_pawn(order[1], Position::new(2, 2, 2, 0, 0));
        assert_eq!(err, Err(GameError::TileOccupied));

        game.place_pawn(order[1], Position::new(2, 2, 2, 1, 0)).unwrap();
        assert_eq!(game.state(), SessionState::Playing);
        assert_eq!(game.round(), 1);
        assert_eq!(game.active_player_id(), Some(order[0]));
        assert!(game.board().zone('B').unwrap().entered);
    }

    #[test]
    fn test_advance_turn_wraps_round() {
        let mut game = started(3);
        let order = game.turn_order().to_vec();

        assert_eq!(game.advance_turn(), (Some(order[1]), 1));
        assert_eq!(game.advance_turn(), (Some(order[2]), 1));
        assert_eq!(game.advance_turn(), (Some(order[0]), 2));
    }

    #[test]
    fn test_phase_thresholds() {
        let mut game = started(2);
        game.total_actions = 50;
        game.check_phase();
        assert_eq!(game.phase(), Phase::Mutation);
        assert_eq!(game.board().corroded_count(), 0, "only the seed tile exists");

        game.total_actions = 100;
        game.check_phase();
        assert_eq!(game.phase(), Phase::EndGame);
        let exit = game.board().escape_exit().unwrap();
        assert_eq!(exit.floor, 5);
    }

    #[test]
    fn test_research_victory_shares_tile() {
        let mut game = started(3);
        let order = game.turn_order().to_vec();
        let reports: Vec<ItemCard> = (0..7)
            .map(|i| ItemCard { id: CardId(900 + i), kind: ItemKind::ExperimentReport })
            .collect();
        let researcher = game.player_mut(order[0]).unwrap();
        for card in reports {
            researcher.add_to_hand(card, 20).unwrap();
        }
        // Third player wanders off to another floor
        game.player_mut(order[2]).unwrap().position = Some(Position::new(1, 2, 2, 0, 0));

        game.evaluate_outcome(Some(order[0]));
        assert_eq!(game.state(), SessionState::Finished);
        assert_eq!(
            game.outcome(),
            Some(&Outcome::Victory { kind: VictoryKind::Research, winners: vec![order[0], order[1]] })
        );
    }

    #[test]
    fn test_corrosion_defeat() {
        let mut game = started(2);
        game.board_mut().corrode(TileCoord::new(2, 2, 2));
        game.evaluate_outcome(None);
        assert_eq!(game.outcome(), Some(&Outcome::Defeat { reason: DefeatReason::Corrosion }));
        assert!(game.active_player_id().is_none());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(GameError::NotYourTurn.kind(), "not_your_turn");
        assert_eq!(GameError::from(BoardError::OccupiedSlot).kind(), "occupied_slot");
        assert_eq!(GameError::from(DeckError::Exhausted).kind(), "deck_exhausted");
        assert_eq!(GameError::from(PlayerError::CardNotFound).kind(), "card_not_found");
    }

    #[test]
    fn test_log_is_bounded() {
        let mut game = make_game(2);
        for i in 0..120 {
            game.record(None, format!("entry {}", i));
        }
        assert_eq!(game.log().count(), 50);
        assert_eq!(game.log().last().unwrap().message, "entry 119");
    }
}
