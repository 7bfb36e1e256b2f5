//! Player actions.
//!
//! [`Game::apply_action`] is the single entry point for in-turn actions. Each
//! handler checks everything it needs first and only then touches state, so a
//! rejected action leaves the game untouched.

use serde::{Deserialize, Serialize};

use super::board::{BoardError, Direction, Position, TileCoord, Vertical};
use super::cards::{Card, CardId, DeckError, PathTileCard, SquareKind, TileKind};
use super::game::{Game, GameError, SessionState};
use super::player::{PlayerError, PlayerId};

/// An in-turn action submitted by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PlayerAction {
    Roll,
    Move {
        path: Vec<Position>,
    },
    Explore {
        direction: Direction,
        #[serde(default)]
        rotation: u8,
    },
    Fall,
    Meet {
        target: PlayerId,
        #[serde(default)]
        give: Option<CardId>,
        #[serde(default)]
        take: Option<CardId>,
    },
    Rob {
        target: PlayerId,
        card: CardId,
    },
    UseStairs {
        direction: Vertical,
    },
    UseElevator {
        floor: i32,
        #[serde(default)]
        zone: Option<char>,
    },
    UseItem {
        card: CardId,
        #[serde(default)]
        with: Option<CardId>,
    },
    EndTurn,
}

impl PlayerAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Roll => "roll",
            Self::Move { .. } => "move",
            Self::Explore { .. } => "explore",
            Self::Fall => "fall",
            Self::Meet { .. } => "meet",
            Self::Rob { .. } => "rob",
            Self::UseStairs { .. } => "use_stairs",
            Self::UseElevator { .. } => "use_elevator",
            Self::UseItem { .. } => "use_item",
            Self::EndTurn => "end_turn",
        }
    }
}

/// What an accepted action did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReport {
    pub player: PlayerId,
    pub action: String,
    /// Human-readable effects, in order.
    pub events: Vec<String>,
    /// Cards revealed while resolving the action.
    pub cards: Vec<Card>,
}

impl ActionReport {
    pub fn new(player: PlayerId, action: &str) -> Self {
        Self {
            player,
            action: action.to_string(),
            events: Vec::new(),
            cards: Vec::new(),
        }
    }

    pub fn note(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    pub fn reveal(&mut self, card: impl Into<Card>) {
        self.cards.push(card.into());
    }
}

/// How a pawn reaches the floor below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Landing {
    /// Onto a square of a tile already there.
    Existing(Position),
    /// Onto a freshly drawn tile; the sub-square is preferred, not guaranteed.
    Draw(TileCoord, (u8, u8)),
}

impl Game {
    /// Validate and apply one in-turn action.
    pub fn apply_action(&mut self, actor: PlayerId, action: &PlayerAction) -> Result<ActionReport, GameError> {
        match self.state() {
            SessionState::Finished => return Err(GameError::GameFinished),
            SessionState::Playing => {}
            _ => return Err(GameError::NotPlaying),
        }
        if !self.has_player(actor) {
            return Err(GameError::PlayerNotFound);
        }
        if !self.is_player_turn(actor) {
            return Err(GameError::NotYourTurn);
        }

        let mut report = ActionReport::new(actor, action.name());
        let result = match action {
            PlayerAction::Roll => self.roll(actor, &mut report),
            PlayerAction::Move { path } => self.move_pawn(actor, path, &mut report),
            PlayerAction::Explore { direction, rotation } => self.explore(actor, *direction, *rotation, &mut report),
            PlayerAction::Fall => self.fall(actor, &mut report),
            PlayerAction::Meet { target, give, take } => self.meet(actor, *target, *give, *take, &mut report),
            PlayerAction::Rob { target, card } => self.rob(actor, *target, *card, &mut report),
            PlayerAction::UseStairs { direction } => self.use_stairs(actor, *direction, &mut report),
            PlayerAction::UseElevator { floor, zone } => self.use_elevator(actor, *floor, *zone, &mut report),
            PlayerAction::UseItem { card, with } => self.use_item(actor, *card, *with, &mut report),
            PlayerAction::EndTurn => self.end_turn(actor, &mut report),
        };
        if let Err(e) = result {
            log::debug!("game {}: {} rejected {}: {}", self.id, actor, action.name(), e.kind());
            return Err(e);
        }

        self.total_actions += 1;
        self.check_phase();
        self.evaluate_outcome(Some(actor));
        let summary = if report.events.is_empty() {
            action.name().to_string()
        } else {
            format!("{}: {}", action.name(), report.events.join("; "))
        };
        log::debug!("game {}: {} {}", self.id, actor, summary);
        self.record(Some(actor), summary);
        Ok(report)
    }

    // -- helpers ----------------------------------------------------------------

    fn position_of(&self, id: PlayerId) -> Result<Position, GameError> {
        self.player(id)
            .ok_or(GameError::PlayerNotFound)?
            .position
            .ok_or(GameError::InvalidDestination)
    }

    /// Move, explore and fall need a roll and no interaction yet.
    fn require_movement(&self) -> Result<(), GameError> {
        if !self.flags.rolled {
            return Err(GameError::NotRolled);
        }
        if self.flags.interacted || self.flags.fell {
            return Err(GameError::OutOfSequence);
        }
        Ok(())
    }

    /// Whether the actor stands at a path end right now.
    fn at_path_end(&self, id: PlayerId) -> Result<Position, GameError> {
        let pos = self.position_of(id)?;
        let remaining = self.player(id).map_or(0, |p| p.remaining_movement());
        if remaining == 0 || self.board.open_edges(&pos).is_empty() {
            return Err(GameError::PathNotEnded);
        }
        Ok(pos)
    }

    fn is_disordered(&self, id: PlayerId) -> bool {
        self.player(id).is_some_and(|p| self.config.is_disordered(p.disorder()))
    }

    fn other_pawns(&self, id: PlayerId) -> Vec<Position> {
        self.players().filter(|p| p.id != id).filter_map(|p| p.position).collect()
    }

    /// Move a pawn onto `pos`, entering its zone.
    pub(crate) fn relocate(&mut self, id: PlayerId, pos: Position) {
        if let Some(player) = self.player_mut(id) {
            player.position = Some(pos);
            player.floor = pos.floor;
        }
        if let Some(zone) = self.board.tile_at(&pos).map(|t| t.zone) {
            self.board.enter_zone(zone, &mut self.rng);
        }
    }

    /// Where a pawn would land one floor down, if anywhere.
    pub(crate) fn plan_fall(&self, id: PlayerId) -> Option<Landing> {
        let pos = self.player(id)?.position?;
        if pos.floor <= self.board.bottom_floor() {
            return None;
        }
        let below = pos.tile().on_floor(pos.floor - 1);
        let sub = (pos.sub_x, pos.sub_y);
        if self.board.has_tile(below) {
            self.board
                .landing_square(below, sub, &self.other_pawns(id))
                .map(Landing::Existing)
        } else if self.decks.path_tiles.remaining() > 0 {
            Some(Landing::Draw(below, sub))
        } else {
            None
        }
    }

    /// Carry out a planned landing; returns where the pawn ended up.
    pub(crate) fn land(&mut self, id: PlayerId, landing: Landing, report: &mut ActionReport) -> Result<Position, GameError> {
        let pos = match landing {
            Landing::Existing(pos) => pos,
            Landing::Draw(coord, sub) => {
                let card = self.decks.path_tiles.draw_path_tile(&mut self.rng)?;
                report.reveal(card.clone());
                self.board.place_linked_tile(coord, card, &mut self.rng)?;
                let others = self.other_pawns(id);
                self.board
                    .landing_square(coord, sub, &others)
                    .unwrap_or_else(|| Position::on_tile(coord, sub.0, sub.1))
            }
        };
        self.relocate(id, pos);
        Ok(pos)
    }

    // -- handlers ---------------------------------------------------------------

    fn roll(&mut self, actor: PlayerId, report: &mut ActionReport) -> Result<(), GameError> {
        if self.flags.rolled {
            return Err(GameError::AlreadyRolled);
        }
        if self.flags.interacted {
            return Err(GameError::OutOfSequence);
        }
        let points = self.rng.roll(self.config.movement_die);
        if let Some(player) = self.player_mut(actor) {
            player.grant_movement(points);
        }
        self.flags.rolled = true;
        report.note(format!("rolled {}", points));
        Ok(())
    }

    fn move_pawn(&mut self, actor: PlayerId, path: &[Position], report: &mut ActionReport) -> Result<(), GameError> {
        self.require_movement()?;
        let remaining = self.player(actor).map_or(0, |p| p.remaining_movement());
        if path.is_empty() {
            return Err(GameError::InvalidDestination);
        }
        if path.len() as u32 > remaining {
            return Err(PlayerError::InsufficientMovement.into());
        }
        let crosses_walls = self.is_disordered(actor);
        let mut current = self.position_of(actor)?;
        for step in path {
            if !current.is_adjacent_to(step) || !self.board.is_movable(step, crosses_walls) {
                return Err(GameError::InvalidDestination);
            }
            if self.is_occupied(step, actor) {
                return Err(GameError::TileOccupied);
            }
            current = *step;
        }

        let mut triggered = Vec::new();
        for step in path {
            if let Some(player) = self.player_mut(actor) {
                player.consume_movement(1)?;
            }
            self.relocate(actor, *step);
            if let Some(square) = self.board.square_at(step) {
                if square.triggers_on_pass() && !self.flags.fired.contains(step) {
                    self.flags.fired.push(*step);
                    triggered.push((*step, square));
                }
            }
        }
        report.note(format!("moved {} squares", path.len()));

        for (pos, square) in triggered {
            self.fire_pass_square(actor, pos, square, report);
        }
        if let Some(last) = path.last() {
            if let Some(square) = self.board.square_at(last).filter(SquareKind::triggers_on_landing) {
                self.fire_landing_square(actor, *last, square, report);
            }
        }
        Ok(())
    }

    fn explore(
        &mut self,
        actor: PlayerId,
        direction: Direction,
        rotation: u8,
        report: &mut ActionReport,
    ) -> Result<(), GameError> {
        self.require_movement()?;
        let pos = self.at_path_end(actor)?;
        if !self.board.open_edges(&pos).contains(&direction) {
            return Err(GameError::PathNotEnded);
        }
        if self.is_disordered(actor) {
            return Err(GameError::ExploreUnavailable);
        }
        if self.decks.path_tiles.remaining() == 0 {
            return Err(DeckError::Exhausted.into());
        }
        let (dx, dy) = direction.delta();
        let target = pos.tile().offset(dx, dy);
        self.board.check_placement(target)?;

        let mut card: PathTileCard = self.decks.path_tiles.draw_path_tile(&mut self.rng)?;
        card.rotate(rotation);
        let kind = card.kind;
        report.reveal(card.clone());
        let zone = self.board.place_tile(target, card, &mut self.rng)?;
        self.flags.explored += 1;
        report.note(format!("explored {} and found a {} tile in zone {}", direction.as_str(), kind.as_str(), zone));

        if kind == TileKind::Disordered {
            if let Some(player) = self.player_mut(actor) {
                player.change_disorder(1);
            }
            report.note("the disordered tile unsettles the explorer");
        }
        Ok(())
    }

    fn fall(&mut self, actor: PlayerId, report: &mut ActionReport) -> Result<(), GameError> {
        self.require_movement()?;
        self.at_path_end(actor)?;
        let explore_available = !self.is_disordered(actor) && self.decks.path_tiles.remaining() > 0;
        if explore_available {
            return Err(GameError::FallUnavailable);
        }
        let landing = self.plan_fall(actor).ok_or(GameError::FallUnavailable)?;

        let pos = self.land(actor, landing, report)?;
        if let Some(player) = self.player_mut(actor) {
            player.change_disorder(-1);
            player.exhaust_movement();
        }
        self.flags.fell = true;
        report.note(format!("fell to floor {}", pos.floor));
        Ok(())
    }

    /// Shared checks for Meet and Rob.
    fn check_interaction(&self, actor: PlayerId, target: PlayerId) -> Result<(), GameError> {
        if self.flags.interacted {
            return Err(GameError::InteractionUsed);
        }
        if actor == target || !self.has_player(target) {
            return Err(GameError::PlayerNotFound);
        }
        let here = self.position_of(actor)?;
        let there = self.position_of(target).map_err(|_| GameError::NotOnSameTile)?;
        if here.tile() != there.tile() {
            return Err(GameError::NotOnSameTile);
        }
        Ok(())
    }

    fn meet(
        &mut self,
        actor: PlayerId,
        target: PlayerId,
        give: Option<CardId>,
        take: Option<CardId>,
        report: &mut ActionReport,
    ) -> Result<(), GameError> {
        self.check_interaction(actor, target)?;
        let (a, b) = match (self.player(actor), self.player(target)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(GameError::PlayerNotFound),
        };
        if a.disorder().abs_diff(b.disorder()) > self.config.meet_disorder_range {
            return Err(GameError::DisorderGapTooLarge);
        }
        if give.is_some_and(|id| a.card(id).is_none()) || take.is_some_and(|id| b.card(id).is_none()) {
            return Err(PlayerError::CardNotFound.into());
        }
        let limit = self.config.hand_limit;
        let a_after = a.hand().len() - give.iter().count() + take.iter().count();
        let b_after = b.hand().len() - take.iter().count() + give.iter().count();
        if a_after > limit || b_after > limit {
            return Err(PlayerError::HandFull.into());
        }

        let given = match give {
            Some(id) => self.player_mut(actor).map(|p| p.remove_from_hand(id)).transpose()?,
            None => None,
        };
        let taken = match take {
            Some(id) => self.player_mut(target).map(|p| p.remove_from_hand(id)).transpose()?,
            None => None,
        };
        let reduction = -(self.config.meet_disorder_reduction as i32);
        if let Some(player) = self.player_mut(actor) {
            if let Some(card) = taken {
                player.add_to_hand(card, limit)?;
            }
            player.change_disorder(reduction);
        }
        if let Some(player) = self.player_mut(target) {
            if let Some(card) = given {
                player.add_to_hand(card, limit)?;
            }
            player.change_disorder(reduction);
        }
        self.flags.interacted = true;
        report.note(format!("met {} and traded {} cards", target, given.iter().count() + taken.iter().count()));
        Ok(())
    }

    fn rob(&mut self, actor: PlayerId, target: PlayerId, card: CardId, report: &mut ActionReport) -> Result<(), GameError> {
        self.check_interaction(actor, target)?;
        let limit = self.config.hand_limit;
        if self.player(target).and_then(|p| p.card(card)).is_none() {
            return Err(PlayerError::CardNotFound.into());
        }
        if self.player(actor).map_or(0, |p| p.hand().len()) >= limit {
            return Err(PlayerError::HandFull.into());
        }

        let penalty = self.config.rob_disorder_penalty as i32;
        let stolen = match self.player_mut(target) {
            Some(victim) => {
                let stolen = victim.remove_from_hand(card)?;
                victim.change_disorder(penalty);
                stolen
            }
            None => return Err(GameError::PlayerNotFound),
        };
        if let Some(player) = self.player_mut(actor) {
            player.add_to_hand(stolen, limit)?;
        }
        self.flags.interacted = true;
        report.note(format!("robbed {} of {}", target, stolen.kind.name()));
        Ok(())
    }

    fn use_stairs(&mut self, actor: PlayerId, direction: Vertical, report: &mut ActionReport) -> Result<(), GameError> {
        if self.flags.interacted || self.flags.fell {
            return Err(GameError::OutOfSequence);
        }
        let pos = self.position_of(actor)?;
        let on_stairs = self.board.square_at(&pos) == Some(SquareKind::Stairwell);
        let stairs = (if on_stairs { Some(pos) } else { self.flags.stairwell_access })
            .filter(|p| self.board.tile_at(p).is_some_and(|t| t.kind == TileKind::Stairwell))
            .ok_or(BoardError::NotAStairwell)?;
        if !self.pawns_on_tile(stairs.tile(), actor).is_empty() {
            return Err(GameError::TileOccupied);
        }
        let destination = stairs.tile().on_floor(stairs.floor + direction.delta());
        if !self.board.in_bounds(destination) {
            return Err(BoardError::OutOfBounds.into());
        }
        let sub = (stairs.sub_x, stairs.sub_y);
        let landing = if self.board.has_tile(destination) {
            let pos = self
                .board
                .landing_square(destination, sub, &self.other_pawns(actor))
                .ok_or(GameError::InvalidDestination)?;
            Landing::Existing(pos)
        } else if self.decks.path_tiles.remaining() > 0 {
            Landing::Draw(destination, sub)
        } else {
            return Err(DeckError::Exhausted.into());
        };

        self.board.use_stairwell(&stairs, direction)?;
        let arrived = self.land(actor, landing, report)?;
        self.flags.stairwell_access = None;
        report.note(format!("took the stairs to floor {}", arrived.floor));
        Ok(())
    }

    fn use_elevator(
        &mut self,
        actor: PlayerId,
        floor: i32,
        zone: Option<char>,
        report: &mut ActionReport,
    ) -> Result<(), GameError> {
        if self.flags.interacted || self.flags.fell {
            return Err(GameError::OutOfSequence);
        }
        let pos = self.position_of(actor)?;
        let in_room = self.board.square_at(&pos) == Some(SquareKind::ElevatorRoom);
        let elevator = (if in_room { Some(pos) } else { self.flags.elevator_access })
            .filter(|p| self.board.square_at(p) == Some(SquareKind::ElevatorRoom))
            .ok_or(GameError::NotAnElevator)?;
        if self.power_surge || self.flags.elevator_jammed {
            return Err(GameError::ElevatorMalfunction);
        }
        if !self.config.floor_in_range(floor) {
            return Err(BoardError::OutOfBounds.into());
        }
        if !self.decks.buttons.can_draw() {
            return Err(DeckError::Exhausted.into());
        }
        if self.phase.is_mutated() && self.rng.gen_bool(self.config.elevator_malfunction_chance) {
            log::warn!("game {}: elevator malfunction for {}", self.id, actor);
            self.flags.elevator_jammed = true;
            return Err(GameError::ElevatorMalfunction);
        }

        let button = self.decks.buttons.draw(&mut self.rng)?;
        report.reveal(button.clone());
        let ride = self.board.use_elevator(&elevator, &button, floor, zone);
        self.decks.buttons.discard(button);
        // The button is spent either way, so a dead button is not a rejection.
        let Ok(ride) = ride else {
            report.note("the button lit up but the car never moved");
            return Ok(());
        };

        if !self.board.has_tile(ride.destination) {
            let id = self.decks.allocate_id();
            let card = PathTileCard::generate(id, TileKind::Elevator, &mut self.rng);
            self.board.place_linked_tile(ride.destination, card, &mut self.rng)?;
        }
        let others = self.other_pawns(actor);
        match self.board.landing_square(ride.destination, (1, 1), &others) {
            Some(arrival) => {
                self.relocate(actor, arrival);
                self.flags.elevator_access = None;
                report.note(format!("rode the elevator to floor {}", arrival.floor));
            }
            None => report.note("the doors opened onto a blocked floor"),
        }
        Ok(())
    }

    fn end_turn(&mut self, actor: PlayerId, report: &mut ActionReport) -> Result<(), GameError> {
        let (next, round) = self.advance_turn();
        report.note(format!("{} ended the turn", actor));
        if let Some(next) = next {
            report.note(format!("{} is up in round {}", next, round));
        }
        Ok(())
    }
}
