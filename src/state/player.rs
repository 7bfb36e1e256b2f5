//! Player state.
//!
//! One participant's disorder, location, movement for the current turn and
//! inventory. No turn logic lives here; the game decides when these change.
//!
//! # Disorder
//!
//! ```text
//!   0 ─────────────── 5 │ 6 ──────────────────▶
//!   path end: Explore   │ path end: Fall
//!   walls block         │ walls are crossable
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::board::Position;
use super::cards::{CardId, ItemCard, ItemKind};
use super::rng::GameRng;

/// Stable player identifier, unique across the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

/// Kinds of effect that sit in a player's effect slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimedEffectKind {
    /// Disorder cannot increase.
    Calm,
}

/// A persistent card in an effect slot, counting down in rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEffect {
    pub card: ItemCard,
    pub kind: TimedEffectKind,
    pub rounds_left: u32,
}

/// Player errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    #[error("not enough movement left")]
    InsufficientMovement,
    #[error("card not found")]
    CardNotFound,
    #[error("hand is full")]
    HandFull,
    #[error("no free effect slot")]
    EffectSlotsFull,
}

impl PlayerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientMovement => "insufficient_movement",
            Self::CardNotFound => "card_not_found",
            Self::HandFull => "hand_full",
            Self::EffectSlotsFull => "effect_slots_full",
        }
    }
}

/// A participant in a game.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Seat number used for stable colouring, 1-based in join order.
    pub player_number: u8,
    pub floor: i32,
    pub position: Option<Position>,
    pub order_roll: Option<u32>,
    disorder: u32,
    movement_budget: u32,
    movement_used: u32,
    hand: Vec<ItemCard>,
    effects: Vec<TimedEffect>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, player_number: u8, floor: i32) -> Self {
        Self {
            id,
            name: name.into(),
            player_number,
            floor,
            position: None,
            order_roll: None,
            disorder: 0,
            movement_budget: 0,
            movement_used: 0,
            hand: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn disorder(&self) -> u32 {
        self.disorder
    }

    /// Apply a disorder delta, clamping at zero. Gains are ignored while calm.
    /// Returns the new disorder.
    pub fn change_disorder(&mut self, delta: i32) -> u32 {
        if delta > 0 && self.is_calm() {
            return self.disorder;
        }
        self.disorder = (self.disorder as i64 + delta as i64).max(0) as u32;
        self.disorder
    }

    /// Overwrite disorder directly (scenario setup).
    pub fn set_disorder(&mut self, disorder: u32) {
        self.disorder = disorder;
    }

    // -- movement ---------------------------------------------------------------

    /// Start a fresh movement budget for this turn.
    pub fn grant_movement(&mut self, points: u32) {
        self.movement_budget = points;
        self.movement_used = 0;
    }

    pub fn consume_movement(&mut self, points: u32) -> Result<(), PlayerError> {
        if points > self.remaining_movement() {
            return Err(PlayerError::InsufficientMovement);
        }
        self.movement_used += points;
        Ok(())
    }

    /// Spend everything left this turn.
    pub fn exhaust_movement(&mut self) {
        self.movement_used = self.movement_budget;
    }

    pub fn clear_movement(&mut self) {
        self.movement_budget = 0;
        self.movement_used = 0;
    }

    pub fn remaining_movement(&self) -> u32 {
        self.movement_budget - self.movement_used
    }

    pub fn movement_budget(&self) -> u32 {
        self.movement_budget
    }

    pub fn movement_used(&self) -> u32 {
        self.movement_used
    }

    // -- hand -------------------------------------------------------------------

    pub fn hand(&self) -> &[ItemCard] {
        &self.hand
    }

    pub fn add_to_hand(&mut self, card: ItemCard, limit: usize) -> Result<(), PlayerError> {
        if self.hand.len() >= limit {
            return Err(PlayerError::HandFull);
        }
        self.hand.push(card);
        Ok(())
    }

    pub fn remove_from_hand(&mut self, id: CardId) -> Result<ItemCard, PlayerError> {
        let index = self.hand.iter().position(|c| c.id == id).ok_or(PlayerError::CardNotFound)?;
        Ok(self.hand.remove(index))
    }

    pub fn card(&self, id: CardId) -> Option<&ItemCard> {
        self.hand.iter().find(|c| c.id == id)
    }

    pub fn count_items(&self, kind: ItemKind) -> usize {
        self.hand.iter().filter(|c| c.kind == kind).count()
    }

    /// Cards in hand whose kind is one of `kinds`.
    pub fn count_matching(&self, kinds: &[ItemKind]) -> usize {
        self.hand.iter().filter(|c| kinds.contains(&c.kind)).count()
    }

    /// Discard a random card from the hand.
    pub fn remove_random_card(&mut self, rng: &mut GameRng) -> Option<ItemCard> {
        if self.hand.is_empty() {
            return None;
        }
        let index = rng.gen_range_usize(0..self.hand.len());
        Some(self.hand.remove(index))
    }

    // -- effect slots -----------------------------------------------------------

    pub fn effects(&self) -> &[TimedEffect] {
        &self.effects
    }

    pub fn add_effect(&mut self, effect: TimedEffect, slots: usize) -> Result<(), PlayerError> {
        if self.effects.len() >= slots {
            return Err(PlayerError::EffectSlotsFull);
        }
        self.effects.push(effect);
        Ok(())
    }

    pub fn is_calm(&self) -> bool {
        self.effects.iter().any(|e| e.kind == TimedEffectKind::Calm)
    }

    /// Count down every effect by one round; returns the cards that expired.
    pub fn tick_effects(&mut self) -> Vec<ItemCard> {
        for effect in &mut self.effects {
            effect.rounds_left = effect.rounds_left.saturating_sub(1);
        }
        let (expired, active): (Vec<_>, Vec<_>) = self.effects.drain(..).partition(|e| e.rounds_left == 0);
        self.effects = active;
        expired.into_iter().map(|e| e.card).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Player {
        Player::new(PlayerId(1), "Ada", 1, 2)
    }

    fn item(id: u32, kind: ItemKind) -> ItemCard {
        ItemCard { id: CardId(id), kind }
    }

    #[test]
    fn test_new_player() {
        let p = player();
        assert_eq!(p.disorder(), 0);
        assert_eq!(p.floor, 2);
        assert!(p.position.is_none());
        assert!(p.hand().is_empty());
    }

    #[test]
    fn test_disorder_clamps_at_zero() {
        let mut p = player();
        assert_eq!(p.change_disorder(3), 3);
        assert_eq!(p.change_disorder(-5), 0);
        assert_eq!(p.change_disorder(-1), 0);
    }

    #[test]
    fn test_movement_budget() {
        let mut p = player();
        p.grant_movement(4);
        assert_eq!(p.remaining_movement(), 4);

        p.consume_movement(3).unwrap();
        assert_eq!(p.remaining_movement(), 1);

        // Can't overspend
        assert_eq!(p.consume_movement(2), Err(PlayerError::InsufficientMovement));
        assert_eq!(p.movement_used(), 3);

        p.exhaust_movement();
        assert_eq!(p.remaining_movement(), 0);
        assert!(p.movement_used() <= p.movement_budget());
    }

    #[test]
    fn test_hand() {
        let mut p = player();
        p.add_to_hand(item(1, ItemKind::Crowbar), 2).unwrap();
        p.add_to_hand(item(2, ItemKind::MasterKey), 2).unwrap();
        assert_eq!(p.add_to_hand(item(3, ItemKind::EscapeRope), 2), Err(PlayerError::HandFull));

        assert_eq!(p.count_matching(&[ItemKind::Crowbar, ItemKind::MasterKey]), 2);
        assert_eq!(p.remove_from_hand(CardId(1)).unwrap().kind, ItemKind::Crowbar);
        assert_eq!(p.remove_from_hand(CardId(1)), Err(PlayerError::CardNotFound));
    }

    #[test]
    fn test_calm_blocks_gains_until_expired() {
        let mut p = player();
        let calm = TimedEffect {
            card: item(9, ItemKind::CalmingPills),
            kind: TimedEffectKind::Calm,
            rounds_left: 2,
        };
        p.add_effect(calm, 4).unwrap();

        assert_eq!(p.change_disorder(2), 0);
        assert!(p.tick_effects().is_empty());
        assert_eq!(p.tick_effects().len(), 1);
        assert!(!p.is_calm());
        assert_eq!(p.change_disorder(2), 2);
    }

    #[test]
    fn test_effect_slots_limit() {
        let mut p = player();
        let effect = TimedEffect {
            card: item(9, ItemKind::CalmingPills),
            kind: TimedEffectKind::Calm,
            rounds_left: 3,
        };
        p.add_effect(effect.clone(), 1).unwrap();
        assert_eq!(p.add_effect(effect, 1), Err(PlayerError::EffectSlotsFull));
    }
}
