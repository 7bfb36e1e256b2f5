//! Card and square effects.
//!
//! Drawn Item/Event/Anomaly cards resolve by matching on their kind. Square
//! effects fire from movement: stairwell, elevator and event squares when a
//! pawn enters them, item and emergency-door squares only on the final square.

use super::actions::ActionReport;
use super::board::{Position, ZonePeek};
use super::cards::{AnomalyCard, AnomalyKind, CardId, EffectCard, EventKind, ItemCard, ItemKind, SquareKind};
use super::game::{Game, GameError};
use super::player::{PlayerError, PlayerId, TimedEffect, TimedEffectKind};

/// Rounds a Calming Pills card keeps its holder calm.
const CALM_ROUNDS: u32 = 3;

/// Disorder a First Aid Kit removes.
const FIRST_AID_RELIEF: i32 = 2;

/// Zones a Map Fragment peeks at.
const MAP_FRAGMENT_PEEKS: usize = 2;

/// Disorder at which a Gravity Well pulls a pawn down.
const GRAVITY_WELL_DISORDER: u32 = 4;

impl Game {
    // -- squares ----------------------------------------------------------------

    pub(crate) fn fire_pass_square(&mut self, actor: PlayerId, pos: Position, square: SquareKind, report: &mut ActionReport) {
        match square {
            SquareKind::Stairwell => {
                self.flags.stairwell_access = Some(pos);
                report.note("found a stairwell");
            }
            SquareKind::ElevatorRoom => {
                self.flags.elevator_access = Some(pos);
                report.note("reached an elevator");
            }
            SquareKind::Event => {
                report.note("something stirs");
                self.draw_and_resolve(actor, report);
            }
            _ => {}
        }
    }

    pub(crate) fn fire_landing_square(&mut self, actor: PlayerId, pos: Position, square: SquareKind, report: &mut ActionReport) {
        match square {
            SquareKind::Item => match self.decks.effects.draw_where(&mut self.rng, EffectCard::is_item) {
                Some(EffectCard::Item(card)) => {
                    report.reveal(card);
                    self.give_item(actor, card, report);
                }
                Some(other) => self.decks.effects.discard(other),
                None => report.note("the shelves are bare"),
            },
            SquareKind::EmergencyDoor => {
                if self.board.is_escape_exit(pos.tile()) {
                    report.note("reached the escape exit");
                } else if let Some(zone) = self.board.tile_at(&pos).map(|t| t.zone) {
                    self.peek(zone, report);
                }
            }
            _ => {}
        }
    }

    // -- effect cards -------------------------------------------------------------

    /// Draw one effect card, biased towards anomalies once the board mutates.
    pub(crate) fn draw_and_resolve(&mut self, actor: PlayerId, report: &mut ActionReport) {
        let bias = self.phase.is_mutated().then_some(self.config.anomaly_bias);
        match self.decks.draw_effect(&mut self.rng, bias) {
            Some(card) => {
                report.reveal(card);
                self.resolve_effect_card(actor, card, report);
            }
            None => report.note("the deck is empty"),
        }
    }

    pub(crate) fn resolve_effect_card(&mut self, actor: PlayerId, card: EffectCard, report: &mut ActionReport) {
        match card {
            EffectCard::Item(item) => self.give_item(actor, item, report),
            EffectCard::Event(event) => {
                self.resolve_event(actor, event.kind, report);
                self.decks.effects.discard(card);
            }
            EffectCard::Anomaly(anomaly) => {
                if anomaly.kind.is_source() {
                    report.note(format!("{} takes hold", anomaly.kind.name()));
                    self.active_sources.push(anomaly);
                } else {
                    self.resolve_anomaly(actor, anomaly, report);
                    self.decks.effects.discard(card);
                }
            }
        }
    }

    fn resolve_event(&mut self, actor: PlayerId, kind: EventKind, report: &mut ActionReport) {
        report.note(kind.name());
        match kind {
            EventKind::StrangeNoise => self.shift_everyone(1),
            EventKind::TeamSpirit => self.shift_everyone(-1),
            EventKind::LuckyFind => {
                if let Some(EffectCard::Item(card)) = self.decks.effects.draw_where(&mut self.rng, EffectCard::is_item) {
                    report.reveal(card);
                    self.give_item(actor, card, report);
                }
            }
            EventKind::StructuralDamage => {
                if let Some(coord) = self.board.corrode_random(&mut self.rng) {
                    report.note(format!("floor {} tile ({}, {}) corrodes", coord.floor, coord.x, coord.y));
                }
            }
            EventKind::PowerSurge => self.power_surge = true,
            EventKind::PsychologicalPressure => {
                if self.rng.roll(6) <= 3 {
                    if let Some(player) = self.player_mut(actor) {
                        player.change_disorder(2);
                    }
                }
            }
            EventKind::FalseAlarm => {}
        }
    }

    fn resolve_anomaly(&mut self, actor: PlayerId, anomaly: AnomalyCard, report: &mut ActionReport) {
        report.note(anomaly.kind.name());
        match anomaly.kind {
            AnomalyKind::DisorderWave => self.shift_everyone(1),
            AnomalyKind::CorrosionBurst => {
                self.board.corrode_random(&mut self.rng);
            }
            AnomalyKind::GravityWell => self.gravity_well(actor, report),
            AnomalyKind::RealityFracture => self.board.reshuffle_names(&mut self.rng),
            AnomalyKind::MemoryLoss => {
                for index in 0..self.players.len() {
                    if let Some(card) = self.players[index].remove_random_card(&mut self.rng) {
                        self.decks.effects.discard(EffectCard::Item(card));
                    }
                }
            }
            AnomalyKind::ShadowSource | AnomalyKind::FleshSource | AnomalyKind::EchoSource => {}
        }
    }

    fn gravity_well(&mut self, actor: PlayerId, report: &mut ActionReport) {
        let pulled: Vec<PlayerId> = self
            .players()
            .filter(|p| p.disorder() >= GRAVITY_WELL_DISORDER && p.floor > self.board.bottom_floor())
            .map(|p| p.id)
            .collect();
        for id in pulled {
            let Some(landing) = self.plan_fall(id) else {
                continue;
            };
            if let Ok(pos) = self.land(id, landing, report) {
                if let Some(player) = self.player_mut(id) {
                    player.change_disorder(-1);
                    if id == actor {
                        player.exhaust_movement();
                    }
                }
                if id == actor {
                    self.flags.fell = true;
                }
                report.note(format!("{} is dragged down to floor {}", id, pos.floor));
            }
        }
    }

    fn shift_everyone(&mut self, delta: i32) {
        for player in &mut self.players {
            player.change_disorder(delta);
        }
    }

    /// Put an item in the actor's hand, or discard it if the hand is full.
    fn give_item(&mut self, actor: PlayerId, card: ItemCard, report: &mut ActionReport) {
        let limit = self.config.hand_limit;
        let result = match self.player_mut(actor) {
            Some(player) => player.add_to_hand(card, limit),
            None => return,
        };
        match result {
            Ok(()) => report.note(format!("picked up {}", card.kind.name())),
            Err(_) => {
                report.note(format!("no room for {}", card.kind.name()));
                self.decks.effects.discard(EffectCard::Item(card));
            }
        }
    }

    fn peek(&mut self, zone: char, report: &mut ActionReport) -> bool {
        match self.board.peek_zone(zone, &mut self.rng) {
            ZonePeek::Revealed { zone, name } => {
                report.note(format!("zone {} is the {}", zone, name));
                true
            }
            ZonePeek::Reshuffled { zone, name } => {
                report.note(format!("zone {} also claims to be the {}; the names shift", zone, name));
                false
            }
            ZonePeek::Unassigned => false,
        }
    }

    // -- items ------------------------------------------------------------------

    /// Play an item from the hand. Purification items need their partner card.
    pub(crate) fn use_item(
        &mut self,
        actor: PlayerId,
        card_id: CardId,
        with: Option<CardId>,
        report: &mut ActionReport,
    ) -> Result<(), GameError> {
        let player = self.player(actor).ok_or(GameError::PlayerNotFound)?;
        let card = *player.card(card_id).ok_or(PlayerError::CardNotFound)?;
        if !card.kind.is_usable() {
            return Err(GameError::ItemNotUsable);
        }

        match card.kind {
            ItemKind::FirstAidKit => {
                self.spend(actor, card_id)?;
                if let Some(player) = self.player_mut(actor) {
                    player.change_disorder(-FIRST_AID_RELIEF);
                }
                report.note("patched up");
            }
            ItemKind::CalmingPills => {
                if player.effects().len() >= self.config.effect_slots {
                    return Err(PlayerError::EffectSlotsFull.into());
                }
                let slots = self.config.effect_slots;
                let player = self.player_mut(actor).ok_or(GameError::PlayerNotFound)?;
                let pills = player.remove_from_hand(card_id)?;
                player.change_disorder(-1);
                player.add_effect(
                    TimedEffect { card: pills, kind: TimedEffectKind::Calm, rounds_left: CALM_ROUNDS },
                    slots,
                )?;
                report.note("feels calmer");
            }
            ItemKind::MapFragment => {
                self.spend(actor, card_id)?;
                let mut zones: Vec<char> = self
                    .board
                    .zones()
                    .filter(|z| z.entered && !z.revealed && z.card.is_some())
                    .map(|z| z.letter)
                    .collect();
                self.rng.shuffle(&mut zones);
                for zone in zones.into_iter().take(MAP_FRAGMENT_PEEKS) {
                    if !self.peek(zone, report) {
                        break;
                    }
                }
            }
            ItemKind::HolyWater | ItemKind::Talisman | ItemKind::Flashlight => {
                let partner_id = with.filter(|id| *id != card_id).ok_or(GameError::ItemNotUsable)?;
                let partner = *player.card(partner_id).ok_or(PlayerError::CardNotFound)?;
                let source = self
                    .active_sources
                    .iter()
                    .position(|s| purifies(s.kind, card.kind, partner.kind))
                    .ok_or(GameError::ItemNotUsable)?;

                self.spend(actor, card_id)?;
                self.spend(actor, partner_id)?;
                let source = self.active_sources.remove(source);
                self.purified_sources += 1;
                report.note(format!("purified the {}", source.kind.name()));
                log::info!("game {}: {} purified {}", self.id, actor, source.kind.name());
            }
            _ => return Err(GameError::ItemNotUsable),
        }
        Ok(())
    }

    /// Remove a card from the actor's hand onto the discard pile.
    fn spend(&mut self, actor: PlayerId, card_id: CardId) -> Result<(), GameError> {
        let player = self.player_mut(actor).ok_or(GameError::PlayerNotFound)?;
        let card = player.remove_from_hand(card_id)?;
        self.decks.effects.discard(EffectCard::Item(card));
        Ok(())
    }
}

/// Whether the two items form the purification pair of `source`.
fn purifies(source: AnomalyKind, a: ItemKind, b: ItemKind) -> bool {
    source
        .purification()
        .is_some_and(|[x, y]| (a == x && b == y) || (a == y && b == x))
}
