//! Card catalog and decks.
//!
//! Cards are one tagged union with a typed payload per category; behaviour is
//! selected by matching on the payload's kind rather than through a class
//! hierarchy. Decks are typed per category and draw without replacement.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::{EngineConfig, TILE_SIZE, ZONE_LETTERS};
use super::rng::GameRng;

/// Number of squares on one tile.
pub const SQUARES_PER_TILE: usize = (TILE_SIZE as usize) * (TILE_SIZE as usize);

/// Tiles can never have fewer movable squares than this.
pub const MIN_MOVABLE_SQUARES: usize = 4;

/// Unique card identifier within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u32);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "card-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Path tiles
// ---------------------------------------------------------------------------

/// Path tile categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Basic,
    Disordered,
    Construction,
    Rotating,
    Stairwell,
    Elevator,
    Event,
    Item,
    EmergencyDoor,
}

impl TileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Disordered => "disordered",
            Self::Construction => "construction",
            Self::Rotating => "rotating",
            Self::Stairwell => "stairwell",
            Self::Elevator => "elevator",
            Self::Event => "event",
            Self::Item => "item",
            Self::EmergencyDoor => "emergency_door",
        }
    }

    /// Elevators stay on the board for the whole game.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Elevator)
    }
}

/// What occupies one square of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SquareKind {
    #[default]
    Normal,
    Wall,
    Stairwell,
    ElevatorRoom,
    Event,
    Item,
    EmergencyDoor,
}

impl SquareKind {
    pub fn is_wall(&self) -> bool {
        matches!(self, Self::Wall)
    }

    /// Squares whose effect fires when a pawn enters them mid-move.
    pub fn triggers_on_pass(&self) -> bool {
        matches!(self, Self::Stairwell | Self::ElevatorRoom | Self::Event)
    }

    /// Squares whose effect fires only on the final landing square.
    pub fn triggers_on_landing(&self) -> bool {
        matches!(self, Self::EmergencyDoor | Self::Item)
    }
}

/// 4x4 square layout, row-major (`sub_y * 4 + sub_x`).
pub type Layout = [SquareKind; SQUARES_PER_TILE];

pub fn square_index(sub_x: u8, sub_y: u8) -> usize {
    sub_y as usize * TILE_SIZE as usize + sub_x as usize
}

/// A drawable path tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTileCard {
    pub id: CardId,
    pub kind: TileKind,
    pub layout: Layout,
}

impl PathTileCard {
    /// Build a card with a layout generated for its kind.
    pub fn generate(id: CardId, kind: TileKind, rng: &mut GameRng) -> Self {
        let mut layout = [SquareKind::Normal; SQUARES_PER_TILE];
        let mut set = |x: u8, y: u8, square: SquareKind| layout[square_index(x, y)] = square;

        match kind {
            TileKind::Basic | TileKind::Rotating => {
                let specials = [SquareKind::Event, SquareKind::Item, SquareKind::EmergencyDoor];
                for _ in 0..rng.gen_range_usize(0..3) {
                    let x = rng.gen_range_usize(0..4) as u8;
                    let y = rng.gen_range_usize(0..4) as u8;
                    if let Some(square) = rng.choose(&specials) {
                        set(x, y, *square);
                    }
                }
            }
            TileKind::Disordered => {
                for _ in 0..rng.gen_range_usize(2..5) {
                    let x = rng.gen_range_usize(0..4) as u8;
                    let y = rng.gen_range_usize(0..4) as u8;
                    set(x, y, SquareKind::Wall);
                }
            }
            TileKind::Construction => {
                for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
                    set(x, y, SquareKind::Wall);
                }
            }
            TileKind::Stairwell => {
                set(1, 1, SquareKind::Stairwell);
                set(2, 2, SquareKind::Stairwell);
            }
            TileKind::Elevator => {
                for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
                    set(x, y, SquareKind::ElevatorRoom);
                }
            }
            TileKind::Event => set(1, 2, SquareKind::Event),
            TileKind::Item => set(2, 1, SquareKind::Item),
            TileKind::EmergencyDoor => set(1, 1, SquareKind::EmergencyDoor),
        }

        Self::ensure_movable(&mut layout);
        Self { id, kind, layout }
    }

    /// Guarantee the minimum number of movable squares, opening corners first.
    fn ensure_movable(layout: &mut Layout) {
        let corners = [square_index(0, 0), square_index(3, 0), square_index(0, 3), square_index(3, 3)];
        for index in corners {
            if layout.iter().filter(|s| !s.is_wall()).count() >= MIN_MOVABLE_SQUARES {
                break;
            }
            layout[index] = SquareKind::Normal;
        }
    }

    /// Rotate the layout a quarter turn clockwise, `turns` times.
    pub fn rotate(&mut self, turns: u8) {
        for _ in 0..(turns % 4) {
            let mut rotated = [SquareKind::Normal; SQUARES_PER_TILE];
            for y in 0..TILE_SIZE {
                for x in 0..TILE_SIZE {
                    // (x, y) -> (3 - y, x)
                    rotated[square_index(TILE_SIZE - 1 - y, x)] = self.layout[square_index(x, y)];
                }
            }
            self.layout = rotated;
        }
    }
}

// ---------------------------------------------------------------------------
// Effect cards
// ---------------------------------------------------------------------------

/// Item card kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    MasterKey,
    Crowbar,
    EscapeRope,
    ExperimentReport,
    FirstAidKit,
    CalmingPills,
    MapFragment,
    HolyWater,
    Talisman,
    Flashlight,
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MasterKey => "Master Key",
            Self::Crowbar => "Crowbar",
            Self::EscapeRope => "Escape Rope",
            Self::ExperimentReport => "Experiment Report",
            Self::FirstAidKit => "First Aid Kit",
            Self::CalmingPills => "Calming Pills",
            Self::MapFragment => "Map Fragment",
            Self::HolyWater => "Holy Water",
            Self::Talisman => "Talisman",
            Self::Flashlight => "Flashlight",
        }
    }

    /// Items with an active effect when played from the hand.
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            Self::FirstAidKit | Self::CalmingPills | Self::MapFragment | Self::HolyWater | Self::Talisman | Self::Flashlight
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCard {
    pub id: CardId,
    pub kind: ItemKind,
}

/// Event card kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StrangeNoise,
    TeamSpirit,
    LuckyFind,
    StructuralDamage,
    PowerSurge,
    PsychologicalPressure,
    FalseAlarm,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StrangeNoise => "Strange Noise",
            Self::TeamSpirit => "Team Spirit",
            Self::LuckyFind => "Lucky Find",
            Self::StructuralDamage => "Structural Damage",
            Self::PowerSurge => "Power Surge",
            Self::PsychologicalPressure => "Psychological Pressure",
            Self::FalseAlarm => "False Alarm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCard {
    pub id: CardId,
    pub kind: EventKind,
}

/// Anomaly card kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    DisorderWave,
    CorrosionBurst,
    GravityWell,
    RealityFracture,
    MemoryLoss,
    ShadowSource,
    FleshSource,
    EchoSource,
}

impl AnomalyKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DisorderWave => "Disorder Wave",
            Self::CorrosionBurst => "Corrosion Burst",
            Self::GravityWell => "Gravity Well",
            Self::RealityFracture => "Reality Fracture",
            Self::MemoryLoss => "Memory Loss",
            Self::ShadowSource => "Shadow Source",
            Self::FleshSource => "Flesh Source",
            Self::EchoSource => "Echo Source",
        }
    }

    /// Sources stay active until purified.
    pub fn is_source(&self) -> bool {
        self.purification().is_some()
    }

    /// The pair of items that purifies a source.
    pub fn purification(&self) -> Option<[ItemKind; 2]> {
        match self {
            Self::ShadowSource => Some([ItemKind::HolyWater, ItemKind::Flashlight]),
            Self::FleshSource => Some([ItemKind::HolyWater, ItemKind::Talisman]),
            Self::EchoSource => Some([ItemKind::Talisman, ItemKind::Flashlight]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyCard {
    pub id: CardId,
    pub kind: AnomalyKind,
}

/// Anything drawn from the shared Item/Event/Anomaly deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum EffectCard {
    Item(ItemCard),
    Event(EventCard),
    Anomaly(AnomalyCard),
}

impl EffectCard {
    pub fn id(&self) -> CardId {
        match self {
            Self::Item(c) => c.id,
            Self::Event(c) => c.id,
            Self::Anomaly(c) => c.id,
        }
    }

    pub fn is_item(&self) -> bool {
        matches!(self, Self::Item(_))
    }

    pub fn is_anomaly(&self) -> bool {
        matches!(self, Self::Anomaly(_))
    }
}

// ---------------------------------------------------------------------------
// Buttons and zone names
// ---------------------------------------------------------------------------

/// Elevator control card: which floors and zones a ride may reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonCard {
    pub id: CardId,
    pub floors: Vec<i32>,
    pub zones: Vec<char>,
}

impl ButtonCard {
    /// Floor this button takes a rider to when `requested` is asked for:
    /// the requested floor when listed, otherwise the nearest listed floor
    /// (ties go to the lower floor).
    pub fn resolve_floor(&self, requested: i32) -> Option<i32> {
        self.floors
            .iter()
            .copied()
            .min_by_key(|f| ((f - requested).abs(), *f))
    }

    pub fn reaches_zone(&self, zone: char) -> bool {
        self.zones.contains(&zone)
    }
}

/// Face-down identity card bound to a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneNameCard {
    pub id: CardId,
    pub name: String,
}

/// Any card in the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Card {
    PathTile(PathTileCard),
    Item(ItemCard),
    Event(EventCard),
    Anomaly(AnomalyCard),
    Button(ButtonCard),
    ZoneName(ZoneNameCard),
}

impl Card {
    pub fn id(&self) -> CardId {
        match self {
            Self::PathTile(c) => c.id,
            Self::Item(c) => c.id,
            Self::Event(c) => c.id,
            Self::Anomaly(c) => c.id,
            Self::Button(c) => c.id,
            Self::ZoneName(c) => c.id,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::PathTile(c) => format!("{} tile", c.kind.as_str()),
            Self::Item(c) => c.kind.name().to_string(),
            Self::Event(c) => c.kind.name().to_string(),
            Self::Anomaly(c) => c.kind.name().to_string(),
            Self::Button(c) => format!("Elevator Button {}", c.id.0),
            Self::ZoneName(c) => c.name.clone(),
        }
    }
}

impl From<PathTileCard> for Card {
    fn from(card: PathTileCard) -> Self {
        Self::PathTile(card)
    }
}

impl From<EffectCard> for Card {
    fn from(card: EffectCard) -> Self {
        match card {
            EffectCard::Item(c) => Self::Item(c),
            EffectCard::Event(c) => Self::Event(c),
            EffectCard::Anomaly(c) => Self::Anomaly(c),
        }
    }
}

impl From<ItemCard> for Card {
    fn from(card: ItemCard) -> Self {
        Self::Item(card)
    }
}

impl From<ButtonCard> for Card {
    fn from(card: ButtonCard) -> Self {
        Self::Button(card)
    }
}

// ---------------------------------------------------------------------------
// Decks
// ---------------------------------------------------------------------------

/// Deck errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeckError {
    #[error("the deck is exhausted")]
    Exhausted,
}

/// Shuffled draw pile with an optional recycling discard pile.
///
/// The top of the draw pile is the end of the vector.
#[derive(Debug, Clone)]
pub struct Deck<T> {
    draw_pile: Vec<T>,
    discard_pile: Vec<T>,
    recycle: bool,
    drawn: u32,
}

impl<T> Deck<T> {
    /// Shuffle `cards` into a new deck.
    pub fn new(mut cards: Vec<T>, recycle: bool, rng: &mut GameRng) -> Self {
        rng.shuffle(&mut cards);
        Self {
            draw_pile: cards,
            discard_pile: Vec::new(),
            recycle,
            drawn: 0,
        }
    }

    /// Build a deck without shuffling (top is the last element).
    pub fn stacked(cards: Vec<T>, recycle: bool) -> Self {
        Self {
            draw_pile: cards,
            discard_pile: Vec::new(),
            recycle,
            drawn: 0,
        }
    }

    fn refill(&mut self, rng: &mut GameRng) {
        if self.draw_pile.is_empty() && self.recycle && !self.discard_pile.is_empty() {
            self.draw_pile.append(&mut self.discard_pile);
            rng.shuffle(&mut self.draw_pile);
        }
    }

    /// Draw the top card, reshuffling the discard pile in when the draw pile
    /// runs out (recycling decks only).
    pub fn draw(&mut self, rng: &mut GameRng) -> Result<T, DeckError> {
        self.refill(rng);
        let card = self.draw_pile.pop().ok_or(DeckError::Exhausted)?;
        self.drawn += 1;
        Ok(card)
    }

    /// Draw the topmost card matching `pred`, leaving the rest in order.
    pub fn draw_where(&mut self, rng: &mut GameRng, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.refill(rng);
        let index = self.draw_pile.iter().rposition(pred)?;
        self.drawn += 1;
        Some(self.draw_pile.remove(index))
    }

    /// Look at the top card without drawing it.
    pub fn peek(&self) -> Option<&T> {
        self.draw_pile.last()
    }

    /// Whether a draw would produce a card.
    pub fn can_draw(&self) -> bool {
        !self.draw_pile.is_empty() || (self.recycle && !self.discard_pile.is_empty())
    }

    pub fn discard(&mut self, card: T) {
        self.discard_pile.push(card);
    }

    pub fn remaining(&self) -> usize {
        self.draw_pile.len()
    }

    pub fn discarded(&self) -> usize {
        self.discard_pile.len()
    }

    pub fn drawn(&self) -> u32 {
        self.drawn
    }
}

impl Deck<PathTileCard> {
    /// Draw a path tile; tiles never recycle.
    pub fn draw_path_tile(&mut self, rng: &mut GameRng) -> Result<PathTileCard, DeckError> {
        self.draw(rng)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

const PATH_TILE_COUNTS: [(TileKind, usize); 9] = [
    (TileKind::Basic, 30),
    (TileKind::Disordered, 10),
    (TileKind::Construction, 4),
    (TileKind::Rotating, 2),
    (TileKind::Stairwell, 6),
    (TileKind::Elevator, 4),
    (TileKind::Event, 2),
    (TileKind::Item, 1),
    (TileKind::EmergencyDoor, 1),
];

const ITEM_COUNTS: [(ItemKind, usize); 10] = [
    (ItemKind::MasterKey, 2),
    (ItemKind::Crowbar, 2),
    (ItemKind::EscapeRope, 2),
    (ItemKind::ExperimentReport, 8),
    (ItemKind::FirstAidKit, 3),
    (ItemKind::CalmingPills, 2),
    (ItemKind::MapFragment, 2),
    (ItemKind::HolyWater, 2),
    (ItemKind::Talisman, 1),
    (ItemKind::Flashlight, 1),
];

const EVENT_COUNTS: [(EventKind, usize); 7] = [
    (EventKind::StrangeNoise, 7),
    (EventKind::TeamSpirit, 6),
    (EventKind::LuckyFind, 5),
    (EventKind::StructuralDamage, 4),
    (EventKind::PowerSurge, 3),
    (EventKind::PsychologicalPressure, 5),
    (EventKind::FalseAlarm, 5),
];

const ANOMALY_COUNTS: [(AnomalyKind, usize); 8] = [
    (AnomalyKind::DisorderWave, 4),
    (AnomalyKind::CorrosionBurst, 4),
    (AnomalyKind::GravityWell, 3),
    (AnomalyKind::RealityFracture, 3),
    (AnomalyKind::MemoryLoss, 3),
    (AnomalyKind::ShadowSource, 1),
    (AnomalyKind::FleshSource, 1),
    (AnomalyKind::EchoSource, 1),
];

const BUTTON_COUNT: usize = 20;

/// All decks of one session.
#[derive(Debug, Clone)]
pub struct Decks {
    pub path_tiles: Deck<PathTileCard>,
    pub effects: Deck<EffectCard>,
    pub buttons: Deck<ButtonCard>,
    /// Zone-name cards, dealt by the board.
    pub zone_names: Vec<ZoneNameCard>,
    /// Anomaly sources present in the game.
    pub anomaly_sources: usize,
    next_id: u32,
}

impl Decks {
    /// Build and shuffle the standard decks.
    pub fn standard(config: &EngineConfig, rng: &mut GameRng) -> Self {
        let mut next_id = 1u32;
        let mut alloc = || {
            let id = CardId(next_id);
            next_id += 1;
            id
        };

        let mut tiles = Vec::new();
        for (kind, count) in PATH_TILE_COUNTS {
            for _ in 0..count {
                tiles.push(PathTileCard::generate(alloc(), kind, rng));
            }
        }

        let mut effects = Vec::new();
        for (kind, count) in ITEM_COUNTS {
            for _ in 0..count {
                effects.push(EffectCard::Item(ItemCard { id: alloc(), kind }));
            }
        }
        for (kind, count) in EVENT_COUNTS {
            for _ in 0..count {
                effects.push(EffectCard::Event(EventCard { id: alloc(), kind }));
            }
        }
        let mut anomaly_sources = 0;
        for (kind, count) in ANOMALY_COUNTS {
            for _ in 0..count {
                if kind.is_source() {
                    anomaly_sources += 1;
                }
                effects.push(EffectCard::Anomaly(AnomalyCard { id: alloc(), kind }));
            }
        }

        let all_floors: Vec<i32> = (config.bottom_floor..=config.top_floor).collect();
        let mut buttons = Vec::new();
        for _ in 0..BUTTON_COUNT {
            let mut floors = all_floors.clone();
            rng.shuffle(&mut floors);
            floors.truncate(rng.gen_range_usize(2..4).min(all_floors.len()).max(1));
            floors.sort_unstable();

            let mut zones = ZONE_LETTERS.to_vec();
            rng.shuffle(&mut zones);
            zones.truncate(rng.gen_range_usize(2..5));
            zones.sort_unstable();

            buttons.push(ButtonCard { id: alloc(), floors, zones });
        }

        let zone_names = config
            .zone_names
            .iter()
            .map(|name| ZoneNameCard { id: alloc(), name: name.clone() })
            .collect();

        Self {
            path_tiles: Deck::new(tiles, false, rng),
            effects: Deck::new(effects, true, rng),
            buttons: Deck::new(buttons, true, rng),
            zone_names,
            anomaly_sources,
            next_id,
        }
    }

    /// Build decks from explicit piles (top of each pile is its last element).
    pub fn from_piles(
        path_tiles: Vec<PathTileCard>,
        effects: Vec<EffectCard>,
        buttons: Vec<ButtonCard>,
        zone_names: Vec<ZoneNameCard>,
    ) -> Self {
        let max_id = path_tiles
            .iter()
            .map(|c| c.id.0)
            .chain(effects.iter().map(|c| c.id().0))
            .chain(buttons.iter().map(|c| c.id.0))
            .chain(zone_names.iter().map(|c| c.id.0))
            .max()
            .unwrap_or(0);
        let anomaly_sources = effects
            .iter()
            .filter(|c| matches!(c, EffectCard::Anomaly(a) if a.kind.is_source()))
            .count();
        Self {
            path_tiles: Deck::stacked(path_tiles, false),
            effects: Deck::stacked(effects, true),
            buttons: Deck::stacked(buttons, true),
            zone_names,
            anomaly_sources,
            next_id: max_id + 1,
        }
    }

    /// Allocate an id for a card created outside the decks (escape exits).
    pub fn allocate_id(&mut self) -> CardId {
        let id = CardId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Draw an effect card, pulling the next anomaly forward when `biased`.
    pub fn draw_effect(&mut self, rng: &mut GameRng, bias: Option<f64>) -> Option<EffectCard> {
        if let Some(chance) = bias {
            if rng.gen_bool(chance) {
                if let Some(card) = self.effects.draw_where(rng, EffectCard::is_anomaly) {
                    return Some(card);
                }
            }
        }
        self.effects.draw(rng).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movable(card: &PathTileCard) -> usize {
        card.layout.iter().filter(|s| !s.is_wall()).count()
    }

    #[test]
    fn test_standard_deck_sizes() {
        let mut rng = GameRng::new(11);
        let decks = Decks::standard(&EngineConfig::default(), &mut rng);
        assert_eq!(decks.path_tiles.remaining(), 60);
        assert_eq!(decks.effects.remaining(), 80);
        assert_eq!(decks.buttons.remaining(), 20);
        assert_eq!(decks.zone_names.len(), 8);
        assert_eq!(decks.anomaly_sources, 3);
    }

    #[test]
    fn test_generated_tiles_keep_movable_squares() {
        let mut rng = GameRng::new(5);
        for i in 0..200 {
            let card = PathTileCard::generate(CardId(i), TileKind::Disordered, &mut rng);
            assert!(movable(&card) >= MIN_MOVABLE_SQUARES);
        }
        let construction = PathTileCard::generate(CardId(1), TileKind::Construction, &mut rng);
        assert_eq!(movable(&construction), 12);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let mut rng = GameRng::new(1);
        let mut card = PathTileCard::generate(CardId(1), TileKind::Item, &mut rng);
        assert_eq!(card.layout[square_index(2, 1)], SquareKind::Item);

        card.rotate(1);
        // (2, 1) -> (3 - 1, 2) = (2, 2)
        assert_eq!(card.layout[square_index(2, 2)], SquareKind::Item);

        card.rotate(3);
        assert_eq!(card.layout[square_index(2, 1)], SquareKind::Item);
    }

    #[test]
    fn test_deck_draw_without_replacement() {
        let mut rng = GameRng::new(2);
        let mut deck = Deck::stacked(vec![1, 2, 3], false);
        assert_eq!(deck.draw(&mut rng), Ok(3));
        assert_eq!(deck.draw(&mut rng), Ok(2));
        assert_eq!(deck.draw(&mut rng), Ok(1));
        assert_eq!(deck.draw(&mut rng), Err(DeckError::Exhausted));
        assert_eq!(deck.drawn(), 3);
    }

    #[test]
    fn test_recycling_deck_reshuffles_discards() {
        let mut rng = GameRng::new(2);
        let mut deck = Deck::stacked(vec![1], true);
        let card = deck.draw(&mut rng).unwrap();
        assert!(!deck.can_draw());
        assert_eq!(deck.draw(&mut rng), Err(DeckError::Exhausted));

        deck.discard(card);
        assert!(deck.can_draw());
        assert_eq!(deck.draw(&mut rng), Ok(1));
    }

    #[test]
    fn test_draw_where_keeps_order() {
        let mut rng = GameRng::new(2);
        let mut deck = Deck::stacked(vec![1, 2, 3, 4], false);
        assert_eq!(deck.draw_where(&mut rng, |c| c % 2 == 1), Some(3));
        assert_eq!(deck.draw(&mut rng), Ok(4));
        assert_eq!(deck.draw(&mut rng), Ok(2));
    }

    #[test]
    fn test_button_resolves_nearest_floor() {
        let button = ButtonCard { id: CardId(1), floors: vec![1, 3, 5], zones: vec!['A'] };
        assert_eq!(button.resolve_floor(3), Some(3));
        assert_eq!(button.resolve_floor(4), Some(3));
        assert_eq!(button.resolve_floor(2), Some(1));
        assert!(button.reaches_zone('A'));
        assert!(!button.reaches_zone('B'));
    }

    #[test]
    fn test_purification_pairs() {
        assert!(AnomalyKind::ShadowSource.is_source());
        assert!(!AnomalyKind::DisorderWave.is_source());
        assert_eq!(
            AnomalyKind::FleshSource.purification(),
            Some([ItemKind::HolyWater, ItemKind::Talisman])
        );
    }

    #[test]
    fn test_card_serializes_tagged() {
        let card = Card::from(ItemCard { id: CardId(4), kind: ItemKind::Crowbar });
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["type"], "item");
        assert_eq!(json["kind"], "crowbar");
        let back: Card = serde_json::from_value(json).unwrap();
        assert_eq!(back, card);
    }
}
