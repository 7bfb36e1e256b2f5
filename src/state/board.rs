//! Multi-floor board.
//!
//! Each floor is a grid of tile slots; each tile is a 4x4 grid of squares.
//! The board knows nothing about turns or players beyond the positions it is
//! asked about. It owns tile placement, zone bookkeeping (including the
//! face-down zone-name cards) and corrosion coverage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::cards::{square_index, ButtonCard, CardId, Layout, PathTileCard, SquareKind, TileKind, ZoneNameCard};
use super::config::{EngineConfig, TILE_SIZE, ZONE_LETTERS};
use super::rng::GameRng;

const SIZE: i32 = TILE_SIZE as i32;

/// Zone of the seed tile.
pub const SEED_ZONE: char = 'B';

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A tile slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub floor: i32,
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(floor: i32, x: i32, y: i32) -> Self {
        Self { floor, x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.floor, self.x + dx, self.y + dy)
    }

    /// Same slot on another floor.
    pub fn on_floor(&self, floor: i32) -> Self {
        Self::new(floor, self.x, self.y)
    }

    /// The eight surrounding slots on the same floor.
    pub fn neighbours(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .map(move |(dx, dy)| self.offset(dx, dy))
    }
}

/// Orthogonal direction on a floor. North is towards y = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Self::North, Self::East, Self::South, Self::West];

    pub fn delta(&self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }
}

/// Up or down a floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vertical {
    Up,
    Down,
}

impl Vertical {
    pub fn delta(&self) -> i32 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

/// A square on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub floor: i32,
    pub tile_x: i32,
    pub tile_y: i32,
    pub sub_x: u8,
    pub sub_y: u8,
}

impl Position {
    pub fn new(floor: i32, tile_x: i32, tile_y: i32, sub_x: u8, sub_y: u8) -> Self {
        Self { floor, tile_x, tile_y, sub_x, sub_y }
    }

    /// A square on the given tile.
    pub fn on_tile(coord: TileCoord, sub_x: u8, sub_y: u8) -> Self {
        Self::new(coord.floor, coord.x, coord.y, sub_x, sub_y)
    }

    pub fn tile(&self) -> TileCoord {
        TileCoord::new(self.floor, self.tile_x, self.tile_y)
    }

    pub fn has_valid_sub(&self) -> bool {
        self.sub_x < TILE_SIZE && self.sub_y < TILE_SIZE
    }

    /// Square coordinates across the whole floor.
    fn global(&self) -> (i32, i32) {
        (
            self.tile_x * SIZE + self.sub_x as i32,
            self.tile_y * SIZE + self.sub_y as i32,
        )
    }

    fn from_global(floor: i32, gx: i32, gy: i32) -> Self {
        Self::new(
            floor,
            gx.div_euclid(SIZE),
            gy.div_euclid(SIZE),
            gx.rem_euclid(SIZE) as u8,
            gy.rem_euclid(SIZE) as u8,
        )
    }

    /// Step by (dx, dy) squares; steps may cross into a neighbouring tile.
    pub fn step(&self, dx: i32, dy: i32) -> Self {
        let (gx, gy) = self.global();
        Self::from_global(self.floor, gx + dx, gy + dy)
    }

    /// One king move apart on the same floor.
    pub fn is_adjacent_to(&self, other: &Position) -> bool {
        if self.floor != other.floor {
            return false;
        }
        let (ax, ay) = self.global();
        let (bx, by) = other.global();
        let (dx, dy) = ((ax - bx).abs(), (ay - by).abs());
        dx <= 1 && dy <= 1 && (dx + dy) > 0
    }

    /// Tile edges this square touches.
    pub fn edges(&self) -> Vec<Direction> {
        let last = TILE_SIZE - 1;
        let mut edges = Vec::new();
        if self.sub_y == 0 {
            edges.push(Direction::North);
        }
        if self.sub_x == last {
            edges.push(Direction::East);
        }
        if self.sub_y == last {
            edges.push(Direction::South);
        }
        if self.sub_x == 0 {
            edges.push(Direction::West);
        }
        edges
    }
}

// ---------------------------------------------------------------------------
// Tiles and zones
// ---------------------------------------------------------------------------

/// A tile placed on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: CardId,
    pub coord: TileCoord,
    pub kind: TileKind,
    pub squares: Layout,
    pub zone: char,
    pub corroded: bool,
}

impl Tile {
    pub fn square(&self, sub_x: u8, sub_y: u8) -> SquareKind {
        self.squares[square_index(sub_x, sub_y)]
    }

    /// Non-wall squares, row-major.
    pub fn movable_squares(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        (0..TILE_SIZE)
            .flat_map(|y| (0..TILE_SIZE).map(move |x| (x, y)))
            .filter(|&(x, y)| !self.square(x, y).is_wall())
    }

    pub fn has_square(&self, kind: SquareKind) -> bool {
        self.squares.contains(&kind)
    }
}

/// Zone bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub letter: char,
    pub entered: bool,
    pub card: Option<ZoneNameCard>,
    pub revealed: bool,
}

impl Zone {
    fn new(letter: char) -> Self {
        Self { letter, entered: false, card: None, revealed: false }
    }

    /// The zone's name, if it has been revealed.
    pub fn revealed_name(&self) -> Option<&str> {
        if self.revealed {
            self.card.as_ref().map(|c| c.name.as_str())
        } else {
            None
        }
    }
}

/// Result of peeking at a zone-name card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZonePeek {
    /// The zone has no card bound yet.
    Unassigned,
    Revealed { zone: char, name: String },
    /// The revealed name duplicated another revealed zone; all names were
    /// returned, reshuffled and redealt face-down.
    Reshuffled { zone: char, name: String },
}

/// Where an elevator ride ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElevatorRide {
    pub destination: TileCoord,
    pub zone: Option<char>,
}

/// Board errors.
/// Corroded tiles out of placed tiles, kept as a ratio of counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrosionMark {
    pub corroded: usize,
    pub placed: usize,
}

impl CorrosionMark {
    pub fn new(corroded: usize, placed: usize) -> Self {
        Self { corroded, placed }
    }

    pub fn fraction(&self) -> f64 {
        if self.placed == 0 {
            0.0
        } else {
            self.corroded as f64 / self.placed as f64
        }
    }

    /// Exact comparison of two ratios.
    pub fn exceeds(&self, other: &CorrosionMark) -> bool {
        if self.placed == 0 {
            return false;
        }
        if other.placed == 0 {
            return self.corroded > 0;
        }
        self.corroded * other.placed > other.corroded * self.placed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("a tile already occupies that slot")]
    OccupiedSlot,
    #[error("the slot is not adjacent to any tile on that floor")]
    Disconnected,
    #[error("not a stairwell")]
    NotAStairwell,
    #[error("outside the building")]
    OutOfBounds,
}

impl BoardError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OccupiedSlot => "occupied_slot",
            Self::Disconnected => "disconnected",
            Self::NotAStairwell => "not_a_stairwell",
            Self::OutOfBounds => "out_of_bounds",
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Board {
    floors: BTreeMap<i32, BTreeMap<(i32, i32), Tile>>,
    zones: BTreeMap<char, Zone>,
    /// Zone-name cards not bound to any zone.
    name_pool: Vec<ZoneNameCard>,
    seed: TileCoord,
    escape_exit: Option<TileCoord>,
    bottom_floor: i32,
    top_floor: i32,
    width: i32,
    height: i32,
    corrosion_peak: CorrosionMark,
}

impl Board {
    /// Create a board holding only the seed tile.
    pub fn new(config: &EngineConfig, seed_id: CardId, zone_names: Vec<ZoneNameCard>) -> Self {
        let seed = TileCoord::new(config.starting_floor, config.seed_tile.0, config.seed_tile.1);
        let mut board = Self {
            floors: BTreeMap::new(),
            zones: ZONE_LETTERS.iter().map(|&l| (l, Zone::new(l))).collect(),
            name_pool: zone_names,
            seed,
            escape_exit: None,
            bottom_floor: config.bottom_floor,
            top_floor: config.top_floor,
            width: config.board_width,
            height: config.board_height,
            corrosion_peak: CorrosionMark::default(),
        };
        board.insert(Tile {
            id: seed_id,
            coord: seed,
            kind: TileKind::Basic,
            squares: [SquareKind::Normal; 16],
            zone: SEED_ZONE,
            corroded: false,
        });
        board
    }

    pub fn seed(&self) -> TileCoord {
        self.seed
    }

    pub fn escape_exit(&self) -> Option<TileCoord> {
        self.escape_exit
    }

    pub fn top_floor(&self) -> i32 {
        self.top_floor
    }

    pub fn bottom_floor(&self) -> i32 {
        self.bottom_floor
    }

    pub fn in_bounds(&self, coord: TileCoord) -> bool {
        (self.bottom_floor..=self.top_floor).contains(&coord.floor)
            && (0..self.width).contains(&coord.x)
            && (0..self.height).contains(&coord.y)
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.floors.get(&coord.floor)?.get(&(coord.x, coord.y))
    }

    pub fn tile_mut(&mut self, coord: TileCoord) -> Option<&mut Tile> {
        self.floors.get_mut(&coord.floor)?.get_mut(&(coord.x, coord.y))
    }

    pub fn tile_at(&self, pos: &Position) -> Option<&Tile> {
        self.tile(pos.tile())
    }

    pub fn has_tile(&self, coord: TileCoord) -> bool {
        self.tile(coord).is_some()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.floors.values().flat_map(|floor| floor.values())
    }

    pub fn tiles_on_floor(&self, floor: i32) -> impl Iterator<Item = &Tile> {
        self.floors.get(&floor).into_iter().flat_map(|f| f.values())
    }

    pub fn tile_count(&self) -> usize {
        self.floors.values().map(|f| f.len()).sum()
    }

    pub fn zone(&self, letter: char) -> Option<&Zone> {
        self.zones.get(&letter)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Zone-name cards not currently bound.
    pub fn unassigned_names(&self) -> usize {
        self.name_pool.len()
    }

    fn insert(&mut self, tile: Tile) {
        let coord = tile.coord;
        self.floors.entry(coord.floor).or_default().insert((coord.x, coord.y), tile);
        self.refresh_corrosion();
    }

    // -- placement ----------------------------------------------------------

    /// Check a regular placement without mutating anything.
    pub fn check_placement(&self, coord: TileCoord) -> Result<(), BoardError> {
        self.check_linked_placement(coord)?;
        let floor_empty = self.tiles_on_floor(coord.floor).next().is_none();
        if !floor_empty && !coord.neighbours().any(|n| self.has_tile(n)) {
            return Err(BoardError::Disconnected);
        }
        Ok(())
    }

    /// Check a vertical-arrival placement: only the slot itself matters.
    pub fn check_linked_placement(&self, coord: TileCoord) -> Result<(), BoardError> {
        if !self.in_bounds(coord) {
            return Err(BoardError::OutOfBounds);
        }
        if self.has_tile(coord) {
            return Err(BoardError::OccupiedSlot);
        }
        Ok(())
    }

    /// Place a drawn path tile next to the existing tiles of its floor.
    pub fn place_tile(&mut self, coord: TileCoord, card: PathTileCard, rng: &mut GameRng) -> Result<char, BoardError> {
        self.check_placement(coord)?;
        Ok(self.put(coord, card, rng))
    }

    /// Place a tile reached vertically (fall, stairwell, elevator).
    pub fn place_linked_tile(
        &mut self,
        coord: TileCoord,
        card: PathTileCard,
        rng: &mut GameRng,
    ) -> Result<char, BoardError> {
        self.check_linked_placement(coord)?;
        Ok(self.put(coord, card, rng))
    }

    fn put(&mut self, coord: TileCoord, card: PathTileCard, rng: &mut GameRng) -> char {
        let zone = self.choose_zone(coord, rng);
        self.insert(Tile {
            id: card.id,
            coord,
            kind: card.kind,
            squares: card.layout,
            zone,
            corroded: false,
        });
        zone
    }

    /// Neighbouring zone if any, else an unused letter, else any letter.
    fn choose_zone(&self, coord: TileCoord, rng: &mut GameRng) -> char {
        let mut nearby: Vec<char> = coord.neighbours().filter_map(|n| self.tile(n)).map(|t| t.zone).collect();
        nearby.sort_unstable();
        nearby.dedup();
        if let Some(&zone) = rng.choose(&nearby) {
            return zone;
        }
        let unused: Vec<char> = ZONE_LETTERS
            .iter()
            .copied()
            .filter(|l| !self.tiles().any(|t| t.zone == *l))
            .collect();
        if let Some(&zone) = rng.choose(&unused) {
            return zone;
        }
        rng.choose(&ZONE_LETTERS).copied().unwrap_or(SEED_ZONE)
    }

    /// Remove a tile. Only consumed stairwells leave the board.
    fn remove(&mut self, coord: TileCoord) -> Option<Tile> {
        let tile = self.floors.get_mut(&coord.floor)?.remove(&(coord.x, coord.y))?;
        self.refresh_corrosion();
        Some(tile)
    }

    // -- movement -------------------------------------------------------------

    /// Whether a pawn may stand on `pos`. Corroded tiles are never movable.
    pub fn is_movable(&self, pos: &Position, can_cross_walls: bool) -> bool {
        if !pos.has_valid_sub() {
            return false;
        }
        match self.tile_at(pos) {
            Some(tile) if !tile.corroded => can_cross_walls || !tile.square(pos.sub_x, pos.sub_y).is_wall(),
            _ => false,
        }
    }

    pub fn square_at(&self, pos: &Position) -> Option<SquareKind> {
        if !pos.has_valid_sub() {
            return None;
        }
        self.tile_at(pos).map(|t| t.square(pos.sub_x, pos.sub_y))
    }

    /// Directions in which the pawn at `pos` stands at a path end: an edge
    /// square whose outward slot is inside the building and empty.
    pub fn open_edges(&self, pos: &Position) -> Vec<Direction> {
        pos.edges()
            .into_iter()
            .filter(|d| {
                let (dx, dy) = d.delta();
                let next = pos.tile().offset(dx, dy);
                self.in_bounds(next) && !self.has_tile(next)
            })
            .collect()
    }

    /// A free square on an uncorroded tile, preferring `preferred`.
    pub fn landing_square(&self, coord: TileCoord, preferred: (u8, u8), occupied: &[Position]) -> Option<Position> {
        let tile = self.tile(coord).filter(|t| !t.corroded)?;
        let free = |(x, y): (u8, u8)| {
            let pos = Position::on_tile(coord, x, y);
            (!tile.square(x, y).is_wall() && !occupied.contains(&pos)).then_some(pos)
        };
        free(preferred).or_else(|| tile.movable_squares().find_map(free))
    }

    // -- zones ----------------------------------------------------------------

    /// Mark a zone as entered, dealing it a face-down name card the first time.
    /// Returns true on first entry.
    pub fn enter_zone(&mut self, letter: char, rng: &mut GameRng) -> bool {
        if !self.zones.get(&letter).is_some_and(|z| !z.entered) {
            return false;
        }
        let card = self.deal_name(rng);
        if let Some(zone) = self.zones.get_mut(&letter) {
            zone.entered = true;
            zone.card = card;
        }
        true
    }

    fn deal_name(&mut self, rng: &mut GameRng) -> Option<ZoneNameCard> {
        if self.name_pool.is_empty() {
            return None;
        }
        let index = rng.gen_range_usize(0..self.name_pool.len());
        Some(self.name_pool.swap_remove(index))
    }

    /// Reveal a zone's card. A name already showing on another zone forces a
    /// full reshuffle.
    pub fn peek_zone(&mut self, letter: char, rng: &mut GameRng) -> ZonePeek {
        let name = match self.zones.get(&letter).and_then(|z| z.card.as_ref()) {
            Some(card) => card.name.clone(),
            None => return ZonePeek::Unassigned,
        };
        let duplicate = self
            .zones
            .values()
            .any(|z| z.letter != letter && z.revealed_name() == Some(name.as_str()));
        if duplicate {
            log::debug!("zone {} revealed duplicate name {:?}, reshuffling", letter, name);
            self.reshuffle_names(rng);
            return ZonePeek::Reshuffled { zone: letter, name };
        }
        if let Some(zone) = self.zones.get_mut(&letter) {
            zone.revealed = true;
        }
        ZonePeek::Revealed { zone: letter, name }
    }

    /// Return every bound name card to the pool and redeal entered zones face-down.
    pub fn reshuffle_names(&mut self, rng: &mut GameRng) {
        for zone in self.zones.values_mut() {
            if let Some(card) = zone.card.take() {
                self.name_pool.push(card);
            }
            zone.revealed = false;
        }
        rng.shuffle(&mut self.name_pool);
        let entered: Vec<char> = self.zones.values().filter(|z| z.entered).map(|z| z.letter).collect();
        for letter in entered {
            let card = self.deal_name(rng);
            if let Some(zone) = self.zones.get_mut(&letter) {
                zone.card = card;
            }
        }
    }

    // -- corrosion ------------------------------------------------------------

    pub fn corroded_count(&self) -> usize {
        self.tiles().filter(|t| t.corroded).count()
    }

    /// High-water mark of corroded / placed tiles.
    pub fn corroded_fraction(&self) -> f64 {
        self.corrosion_peak.fraction()
    }

    pub fn corrosion_peak(&self) -> CorrosionMark {
        self.corrosion_peak
    }

    fn refresh_corrosion(&mut self) {
        let current = CorrosionMark::new(self.corroded_count(), self.tile_count());
        if current.exceeds(&self.corrosion_peak) {
            self.corrosion_peak = current;
        }
    }

    /// Corrode one tile. Returns false if it was missing or already corroded.
    pub fn corrode(&mut self, coord: TileCoord) -> bool {
        let changed = match self.tile_mut(coord) {
            Some(tile) if !tile.corroded => {
                tile.corroded = true;
                true
            }
            _ => false,
        };
        if changed {
            self.refresh_corrosion();
        }
        changed
    }

    /// Corrode a random uncorroded tile other than the seed.
    pub fn corrode_random(&mut self, rng: &mut GameRng) -> Option<TileCoord> {
        let seed = self.seed;
        let candidates: Vec<TileCoord> = self
            .tiles()
            .filter(|t| !t.corroded && t.coord != seed)
            .map(|t| t.coord)
            .collect();
        let coord = *rng.choose(&candidates)?;
        self.corrode(coord);
        Some(coord)
    }

    /// One round of spread. With nothing corroded a random tile is seeded;
    /// otherwise each clean neighbour of a corroded tile corrodes with `chance`.
    pub fn spread_corrosion(&mut self, chance: f64, rng: &mut GameRng) -> Vec<TileCoord> {
        if self.corroded_count() == 0 {
            return self.corrode_random(rng).into_iter().collect();
        }
        let candidates: Vec<TileCoord> = self
            .tiles()
            .filter(|t| !t.corroded)
            .filter(|t| t.coord.neighbours().any(|n| self.tile(n).is_some_and(|nt| nt.corroded)))
            .map(|t| t.coord)
            .collect();
        let mut spread = Vec::new();
        for coord in candidates {
            if rng.gen_bool(chance) && self.corrode(coord) {
                spread.push(coord);
            }
        }
        spread
    }

    // -- vertical travel ------------------------------------------------------

    /// Consume the stairwell the pawn stands on and return the slot it leads to.
    pub fn use_stairwell(&mut self, pos: &Position, direction: Vertical) -> Result<TileCoord, BoardError> {
        let coord = pos.tile();
        match self.tile(coord) {
            Some(tile) if tile.kind == TileKind::Stairwell => {}
            _ => return Err(BoardError::NotAStairwell),
        }
        let destination = coord.on_floor(coord.floor + direction.delta());
        if !self.in_bounds(destination) {
            return Err(BoardError::OutOfBounds);
        }
        self.remove(coord);
        Ok(destination)
    }

    /// Resolve a button card into a destination. The requested floor is used
    /// when listed, else the nearest listed floor. A requested zone the button
    /// lists steers the ride to a tile of that zone on the destination floor.
    pub fn use_elevator(
        &self,
        pos: &Position,
        button: &ButtonCard,
        requested_floor: i32,
        requested_zone: Option<char>,
    ) -> Result<ElevatorRide, BoardError> {
        let floor = button
            .resolve_floor(requested_floor)
            .filter(|f| (self.bottom_floor..=self.top_floor).contains(f))
            .ok_or(BoardError::OutOfBounds)?;
        let zone = requested_zone.filter(|z| button.reaches_zone(*z));
        let in_zone = zone.and_then(|z| {
            let mut tiles: Vec<&Tile> = self.tiles_on_floor(floor).filter(|t| t.zone == z && !t.corroded).collect();
            tiles.sort_by_key(|t| t.kind != TileKind::Elevator);
            tiles.first().map(|t| t.coord)
        });
        Ok(ElevatorRide {
            destination: in_zone.unwrap_or_else(|| pos.tile().on_floor(floor)),
            zone,
        })
    }

    /// Place the escape exit in a random empty top-floor slot.
    pub fn spawn_escape_exit(&mut self, id: CardId, rng: &mut GameRng) -> Option<TileCoord> {
        let top = self.top_floor;
        let empty: Vec<TileCoord> = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| TileCoord::new(top, x, y)))
            .filter(|c| !self.has_tile(*c))
            .collect();
        let coord = *rng.choose(&empty)?;
        let mut squares = [SquareKind::Normal; 16];
        squares[square_index(1, 1)] = SquareKind::EmergencyDoor;
        let zone = self.choose_zone(coord, rng);
        self.insert(Tile {
            id,
            coord,
            kind: TileKind::EmergencyDoor,
            squares,
            zone,
            corroded: false,
        });
        self.escape_exit = Some(coord);
        Some(coord)
    }

    pub fn is_escape_exit(&self, coord: TileCoord) -> bool {
        self.escape_exit == Some(coord)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::cards::MIN_MOVABLE_SQUARES;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<ZoneNameCard> {
        list.iter()
            .enumerate()
            .map(|(i, n)| ZoneNameCard { id: CardId(500 + i as u32), name: n.to_string() })
            .collect()
    }

    fn board() -> Board {
        let config = EngineConfig::default();
        Board::new(&config, CardId(0), names(&config.zone_names.iter().map(String::as_str).collect::<Vec<_>>()))
    }

    fn basic(id: u32) -> PathTileCard {
        PathTileCard { id: CardId(id), kind: TileKind::Basic, layout: [SquareKind::Normal; 16] }
    }

    #[test]
    fn test_seed_tile() {
        let board = board();
        let seed = board.tile(TileCoord::new(2, 2, 2)).unwrap();
        assert_eq!(seed.zone, 'B');
        assert_eq!(board.tile_count(), 1);
        assert_eq!(board.corroded_fraction(), 0.0);
    }

    #[test]
    fn test_place_tile_errors() {
        let mut board = board();
        let mut rng = GameRng::new(1);
        assert_eq!(board.place_tile(TileCoord::new(2, 2, 2), basic(1), &mut rng), Err(BoardError::OccupiedSlot));
        assert_eq!(board.place_tile(TileCoord::new(2, 4, 4), basic(1), &mut rng), Err(BoardError::Disconnected));
        assert_eq!(board.place_tile(TileCoord::new(2, 5, 2), basic(1), &mut rng), Err(BoardError::OutOfBounds));
        assert_eq!(board.tile_count(), 1);

        assert!(board.place_tile(TileCoord::new(2, 3, 3), basic(1), &mut rng).is_ok());
        // first tile on an empty floor may go anywhere
        assert!(board.place_tile(TileCoord::new(4, 0, 0), basic(2), &mut rng).is_ok());
        assert_eq!(board.tile_count(), 3);
    }

    #[test]
    fn test_placed_tile_joins_neighbouring_zone() {
        let mut board = board();
        let mut rng = GameRng::new(4);
        let zone = board.place_tile(TileCoord::new(2, 3, 2), basic(1), &mut rng).unwrap();
        assert_eq!(zone, 'B');
    }

    #[test]
    fn test_step_crosses_tile_edge() {
        let pos = Position::new(2, 2, 2, 3, 1);
        assert_eq!(pos.step(1, 0), Position::new(2, 3, 2, 0, 1));
        assert_eq!(pos.step(1, -2), Position::new(2, 3, 1, 0, 3));
        assert!(pos.is_adjacent_to(&pos.step(1, 1)));
        assert!(!pos.is_adjacent_to(&pos));
        assert!(!pos.is_adjacent_to(&pos.step(2, 0)));
    }

    #[test]
    fn test_walls_and_corrosion_block_movement() {
        let mut board = board();
        let mut rng = GameRng::new(1);
        let mut card = basic(1);
        card.layout[square_index(0, 0)] = SquareKind::Wall;
        board.place_tile(TileCoord::new(2, 3, 2), card, &mut rng).unwrap();

        let wall = Position::new(2, 3, 2, 0, 0);
        assert!(!board.is_movable(&wall, false));
        assert!(board.is_movable(&wall, true));

        board.corrode(TileCoord::new(2, 3, 2));
        assert!(!board.is_movable(&wall, true));
        assert!(!board.is_movable(&Position::new(2, 3, 2, 1, 1), true));
        assert!(!board.is_movable(&Position::new(2, 0, 0, 1, 1), false));
    }

    #[test]
    fn test_open_edges() {
        let board = board();
        let corner = Position::new(2, 2, 2, 3, 0);
        assert_eq!(board.open_edges(&corner), vec![Direction::North, Direction::East]);
        assert!(board.open_edges(&Position::new(2, 2, 2, 1, 1)).is_empty());

        let at_border = Position::new(2, 4, 0, 3, 0);
        assert!(board.open_edges(&at_border).is_empty());
    }

    #[test]
    fn test_corroded_fraction_never_decreases() {
        let mut board = board();
        let mut rng = GameRng::new(3);
        board.place_tile(TileCoord::new(2, 3, 2), basic(1), &mut rng).unwrap();
        board.corrode(TileCoord::new(2, 3, 2));
        assert_eq!(board.corroded_fraction(), 0.5);

        board.place_tile(TileCoord::new(2, 1, 2), basic(2), &mut rng).unwrap();
        assert_eq!(board.corroded_fraction(), 0.5);
        assert_eq!(board.corrosion_peak(), CorrosionMark::new(1, 2));
    }

    #[test]
    fn test_corrosion_mark_compares_exactly() {
        assert!(CorrosionMark::new(1, 11).exceeds(&CorrosionMark::new(0, 0)));
        assert!(CorrosionMark::new(2, 13).exceeds(&CorrosionMark::new(1, 11)));
        assert!(!CorrosionMark::new(2, 4).exceeds(&CorrosionMark::new(1, 2)));
        assert!(!CorrosionMark::new(0, 0).exceeds(&CorrosionMark::new(0, 0)));
        assert_eq!(CorrosionMark::new(7, 10).fraction(), 0.7);
    }

    #[test]
    fn test_spread_seeds_then_grows() {
        let mut board = board();
        let mut rng = GameRng::new(9);
        board.place_tile(TileCoord::new(2, 3, 2), basic(1), &mut rng).unwrap();
        board.place_tile(TileCoord::new(2, 4, 2), basic(2), &mut rng).unwrap();

        let seeded = board.spread_corrosion(0.0, &mut rng);
        assert_eq!(seeded.len(), 1);
        assert_ne!(seeded[0], board.seed());

        let grown = board.spread_corrosion(1.0, &mut rng);
        assert!(!grown.is_empty());
        assert!(board.corroded_count() >= 2);
    }

    #[test]
    fn test_zone_entry_deals_face_down() {
        let mut board = board();
        let mut rng = GameRng::new(2);
        assert!(board.enter_zone('B', &mut rng));
        assert!(!board.enter_zone('B', &mut rng));

        let zone = board.zone('B').unwrap();
        assert!(zone.card.is_some());
        assert_eq!(zone.revealed_name(), None);
        assert_eq!(board.unassigned_names(), 7);
    }

    #[test]
    fn test_duplicate_reveal_reshuffles() {
        let config = EngineConfig::default();
        let mut board = Board::new(&config, CardId(0), names(&["Vault", "Vault"]));
        let mut rng = GameRng::new(2);
        board.enter_zone('A', &mut rng);
        board.enter_zone('B', &mut rng);

        assert_eq!(board.peek_zone('A', &mut rng), ZonePeek::Revealed { zone: 'A', name: "Vault".into() });
        assert_eq!(board.peek_zone('B', &mut rng), ZonePeek::Reshuffled { zone: 'B', name: "Vault".into() });

        assert!(board.zones().all(|z| !z.revealed));
        assert!(board.zone('A').unwrap().card.is_some());
        assert!(board.zone('B').unwrap().card.is_some());
        assert_eq!(board.unassigned_names(), 0);
    }

    #[test]
    fn test_peek_unassigned_zone() {
        let mut board = board();
        let mut rng = GameRng::new(2);
        assert_eq!(board.peek_zone('H', &mut rng), ZonePeek::Unassigned);
    }

    #[test]
    fn test_use_stairwell_removes_tile() {
        let mut board = board();
        let mut rng = GameRng::new(2);
        let stairs = PathTileCard::generate(CardId(7), TileKind::Stairwell, &mut rng);
        board.place_tile(TileCoord::new(2, 2, 3), stairs, &mut rng).unwrap();

        let on_seed = Position::new(2, 2, 2, 1, 1);
        assert_eq!(board.use_stairwell(&on_seed, Vertical::Up), Err(BoardError::NotAStairwell));

        let on_stairs = Position::new(2, 2, 3, 1, 1);
        assert_eq!(board.use_stairwell(&on_stairs, Vertical::Up), Ok(TileCoord::new(3, 2, 3)));
        assert!(!board.has_tile(TileCoord::new(2, 2, 3)));
    }

    #[test]
    fn test_elevator_resolves_nearest_floor() {
        let board = board();
        let button = ButtonCard { id: CardId(1), floors: vec![4, 5], zones: vec!['C'] };
        let pos = Position::new(2, 2, 2, 1, 1);
        let ride = board.use_elevator(&pos, &button, 3, Some('B')).unwrap();
        assert_eq!(ride.destination, TileCoord::new(4, 2, 2));
        assert_eq!(ride.zone, None);
    }

    #[test]
    fn test_escape_exit_on_top_floor() {
        let mut board = board();
        let mut rng = GameRng::new(8);
        let exit = board.spawn_escape_exit(CardId(99), &mut rng).unwrap();
        assert_eq!(exit.floor, 5);
        assert!(board.is_escape_exit(exit));
        let tile = board.tile(exit).unwrap();
        assert_eq!(tile.square(1, 1), SquareKind::EmergencyDoor);
    }

    #[test]
    fn test_landing_square_skips_walls_and_pawns() {
        let mut board = board();
        let mut rng = GameRng::new(1);
        let mut card = basic(3);
        card.layout[square_index(1, 1)] = SquareKind::Wall;
        board.place_linked_tile(TileCoord::new(1, 2, 2), card, &mut rng).unwrap();

        let occupied = [Position::new(1, 2, 2, 0, 0)];
        let landing = board.landing_square(TileCoord::new(1, 2, 2), (1, 1), &occupied).unwrap();
        assert_eq!(landing, Position::new(1, 2, 2, 1, 0));
        assert!(board.tile(TileCoord::new(1, 2, 2)).unwrap().movable_squares().count() >= MIN_MOVABLE_SQUARES);
    }
}
