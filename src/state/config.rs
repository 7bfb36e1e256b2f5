//! Engine configuration.
//!
//! Every rule constant the engine consults lives here so a host process can
//! tune a table without touching engine code. Defaults reproduce the standard
//! rules. Partial JSON documents are accepted; missing fields keep defaults.

use serde::{Deserialize, Serialize};

use super::cards::ItemKind;

/// Minimum players required to start a session.
pub const MIN_PLAYERS: usize = 2;

/// Hard upper bound on players per session.
pub const MAX_PLAYERS: usize = 6;

/// Side length of a tile's square sub-grid.
pub const TILE_SIZE: u8 = 4;

/// Zone letters, in board order.
pub const ZONE_LETTERS: [char; 8] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];

/// Default zone-name card faces.
pub const DEFAULT_ZONE_NAMES: [&str; 8] = [
    "Laboratory Wing",
    "Administrative Office",
    "Research Facility",
    "Patient Ward",
    "Storage Area",
    "Maintenance Tunnel",
    "Observation Deck",
    "Emergency Exit",
];

/// Engine-wide rule configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_players: usize,
    pub max_players: usize,

    /// Start automatically once this many players have joined.
    pub auto_start_players: Option<usize>,

    /// Lowest floor number (inclusive).
    pub bottom_floor: i32,
    /// Highest floor number (inclusive); the escape exit appears here.
    pub top_floor: i32,
    pub starting_floor: i32,

    /// Tile slots per floor along x.
    pub board_width: i32,
    /// Tile slots per floor along y.
    pub board_height: i32,
    /// Slot of the seed tile on the starting floor.
    pub seed_tile: (i32, i32),

    /// Disorder at which Explore turns into Fall and walls become passable.
    pub disorder_threshold: u32,

    pub meet_disorder_range: u32,
    pub meet_disorder_reduction: u32,
    pub rob_disorder_penalty: u32,

    pub hand_limit: usize,
    pub effect_slots: usize,
    pub starting_hand: usize,

    pub movement_die: u32,
    pub order_die: u32,

    pub phases: PhaseThresholds,

    pub corrosion_spread_chance: f64,
    /// Extra spread chance per active anomaly source.
    pub anomaly_source_pressure: f64,
    pub collective_failure_fraction: f64,

    /// Chance that a Mutation/EndGame draw pulls the next anomaly forward.
    pub anomaly_bias: f64,
    pub elevator_malfunction_chance: f64,

    pub escape_items_required: usize,
    pub experiment_reports_required: usize,
    /// Item kinds that count toward an escape.
    pub escape_items: Vec<ItemKind>,

    /// Faces of the zone-name cards, one card per entry.
    pub zone_names: Vec<String>,

    /// Bounded size of the in-memory game log.
    pub log_capacity: usize,
}

/// When the board mutates into the next phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    pub mutation_after_actions: u32,
    pub end_game_after_actions: u32,
    pub mutation_at_round: Option<u32>,
    pub end_game_at_round: Option<u32>,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            mutation_after_actions: 50,
            end_game_after_actions: 100,
            mutation_at_round: None,
            end_game_at_round: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_players: MIN_PLAYERS,
            max_players: MAX_PLAYERS,
            auto_start_players: None,
            bottom_floor: 1,
            top_floor: 5,
            starting_floor: 2,
            board_width: 5,
            board_height: 5,
            seed_tile: (2, 2),
            disorder_threshold: 6,
            meet_disorder_range: 2,
            meet_disorder_reduction: 1,
            rob_disorder_penalty: 1,
            hand_limit: 7,
            effect_slots: 4,
            starting_hand: 3,
            movement_die: 6,
            order_die: 12,
            phases: PhaseThresholds::default(),
            corrosion_spread_chance: 0.05,
            anomaly_source_pressure: 0.02,
            collective_failure_fraction: 0.70,
            anomaly_bias: 0.25,
            elevator_malfunction_chance: 0.30,
            escape_items_required: 3,
            experiment_reports_required: 7,
            escape_items: vec![ItemKind::MasterKey, ItemKind::Crowbar, ItemKind::EscapeRope],
            zone_names: DEFAULT_ZONE_NAMES.iter().map(|s| s.to_string()).collect(),
            log_capacity: 50,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_players < 1 || self.min_players > self.max_players {
            return Err(ConfigError::Invalid("min_players must be in 1..=max_players"));
        }
        if self.max_players > MAX_PLAYERS {
            return Err(ConfigError::Invalid("max_players may not exceed 6"));
        }
        if let Some(auto) = self.auto_start_players {
            if auto < self.min_players || auto > self.max_players {
                return Err(ConfigError::Invalid(
                    "auto_start_players must be within the player limits",
                ));
            }
        }
        if self.bottom_floor > self.top_floor {
            return Err(ConfigError::Invalid("bottom_floor is above top_floor"));
        }
        if !self.floor_in_range(self.starting_floor) {
            return Err(ConfigError::Invalid("starting_floor is outside the building"));
        }
        if self.board_width < 1 || self.board_height < 1 {
            return Err(ConfigError::Invalid("board dimensions must be positive"));
        }
        if !self.slot_in_bounds(self.seed_tile.0, self.seed_tile.1) {
            return Err(ConfigError::Invalid("seed_tile is outside the board"));
        }
        if self.movement_die < 1 || self.order_die < 2 {
            return Err(ConfigError::Invalid("dice need at least one face"));
        }
        for chance in [
            self.corrosion_spread_chance,
            self.anomaly_source_pressure,
            self.anomaly_bias,
            self.elevator_malfunction_chance,
            self.collective_failure_fraction,
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(ConfigError::Invalid("probabilities must lie in 0.0..=1.0"));
            }
        }
        if self.zone_names.is_empty() || self.zone_names.len() > ZONE_LETTERS.len() {
            return Err(ConfigError::Invalid("zone_names must hold 1..=8 names"));
        }
        if self.starting_hand > self.hand_limit {
            return Err(ConfigError::Invalid("starting_hand exceeds hand_limit"));
        }
        Ok(())
    }

    pub fn floor_in_range(&self, floor: i32) -> bool {
        (self.bottom_floor..=self.top_floor).contains(&floor)
    }

    pub fn slot_in_bounds(&self, x: i32, y: i32) -> bool {
        (0..self.board_width).contains(&x) && (0..self.board_height).contains(&y)
    }

    /// Whether a player at this disorder must Fall and may cross walls.
    pub fn is_disordered(&self, disorder: u32) -> bool {
        disorder >= self.disorder_threshold
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_players, 6);
        assert_eq!(config.disorder_threshold, 6);
        assert_eq!(config.zone_names.len(), 8);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"max_players": 4, "phases": {"mutation_at_round": 3}}"#)
                .unwrap();
        assert_eq!(config.max_players, 4);
        assert_eq!(config.min_players, 2);
        assert_eq!(config.phases.mutation_at_round, Some(3));
        assert_eq!(config.phases.end_game_after_actions, 100);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = EngineConfig::from_json_str(r#"{"max_players": 9}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_json_str(r#"{"anomaly_bias": 1.5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_disorder_threshold() {
        let config = EngineConfig::default();
        assert!(!config.is_disordered(5));
        assert!(config.is_disordered(6));
        assert!(config.is_disordered(7));
    }
}
