//! Configuration loading and typed config structures for the Circuit simulation.
//!
//! The canonical configuration lives in `circuit-config.yaml` at the project
//! root. Every section and field has a default, so an empty file (or no file
//! at all) yields a runnable setup: a JFK-anchored 8 x 4 NM pattern with
//! three aircraft, ticking once per second.

use std::path::Path;

use circuit_types::PatternDirection;
use serde::Deserialize;

use crate::geometry::SECS_PER_HOUR;

/// Distance inside the active radius at which arrivals appear.
pub const ARRIVAL_INSET_NM: f64 = 1.0;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is outside its valid range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `circuit-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Network listener and wall-clock tick cadence.
    pub server: ServerSection,
    /// Per-instance simulation settings.
    pub simulation: SimulationConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl CircuitConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values (see
    /// [`CircuitConfig::apply_env_overrides`]). The result is validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Override selected values with environment variables when set.
    ///
    /// - `CIRCUIT_PORT` (or `PORT`) overrides `server.port`
    /// - `SIM_RANDOMNESS` overrides `simulation.chaos.randomness`
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        let port = std::env::var("CIRCUIT_PORT").or_else(|_| std::env::var("PORT"));
        if let Some(port) = port.ok().and_then(|val| val.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(randomness) = std::env::var("SIM_RANDOMNESS")
            .ok()
            .and_then(|val| val.parse::<f64>().ok())
        {
            self.simulation.chaos.randomness = randomness;
        }
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.tick_interval_ms == 0 {
            return Err(invalid("server.tick_interval_ms must be at least 1"));
        }
        self.simulation.validate()
    }
}

/// Network listener settings and the wall-clock tick period.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// TCP port to listen on.
    pub port: u16,
    /// Real-time milliseconds between pushed ticks, independent of `dt`.
    pub tick_interval_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 4000,
            tick_interval_ms: 1000,
        }
    }
}

/// Settings for one simulation instance.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated seconds per tick.
    pub dt_sec: f64,
    /// Aircraft spread around the pattern at start.
    pub initial_aircraft: u32,
    /// RNG seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Transcript lines included in each snapshot.
    pub transcript_window: usize,
    /// Aircraft beyond this distance from the pattern centre are removed.
    pub active_radius_nm: f64,
    /// Period of the routine suggested call when nothing is wrong.
    pub suggestion_period_sec: u64,
    /// Narrate newly detected conflicts in the transcript.
    pub narrate_conflicts: bool,
    /// Probability that a pilot acknowledges a traffic alert.
    pub pilot_ack_probability: f64,
    /// Probability that a runway pass is a touch-and-go instead of a full stop.
    pub touch_and_go_probability: f64,
    /// How long injected external anomalies stay in the snapshot.
    pub external_anomaly_ttl_sec: f64,
    /// Pattern geometry.
    pub pattern: PatternConfig,
    /// Arrival scheduling.
    pub arrivals: ArrivalConfig,
    /// Performance limits of the motion model.
    pub motion: MotionConfig,
    /// Stochastic perturbation.
    pub chaos: ChaosConfig,
    /// Conflict detection and resolution.
    pub brain: BrainConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt_sec: 1.0,
            initial_aircraft: 3,
            seed: None,
            transcript_window: 30,
            active_radius_nm: 30.0,
            suggestion_period_sec: 15,
            narrate_conflicts: true,
            pilot_ack_probability: 0.6,
            touch_and_go_probability: 0.5,
            external_anomaly_ttl_sec: 10.0,
            pattern: PatternConfig::default(),
            arrivals: ArrivalConfig::default(),
            motion: MotionConfig::default(),
            chaos: ChaosConfig::default(),
            brain: BrainConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// A configuration with no randomness in flight: chaos off, no initial
    /// aircraft, no arrivals, fixed seed. Tests build on this.
    pub fn deterministic() -> Self {
        Self {
            initial_aircraft: 0,
            seed: Some(7),
            chaos: ChaosConfig::disabled(),
            arrivals: ArrivalConfig {
                enabled: false,
                ..ArrivalConfig::default()
            },
            pattern: PatternConfig {
                direction: Some(PatternDirection::Clockwise),
                ..PatternConfig::default()
            },
            ..Self::default()
        }
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("simulation.dt_sec", self.dt_sec)?;
        positive("simulation.active_radius_nm", self.active_radius_nm)?;
        probability("simulation.pilot_ack_probability", self.pilot_ack_probability)?;
        probability(
            "simulation.touch_and_go_probability",
            self.touch_and_go_probability,
        )?;
        non_negative(
            "simulation.external_anomaly_ttl_sec",
            self.external_anomaly_ttl_sec,
        )?;
        positive("pattern.width_nm", self.pattern.width_nm)?;
        positive("pattern.height_nm", self.pattern.height_nm)?;
        let corner = (self.pattern.width_nm / 2.0).hypot(self.pattern.height_nm / 2.0);
        if self.active_radius_nm <= corner + ARRIVAL_INSET_NM {
            return Err(invalid(&format!(
                "simulation.active_radius_nm must exceed {:.1} NM to leave room for arrivals \
                 outside the pattern",
                corner + ARRIVAL_INSET_NM
            )));
        }
        finite("pattern.origin_lat", self.pattern.origin_lat)?;
        finite("pattern.origin_lon", self.pattern.origin_lon)?;
        if self.pattern.origin_lat.abs() >= 89.0 {
            return Err(invalid("pattern.origin_lat must be within +/-89 degrees"));
        }
        non_negative("arrivals.first_arrival_sec", self.arrivals.first_arrival_sec)?;
        positive("arrivals.base_interval_sec", self.arrivals.base_interval_sec)?;
        non_negative("arrivals.jitter_sec", self.arrivals.jitter_sec)?;
        positive("motion.turn_rate_deg_per_sec", self.motion.turn_rate_deg_per_sec)?;
        positive("motion.climb_rate_fpm", self.motion.climb_rate_fpm)?;
        positive(
            "motion.acceleration_kt_per_sec",
            self.motion.acceleration_kt_per_sec,
        )?;
        non_negative("motion.min_speed_kt", self.motion.min_speed_kt)?;
        if self.motion.max_speed_kt < self.motion.min_speed_kt {
            return Err(invalid("motion.max_speed_kt must be >= motion.min_speed_kt"));
        }
        non_negative("motion.vector_duration_sec", self.motion.vector_duration_sec)?;
        // The runway event fires on a tick that ends on the upwind leg.
        let max_step_nm = self.motion.max_speed_kt * self.dt_sec / SECS_PER_HOUR;
        if max_step_nm >= self.pattern.width_nm / 2.0 {
            return Err(invalid(
                "simulation.dt_sec is too long: one tick at motion.max_speed_kt would skip \
                 the upwind leg",
            ));
        }
        non_negative("chaos.randomness", self.chaos.randomness)?;
        non_negative("chaos.chaos_level", self.chaos.chaos_level)?;
        non_negative("brain.cooldown_sec", self.brain.cooldown_sec)?;
        non_negative("brain.speed_floor_kt", self.brain.speed_floor_kt)?;
        self.brain.thresholds.validate()
    }
}

/// Rectangular pattern geometry and its geographic anchor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Length of the runway-parallel edges in nautical miles.
    pub width_nm: f64,
    /// Length of the crosswind and base edges in nautical miles.
    pub height_nm: f64,
    /// Direction of traffic; `None` picks one at random per instance.
    pub direction: Option<PatternDirection>,
    /// Latitude of the pattern centre.
    pub origin_lat: f64,
    /// Longitude of the pattern centre.
    pub origin_lon: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            width_nm: 8.0,
            height_nm: 4.0,
            direction: None,
            origin_lat: 40.6413,
            origin_lon: -73.7781,
        }
    }
}

/// Arrival scheduling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArrivalConfig {
    /// Whether new arrivals are spawned at all.
    pub enabled: bool,
    /// Simulated time of the first arrival.
    pub first_arrival_sec: f64,
    /// Minimum spacing between arrivals.
    pub base_interval_sec: f64,
    /// Random extra spacing, drawn uniformly from `[0, jitter_sec)`.
    pub jitter_sec: f64,
    /// Spawns are deferred while the fleet is at `initial_aircraft` times
    /// this multiplier (minimum base of 3).
    pub max_active_multiplier: u32,
}

impl Default for ArrivalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            first_arrival_sec: 20.0,
            base_interval_sec: 20.0,
            jitter_sec: 40.0,
            max_active_multiplier: 10,
        }
    }
}

/// Performance limits used by the motion model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Maximum turn rate (standard rate is 3 deg/s).
    pub turn_rate_deg_per_sec: f64,
    /// Maximum climb or descent rate.
    pub climb_rate_fpm: f64,
    /// Maximum change of ground speed per second.
    pub acceleration_kt_per_sec: f64,
    /// Lowest target speed the model accepts (stall floor).
    pub min_speed_kt: f64,
    /// Highest target speed the model accepts.
    pub max_speed_kt: f64,
    /// How long a heading vector is flown before rejoining.
    pub vector_duration_sec: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            turn_rate_deg_per_sec: 3.0,
            climb_rate_fpm: 500.0,
            acceleration_kt_per_sec: 2.0,
            min_speed_kt: 40.0,
            max_speed_kt: 250.0,
            vector_duration_sec: 30.0,
        }
    }
}

/// Stochastic perturbation of the motion model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChaosConfig {
    /// Master switch; when off no perturbation of any kind is applied.
    pub enabled: bool,
    /// Scale of the per-tick heading jitter and altitude bump probability.
    pub randomness: f64,
    /// Scale of the deliberate deviation probability (0.5% per unit per tick).
    pub chaos_level: f64,
}

impl ChaosConfig {
    /// No perturbation at all.
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            randomness: 0.0,
            chaos_level: 0.0,
        }
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            randomness: 1.0,
            chaos_level: 5.0,
        }
    }
}

/// Conflict detection thresholds and brain behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Start in automatic mode.
    pub auto_mode: bool,
    /// Minimum simulated seconds between two instructions to one aircraft.
    pub cooldown_sec: f64,
    /// Conflicts considered per tick, taken from the front of the sorted list.
    pub max_conflicts_per_tick: usize,
    /// Speed instructions never go below this.
    pub speed_floor_kt: f64,
    /// Separation thresholds.
    pub thresholds: SeparationThresholds,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            auto_mode: false,
            cooldown_sec: 5.0,
            max_conflicts_per_tick: 3,
            speed_floor_kt: 80.0,
            thresholds: SeparationThresholds::default(),
        }
    }
}

/// Horizontal (NM) and vertical (ft) limits of one severity band.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SeparationBand {
    /// Horizontal separation below which the band applies.
    pub horizontal_nm: f64,
    /// Vertical separation below which the band applies.
    pub vertical_ft: f64,
}

/// Nested severity bands; each must contain the one before it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SeparationThresholds {
    /// Critical band.
    pub critical: SeparationBand,
    /// Warning band.
    pub warning: SeparationBand,
    /// Advisory band (also requires closing).
    pub advisory: SeparationBand,
}

impl Default for SeparationThresholds {
    fn default() -> Self {
        Self {
            critical: SeparationBand {
                horizontal_nm: 1.0,
                vertical_ft: 500.0,
            },
            warning: SeparationBand {
                horizontal_nm: 2.0,
                vertical_ft: 1000.0,
            },
            advisory: SeparationBand {
                horizontal_nm: 3.0,
                vertical_ft: 1500.0,
            },
        }
    }
}

impl SeparationThresholds {
    /// Check that the bands are positive and nested.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a band is not positive or does
    /// not contain the more severe band.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("brain.thresholds.critical.horizontal_nm", self.critical.horizontal_nm)?;
        positive("brain.thresholds.critical.vertical_ft", self.critical.vertical_ft)?;
        let nested = self.critical.horizontal_nm <= self.warning.horizontal_nm
            && self.warning.horizontal_nm <= self.advisory.horizontal_nm
            && self.critical.vertical_ft <= self.warning.vertical_ft
            && self.warning.vertical_ft <= self.advisory.vertical_ft;
        if nested {
            Ok(())
        } else {
            Err(invalid("brain.thresholds must be nested: critical <= warning <= advisory"))
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            json: false,
        }
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

fn finite(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(&format!("{field} must be a finite number")))
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(invalid(&format!("{field} must be greater than zero")))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(&format!("{field} must not be negative")))
    }
}

fn probability(field: &str, value: f64) -> Result<(), ConfigError> {
    non_negative(field, value)?;
    if value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(&format!("{field} must be at most 1.0")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CircuitConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.tick_interval_ms, 1000);
        assert_eq!(config.simulation.initial_aircraft, 3);
        assert_eq!(config.simulation.transcript_window, 30);
        assert!(!config.simulation.brain.auto_mode);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9090
  tick_interval_ms: 250

simulation:
  dt_sec: 2.0
  initial_aircraft: 6
  seed: 99
  pattern:
    width_nm: 6.0
    height_nm: 3.0
    direction: ccw
  arrivals:
    enabled: false
  chaos:
    enabled: false
  brain:
    auto_mode: true
    cooldown_sec: 10.0

logging:
  level: "debug"
  json: true
"#;

        let config = CircuitConfig::parse(yaml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.simulation.seed, Some(99));
        assert_eq!(
            config.simulation.pattern.direction,
            Some(PatternDirection::CounterClockwise)
        );
        assert!(!config.simulation.arrivals.enabled);
        assert!(!config.simulation.chaos.enabled);
        assert!(config.simulation.brain.auto_mode);
        assert!(config.logging.json);
        // Untouched fields keep their defaults.
        assert_eq!(config.simulation.brain.max_conflicts_per_tick, 3);
        assert_eq!(config.simulation.motion, MotionConfig::default());
    }

    #[test]
    fn parse_empty_yaml() {
        let config = CircuitConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn rejects_non_positive_dt() {
        let yaml = "simulation:\n  dt_sec: 0.0\n";
        let result = CircuitConfig::parse(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let yaml = "server:\n  tick_interval_ms: 0\n";
        assert!(CircuitConfig::parse(yaml).is_err());
    }

    #[test]
    fn rejects_non_nested_thresholds() {
        let mut config = CircuitConfig::default();
        config.simulation.brain.thresholds.warning.horizontal_nm = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_active_radius_inside_the_pattern() {
        let mut config = SimulationConfig::default();
        config.pattern.width_nm = 14.0;
        assert!(config.validate().is_ok());
        config.active_radius_nm = 7.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("active_radius_nm"));
    }

    #[test]
    fn rejects_dt_that_skips_the_upwind_leg() {
        let mut config = SimulationConfig::default();
        // 250 kt for 58 s is just over the 4 NM upwind half.
        config.dt_sec = 58.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("dt_sec"));
        config.dt_sec = 57.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deterministic_preset_turns_off_randomness() {
        let config = SimulationConfig::deterministic();
        assert!(!config.chaos.enabled);
        assert!(!config.arrivals.enabled);
        assert_eq!(config.initial_aircraft, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("circuit-config.yaml");
        if path.exists() {
            let config = CircuitConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
