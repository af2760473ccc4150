//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `hub.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - StorageConfig: where the sqlite log lives.
//!     - ServerConfig: http bind address.
//!     - PollingConfig / HistoryConfig: dashboard refresh and window size.
//!     - QueryConfig / DisplayConfig / IngestConfig: read and write behaviour.
//!     - GeneratorConfig: the synthetic reading producer.
//!     - SensorConfig: the sensor catalogue (ranges, units, precision).
//!
//! ==============================================================================

use crate::domain::SensorKind;
use anyhow::{anyhow, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MIN_POLL_SECONDS: u64 = 1;
pub const MAX_POLL_SECONDS: u64 = 30;
pub const MIN_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 500;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct HostConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_sensors")]
    pub sensors: Vec<SensorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    /// rows per sensor shown by the dashboard
    pub limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QueryConfig {
    /// lower bound on the over-fetch multiplier; the sensor count wins if larger
    pub over_fetch_factor: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    /// e.g. "-03:00", "+01:00", "Z"
    pub utc_offset: String,
    pub main_sensor: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    /// reject missing sensorId/value/timestamp at the gateway instead of
    /// leaving it to the table's NOT NULL constraints
    pub strict_validation: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorMode {
    /// call the ingestion gateway in-process
    Direct,
    /// POST each reading to `hub_url`
    Push,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneratorConfig {
    pub enabled: bool,
    pub mode: GeneratorMode,
    pub interval_seconds: u64,
    pub seed: u64,
    pub motion_probability: f64,
    pub hub_url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

/// one entry of the sensor catalogue
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SensorConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SensorKind,
    pub label: String,
    #[serde(default)]
    pub unit: String,
    pub min: f64,
    pub max: f64,
    /// decimal places used both when generating and when displaying
    #[serde(default)]
    pub precision: usize,
}

impl HostConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        Self::from_toml(&content)
    }

    /// Parse configuration text and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: HostConfig =
            toml::from_str(content).map_err(|e| anyhow!("Failed to parse config: {}", e))?;
        config.display_offset()?;
        for s in &config.sensors {
            if !s.min.is_finite() || !s.max.is_finite() {
                return Err(anyhow!("sensor {}: min and max must be finite numbers", s.id));
            }
            if s.min > s.max {
                return Err(anyhow!("sensor {}: min {} exceeds max {}", s.id, s.min, s.max));
            }
        }
        if !(0.0..=1.0).contains(&config.generator.motion_probability) {
            return Err(anyhow!(
                "generator.motion_probability must be within 0..=1, got {}",
                config.generator.motion_probability
            ));
        }
        Ok(config)
    }

    /// first config file found in the usual places
    pub fn default_path() -> Option<PathBuf> {
        [
            PathBuf::from("config").join("hub.toml"),
            PathBuf::from("..").join("config").join("hub.toml"),
        ]
        .into_iter()
        .find(|p| p.exists())
    }

    /// dashboard refresh interval, clamped to what the ui control allows
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.polling
                .interval_seconds
                .clamp(MIN_POLL_SECONDS, MAX_POLL_SECONDS),
        )
    }

    /// per-sensor history size, clamped to what the ui control allows
    pub fn history_limit(&self) -> usize {
        self.history.limit.clamp(MIN_HISTORY_LIMIT, MAX_HISTORY_LIMIT)
    }

    /// K in `limit * K`: never below the number of tracked sensors
    pub fn over_fetch_factor(&self) -> usize {
        self.query.over_fetch_factor.max(self.sensors.len()).max(1)
    }

    pub fn display_offset(&self) -> Result<FixedOffset> {
        parse_offset(&self.display.utc_offset)
    }

    pub fn sensor(&self, id: &str) -> Option<&SensorConfig> {
        self.sensors.iter().find(|s| s.id == id)
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        tracing::info!("┌─────────────────────────────────────────┐");
        tracing::info!("│            HUB CONFIGURATION            │");
        tracing::info!("├─────────────────────────────────────────┤");
        tracing::info!("│ Storage: {}", self.storage.path.display());
        tracing::info!("│ Bind: {}", self.server.bind);
        tracing::info!("│ Poll Interval: {}s", self.poll_interval().as_secs());
        tracing::info!("│ History Limit: {}", self.history_limit());
        tracing::info!("│ Sensors: {}", self.sensors.len());
        tracing::info!("│ Generator: {}", if self.generator.enabled { "on" } else { "off" });
        tracing::info!("│ Log Level: {}", self.logging.level);
        tracing::info!("└─────────────────────────────────────────┘");
    }
}

/// parse "+HH:MM" / "-HH:MM" / "Z" into a fixed offset
pub fn parse_offset(s: &str) -> Result<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("invalid offset"));
    }
    let (sign, rest) = if let Some(rest) = s.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = s.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(anyhow!("invalid utc offset '{}': expected +HH:MM or -HH:MM", s));
    };
    let (h, m) = rest
        .split_once(':')
        .ok_or_else(|| anyhow!("invalid utc offset '{}': expected +HH:MM or -HH:MM", s))?;
    let h: i32 = h.parse().map_err(|_| anyhow!("invalid utc offset hours in '{}'", s))?;
    let m: i32 = m.parse().map_err(|_| anyhow!("invalid utc offset minutes in '{}'", s))?;
    FixedOffset::east_opt(sign * (h * 3600 + m * 60))
        .ok_or_else(|| anyhow!("utc offset '{}' out of range", s))
}

fn default_sensors() -> Vec<SensorConfig> {
    vec![
        SensorConfig {
            id: "M040".into(),
            kind: SensorKind::Motion,
            label: "Movimento".into(),
            unit: String::new(),
            min: 0.0,
            max: 1.0,
            precision: 0,
        },
        SensorConfig {
            id: "T010".into(),
            kind: SensorKind::Temperature,
            label: "Temperatura".into(),
            unit: "°C".into(),
            min: 18.0,
            max: 35.0,
            precision: 1,
        },
        SensorConfig {
            id: "H020".into(),
            kind: SensorKind::Humidity,
            label: "Umidade".into(),
            unit: "%".into(),
            min: 30.0,
            max: 90.0,
            precision: 0,
        },
        SensorConfig {
            id: "L030".into(),
            kind: SensorKind::Light,
            label: "Luminosidade".into(),
            unit: "lux".into(),
            min: 0.0,
            max: 1000.0,
            precision: 0,
        },
    ]
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("sensores.db"), busy_timeout_ms: 1000 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8080".to_string() }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: 3 }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 100 }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { over_fetch_factor: 3 }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { utc_offset: "-03:00".to_string(), main_sensor: "T010".to_string() }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { strict_validation: true }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: GeneratorMode::Direct,
            interval_seconds: 2,
            seed: 42,
            motion_probability: 0.5,
            hub_url: "http://localhost:8080/api/sensor/data".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            polling: PollingConfig::default(),
            history: HistoryConfig::default(),
            query: QueryConfig::default(),
            display: DisplayConfig::default(),
            ingest: IngestConfig::default(),
            generator: GeneratorConfig::default(),
            logging: LoggingConfig::default(),
            sensors: default_sensors(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_default_catalogue() {
        let config = HostConfig::from_toml("").unwrap();
        let ids: Vec<_> = config.sensors.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["M040", "T010", "H020", "L030"]);
        assert_eq!(config.sensor("T010").unwrap().precision, 1);
        assert!(config.ingest.strict_validation);
        assert_eq!(config.over_fetch_factor(), 4);
    }

    #[test]
    fn shipped_config_parses() {
        let config = HostConfig::from_toml(include_str!("../config/hub.toml")).unwrap();
        assert_eq!(config.sensors, HostConfig::default().sensors);
        assert_eq!(config.display_offset().unwrap().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = HostConfig::from_toml("[generator]\nenabled = true\nmode = \"push\"\n").unwrap();
        assert!(config.generator.enabled);
        assert_eq!(config.generator.mode, GeneratorMode::Push);
        assert_eq!(config.generator.seed, 42);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn intervals_are_clamped() {
        let config = HostConfig::from_toml(
            "[polling]\ninterval_seconds = 120\n[history]\nlimit = 5\n",
        )
        .unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(MAX_POLL_SECONDS));
        assert_eq!(config.history_limit(), MIN_HISTORY_LIMIT);
    }

    #[test]
    fn sensors_table_replaces_defaults() {
        let config = HostConfig::from_toml(
            r#"
[[sensors]]
id = "T099"
type = "temperature"
label = "Estufa"
unit = "°C"
min = 10.0
max = 40.0
precision = 2
"#,
        )
        .unwrap();
        assert_eq!(config.sensors.len(), 1);
        assert_eq!(config.sensors[0].kind, SensorKind::Temperature);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = HostConfig::from_toml(
            "[[sensors]]\nid = \"X\"\ntype = \"light\"\nlabel = \"x\"\nmin = 5.0\nmax = 1.0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("exceeds max"));
    }

    #[test]
    fn non_finite_range_is_rejected() {
        for (min, max) in [("nan", "1.0"), ("0.0", "nan"), ("-inf", "1.0"), ("0.0", "inf")] {
            let text = format!(
                "[[sensors]]\nid = \"X\"\ntype = \"light\"\nlabel = \"x\"\nmin = {}\nmax = {}\n",
                min, max
            );
            let err = HostConfig::from_toml(&text).unwrap_err();
            assert!(err.to_string().contains("finite"), "{} {}: {}", min, max, err);
        }
    }

    #[test]
    fn offsets_parse() {
        assert_eq!(parse_offset("-03:00").unwrap().local_minus_utc(), -3 * 3600);
        assert_eq!(parse_offset("+05:30").unwrap().local_minus_utc(), 5 * 3600 + 1800);
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("America/Sao_Paulo").is_err());
        assert!(HostConfig::from_toml("[display]\nutc_offset = \"bogus\"\nmain_sensor = \"T010\"\n").is_err());
    }
}
