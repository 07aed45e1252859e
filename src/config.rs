//! Configuration for the mirror.
//!
//! This module provides the [`Config`] struct: which instrument pairs to
//! mirror, on which venues, and how the orchestrator paces and stops them.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_INITIAL_SNAPSHOT_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_DEPTH: usize = 15;
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
/// Upper bound for every configured duration, so deadlines never overflow
const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// One venue leg of a pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegConfig {
    /// Venue identifier (e.g. `coinbase`)
    pub venue: String,
    /// Instrument symbol on that venue (e.g. `BTC-USD`, `tBTCUSD`)
    pub symbol: String,
}

impl LegConfig {
    /// Create a leg
    pub fn new(venue: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            symbol: symbol.into(),
        }
    }
}

/// One instrument mirrored on one or more venues
///
/// The first leg is the primary: its top of book is the one printed on the
/// status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairConfig {
    /// Display name of the instrument
    pub instrument: String,
    /// Venue legs, primary first
    pub legs: Vec<LegConfig>,
}

impl PairConfig {
    /// Create a pair with no legs
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            legs: Vec::new(),
        }
    }

    /// Add a venue leg
    #[must_use]
    pub fn with_leg(mut self, venue: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.legs.push(LegConfig::new(venue, symbol));
        self
    }

    /// Check the pair names an instrument and distinct, non-empty legs
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.instrument.trim().is_empty() {
            return Err(Error::Config("pair with empty instrument name".into()));
        }
        if self.legs.is_empty() {
            return Err(Error::Config(format!("{}: no venue legs", self.instrument)));
        }
        for (i, leg) in self.legs.iter().enumerate() {
            if leg.venue.trim().is_empty() || leg.symbol.trim().is_empty() {
                return Err(Error::Config(format!(
                    "{}: leg {i} has an empty venue or symbol",
                    self.instrument
                )));
            }
            if self.legs[..i].iter().any(|other| other.venue == leg.venue) {
                return Err(Error::Config(format!(
                    "{}: venue {} listed twice",
                    self.instrument, leg.venue
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for the mirror
///
/// # Example
///
/// ```rust
/// use lob_mirror::config::{Config, PairConfig};
/// use std::time::Duration;
///
/// let config = Config::new(vec![PairConfig::new("BTC-USD")
///     .with_leg("coinbase", "BTC-USD")
///     .with_leg("bitfinex", "tBTCUSD")])
///     .with_snapshot_interval(Duration::from_millis(500))
///     .with_max_depth(20);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Instrument pairs, one isolated unit each
    pairs: Vec<PairConfig>,

    /// Period of the status tick
    snapshot_interval: Duration,

    /// Delay before the first status tick
    initial_snapshot_delay: Duration,

    /// Depth rows retained and reported per side
    max_depth: usize,

    /// How long a stopping unit may take before its tasks are aborted
    shutdown_grace: Duration,

    /// Pause before re-running a failed feed adapter
    reconnect_delay: Duration,

    /// Stagger between unit launches
    unit_start_delay: Duration,
}

/// On-disk form; durations are seconds
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    pairs: Vec<PairConfig>,
    snapshot_interval_secs: Option<f64>,
    initial_snapshot_delay_secs: Option<f64>,
    max_depth: Option<usize>,
    shutdown_grace_secs: Option<f64>,
    reconnect_delay_secs: Option<f64>,
    unit_start_delay_secs: Option<f64>,
}

fn seconds(field: &str, value: Option<f64>, default: Duration) -> Result<Duration, Error> {
    match value {
        None => Ok(default),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map_err(|e| Error::Config(format!("{field}: {e}"))),
    }
}

impl Config {
    /// Create a configuration for `pairs` with default pacing
    pub fn new(pairs: Vec<PairConfig>) -> Self {
        Self {
            pairs,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            initial_snapshot_delay: DEFAULT_INITIAL_SNAPSHOT_DELAY,
            max_depth: DEFAULT_MAX_DEPTH,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            unit_start_delay: Duration::ZERO,
        }
    }

    /// Parse and validate a JSON configuration
    ///
    /// ```rust
    /// use lob_mirror::Config;
    ///
    /// let config = Config::from_json_str(r#"{
    ///     "pairs": [{"instrument": "BTC-USD", "legs": [
    ///         {"venue": "coinbase", "symbol": "BTC-USD"},
    ///         {"venue": "bitfinex", "symbol": "tBTCUSD"}
    ///     ]}],
    ///     "snapshot_interval_secs": 0.5
    /// }"#).unwrap();
    /// assert_eq!(config.snapshot_interval().as_millis(), 500);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed input and [`Error::Config`] for
    /// invalid values.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let file: ConfigFile = serde_json::from_str(json)?;
        let config = Self {
            pairs: file.pairs,
            snapshot_interval: seconds(
                "snapshot_interval_secs",
                file.snapshot_interval_secs,
                DEFAULT_SNAPSHOT_INTERVAL,
            )?,
            initial_snapshot_delay: seconds(
                "initial_snapshot_delay_secs",
                file.initial_snapshot_delay_secs,
                DEFAULT_INITIAL_SNAPSHOT_DELAY,
            )?,
            max_depth: file.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
            shutdown_grace: seconds(
                "shutdown_grace_secs",
                file.shutdown_grace_secs,
                DEFAULT_SHUTDOWN_GRACE,
            )?,
            reconnect_delay: seconds(
                "reconnect_delay_secs",
                file.reconnect_delay_secs,
                DEFAULT_RECONNECT_DELAY,
            )?,
            unit_start_delay: seconds(
                "unit_start_delay_secs",
                file.unit_start_delay_secs,
                Duration::ZERO,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`Config::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Set the status tick period
    #[must_use]
    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Set the delay before the first status tick
    #[must_use]
    pub fn with_initial_snapshot_delay(mut self, delay: Duration) -> Self {
        self.initial_snapshot_delay = delay;
        self
    }

    /// Set the depth rows retained and reported per side
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the shutdown grace period
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the pause before re-running a failed adapter
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the stagger between unit launches
    #[must_use]
    pub fn with_unit_start_delay(mut self, delay: Duration) -> Self {
        self.unit_start_delay = delay;
        self
    }

    /// Check the configuration is usable
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.pairs.is_empty() {
            return Err(Error::Config("no instrument pairs configured".into()));
        }
        if self.snapshot_interval.is_zero() {
            return Err(Error::Config("snapshot interval must be positive".into()));
        }
        if self.max_depth == 0 {
            return Err(Error::Config("max depth must be positive".into()));
        }
        let durations = [
            ("snapshot interval", self.snapshot_interval),
            ("initial snapshot delay", self.initial_snapshot_delay),
            ("shutdown grace", self.shutdown_grace),
            ("reconnect delay", self.reconnect_delay),
            ("unit start delay", self.unit_start_delay),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| *d > MAX_DURATION) {
            return Err(Error::Config(format!(
                "{name} exceeds {}s",
                MAX_DURATION.as_secs()
            )));
        }
        self.pairs.iter().try_for_each(PairConfig::validate)
    }

    /// Instrument pairs
    pub fn pairs(&self) -> &[PairConfig] {
        &self.pairs
    }

    /// Status tick period
    pub fn snapshot_interval(&self) -> Duration {
        self.snapshot_interval
    }

    /// Delay before the first status tick
    pub fn initial_snapshot_delay(&self) -> Duration {
        self.initial_snapshot_delay
    }

    /// Depth rows retained and reported per side
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Shutdown grace period
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    /// Pause before re-running a failed adapter
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Stagger between unit launches
    pub fn unit_start_delay(&self) -> Duration {
        self.unit_start_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> PairConfig {
        PairConfig::new("BTC-USD")
            .with_leg("coinbase", "BTC-USD")
            .with_leg("bitfinex", "tBTCUSD")
    }

    #[test]
    fn test_default_config() {
        let config = Config::new(vec![btc()]);
        assert_eq!(config.snapshot_interval(), Duration::from_secs(1));
        assert_eq!(config.initial_snapshot_delay(), Duration::from_secs(5));
        assert_eq!(config.max_depth(), 15);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.unit_start_delay(), Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = Config::new(vec![btc()])
            .with_snapshot_interval(Duration::from_millis(250))
            .with_initial_snapshot_delay(Duration::ZERO)
            .with_max_depth(5)
            .with_shutdown_grace(Duration::from_secs(2))
            .with_reconnect_delay(Duration::from_millis(10))
            .with_unit_start_delay(Duration::from_secs(9));

        assert_eq!(config.snapshot_interval(), Duration::from_millis(250));
        assert_eq!(config.initial_snapshot_delay(), Duration::ZERO);
        assert_eq!(config.max_depth(), 5);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(2));
        assert_eq!(config.reconnect_delay(), Duration::from_millis(10));
        assert_eq!(config.unit_start_delay(), Duration::from_secs(9));
    }

    #[test]
    fn test_from_json() {
        let config = Config::from_json_str(
            r#"{
                "pairs": [
                    {"instrument": "BTC-USD", "legs": [
                        {"venue": "coinbase", "symbol": "BTC-USD"},
                        {"venue": "bitfinex", "symbol": "tBTCUSD"}
                    ]},
                    {"instrument": "ETH-USD", "legs": [
                        {"venue": "coinbase", "symbol": "ETH-USD"}
                    ]}
                ],
                "snapshot_interval_secs": 2,
                "max_depth": 50
            }"#,
        )
        .unwrap();

        assert_eq!(config.pairs().len(), 2);
        assert_eq!(config.pairs()[0].legs[1], LegConfig::new("bitfinex", "tBTCUSD"));
        assert_eq!(config.snapshot_interval(), Duration::from_secs(2));
        assert_eq!(config.max_depth(), 50);
        assert_eq!(config.reconnect_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(matches!(
            Config::from_json_str(r#"{"pairs": [], "max_depth": 5}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json_str(
                r#"{"pairs": [{"instrument": "X", "legs": [{"venue": "v", "symbol": "X"}]}],
                    "snapshot_interval_secs": -1}"#
            ),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json_str(r#"{"pairs": [], "colour": "blue"}"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_validate() {
        let no_legs = Config::new(vec![PairConfig::new("BTC-USD")]);
        assert!(no_legs.validate().is_err());

        let twice = Config::new(vec![PairConfig::new("BTC-USD")
            .with_leg("coinbase", "BTC-USD")
            .with_leg("coinbase", "BTC-USDC")]);
        assert!(twice.validate().is_err());

        let zero_depth = Config::new(vec![btc()]).with_max_depth(0);
        assert!(zero_depth.validate().is_err());

        let zero_interval = Config::new(vec![btc()]).with_snapshot_interval(Duration::ZERO);
        assert!(zero_interval.validate().is_err());

        assert!(PairConfig::new(" ").with_leg("coinbase", "BTC-USD").validate().is_err());
        assert!(btc().validate().is_ok());
    }

    #[test]
    fn test_validate_bounds_durations() {
        let day = Duration::from_secs(24 * 60 * 60);
        assert!(Config::new(vec![btc()]).with_shutdown_grace(day).validate().is_ok());

        let huge = Config::new(vec![btc()]).with_shutdown_grace(Duration::MAX);
        assert!(matches!(huge.validate(), Err(Error::Config(msg)) if msg.contains("shutdown grace")));

        let slow = Config::new(vec![btc()]).with_reconnect_delay(day + Duration::from_secs(1));
        assert!(slow.validate().is_err());
    }
}
