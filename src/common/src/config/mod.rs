use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::log::LogLevel;

/// Engine configuration, layered from defaults, an optional TOML file and
/// `MIRAGE__`-prefixed environment variables.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub traces: TracesConfig,

    #[serde(default)]
    pub logs: LogsConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Fixed sampler seed; unset means entropy-seeded snapshots
    #[serde(default)]
    pub seed: Option<u64>,
}

/// The simulated service fleet every generator draws from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub names: Vec<String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            names: vec![
                "api-gateway".to_string(),
                "auth-service".to_string(),
                "order-service".to_string(),
                "payment-service".to_string(),
                "inventory-service".to_string(),
                "notification-service".to_string(),
            ],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Sample interval for generated series
    #[serde(with = "humantime_serde")]
    pub step: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracesConfig {
    /// Traces per cached snapshot
    pub count: usize,
    /// Soft target for tree depth; the duration budget may cut it short
    pub min_depth: u32,
    pub max_depth: u32,
    /// Per-span error probability
    pub error_rate: f64,
    pub duration_min_ms: f64,
    pub duration_max_ms: f64,
    /// Per-try probability of spawning a child span
    pub branch_probability: f64,
    /// Root durations above this ceiling mark the trace TIMEOUT
    pub timeout_ms: f64,
}

impl Default for TracesConfig {
    fn default() -> Self {
        Self {
            count: 200,
            min_depth: 2,
            max_depth: 6,
            error_rate: 0.05,
            duration_min_ms: 10.0,
            duration_max_ms: 2_000.0,
            branch_probability: 0.6,
            timeout_ms: 30_000.0,
        }
    }
}

/// Relative weights of generated log levels. The realized distribution is
/// approximate by design; tests only assert a loose tolerance band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelWeights {
    pub trace: f64,
    pub debug: f64,
    pub info: f64,
    pub warn: f64,
    pub error: f64,
    pub fatal: f64,
}

impl Default for LevelWeights {
    fn default() -> Self {
        Self {
            trace: 0.0,
            debug: 30.0,
            info: 50.0,
            warn: 15.0,
            error: 4.0,
            fatal: 1.0,
        }
    }
}

impl LevelWeights {
    /// Weights aligned with [`LogLevel::all`] order.
    pub fn as_slice(&self) -> [f64; 6] {
        [
            self.trace, self.debug, self.info, self.warn, self.error, self.fatal,
        ]
    }

    pub fn weight_of(&self, level: LogLevel) -> f64 {
        match level {
            LogLevel::Trace => self.trace,
            LogLevel::Debug => self.debug,
            LogLevel::Info => self.info,
            LogLevel::Warn => self.warn,
            LogLevel::Error => self.error,
            LogLevel::Fatal => self.fatal,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogsConfig {
    /// Mean of the Poisson arrival process per 1-minute bucket
    pub average_logs_per_minute: f64,
    /// Volume multiplier applied during peak hours (09:00-18:00 UTC)
    pub peak_hour_multiplier: f64,
    pub level_weights: LevelWeights,
    /// Probability that a WARN/ERROR/FATAL entry carries trace context
    pub trace_correlation_probability: f64,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            average_logs_per_minute: 60.0,
            peak_hour_multiplier: 1.5,
            level_weights: LevelWeights::default(),
            trace_correlation_probability: 0.6,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Expected events per day per rule
    pub event_density_per_day: f64,
    pub avg_duration_minutes: f64,
    /// Probability that an event is still active (unresolved)
    pub unresolved_probability: f64,
    pub acknowledge_probability: f64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            event_density_per_day: 4.0,
            avg_duration_minutes: 30.0,
            unresolved_probability: 0.15,
            acknowledge_probability: 0.5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live of a cached snapshot before regeneration
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Width of the default generation window
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            window: Duration::from_secs(24 * 3600),
        }
    }
}

impl Configuration {
    /// Load configuration from `mirage.toml` (if present) and environment.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file("mirage.toml"))
            .merge(Env::prefixed("MIRAGE__").split("__"))
            .extract()
    }

    /// Load configuration from an explicit file path, still honoring
    /// environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MIRAGE__").split("__"))
            .extract()
    }

    /// Fail-fast validation of parameter ranges. Generators re-validate the
    /// configs derived from these values.
    pub fn validate(&self) -> Result<(), String> {
        if self.services.names.is_empty() {
            return Err("services.names cannot be empty".to_string());
        }
        if self.metrics.step.is_zero() {
            return Err("metrics.step must be positive".to_string());
        }
        if self.traces.min_depth > self.traces.max_depth {
            return Err(format!(
                "traces.min_depth ({}) exceeds traces.max_depth ({})",
                self.traces.min_depth, self.traces.max_depth
            ));
        }
        if self.traces.duration_min_ms > self.traces.duration_max_ms {
            return Err(format!(
                "traces.duration_min_ms ({}) exceeds traces.duration_max_ms ({})",
                self.traces.duration_min_ms, self.traces.duration_max_ms
            ));
        }
        if !(0.0..=1.0).contains(&self.traces.error_rate) {
            return Err("traces.error_rate must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.logs.trace_correlation_probability) {
            return Err("logs.trace_correlation_probability must be within [0, 1]".to_string());
        }
        if self.cache.ttl.is_zero() {
            return Err("cache.ttl must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Configuration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.services.names.len(), 6);
        assert_eq!(config.logs.level_weights.info, 50.0);
    }

    #[test]
    fn test_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MIRAGE__CACHE__TTL", "1m");
            jail.set_env("MIRAGE__TRACES__COUNT", "50");
            let config = Configuration::load().expect("config should load");
            assert_eq!(config.cache.ttl, Duration::from_secs(60));
            assert_eq!(config.traces.count, 50);
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "mirage.toml",
                r#"
                seed = 42

                [logs]
                average_logs_per_minute = 120.0
                peak_hour_multiplier = 2.0

                [logs.level_weights]
                trace = 0.0
                debug = 10.0
                info = 70.0
                warn = 15.0
                error = 4.0
                fatal = 1.0
                "#,
            )?;
            let config = Configuration::load().expect("config should load");
            assert_eq!(config.seed, Some(42));
            assert_eq!(config.logs.average_logs_per_minute, 120.0);
            assert_eq!(config.logs.level_weights.info, 70.0);
            // untouched sections keep their defaults
            assert_eq!(config.traces.count, 200);
            Ok(())
        });
    }

    #[test]
    fn test_validate_rejects_inverted_depths() {
        let mut config = Configuration::default();
        config.traces.min_depth = 9;
        config.traces.max_depth = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_level_weights_order_matches_levels() {
        let weights = LevelWeights::default();
        let slice = weights.as_slice();
        for (i, level) in LogLevel::all().iter().enumerate() {
            assert_eq!(slice[i], weights.weight_of(*level));
        }
    }
}
