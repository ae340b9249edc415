use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Alerts, Analytics, Backtest, Bars, Config, Database, RollingWindows};

/// Loads and validates the application configuration from a TOML file.
///
/// This function is the primary entry point for this crate. Any validation
/// failure is fatal: the engine must not start with malformed windows or
/// pair definitions (no partial operation).
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

impl Config {
    /// Checks the invariants the rest of the system relies on. Timeframe
    /// labels are already validated during deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.pairs.is_empty() {
            return invalid("at least one symbol pair is required".to_string());
        }
        for pair in &self.pairs {
            if pair.y.is_empty() || pair.x.is_empty() {
                return invalid(format!("pair '{}' has an empty symbol", pair));
            }
            if pair.y == pair.x {
                return invalid(format!("pair '{}' regresses a symbol on itself", pair));
            }
        }
        if self.analytics.timeframes.is_empty() {
            return invalid("at least one timeframe is required".to_string());
        }

        let w = &self.analytics.rolling_windows;
        for (name, size) in [
            ("hedge", w.hedge),
            ("zscore", w.zscore),
            ("correlation", w.correlation),
            ("volatility", w.volatility),
        ] {
            if size < 2 {
                return invalid(format!("rolling window '{}' must be at least 2, got {}", name, size));
            }
        }

        if self.analytics.update_interval_secs == 0 {
            return invalid("update_interval_secs must be positive".to_string());
        }
        if self.analytics.lookback_minutes == 0 {
            return invalid("lookback_minutes must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::SymbolPair;

    fn valid_config() -> Config {
        Config {
            database: Database {
                url: "sqlite::memory:".to_string(),
            },
            pairs: vec![SymbolPair {
                y: "BTCUSDT".to_string(),
                x: "ETHUSDT".to_string(),
            }],
            analytics: Analytics {
                timeframes: vec!["1m".parse().unwrap()],
                rolling_windows: RollingWindows {
                    hedge: 60,
                    zscore: 30,
                    correlation: 60,
                    volatility: 20,
                },
                lookback_minutes: 120,
                update_interval_secs: 10,
            },
            bars: Bars::default(),
            alerts: Alerts::default(),
            backtest: Backtest::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn window_below_two_is_rejected() {
        let mut config = valid_config();
        config.analytics.rolling_windows.zscore = 1;
        assert!(config.validate().is_err());

        config = valid_config();
        config.analytics.rolling_windows.hedge = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn self_pair_is_rejected() {
        let mut config = valid_config();
        config.pairs[0].x = config.pairs[0].y.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_pairs_and_timeframes_are_rejected() {
        let mut config = valid_config();
        config.pairs.clear();
        assert!(config.validate().is_err());

        config = valid_config();
        config.analytics.timeframes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_cadence_is_rejected() {
        let mut config = valid_config();
        config.analytics.update_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = valid_config();
        assert_eq!(config.alerts.default_zscore_threshold, 2.0);
        assert_eq!(config.backtest.exit_threshold, 0.5);
        assert!(!config.backtest.close_at_end);
    }
}
