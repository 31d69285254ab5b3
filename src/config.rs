//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Default location of the offline year → make → models document.
pub const DEFAULT_CATALOG_PATH: &str = "public/data/models_by_year_nested.json";

/// Default base URL of the vehicle decode / models service.
pub const DEFAULT_VPIC_BASE_URL: &str = "https://vpic.nhtsa.dot.gov/api/vehicles";

/// Status lines shown while the quote is "being prepared".
pub const DEFAULT_STATUS_MESSAGES: &[&str] = &[
    "Gathering data",
    "Reviewing drivers",
    "Reviewing vehicles",
    "Finding best rates",
    "Finalizing quote...",
];

/// Intake service configuration.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Port the HTTP/WebSocket server binds to.
    pub port: u16,
    /// Where the offline vehicle catalog is read from. A value starting with
    /// `http://` or `https://` is fetched, anything else is a file path.
    pub catalog_source: String,
    /// Base URL of the vehicle decode / models service.
    pub vpic_base_url: String,
    /// Where the flattened answers are posted on completion.
    pub submission_url: String,
    /// Simulation settings for the "preparing your quote" wait.
    pub simulation: SimulationConfig,
    /// Session eviction settings.
    pub sessions: SessionConfig,
}

/// Time-based progress simulation settings.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Total simulated wait.
    pub duration: Duration,
    /// Tick period.
    pub tick: Duration,
    /// Status messages; the duration is split evenly across them.
    pub messages: Vec<String>,
}

/// When in-memory sessions are dropped.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// A session nobody has acted on for this long is dropped. Sessions
    /// still running their simulated wait are kept regardless.
    pub idle_ttl: Duration,
    /// How often the registry is swept.
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(20 * 60), // 20 minutes
            tick: Duration::from_secs(1),
            messages: DEFAULT_STATUS_MESSAGES
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            catalog_source: DEFAULT_CATALOG_PATH.to_string(),
            vpic_base_url: DEFAULT_VPIC_BASE_URL.to_string(),
            submission_url: "http://127.0.0.1:8080/submissions".to_string(),
            simulation: SimulationConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

impl IntakeConfig {
    /// Build a config from `QUOTE_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = parse_env("QUOTE_PORT")?.unwrap_or(defaults.port);

        let catalog_source =
            std::env::var("QUOTE_CATALOG_SOURCE").unwrap_or(defaults.catalog_source);

        let vpic_base_url = std::env::var("QUOTE_VPIC_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.vpic_base_url);

        let submission_url =
            std::env::var("QUOTE_SUBMISSION_URL").unwrap_or(defaults.submission_url);

        let duration = parse_env::<u64>("QUOTE_SIMULATION_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.simulation.duration);

        let tick = parse_env::<u64>("QUOTE_SIMULATION_TICK_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.simulation.tick);
        if tick.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "QUOTE_SIMULATION_TICK_MS".into(),
                message: "tick must be greater than zero".into(),
            });
        }

        let idle_ttl = parse_env::<u64>("QUOTE_SESSION_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.sessions.idle_ttl);

        let sweep_interval = parse_env::<u64>("QUOTE_SESSION_SWEEP_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.sessions.sweep_interval);
        if sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "QUOTE_SESSION_SWEEP_SECS".into(),
                message: "sweep interval must be greater than zero".into(),
            });
        }

        let messages: Vec<String> = std::env::var("QUOTE_STATUS_MESSAGES")
            .unwrap_or_default()
            .split('|')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let messages = if messages.is_empty() {
            defaults.simulation.messages
        } else {
            messages
        };

        Ok(Self {
            port,
            catalog_source,
            vpic_base_url,
            submission_url,
            simulation: SimulationConfig {
                duration,
                tick,
                messages,
            },
            sessions: SessionConfig {
                idle_ttl,
                sweep_interval,
            },
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_simulation_matches_quote_wait() {
        let sim = SimulationConfig::default();
        assert_eq!(sim.duration, Duration::from_secs(1200));
        assert_eq!(sim.tick, Duration::from_secs(1));
        assert_eq!(sim.messages.len(), 5);
        assert_eq!(sim.messages[0], "Gathering data");
        assert_eq!(sim.messages[4], "Finalizing quote...");
    }

    #[test]
    fn default_config_points_at_vpic() {
        let config = IntakeConfig::default();
        assert_eq!(config.vpic_base_url, DEFAULT_VPIC_BASE_URL);
        assert_eq!(config.catalog_source, DEFAULT_CATALOG_PATH);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn default_sessions_outlive_the_simulated_wait() {
        let config = IntakeConfig::default();
        assert_eq!(config.sessions.idle_ttl, Duration::from_secs(1800));
        assert_eq!(config.sessions.sweep_interval, Duration::from_secs(60));
        assert!(config.sessions.idle_ttl > config.simulation.duration);
    }

    #[test]
    fn parse_env_reports_bad_values() {
        // Unique key so parallel tests don't collide.
        let key = "QUOTE_TEST_PARSE_ENV_BAD";
        unsafe { std::env::set_var(key, "not-a-number") };
        let err = parse_env::<u16>(key).unwrap_err();
        assert!(err.to_string().contains(key));
        unsafe { std::env::remove_var(key) };
        assert!(parse_env::<u16>(key).unwrap().is_none());
    }
}
