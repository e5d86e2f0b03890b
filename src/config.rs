use crate::constants::{DEFAULT_BASE_URL, DEFAULT_TIMEZONE, ENV_PASSWORD, ENV_USERNAME};
use crate::error::{Result, ScraperError};
use crate::types::GeoPoint;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub crawl: CrawlConfig,
    pub storage: StorageConfig,
    pub housekeeping: HousekeepingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    /// IANA name of the timezone the portal's grid times are written in.
    pub timezone: String,
    pub session_ttl_secs: i64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Upcoming calendar days to crawl, starting tomorrow.
    pub days: u32,
    /// Cap on clubs taken from the club chooser during discovery.
    pub max_clubs: usize,
    pub club_delay_ms: u64,
    pub concurrency: usize,
    pub price_ceiling_minor: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub sqlite_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    pub max_distance_km: f64,
    /// Club coordinates by portal club id, written before the distance check.
    pub locations: BTreeMap<String, GeoPoint>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            session_ttl_secs: 600,
            request_timeout_secs: 30,
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            days: 6,
            max_clubs: 20,
            club_delay_ms: 1000,
            concurrency: 1,
            price_ceiling_minor: 1_000_000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/tee_times.db"),
        }
    }
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        // Oslo
        Self {
            origin_latitude: 59.9220295,
            origin_longitude: 10.6053933,
            max_distance_km: 100.0,
            locations: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.portal.tz()?;
        if self.portal.session_ttl_secs <= 0 {
            return Err(ScraperError::Config("portal.session_ttl_secs must be positive".into()));
        }
        if self.crawl.concurrency == 0 {
            return Err(ScraperError::Config("crawl.concurrency must be at least 1".into()));
        }
        if self.crawl.price_ceiling_minor < 0 {
            return Err(ScraperError::Config("crawl.price_ceiling_minor must not be negative".into()));
        }
        Ok(())
    }
}

impl PortalConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ScraperError::Config(format!("Unknown timezone '{}': {}", self.timezone, e)))
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CrawlConfig {
    pub fn club_delay(&self) -> Duration {
        Duration::from_millis(self.club_delay_ms)
    }
}

/// Portal login. Kept out of the config file and out of logs.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let read = |key: &str| {
            std::env::var(key)
                .map_err(|e| ScraperError::Config(format!("{} is not set: {}", key, e)))
        };
        Ok(Self::new(read(ENV_USERNAME)?, read(ENV_PASSWORD)?))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
