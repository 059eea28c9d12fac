//! Pipeline configuration.
//!
//! Configuration is a YAML file whose text may contain `$VAR` / `${VAR}`
//! placeholders, substituted from the environment before parsing (`$$` is a
//! literal dollar sign). An undefined variable is an error rather than being
//! left in place.
//!
//! # Example
//!
//! ```yaml
//! database:
//!   host: ${PGHOST}
//!   user: ${PGUSER}
//!   password: ${PGPASSWORD}
//!   name: warehouse
//! schemas:
//!   landing: landing
//!   archive: archive
//! tables:
//!   s3: [orders, customers]
//! s3:
//!   bucket_name: public-drops
//!   files:
//!     exports/orders.csv: orders
//!     exports/customers.json: customers
//! ```

use std::env;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defaults;
use crate::logging;
use crate::error::{Error, Result};
use crate::models::{default_synthesized_columns, SynthesizedColumns};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("placeholder pattern is valid")
});

/// Complete pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub schemas: SchemaConfig,
    pub tables: TableConfig,
    #[serde(default)]
    pub s3: Option<S3Config>,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub archive: ArchiveSettings,
}

/// Database connection settings.
///
/// Either `url` or the individual parts may be given; `url` wins.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// How long to wait for a pooled connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// How long an unused pooled connection is kept.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Server-side timeout applied to each archive statement.
    #[serde(default)]
    pub statement_timeout_secs: Option<u64>,
}

fn default_max_connections() -> u32 {
    defaults::DB_MAX_CONNECTIONS
}

fn default_min_connections() -> u32 {
    defaults::DB_MIN_CONNECTIONS
}

fn default_connect_timeout() -> u64 {
    defaults::DB_CONNECT_TIMEOUT_SECS
}

fn default_idle_timeout() -> u64 {
    defaults::DB_IDLE_TIMEOUT_SECS
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: None,
            user: None,
            password: None,
            name: None,
            max_connections: defaults::DB_MAX_CONNECTIONS,
            min_connections: defaults::DB_MIN_CONNECTIONS,
            connect_timeout_secs: defaults::DB_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: defaults::DB_IDLE_TIMEOUT_SECS,
            statement_timeout_secs: None,
        }
    }
}

impl DatabaseConfig {
    /// Build the connection URL from `url` or from the individual parts.
    pub fn connection_url(&self) -> Result<String> {
        if let Some(ref url) = self.url {
            return Ok(url.clone());
        }

        let host = self
            .host
            .as_deref()
            .ok_or_else(|| Error::Config("database.host is required without database.url".into()))?;
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| Error::Config("database.name is required without database.url".into()))?;

        let mut url = reqwest::Url::parse("postgres://localhost")
            .map_err(|e| Error::Internal(e.to_string()))?;
        url.set_host(Some(host))
            .map_err(|e| Error::Config(format!("invalid database.host '{}': {}", host, e)))?;
        url.set_port(Some(self.port.unwrap_or(defaults::DB_PORT)))
            .map_err(|_| Error::Config("database.port cannot be applied to the URL".into()))?;
        if let Some(ref user) = self.user {
            url.set_username(user)
                .map_err(|_| Error::Config(format!("invalid database.user '{}'", user)))?;
        }
        if let Some(ref password) = self.password {
            url.set_password(Some(password))
                .map_err(|_| Error::Config("invalid database.password".into()))?;
        }
        url.set_path(name);

        Ok(url.to_string())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_secs.map(Duration::from_secs)
    }
}

/// Landing and archive schema names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub landing: String,
    pub archive: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            landing: defaults::LANDING_SCHEMA.to_string(),
            archive: defaults::ARCHIVE_SCHEMA.to_string(),
        }
    }
}

/// Landing tables grouped by the source kind that feeds them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub s3: Vec<String>,
    #[serde(default)]
    pub api: Vec<String>,
    #[serde(default)]
    pub json: Vec<String>,
}

impl TableConfig {
    /// Every configured table: s3, then api, then json, each in file order.
    pub fn all(&self) -> Vec<String> {
        self.s3
            .iter()
            .chain(&self.api)
            .chain(&self.json)
            .cloned()
            .collect()
    }
}

/// Public bucket holding files to ingest.
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Object key → landing table, in file order.
    #[serde(default, deserialize_with = "ordered_pairs")]
    pub files: Vec<(String, String)>,
}

fn default_region() -> String {
    defaults::S3_REGION.to_string()
}

/// Where extracted payloads come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// Built-in fixture payloads; no network access.
    #[default]
    Simulated,
    /// Real HTTP fetches from the public bucket.
    Live,
}

impl fmt::Display for ExtractMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simulated => write!(f, "simulated"),
            Self::Live => write!(f, "live"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    #[serde(default)]
    pub mode: ExtractMode,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

fn default_fetch_timeout() -> u64 {
    defaults::FETCH_TIMEOUT_SECS
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            mode: ExtractMode::default(),
            timeout_secs: defaults::FETCH_TIMEOUT_SECS,
        }
    }
}

/// Orchestrator policy knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_true")]
    pub continue_on_failure: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Destination column → time literal, in file order.
    #[serde(
        default = "default_synthesized_columns",
        deserialize_with = "ordered_pairs"
    )]
    pub synthesized_columns: SynthesizedColumns,
}

fn default_max_attempts() -> u32 {
    defaults::ARCHIVE_MAX_ATTEMPTS
}

fn default_retry_backoff_ms() -> u64 {
    defaults::ARCHIVE_RETRY_BACKOFF_MS
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    defaults::ARCHIVE_CONCURRENCY
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            max_attempts: defaults::ARCHIVE_MAX_ATTEMPTS,
            retry_backoff_ms: defaults::ARCHIVE_RETRY_BACKOFF_MS,
            continue_on_failure: true,
            concurrency: defaults::ARCHIVE_CONCURRENCY,
            synthesized_columns: default_synthesized_columns(),
        }
    }
}

impl PipelineConfig {
    /// Read, substitute, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        debug!(
            subsystem = logging::SUBSYSTEM_CONFIG,
            path = %path.display(),
            bytes = raw.len(),
            "Loaded config file"
        );
        Self::from_yaml(&substitute_env_vars(&raw)?)
    }

    /// Parse and validate already-substituted YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schemas.landing.trim().is_empty() {
            return Err(Error::Config("schemas.landing cannot be empty".into()));
        }
        if self.schemas.archive.trim().is_empty() {
            return Err(Error::Config("schemas.archive cannot be empty".into()));
        }
        if self.archive.max_attempts == 0 {
            return Err(Error::Config("archive.max_attempts must be at least 1".into()));
        }
        if self.archive.concurrency == 0 {
            return Err(Error::Config("archive.concurrency must be at least 1".into()));
        }
        if let Some(ref s3) = self.s3 {
            if s3.bucket_name.trim().is_empty() {
                return Err(Error::Config("s3.bucket_name cannot be empty".into()));
            }
        }
        Ok(())
    }
}

/// Substitute `$VAR`, `${VAR}` and `$$` from the process environment.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    substitute_with(content, |name| env::var(name).ok())
}

/// Substitute placeholders using `lookup`. Every undefined name is reported.
pub fn substitute_with<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing: Vec<String> = Vec::new();
    let replaced = PLACEHOLDER.replace_all(content, |caps: &Captures| {
        if caps.get(1).is_some() {
            return "$".to_string();
        }
        let name = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match lookup(name) {
            Some(value) => value,
            None => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(Error::Config(format!(
            "undefined environment variables: {}",
            missing.join(", ")
        )));
    }
    Ok(replaced.into_owned())
}

/// Deserialize a YAML mapping into `(key, value)` pairs, keeping file order.
fn ordered_pairs<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct PairsVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairsVisitor(PhantomData))
}
