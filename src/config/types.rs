use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Roster-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Name of the registry driver to run (e.g. "oregon")
    pub site: String,

    /// Overrides the registry host of the selected site (mirrors, testing)
    #[serde(rename = "base-url", default)]
    pub base_url: Option<String>,

    pub crawler: CrawlerConfig,

    pub retry: RetryConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    pub cache: CacheConfig,

    pub output: OutputConfig,

    #[serde(default)]
    pub shards: ShardConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Size of the listing and detail worker pools
    #[serde(default)]
    pub concurrency: Concurrency,

    /// Maximum number of characters appended to a shard key while subdividing
    #[serde(rename = "max-subdivision-depth", default = "default_max_subdivision_depth")]
    pub max_subdivision_depth: u32,

    /// Probability of an extra pause after a subdivision fetch
    #[serde(rename = "jitter-probability", default = "default_jitter_probability")]
    pub jitter_probability: f64,

    /// Length of the extra pause (milliseconds)
    #[serde(rename = "jitter-ms", default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

/// Retry behavior for every network fetch
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Fixed delay between attempts (milliseconds)
    #[serde(rename = "delay-ms", default = "default_retry_delay_ms")]
    pub delay_ms: u64,

    /// Attempt bound; there is no default, the operator has to choose
    #[serde(rename = "max-attempts")]
    pub max_attempts: MaxAttempts,

    /// Optional wall-clock budget for a single unit of work (seconds)
    #[serde(rename = "budget-secs", default)]
    pub budget_secs: Option<u64>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Cache location
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Root directory; each site gets its own subdirectory below it
    pub root: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the delimited table written at the end of a run
    pub path: String,

    /// Field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

/// Shard partition of the listing space
#[derive(Debug, Clone, Deserialize)]
pub struct ShardConfig {
    /// Initial shard keys, processed one worker each
    #[serde(default = "default_alphabet_keys")]
    pub keys: Vec<String>,

    /// Characters appended to a term when the listing signals overflow
    #[serde(rename = "extension-alphabet", default = "default_alphabet")]
    pub extension_alphabet: String,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            keys: default_alphabet_keys(),
            extension_alphabet: default_alphabet(),
        }
    }
}

/// Worker pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawSetting")]
pub enum Concurrency {
    /// One unit of work at a time
    Sequential,

    /// One worker per available processing unit
    #[default]
    Auto,

    /// Exactly this many workers
    Fixed(usize),
}

impl Concurrency {
    /// Resolves the setting into a worker count (always at least 1)
    pub fn workers(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Self::Fixed(n) => (*n).max(1),
        }
    }
}

impl TryFrom<RawSetting> for Concurrency {
    type Error = String;

    fn try_from(raw: RawSetting) -> Result<Self, Self::Error> {
        match raw {
            RawSetting::Name(name) => match name.as_str() {
                "sequential" | "none" => Ok(Self::Sequential),
                "auto" => Ok(Self::Auto),
                other => Err(format!(
                    "concurrency must be \"sequential\", \"auto\" or a positive integer, got \"{}\"",
                    other
                )),
            },
            RawSetting::Count(n) if n >= 0 => Ok(Self::Fixed(n as usize)),
            RawSetting::Count(n) => Err(format!("concurrency cannot be negative, got {}", n)),
        }
    }
}

/// Upper bound on fetch attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSetting")]
pub enum MaxAttempts {
    Unbounded,
    Limit(u32),
}

impl MaxAttempts {
    pub fn as_option(&self) -> Option<u32> {
        match self {
            Self::Unbounded => None,
            Self::Limit(n) => Some(*n),
        }
    }
}

impl TryFrom<RawSetting> for MaxAttempts {
    type Error = String;

    fn try_from(raw: RawSetting) -> Result<Self, Self::Error> {
        match raw {
            RawSetting::Name(name) if name == "unbounded" => Ok(Self::Unbounded),
            RawSetting::Name(other) => Err(format!(
                "max-attempts must be \"unbounded\" or a positive integer, got \"{}\"",
                other
            )),
            RawSetting::Count(n) if (0..=u32::MAX as i64).contains(&n) => Ok(Self::Limit(n as u32)),
            RawSetting::Count(n) => Err(format!("max-attempts out of range: {}", n)),
        }
    }
}

/// A setting written either as a keyword or as a number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSetting {
    Name(String),
    Count(i64),
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget_secs.map(Duration::from_secs)
    }
}

fn default_max_subdivision_depth() -> u32 {
    4
}

fn default_jitter_probability() -> f64 {
    0.1
}

fn default_jitter_ms() -> u64 {
    1000
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_alphabet() -> String {
    ('a'..='z').collect()
}

fn default_alphabet_keys() -> Vec<String> {
    ('a'..='z').map(|c| c.to_string()).collect()
}
