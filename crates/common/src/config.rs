use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    /// Full connection string; takes precedence over the individual parts
    pub url: Option<String>,
}

impl DatabaseConfig {
    /// Build database URL from configuration
    pub fn url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.username, self.password, self.host, self.port, self.database
            ),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            database: "orders".to_string(),
            max_connections: 10,
            url: None,
        }
    }
}

/// Kafka consumer configuration
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated broker list
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
    /// `auto.offset.reset` for a group without committed offsets
    pub offset_reset: String,
    /// Pause before a failed message is redelivered
    pub retry_backoff: Duration,
    /// Buffered messages per partition worker
    pub partition_buffer: usize,
}

impl KafkaConfig {
    /// The consumer only runs when brokers, topic and group are all set
    pub fn is_enabled(&self) -> bool {
        !self.brokers.trim().is_empty()
            && !self.topic.trim().is_empty()
            && !self.group_id.trim().is_empty()
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "orders".to_string(),
            group_id: "order-service".to_string(),
            offset_reset: "latest".to_string(),
            retry_backoff: Duration::from_secs(2),
            partition_buffer: 64,
        }
    }
}

/// In-memory order cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Zero disables expiry
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub log_level: String,
    pub enable_jaeger: bool,
    pub jaeger_endpoint: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            kafka: KafkaConfig::default(),
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
            log_level: "info".to_string(),
            enable_jaeger: false,
            jaeger_endpoint: None,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// Call `dotenv::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup; unset keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        let db = &mut config.database;
        db.url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        set_string(&lookup, "DB_HOST", &mut db.host);
        set_parsed(&lookup, "DB_PORT", &mut db.port)?;
        set_string(&lookup, "DB_USER", &mut db.username);
        set_string(&lookup, "DB_PASSWORD", &mut db.password);
        set_string(&lookup, "DB_NAME", &mut db.database);
        set_parsed(&lookup, "DB_MAX_CONNECTIONS", &mut db.max_connections)?;

        let kafka = &mut config.kafka;
        // An explicitly empty value disables the consumer, so these keep "".
        if let Some(v) = lookup("KAFKA_BROKERS") {
            kafka.brokers = v;
        }
        if let Some(v) = lookup("KAFKA_TOPIC") {
            kafka.topic = v;
        }
        if let Some(v) = lookup("KAFKA_GROUP_ID") {
            kafka.group_id = v;
        }
        set_string(&lookup, "KAFKA_OFFSET_RESET", &mut kafka.offset_reset);
        if let Some(ms) = parse_opt::<u64, _>(&lookup, "KAFKA_RETRY_BACKOFF_MS")? {
            kafka.retry_backoff = Duration::from_millis(ms);
        }
        set_parsed(&lookup, "KAFKA_PARTITION_BUFFER", &mut kafka.partition_buffer)?;
        if kafka.partition_buffer == 0 {
            return Err(ConfigError::Invalid {
                key: "KAFKA_PARTITION_BUFFER",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if let Some(secs) = parse_opt::<i64, _>(&lookup, "CACHE_TTL_SECONDS")? {
            // Negative TTLs mean "never expire", same as zero.
            config.cache.ttl = Duration::from_secs(secs.max(0) as u64);
        }

        set_parsed(&lookup, "PORT", &mut config.http.port)?;
        if let Some(secs) = parse_opt::<u64, _>(&lookup, "HTTP_TIMEOUT_SECONDS")? {
            config.http.request_timeout = Duration::from_secs(secs);
        }

        set_string(&lookup, "RUST_LOG", &mut config.log_level);
        set_parsed(&lookup, "ENABLE_JAEGER", &mut config.enable_jaeger)?;
        config.jaeger_endpoint = lookup("JAEGER_ENDPOINT").filter(|v| !v.trim().is_empty());

        Ok(config)
    }
}

fn set_string<F>(lookup: &F, key: &'static str, target: &mut String)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(key).filter(|v| !v.trim().is_empty()) {
        *target = v;
    }
}

fn set_parsed<T, F>(lookup: &F, key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parse_opt(lookup, key)? {
        *target = v;
    }
    Ok(())
}

fn parse_opt<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::Invalid {
                    key,
                    value: raw.clone(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(None),
    }
}
