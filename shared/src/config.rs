use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Which backend holds blobs and index entries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Sled,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sled" => Ok(StorageBackend::Sled),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Knobs of the reclamation engine and its scheduler
#[derive(Clone, Debug)]
pub struct ReclamationSettings {
    /// Idle time after which an object expires; <= 0 disables expiration
    pub max_idle_ms: i64,
    /// Occupancy budget; <= 0 disables size eviction
    pub max_size_bytes: i64,
    pub sweep_interval: Duration,
    /// None means cycles run without a deadline
    pub sweep_timeout: Option<Duration>,
    pub delete_concurrency: usize,
}

pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub data_dir: String,
    pub storage: StorageBackend,
    pub list_page_size: usize,
    /// Largest accepted PUT body
    pub max_body_bytes: usize,
    pub admin_username: String,
    pub admin_password: String,
    pub credential_cache_ttl: Duration,
    pub reclamation: ReclamationSettings,
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 8080;
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_ADMIN_USERNAME: &str = "admin";
    const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
    const DEFAULT_LIST_PAGE_SIZE: usize = 1000;
    const DEFAULT_MAX_BODY_BYTES: usize = 100 * 1024 * 1024;
    const DEFAULT_MAX_IDLE_MS: i64 = 7 * 24 * 60 * 60 * 1000;
    const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
    const DEFAULT_SWEEP_TIMEOUT_SECS: u64 = 300;
    const DEFAULT_DELETE_CONCURRENCY: usize = 8;
    const DEFAULT_CREDENTIAL_CACHE_TTL_SECS: u64 = 60;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let sweep_timeout_secs: u64 = parse_or(
            &lookup,
            "KEEPER_SWEEP_TIMEOUT_SECS",
            Self::DEFAULT_SWEEP_TIMEOUT_SECS,
        );

        Self {
            host: lookup("KEEPER_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            http_port: parse_or(&lookup, "KEEPER_HTTP_PORT", Self::DEFAULT_HTTP_PORT),
            data_dir: lookup("KEEPER_DATA_DIR")
                .unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string()),
            storage: parse_or(&lookup, "KEEPER_STORAGE", StorageBackend::Sled),
            list_page_size: parse_or(
                &lookup,
                "KEEPER_LIST_PAGE_SIZE",
                Self::DEFAULT_LIST_PAGE_SIZE,
            )
            .max(1),
            max_body_bytes: parse_or(
                &lookup,
                "KEEPER_MAX_BODY_BYTES",
                Self::DEFAULT_MAX_BODY_BYTES,
            ),
            admin_username: lookup("KEEPER_ADMIN_USERNAME")
                .unwrap_or_else(|| Self::DEFAULT_ADMIN_USERNAME.to_string()),
            admin_password: lookup("KEEPER_ADMIN_PASSWORD").unwrap_or_else(|| {
                warn!("KEEPER_ADMIN_PASSWORD not set, using default password 'admin123'");
                warn!("Please change the default admin password immediately!");
                Self::DEFAULT_ADMIN_PASSWORD.to_string()
            }),
            credential_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "KEEPER_CREDENTIAL_CACHE_TTL_SECS",
                Self::DEFAULT_CREDENTIAL_CACHE_TTL_SECS,
            )),
            reclamation: ReclamationSettings {
                max_idle_ms: parse_or(&lookup, "KEEPER_MAX_IDLE_MS", Self::DEFAULT_MAX_IDLE_MS),
                max_size_bytes: parse_or(&lookup, "KEEPER_MAX_SIZE_BYTES", 0),
                sweep_interval: Duration::from_secs(
                    parse_or(
                        &lookup,
                        "KEEPER_SWEEP_INTERVAL_SECS",
                        Self::DEFAULT_SWEEP_INTERVAL_SECS,
                    )
                    .max(1),
                ),
                sweep_timeout: (sweep_timeout_secs > 0)
                    .then(|| Duration::from_secs(sweep_timeout_secs)),
                delete_concurrency: parse_or(
                    &lookup,
                    "KEEPER_DELETE_CONCURRENCY",
                    Self::DEFAULT_DELETE_CONCURRENCY,
                )
                .max(1),
            },
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring invalid {}='{}': {}", name, raw, e);
                default
            }
        },
        None => default,
    }
}
