// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use config::{Config as ConfigFile, File, Environment};

pub use config::ConfigError;

/// Central configuration for the gateway and the app store
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway_addr: String,
    /// Root of the installed applications, one directory per context
    pub app_dir: String,
    /// Root of the home (shell) application bundle
    pub host_dir: String,
    pub app_store_url: String,

    /// Backend routes: context -> host:port
    pub routes: HashMap<String, String>,

    pub auth: AuthConfig,
    pub schedule: ScheduleConfig,
    pub store: StoreConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Empty means generate one per process.
    pub secret: String,
    pub issuer: String,
    pub token_ttl_secs: u64,
    pub cookie_max_age_secs: i64,
    pub seed_users: Vec<SeedUser>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedUser")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub catalog_poll_secs: u64,
    pub route_probe_secs: u64,
    pub probe_timeout_ms: u64,
    /// Applies to every outbound connection: catalog, downloads, proxying
    pub connect_timeout_ms: u64,
    /// Whole catalog request, body included
    pub catalog_timeout_secs: u64,
    /// Whole package download, body included
    pub download_timeout_secs: u64,
    pub command_queue_capacity: usize,
    /// Zero disables the idle cutoff on push sockets
    pub socket_idle_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub addr: String,
    pub source_dir: String,
    pub deploy_dir: String,
    pub rescan_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let mut routes = HashMap::new();
        routes.insert("api".to_string(), "127.0.0.1:10001".to_string());

        Self {
            gateway_addr: "0.0.0.0:8080".to_string(),
            app_dir: "./public".to_string(),
            host_dir: "./client".to_string(),
            app_store_url: "http://localhost:60001".to_string(),
            routes,
            auth: AuthConfig::default(),
            schedule: ScheduleConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "vaclav".to_string(),
            token_ttl_secs: 259_200,
            cookie_max_age_secs: 259_200,
            seed_users: vec![SeedUser {
                email: "test@example.com".to_string(),
                password: "test1234".to_string(),
            }],
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            catalog_poll_secs: 17,
            route_probe_secs: 15,
            probe_timeout_ms: 2000,
            connect_timeout_ms: 5000,
            catalog_timeout_secs: 10,
            download_timeout_secs: 300,
            command_queue_capacity: 64,
            socket_idle_timeout_secs: 0,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:60001".to_string(),
            source_dir: "./source".to_string(),
            deploy_dir: "./deploy".to_string(),
            rescan_secs: 11,
        }
    }
}

impl ScheduleConfig {
    pub fn catalog_poll_interval(&self) -> Duration {
        Duration::from_secs(self.catalog_poll_secs.max(1))
    }

    pub fn route_probe_interval(&self) -> Duration {
        Duration::from_secs(self.route_probe_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs.max(1))
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs.max(1))
    }

    pub fn socket_idle_timeout(&self) -> Option<Duration> {
        match self.socket_idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // e.g. APP__AUTH__SECRET
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Layered load, falling back to plain environment variables over defaults
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");
                Self::from_plain_env()
            }
        }
    }

    fn from_plain_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("GATEWAY_ADDR") {
            config.gateway_addr = v;
        }
        if let Ok(v) = env::var("APP_DIR") {
            config.app_dir = v;
        }
        if let Ok(v) = env::var("HOST_DIR") {
            config.host_dir = v;
        }
        if let Ok(v) = env::var("APP_STORE_URL") {
            config.app_store_url = v;
        }
        if let Ok(v) = env::var("AUTH_SECRET") {
            config.auth.secret = v;
        }
        if let Ok(v) = env::var("STORE_ADDR") {
            config.store.addr = v;
        }
        if let Ok(v) = env::var("STORE_SOURCE_DIR") {
            config.store.source_dir = v;
        }
        if let Ok(v) = env::var("STORE_DEPLOY_DIR") {
            config.store.deploy_dir = v;
        }
        if let Some(secs) = env::var("SOCKET_IDLE_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()) {
            config.schedule.socket_idle_timeout_secs = secs;
        }

        // GATEWAY_ROUTES=api=127.0.0.1:10001,scan=127.0.0.1:10002
        if let Ok(v) = env::var("GATEWAY_ROUTES") {
            config.routes = parse_routes(&v);
        }

        config
    }
}

/// Parse `context=host:port` pairs separated by commas. Malformed pairs are skipped.
pub fn parse_routes(list: &str) -> HashMap<String, String> {
    list.split(',')
        .filter_map(|pair| {
            let (context, addr) = pair.split_once('=')?;
            let context = context.trim().trim_matches('/');
            let addr = addr.trim();
            if context.is_empty() || addr.is_empty() {
                tracing::warn!("Ignoring malformed route entry: {:?}", pair);
                return None;
            }
            Some((context.to_string(), addr.to_string()))
        })
        .collect()
}
