//! The `ServerContext` holds the common state across the server

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use derive_more::{Display, Error, From};
use serde::Deserialize;

use crate::dns::authority::RecordStore;
use crate::dns::name::DomainName;
use crate::dns::zone_parser::{ParseError, ZoneParser};

#[derive(Debug, Display, From, Error)]
pub enum ContextError {
    Parse(ParseError),
    Config(toml::de::Error),
    Io(std::io::Error),
    #[from(ignore)]
    #[display(fmt = "invalid configuration: {}", message)]
    Invalid { message: String },
}

type Result<T> = std::result::Result<T, ContextError>;

/// `[server]` table of the configuration file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListenConfig {
    pub address: String,
    pub port: u16,
    pub threads: usize,
    pub log_level: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            address: "127.0.0.1".to_string(),
            port: 9999,
            threads: 4,
            log_level: "info".to_string(),
        }
    }
}

/// One `[[zone]]` entry: a zone file and the origin its relative names use
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ZoneConfig {
    pub origin: String,
    pub file: PathBuf,
}

/// Configuration file contents
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ListenConfig,
    #[serde(rename = "zone")]
    pub zones: Vec<ZoneConfig>,
}

/// Command-line values that take precedence over the file
#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub threads: Option<usize>,
    pub log_level: Option<String>,
    pub zones: Vec<ZoneConfig>,
}

impl ServerConfig {
    pub fn from_toml(contents: &str) -> Result<ServerConfig> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file(path: &Path) -> Result<ServerConfig> {
        let contents = fs::read_to_string(path)?;
        let config = ServerConfig::from_toml(&contents)?;
        log::info!("Read configuration from {}", path.display());

        Ok(config)
    }

    /// Zones given on the command line replace those of the file
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(address) = overrides.address {
            self.server.address = address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(threads) = overrides.threads {
            self.server.threads = threads;
        }
        if let Some(level) = overrides.log_level {
            self.server.log_level = level;
        }
        if !overrides.zones.is_empty() {
            self.zones = overrides.zones;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.threads == 0 {
            return Err(ContextError::Invalid {
                message: "thread count cannot be 0".to_string(),
            });
        }

        if self.server.address.parse::<std::net::IpAddr>().is_err() {
            return Err(ContextError::Invalid {
                message: format!("{} is not an IP address", self.server.address),
            });
        }

        Ok(())
    }
}

pub struct ServerStatistics {
    pub received_count: AtomicUsize,
    pub answered_count: AtomicUsize,
    pub dropped_count: AtomicUsize,
}

impl ServerStatistics {
    fn new() -> ServerStatistics {
        ServerStatistics {
            received_count: AtomicUsize::new(0),
            answered_count: AtomicUsize::new(0),
            dropped_count: AtomicUsize::new(0),
        }
    }

    pub fn get_received_count(&self) -> usize {
        self.received_count.load(Ordering::Acquire)
    }

    pub fn get_answered_count(&self) -> usize {
        self.answered_count.load(Ordering::Acquire)
    }

    pub fn get_dropped_count(&self) -> usize {
        self.dropped_count.load(Ordering::Acquire)
    }
}

/// Shared state of a running server
///
/// The record store is frozen before the context is created and is only
/// ever read afterwards, so workers share it through the `Arc` directly.
pub struct ServerContext {
    pub store: Arc<RecordStore>,
    pub address: String,
    pub dns_port: u16,
    pub thread_count: usize,
    pub statistics: ServerStatistics,
}

impl Default for ServerContext {
    fn default() -> Self {
        ServerContext::new(builtin_store())
    }
}

impl ServerContext {
    pub fn new(store: RecordStore) -> ServerContext {
        let listen = ListenConfig::default();

        ServerContext {
            store: Arc::new(store),
            address: listen.address,
            dns_port: listen.port,
            thread_count: listen.threads,
            statistics: ServerStatistics::new(),
        }
    }

    /// Validates the configuration and loads its zones
    ///
    /// Without any configured zone the built-in demo records are served.
    pub fn from_config(config: &ServerConfig) -> Result<ServerContext> {
        config.validate()?;

        let store = if config.zones.is_empty() {
            log::info!("No zones configured, serving built-in records");
            builtin_store()
        } else {
            load_zones(&config.zones)?
        };

        Ok(ServerContext {
            store: Arc::new(store),
            address: config.server.address.clone(),
            dns_port: config.server.port,
            thread_count: config.server.threads,
            statistics: ServerStatistics::new(),
        })
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.address, self.dns_port)
    }
}

/// Reads every zone file into one store
pub fn load_zones(zones: &[ZoneConfig]) -> Result<RecordStore> {
    let mut builder = RecordStore::builder();

    for zone in zones {
        ZoneParser::new(&zone.origin).parse_file(&zone.file, &mut builder)?;
    }

    Ok(builder.build())
}

/// Demo data answered when no zone is configured
pub fn builtin_store() -> RecordStore {
    let mut builder = RecordStore::builder();

    let apex = DomainName::from_labels(vec![b"example".to_vec(), b"com".to_vec()])
        .unwrap_or_else(|_| DomainName::root());
    builder
        .add_a(&apex, Ipv4Addr::new(188, 138, 0, 9), 360)
        .add_a(&apex, Ipv4Addr::new(127, 0, 0, 1), 360);

    builder.build()
}
