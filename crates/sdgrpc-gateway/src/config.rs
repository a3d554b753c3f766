//! Configuration file parsing for the gateway.
//!
//! Loads settings from TOML files: the engines document location, listen
//! interface, ports for both transports, the native worker ceiling, the
//! request message ceiling and the local identity.

use sdgrpc_domain::LocalIdentity;
use sdgrpc_grpc::registry::DEFAULT_MAX_MESSAGE_BYTES;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Gateway configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        /// Path that was tried
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Field holds a value the gateway cannot run with
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Gateway configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    /// Path of the engines document
    pub engine_config: PathBuf,

    /// Bind all interfaces instead of loopback only
    pub listen_to_all: bool,

    /// Port of the native gRPC transport
    pub native_port: u16,

    /// Port of the gRPC-Web transport
    pub web_port: u16,

    /// Native calls dispatched concurrently
    pub worker_count: usize,

    /// Largest request message accepted on either transport
    pub max_message_bytes: usize,

    /// Identity reported by the dashboard service
    pub identity: IdentityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            engine_config: PathBuf::from("./engines.yaml"),
            listen_to_all: false,
            native_port: 50051,
            web_port: 5000,
            worker_count: 4,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            identity: IdentityConfig::default(),
        }
    }
}

/// `[identity]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// User identifier
    pub user_id: String,
    /// Contact address
    pub email: String,
    /// Organization identifier
    pub organization_id: String,
    /// Organization display name
    pub organization_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        let identity = LocalIdentity::default();
        Self {
            user_id: identity.user_id,
            email: identity.email,
            organization_id: identity.organization_id,
            organization_name: identity.organization_name,
        }
    }
}

impl From<&IdentityConfig> for LocalIdentity {
    fn from(config: &IdentityConfig) -> Self {
        LocalIdentity {
            user_id: config.user_id.clone(),
            email: config.email.clone(),
            organization_id: config.organization_id.clone(),
            organization_name: config.organization_name.clone(),
            ..LocalIdentity::default()
        }
    }
}

impl GatewayConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the gateway cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid {
                field: "worker_count",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_message_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_message_bytes",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.engine_config.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "engine_config",
                reason: "path is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Interface both listeners bind
    pub fn bind_host(&self) -> IpAddr {
        if self.listen_to_all {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }

    /// Address of the native listener
    pub fn native_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host(), self.native_port)
    }

    /// Address of the gRPC-Web listener
    pub fn web_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host(), self.web_port)
    }

    /// Identity reported by the dashboard service
    pub fn local_identity(&self) -> LocalIdentity {
        LocalIdentity::from(&self.identity)
    }
}
