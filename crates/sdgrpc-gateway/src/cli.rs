//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

use crate::config::{ConfigError, GatewayConfig};

/// sdgrpc gateway - serve image generation over gRPC and gRPC-Web.
#[derive(Debug, Parser)]
#[command(name = "sdgrpc-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Gateway configuration file (TOML)
    #[arg(short, long, env = "SDGRPC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Engines document (YAML)
    #[arg(short = 'E', long = "enginecfg", env = "SD_ENGINECFG")]
    pub engine_config: Option<PathBuf>,

    /// Listen on all interfaces instead of loopback only
    #[arg(short = 'L', long)]
    pub listen_to_all: bool,

    /// Native calls dispatched concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Native gRPC port
    #[arg(long)]
    pub native_port: Option<u16>,

    /// gRPC-Web port
    #[arg(long)]
    pub web_port: Option<u16>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective configuration: file (or defaults), then flags
    pub fn load_config(&self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::from_file(path)?,
            None => GatewayConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Override configuration values given on the command line
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(path) = &self.engine_config {
            config.engine_config = path.clone();
        }
        if self.listen_to_all {
            config.listen_to_all = true;
        }
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(port) = self.native_port {
            config.native_port = port;
        }
        if let Some(port) = self.web_port {
            config.web_port = port;
        }
    }
}
