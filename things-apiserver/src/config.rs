//! Runtime configuration.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime configuration data.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The server's logging config, which uses Rust's `env_logger` directives.
    #[serde(default = "Config::default_rust_log")]
    pub rust_log: String,
    /// The port on which the API is served.
    #[serde(default = "Config::default_http_port")]
    pub http_port: u16,
    /// The port on which Prometheus metrics are served.
    #[serde(default = "Config::default_metrics_port")]
    pub metrics_port: u16,
    /// The name of the pod on which this instance is running.
    #[serde(default = "Config::default_pod_name")]
    pub pod_name: String,
}

impl Config {
    /// Create a new config instance.
    ///
    /// Currently this routine just parses the runtime environment and builds the application
    /// config from that.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Result<Self> {
        envy::from_env().context("error building config from env")
    }

    fn default_rust_log() -> String {
        "info".into()
    }

    fn default_http_port() -> u16 {
        8080
    }

    fn default_metrics_port() -> u16 {
        9090
    }

    fn default_pod_name() -> String {
        "things-apiserver".into()
    }
}
