//! Command line of the supervised proxy.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::LaunchParameters;

/// Default proxy binary.
pub const DEFAULT_PROXY_BIN: &str = "/usr/local/bin/envoy";

/// Default proxy log level passed with `-l`.
pub const DEFAULT_PROXY_LOG_LEVEL: &str = "debug";

/// How to invoke the proxy binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCommand {
    /// Proxy binary.
    pub program: PathBuf,
    /// Proxy configuration file (`-c`).
    pub config_path: PathBuf,
    /// Proxy log level (`-l`).
    pub log_level: String,
    /// Node identity (`--service-node`).
    pub node_id: String,
    /// Cluster identity (`--service-cluster`).
    pub cluster_name: String,
}

impl ProxyCommand {
    /// Build the proxy command for resolved launch parameters.
    pub fn new(program: impl Into<PathBuf>, params: &LaunchParameters) -> Self {
        Self {
            program: program.into(),
            config_path: params.config_path.clone(),
            log_level: DEFAULT_PROXY_LOG_LEVEL.to_string(),
            node_id: params.node_id.clone(),
            cluster_name: params.cluster_name.clone(),
        }
    }

    /// Override the proxy log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Arguments after the program name.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "-c".into(),
            self.config_path.clone().into_os_string(),
            "-l".into(),
            self.log_level.clone().into(),
            "--service-node".into(),
            self.node_id.clone().into(),
            "--service-cluster".into(),
            self.cluster_name.clone().into(),
        ]
    }

    /// Full command line as a list, for the launch notice.
    pub fn to_command_line(&self) -> String {
        let parts: Vec<String> = std::iter::once(self.program.clone().into_os_string())
            .chain(self.args())
            .map(|s| format!("'{}'", s.to_string_lossy()))
            .collect();
        format!("[{}]", parts.join(", "))
    }
}
