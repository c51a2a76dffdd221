//! Resolution of launch parameters from the command line and environment.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use super::error::ConfigError;
use crate::rules::{
    ENV_INBOUND_PORTS_INCLUDE, ENV_PROXY_MANAGE_PORT, ENV_PROXY_PORT, ENV_PROXY_UID, RuleContext,
};

/// Environment variable holding the proxy's logical cluster name.
pub const ENV_SERVICE_CLUSTER: &str = "SERVICE_CLUSTER";

/// Environment variable holding the proxy's logical node identity.
pub const ENV_NODE_ID: &str = "NODE_ID";

/// Usage string printed when the configuration path is missing.
pub const USAGE: &str = "sidecar-launcher [proxy config path]";

/// Validated parameters for one launch of the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParameters {
    /// Path to the proxy's configuration file.
    pub config_path: PathBuf,
    /// Logical cluster identity of the proxy.
    pub cluster_name: String,
    /// Logical node identity of the proxy.
    pub node_id: String,
}

/// Reads and validates launch inputs.
///
/// All lookups go through a caller-supplied function so tests never touch
/// the real process environment.
pub struct EnvironmentResolver<F> {
    lookup: F,
}

impl EnvironmentResolver<fn(&str) -> Option<String>> {
    /// Create a resolver backed by the process environment.
    pub fn from_process_env() -> Self {
        Self {
            lookup: |key| std::env::var(key).ok(),
        }
    }
}

impl<F> EnvironmentResolver<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Create a resolver backed by an arbitrary lookup.
    pub fn with_lookup(lookup: F) -> Self {
        Self { lookup }
    }

    /// Resolve the launch parameters.
    ///
    /// The configuration path is checked first, then `SERVICE_CLUSTER`,
    /// then `NODE_ID`.
    pub fn resolve(&self, config_path: Option<PathBuf>) -> Result<LaunchParameters, ConfigError> {
        let config_path = config_path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| ConfigError::Usage {
                usage: USAGE.to_string(),
            })?;

        let cluster_name = self.required(ENV_SERVICE_CLUSTER)?;
        let node_id = self.required(ENV_NODE_ID)?;

        debug!(
            "Resolved launch parameters: config={:?}, cluster={}, node={}",
            config_path, cluster_name, node_id
        );

        Ok(LaunchParameters {
            config_path,
            cluster_name,
            node_id,
        })
    }

    /// Resolve the traffic rule context, applying any environment overrides
    /// on top of the fixed defaults.
    pub fn rule_context(&self) -> Result<RuleContext, ConfigError> {
        let defaults = RuleContext::default();

        let proxy_uid = self
            .parsed::<u32>(ENV_PROXY_UID)?
            .unwrap_or(defaults.proxy_uid);
        let proxy_port = self
            .parsed::<u16>(ENV_PROXY_PORT)?
            .unwrap_or(defaults.proxy_port);
        let manage_port = self
            .parsed::<u16>(ENV_PROXY_MANAGE_PORT)?
            .unwrap_or(defaults.manage_port);
        let inbound_include_ports = match self.optional(ENV_INBOUND_PORTS_INCLUDE) {
            Some(raw) => parse_port_list(ENV_INBOUND_PORTS_INCLUDE, &raw)?,
            None => defaults.inbound_include_ports,
        };

        Ok(RuleContext {
            proxy_uid,
            proxy_port,
            manage_port,
            inbound_include_ports,
        })
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::MissingEnv {
            key: key.to_string(),
        })
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.optional(key) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::invalid(key, format!("not a valid number: {}", raw))),
            None => Ok(None),
        }
    }
}

/// Parse a comma-separated port list such as `9080,9443`.
fn parse_port_list(field: &str, raw: &str) -> Result<BTreeSet<u16>, ConfigError> {
    let mut ports = BTreeSet::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let port: u16 = part
            .parse()
            .map_err(|_| ConfigError::invalid(field, format!("not a port number: {}", part)))?;
        if port == 0 {
            return Err(ConfigError::invalid(field, "port 0 cannot be intercepted"));
        }
        ports.insert(port);
    }
    if ports.is_empty() {
        return Err(ConfigError::invalid(field, "no ports listed"));
    }
    Ok(ports)
}
