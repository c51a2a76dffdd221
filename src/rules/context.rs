//! The parameter set shared by rule application and revert.

use std::collections::BTreeSet;

/// Uid the proxy runs as; traffic from this uid bypasses redirection.
pub const DEFAULT_PROXY_UID: u32 = 1337;

/// Port the proxy listens on for redirected traffic.
pub const DEFAULT_PROXY_PORT: u16 = 10000;

/// Port of the proxy's management interface.
pub const DEFAULT_PROXY_MANAGE_PORT: u16 = 15000;

/// Inbound application port intercepted by default.
pub const DEFAULT_INBOUND_PORT: u16 = 9080;

/// Helper environment variable: uid whose traffic is not redirected.
pub const ENV_PROXY_UID: &str = "PROXY_UID";
/// Helper environment variable: proxy listen port.
pub const ENV_PROXY_PORT: &str = "PROXY_PORT";
/// Helper environment variable: proxy management port.
pub const ENV_PROXY_MANAGE_PORT: &str = "PROXY_MANAGE_PORT";
/// Helper environment variable: comma-separated inbound ports to intercept.
pub const ENV_INBOUND_PORTS_INCLUDE: &str = "INBOUND_PORTS_INCLUDE";

/// Which traffic is redirected to the proxy and which identity bypasses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleContext {
    /// Uid of the proxy process.
    pub proxy_uid: u32,
    /// Proxy listen port.
    pub proxy_port: u16,
    /// Proxy management port.
    pub manage_port: u16,
    /// Inbound ports redirected to the proxy.
    pub inbound_include_ports: BTreeSet<u16>,
}

impl Default for RuleContext {
    fn default() -> Self {
        Self {
            proxy_uid: DEFAULT_PROXY_UID,
            proxy_port: DEFAULT_PROXY_PORT,
            manage_port: DEFAULT_PROXY_MANAGE_PORT,
            inbound_include_ports: BTreeSet::from([DEFAULT_INBOUND_PORT]),
        }
    }
}

impl RuleContext {
    /// Inbound ports encoded the way the init helper expects them.
    pub fn inbound_ports_value(&self) -> String {
        self.inbound_include_ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Environment passed to the rule-init helper.
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_PROXY_UID, self.proxy_uid.to_string()),
            (ENV_PROXY_PORT, self.proxy_port.to_string()),
            (ENV_PROXY_MANAGE_PORT, self.manage_port.to_string()),
            (ENV_INBOUND_PORTS_INCLUDE, self.inbound_ports_value()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_env() {
        let env = RuleContext::default().to_env();
        assert_eq!(
            env,
            vec![
                ("PROXY_UID", "1337".to_string()),
                ("PROXY_PORT", "10000".to_string()),
                ("PROXY_MANAGE_PORT", "15000".to_string()),
                ("INBOUND_PORTS_INCLUDE", "9080".to_string()),
            ]
        );
    }

    #[test]
    fn test_inbound_ports_sorted() {
        let ctx = RuleContext {
            inbound_include_ports: BTreeSet::from([9443, 8080, 9080]),
            ..Default::default()
        };
        assert_eq!(ctx.inbound_ports_value(), "8080,9080,9443");
    }
}
