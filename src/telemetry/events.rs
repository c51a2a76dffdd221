//! Lifecycle events emitted by the launcher.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Milestones of one launcher run, in the order they normally occur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The rule-init helper succeeded.
    RulesApplied {
        /// Identity exempted from redirection.
        proxy_uid: u32,
        /// Listener port traffic is redirected to.
        proxy_port: u16,
        /// Proxy management port.
        manage_port: u16,
        /// Comma-separated inbound port list.
        inbound_ports: String,
    },

    /// The proxy is running under the dropped identity.
    ProxyLaunched {
        /// PID of the proxy.
        pid: u32,
        /// Identity the proxy runs as.
        uid: u32,
        /// Proxy binary.
        program: String,
    },

    /// Shutdown was claimed.
    ShutdownRequested {
        /// What started the shutdown.
        trigger: ShutdownTrigger,
    },

    /// The rule-cleanup helper ran.
    RulesReverted {
        /// Whether it exited successfully.
        success: bool,
    },

    /// The proxy has been reaped.
    ProxyExited {
        /// PID of the proxy.
        pid: u32,
        /// Exit code, if it exited normally.
        code: Option<i32>,
        /// Terminating signal, if it was killed.
        signal: Option<i32>,
    },
}

/// Cause of a shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownTrigger {
    /// SIGTERM or SIGINT.
    Signal,
    /// The proxy closed its stdout.
    StreamClosed,
    /// The rule-init helper failed.
    ApplyFailed,
    /// The proxy could not be started.
    LaunchFailed,
}

/// An event with the time it was emitted.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// RFC 3339 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The event, flattened into this object.
    #[serde(flatten)]
    pub event: &'a LifecycleEvent,
}

impl LifecycleEvent {
    /// Stamp this event with the current time.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_value(event: &LifecycleEvent) -> serde_json::Value {
        serde_json::to_value(event.with_timestamp()).unwrap()
    }

    #[test]
    fn test_rules_applied_serialization() {
        let json = to_value(&LifecycleEvent::RulesApplied {
            proxy_uid: 1337,
            proxy_port: 10000,
            manage_port: 15000,
            inbound_ports: "9080".to_string(),
        });

        assert_eq!(json["event"], "rules_applied");
        assert_eq!(json["proxy_uid"], 1337);
        assert_eq!(json["inbound_ports"], "9080");
    }

    #[test]
    fn test_shutdown_trigger_is_snake_case() {
        let json = to_value(&LifecycleEvent::ShutdownRequested {
            trigger: ShutdownTrigger::StreamClosed,
        });

        assert_eq!(json["event"], "shutdown_requested");
        assert_eq!(json["trigger"], "stream_closed");
    }

    #[test]
    fn test_proxy_exited_with_signal() {
        let json = to_value(&LifecycleEvent::ProxyExited {
            pid: 42,
            code: None,
            signal: Some(15),
        });

        assert_eq!(json["event"], "proxy_exited");
        assert!(json["code"].is_null());
        assert_eq!(json["signal"], 15);
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let json = to_value(&LifecycleEvent::RulesReverted { success: true });
        let ts = json["ts"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
