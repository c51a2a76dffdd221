//! Host packet redirection rules.
//!
//! Rules are mutated by two external helper scripts. The init helper gets
//! the [`RuleContext`] as environment variables; the cleanup helper gets
//! nothing and removes the well-known chains by name, so it works even if
//! init never ran or the rules are already gone.

mod context;
mod error;
mod manager;

pub use context::{
    DEFAULT_INBOUND_PORT, DEFAULT_PROXY_MANAGE_PORT, DEFAULT_PROXY_PORT, DEFAULT_PROXY_UID,
    ENV_INBOUND_PORTS_INCLUDE, ENV_PROXY_MANAGE_PORT, ENV_PROXY_PORT, ENV_PROXY_UID, RuleContext,
};
pub use error::RuleError;
pub use manager::{DEFAULT_CLEAN_SCRIPT, DEFAULT_INIT_SCRIPT, RuleHelpers, TrafficRuleManager};
