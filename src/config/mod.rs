//! Launch parameter resolution.
//!
//! The launcher takes exactly one positional argument (the proxy
//! configuration file) and two required environment variables:
//!
//! - `SERVICE_CLUSTER`: logical cluster of the proxy (`--service-cluster`)
//! - `NODE_ID`: logical node identity of the proxy (`--service-node`)
//!
//! The traffic rule context (proxy uid and ports) defaults to fixed
//! constants. The variables the rule helper consumes can also be set on the
//! launcher itself to override those constants:
//!
//! | Variable | Default |
//! |---|---|
//! | `PROXY_UID` | 1337 |
//! | `PROXY_PORT` | 10000 |
//! | `PROXY_MANAGE_PORT` | 15000 |
//! | `INBOUND_PORTS_INCLUDE` | 9080 |
//!
//! Empty values are treated as unset, both for required keys and overrides.

mod error;
mod resolver;

pub use error::ConfigError;
pub use resolver::{ENV_NODE_ID, ENV_SERVICE_CLUSTER, EnvironmentResolver, LaunchParameters, USAGE};
