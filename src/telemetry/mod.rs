//! Logging and lifecycle telemetry.
//!
//! Diagnostics go through `tracing` to stderr, so they never interleave
//! with the proxy output relayed on stdout. Lifecycle milestones are
//! serialized as JSON and logged at info level on the `lifecycle` target:
//!
//! ```json
//! {"ts":"2026-01-07T14:32:01Z","event":"proxy_launched","pid":4242,"uid":1337,"program":"/usr/local/bin/envoy"}
//! ```
//!
//! Select them alone with `RUST_LOG=lifecycle=info`.

mod events;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub use events::{LifecycleEvent, ShutdownTrigger, TimestampedEvent};

/// Tracing target of lifecycle events.
pub const LIFECYCLE_TARGET: &str = "lifecycle";

/// Install the stderr subscriber.
///
/// # Verbosity Levels
/// - 0 (default): `RUST_LOG`, or warnings and errors
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
pub fn init_tracing(verbose: u8) -> Result<()> {
    let filter = match default_directive(verbose) {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

/// Filter directive forced by `-v` flags, `None` to defer to `RUST_LOG`.
fn default_directive(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Log a lifecycle event as timestamped JSON.
pub fn emit(event: LifecycleEvent) {
    match serde_json::to_string(&event.with_timestamp()) {
        Ok(json) => info!(target: LIFECYCLE_TARGET, "{}", json),
        Err(e) => warn!("Failed to serialize lifecycle event {:?}: {}", event, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(default_directive(0), None);
        assert_eq!(default_directive(1), Some("info"));
        assert_eq!(default_directive(2), Some("debug"));
        assert_eq!(default_directive(3), Some("trace"));
        assert_eq!(default_directive(9), Some("trace"));
    }

    #[test]
    fn test_emit_without_subscriber() {
        emit(LifecycleEvent::RulesReverted { success: false });
    }
}
