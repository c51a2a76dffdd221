//! sidecar-launcher: supervisory launcher for a sidecar network proxy
//!
//! This crate installs transparent redirection rules for a pod-style
//! sidecar and runs the proxy under a reduced identity. The rules are
//! removed again when the launcher is told to stop.
//!
//! # Lifecycle
//!
//! The ordering is strict: rules are applied before the proxy starts, and
//! cleanup runs on every exit path once rule installation was attempted.
//! The uid switch happens in the forked child before the proxy binary is
//! executed, so the proxy never runs with the launcher's identity.
//!
//! # Architecture
//!
//! - **Config**: launch parameters and rule overrides from the environment
//! - **Rules**: the init and cleanup helper scripts
//! - **Privilege**: the pre-exec uid switch
//! - **Supervisor**: proxy process lifecycle and output relay
//! - **Signals**: one-shot shutdown on SIGTERM or SIGINT
//! - **Telemetry**: stderr diagnostics and JSON lifecycle events

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod privilege;
pub mod rules;
pub mod signals;
pub mod supervisor;
pub mod telemetry;
