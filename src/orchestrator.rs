//! Launcher orchestration and lifecycle management.
//!
//! This module wires the resolver, rule manager, supervisor and signal
//! coordinator together and decides the process exit code. Rule cleanup is
//! always run here, after the relay loop or a failed startup step, and
//! never from the signal listener.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitCode, ExitStatus};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cli::Cli;
use crate::config::EnvironmentResolver;
use crate::privilege::PrivilegeDropper;
use crate::rules::{RuleError, TrafficRuleManager};
use crate::signals::{ShutdownState, SignalCoordinator};
use crate::supervisor::{ProcessSupervisor, ProxyCommand, RelayOutcome, SupervisedProcess};
use crate::telemetry::{self, LifecycleEvent, ShutdownTrigger};

/// Notice printed before the cleanup helper runs.
pub const SHUTDOWN_NOTICE: &str = "shutting down proxy...";

/// Run the launcher to completion.
///
/// Returns the exit code for a run that got as far as launching the proxy
/// (or was stopped by a signal before that). Startup failures are returned
/// as errors; rules have already been reverted by then if `apply` was
/// attempted.
pub fn run(cli: &Cli) -> Result<ExitCode> {
    let resolver = EnvironmentResolver::from_process_env();
    let params = resolver.resolve(cli.config_path.clone())?;
    let ctx = resolver.rule_context()?;

    let dropper = PrivilegeDropper::new(ctx.proxy_uid);
    let launcher = Launcher {
        rules: TrafficRuleManager::new(ctx, cli.helpers()),
        supervisor: ProcessSupervisor::new(dropper),
        command: ProxyCommand::new(cli.proxy_bin.clone(), &params)
            .log_level(cli.proxy_log_level.clone()),
        grace: cli.stop_grace(),
        clean_stale_rules: cli.clean_stale_rules,
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(launcher.run())
}

/// Everything needed for one supervised launch.
struct Launcher {
    rules: TrafficRuleManager,
    supervisor: ProcessSupervisor,
    command: ProxyCommand,
    grace: Duration,
    clean_stale_rules: bool,
}

impl Launcher {
    async fn run(self) -> Result<ExitCode> {
        let mut out = tokio::io::stdout();

        let state = Arc::new(ShutdownState::new());
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let _listener = SignalCoordinator::new(Arc::clone(&state))
            .register(move |_| {
                telemetry::emit(LifecycleEvent::ShutdownRequested {
                    trigger: ShutdownTrigger::Signal,
                });
                let _ = shutdown_tx.send(true);
            })
            .context("Failed to register signal handlers")?;

        if self.clean_stale_rules {
            info!("Removing stale traffic rules");
            match self.run_helper(TrafficRuleManager::revert).await {
                Ok(output) => echo(&mut out, &output).await,
                Err(e) => warn!("Stale rule cleanup failed, continuing: {:#}", e),
            }

            if state.is_requested() {
                // The stale pass already left the host without rules.
                info!("Shutdown requested during stale rule cleanup, not applying rules");
                say(&mut out, SHUTDOWN_NOTICE).await;
                state.finish();
                return Ok(ExitCode::SUCCESS);
            }
        }

        match self.run_helper(TrafficRuleManager::apply).await {
            Ok(output) => {
                echo(&mut out, &output).await;
                let ctx = self.rules.context();
                telemetry::emit(LifecycleEvent::RulesApplied {
                    proxy_uid: ctx.proxy_uid,
                    proxy_port: ctx.proxy_port,
                    manage_port: ctx.manage_port,
                    inbound_ports: ctx.inbound_ports_value(),
                });
            }
            Err(e) => {
                self.abort(&state, &mut out, ShutdownTrigger::ApplyFailed).await;
                return Err(e).context("Failed to apply traffic rules");
            }
        }

        if state.is_requested() {
            info!("Shutdown requested while applying rules, not launching proxy");
            say(&mut out, SHUTDOWN_NOTICE).await;
            self.revert_rules(&mut out).await;
            state.finish();
            return Ok(ExitCode::SUCCESS);
        }

        say(&mut out, &format!("running {}", self.command.to_command_line())).await;
        let mut process = match self.supervisor.launch(&self.command) {
            Ok(process) => process,
            Err(e) => {
                self.abort(&state, &mut out, ShutdownTrigger::LaunchFailed).await;
                return Err(e).context("Failed to launch proxy");
            }
        };
        telemetry::emit(LifecycleEvent::ProxyLaunched {
            pid: process.pid(),
            uid: self.rules.context().proxy_uid,
            program: self.command.program.display().to_string(),
        });

        let outcome = self
            .supervisor
            .supervise(&mut process, &mut shutdown_rx, &mut out)
            .await;

        match outcome {
            Ok(RelayOutcome::Shutdown { lines }) => {
                debug!("Relayed {} lines before shutdown", lines);
                self.shut_down(&state, &mut out, &mut process, false).await?;
                Ok(ExitCode::SUCCESS)
            }
            Ok(RelayOutcome::StreamClosed { lines }) => {
                debug!("Relayed {} lines before the proxy closed its output", lines);
                if !state.begin() {
                    // A signal claimed the shutdown while the stream was closing.
                    self.shut_down(&state, &mut out, &mut process, false).await?;
                    return Ok(ExitCode::SUCCESS);
                }
                telemetry::emit(LifecycleEvent::ShutdownRequested {
                    trigger: ShutdownTrigger::StreamClosed,
                });
                let status = self.shut_down(&state, &mut out, &mut process, true).await?;
                Ok(ExitCode::from(exit_code_for(status)))
            }
            Err(e) => {
                state.begin();
                if let Err(stop) = self.shut_down(&state, &mut out, &mut process, false).await {
                    warn!("Failed to stop proxy after relay error: {:#}", stop);
                }
                Err(e).context("Proxy supervision failed")
            }
        }
    }

    /// Terminating phase: notice, revert, flush, stop the proxy.
    async fn shut_down(
        &self,
        state: &ShutdownState,
        out: &mut Stdout,
        process: &mut SupervisedProcess,
        stream_closed: bool,
    ) -> Result<ExitStatus> {
        say(out, SHUTDOWN_NOTICE).await;
        self.revert_rules(out).await;
        if let Err(e) = out.flush().await {
            warn!("Failed to flush stdout: {}", e);
        }

        let stopped = if stream_closed {
            process.wait_or_terminate(self.grace).await
        } else {
            process.terminate(self.grace).await
        };
        state.finish();

        let status = stopped.context("Failed to stop proxy")?;
        telemetry::emit(LifecycleEvent::ProxyExited {
            pid: process.pid(),
            code: status.code(),
            signal: status.signal(),
        });
        Ok(status)
    }

    /// Cleanup after a startup failure that happened once `apply` was attempted.
    async fn abort(&self, state: &ShutdownState, out: &mut Stdout, trigger: ShutdownTrigger) {
        if state.begin() {
            telemetry::emit(LifecycleEvent::ShutdownRequested { trigger });
        }
        self.revert_rules(out).await;
        if let Err(e) = out.flush().await {
            warn!("Failed to flush stdout: {}", e);
        }
        state.finish();
    }

    /// Run the cleanup helper and echo its output. Failures are logged.
    async fn revert_rules<W: AsyncWrite + Unpin>(&self, out: &mut W) {
        match self.run_helper(TrafficRuleManager::revert).await {
            Ok(output) => {
                echo(out, &output).await;
                telemetry::emit(LifecycleEvent::RulesReverted { success: true });
            }
            Err(e) => {
                error!("{:#}", e);
                telemetry::emit(LifecycleEvent::RulesReverted { success: false });
            }
        }
    }

    /// Run a blocking helper call on tokio's blocking pool.
    async fn run_helper(
        &self,
        call: fn(&TrafficRuleManager) -> Result<String, RuleError>,
    ) -> Result<String> {
        let rules = self.rules.clone();
        let output = tokio::task::spawn_blocking(move || call(&rules))
            .await
            .context("Rule helper task failed")??;
        Ok(output)
    }
}

/// Exit code that mirrors how the proxy ended.
fn exit_code_for(status: ExitStatus) -> u8 {
    match status.code() {
        Some(code) => u8::try_from(code).unwrap_or(1),
        None => 1,
    }
}

/// Write one notice line to stdout. Failures are logged.
async fn say<W: AsyncWrite + Unpin>(out: &mut W, line: &str) {
    let result = async {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await
    }
    .await;
    if let Err(e) = result {
        warn!("Failed to write to stdout: {}", e);
    }
}

/// Echo helper output, terminated by a newline.
async fn echo<W: AsyncWrite + Unpin>(out: &mut W, output: &str) {
    if output.is_empty() {
        return;
    }
    let line = output.strip_suffix('\n').unwrap_or(output);
    say(out, line).await;
}
