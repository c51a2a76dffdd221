//! Launching and supervising the proxy subprocess.
//!
//! # Lifecycle
//!
//! ```text
//! Starting ──► Running ──► Terminating ──► Exited
//!     └────────────────────────▲
//! ```
//!
//! - `Starting`: spawned with the privilege drop as its pre-exec hook
//! - `Running`: the relay loop is forwarding stdout
//! - `Terminating`: a termination signal arrived or stdout closed; rules
//!   are reverted while in this state
//! - `Exited`: the proxy has been stopped and reaped

mod command;
mod error;
mod process;
mod relay;
mod state;

use std::process::Stdio;

use tokio::io::{AsyncWrite, BufReader};
use tokio::sync::watch;
use tracing::info;

use crate::privilege::{PrivilegeDropper, PrivilegeError};

pub use command::{DEFAULT_PROXY_BIN, DEFAULT_PROXY_LOG_LEVEL, ProxyCommand};
pub use error::SupervisorError;
pub use process::SupervisedProcess;
pub use relay::{RelayOutcome, relay_output};
pub use state::ProcessState;

/// Launches the proxy under a reduced identity and relays its output.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    dropper: PrivilegeDropper,
}

impl ProcessSupervisor {
    /// Create a supervisor that drops every launched proxy with `dropper`.
    pub fn new(dropper: PrivilegeDropper) -> Self {
        Self { dropper }
    }

    /// Spawn the proxy.
    ///
    /// Stdout and stdin are piped, stderr is inherited. The uid switch runs
    /// in the child before exec; if it fails the proxy never starts and
    /// [`SupervisorError::Privilege`] is returned.
    pub fn launch(&self, command: &ProxyCommand) -> Result<SupervisedProcess, SupervisorError> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        self.dropper.install(&mut cmd);

        let child = cmd.spawn().map_err(|source| {
            // setuid reports EPERM or EINVAL; exec failures use other codes.
            match source.raw_os_error() {
                Some(errno) if is_privilege_errno(errno) => {
                    SupervisorError::Privilege(PrivilegeError::Switch {
                        uid: self.dropper.target_uid(),
                        source,
                    })
                }
                _ => SupervisorError::Spawn {
                    program: command.program.display().to_string(),
                    source,
                },
            }
        })?;

        let process = SupervisedProcess::new(child)?;
        info!(
            "Proxy started with PID {} as uid {}",
            process.pid(),
            self.dropper.target_uid()
        );
        Ok(process)
    }

    /// Relay the proxy's stdout to `writer` until shutdown or end of stream.
    ///
    /// Drives `Starting -> Running` before relaying and `-> Terminating`
    /// when the relay stops, whichever way it stops.
    pub async fn supervise<W>(
        &self,
        process: &mut SupervisedProcess,
        shutdown: &mut watch::Receiver<bool>,
        writer: &mut W,
    ) -> Result<RelayOutcome, SupervisorError>
    where
        W: AsyncWrite + Unpin,
    {
        let stdout = process.take_stdout()?;
        process.set_state(ProcessState::Running)?;

        let outcome = relay_output(BufReader::new(stdout), writer, shutdown).await;

        process.set_state(ProcessState::Terminating)?;
        outcome
    }
}

fn is_privilege_errno(errno: i32) -> bool {
    use nix::errno::Errno;
    matches!(Errno::from_raw(errno), Errno::EPERM | Errno::EINVAL)
}
