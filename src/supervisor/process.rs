//! Handle to the running proxy.

use std::process::ExitStatus;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::{Child, ChildStdin, ChildStdout};
use tracing::{debug, info, warn};

use super::error::SupervisorError;
use super::state::ProcessState;

/// The proxy subprocess and its pipes.
pub struct SupervisedProcess {
    child: Child,
    pid: u32,
    stdout: Option<ChildStdout>,
    stdin: Option<ChildStdin>,
    state: ProcessState,
}

impl SupervisedProcess {
    pub(crate) fn new(mut child: Child) -> Result<Self, SupervisorError> {
        let pid = child.id().ok_or(SupervisorError::MissingPipe("pid"))?;
        let stdout = child.stdout.take();
        let stdin = child.stdin.take();

        Ok(Self {
            child,
            pid,
            stdout,
            stdin,
            state: ProcessState::Starting,
        })
    }

    /// PID of the proxy.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Move to `next`, rejecting transitions that skip `Terminating`.
    pub fn set_state(&mut self, next: ProcessState) -> Result<(), SupervisorError> {
        self.state = self.state.transition(next)?;
        debug!("Proxy {} state -> {:?}", self.pid, self.state);
        Ok(())
    }

    /// Take the proxy's stdout for the relay loop.
    pub fn take_stdout(&mut self) -> Result<ChildStdout, SupervisorError> {
        self.stdout.take().ok_or(SupervisorError::MissingPipe("stdout"))
    }

    /// The proxy's stdin. Kept open for the proxy's lifetime.
    pub fn stdin(&mut self) -> Option<&mut ChildStdin> {
        self.stdin.as_mut()
    }

    /// Exit status if the proxy has already exited.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, SupervisorError> {
        self.child.try_wait().map_err(SupervisorError::Wait)
    }

    /// Wait for the proxy to exit on its own.
    pub async fn wait(&mut self) -> Result<ExitStatus, SupervisorError> {
        self.child.wait().await.map_err(SupervisorError::Wait)
    }

    /// Stop the proxy: SIGTERM, then SIGKILL after `grace`.
    ///
    /// Must be called in `Terminating`; leaves the process in `Exited`.
    pub async fn terminate(&mut self, grace: Duration) -> Result<ExitStatus, SupervisorError> {
        if self.state != ProcessState::Terminating {
            return Err(SupervisorError::InvalidTransition {
                from: self.state,
                to: ProcessState::Exited,
            });
        }

        // Closing stdin first lets a proxy that reads it notice shutdown.
        self.stdin.take();

        let status = match self.try_wait()? {
            Some(status) => status,
            None => {
                debug!("Sending SIGTERM to proxy {}", self.pid);
                if let Err(e) = kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
                    warn!("Failed to send SIGTERM to proxy {}: {}", self.pid, e);
                }

                match tokio::time::timeout(grace, self.child.wait()).await {
                    Ok(status) => status.map_err(SupervisorError::Wait)?,
                    Err(_) => {
                        warn!(
                            "Proxy {} did not exit within {:?}, killing",
                            self.pid, grace
                        );
                        self.child.kill().await.map_err(SupervisorError::Wait)?;
                        self.child.wait().await.map_err(SupervisorError::Wait)?
                    }
                }
            }
        };

        self.set_state(ProcessState::Exited)?;
        info!("Proxy {} exited: {}", self.pid, status);
        Ok(status)
    }

    /// Give a proxy that closed its stdout `grace` to exit by itself, then
    /// fall back to [`terminate`](Self::terminate).
    pub async fn wait_or_terminate(
        &mut self,
        grace: Duration,
    ) -> Result<ExitStatus, SupervisorError> {
        if self.state != ProcessState::Terminating {
            return Err(SupervisorError::InvalidTransition {
                from: self.state,
                to: ProcessState::Exited,
            });
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                let status = status.map_err(SupervisorError::Wait)?;
                self.stdin.take();
                self.set_state(ProcessState::Exited)?;
                info!("Proxy {} exited: {}", self.pid, status);
                Ok(status)
            }
            Err(_) => {
                warn!("Proxy {} closed stdout but kept running", self.pid);
                self.terminate(grace).await
            }
        }
    }
}

impl std::fmt::Debug for SupervisedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisedProcess")
            .field("pid", &self.pid)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
