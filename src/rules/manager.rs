//! Running the rule init and cleanup helpers.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use tracing::{debug, info, warn};

use super::context::{
    ENV_INBOUND_PORTS_INCLUDE, ENV_PROXY_MANAGE_PORT, ENV_PROXY_PORT, ENV_PROXY_UID, RuleContext,
};
use super::error::RuleError;

/// Default rule-init helper script.
pub const DEFAULT_INIT_SCRIPT: &str = "iptable_init.sh";

/// Default rule-cleanup helper script.
pub const DEFAULT_CLEAN_SCRIPT: &str = "iptable_clean.sh";

/// Where the helper scripts live and how they are run.
#[derive(Debug, Clone)]
pub struct RuleHelpers {
    /// Interpreter used to run both scripts.
    pub shell: PathBuf,
    /// Rule-init script.
    pub init_script: PathBuf,
    /// Rule-cleanup script.
    pub clean_script: PathBuf,
}

impl Default for RuleHelpers {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("sh"),
            init_script: PathBuf::from(DEFAULT_INIT_SCRIPT),
            clean_script: PathBuf::from(DEFAULT_CLEAN_SCRIPT),
        }
    }
}

/// Applies and reverts the redirection rules for one [`RuleContext`].
#[derive(Debug, Clone)]
pub struct TrafficRuleManager {
    ctx: RuleContext,
    helpers: RuleHelpers,
}

impl TrafficRuleManager {
    /// Create a manager for the given context.
    pub fn new(ctx: RuleContext, helpers: RuleHelpers) -> Self {
        Self { ctx, helpers }
    }

    /// The context rules are applied with.
    pub fn context(&self) -> &RuleContext {
        &self.ctx
    }

    /// Run the init helper and return its combined output.
    ///
    /// Blocks until the helper exits.
    pub fn apply(&self) -> Result<String, RuleError> {
        let env = self.ctx.to_env();
        info!(
            "Applying traffic rules: uid={}, port={}, manage_port={}, inbound={}",
            self.ctx.proxy_uid,
            self.ctx.proxy_port,
            self.ctx.manage_port,
            self.ctx.inbound_ports_value()
        );

        let (cmd, status, output) = self.run_helper(&self.helpers.init_script, &env)?;
        if !status.success() {
            return Err(RuleError::Apply {
                cmd,
                status: describe_status(status),
                output,
            });
        }
        Ok(output)
    }

    /// Run the cleanup helper and return its combined output.
    ///
    /// The rule parameters are removed from the helper's environment so
    /// cleanup never depends on what init was given.
    pub fn revert(&self) -> Result<String, RuleError> {
        info!("Reverting traffic rules");

        let (cmd, status, output) = self.run_helper(&self.helpers.clean_script, &[])?;
        if !status.success() {
            warn!("Rule cleanup exited with {}", describe_status(status));
            return Err(RuleError::Revert {
                cmd,
                status: describe_status(status),
                output,
            });
        }
        Ok(output)
    }

    /// Run a helper with stdout and stderr sharing one pipe.
    fn run_helper(
        &self,
        script: &Path,
        env: &[(&'static str, String)],
    ) -> Result<(String, ExitStatus, String), RuleError> {
        let cmd_str = format!("{} {}", self.helpers.shell.display(), script.display());
        debug!("Running: {}", cmd_str);

        let io_err = |source| RuleError::Io {
            cmd: cmd_str.clone(),
            source,
        };

        let (mut reader, writer) = std::io::pipe().map_err(io_err)?;
        let writer_err = writer.try_clone().map_err(io_err)?;

        // The command owns the write ends; it must be dropped before reading
        // or the reader never sees EOF.
        let mut child = {
            let mut command = Command::new(&self.helpers.shell);
            command
                .arg(script)
                .env_remove(ENV_PROXY_UID)
                .env_remove(ENV_PROXY_PORT)
                .env_remove(ENV_PROXY_MANAGE_PORT)
                .env_remove(ENV_INBOUND_PORTS_INCLUDE)
                .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
                .stdin(Stdio::null())
                .stdout(writer)
                .stderr(writer_err);
            command.spawn().map_err(|source| RuleError::Spawn {
                cmd: cmd_str.clone(),
                source,
            })?
        };

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw).map_err(io_err)?;
        let status = child.wait().map_err(io_err)?;

        debug!("{} finished with {}", cmd_str, describe_status(status));
        Ok((cmd_str, status, String::from_utf8_lossy(&raw).into_owned()))
    }
}

fn describe_status(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit code {}", code),
        (None, Some(signal)) => format!("killed by signal {}", signal),
        _ => "unknown status".to_string(),
    }
}
