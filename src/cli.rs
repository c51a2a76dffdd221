//! Command-line interface definitions for sidecar-launcher.
//!
//! Uses clap's derive API. Every option except the config path can also be
//! set from the environment, which is how sidecar containers are usually
//! configured.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::rules::{DEFAULT_CLEAN_SCRIPT, DEFAULT_INIT_SCRIPT, RuleHelpers};
use crate::supervisor::{DEFAULT_PROXY_BIN, DEFAULT_PROXY_LOG_LEVEL};

/// Supervisory launcher for a sidecar network proxy.
///
/// Installs the traffic redirection rules and runs the proxy under a
/// reduced identity. The rules are removed again on shutdown.
#[derive(Parser, Debug)]
#[command(name = "sidecar-launcher")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Proxy configuration file.
    ///
    /// Optional at the clap level so a missing path is reported with the
    /// launcher's own usage line and exit code.
    #[arg(value_name = "CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Proxy binary to launch.
    #[arg(long, env = "SIDECAR_PROXY_BIN", default_value = DEFAULT_PROXY_BIN)]
    pub proxy_bin: PathBuf,

    /// Log level passed to the proxy with `-l`.
    #[arg(long, env = "SIDECAR_PROXY_LOG_LEVEL", default_value = DEFAULT_PROXY_LOG_LEVEL)]
    pub proxy_log_level: String,

    /// Rule-init helper script.
    #[arg(long, env = "SIDECAR_INIT_SCRIPT", default_value = DEFAULT_INIT_SCRIPT)]
    pub init_script: PathBuf,

    /// Rule-cleanup helper script.
    #[arg(long, env = "SIDECAR_CLEAN_SCRIPT", default_value = DEFAULT_CLEAN_SCRIPT)]
    pub clean_script: PathBuf,

    /// Shell the helper scripts are run with.
    #[arg(long, env = "SIDECAR_SHELL", default_value = "sh")]
    pub shell: PathBuf,

    /// Seconds the proxy gets to exit after SIGTERM before it is killed.
    #[arg(long, value_name = "SECONDS", default_value_t = 5)]
    pub stop_timeout: u64,

    /// Run the cleanup helper once before installing rules.
    ///
    /// Removes rules left behind by a launcher that was killed before it
    /// could clean up.
    #[arg(long)]
    pub clean_stale_rules: bool,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Helper scripts selected on the command line.
    pub fn helpers(&self) -> RuleHelpers {
        RuleHelpers {
            shell: self.shell.clone(),
            init_script: self.init_script.clone(),
            clean_script: self.clean_script.clone(),
        }
    }

    /// Grace period for stopping the proxy.
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["sidecar-launcher"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_cli_parse_basic() {
        let cli = parse(&["/etc/envoy/envoy.yaml"]);
        assert_eq!(cli.config_path, Some(PathBuf::from("/etc/envoy/envoy.yaml")));
        assert_eq!(cli.stop_timeout, 5);
        assert!(!cli.clean_stale_rules);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_config_path_optional() {
        let cli = parse(&[]);
        assert!(cli.config_path.is_none());
    }

    #[test]
    fn test_cli_parse_with_options() {
        let cli = parse(&[
            "--proxy-bin",
            "/opt/envoy",
            "--proxy-log-level",
            "info",
            "--init-script",
            "/scripts/init.sh",
            "--clean-script",
            "/scripts/clean.sh",
            "--shell",
            "bash",
            "--stop-timeout",
            "12",
            "--clean-stale-rules",
            "-vv",
            "envoy.yaml",
        ]);

        assert_eq!(cli.proxy_bin, PathBuf::from("/opt/envoy"));
        assert_eq!(cli.proxy_log_level, "info");
        assert_eq!(cli.stop_grace(), Duration::from_secs(12));
        assert!(cli.clean_stale_rules);
        assert_eq!(cli.verbose, 2);

        let helpers = cli.helpers();
        assert_eq!(helpers.shell, PathBuf::from("bash"));
        assert_eq!(helpers.init_script, PathBuf::from("/scripts/init.sh"));
        assert_eq!(helpers.clean_script, PathBuf::from("/scripts/clean.sh"));
    }

    #[test]
    fn test_cli_rejects_bad_stop_timeout() {
        let result = Cli::try_parse_from(["sidecar-launcher", "--stop-timeout", "soon", "x.yaml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
