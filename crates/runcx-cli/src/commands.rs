// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command implementations for the `runcx` CLI.

use anyhow::{Context, Result, bail};
use runcx_config::{RunConfig, load_config, validate_config};
use runcx_process::{
    CancelToken, CancellationPolicy, Cmd, ExecutionResult, InputSource, ProcessError, join_args,
};
use schemars::schema_for;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Exit status used when the child was killed by a timeout or Ctrl-C.
pub const KILLED_EXIT_CODE: i32 = 124;

/// Options of `runcx run`, already parsed.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Working directory.
    pub cwd: Option<PathBuf>,
    /// `KEY=VALUE` pairs.
    pub env: Vec<String>,
    /// Variables to remove.
    pub unset: Vec<String>,
    /// Timeout in seconds.
    pub timeout_secs: Option<f64>,
    /// Exit codes that count as success.
    pub ok_codes: Vec<i32>,
    /// Suppress live echo.
    pub quiet: bool,
    /// Prefix for echoing the command line.
    pub echo_prompt: Option<String>,
    /// File fed to the child's stdin.
    pub stdin_file: Option<PathBuf>,
    /// Cancellation policy override.
    pub policy: Option<CancellationPolicy>,
    /// Print the result as JSON.
    pub json: bool,
}

/// Load and validate the configuration, logging advisory warnings.
pub fn load_run_config(path: Option<&Path>) -> Result<RunConfig> {
    let config = load_config(path).context("load config")?;
    for warning in validate_config(&config).context("validate config")? {
        warn!(target: "runcx.cli", "{warning}");
    }
    Ok(config)
}

/// Split a `KEY=VALUE` flag.
pub fn parse_key_value_flag(raw: &str, flag_name: &str) -> Result<(String, String)> {
    let (raw_key, raw_value) = raw
        .split_once('=')
        .with_context(|| format!("{flag_name} expects KEY=VALUE, got '{raw}'"))?;

    let key = raw_key.trim();
    if key.is_empty() {
        bail!("{flag_name} key cannot be empty (got '{raw}')");
    }

    Ok((key.to_string(), raw_value.to_string()))
}

/// Turn the options into a launch.
pub async fn build_cmd(opts: &RunOptions, config: &RunConfig, cancel: CancelToken) -> Result<Cmd> {
    let Some((program, args)) = opts.command.split_first() else {
        bail!("no command given");
    };

    let mut cmd = Cmd::from_config(program.clone(), config)
        .context("apply config")?
        .args(args.iter().cloned())
        .cancel_token(cancel);

    if let Some(cwd) = &opts.cwd {
        cmd = cmd.current_dir(cwd);
    }
    for raw in &opts.env {
        let (key, value) = parse_key_value_flag(raw, "--env")?;
        cmd = cmd.env(key, value);
    }
    for key in &opts.unset {
        cmd = cmd.env_remove(key.clone());
    }
    if let Some(secs) = opts.timeout_secs {
        let timeout = Duration::try_from_secs_f64(secs)
            .ok()
            .filter(|t| !t.is_zero())
            .with_context(|| format!("--timeout must be a positive number of seconds, got {secs}"))?;
        cmd = cmd.timeout(timeout);
    }
    if !opts.ok_codes.is_empty() {
        cmd = cmd.success_codes(opts.ok_codes.iter().copied());
    }
    if let Some(prompt) = &opts.echo_prompt {
        cmd = cmd.echo_prompt(prompt.clone());
    }
    if let Some(path) = &opts.stdin_file {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("open stdin file '{}'", path.display()))?;
        cmd = cmd.stdin(InputSource::reader(file));
    }
    if let Some(policy) = opts.policy {
        cmd = cmd.cancellation_policy(policy);
    }
    if !opts.quiet && !opts.json {
        cmd = cmd.echo();
    }
    Ok(cmd)
}

/// Map a run outcome to the process exit status and what to print.
///
/// Only a failure to launch at all is returned as an error.
pub fn settle(outcome: Result<ExecutionResult, ProcessError>) -> Result<(i32, ExecutionResult)> {
    match outcome {
        Ok(result) => Ok((result.exit_code, result)),
        Err(ProcessError::NonZeroExit {
            exit_code, output, ..
        }) => Ok((exit_code, ExecutionResult::new(exit_code, output))),
        Err(err) if err.is_cancellation() => {
            warn!(target: "runcx.cli", "{err}");
            let output = err.output().unwrap_or_default().to_string();
            Ok((KILLED_EXIT_CODE, ExecutionResult::new(KILLED_EXIT_CODE, output)))
        }
        Err(err) => Err(err).context("run command"),
    }
}

/// `runcx run`: returns the exit status to leave with.
pub async fn cmd_run(opts: RunOptions, config: RunConfig) -> Result<i32> {
    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!(target: "runcx.cli", "interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let cmd = build_cmd(&opts, &config, cancel).await?;
    debug!(target: "runcx.cli", command = %cmd.command_line(), "launching");
    let (code, result) = settle(cmd.run().await)?;

    if opts.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("serialize result")?
        );
    }
    Ok(code)
}

/// `runcx quote`: the arguments rendered as one command line.
pub fn quote_line(args: &[String]) -> Result<String> {
    let Some((program, rest)) = args.split_first() else {
        bail!("quote needs at least one argument");
    };
    Ok(join_args(program, rest))
}

/// `runcx schema`: JSON schema of the configuration file.
pub fn schema_json() -> Result<String> {
    let value = serde_json::to_value(schema_for!(RunConfig))?;
    serde_json::to_string_pretty(&value).context("serialize schema")
}
