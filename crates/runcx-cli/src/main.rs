// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use runcx_cli::commands::{self, RunOptions};
use runcx_process::CancellationPolicy;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "runcx", version, about = "Run a process with live echo, capture and cancellation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// TOML file with launch defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command and exit with its exit code.
    Run {
        /// Working directory for the command.
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Environment variable as KEY=VALUE. Can be repeated.
        #[arg(long)]
        env: Vec<String>,

        /// Environment variable to remove. Can be repeated.
        #[arg(long)]
        unset: Vec<String>,

        /// Kill the command after this many seconds.
        #[arg(long)]
        timeout: Option<f64>,

        /// Exit code that counts as success. Can be repeated; defaults to 0.
        #[arg(long = "ok-code", allow_negative_numbers = true)]
        ok_codes: Vec<i32>,

        /// Do not echo the command's output while it runs.
        #[arg(long)]
        quiet: bool,

        /// Echo the command line with this prefix before running it.
        #[arg(long)]
        echo_prompt: Option<String>,

        /// Feed this file to the command's stdin.
        #[arg(long)]
        stdin_file: Option<PathBuf>,

        /// How a kill caused by timeout or Ctrl-C is reported.
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,

        /// Print the result as JSON instead of echoing output.
        #[arg(long)]
        json: bool,

        /// Command followed by its arguments.
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Print the arguments as one quoted command line.
    Quote {
        /// Program followed by its arguments.
        #[arg(required = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the JSON schema of the config file.
    Schema,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    KillOnly,
    Convert,
}

impl From<PolicyArg> for CancellationPolicy {
    fn from(v: PolicyArg) -> Self {
        match v {
            PolicyArg::KillOnly => CancellationPolicy::KillOnly,
            PolicyArg::Convert => CancellationPolicy::ConvertToCancelled,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = commands::load_run_config(cli.config.as_deref())?;

    let default_filter = if cli.debug {
        "runcx=debug".to_string()
    } else {
        format!("runcx={}", config.log_level.as_deref().unwrap_or("info"))
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            cwd,
            env,
            unset,
            timeout,
            ok_codes,
            quiet,
            echo_prompt,
            stdin_file,
            policy,
            json,
            command,
        } => {
            let opts = RunOptions {
                command,
                cwd,
                env,
                unset,
                timeout_secs: timeout,
                ok_codes,
                quiet,
                echo_prompt,
                stdin_file,
                policy: policy.map(Into::into),
                json,
            };
            let code = commands::cmd_run(opts, config).await?;
            Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
        }
        Commands::Quote { args } => {
            println!("{}", commands::quote_line(&args)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Schema => {
            println!("{}", commands::schema_json()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
