//! scm-bridge - check out git sources for the build service
//!
//! Usage:
//!   scm-bridge --url <SPEC> --outdir <DIR>                    # working tree
//!   scm-bridge --url <SPEC> --outdir <DIR> --projectmode 1    # package metadata

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scm_bridge_core::prelude::*;

#[derive(Parser)]
#[command(name = "scm-bridge")]
#[command(about = "Check out a git source at an exact commit for the build service", long_about = None)]
struct Cli {
    /// Source specification: <url>[?lfs=0|1][#ref]
    #[arg(long, value_name = "SPEC")]
    url: String,

    /// Output directory; must be absent or empty
    #[arg(long, value_name = "DIR")]
    outdir: PathBuf,

    /// Write package metadata for the repository and its submodules
    #[arg(
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    projectmode: bool,

    /// Verbose logging
    #[arg(
        long,
        value_name = "BOOL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    debug: bool,

    /// Configuration file (default: <config dir>/scm-bridge/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Abort the invocation after this many seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Worker threads for writing package metadata
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    jobs: Option<u32>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.debug {
        "scm_bridge=debug,warn"
    } else {
        "scm_bridge=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<BridgeError>()
                .map_or(1, BridgeError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let spec = SourceSpec::parse(&cli.url)?;
    let config = BridgeConfig::load_or_default(cli.config.as_deref())?;

    let mut ctx = BridgeContext::from_config(&config);
    if let Some(secs) = cli.timeout {
        ctx = ctx.with_timeout(Some(Duration::from_secs(secs)));
    }
    if let Some(jobs) = cli.jobs {
        ctx = ctx.with_workers(jobs as usize);
    }

    let request = BridgeRequest::new(
        spec,
        cli.outdir,
        OutputMode::from_project_flag(cli.projectmode),
    );
    let outcome = Bridge::new(ctx)
        .run(&request)
        .with_context(|| format!("failed to bridge {}", request.spec))?;

    match outcome {
        BridgeOutcome::Flat {
            head_commit,
            tree_digest,
        } => info!(
            commit = %head_commit,
            digest = %tree_digest,
            out_dir = %request.out_dir.display(),
            "checkout complete"
        ),
        BridgeOutcome::Project { packages } => info!(
            packages = packages.len(),
            out_dir = %request.out_dir.display(),
            "package metadata complete"
        ),
    }
    Ok(())
}
