//! # CLI Layer
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Decides the exit code
//! - Installs the tracing subscriber
//!
//! ## Flow
//!
//! 1. Parse arguments with clap ([`super::setup`])
//! 2. Set up logging: `RUST_LOG` wins, otherwise `warn`, or `debug` with `-v`
//! 3. Open the store in the data directory and build the API
//! 4. Dispatch ([`super::handlers`]) on a tokio runtime
//! 5. Render the `CmdResult` ([`super::render`]) or print it as JSON

use anyhow::Context;
use clap::Parser;
use shelterapp::api::ShelterApi;
use shelterapp::config::default_data_dir;
use tracing_subscriber::EnvFilter;

use super::handlers;
use super::render;
use super::setup::{Cli, Commands};

pub fn run() -> anyhow::Result<()> {
    let Cli {
        command,
        data,
        verbose,
        json,
    } = Cli::parse();
    init_logging(verbose);

    let data_dir = match data {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    tracing::debug!(data_dir = %data_dir.display(), "opening store");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let listing = matches!(command, Commands::Residents { .. });
    let result = runtime.block_on(async {
        let mut api = ShelterApi::open(&data_dir)?;
        handlers::dispatch(&mut api, command).await
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render::render_result(&result, listing));
    }

    if result.has_errors() {
        anyhow::bail!("finished with errors");
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
