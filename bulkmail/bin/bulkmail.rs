#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

use std::{path::PathBuf, process::ExitCode};

use bulkmail::controller::{Bulkmail, Failure, Options};
use bulkmail_common::{logging, tracing};
use clap::Parser;

/// Send one personalised email, with attachments, per recipient group
#[derive(Parser, Debug)]
#[command(name = "bulkmail")]
#[command(about = "Send personalised bulk email", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    configuration: PathBuf,

    /// Path to the unit manifest listing recipient groups and attachments
    #[arg(short, long)]
    units: PathBuf,

    /// Password of the mail account
    #[arg(short, long, env = "BULKMAIL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Start with the first unit of this group, skipping those before it
    #[arg(short, long)]
    group_id: Option<String>,

    /// Show the emails instead of sending them
    #[arg(short, long)]
    simulate: bool,
}

impl From<Cli> for Options {
    fn from(cli: Cli) -> Self {
        Self {
            configuration: cli.configuration,
            units: cli.units,
            password: cli.password,
            group_id: cli.group_id,
            simulate: cli.simulate,
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let bulkmail = Bulkmail::load(cli.into())?;
    if let Some(summary) = bulkmail.run()? {
        tracing::info!(sent = summary.sent, possible = summary.possible, "Run complete");
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(failure = ?Failure::of(&error), "{error:#}");
            eprintln!("Application stopped after failure and is unable to proceed. {error}");
            if let Some(cause) = error.chain().nth(1) {
                eprintln!("{cause}");
            }
            ExitCode::FAILURE
        }
    }
}
