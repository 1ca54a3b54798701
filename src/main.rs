// Copyright 2026 Portalta Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use portalta::cli;
use portalta::model::RecordKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "portalta",
    about = "Portalta — personnel and remuneration records from the Chilean transparency portal",
    version,
    after_help = "Run 'portalta <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire one section for an organism and period
    Fetch {
        /// Organism code, e.g. "MU280"
        organism: String,
        /// Reporting area within the organism
        #[arg(long, default_value = "Salud")]
        area: String,
        #[arg(long)]
        year: i32,
        /// Month 1-12; omit for yearly sections like salary scales
        #[arg(long)]
        month: Option<u32>,
        /// Section: planta, contrata, honorarios, escalas
        #[arg(long, default_value = "honorarios")]
        kind: RecordKind,
        /// Override the portal base URL
        #[arg(long)]
        base_url: Option<String>,
        /// Write the full result JSON to this file
        #[arg(long)]
        out: Option<PathBuf>,
        /// Skip raw payload capture
        #[arg(long)]
        no_capture: bool,
    },
    /// List candidate sources for a request without extracting
    Discover {
        /// Organism code, e.g. "MU280"
        organism: String,
        #[arg(long, default_value = "Salud")]
        area: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: Option<u32>,
        #[arg(long, default_value = "honorarios")]
        kind: RecordKind,
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "portalta=debug" } else { "portalta=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Fetch {
            organism,
            area,
            year,
            month,
            kind,
            base_url,
            out,
            no_capture,
        } => {
            cli::fetch_cmd::run(
                &organism,
                &area,
                year,
                month,
                kind,
                base_url.as_deref(),
                out.as_ref(),
                no_capture,
                cli.json,
            )
            .await
        }
        Commands::Discover {
            organism,
            area,
            year,
            month,
            kind,
            base_url,
        } => {
            cli::discover_cmd::run(
                &organism,
                &area,
                year,
                month,
                kind,
                base_url.as_deref(),
                cli.json,
            )
            .await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "portalta", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    result
}
