// SPDX-FileCopyrightText: 2026 WOTP Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WOTP - WhatsApp OTP and transactional message session manager.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;
mod sessions;
mod show_config;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// WOTP - WhatsApp OTP and transactional message session manager.
#[derive(Parser, Debug)]
#[command(name = "wotp", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run supervisor, workers and the HTTP gateway until SIGINT/SIGTERM.
    Serve,
    /// List persisted WhatsApp sessions.
    Sessions {
        /// Only sessions of this account.
        #[arg(long)]
        account: Option<String>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => wotp_config::load_and_validate_path(path),
        None => wotp_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            wotp_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Sessions {
            account,
            json,
            plain,
        }) => sessions::run_sessions(&config, account.as_deref(), json, plain).await,
        Some(Commands::Config) => show_config::run_config(&config),
        None => {
            println!("wotp: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
