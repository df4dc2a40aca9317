//! Ratchet CLI - run competitor programs against a game authority.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

/// Ratchet - a metered sandbox for remote-controlled game bots
#[derive(Parser, Debug)]
#[command(name = "ratchet")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to the game authority and play one session
    Play {
        /// Team A bot name, or "/" for no program
        #[arg(long)]
        team_a: String,

        /// Team B bot name, or "/" for no program
        #[arg(long)]
        team_b: String,

        /// Directory holding team A's bot
        #[arg(long, default_value = ".")]
        dir_a: PathBuf,

        /// Directory holding team B's bot
        #[arg(long, default_value = ".")]
        dir_b: PathBuf,

        /// Authority host (default: 127.0.0.1)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Authority port (default: 27185)
        #[arg(short, long)]
        port: Option<u16>,

        /// Budget per turn (default: 20000)
        #[arg(short, long)]
        bytecode_limit: Option<i64>,

        /// Log every event
        #[arg(short, long)]
        debug: bool,
    },

    /// Assemble and instrument a bot directory
    Validate {
        /// Bot directory to validate
        #[arg(required = true)]
        bot: PathBuf,
    },

    /// Print the listing of one source file
    Disasm {
        /// Source file (.rasm)
        #[arg(required = true)]
        file: PathBuf,

        /// Show the metered form
        #[arg(short, long)]
        instrumented: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let result = match args.command {
        Commands::Play {
            team_a,
            team_b,
            dir_a,
            dir_b,
            host,
            port,
            bytecode_limit,
            debug,
        } => {
            cli::init_logging(debug);
            let teams = [(team_a, dir_a), (team_b, dir_b)];
            cli::play::execute(&teams, host, port, bytecode_limit, debug)
        }

        Commands::Validate { bot } => {
            cli::init_logging(false);
            cli::validate::execute(&bot)
        }

        Commands::Disasm { file, instrumented } => cli::disasm::execute(&file, instrumented),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
