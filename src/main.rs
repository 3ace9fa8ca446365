mod build;
mod commands;
mod config;
mod describe;
mod error;
mod graph;
mod logging;
mod paths;
mod remote;
mod repo;
mod store;
#[cfg(test)]
mod test_helpers;
mod types;
mod units;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "srcref", about = "Describe and list code references from built source unit graphs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Log debug diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ensure artifacts for the current commit are built
    Build {
        /// Directory inside the repository
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Show the definition referenced at a byte offset
    Describe {
        /// Source file containing the reference
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        /// Don't fetch usage examples from the remote service
        #[arg(long)]
        no_examples: bool,
        /// Byte offset of the cursor
        #[arg(long, value_name = "BYTE")]
        start_byte: u32,
    },
    /// List all references in a file
    List {
        /// Source file to list references of
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
    /// List the source units that contain a file
    Units {
        /// Source file to look up
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Build { dir } => commands::build(&dir),
        Commands::Describe { file, no_examples, start_byte } => {
            commands::describe(&file, start_byte, no_examples).await
        },
        Commands::List { file } => commands::list(&file),
        Commands::Units { file } => commands::units(&file),
    };

    return match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        },
    };
}
