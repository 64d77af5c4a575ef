pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "liquida",
    about = "Liquida campaign settlement CLI",
    long_about = "Reconcile a campaign's theoretical lot income against its gross income and emit final prices.",
    after_help = "Examples:\n  liquida validate --input bundle.json\n  liquida settle --input bundle.json --output settlement.json\n  liquida config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the full settlement and return the reconciliation outcome")]
    Settle {
        #[arg(long, help = "JSON input bundle with lots, calibre map, prices and certification")]
        input: PathBuf,
        #[arg(long, help = "Write the full settlement outcome to this file")]
        output: Option<PathBuf>,
        #[arg(long, help = "Config file (defaults to liquida.toml or config/liquida.toml)")]
        config: Option<PathBuf>,
    },
    #[command(about = "Run every pre-settlement check without reconciling")]
    Validate {
        #[arg(long, help = "JSON input bundle to check")]
        input: PathBuf,
        #[arg(long, help = "Config file (defaults to liquida.toml or config/liquida.toml)")]
        config: Option<PathBuf>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config {
        #[arg(long, help = "Config file to inspect")]
        config: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Settle { input, output, config } => {
            commands::settle::run(&input, output.as_deref(), config.as_deref())
        }
        Command::Validate { input, config } => {
            commands::validate::run(&input, config.as_deref())
        }
        Command::Config { config } => commands::config::run(config.as_deref()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
