//! Quarry Command-Line Tool
//!
//! Runs filter/sort/page queries over a JSON data file, prints their
//! document-store form, or checks filter expressions against the data's
//! inferred shape.

mod commands;
mod error;
mod formatter;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{CheckArgs, QueryArgs, SelectionArgs};
use error::CliError;

/// Quarry Command-Line Tool
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(version, about = "Query, translate and check filters over JSON data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a paged query and print the matching records
    Query(QueryArgs),
    /// Print the document filter, sort and window for a query
    Translate(SelectionArgs),
    /// Compile filter expressions without running them
    Check(CheckArgs),
}

impl Cli {
    /// Parse arguments, keeping the relative order of sort flags.
    fn from_matches(matches: &clap::ArgMatches) -> Result<Self, clap::Error> {
        let mut cli = Cli::from_arg_matches(matches)?;
        if let Some((_, sub)) = matches.subcommand() {
            match &mut cli.command {
                Command::Query(args) => args.selection.resolve_sort(sub),
                Command::Translate(args) => args.resolve_sort(sub),
                Command::Check(_) => {}
            }
        }
        Ok(cli)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quarry=info")),
        )
        .init();

    let matches = Cli::command().get_matches();
    let cli = match Cli::from_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    match run(cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<String, CliError> {
    match cli.command {
        Command::Query(args) => commands::run_query(&args),
        Command::Translate(args) => commands::run_translate(&args),
        Command::Check(args) => commands::run_check(&args),
    }
}
