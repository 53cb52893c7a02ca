pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use crate::commands::ask::AskArgs;
use crate::commands::seed::SeedSource;

#[derive(Debug, Parser)]
#[command(
    name = "propmatch",
    about = "PropMatch operator CLI",
    long_about = "Inspect configuration, manage the inventory database, and run one-off search turns.",
    after_help = "Examples:\n  propmatch seed --demo\n  propmatch ask --conversation demo-1 \"2BHK in Yelahanka under 1.5 crore\"\n  propmatch config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Replace the inventory tables with the demo inventory or a JSON file")]
    Seed(SeedArgs),
    #[command(about = "Run one search turn and print the JSON response")]
    Ask(AskCommand),
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct SeedArgs {
    #[arg(long, help = "Load the built-in Bangalore demo inventory")]
    demo: bool,
    #[arg(long, value_name = "PATH", help = "Load a JSON array of projects")]
    file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct AskCommand {
    #[arg(long, value_name = "ID", help = "Conversation id; reuse it to continue a conversation")]
    conversation: String,
    #[arg(long, value_name = "JSON", help = "Explicit filters, e.g. '{\"bedrooms\": 2}'")]
    filters: Option<String>,
    #[arg(help = "Free-text query")]
    query: Vec<String>,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed(args) => {
            let source = match args.file {
                Some(path) => SeedSource::File(path),
                None => SeedSource::Demo,
            };
            commands::seed::run(source)
        }
        Command::Ask(args) => commands::ask::run(AskArgs {
            conversation_id: args.conversation,
            query: args.query.join(" "),
            filters_json: args.filters,
        }),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Diagnostics go to stderr so stdout stays one JSON line per command.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PROPMATCH_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .compact()
        .try_init();
}
