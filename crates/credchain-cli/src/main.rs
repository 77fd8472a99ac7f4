//! credchain - credential helper chain CLI

use clap::{Parser, Subcommand};
use credchain_cli::commands;
use credchain_cli::prompt::{terminal_prompt_disabled, TerminalPrompter};
use credchain_config::GlobalConfig;
use credchain_core::Resolver;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "credchain")]
#[command(author, version, about = "Credential helper chain", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra helper appended to the configured chain (repeatable)
    #[arg(long = "helper", value_name = "SPEC", global = true)]
    helpers: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a credential description on stdin and print the filled credential
    Fill,

    /// Tell the helpers that the credential on stdin worked
    Approve,

    /// Tell the helpers that the credential on stdin failed
    Reject,

    /// Show the config file and the helper chain
    Config {
        /// Show the chain that applies to this URL
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the helper protocol, so logs go to stderr
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = GlobalConfig::load()?;
    if terminal_prompt_disabled() {
        config.credential.interactive = false;
    }

    let resolver = Resolver::from_config(&config.credential, Box::new(TerminalPrompter));
    let stdin = std::io::stdin();
    let mut input = stdin.lock();

    match cli.command {
        Commands::Fill => {
            let mut output = std::io::stdout().lock();
            commands::fill(&resolver, &config.credential, &cli.helpers, &mut input, &mut output)
                .await?;
        }
        Commands::Approve => {
            commands::approve(&resolver, &config.credential, &cli.helpers, &mut input).await?;
        }
        Commands::Reject => {
            commands::reject(&resolver, &config.credential, &cli.helpers, &mut input).await?;
        }
        Commands::Config { url } => {
            let mut output = std::io::stdout().lock();
            commands::config(&config, url.as_deref(), &cli.helpers, &mut output)?;
        }
    }

    Ok(())
}
