mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use groundcite::{IndexBackend, LexicalOrdering};

#[derive(Parser)]
#[command(name = "groundcite-cli", about = "Ground extracted claims in OCR line positions", version)]
struct Cli {
    /// Similarity backend (overrides GROUNDCITE_INDEX_BACKEND)
    #[arg(long, global = true)]
    backend: Option<IndexBackend>,

    /// Lexical ranking: shared_tokens or store_order
    #[arg(long, global = true)]
    ordering: Option<LexicalOrdering>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ground the claims of a request file and print the citations
    Ground {
        /// Request JSON file ("-" reads stdin)
        request: PathBuf,
        /// Comma-separated codes to keep (overrides the request's code_filter)
        #[arg(long)]
        codes: Option<String>,
    },

    /// Ground the built-in sample note
    Demo {
        /// Comma-separated codes to keep
        #[arg(long)]
        codes: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    groundcite::init_tracing();

    let cli = Cli::parse();
    tracing::debug!("{} v{}", groundcite::config::APP_NAME, groundcite::config::APP_VERSION);

    let config = commands::load_config(cli.backend, cli.ordering)?;
    let resolver = commands::build_resolver(&config);

    let citations = match cli.command {
        Command::Ground { request, codes } => {
            let raw = commands::read_request(&request)?;
            commands::run_ground(&resolver, &raw, codes.as_deref())?
        }
        Command::Demo { codes } => commands::run_demo(&resolver, codes.as_deref())?,
    };

    println!("{}", serde_json::to_string_pretty(&citations)?);
    Ok(())
}
