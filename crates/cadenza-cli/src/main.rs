use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use cadenza_select::Config;

mod commands;

use commands::{SearchArgs, SearchMode};

#[derive(Debug, Parser)]
#[command(name = "cadenza", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the index sidecar (default: ~/.local/share/cadenza/songs_metadata.json)
    #[arg(long, global = true)]
    index: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Search the song index
    ///
    /// Hybrid mode blends nearest-neighbour distance over the lyric
    /// embeddings with keyword coverage over titles, lyrics, themes and
    /// mood, so that a literal quote outranks a loose paraphrase. Every
    /// result carries a match percentage relative to the best result of
    /// the same query.
    ///
    /// Filters (--language, --mood, --artist) restrict a semantic search.
    Search {
        /// The phrase to search for
        query: String,

        /// Number of results
        #[arg(short = 'k', long)]
        limit: Option<usize>,

        /// Retrieval mode
        #[arg(long, value_enum, default_value_t = SearchMode::Hybrid)]
        mode: SearchMode,

        /// Only songs in this language
        #[arg(long)]
        language: Option<String>,

        /// Only songs carrying one of these moods (repeatable)
        #[arg(long = "mood")]
        moods: Vec<String>,

        /// Only songs by this artist (case-insensitive)
        #[arg(long)]
        artist: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search, then let the model pick the single best song
    ///
    /// The top candidates are shown to the primary generation model. When
    /// it is overloaded or unavailable the fallback models are tried in
    /// order, with exponential backoff between retries. If no model can
    /// answer, the candidates are still printed.
    Select {
        /// The phrase to find a song for
        query: String,

        /// Number of candidates shown to the model
        #[arg(short = 'k', long)]
        limit: Option<usize>,

        /// Weight of semantic similarity in the ranking
        #[arg(long)]
        semantic_weight: Option<f32>,

        /// Weight of keyword coverage in the ranking
        #[arg(long)]
        keyword_weight: Option<f32>,

        /// Ask the model to rephrase the query before searching
        #[arg(long)]
        enhance: bool,

        /// Print the selection report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Select songs for many queries at once
    Batch {
        /// Queries to process
        queries: Vec<String>,

        /// Read additional queries from a file, one per line
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print the selection reports as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Show index and model status
    Status,
    /// Fill in missing themes and mood with the generation model
    Enrich {
        /// Enrich at most this many songs
        #[arg(long)]
        limit: Option<usize>,

        /// Show what would be enriched without calling the model
        #[arg(long)]
        dry_run: bool,
    },
    /// List the generation and embedding models available to the configured API key
    Models,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a config value, or print the whole config file
    Get {
        /// Config key
        key: Option<String>,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Value to set
        value: String,
    },
    /// Show config file path
    Path,
    /// Show example configuration
    Example,
    /// Initialize config file with defaults
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.index {
        Some(path) => Config::load_with_index_path(path)?,
        None => Config::load()?,
    };

    twyg::setup(config.logging.clone())
        .map_err(|e| anyhow::anyhow!("Failed to set up logging: {e}"))?;

    match cli.command {
        Commands::Search {
            query,
            limit,
            mode,
            language,
            moods,
            artist,
            json,
        } => {
            let args = SearchArgs {
                query,
                limit,
                mode,
                language,
                moods,
                artist,
                json,
            };
            commands::run_search(&config, args).await?;
        }
        Commands::Select {
            query,
            limit,
            semantic_weight,
            keyword_weight,
            enhance,
            json,
        } => {
            if let Some(weight) = semantic_weight {
                config.semantic_weight = weight;
            }
            if let Some(weight) = keyword_weight {
                config.keyword_weight = weight;
            }
            if let Some(limit) = limit {
                config.top_k = limit;
            }
            config.enhance_query |= enhance;
            commands::run_select(&config, &query, json).await?;
        }
        Commands::Batch {
            queries,
            file,
            json,
        } => {
            commands::run_batch(&config, queries, file, json).await?;
        }
        Commands::Status => {
            commands::show_status(&config)?;
        }
        Commands::Enrich { limit, dry_run } => {
            commands::run_enrich(&config, limit, dry_run).await?;
        }
        Commands::Models => {
            commands::list_models(&config).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config)?,
            ConfigAction::Get { key } => commands::config::get_config(&config, key)?,
            ConfigAction::Set { key, value } => commands::config::set_config(&key, &value)?,
            ConfigAction::Path => commands::config::show_path(),
            ConfigAction::Example => commands::config::show_example(),
            ConfigAction::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}
