use std::sync::Arc;

use anyhow::{Context, Result};
use cadenza_core::Corpus;
use cadenza_search::SongIndex;
use cadenza_select::{Config, FinderOptions, GeminiClient, ModelInvoker, SongFinder};

pub mod config;
pub mod enrich;
pub mod models;
pub mod search;
pub mod select;
pub mod status;

pub use enrich::run_enrich;
pub use models::list_models;
pub use search::{run_search, SearchArgs, SearchMode};
pub use select::{run_batch, run_select};
pub use status::show_status;

/// Gemini client for the configured key and embedding model.
fn gemini_client(config: &Config) -> Result<Arc<GeminiClient>> {
    let client = GeminiClient::new(config.require_api_key()?)
        .context("Failed to create HTTP client")?
        .with_embed_model(&config.embed_model)
        .with_embed_backoff(config.backoff());
    Ok(Arc::new(client))
}

fn model_invoker(config: &Config, client: Arc<GeminiClient>) -> ModelInvoker {
    ModelInvoker::new(
        client,
        &config.primary_model,
        config.fallback_models.clone(),
    )
    .with_backoff(config.backoff())
    .with_sweeps(config.retry_sweeps)
}

fn load_corpus(config: &Config) -> Result<Corpus> {
    Corpus::load(&config.index_path)
        .with_context(|| format!("Failed to load index {}", config.index_path.display()))
}

/// Load the index and wire it to the configured models.
fn open_finder(config: &Config) -> Result<SongFinder> {
    let client = gemini_client(config)?;
    let index = SongIndex::build(load_corpus(config)?).context("Failed to build search index")?;
    let invoker = model_invoker(config, Arc::clone(&client));
    let finder = SongFinder::new(index, client, invoker, FinderOptions::from_config(config))?;
    Ok(finder)
}
