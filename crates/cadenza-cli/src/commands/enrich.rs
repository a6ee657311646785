use anyhow::{Context, Result};
use cadenza_select::{Config, SongEnricher};

use super::{gemini_client, load_corpus, model_invoker};

pub async fn run_enrich(config: &Config, limit: Option<usize>, dry_run: bool) -> Result<()> {
    log::info!("Starting enrichment");

    let corpus = load_corpus(config)?;
    let pending = corpus.songs().iter().filter(|s| !s.is_enriched()).count();

    if pending == 0 {
        println!("All {} songs already have themes and mood.", corpus.len());
        return Ok(());
    }

    let target = limit.map_or(pending, |limit| limit.min(pending));
    println!(
        "{pending} of {} songs lack themes or mood; enriching {target}",
        corpus.len()
    );

    if dry_run {
        for song in corpus.songs().iter().filter(|s| !s.is_enriched()).take(target) {
            println!("  - {}", song.display_title());
        }
        return Ok(());
    }

    let invoker = model_invoker(config, gemini_client(config)?);
    let mut songs = corpus.songs().to_vec();
    let summary = SongEnricher::new(&invoker).enrich(&mut songs, limit).await;

    if summary.enriched > 0 {
        corpus
            .with_songs(songs)?
            .to_index_file()?
            .save(&config.index_path)
            .with_context(|| format!("Failed to save index {}", config.index_path.display()))?;
    }

    println!("\n✓ Enrichment complete");
    println!("  Enriched: {}", summary.enriched);
    println!("  Failed: {}", summary.failed);
    println!("  Already enriched: {}", summary.skipped);
    if summary.enriched > 0 {
        println!("  Saved to {}", config.index_path.display());
    }

    Ok(())
}
