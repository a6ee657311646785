use anyhow::Result;
use cadenza_core::Compatibility;
use cadenza_select::Config;

use super::load_corpus;

pub fn show_status(config: &Config) -> Result<()> {
    let corpus = load_corpus(config)?;
    let enriched = corpus.songs().iter().filter(|s| s.is_enriched()).count();

    println!("\n📊 Cadenza Status\n");
    println!("  Index: {}", config.index_path.display());
    println!("  Songs: {}", corpus.len());
    println!("  Enriched (themes and mood): {enriched}");
    println!("  Dimension: {}", corpus.dimension());
    match corpus.info() {
        Some(info) => println!("  Built with: {} ({})", info.embed_model, info.dimension),
        None => println!("  Built with: <not recorded>"),
    }
    println!(
        "  Query model: {} ({})",
        config.embed_model, config.embed_dimension
    );
    println!("  Primary model: {}", config.primary_model);
    println!("  Fallback models: {}", config.fallback_models.join(", "));

    match corpus.compatibility(&config.embed_model, config.embed_dimension) {
        Compatibility::Compatible => {}
        Compatibility::Unrecorded => {
            println!("\n  The index does not record its embedding model.");
            println!("  Rebuild it if search results look unrelated to the query.");
        }
        Compatibility::Stale { .. } => {
            println!("\n⚠ The index was built with a different embedding model.");
            println!("  Semantic search results will be unreliable until it is rebuilt.");
        }
    }

    if enriched < corpus.len() {
        println!("\n  Run `cadenza enrich` to add themes and mood to the rest");
    }

    Ok(())
}
