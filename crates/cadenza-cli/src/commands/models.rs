use anyhow::Result;
use cadenza_select::gemini::ModelInfo;
use cadenza_select::Config;

use super::gemini_client;

const GENERATE_METHOD: &str = "generateContent";
const EMBED_METHOD: &str = "embedContent";

/// Configured models that the key cannot use for `method`.
fn unavailable<'a>(configured: &[&'a str], models: &[ModelInfo], method: &str) -> Vec<&'a str> {
    configured
        .iter()
        .copied()
        .filter(|name| !models.iter().any(|m| m.id() == *name && m.supports(method)))
        .collect()
}

fn print_section(models: &[ModelInfo], method: &str, configured: &[&str]) {
    println!("\nModels supporting {method}:\n");
    let mut found = 0;
    for model in models.iter().filter(|m| m.supports(method)) {
        found += 1;
        let marker = if configured.contains(&model.id()) { "*" } else { " " };
        println!("  {marker} {:<32} {}", model.id(), model.display_name);
    }
    if found == 0 {
        println!("  (none)");
    }
}

/// List the generation and embedding models, marking the configured ones.
pub async fn list_models(config: &Config) -> Result<()> {
    let client = gemini_client(config)?;
    let models = client.list_models().await?;

    let generation: Vec<&str> = std::iter::once(config.primary_model.as_str())
        .chain(config.fallback_models.iter().map(String::as_str))
        .collect();
    let embedding = [config.embed_model.as_str()];

    print_section(&models, GENERATE_METHOD, &generation);
    print_section(&models, EMBED_METHOD, &embedding);
    println!("\n  * configured in cadenza");

    for name in unavailable(&generation, &models, GENERATE_METHOD) {
        println!("\n⚠ Configured model {name} is not available to this key");
    }
    for name in unavailable(&embedding, &models, EMBED_METHOD) {
        println!("\n⚠ Embedding model {name} is not available to this key");
        println!("  Queries cannot be embedded; the index needs a model this key can reach.");
    }

    Ok(())
}
