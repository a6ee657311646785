use anyhow::{Context, Result};
use cadenza_select::{config, Config};
use toml_edit::{value, Array, DocumentMut, Item};

/// Keys accepted by `config get` and `config set`.
const KEYS: &[&str] = &[
    "google_api_key",
    "index_path",
    "embed_model",
    "embed_dimension",
    "primary_model",
    "fallback_models",
    "max_retries",
    "base_delay_ms",
    "backoff_factor",
    "retry_sweeps",
    "temperature",
    "semantic_weight",
    "keyword_weight",
    "top_k",
    "enhance_query",
    "cache_capacity",
    "batch_concurrency",
];

/// Mask all but the last four characters of a secret.
fn masked(secret: Option<&str>) -> String {
    match secret {
        None => "<not set>".to_string(),
        Some(secret) if secret.chars().count() <= 4 => "****".to_string(),
        Some(secret) => {
            let tail: String = secret
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("****{tail}")
        }
    }
}

/// The effective value of `key`, as printed by `config get`.
fn lookup(config: &Config, key: &str) -> Option<String> {
    let value = match key {
        "google_api_key" => masked(config.google_api_key.as_deref()),
        "index_path" => config.index_path.display().to_string(),
        "embed_model" => config.embed_model.clone(),
        "embed_dimension" => config.embed_dimension.to_string(),
        "primary_model" => config.primary_model.clone(),
        "fallback_models" => config.fallback_models.join(", "),
        "max_retries" => config.max_retries.to_string(),
        "base_delay_ms" => config.base_delay_ms.to_string(),
        "backoff_factor" => config.backoff_factor.to_string(),
        "retry_sweeps" => config.retry_sweeps.to_string(),
        "temperature" => config.temperature.to_string(),
        "semantic_weight" => config.semantic_weight.to_string(),
        "keyword_weight" => config.keyword_weight.to_string(),
        "top_k" => config.top_k.to_string(),
        "enhance_query" => config.enhance_query.to_string(),
        "cache_capacity" => config.cache_capacity.to_string(),
        "batch_concurrency" => config.batch_concurrency.to_string(),
        _ => return None,
    };
    Some(value)
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Unknown config key: {}\n\nValid keys: {}",
        key,
        KEYS.join(", ")
    )
}

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config::config_file_path().display());

    let exists = config::config_file_path().exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    for key in KEYS {
        let value = lookup(config, key).ok_or_else(|| unknown_key(key))?;
        println!("  {key}: {value}");
    }
    println!("  logging.level: {:?}", config.logging.level());
    println!("  logging.coloured: {}", config.logging.coloured());
    println!("  logging.output: {:?}", config.logging.output());

    println!("\nPriority: CLI args > ENV vars (CADENZA_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value.
pub fn get_config(config: &Config, key: Option<String>) -> Result<()> {
    if let Some(key) = key {
        let value = lookup(config, &key).ok_or_else(|| unknown_key(&key))?;
        println!("{value}");
    } else {
        // No key provided, show entire config file contents
        let config_path = config::config_file_path();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            print!("{contents}");
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'cadenza config init' to create it.");
        }
    }

    Ok(())
}

/// Convert a command-line value into a TOML item of the key's type.
fn typed_value(key: &str, raw: &str) -> Result<Item> {
    let invalid = |kind: &str| anyhow::anyhow!("{key} expects {kind}, got {raw:?}");
    let item = match key {
        "google_api_key" | "index_path" | "embed_model" | "primary_model" => value(raw),
        "fallback_models" => {
            let models: Array = raw
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .collect();
            value(models)
        }
        "embed_dimension" | "max_retries" | "base_delay_ms" | "retry_sweeps" | "top_k"
        | "cache_capacity" | "batch_concurrency" => {
            let n: i64 = raw.parse().map_err(|_| invalid("a non-negative integer"))?;
            if n < 0 {
                return Err(invalid("a non-negative integer"));
            }
            value(n)
        }
        "backoff_factor" | "temperature" | "semantic_weight" | "keyword_weight" => {
            let x: f64 = raw.parse().map_err(|_| invalid("a number"))?;
            value(x)
        }
        "enhance_query" => {
            let b: bool = raw.parse().map_err(|_| invalid("true or false"))?;
            value(b)
        }
        _ => return Err(unknown_key(key)),
    };
    Ok(item)
}

/// Set `key` in a config document, keeping comments and layout intact.
pub(crate) fn update_document(contents: &str, key: &str, raw: &str) -> Result<String> {
    let item = typed_value(key, raw)?;
    let mut doc: DocumentMut = contents
        .parse()
        .context("Config file is not valid TOML")?;
    doc[key] = item;
    Ok(doc.to_string())
}

/// Set a config value.
pub fn set_config(key: &str, value: &str) -> Result<()> {
    let config_path = config::config_file_path();

    // Ensure config file exists
    config::ensure_config_file()?;

    let contents = std::fs::read_to_string(&config_path)
        .context("Failed to read config file")?;
    let updated = update_document(&contents, key, value)?;

    std::fs::write(&config_path, updated)
        .context("Failed to write config file")?;

    println!("✓ Updated {key} = {value}");
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() {
    println!("{}", config::config_file_path().display());
}

/// Show example configuration.
pub fn show_example() {
    print!("{}", config::example_config());
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure cadenza.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_has_a_value() {
        let config = Config::default();
        for key in KEYS {
            assert!(lookup(&config, key).is_some(), "{key}");
        }
        assert!(lookup(&config, "output_dir").is_none());
    }

    #[test]
    fn test_api_key_is_masked() {
        assert_eq!(masked(None), "<not set>");
        assert_eq!(masked(Some("abc")), "****");
        assert_eq!(masked(Some("secret-key-1234")), "****1234");
    }

    #[test]
    fn test_update_keeps_comments() {
        let contents = "# models\nprimary_model = \"a\"\ntop_k = 5\n";
        let updated = update_document(contents, "top_k", "8").unwrap();
        assert!(updated.contains("# models"));
        assert!(updated.contains("top_k = 8"));
        assert!(updated.contains("primary_model = \"a\""));
    }

    #[test]
    fn test_update_adds_missing_key() {
        let updated = update_document("", "enhance_query", "true").unwrap();
        assert!(updated.contains("enhance_query = true"));
    }

    #[test]
    fn test_update_fallback_models_list() {
        let updated =
            update_document("", "fallback_models", "gemini-2.0-flash, gemini-1.5-flash").unwrap();
        let doc: DocumentMut = updated.parse().unwrap();
        let models = doc["fallback_models"].as_array().unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models.get(1).and_then(|v| v.as_str()), Some("gemini-1.5-flash"));
    }

    #[test]
    fn test_update_rejects_bad_values() {
        assert!(update_document("", "top_k", "many").is_err());
        assert!(update_document("", "top_k", "-1").is_err());
        assert!(update_document("", "enhance_query", "yes").is_err());
        assert!(update_document("", "output_dir", "/tmp").is_err());
    }

    #[test]
    fn test_example_config_accepts_updates() {
        let updated = update_document(config::example_config(), "temperature", "0.2").unwrap();
        assert!(updated.contains("temperature = 0.2"));
    }
}
