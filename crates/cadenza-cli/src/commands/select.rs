use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cadenza_select::{Config, SelectionReport, SelectionStatus, SongFinder};

use super::open_finder;
use super::search::print_result;

pub async fn run_select(config: &Config, query: &str, json: bool) -> Result<()> {
    let finder = open_finder(config)?;
    let report = finder.select(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub async fn run_batch(
    config: &Config,
    mut queries: Vec<String>,
    file: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if let Some(path) = &file {
        queries.extend(read_queries(path)?);
    }
    if queries.is_empty() {
        anyhow::bail!("No queries given. Pass them as arguments or with --file.");
    }

    let finder = Arc::new(open_finder(config)?);
    log::info!(
        "Processing {} queries, {} at a time",
        queries.len(),
        config.batch_concurrency
    );
    let results = SongFinder::select_batch(&finder, queries.clone()).await;

    let mut failed = 0;
    for (query, result) in queries.iter().zip(results) {
        match result {
            Ok(report) if json => println!("{}", serde_json::to_string(&report)?),
            Ok(report) => print_report(&report),
            Err(e) => {
                failed += 1;
                if json {
                    let line = serde_json::json!({"query": query, "error": e.to_string()});
                    println!("{line}");
                } else {
                    println!("\n✗ \"{query}\": {e}");
                }
            }
        }
    }

    if !json {
        println!("\n{} queries, {failed} failed", queries.len());
    }
    Ok(())
}

/// Queries from a file, one per line. Blank lines and `#` comments are
/// skipped.
pub(crate) fn read_queries(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read queries from {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

fn print_report(report: &SelectionReport) {
    println!("\n🎵 \"{}\"", report.query);
    if report.search_query != report.query {
        println!("   searched as: \"{}\"", report.search_query);
    }

    if report.candidates.is_empty() {
        println!("\n   No songs matched.");
        return;
    }

    println!("\nCandidates:\n");
    for (rank, candidate) in report.candidates.iter().enumerate() {
        print_result(rank + 1, candidate);
    }

    match (&report.selected, report.status) {
        (Some(selected), SelectionStatus::Selected | SelectionStatus::Defaulted) => {
            let song = &selected.song;
            println!("\n✓ Selected: {}", song.display_title());
            if let Some(artist) = &song.artist {
                println!("  Artist: {artist}");
            }
            println!("  Confidence: {:.0}%", report.confidence * 100.0);
            if let Some(model) = &report.model {
                println!("  Model: {model}");
            }
            if report.status == SelectionStatus::Defaulted {
                println!("  (the model named no valid candidate; took the top result)");
            }
            println!("\n  {}", report.reasoning);
        }
        _ => {
            println!("\n⚠ {}", report.reasoning);
            if let Some(error) = &report.error {
                println!("  {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_queries_skips_blanks_and_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# evening list").unwrap();
        writeln!(file, "  autumn leaves  ").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "дождь за окном").unwrap();

        let queries = read_queries(file.path()).unwrap();
        assert_eq!(queries, vec!["autumn leaves", "дождь за окном"]);
    }

    #[test]
    fn test_read_queries_missing_file() {
        assert!(read_queries(Path::new("/nonexistent/queries.txt")).is_err());
    }
}
