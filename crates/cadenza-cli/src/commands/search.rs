use anyhow::Result;
use cadenza_core::SearchResult;
use cadenza_search::SearchFilter;
use cadenza_select::Config;

use super::open_finder;

/// Which retrieval the `search` command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchMode {
    Hybrid,
    Semantic,
    Keyword,
}

#[derive(Debug)]
pub struct SearchArgs {
    pub query: String,
    pub limit: Option<usize>,
    pub mode: SearchMode,
    pub language: Option<String>,
    pub moods: Vec<String>,
    pub artist: Option<String>,
    pub json: bool,
}

impl SearchArgs {
    fn filter(&self) -> SearchFilter {
        SearchFilter {
            language: self.language.clone(),
            moods: self.moods.clone(),
            artist: self.artist.clone(),
        }
    }
}

pub async fn run_search(config: &Config, args: SearchArgs) -> Result<()> {
    let finder = open_finder(config)?;
    let k = args.limit.unwrap_or(config.top_k);
    let filter = args.filter();

    let results = if filter.is_empty() {
        match args.mode {
            SearchMode::Hybrid => finder.search(&args.query, k, config.weights()).await?,
            SearchMode::Semantic => finder.semantic_search(&args.query, k).await?,
            SearchMode::Keyword => finder.keyword_search(&args.query, k)?,
        }
    } else {
        if args.mode != SearchMode::Semantic {
            log::info!("Filters apply to semantic search; ignoring --mode");
        }
        finder.search_with_filters(&args.query, k, &filter).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No songs matched \"{}\".", args.query);
        return Ok(());
    }

    println!("\nResults for \"{}\":\n", args.query);
    for (rank, result) in results.iter().enumerate() {
        print_result(rank + 1, result);
    }

    Ok(())
}

/// One numbered result line plus its scores.
pub(crate) fn print_result(rank: usize, result: &SearchResult) {
    let song = &result.song;
    match &song.artist {
        Some(artist) => println!(
            "  {rank}. {} ({artist}) [{:.1}%]",
            song.display_title(),
            result.match_percent
        ),
        None => println!(
            "  {rank}. {} [{:.1}%]",
            song.display_title(),
            result.match_percent
        ),
    }

    let mut scores = Vec::new();
    if let Some(distance) = result.similarity_distance {
        scores.push(format!("distance {distance:.4}"));
    }
    if let Some(score) = result.keyword_score {
        scores.push(format!("keyword {score:.3}"));
    }
    if let Some(score) = result.hybrid_score {
        scores.push(format!("hybrid {score:.3}"));
    }
    if !scores.is_empty() {
        println!("     {}", scores.join(", "));
    }
    if !song.mood.is_empty() {
        println!("     mood: {}", song.mood.join(", "));
    }
}
