use anyhow::{bail, Result};
use colored::*;

use super::QueryArgs;
use crate::core::config::load_config;
use crate::core::transport::{search_url, HttpTransport};
use crate::search::keywords::{discover_keywords, KeywordQuery};

pub async fn run(args: &QueryArgs, max_terms: Option<usize>, sample_size: Option<u64>, json: bool) -> Result<()> {
    let config = load_config()?;
    let transport = HttpTransport::new(config.timeout())?;

    let fields = args.fields(&config);
    if fields.is_empty() {
        bail!("keyword discovery needs at least one --field");
    }
    let stop_words = args.stop_words(&config);
    let max_query_terms = max_terms
        .or(args.max_query_terms.map(|n| n as usize))
        .unwrap_or(config.expansion.max_query_terms as usize);

    let url = search_url(&config.endpoint, args.index(&config).as_deref());
    let query = KeywordQuery {
        text: &args.query,
        fields: &fields,
        filters: &args.pre_filters,
        max_query_terms,
        stop_words: &stop_words,
        sample_size: sample_size.unwrap_or(config.sample_size),
    };
    let keywords = discover_keywords(&transport, &url, &query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&keywords)?);
        return Ok(());
    }

    if keywords.is_empty() {
        println!("No significant terms found.");
        return Ok(());
    }
    for (rank, keyword) in keywords.iter().enumerate() {
        println!("{:>3}. {} {:.4}", rank + 1, keyword.term.green(), keyword.score);
    }

    Ok(())
}
