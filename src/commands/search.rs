use anyhow::{Context, Result};
use colored::*;

use super::QueryArgs;
use crate::core::config::load_config;
use crate::core::transport::HttpTransport;
use crate::search::orchestrator::search;
use crate::search::{Document, PageToken, Pagination};

pub async fn run(args: &QueryArgs, limit: u64, offset: Option<u64>, json: bool) -> Result<()> {
    let config = load_config()?;
    let transport = HttpTransport::new(config.timeout())?;
    let pagination = Pagination {
        limit: Some(limit),
        offset,
        scroll: None,
    };
    let request = args.to_request(&config, pagination);

    let page = search(&transport, &config.endpoint, &request)
        .await
        .with_context(|| format!("expansion search for '{}' failed", args.query))?;

    if json {
        let out = serde_json::json!({
            "total": page.token.count(),
            "hits": page.documents,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if page.documents.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    if let PageToken::Count(total) = page.token {
        println!("{} {}", total.to_string().bold(), "matching documents".dimmed());
    }
    for doc in &page.documents {
        print_document(doc);
    }

    Ok(())
}

fn print_document(doc: &Document) {
    let title = ["title", "name", "summary"]
        .iter()
        .find_map(|key| doc.source.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("");

    println!("{}:{}", doc.index.magenta(), doc.id.green());
    if !title.is_empty() {
        println!("  {}", title.trim().dimmed());
    }
}
