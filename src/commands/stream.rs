use std::io::Write;

use anyhow::Result;
use futures::{pin_mut, TryStreamExt};
use tracing::info;

use super::QueryArgs;
use crate::core::config::load_config;
use crate::core::transport::HttpTransport;
use crate::search::stream::stream;
use crate::search::Pagination;

/// Write every expanded document as one JSON line
pub async fn run(args: &QueryArgs, chunk_size: Option<u64>) -> Result<()> {
    let config = load_config()?;
    let transport = HttpTransport::new(config.timeout())?;
    let request = args.to_request(&config, Pagination::default());
    let options = config.stream_options(chunk_size);

    let docs = stream(&transport, &config.endpoint, &request, &options)?;
    pin_mut!(docs);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut count = 0u64;
    while let Some(doc) = docs.try_next().await? {
        serde_json::to_writer(&mut out, &doc)?;
        writeln!(out)?;
        count += 1;
    }
    out.flush()?;

    info!(count, "stream finished");
    Ok(())
}
