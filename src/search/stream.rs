//! Streaming through large expanded result sets with scroll cursors

use futures::stream::{Stream, TryStreamExt};
use serde_json::json;
use tracing::{debug, warn};

use super::extract::extract_docs;
use super::orchestrator::{search, SearchRequest};
use super::{Document, Pagination, SearchPage};
use crate::core::transport::{scroll_url, EngineRequest, Transport};
use crate::error::{ProxyError, Result};

/// Upper bound on documents per page
pub const MAX_CHUNK_SIZE: u64 = 10_000;

/// Keep-alive requested for each scroll context
pub const DEFAULT_SCROLL_WINDOW: &str = "1m";

#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub chunk_size: u64,
    pub max_chunk_size: u64,
    pub scroll_window: String,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            max_chunk_size: MAX_CHUNK_SIZE,
            scroll_window: DEFAULT_SCROLL_WINDOW.to_string(),
        }
    }
}

enum CursorState {
    Start,
    Continue(String),
    Done,
}

/// Fetch one page for the current state and work out the next one
async fn next_page<T: Transport>(
    transport: &T,
    endpoint: &str,
    request: &SearchRequest,
    chunk_size: u64,
    window: &str,
    state: CursorState,
) -> Result<Option<(Vec<Document>, CursorState)>> {
    let page = match state {
        CursorState::Done => return Ok(None),
        CursorState::Start => search(transport, endpoint, request).await?,
        CursorState::Continue(cursor) => {
            let body = json!({"scroll": window, "scroll_id": cursor});
            let response = transport
                .post(EngineRequest::new(scroll_url(endpoint), body.clone()))
                .await?;
            extract_docs(&body, &response.body, true, false)?
        }
    };

    let SearchPage { token, documents } = page;
    debug!(returned = documents.len(), chunk_size, "streamed page");

    // A short page is the only end-of-stream signal
    let next = match token.cursor() {
        Some(cursor) if documents.len() as u64 >= chunk_size => CursorState::Continue(cursor.to_string()),
        Some(cursor) => {
            clear_scroll(transport, endpoint, cursor).await;
            CursorState::Done
        }
        None => CursorState::Done,
    };
    Ok(Some((documents, next)))
}

/// Release the scroll context of a finished stream. Best effort: the engine
/// drops it anyway once the keep-alive runs out.
async fn clear_scroll<T: Transport>(transport: &T, endpoint: &str, cursor: &str) {
    let request = EngineRequest::new(scroll_url(endpoint), json!({"scroll_id": [cursor]}));
    match transport.delete(request).await {
        Ok(response) => debug!(status = response.status, "scroll context cleared"),
        Err(e) => warn!(error = %e, "failed to clear scroll context"),
    }
}

/// Stream every document of an expansion search, one scroll page at a time.
///
/// `limit` and `offset` of the request are ignored. The stream cannot be
/// resumed; calling `stream` again starts from the first page.
pub fn stream<'a, T: Transport>(
    transport: &'a T,
    endpoint: &'a str,
    request: &SearchRequest,
    options: &StreamOptions,
) -> Result<impl Stream<Item = Result<Document>> + 'a> {
    if options.chunk_size == 0 {
        return Err(ProxyError::invalid_argument("chunk_size must be >= 1"));
    }
    let chunk_size = if options.chunk_size > options.max_chunk_size {
        warn!(
            requested = options.chunk_size,
            max = options.max_chunk_size,
            "chunk size too large, clamping"
        );
        options.max_chunk_size
    } else {
        options.chunk_size
    };

    let window = options.scroll_window.clone();
    let mut request = request.clone();
    request.pagination = Pagination {
        limit: Some(chunk_size),
        offset: None,
        scroll: Some(window.clone()),
    };

    let pages = futures::stream::try_unfold(CursorState::Start, move |state| {
        let request = request.clone();
        let window = window.clone();
        async move { next_page(transport, endpoint, &request, chunk_size, &window, state).await }
    });

    Ok(pages
        .map_ok(|documents| futures::stream::iter(documents.into_iter().map(Ok::<Document, ProxyError>)))
        .try_flatten())
}
