//! Paginated walk of the file-listing endpoint.
//!
//! The listing is cursor-based: each page carries its records plus `next`,
//! the absolute URL of the following page, or `null` once the catalog is
//! exhausted. [`FileLister`] pulls one page per call and never prefetches,
//! so a consumer that stops early never triggers fetches it did not need.
//! The walk is single-pass; the server's result set may change between
//! runs, so re-listing always starts from the first page.

use futures_util::TryStreamExt;
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use tracing::debug;

use crate::catalog::CatalogRecord;

use super::{ApiClient, ApiError};

/// Records requested per page.
pub const PAGE_LIMIT: u32 = 100;

/// One page of the file listing.
#[derive(Debug, Deserialize)]
pub struct Page {
    /// Absolute URL of the next page, or `None` at the end of the catalog.
    #[serde(default)]
    pub next: Option<String>,
    /// Records on this page, in server order.
    #[serde(default)]
    pub results: Vec<CatalogRecord>,
}

/// Pulls the file listing one page at a time.
#[derive(Debug)]
pub struct FileLister {
    api: ApiClient,
    next: Option<String>,
    pages_fetched: u64,
}

impl FileLister {
    pub(crate) fn new(api: ApiClient) -> Self {
        let first = format!("{}/files/?limit={PAGE_LIMIT}", api.base_url());
        Self {
            api,
            next: Some(first),
            pages_fetched: 0,
        }
    }

    /// Fetches the next page, or returns `None` once the end marker was seen.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on any transport failure or non-success
    /// status. The walk is dead after an error; records already yielded
    /// remain valid, but no further pages can be pulled.
    pub async fn next_page(&mut self) -> Result<Option<Page>, ApiError> {
        let Some(url) = self.next.take() else {
            return Ok(None);
        };
        let page: Page = self.api.get_json(&url).await?;
        self.pages_fetched += 1;
        debug!(
            page = self.pages_fetched,
            records = page.results.len(),
            has_next = page.next.is_some(),
            "fetched listing page"
        );
        self.next = page.next.clone();
        Ok(Some(page))
    }

    /// Adapts the lister into a lazy stream of individual records.
    ///
    /// Records arrive in server order across page boundaries, with no
    /// deduplication or reordering. A page is fetched only when the
    /// stream is polled past the previous page's records. The first
    /// error ends the stream.
    pub fn records(self) -> impl Stream<Item = Result<CatalogRecord, ApiError>> {
        stream::try_unfold(self, |mut lister| async move {
            match lister.next_page().await? {
                Some(page) => Ok::<_, ApiError>(Some((
                    stream::iter(page.results.into_iter().map(Ok::<_, ApiError>)),
                    lister,
                ))),
                None => Ok(None),
            }
        })
        .try_flatten()
    }
}
