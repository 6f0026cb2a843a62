//! Cursor pagination with strict limit accounting.
//!
//! A [`PageFetcher`] issues one request per page. [`QueryEngine`] drives a
//! fetcher page by page until the server stops handing out cursors or the
//! caller's total limit is reached, whichever comes first. The engine never
//! asks for more than the limit and never returns more than it.
//!
//! Pages are fetched strictly one after the other since each request needs
//! the previous page's cursor. A failure on any page fails the whole query
//! and discards what was collected so far.

use crate::errors::{ObeliskResult, ProtocolError};
use crate::types::QueryResult;
use async_trait::async_trait;
use tracing::debug;

/// A page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Continuation cursor. Absent when no more data follows.
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    /// Creates a new page.
    pub fn new(items: Vec<T>, cursor: Option<String>) -> Self {
        Self { items, cursor }
    }

    /// Returns true if the server announced more data.
    pub fn has_next(&self) -> bool {
        self.cursor.is_some()
    }

    /// Returns the number of items in this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if this page is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rejects a page that came back short while still carrying a cursor.
    ///
    /// A short page without a cursor is a legitimate end of data.
    pub fn check(&self, requested: usize) -> Result<(), ProtocolError> {
        match &self.cursor {
            Some(cursor) if self.items.len() < requested => Err(ProtocolError::InconsistentPage {
                requested,
                received: self.items.len(),
                cursor: cursor.clone(),
            }),
            _ => Ok(()),
        }
    }
}

impl<T> From<QueryResult<T>> for Page<T> {
    fn from(result: QueryResult<T>) -> Self {
        Page::new(result.items, result.cursor)
    }
}

/// Request for a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Cursor of the previous page, absent for the first one.
    pub cursor: Option<String>,
    /// Number of items asked for.
    pub page_size: usize,
}

/// Fetches one page per call.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Item type of the pages.
    type Item: Send;

    /// Issues one request and parses the envelope.
    async fn fetch_page(&self, request: &PageRequest) -> ObeliskResult<Page<Self::Item>>;

    /// Fetches a page and applies the short-page-with-cursor check.
    async fn fetch_checked(&self, request: &PageRequest) -> ObeliskResult<Page<Self::Item>> {
        let page = self.fetch_page(request).await?;
        page.check(request.page_size)?;
        Ok(page)
    }
}

/// Multi-page query driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryEngine {
    page_cap: usize,
}

impl QueryEngine {
    /// Creates an engine for a server with the given page cap.
    pub fn new(page_cap: usize) -> Self {
        Self {
            page_cap: page_cap.max(1),
        }
    }

    /// Maximum number of items requested per page.
    pub fn page_cap(&self) -> usize {
        self.page_cap
    }

    /// Collects up to `limit` items (all of them when `None`), starting at
    /// `cursor`.
    ///
    /// Returns exactly `min(limit, available)` items in server order. A
    /// limit of zero returns immediately without a request.
    pub async fn collect<F>(
        &self,
        fetcher: &F,
        limit: Option<usize>,
        cursor: Option<String>,
    ) -> ObeliskResult<Vec<F::Item>>
    where
        F: PageFetcher + ?Sized,
    {
        let mut collected: Vec<F::Item> = Vec::new();
        let mut cursor = cursor;
        let mut pages = 0usize;

        loop {
            let remaining = limit.map(|l| l.saturating_sub(collected.len()));
            if remaining == Some(0) {
                break;
            }

            let request = PageRequest {
                cursor: cursor.take(),
                page_size: remaining.map_or(self.page_cap, |r| r.min(self.page_cap)),
            };

            let page = fetcher.fetch_checked(&request).await?;
            pages += 1;

            let received = page.items.len();
            let Page { items, cursor: next } = page;
            match remaining {
                // Anything past the limit is dropped locally
                Some(room) => collected.extend(items.into_iter().take(room)),
                None => collected.extend(items),
            }

            debug!(
                page = pages,
                requested = request.page_size,
                received,
                collected = collected.len(),
                has_next = next.is_some(),
                "Fetched page"
            );

            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(collected)
    }
}
