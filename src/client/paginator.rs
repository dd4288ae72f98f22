//! Page-by-page collection of a list resource into one ordered sequence.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::envelope::{parse_page, Page};
use super::{Endpoint, FetchError, PageSource};
use crate::config::PaginationConfig;

/// Everything gathered from one list resource.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub items: Vec<Value>,
    /// Server-reported total, when any page carried one.
    pub total_count: Option<u64>,
    /// True when collection stopped early or went through the fallback request.
    pub degraded: bool,
}

impl Collected {
    fn empty() -> Self {
        Self {
            degraded: true,
            ..Self::default()
        }
    }

    /// Server total if reported, else how many items we actually hold.
    pub fn count(&self) -> u64 {
        self.total_count.unwrap_or(self.items.len() as u64)
    }
}

/// Walks a paged endpoint until the last page.
#[derive(Clone)]
pub struct Paginator {
    source: Arc<dyn PageSource>,
    fallback_page_size: u32,
    max_pages: u32,
}

impl Paginator {
    pub fn new(source: Arc<dyn PageSource>, settings: &PaginationConfig) -> Self {
        Self {
            source,
            fallback_page_size: settings.fallback_page_size.max(1),
            max_pages: settings.max_pages.max(1),
        }
    }

    /// Collect every page of `endpoint`.
    ///
    /// Never fails: a page error truncates the result to what was already
    /// gathered. If the very first page fails, one large single-shot request
    /// is attempted before giving up with an empty sequence.
    pub async fn fetch_all(&self, endpoint: &Endpoint) -> Collected {
        let page_size = endpoint.effective_page_size();
        let mut collected = Collected::default();
        let mut page: u32 = 1;

        loop {
            if page > self.max_pages {
                warn!(path = %endpoint.path, max_pages = self.max_pages, "page limit reached, stopping");
                collected.degraded = true;
                break;
            }

            let Page { items, meta } = match self.request(endpoint, page, page_size).await {
                Ok(p) => p,
                Err(e) if page == 1 => {
                    warn!(path = %endpoint.path, error = %e, "first page failed, trying single-shot fallback");
                    return self.fallback(endpoint).await;
                }
                Err(e) => {
                    warn!(
                        path = %endpoint.path,
                        page,
                        kept = collected.items.len(),
                        error = %e,
                        "page request failed, keeping partial result"
                    );
                    collected.degraded = true;
                    break;
                }
            };

            let received = items.len();
            if meta.total_count.is_some() {
                collected.total_count = meta.total_count;
            }
            collected.items.extend(items);
            debug!(path = %endpoint.path, page, received, total = collected.items.len(), "page collected");

            let last_page = match meta.total_pages {
                Some(total_pages) => meta.current_page.unwrap_or(u64::from(page)) >= total_pages,
                None => received < page_size as usize,
            };
            if last_page || received == 0 {
                break;
            }
            page += 1;
        }

        info!(
            path = %endpoint.path,
            pages = page.min(self.max_pages),
            items = collected.items.len(),
            total_count = ?collected.total_count,
            "collection finished"
        );
        collected
    }

    /// Ask for a single one-item page just to learn the server-reported total.
    pub async fn probe_total(&self, endpoint: &Endpoint) -> Option<u64> {
        match self.request(endpoint, 1, 1).await {
            Ok(page) => page.meta.total_count,
            Err(e) => {
                warn!(path = %endpoint.path, error = %e, "total probe failed");
                None
            }
        }
    }

    async fn fallback(&self, endpoint: &Endpoint) -> Collected {
        match self.request(endpoint, 1, self.fallback_page_size).await {
            Ok(Page { items, meta }) => {
                info!(path = %endpoint.path, items = items.len(), "fallback request succeeded");
                Collected {
                    items,
                    total_count: meta.total_count,
                    degraded: true,
                }
            }
            Err(e) => {
                warn!(path = %endpoint.path, error = %e, "fallback request failed, returning empty");
                Collected::empty()
            }
        }
    }

    async fn request(&self, endpoint: &Endpoint, page: u32, page_size: u32) -> Result<Page, FetchError> {
        let body = self.source.fetch_page(&endpoint.path, page, page_size).await?;
        parse_page(body, endpoint.items_field.as_deref()).map_err(|reason| FetchError::Malformed {
            path: endpoint.path.clone(),
            reason,
        })
    }
}
