//! Depth-bounded, revisit-avoiding web crawler.
//!
//! The crawler walks a site depth-first from a seed URL looking for the
//! first page carrying an extractable financial table. The visited set is
//! owned by each `crawl` invocation, so concurrent crawls never interfere,
//! and the depth bound guarantees termination over cyclic link graphs.
//! Fetch failures terminate only their own branch: they are logged and the
//! traversal continues with siblings.

pub mod table;

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::types::PipelineError;

pub use table::{FinancialTable, extract_first_table};

/// Tuning knobs for a [`WebCrawler`].
#[derive(Clone, Debug)]
pub struct CrawlerConfig {
    /// Timeout applied to every page fetch.
    pub request_timeout: Duration,
    /// Overall budget for one `crawl` call; when it elapses, in-flight
    /// branches are abandoned and the crawl returns no table rather than
    /// hanging.
    pub overall_deadline: Option<Duration>,
    /// Cap on outgoing links followed per page.
    pub max_links_per_page: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            overall_deadline: Some(Duration::from_secs(120)),
            max_links_per_page: 64,
        }
    }
}

/// Depth-limited site crawler that returns the first financial table found.
#[derive(Clone)]
pub struct WebCrawler {
    client: Client,
    config: CrawlerConfig,
}

impl WebCrawler {
    pub fn new(config: CrawlerConfig) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| PipelineError::Configuration(err.to_string()))?;
        Ok(Self { client, config })
    }

    /// Crawls from `seed` up to `max_depth` link hops away, returning the
    /// first extractable table, or `None` once the depth bound (or the
    /// overall deadline) exhausts every branch.
    ///
    /// A malformed seed is the one error this method surfaces; everything
    /// below it is branch-local and handled inside the traversal.
    pub async fn crawl(
        &self,
        seed: &str,
        max_depth: usize,
    ) -> Result<Option<FinancialTable>, PipelineError> {
        let seed = normalize_candidate(None, seed).ok_or_else(|| PipelineError::InvalidUrl {
            url: seed.to_string(),
            reason: "seed must be an absolute http(s) URL with a host".into(),
        })?;

        match self.config.overall_deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.traverse(seed.clone(), max_depth)).await {
                    Ok(result) => Ok(result),
                    Err(_) => {
                        warn!(%seed, deadline_secs = deadline.as_secs(), "crawl deadline elapsed");
                        Ok(None)
                    }
                }
            }
            None => Ok(self.traverse(seed, max_depth).await),
        }
    }

    /// Explicit work-stack depth-first traversal. Children are pushed in
    /// reverse document order so pages are visited exactly as recursive
    /// descent would visit them, and returning on the first table naturally
    /// short-circuits all pending siblings.
    async fn traverse(&self, seed: Url, max_depth: usize) -> Option<FinancialTable> {
        let mut visited: HashSet<Url> = HashSet::new();
        let mut stack: Vec<(Url, usize)> = vec![(seed, 0)];

        while let Some((url, depth)) = stack.pop() {
            if depth > max_depth {
                continue;
            }
            if !visited.insert(url.clone()) {
                continue;
            }

            let body = match self.fetch(&url).await {
                Ok(body) => body,
                Err(err) => {
                    warn!(%url, depth, error = %err, "fetch failed, abandoning branch");
                    continue;
                }
            };

            if let Some(table) = extract_first_table(&body) {
                debug!(%url, depth, rows = table.rows.len(), "table found");
                return Some(table);
            }

            let links = extract_links(&url, &body, self.config.max_links_per_page);
            debug!(%url, depth, links = links.len(), "no table, descending");
            for link in links.into_iter().rev() {
                if !visited.contains(&link) {
                    stack.push((link, depth + 1));
                }
            }
        }

        None
    }

    async fn fetch(&self, url: &Url) -> Result<String, PipelineError> {
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Resolves an `href` against the page it appeared on and keeps it only if
/// the result is absolute, http(s)-schemed, and hosted. Fragments are
/// stripped so `#section` anchors never masquerade as distinct pages.
fn normalize_candidate(base: Option<&Url>, href: &str) -> Option<Url> {
    let mut url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.host_str()?;
    url.set_fragment(None);
    Some(url)
}

fn extract_links(page: &Url, html: &str, limit: usize) -> Vec<Url> {
    let document = Html::parse_document(html);
    let anchor_sel = Selector::parse("a[href]").expect("static selector");

    let mut links = Vec::new();
    let mut seen: HashSet<Url> = HashSet::new();
    for anchor in document.select(&anchor_sel) {
        if links.len() >= limit {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = normalize_candidate(Some(page), href) else {
            continue;
        };
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }
    links
}
