pub mod bing;
pub mod google;
pub mod yahoo;

use crate::modules::Module;
use crate::utils::push_unique;
use crate::Result;
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::Client;
use tracing::error;

/// Hard page budget per engine, fast mode or not.
const MAX_SEARCH_PAGES: u32 = 9;

// rotating browser identifiers keep the engines from blocking us outright
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// A web search engine queried page by page.
///
/// `query_page`/`parse_page` implement the engine-specific protocol;
/// `discover_pages` drives the shared loop: accumulate page results into a
/// module-local deduplicated list, stop on the first query or parse
/// failure (keeping what was already collected), after page 1 in fast
/// mode, or when the page budget runs out.
#[async_trait]
pub trait SearchEngineModule: Module + Send + Sync {
    fn fast_mode(&self) -> bool;

    async fn query_page(&self, http_client: &Client, domain: &str, page: u32) -> Result<String>;

    fn parse_page(&self, html: &str, domain: &str) -> Result<Vec<String>>;

    async fn discover_pages(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let mut subdomains: Vec<String> = Vec::new();

        for page in 1..=MAX_SEARCH_PAGES {
            let html = match self.query_page(http_client, domain, page).await {
                Ok(html) => html,
                Err(err) => {
                    error!("{}: page {}: {}", self.name(), page, err);
                    break;
                }
            };

            let page_subdomains = match self.parse_page(&html, domain) {
                Ok(page_subdomains) => page_subdomains,
                Err(err) => {
                    error!("{}: page {}: {}", self.name(), page, err);
                    break;
                }
            };

            for subdomain in page_subdomains {
                push_unique(&mut subdomains, subdomain);
            }

            if self.fast_mode() {
                break;
            }
        }

        Ok(subdomains)
    }
}
