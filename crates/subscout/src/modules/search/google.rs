use crate::modules::search::{random_user_agent, SearchEngineModule};
use crate::modules::{Module, SubdomainModule};
use crate::utils::{hostname_from_url, push_unique};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use select::document::Document;
use select::predicate::{Attr, Name};
use tracing::instrument;

// region:        --- Module info

pub struct Google {
    base_url: String,
    fast: bool,
}

impl Google {
    pub fn new(fast: bool) -> Self {
        Self {
            base_url: "https://www.google.com/search".to_string(),
            fast,
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: &str, fast: bool) -> Self {
        Self {
            base_url: base_url.to_string(),
            fast,
        }
    }
}

impl Module for Google {
    fn name(&self) -> String {
        "subdomains/google".to_string()
    }

    fn description(&self) -> String {
        "Use google.com search results to find subdomains".to_string()
    }
}

// endregion:     --- Module info

fn page_start(page: u32) -> u32 {
    (page - 1) * 10
}

#[async_trait]
impl SearchEngineModule for Google {
    fn fast_mode(&self) -> bool {
        self.fast
    }

    async fn query_page(&self, http_client: &Client, domain: &str, page: u32) -> Result<String> {
        let res = http_client
            .get(&self.base_url)
            .header(USER_AGENT, random_user_agent())
            .query(&[("q", domain)])
            .query(&[("start", page_start(page))])
            .send()
            .await?;

        match res.status() {
            StatusCode::OK => Ok(res.text().await?),
            StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited(self.name())),
            _ => Err(Error::InvalidHttpResponse(self.name())),
        }
    }

    fn parse_page(&self, html: &str, domain: &str) -> Result<Vec<String>> {
        let document = Document::from(html);

        // an interstitial page never echoes the query in its title
        let title = document
            .find(Name("title"))
            .next()
            .map(|node| node.text())
            .unwrap_or_default();
        if !title.contains(domain) {
            return Err(Error::CaptchaDetected(self.name()));
        }

        let mut urls: Vec<String> = Vec::new();
        let mut total_links = 0;
        if let Some(results) = document.find(Attr("id", "rso")).next() {
            for a_tag in results.find(Name("a")) {
                total_links += 1;
                if let Some(href) = a_tag.attr("href") {
                    push_unique(&mut urls, href.to_string());
                }
            }
        }

        // a result page with no links at all means we are served a husk
        if total_links == 0 {
            return Err(Error::ShadowBanDetected(self.name()));
        }

        let mut subdomains = Vec::new();
        for url in urls {
            if let Some(host) = hostname_from_url(&url) {
                if host.ends_with(domain) {
                    push_unique(&mut subdomains, host);
                }
            }
        }
        Ok(subdomains)
    }
}

#[async_trait]
impl SubdomainModule for Google {
    #[instrument(name = "discover", level = "debug", fields(module = %self.name()), skip_all)]
    async fn discover(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        self.discover_pages(http_client, domain).await
    }
}
