use crate::modules::search::{random_user_agent, SearchEngineModule};
use crate::modules::{Module, SubdomainModule};
use crate::utils::{hostname_from_url, push_unique};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use select::document::Document;
use select::predicate::{Attr, Class, Name, Predicate};
use tracing::instrument;

// region:        --- Module info

pub struct Bing {
    base_url: String,
    user_agent: &'static str,
    fast: bool,
}

impl Bing {
    pub fn new(fast: bool) -> Self {
        Self {
            base_url: "https://www.bing.com/search".to_string(),
            // one identity per scan, re-rolled per process
            user_agent: random_user_agent(),
            fast,
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: &str, fast: bool) -> Self {
        Self {
            base_url: base_url.to_string(),
            user_agent: random_user_agent(),
            fast,
        }
    }
}

impl Module for Bing {
    fn name(&self) -> String {
        "subdomains/bing".to_string()
    }

    fn description(&self) -> String {
        "Use bing.com search results to find subdomains".to_string()
    }
}

// endregion:     --- Module info

/// Result offset: `1` on the first page, then `11`, `21`, ...
fn page_first(page: u32) -> String {
    if page == 1 {
        "1".to_string()
    } else {
        format!("{}1", page - 1)
    }
}

#[async_trait]
impl SearchEngineModule for Bing {
    fn fast_mode(&self) -> bool {
        self.fast
    }

    async fn query_page(&self, http_client: &Client, domain: &str, page: u32) -> Result<String> {
        let res = http_client
            .get(&self.base_url)
            .header(USER_AGENT, self.user_agent)
            .query(&[("q", domain), ("first", page_first(page).as_str())])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(Error::InvalidHttpResponse(self.name()));
        }
        Ok(res.text().await?)
    }

    fn parse_page(&self, html: &str, domain: &str) -> Result<Vec<String>> {
        let document = Document::from(html);

        let title = document
            .find(Name("title"))
            .next()
            .map(|node| node.text())
            .unwrap_or_default();
        if !title.contains(domain) {
            return Err(Error::CaptchaDetected(self.name()));
        }

        let mut subdomains: Vec<String> = Vec::new();
        let mut result_domains: Vec<String> = Vec::new();
        for result in document.find(Attr("id", "b_results").descendant(Class("b_algo"))) {
            // a result block without its title link is a decoy page
            let Some(link) = result.find(Name("a").and(Class("tilk"))).next() else {
                return Err(Error::ShadowBanDetected(self.name()));
            };
            let Some(href) = link.attr("href") else {
                continue;
            };
            let Some(result_domain) = hostname_from_url(href) else {
                continue;
            };

            push_unique(&mut result_domains, result_domain.clone());
            if result_domain.ends_with(domain) {
                subdomains.push(result_domain);
            }
        }

        // every result pointing back at the engine is the other decoy shape
        if result_domains == ["www.bing.com"] {
            return Err(Error::ShadowBanDetected(self.name()));
        }

        Ok(subdomains)
    }
}

#[async_trait]
impl SubdomainModule for Bing {
    #[instrument(name = "discover", level = "debug", fields(module = %self.name()), skip_all)]
    async fn discover(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        self.discover_pages(http_client, domain).await
    }
}
