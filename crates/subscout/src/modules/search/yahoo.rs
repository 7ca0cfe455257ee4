use crate::modules::search::{random_user_agent, SearchEngineModule};
use crate::modules::{Module, SubdomainModule};
use crate::utils::{hostname_from_url, push_unique};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use select::document::Document;
use select::predicate::Name;
use tracing::instrument;

const REDIRECT_PREFIX: &str = "https://r.search.yahoo.com";

// region:        --- Module info

pub struct Yahoo {
    base_url: String,
    user_agent: &'static str,
    fast: bool,
}

impl Yahoo {
    pub fn new(fast: bool) -> Self {
        Self {
            base_url: "https://fr.search.yahoo.com/search".to_string(),
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

impl Module for Yahoo {
    fn name(&self) -> String {
        "subdomains/yahoo".to_string()
    }

    fn description(&self) -> String {
        "Use yahoo.com search results to find subdomains".to_string()
    }
}

// endregion:     --- Module info

/// Result offset: pages run 1, 8, 15, ... seven results apart.
fn page_offset(page: u32) -> u32 {
    (page - 1) * 7 + 1
}

/// Yahoo wraps result links in a redirect URL whose path carries the real
/// destination as a percent-encoded `RU=` token.
fn decode_redirect_url(url: &str) -> Option<String> {
    for token in url.split('/').skip(3) {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        if key == "RU" {
            return urlencoding::decode(value).ok().map(|value| value.into_owned());
        }
    }
    None
}

#[async_trait]
impl SearchEngineModule for Yahoo {
    fn fast_mode(&self) -> bool {
        self.fast
    }

    async fn query_page(&self, http_client: &Client, domain: &str, page: u32) -> Result<String> {
        let mut request = http_client
            .get(&self.base_url)
            .header(USER_AGENT, self.user_agent)
            .query(&[("p", domain), ("ei", "UTF-8")])
            .query(&[("nocache", 1), ("nojs", 1)]);
        if page > 1 {
            request = request.query(&[("b", page_offset(page))]);
        }

        let res = request.send().await?;
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

        let mut subdomains = Vec::new();
        for link in document.find(Name("a")) {
            let Some(href) = link.attr("href") else {
                continue;
            };

            let url = if href.starts_with(REDIRECT_PREFIX) {
                match decode_redirect_url(href) {
                    Some(decoded) => decoded,
                    None => continue,
                }
            } else {
                href.to_string()
            };

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
impl SubdomainModule for Yahoo {
    #[instrument(name = "discover", level = "debug", fields(module = %self.name()), skip_all)]
    async fn discover(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        self.discover_pages(http_client, domain).await
    }
}
