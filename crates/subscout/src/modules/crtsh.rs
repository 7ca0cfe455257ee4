use crate::modules::{Module, SubdomainModule};
use crate::utils::push_unique;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use select::document::Document;
use select::node::Node;
use select::predicate::{Class, Name, Predicate};
use tracing::{debug, instrument};

// the service answers 502/503 under load, a plain re-send usually gets through
const SERVER_BUSY_RETRIES: usize = 3;

// region:        --- Module info

pub struct CrtSh {
    base_url: String,
}

impl CrtSh {
    pub fn new() -> Self {
        Self {
            base_url: "https://crt.sh/".to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }
}

impl Module for CrtSh {
    fn name(&self) -> String {
        "subdomains/crtsh".to_string()
    }

    fn description(&self) -> String {
        "Use crt.sh certificate transparency search to find subdomains".to_string()
    }
}

// endregion:     --- Module info

#[async_trait]
impl SubdomainModule for CrtSh {
    #[instrument(name = "discover", level = "debug", fields(module = %self.name()), skip_all)]
    async fn discover(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let body = self.query_certificates(http_client, domain).await?;
        let subdomains = parse_certificate_table(&body, domain);

        debug!("{} collected", subdomains.len());
        Ok(subdomains)
    }
}

impl CrtSh {
    async fn query_certificates(&self, http_client: &Client, domain: &str) -> Result<String> {
        let mut try_count = 0;
        loop {
            let res = http_client
                .get(&self.base_url)
                .query(&[("q", domain)])
                .send()
                .await?;

            match res.status() {
                StatusCode::OK => return Ok(res.text().await?),
                StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE
                    if try_count < SERVER_BUSY_RETRIES =>
                {
                    try_count += 1;
                    debug!("server busy, retry {}/{}", try_count, SERVER_BUSY_RETRIES);
                }
                StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
                    return Err(Error::ServiceUnavailable(self.name()));
                }
                _ => return Err(Error::InvalidHttpResponse(self.name())),
            }
        }
    }
}

/// Scrape the certificate list view. Rows carry 7 cells; the matching
/// identities and common name columns hold one name per `<br>` line, so
/// the names are the cells' direct text children.
fn parse_certificate_table(html: &str, domain: &str) -> Vec<String> {
    let document = Document::from(html);
    let mut subdomains = Vec::new();

    for outer in document.find(Name("td").and(Class("outer"))) {
        for row in outer.find(Name("tr")) {
            let fields: Vec<Node> = row.find(Name("td")).collect();
            if fields.len() != 7 {
                continue;
            }
            for field in [&fields[4], &fields[5]] {
                for child in field.children() {
                    let text = child.text();
                    let name = text.trim();
                    if !name.ends_with(domain) {
                        continue;
                    }
                    push_unique(&mut subdomains, name.to_string());
                }
            }
        }
    }
    subdomains
}
