use crate::modules::{http_request, Module, SubdomainModule};
use crate::utils::push_unique;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::Client;
use select::document::Document;
use select::predicate::{Attr, Class, Name, Predicate};
use tracing::{debug, instrument};

// region:        --- Module info

pub struct DnsDumpster {
    base_url: String,
}

impl DnsDumpster {
    pub fn new() -> Self {
        Self {
            base_url: "https://dnsdumpster.com/".to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }
}

impl Module for DnsDumpster {
    fn name(&self) -> String {
        "subdomains/dnsdumpster".to_string()
    }

    fn description(&self) -> String {
        "Use dnsdumpster.com DNS recon reports to find subdomains".to_string()
    }
}

// endregion:     --- Module info

#[async_trait]
impl SubdomainModule for DnsDumpster {
    #[instrument(name = "discover", level = "debug", fields(module = %self.name()), skip_all)]
    async fn discover(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        // phase 1: fetch the search form for the csrf token; the session
        // cookie set here rides along in the client's cookie store
        let res = http_request(http_client, &self.base_url).await?;
        if !res.status().is_success() {
            return Err(Error::InvalidHttpResponse(self.name()));
        }
        let body = res.text().await?;
        let csrf_token = parse_csrf_token(&body).ok_or_else(|| Error::MissingCsrfToken(self.name()))?;

        // phase 2: replay the token as form data
        let form = [
            ("csrfmiddlewaretoken", csrf_token.as_str()),
            ("targetip", domain),
            ("user", "free"),
        ];
        let res = http_client
            .post(&self.base_url)
            .header(REFERER, self.base_url.as_str())
            .form(&form)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(Error::InvalidHttpResponse(self.name()));
        }

        let body = res.text().await?;
        let subdomains = parse_record_tables(&body, domain);

        debug!("{} collected", subdomains.len());
        Ok(subdomains)
    }
}

fn parse_csrf_token(html: &str) -> Option<String> {
    let document = Document::from(html);
    document
        .find(Name("input").and(Attr("name", "csrfmiddlewaretoken")))
        .next()
        .and_then(|input| input.attr("value").map(str::to_string))
}

/// Hostnames sit in the first cell column of the report tables, as the
/// cell's leading text node.
fn parse_record_tables(html: &str, domain: &str) -> Vec<String> {
    let document = Document::from(html);
    let mut subdomains = Vec::new();

    for table in document.find(Name("table").and(Class("table"))) {
        for td in table.find(Name("td").and(Class("col-md-4"))) {
            let Some(child) = td.children().next() else {
                continue;
            };
            let text = child.text();
            let name = match text.split_once(' ') {
                Some((_, rest)) => rest,
                None => text.as_str(),
            };
            let name = name.trim();
            if name.ends_with(domain) {
                push_unique(&mut subdomains, name.to_string());
            }
        }
    }
    subdomains
}
