use crate::modules::{Module, SubdomainModule};
use crate::utils::{push_unique, strip_wildcard_labels};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, instrument};

const PAGE_SIZE: u32 = 100;
const MAX_PAGES: usize = 10;
// the certificate search endpoint rate-limits aggressive pagination
const PAGE_DELAY_MS: u64 = 400;

// region:        --- Module info

pub struct Censys {
    base_url: String,
    app_id: String,
    secret: String,
    fast: bool,
}

impl Censys {
    pub fn new(app_id: String, secret: String, fast: bool) -> Self {
        Self {
            base_url: "https://search.censys.io/api/v2/certificates/search".to_string(),
            app_id,
            secret,
            fast,
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: &str, fast: bool) -> Self {
        Self {
            base_url: base_url.to_string(),
            app_id: "app-id".to_string(),
            secret: "secret".to_string(),
            fast,
        }
    }
}

impl Module for Censys {
    fn name(&self) -> String {
        "subdomains/censys".to_string()
    }

    fn description(&self) -> String {
        "Use the censys.io certificate search API to find subdomains".to_string()
    }
}

// endregion:     --- Module info

#[derive(Debug, Deserialize)]
struct SearchPage {
    result: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    hits: Vec<CertificateHit>,
    #[serde(default)]
    links: SearchLinks,
}

#[derive(Debug, Default, Deserialize)]
struct SearchLinks {
    // empty string marks the end of the relation
    #[serde(default)]
    next: String,
}

#[derive(Debug, Deserialize)]
struct CertificateHit {
    parsed: ParsedCertificate,
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ParsedCertificate {
    subject_dn: String,
}

#[async_trait]
impl SubdomainModule for Censys {
    #[instrument(name = "discover", level = "debug", fields(module = %self.name()), skip_all)]
    async fn discover(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let mut subdomains: Vec<String> = Vec::new();

        let first = match self.query_page(http_client, domain, None).await {
            Ok(page) => page,
            Err(err) => {
                // zero findings rather than a failed run
                error!("{}: {}", self.name(), err);
                return Ok(subdomains);
            }
        };
        collect_page(&first, domain, &mut subdomains);

        if self.fast {
            return Ok(subdomains);
        }

        let mut cursor = first.result.links.next;
        let mut page_count = 1;
        while !cursor.is_empty() && page_count < MAX_PAGES {
            page_count += 1;
            sleep(Duration::from_millis(PAGE_DELAY_MS)).await;

            let page = match self.query_page(http_client, domain, Some(&cursor)).await {
                Ok(page) => page,
                Err(err) => {
                    error!("{}: {}", self.name(), err);
                    break;
                }
            };
            collect_page(&page, domain, &mut subdomains);
            cursor = page.result.links.next;
        }

        debug!("{} collected", subdomains.len());
        Ok(subdomains)
    }
}

impl Censys {
    async fn query_page(
        &self,
        http_client: &Client,
        domain: &str,
        cursor: Option<&str>,
    ) -> Result<SearchPage> {
        let mut request = http_client
            .get(&self.base_url)
            .basic_auth(&self.app_id, Some(&self.secret))
            .header(CONTENT_TYPE, "application/json")
            .query(&[("q", domain)])
            .query(&[("per_page", PAGE_SIZE)]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let res = request.send().await?;
        match res.status() {
            StatusCode::OK => match res.json().await {
                Ok(page) => Ok(page),
                Err(_) => Err(Error::InvalidHttpResponse(self.name())),
            },
            StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited(self.name())),
            StatusCode::FORBIDDEN => Err(Error::InvalidCredentials(self.name())),
            _ => Err(Error::InvalidHttpResponse(self.name())),
        }
    }
}

fn collect_page(page: &SearchPage, domain: &str, subdomains: &mut Vec<String>) {
    for name in parse_certificate_names(page) {
        if !name.ends_with(domain) {
            continue;
        }
        push_unique(subdomains, name);
    }
}

/// Subject common name plus alternate names of every certificate hit,
/// wildcard prefixes stripped; names still carrying a `*` are dropped.
fn parse_certificate_names(page: &SearchPage) -> Vec<String> {
    let mut names = Vec::new();
    for hit in &page.result.hits {
        let common_name = hit
            .parsed
            .subject_dn
            .split(", ")
            .find_map(|info| info.strip_prefix("CN="));
        if let Some(common_name) = common_name {
            let stripped = strip_wildcard_labels(common_name);
            if !stripped.contains('*') {
                push_unique(&mut names, stripped.to_string());
            }
        }

        for name in &hit.names {
            let stripped = strip_wildcard_labels(name);
            if !stripped.contains('*') {
                push_unique(&mut names, stripped.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page_body(names_per_hit: &[(&str, &[&str])], next: &str) -> serde_json::Value {
        let hits: Vec<serde_json::Value> = names_per_hit
            .iter()
            .map(|(subject, names)| {
                serde_json::json!({
                    "parsed": { "subject_dn": subject },
                    "names": names,
                })
            })
            .collect();
        serde_json::json!({
            "result": {
                "hits": hits,
                "links": { "next": next, "prev": "" },
            }
        })
    }

    #[test]
    fn parse_certificate_names_strips_wildcards() {
        let body = page_body(
            &[
                ("C=US, CN=*.example.com", &["*.api.example.com", "*bad.example.com"]),
                ("C=US, O=NoCommonName", &["www.example.com"]),
            ],
            "",
        );
        let page: SearchPage = serde_json::from_value(body).unwrap();

        let names = parse_certificate_names(&page);
        assert_eq!(names, vec!["example.com", "api.example.com", "www.example.com"]);
    }

    #[tokio::test]
    async fn pagination_follows_the_next_link_until_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("cursor", "NEXT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
                &[("CN=b.example.com", &[] as &[&str])],
                "",
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(query_param_is_missing("cursor"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
                &[("CN=a.example.com", &[] as &[&str])],
                "NEXT",
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let module = Censys::with_base_url(&mock_server.uri(), false);
        let http_client = Client::new();

        let subdomains = module.discover(&http_client, "example.com").await.unwrap();
        assert_eq!(subdomains, vec!["a.example.com", "b.example.com"]);
    }

    #[tokio::test]
    async fn pagination_stops_at_the_page_cap() {
        let mock_server = MockServer::start().await;

        // the next link never goes empty: only the cap ends the loop
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
                &[("CN=a.example.com", &[] as &[&str])],
                "AGAIN",
            )))
            .expect(MAX_PAGES as u64)
            .mount(&mock_server)
            .await;

        let module = Censys::with_base_url(&mock_server.uri(), false);
        let http_client = Client::new();

        let subdomains = module.discover(&http_client, "example.com").await.unwrap();
        assert_eq!(subdomains, vec!["a.example.com"]);
    }

    #[tokio::test]
    async fn fast_mode_stops_after_one_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
                &[("CN=a.example.com", &[] as &[&str])],
                "NEXT",
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let module = Censys::with_base_url(&mock_server.uri(), true);
        let http_client = Client::new();

        let subdomains = module.discover(&http_client, "example.com").await.unwrap();
        assert_eq!(subdomains, vec!["a.example.com"]);
    }

    #[tokio::test]
    async fn first_page_failure_yields_zero_findings() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(1)
            .mount(&mock_server)
            .await;

        let module = Censys::with_base_url(&mock_server.uri(), false);
        let http_client = Client::new();

        let subdomains = module.discover(&http_client, "example.com").await.unwrap();
        assert!(subdomains.is_empty());
    }
}
