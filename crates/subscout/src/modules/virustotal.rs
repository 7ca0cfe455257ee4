use crate::modules::{Module, SubdomainModule};
use crate::utils::push_unique;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, instrument};

const PAGE_LIMIT: u32 = 40;

// region:        --- Module info

pub struct VirusTotal {
    base_url: String,
    api_key: String,
    fast: bool,
}

impl VirusTotal {
    pub fn new(api_key: String, fast: bool) -> Self {
        Self {
            base_url: "https://www.virustotal.com/api/v3/domains".to_string(),
            api_key,
            fast,
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: &str, api_key: &str, fast: bool) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            fast,
        }
    }
}

impl Module for VirusTotal {
    fn name(&self) -> String {
        "subdomains/virustotal".to_string()
    }

    fn description(&self) -> String {
        "Use the virustotal.com domain relationship API to find subdomains".to_string()
    }
}

// endregion:     --- Module info

#[derive(Debug, Deserialize)]
struct RelationshipPage {
    data: Vec<RelationshipEntry>,
    #[serde(default)]
    meta: RelationshipMeta,
}

#[derive(Debug, Deserialize)]
struct RelationshipEntry {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct RelationshipMeta {
    cursor: Option<String>,
}

#[async_trait]
impl SubdomainModule for VirusTotal {
    #[instrument(name = "discover", level = "debug", fields(module = %self.name()), skip_all)]
    async fn discover(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let mut subdomains: Vec<String> = Vec::new();

        // a failure on the first page fails the whole run; later pages
        // keep whatever is already collected
        let first = self.query_relationship_page(http_client, domain, None).await?;
        for entry in first.data {
            push_unique(&mut subdomains, entry.id);
        }

        if self.fast {
            return Ok(subdomains);
        }

        let mut cursor = first.meta.cursor;
        while let Some(current) = cursor {
            let page = match self
                .query_relationship_page(http_client, domain, Some(&current))
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    error!("{}: {}", self.name(), err);
                    break;
                }
            };
            for entry in page.data {
                push_unique(&mut subdomains, entry.id);
            }
            cursor = page.meta.cursor;
        }

        debug!("{} collected", subdomains.len());
        Ok(subdomains)
    }
}

impl VirusTotal {
    async fn query_relationship_page(
        &self,
        http_client: &Client,
        domain: &str,
        cursor: Option<&str>,
    ) -> Result<RelationshipPage> {
        let url = format!("{}/{}/subdomains", self.base_url, domain);
        let mut request = http_client
            .get(&url)
            .header("x-apikey", &self.api_key)
            .query(&[("limit", PAGE_LIMIT)]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let res = request.send().await?;
        match res.status() {
            StatusCode::OK => match res.json().await {
                Ok(page) => Ok(page),
                Err(_) => Err(Error::InvalidHttpResponse(self.name())),
            },
            // the API spells out a wrong key inside the 401 body
            StatusCode::UNAUTHORIZED => Err(Error::InvalidCredentials(self.name())),
            StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited(self.name())),
            _ => Err(Error::InvalidHttpResponse(self.name())),
        }
    }
}
