use crate::modules::{Module, SubdomainModule};
use crate::utils::push_unique;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct Shodan {
    base_url: String,
    api_key: String,
}

impl Shodan {
    pub fn new(api_key: String) -> Self {
        Self {
            base_url: "https://api.shodan.io/dns/domain".to_string(),
            api_key,
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

impl Module for Shodan {
    fn name(&self) -> String {
        "subdomains/shodan".to_string()
    }

    fn description(&self) -> String {
        "Use the shodan.io DNS API to find subdomains".to_string()
    }
}

// endregion:     --- Module info

#[derive(Debug, Deserialize)]
struct DomainInfo {
    // bare labels, to be joined back onto the target domain
    subdomains: Vec<String>,
}

#[async_trait]
impl SubdomainModule for Shodan {
    #[instrument(name = "discover", level = "debug", fields(module = %self.name()), skip_all)]
    async fn discover(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let url = format!("{}/{}", self.base_url, domain);
        let res = http_client
            .get(&url)
            .query(&[("key", &self.api_key)])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(Error::InvalidHttpResponse(self.name()));
        }

        let info: DomainInfo = match res.json().await {
            Ok(info) => info,
            Err(_) => return Err(Error::InvalidHttpResponse(self.name())),
        };

        let mut subdomains = Vec::new();
        for label in info.subdomains {
            push_unique(&mut subdomains, format!("{}.{}", label, domain));
        }

        debug!("{} collected", subdomains.len());
        Ok(subdomains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn labels_are_joined_onto_the_target() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/example.com"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "domain": "example.com",
                "subdomains": ["api", "www", "api"],
            })))
            .mount(&mock_server)
            .await;

        let module = Shodan::with_base_url(&mock_server.uri(), "secret");
        let http_client = Client::new();

        let subdomains = module.discover(&http_client, "example.com").await.unwrap();
        assert_eq!(subdomains, vec!["api.example.com", "www.example.com"]);
    }

    #[tokio::test]
    async fn malformed_body_is_a_soft_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let module = Shodan::with_base_url(&mock_server.uri(), "secret");
        let http_client = Client::new();

        let result = module.discover(&http_client, "example.com").await;
        assert!(matches!(result, Err(Error::InvalidHttpResponse(_))));
    }
}
