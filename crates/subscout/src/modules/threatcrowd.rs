use crate::modules::{Module, SubdomainModule};
use crate::utils::push_unique;
use crate::{Error, Result};
use async_trait::async_trait;
use lazy_regex::regex;
use reqwest::Client;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct ThreatCrowd {
    base_url: String,
}

impl ThreatCrowd {
    pub fn new() -> Self {
        Self {
            // only the legacy mirror still serves the graph reports
            base_url: "http://ci-www.threatcrowd.org/graphHtml.php".to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
        }
    }
}

impl Module for ThreatCrowd {
    fn name(&self) -> String {
        "subdomains/threatcrowd".to_string()
    }

    fn description(&self) -> String {
        "Use threatcrowd.org graph reports to find subdomains".to_string()
    }
}

// endregion:     --- Module info

#[async_trait]
impl SubdomainModule for ThreatCrowd {
    #[instrument(name = "discover", level = "debug", fields(module = %self.name()), skip_all)]
    async fn discover(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let res = http_client
            .get(&self.base_url)
            .query(&[("domain", domain)])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(Error::InvalidHttpResponse(self.name()));
        }

        let body = res.text().await?;
        let subdomains = parse_graph_nodes(&body, domain);

        debug!("{} collected", subdomains.len());
        Ok(subdomains)
    }
}

/// Pull node ids out of the graph script embedded in the report page.
///
/// The ids live between the `elements: {` and `edges: [` markers, one
/// `id: '<name>'` entry per node.
fn parse_graph_nodes(body: &str, domain: &str) -> Vec<String> {
    let Some(start) = body.find("elements: {") else {
        return Vec::new();
    };
    let end = body.find("edges: [").unwrap_or(body.len());
    if end <= start {
        return Vec::new();
    }

    let mut subdomains = Vec::new();
    for capture in regex!(r"id: '([^']+)'").captures_iter(&body[start..end]) {
        let id = capture[1].trim_start_matches('.');
        if id == domain || !id.ends_with(domain) {
            continue;
        }
        push_unique(&mut subdomains, id.to_string());
    }
    subdomains
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GRAPH_BODY: &str = r#"
        var graph = cytoscape({
            elements: {
                nodes: [
                    { data: { id: 'www.example.com' } },
                    { data: { id: 'mail.example.com' } },
                    { data: { id: '.example.com' } },
                    { data: { id: 'example.com' } },
                    { data: { id: 'unrelated.org' } },
                    { data: { id: 'www.example.com' } },
                ],
                edges: [
                    { data: { id: 'edge.example.com' } },
                ]
            }
        });"#;

    #[test]
    fn parse_graph_nodes_keeps_suffix_matches_only() {
        let subdomains = parse_graph_nodes(GRAPH_BODY, "example.com");
        assert_eq!(subdomains, vec!["www.example.com", "mail.example.com"]);
    }

    #[test]
    fn parse_graph_nodes_tolerates_missing_markers() {
        assert!(parse_graph_nodes("<html>not a report</html>", "example.com").is_empty());
    }

    #[tokio::test]
    async fn discover_fails_softly_on_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let module = ThreatCrowd::with_base_url(&mock_server.uri());
        let http_client = Client::new();

        assert!(module.discover(&http_client, "example.com").await.is_err());
    }

    #[tokio::test]
    async fn discover_parses_the_report_page() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("domain", "example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string(GRAPH_BODY))
            .mount(&mock_server)
            .await;

        let module = ThreatCrowd::with_base_url(&mock_server.uri());
        let http_client = Client::new();

        let subdomains = module.discover(&http_client, "example.com").await.unwrap();
        assert_eq!(subdomains, vec!["www.example.com", "mail.example.com"]);
    }
}
