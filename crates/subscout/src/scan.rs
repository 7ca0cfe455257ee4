use crate::modules::{self, ApiCredentials, SubdomainModule};
use crate::utils::push_unique;
use crate::Result;
use futures::future::join_all;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, instrument};

// timeouts
const HTTP_REQUEST_TIMEOUT_MS: u64 = 10_000;
// a source that hangs past this no longer stalls the scan
const MODULE_TIMEOUT_MS: u64 = 120_000;

// region:        --- Scan main function

#[tokio::main]
#[instrument(name = "scan", level = "info", skip_all)]
pub async fn scan(target: &str, credentials: &ApiCredentials, fast: bool) -> Result<Vec<String>> {
    let scan_start = Instant::now();

    // the module set is rebuilt for every scan, so no transient module
    // state leaks between runs
    let modules = modules::all_modules(credentials, fast);
    info!("Scanning {} with {} modules", target, modules.len());

    let subdomains = discover_all(modules, target).await;

    info!(
        "Found a total of {} subdomains in {:.2}s",
        subdomains.len(),
        scan_start.elapsed().as_secs_f64()
    );

    Ok(subdomains)
}

// endregion:     --- Scan main function

// region:        --- Scan subfunctions

/// Run every module concurrently, then merge and normalize.
///
/// The join is the only synchronization: each worker owns its module and
/// HTTP client outright, and results are read in module order strictly
/// after all workers have finished.
async fn discover_all(modules: Vec<Box<dyn SubdomainModule>>, target: &str) -> Vec<String> {
    let mut workers = Vec::with_capacity(modules.len());
    for module in modules {
        let target = target.to_string();
        workers.push(tokio::spawn(
            async move { discover_one(module, &target).await },
        ));
    }

    let results: Vec<Option<Vec<String>>> = join_all(workers)
        .await
        .into_iter()
        .map(|worker| match worker {
            Ok(outcome) => outcome,
            Err(err) => {
                error!("module worker: {}", err);
                None
            }
        })
        .collect();

    normalize(merge(results))
}

async fn discover_one(module: Box<dyn SubdomainModule>, target: &str) -> Option<Vec<String>> {
    let http_client = match new_http_client() {
        Ok(http_client) => http_client,
        Err(err) => {
            error!("{}: building HTTP client: {}", module.name(), err);
            return None;
        }
    };

    info!("{}: starting subdomain discovery", module.name());
    let module_timeout = Duration::from_millis(MODULE_TIMEOUT_MS);
    match timeout(module_timeout, module.discover(&http_client, target)).await {
        Ok(Ok(subdomains)) => {
            info!("{}: {} subdomains found", module.name(), subdomains.len());
            Some(subdomains)
        }
        Ok(Err(err)) => {
            error!("{}: {}", module.name(), err);
            None
        }
        Err(_) => {
            error!("{}: no response after {}ms", module.name(), MODULE_TIMEOUT_MS);
            None
        }
    }
}

fn new_http_client() -> Result<Client> {
    let http_timeout = Duration::from_millis(HTTP_REQUEST_TIMEOUT_MS);
    let http_client = Client::builder()
        .timeout(http_timeout)
        // the session-token source needs its cookies carried across requests
        .cookie_store(true)
        .build()?;
    Ok(http_client)
}

/// First-seen-wins merge in module order, then within-module order.
///
/// A failed module (`None`) contributes nothing; an empty list is a
/// legitimate zero-result outcome and merges as such.
fn merge(results: Vec<Option<Vec<String>>>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for subdomains in results.into_iter().flatten() {
        for subdomain in subdomains {
            push_unique(&mut merged, subdomain);
        }
    }
    merged
}

/// Drop scrape artifacts carrying characters that cannot appear in a
/// hostname, then sort the remainder.
pub fn normalize(candidates: Vec<String>) -> Vec<String> {
    let mut subdomains: Vec<String> = candidates
        .into_iter()
        .filter(|candidate| {
            candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        })
        .collect();
    subdomains.sort();
    subdomains
}

// endregion:     --- Scan subfunctions

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Module;
    use crate::{Error, Result};
    use async_trait::async_trait;

    struct StubModule {
        name: &'static str,
        outcome: std::result::Result<Vec<&'static str>, ()>,
    }

    impl Module for StubModule {
        fn name(&self) -> String {
            self.name.to_string()
        }
        fn description(&self) -> String {
            "stub".to_string()
        }
    }

    #[async_trait]
    impl SubdomainModule for StubModule {
        async fn discover(&self, _http_client: &Client, _domain: &str) -> Result<Vec<String>> {
            match &self.outcome {
                Ok(subdomains) => Ok(subdomains.iter().map(|s| s.to_string()).collect()),
                Err(_) => Err(Error::InvalidHttpResponse(self.name())),
            }
        }
    }

    fn owned(subdomains: &[&str]) -> Option<Vec<String>> {
        Some(subdomains.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn merge_is_first_seen_wins_in_module_order() {
        let results = vec![
            owned(&["b.example.com", "a.example.com"]),
            owned(&["a.example.com", "c.example.com"]),
        ];

        assert_eq!(
            merge(results),
            vec!["b.example.com", "a.example.com", "c.example.com"]
        );
    }

    #[test]
    fn merge_skips_failed_modules_but_keeps_empty_results() {
        let results = vec![None, owned(&[]), owned(&["a.example.com"])];
        assert_eq!(merge(results), vec!["a.example.com"]);
    }

    #[test]
    fn normalize_filters_invalid_characters() {
        let candidates = vec![
            "ok.example.com".to_string(),
            "bad host.example.com".to_string(),
            "<td>.example.com".to_string(),
            "also-ok.example.com".to_string(),
        ];

        assert_eq!(
            normalize(candidates),
            vec!["also-ok.example.com", "ok.example.com"]
        );
    }

    #[test]
    fn normalize_sorts_lexicographically() {
        let candidates = vec![
            "z.example.com".to_string(),
            "a.example.com".to_string(),
            "m.example.com".to_string(),
        ];

        assert_eq!(
            normalize(candidates),
            vec!["a.example.com", "m.example.com", "z.example.com"]
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let candidates = vec![
            "b.example.com".to_string(),
            "bad$.example.com".to_string(),
            "a.example.com".to_string(),
        ];

        let once = normalize(candidates);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn all_modules_failing_yields_an_empty_result() {
        let modules: Vec<Box<dyn SubdomainModule>> = vec![
            Box::new(StubModule {
                name: "one",
                outcome: Err(()),
            }),
            Box::new(StubModule {
                name: "two",
                outcome: Err(()),
            }),
        ];

        let subdomains = discover_all(modules, "example.com").await;
        assert!(subdomains.is_empty());
    }

    #[tokio::test]
    async fn discover_all_merges_and_sorts_across_modules() {
        let modules: Vec<Box<dyn SubdomainModule>> = vec![
            Box::new(StubModule {
                name: "one",
                outcome: Ok(vec!["b.example.com", "a.example.com"]),
            }),
            Box::new(StubModule {
                name: "two",
                outcome: Err(()),
            }),
            Box::new(StubModule {
                name: "three",
                outcome: Ok(vec!["a.example.com", "c.example.com"]),
            }),
        ];

        let subdomains = discover_all(modules, "example.com").await;
        assert_eq!(
            subdomains,
            vec!["a.example.com", "b.example.com", "c.example.com"]
        );
    }
}
