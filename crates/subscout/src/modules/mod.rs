pub mod censys;
pub mod crtsh;
pub mod dnsdumpster;
pub mod search;
pub mod shodan;
pub mod threatcrowd;
pub mod virustotal;

use crate::modules::censys::Censys;
use crate::modules::crtsh::CrtSh;
use crate::modules::dnsdumpster::DnsDumpster;
use crate::modules::search::bing::Bing;
use crate::modules::search::google::Google;
use crate::modules::search::yahoo::Yahoo;
use crate::modules::shodan::Shodan;
use crate::modules::threatcrowd::ThreatCrowd;
use crate::modules::virustotal::VirusTotal;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::env;
use tracing::{debug, error, info, instrument};

pub trait Module {
    fn name(&self) -> String;
    fn description(&self) -> String;
}

#[async_trait]
pub trait SubdomainModule: Module + Send + Sync {
    async fn discover(&self, http_client: &Client, domain: &str) -> Result<Vec<String>>;
}

// region:        --- Credentials

/// Per-source API credentials. A missing credential silently disables the
/// source at module-set construction time.
pub struct ApiCredentials {
    pub virustotal_api_key: Option<String>,
    pub shodan_api_key: Option<String>,
    pub censys_app_id: Option<String>,
    pub censys_secret: Option<String>,
}

impl ApiCredentials {
    pub fn from_env() -> Self {
        Self {
            virustotal_api_key: read_env_key("VIRUSTOTAL_API_KEY"),
            shodan_api_key: read_env_key("SHODAN_API_KEY"),
            censys_app_id: read_env_key("CENSYS_APP_ID"),
            censys_secret: read_env_key("CENSYS_SECRET"),
        }
    }
}

fn read_env_key(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

// endregion:     --- Credentials

pub fn all_modules(credentials: &ApiCredentials, fast: bool) -> Vec<Box<dyn SubdomainModule>> {
    let mut modules: Vec<Box<dyn SubdomainModule>> = vec![
        Box::new(ThreatCrowd::new()),
        Box::new(CrtSh::new()),
        Box::new(DnsDumpster::new()),
        Box::new(Google::new(fast)),
        Box::new(Bing::new(fast)),
        Box::new(Yahoo::new(fast)),
    ];

    if let Some(api_key) = &credentials.virustotal_api_key {
        modules.push(Box::new(VirusTotal::new(api_key.clone(), fast)));
    }
    if let Some(api_key) = &credentials.shodan_api_key {
        modules.push(Box::new(Shodan::new(api_key.clone())));
    }
    if let (Some(app_id), Some(secret)) = (&credentials.censys_app_id, &credentials.censys_secret) {
        modules.push(Box::new(Censys::new(app_id.clone(), secret.clone(), fast)));
    }

    modules
}

pub fn display_all() {
    // placeholder keys so the keyed modules show up in the listing
    let credentials = ApiCredentials {
        virustotal_api_key: Some(String::new()),
        shodan_api_key: Some(String::new()),
        censys_app_id: Some(String::new()),
        censys_secret: Some(String::new()),
    };

    println!("\nSubdomain modules");
    for module in all_modules(&credentials, false) {
        println!("- {:25}{}", module.name(), module.description());
    }
}

// region:        --- HTTP requests

#[instrument(name = "HTTP_request", level = "info", skip_all, fields(url = url))]
pub async fn http_request(http_client: &Client, url: &str) -> Result<Response> {
    info!("Sending request");
    match http_client.get(url).send().await {
        Ok(res) => {
            info!("Receive with status: {}", res.status());
            debug!("Response: {:?}", res);
            Ok(res)
        }
        Err(err) => {
            error!("Reason: {}", err);
            Err(Error::Reqwest(err))
        }
    }
}

// endregion:     --- HTTP requests
