use crate::error::{Result, ScanError};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const HUNTER_ENDPOINT: &str = "https://api.hunter.io/v2/domain-search";

pub trait EnrichmentService {
    fn domain_emails(&self, domain: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

#[derive(Debug, Deserialize)]
struct HunterResponse {
    #[serde(default)]
    data: Option<HunterData>,
}

#[derive(Debug, Deserialize)]
struct HunterData {
    #[serde(default)]
    emails: Vec<HunterEmail>,
}

#[derive(Debug, Deserialize)]
struct HunterEmail {
    value: Option<String>,
}

pub struct HunterClient {
    client: Client,
    api_key: String,
    endpoint: Url,
}

impl HunterClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = Url::parse(HUNTER_ENDPOINT)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", HUNTER_ENDPOINT, e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = Url::parse(endpoint)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        Ok(self)
    }
}

impl EnrichmentService for HunterClient {
    async fn domain_emails(&self, domain: &str) -> Result<Vec<String>> {
        debug!("Enrichment lookup for {}", domain);

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("domain", domain), ("api_key", self.api_key.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(ScanError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(ScanError::RateLimited),
            status => {
                return Err(ScanError::UnexpectedStatus {
                    status: status.as_u16(),
                    body: String::new(),
                });
            }
        }

        let body = response.text().await?;
        let parsed: HunterResponse =
            serde_json::from_str(&body).map_err(|e| ScanError::ParseError(e.to_string()))?;

        Ok(parsed
            .data
            .map(|d| d.emails.into_iter().filter_map(|e| e.value).collect())
            .unwrap_or_default())
    }
}
