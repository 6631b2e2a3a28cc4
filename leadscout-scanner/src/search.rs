use crate::error::{Result, ScanError};
use crate::pacing::Pacer;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search";
pub const RESULTS_PER_PAGE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub language: String,
    pub country: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            country: "us".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub page_index: usize,
    pub locale: Locale,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, page_index: usize, locale: Locale) -> Self {
        Self {
            query: query.into(),
            page_index,
            locale,
        }
    }
}

pub trait SearchProvider {
    /// Fetch a single page of results. An empty vector means the result set is exhausted.
    fn search_page(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = Result<Vec<SearchHit>>> + Send;
}

/// Walks pages `0..max_pages`, pacing between requests, until a page comes
/// back empty. A failure after the first page stops pagination and keeps what
/// was collected; a failure on the first page is returned to the caller.
pub async fn collect_pages<P: SearchProvider + Sync>(
    provider: &P,
    query: &str,
    locale: &Locale,
    max_pages: usize,
    pacer: &Pacer,
) -> Result<Vec<SearchHit>> {
    let mut hits = Vec::new();

    for page_index in 0..max_pages {
        pacer.wait().await;
        let request = SearchRequest::new(query, page_index, locale.clone());

        match provider.search_page(&request).await {
            Ok(page) if page.is_empty() => {
                debug!("No more results after page {}", page_index + 1);
                break;
            }
            Ok(page) => {
                debug!("Page {}: {} results", page_index + 1, page.len());
                hits.extend(page);
            }
            Err(e) if page_index == 0 => return Err(e),
            Err(e) => {
                warn!("Search for '{}' stopped at page {}: {}", query, page_index + 1, e);
                break;
            }
        }
    }

    info!("Search '{}' collected {} results", query, hits.len());
    Ok(hits)
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    error: Option<String>,
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

impl From<OrganicResult> for SearchHit {
    fn from(result: OrganicResult) -> Self {
        Self {
            title: result.title.unwrap_or_default(),
            link: result.link.unwrap_or_default(),
            snippet: result.snippet.unwrap_or_default(),
        }
    }
}

pub struct SerpApiClient {
    client: Client,
    api_key: String,
    endpoint: Url,
}

impl SerpApiClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .build()?;
        let endpoint = Url::parse(SERPAPI_ENDPOINT)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", SERPAPI_ENDPOINT, e)))?;

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

impl SearchProvider for SerpApiClient {
    async fn search_page(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let start = (request.page_index * RESULTS_PER_PAGE).to_string();
        let num = RESULTS_PER_PAGE.to_string();
        debug!("SerpAPI request: q='{}' start={}", request.query, start);

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("engine", "google"),
                ("q", request.query.as_str()),
                ("api_key", self.api_key.as_str()),
                ("start", start.as_str()),
                ("hl", request.locale.language.as_str()),
                ("gl", request.locale.country.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(ScanError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => return Err(ScanError::RateLimited),
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(ScanError::UnexpectedStatus {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                });
            }
        }

        let is_json = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Err(ScanError::ParseError(
                "expected a JSON response from the search provider".to_string(),
            ));
        }

        let body = response.text().await?;
        let parsed: SerpResponse =
            serde_json::from_str(&body).map_err(|e| ScanError::ParseError(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(ScanError::Provider(error));
        }

        Ok(parsed
            .organic_results
            .into_iter()
            .map(SearchHit::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    async fn client_for(server: &MockServer) -> SerpApiClient {
        SerpApiClient::new("test-key", Duration::from_secs(5))
            .unwrap()
            .with_endpoint(&format!("{}/search", server.uri()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_parses_organic_results() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "organic_results": [
                {"title": "Jane Doe - CFO", "link": "https://www.linkedin.com/in/jane", "snippet": "CFO at Acme"},
                {"title": "No snippet", "link": "https://example.org"}
            ]
        });
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("engine", "google"))
            .and(query_param("q", "cfo"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("start", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let hits = client
            .search_page(&SearchRequest::new("cfo", 1, Locale::default()))
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Jane Doe - CFO");
        assert_eq!(hits[0].snippet, "CFO at Acme");
        assert_eq!(hits[1].snippet, "");
    }

    #[tokio::test]
    async fn test_classifies_status_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "denied"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "busy"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let run = |q: &'static str| SearchRequest::new(q, 0, Locale::default());

        assert!(matches!(
            client.search_page(&run("denied")).await,
            Err(ScanError::Unauthorized)
        ));
        assert!(matches!(
            client.search_page(&run("busy")).await,
            Err(ScanError::RateLimited)
        ));
        assert!(matches!(
            client.search_page(&run("broken")).await,
            Err(ScanError::UnexpectedStatus { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_provider_error_field_and_non_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "quota"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"error": "Run out of searches"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        match client
            .search_page(&SearchRequest::new("quota", 0, Locale::default()))
            .await
        {
            Err(ScanError::Provider(msg)) => assert!(msg.contains("Run out")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            client
                .search_page(&SearchRequest::new("html", 0, Locale::default()))
                .await,
            Err(ScanError::ParseError(_))
        ));
    }

    /// Serves a fixed list of pages and records which page indexes were requested.
    struct PagedProvider {
        pages: Vec<Result<Vec<SearchHit>>>,
        requested: Mutex<Vec<usize>>,
    }

    impl SearchProvider for PagedProvider {
        async fn search_page(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
            self.requested.lock().unwrap().push(request.page_index);
            match self.pages.get(request.page_index) {
                Some(Ok(hits)) => Ok(hits.clone()),
                Some(Err(_)) => Err(ScanError::RateLimited),
                None => Ok(Vec::new()),
            }
        }
    }

    fn hit(n: usize) -> SearchHit {
        SearchHit {
            title: format!("Result {}", n),
            link: format!("https://example.org/{}", n),
            snippet: String::new(),
        }
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_empty_page() {
        let provider = PagedProvider {
            pages: vec![Ok(vec![hit(1), hit(2)]), Ok(vec![]), Ok(vec![hit(3)])],
            requested: Mutex::new(Vec::new()),
        };
        let hits = collect_pages(&provider, "q", &Locale::default(), 5, &Pacer::disabled())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(*provider.requested.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_collect_pages_respects_page_cap() {
        let provider = PagedProvider {
            pages: vec![Ok(vec![hit(1)]), Ok(vec![hit(2)]), Ok(vec![hit(3)])],
            requested: Mutex::new(Vec::new()),
        };
        let hits = collect_pages(&provider, "q", &Locale::default(), 2, &Pacer::disabled())
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_collect_pages_keeps_results_after_later_failure() {
        let provider = PagedProvider {
            pages: vec![Ok(vec![hit(1)]), Err(ScanError::RateLimited)],
            requested: Mutex::new(Vec::new()),
        };
        let hits = collect_pages(&provider, "q", &Locale::default(), 5, &Pacer::disabled())
            .await
            .unwrap();
        assert_eq!(hits, vec![hit(1)]);

        let failing = PagedProvider {
            pages: vec![Err(ScanError::RateLimited)],
            requested: Mutex::new(Vec::new()),
        };
        assert!(
            collect_pages(&failing, "q", &Locale::default(), 5, &Pacer::disabled())
                .await
                .is_err()
        );
    }
}
