use crate::email::EmailValidator;
use crate::error::{Result, ScanError};
use crate::result::{CrawlResult, push_unique};
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Substrings (matched case-insensitively against href) of pages worth a second look.
const FOLLOW_HINTS: &[&str] = &["contact", "about"];

/// Elements whose boundaries separate words in the rendered text. Inline
/// elements join their neighbours directly, so `info<span>@</span>acme.com`
/// reads as one address.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "dd", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "head", "header", "hr", "li", "main", "nav", "ol", "option", "p", "pre", "section",
    "select", "table", "tbody", "td", "tfoot", "th", "thead", "title", "tr", "ul",
];

/// Root page plus at most one hop to a contact/about page.
pub const DEFAULT_MAX_DEPTH: i32 = 1;

/// Visited set for a single crawl tree.
#[derive(Debug, Default)]
pub struct CrawlState {
    visited: HashSet<String>,
    order: Vec<String>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `url` visited; false if it already was.
    fn visit(&mut self, url: &str) -> bool {
        if self.visited.insert(url.to_string()) {
            self.order.push(url.to_string());
            true
        } else {
            false
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    pub fn into_visited(self) -> Vec<String> {
        self.order
    }
}

/// What one fetched page offers.
#[derive(Debug, Default)]
struct PageScan {
    emails: Vec<String>,
    follow_links: Vec<String>,
}

/// Pulls business emails off a company website.
pub struct SiteCrawler {
    client: Client,
    validator: EmailValidator,
    max_depth: i32,
}

impl SiteCrawler {
    pub fn new(validator: EmailValidator, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            validator,
            max_depth: DEFAULT_MAX_DEPTH,
        })
    }

    pub fn with_max_depth(mut self, depth: i32) -> Self {
        self.max_depth = depth;
        self
    }

    /// Crawls `domain_or_url` with a fresh visited set and the configured depth.
    pub async fn crawl_site(&self, domain_or_url: &str) -> CrawlResult {
        let start_url = match normalize_start_url(domain_or_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Not crawling '{}': {}", domain_or_url, e);
                return CrawlResult::new(domain_or_url.to_string());
            }
        };

        info!("Crawling {} (max depth {})", start_url, self.max_depth);
        let mut state = CrawlState::new();
        let emails = self.crawl(start_url.clone(), self.max_depth, &mut state).await;
        info!(
            "Crawl of {} finished: {} pages, {} emails",
            start_url,
            state.len(),
            emails.len()
        );

        CrawlResult {
            start_url,
            emails,
            visited: state.into_visited(),
        }
    }

    /// Recursive step. Follows contact/about links only when the page itself
    /// yields nothing, and stops at the first link that produces emails.
    pub fn crawl<'a>(
        &'a self,
        url: String,
        max_depth: i32,
        state: &'a mut CrawlState,
    ) -> BoxFuture<'a, Vec<String>> {
        async move {
            if max_depth < 0 || !state.visit(&url) {
                return Vec::new();
            }

            let html = match self.fetch(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Could not access {}: {}", url, e);
                    return Vec::new();
                }
            };

            let PageScan {
                mut emails,
                follow_links,
            } = self.inspect_page(&html, &url);
            debug!("{}: {} emails, {} candidate links", url, emails.len(), follow_links.len());

            if emails.is_empty() && max_depth > 0 {
                for next_url in follow_links {
                    if state.contains(&next_url) {
                        continue;
                    }
                    let found = self.crawl(next_url, max_depth - 1, state).await;
                    if !found.is_empty() {
                        for email in found {
                            push_unique(&mut emails, email);
                        }
                        break;
                    }
                }
            }

            emails
        }
        .boxed()
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    fn inspect_page(&self, html: &str, page_url: &str) -> PageScan {
        let document = Html::parse_document(html);
        let mut scan = PageScan::default();

        let base = Url::parse(page_url).ok().and_then(|u| u.join("/").ok());

        for element in document.select(&LINK_SELECTOR) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let href = href.trim();

            if let Some(target) = strip_mailto(href) {
                let address = target.split('?').next().unwrap_or_default().trim();
                if self.validator.is_business_email(address) {
                    push_unique(&mut scan.emails, address.to_lowercase());
                }
                continue;
            }

            let lowered = href.to_lowercase();
            if !FOLLOW_HINTS.iter().any(|hint| lowered.contains(hint)) {
                continue;
            }
            if let Some(next_url) = base.as_ref().and_then(|b| resolve_link(b, href))
                && !scan.follow_links.contains(&next_url)
            {
                scan.follow_links.push(next_url);
            }
        }

        for email in self.validator.extract_emails(&visible_text(&document)) {
            push_unique(&mut scan.emails, email);
        }
        scan
    }
}

fn strip_mailto(href: &str) -> Option<&str> {
    let prefix = href.get(..7)?;
    prefix.eq_ignore_ascii_case("mailto:").then(|| &href[7..])
}

/// Text content of the page, skipping script and style bodies.
fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    push_text(document.root_element(), &mut text);
    text
}

fn push_text(element: ElementRef<'_>, text: &mut String) {
    for child in element.children() {
        if let Some(fragment) = child.value().as_text() {
            text.push_str(fragment);
            continue;
        }
        let Some(child_element) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child_element.value().name();
        if matches!(name, "script" | "style" | "noscript" | "template") {
            continue;
        }
        let block = BLOCK_ELEMENTS.contains(&name);
        if block {
            separate(text);
        }
        push_text(child_element, text);
        if block {
            separate(text);
        }
    }
}

fn separate(text: &mut String) {
    if !text.is_empty() && !text.ends_with(char::is_whitespace) {
        text.push(' ');
    }
}

fn resolve_link(base: &Url, href: &str) -> Option<String> {
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

/// Accepts a bare domain or a URL and returns a canonical `http(s)` URL string.
pub fn normalize_start_url(domain_or_url: &str) -> Result<String> {
    let trimmed = domain_or_url.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&candidate)
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", domain_or_url, e)))?;
    if url.host_str().is_none() || !matches!(url.scheme(), "http" | "https") {
        return Err(ScanError::InvalidUrl(domain_or_url.to_string()));
    }
    url.set_fragment(None);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn crawler() -> SiteCrawler {
        SiteCrawler::new(EmailValidator::default(), Duration::from_secs(5), "leadscout-test").unwrap()
    }

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(body.as_bytes()),
            )
            .mount(server)
            .await;
    }

    async fn requested_paths(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_emails_on_root_page_stop_the_crawl() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body>
                <a href="mailto:Sales@Acme.com?subject=Hi">Mail us</a>
                <p>Press: press@acme.com</p>
                <a href="/contact">Contact</a>
            </body></html>"#,
        )
        .await;

        let result = crawler().crawl_site(&server.uri()).await;

        assert_eq!(result.emails, vec!["sales@acme.com", "press@acme.com"]);
        assert_eq!(requested_paths(&server).await, vec!["/"]);
    }

    #[tokio::test]
    async fn test_follows_contact_link_one_level() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><a href="/pricing">Pricing</a><a href="/Contact-Us">Contact</a></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/Contact-Us",
            "<html><body>Write to hello@acme.io</body></html>",
        )
        .await;

        let result = crawler().crawl_site(&server.uri()).await;

        assert_eq!(result.first_email(), Some("hello@acme.io"));
        assert_eq!(requested_paths(&server).await, vec!["/", "/Contact-Us"]);
    }

    #[tokio::test]
    async fn test_first_successful_link_short_circuits() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><a href="/contact">C</a><a href="/about">A</a></body></html>"#,
        )
        .await;
        mount_page(&server, "/contact", "<p>team@acme.io</p>").await;
        mount_page(&server, "/about", "<p>about@acme.io</p>").await;

        let result = crawler().crawl_site(&server.uri()).await;

        assert_eq!(result.emails.len(), 1);
        assert!(!requested_paths(&server).await.contains(&"/about".to_string()));
    }

    #[tokio::test]
    async fn test_cycles_never_revisit_a_page() {
        let server = MockServer::start().await;
        let links = r#"<a href="/">Home</a><a href="/about">About</a><a href="/contact">Contact</a>
                       <a href="/about#team">About team</a>"#;
        mount_page(&server, "/", &format!("<html><body>{}</body></html>", links)).await;
        mount_page(&server, "/about", &format!("<html><body>{}</body></html>", links)).await;
        mount_page(&server, "/contact", &format!("<html><body>{}</body></html>", links)).await;

        let result = crawler().with_max_depth(5).crawl_site(&server.uri()).await;

        assert!(result.emails.is_empty());
        let paths = requested_paths(&server).await;
        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(paths.len(), unique.len(), "revisited a page: {:?}", paths);
        assert_eq!(result.visited.len(), 3);
    }

    #[tokio::test]
    async fn test_depth_budget_bounds_recursion() {
        let server = MockServer::start().await;
        mount_page(&server, "/", r#"<a href="/about-1">About</a>"#).await;
        mount_page(&server, "/about-1", r#"<a href="/about-2">More</a>"#).await;
        mount_page(&server, "/about-2", "<p>deep@acme.io</p>").await;

        let shallow = crawler().crawl_site(&server.uri()).await;
        assert!(shallow.emails.is_empty());
        assert!(!requested_paths(&server).await.contains(&"/about-2".to_string()));

        let deep = crawler().with_max_depth(2).crawl_site(&server.uri()).await;
        assert_eq!(deep.first_email(), Some("deep@acme.io"));
    }

    #[tokio::test]
    async fn test_negative_depth_and_visited_urls_return_nothing() {
        let server = MockServer::start().await;
        mount_page(&server, "/", "<p>root@acme.io</p>").await;

        let crawler = crawler();
        let url = format!("{}/", server.uri());

        let mut state = CrawlState::new();
        assert!(crawler.crawl(url.clone(), -1, &mut state).await.is_empty());
        assert!(state.is_empty());

        let mut state = CrawlState::new();
        assert_eq!(crawler.crawl(url.clone(), 0, &mut state).await.len(), 1);
        assert!(crawler.crawl(url, 0, &mut state).await.is_empty());
        assert_eq!(requested_paths(&server).await.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = crawler().crawl_site(&server.uri()).await;
        assert!(result.emails.is_empty());
        assert_eq!(result.visited.len(), 1);
    }

    #[test]
    fn test_inspect_page_filters_and_skips_scripts() {
        let crawler = crawler();
        let html = r#"<html><head><script>var x = "tracker@acme.io";</script></head>
            <body>
              <a href="MAILTO:someone@gmail.com">Personal</a>
              <a href="mailto:">Empty</a>
              <a href="mailto:contact@acme.io">Team</a>
              <a href="https://acme.io/about-us#top">About</a>
              <a href="https://acme.io/about-us">About again</a>
              <a href="tel:+123456789">Call</a>
              <span>info@acme.io</span>
            </body></html>"#;

        let scan = crawler.inspect_page(html, "https://acme.io/products/widgets");

        assert_eq!(scan.emails, vec!["contact@acme.io", "info@acme.io"]);
        assert_eq!(scan.follow_links, vec!["https://acme.io/about-us"]);
    }

    #[test]
    fn test_inspect_page_joins_inline_fragments() {
        let crawler = crawler();
        let html = "<p>Write to info<span>@</span>acme.com or sales@<b>acme.com</b></p>\
                    <ul><li>team@acme.com</li><li>jobs@acme.com</li></ul>";

        let scan = crawler.inspect_page(html, "https://acme.com/");

        assert_eq!(
            scan.emails,
            vec!["info@acme.com", "sales@acme.com", "team@acme.com", "jobs@acme.com"]
        );
    }

    #[test]
    fn test_block_elements_keep_words_apart() {
        let document = Html::parse_document(
            "<div>Sales</div><div>sales@acme.com</div><p>Call<br>us</p><script>x@y.io</script>",
        );
        let text = visible_text(&document);
        assert!(text.contains("Sales sales@acme.com"), "{:?}", text);
        assert!(text.contains("Call us"), "{:?}", text);
        assert!(!text.contains("x@y.io"));
    }

    #[test]
    fn test_mailto_target_comes_before_body_text() {
        let crawler = crawler();
        let html = r#"<p>Report abuse to abuse@acme.io, careers@acme.io for jobs.</p>
            <a href="mailto:sales@acme.io">Email sales</a>"#;

        let scan = crawler.inspect_page(html, "https://acme.io/");

        assert_eq!(scan.emails, vec!["sales@acme.io", "abuse@acme.io", "careers@acme.io"]);
    }

    #[test]
    fn test_relative_links_resolve_against_site_root() {
        let crawler = crawler();
        let html = r#"<a href="contact.html">Contact</a>"#;
        let scan = crawler.inspect_page(html, "https://acme.io/products/widgets");
        assert_eq!(scan.follow_links, vec!["https://acme.io/contact.html"]);
    }

    #[test]
    fn test_contact_links_on_other_hosts_are_followed() {
        let crawler = crawler();
        let html = r#"<a href="https://forms.example-host.com/contact-acme">Contact us</a>
            <a href="https://blog.other.com/news">News</a>"#;
        let scan = crawler.inspect_page(html, "https://acme.io/");
        assert_eq!(scan.follow_links, vec!["https://forms.example-host.com/contact-acme"]);
    }

    #[test]
    fn test_normalize_start_url() {
        assert_eq!(normalize_start_url("acme.io").unwrap(), "https://acme.io/");
        assert_eq!(
            normalize_start_url("http://acme.io/contact#x").unwrap(),
            "http://acme.io/contact"
        );
        assert!(normalize_start_url("ftp://acme.io").is_err());
        assert!(normalize_start_url("").is_err());
    }
}
