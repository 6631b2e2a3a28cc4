use crate::model::{EmailSource, Lead};
use crate::query;
use leadscout_scanner::error::Result as ScanResult;
use leadscout_scanner::search::collect_pages;
use leadscout_scanner::{
    CrawlResult, EmailValidator, EnrichmentService, Locale, Pacer, SearchHit, SearchProvider,
    SiteCrawler,
};
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info, warn};
use url::Url;

/// Social networks, encyclopedias and job boards that are never a company's own site.
pub const DEFAULT_EXCLUDED_SITE_HOSTS: &[&str] = &[
    "linkedin.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "youtube.com",
    "wikipedia.org",
    "glassdoor.com",
    "indeed.com",
];

/// Discovery stages in the order they are attempted.
pub const STAGES: [EmailSource; 4] = [
    EmailSource::Snippet,
    EmailSource::Enrichment,
    EmailSource::SiteCrawl,
    EmailSource::SecondarySearch,
];

/// Anything that can pull email addresses off a website.
pub trait SiteEmailCrawler {
    fn crawl_site(&self, url: &str) -> impl Future<Output = CrawlResult> + Send;
}

impl SiteEmailCrawler for SiteCrawler {
    fn crawl_site(&self, url: &str) -> impl Future<Output = CrawlResult> + Send {
        SiteCrawler::crawl_site(self, url)
    }
}

/// True when `link` plausibly is `company`'s own website: its host contains
/// the company name once both are reduced to lowercase alphanumerics, and the
/// host is not one of `excluded_hosts` or a subdomain of one.
pub fn site_matches_company<S: AsRef<str>>(link: &str, company: &str, excluded_hosts: &[S]) -> bool {
    let Some(host) = Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
    else {
        return false;
    };

    let excluded = excluded_hosts.iter().any(|e| {
        let e = e.as_ref().trim().to_lowercase();
        !e.is_empty() && (host == e || host.ends_with(&format!(".{}", e)))
    });
    if excluded {
        return false;
    }

    let company = squash(company);
    !company.is_empty() && squash(&host).contains(&company)
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Host of a site URL without a leading `www.`.
pub fn site_domain(site: &str) -> Option<String> {
    let url = Url::parse(site).ok()?;
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// One page of results for `query`, paced like every other search request.
async fn search_once<S: SearchProvider + Sync>(
    search: &S,
    query: &str,
    locale: &Locale,
    pacer: &Pacer,
) -> ScanResult<Vec<SearchHit>> {
    collect_pages(search, query, locale, 1, pacer).await
}

/// Finds a company's official website through the search provider.
pub struct DomainResolver<'a, S> {
    search: &'a S,
    pacer: &'a Pacer,
    locale: Locale,
    excluded_hosts: Vec<String>,
}

impl<'a, S: SearchProvider + Sync> DomainResolver<'a, S> {
    pub fn new(search: &'a S, pacer: &'a Pacer) -> Self {
        Self {
            search,
            pacer,
            locale: Locale::default(),
            excluded_hosts: DEFAULT_EXCLUDED_SITE_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_excluded_hosts(mut self, hosts: Vec<String>) -> Self {
        self.excluded_hosts = hosts;
        self
    }

    /// First result link that looks like the company's own site, if any.
    pub async fn find_company_site(&self, company: &str) -> ScanResult<Option<String>> {
        let company = company.trim();
        if company.is_empty() {
            return Ok(None);
        }

        let query = query::company_site_query(company);
        let hits = search_once(self.search, &query, &self.locale, self.pacer).await?;
        let site = hits
            .into_iter()
            .map(|hit| hit.link)
            .find(|link| site_matches_company(link, company, self.excluded_hosts.as_slice()));

        match &site {
            Some(site) => debug!("Resolved '{}' to {}", company, site),
            None => debug!("No website found for '{}'", company),
        }
        Ok(site)
    }
}

/// Company name to resolved website, kept for the length of one run so each
/// company is looked up at most once.
#[derive(Debug, Default)]
pub struct SiteCache {
    sites: HashMap<String, Option<String>>,
}

impl SiteCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(company: &str) -> String {
        company.trim().to_lowercase()
    }

    pub fn get(&self, company: &str) -> Option<Option<&str>> {
        self.sites.get(&Self::key(company)).map(|s| s.as_deref())
    }

    pub fn insert(&mut self, company: &str, site: Option<String>) {
        self.sites.insert(Self::key(company), site);
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// What earlier stages learned about the lead's company.
#[derive(Debug, Default)]
struct DiscoveryState {
    site: Option<String>,
}

/// Runs the ordered fallback chain that fills in a lead's email.
pub struct EmailDiscovery<'a, S, E, C> {
    search: &'a S,
    enrichment: Option<&'a E>,
    crawler: &'a C,
    validator: &'a EmailValidator,
    resolver: DomainResolver<'a, S>,
    locale: Locale,
    pacer: &'a Pacer,
}

impl<'a, S, E, C> EmailDiscovery<'a, S, E, C>
where
    S: SearchProvider + Sync,
    E: EnrichmentService + Sync,
    C: SiteEmailCrawler + Sync,
{
    /// `pacer` spaces out every search request the chain issues.
    pub fn new(
        search: &'a S,
        enrichment: Option<&'a E>,
        crawler: &'a C,
        validator: &'a EmailValidator,
        pacer: &'a Pacer,
    ) -> Self {
        Self {
            search,
            enrichment,
            crawler,
            validator,
            resolver: DomainResolver::new(search, pacer),
            locale: Locale::default(),
            pacer,
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.resolver = self.resolver.with_locale(locale.clone());
        self.locale = locale;
        self
    }

    pub fn with_excluded_hosts(mut self, hosts: Vec<String>) -> Self {
        self.resolver = self.resolver.with_excluded_hosts(hosts);
        self
    }

    /// Tries each stage in order until one produces a valid address. A lead
    /// that already has an email is left untouched. Returns the stage that
    /// supplied the email, or `None` when every stage came up empty.
    pub async fn resolve_email(&self, lead: &mut Lead, cache: &mut SiteCache) -> Option<EmailSource> {
        if lead.email.is_some() {
            return lead.email_source;
        }

        let mut state = DiscoveryState::default();
        for stage in STAGES {
            if let Some(email) = self.run_stage(stage, lead, &mut state, cache).await {
                info!("Found {} for '{}' via {}", email, lead.name, stage.as_str());
                lead.set_email(email, stage);
                return Some(stage);
            }
        }

        debug!("No email found for '{}' ({})", lead.name, lead.company);
        None
    }

    async fn run_stage(
        &self,
        stage: EmailSource,
        lead: &Lead,
        state: &mut DiscoveryState,
        cache: &mut SiteCache,
    ) -> Option<String> {
        match stage {
            EmailSource::Snippet => self.validator.first_email(&lead.snippet),
            EmailSource::Enrichment => {
                state.site = self.company_site(&lead.company, cache).await;
                self.enrich(state.site.as_deref()?).await
            }
            EmailSource::SiteCrawl => {
                let site = state.site.as_deref()?;
                let result = self.crawler.crawl_site(site).await;
                result
                    .emails
                    .iter()
                    .find(|e| self.validator.is_business_email(e))
                    .cloned()
            }
            EmailSource::SecondarySearch => self.search_contact_email(lead).await,
        }
    }

    async fn company_site(&self, company: &str, cache: &mut SiteCache) -> Option<String> {
        if company.trim().is_empty() {
            return None;
        }
        if let Some(cached) = cache.get(company) {
            return cached.map(str::to_string);
        }

        match self.resolver.find_company_site(company).await {
            Ok(site) => {
                cache.insert(company, site.clone());
                site
            }
            Err(e) => {
                warn!("Website lookup for '{}' failed: {}", company, e);
                None
            }
        }
    }

    async fn enrich(&self, site: &str) -> Option<String> {
        let enrichment = self.enrichment?;
        let domain = site_domain(site)?;

        match enrichment.domain_emails(&domain).await {
            Ok(candidates) => candidates
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .find(|e| self.validator.is_business_email(e)),
            Err(e) => {
                warn!("Enrichment lookup for {} failed: {}", domain, e);
                None
            }
        }
    }

    async fn search_contact_email(&self, lead: &Lead) -> Option<String> {
        if lead.company.trim().is_empty() {
            return None;
        }

        let query = query::contact_email_query(&lead.name, &lead.company);
        match search_once(self.search, &query, &self.locale, self.pacer).await {
            Ok(hits) => hits
                .iter()
                .find_map(|hit| self.validator.first_email(&hit.snippet)),
            Err(e) => {
                warn!("Contact search '{}' failed: {}", query, e);
                None
            }
        }
    }
}
