use crate::discovery::DEFAULT_EXCLUDED_SITE_HOSTS;
use crate::error::{CoreError, Result};
use leadscout_scanner::email::DEFAULT_BLOCKED_DOMAINS;
use leadscout_scanner::search::SERPAPI_ENDPOINT;
use leadscout_scanner::enrichment::HUNTER_ENDPOINT;
use leadscout_scanner::pacing::MAX_INTERVAL;
use leadscout_scanner::{EmailValidator, Locale, Pacer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/leadscout/config.toml";
pub const DEFAULT_DATABASE_PATH: &str = "~/.local/share/leadscout/leads.db";

pub const MAX_SEARCH_PAGES: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub enrichment: EnrichmentConfig,
    pub network: NetworkConfig,
    pub pacing: PacingConfig,
    pub crawl: CrawlConfig,
    pub filters: FilterConfig,
    pub smtp: SmtpConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub language: String,
    pub country: String,
    pub max_pages: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: SERPAPI_ENDPOINT.to_string(),
            language: "en".to_string(),
            country: "us".to_string(),
            max_pages: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: HUNTER_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            user_agent: format!("leadscout/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Minimum spacing between successive requests, drawn from `[min_secs, max_secs]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub min_secs: f32,
    pub max_secs: f32,
}

impl Window {
    pub const fn new(min_secs: f32, max_secs: f32) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn pacer(&self) -> Pacer {
        Pacer::from_secs_f32(self.min_secs, self.max_secs)
    }

    fn validate(&self, section: &str) -> Result<()> {
        let limit = MAX_INTERVAL.as_secs_f32();
        for secs in [self.min_secs, self.max_secs] {
            if !secs.is_finite() || !(0.0..=limit).contains(&secs) {
                return Err(CoreError::InvalidConfig(format!(
                    "[pacing.{}] takes seconds between 0 and {}, got {}",
                    section, limit, secs
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub search: Window,
    pub lead: Window,
    pub send: Window,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            search: Window::new(1.0, 3.0),
            lead: Window::new(0.5, 1.5),
            send: Window::new(2.0, 5.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub max_depth: i32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: leadscout_scanner::crawler::DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub blocked_domains: Vec<String>,
    pub excluded_site_hosts: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            blocked_domains: DEFAULT_BLOCKED_DOMAINS.iter().map(|d| d.to_string()).collect(),
            excluded_site_hosts: DEFAULT_EXCLUDED_SITE_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_name: Option<String>,
    /// TLS from the first byte (port 465) rather than STARTTLS.
    pub implicit_tls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            username: None,
            password: None,
            from_name: None,
            implicit_tls: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE_PATH.to_string(),
        }
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    /// Reads `path` if it exists; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        debug!("Reading config file: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.pacing.search.validate("search")?;
        self.pacing.lead.validate("lead")?;
        self.pacing.send.validate("send")
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = non_empty(lookup("SERPAPI_KEY")) {
            self.search.api_key = Some(key);
        }
        if let Some(key) = non_empty(lookup("HUNTER_API_KEY")) {
            self.enrichment.api_key = Some(key);
        }
        if let Some(host) = non_empty(lookup("SMTP_HOST")) {
            self.smtp.host = host;
        }
        if let Some(port) = non_empty(lookup("SMTP_PORT")).and_then(|p| p.parse().ok()) {
            self.smtp.port = port;
        }
        if let Some(username) = non_empty(lookup("SMTP_USERNAME")) {
            self.smtp.username = Some(username);
        }
        if let Some(password) = non_empty(lookup("SMTP_PASSWORD")) {
            self.smtp.password = Some(password);
        }
    }

    pub fn require_search(&self) -> Result<&str> {
        self.search
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                CoreError::MissingConfig(
                    "search API key (set SERPAPI_KEY or [search].api_key)".to_string(),
                )
            })
    }

    pub fn require_smtp(&self) -> Result<(&str, &str)> {
        let username = self.smtp.username.as_deref().filter(|u| !u.trim().is_empty());
        let password = self.smtp.password.as_deref().filter(|p| !p.is_empty());
        match (username, password) {
            (Some(u), Some(p)) => Ok((u, p)),
            _ => Err(CoreError::MissingConfig(
                "SMTP credentials (set SMTP_USERNAME/SMTP_PASSWORD or [smtp] username/password)"
                    .to_string(),
            )),
        }
    }

    pub fn enrichment_key(&self) -> Option<&str> {
        self.enrichment
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs.max(1))
    }

    pub fn search_pages(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.search.max_pages)
            .clamp(1, MAX_SEARCH_PAGES)
    }

    pub fn locale(&self) -> Locale {
        Locale {
            language: self.search.language.clone(),
            country: self.search.country.clone(),
        }
    }

    pub fn validator(&self) -> EmailValidator {
        EmailValidator::new(&self.filters.blocked_domains)
    }

    pub fn database_path(&self) -> PathBuf {
        expand_path(&self.storage.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.search.max_pages, 2);
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 465);
        assert_eq!(config.crawl.max_depth, 1);
        assert_eq!(config.pacing.send, Window::new(2.0, 5.0));
        assert!(config.filters.blocked_domains.contains(&"gmail.com".to_string()));
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [search]
            api_key = "abc"
            max_pages = 4

            [smtp]
            port = 587
            implicit_tls = false
            "#,
        )
        .unwrap();
        assert_eq!(config.require_search().unwrap(), "abc");
        assert_eq!(config.search.language, "en");
        assert_eq!(config.search.max_pages, 4);
        assert_eq!(config.smtp.port, 587);
        assert!(!config.smtp.implicit_tls);
        assert_eq!(config.smtp.host, "smtp.gmail.com");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::from_toml("[search]\napi_key = \"from-file\"").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("SERPAPI_KEY", "from-env"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USERNAME", "me@acme.io"),
            ("SMTP_PASSWORD", "secret"),
            ("HUNTER_API_KEY", "  "),
        ]);
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.require_search().unwrap(), "from-env");
        assert_eq!(config.smtp.port, 2525);
        assert_eq!(config.require_smtp().unwrap(), ("me@acme.io", "secret"));
        assert_eq!(config.enrichment_key(), None);
    }

    #[test]
    fn test_missing_credentials_are_reported() {
        let config = Config::default();
        assert!(matches!(config.require_search(), Err(CoreError::MissingConfig(_))));
        assert!(matches!(config.require_smtp(), Err(CoreError::MissingConfig(_))));
    }

    #[test]
    fn test_search_pages_are_capped() {
        let config = Config::default();
        assert_eq!(config.search_pages(None), 2);
        assert_eq!(config.search_pages(Some(50)), MAX_SEARCH_PAGES);
        assert_eq!(config.search_pages(Some(0)), 1);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml("[search\napi_key="),
            Err(CoreError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_unbounded_pacing_is_rejected() {
        for toml in [
            "[pacing.search]\nmin_secs = 1.0\nmax_secs = inf\n",
            "[pacing.lead]\nmin_secs = nan\nmax_secs = 1.0\n",
            "[pacing.send]\nmin_secs = 2.0\nmax_secs = 1e30\n",
            "[pacing.send]\nmin_secs = -1.0\nmax_secs = 5.0\n",
        ] {
            assert!(
                matches!(Config::from_toml(toml), Err(CoreError::InvalidConfig(_))),
                "accepted {:?}",
                toml
            );
        }
    }

    #[test]
    fn test_pacing_windows_within_limit_are_kept() {
        let config = Config::from_toml("[pacing.search]\nmin_secs = 0.0\nmax_secs = 60.0\n").unwrap();
        assert_eq!(config.pacing.search, Window::new(0.0, 60.0));
        assert_eq!(config.pacing.lead, Window::new(0.5, 1.5));
        config.pacing.search.pacer();
    }

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let text = Config::default().to_toml().unwrap();
        let config = Config::from_toml(&text).unwrap();
        assert_eq!(config.search.endpoint, SERPAPI_ENDPOINT);
        assert_eq!(config.filters.excluded_site_hosts.len(), DEFAULT_EXCLUDED_SITE_HOSTS.len());
    }
}
