use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@(?:[A-Za-z0-9-]+\.)+[A-Za-z]{2,7}$").unwrap()
});

static EMAIL_SCAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,7}\b").unwrap()
});

/// Free webmail, disposable, placeholder and monitoring domains.
pub const DEFAULT_BLOCKED_DOMAINS: &[&str] = &[
    "ingest.sentry.io",
    "example.com",
    "test.com",
    "tempmail.com",
    "disposablemail.com",
    "protonmail.com",
    "gmail.com",
    "yahoo.com",
    "outlook.com",
    "hotmail.com",
    "aol.com",
    "icloud.com",
    "live.com",
];

/// Local parts longer than this that are pure hex look machine generated.
const HASH_LOCAL_PART_LEN: usize = 20;

#[derive(Debug, Clone)]
pub struct EmailValidator {
    blocked_domains: HashSet<String>,
}

impl EmailValidator {
    pub fn new<I, S>(blocked_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocked_domains: blocked_domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// True when `candidate` is well formed, not on the blocklist and not a
    /// hash-like tracking address.
    pub fn is_business_email(&self, candidate: &str) -> bool {
        if !EMAIL_SHAPE.is_match(candidate) {
            return false;
        }

        let Some((local, domain)) = candidate.split_once('@') else {
            return false;
        };

        if self.blocked_domains.contains(&domain.to_lowercase()) {
            return false;
        }

        !(local.len() > HASH_LOCAL_PART_LEN && local.chars().all(|c| c.is_ascii_hexdigit()))
    }

    /// Every valid business email in `text`, lowercased, deduplicated and in
    /// the order they appear.
    pub fn extract_emails(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        EMAIL_SCAN
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .filter(|candidate| self.is_business_email(candidate))
            .map(|candidate| candidate.to_lowercase())
            .filter(|email| seen.insert(email.clone()))
            .collect()
    }

    pub fn first_email(&self, text: &str) -> Option<String> {
        EMAIL_SCAN
            .find_iter(text)
            .map(|m| m.as_str().trim())
            .find(|candidate| self.is_business_email(candidate))
            .map(str::to_lowercase)
    }
}

impl Default for EmailValidator {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_DOMAINS)
    }
}
