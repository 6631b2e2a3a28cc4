use serde::{Deserialize, Serialize};

/// Outcome of one top-level site crawl.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlResult {
    pub start_url: String,
    /// Unique addresses in discovery order, `mailto:` targets of a page first.
    pub emails: Vec<String>,
    pub visited: Vec<String>,
}

impl CrawlResult {
    pub fn new(start_url: String) -> Self {
        Self {
            start_url,
            ..Self::default()
        }
    }

    pub fn add_email(&mut self, email: String) {
        push_unique(&mut self.emails, email);
    }

    pub fn first_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }
}

pub(crate) fn push_unique(emails: &mut Vec<String>, email: String) {
    if !emails.contains(&email) {
        emails.push(email);
    }
}
