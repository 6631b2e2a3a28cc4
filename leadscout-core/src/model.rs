use crate::parse;
use leadscout_scanner::EmailValidator;
pub use leadscout_scanner::SearchHit;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailSource {
    Snippet,
    Enrichment,
    SiteCrawl,
    SecondarySearch,
}

impl EmailSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailSource::Snippet => "snippet",
            EmailSource::Enrichment => "enrichment",
            EmailSource::SiteCrawl => "site_crawl",
            EmailSource::SecondarySearch => "secondary_search",
        }
    }

}

impl FromStr for EmailSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snippet" => Ok(EmailSource::Snippet),
            "enrichment" => Ok(EmailSource::Enrichment),
            "site_crawl" => Ok(EmailSource::SiteCrawl),
            "secondary_search" => Ok(EmailSource::SecondarySearch),
            other => Err(format!("unknown email source '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    pub title: String,
    pub company: String,
    pub email: Option<String>,
    pub email_source: Option<EmailSource>,
    pub phone: Option<String>,
    pub linkedin_url: String,
    pub snippet: String,
}

impl Lead {
    pub fn from_hit(hit: &SearchHit, validator: &EmailValidator) -> Self {
        let fields = parse::parse(hit);
        let mut lead = Lead {
            name: fields.name,
            title: fields.title,
            company: fields.company,
            email: None,
            email_source: None,
            phone: parse::extract_phone(&hit.snippet),
            linkedin_url: hit.link.clone(),
            snippet: hit.snippet.clone(),
        };
        if let Some(email) = validator.first_email(&hit.snippet) {
            lead.set_email(email, EmailSource::Snippet);
        }
        lead
    }

    pub fn set_email(&mut self, email: String, source: EmailSource) -> bool {
        if self.email.is_some() {
            return false;
        }
        self.email = Some(email.trim().to_lowercase());
        self.email_source = Some(source);
        true
    }

    pub fn is_complete(&self, validator: &EmailValidator) -> bool {
        self.email
            .as_deref()
            .map(|e| validator.is_business_email(e))
            .unwrap_or(false)
    }

    pub fn first_name(&self) -> Option<&str> {
        self.name.split_whitespace().next()
    }
}
