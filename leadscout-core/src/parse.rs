use crate::model::SearchHit;
use regex::Regex;
use std::sync::LazyLock;

/// The professional network whose profile pages the searches target.
pub const NETWORK_BRAND: &str = "linkedin";

/// URL fragments identifying an individual's profile page.
pub const PROFILE_MARKERS: &[&str] = &["linkedin.com/in/"];

/// Seniority and role vocabulary. Multi-word phrases come first so the
/// longest phrase wins at a given position.
pub const ROLE_KEYWORDS: &[&str] = &[
    r"chief\s+\w+(?:\s+\w+)?\s+officer",
    r"vice\s+president",
    r"managing\s+director",
    r"general\s+manager",
    r"head\s+of\s+[\w&]+",
    r"board\s+member",
    r"co-?founder",
    "ceo",
    "cto",
    "cfo",
    "coo",
    "cmo",
    "cio",
    "ciso",
    "evp",
    "svp",
    "vp",
    "president",
    "chairman",
    "chairwoman",
    "director",
    "manager",
    "head",
    "founder",
    "officer",
    "partner",
    "owner",
    "principal",
    "executive",
    "consultant",
    "advisor",
    "analyst",
    "engineer",
    "specialist",
];

static ROLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", ROLE_KEYWORDS.join("|"))).unwrap()
});

/// Title separators: pipes, en/em dashes, and hyphens with whitespace on at
/// least one side (so hyphenated names survive).
static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[|–—]\s*|\s+[-‐‑]\s*|\s*[-‐‑]\s+").unwrap());

static TRAILING_AT_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:at|@)\s+.*$").unwrap());

static NAME_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*((?:[\w']+(?:-[\w']+)*)(?:[ ]+[\w']+(?:-[\w']+)*)*)").unwrap()
});

const COMPANY_CHARS: &str = r"[A-Za-z0-9&.,'() \-]+";

/// "at <company>" / "@ <company>", searched in the title and then the snippet.
static AT_COMPANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)(?:\bat|@)\s+({})", COMPANY_CHARS)).unwrap());

/// Fallback snippet patterns, tried in order.
pub static SNIPPET_COMPANY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("works_at", r"(?i)\bworks\s+(?:at|for)\s*[:\-]?\s*"),
        ("at", r"(?i)\bat\b\s*[:\-]?\s*"),
        ("handle", r"(?:^|\s)@\s*"),
        ("for", r"(?i)\bfor\s+"),
        ("with", r"(?i)\bwith\s+"),
    ]
    .into_iter()
    .map(|(label, prefix)| {
        let pattern = Regex::new(&format!("{}({})", prefix, COMPANY_CHARS)).unwrap();
        (label, pattern)
    })
    .collect()
});

/// Marketing boilerplate stripped from company candidates.
static COMPANY_BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)official\s+website|careers|about\s+us|{}|profile",
        NETWORK_BRAND
    ))
    .unwrap()
});

static LEGAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:llc|inc|ltd|corp|pvt|gmbh|sa)\b\.?").unwrap());

const BOILERPLATE_WORDS: &[&str] = &["profile", "official", "website", "careers"];

/// Where a company candidate stops: the next clause or title segment.
const CLAUSE_BREAKS: &[&str] = &[" - ", ". ", ", ", " | ", " · "];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFields {
    pub name: String,
    pub title: String,
    pub company: String,
}

pub fn is_profile_link(link: &str) -> bool {
    let link = link.to_lowercase();
    PROFILE_MARKERS.iter().any(|marker| link.contains(marker))
}

pub fn parse(hit: &SearchHit) -> ParsedFields {
    let (name, role, company) = if is_profile_link(&hit.link) {
        parse_profile_title(&hit.title)
    } else {
        (name_prefix(&hit.title), None, None)
    };

    let title = role
        .or_else(|| first_role(&hit.title))
        .or_else(|| first_role(&hit.snippet))
        .unwrap_or_default();

    let company = company
        .or_else(|| at_company(&hit.title))
        .or_else(|| at_company(&hit.snippet))
        .or_else(|| snippet_company(&hit.snippet))
        .map(|raw| clean_company(&raw))
        .unwrap_or_default();

    ParsedFields {
        name,
        title,
        company,
    }
}

/// Splits a profile title into segments and assigns name, role and company.
fn parse_profile_title(title: &str) -> (String, Option<String>, Option<String>) {
    let segments: Vec<&str> = SEPARATOR
        .split(title)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.to_lowercase().contains(NETWORK_BRAND))
        .collect();

    let Some((first, rest)) = segments.split_first() else {
        return (String::new(), None, None);
    };

    let role = rest
        .iter()
        .find(|s| ROLE_PATTERN.is_match(s))
        .map(|s| TRAILING_AT_CLAUSE.replace(s, "").trim().to_string())
        .filter(|s| !s.is_empty());

    let company = rest
        .iter()
        .rev()
        .find(|s| !ROLE_PATTERN.is_match(s) && s.split_whitespace().count() > 1)
        .map(|s| s.to_string());

    (first.to_string(), role, company)
}

fn name_prefix(title: &str) -> String {
    NAME_PREFIX
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn first_role(text: &str) -> Option<String> {
    ROLE_PATTERN.find(text).map(|m| m.as_str().to_string())
}

fn at_company(text: &str) -> Option<String> {
    capture_company(&AT_COMPANY, text)
}

fn snippet_company(snippet: &str) -> Option<String> {
    SNIPPET_COMPANY_PATTERNS
        .iter()
        .find_map(|(_, pattern)| capture_company(pattern, snippet))
}

fn capture_company(pattern: &Regex, text: &str) -> Option<String> {
    let raw = pattern.captures(text)?.get(1)?.as_str();
    let cut = CLAUSE_BREAKS
        .iter()
        .filter_map(|b| raw.find(b))
        .min()
        .unwrap_or(raw.len());
    let candidate = raw[..cut].trim_matches(|c: char| c.is_whitespace() || " .,-:;".contains(c));
    (!candidate.is_empty()).then(|| candidate.to_string())
}

/// Removes boilerplate and legal suffixes and title-cases the remainder.
/// Anything too short to be a company name becomes empty.
pub fn clean_company(raw: &str) -> String {
    let without_boilerplate = COMPANY_BOILERPLATE.replace_all(raw, " ");
    let without_suffix = LEGAL_SUFFIX.replace_all(&without_boilerplate, " ");

    let company = without_suffix
        .split_whitespace()
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");
    let company = company
        .trim_matches(|c: char| c.is_whitespace() || " .,-:;&".contains(c))
        .to_string();

    if company.chars().count() < 3 || BOILERPLATE_WORDS.contains(&company.to_lowercase().as_str()) {
        return String::new();
    }
    company
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\(?\d[\d\s\-()]{7,}\d").unwrap());

/// First phone-number-like run of digits in `text`.
pub fn extract_phone(text: &str) -> Option<String> {
    PHONE.find(text).map(|m| m.as_str().trim().to_string())
}
