pub const PROFILE_SITE_FILTER: &str = "site:linkedin.com/in";

/// Buyer-intent phrases searched by the `posts` command.
pub const DEFAULT_POST_PHRASES: &[&str] = &[
    "need CRM",
    "require CRM",
    "looking for CRM",
    "CRM services required",
];

/// Builds the profile search query.
///
/// `titles` is a comma separated list. One title is quoted on its own, several
/// are OR-ed inside parentheses. Region and company type are quoted when
/// present, and the profile site filter always comes last.
pub fn build_search_query(titles: &str, region: Option<&str>, company_type: Option<&str>) -> String {
    let titles: Vec<&str> = titles
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    let mut parts = Vec::new();
    match titles.as_slice() {
        [] => {}
        [single] => parts.push(quote(single)),
        many => parts.push(or_group(many)),
    }

    for extra in [region, company_type].into_iter().flatten() {
        let extra = extra.trim();
        if !extra.is_empty() {
            parts.push(quote(extra));
        }
    }

    parts.push(PROFILE_SITE_FILTER.to_string());
    parts.join(" ")
}

/// Query for posts announcing a need, OR-ing every phrase.
pub fn build_posts_query<S: AsRef<str>>(phrases: &[S]) -> String {
    let mut phrases: Vec<&str> = phrases
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect();

    if phrases.is_empty() {
        phrases = DEFAULT_POST_PHRASES.to_vec();
    }
    phrases.iter().map(|p| quote(p)).collect::<Vec<_>>().join(" OR ")
}

pub fn company_site_query(company: &str) -> String {
    format!("{} official website OR {} contact", quote(company), quote(company))
}

pub fn contact_email_query(name: &str, company: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        format!("{} email", quote(company))
    } else {
        format!("{} {} email", quote(name), quote(company))
    }
}

fn quote(term: &str) -> String {
    format!("\"{}\"", term.trim().replace('"', ""))
}

fn or_group(terms: &[&str]) -> String {
    let inner = terms.iter().map(|t| quote(t)).collect::<Vec<_>>().join(" OR ");
    format!("({})", inner)
}
