use crate::data::LeadRepository;
use crate::discovery::{EmailDiscovery, SiteCache, SiteEmailCrawler};
use crate::error::Result;
use crate::model::{EmailSource, Lead};
use crate::query;
use indicatif::{ProgressBar, ProgressStyle};
use leadscout_scanner::search::collect_pages;
use leadscout_scanner::{
    EmailValidator, EnrichmentService, Locale, Pacer, SearchHit, SearchProvider,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

pub struct RunOptions {
    pub query: String,
    pub max_pages: usize,
    pub discover: bool,
    pub show_progress: bool,
}

// Callback for reporting run progress
pub type RunProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub hits: usize,
    pub leads: usize,
    pub duplicate_hits: usize,
    pub with_email: usize,
    pub stored: usize,
    pub store_failures: usize,
    pub by_source: BTreeMap<&'static str, usize>,
}

/// Everything one run accumulates. A new context is created per run and
/// nothing in it outlives the run.
#[derive(Debug)]
pub struct RunContext {
    pub run_id: String,
    pub leads: Vec<Lead>,
    pub sites: SiteCache,
    pub stats: RunStats,
    /// Set when the initial search failed and there was nothing to process.
    pub search_error: Option<String>,
}

impl RunContext {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            leads: Vec::new(),
            sites: SiteCache::new(),
            stats: RunStats::default(),
            search_error: None,
        }
    }

    fn record(&mut self, lead: Lead) {
        self.stats.leads += 1;
        if let Some(source) = lead.email_source {
            self.stats.with_email += 1;
            *self.stats.by_source.entry(source.as_str()).or_default() += 1;
        }
        self.leads.push(lead);
    }
}

pub struct Pipeline<'a, S, E, C> {
    search: &'a S,
    discovery: EmailDiscovery<'a, S, E, C>,
    validator: &'a EmailValidator,
    search_pacer: &'a Pacer,
    lead_pacer: &'a Pacer,
    locale: Locale,
}

impl<'a, S, E, C> Pipeline<'a, S, E, C>
where
    S: SearchProvider + Sync,
    E: EnrichmentService + Sync,
    C: SiteEmailCrawler + Sync,
{
    pub fn new(
        search: &'a S,
        discovery: EmailDiscovery<'a, S, E, C>,
        validator: &'a EmailValidator,
        search_pacer: &'a Pacer,
        lead_pacer: &'a Pacer,
    ) -> Self {
        Self {
            search,
            discovery,
            validator,
            search_pacer,
            lead_pacer,
            locale: Locale::default(),
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Executes a run against `repo`. Upstream failures only shorten the run;
    /// the returned context holds whatever was collected.
    pub async fn execute_run(
        &self,
        options: RunOptions,
        repo: &LeadRepository,
        progress_callback: Option<RunProgressCallback>,
    ) -> Result<RunContext> {
        let RunOptions {
            query,
            max_pages,
            discover,
            show_progress,
        } = options;

        let run_id = repo.create_run(&query)?;
        let mut ctx = RunContext::new(run_id);

        let progress_bar = if show_progress {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                pb.set_style(style);
            }
            pb.set_message(format!("Searching: {}", query));
            Some(pb)
        } else {
            None
        };

        let report = |message: String| {
            if let Some(ref callback) = progress_callback {
                callback(message);
            }
        };

        let hits = match collect_pages(self.search, &query, &self.locale, max_pages, self.search_pacer).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Search '{}' failed: {}", query, e);
                report(format!("[!] Search failed: {}", e));
                if let Some(ref pb) = progress_bar {
                    pb.finish_and_clear();
                }
                ctx.search_error = Some(e.to_string());
                repo.fail_run(&ctx.run_id)?;
                return Ok(ctx);
            }
        };
        ctx.stats.hits = hits.len();
        report(format!("{} search results", hits.len()));

        let mut seen_links = HashSet::new();
        for (idx, hit) in hits.iter().enumerate() {
            if !seen_links.insert(hit.link.clone()) {
                ctx.stats.duplicate_hits += 1;
                continue;
            }

            let mut lead = Lead::from_hit(hit, self.validator);
            if let Some(ref pb) = progress_bar {
                let who = if lead.name.is_empty() { hit.link.as_str() } else { lead.name.as_str() };
                pb.set_message(format!("Lead {}/{}: {}", idx + 1, hits.len(), who));
                pb.tick();
            }

            if discover && lead.email.is_none() {
                self.lead_pacer.wait().await;
                self.discovery.resolve_email(&mut lead, &mut ctx.sites).await;
            }

            match repo.upsert(&lead, Some(&ctx.run_id)) {
                Ok(true) => ctx.stats.stored += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Could not store lead {}: {}", lead.linkedin_url, e);
                    ctx.stats.store_failures += 1;
                }
            }
            ctx.record(lead);
        }

        repo.complete_run(&ctx.run_id)?;

        if let Some(ref pb) = progress_bar {
            pb.finish_with_message(format!(
                "Run complete! {} leads, {} with email",
                ctx.stats.leads, ctx.stats.with_email
            ));
        }
        info!(
            "Run {} finished: {} hits, {} leads, {} with email, {} new rows",
            ctx.run_id, ctx.stats.hits, ctx.stats.leads, ctx.stats.with_email, ctx.stats.stored
        );

        Ok(ctx)
    }
}

/// Buyer-intent posts matching any of `phrases` (the defaults when empty).
pub async fn search_posts<S: SearchProvider + Sync, P: AsRef<str>>(
    search: &S,
    phrases: &[P],
    max_pages: usize,
    locale: &Locale,
    pacer: &Pacer,
) -> leadscout_scanner::error::Result<Vec<SearchHit>> {
    let query = query::build_posts_query(phrases);
    info!("Searching posts: {}", query);
    collect_pages(search, &query, locale, max_pages, pacer).await
}

pub fn generate_source_breakdown(stats: &RunStats) -> String {
    crate::discovery::STAGES
        .iter()
        .map(|stage: &EmailSource| {
            let count = stats.by_source.get(stage.as_str()).copied().unwrap_or(0);
            format!("{}: {}", stage.as_str(), count)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
