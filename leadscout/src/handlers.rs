use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use leadscout_core::config::{self, Config, DEFAULT_CONFIG_PATH};
use leadscout_core::discovery::EmailDiscovery;
use leadscout_core::outreach::{self, EmailTemplate, SmtpMailer};
use leadscout_core::pipeline::{self, Pipeline, RunOptions, RunProgressCallback};
use leadscout_core::{ExportFormat, LeadRepository, query, report};
use leadscout_scanner::{HunterClient, SerpApiClient, SiteCrawler};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub quiet: bool,
}

impl AppContext {
    /// Loads the configuration file (defaults when absent), applies
    /// environment overrides and resolves the database location.
    pub fn load<F>(config_path: Option<&PathBuf>, db_path: Option<&PathBuf>, quiet: bool, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = resolve_config_path(config_path);
        let mut config = Config::load(&config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()))?;
        config.apply_env(env);

        let db_path = match db_path {
            Some(path) => config::expand_path(&path.to_string_lossy()),
            None => config.database_path(),
        };

        Ok(Self {
            config,
            config_path,
            db_path,
            quiet,
        })
    }

    fn open_repository(&self) -> Result<LeadRepository> {
        LeadRepository::new(&self.db_path)
            .with_context(|| format!("Failed to open database {}", self.db_path.display()))
    }
}

pub fn resolve_config_path(path: Option<&PathBuf>) -> PathBuf {
    match path {
        Some(path) => config::expand_path(&path.to_string_lossy()),
        None => config::expand_path(DEFAULT_CONFIG_PATH),
    }
}

pub fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// An explicit `--format` wins, then the file extension, then CSV.
pub fn resolve_format(format: Option<&String>, output: &Path) -> ExportFormat {
    match format {
        Some(name) => name.parse().unwrap_or_default(),
        None => ExportFormat::from_path(output).unwrap_or_default(),
    }
}

pub fn load_template(path: &Path) -> Result<EmailTemplate> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    EmailTemplate::parse(&text).with_context(|| format!("Invalid template {}", path.display()))
}

/// Writes the default configuration to `path`. An existing file is left alone
/// unless `force` is set. Returns whether the file was written.
pub fn write_default_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let content = Config::default().to_toml()?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_heading(title: &str) {
    print_divider();
    println!("{}", format!("  {}", title).bright_white().bold());
    print_divider();
    println!();
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}

fn search_client(config: &Config) -> Result<SerpApiClient> {
    let api_key = config.require_search()?;
    let client = SerpApiClient::new(api_key, config.request_timeout())?
        .with_endpoint(&config.search.endpoint)?;
    Ok(client)
}

pub fn handle_init(args: &ArgMatches, ctx: &AppContext) -> Result<()> {
    print_heading("LEADSCOUT INITIALIZATION");

    let config_path = match args.get_one::<PathBuf>("PATH") {
        Some(path) => config::expand_path(&path.to_string_lossy()),
        None => ctx.config_path.clone(),
    };
    let force = args.get_flag("force");

    println!(
        "{} Config: {}",
        "→".blue(),
        config_path.display().to_string().bright_white()
    );
    println!(
        "{} Database: {}",
        "→".blue(),
        ctx.db_path.display().to_string().bright_white()
    );
    println!();

    if write_default_config(&config_path, force)? {
        println!("{} Wrote default configuration", "✓".green().bold());
    } else {
        println!(
            "{} Configuration already exists, keeping it (use --force to overwrite)",
            "⚠".yellow().bold()
        );
    }

    ctx.open_repository()?;
    println!("{} Database ready", "✓".green().bold());
    println!();
    println!(
        "{} Set {} in the config file or environment before searching.",
        "→".blue(),
        "SERPAPI_KEY".bright_white()
    );
    Ok(())
}

pub async fn handle_search(args: &ArgMatches, ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    let search = search_client(config)?;

    let titles = args.get_one::<String>("titles").map(String::as_str).unwrap_or_default();
    if titles.split(',').all(|t| t.trim().is_empty()) {
        bail!("At least one title is required");
    }
    let region = args.get_one::<String>("region").map(String::as_str);
    let company_type = args.get_one::<String>("company-type").map(String::as_str);
    let max_pages = config.search_pages(args.get_one::<usize>("pages").copied());
    let discover = !args.get_flag("no-discovery");

    let timeout = config.request_timeout();
    let enrichment = match config.enrichment_key() {
        Some(key) => Some(HunterClient::new(key, timeout)?.with_endpoint(&config.enrichment.endpoint)?),
        None => {
            tracing::info!("No enrichment key configured, skipping that stage");
            None
        }
    };
    let validator = config.validator();
    let crawler = SiteCrawler::new(validator.clone(), timeout, &config.network.user_agent)?
        .with_max_depth(config.crawl.max_depth);
    let search_pacer = config.pacing.search.pacer();
    let lead_pacer = config.pacing.lead.pacer();

    let discovery = EmailDiscovery::new(&search, enrichment.as_ref(), &crawler, &validator, &search_pacer)
        .with_locale(config.locale())
        .with_excluded_hosts(config.filters.excluded_site_hosts.clone());
    let pipeline = Pipeline::new(&search, discovery, &validator, &search_pacer, &lead_pacer)
        .with_locale(config.locale());

    let query = query::build_search_query(titles, region, company_type);
    let repo = ctx.open_repository()?;

    if !ctx.quiet {
        print_heading("LEAD SEARCH");
        println!("{} Query: {}", "→".blue(), query.bright_white());
        println!("{} Pages: {}", "→".blue(), max_pages);
        println!(
            "{} Discovery: {}",
            "→".blue(),
            if discover { "on".green() } else { "off".yellow() }
        );
        println!();
    }

    let callback: Option<RunProgressCallback> = if ctx.quiet {
        None
    } else {
        Some(Arc::new(|message: String| tracing::info!("{}", message)))
    };
    let options = RunOptions {
        query,
        max_pages,
        discover,
        show_progress: !ctx.quiet,
    };
    let run = pipeline.execute_run(options, &repo, callback).await?;

    if let Some(error) = &run.search_error {
        println!("{} Search failed: {}", "✗".red().bold(), error);
        return Ok(());
    }

    println!();
    println!("{}", report::generate_lead_report(&run.leads));
    print_divider();
    println!(
        "{} {} leads, {} with email, {} new in database",
        "✓".green().bold(),
        run.stats.leads,
        run.stats.with_email,
        run.stats.stored
    );
    println!(
        "{} Sources: {}",
        "→".blue(),
        pipeline::generate_source_breakdown(&run.stats)
    );
    if run.stats.store_failures > 0 {
        println!(
            "{} {} leads could not be stored",
            "⚠".yellow().bold(),
            run.stats.store_failures
        );
    }

    if let Some(output) = args.get_one::<PathBuf>("output") {
        let format = resolve_format(args.get_one::<String>("format"), output);
        report::write_leads(&run.leads, output, format)?;
        println!(
            "{} Wrote {} leads to {}",
            "✓".green().bold(),
            run.leads.len(),
            output.display()
        );
    }
    Ok(())
}

pub fn handle_leads(args: &ArgMatches, ctx: &AppContext) -> Result<()> {
    let repo = ctx.open_repository()?;
    let leads = if args.get_flag("complete") {
        repo.complete_leads(&ctx.config.validator())?
    } else {
        repo.all_leads()?
    };

    if leads.is_empty() {
        println!("{} No leads stored yet", "→".blue());
        return Ok(());
    }
    println!("{}", report::generate_lead_report(&leads));
    Ok(())
}

pub fn handle_export(args: &ArgMatches, ctx: &AppContext) -> Result<()> {
    let output = args
        .get_one::<PathBuf>("output")
        .context("--output is required")?;
    let format = resolve_format(args.get_one::<String>("format"), output);

    let repo = ctx.open_repository()?;
    let written = repo.export_all(output, format)?;
    println!(
        "{} Exported {} leads to {}",
        "✓".green().bold(),
        written,
        output.display().to_string().bright_white()
    );
    Ok(())
}

pub async fn handle_send(args: &ArgMatches, ctx: &AppContext) -> Result<()> {
    let template_path = args
        .get_one::<PathBuf>("template")
        .context("--template is required")?;
    let dry_run = args.get_flag("dry-run");

    if !dry_run {
        ctx.config.require_smtp()?;
    }
    let template = load_template(template_path)?;

    let validator = ctx.config.validator();
    let repo = ctx.open_repository()?;
    let leads = repo.complete_leads(&validator)?;
    let drafts = outreach::build_drafts(&leads, &template, &validator);

    if drafts.is_empty() {
        println!("{} No complete leads to contact", "→".blue());
        return Ok(());
    }

    if dry_run {
        print_heading("OUTREACH PREVIEW");
        for draft in &drafts {
            println!("{} {}", "To:".bright_cyan().bold(), draft.to);
            println!("{} {}", "Subject:".bright_cyan().bold(), draft.subject);
            println!();
            println!("{}", draft.body);
            print_divider();
        }
        println!("{} {} drafts, nothing sent", "✓".green().bold(), drafts.len());
        return Ok(());
    }

    let mailer = SmtpMailer::new(&ctx.config.smtp)?;
    let pb = spinner(format!("Sending {} messages via {}", drafts.len(), ctx.config.smtp.host));
    let outcomes = outreach::send_all(&mailer, &drafts, &ctx.config.pacing.send.pacer()).await;
    pb.finish_and_clear();

    let mut sent = 0;
    for outcome in &outcomes {
        if outcome.ok {
            sent += 1;
            println!("{} {}", "✓".green().bold(), outcome.to);
        } else {
            println!("{} {}: {}", "✗".red().bold(), outcome.to, outcome.reason);
        }
    }
    print_divider();
    println!("{} Sent {}/{}", "→".blue(), sent, outcomes.len());
    Ok(())
}

pub async fn handle_posts(args: &ArgMatches, ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    let search = search_client(config)?;
    let phrases: Vec<&String> = args
        .get_many::<String>("phrase")
        .map(|values| values.collect())
        .unwrap_or_default();
    let max_pages = config.search_pages(args.get_one::<usize>("pages").copied());

    let pb = (!ctx.quiet).then(|| spinner("Searching posts...".to_string()));
    let result = pipeline::search_posts(
        &search,
        &phrases,
        max_pages,
        &config.locale(),
        &config.pacing.search.pacer(),
    )
    .await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let posts = result?;

    print_heading("POSTS");
    if posts.is_empty() {
        println!("{} No posts found", "→".blue());
        return Ok(());
    }
    for (idx, post) in posts.iter().enumerate() {
        println!("{}. {}", idx + 1, post.title.bright_white().bold());
        println!("   {}", post.link.bright_blue());
        if !post.snippet.is_empty() {
            println!("   {}", post.snippet);
        }
    }
    println!();
    println!("{} {} posts", "✓".green().bold(), posts.len());
    Ok(())
}
