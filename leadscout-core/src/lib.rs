pub mod config;
pub mod data;
pub mod discovery;
pub mod error;
pub mod model;
pub mod outreach;
pub mod parse;
pub mod pipeline;
pub mod query;
pub mod report;

pub use config::Config;
pub use data::LeadRepository;
pub use discovery::{DomainResolver, EmailDiscovery, SiteCache, SiteEmailCrawler};
pub use error::{CoreError, Result};
pub use model::{EmailSource, Lead};
pub use outreach::{Draft, EmailTemplate, MailTransport, SendOutcome, SmtpMailer};
pub use pipeline::{Pipeline, RunContext, RunOptions, RunProgressCallback, RunStats};
pub use report::ExportFormat;

use colored::Colorize;

pub fn print_banner() {
    println!(
        "{} {}",
        "leadscout".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    println!("{}", "B2B lead search and enrichment".bright_white());
    println!();
}
