use clap::ArgMatches;
use colored::Colorize;
use commands::command_argument_builder;
use leadscout::handlers::{self, AppContext};
use leadscout_core::print_banner;
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_tracing(chosen_command.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    if let Err(e) = run(&chosen_command, quiet).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(handlers::verbosity_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(chosen_command: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let ctx = AppContext::load(
        chosen_command.get_one("config"),
        chosen_command.get_one("db"),
        quiet,
        |key| std::env::var(key).ok(),
    )?;

    match chosen_command.subcommand() {
        Some(("init", primary_command)) => handlers::handle_init(primary_command, &ctx),
        Some(("search", primary_command)) => handlers::handle_search(primary_command, &ctx).await,
        Some(("leads", primary_command)) => handlers::handle_leads(primary_command, &ctx),
        Some(("export", primary_command)) => handlers::handle_export(primary_command, &ctx),
        Some(("send", primary_command)) => handlers::handle_send(primary_command, &ctx).await,
        Some(("posts", primary_command)) => handlers::handle_posts(primary_command, &ctx).await,
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
