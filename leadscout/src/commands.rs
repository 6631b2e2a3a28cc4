use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("leadscout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("leadscout")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" ... "Increase log verbosity (-v info, -vv debug)")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .help("Path to the configuration file (default: ~/.config/leadscout/config.toml)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            arg!(--"db" <PATH>)
                .required(false)
                .help("Path to the lead database (overrides [storage].database)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Writes a default configuration file and creates the lead database")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Where to write the configuration file (default: --config or ~/.config/leadscout/config.toml)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing configuration file")
                        .required(false),
                ),
        )
        .subcommand(
            command!("search")
                .about(
                    "Search for profiles matching the given roles, extract leads and look up their \
                emails. Leads are stored in the database.",
                )
                .arg(
                    arg!(-t --"titles" <TITLES>)
                        .required(true)
                        .help("Comma separated job titles, e.g. \"CEO, CFO\""),
                )
                .arg(
                    arg!(-r --"region" <REGION>)
                        .required(false)
                        .help("Region or city to include in the query"),
                )
                .arg(
                    arg!(-k --"company-type" <TYPE>)
                        .required(false)
                        .help("Industry or company type to include in the query"),
                )
                .arg(
                    arg!(-p --"pages" <PAGES>)
                        .required(false)
                        .help("Result pages to fetch (default: [search].max_pages, at most 5)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"no-discovery")
                        .required(false)
                        .help("Only keep emails found in the search snippets")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Also write this run's leads to a file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output file format: csv, json (default: from the file extension, else csv)")
                        .value_parser(["csv", "json"]),
                ),
        )
        .subcommand(
            command!("leads")
                .about("List stored leads")
                .arg(
                    arg!(--"complete")
                        .required(false)
                        .help("Only leads with a valid business email")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("export")
                .about("Export every stored lead")
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(true)
                        .help("File to write")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Export format: csv, json (default: from the file extension, else csv)")
                        .value_parser(["csv", "json"]),
                ),
        )
        .subcommand(
            command!("send")
                .about("Render the template for every complete lead and send it over SMTP")
                .arg(
                    arg!(-T --"template" <PATH>)
                        .required(true)
                        .help("Template file. A first line starting with 'Subject:' sets the subject")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"dry-run")
                        .required(false)
                        .help("Print the drafts without sending anything")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("posts")
                .about("Search for posts announcing a need for a service")
                .arg(
                    arg!(-p --"pages" <PAGES>)
                        .required(false)
                        .help("Result pages to fetch (default: [search].max_pages, at most 5)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"phrase" <PHRASE>)
                        .required(false)
                        .help("Phrase to search for; repeat for several (default: CRM requirement phrases)")
                        .action(clap::ArgAction::Append),
                ),
        )
}
