use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("jsift")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("jsift")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about(
                    "Fetch each target page, pull down every script it references, and \
                extract categorized endpoints, keys and websocket URLs.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The URL to scan")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs to scan")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-t --"templates" <PATH>)
                        .required(false)
                        .help("Path to a YAML template file (default: bundled templates)"),
                )
                .arg(
                    arg!(-o --"output" <DIR>)
                        .required(false)
                        .help("Directory for per-domain report files")
                        .default_value("./output"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                ),
        )
        .subcommand(
            command!("graph")
                .about(
                    "Render a Mermaid flowchart of previously scanned findings, grouped \
                by domain and category.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The URL whose domain should be graphed")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of URLs to graph")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-o --"output" <DIR>)
                        .required(false)
                        .help("Directory containing per-domain report files")
                        .default_value("./output"),
                )
                .arg(
                    arg!(--"max-edges" <NUM>)
                        .required(false)
                        .help("Maximum number of edges in the generated diagram")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("450"),
                )
                .arg(
                    arg!(--"max-text-size" <BYTES>)
                        .required(false)
                        .help("Maximum size of the generated diagram text")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("50000"),
                ),
        )
}
