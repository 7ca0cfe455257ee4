mod error;
mod model;
mod modules;
mod scan;
mod utils;

pub use error::{Error, Result};

use clap::{Arg, ArgAction, Command};
use modules::ApiCredentials;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::model::{ensure_dir, export_to_json, export_to_txt};

fn main() -> Result<()> {
    let cli = Command::new(clap::crate_name!())
        .version(clap::crate_version!())
        .subcommand(Command::new("modules").about("List all modules"))
        .subcommand(
            Command::new("scan")
                .about("Enumerate subdomains of a target domain")
                .arg(
                    Arg::new("target")
                        .help("The domain name to scan")
                        .value_name("TARGET")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("fast")
                        .short('f')
                        .long("fast")
                        .action(ArgAction::SetTrue)
                        .help("Only query the first page of every paginating source"),
                )
                .arg(
                    Arg::new("quiet")
                        .short('q')
                        .long("quiet")
                        .action(ArgAction::SetTrue)
                        .help("Disable progress output"),
                )
                .arg(
                    Arg::new("logs")
                        .short('s')
                        .long("logs")
                        .action(ArgAction::SetTrue)
                        .help("Save logs into a .log file"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Write the results to a file instead of stdout")
                        .value_name("FILE"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .help("Output file format")
                        .value_name("FORMAT")
                        .value_parser(["txt", "json"])
                        .default_value("txt"),
                ),
        )
        .arg_required_else_help(true)
        .get_matches();

    match cli.subcommand() {
        Some(("modules", _)) => modules::display_all(),
        Some(("scan", args)) => {
            if let Some(target) = args.get_one::<String>("target") {
                let fast = args.get_flag("fast");
                let quiet = args.get_flag("quiet");
                let save_logs = args.get_flag("logs");

                // log filename per run
                let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
                let filename = format!("{}", timestamp);

                let output_dir = format!("output/{}", target);
                if save_logs {
                    ensure_dir(output_dir.as_ref())?;
                }
                init_tracing_subscriber(quiet, save_logs, output_dir.as_ref(), &filename);

                // absent credentials silently disable the keyed sources
                let credentials = ApiCredentials::from_env();
                let subdomains = scan::scan(target, &credentials, fast)?;

                match args.get_one::<String>("output") {
                    Some(path) => {
                        let path = Path::new(path);
                        match args.get_one::<String>("format").map(String::as_str) {
                            Some("json") => export_to_json(&subdomains, path)?,
                            _ => export_to_txt(&subdomains, path)?,
                        }
                    }
                    None => {
                        for subdomain in &subdomains {
                            println!("{}", subdomain);
                        }
                    }
                }
            }
        }

        // fallback if a cmd is not handled (should not be possible)
        _ => {
            error!("{:12} - Command not handled, exit program", "CLI ERROR");
            return Err(Error::CliUsage("Command not handled".into()));
        }
    }

    Ok(())
}

fn init_tracing_subscriber(quiet: bool, save_logs_file: bool, output_dir: &Path, filename: &str) {
    // RUST_LOG wins over the default level picked from the quiet flag
    let default_filter = if quiet { "error" } else { "subscout=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // base for the subscriber
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::CLOSE);

    if save_logs_file {
        let filename = format!("{}.log", filename);
        let file_appender = RollingFileAppender::new(Rotation::NEVER, output_dir, filename);
        let subscriber = subscriber
            .with_ansi(false)
            .with_file(false)
            .with_target(false)
            .with_writer(file_appender)
            .finish();

        // add log in terminal as an additional layer
        let stdout_layer = layer()
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true)
            .with_file(false)
            .with_target(false);

        tracing::subscriber::set_global_default(subscriber.with(stdout_layer))
            .expect("Unable to set global subscriber with 2 layers");
    } else {
        let subscriber = subscriber
            .with_ansi(true)
            .with_file(false)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("Unable to set global subscriber");
    }
}
