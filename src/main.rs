//! Command-line interface for validating files against a config

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Arg, ArgAction, Command};
use futures::stream::StreamExt;
use tracing::{error, info};

use filewarden::{FileValidator, Result, ValidateOptions, ValidationConfig, ValidationResponse};

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let quiet = matches.get_flag("quiet");
    let verbosity = matches.get_count("verbose");
    init_logging(quiet, verbosity);

    info!("filewarden v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = matches.get_one::<String>("config").unwrap();
    let category = matches.get_one::<String>("category").unwrap().clone();
    let format = matches.get_one::<String>("format").unwrap().clone();
    let jobs = matches
        .get_one::<usize>("jobs")
        .copied()
        .unwrap_or_else(num_cpus::get)
        .max(1);
    let inputs: Vec<PathBuf> = matches
        .get_many::<String>("inputs")
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default();

    let config = match ValidationConfig::from_file(config_path.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load config {}: {}", config_path, err);
            process::exit(1);
        }
    };
    let validator = match FileValidator::new(config) {
        Ok(validator) => Arc::new(validator),
        Err(err) => {
            error!("invalid configuration: {}", err);
            process::exit(1);
        }
    };

    let mut options = ValidateOptions::new();
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        options = options.with_output_dir(dir);
    }
    if let Some(mime) = matches.get_one::<String>("mime") {
        options = options.with_mime_type(mime);
    }

    let total = inputs.len();
    let mut results: Vec<(PathBuf, Result<ValidationResponse>)> =
        futures::stream::iter(inputs.into_iter().map(|path| {
            let validator = Arc::clone(&validator);
            let options = options.clone();
            let category = category.clone();
            async move {
                let result = validator
                    .validate_path_with(&category, &path, &options)
                    .await;
                (path, result)
            }
        }))
        .buffer_unordered(jobs)
        .collect()
        .await;
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut valid = 0usize;
    let mut failed = false;
    let mut json_results = Vec::new();

    for (path, result) in &results {
        match result {
            Ok(response) => {
                if response.is_valid() {
                    valid += 1;
                } else {
                    failed = true;
                }
                if format == "json" {
                    json_results.push(serde_json::json!({
                        "file": path.display().to_string(),
                        "result": response,
                    }));
                } else {
                    println!(
                        "{}: {}{}",
                        path.display(),
                        response.results_info(),
                        response.results_details()
                    );
                }
            }
            Err(err) => {
                failed = true;
                if format == "json" {
                    json_results.push(serde_json::json!({
                        "file": path.display().to_string(),
                        "error": err.to_string(),
                    }));
                } else {
                    println!("{}: error: {}", path.display(), err);
                }
            }
        }
    }

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&json_results).expect("results are serializable")
        );
    }

    info!("{} of {} files valid", valid, total);
    if failed {
        process::exit(1);
    }
}

fn build_cli() -> Command {
    Command::new("filewarden")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Validate and sanitize file uploads against a JSON config")

        // Configuration
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("Configuration file (JSON/YAML)")
            .required(true))

        .arg(Arg::new("category")
            .short('t')
            .long("category")
            .value_name("NAME")
            .help("Validation category the files belong to")
            .required(true))

        // Output handling
        .arg(Arg::new("output-dir")
            .short('o')
            .long("output-dir")
            .value_name("DIR")
            .help("Save files that validate into this directory"))

        .arg(Arg::new("mime")
            .long("mime")
            .value_name("TYPE")
            .help("Trust this mime type instead of sniffing the content"))

        .arg(Arg::new("format")
            .short('f')
            .long("format")
            .value_parser(["text", "json"])
            .default_value("text")
            .help("Result output format"))

        // Execution
        .arg(Arg::new("jobs")
            .short('j')
            .long("jobs")
            .value_name("N")
            .value_parser(clap::value_parser!(usize))
            .help("How many files to validate concurrently (default: CPU count)"))

        // Logging
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .help("Increase logging verbosity (-v debug, -vv trace)"))

        .arg(Arg::new("quiet")
            .short('q')
            .long("quiet")
            .action(ArgAction::SetTrue)
            .conflicts_with("verbose")
            .help("Suppress all output except errors"))

        // Inputs
        .arg(Arg::new("inputs")
            .value_name("FILE")
            .num_args(1..)
            .required(true)
            .help("Files to validate"))
}

fn init_logging(quiet: bool, verbosity: u8) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let filter_level = if quiet {
        "error"
    } else {
        match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("filewarden={}", filter_level)));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
