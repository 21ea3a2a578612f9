//! `restwire` — command-line interface for declarative HTTP services.
//!
//! Three subcommands work on a JSON service declaration:
//!
//! - **`check`** — run the semantic validator and print every diagnostic.
//! - **`describe`** — print the lowered IR of each valid function.
//! - **`call`** — validate, then invoke one function over HTTP.
//!
//! All subcommands read the declaration from a file path or from stdin (`-`).

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use restwire::render::{render_diagnostics, render_function};
use restwire::{analyze_service, validate_service, ServiceDecl};
use restwire_runtime::{ApiResult, Arguments, Client, ClientConfig, ServiceClient};
use serde_json::Value;

/// restwire — declarative HTTP client compiler
///
/// Check service declarations and call their functions.
#[derive(Parser)]
#[command(name = "restwire", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a service declaration.
    ///
    /// Prints one `file:line:col: error: message` line per problem. Exits 0
    /// when the service is valid, 1 otherwise.
    Check {
        /// Path to a JSON declaration, or `-` for stdin.
        file: PathBuf,
    },

    /// Print the IR of every valid function, and the diagnostics of the rest.
    Describe {
        /// Path to a JSON declaration, or `-` for stdin.
        file: PathBuf,

        /// Print the IR as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Invoke one function and print the decoded response as JSON.
    ///
    /// Examples:
    ///   restwire call users.json getUser --base-url https://api.example.com/ --arg id=42
    ///   restwire call users.json createUser --json 'user={"name":"ada"}'
    Call {
        /// Path to a JSON declaration, or `-` for stdin.
        file: PathBuf,

        /// Name of the function to call.
        function: String,

        /// Base URL every relative function URL resolves against.
        #[arg(long, env = "RESTWIRE_BASE_URL", value_name = "URL")]
        base_url: Option<String>,

        /// A string argument. Repeat for more: --arg a=1 --arg b=2
        #[arg(long = "arg", value_name = "NAME=VALUE")]
        args: Vec<String>,

        /// A JSON argument, for bodies, lists and maps: --json 'tags=["a","b"]'
        #[arg(long = "json", value_name = "NAME=JSON")]
        json_args: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "restwire_runtime=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Check { file } => {
            let decl = read_decl(&file);
            match validate_service(&decl) {
                Ok(service) => println!(
                    "valid: {} ({} functions)",
                    service.name,
                    service.functions.len()
                ),
                Err(diagnostics) => {
                    eprint!("{}", render_diagnostics(&diagnostics));
                    process::exit(1);
                }
            }
        }

        Command::Describe { file, json } => {
            let decl = read_decl(&file);
            let analysis = analyze_service(&decl);
            if let Some(service) = &analysis.service {
                if json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(service).unwrap_or_else(|e| fatal(&e))
                    );
                } else {
                    println!("{} implements {}", service.name, service.implements);
                    for function in &service.functions {
                        print!("\n{}", render_function(function));
                    }
                }
            }
            if !analysis.diagnostics.is_empty() {
                eprint!("{}", render_diagnostics(&analysis.diagnostics));
                process::exit(1);
            }
        }

        Command::Call {
            file,
            function,
            base_url,
            args,
            json_args,
        } => {
            let decl = read_decl(&file);
            let service = validate_service(&decl).unwrap_or_else(|diagnostics| {
                eprint!("{}", render_diagnostics(&diagnostics));
                process::exit(1)
            });

            let mut config = ClientConfig::from_env().unwrap_or_else(|e| fatal(&e));
            if base_url.is_some() {
                config.base_url = base_url;
            }
            let client = Client::from_config(&config).unwrap_or_else(|e| fatal(&e));
            let service = ServiceClient::new(client, service);
            let arguments = parse_arguments(&args, &json_args);

            tracing::info!("call: {function} against {}", service.client().base_url());
            match service.invoke_json(&function, &arguments).await {
                Ok(ApiResult::Success { value, .. }) => println!(
                    "{}",
                    serde_json::to_string_pretty(&value).unwrap_or_else(|e| fatal(&e))
                ),
                Ok(ApiResult::Error(response)) => {
                    eprintln!("restwire: server responded with status {}", response.status());
                    eprintln!("{}", String::from_utf8_lossy(response.body()));
                    process::exit(1);
                }
                Ok(ApiResult::Failure { error, .. }) => {
                    eprintln!("restwire: {error}");
                    process::exit(1);
                }
                Err(e) => fatal(&e),
            }
        }
    }
}

/// Build call arguments from `NAME=VALUE` and `NAME=JSON` pairs.
fn parse_arguments(args: &[String], json_args: &[String]) -> Arguments {
    let mut arguments = Arguments::new();
    for raw in args {
        let (name, value) = split_pair(raw, "--arg");
        arguments.insert(name, value);
    }
    for raw in json_args {
        let (name, text) = split_pair(raw, "--json");
        let value: Value = serde_json::from_str(text)
            .unwrap_or_else(|e| fatal(&format!("invalid JSON for {name}: {e}")));
        arguments.insert(name, value);
    }
    arguments
}

fn split_pair<'a>(raw: &'a str, flag: &str) -> (&'a str, &'a str) {
    raw.split_once('=').unwrap_or_else(|| {
        fatal(&format!(
            "invalid {flag} {raw:?}: expected format <name>=<value>"
        ))
    })
}

/// Read and parse a declaration from a file, or stdin when the path is `"-"`.
fn read_decl(path: &Path) -> ServiceDecl {
    let json = if path.to_str() == Some("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {e}")));
        buf
    } else {
        fs::read_to_string(path)
            .unwrap_or_else(|e| fatal(&format!("failed to read {}: {e}", path.display())))
    };
    serde_json::from_str(&json)
        .unwrap_or_else(|e| fatal(&format!("failed to parse service declaration: {e}")))
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &dyn std::fmt::Display) -> ! {
    eprintln!("restwire: {msg}");
    process::exit(2);
}
