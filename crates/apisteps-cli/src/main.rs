//! apisteps CLI - invoke OpenAPI operations by id and verify their responses

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tracing_subscriber::EnvFilter;

use apisteps_core::{Config, Document, ExchangeReport, Outcome};
use apisteps_runner::{OpenApiClient, StepError, operations};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "APISTEPS_LOG";

const CONFIG_FILE: &str = ".apisteps.toml";

#[derive(Parser)]
#[command(name = "apisteps")]
#[command(about = "Invoke OpenAPI operations by id and verify their responses")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose output (debug logging unless APISTEPS_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config file
    Init,

    /// List operations declared in the document
    Operations {
        /// Config file (default: .apisteps.toml)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Show the request and expected response for an operation without sending
    Plan {
        /// operationId to plan
        operation_id: String,

        /// Response to expect: a status code or a response name
        #[arg(short, long, default_value = "200")]
        expect: String,

        /// Scenario variable (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Seed for value generation
        #[arg(long)]
        seed: Option<u64>,

        /// Config file (default: .apisteps.toml)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Send a request for an operation and verify the response
    Invoke {
        /// operationId to invoke
        operation_id: String,

        /// Response to expect: a status code or a response name
        #[arg(short, long, default_value = "200")]
        expect: String,

        /// Scenario variable (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Request timeout in milliseconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Run the exchange on a background thread
        #[arg(long)]
        fork: bool,

        /// Seed for value generation
        #[arg(long)]
        seed: Option<u64>,

        /// Config file (default: .apisteps.toml)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Export JSON Schema for the exchange report
    Schema,
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(Path::new(path))?,
        None => Config::load_default()?,
    };
    Ok(config)
}

fn load_client(config: &Config) -> Result<OpenApiClient> {
    OpenApiClient::from_config(config)
        .with_context(|| format!("loading {}", config.spec.display()))
}

fn rng(seed: Option<u64>) -> SmallRng {
    seed.map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64)
}

fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Init => {
            if Path::new(CONFIG_FILE).exists() {
                eprintln!("{CONFIG_FILE} already exists");
                return Ok(1);
            }

            std::fs::write(CONFIG_FILE, Config::example())?;
            println!("Created {CONFIG_FILE}");
            println!("\nEdit the file to configure:");
            println!("  - spec: path to your OpenAPI document");
            println!("  - base_url: server to call");
            println!("  - headers: auth tokens, API keys");
            println!("  - variables: values for path parameters");
            Ok(0)
        }

        Commands::Operations { config } => {
            let cfg = load_config(config.as_deref())?;
            let document = Document::load(&cfg.spec)
                .with_context(|| format!("loading {}", cfg.spec.display()))?;

            match cli.output {
                OutputFormat::Terminal => {
                    for located in operations(&document) {
                        let id = located.operation.operation_id.as_deref().unwrap_or("-");
                        println!("{id:<32} {:<7} {}", located.method.as_str(), located.path);
                    }
                }
                OutputFormat::Json => {
                    let list: Vec<_> = operations(&document)
                        .map(|located| {
                            serde_json::json!({
                                "operation_id": located.operation.operation_id,
                                "method": located.method.as_str(),
                                "path": located.path,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&list)?);
                }
                OutputFormat::Silent => {}
            }
            Ok(0)
        }

        Commands::Plan {
            operation_id,
            expect,
            vars,
            seed,
            config,
        } => {
            let cfg = load_config(config.as_deref())?;
            let client = load_client(&cfg)?;
            let mut variables = client.initial_variables().clone();
            variables.extend(vars);

            let located = client.locate(&operation_id)?;
            let message = client.build_request(&located, &variables, &mut rng(seed))?;
            let expected = client.expected_response(located.operation, &expect)?;
            let request = client.resolve_request(&message, &variables)?;

            match cli.output {
                OutputFormat::Terminal => {
                    println!("{} ({operation_id})", located.label());
                    println!("  {} {}", request.method, request.url);
                    for (name, value) in &request.headers {
                        println!("  header {name}: {value}");
                    }
                    for (name, value) in &request.query {
                        println!("  query  {name}={value}");
                    }
                    if let Some(body) = &request.body {
                        println!("  body   {body}");
                    }
                    println!("Expect: {expected}");
                }
                OutputFormat::Json => {
                    let plan = serde_json::json!({
                        "operation_id": operation_id,
                        "method": located.method.as_str(),
                        "request": request.snapshot(),
                        "expected": expected.to_string(),
                    });
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                }
                OutputFormat::Silent => {}
            }
            Ok(0)
        }

        Commands::Invoke {
            operation_id,
            expect,
            vars,
            timeout,
            fork,
            seed,
            config,
        } => {
            let cfg = load_config(config.as_deref())?;
            let client = load_client(&cfg)?;

            if cli.output == OutputFormat::Terminal {
                eprintln!("Config:");
                eprintln!("  spec:     {}", cfg.spec.display());
                eprintln!("  base_url: {}", cfg.base_url);
                if !cfg.headers.is_empty() {
                    eprintln!("  headers:  {} configured", cfg.headers.len());
                }
                eprintln!();
            }

            let mut steps = client.steps().with_rng(rng(seed));
            steps.variables_mut().extend(vars);
            if let Some(ms) = timeout {
                steps.configure_timeout(Duration::from_millis(ms));
            }
            if fork {
                steps.configure_fork_mode(true);
            }

            steps.invoke_operation(&operation_id)?;
            let verified = match steps.verify_response_by_name(&expect) {
                Ok(()) => true,
                Err(StepError::ResponseMismatch(_)) => false,
                Err(e) => {
                    print_report(cli.output, steps.report().as_ref())?;
                    return Err(e.into());
                }
            };

            print_report(cli.output, steps.report().as_ref())?;
            Ok(if verified { 0 } else { 1 })
        }

        Commands::Schema => {
            let schema = apisteps_core::report::generate_schema();
            println!("{schema}");
            Ok(0)
        }
    }
}

fn print_report(output: OutputFormat, report: Option<&ExchangeReport>) -> Result<()> {
    let Some(report) = report else {
        return Ok(());
    };
    match output {
        OutputFormat::Terminal => {
            let icon = match report.outcome {
                Outcome::Verified => "PASS",
                Outcome::Failed => "FAIL",
                Outcome::Sent => "SENT",
            };
            println!("{icon}: {} {}", report.method, report.request.url);
            if let Some(response) = &report.response {
                println!("  Status: {}", response.status_code);
            }
            if let Some(status) = report.expected_status {
                println!("  Expected: {status}");
            }
            if !report.mismatches.is_empty() {
                println!("\nMismatches ({}):", report.mismatches.len());
                for line in &report.mismatches {
                    println!("  - {line}");
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Silent => {}
    }
    Ok(())
}
