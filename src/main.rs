use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hugroute::config::{ApiConfig, RuntimeConfig};
use hugroute::middleware::LogMiddleware;
use hugroute::route::{self, HttpOptions, Router};
use hugroute::{endpoint, Api, ApiError, Call, Error};
use serde_json::{json, Value};
use tracing::info;

/// Serve or run the demo API.
#[derive(Parser)]
#[command(name = "hugroute", version, about = "hugroute demo API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the demo API over HTTP
    Serve {
        /// Configuration file (.yaml, .toml or .json)
        #[arg(short, long, env = "HUGROUTE_CONFIG")]
        config: Option<PathBuf>,
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Leave API documentation out of 404 responses
        #[arg(long, default_value_t = false)]
        no_documentation: bool,
    },
    /// Run one of the demo API's commands
    Call {
        /// Command name followed by its arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 1..)]
        argv: Vec<String>,
    },
}

/// Says hello to someone
#[endpoint]
fn hello(name: String, #[param(default = "Hello")] greeting: String) -> String {
    format!("{greeting} {name}")
}

/// Adds two whole numbers
#[endpoint]
fn add(a: i64, b: i64) -> i64 {
    a + b
}

/// Echoes text back, upper-cased from version 2 on
#[endpoint]
fn echo(text: String, call: &Call<'_>) -> String {
    match call.api_version() {
        Some(version) if version >= 2 => text.to_uppercase(),
        _ => text,
    }
}

/// Divides a by b
#[endpoint]
fn divide(a: f64, b: f64) -> Result<Value, ApiError> {
    if b == 0.0 {
        return Err(ApiError::bad_request("Division by zero", "b must not be 0"));
    }
    Ok(json!(a / b))
}

fn demo_api() -> Api {
    let mut api = Api::new("hugroute-demo");
    api.set_doc("A small API exposed over HTTP and the command line");
    api.http.add_middleware(std::sync::Arc::new(LogMiddleware::new()));

    let hello = hello_endpoint();
    route::get().route(&mut api, &hello);
    route::cli().route(&mut api, &hello);

    let add = add_endpoint();
    route::get().examples(&["a=1&b=2"]).route(&mut api, &add);
    route::cli().route(&mut api, &add);
    route::local().route(&mut api, &add);

    let echo = echo_endpoint();
    route::get().versions(1..3).route(&mut api, &echo);

    let divide = divide_endpoint();
    route::get().cache(60, false).route(&mut api, &divide);
    route::cli().route(&mut api, &divide);
    api
}

fn serve(
    config: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    no_documentation: bool,
) -> Result<()> {
    let mut settings = match &config {
        Some(path) => ApiConfig::load(path)?,
        None => ApiConfig::default(),
    };
    settings.apply_env()?;
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }
    if no_documentation {
        settings.documentation_404 = false;
    }

    let mut api = demo_api();
    settings.apply(&mut api)?;
    let server = api.server().context("failed to build the API server")?;
    let addr = settings.address();
    let handle = hugroute::server::serve(server, &addr, RuntimeConfig::from_env())
        .with_context(|| format!("failed to listen on {addr}"))?;
    info!(addr = %handle.addr(), "demo API ready");
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("server stopped unexpectedly"))
}

fn call(argv: &[String]) -> Result<ExitCode> {
    let api = demo_api();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match api.cli.run(&api, argv, &mut out) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(Error::Cli { message, code }) => {
            out.flush()?;
            eprintln!("{message}");
            Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
        }
        Err(err) => Err(err.into()),
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            no_documentation,
        } => {
            let _guard = hugroute::logging::init_logging()?;
            serve(config, host, port, no_documentation).map(|()| ExitCode::SUCCESS)
        }
        Commands::Call { argv } => call(&argv),
    }
}
