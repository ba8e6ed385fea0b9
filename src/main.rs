//! Command line client for an Elasticsearch cluster.
//!
//! ```text
//! elastic-cli [--config FILE] [--url URL]... status
//! elastic-cli [--config FILE] [--url URL]... request <METHOD> <PATH> [--body JSON] [--ignore STATUS]...
//! ```

use clap::{Parser, Subcommand};
use reqwest::Method;
use std::path::PathBuf;
use std::process::ExitCode;

use elastic_client::config::loader::load_config;
use elastic_client::observability::logging::init_tracing;
use elastic_client::{Client, ClientBuilder, ClientConfig, Context, RequestOptions};

#[derive(Parser)]
#[command(name = "elastic-cli")]
#[command(about = "Talk to an Elasticsearch cluster", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed URL; overrides the configuration file. May be repeated.
    #[arg(short, long)]
    url: Vec<String>,

    /// Skip health checks and sniffing
    #[arg(long)]
    simple: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cluster health and the tracked nodes
    Status,
    /// Perform a raw request
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
        /// Status to treat as success. May be repeated.
        #[arg(long)]
        ignore: Vec<u16>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    init_tracing(&config.observability.log_level);
    if !cli.url.is_empty() {
        config.urls = cli.url.clone();
    }

    let builder = ClientBuilder::from_config(config);
    let client = if cli.simple {
        Client::simple(builder)?
    } else {
        Client::dial(builder).await?
    };
    let ctx = Context::background();

    let result = match cli.command {
        Commands::Status => status(&client, &ctx).await,
        Commands::Request {
            method,
            path,
            body,
            ignore,
        } => request(&client, &ctx, &method, path, body, ignore).await,
    };

    client.stop().await;
    result
}

async fn status(client: &Client, ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let resp = client
        .perform_request(ctx, RequestOptions::get("/_cluster/health"))
        .await?;
    let health = resp.json()?;
    println!("{}", serde_json::to_string_pretty(&health)?);

    println!("\nNodes:");
    for endpoint in client.endpoints() {
        println!("  {endpoint}");
    }
    Ok(())
}

async fn request(
    client: &Client,
    ctx: &Context,
    method: &str,
    path: String,
    body: Option<String>,
    ignore: Vec<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
    let mut opts = RequestOptions::new(method, path);
    if let Some(body) = body {
        opts = opts.body(serde_json::from_str::<serde_json::Value>(&body)?);
    }
    opts.ignore_errors = ignore;

    let resp = client.perform_request(ctx, opts).await?;
    eprintln!("{}", resp.status);
    match resp.json() {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", resp.text()),
    }
    Ok(())
}
