//! # PromQL Live Query Test
//!
//! Runs one instant query against a live Prometheus through `lib_promql`
//! and prints the normalized table as JSON.
//!
//! ```text
//! PROMQL_URL=http://localhost:9090 cargo run -p project_tests --bin test_promql_live -- --query up
//! ```

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use lib_promql::{normalize, Fetcher, HttpConfig, Request, Schema};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Command line options for the smoke test.
#[derive(Parser, Debug)]
#[command(about = "Instant query smoke test for lib_promql")]
struct Args {
    /// Base URL of the Prometheus server.
    #[arg(long, env = "PROMQL_URL", default_value = "http://localhost:9090")]
    url: String,

    /// PromQL expression to evaluate.
    #[arg(long, default_value = "up")]
    query: String,

    /// Label columns to project (comma separated). Empty keeps the first series' labels.
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// IANA timezone for the datetime column.
    #[arg(long)]
    timezone: Option<String>,

    /// Initial per-attempt timeout in seconds.
    #[arg(long, default_value_t = 2.0)]
    timeout: f64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // // Statement: Honour RUST_LOG, default to debug output from the library
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lib_promql=debug")))
        .init();

    let args = Args::parse();

    // // Statement: Environment overrides (PROMQL_HTTP_*) win over the command line timeout
    let env_config = HttpConfig::from_env().context("reading PROMQL_HTTP_* variables")?;
    let base = format!("{}/api/v1/query", args.url.trim_end_matches('/'));
    let url = Url::parse_with_params(&base, &[("query", args.query.as_str())])
        .context("building the query URL")?
        .to_string();
    let request = Request::new(&url)?
        .with_timeout(Duration::from_secs_f64(args.timeout))
        .with_header("Accept", "application/json")?
        .with_config(&env_config)?;

    let mut schema = Schema::new().with_columns(args.columns.iter().filter(|c| !c.is_empty()).cloned());
    if let Some(tz) = &args.timezone {
        schema = schema.with_timezone_name(tz)?;
    }

    println!("[*] Requesting {}", url);
    let fetcher = Fetcher::new()?;
    let envelope = fetcher.fetch(&request).await?;
    println!("[*] Envelope: {}", envelope);

    match normalize(&envelope, Some(&schema)) {
        Ok(table) => {
            println!("\n[SUCCESS] {} records", table.len());
            println!("-----------------------------------------------");
            println!("{}", serde_json::to_string_pretty(&table)?);
            println!("-----------------------------------------------");
        }
        Err(e) => {
            eprintln!("\n[ERROR] Normalization failed:");
            eprintln!(">>> {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
