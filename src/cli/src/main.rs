mod config;
mod paths;

use std::env;
use std::process::ExitCode;

use clap::Parser;
use pagesift_core::{ContentClient, ContentResult, FetchError, FetchRequest, Fetcher};
use serde::Serialize;

use crate::config::PagesiftConfig;

/// Fetch a public web page and print its readable text.
#[derive(Debug, Parser)]
#[command(name = "pagesift", version)]
struct Args {
    /// http or https URL to fetch.
    url: String,

    /// Print `{url, title, content, error}` as JSON.
    #[arg(long)]
    json: bool,

    /// Overall deadline in seconds (minimum 1).
    #[arg(long, allow_negative_numbers = true)]
    timeout: Option<i64>,

    /// Cap on output characters; 0 or below disables the cap.
    #[arg(long = "max-chars", allow_negative_numbers = true)]
    max_chars: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ContentOutput {
    url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ContentOutput {
    fn from_result(url: &str, result: Result<ContentResult, FetchError>) -> Self {
        match result {
            Ok(page) => Self {
                url: page.url,
                title: page.title,
                content: page.content,
                error: None,
            },
            Err(err) => Self {
                url: url.trim().to_string(),
                title: String::new(),
                content: String::new(),
                error: Some(err.to_string()),
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_filter())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = PagesiftConfig::load()?;
    let timeout = args.timeout.unwrap_or(config.fetch.timeout_seconds);
    let max_chars = args.max_chars.unwrap_or(config.fetch.max_chars);
    let request = FetchRequest::from_raw(args.url.as_str(), timeout, max_chars);

    let client = ContentClient::new(Fetcher::new(config.fetch.options()));
    let result = client.fetch(&request).await;
    if let Err(err) = &result {
        tracing::debug!(url = %args.url, kind = err.kind(), error = %err, "fetch failed");
    }

    if args.json {
        let output = ContentOutput::from_result(&args.url, result);
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let page = result?;
    println!("{}", render_text(&page));
    Ok(())
}

fn render_text(page: &ContentResult) -> String {
    if page.title.is_empty() {
        page.content.clone()
    } else {
        format!("# {}\n\n{}", page.title, page.content)
    }
}

fn tracing_filter() -> tracing_subscriber::EnvFilter {
    let explicit = env::var("PAGESIFT_LOG").or_else(|_| env::var("RUST_LOG")).ok();
    if let Some(filter) = explicit {
        return tracing_subscriber::EnvFilter::new(filter);
    }
    if matches!(
        env::var("PAGESIFT_DEBUG").as_deref(),
        Ok("1" | "true" | "TRUE" | "yes" | "YES")
    ) {
        return tracing_subscriber::EnvFilter::new("debug");
    }
    tracing_subscriber::EnvFilter::new("warn")
}
