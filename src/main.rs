use anyhow::{Context, Result};
use clap::Parser;
use reqwest::redirect::Policy;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use newsfeed::article::ArticleRecord;
use newsfeed::config::Config;
use newsfeed::content::{enrich_image_lengths, redirect_policy};
use newsfeed::pipeline::{CouchDbPipeline, RssPipeline};

#[derive(Parser, Debug)]
#[command(name = "newsfeed", about = "Export crawled news articles as an RSS 2.0 feed")]
struct Args {
    /// Articles as JSON Lines, one record per line ("-" reads stdin)
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// Configuration file
    #[arg(long, value_name = "FILE", default_value = "newsfeed.toml")]
    config: PathBuf,

    /// Output file stem, overrides `output` from the config file
    #[arg(long, value_name = "NAME")]
    output: Option<String>,

    /// Directory the feed is written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Also store every article in CouchDB
    #[arg(long)]
    couchdb: bool,

    /// Download article images to record their size in the enclosure
    #[arg(long)]
    fetch_image_length: bool,
}

fn build_client(redirect: Policy) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(redirect)
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .build()
        .context("Failed to build HTTP client")
}

/// Parses one article per non-blank line.
fn read_articles(reader: impl BufRead) -> Result<Vec<ArticleRecord>> {
    let mut articles = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.with_context(|| format!("Failed to read input line {line_number}"))?;
        if line.trim().is_empty() {
            continue;
        }
        let article = serde_json::from_str(&line)
            .with_context(|| format!("Invalid article record on line {line_number}"))?;
        articles.push(article);
    }
    Ok(articles)
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open input file '{}'", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?
        .with_env_overrides();
    let output = args.output.clone().unwrap_or_else(|| config.output.clone());

    let mut articles = read_articles(open_input(&args.input)?)?;
    tracing::info!(count = articles.len(), "Read articles");

    // Lengths must be known before any article reaches the exporter
    if args.fetch_image_length || config.images.fetch_length {
        let image_client = build_client(redirect_policy(config.images.url_policy()))?;
        articles = enrich_image_lengths(
            &image_client,
            articles,
            config.images.concurrency,
            config.images.url_policy(),
        )
        .await;
    }

    let mut rss = RssPipeline::open(
        &args.output_dir,
        &output,
        config.channel_metadata(),
        config.indent,
    )?;
    let couchdb = if args.couchdb {
        let client = build_client(Policy::none())?;
        Some(CouchDbPipeline::from_config(client, &config.couchdb))
    } else {
        None
    };

    let mut stored = 0usize;
    for (index, article) in articles.iter().enumerate() {
        rss.process_item(article)
            .with_context(|| format!("Failed to export article {index}"))?;

        if let Some(couchdb) = &couchdb {
            match couchdb.process_item(article).await {
                Ok(_) => stored += 1,
                Err(e) => {
                    tracing::warn!(
                        index,
                        url = article.url.as_deref().unwrap_or(""),
                        error = %e,
                        "Failed to store article in CouchDB"
                    );
                }
            }
        }
    }

    let path = rss.path().to_path_buf();
    let written = rss.close()?;
    println!("Wrote {} articles to {}", written, path.display());
    if couchdb.is_some() {
        println!(
            "Stored {} of {} articles in CouchDB database '{}'",
            stored,
            articles.len(),
            config.couchdb.database
        );
    }

    Ok(())
}
