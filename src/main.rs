use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use web_etl::config::{
    DEFAULT_DB_PATH, DEFAULT_MAX_CONTENT, DEFAULT_PREFIX_LEN, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};
use web_etl::{db, Pipeline, PipelineConfig};

const DEFAULT_URLS: &[&str] = &["https://python.org", "https://github.com"];

#[derive(Parser)]
#[command(name = "web_etl", about = "Fetch pages and store title + text in SQLite")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run extract → transform → load for each URL
    Run {
        /// URLs to process (default: a built-in list)
        urls: Vec<String>,

        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Show row count and latest fetch time
    Stats,
    /// Show the stored row for one URL
    Show {
        url: String,
    },
    /// List stored rows, newest first
    List {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// HTTP timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
    /// Max characters of page text kept
    #[arg(long, default_value_t = DEFAULT_MAX_CONTENT)]
    max_content: usize,
    /// Leading characters of content used for the dedup hash
    #[arg(long, default_value_t = DEFAULT_PREFIX_LEN)]
    prefix_len: usize,
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { urls, fetch } => {
            let config = PipelineConfig {
                storage_location: cli.db,
                http_timeout: Duration::from_secs(fetch.timeout_secs),
                max_content_length: fetch.max_content,
                fingerprint_prefix_length: fetch.prefix_len,
                user_agent: fetch.user_agent,
            };
            let pipeline = Pipeline::with_tracing(config)?;

            let urls: Vec<String> = if urls.is_empty() {
                DEFAULT_URLS.iter().map(|u| u.to_string()).collect()
            } else {
                urls
            };
            run_urls(&pipeline, &urls).await?;
        }
        Commands::Stats => {
            let conn = db::connect(&cli.db)
                .with_context(|| format!("Failed to open {:?}", cli.db))?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Rows:   {}", s.rows);
            println!("Latest: {}", s.latest.as_deref().unwrap_or("-"));
        }
        Commands::Show { url } => {
            let conn = db::connect(&cli.db)
                .with_context(|| format!("Failed to open {:?}", cli.db))?;
            db::init_schema(&conn)?;
            match db::fetch_by_url(&conn, &url)? {
                Some(r) => {
                    println!("id:        {}", r.id);
                    println!("url:       {}", r.url);
                    println!("title:     {}", r.title);
                    println!("fetched:   {}", r.timestamp);
                    println!("data_hash: {}", r.fingerprint);
                    println!("\n{}", r.content);
                }
                None => println!("No row stored for {}", url),
            }
        }
        Commands::List { limit, json } => {
            let conn = db::connect(&cli.db)
                .with_context(|| format!("Failed to open {:?}", cli.db))?;
            db::init_schema(&conn)?;
            let rows = db::fetch_recent(&conn, Some(limit))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            if rows.is_empty() {
                println!("No rows stored yet. Run 'run' first.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<32} | {:<40} | {:<25}",
                "id", "Title", "URL", "Fetched"
            );
            println!("{}", "-".repeat(110));
            for r in &rows {
                println!(
                    "{:>4} | {:<32} | {:<40} | {:<25}",
                    r.id,
                    truncate(&r.title, 32),
                    truncate(&r.url, 40),
                    r.timestamp
                );
            }
            println!("\n{} rows", rows.len());
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }
    Ok(())
}

async fn run_urls(pipeline: &Pipeline, urls: &[String]) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let mut ok = 0usize;
    for url in urls {
        pb.set_message(url.clone());
        if pipeline.run(url).await {
            ok += 1;
            pb.println(format!("Successfully processed: {}", url));
        } else {
            pb.println(format!("Failed to process: {}", url));
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("Done: {} urls ({} ok, {} failed).", urls.len(), ok, urls.len() - ok);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
