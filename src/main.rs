mod categorize;
mod db;
mod fetch;
mod parser;
mod pipeline;
mod runs;
mod server;
mod settings;
mod summarize;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use db::SqliteStore;
use fetch::HttpFetcher;
use pipeline::{ScrapePipeline, Site};
use runs::{RunRegistry, RunState, RunStatus};
use server::AppState;
use settings::{Overrides, Settings};
use summarize::{ChatConfig, ChatSummarizer};

#[derive(Parser)]
#[command(name = "mediacongo_scraper", about = "mediacongo.net job scraper with AI summaries")]
struct Cli {
    /// SQLite file to use instead of SCRAPER_DATABASE_PATH
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP trigger endpoints
    Serve {
        /// Port to listen on (default: SCRAPER_PORT or 5000)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one scrape pass in the foreground
    Run,
    /// Show stored job counts per category
    Stats,
    /// Newest stored jobs
    Recent {
        /// Only show this category (e.g. "Informatique / IT")
        #[arg(short, long)]
        category: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let port = match &cli.command {
        Commands::Serve { port } => *port,
        _ => None,
    };
    let settings = Settings::load(Overrides {
        database_path: cli.db.clone(),
        port,
    })
    .context("Invalid configuration")?;

    let store = Arc::new(
        SqliteStore::open(&settings.database_path)
            .with_context(|| format!("Failed to open store at {}", settings.database_path))?,
    );

    let result = match cli.command {
        Commands::Serve { .. } => {
            let pipeline = build_pipeline(&settings, store)?;
            let runs = Arc::new(RunRegistry::new(pipeline));
            server::listen(AppState { runs }, settings.port).await
        }
        Commands::Run => {
            let registry = RunRegistry::new(build_pipeline(&settings, store)?);
            println!("Scraping {} ...", settings.listings_url);
            registry.trigger().await;
            match registry.wait().await {
                Some(status) => report_run(&status),
                None => Ok(()),
            }
        }
        Commands::Stats => {
            let total = store.count()?;
            let counts: HashMap<String, usize> = store.category_counts()?.into_iter().collect();
            println!("Total:  {}", total);
            for label in categorize::labels() {
                println!("  {:<28} {:>5}", label, counts.get(label).copied().unwrap_or(0));
            }
            Ok(())
        }
        Commands::Recent { category, limit } => {
            let rows = store.recent(category.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No jobs stored yet. Run 'run' or trigger /scrape first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<32} | {:<20} | {:<14} | {:<26} | {:<16}",
                "#", "Title", "Company", "Location", "Category", "Saved (UTC)"
            );
            println!("{}", "-".repeat(128));

            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<32} | {:<20} | {:<14} | {:<26} | {:<16}",
                    i + 1,
                    truncate(&r.title, 32),
                    truncate(&r.company, 20),
                    truncate(&r.location, 14),
                    truncate(&r.category, 26),
                    r.created_at.format("%Y-%m-%d %H:%M"),
                );
            }

            println!("\n{} jobs", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build_pipeline(settings: &Settings, store: Arc<SqliteStore>) -> Result<Arc<ScrapePipeline>> {
    let fetcher = HttpFetcher::new(settings.request_timeout())
        .context("Failed to create HTTP client")?;
    let summarizer = ChatSummarizer::new(ChatConfig {
        endpoint: settings.summarizer_endpoint.clone(),
        model: settings.summarizer_model.clone(),
        api_key: settings.api_key.clone(),
        instructions: settings.summarizer_instructions.clone(),
        timeout: settings.request_timeout(),
    })
    .context("Failed to create summarization client")?;

    Ok(Arc::new(ScrapePipeline::new(
        Arc::new(fetcher),
        Arc::new(summarizer),
        store,
        Site {
            listings_url: settings.listings_url.clone(),
            base_url: settings.base_url.clone(),
        },
    )))
}

fn report_run(status: &RunStatus) -> Result<()> {
    match (&status.state, &status.report) {
        (RunState::Completed, Some(r)) => {
            println!(
                "Done: {} listings ({} saved, {} duplicates, {} failed).",
                r.listings, r.inserted, r.duplicates, r.failed
            );
            Ok(())
        }
        _ => anyhow::bail!(
            "Run {} aborted: {}",
            status.run_id,
            status.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_column_width() {
        assert_eq!(truncate("Comptable", 32), "Comptable");
        let long = truncate("Responsable administratif et financier", 20);
        assert_eq!(long.chars().count(), 20);
        assert!(long.ends_with("..."));
        // multi-byte titles are cut on char boundaries
        assert_eq!(truncate("Ingénieur génie électrique", 12), "Ingénieur...");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(std::time::Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(std::time::Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(std::time::Duration::from_secs(3725)), "1h 2m 5s");
    }
}
