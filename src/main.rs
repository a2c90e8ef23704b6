// src/main.rs
// =============================================================================
// This is the entry point of the wikicrawl CLI.
//
// What happens here:
// 1. Set up logging and parse command-line arguments
// 2. Dispatch to the subcommand handler
// 3. Print progress per round while crawling, then a summary (table or JSON)
// 4. Exit with a proper code (0 = success, 2 = fatal error)
//
// All crawling logic lives in the library (src/lib.rs); this file only turns
// flags into a CrawlConfig and results into output.
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, CrawlArgs};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use wikicrawl::config::default_concurrency;
use wikicrawl::store::StoreStatus;
use wikicrawl::{key_of, CrawlConfig, CrawlEvent, CrawlSummary, Crawler, ExtractRules, FsStore};

#[tokio::main]
async fn main() {
    wikicrawl::logging::init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl(args) => handle_crawl(args).await,
        Commands::Status { data_dir, json } => handle_status(data_dir, json).await,
        Commands::Key { url } => {
            println!("{}", key_of(&url));
            Ok(0)
        }
    }
}

// Handles the 'crawl' subcommand
async fn handle_crawl(args: CrawlArgs) -> Result<i32> {
    let config = CrawlConfig {
        max_depth: args.max_depth,
        concurrency: args.concurrency.unwrap_or_else(default_concurrency),
        delay: Duration::from_millis(args.delay_ms),
        user_agent: args.user_agent,
        timeout: Duration::from_secs(args.timeout_secs),
        retries: args.retries,
        stored_pages: args.stored_pages,
        rules: ExtractRules {
            article_prefix: args.article_prefix,
            ..ExtractRules::default()
        },
    };

    if !args.json {
        println!("🔍 Crawling from: {}", args.start_url);
        println!("📊 Max depth: {}, workers: {}", config.max_depth, config.concurrency);
        println!("💾 Data directory: {}", args.data_dir.display());
    }

    let store = FsStore::open(&args.data_dir)
        .await
        .with_context(|| format!("cannot open data directory {}", args.data_dir.display()))?;

    let mut crawler = Crawler::new(config, Arc::new(store));

    // JSON output stays machine-readable, so progress lines are text mode only
    let mut printer = None;
    if !args.json {
        let (tx, rx) = mpsc::unbounded_channel();
        crawler = crawler.with_progress(tx);
        printer = Some(tokio::spawn(print_progress(rx)));
    }

    // Ctrl-C lets running pages finish and stops before the next one starts
    let shutdown = crawler.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("⏹️  Stopping after in-flight pages...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    let result = crawler.crawl(&args.start_url).await;

    // Dropping the crawler closes the channel; wait for the last lines
    drop(crawler);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let summary = result.with_context(|| format!("crawl from {} failed", args.start_url))?;

    print_summary(&summary, args.json)?;
    Ok(0)
}

// Handles the 'status' subcommand
async fn handle_status(data_dir: std::path::PathBuf, json: bool) -> Result<i32> {
    let status = FsStore::status(data_dir).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    Ok(if status.exists && status.writable { 0 } else { 2 })
}

// Prints one line per finished round until the crawler goes away
async fn print_progress(mut rx: UnboundedReceiver<CrawlEvent>) {
    while let Some(event) = rx.recv().await {
        if let CrawlEvent::RoundFinished {
            round,
            depth,
            processed,
            next_round,
        } = event
        {
            println!(
                "  Round {} [depth {}]: {} pages, {} queued for next round",
                round, depth, processed, next_round
            );
        }
    }
}

fn print_summary(summary: &CrawlSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!();
    println!("{:<8} {:<10}", "ROUND", "PAGES");
    println!("{}", "=".repeat(18));
    for (round, size) in summary.round_sizes.iter().enumerate() {
        println!("{:<8} {:<10}", round, size);
    }
    println!();

    println!("📊 Summary:");
    println!("   ✅ Stored: {}", summary.stored);
    println!("   ♻️  Already stored: {}", summary.already_stored);
    println!("   🚫 Blocked by robots.txt: {}", summary.disallowed);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   🌐 Pages fetched: {}", summary.fetched);
    println!("   📋 Total processed: {}", summary.processed);

    if summary.policy_fail_closed {
        println!("\n⚠️  robots.txt could not be read, so nothing was fetched");
    }
    if summary.cancelled {
        println!("\n⏹️  Crawl was cancelled before the frontier was exhausted");
    }
    Ok(())
}

fn print_status(status: &StoreStatus) {
    let mark = |ok: bool| if ok { "✅" } else { "❌" };

    println!("💾 Data directory: {}", status.data_dir.display());
    println!("   {} exists", mark(status.exists));
    println!("   {} writable", mark(status.writable));
    println!("   📋 Records: {}", status.records);
}
