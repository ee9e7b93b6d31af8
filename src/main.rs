//! CLI entry point for docfinder.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use docfinder_core::output::drain_records;
use docfinder_core::{
    HrefExtractor, PageCrawler, RecordWriter, ResolutionEngine, WorkerPool, parse_input,
};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

mod cli;
mod progress;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = args.engine_config();
    config.validate()?;

    let input_text = if let Some(path) = &args.input {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read input file {}", path.display()))?
    } else if !args.urls.is_empty() {
        args.urls.join("\n")
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        info!("No input provided. Pipe URLs via stdin, pass them as arguments, or use --input.");
        info!("Example: echo 'https://repository.example.org/record/1' | docfinder");
        return Ok(());
    };

    let batch = parse_input(&input_text);
    for skipped in &batch.skipped {
        warn!(error = %skipped, "Skipped invalid input line");
    }
    if batch.is_empty() {
        info!("No valid URLs found in input");
        return Ok(());
    }
    info!(
        locators = batch.len(),
        skipped = batch.skipped.len(),
        "Parsed input"
    );

    let engine = Arc::new(ResolutionEngine::from_config(&config)?);
    let crawler = Arc::new(PageCrawler::new(
        engine,
        Arc::new(HrefExtractor),
        config.max_internal_links,
    ));
    let pool = WorkerPool::new(crawler, config.workers)?;

    let shutdown = pool.shutdown_handle();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight resolutions");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let sink: Box<dyn AsyncWrite + Unpin + Send> = match &args.output {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create output file {}", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };
    let (tx, rx) = mpsc::channel(config.workers * 2);
    let writer_task = tokio::spawn(drain_records(rx, RecordWriter::new(sink, args.batch_size)));

    let use_spinner = !args.quiet && !args.no_progress && io::stderr().is_terminal();
    let (progress_handle, progress_stop) =
        progress::spawn_progress_ui(use_spinner, pool.stats(), batch.len());

    let summary = pool.run(batch.locators, tx).await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }
    signal_task.abort();

    let written = writer_task.await??;
    let summary = summary?;

    info!(
        documents = summary.documents,
        datasets = summary.datasets,
        duplicates = summary.duplicates,
        pages_without_result = summary.pages_without_result,
        unreachable = summary.unreachable,
        skipped = summary.skipped,
        records = written,
        "Resolution complete"
    );

    Ok(())
}
