// src/lib.rs

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod hooks;
pub mod index;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::broadcast::SubscriptionHandle;
use crate::cli::CliArgs;
use crate::config::{load_and_validate, Settings};
use crate::engine::LiveContext;
use crate::index::{registry, FsReindexer, IndexSnapshot, Reindexer};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the live context (index, watch sources, hooks, channel)
/// - a stdout event printer
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let settings = load_and_validate(&config_path)?;

    if args.dry_run {
        return print_dry_run(&settings);
    }

    if args.preparse {
        return preparse(&settings);
    }

    let ctx = LiveContext::from_settings(settings)?;

    // Attach before boot so the printer sees every event.
    let printer = if args.quiet_events {
        None
    } else {
        ctx.subscribe().map(|sub| tokio::spawn(print_events(sub)))
    };

    let report = ctx.boot().await?;
    if !report.all_started() {
        warn!(
            failed = report.failed.len(),
            "running with some watch sources missing"
        );
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
    }
    info!("shutdown requested");

    ctx.shutdown();
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    Ok(())
}

/// Build the index once and write it to the registry file.
fn preparse(settings: &Settings) -> Result<()> {
    let specs = settings.source_specs()?;
    let entries = FsReindexer::new(&specs).reindex()?;
    let snapshot = IndexSnapshot::new(1, entries);

    let path = &settings.index().registry_path;
    registry::save(path, &snapshot)?;
    println!(
        "preparsed {} file(s) into {} (fingerprint {})",
        snapshot.len(),
        path.display(),
        snapshot.fingerprint()
    );
    for source in settings.sources() {
        println!("  {}: {}", source.name, snapshot.by_source(&source.name).count());
    }
    Ok(())
}

/// Print one JSON line per event until the channel closes.
async fn print_events(mut sub: SubscriptionHandle) {
    while let Some(event) = sub.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "could not serialize event"),
        }
    }
    debug!(subscriber = %sub.id(), "event printer finished");
}

/// Simple dry-run output: print settings and the compiled sources.
fn print_dry_run(settings: &Settings) -> Result<()> {
    let live = settings.live();
    let index = settings.index();

    println!("preview-live dry-run");
    println!("  live.listen = {}", live.listen);
    println!("  live.auto_refresh = {}", live.auto_refresh);
    println!("  live.debounce_ms = {}", live.debounce_ms);
    println!("  live.max_changeset_paths = {}", live.max_changeset_paths);
    println!("  live.mount_path = {}", live.mount_path);
    println!("  index.runtime_parsing = {}", index.runtime_parsing);
    if !index.runtime_parsing {
        println!("  index.registry_path = {}", index.registry_path.display());
    }
    println!();

    let specs = settings.source_specs()?;
    println!("sources ({}):", specs.len());
    for spec in &specs {
        println!("  - {}", spec.name);
        for root in &spec.roots {
            println!("      root: {}", root.display());
        }
        println!("      include: {}", spec.filter.include_pattern());
        if !spec.filter.exclude_patterns().is_empty() {
            println!("      exclude: {:?}", spec.filter.exclude_patterns());
        }
        if spec.polling {
            println!("      polling: every {} ms", spec.poll_interval.as_millis());
        }
    }

    debug!("dry-run complete (nothing started)");
    Ok(())
}
