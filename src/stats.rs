//! Snapshot statistics and sync history.
//!
//! `kh stats` summarises the committed snapshot: documents, axis coverage,
//! graph size and embedding coverage. `kh history` prints the metadata
//! ledger, newest first.

use anyhow::Result;
use chrono::{DateTime, Utc};

use knowledge_harness_core::artifacts::MetadataResource;
use knowledge_harness_core::ledger::SyncRecord;
use knowledge_harness_core::models::Axis;
use knowledge_harness_core::store::StateStore;

use crate::config::Config;
use crate::sqlite_store::{axis_document_counts, SqliteStateStore};

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStateStore::open(&config.db.path).await?;
    let state = store.load().await?;
    let per_axis = axis_document_counts(store.pool()).await?;
    store.pool().close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);
    let quality = MetadataResource::from_state(&state, 1).quality;
    let documents = state.documents.len();
    let embedded = state.embeddings.len();

    println!("Knowledge Harness: Snapshot Stats");
    println!("=================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Snapshot:    {}", state.version);
    println!();
    println!(
        "  Documents:   {} ({} low-confidence)",
        documents, quality.low_confidence_documents
    );
    println!("  Concepts:    {}", state.graph.node_count());
    println!("  Edges:       {}", state.graph.edge_count());
    println!(
        "  Embedded:    {} / {} ({}%)",
        embedded,
        documents,
        if documents > 0 {
            (embedded * 100) / documents
        } else {
            0
        }
    );
    println!("  Pending:     {}", state.pending.len());

    println!();
    println!("  By axis:");
    println!("  {:<12} {:>6}", "AXIS", "DOCS");
    println!("  {}", "-".repeat(19));
    for axis in Axis::ALL {
        let count = per_axis.get(axis.as_str()).copied().unwrap_or(0);
        println!("  {:<12} {:>6}", axis.as_str(), count);
    }
    println!(
        "  Coverage:    {}/4 axes ({:.0}%)",
        quality.axes_populated, quality.coverage_percentage
    );

    if let Some(last) = state.ledger.latest() {
        println!();
        println!(
            "  Last sync:   {}{}",
            format_relative(last.timestamp),
            last.revision
                .as_deref()
                .map(|r| format!(" (revision {})", r))
                .unwrap_or_default()
        );
    }
    println!();
    Ok(())
}

pub async fn run_history(config: &Config, limit: usize) -> Result<()> {
    let store = SqliteStateStore::open(&config.db.path).await?;
    let ledger = store.ledger().await?;
    store.pool().close().await;

    if ledger.is_empty() {
        println!("No syncs recorded.");
        return Ok(());
    }

    println!(
        "{:>4} {:>5}  {:<16} {:>5} {:>5} {:>5} {:>5} {:>8} {:>6}  {}",
        "SEQ", "SNAP", "WHEN", "ADD", "UPD", "SAME", "DEL", "CONCEPTS", "EDGES", "REVISION"
    );
    println!("{}", "-".repeat(88));
    for record in ledger.recent(limit).iter().rev() {
        print_record(record);
    }

    let totals = ledger.totals();
    println!();
    println!(
        "Totals: {} added, {} updated, {} deleted over {} sync(s)",
        totals.added,
        totals.updated,
        totals.deleted,
        ledger.len()
    );
    Ok(())
}

fn print_record(record: &SyncRecord) {
    println!(
        "{:>4} {:>5}  {:<16} {:>5} {:>5} {:>5} {:>5} {:>8} {:>6}  {}",
        record.sequence,
        record.snapshot,
        record.timestamp.format("%Y-%m-%d %H:%M"),
        record.counts.added,
        record.counts.updated,
        record.counts.unchanged,
        record.counts.deleted,
        record.concept_count,
        record.edge_count,
        record.revision.as_deref().unwrap_or("-")
    );
    for note in &record.notes {
        println!("       note: {}", note);
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// "just now", "3 hours ago", ... falling back to a date after 30 days.
fn format_relative(ts: DateTime<Utc>) -> String {
    let delta = (Utc::now() - ts).num_seconds();
    if delta < 0 {
        return ts.format("%Y-%m-%d %H:%M").to_string();
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}
