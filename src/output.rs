//! CLI output formatting.
//!
//! # Entity Display Contract
//!
//! Every processed image is shown the same way, whether it came from
//! `process` or from a `backfill` progress event:
//!
//! 1. **Header line**: entity id (or asset key) and a one-word status
//! 2. **Context lines**: indented dimensions, normalized file, one line per
//!    variant, flags
//!
//! ```text
//! gallery/7/pic → processed
//!     Original: 1600x1067 (sha256 3f8a91c2)
//!     Normalized: pic.jpg
//!     thumb: 160x160 pic__thumb.jpg, pic__thumb.avif
//!     medium: 600x400 pic__medium.jpg, pic__medium.avif
//!     large: 1200x800 pic__large.jpg, (no avif)
//!     xlarge: 1600x1067 pic__xlarge.jpg, pic__xlarge.avif
//!     Flags: blurry
//! gallery/7/tiny → rejected (too_small)
//!     Original: 200x200 (sha256 09c1e4aa)
//!     Flags: low_res, rejected
//! gallery/8/gone → error: file-missing
//! gallery/9/old → skipped
//! gallery/9/bad → failed: encode error: ...
//!
//! Backfill: 3 processed, 1 skipped, 1 failed (5 total)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::backfill::{BackfillEvent, BackfillStats};
use crate::metadata::{ImageMetadata, ProcessOutcome};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// First eight hex digits, enough to tell contents apart at a glance.
fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

fn status_word(outcome: &ProcessOutcome) -> String {
    match outcome {
        ProcessOutcome::Processed(meta) => match meta.reason {
            Some(reason) if meta.is_rejected() => format!("rejected ({reason})"),
            _ => "processed".to_string(),
        },
        ProcessOutcome::Error(record) => format!("error: {}", record.error),
    }
}

fn metadata_lines(meta: &ImageMetadata, depth: usize) -> Vec<String> {
    let pad = indent(depth);
    let mut lines = vec![format!(
        "{pad}Original: {}x{} (sha256 {})",
        meta.original.width,
        meta.original.height,
        short_hash(&meta.original.sha256)
    )];
    if let Some(name) = &meta.normalized {
        lines.push(format!("{pad}Normalized: {name}"));
    }
    for (label, files) in &meta.variants {
        let avif = files.avif.as_deref().unwrap_or("(no avif)");
        lines.push(format!(
            "{pad}{label}: {}x{} {}, {avif}",
            files.width, files.height, files.jpeg
        ));
    }
    if !meta.flags.is_empty() {
        let flags: Vec<&str> = meta.flags.iter().map(|f| f.as_str()).collect();
        lines.push(format!("{pad}Flags: {}", flags.join(", ")));
    }
    lines
}

// ============================================================================
// Single outcome
// ============================================================================

/// Format one pipeline outcome under a header naming `subject`.
pub fn format_outcome(subject: &str, outcome: &ProcessOutcome) -> Vec<String> {
    let mut lines = vec![format!("{subject} → {}", status_word(outcome))];
    if let ProcessOutcome::Processed(meta) = outcome {
        lines.extend(metadata_lines(meta, 1));
    }
    lines
}

/// Print the outcome summary for a single file to stdout, followed by the
/// metadata JSON that would be stored on the entity.
pub fn print_process_output(
    path: &Path,
    outcome: &ProcessOutcome,
) -> Result<(), serde_json::Error> {
    for line in format_outcome(&path.display().to_string(), outcome) {
        println!("{}", line);
    }
    println!();
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

// ============================================================================
// Backfill
// ============================================================================

/// Format a single backfill progress event as display lines.
pub fn format_backfill_event(event: &BackfillEvent) -> Vec<String> {
    match event {
        BackfillEvent::Processed { id, outcome, .. } => format_outcome(id, outcome),
        BackfillEvent::Skipped { id } => vec![format!("{id} → skipped")],
        BackfillEvent::Failed { id, error } => vec![format!("{id} → failed: {error}")],
    }
}

pub fn format_backfill_summary(stats: &BackfillStats, store: &Path) -> Vec<String> {
    vec![
        String::new(),
        format!("Backfill: {stats}"),
        format!("Store: {}", store.display()),
    ]
}

pub fn print_backfill_summary(stats: &BackfillStats, store: &Path) {
    for line in format_backfill_summary(stats, store) {
        println!("{}", line);
    }
}
