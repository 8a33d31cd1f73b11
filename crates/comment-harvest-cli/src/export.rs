//! Spreadsheet export of flattened comment rows.

use std::path::Path;

use anyhow::{Context, Result};

use comment_harvest::{flatten_pages, read_pages, CommentRow};

/// Column order of the exported table.
pub const COLUMNS: [&str; 15] = [
    "comment_id",
    "parent_id",
    "body",
    "created_at",
    "removed",
    "author_badges",
    "deleted",
    "pinned_at",
    "author_canceled_pledge",
    "author_backing",
    "author_id",
    "author_name",
    "author_url",
    "author_avatar",
    "author_blocked",
];

/// Write rows as CSV with a header line, even when there are no rows.
pub fn write_table(path: &Path, rows: &[CommentRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    wtr.write_record(COLUMNS).context("CSV header write failed")?;
    for row in rows {
        wtr.serialize(row).context("CSV row write failed")?;
    }
    wtr.flush().context("CSV flush failed")?;
    Ok(())
}

/// Flatten a capture sink into a spreadsheet. Returns the row count.
pub fn export_sink(input: &Path, output: &Path) -> Result<usize> {
    let pages = read_pages(input).with_context(|| format!("failed to load {}", input.display()))?;
    let rows = flatten_pages(&pages);
    write_table(output, &rows)?;
    tracing::info!(
        "flattened {} pages into {} rows: {}",
        pages.len(),
        rows.len(),
        output.display()
    );
    Ok(rows.len())
}
