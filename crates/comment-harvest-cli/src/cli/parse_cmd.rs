//! Parse-only mode: flatten an existing capture sink.

use std::path::Path;

use anyhow::{bail, Result};

use crate::export::export_sink;

/// Run the parse-only command.
pub fn run(input: &Path, table: &Path) -> Result<()> {
    if !input.exists() {
        bail!("input JSON file does not exist: {}", input.display());
    }
    tracing::info!("parsing {} -> {}", input.display(), table.display());
    export_sink(input, table)?;
    Ok(())
}
