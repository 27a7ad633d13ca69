//! Emit the final values as a JSON object keyed by variable name.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::model::ProcessedWorkspace;

pub fn emit(processed: &ProcessedWorkspace, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &processed.values)
        .with_context(|| format!("Writing {}", path.display()))?;
    log::info!("Wrote {} values to {}", processed.values.len(), path.display());
    Ok(())
}
