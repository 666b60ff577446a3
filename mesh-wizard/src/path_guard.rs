use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Refuse to write a planned config over a directory it was read from.
pub fn ensure_output_not_same(output: &Path, inputs: &[&Path]) -> Result<()> {
    let target = resolve(output)
        .with_context(|| format!("failed to resolve output directory {}", output.display()))?;

    for input in inputs {
        let source = resolve(input)
            .with_context(|| format!("failed to resolve config directory {}", input.display()))?;
        if target == source {
            bail!(
                "refusing to overwrite config directory {}: pass a different --output",
                input.display()
            );
        }
    }
    Ok(())
}

/// Canonical path when it exists, else the path made absolute.
///
/// `..` in a not yet created path is not resolved.
fn resolve(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return path
            .canonicalize()
            .with_context(|| format!("canonicalize {}", path.display()));
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir().context("current_dir")?.join(path))
}
