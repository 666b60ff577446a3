use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::tree::Package;
use crate::value::OptionValue;

/// Errors that can occur while writing a [`Package`].
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to write output file.
    #[error("failed to write UCI file: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize a [`Package`] into UCI text.
pub fn write(package: &Package) -> String {
    let mut out = String::new();

    for (idx, section) in package.sections.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        if section.anonymous {
            out.push_str(&format!("config {}\n", section.kind));
        } else {
            out.push_str(&format!("config {} {}\n", section.kind, quote(&section.id)));
        }
        for (option, value) in &section.options {
            match value {
                OptionValue::Scalar(v) => {
                    out.push_str(&format!("\toption {option} {}\n", quote(v)));
                }
                OptionValue::List(items) => {
                    for item in items {
                        out.push_str(&format!("\tlist {option} {}\n", quote(item)));
                    }
                }
            }
        }
    }

    out
}

/// Serialize a [`Package`] and write it to `path`.
pub fn write_file(package: &Package, path: &Path) -> Result<(), WriteError> {
    fs::write(path, write(package))?;
    Ok(())
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
