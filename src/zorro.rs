//! ZORRO column weights.
//!
//! ZORRO writes one floating-point confidence score per alignment column,
//! one per line, in a file named after the alignment (`gene.fas` pairs with
//! `gene_zorro.out` by default). RAxML reads integer weights, so the scores
//! are rounded and, for a concatenation, joined in alignment order.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::writer::with_suffix;

/// Default suffix of ZORRO weight files.
pub const DEFAULT_SUFFIX: &str = "_zorro.out";

/// Errors that can occur while handling weight files.
#[derive(Error, Debug)]
pub enum ZorroError {
    #[error("Failed to read weight file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path}, line {line}: '{value}' is not a number")]
    InvalidWeight {
        path: String,
        line: usize,
        value: String,
    },

    #[error("Failed to write weight file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Result type for weight file operations.
pub type ZorroResult<T> = Result<T, ZorroError>;

/// Weight file paired with `alignment`: same directory, file stem plus
/// `suffix`.
pub fn zorro_path(alignment: &Path, suffix: &str) -> PathBuf {
    let stem = alignment
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    alignment.with_file_name(format!("{stem}{suffix}"))
}

/// Parses weights, one per line, rounding half to even. Blank lines are
/// skipped; `label` names the source in errors.
pub fn parse_weights(content: &str, label: &str) -> ZorroResult<Vec<i64>> {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line, value)| {
            value
                .parse::<f64>()
                .map(|weight| weight.round_ties_even() as i64)
                .map_err(|_| ZorroError::InvalidWeight {
                    path: label.to_string(),
                    line,
                    value: value.to_string(),
                })
        })
        .collect()
}

/// Reads and rounds one weight file.
pub fn read_weights(path: &Path) -> ZorroResult<Vec<i64>> {
    let label = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|source| ZorroError::Read {
        path: label.clone(),
        source,
    })?;
    parse_weights(&content, &label)
}

/// Reads the weight file of every alignment and joins them in order.
pub fn concatenate_weights<P: AsRef<Path>>(alignments: &[P], suffix: &str) -> ZorroResult<Vec<i64>> {
    let mut weights = Vec::new();
    for alignment in alignments {
        let path = zorro_path(alignment.as_ref(), suffix);
        let part = read_weights(&path)?;
        log::debug!("{}: {} weights", path.display(), part.len());
        weights.extend(part);
    }
    Ok(weights)
}

/// Writes weights to `<base><suffix>`, one per line. Returns the path.
pub fn write_weights(base: &Path, suffix: &str, weights: &[i64]) -> ZorroResult<PathBuf> {
    let path = with_suffix(base, suffix);
    let write_error = |source| ZorroError::Write {
        path: path.display().to_string(),
        source,
    };

    let file = fs::File::create(&path).map_err(write_error)?;
    let mut out = BufWriter::new(file);
    for weight in weights {
        writeln!(out, "{weight}").map_err(write_error)?;
    }
    out.flush().map_err(write_error)?;
    Ok(path)
}
