//! FASTA reader and writer.
//!
//! Supports both single-line and multi-line sequences.
//!
//! ## FASTA Format
//!
//! ```text
//! >sequence_identifier optional description
//! ACGTACGTACGT...
//! >another_sequence
//! TGCATGCATGCA...
//! ```
//!
//! The whole header line is the taxon name; whitespace inside it becomes `_`.

use std::io::{self, Write};

use thiserror::Error;

use super::RawAlignment;
use crate::model::Alignment;

/// Errors that can occur during FASTA parsing.
#[derive(Error, Debug)]
pub enum FastaError {
    #[error("Empty FASTA file")]
    EmptyFile,

    #[error("Invalid FASTA format: {0}")]
    InvalidFormat(String),

    #[error("Sequence without header at line {0}")]
    SequenceWithoutHeader(usize),
}

/// Result type for FASTA operations.
pub type FastaResult<T> = Result<T, FastaError>;

/// Parses FASTA content from a string.
///
/// Sequence lines are trimmed and appended verbatim until the next header.
/// The locus length is the length of the first sequence.
pub fn parse_fasta_str(content: &str) -> FastaResult<RawAlignment> {
    let mut rows: Vec<(String, String)> = Vec::new();
    let mut current: Option<(String, String)> = None;

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();

        // Skip empty lines
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('>') {
            // Save previous sequence if exists
            if let Some(row) = current.take() {
                rows.push(row);
            }

            let id: String = header
                .trim()
                .chars()
                .map(|c| if c.is_whitespace() { '_' } else { c })
                .collect();

            if id.is_empty() {
                return Err(FastaError::InvalidFormat(format!(
                    "Empty sequence identifier at line {}",
                    idx + 1
                )));
            }
            current = Some((id, String::new()));
        } else {
            match current.as_mut() {
                Some((_, seq)) => seq.push_str(line),
                None => return Err(FastaError::SequenceWithoutHeader(idx + 1)),
            }
        }
    }

    // Don't forget the last sequence
    if let Some(row) = current {
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(FastaError::EmptyFile);
    }

    Ok(RawAlignment {
        rows,
        locus_length: None,
        model: Vec::new(),
    })
}

/// Writes the alignment as FASTA, one unwrapped sequence per taxon.
pub fn write_fasta<W: Write + ?Sized>(alignment: &Alignment, out: &mut W) -> io::Result<()> {
    for seq in &alignment.sequences {
        writeln!(out, ">{}", seq.id)?;
        writeln!(out, "{}", seq.data)?;
    }
    Ok(())
}
