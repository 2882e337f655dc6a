//! PHYLIP reader and writer.
//!
//! Only the sequential layout is read.
//!
//! ## PHYLIP Format
//!
//! The first line contains the number of sequences and the sequence length,
//! followed by one `name sequence` row per taxon:
//! ```text
//!  3 10
//! Seq1      ACGTACGTAC
//! Seq2      TGCATGCATG
//! Seq3      AAAACCCCGG
//! ```
//!
//! ## Limitations
//!
//! Interleaved PHYLIP (rows without a name after the first block) is not
//! supported and is reported as an error instead of being misread.

use std::io::{self, Write};

use thiserror::Error;

use super::RawAlignment;
use crate::model::{Alignment, LocusRange};

/// Column width reserved for taxon names in written files.
pub const NAME_WIDTH: usize = 30;

/// Errors that can occur during PHYLIP parsing.
#[derive(Error, Debug)]
pub enum PhylipError {
    #[error("Empty PHYLIP file")]
    EmptyFile,

    #[error("Invalid header: expected 'ntax nchar' (two integers), got '{0}'")]
    InvalidHeader(String),

    #[error("Invalid sequence count in header: '{0}' is not a valid number")]
    InvalidSequenceCount(String),

    #[error("Invalid sequence length in header: '{0}' is not a valid number")]
    InvalidSequenceLength(String),

    #[error("No sequence data found after header")]
    NoSequenceData,

    #[error("Line {0}: row without sequence data; interleaved PHYLIP is not supported")]
    InterleavedUnsupported(usize),
}

/// Result type for PHYLIP operations.
pub type PhylipResult<T> = Result<T, PhylipError>;

/// Parses the `ntax nchar` header line.
fn parse_header(header: &str) -> PhylipResult<(usize, usize)> {
    let parts: Vec<&str> = header.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(PhylipError::InvalidHeader(header.to_string()));
    }

    let ntax = parts[0]
        .parse()
        .map_err(|_| PhylipError::InvalidSequenceCount(parts[0].to_string()))?;
    let nchar = parts[1]
        .parse()
        .map_err(|_| PhylipError::InvalidSequenceLength(parts[1].to_string()))?;
    Ok((ntax, nchar))
}

/// Parses PHYLIP content from a string.
///
/// The locus length is the header's `nchar`. Each following non-empty line is
/// a name and its sequence; sequence tokens separated by spaces are joined.
pub fn parse_phylip_str(content: &str) -> PhylipResult<RawAlignment> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (_, header) = lines.next().ok_or(PhylipError::EmptyFile)?;
    let (ntax, nchar) = parse_header(header)?;

    let mut rows = Vec::with_capacity(ntax);
    for (line_number, line) in lines {
        let mut tokens = line.split_whitespace();
        let name = tokens.next().unwrap_or_default();
        let sequence: String = tokens.collect();
        if sequence.is_empty() || rows.len() == ntax {
            return Err(PhylipError::InterleavedUnsupported(line_number));
        }
        rows.push((name.to_string(), sequence));
    }

    if rows.is_empty() {
        return Err(PhylipError::NoSequenceData);
    }
    if rows.len() < ntax {
        log::warn!(
            "PHYLIP header declares {} taxa but {} rows were read",
            ntax,
            rows.len()
        );
    }

    Ok(RawAlignment {
        rows,
        locus_length: Some(nchar),
        model: Vec::new(),
    })
}

/// Taxon name truncated and left-justified to [`NAME_WIDTH`].
fn padded_name(name: &str) -> String {
    let truncated: String = name.chars().take(NAME_WIDTH).collect();
    format!("{:<width$}", truncated, width = NAME_WIDTH)
}

/// Writes one PHYLIP block covering `columns` of every sequence.
fn write_block<W: Write + ?Sized>(
    alignment: &Alignment,
    columns: std::ops::Range<usize>,
    out: &mut W,
) -> io::Result<()> {
    writeln!(
        out,
        "{} {}",
        alignment.sequence_count(),
        columns.end.saturating_sub(columns.start)
    )?;
    for seq in &alignment.sequences {
        writeln!(out, "{}  {}", padded_name(&seq.id), seq.slice(columns.clone()))?;
    }
    Ok(())
}

/// Writes the alignment as sequential PHYLIP.
///
/// Sequences are written whole, even when their length disagrees with the
/// header.
pub fn write_phylip<W: Write + ?Sized>(alignment: &Alignment, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "{} {}",
        alignment.sequence_count(),
        alignment.locus_length
    )?;
    for seq in &alignment.sequences {
        writeln!(out, "{}  {}", padded_name(&seq.id), seq.data)?;
    }
    Ok(())
}

/// Writes one PHYLIP block per locus, as read by MCMCtree.
///
/// An alignment without loci ranges is written as a single block.
pub fn write_mcmctree<W: Write + ?Sized>(alignment: &Alignment, out: &mut W) -> io::Result<()> {
    let whole = [LocusRange::new(
        alignment.name.as_str(),
        1,
        alignment.locus_length,
    )];
    let ranges = alignment.loci_ranges.as_deref().unwrap_or(&whole);

    for (idx, range) in ranges.iter().enumerate() {
        if idx > 0 {
            writeln!(out)?;
        }
        write_block(alignment, range.columns(), out)?;
    }
    Ok(())
}
