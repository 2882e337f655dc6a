//! NEXUS reader and writer.
//!
//! ## NEXUS Format
//!
//! NEXUS files start with `#NEXUS`; the sequences live between a line reading
//! `matrix` and a line reading `;`:
//! ```text
//! #NEXUS
//! BEGIN DATA;
//!   DIMENSIONS NTAX=3 NCHAR=10;
//!   FORMAT DATATYPE=DNA GAP=- MISSING=?;
//!   MATRIX
//!     seq1 ACGTACGTAC
//!     seq2 TGCATGCATG
//!     seq3 AAAACCCCGG
//!   ;
//! END;
//! BEGIN MRBAYES;
//!   lset nst=6 rates=gamma;
//! END;
//! ```
//!
//! ## Supported Features
//!
//! - Sequential and interleaved matrices (a taxon recurring in a later block
//!   has its data appended)
//! - Bracketed comments and quoted taxon names inside the matrix
//! - `lset`/`prset` lines after the matrix, kept verbatim as the locus model
//!
//! ## Writing
//!
//! Output is sequential or interleaved in 90-column blocks, optionally
//! followed by MrBayes blocks for charsets, per-locus models and outgroups.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use thiserror::Error;

use super::RawAlignment;
use crate::model::{Alignment, Sequence};
use crate::partition::PartitionTable;
use crate::writer::WriteOptions;

/// Column width reserved for taxon names in written files.
pub const NAME_WIDTH: usize = 40;

/// Taxon names are cut to this many characters before padding.
pub const NAME_CUT: usize = 50;

/// Columns per block in interleaved output.
pub const INTERLEAVE_WIDTH: usize = 90;

/// Errors that can occur during NEXUS parsing.
#[derive(Error, Debug)]
pub enum NexusError {
    #[error("Not a NEXUS file (must start with #NEXUS)")]
    NotNexus,

    #[error("Empty NEXUS file")]
    EmptyFile,

    #[error("No MATRIX command found")]
    MissingMatrix,

    #[error("Unterminated MATRIX (missing ';')")]
    UnterminatedMatrix,

    #[error("MATRIX contains no sequence")]
    EmptyMatrix,
}

/// Result type for NEXUS operations.
pub type NexusResult<T> = Result<T, NexusError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Matrix,
    Trailer,
}

/// Parses NEXUS content from a string.
///
/// A name repeated inside the same block (blank-line delimited, or restarted
/// by the first taxon when the file declares `interleave`) is kept as a
/// separate row so that duplicate detection can report it.
pub fn parse_nexus_str(content: &str) -> NexusResult<RawAlignment> {
    let first = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or(NexusError::EmptyFile)?;
    if !first.to_uppercase().starts_with("#NEXUS") {
        return Err(NexusError::NotNexus);
    }

    let mut section = Section::Header;
    let mut interleave = false;
    let mut rows: Vec<(String, String)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut in_block: HashSet<String> = HashSet::new();
    let mut model = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        match section {
            Section::Header => {
                let lower = trimmed.to_lowercase();
                // Commands may share a line: `begin data; format ...;`
                for command in lower.split(';').map(str::trim) {
                    if command.starts_with("format") {
                        interleave = declares_interleave(command);
                    }
                }
                if lower == "matrix" {
                    section = Section::Matrix;
                }
            }
            Section::Matrix => {
                // Empty line indicates block boundary in interleaved format
                if trimmed.is_empty() {
                    in_block.clear();
                    continue;
                }
                if trimmed == ";" {
                    section = Section::Trailer;
                    continue;
                }

                let clean = remove_nexus_comments(trimmed);
                let clean = clean.trim();
                let (data, closes) = match clean.strip_suffix(';') {
                    Some(data) => (data.trim_end(), true),
                    None => (clean, false),
                };

                if !data.is_empty() {
                    let (name, rest) = split_name(data);
                    let sequence: String = rest.split_whitespace().collect();

                    if interleave && rows.first().is_some_and(|(first, _)| *first == name) {
                        in_block.clear();
                    }

                    match index.get(&name) {
                        Some(&idx) if !in_block.contains(&name) => rows[idx].1.push_str(&sequence),
                        Some(_) => rows.push((name.clone(), sequence)),
                        None => {
                            index.insert(name.clone(), rows.len());
                            rows.push((name.clone(), sequence));
                        }
                    }
                    in_block.insert(name);
                }

                if closes {
                    section = Section::Trailer;
                }
            }
            Section::Trailer => {
                let lower = trimmed.to_lowercase();
                if lower.starts_with("lset") || lower.starts_with("prset") {
                    model.push(trimmed.to_string());
                }
            }
        }
    }

    match section {
        Section::Header => return Err(NexusError::MissingMatrix),
        Section::Matrix => return Err(NexusError::UnterminatedMatrix),
        Section::Trailer => {}
    }
    if rows.is_empty() {
        return Err(NexusError::EmptyMatrix);
    }

    Ok(RawAlignment {
        rows,
        locus_length: None,
        model,
    })
}

/// Whether a lowercased FORMAT command declares an interleaved matrix.
fn declares_interleave(format: &str) -> bool {
    let Some(idx) = format.find("interleave") else {
        return false;
    };
    let after = format[idx + "interleave".len()..].trim_start();
    match after.strip_prefix('=') {
        Some(value) => !value.trim_start().starts_with("no"),
        None => true,
    }
}

/// Removes NEXUS comments (bracketed text) from a line.
fn remove_nexus_comments(line: &str) -> String {
    let mut result = String::new();
    let mut in_comment = false;

    for c in line.chars() {
        if c == '[' {
            in_comment = true;
        } else if c == ']' {
            in_comment = false;
        } else if !in_comment {
            result.push(c);
        }
    }

    result
}

/// Splits a matrix line into taxon name and sequence part.
///
/// Quoted names may contain whitespace, which is replaced with `_`.
fn split_name(line: &str) -> (String, &str) {
    for quote in ['\'', '"'] {
        if let Some(rest) = line.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                let name = rest[..end]
                    .chars()
                    .map(|c| if c.is_whitespace() { '_' } else { c })
                    .collect();
                return (name, &rest[end + 1..]);
            }
        }
    }

    match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_string(), rest),
        None => (line.to_string(), ""),
    }
}

/// Taxon name cut to [`NAME_CUT`] and left-justified to [`NAME_WIDTH`].
fn padded_name(name: &str) -> String {
    let truncated: String = name.chars().take(NAME_CUT).collect();
    format!("{:<width$}", truncated, width = NAME_WIDTH)
}

/// Rewrites an `lset`/`prset` directive so it applies to one partition.
///
/// Any existing `applyto=(...)` clause is replaced.
pub fn apply_to(directive: &str, locus: usize) -> String {
    let body = directive.trim().trim_end_matches(';').trim_end();
    let (command, params) = match body.split_once(char::is_whitespace) {
        Some((command, params)) => (command, strip_applyto(params.trim())),
        None => (body, String::new()),
    };

    if params.is_empty() {
        format!("{command} applyto=({locus});")
    } else {
        format!("{command} applyto=({locus}) {params};")
    }
}

fn strip_applyto(params: &str) -> String {
    let lower = params.to_ascii_lowercase();
    let Some(start) = lower.find("applyto") else {
        return params.to_string();
    };
    let end = lower[start..]
        .find(')')
        .map(|offset| start + offset + 1)
        .unwrap_or(params.len());

    let head = params[..start].trim_end();
    let tail = params[end..].trim_start();
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (false, true) => head.to_string(),
        (false, false) => format!("{head} {tail}"),
    }
}

fn write_matrix<W: Write + ?Sized>(
    sequences: &[Sequence],
    interleave: bool,
    out: &mut W,
) -> io::Result<()> {
    if !interleave {
        for seq in sequences {
            writeln!(out, "{} {}", padded_name(&seq.id), seq.data)?;
        }
        return Ok(());
    }

    let total = sequences.iter().map(Sequence::len).max().unwrap_or(0);
    let mut start = 0;
    while start < total {
        let end = (start + INTERLEAVE_WIDTH).min(total);
        for seq in sequences {
            writeln!(out, "{} {}", padded_name(&seq.id), seq.slice(start..end))?;
        }
        writeln!(out)?;
        start = end;
    }
    Ok(())
}

fn write_models<W: Write + ?Sized>(alignment: &Alignment, out: &mut W) -> io::Result<()> {
    match &alignment.loci_ranges {
        Some(ranges) => {
            if ranges.iter().all(|range| range.models.is_empty()) {
                return Ok(());
            }
            writeln!(out, "\nbegin mrbayes;")?;
            for (idx, range) in ranges.iter().enumerate() {
                for directive in &range.models {
                    writeln!(out, "\t{}", apply_to(directive, idx + 1))?;
                }
            }
            writeln!(out, "end;")
        }
        None if !alignment.model.is_empty() => {
            writeln!(out, "\nbegin mrbayes;")?;
            for directive in &alignment.model {
                writeln!(out, "\t{directive}")?;
            }
            writeln!(out, "end;")
        }
        None => Ok(()),
    }
}

fn write_outgroup<W: Write + ?Sized>(
    alignment: &Alignment,
    outgroup: &[String],
    out: &mut W,
) -> io::Result<()> {
    if outgroup.is_empty() {
        return Ok(());
    }

    let present: Vec<&str> = outgroup
        .iter()
        .filter(|taxon| alignment.contains(taxon))
        .map(String::as_str)
        .collect();
    if present.is_empty() {
        log::warn!(
            "None of the outgroup taxa are present in {}; no outgroup written",
            alignment.name
        );
        return Ok(());
    }

    writeln!(out, "\nbegin mrbayes;")?;
    writeln!(out, "\toutgroup {};", present.join(" "))?;
    writeln!(out, "end;")
}

/// Writes the alignment as NEXUS.
pub fn write_nexus<W: Write + ?Sized>(
    alignment: &Alignment,
    options: &WriteOptions,
    out: &mut W,
) -> io::Result<()> {
    let missing = options.missing.unwrap_or(alignment.code.missing);
    let datatype = match alignment.restriction_range {
        Some((start, end)) => format!(
            "mixed({}:1-{},restriction:{}-{})",
            alignment.code.coding,
            start - 1,
            start,
            end
        ),
        None => alignment.code.coding.to_string(),
    };

    writeln!(out, "#NEXUS\n\nBegin data;")?;
    writeln!(
        out,
        "\tdimensions ntax={} nchar={} ;",
        alignment.sequence_count(),
        alignment.locus_length
    )?;
    writeln!(
        out,
        "\tformat datatype={} interleave={} gap={} missing={} ;",
        datatype,
        if options.interleave { "yes" } else { "no" },
        options.gap,
        missing
    )?;
    writeln!(out, "\tmatrix")?;
    write_matrix(&alignment.sequences, options.interleave, out)?;
    writeln!(out, ";\n\tend;")?;

    if let Some(ranges) = &alignment.loci_ranges {
        writeln!(out)?;
        PartitionTable::from_ranges(ranges).write_mrbayes_block(out)?;
    }
    write_models(alignment, out)?;
    write_outgroup(alignment, &options.outgroup, out)
}
