//! Partition tables: named column ranges of a concatenated alignment.
//!
//! Two interchange formats are read and written:
//!
//! ```text
//! #NEXUS
//! begin sets;
//!     charset locusA = 1-420;
//!     charset locusB = 421-980;
//! end;
//! ```
//!
//! ```text
//! DNA, locusA = 1-420
//! WAG, locusB = 421-980
//! ```
//!
//! The second form is the partition file read by RAxML.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;

use crate::model::LocusRange;

/// Errors that can occur while reading a partition table.
#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("Failed to read partition file: {0}")]
    IoError(#[from] io::Error),

    #[error("Partition table defines no partition")]
    Empty,

    #[error("Line {line}: invalid partition definition '{text}'")]
    InvalidLine { line: usize, text: String },

    #[error("Invalid range '{0}': expected START-END with 1 <= START <= END")]
    InvalidRange(String),
}

/// Result type for partition table operations.
pub type PartitionResult<T> = Result<T, PartitionError>;

/// Layout of a partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionFormat {
    /// `charset NAME = START-END;` statements
    Nexus,
    /// `MODEL, NAME = START-END` lines
    Raxml,
}

/// One named range, 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub model: Option<String>,
    pub name: String,
    pub start: usize,
    pub end: usize,
}

impl Partition {
    pub fn new(model: Option<String>, name: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            model,
            name: name.into(),
            start,
            end,
        }
    }

    /// The 0-based, end-exclusive slice range of the partition.
    pub fn columns(&self) -> std::ops::Range<usize> {
        self.start - 1..self.end
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}-{}", self.name, self.start, self.end)
    }
}

/// Ordered list of partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionTable {
    pub partitions: Vec<Partition>,
}

/// Parses `START-END`, or a single column `N` meaning `N-N`.
fn parse_range(text: &str) -> PartitionResult<(usize, usize)> {
    let text = text.trim().trim_end_matches(';').trim();
    let invalid = || PartitionError::InvalidRange(text.to_string());

    let (start, end) = match text.split_once('-') {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (text, text),
    };
    let start: usize = start.parse().map_err(|_| invalid())?;
    let end: usize = end.parse().map_err(|_| invalid())?;

    if start == 0 || start > end {
        return Err(invalid());
    }
    Ok((start, end))
}

impl PartitionTable {
    pub fn new(partitions: Vec<Partition>) -> Self {
        Self { partitions }
    }

    /// Builds a table from the loci ranges recorded by concatenation.
    pub fn from_ranges(ranges: &[LocusRange]) -> Self {
        let partitions = ranges
            .iter()
            .map(|range| {
                Partition::new(
                    range.partition_model.clone(),
                    range.name.as_str(),
                    range.start,
                    range.end,
                )
            })
            .collect();
        Self { partitions }
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Partition> {
        self.partitions.iter()
    }

    /// Reads a partition file in either layout.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PartitionResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Parses a partition table, detecting its layout from the first line.
    pub fn parse_str(content: &str) -> PartitionResult<Self> {
        let format = Self::detect_format(content).ok_or(PartitionError::Empty)?;
        log::debug!("Partition table layout: {format:?}");
        match format {
            PartitionFormat::Nexus => Self::parse_nexus(content),
            PartitionFormat::Raxml => Self::parse_raxml(content),
        }
    }

    /// NEXUS when the first non-empty line opens a NEXUS file, a block or a
    /// charset; RAxML otherwise. `None` for blank content.
    pub fn detect_format(content: &str) -> Option<PartitionFormat> {
        let first = content
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())?
            .to_lowercase();

        if first.starts_with("#nexus") || first.starts_with("begin") || first.starts_with("charset")
        {
            Some(PartitionFormat::Nexus)
        } else {
            Some(PartitionFormat::Raxml)
        }
    }

    /// Parses `charset NAME = RANGE;` statements, ignoring every other command.
    pub fn parse_nexus(content: &str) -> PartitionResult<Self> {
        let mut partitions = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            for statement in line.split(';').map(str::trim) {
                let Some(keyword) = statement.get(..7) else {
                    continue;
                };
                if !keyword.eq_ignore_ascii_case("charset") {
                    continue;
                }

                let invalid = || PartitionError::InvalidLine {
                    line: idx + 1,
                    text: statement.to_string(),
                };
                let (name, range) = statement[7..].split_once('=').ok_or_else(invalid)?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(invalid());
                }
                let (start, end) = parse_range(range)?;
                partitions.push(Partition::new(None, name, start, end));
            }
        }

        if partitions.is_empty() {
            return Err(PartitionError::Empty);
        }
        Ok(Self { partitions })
    }

    /// Parses `MODEL, NAME = RANGE` lines; the model may be omitted.
    pub fn parse_raxml(content: &str) -> PartitionResult<Self> {
        let mut partitions = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let invalid = || PartitionError::InvalidLine {
                line: idx + 1,
                text: line.to_string(),
            };
            let (label, range) = line.split_once('=').ok_or_else(invalid)?;
            let (model, name) = match label.split_once(',') {
                Some((model, name)) => (Some(model.trim().to_string()), name.trim()),
                None => (None, label.trim()),
            };
            if name.is_empty() {
                return Err(invalid());
            }
            let (start, end) = parse_range(range)?;
            partitions.push(Partition::new(model, name, start, end));
        }

        if partitions.is_empty() {
            return Err(PartitionError::Empty);
        }
        Ok(Self { partitions })
    }

    /// Writes the MrBayes block declaring one charset per partition and a
    /// `part` partition grouping them.
    pub fn write_mrbayes_block<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "begin mrbayes;")?;
        for partition in &self.partitions {
            writeln!(out, "\tcharset {partition};")?;
        }
        let names: Vec<&str> = self.partitions.iter().map(|p| p.name.as_str()).collect();
        writeln!(
            out,
            "\tpartition part = {}: {};",
            self.partitions.len(),
            names.join(", ")
        )?;
        writeln!(out, "\tset partition=part;")?;
        writeln!(out, "end;")
    }

    /// Renders the table as a NEXUS `sets` block.
    pub fn to_nexus_charsets(&self) -> String {
        let mut text = String::from("#NEXUS\n\nbegin sets;\n");
        for partition in &self.partitions {
            text.push_str(&format!("\tcharset {partition};\n"));
        }
        text.push_str("end;\n");
        text
    }

    /// Renders the table as RAxML lines. Partitions without a model use
    /// `default_model`.
    pub fn to_raxml(&self, default_model: &str) -> String {
        self.partitions
            .iter()
            .map(|partition| {
                let model = partition.model.as_deref().unwrap_or(default_model);
                format!("{model}, {partition}\n")
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a PartitionTable {
    type Item = &'a Partition;
    type IntoIter = std::slice::Iter<'a, Partition>;

    fn into_iter(self) -> Self::IntoIter {
        self.partitions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raxml() {
        let table = PartitionTable::parse_str("DNA, locusA = 1-4\nWAG, locusB = 5-6\n\n").unwrap();
        assert_eq!(
            table.partitions,
            vec![
                Partition::new(Some("DNA".to_string()), "locusA", 1, 4),
                Partition::new(Some("WAG".to_string()), "locusB", 5, 6),
            ]
        );
    }

    #[test]
    fn test_parse_raxml_without_model() {
        let table = PartitionTable::parse_raxml("gene1 = 1-10\n").unwrap();
        assert_eq!(table.partitions[0], Partition::new(None, "gene1", 1, 10));
    }

    #[test]
    fn test_parse_nexus_charsets() {
        let content = "#NEXUS\n\nbegin sets;\n\tcharset locusA = 1-4;\n\tCHARSET locusB=5 - 6; charset site = 7;\nend;\n";
        assert_eq!(
            PartitionTable::detect_format(content),
            Some(PartitionFormat::Nexus)
        );
        let table = PartitionTable::parse_str(content).unwrap();
        let names: Vec<String> = table.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["locusA = 1-4", "locusB = 5-6", "site = 7-7"]);
    }

    #[test]
    fn test_bare_charset_lines_are_nexus() {
        let table = PartitionTable::parse_str("\ncharset a = 1-3;\ncharset b = 4-9;\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.partitions[1].columns(), 3..9);
    }

    #[test]
    fn test_invalid_tables() {
        assert!(matches!(PartitionTable::parse_str("  \n"), Err(PartitionError::Empty)));
        assert!(matches!(
            PartitionTable::parse_str("DNA, gene 1-4\n"),
            Err(PartitionError::InvalidLine { line: 1, .. })
        ));
        assert!(matches!(
            PartitionTable::parse_str("DNA, gene = 9-4\n"),
            Err(PartitionError::InvalidRange(_))
        ));
        assert!(matches!(
            PartitionTable::parse_str("DNA, gene = 0-4\n"),
            Err(PartitionError::InvalidRange(_))
        ));
        assert!(matches!(
            PartitionTable::parse_str("#NEXUS\nbegin sets;\nend;\n"),
            Err(PartitionError::Empty)
        ));
    }

    #[test]
    fn test_convert_between_layouts() {
        let raxml = PartitionTable::parse_str("LG, a = 1-4\nDNA, b = 5-6\n").unwrap();
        assert_eq!(
            raxml.to_nexus_charsets(),
            "#NEXUS\n\nbegin sets;\n\tcharset a = 1-4;\n\tcharset b = 5-6;\nend;\n"
        );

        let nexus = PartitionTable::parse_str(&raxml.to_nexus_charsets()).unwrap();
        assert_eq!(nexus.to_raxml("WAG"), "WAG, a = 1-4\nWAG, b = 5-6\n");
        assert_eq!(raxml.to_raxml("WAG"), "LG, a = 1-4\nDNA, b = 5-6\n");
    }

    #[test]
    fn test_mrbayes_block() {
        let mut ranges = vec![LocusRange::new("a", 1, 4), LocusRange::new("b", 5, 6)];
        ranges[1].partition_model = Some("WAG".to_string());
        let table = PartitionTable::from_ranges(&ranges);
        assert_eq!(table.partitions[1].model.as_deref(), Some("WAG"));

        let mut out = Vec::new();
        table.write_mrbayes_block(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "begin mrbayes;\n\tcharset a = 1-4;\n\tcharset b = 5-6;\n\
             \tpartition part = 2: a, b;\n\tset partition=part;\nend;\n"
        );
    }
}
