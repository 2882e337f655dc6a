//! Data model for alignments.
//!
//! This module contains the data structures shared by the parsers, the
//! transforms and the writers:
//! - Sequences and their molecular coding
//! - Single-locus and concatenated alignments
//! - Locus coordinate ranges recorded by concatenation

use std::fmt;
use std::ops::Range;

use crate::formats::FileFormat;
use crate::utils;

/// Represents a single sequence with its taxon name and data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    /// The taxon name (cleaned of characters that break NEXUS/PHYLIP)
    pub id: String,
    /// The sequence data (nucleotides or amino acids)
    pub data: String,
}

impl Sequence {
    /// Creates a new sequence.
    pub fn new(id: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }

    /// Returns the length of the sequence.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Gets a slice of the sequence data, clamped to the sequence bounds.
    ///
    /// Columns are bytes; a range cutting through a multi-byte character
    /// yields an empty slice and a warning.
    pub fn slice(&self, range: Range<usize>) -> &str {
        let start = range.start.min(self.data.len());
        let end = range.end.min(self.data.len()).max(start);
        match self.data.get(start..end) {
            Some(slice) => slice,
            None => {
                log::warn!(
                    "Columns {}-{} of {} split a non-ASCII character; treated as empty",
                    start + 1,
                    end,
                    self.id
                );
                ""
            }
        }
    }

    /// Returns true if every character is a single byte.
    pub fn is_ascii(&self) -> bool {
        self.data.is_ascii()
    }
}

/// Molecular coding of an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coding {
    #[default]
    Dna,
    Protein,
}

impl Coding {
    /// The missing-data symbol conventionally used with this coding.
    pub fn default_missing(self) -> char {
        match self {
            Coding::Dna => 'n',
            Coding::Protein => 'x',
        }
    }
}

impl fmt::Display for Coding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coding::Dna => write!(f, "DNA"),
            Coding::Protein => write!(f, "Protein"),
        }
    }
}

/// A coding paired with the missing-data symbol used to pad it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCode {
    pub coding: Coding,
    pub missing: char,
}

impl SequenceCode {
    /// Creates a code with the coding's default missing symbol.
    pub fn new(coding: Coding) -> Self {
        Self {
            coding,
            missing: coding.default_missing(),
        }
    }

    /// Returns the same code with a different missing symbol.
    pub fn with_missing(self, missing: char) -> Self {
        Self { missing, ..self }
    }
}

impl Default for SequenceCode {
    fn default() -> Self {
        Self::new(Coding::Dna)
    }
}

/// The columns a locus occupies inside a concatenated alignment.
///
/// Coordinates are 1-based and inclusive, as in RAxML and MrBayes charsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocusRange {
    /// Locus name (source file name without extension)
    pub name: String,
    pub start: usize,
    pub end: usize,
    /// `lset`/`prset` directives carried by the source NEXUS file
    pub models: Vec<String>,
    /// RAxML model name, when the locus came from a partition table
    pub partition_model: Option<String>,
}

impl LocusRange {
    /// Creates a range with no attached models.
    pub fn new(name: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            models: Vec::new(),
            partition_model: None,
        }
    }

    /// Number of columns covered by the range.
    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    /// Returns true if the range covers no column.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The 0-based, end-exclusive slice range for this locus.
    pub fn columns(&self) -> Range<usize> {
        self.start.saturating_sub(1)..self.end
    }
}

impl fmt::Display for LocusRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Represents one parsed (or concatenated) alignment.
///
/// Row order in `sequences` is the taxon order: order of first appearance in
/// the source file, or in the loci for a concatenation.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Locus name, usually the source file name without extension
    pub name: String,
    /// All sequences in the alignment, in taxon order
    pub sequences: Vec<Sequence>,
    /// The length every sequence is expected to have
    pub locus_length: usize,
    pub code: SequenceCode,
    /// Format the alignment was read from (`None` when built in memory)
    pub input_format: Option<FileFormat>,
    /// Raw `lset`/`prset` directives (NEXUS input only)
    pub model: Vec<String>,
    /// RAxML model name attached by reverse concatenation
    pub partition_model: Option<String>,
    /// Per-locus ranges, present only on concatenation results
    pub loci_ranges: Option<Vec<LocusRange>>,
    /// Columns of the binary indel block appended by gap coding
    pub restriction_range: Option<(usize, usize)>,
}

impl Alignment {
    /// Creates an alignment from in-memory sequences.
    ///
    /// The locus length is taken from the first sequence.
    pub fn new(name: impl Into<String>, sequences: Vec<Sequence>, code: SequenceCode) -> Self {
        let locus_length = sequences.first().map(Sequence::len).unwrap_or(0);
        Self {
            name: name.into(),
            sequences,
            locus_length,
            code,
            input_format: None,
            model: Vec::new(),
            partition_model: None,
            loci_ranges: None,
            restriction_range: None,
        }
    }

    /// Returns the number of sequences.
    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    /// Returns true if the alignment holds no sequence.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Gets a sequence by index.
    pub fn get(&self, index: usize) -> Option<&Sequence> {
        self.sequences.get(index)
    }

    /// Gets a sequence by taxon name.
    pub fn get_by_name(&self, name: &str) -> Option<&Sequence> {
        self.sequences.iter().find(|s| s.id == name)
    }

    /// Returns true if the taxon is part of the alignment.
    pub fn contains(&self, name: &str) -> bool {
        self.get_by_name(name).is_some()
    }

    /// Taxon names in output order.
    pub fn taxa_order(&self) -> Vec<&str> {
        self.sequences.iter().map(|s| s.id.as_str()).collect()
    }

    /// Returns true once `code_gaps` has appended an indel block.
    pub fn is_gap_coded(&self) -> bool {
        self.restriction_range.is_some()
    }

    /// Removes every listed taxon, keeping the order of the others.
    ///
    /// Names that are not in the alignment are ignored. Returns how many
    /// sequences were removed.
    pub fn remove_taxa<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let before = self.sequences.len();
        self.sequences
            .retain(|seq| !names.iter().any(|name| name.as_ref() == seq.id));
        before - self.sequences.len()
    }

    /// Taxa whose sequence holds non-ASCII characters.
    pub fn non_ascii_taxa(&self) -> Vec<&str> {
        self.sequences
            .iter()
            .filter(|seq| !seq.is_ascii())
            .map(|seq| seq.id.as_str())
            .collect()
    }

    /// Reports taxa whose length differs from the modal sequence length.
    ///
    /// Advisory only: the mismatching names are logged as a warning and
    /// returned, the alignment is left untouched.
    pub fn check_sizes(&self) -> Vec<String> {
        let outliers: Vec<String> = utils::size_outliers(
            self.sequences.iter().map(|s| (s.id.as_str(), s.len())),
        )
        .into_iter()
        .map(str::to_string)
        .collect();

        if !outliers.is_empty() {
            log::warn!(
                "Unequal sequence length detected in {} for the following taxa: {}",
                self.name,
                outliers.join(", ")
            );
        }
        outliers
    }
}
