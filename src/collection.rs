//! Ordered sets of single-locus alignments.
//!
//! [`AlignmentCollection::concatenate`] merges loci into one supermatrix,
//! padding every taxon absent from a locus with that locus's missing-data
//! symbol. [`Alignment::reverse_concatenate`] splits a supermatrix back
//! into loci following a [`PartitionTable`].

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::formats::{self, FileFormat, ParseError, ParseOptions};
use crate::model::{Alignment, LocusRange, Sequence};
use crate::partition::PartitionTable;

/// Errors that can occur while building or splitting collections.
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Cannot concatenate an empty collection")]
    Empty,

    #[error("Partition {name} ({start}-{end}) exceeds the alignment length ({length})")]
    RangeOutOfBounds {
        name: String,
        start: usize,
        end: usize,
        length: usize,
    },
}

/// Result type for collection operations.
pub type CollectionResult<T> = Result<T, CollectionError>;

/// Notification sent after each file of a batch is parsed.
#[derive(Debug, Clone, Copy)]
pub struct LoadProgress<'a> {
    /// 1-based position of the file in the batch
    pub index: usize,
    pub total: usize,
    pub path: &'a Path,
}

/// Alignments kept in input order.
#[derive(Debug, Clone, Default)]
pub struct AlignmentCollection {
    pub alignments: Vec<Alignment>,
}

impl AlignmentCollection {
    pub fn new(alignments: Vec<Alignment>) -> Self {
        Self { alignments }
    }

    /// Parses every file in order.
    ///
    /// `on_loaded` is called after each file. The first file that fails to
    /// parse stops the batch.
    pub fn from_files<P, F>(
        paths: &[P],
        options: &ParseOptions,
        mut on_loaded: F,
    ) -> CollectionResult<Self>
    where
        P: AsRef<Path>,
        F: FnMut(LoadProgress<'_>),
    {
        let mut alignments = Vec::with_capacity(paths.len());
        for (idx, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let alignment = formats::parse_file_with_options(path, options)?;
            log::info!(
                "Loaded {} ({} taxa, {} columns)",
                path.display(),
                alignment.sequence_count(),
                alignment.locus_length
            );
            alignments.push(alignment);
            on_loaded(LoadProgress {
                index: idx + 1,
                total: paths.len(),
                path,
            });
        }
        Ok(Self { alignments })
    }

    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Alignment> {
        self.alignments.iter()
    }

    /// Merges the loci into one alignment.
    ///
    /// Taxon order is the order of first appearance across loci. A taxon
    /// absent from a locus is padded with that locus's missing symbol, so
    /// every sequence ends up as long as the sum of the locus lengths. The
    /// members are left untouched.
    pub fn concatenate(&self) -> CollectionResult<Alignment> {
        let first = self.alignments.first().ok_or(CollectionError::Empty)?;
        let code = first.code;

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut sequences: Vec<Sequence> = Vec::new();
        let mut ranges: Vec<LocusRange> = Vec::with_capacity(self.alignments.len());
        let mut models = Vec::new();
        let mut filled = 0;

        for locus in &self.alignments {
            if locus.code.coding != code.coding {
                log::warn!(
                    "{} is {} while {} is {}; the concatenation is declared as {}",
                    locus.name,
                    locus.code.coding,
                    first.name,
                    code.coding,
                    code.coding
                );
            }

            let length = locus.locus_length;
            let mut present = vec![false; sequences.len()];

            for seq in &locus.sequences {
                match index.get(&seq.id) {
                    Some(&row) => {
                        sequences[row].data.push_str(&seq.data);
                        present[row] = true;
                    }
                    None => {
                        let mut data = String::with_capacity(filled + length);
                        for (previous, range) in self.alignments.iter().zip(&ranges) {
                            data.extend(std::iter::repeat(previous.code.missing).take(range.len()));
                        }
                        data.push_str(&seq.data);

                        index.insert(seq.id.clone(), sequences.len());
                        sequences.push(Sequence::new(seq.id.as_str(), data));
                        present.push(true);
                    }
                }
            }

            let padding: String = std::iter::repeat(locus.code.missing).take(length).collect();
            for (seq, _) in sequences
                .iter_mut()
                .zip(&present)
                .filter(|(_, present)| !**present)
            {
                seq.data.push_str(&padding);
            }

            let mut range = LocusRange::new(locus.name.as_str(), filled + 1, filled + length);
            if locus.input_format == Some(FileFormat::Nexus) {
                range.models = locus.model.clone();
                models.extend(locus.model.iter().cloned());
            }
            range.partition_model = locus.partition_model.clone();
            ranges.push(range);
            filled += length;
        }

        let mut alignment = Alignment::new("concatenation", sequences, code);
        alignment.locus_length = filled;
        alignment.model = models;
        alignment.loci_ranges = Some(ranges);
        log::info!(
            "Concatenated {} loci: {} taxa, {} columns",
            self.alignments.len(),
            alignment.sequence_count(),
            filled
        );
        Ok(alignment)
    }
}

impl<'a> IntoIterator for &'a AlignmentCollection {
    type Item = &'a Alignment;
    type IntoIter = std::slice::Iter<'a, Alignment>;

    fn into_iter(self) -> Self::IntoIter {
        self.alignments.iter()
    }
}

impl Alignment {
    /// Splits a concatenated alignment into one alignment per partition.
    ///
    /// A taxon is kept in a partition only if its slice holds at least one
    /// character other than the missing symbol. Each part keeps the
    /// partition's RAxML model and, when the partition matches a recorded
    /// locus range, that locus's NEXUS model directives.
    pub fn reverse_concatenate(&self, table: &PartitionTable) -> CollectionResult<AlignmentCollection> {
        let missing = self.code.missing.to_ascii_lowercase();
        let mut parts = Vec::with_capacity(table.len());

        for partition in table {
            if partition.end > self.locus_length {
                return Err(CollectionError::RangeOutOfBounds {
                    name: partition.name.clone(),
                    start: partition.start,
                    end: partition.end,
                    length: self.locus_length,
                });
            }

            let sequences: Vec<Sequence> = self
                .sequences
                .iter()
                .filter_map(|seq| {
                    let slice = seq.slice(partition.columns());
                    slice
                        .chars()
                        .any(|c| c.to_ascii_lowercase() != missing)
                        .then(|| Sequence::new(seq.id.as_str(), slice))
                })
                .collect();

            let mut part = Alignment::new(partition.name.as_str(), sequences, self.code);
            part.locus_length = partition.end - partition.start + 1;
            part.partition_model = partition.model.clone();
            if let Some(range) = self.loci_ranges.iter().flatten().find(|range| {
                range.start == partition.start && range.end == partition.end
            }) {
                part.model = range.models.clone();
                if !part.model.is_empty() {
                    part.input_format = Some(FileFormat::Nexus);
                }
                if part.partition_model.is_none() {
                    part.partition_model = range.partition_model.clone();
                }
            }

            log::debug!(
                "Partition {}: kept {} of {} taxa",
                partition.name,
                part.sequence_count(),
                self.sequence_count()
            );
            parts.push(part);
        }

        Ok(AlignmentCollection::new(parts))
    }
}
