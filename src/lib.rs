//! # supermatrix - Alignment Converter and Concatenator
//!
//! Converts multiple sequence alignments between FASTA, NEXUS and PHYLIP, and
//! merges single-locus alignments into a partitioned supermatrix.
//!
//! ## Architecture
//!
//! - `model`: sequences, codings, locus ranges and the `Alignment` entity
//! - `formats`: format/coding sniffing, per-format parsers and renderers
//! - `transform`: haplotype collapsing, indel coding, terminal gap filtering
//! - `collection`: batch loading, concatenation and its reverse
//! - `partition`: NEXUS charset and RAxML partition tables
//! - `writer`: multi-format output of an alignment
//! - `zorro`: ZORRO column weights for RAxML
//! - `utils`: name cleaning, duplicate and size checks
//!
//! ## Example
//!
//! ```no_run
//! use supermatrix::collection::AlignmentCollection;
//! use supermatrix::formats::ParseOptions;
//! use supermatrix::writer::{OutputFormat, WriteOptions};
//!
//! let files = ["locusA.fas", "locusB.nex"];
//! let loci = AlignmentCollection::from_files(&files, &ParseOptions::default(), |_| {})?;
//! let supermatrix = loci.concatenate()?;
//! let options = WriteOptions {
//!     formats: vec![OutputFormat::Nexus, OutputFormat::Phylip],
//!     ..WriteOptions::default()
//! };
//! supermatrix.write_to_file("supermatrix", &options)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod collection;
pub mod formats;
pub mod model;
pub mod partition;
pub mod transform;
pub mod utils;
pub mod writer;
pub mod zorro;
