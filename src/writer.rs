//! Rendering alignments to output files.
//!
//! Each requested [`OutputFormat`] is written to its own file, named from a
//! common base plus the format's suffix:
//!
//! | Format   | Suffix    |
//! |----------|-----------|
//! | FASTA    | `.fas`    |
//! | PHYLIP   | `.phy` (and `_part.File` for concatenations) |
//! | NEXUS    | `.nex`    |
//! | MCMCtree | `_mc.phy` |

use std::ffi::OsString;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::formats::{fasta, nexus, phylip, FileFormat};
use crate::model::{Alignment, Coding};
use crate::partition::PartitionTable;

/// Suffix of the RAxML partition file written next to PHYLIP output.
pub const PARTITION_FILE_SUFFIX: &str = "_part.File";

/// Output layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Fasta,
    Phylip,
    Nexus,
    /// One PHYLIP block per locus
    Mcmctree,
}

impl OutputFormat {
    /// Appended to the output base name.
    pub fn suffix(self) -> &'static str {
        match self {
            OutputFormat::Fasta => ".fas",
            OutputFormat::Phylip => ".phy",
            OutputFormat::Nexus => ".nex",
            OutputFormat::Mcmctree => "_mc.phy",
        }
    }
}

impl From<FileFormat> for OutputFormat {
    fn from(format: FileFormat) -> Self {
        match format {
            FileFormat::Fasta => OutputFormat::Fasta,
            FileFormat::Phylip => OutputFormat::Phylip,
            FileFormat::Nexus => OutputFormat::Nexus,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Fasta => write!(f, "FASTA"),
            OutputFormat::Phylip => write!(f, "PHYLIP"),
            OutputFormat::Nexus => write!(f, "NEXUS"),
            OutputFormat::Mcmctree => write!(f, "MCMCtree PHYLIP"),
        }
    }
}

/// Errors that can occur while writing output files.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{name} contains gap-coded characters and can only be written as NEXUS \
             ({format} output requested). Please remove the other output formats")]
    GapCodedOutput { name: String, format: OutputFormat },
}

/// Result type for write operations.
pub type WriteResult<T> = Result<T, WriteError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> WriteError + '_ {
    move |source| WriteError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// How alignments are rendered.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Formats to write, each to its own file
    pub formats: Vec<OutputFormat>,
    /// Interleaved NEXUS matrix
    pub interleave: bool,
    pub gap: char,
    /// Missing-data symbol declared in NEXUS; the alignment's own when `None`
    pub missing: Option<char>,
    /// Taxa declared as outgroup in NEXUS output
    pub outgroup: Vec<String>,
    /// RAxML model for protein partitions without one
    pub protein_model: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Nexus],
            interleave: false,
            gap: '-',
            missing: None,
            outgroup: Vec::new(),
            protein_model: "WAG".to_string(),
        }
    }
}

/// A renderer for one output layout.
pub trait FormatWriter {
    fn format(&self) -> OutputFormat;

    fn render(
        &self,
        alignment: &Alignment,
        options: &WriteOptions,
        out: &mut dyn Write,
    ) -> io::Result<()>;
}

pub struct FastaWriter;
pub struct PhylipWriter;
pub struct NexusWriter;
pub struct McmctreeWriter;

impl FormatWriter for FastaWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Fasta
    }

    fn render(&self, alignment: &Alignment, _: &WriteOptions, out: &mut dyn Write) -> io::Result<()> {
        fasta::write_fasta(alignment, out)
    }
}

impl FormatWriter for PhylipWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Phylip
    }

    fn render(&self, alignment: &Alignment, _: &WriteOptions, out: &mut dyn Write) -> io::Result<()> {
        phylip::write_phylip(alignment, out)
    }
}

impl FormatWriter for NexusWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Nexus
    }

    fn render(
        &self,
        alignment: &Alignment,
        options: &WriteOptions,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        nexus::write_nexus(alignment, options, out)
    }
}

impl FormatWriter for McmctreeWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Mcmctree
    }

    fn render(&self, alignment: &Alignment, _: &WriteOptions, out: &mut dyn Write) -> io::Result<()> {
        phylip::write_mcmctree(alignment, out)
    }
}

/// The renderer for a format.
pub fn writer_for(format: OutputFormat) -> &'static dyn FormatWriter {
    match format {
        OutputFormat::Fasta => &FastaWriter,
        OutputFormat::Phylip => &PhylipWriter,
        OutputFormat::Nexus => &NexusWriter,
        OutputFormat::Mcmctree => &McmctreeWriter,
    }
}

/// `base` with `suffix` appended to its last component.
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

impl Alignment {
    /// RAxML model for partitions that do not carry their own.
    fn default_partition_model<'a>(&self, options: &'a WriteOptions) -> &'a str {
        match self.code.coding {
            Coding::Dna => "DNA",
            Coding::Protein => options.protein_model.as_str(),
        }
    }

    /// Appends one `MODEL, NAME = START-END` line per locus to `path`.
    fn append_partition_file(&self, path: &Path, options: &WriteOptions) -> WriteResult<bool> {
        let Some(ranges) = &self.loci_ranges else {
            return Ok(false);
        };

        let table = PartitionTable::from_ranges(ranges);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_error(path))?;
        file.write_all(table.to_raxml(self.default_partition_model(options)).as_bytes())
            .map_err(io_error(path))?;
        Ok(true)
    }

    /// Writes the alignment once per requested format.
    ///
    /// Every format renders from the same in-memory state. A gap-coded
    /// alignment is only written as NEXUS; any other requested format fails
    /// the call before a file is created. Returns the written paths.
    pub fn write_to_file<P: AsRef<Path>>(
        &self,
        base: P,
        options: &WriteOptions,
    ) -> WriteResult<Vec<PathBuf>> {
        let base = base.as_ref();

        if self.is_gap_coded() {
            if let Some(&format) = options.formats.iter().find(|f| **f != OutputFormat::Nexus) {
                return Err(WriteError::GapCodedOutput {
                    name: self.name.clone(),
                    format,
                });
            }
        }

        let mut done: Vec<OutputFormat> = Vec::new();
        let mut written = Vec::new();
        for &format in &options.formats {
            if done.contains(&format) {
                continue;
            }
            done.push(format);

            let path = with_suffix(base, format.suffix());
            let file = File::create(&path).map_err(io_error(&path))?;
            let mut out = BufWriter::new(file);
            writer_for(format)
                .render(self, options, &mut out)
                .and_then(|_| out.flush())
                .map_err(io_error(&path))?;
            log::debug!("Wrote {} ({})", path.display(), format);
            written.push(path);

            if format == OutputFormat::Phylip {
                let part = with_suffix(base, PARTITION_FILE_SUFFIX);
                if self.append_partition_file(&part, options)? {
                    log::debug!("Wrote {}", part.display());
                    written.push(part);
                }
            }
        }
        Ok(written)
    }
}
