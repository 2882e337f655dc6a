//! Multi-format alignment file parser.
//!
//! Supports automatic format detection for:
//! - FASTA (.fasta, .fa, .fas)
//! - PHYLIP (.phy, .phylip) - sequential only
//! - NEXUS (.nex, .nexus, .nxs)
//!
//! Format detection priority:
//! 1. Explicit format specification (-f option)
//! 2. Content-based detection (first non-empty line)
//! 3. File extension
//!
//! Content sniffing also guesses whether the data is DNA or protein from the
//! first sequence of the file. That guess is a nucleotide-frequency heuristic
//! and is best-effort only.

pub mod fasta;
pub mod nexus;
pub mod phylip;

use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use thiserror::Error;

use crate::model::{Alignment, Coding, Sequence, SequenceCode};
use crate::utils;

/// Detected file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Fasta,
    Phylip,
    Nexus,
}

impl FileFormat {
    /// What the first non-empty line of a file in this format must look like.
    pub fn marker(self) -> &'static str {
        match self {
            FileFormat::Fasta => "start with '>'",
            FileFormat::Phylip => "start with two integers separated by whitespace",
            FileFormat::Nexus => "read '#NEXUS'",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFormat::Fasta => write!(f, "FASTA"),
            FileFormat::Phylip => write!(f, "PHYLIP"),
            FileFormat::Nexus => write!(f, "NEXUS"),
        }
    }
}

/// Errors that can occur during file parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to open file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Empty file: {0}")]
    EmptyFile(String),

    #[error("Could not determine the format of {0}.\n\
             Hint: Use -f/--input-format to specify the format explicitly:\n  \
             supermatrix -f fasta <files>   # FASTA format\n  \
             supermatrix -f nexus <files>   # NEXUS format\n  \
             supermatrix -f phylip <files>  # PHYLIP format")]
    UnknownFormat(String),

    #[error("File {path} is not in {format} format: its first non-empty line does not {}. \
             Please verify the file or the input format settings", .format.marker())]
    FormatMismatch { path: String, format: FileFormat },

    #[error("Duplicated taxa found in file {path} ({}). \
             Please correct this problem and re-run", .names.join(", "))]
    DuplicateTaxa { path: String, names: Vec<String> },

    #[error("FASTA error in {path}: {source}")]
    FastaError {
        path: String,
        #[source]
        source: fasta::FastaError,
    },

    #[error("PHYLIP error in {path}: {source}")]
    PhylipError {
        path: String,
        #[source]
        source: phylip::PhylipError,
    },

    #[error("NEXUS error in {path}: {source}")]
    NexusError {
        path: String,
        #[source]
        source: nexus::NexusError,
    },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Rows read by one of the format parsers, before name cleaning and checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAlignment {
    /// (taxon, sequence) in order of first appearance; may contain duplicates
    pub rows: Vec<(String, String)>,
    /// Declared locus length (PHYLIP header), if any
    pub locus_length: Option<usize>,
    /// `lset`/`prset` directives found after a NEXUS matrix
    pub model: Vec<String>,
}

/// How input files are read.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Forced input format; sniffed from the content when `None`
    pub format: Option<FileFormat>,
    /// Forced coding; guessed from the first sequence when `None`
    pub coding: Option<Coding>,
    /// Missing-data symbol overriding the coding default
    pub missing: Option<char>,
    /// Run the modal-length size check after parsing
    pub size_check: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            format: None,
            coding: None,
            missing: None,
            size_check: true,
        }
    }
}

/// Result of inspecting the leading lines of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub format: Option<FileFormat>,
    pub code: Option<SequenceCode>,
}

/// Detects format from file extension.
pub fn detect_format_from_extension<P: AsRef<Path>>(path: P) -> Option<FileFormat> {
    let ext = path.as_ref().extension().and_then(OsStr::to_str)?;
    match ext.to_lowercase().as_str() {
        // FASTA extensions
        "fa" | "fas" | "fasta" | "fna" | "faa" => Some(FileFormat::Fasta),
        // NEXUS extensions
        "nex" | "nexus" | "nxs" => Some(FileFormat::Nexus),
        // PHYLIP extensions
        "phy" | "phylip" => Some(FileFormat::Phylip),
        _ => None,
    }
}

fn first_non_empty(content: &str) -> Option<(usize, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx, line.trim()))
        .find(|(_, line)| !line.is_empty())
}

fn is_phylip_header(line: &str) -> bool {
    let parts: Vec<&str> = line.split_whitespace().collect();
    parts.len() == 2 && parts.iter().all(|p| p.parse::<usize>().is_ok())
}

/// Sniffs format and coding from file content.
///
/// The first non-empty line decides the format. A sample sequence is then
/// taken from the same file and handed to [`guess_code`]. Unknown formats
/// skip the coding guess.
pub fn sniff_content(content: &str) -> Sniffed {
    let Some((idx, first)) = first_non_empty(content) else {
        return Sniffed { format: None, code: None };
    };
    let mut rest = content.lines().skip(idx + 1);

    let (format, sample) = if first.to_uppercase().starts_with("#NEXUS") {
        let sample = rest
            .by_ref()
            .position(|line| line.trim().eq_ignore_ascii_case("matrix"))
            .and_then(|_| rest.next())
            .map(|line| line.split_whitespace().skip(1).collect::<String>())
            .unwrap_or_default();
        (FileFormat::Nexus, sample)
    } else if first.starts_with('>') {
        let sample = rest
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take_while(|line| !line.starts_with('>'))
            .collect::<String>();
        (FileFormat::Fasta, sample)
    } else if is_phylip_header(first) {
        let sample = rest
            .next()
            .map(|line| line.split_whitespace().skip(1).collect::<String>())
            .unwrap_or_default();
        (FileFormat::Phylip, sample)
    } else {
        log::debug!("Unrecognised first line: {first}");
        return Sniffed { format: None, code: None };
    };

    Sniffed {
        format: Some(format),
        code: guess_code(&sample),
    }
}

/// Sniffs format and coding of a file.
pub fn sniff_file<P: AsRef<Path>>(path: P) -> ParseResult<Sniffed> {
    let content = read_content(path.as_ref())?;
    Ok(sniff_content(&content))
}

/// Guesses DNA or protein from a sample sequence.
///
/// Gaps are ignored; more than 90% of A, C, G, T, N means DNA. Returns `None`
/// when the sample has no characters left to count.
pub fn guess_code(sample: &str) -> Option<SequenceCode> {
    let residues: Vec<char> = sample
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if residues.is_empty() {
        return None;
    }

    let dna = residues
        .iter()
        .filter(|c| matches!(c, 'A' | 'T' | 'G' | 'C' | 'N'))
        .count();
    let coding = if dna as f64 / residues.len() as f64 > 0.9 {
        Coding::Dna
    } else {
        Coding::Protein
    };
    Some(SequenceCode::new(coding))
}

/// Checks that the content structurally matches the declared format.
pub fn check_format(content: &str, format: FileFormat, path: &str) -> ParseResult<()> {
    let Some((_, first)) = first_non_empty(content) else {
        return Err(ParseError::EmptyFile(path.to_string()));
    };

    let matches = match format {
        FileFormat::Fasta => first.starts_with('>'),
        FileFormat::Nexus => first.eq_ignore_ascii_case("#nexus"),
        FileFormat::Phylip => {
            let parts: Vec<&str> = first.split_whitespace().collect();
            parts.len() >= 2
                && parts[0].parse::<usize>().is_ok()
                && parts[1].parse::<usize>().is_ok()
        }
    };

    if matches {
        Ok(())
    } else {
        Err(ParseError::FormatMismatch {
            path: path.to_string(),
            format,
        })
    }
}

fn parse_raw(content: &str, format: FileFormat, path: &str) -> ParseResult<RawAlignment> {
    let path = path.to_string();
    match format {
        FileFormat::Fasta => fasta::parse_fasta_str(content)
            .map_err(|source| ParseError::FastaError { path, source }),
        FileFormat::Phylip => phylip::parse_phylip_str(content)
            .map_err(|source| ParseError::PhylipError { path, source }),
        FileFormat::Nexus => nexus::parse_nexus_str(content)
            .map_err(|source| ParseError::NexusError { path, source }),
    }
}

/// Parses content of a known format into an [`Alignment`].
///
/// `path` is only used to label warnings and errors. Taxon names are cleaned
/// of illegal characters, duplicates abort the parse, and the size check runs
/// when `size_check` is set.
pub fn parse_content(
    content: &str,
    format: FileFormat,
    path: &str,
    code: SequenceCode,
    size_check: bool,
) -> ParseResult<Alignment> {
    check_format(content, format, path)?;
    let raw = parse_raw(content, format, path)?;

    let sequences: Vec<Sequence> = raw
        .rows
        .into_iter()
        .map(|(name, data)| {
            let clean = utils::strip_illegal(&name);
            if clean != name {
                log::warn!("Removed illegal characters from the taxon {name} in {path}");
            }
            Sequence::new(clean, data)
        })
        .collect();

    let names = utils::duplicates(sequences.iter().map(|s| s.id.as_str()));
    if !names.is_empty() {
        return Err(ParseError::DuplicateTaxa {
            path: path.to_string(),
            names,
        });
    }

    let mut alignment = Alignment::new(locus_name(path), sequences, code);
    if let Some(length) = raw.locus_length {
        alignment.locus_length = length;
    }
    alignment.input_format = Some(format);
    alignment.model = raw.model;

    let non_ascii = alignment.non_ascii_taxa();
    if !non_ascii.is_empty() {
        log::warn!(
            "Non-ASCII characters in {} for the following taxa: {}. \
             Column ranges may not split these sequences correctly",
            path,
            non_ascii.join(", ")
        );
    }

    if size_check {
        alignment.check_sizes();
    }
    Ok(alignment)
}

/// Locus name for a file: its name without extension.
pub fn locus_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or(path)
        .to_string()
}

fn read_content(path: &Path) -> ParseResult<String> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len() as usize;
    if file_size == 0 {
        return Err(ParseError::EmptyFile(path.display().to_string()));
    }

    let mut reader = BufReader::with_capacity(1024 * 1024, file);
    let mut content = String::with_capacity(file_size);
    reader.read_to_string(&mut content)?;
    Ok(content)
}

/// Parses an alignment file.
///
/// Format: forced format, then sniffed format, then file extension.
/// Coding: forced coding, then the sniffed guess, then DNA.
pub fn parse_file_with_options<P: AsRef<Path>>(
    path: P,
    options: &ParseOptions,
) -> ParseResult<Alignment> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let content = read_content(path)?;
    let sniffed = sniff_content(&content);

    let format = options
        .format
        .or(sniffed.format)
        .or_else(|| detect_format_from_extension(path))
        .ok_or_else(|| ParseError::UnknownFormat(label.clone()))?;

    let mut code = match (options.coding, sniffed.code) {
        (Some(coding), _) => SequenceCode::new(coding),
        (None, Some(code)) => code,
        (None, None) => {
            log::debug!("Could not guess the coding of {label}, assuming DNA");
            SequenceCode::default()
        }
    };
    if let Some(missing) = options.missing {
        code = code.with_missing(missing);
    }
    log::debug!("{label}: {format}, {}", code.coding);

    parse_content(&content, format, &label, code, options.size_check)
}

/// Parses an alignment file, automatically detecting format and coding.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ParseResult<Alignment> {
    parse_file_with_options(path, &ParseOptions::default())
}

/// Parses an alignment file with explicit format specification.
pub fn parse_file_as<P: AsRef<Path>>(path: P, format: FileFormat) -> ParseResult<Alignment> {
    let options = ParseOptions {
        format: Some(format),
        ..ParseOptions::default()
    };
    parse_file_with_options(path, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sniff_fasta() {
        let sniffed = sniff_content(">seq1\nACGT\nACGT\n>seq2\nMKLV\n");
        assert_eq!(sniffed.format, Some(FileFormat::Fasta));
        assert_eq!(sniffed.code, Some(SequenceCode::new(Coding::Dna)));
    }

    #[test]
    fn test_sniff_phylip() {
        let sniffed = sniff_content("  3   10\nseq1      MKLVWQERTY\n");
        assert_eq!(sniffed.format, Some(FileFormat::Phylip));
        assert_eq!(sniffed.code, Some(SequenceCode::new(Coding::Protein)));
    }

    #[test]
    fn test_sniff_nexus() {
        let content = "#NEXUS\nBEGIN DATA;\n  MATRIX\nseq1 ACGT--ACGT\n;\nEND;\n";
        let sniffed = sniff_content(content);
        assert_eq!(sniffed.format, Some(FileFormat::Nexus));
        assert_eq!(sniffed.code, Some(SequenceCode::new(Coding::Dna)));

        // Case insensitive
        let sniffed = sniff_content("#nexus\nbegin data;\nmatrix\nseq1 MKLVW\n;\n");
        assert_eq!(sniffed.format, Some(FileFormat::Nexus));
        assert_eq!(sniffed.code, Some(SequenceCode::new(Coding::Protein)));
    }

    #[test]
    fn test_sniff_unknown() {
        let sniffed = sniff_content("This is not a valid sequence file\n");
        assert_eq!(sniffed, Sniffed { format: None, code: None });
        // Three integers are not a PHYLIP header
        assert_eq!(sniff_content("3 10 2\n").format, None);
    }

    #[test]
    fn test_sniff_with_leading_empty_lines() {
        let sniffed = sniff_content("\n\n  \n>seq1\nACGT\n");
        assert_eq!(sniffed.format, Some(FileFormat::Fasta));
    }

    #[test]
    fn test_guess_code_ignores_gaps() {
        assert_eq!(guess_code("----ACGTN"), Some(SequenceCode::new(Coding::Dna)));
        assert_eq!(guess_code("acgtacgtac"), Some(SequenceCode::new(Coding::Dna)));
        assert_eq!(
            guess_code("MKLVACGTAC"),
            Some(SequenceCode::new(Coding::Protein))
        );
        assert_eq!(guess_code("----"), None);
    }

    #[test]
    fn test_detect_from_extension() {
        assert_eq!(detect_format_from_extension("test.fas"), Some(FileFormat::Fasta));
        assert_eq!(detect_format_from_extension("test.nex"), Some(FileFormat::Nexus));
        assert_eq!(detect_format_from_extension("test.phy"), Some(FileFormat::Phylip));
        assert_eq!(detect_format_from_extension("test.txt"), None);
    }

    #[test]
    fn test_check_format_mismatch() {
        let result = check_format(">seq1\nACGT\n", FileFormat::Nexus, "gene.fas");
        match result {
            Err(ParseError::FormatMismatch { path, format }) => {
                assert_eq!(path, "gene.fas");
                assert_eq!(format, FileFormat::Nexus);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(check_format("\n#NEXUS\n", FileFormat::Nexus, "a").is_ok());
        assert!(check_format("2 4\n", FileFormat::Phylip, "a").is_ok());
        assert!(check_format("two four\n", FileFormat::Phylip, "a").is_err());
    }

    #[test]
    fn test_parse_content_cleans_names() {
        let content = ">Homo (sapiens)\nACGT\n>Mus:musculus\nACGG\n";
        let alignment =
            parse_content(content, FileFormat::Fasta, "x.fas", SequenceCode::default(), true)
                .unwrap();
        assert_eq!(alignment.taxa_order(), vec!["Homo_sapiens", "Musmusculus"]);
        assert_eq!(alignment.name, "x");
        assert_eq!(alignment.input_format, Some(FileFormat::Fasta));
    }

    #[test]
    fn test_duplicate_taxa_is_fatal() {
        let fasta = ">A\nACGT\n>B\nACGT\n>A\nTTTT\n";
        let phylip = "3 4\nA ACGT\nB ACGT\nA TTTT\n";
        let nexus = "#NEXUS\nbegin data;\nmatrix\nA ACGT\nB ACGT\nA TTTT\n;\nend;\n";
        for (content, format) in [
            (fasta, FileFormat::Fasta),
            (phylip, FileFormat::Phylip),
            (nexus, FileFormat::Nexus),
        ] {
            let result =
                parse_content(content, format, "dup", SequenceCode::default(), true);
            match result {
                Err(ParseError::DuplicateTaxa { names, .. }) => {
                    assert_eq!(names, vec!["A".to_string()])
                }
                other => panic!("{format}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_file_sniffs_format_and_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prot.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "2 5\nA MKLVW\nB MKLVF").unwrap();

        let alignment = parse_file(&path).unwrap();
        assert_eq!(alignment.input_format, Some(FileFormat::Phylip));
        assert_eq!(alignment.code, SequenceCode::new(Coding::Protein));
        assert_eq!(alignment.locus_length, 5);
        assert_eq!(alignment.name, "prot");
    }

    #[test]
    fn test_parse_file_as_rejects_wrong_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gene.fas");
        std::fs::write(&path, ">A\nACGT\n").unwrap();
        assert!(matches!(
            parse_file_as(&path, FileFormat::Phylip),
            Err(ParseError::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gene.fas");
        std::fs::write(&path, ">A\nACGT\n").unwrap();
        let options = ParseOptions {
            missing: Some('?'),
            ..ParseOptions::default()
        };
        let alignment = parse_file_with_options(&path, &options).unwrap();
        assert_eq!(alignment.code.missing, '?');
        assert_eq!(alignment.code.coding, Coding::Dna);
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.fas");
        File::create(&path).unwrap();
        assert!(matches!(parse_file(&path), Err(ParseError::EmptyFile(_))));
    }
}
