//! supermatrix - Alignment Converter and Concatenator
//!
//! ## Usage
//!
//! ```bash
//! supermatrix locus*.fas -o supermatrix              # Concatenate into supermatrix.nex
//! supermatrix locus*.fas -o run -O phylip -O nexus   # Several output formats
//! supermatrix -c gene.nex -O fasta                   # Convert each file on its own
//! supermatrix run.phy -r run_part.File -O fasta      # Split a supermatrix back into loci
//! supermatrix --partfile sets.nex -o run             # Convert a partition table
//! ```
//!
//! ## Supported Formats
//!
//! - FASTA (.fasta, .fa, .fas)
//! - PHYLIP (.phy, .phylip), sequential only
//! - NEXUS (.nex, .nexus, .nxs)

// Use jemalloc for better memory management (returns memory to OS)
#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};

use supermatrix::collection::AlignmentCollection;
use supermatrix::formats::{parse_file_with_options, FileFormat, ParseOptions};
use supermatrix::model::{Alignment, Coding};
use supermatrix::partition::PartitionTable;
use supermatrix::writer::{with_suffix, OutputFormat, WriteOptions, PARTITION_FILE_SUFFIX};
use supermatrix::zorro;

/// Input format specification for command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// FASTA format
    Fasta,
    /// NEXUS format
    Nexus,
    /// PHYLIP format
    Phylip,
    /// Auto-detect from content, then extension
    Auto,
}

impl From<FormatArg> for Option<FileFormat> {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Fasta => Some(FileFormat::Fasta),
            FormatArg::Nexus => Some(FileFormat::Nexus),
            FormatArg::Phylip => Some(FileFormat::Phylip),
            FormatArg::Auto => None,
        }
    }
}

/// Output format specification for command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputArg {
    /// NEXUS (.nex)
    Nexus,
    /// PHYLIP (.phy) with a RAxML partition file
    Phylip,
    /// FASTA (.fas)
    Fasta,
    /// One PHYLIP block per locus (_mc.phy)
    Mcmctree,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Nexus => OutputFormat::Nexus,
            OutputArg::Phylip => OutputFormat::Phylip,
            OutputArg::Fasta => OutputFormat::Fasta,
            OutputArg::Mcmctree => OutputFormat::Mcmctree,
        }
    }
}

/// Sequence coding for command line
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CodeArg {
    Dna,
    Protein,
}

impl From<CodeArg> for Coding {
    fn from(arg: CodeArg) -> Self {
        match arg {
            CodeArg::Dna => Coding::Dna,
            CodeArg::Protein => Coding::Protein,
        }
    }
}

/// supermatrix - Convert and concatenate sequence alignments
///
/// Without -c or -r, all input files are concatenated into one partitioned
/// alignment written to the -o base name.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Alignment files (FASTA, NEXUS or PHYLIP)
    #[arg(required_unless_present_any = ["charset", "partfile"])]
    inputs: Vec<PathBuf>,

    /// Force a specific input format (overrides auto-detection)
    #[arg(short = 'f', long = "input-format", value_enum, default_value = "auto")]
    input_format: FormatArg,

    /// Output base name; format suffixes are appended
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Output format (repeat for several)
    #[arg(short = 'O', long = "output-format", value_enum, default_value = "nexus")]
    output_format: Vec<OutputArg>,

    /// Convert each input file on its own instead of concatenating
    #[arg(short = 'c', long = "convert", conflicts_with = "reverse")]
    convert: bool,

    /// Split a concatenated alignment using this partition file
    #[arg(short = 'r', long = "reverse", value_name = "PARTITION_FILE")]
    reverse: Option<PathBuf>,

    /// Merge identical sequences into haplotypes (writes a .haplotypes file)
    #[arg(long)]
    collapse: bool,

    /// Append a binary matrix coding every indel (NEXUS output only)
    #[arg(long = "code-gaps")]
    code_gaps: bool,

    /// Replace leading and trailing gaps with missing data
    #[arg(long = "filter-terminals")]
    filter_terminals: bool,

    /// Taxa to remove
    #[arg(long, num_args = 1.., value_name = "TAXON")]
    remove: Vec<String>,

    /// Outgroup taxa declared in NEXUS output
    #[arg(long, num_args = 1.., value_name = "TAXON")]
    outgroup: Vec<String>,

    /// Write interleaved NEXUS
    #[arg(long)]
    interleave: bool,

    /// Gap symbol
    #[arg(short = 'g', long = "gap", default_value = "-")]
    gap: char,

    /// Missing-data symbol (default: n for DNA, x for protein)
    #[arg(short = 'm', long = "missing")]
    missing: Option<char>,

    /// Force the sequence coding (overrides guessing)
    #[arg(long, value_enum)]
    code: Option<CodeArg>,

    /// RAxML model for protein partitions
    #[arg(long, default_value = "WAG", value_parser = [
        "DAYHOFF", "DCMUT", "JTT", "MTREV", "WAG", "RTREV", "CPREV", "VT", "BLOSUM62", "MTMAM", "LG",
    ])]
    model: String,

    /// Concatenate the ZORRO weight files of the inputs
    #[arg(long)]
    zorro: bool,

    /// Suffix shared by ZORRO weight files
    #[arg(long = "zorro-suffix", default_value = zorro::DEFAULT_SUFFIX)]
    zorro_suffix: String,

    /// Convert a RAxML partition file into NEXUS charsets
    #[arg(long, value_name = "FILE", conflicts_with = "partfile")]
    charset: Option<PathBuf>,

    /// Convert NEXUS charsets into a RAxML partition file
    #[arg(long, value_name = "FILE")]
    partfile: Option<PathBuf>,

    /// Check sequence lengths of the final alignment before writing
    #[arg(long)]
    check: bool,

    /// Skip the sequence length check after parsing
    #[arg(long = "no-size-check")]
    no_size_check: bool,

    /// More output (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Only report errors
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            format: self.input_format.into(),
            coding: self.code.map(Coding::from),
            missing: self.missing,
            size_check: !self.no_size_check,
        }
    }

    fn write_options(&self) -> WriteOptions {
        let mut formats: Vec<OutputFormat> = Vec::new();
        for format in self.output_format.iter().map(|&f| OutputFormat::from(f)) {
            if !formats.contains(&format) {
                formats.push(format);
            }
        }
        WriteOptions {
            formats,
            interleave: self.interleave,
            gap: self.gap,
            missing: self.missing,
            outgroup: self.outgroup.clone(),
            protein_model: self.model.clone(),
        }
    }

    fn partition_conversion(&self) -> Option<&Path> {
        self.charset.as_deref().or(self.partfile.as_deref())
    }
}

/// Rejects inconsistent options before any file is read.
fn validate(args: &Args) -> Result<()> {
    if args.partition_conversion().is_some() {
        if args.output.is_none() {
            anyhow::bail!("Partition file conversion requires an output base name (-o)");
        }
        return Ok(());
    }

    if let Some(reverse) = &args.reverse {
        if args.inputs.len() != 1 {
            anyhow::bail!(
                "Reverse concatenation with {} takes exactly one concatenated alignment (got {})",
                reverse.display(),
                args.inputs.len()
            );
        }
    } else if !args.convert {
        if args.output.is_none() {
            anyhow::bail!(
                "Concatenation requires an output base name (-o). \
                 Use -c to convert files individually"
            );
        }
        if args.inputs.len() < 2 {
            anyhow::bail!(
                "Cannot concatenate a single file. Use -c to convert it instead"
            );
        }
    }

    if args.zorro {
        if args.convert || args.reverse.is_some() {
            anyhow::bail!("--zorro only applies to concatenation");
        }
        if args.inputs.len() < 2 {
            anyhow::bail!("--zorro requires several input alignments");
        }
    }

    if args.code_gaps && args.output_format.iter().any(|f| *f != OutputArg::Nexus) {
        anyhow::bail!("Gap coding can only be written as NEXUS. Use -O nexus");
    }

    Ok(())
}

/// Applies the requested transforms, in a fixed order.
fn prepare(alignment: &mut Alignment, args: &Args, base: &Path) -> Result<()> {
    if !args.remove.is_empty() {
        let removed = alignment.remove_taxa(args.remove.as_slice());
        log::info!("Removed {} taxa from {}", removed, alignment.name);
    }

    if args.filter_terminals {
        let changed = alignment.filter_terminals(args.gap);
        log::info!("Filtered terminal gaps in {} sequences", changed);
    }

    if args.collapse {
        let haplotypes = alignment.collapse();
        let path = haplotypes
            .write_sidecar(base)
            .with_context(|| format!("Failed to write haplotypes for {}", base.display()))?;
        log::info!("Wrote {}", path.display());
    }

    if args.code_gaps {
        alignment.code_gaps(args.gap);
    }

    if args.check {
        alignment.check_sizes();
    }

    Ok(())
}

fn write(alignment: &Alignment, base: &Path, options: &WriteOptions, quiet: bool) -> Result<()> {
    let written = alignment.write_to_file(base, options)?;
    if !quiet {
        for path in written {
            eprintln!(
                "Wrote {} sequences to {}",
                alignment.sequence_count(),
                path.display()
            );
        }
    }
    Ok(())
}

/// `dir/stem`, or `dir/stem_conv` when the input format is also an output.
fn conversion_base(path: &Path, input: Option<FileFormat>, formats: &[OutputFormat]) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let clashes = input.is_some_and(|format| formats.contains(&OutputFormat::from(format)));
    let name = if clashes { format!("{stem}_conv") } else { stem };
    path.with_file_name(name)
}

fn run_partition_conversion(args: &Args, source: &Path, output: &Path) -> Result<()> {
    let table = PartitionTable::from_file(source)
        .with_context(|| format!("Failed to read partition file {}", source.display()))?;

    let (path, content) = if args.charset.is_some() {
        (with_suffix(output, "_charset.nex"), table.to_nexus_charsets())
    } else {
        (with_suffix(output, PARTITION_FILE_SUFFIX), table.to_raxml(&args.model))
    };
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    if !args.quiet {
        eprintln!("Wrote {} partitions to {}", table.len(), path.display());
    }
    Ok(())
}

fn run_conversion(args: &Args, parse_options: &ParseOptions, options: &WriteOptions) -> Result<()> {
    for path in &args.inputs {
        let mut alignment = parse_file_with_options(path, parse_options)?;
        let base = match (&args.output, args.inputs.len()) {
            (Some(output), 1) => output.clone(),
            _ => conversion_base(path, alignment.input_format, &options.formats),
        };
        prepare(&mut alignment, args, &base)?;
        write(&alignment, &base, options, args.quiet)?;
    }
    Ok(())
}

fn run_reverse(
    args: &Args,
    partitions: &Path,
    parse_options: &ParseOptions,
    options: &WriteOptions,
) -> Result<()> {
    let input = &args.inputs[0];
    let table = PartitionTable::from_file(partitions)
        .with_context(|| format!("Failed to read partition file {}", partitions.display()))?;
    let alignment = parse_file_with_options(input, parse_options)?;
    let parts = alignment.reverse_concatenate(&table)?;

    for mut part in parts.alignments {
        let base = match &args.output {
            Some(output) => with_suffix(output, &format!("_{}", part.name)),
            None => input.with_file_name(&part.name),
        };
        prepare(&mut part, args, &base)?;
        write(&part, &base, options, args.quiet)?;
    }
    Ok(())
}

fn run_concatenation(
    args: &Args,
    output: &Path,
    parse_options: &ParseOptions,
    options: &WriteOptions,
) -> Result<()> {
    let show_progress = !args.quiet;
    let collection = AlignmentCollection::from_files(&args.inputs, parse_options, |progress| {
        if show_progress {
            eprint!("\rProcessing file {} out of {}", progress.index, progress.total);
        }
    })?;
    if show_progress {
        eprintln!();
    }

    let mut alignment = collection.concatenate()?;
    if let Some(stem) = output.file_stem() {
        alignment.name = stem.to_string_lossy().into_owned();
    }
    prepare(&mut alignment, args, output)?;
    write(&alignment, output, options, args.quiet)?;

    if args.zorro {
        let weights = zorro::concatenate_weights(&args.inputs, &args.zorro_suffix)?;
        let path = zorro::write_weights(output, &args.zorro_suffix, &weights)?;
        if !args.quiet {
            eprintln!("Wrote {} weights to {}", weights.len(), path.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match (args.quiet, args.verbose) {
        (true, _) => log::LevelFilter::Error,
        (false, 0) => log::LevelFilter::Warn,
        (false, 1) => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None) // Don't show timestamps
        .format_target(false) // Don't show module names
        .init();

    validate(&args)?;

    if let Some(source) = args.partition_conversion() {
        // Checked by validate
        let output = args.output.as_deref().unwrap_or(Path::new("partitions"));
        return run_partition_conversion(&args, source, output);
    }

    let parse_options = args.parse_options();
    let options = args.write_options();

    if let Some(partitions) = &args.reverse {
        run_reverse(&args, partitions, &parse_options, &options)
    } else if args.convert {
        run_conversion(&args, &parse_options, &options)
    } else {
        let output = args.output.as_deref().unwrap_or(Path::new("concatenation"));
        run_concatenation(&args, output, &parse_options, &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("supermatrix").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_valid_concatenation() {
        assert!(validate(&args(&["a.fas", "b.fas", "-o", "run"])).is_ok());
        assert!(validate(&args(&["a.fas", "b.fas", "-o", "run", "--zorro"])).is_ok());
        assert!(validate(&args(&["a.fas", "b.fas", "-o", "run", "--code-gaps"])).is_ok());
    }

    #[test]
    fn test_concatenation_needs_output() {
        assert!(validate(&args(&["a.fas", "b.fas"])).is_err());
    }

    #[test]
    fn test_single_file_concatenation() {
        assert!(validate(&args(&["a.fas", "-o", "run"])).is_err());
        assert!(validate(&args(&["a.fas", "-c"])).is_ok());
    }

    #[test]
    fn test_zorro_misuse() {
        assert!(validate(&args(&["a.fas", "-c", "--zorro"])).is_err());
        assert!(validate(&args(&["a.fas", "b.fas", "-c", "--zorro"])).is_err());
        assert!(validate(&args(&["a.fas", "-r", "part.txt", "--zorro"])).is_err());
    }

    #[test]
    fn test_gap_coding_needs_nexus_output() {
        let argv = ["a.fas", "b.fas", "-o", "run", "--code-gaps", "-O", "phylip"];
        assert!(validate(&args(&argv)).is_err());
        let argv = ["a.fas", "-c", "--code-gaps", "-O", "nexus", "-O", "fasta"];
        assert!(validate(&args(&argv)).is_err());
    }

    #[test]
    fn test_partition_conversion_needs_output() {
        assert!(validate(&args(&["--charset", "part.txt"])).is_err());
        assert!(validate(&args(&["--partfile", "sets.nex"])).is_err());
        assert!(validate(&args(&["--partfile", "sets.nex", "-o", "run"])).is_ok());
    }

    #[test]
    fn test_reverse_takes_one_input() {
        assert!(validate(&args(&["a.phy", "-r", "part.txt"])).is_ok());
        assert!(validate(&args(&["a.phy", "b.phy", "-r", "part.txt"])).is_err());
    }

    #[test]
    fn test_conversion_base() {
        let formats = [OutputFormat::Nexus];
        assert_eq!(
            conversion_base(Path::new("data/gene.nex"), Some(FileFormat::Nexus), &formats),
            PathBuf::from("data/gene_conv")
        );
        assert_eq!(
            conversion_base(Path::new("data/gene.fas"), Some(FileFormat::Fasta), &formats),
            PathBuf::from("data/gene")
        );
    }
}
