//! End-to-end workflows through the public API: load, transform, write,
//! reload.

use std::fs;
use std::path::{Path, PathBuf};

use supermatrix::collection::AlignmentCollection;
use supermatrix::formats::{parse_file, FileFormat, ParseError, ParseOptions};
use supermatrix::model::Coding;
use supermatrix::partition::PartitionTable;
use supermatrix::writer::{OutputFormat, WriteError, WriteOptions};
use supermatrix::zorro;

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn load(paths: &[PathBuf]) -> AlignmentCollection {
    AlignmentCollection::from_files(paths, &ParseOptions::default(), |_| {}).unwrap()
}

#[test]
fn test_concatenate_write_and_reverse() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "locusA.fasta", ">X\nACGT\n>Y\nACGG\n");
    let b = write_file(dir.path(), "locusB.fasta", ">X\nTT\n>Z\nAA\n");

    let loci = load(&[a, b]);
    let concat = loci.concatenate().unwrap();
    assert_eq!(concat.get_by_name("X").unwrap().data, "ACGTTT");
    assert_eq!(concat.get_by_name("Y").unwrap().data, "ACGGnn");
    assert_eq!(concat.get_by_name("Z").unwrap().data, "nnnnAA");

    let base = dir.path().join("super");
    let options = WriteOptions {
        formats: vec![OutputFormat::Phylip, OutputFormat::Nexus],
        ..WriteOptions::default()
    };
    concat.write_to_file(&base, &options).unwrap();

    let part_file = dir.path().join("super_part.File");
    assert_eq!(
        fs::read_to_string(&part_file).unwrap(),
        "DNA, locusA = 1-4\nDNA, locusB = 5-6\n"
    );

    // Reload the PHYLIP supermatrix and split it with its partition file
    let reloaded = parse_file(dir.path().join("super.phy")).unwrap();
    assert_eq!(reloaded.input_format, Some(FileFormat::Phylip));
    assert_eq!(reloaded.locus_length, 6);

    let table = PartitionTable::from_file(&part_file).unwrap();
    let parts = reloaded.reverse_concatenate(&table).unwrap();
    for (original, part) in loci.iter().zip(parts.iter()) {
        assert_eq!(original.name, part.name);
        assert_eq!(original.taxa_order(), part.taxa_order());
        for seq in &original.sequences {
            assert_eq!(part.get_by_name(&seq.id).unwrap().data, seq.data);
        }
        assert_eq!(part.partition_model.as_deref(), Some("DNA"));
    }

    // The NEXUS output carries the same matrix and the charsets
    let nexus = fs::read_to_string(dir.path().join("super.nex")).unwrap();
    assert!(nexus.contains("charset locusA = 1-4;"));
    let from_nexus = parse_file(dir.path().join("super.nex")).unwrap();
    assert_eq!(from_nexus.taxa_order(), vec!["X", "Y", "Z"]);
    assert_eq!(from_nexus.get_by_name("Z").unwrap().data, "nnnnAA");
}

#[test]
fn test_mixed_input_formats_and_models() {
    let dir = tempfile::tempdir().unwrap();
    let nexus = write_file(
        dir.path(),
        "gene1.nex",
        "#NEXUS\nbegin data;\nformat datatype=dna interleave;\nmatrix\n\
         A ACG\nB ACC\n\nA TTA\nB TTG\n;\nend;\nbegin mrbayes;\nlset nst=6;\nend;\n",
    );
    let phylip = write_file(dir.path(), "gene2.phy", "2 4\nA GGGG\nC CCCC\n");

    let concat = load(&[nexus, phylip]).concatenate().unwrap();
    assert_eq!(concat.get_by_name("A").unwrap().data, "ACGTTAGGGG");
    assert_eq!(concat.get_by_name("B").unwrap().data, "ACCTTGnnnn");
    assert_eq!(concat.get_by_name("C").unwrap().data, "nnnnnnCCCC");
    assert_eq!(concat.model, vec!["lset nst=6;".to_string()]);

    let base = dir.path().join("models");
    concat.write_to_file(&base, &WriteOptions::default()).unwrap();
    let written = fs::read_to_string(dir.path().join("models.nex")).unwrap();
    assert!(written.contains("\tlset applyto=(1) nst=6;\n"));
    assert!(written.contains("partition part = 2: gene1, gene2;"));
}

#[test]
fn test_collapse_sidecar_and_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "haps.fas", ">A\nACGT\n>B\nACGT\n>C\nTTTT\n");

    let mut alignment = parse_file(&path).unwrap();
    let haplotypes = alignment.collapse();
    let base = dir.path().join("haps_out");
    haplotypes.write_sidecar(&base).unwrap();

    let options = WriteOptions {
        formats: vec![OutputFormat::Fasta],
        ..WriteOptions::default()
    };
    alignment.write_to_file(&base, &options).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("haps_out.haplotypes")).unwrap(),
        "Hap_1: A; B\nHap_2: C\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("haps_out.fas")).unwrap(),
        ">Hap_1\nACGT\n>Hap_2\nTTTT\n"
    );
}

#[test]
fn test_gap_coding_is_nexus_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "indels.fas", ">A\nAC--GT\n>B\nACTTGT\n");

    let mut alignment = parse_file(&path).unwrap();
    assert_eq!(alignment.code_gaps('-'), Some((7, 7)));

    let base = dir.path().join("coded");
    let fasta = WriteOptions {
        formats: vec![OutputFormat::Fasta],
        ..WriteOptions::default()
    };
    assert!(matches!(
        alignment.write_to_file(&base, &fasta),
        Err(WriteError::GapCodedOutput { .. })
    ));
    assert!(!dir.path().join("coded.fas").exists());

    alignment.write_to_file(&base, &WriteOptions::default()).unwrap();
    let nexus = fs::read_to_string(dir.path().join("coded.nex")).unwrap();
    assert!(nexus.contains("nchar=7"));
    assert!(nexus.contains("datatype=mixed(DNA:1-6,restriction:7-7)"));
}

#[test]
fn test_protein_padding_and_partition_model() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "p1.fas", ">A\nMKLVWQERTY\n>B\nMKLVWQERTF\n");
    let b = write_file(dir.path(), "p2.fas", ">A\nPLKMWE\n");

    let concat = load(&[a, b]).concatenate().unwrap();
    assert_eq!(concat.code.coding, Coding::Protein);
    assert_eq!(concat.get_by_name("B").unwrap().data, "MKLVWQERTFxxxxxx");

    let base = dir.path().join("prot");
    let options = WriteOptions {
        formats: vec![OutputFormat::Phylip],
        protein_model: "LG".to_string(),
        ..WriteOptions::default()
    };
    concat.write_to_file(&base, &options).unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("prot_part.File")).unwrap(),
        "LG, p1 = 1-10\nLG, p2 = 11-16\n"
    );
}

#[test]
fn test_duplicate_taxa_abort_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_file(dir.path(), "good.fas", ">A\nACGT\n");
    let dup = write_file(
        dir.path(),
        "dup.nex",
        "#NEXUS\nbegin data;\nmatrix\nA ACGT\nB ACGG\nA TTTT\n;\nend;\n",
    );

    match parse_file(&dup) {
        Err(ParseError::DuplicateTaxa { names, .. }) => assert_eq!(names, vec!["A".to_string()]),
        other => panic!("unexpected result: {other:?}"),
    }
    let result = AlignmentCollection::from_files(&[good, dup], &ParseOptions::default(), |_| {});
    assert!(result.is_err());
}

#[test]
fn test_zorro_weights_follow_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.fas", ">A\nACG\n");
    let b = write_file(dir.path(), "b.fas", ">A\nTT\n");
    write_file(dir.path(), "a_zorro.out", "0.5\n1.5\n2.49\n");
    write_file(dir.path(), "b_zorro.out", "3.7\n\n4.5\n");

    let weights = zorro::concatenate_weights(&[a, b], zorro::DEFAULT_SUFFIX).unwrap();
    assert_eq!(weights, vec![0, 2, 2, 4, 4]);

    let path = zorro::write_weights(&dir.path().join("all"), zorro::DEFAULT_SUFFIX, &weights)
        .unwrap();
    assert_eq!(fs::read_to_string(path).unwrap(), "0\n2\n2\n4\n4\n");
}
