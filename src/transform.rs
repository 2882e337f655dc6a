//! In-place alignment transforms.
//!
//! - [`Alignment::collapse`]: merge identical sequences into haplotypes
//! - [`Alignment::code_gaps`]: append a binary indel matrix
//! - [`Alignment::filter_terminals`]: turn leading/trailing gaps into missing data

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::model::{Alignment, Sequence};
use crate::writer::with_suffix;

/// Suffix of the haplotype correspondence file.
pub const HAPLOTYPES_SUFFIX: &str = ".haplotypes";

/// Haplotype name to original taxa, in haplotype order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Haplotypes {
    pub groups: Vec<(String, Vec<String>)>,
}

impl Haplotypes {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Original taxa merged into `haplotype`.
    pub fn get(&self, haplotype: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(name, _)| name == haplotype)
            .map(|(_, taxa)| taxa.as_slice())
    }

    /// Writes one `Hap_k: taxon1; taxon2` line per haplotype.
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        for (haplotype, taxa) in &self.groups {
            writeln!(out, "{}: {}", haplotype, taxa.join("; "))?;
        }
        Ok(())
    }

    /// Writes the correspondence next to the output `base`. Returns its path.
    pub fn write_sidecar(&self, base: &Path) -> io::Result<PathBuf> {
        let path = with_suffix(base, HAPLOTYPES_SUFFIX);
        let mut out = BufWriter::new(File::create(&path)?);
        self.write(&mut out)?;
        out.flush()?;
        Ok(path)
    }
}

/// Maximal runs of `gap` in `data` as 0-based inclusive spans.
fn gap_runs(data: &[u8], gap: u8) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (idx, &byte) in data.iter().enumerate() {
        match (byte == gap, start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                runs.push((s, idx - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, data.len() - 1));
    }
    runs
}

/// State of one taxon for one indel span: `1` present, `0` absent, `-` ambiguous.
fn indel_state(data: &[u8], (start, end): (usize, usize), gap: u8) -> char {
    if end >= data.len() {
        return '-';
    }
    if !data[start..=end].iter().all(|&b| b == gap) {
        return '0';
    }
    let open_left = start == 0 || data[start - 1] != gap;
    let open_right = end + 1 == data.len() || data[end + 1] != gap;
    if open_left && open_right {
        '1'
    } else {
        '-'
    }
}

impl Alignment {
    /// Replaces taxa sharing a sequence by one `Hap_<k>` taxon each.
    ///
    /// Haplotypes are numbered from 1 in the order their sequence is first
    /// seen. Returns the correspondence to the original names.
    pub fn collapse(&mut self) -> Haplotypes {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        let mut collapsed = Vec::new();

        for seq in self.sequences.drain(..) {
            match index.get(&seq.data) {
                Some(&idx) => groups[idx].1.push(seq.id),
                None => {
                    let haplotype = format!("Hap_{}", groups.len() + 1);
                    index.insert(seq.data.clone(), groups.len());
                    groups.push((haplotype.clone(), vec![seq.id]));
                    collapsed.push(Sequence::new(haplotype, seq.data));
                }
            }
        }

        self.sequences = collapsed;
        log::info!(
            "Collapsed {} into {} haplotypes",
            self.name,
            self.sequences.len()
        );
        Haplotypes { groups }
    }

    /// Appends one binary character per distinct gap span.
    ///
    /// Spans are the maximal gap runs of every taxon, pooled and sorted. A
    /// taxon scores `1` when the whole span is gap and flanked by residues or
    /// the sequence ends, `-` when the gap extends past the span (or the
    /// sequence is too short), `0` otherwise. Returns the 1-based range of
    /// the appended block, or `None` when there is nothing to code.
    pub fn code_gaps(&mut self, gap: char) -> Option<(usize, usize)> {
        if !gap.is_ascii() {
            log::warn!("Gap symbol '{gap}' is not ASCII; gap coding skipped");
            return None;
        }
        let gap = gap as u8;

        let spans: BTreeSet<(usize, usize)> = self
            .sequences
            .iter()
            .flat_map(|seq| gap_runs(seq.data.as_bytes(), gap))
            .collect();
        if spans.is_empty() {
            log::info!("No gap found in {}; nothing to code", self.name);
            return None;
        }

        for seq in &mut self.sequences {
            let states: String = spans
                .iter()
                .map(|&span| indel_state(seq.data.as_bytes(), span, gap))
                .collect();
            seq.data.push_str(&states);
        }

        let range = (self.locus_length + 1, self.locus_length + spans.len());
        self.locus_length += spans.len();
        self.restriction_range = Some(range);
        log::info!("Coded {} indels in {}", spans.len(), self.name);
        Some(range)
    }

    /// Replaces the leading and trailing gap runs of every sequence with the
    /// missing-data symbol. Returns how many sequences changed.
    pub fn filter_terminals(&mut self, gap: char) -> usize {
        let missing = self.code.missing;
        let mut changed = 0;

        for seq in &mut self.sequences {
            let chars: Vec<char> = seq.data.chars().collect();
            let lead = chars.iter().take_while(|&&c| c == gap).count();
            let trail = chars[lead..].iter().rev().take_while(|&&c| c == gap).count();
            if lead + trail == 0 {
                continue;
            }

            let inner_end = chars.len() - trail;
            seq.data = chars
                .iter()
                .enumerate()
                .map(|(idx, &c)| if idx < lead || idx >= inner_end { missing } else { c })
                .collect();
            changed += 1;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SequenceCode;

    fn alignment(rows: &[(&str, &str)]) -> Alignment {
        Alignment::new(
            "locus",
            rows.iter().map(|(id, data)| Sequence::new(*id, *data)).collect(),
            SequenceCode::default(),
        )
    }

    #[test]
    fn test_collapse_groups_identical_sequences() {
        let mut aln = alignment(&[("A", "ACGT"), ("B", "ACGT"), ("C", "TTTT")]);
        let haplotypes = aln.collapse();

        assert_eq!(aln.taxa_order(), vec!["Hap_1", "Hap_2"]);
        assert_eq!(aln.get_by_name("Hap_1").unwrap().data, "ACGT");
        assert_eq!(aln.get_by_name("Hap_2").unwrap().data, "TTTT");
        assert_eq!(
            haplotypes.get("Hap_1"),
            Some(&["A".to_string(), "B".to_string()][..])
        );
        assert_eq!(haplotypes.get("Hap_2"), Some(&["C".to_string()][..]));
    }

    #[test]
    fn test_collapse_unique_sequences() {
        let mut aln = alignment(&[("A", "ACGT"), ("B", "ACGG"), ("C", "TTTT")]);
        let haplotypes = aln.collapse();
        assert_eq!(haplotypes.len(), 3);
        assert!(haplotypes.groups.iter().all(|(_, taxa)| taxa.len() == 1));
        assert_eq!(aln.sequence_count(), 3);
    }

    #[test]
    fn test_haplotype_sidecar() {
        let mut aln = alignment(&[("A", "ACGT"), ("C", "TTTT"), ("B", "ACGT")]);
        let haplotypes = aln.collapse();

        let mut out = Vec::new();
        haplotypes.write(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Hap_1: A; B\nHap_2: C\n");

        let dir = tempfile::tempdir().unwrap();
        let path = haplotypes.write_sidecar(&dir.path().join("run")).unwrap();
        assert_eq!(path, dir.path().join("run.haplotypes"));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "Hap_1: A; B\nHap_2: C\n"
        );
    }

    #[test]
    fn test_gap_runs() {
        assert_eq!(gap_runs(b"--AC-G--", b'-'), vec![(0, 1), (4, 4), (6, 7)]);
        assert!(gap_runs(b"ACGT", b'-').is_empty());
    }

    #[test]
    fn test_code_gaps() {
        let mut aln = alignment(&[
            ("A", "AC--GT"),
            ("B", "ACTTGT"),
            ("C", "A---GT"),
            ("D", "AC--G-"),
        ]);
        let range = aln.code_gaps('-');

        // Spans: (1,3), (2,3), (5,5)
        assert_eq!(range, Some((7, 9)));
        assert_eq!(aln.locus_length, 9);
        assert!(aln.is_gap_coded());
        assert_eq!(aln.get_by_name("A").unwrap().data, "AC--GT010");
        assert_eq!(aln.get_by_name("B").unwrap().data, "ACTTGT000");
        assert_eq!(aln.get_by_name("C").unwrap().data, "A---GT1-0");
        assert_eq!(aln.get_by_name("D").unwrap().data, "AC--G-011");
    }

    #[test]
    fn test_code_gaps_without_gaps() {
        let mut aln = alignment(&[("A", "ACGT"), ("B", "ACGG")]);
        assert_eq!(aln.code_gaps('-'), None);
        assert!(!aln.is_gap_coded());
        assert_eq!(aln.locus_length, 4);
    }

    #[test]
    fn test_short_sequence_is_ambiguous() {
        let mut aln = alignment(&[("A", "ACG--T"), ("B", "AC")]);
        aln.code_gaps('-');
        assert_eq!(aln.get_by_name("B").unwrap().data, "AC-");
    }

    #[test]
    fn test_filter_terminals() {
        let mut aln = alignment(&[("A", "--AC-GT-"), ("B", "ACGTACGT"), ("C", "----")]);
        let changed = aln.filter_terminals('-');
        assert_eq!(changed, 2);
        assert_eq!(aln.get_by_name("A").unwrap().data, "nnAC-GTn");
        assert_eq!(aln.get_by_name("B").unwrap().data, "ACGTACGT");
        assert_eq!(aln.get_by_name("C").unwrap().data, "nnnn");
    }
}
