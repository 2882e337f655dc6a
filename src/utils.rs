//! Stateless helpers shared by the parsers and the alignment types.

use std::collections::HashMap;

/// Characters that break NEXUS and PHYLIP consumers when found in taxon names.
pub const ILLEGAL_NAME_CHARS: [char; 9] = [':', ',', ')', '(', ';', '[', ']', '\'', '"'];

/// Removes illegal characters from a taxon name.
pub fn strip_illegal(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL_NAME_CHARS.contains(c))
        .collect()
}

/// Returns the names occurring more than once, each listed once, in order of
/// first appearance.
pub fn duplicates<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for name in names {
        let count = counts.entry(name).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(name.to_string());
        }
    }
    order
}

/// The most common length; ties go to the length encountered first.
pub fn modal_length<I>(lengths: I) -> Option<usize>
where
    I: IntoIterator<Item = usize>,
{
    let mut tally: Vec<(usize, usize)> = Vec::new();
    for len in lengths {
        match tally.iter_mut().find(|(l, _)| *l == len) {
            Some((_, count)) => *count += 1,
            None => tally.push((len, 1)),
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (len, count) in tally {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((len, count));
        }
    }
    best.map(|(len, _)| len)
}

/// Names of the entries whose length differs from the modal length.
pub fn size_outliers<'a, I>(entries: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = (&'a str, usize)>,
{
    let entries: Vec<(&str, usize)> = entries.into_iter().collect();
    let Some(modal) = modal_length(entries.iter().map(|(_, len)| *len)) else {
        return Vec::new();
    };
    entries
        .into_iter()
        .filter(|(_, len)| *len != modal)
        .map(|(name, _)| name)
        .collect()
}
