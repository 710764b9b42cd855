// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result};
use bio::data_structures::interval_tree::ArrayBackedIntervalTree;

use crate::pairing::table::{read_table, EXON_COLUMNS};
use crate::pairing::ExonAnnotations;
use crate::utils::genomics::{GenomicInterval, Overhang};

/// An exon with its optional own overhang (genomic orientation).
#[derive(new, Clone, Debug, PartialEq, Getters, CopyGetters)]
pub struct ExonEntry {
    #[getset(get = "pub")]
    exon: GenomicInterval,
    #[getset(get_copy = "pub")]
    overhang: Option<Overhang>,
    #[getset(get = "pub")]
    annotations: ExonAnnotations,
}

impl ExonEntry {
    /// The exon extended by its overhang, clipped at position 0.
    fn extended(&self, default: Overhang) -> Range<u64> {
        let overhang = self.overhang.unwrap_or(default);
        self.exon.start().saturating_sub(overhang.left())..self.exon.end() + overhang.right()
    }
}

/// Lookup of exons by genomic position.
pub trait ExonIndex {
    fn chromosomes(&self) -> HashSet<String>;

    /// All exons whose overhang-extended interval overlaps `[start, end)`,
    /// ordered by exon start, then end.
    fn overlapping(&self, chrom: &str, start: u64, end: u64) -> Vec<&ExonEntry>;
}

/// Exon index with one interval tree per chromosome.
pub struct IntervalExonIndex {
    exons: Vec<ExonEntry>,
    trees: HashMap<String, ArrayBackedIntervalTree<u64, usize>>,
}

impl IntervalExonIndex {
    /// Index the given exons. Exons without own overhang are extended by
    /// `default_overhang`.
    pub fn new(exons: Vec<ExonEntry>, default_overhang: Overhang) -> Self {
        let mut trees: HashMap<String, ArrayBackedIntervalTree<u64, usize>> = HashMap::new();
        for (i, entry) in exons.iter().enumerate() {
            trees
                .entry(entry.exon().chrom().to_owned())
                .or_insert_with(ArrayBackedIntervalTree::new)
                .insert(entry.extended(default_overhang), i);
        }
        for tree in trees.values_mut() {
            tree.index();
        }
        IntervalExonIndex { exons, trees }
    }

    /// Read exons from a delimited table with columns `CHROM`, `Exon_Start`,
    /// `Exon_End` and `strand`, and optionally `left_overhang`,
    /// `right_overhang` and exon annotations.
    pub fn from_reader<R: io::Read>(
        reader: R,
        delimiter: u8,
        default_overhang: Overhang,
    ) -> Result<Self> {
        let (header, rows) = read_table(reader, delimiter)?;
        header.require(&EXON_COLUMNS)?;

        let exons = rows
            .iter()
            .enumerate()
            .map(|(i, row)| -> Result<ExonEntry> {
                Ok(ExonEntry::new(
                    header.exon(row, i + 1)?,
                    header.overhang(row, i + 1, default_overhang)?,
                    header.annotations(row),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        info!("indexed {} exons", exons.len());

        Ok(IntervalExonIndex::new(exons, default_overhang))
    }

    pub fn from_path<P: AsRef<Path>>(
        path: P,
        delimiter: u8,
        default_overhang: Overhang,
    ) -> Result<Self> {
        let file = fs::File::open(path.as_ref())
            .with_context(|| format!("unable to open exon table {}", path.as_ref().display()))?;
        IntervalExonIndex::from_reader(file, delimiter, default_overhang)
    }

    pub fn len(&self) -> usize {
        self.exons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exons.is_empty()
    }
}

impl ExonIndex for IntervalExonIndex {
    fn chromosomes(&self) -> HashSet<String> {
        self.trees.keys().cloned().collect()
    }

    fn overlapping(&self, chrom: &str, start: u64, end: u64) -> Vec<&ExonEntry> {
        let tree = match self.trees.get(chrom) {
            Some(tree) => tree,
            None => return Vec::new(),
        };
        let mut hits: Vec<&ExonEntry> = tree
            .find(start..end)
            .into_iter()
            .map(|hit| &self.exons[*hit.data()])
            .collect();
        hits.sort_by_key(|entry| (entry.exon().start(), entry.exon().end()));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::genomics::Strand;

    const EXONS: &str = "\
CHROM\tExon_Start\tExon_End\tstrand\texon_id\tright_overhang
1\t201\t300\t+\tE2\t
1\t101\t150\t-\tE1\t
1\t1001\t1100\t+\tE3\t5
2\t101\t150\t+\tE4\t
";

    fn index() -> IntervalExonIndex {
        IntervalExonIndex::from_reader(EXONS.as_bytes(), b'\t', Overhang::new(50, 50)).unwrap()
    }

    fn ids(hits: Vec<&ExonEntry>) -> Vec<&str> {
        hits.into_iter()
            .map(|entry| entry.annotations().exon_id.as_deref().unwrap())
            .collect()
    }

    #[test]
    fn test_overlapping() {
        let index = index();
        assert_eq!(index.len(), 4);
        // inside the right overhang of E1 and the left overhang of E2
        assert_eq!(ids(index.overlapping("1", 175, 176)), vec!["E1", "E2"]);
        assert_eq!(ids(index.overlapping("1", 120, 121)), vec!["E1"]);
        assert!(index.overlapping("1", 400, 401).is_empty());
        assert!(index.overlapping("3", 120, 121).is_empty());
    }

    #[test]
    fn test_own_overhang() {
        let index = index();
        let hits = index.overlapping("1", 1100, 1200);
        assert_eq!(ids(hits.clone()), vec!["E3"]);
        assert_eq!(hits[0].overhang(), Some(Overhang::new(50, 5)));
        assert_eq!(
            hits[0].exon(),
            &GenomicInterval::new("1", 1000, 1100, Strand::Forward).unwrap()
        );
        // beyond the shortened right overhang
        assert!(index.overlapping("1", 1105, 1106).is_empty());
    }
}
