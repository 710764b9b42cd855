// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Pairing of exons with variants.
//!
//! A [`UnitSource`] yields exon/variant units, the [`PairingDriver`] turns each
//! unit into a [`Record`] holding the reference and the variant window.

use std::collections::{BTreeMap, HashSet};
use std::slice;
use std::sync::Arc;

use anyhow::Result;
use ndarray::{s, Array2, Axis};

use crate::encoding::{Encoder, OneHotEncoder};
use crate::errors::Error;
use crate::reference::ReferenceProvider;
use crate::utils::genomics::{normalize_chrom, GenomicInterval, Overhang, Strand};
use crate::variants::{Variant, VariantInfo};
use crate::windows::extractor::ExonWindowExtractor;
use crate::windows::splitter::SeqSplitter;
use crate::windows::{SplitWindowSet, WindowModule};

pub mod index;
pub mod table;
pub mod vcf;

pub use self::index::{ExonEntry, ExonIndex, IntervalExonIndex};
pub use self::table::TableSource;
pub use self::vcf::VcfSource;

/// Optional identifiers of an exon, passed through to the output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExonAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exon_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gene_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gene_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_id: Option<String>,
}

/// One exon together with one variant.
///
/// If `overhang` is set (genomic orientation), it replaces the overhang
/// configured at the driver.
#[derive(new, Clone, Debug, PartialEq, Getters, CopyGetters)]
pub struct PairingUnit {
    #[getset(get = "pub")]
    exon: GenomicInterval,
    #[getset(get = "pub")]
    variant: Variant,
    #[getset(get_copy = "pub")]
    overhang: Option<Overhang>,
    #[getset(get = "pub")]
    annotations: ExonAnnotations,
}

/// Source of exon/variant units.
pub trait UnitSource {
    /// Chromosomes the source may refer to.
    fn chromosomes(&self) -> HashSet<String>;

    fn next_unit(&mut self) -> Option<Result<PairingUnit>>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab_case")]
pub enum OutputMode {
    Raw,
    Split,
    Encoded,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Split
    }
}

pub type EncodedWindowSet = BTreeMap<WindowModule, Array2<f32>>;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WindowInput {
    Raw(String),
    Split(SplitWindowSet),
    Encoded(EncodedWindowSet),
}

impl WindowInput {
    pub fn as_split(&self) -> Option<&SplitWindowSet> {
        match self {
            WindowInput::Split(windows) => Some(windows),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Inputs {
    pub seq: WindowInput,
    pub mut_seq: WindowInput,
}

/// Exon metadata. Overhangs are given in transcript orientation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExonInfo {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub left_overhang: u64,
    pub right_overhang: u64,
    pub annotation: String,
    #[serde(flatten)]
    pub annotations: ExonAnnotations,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metadata {
    pub variant: VariantInfo,
    pub exon: ExonInfo,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub inputs: Inputs,
    pub metadata: Metadata,
}

fn check_chromosomes(source: &HashSet<String>, reference: &[String]) -> Result<()> {
    if reference.iter().any(|chrom| source.contains(chrom)) {
        return Ok(());
    }
    let normalized: HashSet<String> = source.iter().map(|chrom| normalize_chrom(chrom)).collect();
    let hint = if reference
        .iter()
        .any(|chrom| normalized.contains(&normalize_chrom(chrom)))
    {
        " (the names only differ by a 'chr' prefix)".to_owned()
    } else {
        String::new()
    };
    Err(Error::ChromosomeMismatch { hint }.into())
}

/// Turns exon/variant units into records.
pub struct PairingDriver<S, R: ?Sized, E = OneHotEncoder> {
    source: S,
    reference: Arc<R>,
    overhang: Overhang,
    output: OutputMode,
    splitter: SeqSplitter,
    encoder: E,
}

impl<S, R> PairingDriver<S, R, OneHotEncoder>
where
    S: UnitSource,
    R: ReferenceProvider + ?Sized,
{
    /// Create a driver with default overhang, split output and one-hot
    /// encoding. Fails if source and reference share no chromosome.
    pub fn new(source: S, reference: Arc<R>) -> Result<Self> {
        check_chromosomes(&source.chromosomes(), &reference.chromosomes())?;
        Ok(PairingDriver {
            source,
            reference,
            overhang: Overhang::default(),
            output: OutputMode::default(),
            splitter: SeqSplitter::default(),
            encoder: OneHotEncoder,
        })
    }
}

impl<S, R, E> PairingDriver<S, R, E>
where
    S: UnitSource,
    R: ReferenceProvider + ?Sized,
    E: Encoder,
{
    pub fn overhang(mut self, overhang: Overhang) -> Self {
        self.overhang = overhang;
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn splitter(mut self, splitter: SeqSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn encoder<F: Encoder>(self, encoder: F) -> PairingDriver<S, R, F> {
        PairingDriver {
            source: self.source,
            reference: self.reference,
            overhang: self.overhang,
            output: self.output,
            splitter: self.splitter,
            encoder,
        }
    }

    /// Iterate over batches of up to `size` records. With encoded output, each
    /// window module is encoded once per batch.
    pub fn batches(self, size: usize) -> Result<Batches<S, R, E>> {
        if size == 0 {
            return Err(Error::InvalidBatchSize.into());
        }
        Ok(Batches {
            driver: self,
            size,
            error: None,
        })
    }

    /// Build the record of the given unit. Encoding is left to the caller, with
    /// encoded output the inputs are split windows.
    fn pair(&self, unit: &PairingUnit) -> Result<Record> {
        let exon = unit.exon();
        let overhang = unit.overhang().unwrap_or(self.overhang);
        debug!("pairing variant {} with exon {}", unit.variant(), exon);

        let windows = ExonWindowExtractor::new(&*self.reference).extract(
            exon,
            slice::from_ref(unit.variant()),
            overhang,
        )?;
        let oriented = overhang.oriented(exon.strand());

        let inputs = match self.output {
            OutputMode::Raw => Inputs {
                seq: WindowInput::Raw(windows.reference().to_owned()),
                mut_seq: WindowInput::Raw(windows.variant().to_owned()),
            },
            OutputMode::Split | OutputMode::Encoded => Inputs {
                seq: WindowInput::Split(self.splitter.split(
                    windows.reference(),
                    oriented,
                    &exon.annotation(),
                )),
                mut_seq: WindowInput::Split(
                    self.splitter.split_unchecked(windows.variant(), oriented),
                ),
            },
        };

        Ok(Record {
            inputs,
            metadata: Metadata {
                variant: VariantInfo::from(unit.variant()),
                exon: ExonInfo {
                    chrom: exon.chrom().to_owned(),
                    start: exon.start(),
                    end: exon.end(),
                    strand: exon.strand(),
                    left_overhang: oriented.left(),
                    right_overhang: oriented.right(),
                    annotation: exon.annotation(),
                    annotations: unit.annotations().clone(),
                },
            },
        })
    }

    fn encode_windows(&self, windows: &SplitWindowSet) -> EncodedWindowSet {
        WindowModule::all()
            .map(|module| (module, self.encoder.encode(windows.get(module))))
            .collect()
    }

    fn encode_record(&self, mut record: Record) -> Record {
        if self.output == OutputMode::Encoded {
            for input in [&mut record.inputs.seq, &mut record.inputs.mut_seq].iter_mut() {
                let encoded = input.as_split().map(|windows| self.encode_windows(windows));
                if let Some(encoded) = encoded {
                    **input = WindowInput::Encoded(encoded);
                }
            }
        }
        record
    }

    /// Encode one side of a batch, one `encode_batch` call per module.
    fn encode_batch_side(&self, windows: &[&SplitWindowSet]) -> Vec<EncodedWindowSet> {
        let mut encoded = vec![EncodedWindowSet::new(); windows.len()];
        for module in WindowModule::all() {
            let seqs: Vec<&str> = windows.iter().map(|w| w.get(module)).collect();
            let tensor = self.encoder.encode_batch(&seqs);
            for ((target, seq), matrix) in encoded
                .iter_mut()
                .zip(seqs.iter())
                .zip(tensor.axis_iter(Axis(0)))
            {
                target.insert(module, matrix.slice(s![..seq.len(), ..]).to_owned());
            }
        }
        encoded
    }

    fn encode_batch(&self, records: &mut [Record]) {
        let (seq, mut_seq) = {
            let seq_windows: Vec<&SplitWindowSet> = records
                .iter()
                .filter_map(|record| record.inputs.seq.as_split())
                .collect();
            let mut_seq_windows: Vec<&SplitWindowSet> = records
                .iter()
                .filter_map(|record| record.inputs.mut_seq.as_split())
                .collect();
            (
                self.encode_batch_side(&seq_windows),
                self.encode_batch_side(&mut_seq_windows),
            )
        };
        for (record, (seq, mut_seq)) in records.iter_mut().zip(seq.into_iter().zip(mut_seq)) {
            record.inputs.seq = WindowInput::Encoded(seq);
            record.inputs.mut_seq = WindowInput::Encoded(mut_seq);
        }
    }
}

impl<S, R, E> Iterator for PairingDriver<S, R, E>
where
    S: UnitSource,
    R: ReferenceProvider + ?Sized,
    E: Encoder,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let unit = match self.source.next_unit()? {
            Ok(unit) => unit,
            Err(e) => return Some(Err(e)),
        };
        Some(self.pair(&unit).map(|record| self.encode_record(record)))
    }
}

/// Batched iteration over the records of a [`PairingDriver`].
///
/// A record error ends the current batch. The records paired before it are
/// returned first, the error on the following call.
pub struct Batches<S, R: ?Sized, E> {
    driver: PairingDriver<S, R, E>,
    size: usize,
    error: Option<anyhow::Error>,
}

impl<S, R, E> Iterator for Batches<S, R, E>
where
    S: UnitSource,
    R: ReferenceProvider + ?Sized,
    E: Encoder,
{
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.error.take() {
            return Some(Err(e));
        }
        let mut records = Vec::with_capacity(self.size);
        while records.len() < self.size {
            let unit = match self.driver.source.next_unit() {
                Some(unit) => unit,
                None => break,
            };
            match unit.and_then(|unit| self.driver.pair(&unit)) {
                Ok(record) => records.push(record),
                Err(e) if records.is_empty() => return Some(Err(e)),
                Err(e) => {
                    self.error = Some(e);
                    break;
                }
            }
        }
        if records.is_empty() {
            return None;
        }
        if self.driver.output == OutputMode::Encoded {
            self.driver.encode_batch(&mut records);
        }
        Some(Ok(records))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::reference::InMemory;
    use crate::windows::extractor::tests::reference;

    /// Unit source over a fixed list of units.
    pub(crate) struct UnitList {
        units: VecDeque<PairingUnit>,
    }

    impl UnitList {
        pub(crate) fn new(units: Vec<PairingUnit>) -> Self {
            UnitList {
                units: units.into(),
            }
        }
    }

    impl UnitSource for UnitList {
        fn chromosomes(&self) -> HashSet<String> {
            self.units
                .iter()
                .map(|unit| unit.exon().chrom().to_owned())
                .collect()
        }

        fn next_unit(&mut self) -> Option<Result<PairingUnit>> {
            self.units.pop_front().map(Ok)
        }
    }

    fn unit(strand: Strand, pos: u64, ref_allele: &str, alt_allele: &str) -> PairingUnit {
        PairingUnit::new(
            GenomicInterval::new("1", 20, 30, strand).unwrap(),
            Variant::single("1", pos, ref_allele, alt_allele).unwrap(),
            None,
            ExonAnnotations::default(),
        )
    }

    fn units() -> Vec<PairingUnit> {
        vec![
            unit(Strand::Forward, 25, "G", "T"),
            unit(Strand::Reverse, 23, "TAG", "T"),
            unit(Strand::Forward, 29, "G", "GAAA"),
        ]
    }

    fn driver(units: Vec<PairingUnit>, output: OutputMode) -> PairingDriver<UnitList, InMemory> {
        PairingDriver::new(UnitList::new(units), Arc::new(reference()))
            .unwrap()
            .overhang(Overhang::new(10, 10))
            .output(output)
    }

    #[test]
    fn test_raw_output() {
        let records: Vec<Record> = driver(units(), OutputMode::Raw)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        let record = &records[0];
        assert_eq!(
            record.inputs.seq,
            WindowInput::Raw("TCAGGTAACGCCTAGAATGCCAGTCGATTC".to_owned())
        );
        assert_eq!(
            record.inputs.mut_seq,
            WindowInput::Raw("TCAGGTAACGCCTATAATGCCAGTCGATTC".to_owned())
        );
        assert_eq!(record.metadata.variant.identity, "1:25:G:['T']");
        assert_eq!(record.metadata.exon.annotation, "1:20-30:+");
    }

    #[test]
    fn test_oriented_overhang() {
        let mut units = units();
        units[1].overhang = Some(Overhang::new(12, 8));
        let records: Vec<Record> = driver(units, OutputMode::Split)
            .collect::<Result<_>>()
            .unwrap();
        let exon = &records[1].metadata.exon;
        assert_eq!(exon.strand, Strand::Reverse);
        assert_eq!((exon.left_overhang, exon.right_overhang), (8, 12));
        assert_eq!(records[0].metadata.exon.left_overhang, 10);
    }

    #[test]
    fn test_split_output() {
        let records: Vec<Record> = driver(units(), OutputMode::Split)
            .collect::<Result<_>>()
            .unwrap();
        let seq = records[2].inputs.seq.as_split().unwrap();
        let mut_seq = records[2].inputs.mut_seq.as_split().unwrap();
        // insertion of three bases inside the exon
        assert_eq!(mut_seq.exon.len(), seq.exon.len() + 3);
        assert_eq!(mut_seq.acceptor, seq.acceptor);
        assert_eq!(mut_seq.acceptor_intron, seq.acceptor_intron);
        assert_eq!(mut_seq.donor_intron, seq.donor_intron);
    }

    #[test]
    fn test_batched_encoding_equals_single() {
        let single: Vec<Record> = driver(units(), OutputMode::Encoded)
            .collect::<Result<_>>()
            .unwrap();
        let batches: Vec<Vec<Record>> = driver(units(), OutputMode::Encoded)
            .batches(2)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(batches.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![2, 1]);
        let batched: Vec<Record> = batches.into_iter().flatten().collect();
        assert_eq!(batched, single);

        match &single[1].inputs.mut_seq {
            WindowInput::Encoded(encoded) => {
                assert_eq!(encoded.len(), 5);
                assert_eq!(encoded[&WindowModule::Acceptor].shape()[1], 4);
            }
            _ => panic!("expected encoded windows"),
        }
    }

    #[test]
    fn test_invalid_batch_size() {
        let err = driver(units(), OutputMode::Split).batches(0).err().unwrap();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::InvalidBatchSize));
    }

    #[test]
    fn test_chromosome_mismatch() {
        let units = vec![PairingUnit::new(
            GenomicInterval::new("chr1", 20, 30, Strand::Forward).unwrap(),
            Variant::single("chr1", 25, "G", "T").unwrap(),
            None,
            ExonAnnotations::default(),
        )];
        let err = PairingDriver::new(UnitList::new(units), Arc::new(reference()))
            .err()
            .unwrap();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::ChromosomeMismatch {
                hint: " (the names only differ by a 'chr' prefix)".to_owned()
            })
        );
    }

    #[test]
    fn test_record_errors_propagate() {
        let mut units = units();
        units.insert(
            1,
            PairingUnit::new(
                GenomicInterval::new("1", 55, 58, Strand::Forward).unwrap(),
                Variant::single("1", 56, "C", "G").unwrap(),
                None,
                ExonAnnotations::default(),
            ),
        );
        let results: Vec<Result<Record>> = driver(units, OutputMode::Split).collect();
        assert_eq!(results.len(), 4);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    fn failing_units() -> Vec<PairingUnit> {
        let mut units = units();
        units.truncate(2);
        // runs past the end of the 60bp reference
        units.push(PairingUnit::new(
            GenomicInterval::new("1", 55, 58, Strand::Forward).unwrap(),
            Variant::single("1", 56, "C", "G").unwrap(),
            None,
            ExonAnnotations::default(),
        ));
        units.push(unit(Strand::Forward, 25, "G", "T"));
        units
    }

    #[test]
    fn test_batch_error_keeps_preceding_records() {
        let single: Vec<Result<Record>> = driver(failing_units(), OutputMode::Encoded).collect();
        let single_ok = single.iter().take_while(|result| result.is_ok()).count();
        assert_eq!(single_ok, 2);

        let batches: Vec<Result<Vec<Record>>> = driver(failing_units(), OutputMode::Encoded)
            .batches(8)
            .unwrap()
            .collect();
        assert_eq!(batches.len(), 3);
        let first = batches[0].as_ref().unwrap();
        assert_eq!(first.len(), single_ok);
        for (batched, single) in first.iter().zip(&single) {
            assert_eq!(batched, single.as_ref().unwrap());
        }
        let err = batches[1].as_ref().err().unwrap();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::IntervalOutOfBounds { .. })
        ));
        assert_eq!(batches[2].as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_source_fails() {
        let err = PairingDriver::new(UnitList::new(Vec::new()), Arc::new(reference()))
            .err()
            .unwrap();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::ChromosomeMismatch {
                hint: String::new()
            })
        );
    }
}
