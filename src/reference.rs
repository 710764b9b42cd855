use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str;
use std::sync::Arc;
use std::sync::{Mutex, RwLock};

use anyhow::{Context, Result};
use bio::alphabets::dna;
use bio::io::fasta;
use lru_time_cache::LruCache;

use crate::errors::Error;
use crate::utils::genomics::GenomicInterval;

/// Random access to reference sequences.
///
/// Implementations return uppercase bases of the forward strand for 0-based,
/// half-open coordinates.
pub trait ReferenceProvider {
    /// Names of all chromosomes known to this provider.
    fn chromosomes(&self) -> Vec<String>;

    fn chrom_len(&self, chrom: &str) -> Result<u64>;

    /// Fetch `[start, end)` of the given chromosome. Coordinates are signed so
    /// that intervals reaching past the chromosome start are reported as errors
    /// instead of wrapping.
    fn fetch(&self, chrom: &str, start: i64, end: i64) -> Result<Vec<u8>>;

    /// Fetch the given interval, reverse complemented for the reverse strand.
    fn extract(&self, interval: &GenomicInterval) -> Result<Vec<u8>> {
        let seq = self.fetch(
            interval.chrom(),
            interval.start() as i64,
            interval.end() as i64,
        )?;
        if interval.strand().is_reverse() {
            Ok(dna::revcomp(&seq))
        } else {
            Ok(seq)
        }
    }
}

impl<R: ReferenceProvider + ?Sized> ReferenceProvider for Arc<R> {
    fn chromosomes(&self) -> Vec<String> {
        (**self).chromosomes()
    }

    fn chrom_len(&self, chrom: &str) -> Result<u64> {
        (**self).chrom_len(chrom)
    }

    fn fetch(&self, chrom: &str, start: i64, end: i64) -> Result<Vec<u8>> {
        (**self).fetch(chrom, start, end)
    }
}

fn checked_range(chrom: &str, start: i64, end: i64, len: u64) -> Result<(usize, usize)> {
    if start < 0 || end < start || end as u64 > len {
        return Err(Error::IntervalOutOfBounds {
            chrom: chrom.to_owned(),
            start,
            end,
            len,
        }
        .into());
    }
    Ok((start as usize, end as usize))
}

/// A lazy buffer for reference sequences backed by an indexed FASTA file.
///
/// Whole chromosomes are loaded on first access and kept in an LRU cache.
pub struct Buffer {
    reader: RwLock<fasta::IndexedReader<fs::File>>,
    sequences: Mutex<LruCache<String, Arc<Vec<u8>>>>,
    lengths: HashMap<String, u64>,
}

impl Buffer {
    pub fn from_path<P: AsRef<Path> + std::fmt::Debug>(path: P, capacity: usize) -> Result<Self> {
        let fasta: fasta::IndexedReader<fs::File> = fasta::IndexedReader::from_file(&path)
            .with_context(|| format!("unable to open indexed FASTA file {:?}", path))?;
        let lengths = fasta
            .index
            .sequences()
            .into_iter()
            .map(|sequence| (sequence.name, sequence.len))
            .collect();
        Ok(Buffer {
            reader: RwLock::new(fasta),
            sequences: Mutex::new(LruCache::with_capacity(capacity)),
            lengths,
        })
    }

    /// Load given chromosome and return it. This is O(1) if chromosome was loaded before.
    pub fn seq(&self, chrom: &str) -> Result<Arc<Vec<u8>>> {
        if !self.lengths.contains_key(chrom) {
            return Err(Error::ReferenceNotFound {
                chrom: chrom.to_owned(),
            }
            .into());
        }

        let mut sequences = self.sequences.lock().unwrap();

        if let Some(sequence) = sequences.get(chrom) {
            return Ok(Arc::clone(sequence));
        }

        let mut sequence = Vec::new();
        {
            let mut reader = self.reader.write().unwrap();
            reader.fetch_all(chrom)?;
            reader.read(&mut sequence)?;
        }
        sequence.make_ascii_uppercase();
        debug!("loaded chromosome {} ({} bases)", chrom, sequence.len());

        let sequence = Arc::new(sequence);
        sequences.insert(chrom.to_owned(), Arc::clone(&sequence));
        Ok(sequence)
    }
}

impl ReferenceProvider for Buffer {
    fn chromosomes(&self) -> Vec<String> {
        self.reader
            .read()
            .unwrap()
            .index
            .sequences()
            .into_iter()
            .map(|sequence| sequence.name)
            .collect()
    }

    fn chrom_len(&self, chrom: &str) -> Result<u64> {
        self.lengths.get(chrom).copied().ok_or_else(|| {
            Error::ReferenceNotFound {
                chrom: chrom.to_owned(),
            }
            .into()
        })
    }

    fn fetch(&self, chrom: &str, start: i64, end: i64) -> Result<Vec<u8>> {
        let sequence = self.seq(chrom)?;
        let (start, end) = checked_range(chrom, start, end, sequence.len() as u64)?;
        Ok(sequence[start..end].to_vec())
    }
}

/// Reference sequences held completely in memory.
#[derive(Default, Debug, Clone)]
pub struct InMemory {
    names: Vec<String>,
    sequences: HashMap<String, Vec<u8>>,
}

impl InMemory {
    pub fn new() -> Self {
        InMemory::default()
    }

    /// Read all records of a (not necessarily indexed) FASTA file.
    pub fn from_fasta<P: AsRef<Path> + std::fmt::Debug>(path: P) -> Result<Self> {
        let reader = fasta::Reader::from_file(&path)
            .with_context(|| format!("unable to open FASTA file {:?}", path))?;
        let mut reference = InMemory::new();
        for record in reader.records() {
            let record = record?;
            reference.insert(record.id(), record.seq());
        }
        Ok(reference)
    }

    pub fn insert(&mut self, chrom: impl Into<String>, sequence: &[u8]) {
        let chrom = chrom.into();
        if !self.sequences.contains_key(&chrom) {
            self.names.push(chrom.clone());
        }
        self.sequences
            .insert(chrom, sequence.to_ascii_uppercase());
    }

    pub fn with_sequence(mut self, chrom: impl Into<String>, sequence: &[u8]) -> Self {
        self.insert(chrom, sequence);
        self
    }

    fn sequence(&self, chrom: &str) -> Result<&[u8]> {
        self.sequences
            .get(chrom)
            .map(|sequence| sequence.as_slice())
            .ok_or_else(|| {
                Error::ReferenceNotFound {
                    chrom: chrom.to_owned(),
                }
                .into()
            })
    }
}

impl ReferenceProvider for InMemory {
    fn chromosomes(&self) -> Vec<String> {
        self.names.clone()
    }

    fn chrom_len(&self, chrom: &str) -> Result<u64> {
        Ok(self.sequence(chrom)?.len() as u64)
    }

    fn fetch(&self, chrom: &str, start: i64, end: i64) -> Result<Vec<u8>> {
        let sequence = self.sequence(chrom)?;
        let (start, end) = checked_range(chrom, start, end, sequence.len() as u64)?;
        Ok(sequence[start..end].to_vec())
    }
}
