// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use bio_types::genome::AbstractLocus;
use progress_logger::ProgressLogger;
use rust_htslib::bcf::{self, Read};

use crate::pairing::{ExonIndex, PairingUnit, UnitSource};
use crate::utils;
use crate::utils::collect_variants::SkipReason;

/// Exon/variant units from a VCF/BCF file.
///
/// Each record is split into single-alt variants, and each variant is paired
/// with every exon whose overhang-extended interval overlaps it.
pub struct VcfSource<I: ExonIndex> {
    reader: bcf::Reader,
    index: I,
    pending: VecDeque<PairingUnit>,
    progress_logger: Option<ProgressLogger>,
    skips: utils::SimpleCounter<SkipReason>,
    log_each_record: bool,
    record_index: usize,
    exhausted: bool,
}

impl<I: ExonIndex> VcfSource<I> {
    pub fn new(reader: bcf::Reader, index: I) -> Self {
        VcfSource {
            reader,
            index,
            pending: VecDeque::new(),
            progress_logger: Some(
                ProgressLogger::builder()
                    .with_items_name("records")
                    .with_frequency(Duration::from_secs(20))
                    .start(),
            ),
            skips: utils::SimpleCounter::default(),
            log_each_record: false,
            record_index: 0,
            exhausted: false,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P, index: I) -> Result<Self> {
        let reader = bcf::Reader::from_path(path.as_ref())
            .with_context(|| format!("unable to read variants from {}", path.as_ref().display()))?;
        Ok(VcfSource::new(reader, index))
    }

    pub fn log_each_record(mut self, log_each_record: bool) -> Self {
        self.log_each_record = log_each_record;
        self
    }

    /// Read the next record and queue its units. Returns false at the end of
    /// the file.
    fn next_record(&mut self) -> Result<bool> {
        let mut record = self.reader.empty_record();
        match self.reader.read(&mut record) {
            None => return Ok(false),
            Some(res) => res?,
        }
        self.record_index += 1;
        if self.log_each_record {
            info!(
                "Processing record {} at {}:{}",
                self.record_index,
                record.contig(),
                record.pos() + 1,
            );
        }
        if let Some(progress_logger) = self.progress_logger.as_mut() {
            progress_logger.update(1u64);
        }

        let variants = utils::collect_variants(&record, Some(&mut self.skips))?;
        for variant in variants {
            let exons = self
                .index
                .overlapping(variant.chrom(), variant.start(), variant.end());
            if exons.is_empty() {
                debug!("variant {} overlaps no exon", variant);
            }
            for entry in exons {
                self.pending.push_back(PairingUnit::new(
                    entry.exon().clone(),
                    variant.clone(),
                    entry.overhang(),
                    entry.annotations().clone(),
                ));
            }
        }
        Ok(true)
    }

    fn display_skips(&self) {
        for (reason, &count) in self.skips.iter() {
            if count > 0 {
                info!("Skipped {} {}.", count, reason);
            }
        }
    }

    fn next_inner(&mut self) -> Result<Option<PairingUnit>> {
        loop {
            if let Some(unit) = self.pending.pop_front() {
                return Ok(Some(unit));
            }
            if self.exhausted {
                return Ok(None);
            }
            if !self.next_record()? {
                self.exhausted = true;
                if let Some(mut progress_logger) = self.progress_logger.take() {
                    progress_logger.stop();
                }
                self.display_skips();
            }
        }
    }
}

impl<I: ExonIndex> UnitSource for VcfSource<I> {
    fn chromosomes(&self) -> HashSet<String> {
        self.index.chromosomes()
    }

    fn next_unit(&mut self) -> Option<Result<PairingUnit>> {
        match self.next_inner() {
            Ok(Some(unit)) => Some(Ok(unit)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
