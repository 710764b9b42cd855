// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Integration of variants into exon windows.
//!
//! Sequences are built outwards from an anchor position. Left of the anchor,
//! variants are applied from the anchor towards the window start, right of it
//! towards the window end. In [`LengthMode::Fixed`], the fetched reference is
//! widened by the length of all deletions and the result is cut back to the
//! requested length around the anchor, so that indels shift bases instead of
//! changing the length. In [`LengthMode::Elastic`], variants are clipped to the
//! interval and the result grows or shrinks with them.

use std::cmp::Reverse;

use anyhow::Result;
use bio::alphabets::dna;

use crate::reference::ReferenceProvider;
use crate::utils::genomics::{GenomicInterval, Overhang, Strand};
use crate::variants::Variant;
use crate::windows::RawWindowPair;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LengthMode {
    /// Output length equals the interval length, regardless of indels.
    Fixed,
    /// Output length changes by the indel length of all contained variants.
    Elastic,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Keep {
    Left,
    Right,
    Both,
}

/// Reference and alternative allele placed at the reference start.
#[derive(Clone, Debug, PartialEq, Eq)]
struct AllelePair {
    start: i64,
    reference: Vec<u8>,
    alt: Vec<u8>,
}

impl AllelePair {
    fn from_variant(variant: &Variant) -> Self {
        AllelePair {
            start: variant.start() as i64,
            reference: variant.ref_allele().as_bytes().to_vec(),
            alt: variant.alt_allele().as_bytes().to_vec(),
        }
    }

    fn end(&self) -> i64 {
        self.start + self.reference.len() as i64
    }

    fn len_delta(&self) -> i64 {
        self.alt.len() as i64 - self.reference.len() as i64
    }

    /// Cut both alleles at the same offset. Alt parts may end up empty.
    fn split_at(&self, pos: i64) -> (AllelePair, AllelePair) {
        let mid = (pos - self.start) as usize;
        let alt_mid = mid.min(self.alt.len());
        (
            AllelePair {
                start: self.start,
                reference: self.reference[..mid].to_vec(),
                alt: self.alt[..alt_mid].to_vec(),
            },
            AllelePair {
                start: pos,
                reference: self.reference[mid..].to_vec(),
                alt: self.alt[alt_mid..].to_vec(),
            },
        )
    }
}

/// Split all allele pairs whose reference strictly contains `pos`.
fn split_overlapping(pairs: Vec<AllelePair>, pos: i64, keep: Keep) -> Vec<AllelePair> {
    let mut splitted = Vec::with_capacity(pairs.len());
    for pair in pairs {
        if pair.start < pos && pos < pair.end() {
            let (left, right) = pair.split_at(pos);
            if keep != Keep::Right {
                splitted.push(left);
            }
            if keep != Keep::Left {
                splitted.push(right);
            }
        } else {
            splitted.push(pair);
        }
    }
    splitted
}

fn deleted_len(pairs: &[AllelePair]) -> i64 {
    pairs.iter().map(|pair| (-pair.len_delta()).max(0)).sum()
}

#[derive(Clone, Debug)]
enum Segment {
    Reference { start: i64, end: i64 },
    Allele(Vec<u8>),
}

/// Fill reference segments from `seq`, which starts at genomic position `offset`.
fn restore(segments: &[Segment], seq: &[u8], offset: i64) -> Vec<u8> {
    let mut restored = Vec::new();
    for segment in segments {
        match segment {
            Segment::Reference { start, end } => {
                let len = (end - start).max(0) as usize;
                let from = ((start - offset).max(0) as usize).min(seq.len());
                let to = (from + len).min(seq.len());
                restored.extend_from_slice(&seq[from..to]);
            }
            Segment::Allele(allele) => restored.extend_from_slice(allele),
        }
    }
    restored
}

/// Extracts sequences with variants integrated, relative to an anchor.
#[derive(new)]
pub struct VariantSeqExtractor<'a, R: ReferenceProvider + ?Sized> {
    reference: &'a R,
}

impl<'a, R: ReferenceProvider + ?Sized> VariantSeqExtractor<'a, R> {
    /// Extract `interval` with all `variants` on its chromosome integrated.
    ///
    /// The anchor is clamped into the interval.
    pub fn extract(
        &self,
        interval: &GenomicInterval,
        variants: &[Variant],
        anchor: u64,
        mode: LengthMode,
    ) -> Result<Vec<u8>> {
        self.extract_span(
            interval.chrom(),
            interval.start() as i64,
            interval.end() as i64,
            interval.strand(),
            variants,
            anchor as i64,
            mode,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn extract_span(
        &self,
        chrom: &str,
        start: i64,
        end: i64,
        strand: Strand,
        variants: &[Variant],
        anchor: i64,
        mode: LengthMode,
    ) -> Result<Vec<u8>> {
        if start >= end && mode == LengthMode::Fixed {
            return Ok(Vec::new());
        }
        let anchor = anchor.max(start).min(end);

        let mut pairs = split_overlapping(
            variants
                .iter()
                .filter(|variant| variant.chrom() == chrom)
                .map(AllelePair::from_variant)
                .collect(),
            anchor,
            Keep::Both,
        );
        if mode == LengthMode::Elastic {
            pairs = split_overlapping(pairs, start, Keep::Right);
            pairs = split_overlapping(pairs, end, Keep::Left);
        }

        let (mut upstream, mut downstream): (Vec<_>, Vec<_>) =
            pairs.into_iter().partition(|pair| pair.start >= anchor);
        upstream.sort_by_key(|pair| pair.start);
        downstream.sort_by_key(|pair| Reverse(pair.start));

        let (fetch_start, fetch_end) = match mode {
            LengthMode::Fixed => {
                (start - deleted_len(&downstream), end + deleted_len(&upstream))
            }
            LengthMode::Elastic => (start, end),
        };

        let mut downstream_segments = Vec::new();
        let mut prev = anchor;
        for pair in &downstream {
            if pair.end() <= fetch_start {
                break;
            }
            downstream_segments.push(Segment::Reference {
                start: pair.end(),
                end: prev,
            });
            downstream_segments.push(Segment::Allele(pair.alt.clone()));
            prev = pair.start;
        }
        downstream_segments.push(Segment::Reference {
            start: fetch_start,
            end: prev,
        });
        downstream_segments.reverse();

        let mut upstream_segments = Vec::new();
        let mut prev = anchor;
        for pair in &upstream {
            if pair.start >= fetch_end {
                break;
            }
            upstream_segments.push(Segment::Reference {
                start: prev,
                end: pair.start,
            });
            upstream_segments.push(Segment::Allele(pair.alt.clone()));
            prev = pair.end();
        }
        upstream_segments.push(Segment::Reference {
            start: prev,
            end: fetch_end,
        });

        let seq = self.reference.fetch(chrom, fetch_start, fetch_end)?;
        let mut downstream_seq = restore(&downstream_segments, &seq, fetch_start);
        let mut upstream_seq = restore(&upstream_segments, &seq, fetch_start);

        if mode == LengthMode::Fixed {
            let downstream_len = (anchor - start) as usize;
            let upstream_len = (end - anchor) as usize;
            if downstream_seq.len() > downstream_len {
                downstream_seq.drain(..downstream_seq.len() - downstream_len);
            }
            upstream_seq.truncate(upstream_len);
        }

        downstream_seq.extend(upstream_seq);
        if strand.is_reverse() {
            Ok(dna::revcomp(&downstream_seq))
        } else {
            Ok(downstream_seq)
        }
    }
}

/// Extracts the reference and variant window of an exon with its overhang.
///
/// The flanks keep their length even if variants inside them are indels. Only
/// the exon itself grows or shrinks with indels. For exons on the reverse
/// strand, the window is reverse complemented, i.e. in transcript orientation.
#[derive(new)]
pub struct ExonWindowExtractor<'a, R: ReferenceProvider + ?Sized> {
    reference: &'a R,
}

impl<'a, R: ReferenceProvider + ?Sized> ExonWindowExtractor<'a, R> {
    /// Extract reference and variant window. The overhang is given in genomic
    /// orientation.
    pub fn extract(
        &self,
        exon: &GenomicInterval,
        variants: &[Variant],
        overhang: Overhang,
    ) -> Result<RawWindowPair> {
        let chrom = exon.chrom();
        let start = exon.start() as i64;
        let end = exon.end() as i64;
        let left = overhang.left() as i64;
        let right = overhang.right() as i64;

        let mut reference = self.reference.fetch(chrom, start - left, end + right)?;
        if exon.strand().is_reverse() {
            reference = dna::revcomp(&reference);
        }

        let extractor = VariantSeqExtractor::new(self.reference);
        let mut left_flank = extractor.extract_span(
            chrom,
            start - left,
            start,
            exon.strand(),
            variants,
            start,
            LengthMode::Fixed,
        )?;
        let mut right_flank = extractor.extract_span(
            chrom,
            end,
            end + right,
            exon.strand(),
            variants,
            start,
            LengthMode::Fixed,
        )?;
        let exon_seq = extractor.extract_span(
            chrom,
            start,
            end,
            exon.strand(),
            variants,
            start,
            LengthMode::Elastic,
        )?;

        if exon.strand().is_reverse() {
            std::mem::swap(&mut left_flank, &mut right_flank);
        }

        let mut variant = left_flank;
        variant.extend(exon_seq);
        variant.extend(right_flank);

        Ok(RawWindowPair::new(
            String::from_utf8(reference)?,
            String::from_utf8(variant)?,
        ))
    }
}
