use anyhow::Result;
use bio_types::genome::AbstractLocus;
use rust_htslib::bcf;

use crate::utils::SimpleCounter;
use crate::variants::Variant;

#[derive(Hash, PartialEq, Eq, EnumString, EnumIter, IntoStaticStr, Display, Debug, Clone, Copy)]
pub enum SkipReason {
    #[strum(serialize = "symbolic alleles")]
    Symbolic,
    #[strum(serialize = "breakends")]
    Breakend,
    #[strum(serialize = "spanning deletions")]
    SpanningDeletion,
    #[strum(serialize = "missing alleles")]
    Missing,
}

fn skip_reason(alt_allele: &[u8]) -> Option<SkipReason> {
    if alt_allele.is_empty() || alt_allele == b"." {
        Some(SkipReason::Missing)
    } else if alt_allele == b"*" {
        Some(SkipReason::SpanningDeletion)
    } else if alt_allele.starts_with(b"<") {
        Some(SkipReason::Symbolic)
    } else if alt_allele.contains(&b'[')
        || alt_allele.contains(&b']')
        || alt_allele.starts_with(b".")
        || alt_allele.ends_with(b".")
    {
        Some(SkipReason::Breakend)
    } else {
        None
    }
}

/// Split the alleles of a VCF record into single-alt variants.
///
/// `pos` is 1-based, `alleles[0]` is the reference allele.
pub(crate) fn split_alleles(
    chrom: &str,
    pos: u64,
    alleles: &[&[u8]],
    mut skips: Option<&mut SimpleCounter<SkipReason>>,
) -> Result<Vec<Variant>> {
    let mut variants = Vec::new();
    if alleles.is_empty() {
        return Ok(variants);
    }
    let ref_allele = String::from_utf8_lossy(alleles[0]);
    for alt_allele in &alleles[1..] {
        if let Some(reason) = skip_reason(alt_allele) {
            if let Some(skips) = skips.as_mut() {
                skips.incr(reason);
            }
            continue;
        }
        variants.push(Variant::single(
            chrom,
            pos,
            ref_allele.as_ref(),
            String::from_utf8_lossy(alt_allele).into_owned(),
        )?);
    }
    Ok(variants)
}

/// Collect single-alt variants from a given `bcf::Record`.
pub(crate) fn collect_variants(
    record: &bcf::Record,
    skips: Option<&mut SimpleCounter<SkipReason>>,
) -> Result<Vec<Variant>> {
    let alleles = record.alleles();
    split_alleles(record.contig(), record.pos() as u64 + 1, &alleles, skips)
}
