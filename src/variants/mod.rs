// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fmt;

use anyhow::Result;

use crate::errors;

/// A single-locus substitution or indel in VCF notation (1-based position,
/// reference allele including any anchor base).
///
/// Only the first alternative allele is integrated into windows; multi-allelic
/// records have to be split before (see [`crate::utils::collect_variants`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Getters, CopyGetters)]
pub struct Variant {
    #[getset(get = "pub")]
    chrom: String,
    #[getset(get_copy = "pub")]
    pos: u64,
    #[getset(get = "pub")]
    ref_allele: String,
    #[getset(get = "pub")]
    alt_alleles: Vec<String>,
}

impl Variant {
    pub fn new(
        chrom: impl Into<String>,
        pos: u64,
        ref_allele: impl AsRef<str>,
        alt_alleles: Vec<String>,
    ) -> Result<Self> {
        let chrom = chrom.into();
        if pos == 0 {
            return Err(errors::invalid_variant(&chrom, pos, "position must be 1-based").into());
        }
        let ref_allele = ref_allele.as_ref().trim().to_ascii_uppercase();
        if ref_allele.is_empty() {
            return Err(errors::invalid_variant(&chrom, pos, "empty reference allele").into());
        }
        if alt_alleles.is_empty() {
            return Err(errors::invalid_variant(&chrom, pos, "no alternative allele").into());
        }
        let alt_alleles = alt_alleles
            .iter()
            .map(|alt| alt.trim().to_ascii_uppercase())
            .collect();

        Ok(Variant {
            chrom,
            pos,
            ref_allele,
            alt_alleles,
        })
    }

    /// Single-alt constructor.
    pub fn single(
        chrom: impl Into<String>,
        pos: u64,
        ref_allele: impl AsRef<str>,
        alt_allele: impl Into<String>,
    ) -> Result<Self> {
        Variant::new(chrom, pos, ref_allele, vec![alt_allele.into()])
    }

    /// The alternative allele used for window integration.
    pub fn alt_allele(&self) -> &str {
        &self.alt_alleles[0]
    }

    /// 0-based start of the reference allele.
    pub fn start(&self) -> u64 {
        self.pos - 1
    }

    /// 0-based exclusive end of the reference allele.
    pub fn end(&self) -> u64 {
        self.start() + self.ref_allele.len() as u64
    }

    /// Length difference introduced by the variant (positive for insertions).
    pub fn len_delta(&self) -> i64 {
        self.alt_allele().len() as i64 - self.ref_allele.len() as i64
    }
}

/// Identity string `CHROM:POS:REF:['ALT']`.
impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:['{}']",
            self.chrom,
            self.pos,
            self.ref_allele,
            self.alt_allele()
        )
    }
}

/// Variant metadata attached to every emitted record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantInfo {
    #[serde(rename = "CHROM")]
    pub chrom: String,
    #[serde(rename = "POS")]
    pub pos: u64,
    #[serde(rename = "REF")]
    pub ref_allele: String,
    #[serde(rename = "ALT")]
    pub alt_allele: String,
    #[serde(rename = "STR")]
    pub identity: String,
}

impl From<&Variant> for VariantInfo {
    fn from(variant: &Variant) -> Self {
        VariantInfo {
            chrom: variant.chrom().to_owned(),
            pos: variant.pos(),
            ref_allele: variant.ref_allele().to_owned(),
            alt_allele: variant.alt_allele().to_owned(),
            identity: variant.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_string() {
        let variant = Variant::single("17", 41276033, "c", "T").unwrap();
        assert_eq!(variant.to_string(), "17:41276033:C:['T']");
        assert_eq!(VariantInfo::from(&variant).identity, "17:41276033:C:['T']");
    }

    #[test]
    fn test_coordinates() {
        let deletion = Variant::single("1", 11, "ACGT", "A").unwrap();
        assert_eq!(deletion.start(), 10);
        assert_eq!(deletion.end(), 14);
        assert_eq!(deletion.len_delta(), -3);

        let insertion = Variant::single("1", 11, "A", "AGG").unwrap();
        assert_eq!(insertion.len_delta(), 2);
    }

    #[test]
    fn test_invalid_variants() {
        assert!(Variant::single("1", 0, "A", "C").is_err());
        assert!(Variant::single("1", 5, "", "C").is_err());
        assert!(Variant::new("1", 5, "A", vec![]).is_err());
    }
}
