//! genomics.rs
//!
//! Genomic coordinate primitives shared by extraction, splitting and pairing.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;

use crate::errors::Error;

/// Strip "chr" prefix, so both "chr1" and "1" normalize to "1".
pub(crate) fn normalize_chrom(chrom: &str) -> String {
    chrom.trim_start_matches("chr").to_string()
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum Strand {
    #[strum(serialize = "+")]
    #[serde(rename = "+")]
    Forward,
    #[strum(serialize = "-")]
    #[serde(rename = "-")]
    Reverse,
}

impl Strand {
    pub fn parse(value: &str) -> Result<Self> {
        Strand::from_str(value.trim()).map_err(|_| {
            Error::InvalidStrand {
                value: value.to_owned(),
            }
            .into()
        })
    }

    pub fn is_reverse(self) -> bool {
        self == Strand::Reverse
    }
}

/// A 0-based, half-open interval on one strand of a chromosome.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Getters, CopyGetters, Serialize, Deserialize)]
pub struct GenomicInterval {
    #[getset(get = "pub")]
    chrom: String,
    #[getset(get_copy = "pub")]
    start: u64,
    #[getset(get_copy = "pub")]
    end: u64,
    #[getset(get_copy = "pub")]
    strand: Strand,
}

impl GenomicInterval {
    pub fn new(chrom: impl Into<String>, start: u64, end: u64, strand: Strand) -> Result<Self> {
        let chrom = chrom.into();
        if start >= end {
            return Err(Error::EmptyInterval { chrom, start, end }.into());
        }
        Ok(GenomicInterval {
            chrom,
            start,
            end,
            strand,
        })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Annotation string of the form `chrom:start-end:strand`.
    pub fn annotation(&self) -> String {
        format!("{}:{}-{}:{}", self.chrom, self.start, self.end, self.strand)
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.annotation())
    }
}

/// Intronic flank lengths left and right of an exon.
///
/// Before strand correction the pair is in genomic orientation, afterwards in
/// transcript (5' to 3') orientation. See [`Overhang::oriented`].
#[derive(new, Copy, Clone, Debug, PartialEq, Eq, Hash, CopyGetters, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct Overhang {
    left: u64,
    right: u64,
}

impl Overhang {
    pub fn swapped(self) -> Self {
        Overhang::new(self.right, self.left)
    }

    /// Convert a genomic overhang into transcript orientation.
    pub fn oriented(self, strand: Strand) -> Self {
        if strand.is_reverse() {
            self.swapped()
        } else {
            self
        }
    }
}

impl Default for Overhang {
    fn default() -> Self {
        Overhang::new(100, 100)
    }
}

impl FromStr for Overhang {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidOverhang {
            value: value.to_owned(),
        };
        let values = value
            .split(',')
            .map(|field| field.trim().parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        match values.as_slice() {
            [both] => Ok(Overhang::new(*both, *both)),
            [left, right] => Ok(Overhang::new(*left, *right)),
            _ => Err(invalid()),
        }
    }
}
