// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("chromosome {chrom} not found in reference")]
    ReferenceNotFound { chrom: String },
    #[error("interval {chrom}:{start}-{end} exceeds the reference sequence (length {len})")]
    IntervalOutOfBounds {
        chrom: String,
        start: i64,
        end: i64,
        len: u64,
    },
    #[error("empty interval {chrom}:{start}-{end}; start must be smaller than end")]
    EmptyInterval { chrom: String, start: u64, end: u64 },
    #[error("invalid strand information '{value}', must be '+' or '-'")]
    InvalidStrand { value: String },
    #[error("invalid variant at {chrom}:{pos}: {msg}")]
    InvalidVariant { chrom: String, pos: u64, msg: String },
    #[error("invalid overhang '{value}', use LEFT,RIGHT or a single number")]
    InvalidOverhang { value: String },
    #[error("required columns {columns} are missing")]
    MissingColumns { columns: String },
    #[error("invalid value in row {row}, column {column}: '{value}'")]
    InvalidTableRow {
        row: usize,
        column: String,
        value: String,
    },
    #[error("reference chromosome names do not match with the chromosome names of the exons{hint}")]
    ChromosomeMismatch { hint: String },
    #[error("batch size must be larger than zero")]
    InvalidBatchSize,
    #[error("invalid delimiter '{value}', must be a single ASCII character or 'tab'")]
    InvalidDelimiter { value: String },
}

pub(crate) fn invalid_variant(chrom: &str, pos: u64, msg: &str) -> Error {
    Error::InvalidVariant {
        chrom: chrom.to_owned(),
        pos,
        msg: msg.to_owned(),
    }
}
