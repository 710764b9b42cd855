// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use itertools::Itertools;

use crate::errors::Error;
use crate::pairing::{ExonAnnotations, PairingUnit, UnitSource};
use crate::utils::genomics::{GenomicInterval, Overhang, Strand};
use crate::variants::Variant;

/// Column name aliases and the canonical name they map to.
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("pos", "POS"),
    ("variant_position", "POS"),
    ("hg19_variant_position", "POS"),
    ("ref", "REF"),
    ("reference", "REF"),
    ("alt", "ALT"),
    ("variant", "ALT"),
    ("start", "Exon_Start"),
    ("exon_start", "Exon_Start"),
    ("end", "Exon_End"),
    ("exon_end", "Exon_End"),
    ("Stop", "Exon_End"),
    ("chr", "CHROM"),
    ("chrom", "CHROM"),
    ("seqnames", "CHROM"),
    ("chromosome", "CHROM"),
    ("CHR", "CHROM"),
];

pub(crate) const EXON_COLUMNS: [&str; 4] = ["CHROM", "Exon_Start", "Exon_End", "strand"];
pub(crate) const VARIANT_COLUMNS: [&str; 3] = ["POS", "REF", "ALT"];

pub(crate) fn canonical_column(name: &str) -> &str {
    let name = name.trim();
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| *canonical)
}

/// Positions of the (canonicalized) columns of a table.
#[derive(Debug, Clone)]
pub(crate) struct Header {
    columns: HashMap<String, usize>,
}

impl Header {
    pub(crate) fn new(record: &csv::StringRecord) -> Self {
        let mut columns = HashMap::new();
        for (i, name) in record.iter().enumerate() {
            columns
                .entry(canonical_column(name).to_owned())
                .or_insert(i);
        }
        Header { columns }
    }

    pub(crate) fn require(&self, required: &[&str]) -> Result<()> {
        let missing = required
            .iter()
            .filter(|column| !self.columns.contains_key(**column))
            .join(", ");
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingColumns { columns: missing }.into())
        }
    }

    /// Non-empty value of the given column.
    pub(crate) fn get<'a>(&self, row: &'a csv::StringRecord, column: &str) -> Option<&'a str> {
        self.columns
            .get(column)
            .and_then(|i| row.get(*i))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn parse<T: FromStr>(
        &self,
        row: &csv::StringRecord,
        row_index: usize,
        column: &str,
    ) -> Result<T> {
        let value = self.get(row, column).unwrap_or("");
        value.parse().map_err(|_| {
            Error::InvalidTableRow {
                row: row_index,
                column: column.to_owned(),
                value: value.to_owned(),
            }
            .into()
        })
    }

    fn parse_optional<T: FromStr>(
        &self,
        row: &csv::StringRecord,
        row_index: usize,
        column: &str,
    ) -> Result<Option<T>> {
        match self.get(row, column) {
            Some(_) => self.parse(row, row_index, column).map(Some),
            None => Ok(None),
        }
    }

    /// Parse the exon of a row. `Exon_Start` is 1-based, `Exon_End` inclusive.
    pub(crate) fn exon(&self, row: &csv::StringRecord, row_index: usize) -> Result<GenomicInterval> {
        let chrom: String = self.parse(row, row_index, "CHROM")?;
        let start: u64 = self.parse(row, row_index, "Exon_Start")?;
        let end: u64 = self.parse(row, row_index, "Exon_End")?;
        if start == 0 {
            return Err(Error::InvalidTableRow {
                row: row_index,
                column: "Exon_Start".to_owned(),
                value: start.to_string(),
            }
            .into());
        }
        let strand = Strand::parse(self.get(row, "strand").unwrap_or(""))?;
        GenomicInterval::new(chrom, start - 1, end, strand)
    }

    /// Optional per-exon overhang from the `left_overhang` and `right_overhang`
    /// columns. A missing side falls back to `default`.
    pub(crate) fn overhang(
        &self,
        row: &csv::StringRecord,
        row_index: usize,
        default: Overhang,
    ) -> Result<Option<Overhang>> {
        let left = self.parse_optional(row, row_index, "left_overhang")?;
        let right = self.parse_optional(row, row_index, "right_overhang")?;
        Ok(match (left, right) {
            (None, None) => None,
            (left, right) => Some(Overhang::new(
                left.unwrap_or_else(|| default.left()),
                right.unwrap_or_else(|| default.right()),
            )),
        })
    }

    pub(crate) fn annotations(&self, row: &csv::StringRecord) -> ExonAnnotations {
        let value = |column| self.get(row, column).map(str::to_owned);
        ExonAnnotations {
            exon_id: value("exon_id"),
            gene_id: value("gene_id"),
            gene_name: value("gene_name"),
            transcript_id: value("transcript_id"),
        }
    }
}

pub(crate) fn read_table<R: io::Read>(
    reader: R,
    delimiter: u8,
) -> Result<(Header, Vec<csv::StringRecord>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let header = Header::new(reader.headers()?);
    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    Ok((header, rows))
}

/// Exon/variant units from the rows of a delimited table.
///
/// Required columns are `CHROM`, `Exon_Start`, `Exon_End`, `strand`, `POS`,
/// `REF` and `ALT` (or one of their aliases). The table is read at
/// construction, so that its chromosomes are known before pairing starts.
#[derive(Debug)]
pub struct TableSource {
    header: Header,
    rows: Vec<csv::StringRecord>,
    next_row: usize,
    default_overhang: Overhang,
}

impl TableSource {
    pub fn from_reader<R: io::Read>(reader: R, delimiter: u8) -> Result<Self> {
        let (header, rows) = read_table(reader, delimiter)?;
        header.require(&[&EXON_COLUMNS[..], &VARIANT_COLUMNS[..]].concat())?;
        info!("read {} exon/variant pairs", rows.len());
        Ok(TableSource {
            header,
            rows,
            next_row: 0,
            default_overhang: Overhang::default(),
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let file = fs::File::open(path.as_ref())
            .with_context(|| format!("unable to open table {}", path.as_ref().display()))?;
        TableSource::from_reader(file, delimiter)
    }

    /// Overhang used for a missing side of the per-exon overhang columns.
    pub fn default_overhang(mut self, overhang: Overhang) -> Self {
        self.default_overhang = overhang;
        self
    }

    fn unit(&self, row_index: usize) -> Result<PairingUnit> {
        let row = &self.rows[row_index];
        // 1-based data row, the header being row 0
        let row_number = row_index + 1;
        let exon = self.header.exon(row, row_number)?;
        let variant = Variant::single(
            exon.chrom().as_str(),
            self.header.parse(row, row_number, "POS")?,
            self.header.get(row, "REF").unwrap_or(""),
            self.header.get(row, "ALT").unwrap_or(""),
        )?;
        Ok(PairingUnit::new(
            exon,
            variant,
            self.header.overhang(row, row_number, self.default_overhang)?,
            self.header.annotations(row),
        ))
    }
}

impl UnitSource for TableSource {
    fn chromosomes(&self) -> HashSet<String> {
        self.rows
            .iter()
            .filter_map(|row| self.header.get(row, "CHROM"))
            .map(str::to_owned)
            .collect()
    }

    fn next_unit(&mut self) -> Option<Result<PairingUnit>> {
        if self.next_row >= self.rows.len() {
            return None;
        }
        let unit = self.unit(self.next_row);
        self.next_row += 1;
        Some(unit)
    }
}
