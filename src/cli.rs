// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rust_htslib::bcf;
use structopt::StructOpt;

use crate::encoding::Encoder;
use crate::errors::Error;
use crate::pairing::{
    IntervalExonIndex, OutputMode, PairingDriver, TableSource, UnitSource, VcfSource,
};
use crate::reference::{self, ReferenceProvider};
use crate::utils::genomics::Overhang;
use crate::windows::splitter::{SeqSplitter, SplitterParams};

/// Number of chromosomes kept in memory when reading from an indexed FASTA.
const REFERENCE_CACHE_CAPACITY: usize = 3;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "splicewindow",
    about = "Extract reference and variant sequence windows around exons for splicing effect prediction."
)]
#[structopt(setting = structopt::clap::AppSettings::ColoredHelp)]
pub enum Splicewindow {
    #[structopt(
        name = "table",
        about = "Pair exons with variants given as rows of a table (CSV/TSV)."
    )]
    #[structopt(setting = structopt::clap::AppSettings::ColoredHelp)]
    Table {
        #[structopt(
            parse(from_os_str),
            long,
            help = "FASTA file with reference genome. If indexed with samtools faidx, chromosomes are loaded on demand."
        )]
        reference: PathBuf,
        #[structopt(
            parse(from_os_str),
            long,
            help = "Table with columns CHROM, Exon_Start, Exon_End, strand, POS, REF and ALT (1-based, inclusive coordinates)."
        )]
        exons: PathBuf,
        #[structopt(
            long,
            default_value = ",",
            parse(try_from_str = parse_delimiter),
            help = "Column delimiter of the table ('tab' for TSV)."
        )]
        delimiter: u8,
        #[structopt(flatten)]
        options: WindowOptions,
    },
    #[structopt(
        name = "vcf",
        about = "Pair the variants of a VCF/BCF file with all exons they fall into (including overhang)."
    )]
    #[structopt(setting = structopt::clap::AppSettings::ColoredHelp)]
    Vcf {
        #[structopt(
            parse(from_os_str),
            long,
            help = "FASTA file with reference genome. If indexed with samtools faidx, chromosomes are loaded on demand."
        )]
        reference: PathBuf,
        #[structopt(
            parse(from_os_str),
            long,
            help = "Table with exons (columns CHROM, Exon_Start, Exon_End, strand and optionally left_overhang, right_overhang)."
        )]
        exons: PathBuf,
        #[structopt(
            long,
            default_value = "tab",
            parse(try_from_str = parse_delimiter),
            help = "Column delimiter of the exon table ('tab' for TSV)."
        )]
        delimiter: u8,
        #[structopt(
            parse(from_os_str),
            long,
            help = "VCF/BCF file to process (if omitted, read from STDIN)."
        )]
        variants: Option<PathBuf>,
        #[structopt(long, help = "Log each processed VCF record.")]
        log_each_record: bool,
        #[structopt(flatten)]
        options: WindowOptions,
    },
}

impl Splicewindow {
    pub fn options(&self) -> &WindowOptions {
        match self {
            Splicewindow::Table { options, .. } => options,
            Splicewindow::Vcf { options, .. } => options,
        }
    }
}

#[derive(Debug, StructOpt, Clone)]
pub struct WindowOptions {
    #[structopt(
        long,
        default_value = "100,100",
        help = "Intronic overhang left and right of each exon in genomic orientation (LEFT,RIGHT or a single number)."
    )]
    pub overhang: Overhang,
    #[structopt(
        long,
        default_value = "split",
        possible_values = &["raw", "split", "encoded"],
        help = "Emit raw windows, windows split into acceptor intron, acceptor, exon, donor and donor intron, or one-hot encoded split windows."
    )]
    pub output: OutputMode,
    #[structopt(
        long,
        help = "Process records in batches of the given size (encoding happens once per batch)."
    )]
    pub batch_size: Option<usize>,
    #[structopt(long, help = "Bases to cut from the exon start.")]
    pub exon_cut_left: Option<usize>,
    #[structopt(long, help = "Bases to cut from the exon end.")]
    pub exon_cut_right: Option<usize>,
    #[structopt(long, help = "Bases to omit from the acceptor intron end.")]
    pub acceptor_intron_cut: Option<usize>,
    #[structopt(long, help = "Bases to omit from the donor intron start.")]
    pub donor_intron_cut: Option<usize>,
    #[structopt(long, help = "Intronic length of the acceptor window.")]
    pub acceptor_intron_len: Option<usize>,
    #[structopt(long, help = "Exonic length of the acceptor window.")]
    pub acceptor_exon_len: Option<usize>,
    #[structopt(long, help = "Exonic length of the donor window.")]
    pub donor_exon_len: Option<usize>,
    #[structopt(long, help = "Intronic length of the donor window.")]
    pub donor_intron_len: Option<usize>,
    #[structopt(
        long,
        help = "Warn about reference windows without canonical AG acceptor or GT donor."
    )]
    pub pattern_warning: bool,
    #[structopt(
        parse(from_os_str),
        long,
        help = "YAML file with splitter parameters. Command line options take precedence."
    )]
    pub splitter_config: Option<PathBuf>,
    #[structopt(
        parse(from_os_str),
        long,
        help = "File that shall contain the JSON lines output (if omitted, write to STDOUT)."
    )]
    pub out: Option<PathBuf>,
    #[structopt(short, long, help = "Provide verbose logging output.")]
    pub verbose: bool,
}

impl WindowOptions {
    pub fn splitter_params(&self) -> Result<SplitterParams> {
        let mut params = match self.splitter_config {
            Some(ref path) => SplitterParams::from_yaml(path)?,
            None => SplitterParams::default(),
        };
        let overrides = [
            (self.exon_cut_left, &mut params.exon_cut_left),
            (self.exon_cut_right, &mut params.exon_cut_right),
            (self.acceptor_intron_cut, &mut params.acceptor_intron_cut),
            (self.donor_intron_cut, &mut params.donor_intron_cut),
            (self.acceptor_intron_len, &mut params.acceptor_intron_len),
            (self.acceptor_exon_len, &mut params.acceptor_exon_len),
            (self.donor_exon_len, &mut params.donor_exon_len),
            (self.donor_intron_len, &mut params.donor_intron_len),
        ];
        for (value, param) in overrides {
            if let Some(value) = value {
                *param = value;
            }
        }
        params.pattern_warning |= self.pattern_warning;
        Ok(params)
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, Error> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ if value.len() == 1 && value.is_ascii() => Ok(value.as_bytes()[0]),
        _ => Err(Error::InvalidDelimiter {
            value: value.to_owned(),
        }),
    }
}

/// Open the reference genome, lazily if a FASTA index is present.
pub fn load_reference(path: &Path) -> Result<Arc<dyn ReferenceProvider>> {
    let mut index = path.as_os_str().to_owned();
    index.push(".fai");
    if Path::new(&index).exists() {
        info!("Reading indexed reference genome from {}.", path.display());
        Ok(Arc::new(reference::Buffer::from_path(
            path,
            REFERENCE_CACHE_CAPACITY,
        )?))
    } else {
        info!(
            "No FASTA index found, loading reference genome {} into memory.",
            path.display()
        );
        Ok(Arc::new(reference::InMemory::from_fasta(path)?))
    }
}

fn write_record<W: Write, T: serde::Serialize>(writer: &mut W, record: &T) -> Result<()> {
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Drive the pairing and write one JSON record per line.
pub fn write_records<S, R, E, W>(
    driver: PairingDriver<S, R, E>,
    batch_size: Option<usize>,
    mut writer: W,
) -> Result<usize>
where
    S: UnitSource,
    R: ReferenceProvider + ?Sized,
    E: Encoder,
    W: Write,
{
    let mut written = 0;
    match batch_size {
        Some(size) => {
            for batch in driver.batches(size)? {
                for record in batch? {
                    write_record(&mut writer, &record)?;
                    written += 1;
                }
            }
        }
        None => {
            for record in driver {
                write_record(&mut writer, &record?)?;
                written += 1;
            }
        }
    }
    writer.flush()?;
    Ok(written)
}

fn run_driver<S: UnitSource>(
    source: S,
    reference: Arc<dyn ReferenceProvider>,
    options: &WindowOptions,
) -> Result<()> {
    let driver = PairingDriver::new(source, reference)?
        .overhang(options.overhang)
        .output(options.output)
        .splitter(SeqSplitter::new(options.splitter_params()?));

    let written = match options.out {
        Some(ref path) => {
            let file = File::create(path)
                .with_context(|| format!("unable to create output file {}", path.display()))?;
            write_records(driver, options.batch_size, BufWriter::new(file))?
        }
        None => write_records(driver, options.batch_size, BufWriter::new(io::stdout()))?,
    };
    info!("Wrote {} records.", written);
    Ok(())
}

pub fn run(opt: Splicewindow) -> Result<()> {
    match opt {
        Splicewindow::Table {
            ref reference,
            ref exons,
            delimiter,
            ref options,
        } => {
            let reference = load_reference(reference)?;
            let source = TableSource::from_path(exons, delimiter)?.default_overhang(options.overhang);
            run_driver(source, reference, options)
        }
        Splicewindow::Vcf {
            ref reference,
            ref exons,
            delimiter,
            ref variants,
            log_each_record,
            ref options,
        } => {
            let reference = load_reference(reference)?;
            let index = IntervalExonIndex::from_path(exons, delimiter, options.overhang)?;
            let source = match variants {
                Some(path) => VcfSource::from_path(path, index)?,
                None => VcfSource::new(bcf::Reader::from_stdin()?, index),
            }
            .log_each_record(log_each_record);
            run_driver(source, reference, options)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert!(parse_delimiter(",,").is_err());
    }

    #[test]
    fn test_options() {
        let opt = Splicewindow::from_iter(vec![
            "splicewindow",
            "table",
            "--reference",
            "ref.fa",
            "--exons",
            "exons.tsv",
            "--delimiter",
            "tab",
            "--overhang",
            "20,30",
            "--output",
            "encoded",
            "--donor-intron-len",
            "7",
        ]);
        let options = opt.options();
        assert_eq!(options.overhang, Overhang::new(20, 30));
        assert_eq!(options.output, OutputMode::Encoded);

        let params = options.splitter_params().unwrap();
        assert_eq!(params.donor_intron_len, 7);
        assert_eq!(params.acceptor_intron_len, 50);
        assert!(!params.pattern_warning);
        match opt {
            Splicewindow::Table { delimiter, .. } => assert_eq!(delimiter, b'\t'),
            _ => panic!("expected table subcommand"),
        }
    }
}
