use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;
use tempfile::TempDir;

use splicewindow::cli::{self, Splicewindow};

/// Chromosome "1" of the test reference.
pub(crate) const CHROM1: &str = "GCTAAAGACAATTACATAACATACACGTCAGCACGAAACTTGTTGGCCCAGTGTGAATCGCTTAAGGGTTAAGTAAGTGTGATGCATACGCCTTTACTTGCTGTGTCCACCCCATCGGACTGGCATTTTTATTACACTCAGAAACAGAACTCGGGTAATTTTGACAGGTCACGCAGAGGCGCGCCCTCCTGAAGTGCGTG";

/// Chromosome "2" of the test reference.
pub(crate) const CHROM2: &str = "ACGTTGCAACGTTGCAACGTTGCAACGTTGCAACGTTGCA";

/// Temporary directory holding reference, tables and outputs of a test.
pub(crate) struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub(crate) fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Workspace {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub(crate) fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub(crate) fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Write the test reference as single-line FASTA, optionally with a
    /// samtools faidx compatible index.
    pub(crate) fn write_reference(&self, name: &str, indexed: bool) -> PathBuf {
        let mut fasta = String::new();
        let mut fai = String::new();
        for (chrom, seq) in &[("1", CHROM1), ("2", CHROM2)] {
            fasta.push_str(&format!(">{}\n", chrom));
            fai.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\n",
                chrom,
                seq.len(),
                fasta.len(),
                seq.len(),
                seq.len() + 1
            ));
            fasta.push_str(seq);
            fasta.push('\n');
        }
        let path = self.write(name, &fasta);
        if indexed {
            self.write(&format!("{}.fai", name), &fai);
        }
        path
    }

    /// Run the command line interface with the given arguments, writing to
    /// `out` in this workspace, and parse the emitted JSON lines.
    pub(crate) fn run(&self, args: &[&str], out: &str) -> Result<Vec<serde_json::Value>> {
        let out = self.path(out);
        let mut argv = vec!["splicewindow".to_owned()];
        argv.extend(args.iter().map(|arg| (*arg).to_owned()));
        argv.push("--out".to_owned());
        argv.push(out.to_str().unwrap().to_owned());

        cli::run(Splicewindow::from_iter(argv))?;

        fs::read_to_string(&out)?
            .lines()
            .map(|line| Ok(serde_json::from_str(line)?))
            .collect()
    }
}
