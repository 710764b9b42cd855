// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use typed_builder::TypedBuilder;

use crate::utils::genomics::Overhang;
use crate::windows::SplitWindowSet;

/// Parameters of the five-way window split.
///
/// * `exon_cut_left`/`exon_cut_right` - bases removed at the start/end of the exon
///   window (the part already covered by the acceptor/donor window)
/// * `acceptor_intron_cut`/`donor_intron_cut` - bases removed at the exon-facing
///   end of the acceptor/donor intron window
/// * `acceptor_intron_len`/`acceptor_exon_len` - intronic/exonic length of the
///   acceptor window
/// * `donor_exon_len`/`donor_intron_len` - exonic/intronic length of the donor
///   window
/// * `pattern_warning` - report non-canonical splice site dinucleotides
#[derive(TypedBuilder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterParams {
    #[builder(default = 0)]
    pub exon_cut_left: usize,
    #[builder(default = 0)]
    pub exon_cut_right: usize,
    #[builder(default = 6)]
    pub acceptor_intron_cut: usize,
    #[builder(default = 6)]
    pub donor_intron_cut: usize,
    #[builder(default = 50)]
    pub acceptor_intron_len: usize,
    #[builder(default = 3)]
    pub acceptor_exon_len: usize,
    #[builder(default = 5)]
    pub donor_exon_len: usize,
    #[builder(default = 13)]
    pub donor_intron_len: usize,
    #[builder(default = false)]
    pub pattern_warning: bool,
}

impl Default for SplitterParams {
    fn default() -> Self {
        SplitterParams::builder().build()
    }
}

impl SplitterParams {
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = File::open(path.as_ref())
            .with_context(|| format!("unable to open {}", path.as_ref().display()))?;
        Ok(serde_yaml::from_reader(reader)?)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum SpliceSiteIssue {
    #[strum(serialize = "non-GT donor")]
    NonCanonicalDonor,
    #[strum(serialize = "non-AG acceptor")]
    NonCanonicalAcceptor,
}

#[derive(new, Clone, Debug, PartialEq, Eq, Getters, CopyGetters)]
pub struct SpliceSiteWarning {
    #[getset(get_copy = "pub")]
    issue: SpliceSiteIssue,
    #[getset(get = "pub")]
    label: String,
}

/// Receiver of splice site warnings. Warnings never abort processing.
pub trait WarningSink: Send + Sync {
    fn report(&self, warning: SpliceSiteWarning);
}

/// Forwards warnings to the log.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogSink;

impl WarningSink for LogSink {
    fn report(&self, warning: SpliceSiteWarning) {
        warn!("{}: {}", warning.issue(), warning.label());
    }
}

/// Keeps all warnings in memory, e.g. as an audit trail of a run.
#[derive(Default, Debug)]
pub struct WarningLog {
    warnings: Mutex<Vec<SpliceSiteWarning>>,
}

impl WarningLog {
    pub fn warnings(&self) -> Vec<SpliceSiteWarning> {
        self.warnings.lock().unwrap().clone()
    }
}

impl WarningSink for WarningLog {
    fn report(&self, warning: SpliceSiteWarning) {
        self.warnings.lock().unwrap().push(warning);
    }
}

/// Slice with Python semantics: negative positions count from the end, positions
/// outside of the sequence are clamped and an inverted range yields nothing.
fn slice(seq: &[u8], start: Option<i64>, stop: Option<i64>) -> &[u8] {
    let len = seq.len() as i64;
    let normalize = |pos: i64| {
        if pos < 0 {
            (pos + len).max(0)
        } else {
            pos.min(len)
        }
    };
    let start = start.map(normalize).unwrap_or(0);
    let stop = stop.map(normalize).unwrap_or(len);
    if start >= stop {
        &[]
    } else {
        &seq[start as usize..stop as usize]
    }
}

fn to_string(seq: &[u8]) -> String {
    String::from_utf8_lossy(seq).into_owned()
}

/// Splits windows into acceptor intron, acceptor, exon, donor and donor intron.
#[derive(Clone)]
pub struct SeqSplitter {
    params: SplitterParams,
    sink: Arc<dyn WarningSink>,
}

impl Default for SeqSplitter {
    fn default() -> Self {
        SeqSplitter::new(SplitterParams::default())
    }
}

impl SeqSplitter {
    pub fn new(params: SplitterParams) -> Self {
        SeqSplitter::with_sink(params, Arc::new(LogSink))
    }

    pub fn with_sink(params: SplitterParams, sink: Arc<dyn WarningSink>) -> Self {
        SeqSplitter { params, sink }
    }

    pub fn params(&self) -> &SplitterParams {
        &self.params
    }

    /// Split the window and report non-canonical splice sites under the given label.
    ///
    /// `overhang` is the intronic length left and right of the exon in
    /// transcript orientation.
    pub fn split(&self, window: &str, overhang: Overhang, label: &str) -> SplitWindowSet {
        self.split_window(window, overhang, Some(label))
    }

    /// Split the window without any splice site checks.
    pub fn split_unchecked(&self, window: &str, overhang: Overhang) -> SplitWindowSet {
        self.split_window(window, overhang, None)
    }

    fn split_window(&self, window: &str, overhang: Overhang, label: Option<&str>) -> SplitWindowSet {
        let params = &self.params;
        let mut intron_left = overhang.left() as i64;
        let mut intron_right = overhang.right() as i64;

        // pad with N if the overhang is too short for the acceptor or donor window
        let mut padded = Vec::with_capacity(window.len());
        let lack_left = params.acceptor_intron_len as i64 - intron_left;
        if lack_left >= 0 {
            padded.resize((lack_left + 1) as usize, b'N');
            intron_left += lack_left + 1;
        }
        padded.extend_from_slice(window.as_bytes());
        let lack_right = params.donor_intron_len as i64 - intron_right;
        if lack_right >= 0 {
            padded.resize(padded.len() + (lack_right + 1) as usize, b'N');
            intron_right += lack_right + 1;
        }
        let x = padded.as_slice();

        let acceptor_intron = slice(
            x,
            None,
            Some(intron_left - params.acceptor_intron_cut as i64),
        );
        let acceptor = slice(
            x,
            Some(intron_left - params.acceptor_intron_len as i64),
            Some(intron_left + params.acceptor_exon_len as i64),
        );
        let exon = slice(
            x,
            Some(intron_left + params.exon_cut_left as i64),
            Some(-intron_right - params.exon_cut_right as i64),
        );
        let donor = slice(
            x,
            Some(-intron_right - params.donor_exon_len as i64),
            Some(-intron_right + params.donor_intron_len as i64),
        );
        let donor_intron = slice(x, Some(-intron_right + params.donor_intron_cut as i64), None);

        if let Some(label) = label.filter(|_| params.pattern_warning) {
            let donor_site = slice(
                donor,
                Some(params.donor_exon_len as i64),
                Some(params.donor_exon_len as i64 + 2),
            );
            if donor_site != b"GT" && overhang.right() > 0 {
                self.sink.report(SpliceSiteWarning::new(
                    SpliceSiteIssue::NonCanonicalDonor,
                    label.to_owned(),
                ));
            }
            let acceptor_site = slice(
                acceptor,
                Some(params.acceptor_intron_len as i64 - 2),
                Some(params.acceptor_intron_len as i64),
            );
            if acceptor_site != b"AG" && overhang.left() > 0 {
                self.sink.report(SpliceSiteWarning::new(
                    SpliceSiteIssue::NonCanonicalAcceptor,
                    label.to_owned(),
                ));
            }
        }

        SplitWindowSet {
            acceptor_intron: to_string(acceptor_intron),
            acceptor: to_string(acceptor),
            exon: if exon.is_empty() {
                "N".to_owned()
            } else {
                to_string(exon)
            },
            donor: to_string(donor),
            donor_intron: to_string(donor_intron),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXON: &str = "CGATCGGATCCATGCAAGTC";

    /// 60 intronic bases ending in AG, exon, 20 intronic bases starting with GT.
    fn window(acceptor_site: &str, donor_site: &str) -> String {
        format!(
            "{}{}{}{}{}",
            "T".repeat(58),
            acceptor_site,
            EXON,
            donor_site,
            "A".repeat(18)
        )
    }

    fn recording_splitter(pattern_warning: bool) -> (SeqSplitter, Arc<WarningLog>) {
        let log = Arc::new(WarningLog::default());
        let params = SplitterParams::builder()
            .pattern_warning(pattern_warning)
            .build();
        (SeqSplitter::with_sink(params, log.clone()), log)
    }

    #[test]
    fn test_default_split() {
        let (splitter, log) = recording_splitter(true);
        let w = window("AG", "GT");
        let split = splitter.split(&w, Overhang::new(60, 20), "1:60-80:+");

        assert_eq!(split.acceptor_intron, w[..54]);
        assert_eq!(split.acceptor, w[10..63]);
        assert_eq!(split.acceptor.len(), 53);
        assert_eq!(split.exon, EXON);
        assert_eq!(split.donor, format!("{}GT{}", &EXON[15..], "A".repeat(11)));
        assert_eq!(split.donor_intron, "A".repeat(14));
        assert!(log.warnings().is_empty());
    }

    #[test]
    fn test_exon_cuts() {
        let params = SplitterParams::builder()
            .exon_cut_left(3)
            .exon_cut_right(5)
            .build();
        let split = SeqSplitter::new(params).split_unchecked(&window("AG", "GT"), Overhang::new(60, 20));
        assert_eq!(split.exon, EXON[3..15]);
    }

    #[test]
    fn test_padding() {
        let (splitter, _) = recording_splitter(false);
        let w = format!("{}{}{}", "T".repeat(10), EXON, "A".repeat(5));
        let split = splitter.split_unchecked(&w, Overhang::new(10, 5));

        // 41 N left, 9 N right
        assert_eq!(split.acceptor, format!("{}{}{}", "N".repeat(40), "T".repeat(10), &EXON[..3]));
        assert_eq!(split.acceptor_intron, format!("{}{}", "N".repeat(41), "T".repeat(4)));
        assert_eq!(split.exon, EXON);
        assert_eq!(split.donor, format!("{}{}{}", &EXON[15..], "A".repeat(5), "N".repeat(8)));
        assert_eq!(split.donor_intron, "N".repeat(8));
    }

    #[test]
    fn test_padding_at_equality() {
        let (splitter, _) = recording_splitter(false);
        let w = format!("{}{}{}", "T".repeat(50), EXON, "A".repeat(13));
        let split = splitter.split_unchecked(&w, Overhang::new(50, 13));

        assert_eq!(split.acceptor, format!("{}{}", "T".repeat(50), &EXON[..3]));
        assert_eq!(split.acceptor_intron, format!("N{}", "T".repeat(44)));
        assert_eq!(split.donor, format!("{}{}", &EXON[15..], "A".repeat(13)));
        assert_eq!(split.donor_intron, format!("{}N", "A".repeat(7)));
    }

    #[test]
    fn test_zero_overhang() {
        let (splitter, log) = recording_splitter(true);
        let split = splitter.split(EXON, Overhang::new(0, 0), "exon");

        assert_eq!(split.exon, EXON);
        assert_eq!(split.acceptor, format!("{}{}", "N".repeat(50), &EXON[..3]));
        assert_eq!(split.donor, format!("{}{}", &EXON[15..], "N".repeat(13)));
        // no flanks, nothing to check
        assert!(log.warnings().is_empty());
    }

    #[test]
    fn test_empty_exon_placeholder() {
        let (splitter, _) = recording_splitter(false);
        let w = format!("{}{}", "T".repeat(60), "A".repeat(20));
        let split = splitter.split_unchecked(&w, Overhang::new(60, 20));
        assert_eq!(split.exon, "N");

        let params = SplitterParams::builder()
            .exon_cut_left(15)
            .exon_cut_right(15)
            .build();
        let split = SeqSplitter::new(params).split_unchecked(&window("AG", "GT"), Overhang::new(60, 20));
        assert_eq!(split.exon, "N");
    }

    #[test]
    fn test_pattern_warnings() {
        let (splitter, log) = recording_splitter(true);
        splitter.split(&window("CC", "CC"), Overhang::new(60, 20), "1:60-80:+");

        assert_eq!(
            log.warnings(),
            vec![
                SpliceSiteWarning::new(SpliceSiteIssue::NonCanonicalDonor, "1:60-80:+".to_owned()),
                SpliceSiteWarning::new(
                    SpliceSiteIssue::NonCanonicalAcceptor,
                    "1:60-80:+".to_owned()
                ),
            ]
        );
    }

    #[test]
    fn test_pattern_warnings_disabled() {
        let (splitter, log) = recording_splitter(false);
        splitter.split(&window("CC", "CC"), Overhang::new(60, 20), "exon");
        assert!(log.warnings().is_empty());

        let (splitter, log) = recording_splitter(true);
        splitter.split_unchecked(&window("CC", "CC"), Overhang::new(60, 20));
        assert!(log.warnings().is_empty());
    }

    #[test]
    fn test_split_is_deterministic() {
        let (splitter, _) = recording_splitter(false);
        let w = window("AG", "GT");
        assert_eq!(
            splitter.split_unchecked(&w, Overhang::new(60, 20)),
            splitter.split_unchecked(&w, Overhang::new(60, 20))
        );
    }

    #[test]
    fn test_params_from_yaml() {
        let params: SplitterParams =
            serde_yaml::from_str("exon_cut_left: 2\npattern_warning: true\n").unwrap();
        assert_eq!(params.exon_cut_left, 2);
        assert!(params.pattern_warning);
        assert_eq!(params.acceptor_intron_len, 50);
        assert_eq!(params.donor_intron_cut, 6);
    }

    #[test]
    fn test_slice() {
        let seq = b"ACGTACGT";
        assert_eq!(slice(seq, None, Some(-2)), b"ACGTAC");
        assert_eq!(slice(seq, Some(-3), None), b"CGT");
        assert_eq!(slice(seq, Some(6), Some(2)), b"");
        assert_eq!(slice(seq, Some(-20), Some(20)), seq);
    }
}
