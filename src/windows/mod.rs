// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Sequence windows around exons.
//!
//! ```text
//!            acceptor_intron            exon             donor_intron
//!        |-------------------|   |-----------------|   |-------------|
//! -------iiiiiiiiiiiiiiiiiiiiiiiiEEEEEEEEEEEEEEEEEEEEEEEiiiiiiiiiiiiiiii------
//!                      |-----------|           |----------|
//!                         acceptor                donor
//! ```

use strum::IntoEnumIterator;

pub mod extractor;
pub mod splitter;

/// Reference and variant sequence covering the same exon and overhang.
///
/// Flanks are equally long in both sequences, only the exon part of the variant
/// sequence may change in length (indels inside the exon).
#[derive(new, Clone, Debug, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[getset(get = "pub")]
pub struct RawWindowPair {
    reference: String,
    variant: String,
}

/// The structural modules a window is split into.
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
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WindowModule {
    AcceptorIntron,
    Acceptor,
    Exon,
    Donor,
    DonorIntron,
}

impl WindowModule {
    pub fn all() -> impl Iterator<Item = WindowModule> {
        WindowModule::iter()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitWindowSet {
    pub acceptor_intron: String,
    pub acceptor: String,
    pub exon: String,
    pub donor: String,
    pub donor_intron: String,
}

impl SplitWindowSet {
    pub fn get(&self, module: WindowModule) -> &str {
        match module {
            WindowModule::AcceptorIntron => &self.acceptor_intron,
            WindowModule::Acceptor => &self.acceptor,
            WindowModule::Exon => &self.exon,
            WindowModule::Donor => &self.donor,
            WindowModule::DonorIntron => &self.donor_intron,
        }
    }
}
