// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Sequence windows for splicing effect prediction.
//!
//! Given an exon and a variant, the crate extracts the reference window and the
//! variant-integrated window (exon plus intronic overhang on both sides), splits
//! both into the five structural modules consumed by a splicing model
//! (acceptor intron, acceptor, exon, donor, donor intron) and optionally one-hot
//! encodes them.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate strum_macros;

pub mod cli;
pub mod encoding;
pub mod errors;
pub mod pairing;
pub mod reference;
pub mod utils;
pub mod variants;
pub mod windows;

pub use crate::encoding::{Encoder, OneHotEncoder};
pub use crate::pairing::{PairingDriver, Record};
pub use crate::reference::ReferenceProvider;
pub use crate::utils::genomics::{GenomicInterval, Overhang, Strand};
pub use crate::variants::Variant;
pub use crate::windows::extractor::ExonWindowExtractor;
pub use crate::windows::splitter::SeqSplitter;
pub use crate::windows::{RawWindowPair, SplitWindowSet, WindowModule};
