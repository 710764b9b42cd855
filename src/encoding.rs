// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use ndarray::{Array2, Array3, Axis};

/// Numeric encoding of nucleotide sequences.
pub trait Encoder {
    /// Encode a single sequence into a (length x channels) matrix.
    fn encode(&self, seq: &str) -> Array2<f32>;

    /// Encode a batch of sequences into a (batch x max length x channels) tensor.
    /// Shorter sequences are padded at the end with all-zero rows.
    fn encode_batch(&self, seqs: &[&str]) -> Array3<f32>;
}

/// One-hot encoding with channel order A, C, G, T. `N` (and any other symbol)
/// is encoded as an all-zero row.
#[derive(Default, Debug, Clone, Copy)]
pub struct OneHotEncoder;

impl OneHotEncoder {
    pub const CHANNELS: usize = 4;

    fn channel(base: u8) -> Option<usize> {
        match base {
            b'A' | b'a' => Some(0),
            b'C' | b'c' => Some(1),
            b'G' | b'g' => Some(2),
            b'T' | b't' => Some(3),
            _ => None,
        }
    }
}

impl Encoder for OneHotEncoder {
    fn encode(&self, seq: &str) -> Array2<f32> {
        let mut encoded = Array2::zeros((seq.len(), Self::CHANNELS));
        for (i, base) in seq.bytes().enumerate() {
            if let Some(channel) = Self::channel(base) {
                encoded[[i, channel]] = 1.0;
            }
        }
        encoded
    }

    fn encode_batch(&self, seqs: &[&str]) -> Array3<f32> {
        let max_len = seqs.iter().map(|seq| seq.len()).max().unwrap_or(0);
        let mut encoded = Array3::zeros((seqs.len(), max_len, Self::CHANNELS));
        for (mut row, seq) in encoded.axis_iter_mut(Axis(0)).zip(seqs) {
            for (i, base) in seq.bytes().enumerate() {
                if let Some(channel) = Self::channel(base) {
                    row[[i, channel]] = 1.0;
                }
            }
        }
        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s};

    #[test]
    fn test_encode() {
        let encoded = OneHotEncoder.encode("ACGTN");
        assert_eq!(
            encoded,
            array![
                [1.0f32, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
                [0.0, 0.0, 0.0, 0.0],
            ]
        );
    }

    #[test]
    fn test_encode_batch_padding() {
        let encoded = OneHotEncoder.encode_batch(&["AC", "GTA"]);
        assert_eq!(encoded.shape(), &[2, 3, 4]);
        assert_eq!(encoded.slice(s![0, ..2, ..]), OneHotEncoder.encode("AC"));
        assert_eq!(encoded.slice(s![0, 2, ..]).sum(), 0.0);
        assert_eq!(encoded.slice(s![1, .., ..]), OneHotEncoder.encode("GTA"));
    }

    #[test]
    fn test_encode_empty_batch() {
        assert_eq!(OneHotEncoder.encode_batch(&[]).shape(), &[0, 0, 4]);
    }
}
