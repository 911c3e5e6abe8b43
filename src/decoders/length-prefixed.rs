//! Decoder for frames prefixed by their length.

use log::trace;

use super::{Decoded, Decoder};

/// Decoder for frames made of a 4-byte big-endian length followed by
/// that many bytes of payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LengthPrefixed {
    max_length: usize,
}

impl LengthPrefixed {
    /// The size of the length prefix, in bytes.
    pub const PREFIX_SIZE: usize = 4;

    /// The default maximum payload length.
    pub const DEFAULT_MAX_LENGTH: usize = 16 * 1024 * 1024;

    /// Creates a new decoder accepting payloads up to
    /// [`Self::DEFAULT_MAX_LENGTH`] bytes.
    ///
    /// See [`Self::with_max_length`] for a custom limit.
    pub fn new() -> Self {
        Self::with_max_length(Self::DEFAULT_MAX_LENGTH)
    }

    /// Creates a new decoder accepting payloads up to the given
    /// length.
    pub fn with_max_length(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LengthPrefixed {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LengthPrefixed {
    type Record = Vec<u8>;

    fn try_decode(&mut self, residue: &[u8]) -> Decoded<Vec<u8>> {
        let Some(prefix) = residue.get(..Self::PREFIX_SIZE) else {
            return Decoded::NeedMoreData;
        };

        let mut len = [0; Self::PREFIX_SIZE];
        len.copy_from_slice(prefix);
        let len = u32::from_be_bytes(len) as usize;

        if len > self.max_length {
            let max = self.max_length;
            return Decoded::malformed(format!("frame of {len} bytes exceeds {max} bytes"));
        }

        let end = Self::PREFIX_SIZE + len;
        let Some(payload) = residue.get(Self::PREFIX_SIZE..end) else {
            trace!("frame incomplete: {}/{end} bytes", residue.len());
            return Decoded::NeedMoreData;
        };

        Decoded::Record(end, payload.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use crate::decoders::{Decoded, Decoder};

    use super::LengthPrefixed;

    #[test]
    fn decode_frames() {
        let _ = env_logger::try_init();

        let mut decoder = LengthPrefixed::new();

        assert_eq!(decoder.try_decode(b"\0\0"), Decoded::NeedMoreData);
        assert_eq!(decoder.try_decode(b"\0\0\0\x03ab"), Decoded::NeedMoreData);
        assert_eq!(
            decoder.try_decode(b"\0\0\0\x03abcd"),
            Decoded::Record(7, b"abc".to_vec())
        );
        assert_eq!(
            decoder.try_decode(b"\0\0\0\0"),
            Decoded::Record(4, Vec::new())
        );
    }

    #[test]
    fn reject_oversized_frame() {
        let _ = env_logger::try_init();

        let mut decoder = LengthPrefixed::with_max_length(2);

        assert!(matches!(
            decoder.try_decode(b"\0\0\0\x03"),
            Decoded::Malformed(_)
        ));
    }
}
