//! Decoder for frames separated by a delimiter byte.

use log::trace;
use memchr::memchr;

use super::{Decoded, Decoder};

/// Decoder for frames terminated by a delimiter byte.
///
/// Decoded records do not contain the delimiter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Delimited {
    delimiter: u8,
    max_length: usize,
    strip_cr: bool,
}

impl Delimited {
    /// The default maximum frame length, delimiter excluded.
    pub const DEFAULT_MAX_LENGTH: usize = 64 * 1024;

    /// Creates a new decoder splitting on the given delimiter.
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            max_length: Self::DEFAULT_MAX_LENGTH,
            strip_cr: false,
        }
    }

    /// Creates a new decoder splitting on `\n`, and stripping the
    /// `\r` preceding it if any.
    pub fn lines() -> Self {
        Self {
            strip_cr: true,
            ..Self::new(b'\n')
        }
    }

    /// Sets the maximum frame length, delimiter excluded.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }
}

impl Decoder for Delimited {
    type Record = Vec<u8>;

    fn try_decode(&mut self, residue: &[u8]) -> Decoded<Vec<u8>> {
        let Some(pos) = memchr(self.delimiter, residue) else {
            // a trailing \r may still be stripped once \n arrives
            let pending_cr = self.strip_cr && residue.ends_with(b"\r");
            if residue.len() > self.max_length.saturating_add(usize::from(pending_cr)) {
                let max = self.max_length;
                return Decoded::malformed(format!("no delimiter found within {max} bytes"));
            }

            trace!("no delimiter found in {} bytes", residue.len());
            return Decoded::NeedMoreData;
        };

        let mut frame = &residue[..pos];
        if self.strip_cr {
            frame = frame.strip_suffix(b"\r").unwrap_or(frame);
        }

        if frame.len() > self.max_length {
            let (len, max) = (frame.len(), self.max_length);
            return Decoded::malformed(format!("frame of {len} bytes exceeds {max} bytes"));
        }

        Decoded::Record(pos + 1, frame.to_vec())
    }
}
