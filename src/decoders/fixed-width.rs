//! Decoder for records of a fixed byte width.

use std::fmt;

use super::{Decoded, Decoder};

/// Decoder for records of a fixed byte width, parsed by a caller
/// function.
///
/// The parse function receives exactly `width` bytes and returns
/// either the record or the reason why the bytes are invalid.
#[derive(Clone)]
pub struct FixedWidth<F> {
    width: usize,
    parse: F,
}

impl<F> FixedWidth<F> {
    /// Creates a new decoder.
    ///
    /// # Panics
    ///
    /// Panics if `width` is 0.
    pub fn new(width: usize, parse: F) -> Self {
        assert!(width > 0, "fixed-width records cannot be empty");
        Self { width, parse }
    }

    /// Returns the byte width of a record.
    pub fn width(&self) -> usize {
        self.width
    }
}

impl<F> fmt::Debug for FixedWidth<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedWidth")
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}

impl<R, F> Decoder for FixedWidth<F>
where
    F: FnMut(&[u8]) -> Result<R, String>,
{
    type Record = R;

    fn try_decode(&mut self, residue: &[u8]) -> Decoded<R> {
        let Some(bytes) = residue.get(..self.width) else {
            return Decoded::NeedMoreData;
        };

        match (self.parse)(bytes) {
            Ok(record) => Decoded::Record(self.width, record),
            Err(reason) => Decoded::Malformed(reason),
        }
    }
}
