//! Collection of pluggable record decoders for the
//! [`Unmarshal`](crate::Unmarshal) operator.
//!
//! A decoder looks at the residue of undecoded bytes and either
//! extracts one record from its beginning, asks for more data, or
//! rejects the residue as malformed. Any `FnMut(&[u8]) ->
//! Decoded<R>` closure is a decoder.

#[path = "length-prefixed.rs"]
pub mod length_prefixed;
pub mod delimited;
#[path = "fixed-width.rs"]
pub mod fixed_width;
#[cfg(feature = "serde")]
pub mod json;

/// Outcome of a decode attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Decoded<R> {
    /// A complete record was found at the beginning of the residue,
    /// spanning the given amount of bytes.
    Record(usize, R),

    /// The given amount of bytes at the beginning of the residue
    /// carries no record (separators, padding) and can be discarded.
    Skip(usize),

    /// The residue does not contain a complete record yet.
    NeedMoreData,

    /// The residue violates the record schema.
    Malformed(String),
}

impl<R> Decoded<R> {
    pub fn malformed(reason: impl ToString) -> Self {
        Self::Malformed(reason.to_string())
    }
}

/// Incremental record decoder.
pub trait Decoder {
    /// The type of the decoded records.
    type Record;

    /// Tries to decode one record from the beginning of the given
    /// residue.
    fn try_decode(&mut self, residue: &[u8]) -> Decoded<Self::Record>;
}

impl<R, F> Decoder for F
where
    F: FnMut(&[u8]) -> Decoded<R>,
{
    type Record = R;

    fn try_decode(&mut self, residue: &[u8]) -> Decoded<R> {
        self(residue)
    }
}
