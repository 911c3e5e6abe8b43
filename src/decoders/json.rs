//! Decoder for concatenated JSON values.

use std::{fmt, marker::PhantomData};

use log::trace;
use serde::de::DeserializeOwned;
use serde_json::Deserializer;

use super::{Decoded, Decoder};

/// Decoder for a stream of JSON values, concatenated or separated by
/// whitespace (for example newline-delimited JSON).
///
/// Values are self-delimiting, except top-level numbers, `true`,
/// `false` and `null`: those are only emitted once followed by
/// whitespace or another value.
pub struct Json<T> {
    marker: PhantomData<fn() -> T>,
}

impl<T> Json<T> {
    pub fn new() -> Self {
        Self {
            marker: PhantomData,
        }
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Json<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Json")
    }
}

impl<T: DeserializeOwned> Decoder for Json<T> {
    type Record = T;

    fn try_decode(&mut self, residue: &[u8]) -> Decoded<T> {
        if residue.is_empty() {
            return Decoded::NeedMoreData;
        }

        let Some(start) = residue.iter().position(|b| !b.is_ascii_whitespace()) else {
            return Decoded::Skip(residue.len());
        };

        if start > 0 {
            return Decoded::Skip(start);
        }

        let mut values = Deserializer::from_slice(residue).into_iter::<T>();

        match values.next() {
            None => Decoded::NeedMoreData,
            Some(Ok(value)) => {
                let end = values.byte_offset();

                if end == residue.len() && !matches!(residue[end - 1], b'}' | b']' | b'"') {
                    trace!("top-level scalar may continue in the next chunk");
                    return Decoded::NeedMoreData;
                }

                Decoded::Record(end, value)
            }
            Some(Err(err)) if err.is_eof() => Decoded::NeedMoreData,
            Some(Err(err)) => Decoded::malformed(err),
        }
    }
}
