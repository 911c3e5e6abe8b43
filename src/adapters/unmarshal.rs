//! Operator decoding a byte-chunk observable into a record
//! observable.

use std::{
    cell::{Cell, RefCell},
    fmt, mem,
    rc::Rc,
};

use log::{debug, trace};
use thiserror::Error;

use crate::{
    decoders::{Decoded, Decoder},
    observable::{Observable, Observer, SubscribeError, Subscription, Teardown},
};

/// Errors delivered by an [`Unmarshal`] observable.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum UnmarshalError<E> {
    /// The upstream completed in the middle of a record.
    #[error("Truncated record, {0} undecoded bytes left at the end of the stream")]
    TruncatedRecord(usize, Vec<u8>),

    /// The decoder rejected the residue.
    #[error("Cannot decode record: {0}")]
    Decode(String),

    /// The upstream failed.
    #[error("Upstream error: {0}")]
    Source(E),
}

/// Observable decoding the byte chunks emitted by an upstream
/// observable into records.
///
/// Chunks are accumulated into a residue buffer, from which the
/// decoder extracts as many complete records as possible after each
/// chunk. Records split across chunk boundaries are emitted once
/// complete.
///
/// Each subscription works on its own clone of the decoder and its
/// own residue.
pub struct Unmarshal<O, D> {
    upstream: O,
    decoder: D,
    capacity: usize,
}

impl<O, D> Unmarshal<O, D> {
    /// The default residue buffer capacity.
    pub const DEFAULT_CAPACITY: usize = 8 * 1024;

    /// Creates a new operator using a residue buffer with
    /// [`Self::DEFAULT_CAPACITY`] capacity.
    ///
    /// See [`Self::with_capacity`] for a custom buffer capacity.
    pub fn new(upstream: O, decoder: D) -> Self {
        Self::with_capacity(upstream, decoder, Self::DEFAULT_CAPACITY)
    }

    /// Creates a new operator using a residue buffer with the given
    /// initial capacity.
    pub fn with_capacity(upstream: O, decoder: D, capacity: usize) -> Self {
        Self {
            upstream,
            decoder,
            capacity,
        }
    }

    pub fn upstream(&self) -> &O {
        &self.upstream
    }
}

impl<O: fmt::Debug, D: fmt::Debug> fmt::Debug for Unmarshal<O, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unmarshal")
            .field("upstream", &self.upstream)
            .field("decoder", &self.decoder)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<O, D> Observable for Unmarshal<O, D>
where
    O: Observable,
    O::Item: AsRef<[u8]>,
    D: Decoder + Clone + 'static,
    D::Record: 'static,
{
    type Item = D::Record;
    type Error = UnmarshalError<O::Error>;

    fn subscribe<T>(&self, observer: T) -> Result<Subscription, SubscribeError>
    where
        T: Observer<D::Record, UnmarshalError<O::Error>> + 'static,
    {
        let link = Rc::new(Link::default());

        let unmarshaller = Unmarshaller {
            decoder: self.decoder.clone(),
            residue: Vec::with_capacity(self.capacity),
            downstream: observer,
            link: link.clone(),
        };

        let upstream = self.upstream.subscribe(unmarshaller)?;

        if link.closed.get() {
            // terminated or cancelled while subscribing
            upstream.cancel();
        } else {
            *link.upstream.borrow_mut() = Some(upstream);
        }

        Ok(Subscription::new(link))
    }
}

/// Link between the downstream subscription and the upstream one.
#[derive(Default)]
struct Link {
    closed: Cell<bool>,
    upstream: RefCell<Option<Subscription>>,
}

impl Link {
    /// Closes the link and cancels the upstream subscription.
    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }

        let upstream = self.upstream.borrow_mut().take();
        if let Some(upstream) = upstream {
            upstream.cancel();
        }
    }
}

impl Teardown for Link {
    fn cancel(&self) {
        if !self.closed.get() {
            debug!("cancel unmarshal subscription");
        }

        self.close();
    }

    fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

/// The upstream observer of an [`Unmarshal`] subscription.
struct Unmarshaller<D, T> {
    decoder: D,
    residue: Vec<u8>,
    downstream: T,
    link: Rc<Link>,
}

impl<D: Decoder, T> Unmarshaller<D, T> {
    /// Extracts and emits all complete records from the residue.
    fn decode<E>(&mut self)
    where
        T: Observer<D::Record, UnmarshalError<E>>,
    {
        let mut offset = 0;

        while offset < self.residue.len() && !self.link.closed.get() {
            let residue = &self.residue[offset..];

            match self.decoder.try_decode(residue) {
                Decoded::NeedMoreData => {
                    trace!("need more data to decode ({} bytes buffered)", residue.len());
                    break;
                }
                Decoded::Skip(n) if n > 0 && n <= residue.len() => {
                    trace!("skip {n} bytes");
                    offset += n;
                }
                Decoded::Record(n, record) if n > 0 && n <= residue.len() => {
                    trace!("decoded record of {n} bytes");
                    offset += n;
                    self.downstream.on_next(record);
                }
                Decoded::Skip(n) | Decoded::Record(n, _) => {
                    let len = residue.len();
                    let reason = format!("decoder consumed {n} bytes out of {len}");
                    return self.fail::<E>(reason);
                }
                Decoded::Malformed(reason) => {
                    return self.fail::<E>(reason);
                }
            }
        }

        self.residue.drain(..offset);
    }

    fn fail<E>(&mut self, reason: String)
    where
        T: Observer<D::Record, UnmarshalError<E>>,
    {
        debug!("malformed record: {reason}");
        self.link.close();
        self.residue.clear();
        self.downstream.on_error(UnmarshalError::Decode(reason));
    }
}

impl<C, E, D, T> Observer<C, E> for Unmarshaller<D, T>
where
    C: AsRef<[u8]>,
    D: Decoder,
    T: Observer<D::Record, UnmarshalError<E>>,
{
    fn on_next(&mut self, chunk: C) {
        if self.link.closed.get() {
            return;
        }

        let chunk = chunk.as_ref();
        trace!("received chunk of {} bytes", chunk.len());
        self.residue.extend_from_slice(chunk);
        self.decode::<E>();
    }

    fn on_error(&mut self, err: E) {
        if self.link.closed.replace(true) {
            return;
        }

        self.residue.clear();
        self.downstream.on_error(UnmarshalError::Source(err));
    }

    fn on_completed(&mut self) {
        if self.link.closed.replace(true) {
            return;
        }

        if self.residue.is_empty() {
            debug!("upstream completed");
            return self.downstream.on_completed();
        }

        let residue = mem::take(&mut self.residue);
        debug!("upstream completed with {} undecoded bytes", residue.len());
        let err = UnmarshalError::TruncatedRecord(residue.len(), residue);
        self.downstream.on_error(err);
    }
}
