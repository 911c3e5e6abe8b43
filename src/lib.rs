#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Adapters turning callback-based stream sources into cancellable,
//! backpressure-aware observables.
//!
//! A [`Source`] is any push-style producer delivering items through a
//! data handler, signalling its end and its failure through dedicated
//! handlers, and optionally supporting pause/resume. File readers,
//! socket or HTTP body streams, message consumers and timers all fit
//! this shape.
//!
//! The [`StreamAdapter`] wraps such a source into a cold,
//! single-subscriber [`Observable`], and the [`Unmarshal`] operator
//! incrementally decodes a byte-chunk observable into records using a
//! pluggable [`Decoder`].
//!
//! ```
//! use std::rc::Rc;
//!
//! use io_observable::{decoders::delimited::Delimited, Emitter, Observable, StreamAdapter};
//!
//! let source = Rc::new(Emitter::<Vec<u8>, String>::new());
//!
//! StreamAdapter::new(&source)
//!     .unmarshal(Delimited::lines())
//!     .subscribe_with(
//!         |line| println!("line: {}", String::from_utf8_lossy(&line)),
//!         |err| eprintln!("error: {err}"),
//!         || println!("done"),
//!     )
//!     .unwrap();
//!
//! source.emit(b"hello\nwor".to_vec());
//! source.emit(b"ld\n".to_vec());
//! source.end();
//! ```

pub mod adapters;
pub mod decoders;
pub mod emitter;
pub mod observable;
pub mod runtimes;
pub mod source;

#[doc(inline)]
pub use crate::{
    adapters::{
        stream::{AdapterOptions, AdapterState, StreamAdapter},
        unmarshal::{Unmarshal, UnmarshalError},
    },
    decoders::{Decoded, Decoder},
    emitter::{Emitter, OneShot},
    observable::{
        FnObserver, Notification, Observable, Observer, SubscribeError, Subscription,
    },
    source::{FlowControl, Source},
};
