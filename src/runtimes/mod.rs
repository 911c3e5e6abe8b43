//! Collection of runtimes pumping readers into an
//! [`Emitter`](crate::Emitter).
//!
//! A runtime contains all the I/O logic: it reads chunks of bytes and
//! pushes them into an emitter, which can then be observed through a
//! [`StreamAdapter`](crate::StreamAdapter).
//!
//! Other event loops only need to call [`Emitter::emit`],
//! [`Emitter::end`] and [`Emitter::fail`] from their own read
//! callbacks, and stop reading while [`Emitter::is_paused`].
//!
//! [`Emitter::emit`]: crate::Emitter::emit
//! [`Emitter::end`]: crate::Emitter::end
//! [`Emitter::fail`]: crate::Emitter::fail
//! [`Emitter::is_paused`]: crate::Emitter::is_paused

#[cfg(feature = "std")]
pub mod std;
#[cfg(feature = "tokio")]
pub mod tokio;

/// Reason why a pump stopped reading.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pump {
    /// The emitter is paused, the pump can be restarted once it is
    /// resumed.
    Paused,

    /// The reader reached EOF, the emitter has been ended.
    Ended,

    /// The reader failed, the error has been emitted.
    Failed,

    /// The emitter was already terminated, nothing has been read.
    Closed,
}
