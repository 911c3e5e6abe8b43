//! The Tokio-based, async runtime.

use std::io::{self, ErrorKind};

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::emitter::Emitter;

use super::Pump;

/// Reads chunks from the given async reader and emits them until
/// EOF, an error, or until the emitter gets paused.
///
/// See [`crate::runtimes::std::pump`] for the blocking version.
///
/// # Panics
///
/// Panics if `capacity` is 0.
pub async fn pump(
    mut reader: impl AsyncRead + Unpin,
    emitter: &Emitter<Vec<u8>, io::Error>,
    capacity: usize,
) -> Pump {
    assert!(capacity > 0, "pump buffer capacity cannot be 0");
    let mut buffer = vec![0; capacity];

    loop {
        if emitter.is_terminated() {
            return Pump::Closed;
        }

        if emitter.is_paused() {
            trace!("emitter paused, stop reading");
            return Pump::Paused;
        }

        trace!("reading bytes asynchronously");
        match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("reached EOF");
                emitter.end();
                return Pump::Ended;
            }
            Ok(n) => {
                trace!("read {n}/{capacity} bytes");
                emitter.emit(buffer[..n].to_vec());
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!("read failed: {err}");
                emitter.fail(err);
                return Pump::Failed;
            }
        }
    }
}
