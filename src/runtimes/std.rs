//! The standard, blocking runtime.

use std::io::{self, ErrorKind, Read};

use log::{debug, trace};

use crate::emitter::Emitter;

use super::Pump;

/// Reads chunks from the given reader and emits them until EOF, an
/// error, or until the emitter gets paused.
///
/// Each chunk is at most `capacity` bytes long. When the emitter is
/// paused (for example by a subscription being cancelled, or by flow
/// control), this function returns [`Pump::Paused`] and can be
/// called again once the emitter is resumed.
///
/// # Panics
///
/// Panics if `capacity` is 0.
pub fn pump(
    mut reader: impl Read,
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

        trace!("reading bytes synchronously");
        match reader.read(&mut buffer) {
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
