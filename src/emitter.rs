//! In-memory push sources.
//!
//! [`Emitter`] lets host code (an event loop, a file reader, a
//! message consumer) push items into a [`Source`]. [`OneShot`] does
//! the same for single-value callbacks.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
};

use log::{debug, trace, warn};

use crate::{
    observable::Notification,
    source::{DataHandler, EndHandler, ErrorHandler, FlowControl, Source},
};

struct Handlers<T, E> {
    data: Option<DataHandler<T>>,
    end: Option<EndHandler>,
    error: Option<ErrorHandler<E>>,
}

/// Push source with pause/resume buffering.
///
/// Events are delivered synchronously to the registered handlers.
/// While the emitter is paused, or while the matching handler is not
/// registered yet, events are buffered and flushed in order as soon
/// as the emitter is resumed and the handler registered.
pub struct Emitter<T, E> {
    handlers: RefCell<Handlers<T, E>>,
    buffer: RefCell<VecDeque<Notification<T, E>>>,
    paused: Cell<bool>,
    /// A terminal event has been emitted (maybe still buffered).
    terminated: Cell<bool>,
    /// The terminal event has been delivered.
    closed: Cell<bool>,
}

impl<T, E> Emitter<T, E> {
    /// Creates a new flowing emitter.
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Handlers {
                data: None,
                end: None,
                error: None,
            }),
            buffer: RefCell::new(VecDeque::new()),
            paused: Cell::new(false),
            terminated: Cell::new(false),
            closed: Cell::new(false),
        }
    }

    /// Creates a new emitter starting in the paused state.
    pub fn paused() -> Self {
        let emitter = Self::new();
        emitter.paused.set(true);
        emitter
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    /// Returns `true` once a terminal event has been emitted, even if
    /// it is still buffered.
    pub fn is_terminated(&self) -> bool {
        self.terminated.get()
    }

    /// Returns the amount of buffered events.
    pub fn buffered(&self) -> usize {
        self.buffer.borrow().len()
    }

    /// Emits a data item.
    pub fn emit(&self, item: T) {
        self.push(Notification::Next(item))
    }

    /// Emits the end of the stream.
    pub fn end(&self) {
        self.push(Notification::Completed)
    }

    /// Emits a failure.
    pub fn fail(&self, err: E) {
        self.push(Notification::Error(err))
    }

    fn push(&self, event: Notification<T, E>) {
        if self.terminated.get() {
            warn!("emitter already terminated, ignore {}", event.kind());
            return;
        }

        if event.is_terminal() {
            self.terminated.set(true);
        }

        self.buffer.borrow_mut().push_back(event);
        self.flush();
    }

    /// Delivers buffered events until the buffer is empty, the
    /// emitter is paused or a handler is missing.
    fn flush(&self) {
        loop {
            if self.paused.get() {
                trace!("emitter paused, keep {} event(s)", self.buffered());
                break;
            }

            let Some(event) = self.buffer.borrow_mut().pop_front() else {
                break;
            };

            if let Err(event) = self.deliver(event) {
                trace!("no handler for {}, keep it buffered", event.kind());
                self.buffer.borrow_mut().push_front(event);
                break;
            }
        }
    }

    fn deliver(&self, event: Notification<T, E>) -> Result<(), Notification<T, E>> {
        match event {
            Notification::Next(item) => {
                let Some(handler) = self.handlers.borrow().data.clone() else {
                    return Err(Notification::Next(item));
                };
                handler(item);
            }
            Notification::Completed => {
                let Some(handler) = self.handlers.borrow().end.clone() else {
                    return Err(Notification::Completed);
                };
                self.closed.set(true);
                debug!("emitter ended");
                handler();
            }
            Notification::Error(err) => {
                let Some(handler) = self.handlers.borrow().error.clone() else {
                    return Err(Notification::Error(err));
                };
                self.closed.set(true);
                debug!("emitter failed");
                handler(err);
            }
        }

        Ok(())
    }
}

impl<T, E> Default for Emitter<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Emitter<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("paused", &self.paused.get())
            .field("buffered", &self.buffered())
            .field("terminated", &self.terminated.get())
            .field("closed", &self.closed.get())
            .finish()
    }
}

impl<T, E> Source for Emitter<T, E> {
    type Item = T;
    type Error = E;

    fn data_handler(&self, handler: Option<DataHandler<T>>) {
        let registered = handler.is_some();
        self.handlers.borrow_mut().data = handler;
        if registered {
            self.flush();
        }
    }

    fn end_handler(&self, handler: Option<EndHandler>) {
        let registered = handler.is_some();
        self.handlers.borrow_mut().end = handler;
        if registered {
            self.flush();
        }
    }

    fn error_handler(&self, handler: Option<ErrorHandler<E>>) {
        let registered = handler.is_some();
        self.handlers.borrow_mut().error = handler;
        if registered {
            self.flush();
        }
    }

    fn flow_control(&self) -> Option<&dyn FlowControl> {
        Some(self)
    }

    fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl<T, E> FlowControl for Emitter<T, E> {
    fn pause(&self) {
        trace!("pause emitter");
        self.paused.set(true);
    }

    fn resume(&self) {
        if !self.paused.replace(false) {
            return;
        }

        trace!("resume emitter");
        self.flush();
    }
}

/// Source emitting a single value, like the result of a "listen" or
/// "connect" callback.
///
/// A successful completion emits the value then ends, a failed one
/// emits the error. Completing twice is ignored.
pub struct OneShot<T, E> {
    emitter: Emitter<T, E>,
}

impl<T, E> OneShot<T, E> {
    pub fn new() -> Self {
        Self {
            emitter: Emitter::new(),
        }
    }

    /// Completes the source with the given result.
    pub fn complete(&self, result: Result<T, E>) {
        if self.emitter.terminated.get() {
            warn!("one-shot source already completed, ignore result");
            return;
        }

        match result {
            Ok(item) => {
                // both events are buffered together so a paused
                // subscriber receives them in one flush
                let mut buffer = self.emitter.buffer.borrow_mut();
                buffer.push_back(Notification::Next(item));
                buffer.push_back(Notification::Completed);
            }
            Err(err) => {
                let mut buffer = self.emitter.buffer.borrow_mut();
                buffer.push_back(Notification::Error(err));
            }
        }

        self.emitter.terminated.set(true);
        self.emitter.flush();
    }
}

impl<T, E> Default for OneShot<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for OneShot<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OneShot").field(&self.emitter).finish()
    }
}

impl<T, E> Source for OneShot<T, E> {
    type Item = T;
    type Error = E;

    fn data_handler(&self, handler: Option<DataHandler<T>>) {
        self.emitter.data_handler(handler)
    }

    fn end_handler(&self, handler: Option<EndHandler>) {
        self.emitter.end_handler(handler)
    }

    fn error_handler(&self, handler: Option<ErrorHandler<E>>) {
        self.emitter.error_handler(handler)
    }

    fn flow_control(&self) -> Option<&dyn FlowControl> {
        Some(&self.emitter)
    }

    fn is_closed(&self) -> bool {
        self.emitter.is_closed()
    }
}
