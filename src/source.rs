//! The callback-based producer side wrapped by
//! [`StreamAdapter`](crate::StreamAdapter).

use std::rc::Rc;

/// Handler invoked for each data item.
pub type DataHandler<T> = Rc<dyn Fn(T)>;

/// Handler invoked once the source reaches its end.
pub type EndHandler = Rc<dyn Fn()>;

/// Handler invoked once the source fails.
pub type ErrorHandler<E> = Rc<dyn Fn(E)>;

/// An external, push-style asynchronous producer.
///
/// Handlers are registered with `Some` and unregistered with
/// `None`. Handlers may call back into the source (for example to
/// unregister themselves), so implementations must not keep their
/// own state borrowed while invoking a handler: clone the handler out
/// first, then call it.
pub trait Source {
    type Item;
    type Error;

    fn data_handler(&self, handler: Option<DataHandler<Self::Item>>);
    fn end_handler(&self, handler: Option<EndHandler>);
    fn error_handler(&self, handler: Option<ErrorHandler<Self::Error>>);

    /// Returns the flow control capability, if the source has one.
    fn flow_control(&self) -> Option<&dyn FlowControl> {
        None
    }

    /// Returns `true` if the source already delivered its terminal
    /// event and cannot produce anything anymore.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Optional pause/resume capability of a [`Source`].
pub trait FlowControl {
    fn pause(&self);
    fn resume(&self);
}
