//! Observer, observable and subscription primitives shared by
//! [adapters].
//!
//! [adapters]: crate::adapters

use std::{fmt, rc::Rc};

use thiserror::Error;

use crate::{adapters::unmarshal::Unmarshal, decoders::Decoder};

/// Errors that can occur when subscribing to an observable.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum SubscribeError {
    /// The observable already has an active subscription.
    #[error("Observable already has an active subscription")]
    AlreadySubscribed,

    /// The underlying source is gone, terminally closed, or was
    /// already consumed by a previous subscription.
    #[error("Observable source is unavailable")]
    SourceUnavailable,
}

/// A materialized observer event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notification<T, E> {
    Next(T),
    Error(E),
    Completed,
}

impl<T, E> Notification<T, E> {
    /// Returns `true` for [`Notification::Error`] and
    /// [`Notification::Completed`].
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Next(_) => "next",
            Self::Error(_) => "error",
            Self::Completed => "completed",
        }
    }
}

/// The consumer side of an observable.
///
/// Each subscription receives zero or more [`Observer::on_next`]
/// calls, followed by at most one terminal call, either
/// [`Observer::on_error`] or [`Observer::on_completed`].
pub trait Observer<T, E> {
    fn on_next(&mut self, item: T);
    fn on_error(&mut self, err: E);
    fn on_completed(&mut self);
}

/// Observer built from three closures.
pub struct FnObserver<N, F, C> {
    next: N,
    error: F,
    completed: C,
}

impl<N, F, C> FnObserver<N, F, C> {
    pub fn new(next: N, error: F, completed: C) -> Self {
        Self {
            next,
            error,
            completed,
        }
    }
}

impl<T, E, N, F, C> Observer<T, E> for FnObserver<N, F, C>
where
    N: FnMut(T),
    F: FnMut(E),
    C: FnMut(),
{
    fn on_next(&mut self, item: T) {
        (self.next)(item)
    }

    fn on_error(&mut self, err: E) {
        (self.error)(err)
    }

    fn on_completed(&mut self) {
        (self.completed)()
    }
}

impl<N, F, C> fmt::Debug for FnObserver<N, F, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver").finish_non_exhaustive()
    }
}

/// A push-based sequence that can be subscribed to.
pub trait Observable {
    /// The type of the items being emitted.
    type Item: 'static;

    /// The type of the terminal error.
    type Error: 'static;

    /// Attaches the given observer.
    ///
    /// The returned [`Subscription`] can be used to stop the delivery
    /// before the observable terminates. Dropping it does not cancel
    /// anything.
    fn subscribe<O>(&self, observer: O) -> Result<Subscription, SubscribeError>
    where
        O: Observer<Self::Item, Self::Error> + 'static;

    /// Attaches an observer built from the given closures.
    fn subscribe_with<N, F, C>(
        &self,
        next: N,
        error: F,
        completed: C,
    ) -> Result<Subscription, SubscribeError>
    where
        N: FnMut(Self::Item) + 'static,
        F: FnMut(Self::Error) + 'static,
        C: FnMut() + 'static,
    {
        self.subscribe(FnObserver::new(next, error, completed))
    }

    /// Incrementally decodes the emitted byte chunks into records
    /// using the given decoder.
    ///
    /// See [`Unmarshal`].
    fn unmarshal<D>(self, decoder: D) -> Unmarshal<Self, D>
    where
        Self: Sized,
        Self::Item: AsRef<[u8]>,
        D: Decoder + Clone + 'static,
    {
        Unmarshal::new(self, decoder)
    }
}

/// Something that can be torn down by a [`Subscription`].
pub(crate) trait Teardown {
    fn cancel(&self);
    fn is_closed(&self) -> bool;
}

/// Handle on an active attachment between an observer and an
/// observable.
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<dyn Teardown>,
}

impl Subscription {
    pub(crate) fn new(inner: Rc<dyn Teardown>) -> Self {
        Self { inner }
    }

    /// Stops the delivery of events.
    ///
    /// Once this function returns, the observer will not be called
    /// anymore. Calling it from inside an observer callback is
    /// allowed, and calling it more than once is a no-op.
    pub fn cancel(&self) {
        self.inner.cancel()
    }

    /// Returns `true` if the subscription has been cancelled or if
    /// the observable reached a terminal event.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Observer recording every notification it receives.
#[cfg(test)]
pub(crate) fn recorder<T: 'static, E: 'static>() -> (
    Rc<std::cell::RefCell<Vec<Notification<T, E>>>>,
    impl Observer<T, E> + 'static,
) {
    let log = Rc::new(std::cell::RefCell::new(Vec::<Notification<T, E>>::new()));
    let (next, error, completed) = (log.clone(), log.clone(), log.clone());

    let observer = FnObserver::new(
        move |item: T| next.borrow_mut().push(Notification::Next(item)),
        move |err: E| error.borrow_mut().push(Notification::Error(err)),
        move || completed.borrow_mut().push(Notification::Completed),
    );

    (log, observer)
}
