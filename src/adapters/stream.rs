//! Adapter turning a callback-based [`Source`] into a cold,
//! single-subscriber [`Observable`].

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::{Rc, Weak},
};

use log::{debug, trace, warn};

use crate::{
    observable::{Notification, Observable, Observer, SubscribeError, Subscription, Teardown},
    source::Source,
};

/// Options tuning the adapter flow control.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AdapterOptions {
    /// Pauses the source while the observer processes an item, then
    /// resumes it. Only effective on sources with flow control.
    pub pause_while_delivering: bool,

    /// Amount of queued events above which a warning is logged and
    /// the source paused (if it supports it) until the queue drains.
    ///
    /// Events are only queued when the source emits from inside an
    /// observer callback.
    pub high_water_mark: usize,
}

impl AdapterOptions {
    /// The default high water mark.
    pub const DEFAULT_HIGH_WATER_MARK: usize = 1024;
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            pause_while_delivering: false,
            high_water_mark: Self::DEFAULT_HIGH_WATER_MARK,
        }
    }
}

/// Lifecycle of a [`StreamAdapter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdapterState {
    /// Never subscribed.
    Idle,
    /// A subscription is active.
    Active,
    /// The source ended.
    Completed,
    /// The source failed.
    Errored,
    /// The subscription was cancelled.
    Cancelled,
}

/// Cold, single-subscriber observable over a [`Source`].
///
/// Neither the adapter nor its subscription own the source: the
/// caller does. Once the caller drops it, the handlers registered on
/// it and the subscription state go with it.
///
/// An adapter can be subscribed once. Subscribing while the
/// subscription is active fails with
/// [`SubscribeError::AlreadySubscribed`], subscribing after it ended
/// (whatever the reason) fails with
/// [`SubscribeError::SourceUnavailable`]. To retry, create a new
/// adapter over a fresh source.
pub struct StreamAdapter<S> {
    source: Weak<S>,
    options: AdapterOptions,
    state: Rc<Cell<AdapterState>>,
}

impl<S: Source> StreamAdapter<S> {
    /// Creates a new adapter with default [`AdapterOptions`].
    pub fn new(source: &Rc<S>) -> Self {
        Self::with_options(source, AdapterOptions::default())
    }

    /// Creates a new adapter with the given options.
    pub fn with_options(source: &Rc<S>, options: AdapterOptions) -> Self {
        Self {
            source: Rc::downgrade(source),
            options,
            state: Rc::new(Cell::new(AdapterState::Idle)),
        }
    }

    /// Returns the lifecycle state of the adapter.
    pub fn state(&self) -> AdapterState {
        self.state.get()
    }
}

impl<S> fmt::Debug for StreamAdapter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAdapter")
            .field("options", &self.options)
            .field("state", &self.state.get())
            .finish()
    }
}

impl<S> Observable for StreamAdapter<S>
where
    S: Source + 'static,
    S::Item: 'static,
    S::Error: 'static,
{
    type Item = S::Item;
    type Error = S::Error;

    fn subscribe<O>(&self, observer: O) -> Result<Subscription, SubscribeError>
    where
        O: Observer<S::Item, S::Error> + 'static,
    {
        match self.state.get() {
            AdapterState::Idle => (),
            AdapterState::Active => return Err(SubscribeError::AlreadySubscribed),
            state => {
                debug!("cannot subscribe again to adapter in {state:?} state");
                return Err(SubscribeError::SourceUnavailable);
            }
        }

        let Some(source) = self.source.upgrade() else {
            debug!("cannot subscribe, source dropped");
            return Err(SubscribeError::SourceUnavailable);
        };

        if source.is_closed() {
            debug!("cannot subscribe, source already closed");
            return Err(SubscribeError::SourceUnavailable);
        }

        debug!("subscribe to source");
        self.state.set(AdapterState::Active);

        let shared = Rc::new(Shared {
            source: RefCell::new(Some(Rc::downgrade(&source))),
            observer: RefCell::new(Some(Box::new(observer))),
            queue: RefCell::new(VecDeque::new()),
            state: self.state.clone(),
            terminating: Cell::new(false),
            throttled: Cell::new(false),
            warned: Cell::new(false),
            options: self.options.clone(),
        });

        // buffered events are only flushed once every handler is
        // registered
        let flow = source.flow_control();
        if let Some(flow) = flow {
            flow.pause();
        }

        let s = shared.clone();
        source.data_handler(Some(Rc::new(move |item| s.push(Notification::Next(item)))));
        let s = shared.clone();
        source.end_handler(Some(Rc::new(move || s.push(Notification::Completed))));
        let s = shared.clone();
        source.error_handler(Some(Rc::new(move |err| s.push(Notification::Error(err)))));

        if let Some(flow) = flow {
            trace!("resume source");
            flow.resume();
        }

        Ok(Subscription::new(shared))
    }
}

/// State of one subscription, shared between the handlers registered
/// on the source and the [`Subscription`].
///
/// The handlers keep it alive until they get unregistered, which
/// happens on terminal event or cancellation.
struct Shared<S: Source> {
    /// Released on detach. Weak, the source owns the handlers which
    /// own this state.
    source: RefCell<Option<Weak<S>>>,
    /// Borrowed while delivering, released on termination.
    observer: RefCell<Option<Box<dyn Observer<S::Item, S::Error>>>>,
    /// Events waiting for the observer to be available.
    queue: RefCell<VecDeque<Notification<S::Item, S::Error>>>,
    state: Rc<Cell<AdapterState>>,
    /// A terminal event has been queued.
    terminating: Cell<bool>,
    /// The source is paused because the queue reached the high water
    /// mark.
    throttled: Cell<bool>,
    warned: Cell<bool>,
    options: AdapterOptions,
}

impl<S: Source> Shared<S> {
    fn is_active(&self) -> bool {
        self.state.get() == AdapterState::Active
    }

    fn source(&self) -> Option<Rc<S>> {
        self.source.borrow().as_ref().and_then(Weak::upgrade)
    }

    fn pause_source(&self) {
        if let Some(source) = self.source() {
            if let Some(flow) = source.flow_control() {
                flow.pause();
            }
        }
    }

    fn resume_source(&self) {
        if let Some(source) = self.source() {
            if let Some(flow) = source.flow_control() {
                flow.resume();
            }
        }
    }

    /// Unregisters all handlers from the source and releases it.
    fn detach(&self) {
        let source = self.source.borrow_mut().take();
        let Some(source) = source.as_ref().and_then(Weak::upgrade) else {
            return;
        };

        trace!("unregister source handlers");
        source.data_handler(None);
        source.end_handler(None);
        source.error_handler(None);
    }

    /// Entry point of the source handlers.
    fn push(&self, event: Notification<S::Item, S::Error>) {
        if !self.is_active() || self.terminating.get() {
            warn!("source emitted {} after termination, ignore it", event.kind());
            return;
        }

        if event.is_terminal() {
            self.terminating.set(true);
        }

        let queued = {
            let mut queue = self.queue.borrow_mut();
            queue.push_back(event);
            queue.len()
        };

        if queued > self.options.high_water_mark {
            self.throttle(queued);
        }

        self.drain();
    }

    fn throttle(&self, queued: usize) {
        if !self.warned.replace(true) {
            let hwm = self.options.high_water_mark;
            warn!("{queued} queued events exceed the high water mark of {hwm}");
        }

        let Some(source) = self.source() else {
            return;
        };

        if let Some(flow) = source.flow_control() {
            if !self.throttled.replace(true) {
                debug!("pause source until the queue drains");
                flow.pause();
            }
        }
    }

    /// Delivers queued events to the observer.
    ///
    /// If the observer is already borrowed, this is a re-entrant call
    /// made from inside an observer callback: the event stays queued
    /// and the outer call delivers it once the callback returns.
    fn drain(&self) {
        loop {
            {
                let Ok(mut observer) = self.observer.try_borrow_mut() else {
                    trace!("observer busy, event queued");
                    return;
                };

                if let Some(inner) = observer.as_mut() {
                    self.deliver(&mut **inner);
                }

                if !self.is_active() {
                    self.queue.borrow_mut().clear();
                    *observer = None;
                    return;
                }
            }

            if !self.throttled.replace(false) {
                return;
            }

            debug!("queue drained, resume source");
            self.resume_source();

            if self.queue.borrow().is_empty() {
                return;
            }
        }
    }

    fn deliver(&self, observer: &mut dyn Observer<S::Item, S::Error>) {
        while self.is_active() {
            let Some(event) = self.queue.borrow_mut().pop_front() else {
                break;
            };

            match event {
                Notification::Next(item) => {
                    let pause = self.options.pause_while_delivering;
                    if pause {
                        self.pause_source();
                    }

                    trace!("deliver next item");
                    observer.on_next(item);

                    if pause && self.is_active() && !self.throttled.get() {
                        self.resume_source();
                    }
                }
                Notification::Completed => {
                    debug!("source completed");
                    self.state.set(AdapterState::Completed);
                    self.detach();
                    observer.on_completed();
                }
                Notification::Error(err) => {
                    debug!("source failed");
                    self.state.set(AdapterState::Errored);
                    self.detach();
                    observer.on_error(err);
                }
            }
        }
    }
}

impl<S: Source> Teardown for Shared<S> {
    fn cancel(&self) {
        if !self.is_active() {
            trace!("subscription already closed, nothing to cancel");
            return;
        }

        debug!("cancel subscription");
        self.state.set(AdapterState::Cancelled);
        self.pause_source();
        self.detach();
        self.queue.borrow_mut().clear();

        // when cancelled from inside a callback, the observer is
        // released by the delivery loop instead
        if let Ok(mut observer) = self.observer.try_borrow_mut() {
            *observer = None;
        }
    }

    fn is_closed(&self) -> bool {
        !self.is_active()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use crate::{
        emitter::{Emitter, OneShot},
        observable::{recorder, Notification, Observable, SubscribeError, Subscription},
        source::{DataHandler, EndHandler, ErrorHandler, FlowControl, Source},
    };

    use super::{AdapterOptions, AdapterState, StreamAdapter};

    /// Source ignoring unregistrations, to simulate a source that
    /// keeps emitting after it should have stopped.
    #[derive(Default)]
    struct StickySource {
        data: RefCell<Option<DataHandler<u32>>>,
        end: RefCell<Option<EndHandler>>,
        error: RefCell<Option<ErrorHandler<String>>>,
    }

    impl StickySource {
        fn emit(&self, n: u32) {
            let handler = self.data.borrow().clone();
            if let Some(handler) = handler {
                handler(n)
            }
        }

        fn end(&self) {
            let handler = self.end.borrow().clone();
            if let Some(handler) = handler {
                handler()
            }
        }

        fn fail(&self, err: &str) {
            let handler = self.error.borrow().clone();
            if let Some(handler) = handler {
                handler(err.to_owned())
            }
        }
    }

    impl Source for StickySource {
        type Item = u32;
        type Error = String;

        fn data_handler(&self, handler: Option<DataHandler<u32>>) {
            if handler.is_some() {
                *self.data.borrow_mut() = handler;
            }
        }

        fn end_handler(&self, handler: Option<EndHandler>) {
            if handler.is_some() {
                *self.end.borrow_mut() = handler;
            }
        }

        fn error_handler(&self, handler: Option<ErrorHandler<String>>) {
            if handler.is_some() {
                *self.error.borrow_mut() = handler;
            }
        }
    }

    #[test]
    fn items_then_completed() {
        let _ = env_logger::try_init();

        let source = Rc::new(Emitter::<u32, String>::new());
        let adapter = StreamAdapter::new(&source);
        let (log, observer) = recorder::<u32, String>();

        let sub = adapter.subscribe(observer).unwrap();

        for n in 0..5 {
            source.emit(n);
        }
        source.end();

        let expected: Vec<Notification<u32, String>> = (0..5)
            .map(Notification::Next)
            .chain([Notification::Completed])
            .collect();

        assert_eq!(*log.borrow(), expected);
        assert!(sub.is_closed());
        assert_eq!(adapter.state(), AdapterState::Completed);
    }

    #[test]
    fn items_then_error() {
        let _ = env_logger::try_init();

        let source = Rc::new(StickySource::default());
        let adapter = StreamAdapter::new(&source);
        let (log, observer) = recorder::<u32, String>();

        adapter.subscribe(observer).unwrap();

        source.emit(1);
        source.emit(2);
        source.fail("boom");
        source.emit(3);
        source.end();
        source.fail("boom again");

        assert_eq!(
            *log.borrow(),
            [
                Notification::Next(1),
                Notification::Next(2),
                Notification::Error("boom".to_owned()),
            ]
        );
        assert_eq!(adapter.state(), AdapterState::Errored);
    }

    #[test]
    fn cancel_from_next() {
        let _ = env_logger::try_init();

        let source = Rc::new(StickySource::default());
        let adapter = StreamAdapter::new(&source);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::default();
        let terminal = Rc::new(Cell::new(0));

        let (s, sl) = (seen.clone(), slot.clone());
        let (t1, t2) = (terminal.clone(), terminal.clone());
        let sub = adapter
            .subscribe_with(
                move |n| {
                    s.borrow_mut().push(n);
                    if n == 2 {
                        if let Some(sub) = sl.borrow().as_ref() {
                            sub.cancel();
                            sub.cancel();
                        }
                    }
                },
                move |_| t1.set(t1.get() + 1),
                move || t2.set(t2.get() + 1),
            )
            .unwrap();
        *slot.borrow_mut() = Some(sub.clone());

        for n in 1..=4 {
            source.emit(n);
        }
        source.fail("late");
        source.end();

        assert_eq!(*seen.borrow(), [1, 2]);
        assert_eq!(terminal.get(), 0);
        assert!(sub.is_closed());
        assert_eq!(adapter.state(), AdapterState::Cancelled);
    }

    #[test]
    fn cancel_pauses_and_detaches() {
        let _ = env_logger::try_init();

        let source = Rc::new(Emitter::<u32, String>::paused());
        let adapter = StreamAdapter::new(&source);
        let (log, observer) = recorder::<u32, String>();

        let sub = adapter.subscribe(observer).unwrap();
        assert!(!source.is_paused());

        source.emit(1);
        sub.cancel();
        assert!(source.is_paused());

        source.emit(2);
        source.resume();
        assert_eq!(*log.borrow(), [Notification::Next(1)]);
        // no handler anymore, the item stays in the emitter
        assert_eq!(source.buffered(), 1);
    }

    #[test]
    fn subscribe_twice() {
        let _ = env_logger::try_init();

        let source = Rc::new(Emitter::<u32, String>::new());
        let adapter = StreamAdapter::new(&source);

        let sub = adapter.subscribe_with(|_| (), |_| (), || ()).unwrap();
        let err = adapter.subscribe_with(|_| (), |_| (), || ()).unwrap_err();
        assert_eq!(err, SubscribeError::AlreadySubscribed);

        sub.cancel();
        let err = adapter.subscribe_with(|_| (), |_| (), || ()).unwrap_err();
        assert_eq!(err, SubscribeError::SourceUnavailable);
    }

    #[test]
    fn source_unavailable() {
        let _ = env_logger::try_init();

        let source = Rc::new(Emitter::<u32, String>::new());
        let adapter = StreamAdapter::new(&source);
        drop(source);
        let err = adapter.subscribe_with(|_| (), |_| (), || ()).unwrap_err();
        assert_eq!(err, SubscribeError::SourceUnavailable);

        let source = Rc::new(Emitter::<u32, String>::new());
        let first = StreamAdapter::new(&source);
        first.subscribe_with(|_| (), |_| (), || ()).unwrap();
        source.end();

        let second = StreamAdapter::new(&source);
        let err = second.subscribe_with(|_| (), |_| (), || ()).unwrap_err();
        assert_eq!(err, SubscribeError::SourceUnavailable);
    }

    #[test]
    fn dropped_source_releases_subscription() {
        let _ = env_logger::try_init();

        let source = Rc::new(Emitter::<u32, String>::new());
        let weak = Rc::downgrade(&source);
        let adapter = StreamAdapter::new(&source);

        let token = Rc::new(());
        let t = token.clone();
        let sub = adapter
            .subscribe_with(
                move |_: u32| {
                    let _ = &t;
                },
                |_| (),
                || (),
            )
            .unwrap();

        source.emit(1);
        drop(sub);
        drop(source);

        assert!(weak.upgrade().is_none());
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn buffered_source_flushed_on_subscribe() {
        let _ = env_logger::try_init();

        let source = Rc::new(Emitter::<u32, String>::paused());
        source.emit(1);
        source.emit(2);
        source.end();

        let adapter = StreamAdapter::new(&source);
        let (log, observer) = recorder::<u32, String>();
        let sub = adapter.subscribe(observer).unwrap();

        assert_eq!(
            *log.borrow(),
            [
                Notification::Next(1),
                Notification::Next(2),
                Notification::Completed,
            ]
        );
        assert!(sub.is_closed());
    }

    #[test]
    fn reentrant_emissions_keep_order() {
        let _ = env_logger::try_init();

        let source = Rc::new(StickySource::default());
        let adapter = StreamAdapter::new(&source);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let (s, src) = (seen.clone(), Rc::downgrade(&source));
        adapter
            .subscribe_with(
                move |n| {
                    s.borrow_mut().push(n);
                    if n == 1 {
                        if let Some(src) = src.upgrade() {
                            src.emit(2);
                            src.emit(3);
                        }
                    }
                },
                |_| (),
                || (),
            )
            .unwrap();

        source.emit(1);
        source.emit(4);

        assert_eq!(*seen.borrow(), [1, 2, 3, 4]);
    }

    #[test]
    fn high_water_mark_pauses_source() {
        let _ = env_logger::try_init();

        let source = Rc::new(Emitter::<u32, String>::new());
        let options = AdapterOptions {
            high_water_mark: 1,
            ..Default::default()
        };
        let adapter = StreamAdapter::with_options(&source, options);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let paused = Rc::new(Cell::new(false));
        let (s, p, src) = (seen.clone(), paused.clone(), Rc::downgrade(&source));
        adapter
            .subscribe_with(
                move |n| {
                    s.borrow_mut().push(n);
                    if n == 0 {
                        if let Some(src) = src.upgrade() {
                            src.emit(1);
                            src.emit(2);
                            src.emit(3);
                            p.set(src.is_paused());
                        }
                    }
                },
                |_| (),
                || (),
            )
            .unwrap();

        source.emit(0);

        assert!(paused.get());
        assert!(!source.is_paused());
        assert_eq!(*seen.borrow(), [0, 1, 2, 3]);
    }

    #[test]
    fn pause_while_delivering() {
        let _ = env_logger::try_init();

        let source = Rc::new(Emitter::<u32, String>::new());
        let options = AdapterOptions {
            pause_while_delivering: true,
            ..Default::default()
        };
        let adapter = StreamAdapter::with_options(&source, options);

        let paused = Rc::new(RefCell::new(Vec::new()));
        let (p, src) = (paused.clone(), Rc::downgrade(&source));
        adapter
            .subscribe_with(
                move |_| {
                    if let Some(src) = src.upgrade() {
                        p.borrow_mut().push(src.is_paused());
                    }
                },
                |_| (),
                || (),
            )
            .unwrap();

        source.emit(1);
        source.emit(2);

        assert_eq!(*paused.borrow(), [true, true]);
        assert!(!source.is_paused());
    }

    #[test]
    fn one_shot_source() {
        let _ = env_logger::try_init();

        let source = Rc::new(OneShot::<u32, String>::new());
        let adapter = StreamAdapter::new(&source);
        let (log, observer) = recorder::<u32, String>();

        adapter.subscribe(observer).unwrap();
        assert!(log.borrow().is_empty());

        source.complete(Ok(1234));
        source.complete(Err("late".to_owned()));

        assert_eq!(
            *log.borrow(),
            [Notification::Next(1234), Notification::Completed]
        );

        let failed = Rc::new(OneShot::<u32, String>::new());
        let adapter = StreamAdapter::new(&failed);
        let (log, observer) = recorder::<u32, String>();

        failed.complete(Err("cannot listen".to_owned()));
        adapter.subscribe(observer).unwrap();

        assert_eq!(
            *log.borrow(),
            [Notification::Error("cannot listen".to_owned())]
        );
    }
}
