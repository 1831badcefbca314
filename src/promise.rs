//! The deferred value itself: state machine, reaction queues, and `then`.

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use log::trace;

use crate::resolve::resolve_value;
use crate::scheduler::SchedulerRef;
use crate::value::{Outcome, Value};

/// Snapshot of a promise's lifecycle stage. The transition out of
/// `Pending` happens exactly once and is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

/// A reaction handler. `Ok` feeds the resolution procedure, `Err` rejects
/// the child promise — the Rust rendition of a handler that throws.
pub type Handler = Box<dyn FnOnce(Value) -> Result<Value, Value> + Send>;

/// A queued reaction: invoked once with the settled value or reason at
/// flush time, it schedules the guarded handler run.
type Reaction = Box<dyn FnOnce(Value) + Send>;

enum State {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

struct Inner {
    state: State,
    fulfill_reactions: Vec<Reaction>,
    reject_reactions: Vec<Reaction>,
    wakers: Vec<Waker>,
    scheduler: SchedulerRef,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A shared handle on an eventual value. Cloning shares the underlying
/// state; the promise is dropped with its last handle.
#[derive(Clone)]
pub struct Promise {
    id: u64,
    inner: Arc<Mutex<Inner>>,
}

impl Promise {
    /// Creates a promise and synchronously runs `executor` with the two
    /// settlement capabilities. An `Err` return rejects the promise with
    /// that reason, unless the executor already settled it.
    pub fn new<F>(scheduler: SchedulerRef, executor: F) -> Promise
    where
        F: FnOnce(Resolver, Rejecter) -> Result<(), Value>,
    {
        let promise = Promise::pending(scheduler);
        let resolver = Resolver {
            promise: promise.clone(),
        };
        let rejecter = Rejecter {
            promise: promise.clone(),
        };
        if let Err(reason) = executor(resolver, rejecter) {
            promise.settle_rejected(reason);
        }
        promise
    }

    pub(crate) fn pending(scheduler: SchedulerRef) -> Promise {
        Promise {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(Mutex::new(Inner {
                state: State::Pending,
                fulfill_reactions: Vec::new(),
                reject_reactions: Vec::new(),
                wakers: Vec::new(),
                scheduler,
            })),
        }
    }

    pub fn status(&self) -> Status {
        match self.inner.lock().unwrap().state {
            State::Pending => Status::Pending,
            State::Fulfilled(_) => Status::Fulfilled,
            State::Rejected(_) => Status::Rejected,
        }
    }

    /// How the promise settled, or `None` while still pending.
    pub fn outcome(&self) -> Option<Outcome> {
        match &self.inner.lock().unwrap().state {
            State::Pending => None,
            State::Fulfilled(value) => Some(Outcome::Fulfilled(value.clone())),
            State::Rejected(reason) => Some(Outcome::Rejected(reason.clone())),
        }
    }

    pub(crate) fn ptr_eq(&self, other: &Promise) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn scheduler(&self) -> SchedulerRef {
        self.inner.lock().unwrap().scheduler.clone()
    }

    /// Registers reactions and returns the child promise whose settlement
    /// is derived from the handler's outcome.
    ///
    /// A missing `on_fulfilled` passes the value through; a missing
    /// `on_rejected` rethrows the reason. Handlers never run inside this
    /// call: the parent being already settled only means the handler run
    /// is scheduled immediately rather than queued.
    pub fn then(&self, on_fulfilled: Option<Handler>, on_rejected: Option<Handler>) -> Promise {
        let on_fulfilled = on_fulfilled.unwrap_or_else(|| Box::new(Ok));
        let on_rejected = on_rejected.unwrap_or_else(|| Box::new(Err));

        let scheduler = self.scheduler();
        let child = Promise::pending(scheduler.clone());

        let settled = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            match &inner.state {
                State::Pending => {
                    inner.fulfill_reactions.push(make_reaction(
                        scheduler.clone(),
                        child.clone(),
                        on_fulfilled,
                    ));
                    inner.reject_reactions.push(make_reaction(
                        scheduler.clone(),
                        child.clone(),
                        on_rejected,
                    ));
                    None
                }
                State::Fulfilled(value) => Some((on_fulfilled, value.clone())),
                State::Rejected(reason) => Some((on_rejected, reason.clone())),
            }
        };
        if let Some((handler, input)) = settled {
            schedule_handler(&scheduler, child.clone(), handler, input);
        }
        child
    }

    /// `then(None, Some(on_rejected))`.
    pub fn catch(&self, on_rejected: Handler) -> Promise {
        self.then(None, Some(on_rejected))
    }

    /// `then(f, f)`: runs `f` on either outcome.
    ///
    /// Note that, matching the behavior this crate reimplements, the
    /// callback's return value becomes the child's resolution — the
    /// original value or reason is NOT forwarded downstream.
    pub fn finally<F>(&self, f: F) -> Promise
    where
        F: Fn(Value) -> Result<Value, Value> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let g = f.clone();
        self.then(
            Some(Box::new(move |value| f(value))),
            Some(Box::new(move |reason| g(reason))),
        )
    }

    /// First settlement wins; anything after the transition is a no-op.
    pub(crate) fn settle_fulfilled(&self, value: Value) {
        let (reactions, wakers) = {
            let mut inner = self.inner.lock().unwrap();
            if !matches!(inner.state, State::Pending) {
                return;
            }
            inner.state = State::Fulfilled(value.clone());
            inner.reject_reactions.clear();
            (
                mem::take(&mut inner.fulfill_reactions),
                mem::take(&mut inner.wakers),
            )
        };
        trace!(
            "promise {} fulfilled, flushing {} reactions",
            self.id,
            reactions.len()
        );
        for reaction in reactions {
            reaction(value.clone());
        }
        for waker in wakers {
            waker.wake();
        }
    }

    pub(crate) fn settle_rejected(&self, reason: Value) {
        let (reactions, wakers) = {
            let mut inner = self.inner.lock().unwrap();
            if !matches!(inner.state, State::Pending) {
                return;
            }
            inner.state = State::Rejected(reason.clone());
            inner.fulfill_reactions.clear();
            (
                mem::take(&mut inner.reject_reactions),
                mem::take(&mut inner.wakers),
            )
        };
        trace!(
            "promise {} rejected, flushing {} reactions",
            self.id,
            reactions.len()
        );
        for reaction in reactions {
            reaction(reason.clone());
        }
        for waker in wakers {
            waker.wake();
        }
    }
}

/// Wraps a handler into a queued reaction: at flush time it schedules the
/// guarded handler run with the value captured then.
fn make_reaction(scheduler: SchedulerRef, child: Promise, handler: Handler) -> Reaction {
    Box::new(move |input| schedule_handler(&scheduler, child, handler, input))
}

fn schedule_handler(scheduler: &SchedulerRef, child: Promise, handler: Handler, input: Value) {
    scheduler.schedule(Box::new(move || match handler(input) {
        Ok(x) => resolve_value(&child, x),
        Err(reason) => child.settle_rejected(reason),
    }));
}

/// The fulfillment capability handed to executors and exposed by
/// [`Deferred`](crate::Deferred).
#[derive(Clone)]
pub struct Resolver {
    promise: Promise,
}

impl Resolver {
    pub fn call(&self, value: impl Into<Value>) {
        self.promise.settle_fulfilled(value.into());
    }
}

/// The rejection capability, symmetric to [`Resolver`].
#[derive(Clone)]
pub struct Rejecter {
    promise: Promise,
}

impl Rejecter {
    pub fn call(&self, reason: impl Into<Value>) {
        self.promise.settle_rejected(reason.into());
    }
}

impl Future for Promise {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome> {
        let mut inner = self.inner.lock().unwrap();
        match &inner.state {
            State::Pending => {
                // Every clone may be awaited from a different task, so keep
                // them all rather than the latest.
                inner.wakers.push(cx.waker().clone());
                Poll::Pending
            }
            State::Fulfilled(value) => Poll::Ready(Outcome::Fulfilled(value.clone())),
            State::Rejected(reason) => Poll::Ready(Outcome::Rejected(reason.clone())),
        }
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Promise#{}({:?})", self.id, self.status())
    }
}
