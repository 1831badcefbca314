//! Promise/A+ deferred values for Rust.
//!
//! A [`Promise`] is the eventual result of an asynchronous operation: it is
//! exactly one of pending, fulfilled, or rejected, and settles at most once.
//! Reactions registered with [`Promise::then`] never run in the same
//! synchronous turn that registered them; they are deferred through an
//! injected [`Scheduler`], so a deterministic queue can drive the whole
//! machine in tests while a worker thread drives it in real programs.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use promise_aplus::{Promise, QueueScheduler, Outcome, Value};
//!
//! let scheduler = Arc::new(QueueScheduler::new());
//! let doubled = Promise::resolve(scheduler.clone(), Value::Int(21))
//!     .then(Some(Box::new(|v| match v {
//!         Value::Int(n) => Ok(Value::Int(n * 2)),
//!         other => Ok(other),
//!     })), None);
//!
//! scheduler.run_until_idle();
//! assert_eq!(doubled.outcome(), Some(Outcome::Fulfilled(Value::Int(42))));
//! ```

mod combinators;
mod promise;
mod resolve;
pub mod scheduler;
pub mod value;

pub use combinators::Deferred;
pub use promise::{Handler, Promise, Rejecter, Resolver, Status};
pub use scheduler::{Job, QueueScheduler, Scheduler, SchedulerRef, ThreadScheduler};
pub use value::{Outcome, Thenable, ThenCallback, Value};

/// Errors raised by the library itself. Everything else a promise rejects
/// with is an arbitrary [`Value`] supplied by executors, handlers, or
/// foreign thenables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A handler resolved a promise with that same promise.
    #[error("chaining cycle detected for promise")]
    ChainingCycle,
}
