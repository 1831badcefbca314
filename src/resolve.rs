//! The resolution procedure: unwraps a handler's return value, recursively,
//! into the target promise's eventual settlement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;

use crate::promise::{Handler, Promise};
use crate::value::{ThenCallback, Value};
use crate::Error;

/// Settles `promise` from the candidate outcome `x`.
///
/// Plain values fulfill directly. Thenables — our own promises included —
/// are adopted by invoking their `then` with a pair of callbacks sharing a
/// once-guard, so that no matter how often or in what order a foreign
/// implementation fires them, `promise` settles at most once.
pub(crate) fn resolve_value(promise: &Promise, x: Value) {
    match x {
        Value::Promise(other) => {
            if other.ptr_eq(promise) {
                trace!("rejecting {promise:?}: resolved with itself");
                promise.settle_rejected(Error::ChainingCycle.into());
                return;
            }
            let called = Arc::new(AtomicBool::new(false));
            let target = promise.clone();
            let on_fulfilled: Handler = {
                let called = called.clone();
                let target = target.clone();
                Box::new(move |y| {
                    if !called.swap(true, Ordering::SeqCst) {
                        resolve_value(&target, y);
                    }
                    Ok(Value::Undefined)
                })
            };
            let on_rejected: Handler = Box::new(move |reason| {
                if !called.swap(true, Ordering::SeqCst) {
                    target.settle_rejected(reason);
                }
                Ok(Value::Undefined)
            });
            // The throwaway child promise `then` creates is dropped; only
            // the piping into `promise` matters.
            other.then(Some(on_fulfilled), Some(on_rejected));
        }
        Value::Thenable(thenable) => {
            let called = Arc::new(AtomicBool::new(false));
            let target = promise.clone();
            let resolve_cb: ThenCallback = {
                let called = called.clone();
                let target = target.clone();
                Box::new(move |y| {
                    if !called.swap(true, Ordering::SeqCst) {
                        resolve_value(&target, y);
                    }
                })
            };
            let reject_cb: ThenCallback = {
                let called = called.clone();
                let target = target.clone();
                Box::new(move |reason| {
                    if !called.swap(true, Ordering::SeqCst) {
                        target.settle_rejected(reason);
                    }
                })
            };
            if let Err(reason) = thenable.then(resolve_cb, reject_cb) {
                // A `then` that throws after one of its callbacks already
                // fired must not unsettle the earlier signal.
                if !called.swap(true, Ordering::SeqCst) {
                    promise.settle_rejected(reason);
                }
            }
        }
        plain => promise.settle_fulfilled(plain),
    }
}
