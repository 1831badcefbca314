//! Static constructors built purely on the public contract: the executor
//! capabilities plus `then`.

use std::sync::{Arc, Mutex};

use crate::promise::{Handler, Promise, Rejecter, Resolver};
use crate::scheduler::SchedulerRef;
use crate::value::{Outcome, Value};

/// The settlement capabilities of a promise, captured outside its
/// constructor. Decouples the producer of a value from whoever holds the
/// promise, and lets conformance harnesses drive settlement externally.
#[derive(Clone)]
pub struct Deferred {
    pub promise: Promise,
    pub resolve: Resolver,
    pub reject: Rejecter,
}

/// Accumulator shared by the reactions `all` and `all_settled` attach to
/// their inputs.
struct Join {
    slots: Vec<Option<Value>>,
    remaining: usize,
}

impl Promise {
    /// A promise already fulfilled with `value`. A thenable `value` is
    /// stored as-is; unwrapping happens when a handler's return feeds the
    /// resolution procedure, not at settlement.
    pub fn resolve(scheduler: SchedulerRef, value: impl Into<Value>) -> Promise {
        let value = value.into();
        Promise::new(scheduler, move |resolve, _reject| {
            resolve.call(value);
            Ok(())
        })
    }

    /// A promise already rejected with `reason`.
    pub fn reject(scheduler: SchedulerRef, reason: impl Into<Value>) -> Promise {
        let reason = reason.into();
        Promise::new(scheduler, move |_resolve, reject| {
            reject.call(reason);
            Ok(())
        })
    }

    /// A pending promise with its settlement capabilities exposed.
    pub fn deferred(scheduler: SchedulerRef) -> Deferred {
        let slot = Arc::new(Mutex::new(None));
        let captured = slot.clone();
        let promise = Promise::new(scheduler, move |resolve, reject| {
            *captured.lock().unwrap() = Some((resolve, reject));
            Ok(())
        });
        // The executor ran synchronously, so the capabilities are in place.
        let (resolve, reject) = slot.lock().unwrap().take().unwrap();
        Deferred {
            promise,
            resolve,
            reject,
        }
    }

    /// Fulfills with every input's value, in input order, once all of them
    /// fulfill; rejects with the first rejection reason observed. An empty
    /// input fulfills immediately with an empty list.
    pub fn all(scheduler: SchedulerRef, inputs: Vec<Promise>) -> Promise {
        Promise::new(scheduler, move |resolve, reject| {
            if inputs.is_empty() {
                resolve.call(Value::List(Vec::new()));
                return Ok(());
            }
            let join = Arc::new(Mutex::new(Join {
                slots: vec![None; inputs.len()],
                remaining: inputs.len(),
            }));
            for (index, input) in inputs.iter().enumerate() {
                let on_fulfilled: Handler = {
                    let join = join.clone();
                    let resolve = resolve.clone();
                    Box::new(move |value| {
                        fill_slot(&join, &resolve, index, value);
                        Ok(Value::Undefined)
                    })
                };
                let on_rejected: Handler = {
                    let reject = reject.clone();
                    Box::new(move |reason| {
                        // First rejection wins; the settlement guard makes
                        // later ones no-ops.
                        reject.call(reason);
                        Ok(Value::Undefined)
                    })
                };
                input.then(Some(on_fulfilled), Some(on_rejected));
            }
            Ok(())
        })
    }

    /// Adopts the outcome of whichever input settles first. An empty input
    /// stays pending forever.
    pub fn race(scheduler: SchedulerRef, inputs: Vec<Promise>) -> Promise {
        Promise::new(scheduler, move |resolve, reject| {
            for input in &inputs {
                let resolve = resolve.clone();
                let reject = reject.clone();
                input.then(
                    Some(Box::new(move |value| {
                        resolve.call(value);
                        Ok(Value::Undefined)
                    })),
                    Some(Box::new(move |reason| {
                        reject.call(reason);
                        Ok(Value::Undefined)
                    })),
                );
            }
            Ok(())
        })
    }

    /// Always fulfills, with one [`Outcome`] record per input in input
    /// order, once every input has settled either way.
    pub fn all_settled(scheduler: SchedulerRef, inputs: Vec<Promise>) -> Promise {
        Promise::new(scheduler, move |resolve, _reject| {
            if inputs.is_empty() {
                resolve.call(Value::List(Vec::new()));
                return Ok(());
            }
            let join = Arc::new(Mutex::new(Join {
                slots: vec![None; inputs.len()],
                remaining: inputs.len(),
            }));
            for (index, input) in inputs.iter().enumerate() {
                let on_fulfilled: Handler = {
                    let join = join.clone();
                    let resolve = resolve.clone();
                    Box::new(move |value| {
                        fill_slot(&join, &resolve, index, Outcome::Fulfilled(value).into());
                        Ok(Value::Undefined)
                    })
                };
                let on_rejected: Handler = {
                    let join = join.clone();
                    let resolve = resolve.clone();
                    Box::new(move |reason| {
                        fill_slot(&join, &resolve, index, Outcome::Rejected(reason).into());
                        Ok(Value::Undefined)
                    })
                };
                input.then(Some(on_fulfilled), Some(on_rejected));
            }
            Ok(())
        })
    }
}

/// Records one input's result; fulfills the joint promise once every slot
/// is filled.
fn fill_slot(join: &Mutex<Join>, resolve: &Resolver, index: usize, value: Value) {
    let mut join = join.lock().unwrap();
    if join.slots[index].is_none() {
        join.slots[index] = Some(value);
        join.remaining -= 1;
    }
    if join.remaining == 0 {
        let values = join
            .slots
            .iter_mut()
            .map(|slot| slot.take().unwrap_or(Value::Undefined))
            .collect();
        resolve.call(Value::List(values));
    }
}
