#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use futures::executor::block_on;
    use promise_aplus::{
        Error, Handler, Outcome, Promise, QueueScheduler, SchedulerRef, Status, Thenable,
        ThenCallback, ThreadScheduler, Value,
    };

    fn scheduler() -> Arc<QueueScheduler> {
        Arc::new(QueueScheduler::new())
    }

    fn fulfilled_with(promise: &Promise, expected: Value) {
        assert_eq!(promise.outcome(), Some(Outcome::Fulfilled(expected)));
    }

    fn rejected_with(promise: &Promise, expected: Value) {
        assert_eq!(promise.outcome(), Some(Outcome::Rejected(expected)));
    }

    #[test]
    fn first_settlement_wins() {
        let scheduler = scheduler();
        let deferred = Promise::deferred(scheduler.clone());
        deferred.resolve.call("first");
        deferred.reject.call("second");
        deferred.resolve.call("third");
        assert_eq!(deferred.promise.status(), Status::Fulfilled);
        fulfilled_with(&deferred.promise, Value::Str("first".into()));

        let deferred = Promise::deferred(scheduler);
        deferred.reject.call("boom");
        deferred.resolve.call("late");
        rejected_with(&deferred.promise, Value::Str("boom".into()));
    }

    #[test]
    fn then_returns_before_any_handler_runs() {
        let scheduler = scheduler();
        let ran = Arc::new(Mutex::new(false));
        let observed = ran.clone();
        let promise = Promise::resolve(scheduler.clone(), Value::Int(1));
        promise.then(
            Some(Box::new(move |value| {
                *observed.lock().unwrap() = true;
                Ok(value)
            })),
            None,
        );
        // The parent is already settled, yet the handler must not have run
        // in this synchronous turn.
        assert!(!*ran.lock().unwrap());
        scheduler.run_until_idle();
        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn pending_reactions_run_in_registration_order() {
        let scheduler = scheduler();
        let deferred = Promise::deferred(scheduler.clone());
        let order = Arc::new(Mutex::new(Vec::new()));
        for label in ["a", "b", "c"] {
            let order = order.clone();
            deferred.promise.then(
                Some(Box::new(move |value| {
                    order.lock().unwrap().push(label);
                    Ok(value)
                })),
                None,
            );
        }
        deferred.resolve.call(Value::Undefined);
        scheduler.run_until_idle();
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn missing_handlers_pass_the_outcome_through() {
        let scheduler = scheduler();
        let tail = Promise::resolve(scheduler.clone(), Value::Int(5))
            .then(None, None)
            .then(None, None);
        let failed = Promise::reject(scheduler.clone(), "e").then(None, None);
        scheduler.run_until_idle();
        fulfilled_with(&tail, Value::Int(5));
        rejected_with(&failed, Value::Str("e".into()));
    }

    #[test]
    fn handler_error_rejects_the_child() {
        let scheduler = scheduler();
        let child = Promise::resolve(scheduler.clone(), Value::Int(1))
            .then(Some(Box::new(|_| Err(Value::Str("handler blew up".into())))), None);
        scheduler.run_until_idle();
        rejected_with(&child, Value::Str("handler blew up".into()));
    }

    #[test]
    fn catch_recovers_from_rejection() {
        let scheduler = scheduler();
        let recovered = Promise::reject(scheduler.clone(), "e")
            .catch(Box::new(|_reason| Ok(Value::Int(0))))
            .then(None, None);
        scheduler.run_until_idle();
        fulfilled_with(&recovered, Value::Int(0));
    }

    #[test]
    fn handler_returning_a_promise_adopts_its_outcome() {
        let scheduler = scheduler();
        let inner = Promise::deferred(scheduler.clone());
        let inner_promise = inner.promise.clone();
        let child = Promise::resolve(scheduler.clone(), Value::Undefined)
            .then(Some(Box::new(move |_| Ok(Value::Promise(inner_promise)))), None);
        scheduler.run_until_idle();
        assert_eq!(child.status(), Status::Pending);
        inner.resolve.call(Value::Int(9));
        scheduler.run_until_idle();
        fulfilled_with(&child, Value::Int(9));
    }

    #[test]
    fn resolving_with_itself_rejects_with_a_cycle_error() {
        let scheduler = scheduler();
        let slot: Arc<Mutex<Option<Promise>>> = Arc::new(Mutex::new(None));
        let captured = slot.clone();
        let handler: Handler = Box::new(move |_| {
            let me = captured.lock().unwrap().clone().unwrap();
            Ok(Value::Promise(me))
        });
        let child = Promise::resolve(scheduler.clone(), Value::Int(1)).then(Some(handler), None);
        *slot.lock().unwrap() = Some(child.clone());
        scheduler.run_until_idle();
        rejected_with(&child, Value::from(Error::ChainingCycle));
    }

    /// A thenable that hands its value over asynchronously, one scheduler
    /// hop later.
    struct AsyncThenable {
        scheduler: SchedulerRef,
        value: Mutex<Option<Value>>,
    }

    impl Thenable for AsyncThenable {
        fn then(
            &self,
            on_fulfilled: ThenCallback,
            _on_rejected: ThenCallback,
        ) -> Result<(), Value> {
            let value = self.value.lock().unwrap().take().unwrap_or(Value::Undefined);
            self.scheduler.schedule(Box::new(move || on_fulfilled(value)));
            Ok(())
        }
    }

    #[test]
    fn nested_thenables_flatten_to_the_innermost_value() {
        let scheduler = scheduler();
        let inner = Arc::new(AsyncThenable {
            scheduler: scheduler.clone(),
            value: Mutex::new(Some(Value::Int(7))),
        });
        let outer = Arc::new(AsyncThenable {
            scheduler: scheduler.clone(),
            value: Mutex::new(Some(Value::Thenable(inner))),
        });
        let child = Promise::resolve(scheduler.clone(), Value::Undefined)
            .then(Some(Box::new(move |_| Ok(Value::Thenable(outer.clone())))), None);
        scheduler.run_until_idle();
        fulfilled_with(&child, Value::Int(7));
    }

    /// Fires both callbacks, the fulfillment one twice.
    struct CallsEverything;

    impl Thenable for CallsEverything {
        fn then(&self, on_fulfilled: ThenCallback, on_rejected: ThenCallback) -> Result<(), Value> {
            on_fulfilled(Value::Int(1));
            on_fulfilled(Value::Int(2));
            on_rejected(Value::Str("late".into()));
            Ok(())
        }
    }

    #[test]
    fn misbehaving_thenable_settles_the_child_exactly_once() {
        let scheduler = scheduler();
        let child = Promise::resolve(scheduler.clone(), Value::Undefined)
            .then(Some(Box::new(|_| Ok(Value::Thenable(Arc::new(CallsEverything))))), None);
        scheduler.run_until_idle();
        fulfilled_with(&child, Value::Int(1));
    }

    /// Calls its fulfillment callback, then throws anyway.
    struct ThrowsAfterSettling;

    impl Thenable for ThrowsAfterSettling {
        fn then(&self, on_fulfilled: ThenCallback, _on_rejected: ThenCallback) -> Result<(), Value> {
            on_fulfilled(Value::Int(3));
            Err(Value::Str("thrown after settle".into()))
        }
    }

    /// Throws without ever signalling.
    struct ThrowsImmediately;

    impl Thenable for ThrowsImmediately {
        fn then(&self, _on_fulfilled: ThenCallback, _on_rejected: ThenCallback) -> Result<(), Value> {
            Err(Value::Str("thrown".into()))
        }
    }

    #[test]
    fn throwing_thenables_cannot_double_settle() {
        let scheduler = scheduler();
        let settled_first = Promise::resolve(scheduler.clone(), Value::Undefined)
            .then(Some(Box::new(|_| Ok(Value::Thenable(Arc::new(ThrowsAfterSettling))))), None);
        let threw = Promise::resolve(scheduler.clone(), Value::Undefined)
            .then(Some(Box::new(|_| Ok(Value::Thenable(Arc::new(ThrowsImmediately))))), None);
        scheduler.run_until_idle();
        fulfilled_with(&settled_first, Value::Int(3));
        rejected_with(&threw, Value::Str("thrown".into()));
    }

    #[test]
    fn all_fulfills_in_input_order() {
        let scheduler = scheduler();
        let joined = Promise::all(
            scheduler.clone(),
            vec![
                Promise::resolve(scheduler.clone(), Value::Int(1)),
                Promise::resolve(scheduler.clone(), Value::Int(2)),
                Promise::resolve(scheduler.clone(), Value::Int(3)),
            ],
        );
        scheduler.run_until_idle();
        fulfilled_with(
            &joined,
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        );
    }

    #[test]
    fn all_rejects_with_the_first_rejection() {
        let scheduler = scheduler();
        let joined = Promise::all(
            scheduler.clone(),
            vec![
                Promise::resolve(scheduler.clone(), Value::Int(1)),
                Promise::reject(scheduler.clone(), "e"),
                Promise::resolve(scheduler.clone(), Value::Int(3)),
            ],
        );
        scheduler.run_until_idle();
        rejected_with(&joined, Value::Str("e".into()));
    }

    #[test]
    fn all_of_nothing_fulfills_with_an_empty_list() {
        let scheduler = scheduler();
        let joined = Promise::all(scheduler.clone(), Vec::new());
        fulfilled_with(&joined, Value::List(Vec::new()));
    }

    #[test]
    fn race_adopts_the_first_settlement() {
        let scheduler = scheduler();
        let never_settles = Promise::deferred(scheduler.clone());
        let raced = Promise::race(
            scheduler.clone(),
            vec![
                never_settles.promise.clone(),
                Promise::resolve(scheduler.clone(), Value::Int(5)),
            ],
        );
        scheduler.run_until_idle();
        fulfilled_with(&raced, Value::Int(5));

        let lost = Promise::deferred(scheduler.clone());
        let raced = Promise::race(
            scheduler.clone(),
            vec![
                Promise::reject(scheduler.clone(), "e"),
                lost.promise.clone(),
            ],
        );
        scheduler.run_until_idle();
        lost.resolve.call(Value::Int(1));
        scheduler.run_until_idle();
        rejected_with(&raced, Value::Str("e".into()));
    }

    #[test]
    fn all_settled_never_rejects() {
        let scheduler = scheduler();
        let joined = Promise::all_settled(
            scheduler.clone(),
            vec![
                Promise::resolve(scheduler.clone(), Value::Int(1)),
                Promise::reject(scheduler.clone(), "e"),
            ],
        );
        scheduler.run_until_idle();
        fulfilled_with(
            &joined,
            Value::List(vec![
                Outcome::Fulfilled(Value::Int(1)).into(),
                Outcome::Rejected(Value::Str("e".into())).into(),
            ]),
        );

        let empty = Promise::all_settled(scheduler.clone(), Vec::new());
        fulfilled_with(&empty, Value::List(Vec::new()));
    }

    #[test]
    fn deferred_settles_its_promise_from_outside() {
        let scheduler = scheduler();
        let deferred = Promise::deferred(scheduler);
        assert_eq!(deferred.promise.status(), Status::Pending);
        deferred.resolve.call("x");
        fulfilled_with(&deferred.promise, Value::Str("x".into()));
    }

    // `finally` is `then(f, f)`: the callback's return value replaces the
    // original outcome instead of forwarding it. These two tests pin that
    // known deviation from idiomatic finally semantics.
    #[test]
    fn finally_replaces_the_fulfillment_value() {
        let scheduler = scheduler();
        let child = Promise::resolve(scheduler.clone(), Value::Int(3))
            .finally(|_| Ok(Value::Str("replaced".into())));
        scheduler.run_until_idle();
        fulfilled_with(&child, Value::Str("replaced".into()));
    }

    #[test]
    fn finally_swallows_a_rejection_when_its_callback_succeeds() {
        let scheduler = scheduler();
        let child = Promise::reject(scheduler.clone(), "e").finally(|_| Ok(Value::Int(0)));
        scheduler.run_until_idle();
        fulfilled_with(&child, Value::Int(0));
    }

    #[test]
    fn future_wakes_a_blocked_waiter() {
        let scheduler = ThreadScheduler::spawn();
        let deferred = Promise::deferred(scheduler);
        let promise = deferred.promise.clone();
        let waiter = thread::spawn(move || block_on(promise));
        deferred.resolve.call(Value::Int(42));
        assert_eq!(
            waiter.join().expect("the waiter thread has panicked"),
            Outcome::Fulfilled(Value::Int(42))
        );
    }

    #[test]
    fn chains_run_to_completion_on_a_thread_scheduler() {
        let scheduler = ThreadScheduler::spawn();
        let chained = Promise::resolve(scheduler, Value::Int(20)).then(
            Some(Box::new(|value| match value {
                Value::Int(n) => Ok(Value::Int(n + 22)),
                other => Ok(other),
            })),
            None,
        );
        assert_eq!(
            block_on(chained.clone()),
            Outcome::Fulfilled(Value::Int(42))
        );
        assert_eq!(chained.status(), Status::Fulfilled);
    }
}
