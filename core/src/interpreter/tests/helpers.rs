//! Test helpers for interpreter tests
//!
//! Common operations that record what ran, plus a watcher for the
//! success/error callbacks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;

use crate::context::Context;
use crate::declaration::Declaration;
use crate::sequence::Sequence;

/// Ordered record of operation names (and callback firings)
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    /// Records `name`, then calls `next()`
    pub fn step(&self, name: &str) -> Declaration {
        self.op(name, |ctx| ctx.next())
    }

    /// Records `name`, then calls `continue()`. Inside a loop body this
    /// asks for another control check.
    pub fn repeat(&self, name: &str) -> Declaration {
        self.op(name, |ctx| ctx.continue_())
    }

    /// Records `name`, then emits `error`
    pub fn fail(&self, name: &str, error: JsonValue) -> Declaration {
        self.op(name, move |ctx| ctx.errors(error.clone()))
    }

    /// Records `name`, then hands the context to `then`
    pub fn op<F>(&self, name: &str, then: F) -> Declaration
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        let trace = self.clone();
        let name = name.to_string();
        Declaration::operation(move |ctx, _| {
            trace.push(name.clone());
            then(ctx);
        })
    }

    /// Like `op`, with the call number (starting at 1) passed along
    pub fn counted<F>(&self, name: &str, then: F) -> Declaration
    where
        F: Fn(&Context, usize) + Send + Sync + 'static,
    {
        let calls = AtomicUsize::new(0);
        self.op(name, move |ctx| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            then(ctx, call);
        })
    }

    /// Condition/control that answers `true()` for the first `limit` calls,
    /// then `false()`
    pub fn counter_condition(&self, name: &str, limit: usize) -> Declaration {
        self.counted(name, move |ctx, call| {
            if call <= limit {
                ctx.true_();
            } else {
                ctx.false_();
            }
        })
    }

    /// Attach success/error callbacks recording `success` or `failure`
    pub fn watch(&self, sequence: Sequence) -> Sequence {
        let on_success = self.clone();
        let on_error = self.clone();
        sequence
            .on_success(move |_| on_success.push("success"))
            .on_error(move |_, errors| {
                on_error.push(format!("failure:{}", JsonValue::from(errors.to_vec())))
            })
    }
}
