//! Execution context
//!
//! The [`Context`] is the control surface operations use to drive a run. It is
//! a cheap handle (clone it into callbacks, timers, other threads) over one
//! shared run: a signal queue, the stack machine, and the run status.
//!
//! Every primitive enqueues a [`Signal`] and then drives the queue, unless the
//! calling thread is already inside the driver. An operation that calls
//! `ctx.next()` synchronously therefore returns straight away and the driver
//! applies the signal once the operation unwinds, so arbitrarily long runs of
//! synchronous operations never grow the call stack.
//!
//! ## Queue
//! - immediate: primitives called directly
//! - deferred: primitives scheduled with [`Context::defer`], applied only once
//!   the immediate queue is empty

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use serde_json::Value as JsonValue;
use tracing::{debug, debug_span, error, warn};
use uuid::Uuid;

use crate::errors::SequenceError;
use crate::interpreter::Machine;
use crate::sequence::Sequence;
use crate::types::signal::error_values;
use crate::types::{Outcome, Signal};

/// Which sequence of the running call tree receives primitives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSequence {
    pub name: Option<String>,
    /// 0 for the root; each loop body or nested sequence adds one
    pub depth: usize,
}

/* ===================== Shared State ===================== */

#[derive(Debug, Default)]
struct SignalQueue {
    immediate: VecDeque<Signal>,
    deferred: VecDeque<Signal>,
}

impl SignalQueue {
    fn pop(&mut self) -> Option<Signal> {
        self.immediate
            .pop_front()
            .or_else(|| self.deferred.pop_front())
    }

    fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.deferred.is_empty()
    }

    fn clear(&mut self) {
        self.immediate.clear();
        self.deferred.clear();
    }
}

#[derive(Debug, Default)]
struct RunStatus {
    run_id: Option<Uuid>,
    active: Option<ActiveSequence>,
    outcome: Option<Outcome>,
}

#[derive(Debug, Default)]
struct Shared {
    queue: Mutex<SignalQueue>,
    /// Set while some thread is draining the queue
    driving: AtomicBool,
    /// Locked only by the driver and by `launch`
    machine: Mutex<Option<Machine>>,
    status: Mutex<RunStatus>,
}

/// Clears the driving flag when the driver exits, including by a panicking operation
struct DrivingFlag<'a>(&'a AtomicBool);

impl Drop for DrivingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/* ===================== Context ===================== */

#[derive(Debug, Clone, Default)]
pub struct Context {
    shared: Arc<Shared>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /* ===================== Primitives ===================== */

    /// Proceed to the next entry (or fire the pending jump)
    pub fn next(&self) {
        self.signal(Signal::Next);
    }

    /// Run the awaiting loop body again, or take a conditional's `then`
    pub fn continue_(&self) {
        self.signal(Signal::Continue);
    }

    /// Leave the awaiting loop, or take a conditional's `else`
    pub fn break_(&self) {
        self.signal(Signal::Break);
    }

    pub fn true_(&self) {
        self.signal(Signal::True);
    }

    pub fn false_(&self) {
        self.signal(Signal::False);
    }

    /// Jump to a label of the active sequence. `continue`, `break` and `end`
    /// are reserved and map to the matching primitives.
    pub fn goto(&self, label: impl Into<String>) {
        self.signal(Signal::Goto(label.into()));
    }

    /// Emit errors. Arrays are flattened and `null` emits nothing.
    pub fn errors(&self, value: impl Into<JsonValue>) {
        self.signal(Signal::Errors(error_values(value.into())));
    }

    /// Finish the whole run
    pub fn end(&self) {
        self.signal(Signal::End);
    }

    /// Apply any primitive
    pub fn signal(&self, signal: Signal) {
        self.post(signal, false);
    }

    /// Schedule a primitive by name until the current chain of immediate
    /// signals has been applied
    pub fn defer(&self, name: &str) -> Result<(), SequenceError> {
        let signal = name.parse::<Signal>()?;
        self.defer_signal(signal);
        Ok(())
    }

    pub fn defer_signal(&self, signal: Signal) {
        self.post(signal, true);
    }

    /* ===================== Run Status ===================== */

    /// The sequence currently receiving primitives, if a run was started
    pub fn active_sequence(&self) -> Option<ActiveSequence> {
        lock(&self.shared.status).active.clone()
    }

    /// Swap the active sequence, returning the previous one
    pub(crate) fn set_active(&self, active: Option<ActiveSequence>) -> Option<ActiveSequence> {
        std::mem::replace(&mut lock(&self.shared.status).active, active)
    }

    pub(crate) fn record_outcome(&self, outcome: Outcome) {
        let mut status = lock(&self.shared.status);
        status.active = None;
        status.outcome = Some(outcome);
    }

    pub fn run_id(&self) -> Option<Uuid> {
        lock(&self.shared.status).run_id
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.shared.status).outcome.is_some()
    }

    /// `None` until the root sequence finishes
    pub fn outcome(&self) -> Option<Outcome> {
        lock(&self.shared.status).outcome.clone()
    }

    pub fn has_errors(&self) -> bool {
        self.outcome().is_some_and(|outcome| !outcome.is_success())
    }

    pub fn get_errors(&self) -> Vec<JsonValue> {
        self.outcome()
            .map(|outcome| outcome.errors().to_vec())
            .unwrap_or_default()
    }

    /* ===================== Driver ===================== */

    /// Install a new run and apply its first `next()`.
    ///
    /// Rejected (and logged) while another run on this context is unfinished.
    pub(crate) fn launch(&self, sequence: Sequence) {
        {
            let mut slot = match self.shared.machine.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    error!(fault = %SequenceError::ContextBusy, "start ignored");
                    return;
                }
            };
            if slot.as_ref().is_some_and(|machine| !machine.is_finished()) {
                error!(fault = %SequenceError::ContextBusy, "start ignored");
                return;
            }

            let machine = Machine::new(sequence);
            {
                let mut status = lock(&self.shared.status);
                status.run_id = Some(machine.run_id());
                status.active = Some(machine.active_sequence());
                status.outcome = None;
            }
            lock(&self.shared.queue).clear();
            debug!(run_id = %machine.run_id(), "sequence started");
            *slot = Some(machine);
        }

        self.signal(Signal::Next);
    }

    fn post(&self, signal: Signal, deferred: bool) {
        {
            let mut queue = lock(&self.shared.queue);
            if deferred {
                queue.deferred.push_back(signal);
            } else {
                queue.immediate.push_back(signal);
            }
        }
        self.drive();
    }

    /// Drain the queue unless another caller already is
    fn drive(&self) {
        loop {
            if self.shared.driving.swap(true, Ordering::AcqRel) {
                return;
            }
            let driving = DrivingFlag(&self.shared.driving);

            loop {
                // Pop before locking the machine; operations enqueue while it is held
                let Some(signal) = lock(&self.shared.queue).pop() else {
                    break;
                };

                let mut slot = lock(&self.shared.machine);
                match slot.as_mut() {
                    Some(machine) => {
                        let span = debug_span!("run", run_id = %machine.run_id());
                        let _enter = span.enter();
                        machine.apply(self, signal);
                    }
                    None => warn!(signal = signal.name(), "no sequence started; signal dropped"),
                }
            }

            drop(driving);

            // A signal posted between the last pop and the store above
            if lock(&self.shared.queue).is_empty() {
                return;
            }
        }
    }
}
