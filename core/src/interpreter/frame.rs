//! Execution frames
//!
//! One frame per running sequence. The root run owns the bottom frame; each
//! loop-body iteration and each nested sequence entry pushes a fresh frame on
//! top of it. Frames reference their sequence template, they never own it.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::sequence::Sequence;
use crate::types::{Conditional, Loop};

/// Why a child frame exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildRole {
    /// One iteration of the parent's top-of-stack loop
    LoopBody,
    /// A sequence entry (or a sequence used as a branch)
    Nested,
}

/// Per-loop bookkeeping while the loop sits on the construct stack
#[derive(Debug)]
pub(crate) struct LoopState {
    pub def: Arc<Loop>,
    /// Errors emitted by the control check or the body, held apart from the
    /// frame's own errors until the loop exits
    pub errors: Vec<JsonValue>,
    /// The body has run at least once
    pub ran: bool,
}

impl LoopState {
    pub fn new(def: Arc<Loop>) -> Self {
        Self {
            def,
            errors: Vec::new(),
            ran: false,
        }
    }
}

/// A construct awaiting a continuation result
#[derive(Debug)]
pub(crate) enum Construct {
    Conditional(Arc<Conditional>),
    Loop(LoopState),
}

#[derive(Debug)]
pub(crate) struct Frame {
    pub sequence: Arc<Sequence>,
    /// Index of the next entry to run
    pub cursor: usize,
    pub stack: Vec<Construct>,
    pub finished: bool,
    /// `None` until the first error
    pub errors: Option<Vec<JsonValue>>,
    /// Trailing jump of the entry dispatched last, consumed by `next()`
    pub pending_jump: Option<String>,
}

impl Frame {
    pub fn new(sequence: Arc<Sequence>) -> Self {
        Self {
            sequence,
            cursor: 0,
            stack: Vec::new(),
            finished: false,
            errors: None,
            pending_jump: None,
        }
    }

    pub fn record_errors(&mut self, values: Vec<JsonValue>) {
        if values.is_empty() {
            return;
        }
        self.errors.get_or_insert_with(Vec::new).extend(values);
    }

    pub fn take_errors(&mut self) -> Vec<JsonValue> {
        self.errors.take().unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
    }
}

/// A frame pushed above the root
#[derive(Debug)]
pub(crate) struct Child {
    pub role: ChildRole,
    pub frame: Frame,
}
