//! Canonical entry kinds
//!
//! Every declaration accepted by `Sequence::add` is normalized into exactly one
//! of the six [`Entry`] variants below. Entries are immutable once built; the
//! interpreter only ever clones them (all heavy payloads sit behind `Arc`).

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::context::Context;
use crate::sequence::Sequence;

/// A caller-supplied operation.
///
/// Operations receive the shared [`Context`] and their parameters. They drive
/// the sequence by calling a primitive on the context, immediately or later.
pub type Operation = Arc<dyn Fn(&Context, &[JsonValue]) + Send + Sync>;

/// An operation that computes a goto label at run time
pub type LabelResolver = Arc<dyn Fn(&Context, &[JsonValue]) -> String + Send + Sync>;

/* ===================== Method ===================== */

/// An operation to invoke, with its bound parameters
#[derive(Clone)]
pub struct MethodCall {
    pub label: Option<String>,
    pub operation: Operation,
    /// Empty means "called with no arguments"
    pub params: Vec<JsonValue>,
    pub jump: Option<String>,
}

impl MethodCall {
    pub fn new(operation: Operation) -> Self {
        Self {
            label: None,
            operation,
            params: Vec::new(),
            jump: None,
        }
    }

    pub(crate) fn invoke(&self, ctx: &Context) {
        (self.operation)(ctx, &self.params)
    }
}

impl fmt::Debug for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCall")
            .field("label", &self.label)
            .field("params", &self.params)
            .field("jump", &self.jump)
            .finish_non_exhaustive()
    }
}

/* ===================== Conditional ===================== */

/// `if` / `then` / `else`. At least one branch is always present.
#[derive(Debug)]
pub struct Conditional {
    pub label: Option<String>,
    /// Never carries a jump
    pub condition: MethodCall,
    pub then: Option<Entry>,
    pub otherwise: Option<Entry>,
}

/* ===================== Loop ===================== */

/// What decides whether a loop body runs (again)
#[derive(Debug, Clone)]
pub enum LoopControl {
    /// Literal `true`: the body must break out itself
    Always,
    /// Calls `true()`/`continue()` to run the body, `false()`/`break()` to stop
    Method(MethodCall),
}

/// Routing for loop errors when the loop exits
#[derive(Debug, Clone)]
pub enum LoopFailure {
    /// Literal `false`: drop the loop errors and continue
    Suppress,
    Entry(Entry),
}

#[derive(Debug)]
pub struct Loop {
    pub label: Option<String>,
    pub control: LoopControl,
    /// Always sequence-shaped; single entries are wrapped at normalization
    pub block: Arc<Sequence>,
    pub on_success: Option<Entry>,
    pub on_error: Option<LoopFailure>,
    pub jump: Option<String>,
}

/* ===================== Goto ===================== */

#[derive(Clone)]
pub enum GotoTarget {
    /// Lower-cased label name
    Label(String),
    Resolver {
        resolver: LabelResolver,
        params: Vec<JsonValue>,
    },
}

impl fmt::Debug for GotoTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GotoTarget::Label(label) => f.debug_tuple("Label").field(label).finish(),
            GotoTarget::Resolver { params, .. } => f
                .debug_struct("Resolver")
                .field("params", params)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Goto {
    pub label: Option<String>,
    pub target: GotoTarget,
    pub jump: Option<String>,
}

/* ===================== Error ===================== */

#[derive(Debug, Clone)]
pub enum ErrorValue {
    Message(String),
    /// Invoked like any operation; it must signal the sequence itself
    Method(MethodCall),
}

#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub label: Option<String>,
    pub error: ErrorValue,
    pub jump: Option<String>,
    /// Forced to false when a jump or a method-valued error is present
    pub break_on_emit: bool,
}

/* ===================== Nested Sequence ===================== */

#[derive(Debug, Clone)]
pub struct SequenceEntry {
    pub label: Option<String>,
    pub sequence: Arc<Sequence>,
    pub jump: Option<String>,
}

/* ===================== Entry ===================== */

/// One canonical step of a sequence
#[derive(Debug, Clone)]
pub enum Entry {
    Method(MethodCall),
    Conditional(Arc<Conditional>),
    Loop(Arc<Loop>),
    Goto(Goto),
    Error(ErrorEntry),
    Sequence(SequenceEntry),
}

impl Entry {
    pub fn label(&self) -> Option<&str> {
        match self {
            Entry::Method(call) => call.label.as_deref(),
            Entry::Conditional(cond) => cond.label.as_deref(),
            Entry::Loop(def) => def.label.as_deref(),
            Entry::Goto(goto) => goto.label.as_deref(),
            Entry::Error(error) => error.label.as_deref(),
            Entry::Sequence(nested) => nested.label.as_deref(),
        }
    }

    /// Trailing jump fired once this entry's own handling completes
    pub fn jump(&self) -> Option<&str> {
        match self {
            Entry::Method(call) => call.jump.as_deref(),
            Entry::Conditional(_) => None,
            Entry::Loop(def) => def.jump.as_deref(),
            Entry::Goto(goto) => goto.jump.as_deref(),
            Entry::Error(error) => error.jump.as_deref(),
            Entry::Sequence(nested) => nested.jump.as_deref(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Entry::Method(_) => "method",
            Entry::Conditional(_) => "if",
            Entry::Loop(_) => "loop",
            Entry::Goto(_) => "goto",
            Entry::Error(_) => "error",
            Entry::Sequence(_) => "sequence",
        }
    }
}
