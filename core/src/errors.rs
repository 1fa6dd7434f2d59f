//! Error taxonomy
//!
//! Two families of errors exist:
//!
//! - [`DeclarationError`] - a raw declaration could not be normalized into an
//!   entry. Non-fatal: `Sequence::add` reports it and drops the declaration.
//! - [`SequenceError`] - a continuation primitive was used in a way the
//!   interpreter cannot honor (protocol misuse). Fatal to the run: the fault is
//!   folded into the root sequence's error list and the run ends.
//!
//! Values emitted through `errors()` are not Rust errors at all; they are
//! plain JSON values accumulated by the sequence.

use thiserror::Error;

/* ===================== Declaration Errors ===================== */

/// Reasons a raw declaration is rejected by the normalizer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("no operation registered under '{0}'")]
    UnknownOperation(String),

    #[error("no label resolver registered under '{0}'")]
    UnknownResolver(String),

    #[error("empty operation name")]
    EmptyName,

    #[error("declaration does not describe an operation")]
    NotAnOperation,

    #[error("unrecognized declaration shape: {0}")]
    UnrecognizedShape(&'static str),

    #[error("conditional has neither a usable 'then' nor 'else' branch")]
    MissingBranch,

    #[error("loop requires a control clause (true or an operation)")]
    MissingLoopControl,

    #[error("loop requires a block")]
    MissingLoopBlock,

    #[error("invalid loop block: {0}")]
    InvalidLoopBlock(&'static str),

    #[error("goto requires a non-empty label or a label resolver")]
    EmptyGotoTarget,

    #[error("error entry requires a non-empty message or an operation")]
    EmptyErrorValue,

    #[error("'{key}' must be {expected}")]
    InvalidField {
        key: &'static str,
        expected: &'static str,
    },

    #[error("invalid '{key}': {source}")]
    Field {
        key: &'static str,
        #[source]
        source: Box<DeclarationError>,
    },
}

impl DeclarationError {
    /// Wrap an error raised while normalizing the value under `key`
    pub(crate) fn in_field(key: &'static str) -> impl FnOnce(DeclarationError) -> Self {
        move |source| DeclarationError::Field {
            key,
            source: Box::new(source),
        }
    }
}

/* ===================== Protocol Faults ===================== */

/// Protocol-misuse faults raised by the interpreter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("SEQUENCE: called {0}() after sequence completed")]
    Finished(&'static str),

    #[error("SEQUENCE: called {0}() with no conditional or loop awaiting a result")]
    NoConstruct(&'static str),

    #[error("missing or invalid goto label")]
    EmptyLabel,

    #[error("missing goto label [{0}]")]
    UnknownLabel(String),

    #[error("unknown primitive '{0}'")]
    UnknownPrimitive(String),

    #[error("SEQUENCE: no loop is awaiting on the construct stack")]
    NoLoop,

    #[error("context is already running a sequence")]
    ContextBusy,
}
