//! Type definitions for the interpreter
//!
//! - Canonical entries (Entry and its per-kind payloads)
//! - Continuation signals (Signal) and run outcomes (Outcome)

pub mod entry;
pub mod signal;

// Re-export all types for convenient access
pub use entry::{
    Conditional, Entry, ErrorEntry, ErrorValue, Goto, GotoTarget, LabelResolver, Loop,
    LoopControl, LoopFailure, MethodCall, Operation, SequenceEntry,
};
pub use signal::{Outcome, Signal};
