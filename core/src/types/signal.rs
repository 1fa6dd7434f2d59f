//! Continuation signals and run outcomes

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::SequenceError;

/* ===================== Signal ===================== */

/// A continuation request posted to the active sequence.
///
/// Operations never touch the interpreter directly: every primitive they call
/// on the context becomes one of these values and is applied by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Signal {
    Next,
    Continue,
    Break,
    True,
    False,
    Goto(String),
    /// Emitted values; break-on-emit is implied
    Errors(Vec<JsonValue>),
    End,
}

impl Signal {
    /// Primitive name as exposed on the context
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Next => "next",
            Signal::Continue => "continue",
            Signal::Break => "break",
            Signal::True => "true",
            Signal::False => "false",
            Signal::Goto(_) => "goto",
            Signal::Errors(_) => "errors",
            Signal::End => "end",
        }
    }
}

/// Parses the argument-less primitives (`goto` and `errors` need a payload).
impl FromStr for Signal {
    type Err = SequenceError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim() {
            "next" => Ok(Signal::Next),
            "continue" => Ok(Signal::Continue),
            "break" => Ok(Signal::Break),
            "true" => Ok(Signal::True),
            "false" => Ok(Signal::False),
            "end" => Ok(Signal::End),
            other => Err(SequenceError::UnknownPrimitive(other.to_string())),
        }
    }
}

/// Flatten an emitted value into the list appended to a sequence's errors.
///
/// Arrays contribute their items, `null` contributes nothing.
pub(crate) fn error_values(value: JsonValue) -> Vec<JsonValue> {
    match value {
        JsonValue::Null => Vec::new(),
        JsonValue::Array(items) => items,
        other => vec![other],
    }
}

/* ===================== Outcome ===================== */

/// How a top-level run finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Outcome {
    Success,
    Failure(Vec<JsonValue>),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn errors(&self) -> &[JsonValue] {
        match self {
            Outcome::Success => &[],
            Outcome::Failure(errors) => errors,
        }
    }
}
