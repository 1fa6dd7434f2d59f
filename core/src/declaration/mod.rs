//! Raw step declarations
//!
//! A [`Declaration`] is whatever a caller hands to `Sequence::add`: a bare
//! operation, the name of a registered one, a structured
//! [`DeclarationObject`], an existing [`Sequence`], or a JSON document with
//! the same keys. None of these are executed directly; the normalizer turns
//! each one into a canonical `Entry` or rejects it.
//!
//! # JSON shape
//!
//! ```json
//! [
//!   "load",
//!   { "label": "check", "if": "is_ready", "then": "ship", "else": { "goto": "check" } },
//!   { "loop": "has_more", "block": ["fetch", "store"], "on-error": false },
//!   { "error": "gave up", "do-break": true },
//!   { "sequence": ["cleanup"], "jump": "end" }
//! ]
//! ```
//!
//! Strings name registered operations, arrays are nested sequences, objects
//! are dispatched on the first key found in the order `error`, `sequence`,
//! `method`, `if`, `loop`, `goto`.

mod json;
pub(crate) mod normalize;


use serde_json::Value as JsonValue;

use crate::context::Context;
use crate::sequence::Sequence;
use crate::types::{LabelResolver, Operation};

pub(crate) use normalize::{clean_label, Normalizer};

/* ===================== Declaration ===================== */

/// One raw, loosely-shaped step description
pub enum Declaration {
    Operation(Operation),
    /// Resolved against the sequence's registry
    Named(String),
    Object(Box<DeclarationObject>),
    Sequence(Sequence),
    Json(JsonValue),
}

impl Declaration {
    /// Wrap a closure as a bare operation declaration
    pub fn operation<F>(operation: F) -> Self
    where
        F: Fn(&Context, &[JsonValue]) + Send + Sync + 'static,
    {
        Declaration::Operation(std::sync::Arc::new(operation))
    }
}

impl From<Operation> for Declaration {
    fn from(operation: Operation) -> Self {
        Declaration::Operation(operation)
    }
}

impl From<&str> for Declaration {
    fn from(name: &str) -> Self {
        Declaration::Named(name.to_string())
    }
}

impl From<String> for Declaration {
    fn from(name: String) -> Self {
        Declaration::Named(name)
    }
}

impl From<JsonValue> for Declaration {
    fn from(value: JsonValue) -> Self {
        Declaration::Json(value)
    }
}

impl From<Sequence> for Declaration {
    fn from(sequence: Sequence) -> Self {
        Declaration::Sequence(sequence)
    }
}

impl From<DeclarationObject> for Declaration {
    fn from(object: DeclarationObject) -> Self {
        Declaration::Object(Box::new(object))
    }
}

/* ===================== Field Shapes ===================== */

/// Value of the `loop` key
pub enum LoopControlDeclaration {
    /// Only `true` is accepted
    Flag(bool),
    Method(Declaration),
}

impl From<bool> for LoopControlDeclaration {
    fn from(flag: bool) -> Self {
        LoopControlDeclaration::Flag(flag)
    }
}

impl From<Declaration> for LoopControlDeclaration {
    fn from(method: Declaration) -> Self {
        LoopControlDeclaration::Method(method)
    }
}

impl From<&str> for LoopControlDeclaration {
    fn from(name: &str) -> Self {
        LoopControlDeclaration::Method(name.into())
    }
}

impl From<Operation> for LoopControlDeclaration {
    fn from(operation: Operation) -> Self {
        LoopControlDeclaration::Method(operation.into())
    }
}

impl From<DeclarationObject> for LoopControlDeclaration {
    fn from(object: DeclarationObject) -> Self {
        LoopControlDeclaration::Method(object.into())
    }
}

/// Value of the `on-error` key
pub enum OnErrorDeclaration {
    /// `false` suppresses loop errors; `true` keeps the default propagation
    Flag(bool),
    Entry(Declaration),
}

/// Value of the `goto` key
pub enum GotoDeclaration {
    Label(String),
    Resolver {
        resolver: LabelResolver,
        params: Option<JsonValue>,
    },
    /// Resolver looked up in the registry
    Named {
        name: String,
        params: Option<JsonValue>,
    },
}

impl From<&str> for GotoDeclaration {
    fn from(label: &str) -> Self {
        GotoDeclaration::Label(label.to_string())
    }
}

impl From<String> for GotoDeclaration {
    fn from(label: String) -> Self {
        GotoDeclaration::Label(label)
    }
}

impl GotoDeclaration {
    pub fn resolver<F>(resolver: F) -> Self
    where
        F: Fn(&Context, &[JsonValue]) -> String + Send + Sync + 'static,
    {
        GotoDeclaration::Resolver {
            resolver: std::sync::Arc::new(resolver),
            params: None,
        }
    }
}

/// Value of the `error` key
pub enum ErrorDeclaration {
    Message(String),
    Method(Declaration),
}

impl From<&str> for ErrorDeclaration {
    fn from(message: &str) -> Self {
        ErrorDeclaration::Message(message.to_string())
    }
}

impl From<String> for ErrorDeclaration {
    fn from(message: String) -> Self {
        ErrorDeclaration::Message(message)
    }
}

/* ===================== Declaration Object ===================== */

/// Structured declaration: every recognized key, all optional.
///
/// Only one entry kind is produced per object; see the module docs for the
/// key precedence.
#[derive(Default)]
pub struct DeclarationObject {
    pub label: Option<String>,
    pub method: Option<Declaration>,
    pub params: Option<JsonValue>,
    pub condition: Option<Declaration>,
    pub then: Option<Declaration>,
    pub otherwise: Option<Declaration>,
    pub control: Option<LoopControlDeclaration>,
    pub block: Option<Declaration>,
    pub on_success: Option<Declaration>,
    pub on_error: Option<OnErrorDeclaration>,
    pub goto: Option<GotoDeclaration>,
    pub error: Option<ErrorDeclaration>,
    pub do_break: Option<bool>,
    pub sequence: Option<Declaration>,
    pub jump: Option<String>,
}

impl DeclarationObject {
    /// `{ method }`
    pub fn method(method: impl Into<Declaration>) -> Self {
        Self {
            method: Some(method.into()),
            ..Self::default()
        }
    }

    /// `{ if }`
    pub fn conditional(condition: impl Into<Declaration>) -> Self {
        Self {
            condition: Some(condition.into()),
            ..Self::default()
        }
    }

    /// `{ loop }`
    pub fn looping(control: impl Into<LoopControlDeclaration>) -> Self {
        Self {
            control: Some(control.into()),
            ..Self::default()
        }
    }

    /// `{ goto }`
    pub fn goto(target: impl Into<GotoDeclaration>) -> Self {
        Self {
            goto: Some(target.into()),
            ..Self::default()
        }
    }

    /// `{ error }`
    pub fn error(error: impl Into<ErrorDeclaration>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// `{ sequence }`
    pub fn sequence(sequence: impl Into<Declaration>) -> Self {
        Self {
            sequence: Some(sequence.into()),
            ..Self::default()
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn params(mut self, params: impl Into<JsonValue>) -> Self {
        self.params = Some(params.into());
        self
    }

    pub fn then(mut self, then: impl Into<Declaration>) -> Self {
        self.then = Some(then.into());
        self
    }

    pub fn otherwise(mut self, otherwise: impl Into<Declaration>) -> Self {
        self.otherwise = Some(otherwise.into());
        self
    }

    pub fn block(mut self, block: impl Into<Declaration>) -> Self {
        self.block = Some(block.into());
        self
    }

    pub fn on_success(mut self, entry: impl Into<Declaration>) -> Self {
        self.on_success = Some(entry.into());
        self
    }

    pub fn on_error(mut self, entry: impl Into<Declaration>) -> Self {
        self.on_error = Some(OnErrorDeclaration::Entry(entry.into()));
        self
    }

    /// `on-error: false`
    pub fn suppress_errors(mut self) -> Self {
        self.on_error = Some(OnErrorDeclaration::Flag(false));
        self
    }

    pub fn do_break(mut self, flag: bool) -> Self {
        self.do_break = Some(flag);
        self
    }

    pub fn jump(mut self, label: impl Into<String>) -> Self {
        self.jump = Some(label.into());
        self
    }
}
