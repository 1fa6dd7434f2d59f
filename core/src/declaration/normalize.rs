//! Entry normalizer
//!
//! Validates one raw [`Declaration`] and canonicalizes it into exactly one
//! [`Entry`], or rejects it with a [`DeclarationError`].
//!
//! Rules worth knowing:
//!
//! - Labels and jump targets are trimmed and lower-cased; empty means none.
//! - `params` becomes a list (a non-list value is wrapped as a singleton).
//! - Condition and loop-control methods never keep a trailing jump.
//! - Every loop body is sequence-shaped: a single block entry is wrapped in a
//!   fresh one-entry sequence.
//! - An invalid optional branch (`then`, `else`, `on-success`, `on-error`) is
//!   reported and dropped; the entry survives if what remains is valid.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use super::{
    Declaration, DeclarationObject, ErrorDeclaration, GotoDeclaration, LoopControlDeclaration,
    OnErrorDeclaration,
};
use crate::errors::DeclarationError;
use crate::sequence::Sequence;
use crate::types::{
    Conditional, Entry, ErrorEntry, ErrorValue, Goto, GotoTarget, Loop, LoopControl, LoopFailure,
    MethodCall, SequenceEntry,
};

/* ===================== Helpers ===================== */

/// Trim and lower-case a label; empty after trimming means "no label"
pub(crate) fn clean_label(label: Option<&str>) -> Option<String> {
    let label = label?.trim();
    if label.is_empty() {
        None
    } else {
        Some(label.to_lowercase())
    }
}

/// Coerce `params` into an argument list
fn clean_params(params: Option<JsonValue>) -> Vec<JsonValue> {
    match params {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items,
        Some(value) => vec![value],
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/* ===================== Normalizer ===================== */

/// Normalizes declarations on behalf of the sequence they will be added to.
///
/// The owner supplies the registry for named operations and is the template
/// for any sequence the normalizer has to create (JSON arrays, loop bodies).
pub(crate) struct Normalizer<'a> {
    owner: &'a Sequence,
}

impl<'a> Normalizer<'a> {
    pub(crate) fn new(owner: &'a Sequence) -> Self {
        Self { owner }
    }

    /// Normalize any declaration into an entry
    pub(crate) fn entry(&self, declaration: Declaration) -> Result<Entry, DeclarationError> {
        match declaration {
            Declaration::Operation(operation) => Ok(Entry::Method(MethodCall::new(operation))),
            Declaration::Named(name) => self.named(&name).map(Entry::Method),
            Declaration::Sequence(sequence) => Ok(Entry::Sequence(SequenceEntry {
                label: None,
                sequence: Arc::new(sequence),
                jump: None,
            })),
            Declaration::Object(object) => self.object(*object),
            Declaration::Json(value) => self.json(value),
        }
    }

    fn json(&self, value: JsonValue) -> Result<Entry, DeclarationError> {
        match value {
            JsonValue::String(name) => self.named(&name).map(Entry::Method),
            JsonValue::Array(items) => Ok(Entry::Sequence(SequenceEntry {
                label: None,
                sequence: Arc::new(self.sequence_from_items(items)),
                jump: None,
            })),
            JsonValue::Object(map) => self.object(DeclarationObject::from_json_map(map)),
            other => Err(DeclarationError::UnrecognizedShape(json_kind(&other))),
        }
    }

    /// Dispatch on the first key present: error, sequence, method, if, loop, goto
    fn object(&self, object: DeclarationObject) -> Result<Entry, DeclarationError> {
        let label = clean_label(object.label.as_deref());
        let jump = clean_label(object.jump.as_deref());

        if let Some(error) = object.error {
            return self.error_entry(error, object.do_break, label, jump);
        }

        if let Some(sequence) = object.sequence {
            return self.sequence_entry(sequence, label, jump);
        }

        if let Some(method) = object.method {
            let mut call = self.method(method)?;
            call.label = label;
            call.params = clean_params(object.params);
            call.jump = jump;
            return Ok(Entry::Method(call));
        }

        if let Some(condition) = object.condition {
            if jump.is_some() {
                warn!(?label, "conditional entries cannot carry a jump; ignored");
            }
            return self.conditional(condition, object.then, object.otherwise, label);
        }

        if let Some(control) = object.control {
            return self.looping(
                control,
                object.block,
                object.on_success,
                object.on_error,
                label,
                jump,
            );
        }

        if let Some(target) = object.goto {
            return self.goto(target, label, jump);
        }

        Err(DeclarationError::UnrecognizedShape("object without an entry key"))
    }

    /* ===================== Methods ===================== */

    fn named(&self, name: &str) -> Result<MethodCall, DeclarationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DeclarationError::EmptyName);
        }

        self.owner
            .registry()
            .operation(name)
            .map(MethodCall::new)
            .ok_or_else(|| DeclarationError::UnknownOperation(name.to_string()))
    }

    /// Normalize a method definition: operation, name, or `{ method, params }`.
    ///
    /// The outer object's label, params and jump always replace the inner ones.
    fn method(&self, declaration: Declaration) -> Result<MethodCall, DeclarationError> {
        match declaration {
            Declaration::Operation(operation) => Ok(MethodCall::new(operation)),
            Declaration::Named(name) => self.named(&name),
            Declaration::Object(object) => self.method_object(*object),
            Declaration::Json(JsonValue::String(name)) => self.named(&name),
            Declaration::Json(JsonValue::Object(map)) => {
                self.method_object(DeclarationObject::from_json_map(map))
            }
            Declaration::Json(_) | Declaration::Sequence(_) => {
                Err(DeclarationError::NotAnOperation)
            }
        }
    }

    fn method_object(&self, object: DeclarationObject) -> Result<MethodCall, DeclarationError> {
        let Some(method) = object.method else {
            return Err(DeclarationError::NotAnOperation);
        };

        let mut call = self.method(method)?;
        call.label = clean_label(object.label.as_deref());
        call.params = clean_params(object.params);
        call.jump = clean_label(object.jump.as_deref());
        Ok(call)
    }

    /// A method used as a condition or loop control: any jump is cleared
    fn control_method(
        &self,
        key: &'static str,
        declaration: Declaration,
    ) -> Result<MethodCall, DeclarationError> {
        let mut call = self
            .method(declaration)
            .map_err(DeclarationError::in_field(key))?;
        if let Some(jump) = call.jump.take() {
            warn!(key, %jump, "jump is not allowed on a control clause; cleared");
        }
        call.label = None;
        Ok(call)
    }

    /// An optional branch: invalid ones are reported and dropped
    fn branch(&self, key: &'static str, declaration: Option<Declaration>) -> Option<Entry> {
        match self.entry(declaration?) {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(key, %error, "invalid branch dropped");
                None
            }
        }
    }

    /* ===================== Compound Entries ===================== */

    fn conditional(
        &self,
        condition: Declaration,
        then: Option<Declaration>,
        otherwise: Option<Declaration>,
        label: Option<String>,
    ) -> Result<Entry, DeclarationError> {
        let condition = self.control_method("if", condition)?;
        let then = self.branch("then", then);
        let otherwise = self.branch("else", otherwise);

        if then.is_none() && otherwise.is_none() {
            return Err(DeclarationError::MissingBranch);
        }

        Ok(Entry::Conditional(Arc::new(Conditional {
            label,
            condition,
            then,
            otherwise,
        })))
    }

    fn looping(
        &self,
        control: LoopControlDeclaration,
        block: Option<Declaration>,
        on_success: Option<Declaration>,
        on_error: Option<OnErrorDeclaration>,
        label: Option<String>,
        jump: Option<String>,
    ) -> Result<Entry, DeclarationError> {
        let control = match control {
            LoopControlDeclaration::Flag(true) => LoopControl::Always,
            LoopControlDeclaration::Flag(false) => return Err(DeclarationError::MissingLoopControl),
            LoopControlDeclaration::Method(method) => {
                LoopControl::Method(self.control_method("loop", method)?)
            }
        };

        let block = block.ok_or(DeclarationError::MissingLoopBlock)?;
        let block = self
            .entry(block)
            .map_err(DeclarationError::in_field("block"))?;
        let block = match block {
            Entry::Error(_) => {
                return Err(DeclarationError::InvalidLoopBlock(
                    "an error entry cannot be a loop body",
                ))
            }
            Entry::Goto(Goto { jump: Some(_), .. }) => {
                return Err(DeclarationError::InvalidLoopBlock(
                    "a goto loop body cannot carry a jump",
                ))
            }
            Entry::Sequence(SequenceEntry {
                sequence,
                jump: None,
                ..
            }) => sequence,
            other => {
                let mut body = self.owner.child();
                body.push_entry(other);
                Arc::new(body)
            }
        };

        let on_success = self.branch("on-success", on_success);
        let on_error = match on_error {
            None => None,
            Some(OnErrorDeclaration::Flag(false)) => Some(LoopFailure::Suppress),
            Some(OnErrorDeclaration::Flag(true)) => None,
            Some(OnErrorDeclaration::Entry(entry)) => {
                self.branch("on-error", Some(entry)).map(LoopFailure::Entry)
            }
        };

        Ok(Entry::Loop(Arc::new(Loop {
            label,
            control,
            block,
            on_success,
            on_error,
            jump,
        })))
    }

    /* ===================== Simple Entries ===================== */

    fn goto(
        &self,
        target: GotoDeclaration,
        label: Option<String>,
        jump: Option<String>,
    ) -> Result<Entry, DeclarationError> {
        let target = match target {
            GotoDeclaration::Label(name) => clean_label(Some(&name))
                .map(GotoTarget::Label)
                .ok_or(DeclarationError::EmptyGotoTarget)?,
            GotoDeclaration::Resolver { resolver, params } => GotoTarget::Resolver {
                resolver,
                params: clean_params(params),
            },
            GotoDeclaration::Named { name, params } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(DeclarationError::EmptyGotoTarget);
                }
                let resolver = self
                    .owner
                    .registry()
                    .resolver(name)
                    .ok_or_else(|| DeclarationError::UnknownResolver(name.to_string()))?;
                GotoTarget::Resolver {
                    resolver,
                    params: clean_params(params),
                }
            }
        };

        Ok(Entry::Goto(Goto {
            label,
            target,
            jump,
        }))
    }

    fn error_entry(
        &self,
        error: ErrorDeclaration,
        do_break: Option<bool>,
        label: Option<String>,
        jump: Option<String>,
    ) -> Result<Entry, DeclarationError> {
        let error = match error {
            ErrorDeclaration::Message(message) => {
                let message = message.trim();
                if message.is_empty() {
                    return Err(DeclarationError::EmptyErrorValue);
                }
                ErrorValue::Message(message.to_string())
            }
            ErrorDeclaration::Method(method) => ErrorValue::Method(
                self.method(method)
                    .map_err(DeclarationError::in_field("error"))?,
            ),
        };

        // Control is already redirected explicitly by a jump or the method
        let break_on_emit = do_break.unwrap_or(true)
            && jump.is_none()
            && matches!(error, ErrorValue::Message(_));

        Ok(Entry::Error(ErrorEntry {
            label,
            error,
            jump,
            break_on_emit,
        }))
    }

    fn sequence_entry(
        &self,
        sequence: Declaration,
        label: Option<String>,
        jump: Option<String>,
    ) -> Result<Entry, DeclarationError> {
        let sequence = match sequence {
            Declaration::Sequence(sequence) => Arc::new(sequence),
            Declaration::Json(JsonValue::Array(items)) => Arc::new(self.sequence_from_items(items)),
            _ => {
                return Err(DeclarationError::InvalidField {
                    key: "sequence",
                    expected: "a sequence or an array of declarations",
                })
            }
        };

        Ok(Entry::Sequence(SequenceEntry {
            label,
            sequence,
            jump,
        }))
    }

    /// Build a nested sequence from a JSON array; invalid items are dropped
    fn sequence_from_items(&self, items: Vec<JsonValue>) -> Sequence {
        items
            .into_iter()
            .fold(self.owner.child(), |sequence, item| sequence.add(item))
    }
}
