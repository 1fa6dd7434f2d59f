//! Decoding declaration objects from JSON
//!
//! Decoding never fails: a key holding a value of the wrong type is carried
//! through in a shape the normalizer rejects with a precise error, so the key
//! precedence rules still decide which entry kind an object produces.

use serde_json::{Map, Value as JsonValue};

use super::{
    Declaration, DeclarationObject, ErrorDeclaration, GotoDeclaration, LoopControlDeclaration,
    OnErrorDeclaration,
};

impl DeclarationObject {
    pub fn from_json_map(mut map: Map<String, JsonValue>) -> Self {
        let mut take = |key: &str| map.remove(key);

        let label = take("label").and_then(|v| v.as_str().map(str::to_owned));
        let jump = take("jump").and_then(|v| v.as_str().map(str::to_owned));
        let do_break = take("do-break").and_then(|v| v.as_bool());

        Self {
            label,
            method: take("method").map(Declaration::Json),
            params: take("params"),
            condition: take("if").map(Declaration::Json),
            then: take("then").map(Declaration::Json),
            otherwise: take("else").map(Declaration::Json),
            control: take("loop").map(|v| match v {
                JsonValue::Bool(flag) => LoopControlDeclaration::Flag(flag),
                other => LoopControlDeclaration::Method(Declaration::Json(other)),
            }),
            block: take("block").map(Declaration::Json),
            on_success: take("on-success").map(Declaration::Json),
            on_error: take("on-error").map(|v| match v {
                JsonValue::Bool(flag) => OnErrorDeclaration::Flag(flag),
                other => OnErrorDeclaration::Entry(Declaration::Json(other)),
            }),
            goto: take("goto").map(goto_from_json),
            error: take("error").map(|v| match v {
                JsonValue::String(message) => ErrorDeclaration::Message(message),
                other => ErrorDeclaration::Method(Declaration::Json(other)),
            }),
            do_break,
            sequence: take("sequence").map(Declaration::Json),
            jump,
        }
    }
}

/// `"label"` or `{ "method": "resolver-name", "params": ... }`
fn goto_from_json(value: JsonValue) -> GotoDeclaration {
    match value {
        JsonValue::String(label) => GotoDeclaration::Label(label),
        JsonValue::Object(mut map) => {
            let name = map
                .remove("method")
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default();
            GotoDeclaration::Named {
                name,
                params: map.remove("params"),
            }
        }
        // Not a usable target; rejected as an empty label
        _ => GotoDeclaration::Label(String::new()),
    }
}
