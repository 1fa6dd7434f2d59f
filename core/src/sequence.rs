//! Sequence builder
//!
//! A [`Sequence`] is an ordered, named list of canonical entries plus a
//! case-insensitive label table. It is built once with the chainable API and
//! is read-only while running: every run (and every loop-body iteration)
//! executes over a fresh frame that points at a shared template.
//!
//! # Example
//!
//! ```
//! use cadence_core::{Declaration, Sequence};
//!
//! let ctx = Sequence::new()
//!     .add(Declaration::operation(|ctx, _| ctx.next()))
//!     .add(Declaration::operation(|ctx, _| ctx.next()))
//!     .on_success(|_| println!("done"))
//!     .start();
//!
//! assert!(ctx.is_finished());
//! assert!(!ctx.has_errors());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::config::EngineConfig;
use crate::context::Context;
use crate::declaration::{clean_label, Declaration, Normalizer};
use crate::errors::DeclarationError;
use crate::registry::Registry;
use crate::types::Entry;

/// Called once when a root sequence finishes without errors
pub type SuccessHandler = Arc<dyn Fn(&Context) + Send + Sync>;

/// Called once with the accumulated errors when a root sequence fails
pub type ErrorHandler = Arc<dyn Fn(&Context, &[JsonValue]) + Send + Sync>;

#[derive(Clone)]
pub struct Sequence {
    name: Option<String>,
    entries: Vec<Entry>,
    labels: HashMap<String, usize>,
    break_on_error: bool,
    registry: Arc<Registry>,
    on_success: Option<SuccessHandler>,
    on_error: Option<ErrorHandler>,
}

impl Sequence {
    /// Create an empty sequence with an empty registry
    pub fn new() -> Self {
        Self::with_registry(Registry::default())
    }

    /// Create an empty sequence resolving named operations against `registry`
    pub fn with_registry(registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            name: None,
            entries: Vec::new(),
            labels: HashMap::new(),
            break_on_error: true,
            registry: registry.into(),
            on_success: None,
            on_error: None,
        }
    }

    /// Apply engine defaults
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.break_on_error = config.break_on_error;
        self
    }

    /// A new, empty sequence sharing this one's registry and error policy
    pub fn child(&self) -> Sequence {
        Self {
            break_on_error: self.break_on_error,
            ..Self::with_registry(Arc::clone(&self.registry))
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /* ===================== Entries ===================== */

    /// Append a declaration.
    ///
    /// Invalid declarations are reported through `tracing` and dropped; the
    /// entry list and label table are left untouched.
    pub fn add(mut self, declaration: impl Into<Declaration>) -> Self {
        if let Err(error) = self.try_add(declaration) {
            warn!(sequence = ?self.name, %error, "Attempt to introduce invalid entry");
        }
        self
    }

    /// Append a declaration, returning the rejection reason on failure
    pub fn try_add(&mut self, declaration: impl Into<Declaration>) -> Result<(), DeclarationError> {
        let entry = Normalizer::new(self).entry(declaration.into())?;
        self.push_entry(entry);
        Ok(())
    }

    /// Later entries with a duplicate label win
    pub(crate) fn push_entry(&mut self, entry: Entry) {
        if let Some(label) = entry.label() {
            self.labels.insert(label.to_string(), self.entries.len());
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry carrying `label` (case-insensitive)
    pub fn label_index(&self, label: &str) -> Option<usize> {
        let label = clean_label(Some(label))?;
        self.labels.get(&label).copied()
    }

    pub fn labels(&self) -> &HashMap<String, usize> {
        &self.labels
    }

    /* ===================== Settings ===================== */

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn break_on_error(&self) -> bool {
        self.break_on_error
    }

    pub fn set_break_on_error(mut self, flag: bool) -> Self {
        self.break_on_error = flag;
        self
    }

    pub fn on_success<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(handler));
        self
    }

    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Context, &[JsonValue]) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub(crate) fn success_handler(&self) -> Option<&SuccessHandler> {
        self.on_success.as_ref()
    }

    pub(crate) fn error_handler(&self) -> Option<&ErrorHandler> {
        self.on_error.as_ref()
    }

    /* ===================== Running ===================== */

    /// Start on a fresh context.
    ///
    /// Returns once no continuation is pending; the outcome is reported through
    /// the success/error handlers (and can be queried on the returned context).
    pub fn start(self) -> Context {
        let ctx = Context::new();
        self.start_with(&ctx);
        ctx
    }

    /// Start on a caller-supplied context
    pub fn start_with(self, ctx: &Context) {
        ctx.launch(self);
    }

    /* ===================== Documents ===================== */

    /// Build a sequence from a declaration document.
    ///
    /// Accepts a bare array of declarations, or an object with `steps` and the
    /// optional `name` and `break-on-error` keys.
    pub fn from_json(value: JsonValue, registry: impl Into<Arc<Registry>>) -> Result<Self> {
        let mut sequence = Sequence::with_registry(registry);

        let steps = match value {
            JsonValue::Array(steps) => steps,
            JsonValue::Object(mut document) => {
                if let Some(name) = document.get("name").and_then(|v| v.as_str()) {
                    sequence = sequence.named(name);
                }
                if let Some(flag) = document.get("break-on-error").and_then(|v| v.as_bool()) {
                    sequence = sequence.set_break_on_error(flag);
                }
                match document.remove("steps") {
                    Some(JsonValue::Array(steps)) => steps,
                    _ => anyhow::bail!("Sequence document requires a 'steps' array"),
                }
            }
            _ => anyhow::bail!("Sequence document must be an array or an object"),
        };

        Ok(steps.into_iter().fold(sequence, |sequence, step| sequence.add(step)))
    }

    /// Build a sequence from a TOML document (`name`, `break-on-error`, `[[steps]]`)
    pub fn from_toml_str(text: &str, registry: impl Into<Arc<Registry>>) -> Result<Self> {
        let value: JsonValue = toml::from_str(text).context("Failed to parse sequence document")?;
        Self::from_json(value, registry)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.name)
            .field("entries", &self.entries)
            .field("labels", &self.labels)
            .field("break_on_error", &self.break_on_error)
            .finish_non_exhaustive()
    }
}
