//! Caller-supplied name lookup
//!
//! Declarations may name an operation by string instead of carrying the
//! callable itself. Names resolve against an explicit [`Registry`] handed to
//! the sequence at construction; there is no global table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::context::Context;
use crate::types::{LabelResolver, Operation};

/// Named operations and label resolvers
#[derive(Clone, Default)]
pub struct Registry {
    operations: HashMap<String, Operation>,
    resolvers: HashMap<String, LabelResolver>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation under `name` (surrounding whitespace ignored)
    pub fn register<F>(&mut self, name: impl Into<String>, operation: F) -> &mut Self
    where
        F: Fn(&Context, &[JsonValue]) + Send + Sync + 'static,
    {
        let name = name.into().trim().to_string();
        self.operations.insert(name, Arc::new(operation));
        self
    }

    /// Register a goto label resolver under `name`
    pub fn register_resolver<F>(&mut self, name: impl Into<String>, resolver: F) -> &mut Self
    where
        F: Fn(&Context, &[JsonValue]) -> String + Send + Sync + 'static,
    {
        let name = name.into().trim().to_string();
        self.resolvers.insert(name, Arc::new(resolver));
        self
    }

    /// Builder form of [`Registry::register`]
    pub fn with_operation<F>(mut self, name: impl Into<String>, operation: F) -> Self
    where
        F: Fn(&Context, &[JsonValue]) + Send + Sync + 'static,
    {
        self.register(name, operation);
        self
    }

    /// Builder form of [`Registry::register_resolver`]
    pub fn with_resolver<F>(mut self, name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&Context, &[JsonValue]) -> String + Send + Sync + 'static,
    {
        self.register_resolver(name, resolver);
        self
    }

    pub fn operation(&self, name: &str) -> Option<Operation> {
        self.operations.get(name.trim()).cloned()
    }

    pub fn resolver(&self, name: &str) -> Option<LabelResolver> {
        self.resolvers.get(name.trim()).cloned()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut operations: Vec<_> = self.operations.keys().collect();
        operations.sort();
        let mut resolvers: Vec<_> = self.resolvers.keys().collect();
        resolvers.sort();
        f.debug_struct("Registry")
            .field("operations", &operations)
            .field("resolvers", &resolvers)
            .finish()
    }
}
