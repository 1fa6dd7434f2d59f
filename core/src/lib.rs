//! Cadence core
//!
//! A continuation-driven interpreter for declarative step sequences. Callers
//! declare steps (operations, conditionals, loops, gotos, errors, nested
//! sequences), the [`Sequence`] normalizes them into canonical entries, and a
//! run advances only when an operation calls a primitive on its [`Context`].

pub mod config;
pub mod context;
pub mod declaration;
pub mod errors;
mod interpreter;
pub mod logging;
pub mod registry;
pub mod sequence;
pub mod types;

// Re-export main types
pub use types::*;

pub use config::{Config, EngineConfig, LoggingConfig};
pub use context::{ActiveSequence, Context};
pub use declaration::{
    Declaration, DeclarationObject, ErrorDeclaration, GotoDeclaration, LoopControlDeclaration,
    OnErrorDeclaration,
};
pub use errors::{DeclarationError, SequenceError};
pub use registry::Registry;
pub use sequence::{ErrorHandler, Sequence, SuccessHandler};
