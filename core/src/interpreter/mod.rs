//! Sequence interpreter
//!
//! A frame/stack machine driven one continuation [`Signal`](crate::types::Signal)
//! at a time. The root run owns the bottom frame; loop bodies and nested
//! sequences push child frames above it and pop back to their parent when they
//! complete. The context's driver is the only caller.

mod frame;
pub(crate) mod machine;

#[cfg(test)]
mod tests;

pub(crate) use machine::Machine;
