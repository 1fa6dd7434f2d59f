//! Tests for the sequence interpreter
//!
//! Organized by entry kind / feature area

mod helpers;
mod loop_tests;
mod nested_tests;
