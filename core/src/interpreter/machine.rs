//! Sequence stack machine
//!
//! This module contains the primitive handlers - the heart of the interpreter.
//! The machine applies one [`Signal`] at a time to the active (top) frame.
//!
//! ## Function Organization
//! 1. apply() - entry point used by the context driver
//! 2. Primitives - next, proceed (true/continue), leave (false/break),
//!    goto, errors, end
//! 3. Dispatch - per entry kind
//! 4. Loops - control check, body runs, exit routing
//! 5. Frames - boundary crossings between parent and child sequences
//!
//! Loop re-checks and gotos never recurse back into the machine. They are
//! parked in `tail` and run by `apply` once the current primitive returns,
//! so a loop or a backward jump that never waits on an operation iterates
//! instead of growing the stack.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use super::frame::{Child, ChildRole, Construct, Frame, LoopState};
use crate::context::{ActiveSequence, Context};
use crate::declaration::clean_label;
use crate::errors::SequenceError;
use crate::sequence::Sequence;
use crate::types::{
    Entry, ErrorValue, GotoTarget, Loop, LoopControl, LoopFailure, Outcome, Signal,
};

type Step = Result<(), SequenceError>;

/// Continuation parked by a primitive for `apply` to run next
#[derive(Debug)]
enum Tail {
    CheckLoop,
    Goto(String),
}

/* ===================== Machine ===================== */

/// All execution state of one top-level run
#[derive(Debug)]
pub(crate) struct Machine {
    run_id: Uuid,
    /// Never popped
    root: Frame,
    /// Loop bodies and nested sequences, innermost last
    children: Vec<Child>,
    tail: Option<Tail>,
}

impl Machine {
    pub fn new(sequence: Sequence) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            root: Frame::new(Arc::new(sequence)),
            children: Vec::new(),
            tail: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn is_finished(&self) -> bool {
        self.root.finished
    }

    pub fn active_sequence(&self) -> ActiveSequence {
        let frame = self.children.last().map_or(&self.root, |child| &child.frame);
        ActiveSequence {
            name: frame.sequence.name().map(str::to_owned),
            depth: self.children.len(),
        }
    }

    fn active(&mut self) -> &mut Frame {
        match self.children.last_mut() {
            Some(child) => &mut child.frame,
            None => &mut self.root,
        }
    }

    /// Apply one continuation signal to the active sequence.
    ///
    /// Protocol faults are folded into the root's errors and end the run.
    pub fn apply(&mut self, ctx: &Context, signal: Signal) {
        trace!(signal = signal.name(), depth = self.children.len(), "apply");

        let mut result = match signal {
            Signal::Next => self.next(ctx),
            Signal::Continue => self.proceed(ctx, "continue"),
            Signal::True => self.proceed(ctx, "true"),
            Signal::Break | Signal::False => self.leave(ctx),
            Signal::Goto(label) => self.goto(ctx, &label),
            Signal::Errors(values) => self.errors(ctx, values, true),
            Signal::End => self.end(ctx),
        };

        while result.is_ok() {
            let Some(tail) = self.tail.take() else {
                break;
            };
            result = match tail {
                Tail::CheckLoop => self.check_loop(ctx),
                Tail::Goto(label) => self.goto(ctx, &label),
            };
        }

        if let Err(fault) = result {
            self.tail = None;
            self.abort(ctx, fault);
        }
    }

    /// Must be the last thing a primitive does
    fn schedule(&mut self, tail: Tail) -> Step {
        self.tail = Some(tail);
        Ok(())
    }

    /* ===================== Primitives ===================== */

    /// Fire the pending jump, or run the entry at the cursor
    fn next(&mut self, ctx: &Context) -> Step {
        let jump = {
            let frame = self.active();
            if frame.finished {
                return Err(SequenceError::Finished("next"));
            }
            frame.pending_jump.take()
        };

        match jump {
            Some(label) => self.schedule(Tail::Goto(label)),
            None => self.advance(ctx),
        }
    }

    fn advance(&mut self, ctx: &Context) -> Step {
        let entry = {
            let frame = self.active();
            let entry = frame.sequence.entries().get(frame.cursor).cloned();
            if entry.is_some() {
                frame.cursor += 1;
            }
            entry
        };

        match entry {
            Some(entry) => self.dispatch(ctx, entry, None),
            None => self.complete(ctx),
        }
    }

    /// `true()` / `continue()`
    fn proceed(&mut self, ctx: &Context, primitive: &'static str) -> Step {
        let top = {
            let frame = self.active();
            if frame.finished {
                return Err(SequenceError::Finished(primitive));
            }
            frame.stack.pop()
        };

        match top {
            Some(Construct::Loop(state)) => {
                self.active().stack.push(Construct::Loop(state));
                self.run_block(ctx)
            }
            Some(Construct::Conditional(cond)) => match &cond.then {
                Some(then) => self.dispatch(ctx, then.clone(), None),
                None => self.next(ctx),
            },
            None => {
                let Some(Child { role, mut frame }) = self.pop_child(ctx) else {
                    return Err(SequenceError::NoConstruct(primitive));
                };
                let errors = frame.take_errors();
                match role {
                    // Restart the loop's check, carrying this run's errors
                    ChildRole::LoopBody => {
                        self.loop_state()?.errors.extend(errors);
                        self.schedule(Tail::CheckLoop)
                    }
                    ChildRole::Nested => {
                        self.active().record_errors(errors);
                        self.proceed(ctx, primitive)
                    }
                }
            }
        }
    }

    /// `false()` / `break()`
    fn leave(&mut self, ctx: &Context) -> Step {
        let top = {
            let frame = self.active();
            if frame.finished {
                debug!("break() on a finished sequence ignored");
                return Ok(());
            }
            frame.pending_jump = None;
            frame.stack.pop()
        };

        match top {
            Some(Construct::Conditional(cond)) => match &cond.otherwise {
                Some(otherwise) => self.dispatch(ctx, otherwise.clone(), None),
                None => self.next(ctx),
            },
            Some(Construct::Loop(state)) => self.exit_loop(ctx, state),
            None => {
                let Some(Child { role, mut frame }) = self.pop_child(ctx) else {
                    return self.end(ctx);
                };
                let errors = frame.take_errors();
                match role {
                    ChildRole::LoopBody => self.exit_body(ctx, errors),
                    ChildRole::Nested => {
                        if errors.is_empty() {
                            self.leave(ctx)
                        } else {
                            self.errors(ctx, errors, true)
                        }
                    }
                }
            }
        }
    }

    /// The cursor ran past the last entry
    fn complete(&mut self, ctx: &Context) -> Step {
        if !self.active().stack.is_empty() {
            return self.leave(ctx);
        }

        let Some(Child { role, mut frame }) = self.pop_child(ctx) else {
            return self.end(ctx);
        };
        let errors = frame.take_errors();
        match role {
            // Running off the end of a body breaks the loop; only continue() repeats it
            ChildRole::LoopBody => self.exit_body(ctx, errors),
            ChildRole::Nested => {
                if errors.is_empty() {
                    self.next(ctx)
                } else {
                    self.errors(ctx, errors, true)
                }
            }
        }
    }

    fn goto(&mut self, ctx: &Context, label: &str) -> Step {
        if self.active().finished {
            return Err(SequenceError::Finished("goto"));
        }
        let label = clean_label(Some(label)).ok_or(SequenceError::EmptyLabel)?;

        match label.as_str() {
            "continue" => self.proceed(ctx, "continue"),
            "break" => self.leave(ctx),
            "end" => self.end(ctx),
            _ => {
                let frame = self.active();
                let index = frame
                    .sequence
                    .label_index(&label)
                    .ok_or_else(|| SequenceError::UnknownLabel(label.clone()))?;
                trace!(%label, index, "goto");
                // Jumping abandons whatever was still awaiting in this frame
                frame.pending_jump = None;
                frame.stack.clear();
                frame.cursor = index;
                self.advance(ctx)
            }
        }
    }

    fn errors(&mut self, ctx: &Context, values: Vec<JsonValue>, break_on_emit: bool) -> Step {
        let frame = self.active();
        if frame.finished {
            warn!(?values, "errors() called after sequence completed; ignored");
            return Ok(());
        }

        if let Some(Construct::Loop(state)) = frame.stack.last_mut() {
            state.errors.extend(values);
            return self.leave(ctx);
        }

        frame.record_errors(values);
        if break_on_emit && frame.sequence.break_on_error() {
            self.leave(ctx)
        } else {
            self.next(ctx)
        }
    }

    fn end(&mut self, ctx: &Context) -> Step {
        {
            let frame = self.active();
            if frame.finished {
                return Ok(());
            }
            frame.finished = true;
            frame.pending_jump = None;
            frame.stack.clear();
        }

        if let Some(Child { mut frame, .. }) = self.pop_child(ctx) {
            let errors = frame.take_errors();
            self.active().record_errors(errors);
            return self.end(ctx);
        }

        self.finish(ctx);
        Ok(())
    }

    /// Report the root's outcome to the context and its handlers
    fn finish(&mut self, ctx: &Context) {
        let sequence = Arc::clone(&self.root.sequence);
        let outcome = if self.root.has_errors() {
            Outcome::Failure(self.root.errors.clone().unwrap_or_default())
        } else {
            Outcome::Success
        };

        debug!(
            run_id = %self.run_id,
            success = outcome.is_success(),
            errors = outcome.errors().len(),
            "sequence finished"
        );
        ctx.record_outcome(outcome.clone());

        match &outcome {
            Outcome::Success => {
                if let Some(handler) = sequence.success_handler() {
                    handler(ctx);
                }
            }
            Outcome::Failure(errors) => {
                if let Some(handler) = sequence.error_handler() {
                    handler(ctx, errors);
                }
            }
        }
    }

    fn abort(&mut self, ctx: &Context, fault: SequenceError) {
        if self.root.finished {
            error!(run_id = %self.run_id, %fault, "protocol fault after sequence completed");
            return;
        }
        error!(run_id = %self.run_id, %fault, "protocol fault; ending run");

        while let Some(Child { mut frame, .. }) = self.pop_child(ctx) {
            let errors = frame.take_errors();
            self.active().record_errors(errors);
        }
        self.root.record_errors(vec![JsonValue::String(fault.to_string())]);

        if let Err(fault) = self.end(ctx) {
            error!(run_id = %self.run_id, %fault, "failed to end run after fault");
        }
    }

    /* ===================== Dispatch ===================== */

    /// Run one entry. `fallback_jump` applies when the entry has no jump of its own.
    fn dispatch(&mut self, ctx: &Context, entry: Entry, fallback_jump: Option<&str>) -> Step {
        trace!(kind = entry.kind_name(), label = ?entry.label(), "dispatch");
        self.active().pending_jump = entry.jump().or(fallback_jump).map(str::to_owned);

        match entry {
            Entry::Method(call) => {
                call.invoke(ctx);
                Ok(())
            }

            Entry::Conditional(cond) => {
                self.active()
                    .stack
                    .push(Construct::Conditional(Arc::clone(&cond)));
                cond.condition.invoke(ctx);
                Ok(())
            }

            Entry::Loop(def) => {
                self.active().stack.push(Construct::Loop(LoopState::new(def)));
                self.check_loop(ctx)
            }

            Entry::Error(error) => match error.error {
                ErrorValue::Message(message) => {
                    self.errors(ctx, vec![JsonValue::String(message)], error.break_on_emit)
                }
                // The method signals the sequence itself
                ErrorValue::Method(call) => {
                    call.invoke(ctx);
                    Ok(())
                }
            },

            Entry::Goto(goto) => {
                let label = match &goto.target {
                    GotoTarget::Label(label) => label.clone(),
                    GotoTarget::Resolver { resolver, params } => resolver(ctx, params),
                };
                self.schedule(Tail::Goto(label))
            }

            Entry::Sequence(nested) => {
                self.push_frame(ctx, nested.sequence, ChildRole::Nested);
                self.next(ctx)
            }
        }
    }

    /* ===================== Loops ===================== */

    fn loop_state(&mut self) -> Result<&mut LoopState, SequenceError> {
        match self.active().stack.last_mut() {
            Some(Construct::Loop(state)) => Ok(state),
            _ => Err(SequenceError::NoLoop),
        }
    }

    fn pop_loop(&mut self) -> Result<LoopState, SequenceError> {
        match self.active().stack.pop() {
            Some(Construct::Loop(state)) => Ok(state),
            _ => Err(SequenceError::NoLoop),
        }
    }

    fn check_loop(&mut self, ctx: &Context) -> Step {
        let def = Arc::clone(&self.loop_state()?.def);
        match &def.control {
            LoopControl::Always => self.run_block(ctx),
            LoopControl::Method(call) => {
                call.invoke(ctx);
                Ok(())
            }
        }
    }

    fn run_block(&mut self, ctx: &Context) -> Step {
        let block = {
            let state = self.loop_state()?;
            state.ran = true;
            Arc::clone(&state.def.block)
        };
        self.push_frame(ctx, block, ChildRole::LoopBody);
        self.next(ctx)
    }

    /// A body frame already popped: take its loop off the stack and route the exit
    fn exit_body(&mut self, ctx: &Context, errors: Vec<JsonValue>) -> Step {
        let mut state = self.pop_loop()?;
        state.errors.extend(errors);
        self.exit_loop(ctx, state)
    }

    /// Route a finished loop. The loop is already off the stack, so handlers
    /// run as ordinary entries of the enclosing sequence.
    fn exit_loop(&mut self, ctx: &Context, state: LoopState) -> Step {
        let LoopState { def, errors, ran } = state;
        debug!(ran, errors = errors.len(), "loop exit");

        // Stopped by the control check before the body ever ran
        if !ran {
            return if errors.is_empty() {
                self.resume_after_loop(ctx, &def)
            } else {
                self.errors(ctx, errors, true)
            };
        }

        if errors.is_empty() {
            return match &def.on_success {
                Some(entry) => self.dispatch(ctx, entry.clone(), def.jump.as_deref()),
                None => self.resume_after_loop(ctx, &def),
            };
        }

        match &def.on_error {
            Some(LoopFailure::Entry(entry)) => {
                self.dispatch(ctx, entry.clone(), def.jump.as_deref())
            }
            Some(LoopFailure::Suppress) => self.resume_after_loop(ctx, &def),
            None => self.errors(ctx, errors, true),
        }
    }

    /// Continue the enclosing sequence, honoring the loop's own jump
    fn resume_after_loop(&mut self, ctx: &Context, def: &Loop) -> Step {
        self.active().pending_jump = def.jump.clone();
        self.next(ctx)
    }

    /* ===================== Frames ===================== */

    fn push_frame(&mut self, ctx: &Context, sequence: Arc<Sequence>, role: ChildRole) {
        trace!(
            depth = self.children.len() + 1,
            sequence = ?sequence.name(),
            ?role,
            "enter sequence"
        );
        self.children.push(Child {
            role,
            frame: Frame::new(sequence),
        });
        ctx.set_active(Some(self.active_sequence()));
    }

    /// Pop the active child frame and point the context back at its parent
    fn pop_child(&mut self, ctx: &Context) -> Option<Child> {
        let child = self.children.pop()?;
        trace!(depth = self.children.len(), role = ?child.role, "leave sequence");
        ctx.set_active(Some(self.active_sequence()));
        Some(child)
    }
}
