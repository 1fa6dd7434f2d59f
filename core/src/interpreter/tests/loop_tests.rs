//! Tests for loop entries: control checks, body runs, exit routing

use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::helpers::Trace;
use crate::context::Context;
use crate::declaration::DeclarationObject;
use crate::registry::Registry;
use crate::sequence::Sequence;

#[test]
fn test_control_true_k_times_runs_block_k_times() {
    let trace = Trace::new();
    trace
        .watch(
            Sequence::new()
                .add(DeclarationObject::looping(trace.counter_condition("check", 3)).block(trace.repeat("body")))
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec!["check", "body", "check", "body", "check", "body", "check", "after", "success"]
    );
}

#[test]
fn test_literal_true_loop_exits_on_break() {
    let trace = Trace::new();
    let body = trace.counted("body", |ctx, run| {
        if run == 3 {
            ctx.break_();
        } else {
            ctx.continue_();
        }
    });

    trace
        .watch(
            Sequence::new()
                .add(DeclarationObject::looping(true).block(body))
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec!["body", "body", "body", "after", "success"]
    );
}

#[test]
fn test_literal_true_loop_break_routes_to_on_success() {
    let trace = Trace::new();
    let body = trace.counted("body", |ctx, run| {
        if run < 3 {
            ctx.continue_();
        } else {
            ctx.break_();
        }
    });

    trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(true)
                        .block(body)
                        .on_success(trace.step("done"))
                        .on_error(trace.step("recover")),
                )
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec!["body", "body", "body", "done", "after", "success"]
    );
    assert_eq!(trace.count("recover"), 0);
}

#[test]
fn test_body_running_off_its_end_exits_loop() {
    let trace = Trace::new();
    let body = trace.counted("body", |ctx, run| {
        if run < 5 {
            ctx.next();
        } else {
            ctx.break_();
        }
    });

    trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(true)
                        .block(body)
                        .on_success(trace.step("done")),
                )
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(trace.events(), vec!["body", "done", "after", "success"]);
}

#[test]
fn test_empty_literal_true_body_exits() {
    let trace = Trace::new();
    let step_trace = trace.clone();
    let registry = Registry::new().with_operation("after", move |ctx: &Context, _: &[JsonValue]| {
        step_trace.push("after");
        ctx.next();
    });

    let ctx = trace
        .watch(
            Sequence::from_json(json!([{ "loop": true, "block": [] }, "after"]), registry).unwrap(),
        )
        .start();

    assert!(ctx.is_finished());
    assert_eq!(trace.events(), vec!["after", "success"]);
}

#[test]
fn test_goto_continue_entry_iterates_many_times() {
    let trace = Trace::new();
    trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(trace.counter_condition("check", 2_000)).block(
                        Sequence::new()
                            .add(trace.step("tick"))
                            .add(DeclarationObject::goto("continue")),
                    ),
                )
                .add(trace.step("after")),
        )
        .start();

    let events = trace.events();
    assert_eq!(trace.count("tick"), 2_000);
    assert_eq!(events[events.len() - 2..], ["after", "success"]);
}

#[test]
fn test_loop_inside_nested_sequence_breaks_to_its_sequence() {
    let trace = Trace::new();
    let body = trace.counted("body", |ctx, run| {
        if run < 2 {
            ctx.continue_();
        } else {
            ctx.break_();
        }
    });
    let inner = Sequence::new()
        .named("inner")
        .add(DeclarationObject::looping(true).block(body))
        .add(trace.step("inner-after"));

    trace
        .watch(Sequence::new().add(inner).add(trace.step("b")))
        .start();

    assert_eq!(
        trace.events(),
        vec!["body", "body", "inner-after", "b", "success"]
    );
}

#[test]
fn test_control_false_first_skips_body_and_handlers() {
    let trace = Trace::new();
    trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(trace.counter_condition("check", 0))
                        .block(trace.step("body"))
                        .on_success(trace.step("done")),
                )
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(trace.events(), vec!["check", "after", "success"]);
}

#[test]
fn test_on_success_runs_after_clean_loop() {
    let trace = Trace::new();
    trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(trace.counter_condition("check", 1))
                        .block(trace.repeat("body"))
                        .on_success(trace.step("done")),
                )
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec!["check", "body", "check", "done", "after", "success"]
    );
}

#[test]
fn test_loop_jump_applies_on_exit() {
    let trace = Trace::new();
    trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(trace.counter_condition("check", 1))
                        .block(trace.step("body"))
                        .jump("final"),
                )
                .add(trace.step("skipped"))
                .add(DeclarationObject::method(trace.step("final")).label("final")),
        )
        .start();

    assert_eq!(trace.events(), vec!["check", "body", "final", "success"]);
}

#[test]
fn test_multi_entry_body() {
    let trace = Trace::new();
    trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(trace.counter_condition("check", 2))
                        .block(Sequence::new().add(trace.step("fetch")).add(trace.repeat("store"))),
                )
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec!["check", "fetch", "store", "check", "fetch", "store", "check", "after", "success"]
    );
}

#[test]
fn test_continue_in_body_restarts_check() {
    let trace = Trace::new();
    trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(trace.counter_condition("check", 2)).block(
                        Sequence::new()
                            .add(trace.op("a", |ctx| ctx.continue_()))
                            .add(trace.step("b")),
                    ),
                )
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec!["check", "a", "check", "a", "check", "after", "success"]
    );
    assert_eq!(trace.count("b"), 0);
}

#[test]
fn test_loop_errors_propagate_by_default() {
    let trace = Trace::new();
    let ctx = trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(trace.counter_condition("check", 3))
                        .block(trace.fail("body", json!("oops")))
                        .on_success(trace.step("done")),
                )
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec!["check", "body", r#"failure:["oops"]"#]
    );
    assert_eq!(ctx.get_errors(), vec![json!("oops")]);
}

#[test]
fn test_loop_errors_routed_to_on_error() {
    let trace = Trace::new();
    let ctx = trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(trace.counter_condition("check", 3))
                        .block(trace.fail("body", json!("oops")))
                        .on_error(trace.step("recover")),
                )
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec!["check", "body", "recover", "after", "success"]
    );
    assert!(!ctx.has_errors());
}

#[test]
fn test_suppressed_loop_errors_continue() {
    let trace = Trace::new();
    trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(trace.counter_condition("check", 3))
                        .block(trace.fail("body", json!("oops")))
                        .suppress_errors(),
                )
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(trace.events(), vec!["check", "body", "after", "success"]);
}

#[test]
fn test_body_without_break_on_error_accumulates() {
    let trace = Trace::new();
    let body = Sequence::new()
        .set_break_on_error(false)
        .add(trace.fail("body", json!("oops")))
        .add(trace.repeat("tail"));

    let ctx = trace
        .watch(
            Sequence::new()
                .add(DeclarationObject::looping(trace.counter_condition("check", 2)).block(body))
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec![
            "check",
            "body",
            "tail",
            "check",
            "body",
            "tail",
            "check",
            r#"failure:["oops","oops"]"#
        ]
    );
    assert_eq!(ctx.get_errors(), vec![json!("oops"), json!("oops")]);
}

#[test]
fn test_control_errors_stop_the_loop() {
    let trace = Trace::new();
    let control = trace.counted("check", |ctx, call| {
        if call == 1 {
            ctx.true_();
        } else {
            ctx.errors("check failed");
        }
    });

    let ctx = trace
        .watch(
            Sequence::new()
                .add(
                    DeclarationObject::looping(control)
                        .block(trace.repeat("body"))
                        .on_error(trace.step("recover")),
                )
                .add(trace.step("after")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec!["check", "body", "check", "recover", "after", "success"]
    );
    assert!(!ctx.has_errors());
}

#[test]
fn test_loop_from_json_with_registry() {
    let remaining = Arc::new(AtomicUsize::new(2));
    let trace = Trace::new();

    let registry = Registry::new()
        .with_operation("has_more", {
            let remaining = Arc::clone(&remaining);
            move |ctx: &Context, _: &[JsonValue]| {
                if remaining.load(Ordering::SeqCst) > 0 {
                    ctx.true_();
                } else {
                    ctx.false_();
                }
            }
        })
        .with_operation("take", {
            let remaining = Arc::clone(&remaining);
            let trace = trace.clone();
            move |ctx: &Context, _: &[JsonValue]| {
                remaining.fetch_sub(1, Ordering::SeqCst);
                trace.push("take");
                ctx.continue_();
            }
        })
        .with_operation("done", {
            let trace = trace.clone();
            move |ctx: &Context, _: &[JsonValue]| {
                trace.push("done");
                ctx.next();
            }
        });

    let ctx = Sequence::from_json(
        json!([{ "loop": "has_more", "block": ["take"], "on-success": "done" }]),
        registry,
    )
    .unwrap()
    .start();

    assert!(ctx.is_finished());
    assert_eq!(trace.events(), vec!["take", "take", "done"]);
    assert_eq!(remaining.load(Ordering::SeqCst), 0);
}
