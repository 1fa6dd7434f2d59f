//! Tests for nested sequence entries and parent/child boundaries

use serde_json::json;

use super::helpers::Trace;
use crate::declaration::DeclarationObject;
use crate::registry::Registry;
use crate::sequence::Sequence;

#[test]
fn test_nested_sequence_resumes_parent() {
    let trace = Trace::new();
    let inner = Sequence::new().add(trace.step("x")).add(trace.step("y"));

    trace
        .watch(
            Sequence::new()
                .add(trace.step("a"))
                .add(inner)
                .add(trace.step("b")),
        )
        .start();

    assert_eq!(trace.events(), vec!["a", "x", "y", "b", "success"]);
}

#[test]
fn test_nested_sequence_jump() {
    let trace = Trace::new();
    let inner = Sequence::new().add(trace.step("x"));

    trace
        .watch(
            Sequence::new()
                .add(DeclarationObject::sequence(inner).jump("final"))
                .add(trace.step("skipped"))
                .add(DeclarationObject::method(trace.step("final")).label("final")),
        )
        .start();

    assert_eq!(trace.events(), vec!["x", "final", "success"]);
}

#[test]
fn test_nested_errors_reach_parent() {
    let trace = Trace::new();
    let inner = Sequence::new()
        .add(trace.fail("x", json!("inner")))
        .add(trace.step("y"));

    let ctx = trace
        .watch(
            Sequence::new()
                .add(inner)
                .add(trace.step("b")),
        )
        .start();

    assert_eq!(trace.events(), vec!["x", r#"failure:["inner"]"#]);
    assert_eq!(ctx.get_errors(), vec![json!("inner")]);
}

#[test]
fn test_nested_errors_without_break_surface_on_completion() {
    let trace = Trace::new();
    let inner = Sequence::new()
        .set_break_on_error(false)
        .add(trace.fail("x", json!("inner")))
        .add(trace.step("y"));

    trace
        .watch(Sequence::new().add(inner).add(trace.step("b")))
        .start();

    assert_eq!(trace.events(), vec!["x", "y", r#"failure:["inner"]"#]);
}

#[test]
fn test_nested_break_breaks_parent() {
    let trace = Trace::new();
    let inner = Sequence::new()
        .add(trace.op("x", |ctx| ctx.break_()))
        .add(trace.step("y"));

    trace
        .watch(Sequence::new().add(inner).add(trace.step("b")))
        .start();

    assert_eq!(trace.events(), vec!["x", "success"]);
}

#[test]
fn test_nested_end_ends_the_run() {
    let trace = Trace::new();
    let inner = Sequence::new()
        .set_break_on_error(false)
        .add(trace.fail("x", json!("kept")))
        .add(trace.op("stop", |ctx| ctx.end()))
        .add(trace.step("skipped"));

    let ctx = trace
        .watch(Sequence::new().add(inner).add(trace.step("b")))
        .start();

    assert_eq!(trace.events(), vec!["x", "stop", r#"failure:["kept"]"#]);
    assert_eq!(ctx.get_errors(), vec![json!("kept")]);
}

#[test]
fn test_goto_resolves_in_the_active_sequence() {
    let trace = Trace::new();
    let inner = Sequence::new()
        .add(trace.op("jump", |ctx| ctx.goto("last")))
        .add(trace.step("skipped"))
        .add(DeclarationObject::method(trace.step("inner-last")).label("last"));

    trace
        .watch(
            Sequence::new()
                .add(inner)
                .add(trace.step("b"))
                .add(DeclarationObject::method(trace.step("outer-last")).label("last")),
        )
        .start();

    assert_eq!(
        trace.events(),
        vec!["jump", "inner-last", "b", "outer-last", "success"]
    );
}

#[test]
fn test_goto_does_not_reach_parent_labels() {
    let trace = Trace::new();
    let inner = Sequence::new().add(trace.op("jump", |ctx| ctx.goto("top")));

    let ctx = trace
        .watch(
            Sequence::new()
                .add(DeclarationObject::method(trace.step("a")).label("top"))
                .add(inner),
        )
        .start();

    assert_eq!(ctx.get_errors(), vec![json!("missing goto label [top]")]);
    assert_eq!(trace.count("a"), 1);
}

#[test]
fn test_nested_arrays_from_json() {
    let trace = Trace::new();
    let step_trace = trace.clone();
    let registry = Registry::new().with_operation("step", move |ctx, params| {
        step_trace.push(params[0].as_str().unwrap_or_default());
        ctx.next();
    });

    let sequence = Sequence::from_json(
        json!([
            { "method": "step", "params": "a" },
            [
                { "method": "step", "params": "x" },
                [{ "method": "step", "params": "deep" }]
            ],
            { "sequence": [{ "method": "step", "params": "y" }], "label": "sub" },
            { "method": "step", "params": "b" }
        ]),
        registry,
    )
    .unwrap();

    trace.watch(sequence).start();

    assert_eq!(
        trace.events(),
        vec!["a", "x", "deep", "y", "b", "success"]
    );
}
