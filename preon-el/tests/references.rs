use preon_el::{
    parse, ContextNode, Expr, Object, ObjectScope, Reference, ReferenceContext, Span,
    StaticContext, Value,
};
use std::sync::Arc;

fn header_in_frame() -> Arc<dyn ReferenceContext> {
    Arc::new(
        StaticContext::new("Header")
            .with_integer("len")
            .with_outer(StaticContext::new("Frame").with_integer("version")),
    )
}

fn frame_with_header() -> Arc<dyn ReferenceContext> {
    Arc::new(
        StaticContext::new("Frame")
            .with_integer("version")
            .with_object("header", StaticContext::new("Header").with_integer("len")),
    )
}

fn extract_reference(expr: Expr) -> Reference {
    match expr {
        Expr::Reference(reference) => reference,
        other => panic!("expected a reference, got {other:?}"),
    }
}

#[test]
fn equality_is_by_segment_sequence() {
    let ctx = frame_with_header();
    let a = extract_reference(parse("header.len", &ctx).unwrap());
    let b = extract_reference(parse("header.len", &ctx).unwrap());
    let c = extract_reference(parse("version", &ctx).unwrap());
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn rescope_preserves_the_resolved_value() {
    // `len`, valid inside Header, rescoped through the `header` attribute
    // of Frame, must evaluate to the same value from the Frame scope.
    let inner_ctx = header_in_frame();
    let inner = extract_reference(parse("len", &inner_ctx).unwrap());

    let outer_ctx = frame_with_header();
    let prefix = extract_reference(parse("header", &outer_ctx).unwrap());
    let rescoped = inner.rescope(&prefix);

    let mut header = Object::new();
    header.set("len", Value::Integer(12));
    let mut frame = Object::new();
    frame.set("version", Value::Integer(2));
    frame.set("header", Value::Object(header.clone()));

    let frame_scope = ObjectScope::new(&frame, None);
    let header_scope = ObjectScope::new(&header, Some(&frame_scope));

    assert_eq!(
        inner.eval(&header_scope).unwrap(),
        rescoped.eval(&frame_scope).unwrap(),
    );
}

#[test]
fn rescope_cancels_leading_outer_segments() {
    // `outer.version`, valid inside Header, becomes plain `version` once
    // rescoped through `header` up into Frame.
    let inner_ctx = header_in_frame();
    let inner = extract_reference(parse("outer.version", &inner_ctx).unwrap());

    let outer_ctx = frame_with_header();
    let prefix = extract_reference(parse("header", &outer_ctx).unwrap());
    let rescoped = inner.rescope(&prefix);
    assert_eq!(rescoped.path(), "version");

    let expected = extract_reference(parse("version", &outer_ctx).unwrap());
    assert_eq!(rescoped, expected);
}

#[test]
fn narrowing_keeps_the_path() {
    let ctx = frame_with_header();
    let reference = extract_reference(parse("header", &ctx).unwrap());
    let narrowed = reference.narrow(ContextNode::integer());
    assert_eq!(narrowed, reference);
    assert_eq!(narrowed.ty(), preon_el::StaticType::Integer);
}

#[test]
fn index_expressions_evaluate_in_the_reference_scope() {
    let ctx: Arc<dyn ReferenceContext> = Arc::new(
        StaticContext::new("Frame")
            .with_integer("cursor")
            .with_list("items", ContextNode::string()),
    );
    let expr = parse("items[cursor - 1]", &ctx).unwrap();

    let mut frame = Object::new();
    frame.set("cursor", Value::Integer(2));
    frame.set(
        "items",
        Value::List(vec![
            Value::String("a".into()),
            Value::String("b".into()),
            Value::String("c".into()),
        ]),
    );
    let scope = ObjectScope::new(&frame, None);
    assert_eq!(expr.eval(&scope).unwrap(), Value::String("b".into()));
}

#[test]
fn unresolved_and_out_of_bounds_references_fail_cleanly() {
    let ctx: Arc<dyn ReferenceContext> = Arc::new(
        StaticContext::new("Frame")
            .with_integer("n")
            .with_list("items", ContextNode::integer()),
    );

    let expr = parse("n", &ctx).unwrap();
    let empty = Object::new();
    let scope = ObjectScope::new(&empty, None);
    assert!(matches!(
        expr.eval(&scope),
        Err(preon_el::EvalError::Unresolved { path }) if path == "n"
    ));

    let expr = parse("items[5]", &ctx).unwrap();
    let mut frame = Object::new();
    frame.set("items", Value::List(vec![Value::Integer(1)]));
    let scope = ObjectScope::new(&frame, None);
    assert!(matches!(
        expr.eval(&scope),
        Err(preon_el::EvalError::IndexOutOfBounds { index: 5, len: 1, .. })
    ));
}

#[test]
fn select_attribute_rejects_scalars() {
    let ctx: Arc<dyn ReferenceContext> =
        Arc::new(StaticContext::new("Frame").with_integer("n"));
    let reference = Reference::scope(Arc::clone(&ctx))
        .select_attribute("n", Span::new(1, 1))
        .unwrap();
    assert!(reference.select_attribute("x", Span::new(1, 3)).is_err());
}
