use preon_codec::{
    Charset, Endian, EnumValue, FieldOptions, Object, Pipeline, Schema, StringTermination,
    TypeDecl, TypeRef, Value,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

fn object(fields: &[(&str, Value)]) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect::<Object>(),
    )
}

#[test]
fn dependent_length_roundtrip() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Frame")
            .field("n", TypeRef::U8, FieldOptions::new())
            .field("payload", TypeRef::Bytes, FieldOptions::new().length("n")),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Frame").unwrap();

    let bytes = hex::decode("03414243").unwrap();
    let decoded = codec.decode(&bytes).unwrap();
    assert_eq!(
        decoded,
        object(&[
            ("n", Value::Integer(3)),
            ("payload", Value::Bytes(vec![0x41, 0x42, 0x43])),
        ])
    );
    assert_eq!(codec.encode(&decoded).unwrap(), bytes);
}

#[test]
fn conditional_field() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Packet")
            .field("flag", TypeRef::U8, FieldOptions::new())
            .field("x", TypeRef::U16, FieldOptions::new().when("flag == 1")),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Packet").unwrap();

    let present = codec.decode(&[0x01, 0x00, 0x2A]).unwrap();
    assert_eq!(
        present,
        object(&[("flag", Value::Integer(1)), ("x", Value::Integer(42))])
    );
    assert_eq!(codec.encode(&present).unwrap(), vec![0x01, 0x00, 0x2A]);

    // A false guard leaves the field at its default and skips it on encode.
    let absent = codec.decode(&[0x00]).unwrap();
    assert_eq!(
        absent,
        object(&[("flag", Value::Integer(0)), ("x", Value::Integer(0))])
    );
    assert_eq!(codec.encode(&absent).unwrap(), vec![0x00]);
}

#[test]
fn skipped_field_takes_its_init_default() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Packet")
            .field("flag", TypeRef::U8, FieldOptions::new())
            .field(
                "x",
                TypeRef::U16,
                FieldOptions::new().when("flag == 1").init("7"),
            ),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Packet").unwrap();

    let absent = codec.decode(&[0x00]).unwrap();
    assert_eq!(
        absent,
        object(&[("flag", Value::Integer(0)), ("x", Value::Integer(7))])
    );
    // The init default never reaches the wire.
    assert_eq!(codec.encode(&absent).unwrap(), vec![0x00]);
}

#[test]
fn discriminated_union_dispatches_on_prefix() {
    let schema = Arc::new(
        Schema::new()
            .with(TypeDecl::new("Ta").field("a", TypeRef::U8, FieldOptions::new()))
            .with(TypeDecl::new("Tb").field("b", TypeRef::U16, FieldOptions::new()))
            .with(
                TypeDecl::new("Msg")
                    .field("tag", TypeRef::U8, FieldOptions::new())
                    .field(
                        "body",
                        TypeRef::Named("Ta".into()),
                        FieldOptions::new()
                            .choice("tag == 65", TypeRef::Named("Ta".into()))
                            .choice("tag == 66", TypeRef::Named("Tb".into())),
                    ),
            ),
    );
    let codec = Pipeline::new().codec_for(&schema, "Msg").unwrap();

    let a = codec.decode(&[0x41, 0x07]).unwrap();
    assert_eq!(
        a,
        object(&[
            ("tag", Value::Integer(65)),
            ("body", object(&[("a", Value::Integer(7))])),
        ])
    );
    assert_eq!(codec.encode(&a).unwrap(), vec![0x41, 0x07]);

    let b = codec.decode(&[0x42, 0x01, 0x00]).unwrap();
    assert_eq!(
        b,
        object(&[
            ("tag", Value::Integer(66)),
            ("body", object(&[("b", Value::Integer(256))])),
        ])
    );

    // An unknown tag with no default names the discriminating field.
    let error = codec.decode(&[0x5A, 0x00]).unwrap_err();
    assert!(error.to_string().contains("tag"), "{error}");
    assert!(error.to_string().contains("no choice guard matched"), "{error}");
}

#[test]
fn offset_override_reads_at_absolute_position() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Record")
            .field("a", TypeRef::U8, FieldOptions::new())
            .field("y", TypeRef::U16, FieldOptions::new().offset("32")),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Record").unwrap();

    // Six-byte record; `y` reads at bit 32 regardless of prior widths.
    let decoded = codec.decode(&[0x01, 0x02, 0x03, 0x04, 0x00, 0x2A]).unwrap();
    assert_eq!(
        decoded,
        object(&[("a", Value::Integer(1)), ("y", Value::Integer(42))])
    );

    // Encoding zero-pads the gap between the natural end and the offset.
    assert_eq!(
        codec.encode(&decoded).unwrap(),
        vec![0x01, 0x00, 0x00, 0x00, 0x00, 0x2A]
    );
}

#[test]
fn bit_level_fields_unpack_msb_first() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Pair")
            .field("a", TypeRef::U8, FieldOptions::new().bits(3))
            .field("b", TypeRef::U8, FieldOptions::new().bits(5)),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Pair").unwrap();

    let decoded = codec.decode(&[0xAB]).unwrap();
    assert_eq!(
        decoded,
        object(&[("a", Value::Integer(5)), ("b", Value::Integer(11))])
    );
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0xAB]);

    // The whole pair folds to a constant eight bits.
    assert_eq!(codec.size(), Some(&preon_codec::Expr::Integer(8)));
}

#[test]
fn little_endian_fields() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Le").field(
            "x",
            TypeRef::U32,
            FieldOptions::new().endian(Endian::Little),
        ),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Le").unwrap();
    let decoded = codec.decode(&[0xEF, 0xBE, 0xAD, 0xDE]).unwrap();
    assert_eq!(decoded, object(&[("x", Value::Integer(0xDEADBEEF))]));
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0xEF, 0xBE, 0xAD, 0xDE]);
}

#[rstest]
#[case(TypeRef::U16, Endian::Big, &[0x12, 0x34], 0x1234)]
#[case(TypeRef::U16, Endian::Little, &[0x34, 0x12], 0x1234)]
#[case(TypeRef::U32, Endian::Big, &[0x00, 0x00, 0x12, 0x34], 0x1234)]
#[case(TypeRef::I8, Endian::Big, &[0xFF], -1)]
#[case(TypeRef::I16, Endian::Little, &[0xFE, 0xFF], -2)]
fn integer_layouts(
    #[case] ty: TypeRef,
    #[case] endian: Endian,
    #[case] bytes: &[u8],
    #[case] expected: i64,
) {
    let schema = Arc::new(
        Schema::new()
            .with(TypeDecl::new("T").field("v", ty, FieldOptions::new().endian(endian))),
    );
    let codec = Pipeline::new().codec_for(&schema, "T").unwrap();
    let decoded = codec.decode(bytes).unwrap();
    assert_eq!(decoded, object(&[("v", Value::Integer(expected))]));
    assert_eq!(codec.encode(&decoded).unwrap(), bytes);
}

#[test]
fn float_fields_are_bit_exact() {
    let schema = Arc::new(
        Schema::new().with(TypeDecl::new("F").field("v", TypeRef::F32, FieldOptions::new())),
    );
    let codec = Pipeline::new().codec_for(&schema, "F").unwrap();
    let bytes = 1.5f32.to_bits().to_be_bytes();
    let decoded = codec.decode(&bytes).unwrap();
    assert_eq!(decoded, object(&[("v", Value::Float(1.5))]));
    assert_eq!(codec.encode(&decoded).unwrap(), bytes.to_vec());
}

#[test]
fn latin1_strings_map_bytes_to_scalars() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("L").field(
            "name",
            TypeRef::Str,
            FieldOptions::new().length("2").charset(Charset::Iso8859_1),
        ),
    ));
    let codec = Pipeline::new().codec_for(&schema, "L").unwrap();
    let decoded = codec.decode(&[0xE9, 0x21]).unwrap();
    assert_eq!(decoded, object(&[("name", Value::String("\u{E9}!".into()))]));
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0xE9, 0x21]);
}

#[test]
fn signed_fields_sign_extend() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("S")
            .field("a", TypeRef::I8, FieldOptions::new().bits(4))
            .field("b", TypeRef::I8, FieldOptions::new().bits(4)),
    ));
    let codec = Pipeline::new().codec_for(&schema, "S").unwrap();
    let decoded = codec.decode(&[0xF7]).unwrap();
    assert_eq!(
        decoded,
        object(&[("a", Value::Integer(-1)), ("b", Value::Integer(7))])
    );
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0xF7]);
}

#[test]
fn enum_fields_decode_to_enumerators() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Cmd").field(
            "kind",
            TypeRef::U8,
            FieldOptions::new()
                .variant(1, "Ping")
                .variant(2, "Pong")
                .variant_default("Ping"),
        ),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Cmd").unwrap();

    let pong = codec.decode(&[0x02]).unwrap();
    assert_eq!(
        pong,
        object(&[("kind", Value::Enum(EnumValue::new("Pong", 2)))])
    );
    assert_eq!(codec.encode(&pong).unwrap(), vec![0x02]);

    // Unmapped discriminants fall back to the default enumerator.
    let unknown = codec.decode(&[0x7F]).unwrap();
    assert_eq!(
        unknown,
        object(&[("kind", Value::Enum(EnumValue::new("Ping", 1)))])
    );
}

#[test]
fn enum_without_default_rejects_unknown_discriminants() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Cmd").field(
            "kind",
            TypeRef::U8,
            FieldOptions::new().variant(1, "Ping").variant(2, "Pong"),
        ),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Cmd").unwrap();
    let error = codec.decode(&[0x7F]).unwrap_err();
    assert!(error.to_string().contains("kind"), "{error}");
    assert!(error.to_string().contains("127"), "{error}");
}

#[test]
fn enum_guards_compare_by_name() {
    let schema = Arc::new(
        Schema::new()
            .with(TypeDecl::new("Ping").field("seq", TypeRef::U8, FieldOptions::new()))
            .with(TypeDecl::new("Data").field("len", TypeRef::U8, FieldOptions::new()))
            .with(
                TypeDecl::new("Msg")
                    .field(
                        "kind",
                        TypeRef::U8,
                        FieldOptions::new().variant(0, "Ping").variant(1, "Data"),
                    )
                    .field(
                        "body",
                        TypeRef::Named("Ping".into()),
                        FieldOptions::new()
                            .choice("kind == \"Ping\"", TypeRef::Named("Ping".into()))
                            .choice("kind == \"Data\"", TypeRef::Named("Data".into())),
                    ),
            ),
    );
    let codec = Pipeline::new().codec_for(&schema, "Msg").unwrap();
    let decoded = codec.decode(&[0x01, 0x09]).unwrap();
    assert_eq!(
        decoded,
        object(&[
            ("kind", Value::Enum(EnumValue::new("Data", 1))),
            ("body", object(&[("len", Value::Integer(9))])),
        ])
    );
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0x01, 0x09]);
}

#[test]
fn list_by_count() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Frame")
            .field("n", TypeRef::U8, FieldOptions::new())
            .field(
                "items",
                TypeRef::List(Box::new(TypeRef::U16)),
                FieldOptions::new().length("n"),
            ),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Frame").unwrap();

    let decoded = codec.decode(&[0x02, 0x00, 0x01, 0x00, 0x02]).unwrap();
    assert_eq!(
        decoded,
        object(&[
            ("n", Value::Integer(2)),
            (
                "items",
                Value::List(vec![Value::Integer(1), Value::Integer(2)])
            ),
        ])
    );
    assert_eq!(
        codec.encode(&decoded).unwrap(),
        vec![0x02, 0x00, 0x01, 0x00, 0x02]
    );
}

#[test]
fn list_by_terminator() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Zs").field(
            "items",
            TypeRef::List(Box::new(TypeRef::U8)),
            FieldOptions::new().terminator(Value::Integer(0)),
        ),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Zs").unwrap();

    let decoded = codec.decode(&[0x05, 0x06, 0x00, 0xFF]).unwrap();
    assert_eq!(
        decoded,
        object(&[(
            "items",
            Value::List(vec![Value::Integer(5), Value::Integer(6)])
        )])
    );
    // The sentinel is appended back on encode.
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0x05, 0x06, 0x00]);

    let error = codec.decode(&[0x05, 0x06]).unwrap_err();
    assert!(error.to_string().contains("terminator"), "{error}");
}

#[test]
fn list_by_byte_extent() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Ext")
            .field("len", TypeRef::U8, FieldOptions::new())
            .field(
                "items",
                TypeRef::List(Box::new(TypeRef::U16)),
                FieldOptions::new().extent("len"),
            )
            .field("tail", TypeRef::U8, FieldOptions::new()),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Ext").unwrap();

    let decoded = codec.decode(&[0x04, 0x00, 0x01, 0x00, 0x02, 0x99]).unwrap();
    assert_eq!(
        decoded,
        object(&[
            ("len", Value::Integer(4)),
            (
                "items",
                Value::List(vec![Value::Integer(1), Value::Integer(2)])
            ),
            ("tail", Value::Integer(0x99)),
        ])
    );
    assert_eq!(
        codec.encode(&decoded).unwrap(),
        vec![0x04, 0x00, 0x01, 0x00, 0x02, 0x99]
    );
}

#[test]
fn fixed_ascii_string() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Tag")
            .field("len", TypeRef::U8, FieldOptions::new())
            .field(
                "name",
                TypeRef::Str,
                FieldOptions::new().length("len").charset(Charset::Ascii),
            ),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Tag").unwrap();

    let decoded = codec.decode(&[0x02, 0x68, 0x69]).unwrap();
    assert_eq!(
        decoded,
        object(&[
            ("len", Value::Integer(2)),
            ("name", Value::String("hi".into())),
        ])
    );
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0x02, 0x68, 0x69]);

    let error = codec.decode(&[0x01, 0xC3]).unwrap_err();
    assert!(error.to_string().contains("US-ASCII"), "{error}");
}

#[test]
fn zero_terminated_string() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Z")
            .field("name", TypeRef::Str, FieldOptions::new())
            .field("after", TypeRef::U8, FieldOptions::new()),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Z").unwrap();

    let decoded = codec.decode(&[0x68, 0x69, 0x00, 0x2A]).unwrap();
    assert_eq!(
        decoded,
        object(&[
            ("name", Value::String("hi".into())),
            ("after", Value::Integer(42)),
        ])
    );
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0x68, 0x69, 0x00, 0x2A]);
}

#[test]
fn length_prefixed_string() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("P").field(
            "name",
            TypeRef::Str,
            FieldOptions::new()
                .termination(StringTermination::LengthPrefixed { prefix_bits: 8 })
                .charset(Charset::Utf8),
        ),
    ));
    let codec = Pipeline::new().codec_for(&schema, "P").unwrap();

    let decoded = codec.decode(&[0x03, 0xE2, 0x82, 0xAC]).unwrap();
    assert_eq!(decoded, object(&[("name", Value::String("\u{20AC}".into()))]));
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0x03, 0xE2, 0x82, 0xAC]);
}

#[test]
fn nested_composites_and_outer_references() {
    let schema = Arc::new(
        Schema::new()
            .with(TypeDecl::new("Header").field("count", TypeRef::U8, FieldOptions::new()))
            .with(
                TypeDecl::new("Frame")
                    .field("header", TypeRef::Named("Header".into()), FieldOptions::new())
                    .field(
                        "items",
                        TypeRef::List(Box::new(TypeRef::U8)),
                        FieldOptions::new().length("header.count"),
                    ),
            ),
    );
    let codec = Pipeline::new().codec_for(&schema, "Frame").unwrap();

    let decoded = codec.decode(&[0x02, 0x0A, 0x0B]).unwrap();
    assert_eq!(
        decoded,
        object(&[
            ("header", object(&[("count", Value::Integer(2))])),
            (
                "items",
                Value::List(vec![Value::Integer(10), Value::Integer(11)])
            ),
        ])
    );
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0x02, 0x0A, 0x0B]);
}

#[test]
fn inner_fields_see_the_enclosing_scope_through_outer() {
    let schema = Arc::new(
        Schema::new()
            .with(TypeDecl::new("Body").field(
                "data",
                TypeRef::Bytes,
                FieldOptions::new().length("outer.len"),
            ))
            .with(
                TypeDecl::new("Frame")
                    .field("len", TypeRef::U8, FieldOptions::new())
                    .field("body", TypeRef::Named("Body".into()), FieldOptions::new()),
            ),
    );
    let codec = Pipeline::new().codec_for(&schema, "Frame").unwrap();

    let decoded = codec.decode(&[0x02, 0xDE, 0xAD]).unwrap();
    assert_eq!(
        decoded,
        object(&[
            ("len", Value::Integer(2)),
            ("body", object(&[("data", Value::Bytes(vec![0xDE, 0xAD]))])),
        ])
    );
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0x02, 0xDE, 0xAD]);
}

#[test]
fn recursive_types_build_through_forward_references() {
    // A cons list: `Node { value, more, next: Node when more == 1 }`.
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Node")
            .field("value", TypeRef::U8, FieldOptions::new())
            .field("more", TypeRef::U8, FieldOptions::new())
            .field(
                "next",
                TypeRef::Named("Node".into()),
                FieldOptions::new().when("more == 1"),
            ),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Node").unwrap();

    // 1 -> 2 -> stop.
    let decoded = codec.decode(&[0x01, 0x01, 0x02, 0x00]).unwrap();
    let expected = object(&[
        ("value", Value::Integer(1)),
        ("more", Value::Integer(1)),
        (
            "next",
            object(&[
                ("value", Value::Integer(2)),
                ("more", Value::Integer(0)),
                ("next", Value::Object(Object::new())),
            ]),
        ),
    ]);
    assert_eq!(decoded, expected);
    assert_eq!(codec.encode(&decoded).unwrap(), vec![0x01, 0x01, 0x02, 0x00]);
}

#[test]
fn size_expression_counts_conditional_fields() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Packet")
            .field("flag", TypeRef::U8, FieldOptions::new())
            .field("x", TypeRef::U16, FieldOptions::new().when("flag == 1")),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Packet").unwrap();

    // The size depends on `flag`, so it cannot fold to a literal; it must
    // still evaluate correctly against a decoded value.
    let size = codec.size().expect("sized");
    assert!(!size.is_parameterless());

    let present = codec.decode(&[0x01, 0x00, 0x2A]).unwrap();
    let Value::Object(fields) = &present else { panic!() };
    let scope = preon_el::ObjectScope::new(fields, None);
    assert_eq!(size.eval_integer(&scope).unwrap(), 24);

    let absent = codec.decode(&[0x00]).unwrap();
    let Value::Object(fields) = &absent else { panic!() };
    let scope = preon_el::ObjectScope::new(fields, None);
    assert_eq!(size.eval_integer(&scope).unwrap(), 8);
}

#[test]
fn trace_decorator_is_transparent() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Pair")
            .field("a", TypeRef::U8, FieldOptions::new().bits(3))
            .field("b", TypeRef::U8, FieldOptions::new().bits(5)),
    ));
    let plain = Pipeline::new().codec_for(&schema, "Pair").unwrap();
    let traced = Pipeline::new()
        .with_codec_decorator(Arc::new(preon_codec::TraceDecorator))
        .codec_for(&schema, "Pair")
        .unwrap();

    let bytes = [0xABu8];
    assert_eq!(traced.decode(&bytes).unwrap(), plain.decode(&bytes).unwrap());
    let value = plain.decode(&bytes).unwrap();
    assert_eq!(traced.encode(&value).unwrap(), plain.encode(&value).unwrap());
}

#[test]
fn trace_decorator_wraps_recursive_mentions_too() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Node")
            .field("value", TypeRef::U8, FieldOptions::new())
            .field("more", TypeRef::U8, FieldOptions::new())
            .field(
                "next",
                TypeRef::Named("Node".into()),
                FieldOptions::new().when("more == 1"),
            ),
    ));
    let plain = Pipeline::new().codec_for(&schema, "Node").unwrap();
    let traced = Pipeline::new()
        .with_codec_decorator(Arc::new(preon_codec::TraceDecorator))
        .codec_for(&schema, "Node")
        .unwrap();

    // The decorator wraps the forward-reference handle of `next` as well;
    // decoding through it must still reach the finished codec.
    let bytes = [0x01u8, 0x01, 0x02, 0x00];
    let decoded = traced.decode(&bytes).unwrap();
    assert_eq!(decoded, plain.decode(&bytes).unwrap());
    assert_eq!(traced.encode(&decoded).unwrap(), bytes.to_vec());
}

#[test]
fn build_errors_carry_the_field_path() {
    // Unresolved reference in a length expression.
    let schema = Arc::new(Schema::new().with(TypeDecl::new("Bad").field(
        "payload",
        TypeRef::Bytes,
        FieldOptions::new().length("missing"),
    )));
    let error = Pipeline::new().codec_for(&schema, "Bad").unwrap_err();
    assert!(error.to_string().contains("payload"), "{error}");
    assert!(error.to_string().contains("missing"), "{error}");

    // Guard of the wrong static type.
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Bad")
            .field("n", TypeRef::U8, FieldOptions::new())
            .field("x", TypeRef::U8, FieldOptions::new().when("n + 1")),
    ));
    let error = Pipeline::new().codec_for(&schema, "Bad").unwrap_err();
    assert!(error.to_string().contains("x"), "{error}");
    assert!(error.to_string().contains("boolean"), "{error}");

    // A list without any length discipline.
    let schema = Arc::new(Schema::new().with(TypeDecl::new("Bad").field(
        "items",
        TypeRef::List(Box::new(TypeRef::U8)),
        FieldOptions::new(),
    )));
    let error = Pipeline::new().codec_for(&schema, "Bad").unwrap_err();
    assert!(error.to_string().contains("items"), "{error}");
}

#[test]
fn decode_errors_report_position_and_path() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Frame")
            .field("n", TypeRef::U8, FieldOptions::new())
            .field("payload", TypeRef::Bytes, FieldOptions::new().length("n")),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Frame").unwrap();

    // Declared three payload bytes, supplied one.
    let error = codec.decode(&[0x03, 0x41]).unwrap_err();
    assert_eq!(error.position, 8);
    assert!(error.to_string().contains("payload"), "{error}");
}

#[test]
fn encode_rejects_out_of_range_and_mismatched_values() {
    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Pair")
            .field("a", TypeRef::U8, FieldOptions::new().bits(3))
            .field("b", TypeRef::U8, FieldOptions::new().bits(5)),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Pair").unwrap();

    let value = object(&[("a", Value::Integer(9)), ("b", Value::Integer(0))]);
    let error = codec.encode(&value).unwrap_err();
    assert!(error.to_string().contains("does not fit"), "{error}");
    assert!(error.to_string().contains("a"), "{error}");

    let schema = Arc::new(Schema::new().with(
        TypeDecl::new("Frame")
            .field("n", TypeRef::U8, FieldOptions::new())
            .field("payload", TypeRef::Bytes, FieldOptions::new().length("n")),
    ));
    let codec = Pipeline::new().codec_for(&schema, "Frame").unwrap();
    let inconsistent = object(&[
        ("n", Value::Integer(2)),
        ("payload", Value::Bytes(vec![0x41])),
    ]);
    let error = codec.encode(&inconsistent).unwrap_err();
    assert!(error.to_string().contains("length"), "{error}");
}
