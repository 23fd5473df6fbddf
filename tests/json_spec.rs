/// Spec tests for JSON text conversion: round-trips, object field order,
/// escaping, circular-reference failures, and parse errors.
use hemlock::ast::{self, Expr, Program, Stmt, TypeAnn};
use hemlock::{Interpreter, RuntimeError, TypeTag, Value};

fn run(stmts: Vec<Stmt>) -> Value {
    let mut program = Program::new(stmts);
    hemlock::resolver::resolve_program(&mut program);
    let mut interp = Interpreter::new();
    interp.capture_output();
    interp.run(&program).expect("program failed")
}

fn run_err(stmts: Vec<Stmt>) -> RuntimeError {
    let mut program = Program::new(stmts);
    hemlock::resolver::resolve_program(&mut program);
    let mut interp = Interpreter::new();
    interp.capture_output();
    interp.run(&program).expect_err("program should fail")
}

fn serialize_of(expr: Expr) -> Stmt {
    ast::expr_stmt(ast::method(expr, "serialize", vec![]))
}

fn text_of(v: &Value) -> String {
    match v {
        Value::Str(s) => s.to_string_lossy(),
        other => panic!("expected string, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Serialization shapes
// ---------------------------------------------------------------------------

#[test]
fn scalar_serialization() {
    assert_eq!(text_of(&run(vec![serialize_of(Expr::Null)])), "null");
    assert_eq!(text_of(&run(vec![serialize_of(Expr::Bool(true))])), "true");
    assert_eq!(text_of(&run(vec![serialize_of(ast::int(42))])), "42");
    assert_eq!(text_of(&run(vec![serialize_of(ast::float(2.5))])), "2.5");
    assert_eq!(
        text_of(&run(vec![serialize_of(ast::str_lit("hi"))])),
        "\"hi\""
    );
}

#[test]
fn declared_width_integers_serialize_as_numbers() {
    let v = run(vec![
        ast::let_typed("b", TypeAnn::Scalar(TypeTag::U8), ast::int(200)),
        serialize_of(ast::ident("b")),
    ]);
    assert_eq!(text_of(&v), "200");
}

#[test]
fn object_serialization_preserves_field_order() {
    let v = run(vec![serialize_of(ast::object_lit(vec![
        ("zebra", ast::int(1)),
        ("apple", ast::int(2)),
        ("mango", ast::array_lit(vec![ast::int(3), ast::Expr::Bool(false)])),
    ]))]);
    assert_eq!(
        text_of(&v),
        "{\"zebra\":1,\"apple\":2,\"mango\":[3,false]}"
    );
}

#[test]
fn string_escaping() {
    let v = run(vec![serialize_of(ast::str_lit("a\"b\\c\nd"))]);
    assert_eq!(text_of(&v), "\"a\\\"b\\\\c\\nd\"");
}

#[test]
fn functions_do_not_serialize() {
    let err = run_err(vec![
        ast::let_("f", ast::function(vec![], vec![])),
        serialize_of(ast::ident("f")),
    ]);
    assert!(err.to_string().contains("serialize"));
}

#[test]
fn circular_reference_fails() {
    // let a = []; a.push(a); a.serialize()
    let err = run_err(vec![
        ast::let_("a", ast::array_lit(vec![])),
        ast::expr_stmt(ast::method(ast::ident("a"), "push", vec![ast::ident("a")])),
        serialize_of(ast::ident("a")),
    ]);
    assert!(matches!(err, RuntimeError::Parse(_)));
    assert!(err.to_string().contains("circular"));
}

// ---------------------------------------------------------------------------
// Deserialization and round-trips
// ---------------------------------------------------------------------------

#[test]
fn deserialize_rebuilds_values() {
    let v = run(vec![ast::expr_stmt(ast::method(
        ast::str_lit("{\"x\": 1, \"y\": [true, null, \"s\"]}"),
        "deserialize",
        vec![],
    ))]);
    let expected = run(vec![ast::expr_stmt(ast::object_lit(vec![
        ("x", ast::int(1)),
        (
            "y",
            ast::array_lit(vec![ast::Expr::Bool(true), Expr::Null, ast::str_lit("s")]),
        ),
    ]))]);
    assert!(v.equals(&expected));
}

#[test]
fn round_trip_equals_original() {
    // deserialize(serialize(v)) == v for a nested value without cycles.
    let original = ast::object_lit(vec![
        ("name", ast::str_lit("hemlock")),
        ("version", ast::int(1)),
        ("pi", ast::float(3.25)),
        ("tags", ast::array_lit(vec![ast::str_lit("a"), ast::str_lit("b")])),
        ("nested", ast::object_lit(vec![("ok", ast::Expr::Bool(true))])),
    ]);
    let v = run(vec![
        ast::let_("o", original.clone()),
        ast::let_("text", ast::method(ast::ident("o"), "serialize", vec![])),
        ast::let_("back", ast::method(ast::ident("text"), "deserialize", vec![])),
        ast::expr_stmt(ast::binary(
            ast::BinOp::Eq,
            ast::ident("o"),
            ast::ident("back"),
        )),
    ]);
    assert!(v.equals(&Value::Bool(true)));
}

#[test]
fn round_trip_preserves_object_order() {
    let v = run(vec![
        ast::let_(
            "o",
            ast::object_lit(vec![("z", ast::int(1)), ("a", ast::int(2))]),
        ),
        ast::let_("text", ast::method(ast::ident("o"), "serialize", vec![])),
        ast::let_("back", ast::method(ast::ident("text"), "deserialize", vec![])),
        serialize_of(ast::ident("back")),
    ]);
    assert_eq!(text_of(&v), "{\"z\":1,\"a\":2}");
}

#[test]
fn malformed_json_is_a_parse_error() {
    let err = run_err(vec![ast::expr_stmt(ast::method(
        ast::str_lit("{\"unclosed\": "),
        "deserialize",
        vec![],
    ))]);
    assert!(err.to_string().contains("deserialize"));
}

#[test]
fn parse_errors_are_catchable() {
    let v = run(vec![Stmt::Try {
        body: vec![ast::expr_stmt(ast::method(
            ast::str_lit("not json"),
            "deserialize",
            vec![],
        ))],
        catch: Some(hemlock::ast::CatchClause {
            name: "e".to_string(),
            body: vec![ast::expr_stmt(ast::Expr::Bool(true))],
        }),
        finally: None,
    }]);
    assert!(v.equals(&Value::Bool(true)));
}
