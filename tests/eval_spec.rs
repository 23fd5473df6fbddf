/// Spec tests for the Hemlock evaluator: expression semantics, scoping,
/// control flow, exceptions, defer, and method dispatch.
///
/// Programs are built as ASTs through the `ast` construction helpers — the
/// parser is an external collaborator — and run through the resolver first,
/// the way the host drives the core.
use hemlock::ast::{
    self, Arg, AssignTarget, BinOp, CatchClause, Expr, IncDecOp, Param, Program, Stmt, StrPart,
    SwitchCase, TypeAnn, UnaryOp,
};
use hemlock::resolver::resolve_program;
use hemlock::{Interpreter, RuntimeError, TypeTag, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn run(stmts: Vec<Stmt>) -> Value {
    let mut program = Program::new(stmts);
    resolve_program(&mut program);
    let mut interp = Interpreter::new();
    interp.capture_output();
    interp.run(&program).expect("program failed")
}

fn run_err(stmts: Vec<Stmt>) -> RuntimeError {
    let mut program = Program::new(stmts);
    resolve_program(&mut program);
    let mut interp = Interpreter::new();
    interp.capture_output();
    interp.run(&program).expect_err("program should fail")
}

fn output(stmts: Vec<Stmt>) -> String {
    let mut program = Program::new(stmts);
    resolve_program(&mut program);
    let mut interp = Interpreter::new();
    interp.capture_output();
    interp.run(&program).expect("program failed");
    interp.captured_output()
}

fn print_of(expr: Expr) -> Stmt {
    ast::expr_stmt(ast::call(ast::ident("print"), vec![expr]))
}

fn assert_value(v: &Value, expected: &Value) {
    assert!(v.equals(expected), "expected {:?}, got {:?}", expected, v);
}

// ---------------------------------------------------------------------------
// Arithmetic and operators
// ---------------------------------------------------------------------------

#[test]
fn arithmetic_precedence_prints_fourteen() {
    // let a = 2; let b = 3; print(a + b * 4);
    let out = output(vec![
        ast::let_("a", ast::int(2)),
        ast::let_("b", ast::int(3)),
        print_of(ast::binary(
            BinOp::Add,
            ast::ident("a"),
            ast::binary(BinOp::Mul, ast::ident("b"), ast::int(4)),
        )),
    ]);
    assert_eq!(out, "14\n");
}

#[test]
fn int_float_promotion() {
    let v = run(vec![ast::expr_stmt(ast::binary(
        BinOp::Add,
        ast::int(1),
        ast::float(2.0),
    ))]);
    assert_value(&v, &Value::F64(3.0));
}

#[test]
fn promotion_result_type_is_float() {
    let v = run(vec![ast::expr_stmt(ast::call(
        ast::ident("typeof"),
        vec![ast::binary(BinOp::Mul, ast::int(2), ast::float(1.5))],
    ))]);
    assert_value(&v, &Value::Type(TypeTag::F64));
}

#[test]
fn integer_division_truncates() {
    let v = run(vec![ast::expr_stmt(ast::binary(
        BinOp::Div,
        ast::int(7),
        ast::int(2),
    ))]);
    assert_value(&v, &Value::I32(3));
}

#[test]
fn division_by_zero_fails() {
    let err = run_err(vec![ast::expr_stmt(ast::binary(
        BinOp::Div,
        ast::int(1),
        ast::int(0),
    ))]);
    assert!(err.to_string().contains("Division by zero"));
}

#[test]
fn float_division_by_zero_fails() {
    let err = run_err(vec![ast::expr_stmt(ast::binary(
        BinOp::Div,
        ast::float(1.0),
        ast::float(0.0),
    ))]);
    assert!(err.to_string().contains("Division by zero"));
}

#[test]
fn modulo_follows_dividend_sign() {
    let v = run(vec![ast::expr_stmt(ast::binary(
        BinOp::Mod,
        ast::unary(UnaryOp::Neg, ast::int(7)),
        ast::int(3),
    ))]);
    assert_value(&v, &Value::I32(-1));
}

#[test]
fn bitwise_requires_integers() {
    let err = run_err(vec![ast::expr_stmt(ast::binary(
        BinOp::BitAnd,
        ast::float(1.0),
        ast::int(2),
    ))]);
    assert!(err.to_string().contains("integer"));
}

#[test]
fn bitwise_and_shift() {
    let v = run(vec![ast::expr_stmt(ast::binary(
        BinOp::Shl,
        ast::int(1),
        ast::int(4),
    ))]);
    assert_value(&v, &Value::I32(16));
    let v = run(vec![ast::expr_stmt(ast::binary(
        BinOp::BitXor,
        ast::int(6),
        ast::int(3),
    ))]);
    assert_value(&v, &Value::I32(5));
}

#[test]
fn narrow_addition_overflows_at_declared_width() {
    // let a: i8 = 100; a + a overflows i8.
    let err = run_err(vec![
        ast::let_typed("a", TypeAnn::Scalar(TypeTag::I8), ast::int(100)),
        ast::expr_stmt(ast::binary(BinOp::Add, ast::ident("a"), ast::ident("a"))),
    ]);
    assert!(err.to_string().contains("overflow"));
}

#[test]
fn logical_operators_short_circuit() {
    // false && (1 / 0) — the right side must never evaluate.
    let v = run(vec![ast::expr_stmt(ast::binary(
        BinOp::And,
        ast::Expr::Bool(false),
        ast::binary(BinOp::Div, ast::int(1), ast::int(0)),
    ))]);
    assert_value(&v, &Value::Bool(false));

    let v = run(vec![ast::expr_stmt(ast::binary(
        BinOp::Or,
        ast::Expr::Bool(true),
        ast::binary(BinOp::Div, ast::int(1), ast::int(0)),
    ))]);
    assert_value(&v, &Value::Bool(true));
}

#[test]
fn cross_width_equality_promotes() {
    let v = run(vec![
        ast::let_typed("a", TypeAnn::Scalar(TypeTag::U8), ast::int(5)),
        ast::expr_stmt(ast::binary(BinOp::Eq, ast::ident("a"), ast::int(5))),
    ]);
    assert_value(&v, &Value::Bool(true));
}

#[test]
fn disjoint_types_are_not_equal() {
    let v = run(vec![ast::expr_stmt(ast::binary(
        BinOp::Eq,
        ast::str_lit("1"),
        ast::int(1),
    ))]);
    assert_value(&v, &Value::Bool(false));
}

// ---------------------------------------------------------------------------
// Scoping and bindings
// ---------------------------------------------------------------------------

#[test]
fn block_scope_isolation() {
    // let x = 1; { let x = 2; } x
    let v = run(vec![
        ast::let_("x", ast::int(1)),
        ast::block(vec![ast::let_("x", ast::int(2))]),
        ast::expr_stmt(ast::ident("x")),
    ]);
    assert_value(&v, &Value::I32(1));
}

#[test]
fn assignment_reaches_outer_scope() {
    let v = run(vec![
        ast::let_("x", ast::int(1)),
        ast::block(vec![ast::expr_stmt(ast::assign_name("x", ast::int(5)))]),
        ast::expr_stmt(ast::ident("x")),
    ]);
    assert_value(&v, &Value::I32(5));
}

#[test]
fn const_assignment_fails() {
    let err = run_err(vec![
        ast::const_("k", ast::int(1)),
        ast::expr_stmt(ast::assign_name("k", ast::int(2))),
    ]);
    assert!(err.to_string().contains("const"));
}

#[test]
fn duplicate_define_in_same_scope_fails() {
    let err = run_err(vec![
        ast::let_("x", ast::int(1)),
        ast::let_("x", ast::int(2)),
    ]);
    assert!(err.to_string().contains("already defined"));
}

#[test]
fn undefined_variable_fails() {
    let err = run_err(vec![ast::expr_stmt(ast::ident("ghost"))]);
    assert!(err.to_string().contains("Undefined variable"));
}

#[test]
fn implicit_define_on_unbound_assignment() {
    let v = run(vec![
        ast::expr_stmt(ast::assign_name("fresh", ast::int(9))),
        ast::expr_stmt(ast::ident("fresh")),
    ]);
    assert_value(&v, &Value::I32(9));
}

#[test]
fn integer_width_round_trip_and_rejection() {
    let v = run(vec![
        ast::let_typed("b", TypeAnn::Scalar(TypeTag::U8), ast::int(200)),
        ast::expr_stmt(ast::ident("b")),
    ]);
    assert_value(&v, &Value::U8(200));

    let err = run_err(vec![ast::let_typed(
        "b",
        TypeAnn::Scalar(TypeTag::U8),
        ast::int(300),
    )]);
    assert!(err.to_string().contains("out of range"));

    // Assignment re-narrows through the declared tag.
    let err = run_err(vec![
        ast::let_typed("b", TypeAnn::Scalar(TypeTag::I16), ast::int(0)),
        ast::expr_stmt(ast::assign_name("b", ast::int(40_000))),
    ]);
    assert!(err.to_string().contains("out of range"));
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

#[test]
fn string_byte_write_and_length() {
    // let s = "hello"; s[0] = 72; print(s); print(s.length);
    let out = output(vec![
        ast::let_("s", ast::str_lit("hello")),
        ast::expr_stmt(ast::assign_index(ast::ident("s"), ast::int(0), ast::int(72))),
        print_of(ast::ident("s")),
        print_of(ast::property(ast::ident("s"), "length")),
    ]);
    assert_eq!(out, "Hello\n5\n");
}

#[test]
fn char_length_recomputes_after_byte_write() {
    let v = run(vec![
        ast::let_("s", ast::str_lit("héllo")),
        ast::expr_stmt(ast::method(ast::ident("s"), "char_length", vec![])),
        ast::expr_stmt(ast::assign_index(ast::ident("s"), ast::int(0), ast::int(72))),
        ast::expr_stmt(ast::method(ast::ident("s"), "char_length", vec![])),
    ]);
    assert_value(&v, &Value::I32(5));
}

#[test]
fn string_slice_clamps_but_point_lookups_fail() {
    let v = run(vec![
        ast::let_("s", ast::str_lit("hello")),
        ast::expr_stmt(ast::method(
            ast::ident("s"),
            "slice",
            vec![ast::int(1), ast::int(100)],
        )),
    ]);
    assert!(v.equals(&run(vec![ast::expr_stmt(ast::str_lit("ello"))])));

    let err = run_err(vec![
        ast::let_("s", ast::str_lit("hello")),
        ast::expr_stmt(ast::method(ast::ident("s"), "char_at", vec![ast::int(99)])),
    ]);
    assert!(err.to_string().contains("out of bounds"));

    let err = run_err(vec![
        ast::let_("s", ast::str_lit("hello")),
        ast::expr_stmt(ast::method(ast::ident("s"), "byte_at", vec![ast::int(99)])),
    ]);
    assert!(err.to_string().contains("out of bounds"));
}

#[test]
fn string_methods() {
    let out = output(vec![
        ast::let_("s", ast::str_lit("a,b,c")),
        print_of(ast::property(
            ast::method(ast::ident("s"), "split", vec![ast::str_lit(",")]),
            "length",
        )),
        print_of(ast::method(ast::str_lit("hello"), "to_upper", vec![])),
        print_of(ast::method(
            ast::str_lit("hello"),
            "find",
            vec![ast::str_lit("ll")],
        )),
        print_of(ast::method(
            ast::str_lit("hello"),
            "find",
            vec![ast::str_lit("xyz")],
        )),
        print_of(ast::method(
            ast::str_lit("ab"),
            "repeat",
            vec![ast::int(3)],
        )),
        print_of(ast::method(
            ast::str_lit("  pad  "),
            "trim",
            vec![],
        )),
    ]);
    assert_eq!(out, "3\nHELLO\n2\n-1\nababab\npad\n");
}

#[test]
fn string_concat_and_interpolation() {
    let out = output(vec![
        ast::let_("name", ast::str_lit("world")),
        print_of(ast::binary(
            BinOp::Add,
            ast::str_lit("hello "),
            ast::ident("name"),
        )),
        print_of(Expr::Interpolation(vec![
            StrPart::Literal("n=".to_string()),
            StrPart::Expr(ast::binary(BinOp::Add, ast::int(2), ast::int(3))),
        ])),
    ]);
    assert_eq!(out, "hello world\nn=5\n");
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

#[test]
fn array_push_and_clamped_slice() {
    // let arr = [1,2,3]; arr.push(4); print(arr.slice(1, 100));
    let out = output(vec![
        ast::let_("arr", ast::array_lit(vec![ast::int(1), ast::int(2), ast::int(3)])),
        ast::expr_stmt(ast::method(ast::ident("arr"), "push", vec![ast::int(4)])),
        print_of(ast::method(
            ast::ident("arr"),
            "slice",
            vec![ast::int(1), ast::int(100)],
        )),
    ]);
    assert_eq!(out, "[2, 3, 4]\n");
}

#[test]
fn array_index_out_of_bounds_fails() {
    let err = run_err(vec![
        ast::let_("arr", ast::array_lit(vec![ast::int(1)])),
        ast::expr_stmt(ast::index(ast::ident("arr"), ast::int(5))),
    ]);
    assert!(err.to_string().contains("out of bounds"));
}

#[test]
fn array_mutation_methods() {
    let v = run(vec![
        ast::let_("arr", ast::array_lit(vec![ast::int(1), ast::int(2)])),
        ast::expr_stmt(ast::method(ast::ident("arr"), "unshift", vec![ast::int(0)])),
        ast::expr_stmt(ast::method(
            ast::ident("arr"),
            "insert",
            vec![ast::int(2), ast::int(9)],
        )),
        ast::expr_stmt(ast::method(ast::ident("arr"), "reverse", vec![])),
        ast::expr_stmt(ast::method(ast::ident("arr"), "join", vec![ast::str_lit("-")])),
    ]);
    assert!(v.equals(&run(vec![ast::expr_stmt(ast::str_lit("2-9-1-0"))])));
}

#[test]
fn array_higher_order_methods() {
    // [1,2,3].map(fn(x) x*2) -> filter odd -> reduce sum
    let double = ast::function(
        vec![ast::param("x")],
        vec![ast::ret(Some(ast::binary(
            BinOp::Mul,
            ast::ident("x"),
            ast::int(2),
        )))],
    );
    let v = run(vec![
        ast::let_("arr", ast::array_lit(vec![ast::int(1), ast::int(2), ast::int(3)])),
        ast::expr_stmt(ast::property(
            ast::method(ast::ident("arr"), "map", vec![double]),
            "length",
        )),
    ]);
    assert_value(&v, &Value::I32(3));

    let add = ast::function(
        vec![ast::param("a"), ast::param("b")],
        vec![ast::ret(Some(ast::binary(
            BinOp::Add,
            ast::ident("a"),
            ast::ident("b"),
        )))],
    );
    let v = run(vec![
        ast::let_("arr", ast::array_lit(vec![ast::int(1), ast::int(2), ast::int(3)])),
        ast::expr_stmt(ast::method(
            ast::ident("arr"),
            "reduce",
            vec![add, ast::int(10)],
        )),
    ]);
    assert_value(&v, &Value::I32(16));
}

#[test]
fn typed_array_rejects_mismatched_insert() {
    let err = run_err(vec![
        ast::let_typed(
            "arr",
            TypeAnn::Array(Some(TypeTag::I32)),
            ast::array_lit(vec![ast::int(1)]),
        ),
        ast::expr_stmt(ast::method(
            ast::ident("arr"),
            "push",
            vec![ast::str_lit("nope")],
        )),
    ]);
    assert!(err.to_string().contains("cannot hold"));
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

#[test]
fn object_field_order_is_insertion_order() {
    // let o = {a:1, b:2}; o.c = 3; o.a = 9; collect field names via for-in.
    let push_name = ast::expr_stmt(ast::method(
        ast::ident("names"),
        "push",
        vec![ast::ident("k")],
    ));
    let v = run(vec![
        ast::let_("o", ast::object_lit(vec![("a", ast::int(1)), ("b", ast::int(2))])),
        ast::expr_stmt(Expr::Assign {
            target: AssignTarget::Property {
                object: Box::new(ast::ident("o")),
                property: "c".to_string(),
            },
            value: Box::new(ast::int(3)),
        }),
        ast::expr_stmt(Expr::Assign {
            target: AssignTarget::Property {
                object: Box::new(ast::ident("o")),
                property: "a".to_string(),
            },
            value: Box::new(ast::int(9)),
        }),
        ast::let_("names", ast::array_lit(vec![])),
        Stmt::ForIn {
            var: "k".to_string(),
            iterable: ast::ident("o"),
            body: Box::new(push_name),
        },
        ast::expr_stmt(ast::method(
            ast::ident("names"),
            "join",
            vec![ast::str_lit(",")],
        )),
    ]);
    assert!(v.equals(&run(vec![ast::expr_stmt(ast::str_lit("a,b,c"))])));
}

#[test]
fn object_get_set_has() {
    let v = run(vec![
        ast::let_("o", ast::object_lit(vec![("x", ast::int(1))])),
        ast::expr_stmt(ast::method(
            ast::ident("o"),
            "set",
            vec![ast::str_lit("y"), ast::int(2)],
        )),
        ast::expr_stmt(ast::method(ast::ident("o"), "has", vec![ast::str_lit("y")])),
    ]);
    assert_value(&v, &Value::Bool(true));

    let v = run(vec![
        ast::let_("o", ast::object_lit(vec![])),
        ast::expr_stmt(ast::method(ast::ident("o"), "get", vec![ast::str_lit("nope")])),
    ]);
    assert_value(&v, &Value::Null);
}

#[test]
fn unknown_field_access_fails() {
    let err = run_err(vec![
        ast::let_("o", ast::object_lit(vec![])),
        ast::expr_stmt(ast::property(ast::ident("o"), "ghost")),
    ]);
    assert!(err.to_string().contains("Unknown field"));
}

#[test]
fn method_on_object_dispatches_to_callable_field() {
    let double = ast::function(
        vec![ast::param("x")],
        vec![ast::ret(Some(ast::binary(
            BinOp::Mul,
            ast::ident("x"),
            ast::int(2),
        )))],
    );
    let v = run(vec![
        ast::let_("o", ast::object_lit(vec![("double", double)])),
        ast::expr_stmt(ast::method(ast::ident("o"), "double", vec![ast::int(21)])),
    ]);
    assert_value(&v, &Value::I32(42));
}

// ---------------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------------

#[test]
fn while_and_for_loops() {
    // for (let i = 0; i < 5; i = i + 1) sum = sum + i;
    let v = run(vec![
        ast::let_("sum", ast::int(0)),
        Stmt::For {
            init: Some(Box::new(ast::let_("i", ast::int(0)))),
            cond: Some(ast::binary(BinOp::Lt, ast::ident("i"), ast::int(5))),
            step: Some(ast::assign_name(
                "i",
                ast::binary(BinOp::Add, ast::ident("i"), ast::int(1)),
            )),
            body: Box::new(ast::expr_stmt(ast::assign_name(
                "sum",
                ast::binary(BinOp::Add, ast::ident("sum"), ast::ident("i")),
            ))),
        },
        ast::expr_stmt(ast::ident("sum")),
    ]);
    assert_value(&v, &Value::I32(10));
}

#[test]
fn break_and_continue() {
    // while (true) { i++; if (i == 2) continue; if (i == 4) break; n++ }
    let body = ast::block(vec![
        ast::expr_stmt(Expr::IncDec {
            op: IncDecOp::Inc,
            prefix: false,
            target: AssignTarget::Name {
                name: "i".to_string(),
                resolved: None,
            },
        }),
        Stmt::If {
            cond: ast::binary(BinOp::Eq, ast::ident("i"), ast::int(2)),
            then: Box::new(Stmt::Continue),
            otherwise: None,
        },
        Stmt::If {
            cond: ast::binary(BinOp::Eq, ast::ident("i"), ast::int(4)),
            then: Box::new(Stmt::Break),
            otherwise: None,
        },
        ast::expr_stmt(Expr::IncDec {
            op: IncDecOp::Inc,
            prefix: false,
            target: AssignTarget::Name {
                name: "n".to_string(),
                resolved: None,
            },
        }),
    ]);
    let v = run(vec![
        ast::let_("i", ast::int(0)),
        ast::let_("n", ast::int(0)),
        Stmt::While {
            cond: ast::Expr::Bool(true),
            body: Box::new(body),
        },
        ast::expr_stmt(ast::ident("n")),
    ]);
    // Iterations: i=1 n=1, i=2 skipped, i=3 n=2, i=4 break.
    assert_value(&v, &Value::I32(2));
}

#[test]
fn switch_matches_patterns_and_default() {
    let switch_on = |subject: i64| {
        vec![
            ast::let_("r", ast::int(0)),
            Stmt::Switch {
                subject: ast::int(subject),
                cases: vec![
                    SwitchCase {
                        patterns: vec![ast::int(1)],
                        body: vec![ast::expr_stmt(ast::assign_name("r", ast::int(10)))],
                    },
                    SwitchCase {
                        patterns: vec![ast::int(2), ast::int(3)],
                        body: vec![
                            ast::expr_stmt(ast::assign_name("r", ast::int(20))),
                            Stmt::Break,
                        ],
                    },
                ],
                default: Some(vec![ast::expr_stmt(ast::assign_name("r", ast::int(99)))]),
            },
            ast::expr_stmt(ast::ident("r")),
        ]
    };
    assert_value(&run(switch_on(3)), &Value::I32(20));
    assert_value(&run(switch_on(7)), &Value::I32(99));
}

#[test]
fn ternary_and_null_coalesce() {
    let v = run(vec![ast::expr_stmt(Expr::Ternary {
        cond: Box::new(ast::Expr::Bool(false)),
        then: Box::new(ast::int(1)),
        otherwise: Box::new(ast::int(2)),
    })]);
    assert_value(&v, &Value::I32(2));

    let v = run(vec![ast::expr_stmt(Expr::NullCoalesce {
        left: Box::new(Expr::Null),
        right: Box::new(ast::int(3)),
    })]);
    assert_value(&v, &Value::I32(3));

    // Only null is "absent": zero passes through.
    let v = run(vec![ast::expr_stmt(Expr::NullCoalesce {
        left: Box::new(ast::int(0)),
        right: Box::new(ast::int(3)),
    })]);
    assert_value(&v, &Value::I32(0));
}

#[test]
fn prefix_and_postfix_inc_dec() {
    let v = run(vec![
        ast::let_("i", ast::int(5)),
        ast::let_(
            "post",
            Expr::IncDec {
                op: IncDecOp::Inc,
                prefix: false,
                target: AssignTarget::Name {
                    name: "i".to_string(),
                    resolved: None,
                },
            },
        ),
        ast::let_(
            "pre",
            Expr::IncDec {
                op: IncDecOp::Inc,
                prefix: true,
                target: AssignTarget::Name {
                    name: "i".to_string(),
                    resolved: None,
                },
            },
        ),
        ast::expr_stmt(ast::array_lit(vec![
            ast::ident("post"),
            ast::ident("pre"),
            ast::ident("i"),
        ])),
    ]);
    let expected = run(vec![ast::expr_stmt(ast::array_lit(vec![
        ast::int(5),
        ast::int(7),
        ast::int(7),
    ]))]);
    assert_value(&v, &expected);
}

#[test]
fn for_in_over_string_yields_runes() {
    let v = run(vec![
        ast::let_("count", ast::int(0)),
        Stmt::ForIn {
            var: "c".to_string(),
            iterable: ast::str_lit("héllo"),
            body: Box::new(ast::expr_stmt(Expr::IncDec {
                op: IncDecOp::Inc,
                prefix: true,
                target: AssignTarget::Name {
                    name: "count".to_string(),
                    resolved: None,
                },
            })),
        },
        ast::expr_stmt(ast::ident("count")),
    ]);
    assert_value(&v, &Value::I32(5));
}

// ---------------------------------------------------------------------------
// Exceptions, finally, defer
// ---------------------------------------------------------------------------

#[test]
fn throw_catch_finally() {
    // try { throw "oops"; } catch (e) { print("caught: " + e); } finally { print("done"); }
    let out = output(vec![Stmt::Try {
        body: vec![Stmt::Throw(ast::str_lit("oops"))],
        catch: Some(CatchClause {
            name: "e".to_string(),
            body: vec![print_of(ast::binary(
                BinOp::Add,
                ast::str_lit("caught: "),
                ast::ident("e"),
            ))],
        }),
        finally: Some(vec![print_of(ast::str_lit("done"))]),
    }]);
    assert_eq!(out, "caught: oops\ndone\n");
}

#[test]
fn runtime_errors_are_catchable() {
    // try { 1 / 0 } catch (e) { e } — the handler binds the message string.
    let v = run(vec![Stmt::Try {
        body: vec![ast::expr_stmt(ast::binary(
            BinOp::Div,
            ast::int(1),
            ast::int(0),
        ))],
        catch: Some(CatchClause {
            name: "e".to_string(),
            body: vec![ast::expr_stmt(ast::method(
                ast::ident("e"),
                "contains",
                vec![ast::str_lit("Division by zero")],
            ))],
        }),
        finally: None,
    }]);
    assert_value(&v, &Value::Bool(true));
}

#[test]
fn finally_runs_on_every_exit_reason() {
    // Normal, return, throw, break — `finally` runs exactly once for each.
    let count_in_finally = |body: Vec<Stmt>| Stmt::Try {
        body,
        catch: None,
        finally: Some(vec![ast::expr_stmt(ast::method(
            ast::ident("log"),
            "push",
            vec![ast::int(1)],
        ))]),
    };

    // return inside a function
    let f = ast::function(
        vec![],
        vec![count_in_finally(vec![ast::ret(Some(ast::int(7)))])],
    );
    let v = run(vec![
        ast::let_("log", ast::array_lit(vec![])),
        ast::let_("f", f),
        ast::let_("r", ast::call(ast::ident("f"), vec![])),
        ast::expr_stmt(ast::array_lit(vec![
            ast::ident("r"),
            ast::property(ast::ident("log"), "length"),
        ])),
    ]);
    let expected = run(vec![ast::expr_stmt(ast::array_lit(vec![
        ast::int(7),
        ast::int(1),
    ]))]);
    assert_value(&v, &expected);

    // break inside a loop
    let v = run(vec![
        ast::let_("log", ast::array_lit(vec![])),
        Stmt::While {
            cond: ast::Expr::Bool(true),
            body: Box::new(count_in_finally(vec![Stmt::Break])),
        },
        ast::expr_stmt(ast::property(ast::ident("log"), "length")),
    ]);
    assert_value(&v, &Value::I32(1));

    // throw, caught outside
    let v = run(vec![
        ast::let_("log", ast::array_lit(vec![])),
        Stmt::Try {
            body: vec![count_in_finally(vec![Stmt::Throw(ast::str_lit("x"))])],
            catch: Some(CatchClause {
                name: "e".to_string(),
                body: vec![],
            }),
            finally: None,
        },
        ast::expr_stmt(ast::property(ast::ident("log"), "length")),
    ]);
    assert_value(&v, &Value::I32(1));

    // normal completion
    let v = run(vec![
        ast::let_("log", ast::array_lit(vec![])),
        count_in_finally(vec![ast::expr_stmt(ast::int(1))]),
        ast::expr_stmt(ast::property(ast::ident("log"), "length")),
    ]);
    assert_value(&v, &Value::I32(1));
}

#[test]
fn finally_overrides_prior_signal() {
    // try { throw "a" } finally { throw "b" } — "b" wins.
    let err = run_err(vec![Stmt::Try {
        body: vec![Stmt::Throw(ast::str_lit("a"))],
        catch: None,
        finally: Some(vec![Stmt::Throw(ast::str_lit("b"))]),
    }]);
    assert_eq!(err.to_string(), "b");
}

#[test]
fn defer_runs_lifo_on_function_exit() {
    let f = ast::function(
        vec![],
        vec![
            Stmt::Defer(ast::method(ast::ident("log"), "push", vec![ast::int(1)])),
            Stmt::Defer(ast::method(ast::ident("log"), "push", vec![ast::int(2)])),
            ast::ret(Some(Expr::Null)),
        ],
    );
    let v = run(vec![
        ast::let_("log", ast::array_lit(vec![])),
        ast::let_("f", f),
        ast::expr_stmt(ast::call(ast::ident("f"), vec![])),
        ast::expr_stmt(ast::method(ast::ident("log"), "join", vec![ast::str_lit(",")])),
    ]);
    assert!(v.equals(&run(vec![ast::expr_stmt(ast::str_lit("2,1"))])));
}

#[test]
fn defer_runs_when_function_throws() {
    let f = ast::function(
        vec![],
        vec![
            Stmt::Defer(ast::method(ast::ident("log"), "push", vec![ast::int(1)])),
            Stmt::Throw(ast::str_lit("boom")),
        ],
    );
    let v = run(vec![
        ast::let_("log", ast::array_lit(vec![])),
        ast::let_("f", f),
        Stmt::Try {
            body: vec![ast::expr_stmt(ast::call(ast::ident("f"), vec![]))],
            catch: Some(CatchClause {
                name: "e".to_string(),
                body: vec![],
            }),
            finally: None,
        },
        ast::expr_stmt(ast::property(ast::ident("log"), "length")),
    ]);
    assert_value(&v, &Value::I32(1));
}

#[test]
fn defer_in_loop_registers_once_per_iteration() {
    // for i in [1,2,3] defer log.push(i) — all three run at function exit.
    let f = ast::function(
        vec![],
        vec![
            Stmt::ForIn {
                var: "i".to_string(),
                iterable: ast::array_lit(vec![ast::int(1), ast::int(2), ast::int(3)]),
                body: Box::new(Stmt::Defer(ast::method(
                    ast::ident("log"),
                    "push",
                    vec![ast::ident("i")],
                ))),
            },
            ast::ret(None),
        ],
    );
    let v = run(vec![
        ast::let_("log", ast::array_lit(vec![])),
        ast::let_("f", f),
        ast::expr_stmt(ast::call(ast::ident("f"), vec![])),
        ast::expr_stmt(ast::method(ast::ident("log"), "join", vec![ast::str_lit(",")])),
    ]);
    assert!(v.equals(&run(vec![ast::expr_stmt(ast::str_lit("3,2,1"))])));
}

// ---------------------------------------------------------------------------
// Functions and closures
// ---------------------------------------------------------------------------

#[test]
fn closures_share_the_captured_environment() {
    // let n = 0; let inc = fn() { n = n + 1; return n; }; inc(); inc();
    let inc = ast::function(
        vec![],
        vec![
            ast::expr_stmt(ast::assign_name(
                "n",
                ast::binary(BinOp::Add, ast::ident("n"), ast::int(1)),
            )),
            ast::ret(Some(ast::ident("n"))),
        ],
    );
    let v = run(vec![
        ast::let_("n", ast::int(0)),
        ast::let_("inc", inc),
        ast::expr_stmt(ast::call(ast::ident("inc"), vec![])),
        ast::expr_stmt(ast::call(ast::ident("inc"), vec![])),
        ast::expr_stmt(ast::ident("n")),
    ]);
    assert_value(&v, &Value::I32(2));
}

#[test]
fn fall_through_returns_null() {
    let f = ast::function(vec![], vec![ast::expr_stmt(ast::int(42))]);
    let v = run(vec![
        ast::let_("f", f),
        ast::expr_stmt(ast::call(ast::ident("f"), vec![])),
    ]);
    assert_value(&v, &Value::Null);
}

#[test]
fn named_default_and_rest_arguments() {
    // fn f(x, y = 10, ...rest) { return x + y + rest.length; }
    let f = Expr::Function {
        params: vec![
            ast::param("x"),
            Param {
                name: "y".to_string(),
                ty: None,
                default: Some(ast::int(10)),
            },
        ],
        rest_param: Some("rest".to_string()),
        return_type: None,
        body: std::sync::Arc::new(ast::block(vec![ast::ret(Some(ast::binary(
            BinOp::Add,
            ast::binary(BinOp::Add, ast::ident("x"), ast::ident("y")),
            ast::property(ast::ident("rest"), "length"),
        )))])),
        is_async: false,
    };

    // f(1) -> 1 + 10 + 0
    let v = run(vec![
        ast::let_("f", f.clone()),
        ast::expr_stmt(ast::call(ast::ident("f"), vec![ast::int(1)])),
    ]);
    assert_value(&v, &Value::I32(11));

    // f(1, y: 2) -> 3
    let v = run(vec![
        ast::let_("f", f.clone()),
        ast::expr_stmt(Expr::Call {
            callee: Box::new(ast::ident("f")),
            args: vec![
                Arg::Positional(ast::int(1)),
                Arg::Named("y".to_string(), ast::int(2)),
            ],
        }),
    ]);
    assert_value(&v, &Value::I32(3));

    // f(1, 2, 3, 4) -> 1 + 2 + 2
    let v = run(vec![
        ast::let_("f", f.clone()),
        ast::expr_stmt(ast::call(
            ast::ident("f"),
            vec![ast::int(1), ast::int(2), ast::int(3), ast::int(4)],
        )),
    ]);
    assert_value(&v, &Value::I32(5));

    // spread: f(...[1, 2]) -> 3
    let v = run(vec![
        ast::let_("f", f.clone()),
        ast::expr_stmt(Expr::Call {
            callee: Box::new(ast::ident("f")),
            args: vec![Arg::Spread(ast::array_lit(vec![ast::int(1), ast::int(2)]))],
        }),
    ]);
    assert_value(&v, &Value::I32(3));

    // f() -> arity error
    let err = run_err(vec![
        ast::let_("f", f),
        ast::expr_stmt(ast::call(ast::ident("f"), vec![])),
    ]);
    assert!(err.to_string().contains("missing required argument"));
}

#[test]
fn too_many_arguments_without_rest_fails() {
    let f = ast::function(vec![ast::param("x")], vec![ast::ret(Some(ast::ident("x")))]);
    let err = run_err(vec![
        ast::let_("f", f),
        ast::expr_stmt(ast::call(ast::ident("f"), vec![ast::int(1), ast::int(2)])),
    ]);
    assert!(err.to_string().contains("expects 1 argument"));
}

#[test]
fn await_on_non_task_returns_value() {
    let v = run(vec![ast::expr_stmt(Expr::Await(Box::new(ast::int(5))))]);
    assert_value(&v, &Value::I32(5));
}

// ---------------------------------------------------------------------------
// Resolver equivalence
// ---------------------------------------------------------------------------

#[test]
fn resolved_and_unresolved_programs_agree() {
    let make = || {
        vec![
            ast::let_("total", ast::int(0)),
            ast::let_(
                "add",
                ast::function(
                    vec![ast::param("x")],
                    vec![ast::block(vec![
                        ast::let_("doubled", ast::binary(BinOp::Mul, ast::ident("x"), ast::int(2))),
                        ast::expr_stmt(ast::assign_name(
                            "total",
                            ast::binary(BinOp::Add, ast::ident("total"), ast::ident("doubled")),
                        )),
                    ])],
                ),
            ),
            ast::expr_stmt(ast::call(ast::ident("add"), vec![ast::int(3)])),
            ast::expr_stmt(ast::call(ast::ident("add"), vec![ast::int(4)])),
            ast::expr_stmt(ast::ident("total")),
        ]
    };

    // Resolved path
    let mut resolved = Program::new(make());
    resolve_program(&mut resolved);
    let mut interp = Interpreter::new();
    interp.capture_output();
    let via_slots = interp.run(&resolved).expect("resolved run failed");

    // Name-lookup path
    let unresolved = Program::new(make());
    let mut interp = Interpreter::new();
    interp.capture_output();
    let via_names = interp.run(&unresolved).expect("unresolved run failed");

    assert_value(&via_slots, &Value::I32(14));
    assert_value(&via_names, &Value::I32(14));
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

#[test]
fn value_printing_shapes() {
    let out = output(vec![
        print_of(Expr::Null),
        print_of(ast::Expr::Bool(true)),
        print_of(ast::float(2.5)),
        print_of(ast::array_lit(vec![
            ast::int(1),
            ast::str_lit("x"),
            ast::array_lit(vec![]),
        ])),
        print_of(ast::object_lit(vec![("a", ast::int(1))])),
        print_of(Expr::ObjectLit {
            type_name: Some("Point".to_string()),
            fields: vec![],
        }),
        print_of(ast::function(vec![], vec![])),
        print_of(ast::call(ast::ident("channel"), vec![ast::int(1)])),
        print_of(ast::call(ast::ident("typeof"), vec![ast::int(1)])),
    ]);
    assert_eq!(
        out,
        "null\ntrue\n2.5\n[1, x, []]\n<object>\n<object:Point>\n<function>\n<channel>\n<type>\n"
    );
}
