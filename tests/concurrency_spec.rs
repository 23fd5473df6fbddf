/// Spec tests for tasks and channels: spawn/join/detach, error re-raising,
/// channel blocking semantics, ordering, and reference-count conservation
/// across a send/recv pair.
use std::sync::Arc;

use hemlock::ast::{self, BinOp, Program, Stmt};
use hemlock::heap::Heap;
use hemlock::{Interpreter, RuntimeError, Value};

fn run_in(interp: &mut Interpreter, stmts: Vec<Stmt>) -> Result<Value, RuntimeError> {
    let mut program = Program::new(stmts);
    hemlock::resolver::resolve_program(&mut program);
    interp.run(&program)
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[test]
fn spawn_await_and_join_once() {
    // async fn f() { return 42; } let t = spawn(f); print(await t);
    let mut interp = Interpreter::new();
    interp.capture_output();
    let v = run_in(
        &mut interp,
        vec![
            ast::let_("f", ast::async_function(vec![], vec![ast::ret(Some(ast::int(42)))])),
            ast::let_("t", ast::call(ast::ident("spawn"), vec![ast::ident("f")])),
            ast::expr_stmt(ast::Expr::Await(Box::new(ast::ident("t")))),
        ],
    )
    .expect("spawn/await failed");
    assert!(v.equals(&Value::I32(42)));

    // A second join on the same task handle fails.
    let err = run_in(
        &mut interp,
        vec![ast::expr_stmt(ast::call(ast::ident("join"), vec![ast::ident("t")]))],
    )
    .expect_err("second join should fail");
    assert!(err.to_string().contains("task handle already joined"));
}

#[test]
fn spawn_passes_arguments() {
    let add = ast::async_function(
        vec![ast::param("x"), ast::param("y")],
        vec![ast::ret(Some(ast::binary(
            BinOp::Add,
            ast::ident("x"),
            ast::ident("y"),
        )))],
    );
    let mut interp = Interpreter::new();
    interp.capture_output();
    let v = run_in(
        &mut interp,
        vec![
            ast::let_("add", add),
            ast::let_(
                "t",
                ast::call(ast::ident("spawn"), vec![ast::ident("add"), ast::int(20), ast::int(22)]),
            ),
            ast::expr_stmt(ast::call(ast::ident("join"), vec![ast::ident("t")])),
        ],
    )
    .expect("spawn with args failed");
    assert!(v.equals(&Value::I32(42)));
}

#[test]
fn spawn_requires_async_function() {
    let f = ast::function(vec![], vec![ast::ret(Some(ast::int(1)))]);
    let mut interp = Interpreter::new();
    interp.capture_output();
    let err = run_in(
        &mut interp,
        vec![
            ast::let_("f", f),
            ast::expr_stmt(ast::call(ast::ident("spawn"), vec![ast::ident("f")])),
        ],
    )
    .expect_err("spawn of sync function should fail");
    assert!(err.to_string().contains("async"));
}

#[test]
fn task_error_reraises_on_join() {
    let boom = ast::async_function(vec![], vec![Stmt::Throw(ast::str_lit("bad"))]);
    let mut interp = Interpreter::new();
    interp.capture_output();
    let err = run_in(
        &mut interp,
        vec![
            ast::let_("boom", boom),
            ast::let_("t", ast::call(ast::ident("spawn"), vec![ast::ident("boom")])),
            ast::expr_stmt(ast::call(ast::ident("join"), vec![ast::ident("t")])),
        ],
    )
    .expect_err("join should re-raise the task error");
    assert_eq!(err.to_string(), "bad");
}

#[test]
fn join_after_detach_fails() {
    let f = ast::async_function(vec![], vec![ast::ret(None)]);
    let mut interp = Interpreter::new();
    interp.capture_output();
    let err = run_in(
        &mut interp,
        vec![
            ast::let_("f", f),
            ast::let_("t", ast::call(ast::ident("spawn"), vec![ast::ident("f")])),
            ast::expr_stmt(ast::call(ast::ident("detach"), vec![ast::ident("t")])),
            ast::expr_stmt(ast::call(ast::ident("join"), vec![ast::ident("t")])),
        ],
    )
    .expect_err("join of detached task should fail");
    assert!(err.to_string().contains("detached"));
}

// ---------------------------------------------------------------------------
// Channels (language surface)
// ---------------------------------------------------------------------------

#[test]
fn channel_send_recv_close_drain() {
    // let ch = channel(2); send a, b; close; recv x3 -> a, b, null.
    let mut interp = Interpreter::new();
    interp.capture_output();
    run_in(
        &mut interp,
        vec![
            ast::let_("ch", ast::call(ast::ident("channel"), vec![ast::int(2)])),
            ast::expr_stmt(ast::method(ast::ident("ch"), "send", vec![ast::str_lit("a")])),
            ast::expr_stmt(ast::method(ast::ident("ch"), "send", vec![ast::str_lit("b")])),
            ast::expr_stmt(ast::method(ast::ident("ch"), "close", vec![])),
            ast::expr_stmt(ast::call(
                ast::ident("print"),
                vec![ast::method(ast::ident("ch"), "recv", vec![])],
            )),
            ast::expr_stmt(ast::call(
                ast::ident("print"),
                vec![ast::method(ast::ident("ch"), "recv", vec![])],
            )),
            ast::expr_stmt(ast::call(
                ast::ident("print"),
                vec![ast::method(ast::ident("ch"), "recv", vec![])],
            )),
        ],
    )
    .expect("channel program failed");
    assert_eq!(interp.captured_output(), "a\nb\nnull\n");
}

#[test]
fn send_to_closed_channel_fails() {
    let mut interp = Interpreter::new();
    interp.capture_output();
    let err = run_in(
        &mut interp,
        vec![
            ast::let_("ch", ast::call(ast::ident("channel"), vec![ast::int(1)])),
            ast::expr_stmt(ast::method(ast::ident("ch"), "close", vec![])),
            ast::expr_stmt(ast::method(ast::ident("ch"), "send", vec![ast::int(1)])),
        ],
    )
    .expect_err("send to closed channel should fail");
    assert!(err.to_string().contains("closed channel"));
}

#[test]
fn recv_timeout_returns_null() {
    let mut interp = Interpreter::new();
    interp.capture_output();
    let v = run_in(
        &mut interp,
        vec![
            ast::let_("ch", ast::call(ast::ident("channel"), vec![ast::int(1)])),
            ast::expr_stmt(ast::method(ast::ident("ch"), "recv", vec![ast::float(0.02)])),
        ],
    )
    .expect("recv with timeout failed");
    assert!(v.equals(&Value::Null));
}

#[test]
fn try_send_and_try_recv_report_status() {
    let mut interp = Interpreter::new();
    interp.capture_output();
    let v = run_in(
        &mut interp,
        vec![
            ast::let_("ch", ast::call(ast::ident("channel"), vec![ast::int(1)])),
            // Empty: try_recv reports ok=false.
            ast::let_("empty", ast::method(ast::ident("ch"), "try_recv", vec![])),
            // Fill, then the second try_send reports false.
            ast::let_("sent1", ast::method(ast::ident("ch"), "try_send", vec![ast::int(1)])),
            ast::let_("sent2", ast::method(ast::ident("ch"), "try_send", vec![ast::int(2)])),
            ast::let_("got", ast::method(ast::ident("ch"), "try_recv", vec![])),
            ast::expr_stmt(ast::array_lit(vec![
                ast::property(ast::ident("empty"), "ok"),
                ast::ident("sent1"),
                ast::ident("sent2"),
                ast::property(ast::ident("got"), "ok"),
                ast::property(ast::ident("got"), "value"),
            ])),
        ],
    )
    .expect("try variants failed");
    let expected = Interpreter::new().run(&Program::new(vec![ast::expr_stmt(
        ast::array_lit(vec![
            ast::Expr::Bool(false),
            ast::Expr::Bool(true),
            ast::Expr::Bool(false),
            ast::Expr::Bool(true),
            ast::int(1),
        ]),
    )])).expect("expected value");
    assert!(v.equals(&expected));
}

// ---------------------------------------------------------------------------
// Cross-task behavior
// ---------------------------------------------------------------------------

#[test]
fn channel_preserves_send_order_across_tasks() {
    // A producer task sends 1, 2, 3 then closes; the main task receives
    // them in that order.
    let producer = ast::async_function(
        vec![],
        vec![
            ast::expr_stmt(ast::method(ast::ident("ch"), "send", vec![ast::int(1)])),
            ast::expr_stmt(ast::method(ast::ident("ch"), "send", vec![ast::int(2)])),
            ast::expr_stmt(ast::method(ast::ident("ch"), "send", vec![ast::int(3)])),
            ast::expr_stmt(ast::method(ast::ident("ch"), "close", vec![])),
            ast::ret(None),
        ],
    );
    let mut interp = Interpreter::new();
    interp.capture_output();
    let v = run_in(
        &mut interp,
        vec![
            // Capacity 1 forces the producer to block between sends.
            ast::let_("ch", ast::call(ast::ident("channel"), vec![ast::int(1)])),
            ast::let_("p", producer),
            ast::let_("t", ast::call(ast::ident("spawn"), vec![ast::ident("p")])),
            ast::let_("a", ast::method(ast::ident("ch"), "recv", vec![])),
            ast::let_("b", ast::method(ast::ident("ch"), "recv", vec![])),
            ast::let_("c", ast::method(ast::ident("ch"), "recv", vec![])),
            ast::expr_stmt(ast::call(ast::ident("join"), vec![ast::ident("t")])),
            ast::expr_stmt(ast::array_lit(vec![
                ast::ident("a"),
                ast::ident("b"),
                ast::ident("c"),
            ])),
        ],
    )
    .expect("producer/consumer failed");
    let expected = Interpreter::new()
        .run(&Program::new(vec![ast::expr_stmt(ast::array_lit(vec![
            ast::int(1),
            ast::int(2),
            ast::int(3),
        ]))]))
        .expect("expected value");
    assert!(v.equals(&expected));
}

#[test]
fn worker_task_prints_into_shared_output() {
    let worker = ast::async_function(
        vec![],
        vec![
            ast::expr_stmt(ast::call(ast::ident("print"), vec![ast::str_lit("from-task")])),
            ast::ret(None),
        ],
    );
    let mut interp = Interpreter::new();
    interp.capture_output();
    run_in(
        &mut interp,
        vec![
            ast::let_("w", worker),
            ast::let_("t", ast::call(ast::ident("spawn"), vec![ast::ident("w")])),
            ast::expr_stmt(ast::call(ast::ident("join"), vec![ast::ident("t")])),
        ],
    )
    .expect("worker failed");
    assert_eq!(interp.captured_output(), "from-task\n");
}

// ---------------------------------------------------------------------------
// Refcount conservation through a channel (direct heap API)
// ---------------------------------------------------------------------------

#[test]
fn send_recv_conserves_refcount() {
    let heap = Heap::new();
    let ch = heap.new_channel(1);
    let arr = heap.new_array(vec![Value::I32(1), Value::I32(2)]);

    let value = Value::Array(Arc::clone(&arr));
    let before = Arc::strong_count(&arr); // local + the value being sent
    ch.send(value).expect("send failed");
    // The channel now owns the reference the send transferred.
    assert_eq!(Arc::strong_count(&arr), before);

    let received = ch.recv(None).expect("recv failed").expect("value expected");
    assert_eq!(Arc::strong_count(&arr), before);

    drop(received);
    assert_eq!(Arc::strong_count(&arr), before - 1);
}
