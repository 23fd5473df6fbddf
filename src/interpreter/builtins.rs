/// The core builtin table. Standard-library and FFI collaborators register
/// additional builtins through the same `(name, arity, variadic, fn)` form
/// (see `services::*` for the bundled examples).
use std::time::Duration;

use crate::heap::Handle;
use crate::interpreter::{CallArgs, Interpreter};
use crate::runtime::task::run_on_thread;
use crate::value::{RuntimeError, Value};

pub(super) fn register(interp: &mut Interpreter) {
    interp.register_builtin("print", 1, true, bi_print);
    interp.register_builtin("typeof", 1, false, bi_typeof);
    interp.register_builtin("channel", 1, false, bi_channel);
    interp.register_builtin("spawn", 1, true, bi_spawn);
    interp.register_builtin("join", 1, false, bi_join);
    interp.register_builtin("detach", 1, false, bi_detach);
    interp.register_builtin("sleep", 1, false, bi_sleep);
    interp.register_builtin("alloc", 1, false, bi_alloc);
    interp.register_builtin("free", 1, false, bi_free);
    interp.register_builtin("buffer", 1, false, bi_buffer);
}

fn bi_print(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let line = args
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    interp.print_line(&line);
    Ok(Value::Null)
}

fn bi_typeof(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::Type(args[0].tag()))
}

fn bi_channel(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let capacity = args[0].as_index("channel()")?;
    Ok(Value::Channel(interp.heap().new_channel(capacity)))
}

/// `spawn(fn, args...)` — run an async function on its own OS thread. The
/// task thread evaluates the body against a fresh child scope of the
/// function's captured environment.
fn bi_spawn(interp: &mut Interpreter, mut args: Vec<Value>) -> Result<Value, RuntimeError> {
    let callee = args.remove(0);
    let func = match &callee {
        Value::Function(func) => Handle::clone(func),
        other => {
            return Err(RuntimeError::Concurrency(format!(
                "spawn() requires a function, got {}",
                other.type_name()
            )))
        }
    };
    if !func.is_async {
        return Err(RuntimeError::Concurrency(
            "spawn() requires an async function".to_string(),
        ));
    }

    let task = interp.heap().new_task();
    let runtime = interp.runtime().clone();
    let mut worker = Interpreter::for_task(runtime, interp);
    run_on_thread(Handle::clone(&task), move || {
        worker.call_function(&func, CallArgs::positional(args))
    });
    Ok(Value::Task(task))
}

fn bi_join(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Task(task) => task.join(),
        other => Err(RuntimeError::Concurrency(format!(
            "join() requires a task, got {}",
            other.type_name()
        ))),
    }
}

fn bi_detach(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::Task(task) => {
            task.detach()?;
            Ok(Value::Null)
        }
        other => Err(RuntimeError::Concurrency(format!(
            "detach() requires a task, got {}",
            other.type_name()
        ))),
    }
}

fn bi_sleep(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let seconds = match args[0].as_num() {
        Some(crate::value::Num::Int(n)) if n >= 0 => n as f64,
        Some(crate::value::Num::Float(f)) if f >= 0.0 => f,
        _ => {
            return Err(RuntimeError::Type(
                "sleep() requires a non-negative number of seconds".to_string(),
            ))
        }
    };
    std::thread::sleep(Duration::from_secs_f64(seconds));
    Ok(Value::Null)
}

fn bi_alloc(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let size = args[0].as_index("alloc()")?;
    Ok(Value::Ptr(interp.heap().alloc_raw(size)?))
}

/// Manual free. Containers must be the single live reference; the freed
/// registry turns a second free into a clean error.
fn bi_free(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    interp.heap().free_value(&args[0])?;
    Ok(Value::Null)
}

fn bi_buffer(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let size = args[0].as_index("buffer()")?;
    if size == 0 {
        return Err(RuntimeError::Range(
            "buffer size must be positive".to_string(),
        ));
    }
    Ok(Value::Buffer(interp.heap().new_buffer(size)))
}
