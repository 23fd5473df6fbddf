/// Per-type method tables. The evaluator resolves `x.method(args)` here
/// first, by the receiver's runtime tag; only when no table owns the name
/// does it fall back to object-field dispatch.
///
/// Every module exposes the same contract as the service modules:
/// `call(interp, receiver, name, args)` returning `None` when the name is
/// not owned by that table. Methods returning new heap values return them
/// with a fresh reference transferred to the caller.
pub mod array;
pub mod buffer;
pub mod file;
pub mod json;
pub mod object;
pub mod string;

use std::time::Duration;

use crate::interpreter::Interpreter;
use crate::runtime::channel::TryRecvOutcome;
use crate::value::{Num, RuntimeError, Value};

/// Method dispatch by receiver tag. `None` means "no builtin method of this
/// name for this receiver".
pub fn dispatch_method(
    interp: &mut Interpreter,
    recv: &Value,
    name: &str,
    args: Vec<Value>,
) -> Option<Result<Value, RuntimeError>> {
    // `serialize` is universal across every JSON-representable receiver.
    if name == "serialize" && json::serializable(recv) {
        if let Err(err) = no_args("serialize", &args) {
            return Some(Err(err));
        }
        let heap = interp.heap().clone();
        return Some(json::serialize_value(&heap, recv));
    }
    match recv {
        Value::Str(s) => string::call(interp, s, name, args),
        Value::Array(a) => array::call(interp, a, name, args),
        Value::Buffer(b) => buffer::call(interp, b, name, args),
        Value::Object(o) => object::call(interp, o, name, args),
        Value::File(f) => file::call(interp, f, name, args),
        Value::Channel(ch) => channel_method(interp, ch, name, args),
        Value::Task(task) => task_method(task, name, args),
        _ => None,
    }
}

/// Built-in pseudo-properties (`x.length` without a call).
pub fn get_property(recv: &Value, name: &str) -> Option<Result<Value, RuntimeError>> {
    match (recv, name) {
        (Value::Str(s), "length") => Some(Ok(Value::I32(s.byte_len() as i32))),
        (Value::Str(s), "char_length") => Some(Ok(Value::I32(s.char_len() as i32))),
        (Value::Array(a), "length") => Some(Ok(Value::I32(a.len() as i32))),
        (Value::Buffer(b), "length") => Some(Ok(Value::I32(b.len() as i32))),
        (Value::Buffer(b), "capacity") => Some(Ok(Value::I32(b.capacity() as i32))),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Channel and task methods
// ---------------------------------------------------------------------------

fn channel_method(
    interp: &mut Interpreter,
    ch: &crate::heap::Handle<crate::runtime::channel::ChannelObj>,
    name: &str,
    mut args: Vec<Value>,
) -> Option<Result<Value, RuntimeError>> {
    match name {
        "send" => Some(one_arg("send", &mut args).and_then(|v| {
            ch.send(v)?;
            Ok(Value::Null)
        })),
        "recv" => Some(recv_timeout("recv", &args).and_then(|timeout| {
            Ok(ch.recv(timeout)?.unwrap_or(Value::Null))
        })),
        "try_send" => Some(one_arg("try_send", &mut args).and_then(|v| {
            Ok(Value::Bool(ch.try_send(v)?))
        })),
        "try_recv" => {
            if let Err(err) = no_args("try_recv", &args) {
                return Some(Err(err));
            }
            let (ok, value) = match ch.try_recv() {
                TryRecvOutcome::Item(v) => (true, v),
                TryRecvOutcome::Closed => (true, Value::Null),
                TryRecvOutcome::Pending => (false, Value::Null),
            };
            let obj = interp.heap().new_object(
                None,
                vec![
                    ("ok".to_string(), Value::Bool(ok)),
                    ("value".to_string(), value),
                ],
            );
            Some(Ok(Value::Object(obj)))
        }
        "close" => {
            if let Err(err) = no_args("close", &args) {
                return Some(Err(err));
            }
            ch.close();
            Some(Ok(Value::Null))
        }
        _ => None,
    }
}

fn recv_timeout(name: &str, args: &[Value]) -> Result<Option<Duration>, RuntimeError> {
    match args {
        [] => Ok(None),
        [timeout] => match timeout.as_num() {
            Some(Num::Int(n)) if n >= 0 => Ok(Some(Duration::from_secs_f64(n as f64))),
            Some(Num::Float(f)) if f >= 0.0 => Ok(Some(Duration::from_secs_f64(f))),
            _ => Err(RuntimeError::Type(format!(
                "{}(): timeout must be a non-negative number",
                name
            ))),
        },
        _ => Err(RuntimeError::Arity(format!(
            "{}() takes at most 1 argument, got {}",
            name,
            args.len()
        ))),
    }
}

fn task_method(
    task: &crate::heap::Handle<crate::runtime::task::TaskObj>,
    name: &str,
    args: Vec<Value>,
) -> Option<Result<Value, RuntimeError>> {
    match name {
        "join" => Some(no_args("join", &args).and_then(|_| task.join())),
        "detach" => Some(no_args("detach", &args).and_then(|_| {
            task.detach()?;
            Ok(Value::Null)
        })),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Argument helpers shared by the method tables
// ---------------------------------------------------------------------------

pub(crate) fn no_args(name: &str, args: &[Value]) -> Result<(), RuntimeError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(RuntimeError::Arity(format!(
            "{}() takes no arguments, got {}",
            name,
            args.len()
        )))
    }
}

pub(crate) fn one_arg(name: &str, args: &mut Vec<Value>) -> Result<Value, RuntimeError> {
    if args.len() != 1 {
        return Err(RuntimeError::Arity(format!(
            "{}() takes 1 argument, got {}",
            name,
            args.len()
        )));
    }
    Ok(args.remove(0))
}

pub(crate) fn two_args(name: &str, args: &mut Vec<Value>) -> Result<(Value, Value), RuntimeError> {
    if args.len() != 2 {
        return Err(RuntimeError::Arity(format!(
            "{}() takes 2 arguments, got {}",
            name,
            args.len()
        )));
    }
    let second = args.remove(1);
    let first = args.remove(0);
    Ok((first, second))
}

/// One required argument plus one optional.
pub(crate) fn one_or_two(
    name: &str,
    args: &mut Vec<Value>,
) -> Result<(Value, Option<Value>), RuntimeError> {
    match args.len() {
        1 => Ok((args.remove(0), None)),
        2 => {
            let second = args.remove(1);
            Ok((args.remove(0), Some(second)))
        }
        n => Err(RuntimeError::Arity(format!(
            "{}() takes 1 or 2 arguments, got {}",
            name, n
        ))),
    }
}

/// Signed int for clamping slice bounds: negative clamps to 0.
pub(crate) fn clamp_index(v: &Value, len: usize, what: &str) -> Result<usize, RuntimeError> {
    match v.as_int() {
        Some(n) if n < 0 => Ok(0),
        Some(n) => Ok((n as usize).min(len)),
        None => Err(RuntimeError::Type(format!(
            "{}: index must be an integer, got {}",
            what,
            v.type_name()
        ))),
    }
}
