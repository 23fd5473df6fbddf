/// Array method table.
///
/// Methods:
///   length, push, pop, shift, unshift, insert(i,v), remove(i)
///   get(i), set(i,v) — strict bounds
///   first, last, clear, find(v), contains(v)
///   slice(start[,end]) — clamped
///   join(sep), concat(other), reverse — reverse is in place
///   map(fn), filter(fn), reduce(fn[,init])
///
/// Typed arrays: once the element constraint is set, every insertion path
/// (push/unshift/insert/set/concat target) rejects mismatched tags.
use crate::heap::{ArrayObj, Handle};
use crate::interpreter::Interpreter;
use crate::types::{clamp_index, no_args, one_arg, one_or_two, two_args};
use crate::value::{RuntimeError, Value};

pub fn call(
    interp: &mut Interpreter,
    arr: &Handle<ArrayObj>,
    name: &str,
    mut args: Vec<Value>,
) -> Option<Result<Value, RuntimeError>> {
    match name {
        "length" => Some(no_args("length", &args).map(|_| Value::I32(arr.len() as i32))),
        "push" => Some(one_arg("push", &mut args).and_then(|v| {
            arr.push(v)?;
            Ok(Value::Null)
        })),
        "pop" => Some(no_args("pop", &args).and_then(|_| {
            Ok(arr.pop()?.unwrap_or(Value::Null))
        })),
        "shift" => Some(no_args("shift", &args).and_then(|_| shift(arr))),
        "unshift" => Some(one_arg("unshift", &mut args).and_then(|v| {
            arr.insert(0, v)?;
            Ok(Value::Null)
        })),
        "insert" => Some(two_args("insert", &mut args).and_then(|(idx, v)| {
            arr.insert(idx.as_index("insert()")?, v)?;
            Ok(Value::Null)
        })),
        "remove" => Some(one_arg("remove", &mut args).and_then(|idx| {
            arr.remove(idx.as_index("remove()")?)
        })),
        "get" => Some(one_arg("get", &mut args).and_then(|idx| {
            arr.get(idx.as_index("get()")?)
        })),
        "set" => Some(two_args("set", &mut args).and_then(|(idx, v)| {
            arr.set(idx.as_index("set()")?, v)?;
            Ok(Value::Null)
        })),
        "first" => Some(no_args("first", &args).map(|_| {
            arr.snapshot().first().cloned().unwrap_or(Value::Null)
        })),
        "last" => Some(no_args("last", &args).map(|_| {
            arr.snapshot().last().cloned().unwrap_or(Value::Null)
        })),
        "clear" => Some(no_args("clear", &args).and_then(|_| {
            arr.clear()?;
            Ok(Value::Null)
        })),
        "find" => Some(one_arg("find", &mut args).map(|needle| {
            let position = arr.snapshot().iter().position(|v| v.equals(&needle));
            Value::I32(position.map(|p| p as i32).unwrap_or(-1))
        })),
        "contains" => Some(one_arg("contains", &mut args).map(|needle| {
            Value::Bool(arr.snapshot().iter().any(|v| v.equals(&needle)))
        })),
        "slice" => Some(slice(interp, arr, &mut args)),
        "join" => Some(join(interp, arr, &mut args)),
        "concat" => Some(concat(interp, arr, &mut args)),
        "reverse" => Some(no_args("reverse", &args).and_then(|_| {
            arr.reverse()?;
            Ok(Value::Null)
        })),
        "map" => Some(map(interp, arr, &mut args)),
        "filter" => Some(filter(interp, arr, &mut args)),
        "reduce" => Some(reduce(interp, arr, &mut args)),
        _ => None,
    }
}

// ─── Implementations ────────────────────────────────────────────────────────

fn shift(arr: &Handle<ArrayObj>) -> Result<Value, RuntimeError> {
    arr.with_elements_mut(|elements| {
        if elements.is_empty() {
            Value::Null
        } else {
            elements.remove(0)
        }
    })
}

fn slice(
    interp: &mut Interpreter,
    arr: &Handle<ArrayObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let (start, end) = one_or_two("slice", args)?;
    let elements = arr.snapshot();
    let len = elements.len();
    let start = clamp_index(&start, len, "slice()")?;
    let end = match end {
        Some(v) => clamp_index(&v, len, "slice()")?,
        None => len,
    };
    let out = if start >= end {
        Vec::new()
    } else {
        elements[start..end].to_vec()
    };
    Ok(Value::Array(interp.heap().new_array(out)))
}

fn join(
    interp: &mut Interpreter,
    arr: &Handle<ArrayObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let sep = match one_arg("join", args)? {
        Value::Str(s) => s.to_string_lossy(),
        other => {
            return Err(RuntimeError::Type(format!(
                "join(): separator must be a string, got {}",
                other.type_name()
            )))
        }
    };
    let joined = arr
        .snapshot()
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(&sep);
    Ok(interp.heap().str_value(&joined))
}

fn concat(
    interp: &mut Interpreter,
    arr: &Handle<ArrayObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let other = match one_arg("concat", args)? {
        Value::Array(other) => other,
        other => {
            return Err(RuntimeError::Type(format!(
                "concat(): argument must be an array, got {}",
                other.type_name()
            )))
        }
    };
    let mut out = arr.snapshot();
    out.extend(other.snapshot());
    Ok(Value::Array(interp.heap().new_array(out)))
}

fn map(
    interp: &mut Interpreter,
    arr: &Handle<ArrayObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let func = one_arg("map", args)?;
    let mut out = Vec::with_capacity(arr.len());
    for elem in arr.snapshot() {
        out.push(interp.call_callable(&func, vec![elem])?);
    }
    Ok(Value::Array(interp.heap().new_array(out)))
}

fn filter(
    interp: &mut Interpreter,
    arr: &Handle<ArrayObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let func = one_arg("filter", args)?;
    let mut out = Vec::new();
    for elem in arr.snapshot() {
        if interp.call_callable(&func, vec![elem.clone()])?.truthy() {
            out.push(elem);
        }
    }
    Ok(Value::Array(interp.heap().new_array(out)))
}

fn reduce(
    interp: &mut Interpreter,
    arr: &Handle<ArrayObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let (func, init) = one_or_two("reduce", args)?;
    let elements = arr.snapshot();
    let mut iter = elements.into_iter();
    let mut acc = match init {
        Some(v) => v,
        None => iter.next().ok_or_else(|| {
            RuntimeError::Type("reduce() of empty array with no initial value".to_string())
        })?,
    };
    for elem in iter {
        acc = interp.call_callable(&func, vec![acc, elem])?;
    }
    Ok(acc)
}
