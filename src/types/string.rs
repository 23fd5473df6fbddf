/// String method table — byte-indexed mutable UTF-8 text.
///
/// Methods:
///   length            — byte count
///   char_length       — code-point count (cached, recomputed after writes)
///   char_at(i)        — rune at code-point index; fails out of range
///   byte_at(i)        — byte at index; fails out of range
///   slice(start[,end])   — byte range, indices clamped to [0, length]
///   substr(start[,count]) — byte range by start+count, clamped
///   split(sep)        — array of strings; empty sep splits per character
///   find(s)           — byte index of first occurrence, -1 if absent
///   contains / starts_with / ends_with
///   trim / to_upper / to_lower / replace(old,new) / repeat(n)
///   to_bytes()        — buffer of the raw bytes
///   deserialize()     — parse the text as JSON
///
/// The clamping of `slice`/`substr` versus the hard failure of `char_at`/
/// `byte_at` is deliberate: range methods truncate, point lookups error.
use crate::heap::{Handle, StringObj};
use crate::interpreter::Interpreter;
use crate::types::{clamp_index, json, no_args, one_arg, one_or_two, two_args};
use crate::value::{RuntimeError, Value};

/// Returns `Some(result)` when `name` is owned by this table, `None`
/// otherwise.
pub fn call(
    interp: &mut Interpreter,
    s: &Handle<StringObj>,
    name: &str,
    mut args: Vec<Value>,
) -> Option<Result<Value, RuntimeError>> {
    match name {
        "length" => Some(no_args("length", &args).map(|_| Value::I32(s.byte_len() as i32))),
        "char_length" => {
            Some(no_args("char_length", &args).map(|_| Value::I32(s.char_len() as i32)))
        }
        "char_at" => Some(char_at(s, &mut args)),
        "byte_at" => Some(byte_at(s, &mut args)),
        "slice" => Some(slice(interp, s, &mut args)),
        "substr" => Some(substr(interp, s, &mut args)),
        "split" => Some(split(interp, s, &mut args)),
        "find" => Some(find(s, &mut args)),
        "contains" => Some(search(s, &mut args, "contains")),
        "starts_with" => Some(search(s, &mut args, "starts_with")),
        "ends_with" => Some(search(s, &mut args, "ends_with")),
        "trim" => Some(no_args("trim", &args).map(|_| {
            interp.heap().str_value(s.to_string_lossy().trim())
        })),
        "to_upper" => Some(no_args("to_upper", &args).map(|_| {
            interp
                .heap()
                .str_value(&s.to_string_lossy().to_uppercase())
        })),
        "to_lower" => Some(no_args("to_lower", &args).map(|_| {
            interp
                .heap()
                .str_value(&s.to_string_lossy().to_lowercase())
        })),
        "replace" => Some(replace(interp, s, &mut args)),
        "repeat" => Some(repeat(interp, s, &mut args)),
        "to_bytes" => Some(no_args("to_bytes", &args).map(|_| {
            Value::Buffer(interp.heap().new_buffer_from(s.bytes()))
        })),
        "deserialize" => Some(no_args("deserialize", &args).and_then(|_| {
            let heap = interp.heap().clone();
            json::deserialize_str(&heap, &s.to_string_lossy())
        })),
        _ => None,
    }
}

// ─── Implementations ────────────────────────────────────────────────────────

fn char_at(s: &Handle<StringObj>, args: &mut Vec<Value>) -> Result<Value, RuntimeError> {
    let index = one_arg("char_at", args)?.as_index("char_at()")?;
    let text = s.to_string_lossy();
    match text.chars().nth(index) {
        Some(c) => Ok(Value::Rune(c as u32)),
        None => Err(RuntimeError::Range(format!(
            "char_at(): index {} out of bounds (length {})",
            index,
            s.char_len()
        ))),
    }
}

fn byte_at(s: &Handle<StringObj>, args: &mut Vec<Value>) -> Result<Value, RuntimeError> {
    let index = one_arg("byte_at", args)?.as_index("byte_at()")?;
    s.byte_at(index).map(Value::U8).ok_or_else(|| {
        RuntimeError::Range(format!(
            "byte_at(): index {} out of bounds (length {})",
            index,
            s.byte_len()
        ))
    })
}

fn slice(
    interp: &mut Interpreter,
    s: &Handle<StringObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let (start, end) = one_or_two("slice", args)?;
    let len = s.byte_len();
    let start = clamp_index(&start, len, "slice()")?;
    let end = match end {
        Some(v) => clamp_index(&v, len, "slice()")?,
        None => len,
    };
    let bytes = if start >= end {
        Vec::new()
    } else {
        s.with_bytes(|b| b[start..end].to_vec())
    };
    Ok(Value::Str(interp.heap().new_string_from_bytes(bytes)))
}

fn substr(
    interp: &mut Interpreter,
    s: &Handle<StringObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let (start, count) = one_or_two("substr", args)?;
    let len = s.byte_len();
    let start = clamp_index(&start, len, "substr()")?;
    let count = match count {
        Some(v) => clamp_index(&v, len - start, "substr()")?,
        None => len - start,
    };
    let bytes = s.with_bytes(|b| b[start..start + count].to_vec());
    Ok(Value::Str(interp.heap().new_string_from_bytes(bytes)))
}

fn split(
    interp: &mut Interpreter,
    s: &Handle<StringObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let sep = string_arg("split", one_arg("split", args)?)?;
    let text = s.to_string_lossy();
    let parts: Vec<Value> = if sep.is_empty() {
        text.chars()
            .map(|c| interp.heap().str_value(&c.to_string()))
            .collect()
    } else {
        text.split(sep.as_str())
            .map(|part| interp.heap().str_value(part))
            .collect()
    };
    Ok(Value::Array(interp.heap().new_array(parts)))
}

fn find(s: &Handle<StringObj>, args: &mut Vec<Value>) -> Result<Value, RuntimeError> {
    let needle = string_arg("find", one_arg("find", args)?)?;
    let needle = needle.as_bytes();
    let position = s.with_bytes(|haystack| {
        if needle.is_empty() || needle.len() > haystack.len() {
            return if needle.is_empty() { Some(0) } else { None };
        }
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    });
    Ok(Value::I32(position.map(|p| p as i32).unwrap_or(-1)))
}

fn search(
    s: &Handle<StringObj>,
    args: &mut Vec<Value>,
    which: &str,
) -> Result<Value, RuntimeError> {
    let needle = string_arg(which, one_arg(which, args)?)?;
    let needle = needle.as_bytes();
    let result = s.with_bytes(|bytes| match which {
        "starts_with" => bytes.starts_with(needle),
        "ends_with" => bytes.ends_with(needle),
        _ => {
            needle.is_empty()
                || (needle.len() <= bytes.len()
                    && bytes.windows(needle.len()).any(|w| w == needle))
        }
    });
    Ok(Value::Bool(result))
}

fn replace(
    interp: &mut Interpreter,
    s: &Handle<StringObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let (old, new) = two_args("replace", args)?;
    let old = string_arg("replace", old)?;
    let new = string_arg("replace", new)?;
    if old.is_empty() {
        return Ok(Value::Str(interp.heap().new_string_from_bytes(s.bytes())));
    }
    let replaced = s.to_string_lossy().replace(&old, &new);
    Ok(interp.heap().str_value(&replaced))
}

fn repeat(
    interp: &mut Interpreter,
    s: &Handle<StringObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let count = one_arg("repeat", args)?.as_index("repeat()")?;
    let bytes = s.bytes();
    let mut out = Vec::with_capacity(bytes.len() * count);
    for _ in 0..count {
        out.extend_from_slice(&bytes);
    }
    Ok(Value::Str(interp.heap().new_string_from_bytes(out)))
}

fn string_arg(name: &str, v: Value) -> Result<String, RuntimeError> {
    match v {
        Value::Str(s) => Ok(s.to_string_lossy()),
        other => Err(RuntimeError::Type(format!(
            "{}(): argument must be a string, got {}",
            name,
            other.type_name()
        ))),
    }
}
