/// Buffer method table. Byte get/set goes through index syntax; the table
/// carries `length` and slicing into a new buffer.
use crate::heap::{BufferObj, Handle};
use crate::interpreter::Interpreter;
use crate::types::{clamp_index, no_args, one_or_two};
use crate::value::{RuntimeError, Value};

pub fn call(
    interp: &mut Interpreter,
    buf: &Handle<BufferObj>,
    name: &str,
    mut args: Vec<Value>,
) -> Option<Result<Value, RuntimeError>> {
    match name {
        "length" => Some(no_args("length", &args).map(|_| Value::I32(buf.len() as i32))),
        "slice" => Some(slice(interp, buf, &mut args)),
        _ => None,
    }
}

fn slice(
    interp: &mut Interpreter,
    buf: &Handle<BufferObj>,
    args: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let (start, end) = one_or_two("slice", args)?;
    let len = buf.len();
    let start = clamp_index(&start, len, "slice()")?;
    let end = match end {
        Some(v) => clamp_index(&v, len, "slice()")?,
        None => len,
    };
    let bytes = buf.with_bytes(|b| {
        if start >= end {
            Vec::new()
        } else {
            b[start..end].to_vec()
        }
    })?;
    Ok(Value::Buffer(interp.heap().new_buffer_from(bytes)))
}
