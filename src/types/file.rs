/// File handle method table. Closed files fail every operation except
/// `close()`, which is idempotent.
use crate::heap::{FileObj, Handle};
use crate::interpreter::Interpreter;
use crate::types::{no_args, one_arg};
use crate::value::{RuntimeError, Value};

pub fn call(
    interp: &mut Interpreter,
    file: &Handle<FileObj>,
    name: &str,
    mut args: Vec<Value>,
) -> Option<Result<Value, RuntimeError>> {
    match name {
        "read" => Some(no_args("read", &args).and_then(|_| {
            let bytes = file.read_to_end()?;
            Ok(Value::Str(interp.heap().new_string_from_bytes(bytes)))
        })),
        "read_bytes" => Some(one_arg("read_bytes", &mut args).and_then(|n| {
            let n = n.as_index("read_bytes()")?;
            let bytes = file.read_bytes(n)?;
            Ok(Value::Buffer(interp.heap().new_buffer_from(bytes)))
        })),
        "write" => Some(one_arg("write", &mut args).and_then(|v| {
            let written = match &v {
                Value::Str(s) => file.write_bytes(&s.bytes())?,
                Value::Buffer(b) => file.write_bytes(&b.with_bytes(|bytes| bytes.to_vec())?)?,
                other => {
                    return Err(RuntimeError::Type(format!(
                        "write(): argument must be a string or buffer, got {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::I32(written as i32))
        })),
        "seek" => Some(one_arg("seek", &mut args).and_then(|pos| {
            let pos = pos.as_index("seek()")? as u64;
            Ok(Value::I64(file.seek(pos)? as i64))
        })),
        "close" => Some(no_args("close", &args).map(|_| {
            file.close();
            Value::Null
        })),
        _ => None,
    }
}
