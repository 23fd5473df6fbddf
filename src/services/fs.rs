/// Filesystem service — `open(path, mode)`.
///
/// Modes follow the C conventions: "r", "w", "a", and the "+" variants.
/// The returned file value answers to the file method table (`read`,
/// `read_bytes`, `write`, `seek`, `close`).
use std::fs::OpenOptions;

use crate::interpreter::Interpreter;
use crate::value::{RuntimeError, Value};

pub fn register(interp: &mut Interpreter) {
    interp.register_builtin("open", 2, false, open);
}

fn open(interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let path = string_arg("open", &args[0])?;
    let mode = string_arg("open", &args[1])?;

    let mut options = OpenOptions::new();
    match mode.as_str() {
        "r" => options.read(true),
        "r+" => options.read(true).write(true),
        "w" => options.write(true).create(true).truncate(true),
        "w+" => options.read(true).write(true).create(true).truncate(true),
        "a" => options.append(true).create(true),
        "a+" => options.read(true).append(true).create(true),
        other => {
            return Err(RuntimeError::Io(format!(
                "open(): invalid mode '{}'",
                other
            )))
        }
    };

    let file = options
        .open(&path)
        .map_err(|e| RuntimeError::Io(format!("open(): {}: {}", path, e)))?;
    Ok(Value::File(interp.heap().new_file(path, mode, file)))
}

fn string_arg(name: &str, v: &Value) -> Result<String, RuntimeError> {
    match v {
        Value::Str(s) => Ok(s.to_string_lossy()),
        other => Err(RuntimeError::Type(format!(
            "{}(): argument must be a string, got {}",
            name,
            other.type_name()
        ))),
    }
}
