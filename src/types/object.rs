/// Object method table. Field iteration order is insertion order; these
/// methods never reorder fields (`set` on an existing name overwrites in
/// place).
use crate::heap::{Handle, ObjectObj};
use crate::interpreter::Interpreter;
use crate::types::{one_arg, two_args};
use crate::value::{RuntimeError, Value};

pub fn call(
    _interp: &mut Interpreter,
    obj: &Handle<ObjectObj>,
    name: &str,
    mut args: Vec<Value>,
) -> Option<Result<Value, RuntimeError>> {
    match name {
        "get" => Some(one_arg("get", &mut args).and_then(|key| {
            let key = field_name("get", key)?;
            Ok(obj.get(&key)?.unwrap_or(Value::Null))
        })),
        "set" => Some(two_args("set", &mut args).and_then(|(key, value)| {
            let key = field_name("set", key)?;
            obj.set(&key, value)?;
            Ok(Value::Null)
        })),
        "has" => Some(one_arg("has", &mut args).and_then(|key| {
            let key = field_name("has", key)?;
            Ok(Value::Bool(obj.has(&key)?))
        })),
        _ => None,
    }
}

fn field_name(name: &str, v: Value) -> Result<String, RuntimeError> {
    match v {
        Value::Str(s) => Ok(s.to_string_lossy()),
        other => Err(RuntimeError::Type(format!(
            "{}(): field name must be a string, got {}",
            name,
            other.type_name()
        ))),
    }
}
