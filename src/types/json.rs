/// JSON text conversion: `value.serialize()` and `string.deserialize()`.
///
/// Object field order survives round-trips (serde_json runs with
/// `preserve_order`). Integers come back as `i64` (or `u64` beyond the
/// signed range), floats as `f64`; deep equality is width-tolerant, so
/// round-trips compare equal.
use serde_json::{Map, Number};

use crate::heap::Heap;
use crate::value::{RuntimeError, TypeTag, Value};

/// Tags `serialize` is dispatched for.
pub fn serializable(v: &Value) -> bool {
    matches!(
        v.tag(),
        TypeTag::Null | TypeTag::Bool | TypeTag::String | TypeTag::Array | TypeTag::Object
    ) || v.tag().is_numeric()
}

pub fn serialize_value(heap: &Heap, v: &Value) -> Result<Value, RuntimeError> {
    let mut seen = Vec::new();
    let json = to_json(v, &mut seen)?;
    let text = serde_json::to_string(&json)
        .map_err(|e| RuntimeError::Parse(format!("serialize(): {}", e)))?;
    Ok(heap.str_value(&text))
}

pub fn deserialize_str(heap: &Heap, text: &str) -> Result<Value, RuntimeError> {
    let json: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| RuntimeError::Parse(format!("deserialize(): {}", e)))?;
    Ok(from_json(heap, json))
}

/// `seen` holds the addresses of the containers on the current path, so a
/// cycle fails instead of recursing forever.
fn to_json(v: &Value, seen: &mut Vec<usize>) -> Result<serde_json::Value, RuntimeError> {
    match v {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Str(s) => Ok(serde_json::Value::String(s.to_string_lossy())),
        Value::F32(f) => float_json(*f as f64),
        Value::F64(f) => float_json(*f),
        Value::U64(n) => Ok(serde_json::Value::Number(Number::from(*n))),
        Value::Array(arr) => {
            let addr = std::sync::Arc::as_ptr(arr) as usize;
            if seen.contains(&addr) {
                return Err(circular());
            }
            seen.push(addr);
            let items: Result<Vec<_>, _> = arr
                .snapshot()
                .iter()
                .map(|elem| to_json(elem, seen))
                .collect();
            seen.pop();
            Ok(serde_json::Value::Array(items?))
        }
        Value::Object(obj) => {
            let addr = std::sync::Arc::as_ptr(obj) as usize;
            if seen.contains(&addr) {
                return Err(circular());
            }
            seen.push(addr);
            let mut map = Map::new();
            for (name, value) in obj.snapshot() {
                map.insert(name, to_json(&value, seen)?);
            }
            seen.pop();
            Ok(serde_json::Value::Object(map))
        }
        other => match other.as_int() {
            Some(n) => Ok(serde_json::Value::Number(Number::from(n as i64))),
            None => Err(RuntimeError::Type(format!(
                "cannot serialize {}",
                other.type_name()
            ))),
        },
    }
}

fn float_json(f: f64) -> Result<serde_json::Value, RuntimeError> {
    Number::from_f64(f)
        .map(serde_json::Value::Number)
        .ok_or_else(|| {
            RuntimeError::Type("cannot serialize a non-finite float".to_string())
        })
}

fn circular() -> RuntimeError {
    RuntimeError::Parse("serialize(): circular reference".to_string())
}

fn from_json(heap: &Heap, json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::I64(i)
            } else if let Some(u) = n.as_u64() {
                Value::U64(u)
            } else {
                Value::F64(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => heap.str_value(&s),
        serde_json::Value::Array(items) => {
            let values = items.into_iter().map(|item| from_json(heap, item)).collect();
            Value::Array(heap.new_array(values))
        }
        serde_json::Value::Object(map) => {
            let fields = map
                .into_iter()
                .map(|(name, value)| (name, from_json(heap, value)))
                .collect();
            Value::Object(heap.new_object(None, fields))
        }
    }
}
