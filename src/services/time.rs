/// Time service — wall clock and a monotonic timer.
///
///   now()   — seconds since the Unix epoch, as f64
///   clock() — monotonic seconds since the runtime was created, as f64
use std::time::{SystemTime, UNIX_EPOCH};

use crate::interpreter::Interpreter;
use crate::value::{RuntimeError, Value};

pub fn register(interp: &mut Interpreter) {
    interp.register_builtin("now", 0, false, now);
    interp.register_builtin("clock", 0, false, clock);
}

fn now(_interp: &mut Interpreter, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| RuntimeError::Io(format!("now(): {}", e)))?;
    Ok(Value::F64(elapsed.as_secs_f64()))
}

fn clock(interp: &mut Interpreter, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    Ok(Value::F64(interp.runtime().uptime().as_secs_f64()))
}
