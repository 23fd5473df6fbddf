use std::sync::Arc;

use crate::ast::{Arg, AssignTarget, BinOp, Expr, IncDecOp, StrPart};
use crate::interpreter::calls::CallArgs;
use crate::interpreter::Interpreter;
use crate::types;
use crate::value::{RuntimeError, Value};

impl Interpreter {
    pub fn eval_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Int(n) => Ok(int_literal(*n)),
            Expr::Float(f) => Ok(Value::F64(*f)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Str(s) => Ok(self.heap().str_value(s)),
            Expr::Rune(cp) => {
                if *cp > 0x10FFFF {
                    return Err(RuntimeError::Range(format!(
                        "code point {:#x} outside Unicode range",
                        cp
                    )));
                }
                Ok(Value::Rune(*cp))
            }
            Expr::Null => Ok(Value::Null),
            Expr::Ident { name, resolved } => {
                if let Some(res) = resolved {
                    if let Some(value) = self.env().lookup_slot(res.depth, res.slot, name) {
                        return Ok(value);
                    }
                }
                self.env().lookup(name)
            }
            Expr::Binary { op, left, right } => match op {
                // Logical operators short-circuit: the right operand is not
                // evaluated when the left decides the result.
                BinOp::And => {
                    let lv = self.eval_expr(left)?;
                    if !lv.truthy() {
                        return Ok(Value::Bool(false));
                    }
                    let rv = self.eval_expr(right)?;
                    Ok(Value::Bool(rv.truthy()))
                }
                BinOp::Or => {
                    let lv = self.eval_expr(left)?;
                    if lv.truthy() {
                        return Ok(Value::Bool(true));
                    }
                    let rv = self.eval_expr(right)?;
                    Ok(Value::Bool(rv.truthy()))
                }
                _ => {
                    let lv = self.eval_expr(left)?;
                    let rv = self.eval_expr(right)?;
                    self.eval_binop(*op, lv, rv)
                }
            },
            Expr::Unary { op, operand } => {
                let v = self.eval_expr(operand)?;
                self.eval_unop(*op, v)
            }
            Expr::Assign { target, value } => self.eval_assign(target, value),
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let c = self.eval_expr(cond)?;
                if c.truthy() {
                    self.eval_expr(then)
                } else {
                    self.eval_expr(otherwise)
                }
            }
            Expr::NullCoalesce { left, right } => {
                let lv = self.eval_expr(left)?;
                if matches!(lv, Value::Null) {
                    self.eval_expr(right)
                } else {
                    Ok(lv)
                }
            }
            Expr::IncDec { op, prefix, target } => self.eval_inc_dec(*op, *prefix, target),
            Expr::ArrayLit(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for elem in elements {
                    values.push(self.eval_expr(elem)?);
                }
                Ok(Value::Array(self.heap().new_array(values)))
            }
            Expr::ObjectLit { type_name, fields } => {
                let mut evaluated: Vec<(String, Value)> = Vec::with_capacity(fields.len());
                for (name, expr) in fields {
                    let value = self.eval_expr(expr)?;
                    // Duplicate names overwrite, keeping the first position.
                    match evaluated.iter_mut().find(|(k, _)| k == name) {
                        Some((_, slot)) => *slot = value,
                        None => evaluated.push((name.clone(), value)),
                    }
                }
                Ok(Value::Object(
                    self.heap().new_object(type_name.clone(), evaluated),
                ))
            }
            Expr::Function {
                params,
                rest_param,
                return_type,
                body,
                is_async,
            } => {
                let func = self.heap().new_function(
                    params.clone(),
                    rest_param.clone(),
                    return_type.clone(),
                    Arc::clone(body),
                    Arc::clone(self.env()),
                    *is_async,
                );
                Ok(Value::Function(func))
            }
            Expr::Property { object, property } => {
                let obj = self.eval_expr(object)?;
                self.eval_property(&obj, property)
            }
            Expr::Index { object, index } => {
                let obj = self.eval_expr(object)?;
                let idx = self.eval_expr(index)?;
                self.eval_index(&obj, &idx)
            }
            Expr::Interpolation(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        StrPart::Literal(s) => out.push_str(s),
                        StrPart::Expr(e) => {
                            let value = self.eval_expr(e)?;
                            out.push_str(&value.to_string());
                        }
                    }
                }
                Ok(self.heap().str_value(&out))
            }
            Expr::Await(inner) => {
                let value = self.eval_expr(inner)?;
                match value {
                    Value::Task(task) => task.join(),
                    other => Ok(other),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    fn eval_call(&mut self, callee: &Expr, args: &[Arg]) -> Result<Value, RuntimeError> {
        // Member calls dispatch through the per-type method tables before
        // anything else sees the name.
        if let Expr::Property { object, property } = callee {
            let recv = self.eval_expr(object)?;
            let call_args = self.eval_args(args)?;
            return self.call_method(&recv, property, call_args);
        }
        let callee_val = self.eval_expr(callee)?;
        let call_args = self.eval_args(args)?;
        self.call_value(&callee_val, call_args)
    }

    pub(crate) fn call_method(
        &mut self,
        recv: &Value,
        name: &str,
        args: CallArgs,
    ) -> Result<Value, RuntimeError> {
        if args.named.is_empty() {
            if let Some(result) = types::dispatch_method(self, recv, name, args.positional.clone())
            {
                return result;
            }
        }
        // Method-on-object: a callable field of the same name.
        if let Value::Object(obj) = recv {
            if let Some(field) = obj.get(name)? {
                return self.call_value(&field, args);
            }
        }
        Err(RuntimeError::Type(format!(
            "Unknown method '{}' on {}",
            name,
            recv.type_name()
        )))
    }

    // -----------------------------------------------------------------------
    // Assignment targets
    // -----------------------------------------------------------------------

    fn eval_assign(
        &mut self,
        target: &AssignTarget,
        value: &Expr,
    ) -> Result<Value, RuntimeError> {
        match target {
            AssignTarget::Name { name, resolved } => {
                let v = self.eval_expr(value)?;
                if let Some(res) = resolved {
                    if let Some(result) =
                        self.env().assign_slot(res.depth, res.slot, name, &v)
                    {
                        return result;
                    }
                }
                self.env().assign(name, v)
            }
            AssignTarget::Index { object, index } => {
                let obj = self.eval_expr(object)?;
                let idx = self.eval_expr(index)?;
                let v = self.eval_expr(value)?;
                self.assign_index(&obj, &idx, v.clone())?;
                Ok(v)
            }
            AssignTarget::Property { object, property } => {
                let obj = self.eval_expr(object)?;
                let v = self.eval_expr(value)?;
                match &obj {
                    Value::Object(o) => {
                        o.set(property, v.clone())?;
                        Ok(v)
                    }
                    other => Err(RuntimeError::Type(format!(
                        "Cannot assign field '{}' on {}",
                        property,
                        other.type_name()
                    ))),
                }
            }
        }
    }

    pub(crate) fn assign_index(
        &mut self,
        obj: &Value,
        idx: &Value,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match obj {
            Value::Array(arr) => {
                let i = idx.as_index("array index assignment")?;
                arr.set(i, value)
            }
            Value::Str(s) => {
                let i = idx.as_index("string index assignment")?;
                s.set_byte(i, byte_value(&value, "string index assignment")?)
            }
            Value::Buffer(buf) => {
                let i = idx.as_index("buffer index assignment")?;
                buf.set(i, byte_value(&value, "buffer index assignment")?)
            }
            Value::Object(o) => match idx {
                Value::Str(key) => o.set(&key.to_string_lossy(), value),
                other => Err(RuntimeError::Type(format!(
                    "object index must be a string, got {}",
                    other.type_name()
                ))),
            },
            other => Err(RuntimeError::Type(format!(
                "Index assignment requires array, string, buffer, or object, got {}",
                other.type_name()
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Property and index reads
    // -----------------------------------------------------------------------

    pub(crate) fn eval_property(
        &mut self,
        obj: &Value,
        property: &str,
    ) -> Result<Value, RuntimeError> {
        if let Value::Object(o) = obj {
            return match o.get(property)? {
                Some(value) => Ok(value),
                None => Err(RuntimeError::Name(format!(
                    "Unknown field '{}'",
                    property
                ))),
            };
        }
        if let Some(result) = types::get_property(obj, property) {
            return result;
        }
        Err(RuntimeError::Type(format!(
            "Property access '{}' is not supported on {}",
            property,
            obj.type_name()
        )))
    }

    pub(crate) fn eval_index(&mut self, obj: &Value, idx: &Value) -> Result<Value, RuntimeError> {
        match obj {
            Value::Array(arr) => {
                let i = idx.as_index("array index")?;
                arr.get(i)
            }
            Value::Str(s) => {
                let i = idx.as_index("string index")?;
                s.byte_at(i).map(Value::U8).ok_or_else(|| {
                    RuntimeError::Range(format!(
                        "string index {} out of bounds (length {})",
                        i,
                        s.byte_len()
                    ))
                })
            }
            Value::Buffer(buf) => {
                let i = idx.as_index("buffer index")?;
                buf.get(i).map(Value::U8)
            }
            Value::Object(o) => match idx {
                Value::Str(key) => Ok(o.get(&key.to_string_lossy())?.unwrap_or(Value::Null)),
                other => Err(RuntimeError::Type(format!(
                    "object index must be a string, got {}",
                    other.type_name()
                ))),
            },
            other => Err(RuntimeError::Type(format!(
                "Index access requires array, string, buffer, or object, got {}",
                other.type_name()
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Increment / decrement
    // -----------------------------------------------------------------------

    fn eval_inc_dec(
        &mut self,
        op: IncDecOp,
        prefix: bool,
        target: &AssignTarget,
    ) -> Result<Value, RuntimeError> {
        let delta: i128 = match op {
            IncDecOp::Inc => 1,
            IncDecOp::Dec => -1,
        };
        match target {
            AssignTarget::Name { name, resolved } => {
                let old = if let Some(res) = resolved {
                    self.env()
                        .lookup_slot(res.depth, res.slot, name)
                        .map(Ok)
                        .unwrap_or_else(|| self.env().lookup(name))?
                } else {
                    self.env().lookup(name)?
                };
                let new = super::ops::step(&old, delta)?;
                if let Some(res) = resolved {
                    if let Some(result) = self.env().assign_slot(res.depth, res.slot, name, &new)
                    {
                        result?;
                        return Ok(if prefix { new } else { old });
                    }
                }
                self.env().assign(name, new.clone())?;
                Ok(if prefix { new } else { old })
            }
            AssignTarget::Index { object, index } => {
                let obj = self.eval_expr(object)?;
                let idx = self.eval_expr(index)?;
                let old = self.eval_index(&obj, &idx)?;
                let new = super::ops::step(&old, delta)?;
                self.assign_index(&obj, &idx, new.clone())?;
                Ok(if prefix { new } else { old })
            }
            AssignTarget::Property { object, property } => {
                let obj = self.eval_expr(object)?;
                let old = self.eval_property(&obj, property)?;
                let new = super::ops::step(&old, delta)?;
                match &obj {
                    Value::Object(o) => o.set(property, new.clone())?,
                    other => {
                        return Err(RuntimeError::Type(format!(
                            "Cannot assign field '{}' on {}",
                            property,
                            other.type_name()
                        )))
                    }
                }
                Ok(if prefix { new } else { old })
            }
        }
    }
}

/// Integer literals default to `i32`, widening to `i64` when out of range.
fn int_literal(n: i64) -> Value {
    if n >= i32::MIN as i64 && n <= i32::MAX as i64 {
        Value::I32(n as i32)
    } else {
        Value::I64(n)
    }
}

/// An integer in `[0, 255]`, for byte-level stores.
fn byte_value(v: &Value, what: &str) -> Result<u8, RuntimeError> {
    match v.as_int() {
        Some(n) if (0..=255).contains(&n) => Ok(n as u8),
        Some(n) => Err(RuntimeError::Range(format!(
            "{}: byte value {} out of range [0, 255]",
            what, n
        ))),
        None => Err(RuntimeError::Type(format!(
            "{}: byte value must be an integer, got {}",
            what,
            v.type_name()
        ))),
    }
}
