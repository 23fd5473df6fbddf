/// Function and builtin application: argument evaluation (positional, named,
/// spread), parameter binding (defaults, rest), arity checking, and the
/// defer frame that wraps every function body.
use std::sync::Arc;

use crate::ast::{Arg, TypeAnn};
use crate::env::Scope;
use crate::heap::{FunctionObj, Handle};
use crate::interpreter::Interpreter;
use crate::runtime::BuiltinRef;
use crate::value::{RuntimeError, TypeTag, Value};

/// Evaluated call-site arguments. Spread arguments are already flattened
/// into the positional list.
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn positional(values: Vec<Value>) -> Self {
        CallArgs {
            positional: values,
            named: Vec::new(),
        }
    }
}

impl Interpreter {
    /// Evaluate call-site arguments left to right.
    pub(crate) fn eval_args(&mut self, args: &[Arg]) -> Result<CallArgs, RuntimeError> {
        let mut positional = Vec::with_capacity(args.len());
        let mut named = Vec::new();
        for arg in args {
            match arg {
                Arg::Positional(expr) => positional.push(self.eval_expr(expr)?),
                Arg::Named(name, expr) => named.push((name.clone(), self.eval_expr(expr)?)),
                Arg::Spread(expr) => {
                    let value = self.eval_expr(expr)?;
                    match &value {
                        Value::Array(arr) => positional.extend(arr.snapshot()),
                        other => {
                            return Err(RuntimeError::Type(format!(
                                "spread argument must be an array, got {}",
                                other.type_name()
                            )))
                        }
                    }
                }
            }
        }
        Ok(CallArgs { positional, named })
    }

    /// Apply any callable value.
    pub fn call_value(&mut self, callee: &Value, args: CallArgs) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(func) => self.call_function(func, args),
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            other => Err(RuntimeError::Type(format!(
                "Cannot call value of type {}",
                other.type_name()
            ))),
        }
    }

    /// Positional-only convenience used by `map`/`filter`/`reduce` and the
    /// task spawner.
    pub fn call_callable(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        self.call_value(callee, CallArgs::positional(args))
    }

    /// Call a function object: bind arguments into a fresh child scope of
    /// the captured environment, run the body, turn `return` into the call
    /// result (fall-through yields null), and replay the frame's deferred
    /// calls on every exit path.
    pub(crate) fn call_function(
        &mut self,
        func: &Handle<FunctionObj>,
        args: CallArgs,
    ) -> Result<Value, RuntimeError> {
        let scope = Scope::child(&func.env);
        let saved_env = self.swap_env(scope);

        let result = match self.bind_arguments(func, args) {
            Ok(()) => {
                self.defers.push(Vec::new());
                let body_result = match self.exec_stmt(&func.body) {
                    Err(RuntimeError::Return(value)) => Ok(value),
                    Ok(_) => Ok(Value::Null),
                    Err(err) => Err(err),
                };
                self.run_deferred(body_result)
            }
            Err(err) => Err(err),
        };

        self.env = saved_env;
        result
    }

    fn bind_arguments(
        &mut self,
        func: &FunctionObj,
        args: CallArgs,
    ) -> Result<(), RuntimeError> {
        let CallArgs { positional, named } = args;
        let param_count = func.params.len();

        let mut slots: Vec<Option<Value>> = Vec::with_capacity(param_count);
        slots.resize_with(param_count, || None);
        let mut rest: Vec<Value> = Vec::new();

        let supplied = positional.len();
        for (i, value) in positional.into_iter().enumerate() {
            if i < param_count {
                slots[i] = Some(value);
            } else if func.rest_param.is_some() {
                rest.push(value);
            } else {
                return Err(RuntimeError::Arity(format!(
                    "function expects {} argument{}, got {}",
                    param_count,
                    if param_count == 1 { "" } else { "s" },
                    supplied
                )));
            }
        }

        for (name, value) in named {
            match func.params.iter().position(|p| p.name == name) {
                Some(i) => {
                    if slots[i].is_some() {
                        return Err(RuntimeError::Arity(format!(
                            "duplicate argument '{}'",
                            name
                        )));
                    }
                    slots[i] = Some(value);
                }
                None => {
                    return Err(RuntimeError::Arity(format!(
                        "unknown named argument '{}'",
                        name
                    )))
                }
            }
        }

        for (param, slot) in func.params.iter().zip(slots) {
            let value = match slot {
                Some(value) => value,
                None => match &param.default {
                    // Defaults see the parameters bound before them.
                    Some(default) => self.eval_expr(default)?,
                    None => {
                        return Err(RuntimeError::Arity(format!(
                            "missing required argument '{}'",
                            param.name
                        )))
                    }
                },
            };
            let (value, declared) = match &param.ty {
                Some(TypeAnn::Scalar(tag)) => {
                    let coerced = value.coerce_to(*tag)?;
                    let declared = if tag.is_numeric() { Some(*tag) } else { None };
                    (coerced, declared)
                }
                _ => (value, None),
            };
            self.define_param(&param.name, value, declared)?;
        }

        if let Some(rest_name) = &func.rest_param {
            let rest_array = Value::Array(self.heap().new_array(rest));
            self.define_param(rest_name, rest_array, None)?;
        }
        Ok(())
    }

    fn define_param(
        &mut self,
        name: &str,
        value: Value,
        declared: Option<TypeTag>,
    ) -> Result<(), RuntimeError> {
        let env = Arc::clone(self.env());
        env.define(name, value, false, declared)
    }

    fn call_builtin(
        &mut self,
        builtin: &BuiltinRef,
        args: CallArgs,
    ) -> Result<Value, RuntimeError> {
        let def = &builtin.def;
        if !args.named.is_empty() {
            return Err(RuntimeError::Arity(format!(
                "{}() does not accept named arguments",
                def.name
            )));
        }
        let argv = args.positional;
        if argv.len() < def.arity || (!def.variadic && argv.len() > def.arity) {
            let expect = if def.variadic {
                format!("at least {}", def.arity)
            } else {
                def.arity.to_string()
            };
            return Err(RuntimeError::Arity(format!(
                "{}() takes {} argument{}, got {}",
                def.name,
                expect,
                if def.arity == 1 { "" } else { "s" },
                argv.len()
            )));
        }
        (def.func)(self, argv)
    }
}
