use crate::ast::{Expr, Stmt, TypeAnn};
use crate::interpreter::Interpreter;
use crate::value::{RuntimeError, TypeTag, Value};

impl Interpreter {
    pub fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Value, RuntimeError> {
        match stmt {
            Stmt::Let {
                name,
                ty,
                init,
                is_const,
            } => {
                let value = match init {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Null,
                };
                let (value, declared) = self.apply_annotation(value, ty.as_ref())?;
                self.env().define(name, value, *is_const, declared)?;
                Ok(Value::Null)
            }
            Stmt::Block(stmts) => {
                self.push_scope();
                let result = self.exec_stmts_here(stmts);
                self.pop_scope();
                result
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval_expr(cond)?.truthy() {
                    self.exec_stmt(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise)
                } else {
                    Ok(Value::Null)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_expr(cond)?.truthy() {
                    match self.exec_stmt(body) {
                        Ok(_) => {}
                        Err(RuntimeError::Break) => break,
                        Err(RuntimeError::Continue) => continue,
                        Err(err) => return Err(err),
                    }
                }
                Ok(Value::Null)
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                // The initializer lives in a scope that wraps the loop.
                self.push_scope();
                let result = self.exec_for(init.as_deref(), cond.as_ref(), step.as_ref(), body);
                self.pop_scope();
                result
            }
            Stmt::ForIn {
                var,
                iterable,
                body,
            } => self.exec_for_in(var, iterable, body),
            Stmt::Return(value) => {
                let v = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Null,
                };
                Err(RuntimeError::Return(v))
            }
            Stmt::Break => Err(RuntimeError::Break),
            Stmt::Continue => Err(RuntimeError::Continue),
            Stmt::Switch {
                subject,
                cases,
                default,
            } => {
                let subject = self.eval_expr(subject)?;
                for case in cases {
                    for pattern in &case.patterns {
                        let pattern_value = self.eval_expr(pattern)?;
                        if subject.equals(&pattern_value) {
                            return self.exec_switch_body(&case.body);
                        }
                    }
                }
                match default {
                    Some(body) => self.exec_switch_body(body),
                    None => Ok(Value::Null),
                }
            }
            Stmt::Try {
                body,
                catch,
                finally,
            } => self.exec_try(body, catch.as_ref(), finally.as_deref()),
            Stmt::Throw(expr) => {
                let value = self.eval_expr(expr)?;
                Err(RuntimeError::Thrown(value))
            }
            Stmt::Defer(expr) => {
                self.register_defer(expr)?;
                Ok(Value::Null)
            }
            Stmt::Expr(expr) => self.eval_expr(expr),
        }
    }

    /// Statements in the current scope, no push. Returns the last value.
    fn exec_stmts_here(&mut self, stmts: &[Stmt]) -> Result<Value, RuntimeError> {
        let mut last = Value::Null;
        for stmt in stmts {
            last = self.exec_stmt(stmt)?;
        }
        Ok(last)
    }

    /// Statement list in its own child scope.
    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Value, RuntimeError> {
        self.push_scope();
        let result = self.exec_stmts_here(stmts);
        self.pop_scope();
        result
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
    ) -> Result<Value, RuntimeError> {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }
        loop {
            if let Some(cond) = cond {
                if !self.eval_expr(cond)?.truthy() {
                    break;
                }
            }
            match self.exec_stmt(body) {
                Ok(_) => {}
                Err(RuntimeError::Break) => break,
                Err(RuntimeError::Continue) => {}
                Err(err) => return Err(err),
            }
            if let Some(step) = step {
                self.eval_expr(step)?;
            }
        }
        Ok(Value::Null)
    }

    fn exec_for_in(
        &mut self,
        var: &str,
        iterable: &Expr,
        body: &Stmt,
    ) -> Result<Value, RuntimeError> {
        let source = self.eval_expr(iterable)?;
        let items: Vec<Value> = match &source {
            Value::Array(arr) => arr.snapshot(),
            Value::Str(s) => s
                .to_string_lossy()
                .chars()
                .map(|c| Value::Rune(c as u32))
                .collect(),
            Value::Object(o) => o
                .field_names()
                .into_iter()
                .map(|name| self.heap().str_value(&name))
                .collect(),
            other => {
                return Err(RuntimeError::Type(format!(
                    "for-in requires array, string, or object, got {}",
                    other.type_name()
                )))
            }
        };
        for item in items {
            self.push_scope();
            let iteration = match self.env().define(var, item, false, None) {
                Ok(()) => self.exec_stmt(body),
                Err(err) => Err(err),
            };
            self.pop_scope();
            match iteration {
                Ok(_) => {}
                Err(RuntimeError::Break) => break,
                Err(RuntimeError::Continue) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(Value::Null)
    }

    /// A switch case body: its own scope, and `break` exits the switch.
    fn exec_switch_body(&mut self, body: &[Stmt]) -> Result<Value, RuntimeError> {
        match self.exec_block(body) {
            Err(RuntimeError::Break) => Ok(Value::Null),
            other => other,
        }
    }

    fn exec_try(
        &mut self,
        body: &[Stmt],
        catch: Option<&crate::ast::CatchClause>,
        finally: Option<&[Stmt]>,
    ) -> Result<Value, RuntimeError> {
        let mut result = self.exec_block(body);

        if let (Err(err), Some(clause)) = (&result, catch) {
            if !err.is_control() {
                let Err(err) = std::mem::replace(&mut result, Ok(Value::Null)) else {
                    unreachable!("checked above");
                };
                let bound = self.caught_value(err);
                self.push_scope();
                let handled = match self.env().define(&clause.name, bound, false, None) {
                    Ok(()) => self.exec_stmts_here(&clause.body),
                    Err(err) => Err(err),
                };
                self.pop_scope();
                result = handled;
            }
        }

        // `finally` runs under every exit reason; if it produces its own
        // signal (throw, return, break, continue) that signal wins.
        if let Some(finally) = finally {
            if let Err(err) = self.exec_block(finally) {
                result = Err(err);
            }
        }
        result
    }

    /// The value a `catch` clause binds: the original value for a `throw`,
    /// a string of the message for every other runtime error.
    pub(crate) fn caught_value(&self, err: RuntimeError) -> Value {
        match err {
            RuntimeError::Thrown(value) => value,
            other => self.heap().str_value(&other.to_string()),
        }
    }

    /// Apply a `let` type annotation: scalar annotations narrow the value
    /// (recording numeric tags for re-narrowing on assignment), array
    /// annotations constrain the element type.
    fn apply_annotation(
        &mut self,
        value: Value,
        ty: Option<&TypeAnn>,
    ) -> Result<(Value, Option<TypeTag>), RuntimeError> {
        match ty {
            None => Ok((value, None)),
            Some(TypeAnn::Scalar(tag)) => {
                let coerced = value.coerce_to(*tag)?;
                let declared = if tag.is_numeric() { Some(*tag) } else { None };
                Ok((coerced, declared))
            }
            Some(TypeAnn::Array(elem)) => match &value {
                Value::Array(arr) => {
                    if let Some(tag) = elem {
                        arr.constrain(*tag)?;
                    }
                    Ok((value, None))
                }
                other => Err(RuntimeError::Type(format!(
                    "expected array, got {}",
                    other.type_name()
                ))),
            },
        }
    }
}
