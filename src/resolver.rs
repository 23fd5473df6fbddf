/// Compile-time variable resolution pass.
///
/// After parsing and before evaluation, this pass walks the program and
/// annotates `Expr::Ident` and name assignment targets with `(depth, slot)`
/// pairs: the number of scope hops to the defining scope and the binding's
/// index within it. The evaluator dereferences these directly instead of
/// scanning names.
///
/// Global bindings are left unannotated — the global scope also holds
/// registered builtins whose count this pass cannot know, so globals always
/// take the name-lookup path. Names created by implicit assignment are
/// likewise left unannotated: whether and where they exist depends on
/// execution order. The evaluator verifies the binding name at every
/// annotated site and falls back to name lookup on a mismatch, so both
/// paths agree on every program.
///
/// The scope stack maintained here mirrors the evaluator's scope pushes
/// exactly: blocks, `for` wrappers, `for-in` variables, function parameter
/// frames, `try`/`finally` bodies, switch case bodies, and catch bindings.
use std::sync::Arc;

use crate::ast::{Arg, AssignTarget, Expr, Program, Resolved, Stmt, StrPart};

/// Run the resolver over a whole program. This is the main entry point —
/// call after parsing, before handing the program to the evaluator.
pub fn resolve_program(program: &mut Program) {
    let mut ctx = Resolver::new();
    for stmt in &mut program.statements {
        ctx.resolve_stmt(stmt);
    }
}

struct Resolver {
    /// Innermost scope last. Index 0 is the global scope.
    scopes: Vec<Vec<String>>,
}

impl Resolver {
    fn new() -> Self {
        Resolver {
            scopes: vec![Vec::new()],
        }
    }

    fn enter_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            if !scope.iter().any(|n| n == name) {
                scope.push(name.to_string());
            }
        }
    }

    /// Find `name`, innermost-out. Bindings in the global scope (index 0)
    /// resolve to `None` on purpose.
    fn lookup(&self, name: &str) -> Option<Resolved> {
        for (hops, scope) in self.scopes.iter().rev().enumerate() {
            if let Some(slot) = scope.iter().position(|n| n == name) {
                let scope_index = self.scopes.len() - 1 - hops;
                if scope_index == 0 {
                    return None;
                }
                return Some(Resolved {
                    depth: hops as u16,
                    slot: slot as u16,
                });
            }
        }
        None
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Let { name, init, .. } => {
                if let Some(init) = init {
                    self.resolve_expr(init);
                }
                let name = name.clone();
                self.define(&name);
            }
            Stmt::Block(stmts) => {
                self.enter_scope();
                for s in stmts {
                    self.resolve_stmt(s);
                }
                self.exit_scope();
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                self.resolve_expr(cond);
                self.resolve_stmt(then);
                if let Some(otherwise) = otherwise {
                    self.resolve_stmt(otherwise);
                }
            }
            Stmt::While { cond, body } => {
                self.resolve_expr(cond);
                self.resolve_stmt(body);
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                self.enter_scope();
                if let Some(init) = init {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = cond {
                    self.resolve_expr(cond);
                }
                if let Some(step) = step {
                    self.resolve_expr(step);
                }
                self.resolve_stmt(body);
                self.exit_scope();
            }
            Stmt::ForIn {
                var,
                iterable,
                body,
            } => {
                self.resolve_expr(iterable);
                self.enter_scope();
                let var = var.clone();
                self.define(&var);
                self.resolve_stmt(body);
                self.exit_scope();
            }
            Stmt::Return(value) => {
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
            Stmt::Break | Stmt::Continue => {}
            Stmt::Switch {
                subject,
                cases,
                default,
            } => {
                self.resolve_expr(subject);
                for case in cases {
                    for pattern in &mut case.patterns {
                        self.resolve_expr(pattern);
                    }
                    self.enter_scope();
                    for s in &mut case.body {
                        self.resolve_stmt(s);
                    }
                    self.exit_scope();
                }
                if let Some(default) = default {
                    self.enter_scope();
                    for s in default {
                        self.resolve_stmt(s);
                    }
                    self.exit_scope();
                }
            }
            Stmt::Try {
                body,
                catch,
                finally,
            } => {
                self.enter_scope();
                for s in body {
                    self.resolve_stmt(s);
                }
                self.exit_scope();
                if let Some(catch) = catch {
                    self.enter_scope();
                    let name = catch.name.clone();
                    self.define(&name);
                    for s in &mut catch.body {
                        self.resolve_stmt(s);
                    }
                    self.exit_scope();
                }
                if let Some(finally) = finally {
                    self.enter_scope();
                    for s in finally {
                        self.resolve_stmt(s);
                    }
                    self.exit_scope();
                }
            }
            Stmt::Throw(expr) | Stmt::Defer(expr) | Stmt::Expr(expr) => {
                self.resolve_expr(expr);
            }
        }
    }

    fn resolve_target(&mut self, target: &mut AssignTarget) {
        match target {
            AssignTarget::Name { name, resolved } => {
                *resolved = self.lookup(name);
            }
            AssignTarget::Index { object, index } => {
                self.resolve_expr(object);
                self.resolve_expr(index);
            }
            AssignTarget::Property { object, .. } => {
                self.resolve_expr(object);
            }
        }
    }

    fn resolve_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Int(_)
            | Expr::Float(_)
            | Expr::Bool(_)
            | Expr::Str(_)
            | Expr::Rune(_)
            | Expr::Null => {}
            Expr::Ident { name, resolved } => {
                *resolved = self.lookup(name);
            }
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Unary { operand, .. } => self.resolve_expr(operand),
            Expr::Assign { target, value } => {
                self.resolve_expr(value);
                self.resolve_target(target);
            }
            Expr::Call { callee, args } => {
                self.resolve_expr(callee);
                for arg in args {
                    match arg {
                        Arg::Positional(e) | Arg::Spread(e) | Arg::Named(_, e) => {
                            self.resolve_expr(e)
                        }
                    }
                }
            }
            Expr::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.resolve_expr(cond);
                self.resolve_expr(then);
                self.resolve_expr(otherwise);
            }
            Expr::NullCoalesce { left, right } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::IncDec { target, .. } => self.resolve_target(target),
            Expr::ArrayLit(elements) => {
                for e in elements {
                    self.resolve_expr(e);
                }
            }
            Expr::ObjectLit { fields, .. } => {
                for (_, e) in fields {
                    self.resolve_expr(e);
                }
            }
            Expr::Function {
                params,
                rest_param,
                body,
                ..
            } => {
                self.enter_scope();
                for param in params.iter_mut() {
                    if let Some(default) = &mut param.default {
                        self.resolve_expr(default);
                    }
                    let name = param.name.clone();
                    self.define(&name);
                }
                if let Some(rest) = rest_param {
                    let rest = rest.clone();
                    self.define(&rest);
                }
                // Sole owner before evaluation; a shared body (already handed
                // to a function object) stays unannotated, which is still
                // correct via the name-lookup fallback.
                if let Some(body) = Arc::get_mut(body) {
                    self.resolve_stmt(body);
                }
                self.exit_scope();
            }
            Expr::Property { object, .. } => self.resolve_expr(object),
            Expr::Index { object, index } => {
                self.resolve_expr(object);
                self.resolve_expr(index);
            }
            Expr::Interpolation(parts) => {
                for part in parts {
                    if let StrPart::Expr(e) = part {
                        self.resolve_expr(e);
                    }
                }
            }
            Expr::Await(inner) => self.resolve_expr(inner),
        }
    }
}
