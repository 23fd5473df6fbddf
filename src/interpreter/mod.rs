/// The tree-walking evaluator. One `Interpreter` drives one thread of
/// execution; task threads get their own instance sharing the same
/// `Runtime` (heap, builtin registry) and output sink.
///
/// Split across submodules to keep each concern readable:
/// - `eval`  — expression evaluation
/// - `exec`  — statements, control flow, try/defer
/// - `ops`   — operators and numeric promotion
/// - `calls` — function and builtin application
/// - `builtins` — the core builtin table
mod builtins;
mod calls;
mod eval;
mod exec;
mod ops;

pub use calls::CallArgs;

use std::sync::{Arc, Mutex};

use crate::ast::{Expr, Program};
use crate::env::{EnvRef, Scope};
use crate::heap::Heap;
use crate::runtime::{BuiltinImpl, Runtime};
use crate::services;
use crate::value::{RuntimeError, Value};

/// A call registered by `defer`, replayed LIFO when its frame exits.
struct Deferred {
    expr: Expr,
    env: EnvRef,
}

#[derive(Clone)]
enum Output {
    Stdout,
    Capture(Arc<Mutex<String>>),
}

pub struct Interpreter {
    runtime: Runtime,
    env: EnvRef,
    globals: EnvRef,
    /// One entry per active function frame (plus one for the program).
    defers: Vec<Vec<Deferred>>,
    output: Output,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_runtime(Runtime::new())
    }

    /// Build an interpreter over an existing runtime, registering the core
    /// builtins and the bundled service modules into its global scope.
    pub fn with_runtime(runtime: Runtime) -> Self {
        let globals = Scope::root();
        let mut interp = Interpreter {
            runtime,
            env: Arc::clone(&globals),
            globals,
            defers: Vec::new(),
            output: Output::Stdout,
        };
        builtins::register(&mut interp);
        services::fs::register(&mut interp);
        services::time::register(&mut interp);
        interp
    }

    /// Evaluator for a task thread. No globals of its own: every lookup
    /// inside the spawned function walks the captured environment chain.
    pub(crate) fn for_task(runtime: Runtime, output_of: &Interpreter) -> Self {
        let globals = Scope::root();
        Interpreter {
            runtime,
            env: Arc::clone(&globals),
            globals,
            defers: Vec::new(),
            output: output_of.output.clone(),
        }
    }

    /// Register a builtin `(name, arity, variadic, implementation)` and bind
    /// it as a const global. This is the registration interface standard
    /// library modules and FFI collaborators consume.
    pub fn register_builtin(
        &mut self,
        name: &str,
        arity: usize,
        variadic: bool,
        func: BuiltinImpl,
    ) {
        let builtin = self.runtime.register_builtin(name, arity, variadic, func);
        // A duplicate registration keeps the original binding; the registry
        // entry is replaced either way.
        let _ = self
            .globals
            .define(name, Value::Builtin(builtin), true, None);
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn heap(&self) -> &Heap {
        &self.runtime.heap
    }

    pub fn globals(&self) -> &EnvRef {
        &self.globals
    }

    /// Execute a program: every statement in order, in the global scope.
    /// Returns the value of the last statement. Program-level `defer`s run
    /// when the program finishes, under any exit reason.
    pub fn run(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        self.defers.push(Vec::new());
        let mut result = Ok(Value::Null);
        for stmt in &program.statements {
            match self.exec_stmt(stmt) {
                Ok(value) => result = Ok(value),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.run_deferred(result)
    }

    // -----------------------------------------------------------------------
    // Scope and frame plumbing
    // -----------------------------------------------------------------------

    pub(crate) fn push_scope(&mut self) {
        self.env = Scope::child(&self.env);
    }

    pub(crate) fn pop_scope(&mut self) {
        let parent = self.env.parent().map(Arc::clone);
        if let Some(parent) = parent {
            self.env = parent;
        }
    }

    pub(crate) fn env(&self) -> &EnvRef {
        &self.env
    }

    pub(crate) fn swap_env(&mut self, env: EnvRef) -> EnvRef {
        std::mem::replace(&mut self.env, env)
    }

    pub(crate) fn register_defer(&mut self, expr: &Expr) -> Result<(), RuntimeError> {
        let env = Arc::clone(&self.env);
        match self.defers.last_mut() {
            Some(frame) => {
                frame.push(Deferred {
                    expr: expr.clone(),
                    env,
                });
                Ok(())
            }
            None => Err(RuntimeError::Type(
                "defer requires an active frame".to_string(),
            )),
        }
    }

    /// Pop the current frame's deferred calls and run them LIFO, each in the
    /// environment it was registered in. A deferred call that fails
    /// overrides the in-flight result, the same way `finally` does.
    pub(crate) fn run_deferred(
        &mut self,
        mut result: Result<Value, RuntimeError>,
    ) -> Result<Value, RuntimeError> {
        let frame = self.defers.pop().unwrap_or_default();
        for deferred in frame.into_iter().rev() {
            let saved = self.swap_env(deferred.env);
            let deferred_result = self.eval_expr(&deferred.expr);
            self.env = saved;
            if let Err(err) = deferred_result {
                result = Err(err);
            }
        }
        result
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    /// Route `print` into an in-memory buffer instead of stdout. Task
    /// threads spawned afterwards inherit the buffer.
    pub fn capture_output(&mut self) {
        self.output = Output::Capture(Arc::new(Mutex::new(String::new())));
    }

    pub fn captured_output(&self) -> String {
        match &self.output {
            Output::Stdout => String::new(),
            Output::Capture(buf) => buf.lock().expect("output lock poisoned").clone(),
        }
    }

    pub(crate) fn print_line(&mut self, text: &str) {
        match &self.output {
            Output::Stdout => println!("{}", text),
            Output::Capture(buf) => {
                let mut buf = buf.lock().expect("output lock poisoned");
                buf.push_str(text);
                buf.push('\n');
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}
