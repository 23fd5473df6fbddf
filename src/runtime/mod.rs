/// Process-wide runtime state, threaded through every evaluator instead of
/// living in true statics: the heap (census + freed-pointer registry) and
/// the builtin registry the standard library and FFI register into.
pub mod channel;
pub mod task;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::env::EnvRef;
use crate::heap::Heap;
use crate::interpreter::Interpreter;
use crate::value::{RuntimeError, Value};

/// Builtin implementations are plain function pointers receiving the calling
/// evaluator and an argument vector.
pub type BuiltinImpl = fn(&mut Interpreter, Vec<Value>) -> Result<Value, RuntimeError>;

/// One registered builtin: `(name, arity, variadic_flag, implementation)`.
/// `arity` is the required argument count; `variadic` permits more.
pub struct BuiltinDef {
    pub name: String,
    pub arity: usize,
    pub variadic: bool,
    pub func: BuiltinImpl,
}

/// A builtin as a first-class value: the definition plus an optionally
/// captured environment for host-provided closures.
#[derive(Clone)]
pub struct BuiltinRef {
    pub def: Arc<BuiltinDef>,
    pub env: Option<EnvRef>,
}

#[derive(Clone)]
pub struct Runtime {
    pub heap: Heap,
    builtins: Arc<RwLock<HashMap<String, Arc<BuiltinDef>>>>,
    /// Monotonic baseline for `clock()`, fixed at runtime creation.
    started: Instant,
}

impl Runtime {
    pub fn new() -> Self {
        Runtime {
            heap: Heap::new(),
            builtins: Arc::new(RwLock::new(HashMap::new())),
            started: Instant::now(),
        }
    }

    /// Time elapsed since this runtime was created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Register a builtin and return it as a value. Re-registering a name
    /// replaces the previous definition.
    pub fn register_builtin(
        &self,
        name: &str,
        arity: usize,
        variadic: bool,
        func: BuiltinImpl,
    ) -> BuiltinRef {
        let def = Arc::new(BuiltinDef {
            name: name.to_string(),
            arity,
            variadic,
            func,
        });
        self.builtins
            .write()
            .expect("builtin registry lock poisoned")
            .insert(name.to_string(), Arc::clone(&def));
        BuiltinRef { def, env: None }
    }

    pub fn builtin(&self, name: &str) -> Option<Arc<BuiltinDef>> {
        self.builtins
            .read()
            .expect("builtin registry lock poisoned")
            .get(name)
            .cloned()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

pub(crate) fn debug_tasks() -> bool {
    std::env::var_os("HEMLOCK_DEBUG_TASKS").is_some()
}
