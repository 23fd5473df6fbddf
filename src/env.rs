/// Lexically scoped environment: a singly linked chain of scopes, each an
/// ordered list of bindings. Lookups walk parent links; defines never cross
/// scopes. The chain is shared by handle so closures and task threads see
/// the same captured scopes.
use std::sync::{Arc, RwLock};

use crate::value::{RuntimeError, TypeTag, Value};

pub type EnvRef = Arc<Scope>;

struct Binding {
    name: String,
    value: Value,
    is_const: bool,
    /// Declared numeric tag from a `let` type annotation; assignments
    /// re-narrow through it.
    declared: Option<TypeTag>,
}

pub struct Scope {
    bindings: RwLock<Vec<Binding>>,
    parent: Option<EnvRef>,
}

impl Scope {
    pub fn root() -> EnvRef {
        Arc::new(Scope {
            bindings: RwLock::new(Vec::new()),
            parent: None,
        })
    }

    pub fn child(parent: &EnvRef) -> EnvRef {
        Arc::new(Scope {
            bindings: RwLock::new(Vec::new()),
            parent: Some(Arc::clone(parent)),
        })
    }

    pub fn parent(&self) -> Option<&EnvRef> {
        self.parent.as_ref()
    }

    /// Number of bindings in this scope alone.
    pub fn local_count(&self) -> usize {
        self.bindings.read().expect("scope lock poisoned").len()
    }

    /// Introduce a new binding in this scope. Duplicate names in the same
    /// scope are rejected.
    pub fn define(
        &self,
        name: &str,
        value: Value,
        is_const: bool,
        declared: Option<TypeTag>,
    ) -> Result<(), RuntimeError> {
        let mut bindings = self.bindings.write().expect("scope lock poisoned");
        if bindings.iter().any(|b| b.name == name) {
            return Err(RuntimeError::Name(format!(
                "Variable '{}' already defined in this scope",
                name
            )));
        }
        bindings.push(Binding {
            name: name.to_string(),
            value,
            is_const,
            declared,
        });
        Ok(())
    }

    /// Assign to an existing binding, walking the parent chain. Assigning to
    /// a const binding fails. If the name is nowhere in the chain, a new
    /// mutable binding is created in the innermost scope — loop and task
    /// patterns depend on this implicit define.
    pub fn assign(self: &EnvRef, name: &str, value: Value) -> Result<Value, RuntimeError> {
        let mut scope = Arc::clone(self);
        loop {
            if let Some(stored) = scope.try_assign_local(name, &value)? {
                return Ok(stored);
            }
            let parent = scope.parent.clone();
            match parent {
                Some(p) => scope = p,
                None => break,
            }
        }
        self.bindings
            .write()
            .expect("scope lock poisoned")
            .push(Binding {
                name: name.to_string(),
                value: value.clone(),
                is_const: false,
                declared: None,
            });
        Ok(value)
    }

    /// Assign within this scope only. `Ok(Some(stored))` on success,
    /// `Ok(None)` when the name is not bound here.
    fn try_assign_local(&self, name: &str, value: &Value) -> Result<Option<Value>, RuntimeError> {
        let mut bindings = self.bindings.write().expect("scope lock poisoned");
        match bindings.iter_mut().find(|b| b.name == name) {
            Some(binding) => {
                if binding.is_const {
                    return Err(RuntimeError::Name(format!(
                        "Cannot assign to const variable '{}'",
                        name
                    )));
                }
                let stored = match binding.declared {
                    Some(tag) => value.coerce_to(tag)?,
                    None => value.clone(),
                };
                binding.value = stored.clone();
                Ok(Some(stored))
            }
            None => Ok(None),
        }
    }

    pub fn lookup(self: &EnvRef, name: &str) -> Result<Value, RuntimeError> {
        let mut scope = Arc::clone(self);
        loop {
            {
                let bindings = scope.bindings.read().expect("scope lock poisoned");
                if let Some(binding) = bindings.iter().find(|b| b.name == name) {
                    return Ok(binding.value.clone());
                }
            }
            let parent = scope.parent.clone();
            match parent {
                Some(p) => scope = p,
                None => {
                    return Err(RuntimeError::Name(format!(
                        "Undefined variable '{}'",
                        name
                    )))
                }
            }
        }
    }

    /// Resolver fast path: walk `depth` parent links, index `slot`, verify
    /// the name still matches. `None` means the annotation is stale and the
    /// caller must fall back to name lookup.
    pub fn lookup_slot(self: &EnvRef, depth: u16, slot: u16, name: &str) -> Option<Value> {
        let scope = self.scope_at_depth(depth)?;
        let bindings = scope.bindings.read().expect("scope lock poisoned");
        match bindings.get(slot as usize) {
            Some(binding) if binding.name == name => Some(binding.value.clone()),
            _ => None,
        }
    }

    /// Resolver fast path for assignment; same staleness contract as
    /// `lookup_slot`.
    pub fn assign_slot(
        self: &EnvRef,
        depth: u16,
        slot: u16,
        name: &str,
        value: &Value,
    ) -> Option<Result<Value, RuntimeError>> {
        let scope = self.scope_at_depth(depth)?;
        let mut bindings = scope.bindings.write().expect("scope lock poisoned");
        match bindings.get_mut(slot as usize) {
            Some(binding) if binding.name == name => {
                if binding.is_const {
                    return Some(Err(RuntimeError::Name(format!(
                        "Cannot assign to const variable '{}'",
                        name
                    ))));
                }
                let stored = match binding.declared {
                    Some(tag) => match value.coerce_to(tag) {
                        Ok(v) => v,
                        Err(e) => return Some(Err(e)),
                    },
                    None => value.clone(),
                };
                binding.value = stored.clone();
                Some(Ok(stored))
            }
            _ => None,
        }
    }

    fn scope_at_depth(self: &EnvRef, depth: u16) -> Option<EnvRef> {
        let mut scope = Arc::clone(self);
        for _ in 0..depth {
            let parent = scope.parent.clone()?;
            scope = parent;
        }
        Some(scope)
    }
}
