/// Reference-counted heap objects and the machinery of manual memory.
///
/// A `Handle<T>` is a strong reference: the `Arc` strong count *is* the
/// object's reference count, so retain/release are clone/drop and are atomic
/// across tasks for free. On top of that sit the two pieces the language's
/// manual `free` needs:
///
/// - a **census** counting live heap objects (tests assert it returns to its
///   baseline, the refcount-balance property), and
/// - the **manually-freed-pointer registry**, a mutex-protected set recording
///   every object id and raw address destructed by an explicit `free`, so a
///   second `free` is a clean memory error instead of undefined behavior.
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::ast::{Param, Stmt, TypeAnn};
use crate::env::EnvRef;
use crate::runtime::channel::ChannelObj;
use crate::runtime::task::TaskObj;
use crate::value::{RuntimeError, TypeTag, Value};

pub type Handle<T> = Arc<T>;

// ---------------------------------------------------------------------------
// Census
// ---------------------------------------------------------------------------

/// Shared live-object counter. Every heap object holds a `CensusToken`;
/// construction increments the count, destruction decrements it.
#[derive(Clone, Default)]
pub struct Census {
    live: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl Census {
    pub fn live_objects(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn token(&self) -> CensusToken {
        self.live.fetch_add(1, Ordering::SeqCst);
        CensusToken {
            live: Arc::clone(&self.live),
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        }
    }
}

pub struct CensusToken {
    live: Arc<AtomicUsize>,
    id: u64,
}

impl Drop for CensusToken {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Heap
// ---------------------------------------------------------------------------

/// Cloneable factory for heap objects. All clones share the census and the
/// freed-pointer registry, so task threads allocate against the same
/// process-wide state without any true statics.
#[derive(Clone, Default)]
pub struct Heap {
    census: Census,
    /// Manually-freed-pointer registry: object ids of explicitly freed
    /// containers plus raw addresses of freed `Ptr` allocations.
    freed: Arc<Mutex<HashSet<u64>>>,
    /// Live raw allocations, address -> size (the dealloc layout).
    allocations: Arc<Mutex<HashMap<usize, usize>>>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    pub fn live_objects(&self) -> usize {
        self.census.live_objects()
    }

    pub fn new_string(&self, s: &str) -> Handle<StringObj> {
        self.new_string_from_bytes(s.as_bytes().to_vec())
    }

    pub fn new_string_from_bytes(&self, bytes: Vec<u8>) -> Handle<StringObj> {
        Arc::new(StringObj {
            data: RwLock::new(StringData {
                bytes,
                char_len: -1,
            }),
            _census: self.census.token(),
        })
    }

    pub fn str_value(&self, s: &str) -> Value {
        Value::Str(self.new_string(s))
    }

    pub fn new_buffer(&self, size: usize) -> Handle<BufferObj> {
        self.new_buffer_from(vec![0u8; size])
    }

    pub fn new_buffer_from(&self, bytes: Vec<u8>) -> Handle<BufferObj> {
        Arc::new(BufferObj {
            data: RwLock::new(bytes),
            freed: AtomicBool::new(false),
            census: self.census.token(),
        })
    }

    pub fn new_array(&self, elements: Vec<Value>) -> Handle<ArrayObj> {
        Arc::new(ArrayObj {
            elements: RwLock::new(elements),
            element_type: RwLock::new(None),
            freed: AtomicBool::new(false),
            census: self.census.token(),
        })
    }

    pub fn new_object(
        &self,
        type_name: Option<String>,
        fields: Vec<(String, Value)>,
    ) -> Handle<ObjectObj> {
        Arc::new(ObjectObj {
            type_name,
            fields: RwLock::new(fields),
            freed: AtomicBool::new(false),
            census: self.census.token(),
        })
    }

    pub fn new_function(
        &self,
        params: Vec<Param>,
        rest_param: Option<String>,
        return_type: Option<TypeAnn>,
        body: Arc<Stmt>,
        env: EnvRef,
        is_async: bool,
    ) -> Handle<FunctionObj> {
        Arc::new(FunctionObj {
            params,
            rest_param,
            return_type,
            body,
            env,
            is_async,
            _census: self.census.token(),
        })
    }

    pub fn new_task(&self) -> Handle<TaskObj> {
        Arc::new(TaskObj::new(self.census.token()))
    }

    pub fn new_channel(&self, capacity: usize) -> Handle<ChannelObj> {
        Arc::new(ChannelObj::new(capacity, self.census.token()))
    }

    pub fn new_file(&self, path: String, mode: String, file: File) -> Handle<FileObj> {
        Arc::new(FileObj {
            path,
            mode,
            inner: Mutex::new(Some(file)),
            _census: self.census.token(),
        })
    }

    // -----------------------------------------------------------------------
    // Manual free
    // -----------------------------------------------------------------------

    /// `free(v)` for buffers, arrays, objects and raw pointers. Containers
    /// must be the single live reference (the builtin's own argument handle
    /// accounts for one reference beyond the binding); the object's contents
    /// are destructed immediately and its id joins the freed registry.
    pub fn free_value(&self, v: &Value) -> Result<(), RuntimeError> {
        match v {
            Value::Buffer(h) => self.free_container(h, &h.freed, h.census.id, || {
                h.data.write().expect("buffer lock poisoned").clear();
            }),
            Value::Array(h) => self.free_container(h, &h.freed, h.census.id, || {
                h.elements.write().expect("array lock poisoned").clear();
            }),
            Value::Object(h) => self.free_container(h, &h.freed, h.census.id, || {
                h.fields.write().expect("object lock poisoned").clear();
            }),
            Value::Ptr(p) => self.free_raw(p),
            _ => Err(RuntimeError::Type(format!(
                "free() requires a buffer, array, object, or pointer, got {}",
                v.type_name()
            ))),
        }
    }

    fn free_container<T>(
        &self,
        handle: &Arc<T>,
        freed_flag: &AtomicBool,
        id: u64,
        destruct: impl FnOnce(),
    ) -> Result<(), RuntimeError> {
        let mut registry = self.freed.lock().expect("freed registry lock poisoned");
        if registry.contains(&id) {
            return Err(RuntimeError::Memory(
                "double free of heap object".to_string(),
            ));
        }
        let count = Arc::strong_count(handle);
        if count > 2 {
            return Err(RuntimeError::Memory(format!(
                "free() on shared handle (reference count {})",
                count - 1
            )));
        }
        freed_flag.store(true, Ordering::SeqCst);
        destruct();
        registry.insert(id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Raw allocations (Ptr)
    // -----------------------------------------------------------------------

    pub fn alloc_raw(&self, size: usize) -> Result<RawPtr, RuntimeError> {
        if size == 0 {
            return Err(RuntimeError::Range(
                "alloc() size must be positive".to_string(),
            ));
        }
        let layout = Layout::from_size_align(size, 1)
            .map_err(|_| RuntimeError::Memory("allocation size too large".to_string()))?;
        let addr = unsafe { alloc_zeroed(layout) } as usize;
        if addr == 0 {
            return Err(RuntimeError::Memory(format!(
                "failed to allocate {} bytes",
                size
            )));
        }
        self.allocations
            .lock()
            .expect("allocation table lock poisoned")
            .insert(addr, size);
        // The allocator may hand back a previously freed address; it is live
        // again, so it must leave the freed registry.
        self.freed
            .lock()
            .expect("freed registry lock poisoned")
            .remove(&(addr as u64));
        Ok(RawPtr { addr, size })
    }

    pub fn free_raw(&self, p: &RawPtr) -> Result<(), RuntimeError> {
        let mut allocations = self
            .allocations
            .lock()
            .expect("allocation table lock poisoned");
        let mut registry = self.freed.lock().expect("freed registry lock poisoned");
        if registry.contains(&(p.addr as u64)) {
            return Err(RuntimeError::Memory(format!(
                "double free of pointer 0x{:x}",
                p.addr
            )));
        }
        let size = allocations.remove(&p.addr).ok_or_else(|| {
            RuntimeError::Memory(format!("free() on unknown pointer 0x{:x}", p.addr))
        })?;
        let layout = Layout::from_size_align(size, 1).expect("layout validated at alloc");
        unsafe { dealloc(p.addr as *mut u8, layout) };
        registry.insert(p.addr as u64);
        Ok(())
    }

    /// Whether the address of a raw pointer is still live. Consulted by
    /// pointer reads/writes so use-after-free is an error, not UB.
    pub fn ptr_is_live(&self, p: &RawPtr) -> bool {
        self.allocations
            .lock()
            .expect("allocation table lock poisoned")
            .contains_key(&p.addr)
    }
}

/// Raw address plus size hint for manually-managed allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPtr {
    pub addr: usize,
    pub size: usize,
}

// ---------------------------------------------------------------------------
// StringObj
// ---------------------------------------------------------------------------

/// Mutable UTF-8 byte string. Indexing is by byte; the code-point count is
/// cached and recomputed lazily after byte-level writes invalidate it.
pub struct StringObj {
    data: RwLock<StringData>,
    _census: CensusToken,
}

struct StringData {
    bytes: Vec<u8>,
    /// Cached code-point count; -1 when stale.
    char_len: i64,
}

impl StringObj {
    pub fn byte_len(&self) -> usize {
        self.data.read().expect("string lock poisoned").bytes.len()
    }

    pub fn capacity(&self) -> usize {
        self.data
            .read()
            .expect("string lock poisoned")
            .bytes
            .capacity()
    }

    /// Code-point count, recomputing the cache if a byte write staled it.
    pub fn char_len(&self) -> usize {
        {
            let data = self.data.read().expect("string lock poisoned");
            if data.char_len >= 0 {
                return data.char_len as usize;
            }
        }
        let mut data = self.data.write().expect("string lock poisoned");
        let count = count_code_points(&data.bytes);
        data.char_len = count as i64;
        count
    }

    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.data.read().expect("string lock poisoned").bytes)
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.with_bytes(|b| b.to_vec())
    }

    pub fn to_string_lossy(&self) -> String {
        self.with_bytes(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.with_bytes(|b| b.get(index).copied())
    }

    /// Byte-level write; marks the code-point cache stale.
    pub fn set_byte(&self, index: usize, byte: u8) -> Result<(), RuntimeError> {
        let mut data = self.data.write().expect("string lock poisoned");
        let len = data.bytes.len();
        match data.bytes.get_mut(index) {
            Some(slot) => {
                *slot = byte;
                data.char_len = -1;
                Ok(())
            }
            None => Err(RuntimeError::Range(format!(
                "string index {} out of bounds (length {})",
                index, len
            ))),
        }
    }
}

fn count_code_points(bytes: &[u8]) -> usize {
    bytes.iter().filter(|b| (*b & 0xC0) != 0x80).count()
}

// ---------------------------------------------------------------------------
// BufferObj
// ---------------------------------------------------------------------------

/// Fixed-size bounds-checked byte array.
pub struct BufferObj {
    data: RwLock<Vec<u8>>,
    freed: AtomicBool,
    census: CensusToken,
}

impl BufferObj {
    fn check_live(&self) -> Result<(), RuntimeError> {
        if self.freed.load(Ordering::SeqCst) {
            Err(RuntimeError::Memory(
                "use after free of buffer".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().expect("buffer lock poisoned").len()
    }

    pub fn capacity(&self) -> usize {
        self.len()
    }

    pub fn data_addr(&self) -> usize {
        self.data.read().expect("buffer lock poisoned").as_ptr() as usize
    }

    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, RuntimeError> {
        self.check_live()?;
        Ok(f(&self.data.read().expect("buffer lock poisoned")))
    }

    pub fn get(&self, index: usize) -> Result<u8, RuntimeError> {
        self.check_live()?;
        let data = self.data.read().expect("buffer lock poisoned");
        data.get(index).copied().ok_or_else(|| {
            RuntimeError::Range(format!(
                "buffer index {} out of bounds (length {})",
                index,
                data.len()
            ))
        })
    }

    pub fn set(&self, index: usize, byte: u8) -> Result<(), RuntimeError> {
        self.check_live()?;
        let mut data = self.data.write().expect("buffer lock poisoned");
        let len = data.len();
        match data.get_mut(index) {
            Some(slot) => {
                *slot = byte;
                Ok(())
            }
            None => Err(RuntimeError::Range(format!(
                "buffer index {} out of bounds (length {})",
                index, len
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ArrayObj
// ---------------------------------------------------------------------------

/// Growable vector of values, optionally constrained to one element tag.
pub struct ArrayObj {
    elements: RwLock<Vec<Value>>,
    element_type: RwLock<Option<TypeTag>>,
    freed: AtomicBool,
    census: CensusToken,
}

impl ArrayObj {
    fn check_live(&self) -> Result<(), RuntimeError> {
        if self.freed.load(Ordering::SeqCst) {
            Err(RuntimeError::Memory("use after free of array".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn len(&self) -> usize {
        self.elements.read().expect("array lock poisoned").len()
    }

    /// Cloned view of the elements; used by printing, equality and iteration.
    pub fn snapshot(&self) -> Vec<Value> {
        self.elements.read().expect("array lock poisoned").clone()
    }

    pub fn element_type(&self) -> Option<TypeTag> {
        *self.element_type.read().expect("array lock poisoned")
    }

    /// Constrain the element tag, validating existing elements.
    pub fn constrain(&self, tag: TypeTag) -> Result<(), RuntimeError> {
        self.check_live()?;
        let elements = self.elements.read().expect("array lock poisoned");
        for elem in elements.iter() {
            if elem.tag() != tag {
                return Err(RuntimeError::Type(format!(
                    "array<{}> cannot hold {}",
                    tag.name(),
                    elem.type_name()
                )));
            }
        }
        *self.element_type.write().expect("array lock poisoned") = Some(tag);
        Ok(())
    }

    /// Typed-array insertion check.
    pub fn admits(&self, v: &Value) -> Result<(), RuntimeError> {
        match self.element_type() {
            Some(tag) if v.tag() != tag => Err(RuntimeError::Type(format!(
                "array<{}> cannot hold {}",
                tag.name(),
                v.type_name()
            ))),
            _ => Ok(()),
        }
    }

    pub fn get(&self, index: usize) -> Result<Value, RuntimeError> {
        self.check_live()?;
        let elements = self.elements.read().expect("array lock poisoned");
        elements.get(index).cloned().ok_or_else(|| {
            RuntimeError::Range(format!(
                "array index {} out of bounds (length {})",
                index,
                elements.len()
            ))
        })
    }

    pub fn set(&self, index: usize, v: Value) -> Result<(), RuntimeError> {
        self.check_live()?;
        self.admits(&v)?;
        let mut elements = self.elements.write().expect("array lock poisoned");
        let len = elements.len();
        match elements.get_mut(index) {
            Some(slot) => {
                *slot = v;
                Ok(())
            }
            None => Err(RuntimeError::Range(format!(
                "array index {} out of bounds (length {})",
                index, len
            ))),
        }
    }

    pub fn push(&self, v: Value) -> Result<(), RuntimeError> {
        self.check_live()?;
        self.admits(&v)?;
        self.elements.write().expect("array lock poisoned").push(v);
        Ok(())
    }

    pub fn pop(&self) -> Result<Option<Value>, RuntimeError> {
        self.check_live()?;
        Ok(self.elements.write().expect("array lock poisoned").pop())
    }

    pub fn insert(&self, index: usize, v: Value) -> Result<(), RuntimeError> {
        self.check_live()?;
        self.admits(&v)?;
        let mut elements = self.elements.write().expect("array lock poisoned");
        if index > elements.len() {
            return Err(RuntimeError::Range(format!(
                "insert index {} out of bounds (length {})",
                index,
                elements.len()
            )));
        }
        elements.insert(index, v);
        Ok(())
    }

    pub fn remove(&self, index: usize) -> Result<Value, RuntimeError> {
        self.check_live()?;
        let mut elements = self.elements.write().expect("array lock poisoned");
        if index >= elements.len() {
            return Err(RuntimeError::Range(format!(
                "remove index {} out of bounds (length {})",
                index,
                elements.len()
            )));
        }
        Ok(elements.remove(index))
    }

    pub fn clear(&self) -> Result<(), RuntimeError> {
        self.check_live()?;
        self.elements.write().expect("array lock poisoned").clear();
        Ok(())
    }

    pub fn reverse(&self) -> Result<(), RuntimeError> {
        self.check_live()?;
        self.elements
            .write()
            .expect("array lock poisoned")
            .reverse();
        Ok(())
    }

    /// Replace the whole element vector (used by `shift`/`unshift`).
    pub fn with_elements_mut<R>(
        &self,
        f: impl FnOnce(&mut Vec<Value>) -> R,
    ) -> Result<R, RuntimeError> {
        self.check_live()?;
        Ok(f(&mut self.elements.write().expect("array lock poisoned")))
    }
}

// ---------------------------------------------------------------------------
// ObjectObj
// ---------------------------------------------------------------------------

/// Ordered name -> value record. Field order is insertion order; duplicate
/// names overwrite in place. Lookup is linear.
pub struct ObjectObj {
    type_name: Option<String>,
    fields: RwLock<Vec<(String, Value)>>,
    freed: AtomicBool,
    census: CensusToken,
}

impl ObjectObj {
    fn check_live(&self) -> Result<(), RuntimeError> {
        if self.freed.load(Ordering::SeqCst) {
            Err(RuntimeError::Memory(
                "use after free of object".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.fields.read().expect("object lock poisoned").len()
    }

    pub fn snapshot(&self) -> Vec<(String, Value)> {
        self.fields.read().expect("object lock poisoned").clone()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .read()
            .expect("object lock poisoned")
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<Option<Value>, RuntimeError> {
        self.check_live()?;
        Ok(self
            .fields
            .read()
            .expect("object lock poisoned")
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone()))
    }

    pub fn has(&self, name: &str) -> Result<bool, RuntimeError> {
        self.check_live()?;
        Ok(self
            .fields
            .read()
            .expect("object lock poisoned")
            .iter()
            .any(|(k, _)| k == name))
    }

    pub fn set(&self, name: &str, v: Value) -> Result<(), RuntimeError> {
        self.check_live()?;
        let mut fields = self.fields.write().expect("object lock poisoned");
        match fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, slot)) => *slot = v,
            None => fields.push((name.to_string(), v)),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FunctionObj
// ---------------------------------------------------------------------------

/// AST body plus captured environment. The environment is captured by
/// handle: writes through any closure sharing the chain are visible to all
/// of them.
pub struct FunctionObj {
    pub params: Vec<Param>,
    pub rest_param: Option<String>,
    pub return_type: Option<TypeAnn>,
    pub body: Arc<Stmt>,
    pub env: EnvRef,
    pub is_async: bool,
    _census: CensusToken,
}

// ---------------------------------------------------------------------------
// FileObj
// ---------------------------------------------------------------------------

/// Open file handle. Closing is idempotent; all other operations on a closed
/// file fail.
pub struct FileObj {
    pub path: String,
    pub mode: String,
    inner: Mutex<Option<File>>,
    _census: CensusToken,
}

impl FileObj {
    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("file lock poisoned").is_none()
    }

    fn with_file<R>(
        &self,
        what: &str,
        f: impl FnOnce(&mut File) -> std::io::Result<R>,
    ) -> Result<R, RuntimeError> {
        let mut guard = self.inner.lock().expect("file lock poisoned");
        let file = guard.as_mut().ok_or_else(|| {
            RuntimeError::Io(format!("{}: file '{}' is closed", what, self.path))
        })?;
        f(file).map_err(|e| RuntimeError::Io(format!("{}: {}: {}", what, self.path, e)))
    }

    /// Read everything from the current position.
    pub fn read_to_end(&self) -> Result<Vec<u8>, RuntimeError> {
        self.with_file("read()", |file| {
            let mut out = Vec::new();
            file.read_to_end(&mut out)?;
            Ok(out)
        })
    }

    pub fn read_bytes(&self, n: usize) -> Result<Vec<u8>, RuntimeError> {
        self.with_file("read_bytes()", |file| {
            let mut out = vec![0u8; n];
            let read = file.read(&mut out)?;
            out.truncate(read);
            Ok(out)
        })
    }

    pub fn write_bytes(&self, bytes: &[u8]) -> Result<usize, RuntimeError> {
        self.with_file("write()", |file| {
            file.write_all(bytes)?;
            Ok(bytes.len())
        })
    }

    pub fn seek(&self, pos: u64) -> Result<u64, RuntimeError> {
        self.with_file("seek()", |file| file.seek(SeekFrom::Start(pos)))
    }

    pub fn close(&self) {
        // Idempotent: dropping the handle flushes and closes.
        self.inner.lock().expect("file lock poisoned").take();
    }
}
