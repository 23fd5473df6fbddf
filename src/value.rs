/// Core Hemlock runtime value type and associated utilities.
///
/// Lives in its own module so the interpreter, the per-type method tables
/// (`types::*`) and the concurrency primitives (`runtime::*`) can all import
/// it without circular dependencies.
use std::fmt;

use thiserror::Error;

use crate::heap::{
    ArrayObj, BufferObj, FileObj, FunctionObj, Handle, ObjectObj, RawPtr, StringObj,
};
use crate::runtime::channel::ChannelObj;
use crate::runtime::task::TaskObj;
use crate::runtime::BuiltinRef;

// ---------------------------------------------------------------------------
// RuntimeError
// ---------------------------------------------------------------------------

/// Every failure the evaluator can produce. All variants up to `Thrown` are
/// catchable by `try`; the trailing three are internal control signals that
/// ride the error channel the same way and are intercepted by the statement
/// executor before they can reach user code.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Operation applied to an incompatible type.
    #[error("{0}")]
    Type(String),
    /// Numeric width overflow, out-of-bounds index, bad code point.
    #[error("{0}")]
    Range(String),
    /// Wrong number of call arguments.
    #[error("{0}")]
    Arity(String),
    /// Undefined variable, duplicate define, const violation.
    #[error("{0}")]
    Name(String),
    /// Manual-free contract violations, use-after-free, allocation failure.
    #[error("{0}")]
    Memory(String),
    /// Filesystem / file-handle failures.
    #[error("{0}")]
    Io(String),
    /// Task and channel misuse.
    #[error("{0}")]
    Concurrency(String),
    /// Malformed JSON or literal.
    #[error("{0}")]
    Parse(String),
    /// A value raised by `throw` — carries the original value.
    #[error("{0}")]
    Thrown(Value),
    /// Internal signal: `return` propagating to the enclosing call.
    #[error("'return' outside of a function")]
    Return(Value),
    /// Internal signal: `break` propagating to the enclosing loop or switch.
    #[error("'break' outside of a loop")]
    Break,
    /// Internal signal: `continue` propagating to the enclosing loop.
    #[error("'continue' outside of a loop")]
    Continue,
}

impl RuntimeError {
    /// Control signals pass through `try` untouched; everything else is
    /// catchable.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            RuntimeError::Return(_) | RuntimeError::Break | RuntimeError::Continue
        )
    }
}

// ---------------------------------------------------------------------------
// TypeTag
// ---------------------------------------------------------------------------

/// Discriminant of a `Value`, usable as a first-class value (`typeof`,
/// typed-array element constraints, declared binding types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Rune,
    Null,
    Type,
    Ptr,
    String,
    Buffer,
    Array,
    Object,
    Function,
    Task,
    Channel,
    File,
    Builtin,
}

impl TypeTag {
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::I8 => "i8",
            TypeTag::I16 => "i16",
            TypeTag::I32 => "i32",
            TypeTag::I64 => "i64",
            TypeTag::U8 => "u8",
            TypeTag::U16 => "u16",
            TypeTag::U32 => "u32",
            TypeTag::U64 => "u64",
            TypeTag::F32 => "f32",
            TypeTag::F64 => "f64",
            TypeTag::Bool => "bool",
            TypeTag::Rune => "rune",
            TypeTag::Null => "null",
            TypeTag::Type => "type",
            TypeTag::Ptr => "ptr",
            TypeTag::String => "string",
            TypeTag::Buffer => "buffer",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
            TypeTag::Function => "function",
            TypeTag::Task => "task",
            TypeTag::Channel => "channel",
            TypeTag::File => "file",
            TypeTag::Builtin => "builtin",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            TypeTag::I8
                | TypeTag::I16
                | TypeTag::I32
                | TypeTag::I64
                | TypeTag::U8
                | TypeTag::U16
                | TypeTag::U32
                | TypeTag::U64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, TypeTag::F32 | TypeTag::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Inclusive range of an integer tag, in `i128` so `u64` fits.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        match self {
            TypeTag::I8 => Some((i8::MIN as i128, i8::MAX as i128)),
            TypeTag::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
            TypeTag::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
            TypeTag::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
            TypeTag::U8 => Some((0, u8::MAX as i128)),
            TypeTag::U16 => Some((0, u16::MAX as i128)),
            TypeTag::U32 => Some((0, u32::MAX as i128)),
            TypeTag::U64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// The tagged union every runtime quantity lives in. Primitives are inline;
/// heap variants carry strong handles whose `Arc` strong count is the
/// object's reference count.
#[derive(Clone)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// Unicode code point in `[0, 0x10FFFF]`.
    Rune(u32),
    Null,
    Type(TypeTag),
    /// Raw manually-managed address plus a size hint.
    Ptr(RawPtr),
    Str(Handle<StringObj>),
    Buffer(Handle<BufferObj>),
    Array(Handle<ArrayObj>),
    Object(Handle<ObjectObj>),
    Function(Handle<FunctionObj>),
    Task(Handle<TaskObj>),
    Channel(Handle<ChannelObj>),
    File(Handle<FileObj>),
    Builtin(BuiltinRef),
}

/// A numeric value lifted out of its width for promotion arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i128),
    Float(f64),
}

impl Value {
    pub fn tag(&self) -> TypeTag {
        match self {
            Value::I8(_) => TypeTag::I8,
            Value::I16(_) => TypeTag::I16,
            Value::I32(_) => TypeTag::I32,
            Value::I64(_) => TypeTag::I64,
            Value::U8(_) => TypeTag::U8,
            Value::U16(_) => TypeTag::U16,
            Value::U32(_) => TypeTag::U32,
            Value::U64(_) => TypeTag::U64,
            Value::F32(_) => TypeTag::F32,
            Value::F64(_) => TypeTag::F64,
            Value::Bool(_) => TypeTag::Bool,
            Value::Rune(_) => TypeTag::Rune,
            Value::Null => TypeTag::Null,
            Value::Type(_) => TypeTag::Type,
            Value::Ptr(_) => TypeTag::Ptr,
            Value::Str(_) => TypeTag::String,
            Value::Buffer(_) => TypeTag::Buffer,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
            Value::Function(_) => TypeTag::Function,
            Value::Task(_) => TypeTag::Task,
            Value::Channel(_) => TypeTag::Channel,
            Value::File(_) => TypeTag::File,
            Value::Builtin(_) => TypeTag::Builtin,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.tag().name()
    }

    /// `false` for null, `false`, numeric zero, the empty string, the empty
    /// array and the empty object; `true` for everything else.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::I8(n) => *n != 0,
            Value::I16(n) => *n != 0,
            Value::I32(n) => *n != 0,
            Value::I64(n) => *n != 0,
            Value::U8(n) => *n != 0,
            Value::U16(n) => *n != 0,
            Value::U32(n) => *n != 0,
            Value::U64(n) => *n != 0,
            Value::F32(n) => *n != 0.0,
            Value::F64(n) => *n != 0.0,
            Value::Rune(cp) => *cp != 0,
            Value::Str(s) => s.byte_len() > 0,
            Value::Array(a) => a.len() > 0,
            Value::Object(o) => o.len() > 0,
            _ => true,
        }
    }

    /// Numeric payload, if this value is numeric.
    pub fn as_num(&self) -> Option<Num> {
        match self {
            Value::I8(n) => Some(Num::Int(*n as i128)),
            Value::I16(n) => Some(Num::Int(*n as i128)),
            Value::I32(n) => Some(Num::Int(*n as i128)),
            Value::I64(n) => Some(Num::Int(*n as i128)),
            Value::U8(n) => Some(Num::Int(*n as i128)),
            Value::U16(n) => Some(Num::Int(*n as i128)),
            Value::U32(n) => Some(Num::Int(*n as i128)),
            Value::U64(n) => Some(Num::Int(*n as i128)),
            Value::F32(n) => Some(Num::Float(*n as f64)),
            Value::F64(n) => Some(Num::Float(*n)),
            _ => None,
        }
    }

    /// Integer payload widened to `i128`, if this value is an integer.
    pub fn as_int(&self) -> Option<i128> {
        match self.as_num() {
            Some(Num::Int(n)) => Some(n),
            _ => None,
        }
    }

    /// Non-negative integer usable as an index.
    pub fn as_index(&self, what: &str) -> Result<usize, RuntimeError> {
        match self.as_int() {
            Some(n) if n >= 0 => Ok(n as usize),
            Some(n) => Err(RuntimeError::Range(format!(
                "{}: negative index {} not supported",
                what, n
            ))),
            None => Err(RuntimeError::Type(format!(
                "{}: index must be an integer, got {}",
                what,
                self.type_name()
            ))),
        }
    }

    /// Deep equality: byte-wise for strings and buffers, element-wise for
    /// arrays, field-wise (in order) for objects, promoted comparison for
    /// numerics, pointer identity for functions, tasks, channels and files.
    pub fn equals(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_num(), other.as_num()) {
            return match (a, b) {
                (Num::Int(x), Num::Int(y)) => x == y,
                (Num::Float(x), Num::Float(y)) => x == y,
                (Num::Int(x), Num::Float(y)) => x as f64 == y,
                (Num::Float(x), Num::Int(y)) => x == y as f64,
            };
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Rune(a), Value::Rune(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Ptr(a), Value::Ptr(b)) => a.addr == b.addr,
            (Value::Str(a), Value::Str(b)) => a.with_bytes(|x| b.with_bytes(|y| x == y)),
            (Value::Buffer(a), Value::Buffer(b)) => {
                match (a.with_bytes(|x| x.to_vec()), b.with_bytes(|y| y.to_vec())) {
                    (Ok(x), Ok(y)) => x == y,
                    _ => false,
                }
            }
            (Value::Array(a), Value::Array(b)) => {
                let xs = a.snapshot();
                let ys = b.snapshot();
                xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                let xs = a.snapshot();
                let ys = b.snapshot();
                a.type_name() == b.type_name()
                    && xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys.iter())
                        .all(|((k1, v1), (k2, v2))| k1 == k2 && v1.equals(v2))
            }
            (Value::Function(a), Value::Function(b)) => Handle::ptr_eq(a, b),
            (Value::Task(a), Value::Task(b)) => Handle::ptr_eq(a, b),
            (Value::Channel(a), Value::Channel(b)) => Handle::ptr_eq(a, b),
            (Value::File(a), Value::File(b)) => Handle::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Handle::ptr_eq(&a.def, &b.def),
            _ => false,
        }
    }

    /// Narrow this value into the declared tag, range-checking integers.
    /// Used at `let` initialization, assignment to declared bindings, and
    /// typed-array insertion of numeric literals.
    pub fn coerce_to(&self, tag: TypeTag) -> Result<Value, RuntimeError> {
        if self.tag() == tag {
            return Ok(self.clone());
        }
        if let Some((lo, hi)) = tag.integer_range() {
            let n = self.as_int().ok_or_else(|| {
                RuntimeError::Type(format!(
                    "cannot convert {} to {}",
                    self.type_name(),
                    tag.name()
                ))
            })?;
            if n < lo || n > hi {
                return Err(RuntimeError::Range(format!(
                    "value {} out of range for {}",
                    n,
                    tag.name()
                )));
            }
            return Ok(Value::from_int(n, tag));
        }
        if tag.is_float() {
            let f = match self.as_num() {
                Some(Num::Int(n)) => n as f64,
                Some(Num::Float(f)) => f,
                None => {
                    return Err(RuntimeError::Type(format!(
                        "cannot convert {} to {}",
                        self.type_name(),
                        tag.name()
                    )))
                }
            };
            return Ok(match tag {
                TypeTag::F32 => Value::F32(f as f32),
                _ => Value::F64(f),
            });
        }
        Err(RuntimeError::Type(format!(
            "expected {}, got {}",
            tag.name(),
            self.type_name()
        )))
    }

    /// Build an integer value of the given tag. The caller has already
    /// range-checked `n`.
    pub fn from_int(n: i128, tag: TypeTag) -> Value {
        match tag {
            TypeTag::I8 => Value::I8(n as i8),
            TypeTag::I16 => Value::I16(n as i16),
            TypeTag::I32 => Value::I32(n as i32),
            TypeTag::I64 => Value::I64(n as i64),
            TypeTag::U8 => Value::U8(n as u8),
            TypeTag::U16 => Value::U16(n as u16),
            TypeTag::U32 => Value::U32(n as u32),
            TypeTag::U64 => Value::U64(n as u64),
            _ => Value::I64(n as i64),
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I8(n) => write!(f, "{}", n),
            Value::I16(n) => write!(f, "{}", n),
            Value::I32(n) => write!(f, "{}", n),
            Value::I64(n) => write!(f, "{}", n),
            Value::U8(n) => write!(f, "{}", n),
            Value::U16(n) => write!(f, "{}", n),
            Value::U32(n) => write!(f, "{}", n),
            Value::U64(n) => write!(f, "{}", n),
            Value::F32(n) => write!(f, "{}", n),
            Value::F64(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Rune(cp) => match char::from_u32(*cp) {
                Some(c) => write!(f, "{}", c),
                None => write!(f, "\u{FFFD}"),
            },
            Value::Null => write!(f, "null"),
            Value::Type(_) => write!(f, "<type>"),
            Value::Ptr(p) => write!(f, "0x{:x}", p.addr),
            Value::Str(s) => f.write_str(&s.to_string_lossy()),
            Value::Buffer(b) => write!(
                f,
                "<buffer 0x{:x} length={} capacity={}>",
                b.data_addr(),
                b.len(),
                b.capacity()
            ),
            Value::Array(a) => {
                write!(f, "[")?;
                for (i, elem) in a.snapshot().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                write!(f, "]")
            }
            Value::Object(o) => match o.type_name() {
                Some(name) => write!(f, "<object:{}>", name),
                None => write!(f, "<object>"),
            },
            Value::Function(_) => write!(f, "<function>"),
            Value::Task(_) => write!(f, "<task>"),
            Value::Channel(_) => write!(f, "<channel>"),
            Value::File(file) => {
                if file.is_closed() {
                    write!(f, "<file (closed)>")
                } else {
                    write!(f, "<file '{}' mode='{}'>", file.path, file.mode)
                }
            }
            Value::Builtin(_) => write!(f, "<builtin function>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "Str({:?})", s.to_string_lossy()),
            Value::Buffer(b) => write!(f, "Buffer(len={})", b.len()),
            Value::Array(a) => f.debug_list().entries(a.snapshot()).finish(),
            Value::Object(o) => write!(f, "Object(fields={})", o.len()),
            Value::Function(_) => write!(f, "Function(<fn>)"),
            Value::Task(_) => write!(f, "Task(<task>)"),
            Value::Channel(_) => write!(f, "Channel(<chan>)"),
            Value::File(file) => write!(f, "File({:?})", file.path),
            Value::Builtin(b) => write!(f, "Builtin({:?})", b.def.name),
            other => write!(f, "{}({})", other.type_name(), other),
        }
    }
}
