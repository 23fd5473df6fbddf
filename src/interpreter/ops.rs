/// Operator semantics: numeric promotion, arithmetic, comparison, bitwise.
///
/// Binary arithmetic promotes to the widest operand type; mixed signedness
/// promotes to the signed type of that width; mixing integer and float
/// produces float (`f32` only when the float operand is `f32`). Integer
/// arithmetic runs in `i128` and narrows into the promoted tag with a range
/// error on overflow. Division by zero fails for both integers and floats.
use crate::ast::{BinOp, UnaryOp};
use crate::interpreter::Interpreter;
use crate::value::{Num, RuntimeError, TypeTag, Value};

impl Interpreter {
    pub(crate) fn eval_binop(
        &mut self,
        op: BinOp,
        left: Value,
        right: Value,
    ) -> Result<Value, RuntimeError> {
        match op {
            BinOp::Add => self.op_add(left, right),
            BinOp::Sub => arith(BinOp::Sub, &left, &right),
            BinOp::Mul => arith(BinOp::Mul, &left, &right),
            BinOp::Div => arith(BinOp::Div, &left, &right),
            BinOp::Mod => arith(BinOp::Mod, &left, &right),
            BinOp::Eq => Ok(Value::Bool(left.equals(&right))),
            BinOp::Neq => Ok(Value::Bool(!left.equals(&right))),
            BinOp::Lt | BinOp::Gt | BinOp::Lte | BinOp::Gte => compare(op, &left, &right),
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => {
                bitwise(op, &left, &right)
            }
            // Short-circuit operators are handled by the expression walker.
            BinOp::And | BinOp::Or => unreachable!("logical operators short-circuit in eval"),
        }
    }

    fn op_add(&mut self, left: Value, right: Value) -> Result<Value, RuntimeError> {
        if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
            let mut bytes = a.bytes();
            bytes.extend(b.bytes());
            return Ok(Value::Str(self.heap().new_string_from_bytes(bytes)));
        }
        arith(BinOp::Add, &left, &right)
    }

    pub(crate) fn eval_unop(&mut self, op: UnaryOp, v: Value) -> Result<Value, RuntimeError> {
        match op {
            UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
            UnaryOp::Neg => negate(&v),
            UnaryOp::BitNot => bit_not(&v),
        }
    }
}

// ---------------------------------------------------------------------------
// Promotion
// ---------------------------------------------------------------------------

fn int_width(tag: TypeTag) -> u32 {
    match tag {
        TypeTag::I8 | TypeTag::U8 => 8,
        TypeTag::I16 | TypeTag::U16 => 16,
        TypeTag::I32 | TypeTag::U32 => 32,
        _ => 64,
    }
}

fn is_signed(tag: TypeTag) -> bool {
    matches!(
        tag,
        TypeTag::I8 | TypeTag::I16 | TypeTag::I32 | TypeTag::I64
    )
}

fn signed_of_width(width: u32) -> TypeTag {
    match width {
        8 => TypeTag::I8,
        16 => TypeTag::I16,
        32 => TypeTag::I32,
        _ => TypeTag::I64,
    }
}

fn unsigned_of_width(width: u32) -> TypeTag {
    match width {
        8 => TypeTag::U8,
        16 => TypeTag::U16,
        32 => TypeTag::U32,
        _ => TypeTag::U64,
    }
}

/// Result tag for an integer pair: widest width wins; mixed signedness goes
/// signed at that width.
fn promote_int(a: TypeTag, b: TypeTag) -> TypeTag {
    let width = int_width(a).max(int_width(b));
    if is_signed(a) == is_signed(b) {
        if is_signed(a) {
            signed_of_width(width)
        } else {
            unsigned_of_width(width)
        }
    } else {
        signed_of_width(width)
    }
}

/// Result tag for a pair with at least one float operand.
fn promote_float(a: TypeTag, b: TypeTag) -> TypeTag {
    if a == TypeTag::F64 || b == TypeTag::F64 {
        TypeTag::F64
    } else {
        TypeTag::F32
    }
}

fn narrow_int(n: i128, tag: TypeTag, op: &str) -> Result<Value, RuntimeError> {
    let (lo, hi) = tag.integer_range().expect("integer tag");
    if n < lo || n > hi {
        return Err(RuntimeError::Range(format!(
            "integer overflow in '{}': value {} out of range for {}",
            op,
            n,
            tag.name()
        )));
    }
    Ok(Value::from_int(n, tag))
}

fn float_value(f: f64, tag: TypeTag) -> Value {
    match tag {
        TypeTag::F32 => Value::F32(f as f32),
        _ => Value::F64(f),
    }
}

fn type_error(op: &str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::Type(format!(
        "Operator '{}' does not support {} and {}",
        op,
        a.type_name(),
        b.type_name()
    ))
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Neq => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Lte => "<=",
        BinOp::Gte => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

fn arith(op: BinOp, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let symbol = op_symbol(op);
    let (na, nb) = match (a.as_num(), b.as_num()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(type_error(symbol, a, b)),
    };
    match (na, nb) {
        (Num::Int(x), Num::Int(y)) => {
            let tag = promote_int(a.tag(), b.tag());
            let result = match op {
                BinOp::Add => x.checked_add(y),
                BinOp::Sub => x.checked_sub(y),
                BinOp::Mul => x.checked_mul(y),
                BinOp::Div => {
                    if y == 0 {
                        return Err(RuntimeError::Range("Division by zero".to_string()));
                    }
                    x.checked_div(y)
                }
                BinOp::Mod => {
                    if y == 0 {
                        return Err(RuntimeError::Range("Division by zero".to_string()));
                    }
                    // i128 remainder keeps the dividend's sign.
                    x.checked_rem(y)
                }
                _ => unreachable!("arith called with non-arithmetic op"),
            };
            let result = result.ok_or_else(|| {
                RuntimeError::Range(format!("integer overflow in '{}'", symbol))
            })?;
            narrow_int(result, tag, symbol)
        }
        _ => {
            let x = num_as_f64(na);
            let y = num_as_f64(nb);
            let tag = promote_float(a.tag(), b.tag());
            let result = match op {
                BinOp::Add => x + y,
                BinOp::Sub => x - y,
                BinOp::Mul => x * y,
                BinOp::Div => {
                    if y == 0.0 {
                        return Err(RuntimeError::Range("Division by zero".to_string()));
                    }
                    x / y
                }
                BinOp::Mod => {
                    if y == 0.0 {
                        return Err(RuntimeError::Range("Division by zero".to_string()));
                    }
                    x % y
                }
                _ => unreachable!("arith called with non-arithmetic op"),
            };
            Ok(float_value(result, tag))
        }
    }
}

fn num_as_f64(n: Num) -> f64 {
    match n {
        Num::Int(x) => x as f64,
        Num::Float(x) => x,
    }
}

fn compare(op: BinOp, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let symbol = op_symbol(op);
    if let (Some(na), Some(nb)) = (a.as_num(), b.as_num()) {
        let ordering = match (na, nb) {
            (Num::Int(x), Num::Int(y)) => x.partial_cmp(&y),
            (x, y) => num_as_f64(x).partial_cmp(&num_as_f64(y)),
        };
        let Some(ordering) = ordering else {
            return Err(RuntimeError::Range(format!(
                "Operator '{}' cannot order NaN",
                symbol
            )));
        };
        return Ok(Value::Bool(ordering_matches(op, ordering)));
    }
    if let (Value::Str(x), Value::Str(y)) = (a, b) {
        let ordering = x.bytes().cmp(&y.bytes());
        return Ok(Value::Bool(ordering_matches(op, ordering)));
    }
    Err(type_error(symbol, a, b))
}

fn ordering_matches(op: BinOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinOp::Lt => ordering == Less,
        BinOp::Gt => ordering == Greater,
        BinOp::Lte => ordering != Greater,
        BinOp::Gte => ordering != Less,
        _ => unreachable!("not a comparison"),
    }
}

// ---------------------------------------------------------------------------
// Bitwise
// ---------------------------------------------------------------------------

fn bitwise(op: BinOp, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    let symbol = op_symbol(op);
    let (Some(x), Some(y)) = (a.as_int(), b.as_int()) else {
        return Err(RuntimeError::Type(format!(
            "Operator '{}' requires integer operands, got {} and {}",
            symbol,
            a.type_name(),
            b.type_name()
        )));
    };
    let tag = promote_int(a.tag(), b.tag());
    match op {
        BinOp::BitAnd => narrow_int(x & y, tag, symbol),
        BinOp::BitOr => narrow_int(x | y, tag, symbol),
        BinOp::BitXor => narrow_int(x ^ y, tag, symbol),
        BinOp::Shl | BinOp::Shr => {
            let width = int_width(a.tag());
            if y < 0 || y >= width as i128 {
                return Err(RuntimeError::Range(format!(
                    "shift amount {} out of range for {}",
                    y,
                    a.tag().name()
                )));
            }
            let result = match op {
                BinOp::Shl => x << y,
                _ => x >> y,
            };
            // Shifts keep the left operand's type.
            narrow_int(result, a.tag(), symbol)
        }
        _ => unreachable!("not a bitwise op"),
    }
}

fn negate(v: &Value) -> Result<Value, RuntimeError> {
    match v.as_num() {
        Some(Num::Int(n)) => {
            // Negating an unsigned value produces the signed type of the
            // same width.
            let tag = if is_signed(v.tag()) {
                v.tag()
            } else {
                signed_of_width(int_width(v.tag()))
            };
            narrow_int(-n, tag, "-")
        }
        Some(Num::Float(f)) => Ok(float_value(-f, v.tag())),
        None => Err(RuntimeError::Type(format!(
            "Operator '-' does not support {}",
            v.type_name()
        ))),
    }
}

fn bit_not(v: &Value) -> Result<Value, RuntimeError> {
    let Some(n) = v.as_int() else {
        return Err(RuntimeError::Type(format!(
            "Operator '~' requires an integer operand, got {}",
            v.type_name()
        )));
    };
    let tag = v.tag();
    let result = if is_signed(tag) {
        !n
    } else {
        // Two's complement within the unsigned width.
        let mask = tag.integer_range().expect("integer tag").1;
        !n & mask
    };
    narrow_int(result, tag, "~")
}

/// `++`/`--`: add `delta` preserving the operand's tag.
pub(crate) fn step(v: &Value, delta: i128) -> Result<Value, RuntimeError> {
    match v.as_num() {
        Some(Num::Int(n)) => narrow_int(n + delta, v.tag(), if delta > 0 { "++" } else { "--" }),
        Some(Num::Float(f)) => Ok(float_value(f + delta as f64, v.tag())),
        None => Err(RuntimeError::Type(format!(
            "'++'/'--' require a numeric operand, got {}",
            v.type_name()
        ))),
    }
}
