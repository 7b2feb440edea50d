//! Clear-value operation helpers
//!
//! Arithmetic, bitwise, and comparison over clear (non-share) values.
//! Integer arithmetic wraps on overflow; operands must be the same width.
//! Fixed-point floats rescale products and quotients. Secret-domain
//! operands never reach these helpers except through `compare`, which
//! rejects them: share arithmetic is delegated to the protocol layer by
//! the instruction handlers.

use crate::error::VmError;
use std::cmp::Ordering;
use veil_types::{Value, FLOAT_SCALE};

fn type_mismatch(operation: &'static str, a: &Value, b: &Value) -> VmError {
    VmError::TypeMismatch {
        operation,
        detail: format!("{} and {}", a.type_name(), b.type_name()),
    }
}

macro_rules! integer_arith {
    ($method:ident, $a:expr, $b:expr) => {
        match ($a, $b) {
            (Value::I8(x), Value::I8(y)) => Some(Value::I8(x.$method(*y))),
            (Value::I16(x), Value::I16(y)) => Some(Value::I16(x.$method(*y))),
            (Value::I32(x), Value::I32(y)) => Some(Value::I32(x.$method(*y))),
            (Value::I64(x), Value::I64(y)) => Some(Value::I64(x.$method(*y))),
            (Value::U8(x), Value::U8(y)) => Some(Value::U8(x.$method(*y))),
            (Value::U16(x), Value::U16(y)) => Some(Value::U16(x.$method(*y))),
            (Value::U32(x), Value::U32(y)) => Some(Value::U32(x.$method(*y))),
            (Value::U64(x), Value::U64(y)) => Some(Value::U64(x.$method(*y))),
            _ => None,
        }
    };
}

macro_rules! integer_divlike {
    ($op:literal, $method:ident, $a:expr, $b:expr) => {
        match ($a, $b) {
            (Value::I8(x), Value::I8(y)) => {
                if *y == 0 {
                    Err(VmError::DivisionByZero)
                } else {
                    Ok(Value::I8(x.$method(*y)))
                }
            }
            (Value::I16(x), Value::I16(y)) => {
                if *y == 0 {
                    Err(VmError::DivisionByZero)
                } else {
                    Ok(Value::I16(x.$method(*y)))
                }
            }
            (Value::I32(x), Value::I32(y)) => {
                if *y == 0 {
                    Err(VmError::DivisionByZero)
                } else {
                    Ok(Value::I32(x.$method(*y)))
                }
            }
            (Value::I64(x), Value::I64(y)) => {
                if *y == 0 {
                    Err(VmError::DivisionByZero)
                } else {
                    Ok(Value::I64(x.$method(*y)))
                }
            }
            (Value::U8(x), Value::U8(y)) => {
                if *y == 0 {
                    Err(VmError::DivisionByZero)
                } else {
                    Ok(Value::U8(x.$method(*y)))
                }
            }
            (Value::U16(x), Value::U16(y)) => {
                if *y == 0 {
                    Err(VmError::DivisionByZero)
                } else {
                    Ok(Value::U16(x.$method(*y)))
                }
            }
            (Value::U32(x), Value::U32(y)) => {
                if *y == 0 {
                    Err(VmError::DivisionByZero)
                } else {
                    Ok(Value::U32(x.$method(*y)))
                }
            }
            (Value::U64(x), Value::U64(y)) => {
                if *y == 0 {
                    Err(VmError::DivisionByZero)
                } else {
                    Ok(Value::U64(x.$method(*y)))
                }
            }
            _ => Err(type_mismatch($op, $a, $b)),
        }
    };
}

macro_rules! integer_bitwise {
    ($op:literal, $sym:tt, $a:expr, $b:expr) => {
        match ($a, $b) {
            (Value::I8(x), Value::I8(y)) => Ok(Value::I8(x $sym y)),
            (Value::I16(x), Value::I16(y)) => Ok(Value::I16(x $sym y)),
            (Value::I32(x), Value::I32(y)) => Ok(Value::I32(x $sym y)),
            (Value::I64(x), Value::I64(y)) => Ok(Value::I64(x $sym y)),
            (Value::U8(x), Value::U8(y)) => Ok(Value::U8(x $sym y)),
            (Value::U16(x), Value::U16(y)) => Ok(Value::U16(x $sym y)),
            (Value::U32(x), Value::U32(y)) => Ok(Value::U32(x $sym y)),
            (Value::U64(x), Value::U64(y)) => Ok(Value::U64(x $sym y)),
            (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(x $sym y)),
            _ => Err(type_mismatch($op, $a, $b)),
        }
    };
}

pub(crate) fn add(a: &Value, b: &Value) -> Result<Value, VmError> {
    if let Some(result) = integer_arith!(wrapping_add, a, b) {
        return Ok(result);
    }
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x.wrapping_add(*y))),
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{}{}", x, y))),
        _ => Err(type_mismatch("ADD", a, b)),
    }
}

pub(crate) fn sub(a: &Value, b: &Value) -> Result<Value, VmError> {
    if let Some(result) = integer_arith!(wrapping_sub, a, b) {
        return Ok(result);
    }
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x.wrapping_sub(*y))),
        _ => Err(type_mismatch("SUB", a, b)),
    }
}

pub(crate) fn mul(a: &Value, b: &Value) -> Result<Value, VmError> {
    if let Some(result) = integer_arith!(wrapping_mul, a, b) {
        return Ok(result);
    }
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => {
            let scaled = (*x as i128 * *y as i128) / FLOAT_SCALE as i128;
            Ok(Value::Float(scaled as i64))
        }
        _ => Err(type_mismatch("MUL", a, b)),
    }
}

pub(crate) fn div(a: &Value, b: &Value) -> Result<Value, VmError> {
    if let (Value::Float(x), Value::Float(y)) = (a, b) {
        if *y == 0 {
            return Err(VmError::DivisionByZero);
        }
        let scaled = (*x as i128 * FLOAT_SCALE as i128) / *y as i128;
        return Ok(Value::Float(scaled as i64));
    }
    integer_divlike!("DIV", wrapping_div, a, b)
}

pub(crate) fn modulo(a: &Value, b: &Value) -> Result<Value, VmError> {
    if let (Value::Float(x), Value::Float(y)) = (a, b) {
        if *y == 0 {
            return Err(VmError::DivisionByZero);
        }
        // Scale cancels under remainder
        return Ok(Value::Float(x.wrapping_rem(*y)));
    }
    integer_divlike!("MOD", wrapping_rem, a, b)
}

pub(crate) fn bit_and(a: &Value, b: &Value) -> Result<Value, VmError> {
    integer_bitwise!("AND", &, a, b)
}

pub(crate) fn bit_or(a: &Value, b: &Value) -> Result<Value, VmError> {
    integer_bitwise!("OR", |, a, b)
}

pub(crate) fn bit_xor(a: &Value, b: &Value) -> Result<Value, VmError> {
    integer_bitwise!("XOR", ^, a, b)
}

pub(crate) fn bit_not(value: &Value) -> Result<Value, VmError> {
    match value {
        Value::I8(x) => Ok(Value::I8(!x)),
        Value::I16(x) => Ok(Value::I16(!x)),
        Value::I32(x) => Ok(Value::I32(!x)),
        Value::I64(x) => Ok(Value::I64(!x)),
        Value::U8(x) => Ok(Value::U8(!x)),
        Value::U16(x) => Ok(Value::U16(!x)),
        Value::U32(x) => Ok(Value::U32(!x)),
        Value::U64(x) => Ok(Value::U64(!x)),
        Value::Bool(x) => Ok(Value::Bool(!x)),
        other => Err(VmError::TypeMismatch {
            operation: "NOT",
            detail: other.type_name().to_string(),
        }),
    }
}

pub(crate) fn shl(src: &Value, amount: &Value) -> Result<Value, VmError> {
    let bits = amount
        .as_shift_amount()
        .ok_or_else(|| type_mismatch("SHL", src, amount))?;
    match src {
        Value::I8(x) => Ok(Value::I8(x.wrapping_shl(bits))),
        Value::I16(x) => Ok(Value::I16(x.wrapping_shl(bits))),
        Value::I32(x) => Ok(Value::I32(x.wrapping_shl(bits))),
        Value::I64(x) => Ok(Value::I64(x.wrapping_shl(bits))),
        Value::U8(x) => Ok(Value::U8(x.wrapping_shl(bits))),
        Value::U16(x) => Ok(Value::U16(x.wrapping_shl(bits))),
        Value::U32(x) => Ok(Value::U32(x.wrapping_shl(bits))),
        Value::U64(x) => Ok(Value::U64(x.wrapping_shl(bits))),
        _ => Err(type_mismatch("SHL", src, amount)),
    }
}

pub(crate) fn shr(src: &Value, amount: &Value) -> Result<Value, VmError> {
    let bits = amount
        .as_shift_amount()
        .ok_or_else(|| type_mismatch("SHR", src, amount))?;
    match src {
        Value::I8(x) => Ok(Value::I8(x.wrapping_shr(bits))),
        Value::I16(x) => Ok(Value::I16(x.wrapping_shr(bits))),
        Value::I32(x) => Ok(Value::I32(x.wrapping_shr(bits))),
        Value::I64(x) => Ok(Value::I64(x.wrapping_shr(bits))),
        Value::U8(x) => Ok(Value::U8(x.wrapping_shr(bits))),
        Value::U16(x) => Ok(Value::U16(x.wrapping_shr(bits))),
        Value::U32(x) => Ok(Value::U32(x.wrapping_shr(bits))),
        Value::U64(x) => Ok(Value::U64(x.wrapping_shr(bits))),
        _ => Err(type_mismatch("SHR", src, amount)),
    }
}

/// Three-way comparison for `CMP`.
pub(crate) fn compare(a: &Value, b: &Value) -> Result<Ordering, VmError> {
    match (a, b) {
        (Value::I8(x), Value::I8(y)) => Ok(x.cmp(y)),
        (Value::I16(x), Value::I16(y)) => Ok(x.cmp(y)),
        (Value::I32(x), Value::I32(y)) => Ok(x.cmp(y)),
        (Value::I64(x), Value::I64(y)) => Ok(x.cmp(y)),
        (Value::U8(x), Value::U8(y)) => Ok(x.cmp(y)),
        (Value::U16(x), Value::U16(y)) => Ok(x.cmp(y)),
        (Value::U32(x), Value::U32(y)) => Ok(x.cmp(y)),
        (Value::U64(x), Value::U64(y)) => Ok(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => Ok(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Share(_, _), Value::Share(_, _)) => Err(VmError::TypeMismatch {
            operation: "CMP",
            detail: "shares cannot be compared in the clear; reveal them first".to_string(),
        }),
        _ => Err(type_mismatch("CMP", a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_wraps_on_overflow() {
        assert_eq!(
            add(&Value::I8(i8::MAX), &Value::I8(1)).unwrap(),
            Value::I8(i8::MIN)
        );
        assert_eq!(
            add(&Value::U64(u64::MAX), &Value::U64(1)).unwrap(),
            Value::U64(0)
        );
    }

    #[test]
    fn test_mixed_width_is_a_type_mismatch() {
        assert!(matches!(
            add(&Value::I32(1), &Value::I64(1)),
            Err(VmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(
            add(&Value::Str("veil".into()), &Value::Str("vm".into())).unwrap(),
            Value::Str("veilvm".into())
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            div(&Value::I64(10), &Value::I64(0)),
            Err(VmError::DivisionByZero)
        );
        assert_eq!(
            modulo(&Value::U8(10), &Value::U8(0)),
            Err(VmError::DivisionByZero)
        );
        assert_eq!(
            div(&Value::Float(1000), &Value::Float(0)),
            Err(VmError::DivisionByZero)
        );
    }

    #[test]
    fn test_fixed_point_rescaling() {
        // 1.5 * 2.0 = 3.0
        assert_eq!(
            mul(&Value::Float(1500), &Value::Float(2000)).unwrap(),
            Value::Float(3000)
        );
        // 3.0 / 2.0 = 1.5
        assert_eq!(
            div(&Value::Float(3000), &Value::Float(2000)).unwrap(),
            Value::Float(1500)
        );
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(
            bit_and(&Value::I64(0b1100), &Value::I64(0b1010)).unwrap(),
            Value::I64(0b1000)
        );
        assert_eq!(
            bit_xor(&Value::Bool(true), &Value::Bool(true)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(bit_not(&Value::U8(0)).unwrap(), Value::U8(0xff));
        assert_eq!(
            shl(&Value::I64(1), &Value::I64(4)).unwrap(),
            Value::I64(16)
        );
        assert_eq!(
            shr(&Value::U16(0x100), &Value::I64(4)).unwrap(),
            Value::U16(0x10)
        );
    }

    #[test]
    fn test_compare() {
        assert_eq!(
            compare(&Value::I64(1), &Value::I64(2)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare(&Value::Str("b".into()), &Value::Str("a".into())).unwrap(),
            Ordering::Greater
        );
        assert!(matches!(
            compare(&Value::Str("1".into()), &Value::I64(1)),
            Err(VmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_compare_rejects_shares() {
        use veil_types::ShareType;
        let share = Value::Share(ShareType::Int(64), vec![1, 2, 3]);
        assert!(matches!(
            compare(&share, &share),
            Err(VmError::TypeMismatch { .. })
        ));
    }
}
