//! Operator and scalar-method semantics shared by constant folding and the
//! interpreter, so a folded constant is exactly what execution would compute.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use crate::error::{Error, Result};
use crate::types::{PrimitiveKind, TypeDescriptor};
use crate::value::{convert_scalar, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    AndAlso,
    OrElse,
    And,
    Or,
    ExclusiveOr,
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }

    /// Result type given the operand types.
    pub fn result_type(&self, left: &TypeDescriptor, right: &TypeDescriptor) -> TypeDescriptor {
        if self.is_comparison() || self.is_logical() {
            return TypeDescriptor::bool();
        }
        match self {
            BinaryOp::Coalesce => left.clone(),
            BinaryOp::Add if left.is_core("string") || right.is_core("string") => {
                TypeDescriptor::string()
            }
            _ if left.is_core("f64") || right.is_core("f64") => TypeDescriptor::float(),
            _ => left.clone(),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::ExclusiveOr => "^",
            BinaryOp::Coalesce => "??",
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Negate,
    /// Conversion to the node's target type.
    Convert,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            UnaryOp::Not => "!",
            UnaryOp::Negate => "-",
            UnaryOp::Convert => "convert",
        })
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::runtime("InvalidOperation", message)
}

fn overflow(op: BinaryOp) -> Error {
    Error::runtime("Overflow", format!("arithmetic overflow in '{op}'"))
}

pub fn apply_binary(op: BinaryOp, left: &Scalar, right: &Scalar) -> Result<Scalar> {
    match op {
        BinaryOp::Add => match (left, right) {
            (Scalar::String(l), r) => Ok(Scalar::String(format!("{l}{}", raw_text(r)))),
            (l, Scalar::String(r)) => Ok(Scalar::String(format!("{}{r}", raw_text(l)))),
            _ => arithmetic(op, left, right, i64::checked_add, |l, r| l + r),
        },
        BinaryOp::Subtract => arithmetic(op, left, right, i64::checked_sub, |l, r| l - r),
        BinaryOp::Multiply => arithmetic(op, left, right, i64::checked_mul, |l, r| l * r),
        BinaryOp::Divide => {
            if matches!(right, Scalar::Int(0)) {
                return Err(Error::runtime("DivideByZero", "attempted to divide by zero"));
            }
            arithmetic(op, left, right, i64::checked_div, |l, r| l / r)
        }
        BinaryOp::Modulo => {
            if matches!(right, Scalar::Int(0)) {
                return Err(Error::runtime("DivideByZero", "attempted to divide by zero"));
            }
            arithmetic(op, left, right, i64::checked_rem, |l, r| l % r)
        }
        BinaryOp::Equal => Ok(Scalar::Bool(scalar_eq(left, right))),
        BinaryOp::NotEqual => Ok(Scalar::Bool(!scalar_eq(left, right))),
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            let ordering = compare(left, right)?;
            Ok(Scalar::Bool(match op {
                BinaryOp::LessThan => ordering == Ordering::Less,
                BinaryOp::LessThanOrEqual => ordering != Ordering::Greater,
                BinaryOp::GreaterThan => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::AndAlso | BinaryOp::OrElse => match (left, right) {
            (Scalar::Bool(l), Scalar::Bool(r)) => Ok(Scalar::Bool(if op == BinaryOp::AndAlso {
                *l && *r
            } else {
                *l || *r
            })),
            _ => Err(invalid(format!("'{op}' requires booleans, found {left} and {right}"))),
        },
        BinaryOp::And | BinaryOp::Or | BinaryOp::ExclusiveOr => match (left, right) {
            (Scalar::Bool(l), Scalar::Bool(r)) => Ok(Scalar::Bool(match op {
                BinaryOp::And => l & r,
                BinaryOp::Or => l | r,
                _ => l ^ r,
            })),
            (Scalar::Int(l), Scalar::Int(r)) => Ok(Scalar::Int(match op {
                BinaryOp::And => l & r,
                BinaryOp::Or => l | r,
                _ => l ^ r,
            })),
            _ => Err(invalid(format!("'{op}' is not defined for {left} and {right}"))),
        },
        BinaryOp::Coalesce => Ok(left.clone()),
    }
}

fn arithmetic(
    op: BinaryOp,
    left: &Scalar,
    right: &Scalar,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Scalar> {
    match (left, right) {
        (Scalar::Int(l), Scalar::Int(r)) => int_op(*l, *r).map(Scalar::Int).ok_or_else(|| overflow(op)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => Ok(Scalar::Float(float_op(l, r))),
            _ => Err(invalid(format!(
                "unsupported operands for '{op}': {left} and {right}"
            ))),
        },
    }
}

/// Equality with int/float promotion.
pub fn scalar_eq(left: &Scalar, right: &Scalar) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

/// Ordering with int/float promotion; incomparable kinds are an error.
pub fn compare(left: &Scalar, right: &Scalar) -> Result<Ordering> {
    match (left, right) {
        (Scalar::Int(l), Scalar::Int(r)) => Ok(l.cmp(r)),
        (Scalar::String(l), Scalar::String(r)) => Ok(l.cmp(r)),
        (Scalar::Char(l), Scalar::Char(r)) => Ok(l.cmp(r)),
        (Scalar::Bool(l), Scalar::Bool(r)) => Ok(l.cmp(r)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => Ok(l.total_cmp(&r)),
            _ => Err(invalid(format!("cannot compare {left} with {right}"))),
        },
    }
}

pub fn apply_unary(op: UnaryOp, operand: &Scalar, target: Option<PrimitiveKind>) -> Result<Scalar> {
    match (op, operand) {
        (UnaryOp::Not, Scalar::Bool(value)) => Ok(Scalar::Bool(!value)),
        (UnaryOp::Not, Scalar::Int(value)) => Ok(Scalar::Int(!value)),
        (UnaryOp::Negate, Scalar::Int(value)) => value
            .checked_neg()
            .map(Scalar::Int)
            .ok_or_else(|| Error::runtime("Overflow", "arithmetic overflow in negation")),
        (UnaryOp::Negate, Scalar::Float(value)) => Ok(Scalar::Float(-value)),
        (UnaryOp::Convert, _) => match target {
            Some(kind) => convert(operand, kind),
            None => Ok(operand.clone()),
        },
        _ => Err(invalid(format!("'{op}' is not defined for {operand}"))),
    }
}

/// Explicit conversion (`Convert` nodes). More permissive than the implicit
/// conversion the mapper applies: floats truncate, everything formats to
/// string.
pub fn convert(operand: &Scalar, kind: PrimitiveKind) -> Result<Scalar> {
    match (kind, operand) {
        (PrimitiveKind::Int, Scalar::Float(value)) => Ok(Scalar::Int(value.trunc() as i64)),
        (PrimitiveKind::Char, Scalar::Int(value)) => u32::try_from(*value)
            .ok()
            .and_then(char::from_u32)
            .map(Scalar::Char)
            .ok_or_else(|| invalid(format!("{value} is not a valid char"))),
        (PrimitiveKind::String, other) => Ok(Scalar::String(raw_text(other))),
        _ => convert_scalar(operand, kind).ok_or_else(|| {
            invalid(format!("cannot convert {operand} to {}", kind.descriptor()))
        }),
    }
}

fn raw_text(scalar: &Scalar) -> String {
    match scalar {
        Scalar::String(value) => value.clone(),
        Scalar::Char(value) => value.to_string(),
        Scalar::Bool(value) => value.to_string(),
        Scalar::Int(value) => value.to_string(),
        Scalar::Float(value) => value.to_string(),
    }
}

/// Instance methods on strings that both the folder and the interpreter
/// understand.
pub const STRING_METHODS: [&str; 7] = [
    "Contains",
    "StartsWith",
    "EndsWith",
    "ToUpper",
    "ToLower",
    "Trim",
    "Length",
];

pub fn call_string_method(name: &str, target: &str, args: &[Scalar]) -> Result<Scalar> {
    let text_arg = |index: usize| -> Result<&str> {
        args.get(index)
            .and_then(Scalar::as_str)
            .ok_or_else(|| invalid(format!("String::{name} expects a string argument")))
    };
    match name {
        "Contains" => Ok(Scalar::Bool(target.contains(text_arg(0)?))),
        "StartsWith" => Ok(Scalar::Bool(target.starts_with(text_arg(0)?))),
        "EndsWith" => Ok(Scalar::Bool(target.ends_with(text_arg(0)?))),
        "ToUpper" => Ok(Scalar::String(target.to_uppercase())),
        "ToLower" => Ok(Scalar::String(target.to_lowercase())),
        "Trim" => Ok(Scalar::String(target.trim().to_string())),
        "Length" => Ok(Scalar::Int(target.chars().count() as i64)),
        other => Err(Error::unsupported_with("MethodCall", format!("String::{other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let sum = apply_binary(BinaryOp::Add, &Scalar::Int(1), &Scalar::Float(0.5)).unwrap();
        assert_eq!(sum, Scalar::Float(1.5));
    }

    #[test]
    fn integer_division_by_zero_is_reported() {
        let err = apply_binary(BinaryOp::Divide, &Scalar::Int(1), &Scalar::Int(0)).unwrap_err();
        assert_eq!(err.kind(), "DivideByZero");
    }

    #[test]
    fn comparison_across_numeric_kinds() {
        let gt = apply_binary(BinaryOp::GreaterThan, &Scalar::Float(150.0), &Scalar::Int(100));
        assert_eq!(gt.unwrap(), Scalar::Bool(true));
    }

    #[test]
    fn string_concatenation_formats_operands() {
        let joined = apply_binary(BinaryOp::Add, &Scalar::from("n="), &Scalar::Int(3)).unwrap();
        assert_eq!(joined, Scalar::from("n=3"));
    }
}
