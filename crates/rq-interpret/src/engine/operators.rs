use rq_core::ops::{self, BinaryOp, UnaryOp};
use rq_core::types::PrimitiveKind;

use super::*;

impl QueryInterpreter<'_> {
    pub(super) fn evaluate_binary(&mut self, binary: &ExprBinary) -> Result<NativeValue> {
        let left = self.evaluate(&binary.left)?;
        match binary.op {
            BinaryOp::AndAlso => {
                if !self.truthy(&left, "left operand of '&&'")? {
                    return Ok(NativeValue::bool(false));
                }
                let right = self.evaluate(&binary.right)?;
                Ok(NativeValue::bool(self.truthy(&right, "right operand of '&&'")?))
            }
            BinaryOp::OrElse => {
                if self.truthy(&left, "left operand of '||'")? {
                    return Ok(NativeValue::bool(true));
                }
                let right = self.evaluate(&binary.right)?;
                Ok(NativeValue::bool(self.truthy(&right, "right operand of '||'")?))
            }
            BinaryOp::Coalesce if left.is_null() => self.evaluate(&binary.right),
            BinaryOp::Coalesce => Ok(left),
            op => {
                let right = self.evaluate(&binary.right)?;
                evaluate_binop(op, left, right)
            }
        }
    }

    pub(super) fn evaluate_unary(&mut self, unary: &ExprUnary) -> Result<NativeValue> {
        let operand = self.evaluate(&unary.operand)?;
        match (unary.op, operand) {
            (_, NativeValue::Null) => Ok(NativeValue::Null),
            (UnaryOp::Convert, operand) => convert(operand, &unary.ty),
            (op, NativeValue::Scalar(scalar)) => Ok(ops::apply_unary(op, &scalar, None)?.into()),
            (op, other) => interp_bail!(format!(
                "'{op}' is not defined for {}",
                other.descriptor()
            )),
        }
    }
}

/// Strict binary operators. Null operands lift: equality compares nullness,
/// ordering is false and arithmetic yields null.
fn evaluate_binop(op: BinaryOp, left: NativeValue, right: NativeValue) -> Result<NativeValue> {
    match (&left, &right) {
        (NativeValue::Scalar(l), NativeValue::Scalar(r)) => Ok(ops::apply_binary(op, l, r)?.into()),
        _ if matches!(op, BinaryOp::Equal | BinaryOp::NotEqual) => {
            let equal = match (&left, &right) {
                (NativeValue::Null, other) | (other, NativeValue::Null) => other.is_null(),
                _ => left.same(&right),
            };
            Ok(NativeValue::bool(equal == (op == BinaryOp::Equal)))
        }
        (NativeValue::Null, _) | (_, NativeValue::Null) if op.is_comparison() => {
            Ok(NativeValue::bool(false))
        }
        (NativeValue::Null, _) | (_, NativeValue::Null) => Ok(NativeValue::Null),
        _ => interp_bail!(format!(
            "unsupported operands for '{op}': {} and {}",
            left.descriptor(),
            right.descriptor()
        )),
    }
}

fn convert(operand: NativeValue, target: &TypeRef) -> Result<NativeValue> {
    match (target.primitive(), operand) {
        (Some(PrimitiveKind::Any), operand) => Ok(operand),
        (Some(kind), NativeValue::Scalar(scalar)) => Ok(ops::convert(&scalar, kind)?.into()),
        (None, operand) if is_instance_of(&operand, target) => Ok(operand),
        (_, operand) => interp_bail!(
            format!("cannot convert {} to {}", operand.descriptor(), target.descriptor()),
            "InvalidCast"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_equality_compares_nullness() {
        let eq = evaluate_binop(BinaryOp::Equal, NativeValue::Null, NativeValue::Null).unwrap();
        assert_eq!(eq.as_bool(), Some(true));
        let ne = evaluate_binop(BinaryOp::NotEqual, NativeValue::int(1), NativeValue::Null).unwrap();
        assert_eq!(ne.as_bool(), Some(true));
    }

    #[test]
    fn null_lifts_through_arithmetic_and_ordering() {
        let sum = evaluate_binop(BinaryOp::Add, NativeValue::Null, NativeValue::int(1)).unwrap();
        assert!(sum.is_null());
        let lt = evaluate_binop(BinaryOp::LessThan, NativeValue::int(1), NativeValue::Null).unwrap();
        assert_eq!(lt.as_bool(), Some(false));
    }

    #[test]
    fn scalar_operands_use_shared_semantics() {
        let err = evaluate_binop(BinaryOp::Modulo, NativeValue::int(4), NativeValue::int(0)).unwrap_err();
        assert_eq!(err.kind(), "DivideByZero");
    }
}
