//! Tree-walking evaluator for native query expressions.
//!
//! Query operators are dispatched through a static handler table keyed by
//! [`rq_core::expr::methods::MethodKey`]; lambdas are evaluated in place
//! with their parameters bound in a scope stack.

use std::collections::HashMap;

use rq_core::error::{Error, Result};
use rq_core::expr::*;
use rq_core::types::{TypeDescriptor, TypeKind, TypeRef};
use rq_core::value::{NativeValue, ObjectRef, Scalar, Sequence};

use crate::cancel::CancellationSignal;
use crate::{interp_bail, interp_ensure};

mod calls;
mod members;
mod operators;
mod sequences;

/// Sequences bound to the query's `Resource` roots, keyed by the resolved
/// element type.
pub type ResourceRoots = HashMap<TypeDescriptor, Sequence>;

pub struct QueryInterpreter<'a> {
    roots: &'a ResourceRoots,
    cancellation: Option<&'a CancellationSignal>,
    scopes: Vec<Vec<(ParameterRef, NativeValue)>>,
}

impl<'a> QueryInterpreter<'a> {
    pub fn new(roots: &'a ResourceRoots) -> Self {
        Self {
            roots,
            cancellation: None,
            scopes: Vec::new(),
        }
    }

    /// Poll `signal` while iterating sequences.
    pub fn with_cancellation(mut self, signal: &'a CancellationSignal) -> Self {
        self.cancellation = Some(signal);
        self
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match self.cancellation {
            Some(signal) => signal.check(),
            None => Ok(()),
        }
    }

    pub fn evaluate(&mut self, expr: &Expression) -> Result<NativeValue> {
        match expr {
            Expression::Constant(constant) => Ok(constant.value.clone()),
            Expression::Parameter(parameter) => self.lookup(parameter),
            Expression::Lambda(_) | Expression::Quote(_) => Err(Error::unsupported_with(
                expr.kind_name(),
                "lambdas are only evaluated as operator arguments",
            )),
            Expression::Binary(binary) => self.evaluate_binary(binary),
            Expression::Unary(unary) => self.evaluate_unary(unary),
            Expression::MemberAccess(access) => self.evaluate_member(access),
            Expression::MethodCall(call) => self.evaluate_call(call),
            Expression::New(new) => self.evaluate_new(new),
            Expression::MemberInit(init) => self.evaluate_member_init(init),
            Expression::Conditional(conditional) => {
                let test = self.evaluate(&conditional.test)?;
                if self.truthy(&test, "conditional test")? {
                    self.evaluate(&conditional.if_true)
                } else {
                    self.evaluate(&conditional.if_false)
                }
            }
            Expression::ListInit(list) => {
                let items = list
                    .items
                    .iter()
                    .map(|item| self.evaluate(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Sequence::new(list.element_type.descriptor().clone(), items).into())
            }
            Expression::Default(default) => Ok(default_value(&default.ty)),
            Expression::TypeIs(type_is) => {
                let operand = self.evaluate(&type_is.operand)?;
                Ok(NativeValue::bool(is_instance_of(&operand, &type_is.ty)))
            }
            Expression::Resource(resource) => {
                let key = resource.element_type.descriptor().without_properties();
                self.roots
                    .get(&key)
                    .cloned()
                    .map(NativeValue::Sequence)
                    .ok_or(Error::UnresolvedResource(key))
            }
            Expression::Captured(cell) => Ok(cell.get()),
            Expression::Block(_) | Expression::Assign(_) => Err(Error::unsupported_with(
                expr.kind_name(),
                "host-only construct cannot be evaluated",
            )),
        }
    }

    fn lookup(&self, parameter: &ParameterRef) -> Result<NativeValue> {
        self.scopes
            .iter()
            .rev()
            .flatten()
            .find(|(bound, _)| bound.ptr_eq(parameter))
            .map(|(_, value)| value.clone())
            .ok_or_else(|| {
                Error::unsupported_with(
                    "Parameter",
                    format!("`{}` is not bound", parameter.name()),
                )
            })
    }

    /// Evaluate a lambda body with its parameters bound to `arguments`.
    pub(crate) fn invoke(&mut self, lambda: &ExprLambda, arguments: Vec<NativeValue>) -> Result<NativeValue> {
        interp_ensure!(
            lambda.parameters.len() == arguments.len(),
            format!(
                "lambda takes {} arguments, got {}",
                lambda.parameters.len(),
                arguments.len()
            )
        );
        self.scopes.push(
            lambda
                .parameters
                .iter()
                .cloned()
                .zip(arguments)
                .collect(),
        );
        let result = self.evaluate(&lambda.body);
        self.scopes.pop();
        result
    }

    pub(crate) fn truthy(&self, value: &NativeValue, context: &str) -> Result<bool> {
        match value.as_bool() {
            Some(value) => Ok(value),
            None => interp_bail!(format!(
                "{context} must be a boolean, found {}",
                value.descriptor()
            )),
        }
    }
}

/// Value of `default(T)`: zero for primitives, null otherwise.
pub(crate) fn default_value(ty: &TypeRef) -> NativeValue {
    ty.primitive()
        .and_then(Scalar::default_of)
        .map(NativeValue::Scalar)
        .unwrap_or(NativeValue::Null)
}

pub(crate) fn is_instance_of(value: &NativeValue, ty: &TypeRef) -> bool {
    match (value, ty.kind()) {
        (NativeValue::Null, _) => false,
        (_, TypeKind::Primitive(kind)) if *kind == rq_core::types::PrimitiveKind::Any => true,
        (NativeValue::Scalar(scalar), TypeKind::Primitive(kind)) => scalar.kind() == *kind,
        (NativeValue::Object(object), _) => object_is(object, ty),
        (NativeValue::Sequence(sequence), TypeKind::Sequence(element) | TypeKind::Queryable(element)) => {
            sequence.element_type.is_assignable_to(element.descriptor())
        }
        (NativeValue::Grouping(grouping), TypeKind::Grouping { .. }) => {
            grouping.ty.descriptor().key() == ty.descriptor().key()
        }
        _ => false,
    }
}

fn object_is(object: &ObjectRef, ty: &TypeRef) -> bool {
    object.ty().descriptor().without_properties() == ty.descriptor().without_properties()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rq_core::ops::BinaryOp;
    use rq_core::types::{DefaultTypeResolver, TypeRegistry};
    use std::sync::Arc;

    fn builder() -> ExprBuilder {
        ExprBuilder::new(Arc::new(DefaultTypeResolver::new(Arc::new(TypeRegistry::new()))))
    }

    fn eval(expr: &Expression) -> Result<NativeValue> {
        let roots = ResourceRoots::new();
        QueryInterpreter::new(&roots).evaluate(expr)
    }

    #[test]
    fn conditional_picks_branch() {
        let b = builder();
        let test = b
            .binary(BinaryOp::LessThan, b.constant(1i64).unwrap(), b.constant(2i64).unwrap())
            .unwrap();
        let expr = b
            .conditional(test, b.constant("yes").unwrap(), b.constant("no").unwrap())
            .unwrap();
        assert_eq!(eval(&expr).unwrap().as_scalar(), Some(&Scalar::from("yes")));
    }

    #[test]
    fn unbound_resource_is_reported() {
        let b = builder();
        let expr = b.resource(&TypeDescriptor::int()).unwrap();
        let err = eval(&expr).unwrap_err();
        assert_eq!(err.kind(), "UnresolvedResource");
    }

    #[test]
    fn block_is_not_evaluated() {
        let b = builder();
        let expr = b.block(Vec::new(), vec![b.constant(1i64).unwrap()]);
        let err = eval(&expr).unwrap_err();
        assert!(err.to_string().contains("Block"), "{err}");
    }

    #[test]
    fn captured_cell_is_read_at_evaluation() {
        let b = builder();
        let cell = b
            .capture("limit", &TypeDescriptor::int(), NativeValue::int(1))
            .unwrap();
        let expr = Expression::Captured(cell.clone());
        cell.set(NativeValue::int(7));
        assert_eq!(eval(&expr).unwrap().as_scalar(), Some(&Scalar::Int(7)));
    }
}
