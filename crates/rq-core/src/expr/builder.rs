use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::methods::{catalog, infer_generic_arguments, linq_type, ENUMERABLE, QUERYABLE};
use super::*;
use crate::error::{Error, Result};
use crate::ops::{BinaryOp, UnaryOp};
use crate::types::{PropertyDescriptor, TypeDescriptor, TypeRef, TypeResolver};
use crate::value::{NativeValue, Scalar};

/// Builds native expression trees, resolving every type it mentions
/// through one resolver.
#[derive(Clone)]
pub struct ExprBuilder {
    resolver: Arc<dyn TypeResolver>,
    next_parameter: Arc<AtomicUsize>,
}

impl Debug for ExprBuilder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExprBuilder")
    }
}

impl ExprBuilder {
    pub fn new(resolver: Arc<dyn TypeResolver>) -> Self {
        Self {
            resolver,
            next_parameter: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn resolver(&self) -> &Arc<dyn TypeResolver> {
        &self.resolver
    }

    pub fn resolve(&self, ty: &TypeDescriptor) -> Result<TypeRef> {
        self.resolver.resolve(ty)
    }

    pub fn constant(&self, value: impl Into<Scalar>) -> Result<Expression> {
        let value = value.into();
        self.value(&value.descriptor(), NativeValue::Scalar(value))
    }

    pub fn value(&self, ty: &TypeDescriptor, value: NativeValue) -> Result<Expression> {
        Ok(ExprConstant {
            ty: self.resolve(ty)?,
            value,
        }
        .into())
    }

    pub fn null(&self, ty: &TypeDescriptor) -> Result<Expression> {
        self.value(ty, NativeValue::Null)
    }

    /// A parameter with a fresh name, so nested lambdas never shadow each
    /// other once serialized.
    pub fn parameter(&self, ty: &TypeDescriptor) -> Result<ParameterRef> {
        let index = self.next_parameter.fetch_add(1, Ordering::Relaxed);
        Ok(ParameterRef::new(format!("x{index}"), self.resolve(ty)?))
    }

    pub fn lambda(
        &self,
        parameter_type: &TypeDescriptor,
        body: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>,
    ) -> Result<ExprLambda> {
        let parameter = self.parameter(parameter_type)?;
        let body = body(self, Expression::Parameter(parameter.clone()))?;
        Ok(ExprLambda {
            parameters: vec![parameter],
            body: Box::new(body),
        })
    }

    pub fn binary(&self, op: BinaryOp, left: Expression, right: Expression) -> Result<Expression> {
        let ty = self.resolve(&op.result_type(&left.ty(), &right.ty()))?;
        Ok(ExprBinary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        }
        .into())
    }

    pub fn not(&self, operand: Expression) -> Result<Expression> {
        let ty = self.resolve(&operand.ty())?;
        Ok(ExprUnary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
            ty,
        }
        .into())
    }

    pub fn negate(&self, operand: Expression) -> Result<Expression> {
        let ty = self.resolve(&operand.ty())?;
        Ok(ExprUnary {
            op: UnaryOp::Negate,
            operand: Box::new(operand),
            ty,
        }
        .into())
    }

    pub fn convert(&self, operand: Expression, ty: &TypeDescriptor) -> Result<Expression> {
        Ok(ExprUnary {
            op: UnaryOp::Convert,
            operand: Box::new(operand),
            ty: self.resolve(ty)?,
        }
        .into())
    }

    pub fn property(&self, target: &Expression, name: &str) -> Result<Expression> {
        let declaring_type = self.resolve(&target.ty())?;
        let member = lookup_member(&declaring_type, name).ok_or_else(|| Error::UnresolvedMember {
            declaring_type: declaring_type.descriptor().without_properties(),
            name: name.to_string(),
        })?;
        let ty = self.resolve(&member.ty)?;
        Ok(ExprMember {
            target: Some(Box::new(target.clone())),
            member: MemberRef {
                declaring_type,
                member,
                ty,
            },
        }
        .into())
    }

    /// Call a static query operator, inferring its generic arguments and
    /// quoting lambdas where the operator takes an expression.
    pub fn call(&self, declaring: &str, name: &str, arguments: Vec<Expression>) -> Result<Expression> {
        let declaring_type = linq_type(declaring);
        let actual: Vec<_> = arguments.iter().map(Expression::ty).collect();
        for method in catalog().overloads(&declaring_type, name) {
            let Some(generics) = infer_generic_arguments(method, &actual) else {
                continue;
            };
            let generics = generics
                .iter()
                .map(|ty| self.resolve(ty))
                .collect::<Result<Vec<_>>>()?;
            let method_ref = MethodRef::new(method.clone(), generics)?;
            let arguments = arguments
                .into_iter()
                .zip(&method.parameters)
                .map(|(argument, parameter)| match argument {
                    Expression::Lambda(lambda) if parameter.is_core("Expression") => {
                        Expression::Quote(ExprQuote { lambda })
                    }
                    other => other,
                })
                .collect();
            let ty = self.resolve(&method_ref.return_type())?;
            return Ok(ExprCall {
                target: None,
                method: method_ref,
                arguments,
                ty,
            }
            .into());
        }
        Err(Error::UnresolvedMember {
            declaring_type,
            name: name.to_string(),
        })
    }

    /// `Enumerable.<name>(source)`, for use inside lambdas.
    pub fn enumerable(&self, name: &str, source: Expression) -> Result<Expression> {
        self.call(ENUMERABLE, name, vec![source])
    }

    /// `Enumerable.<name>(source, x => f(x))`.
    pub fn enumerable_with(
        &self,
        name: &str,
        source: Expression,
        f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>,
    ) -> Result<Expression> {
        let element = source
            .ty()
            .element_type()
            .ok_or_else(|| Error::unsupported_with("MethodCall", format!("{name} over a non-sequence")))?;
        let lambda = self.lambda(&element, f)?;
        self.call(ENUMERABLE, name, vec![source, lambda.into()])
    }

    /// Instance method on the target's type (string methods).
    pub fn call_method(&self, target: Expression, name: &str, arguments: Vec<Expression>) -> Result<Expression> {
        let declaring_type = target.ty().without_properties();
        let method = catalog()
            .overloads(&declaring_type, name)
            .iter()
            .find(|method| {
                !method.is_static
                    && method.parameters.len() == arguments.len()
                    && method
                        .parameters
                        .iter()
                        .zip(&arguments)
                        .all(|(parameter, argument)| argument.ty().is_assignable_to(parameter))
            })
            .cloned()
            .ok_or_else(|| Error::UnresolvedMember {
                declaring_type: declaring_type.clone(),
                name: name.to_string(),
            })?;
        let method = MethodRef::new(method, Vec::new())?;
        let ty = self.resolve(&method.return_type())?;
        Ok(ExprCall {
            target: Some(Box::new(target)),
            method,
            arguments,
            ty,
        }
        .into())
    }

    /// `new { a = .., b = .. }` over an emitted anonymous type.
    pub fn anonymous<S: Into<String>>(
        &self,
        fields: impl IntoIterator<Item = (S, Expression)>,
    ) -> Result<Expression> {
        let (members, arguments): (Vec<String>, Vec<Expression>) = fields
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .unzip();
        let descriptor = TypeDescriptor::anonymous(
            members
                .iter()
                .zip(&arguments)
                .map(|(name, value)| PropertyDescriptor::new(name.clone(), value.ty())),
        );
        Ok(ExprNew {
            ty: self.resolve(&descriptor)?,
            members,
            arguments,
        }
        .into())
    }

    pub fn member_init<S: Into<String>>(
        &self,
        ty: &TypeDescriptor,
        bindings: impl IntoIterator<Item = (S, Expression)>,
    ) -> Result<Expression> {
        let ty = self.resolve(ty)?;
        let bindings = bindings
            .into_iter()
            .map(|(member, value)| {
                let member = member.into();
                if ty.member(&member).is_none() {
                    return Err(Error::UnresolvedMember {
                        declaring_type: ty.descriptor().without_properties(),
                        name: member,
                    });
                }
                Ok(ExprBinding { member, value })
            })
            .collect::<Result<_>>()?;
        Ok(ExprMemberInit { ty, bindings }.into())
    }

    pub fn conditional(&self, test: Expression, if_true: Expression, if_false: Expression) -> Result<Expression> {
        let ty = self.resolve(&if_true.ty())?;
        Ok(ExprConditional {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
            ty,
        }
        .into())
    }

    pub fn list(&self, element_type: &TypeDescriptor, items: Vec<Expression>) -> Result<Expression> {
        Ok(ExprListInit {
            element_type: self.resolve(element_type)?,
            items,
        }
        .into())
    }

    pub fn default_of(&self, ty: &TypeDescriptor) -> Result<Expression> {
        Ok(ExprDefault {
            ty: self.resolve(ty)?,
        }
        .into())
    }

    pub fn type_is(&self, operand: Expression, ty: &TypeDescriptor) -> Result<Expression> {
        Ok(ExprTypeIs {
            operand: Box::new(operand),
            ty: self.resolve(ty)?,
        }
        .into())
    }

    /// A closed-over variable. Keep the returned cell to change the value
    /// seen by later translations.
    pub fn capture(&self, name: impl Into<String>, ty: &TypeDescriptor, value: NativeValue) -> Result<CapturedCell> {
        Ok(CapturedCell::new(name, self.resolve(ty)?, value))
    }

    pub fn resource(&self, element_type: &TypeDescriptor) -> Result<Expression> {
        Ok(ExprResource {
            element_type: self.resolve(element_type)?,
        }
        .into())
    }

    pub fn block(&self, variables: Vec<ParameterRef>, expressions: Vec<Expression>) -> Expression {
        ExprBlock {
            variables,
            expressions,
        }
        .into()
    }

    pub fn assign(&self, target: Expression, value: Expression) -> Expression {
        ExprAssign {
            target: Box::new(target),
            value: Box::new(value),
        }
        .into()
    }
}

/// Fluent composition of a query over one root.
#[derive(Debug, Clone)]
pub struct Queryable {
    builder: ExprBuilder,
    expression: Expression,
}

macro_rules! lambda_operator {
    ($($fn_name:ident => $op:literal),* $(,)?) => {
        $(
            pub fn $fn_name(
                self,
                f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>,
            ) -> Result<Self> {
                self.with_lambda($op, f)
            }
        )*
    };
}

impl Queryable {
    /// All entities of `element_type` at the execution site.
    pub fn resource(builder: &ExprBuilder, element_type: &TypeDescriptor) -> Result<Self> {
        Ok(Self {
            builder: builder.clone(),
            expression: builder.resource(element_type)?,
        })
    }

    /// Client-side stand-in for a root: a null `Queryable<T>` constant,
    /// turned into a resource when the query is prepared.
    pub fn placeholder(builder: &ExprBuilder, element_type: &TypeDescriptor) -> Result<Self> {
        Ok(Self {
            builder: builder.clone(),
            expression: builder.null(&TypeDescriptor::queryable(element_type.clone()))?,
        })
    }

    pub fn element_type(&self) -> TypeDescriptor {
        self.expression
            .ty()
            .element_type()
            .unwrap_or_else(TypeDescriptor::any)
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn into_expression(self) -> Expression {
        self.expression
    }

    fn apply(self, name: &str, mut arguments: Vec<Expression>) -> Result<Self> {
        arguments.insert(0, self.expression);
        let expression = self.builder.call(QUERYABLE, name, arguments)?;
        Ok(Self {
            builder: self.builder,
            expression,
        })
    }

    fn lambda_argument(
        &self,
        f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>,
    ) -> Result<Expression> {
        Ok(self.builder.lambda(&self.element_type(), f)?.into())
    }

    fn with_lambda(
        self,
        name: &str,
        f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>,
    ) -> Result<Self> {
        let lambda = self.lambda_argument(f)?;
        self.apply(name, vec![lambda])
    }

    fn terminal(self, name: &str, arguments: Vec<Expression>) -> Result<Expression> {
        Ok(self.apply(name, arguments)?.expression)
    }

    fn terminal_with(
        self,
        name: &str,
        f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>,
    ) -> Result<Expression> {
        let lambda = self.lambda_argument(f)?;
        self.terminal(name, vec![lambda])
    }

    lambda_operator! {
        filter => "Where",
        select => "Select",
        select_many => "SelectMany",
        order_by => "OrderBy",
        order_by_descending => "OrderByDescending",
        then_by => "ThenBy",
        then_by_descending => "ThenByDescending",
        group_by => "GroupBy",
    }

    pub fn take(self, count: i64) -> Result<Self> {
        let count = self.builder.constant(count)?;
        self.apply("Take", vec![count])
    }

    pub fn skip(self, count: i64) -> Result<Self> {
        let count = self.builder.constant(count)?;
        self.apply("Skip", vec![count])
    }

    pub fn distinct(self) -> Result<Self> {
        self.apply("Distinct", Vec::new())
    }

    pub fn count(self) -> Result<Expression> {
        self.terminal("Count", Vec::new())
    }

    pub fn count_where(self, f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>) -> Result<Expression> {
        self.terminal_with("Count", f)
    }

    pub fn any(self) -> Result<Expression> {
        self.terminal("Any", Vec::new())
    }

    pub fn any_where(self, f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>) -> Result<Expression> {
        self.terminal_with("Any", f)
    }

    pub fn all(self, f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>) -> Result<Expression> {
        self.terminal_with("All", f)
    }

    pub fn first(self) -> Result<Expression> {
        self.terminal("First", Vec::new())
    }

    pub fn first_or_default(self) -> Result<Expression> {
        self.terminal("FirstOrDefault", Vec::new())
    }

    pub fn sum(self, f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>) -> Result<Expression> {
        self.terminal_with("Sum", f)
    }

    pub fn min(self, f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>) -> Result<Expression> {
        self.terminal_with("Min", f)
    }

    pub fn max(self, f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>) -> Result<Expression> {
        self.terminal_with("Max", f)
    }

    pub fn average(self, f: impl FnOnce(&ExprBuilder, Expression) -> Result<Expression>) -> Result<Expression> {
        self.terminal_with("Average", f)
    }

    pub fn contains(self, value: Expression) -> Result<Expression> {
        self.terminal("Contains", vec![value])
    }
}

impl From<Queryable> for Expression {
    fn from(value: Queryable) -> Self {
        value.expression
    }
}
