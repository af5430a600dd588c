//! Host-side query expression tree.
//!
//! Unlike [`crate::ast::Node`], nodes here hold resolved handles (types,
//! members, catalog methods, parameter identities) and evaluate directly.

mod builder;
pub mod methods;
mod refs;

pub use builder::*;
pub use refs::*;

use crate::ops::{BinaryOp, UnaryOp};
use crate::types::{TypeDescriptor, TypeRef};
use crate::value::NativeValue;

pub type BExpr = Box<Expression>;

#[derive(Debug, Clone, derive_more::From)]
pub enum Expression {
    Constant(ExprConstant),
    Parameter(ParameterRef),
    Lambda(ExprLambda),
    Binary(ExprBinary),
    Unary(ExprUnary),
    MemberAccess(ExprMember),
    MethodCall(ExprCall),
    New(ExprNew),
    MemberInit(ExprMemberInit),
    Conditional(ExprConditional),
    ListInit(ExprListInit),
    Quote(ExprQuote),
    Default(ExprDefault),
    TypeIs(ExprTypeIs),
    Resource(ExprResource),
    Captured(CapturedCell),
    /// Statement block. Host-only; has no wire form.
    Block(ExprBlock),
    /// Assignment. Host-only; has no wire form.
    Assign(ExprAssign),
}

#[derive(Debug, Clone)]
pub struct ExprConstant {
    pub ty: TypeRef,
    pub value: NativeValue,
}

#[derive(Debug, Clone)]
pub struct ExprLambda {
    pub parameters: Vec<ParameterRef>,
    pub body: BExpr,
}

#[derive(Debug, Clone)]
pub struct ExprBinary {
    pub op: BinaryOp,
    pub left: BExpr,
    pub right: BExpr,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct ExprUnary {
    pub op: UnaryOp,
    pub operand: BExpr,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct ExprMember {
    pub target: Option<BExpr>,
    pub member: MemberRef,
}

#[derive(Debug, Clone)]
pub struct ExprCall {
    pub target: Option<BExpr>,
    pub method: MethodRef,
    pub arguments: Vec<Expression>,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct ExprNew {
    pub ty: TypeRef,
    pub members: Vec<String>,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct ExprBinding {
    pub member: String,
    pub value: Expression,
}

#[derive(Debug, Clone)]
pub struct ExprMemberInit {
    pub ty: TypeRef,
    pub bindings: Vec<ExprBinding>,
}

#[derive(Debug, Clone)]
pub struct ExprConditional {
    pub test: BExpr,
    pub if_true: BExpr,
    pub if_false: BExpr,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct ExprListInit {
    pub element_type: TypeRef,
    pub items: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct ExprQuote {
    pub lambda: ExprLambda,
}

#[derive(Debug, Clone)]
pub struct ExprDefault {
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct ExprTypeIs {
    pub operand: BExpr,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct ExprResource {
    pub element_type: TypeRef,
}

#[derive(Debug, Clone)]
pub struct ExprBlock {
    pub variables: Vec<ParameterRef>,
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub struct ExprAssign {
    pub target: BExpr,
    pub value: BExpr,
}

impl ExprLambda {
    pub fn ty(&self) -> TypeDescriptor {
        TypeDescriptor::func(
            self.parameters
                .iter()
                .map(|parameter| parameter.ty().descriptor().clone()),
            self.body.ty(),
        )
    }
}

impl Expression {
    /// Static type of the value this expression produces.
    pub fn ty(&self) -> TypeDescriptor {
        match self {
            Expression::Constant(expr) => expr.ty.descriptor().clone(),
            Expression::Parameter(parameter) => parameter.ty().descriptor().clone(),
            Expression::Lambda(expr) => expr.ty(),
            Expression::Binary(expr) => expr.ty.descriptor().clone(),
            Expression::Unary(expr) => expr.ty.descriptor().clone(),
            Expression::MemberAccess(expr) => expr.member.ty.descriptor().clone(),
            Expression::MethodCall(expr) => expr.ty.descriptor().clone(),
            Expression::New(expr) => expr.ty.descriptor().clone(),
            Expression::MemberInit(expr) => expr.ty.descriptor().clone(),
            Expression::Conditional(expr) => expr.ty.descriptor().clone(),
            Expression::ListInit(expr) => TypeDescriptor::seq(expr.element_type.descriptor().clone()),
            Expression::Quote(expr) => TypeDescriptor::quoted(expr.lambda.ty()),
            Expression::Default(expr) => expr.ty.descriptor().clone(),
            Expression::TypeIs(_) => TypeDescriptor::bool(),
            Expression::Resource(expr) => {
                TypeDescriptor::queryable(expr.element_type.descriptor().clone())
            }
            Expression::Captured(cell) => cell.ty().descriptor().clone(),
            Expression::Block(expr) => expr
                .expressions
                .last()
                .map(Expression::ty)
                .unwrap_or_else(TypeDescriptor::any),
            Expression::Assign(expr) => expr.value.ty(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Constant(_) => "Constant",
            Expression::Parameter(_) => "Parameter",
            Expression::Lambda(_) => "Lambda",
            Expression::Binary(_) => "Binary",
            Expression::Unary(_) => "Unary",
            Expression::MemberAccess(_) => "MemberAccess",
            Expression::MethodCall(_) => "MethodCall",
            Expression::New(_) => "New",
            Expression::MemberInit(_) => "MemberInit",
            Expression::Conditional(_) => "Conditional",
            Expression::ListInit(_) => "ListInit",
            Expression::Quote(_) => "Quote",
            Expression::Default(_) => "Default",
            Expression::TypeIs(_) => "TypeIs",
            Expression::Resource(_) => "Resource",
            Expression::Captured(_) => "Captured",
            Expression::Block(_) => "Block",
            Expression::Assign(_) => "Assign",
        }
    }
}
