use std::collections::{BTreeMap, HashMap};

use rq_core::ast::*;
use rq_core::error::{Error, Result};
use rq_core::expr::methods::catalog;
use rq_core::expr::*;
use rq_core::types::{MemberDescriptor, MethodDescriptor, TypeDescriptor, TypeRef, TypeResolver};
use rq_core::value::{DynamicValue, DynamicValueMapper};

/// Raises a wire AST back to a native expression tree against a type
/// resolver. Members and methods are matched structurally and cached for the
/// lifetime of the generator.
pub struct NativeGenerator<'a> {
    resolver: &'a dyn TypeResolver,
    mapper: DynamicValueMapper,
    arguments: Option<&'a BTreeMap<String, DynamicValue>>,
    scopes: Vec<Vec<ParameterRef>>,
    members: HashMap<MemberDescriptor, MemberRef>,
    methods: HashMap<MethodDescriptor, MethodRef>,
    variables: HashMap<String, CapturedCell>,
}

impl<'a> NativeGenerator<'a> {
    pub fn new(resolver: &'a dyn TypeResolver) -> Self {
        Self {
            resolver,
            mapper: DynamicValueMapper::new(),
            arguments: None,
            scopes: Vec::new(),
            members: HashMap::new(),
            methods: HashMap::new(),
            variables: HashMap::new(),
        }
    }

    pub fn with_mapper(mut self, mapper: DynamicValueMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Bind `Variable` nodes from `arguments`.
    pub fn with_arguments(mut self, arguments: &'a BTreeMap<String, DynamicValue>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    fn resolve(&self, ty: &TypeDescriptor) -> Result<TypeRef> {
        self.resolver.resolve(ty)
    }

    pub fn transform_node(&mut self, node: &Node) -> Result<Expression> {
        Ok(match node {
            Node::Constant(constant) => {
                let ty = self.resolve(&constant.ty)?;
                let value = self
                    .mapper
                    .to_object(&constant.value, &constant.ty, self.resolver)?;
                ExprConstant { ty, value }.into()
            }
            Node::Parameter(parameter) => Expression::Parameter(self.lookup_parameter(parameter)?),
            Node::Lambda(lambda) => Expression::Lambda(self.transform_lambda(lambda)?),
            Node::Quote(quote) => Expression::Quote(ExprQuote {
                lambda: self.transform_lambda(&quote.lambda)?,
            }),
            Node::Binary(binary) => ExprBinary {
                op: binary.op,
                left: self.transform_boxed(&binary.left)?,
                right: self.transform_boxed(&binary.right)?,
                ty: self.resolve(&binary.ty)?,
            }
            .into(),
            Node::Unary(unary) => ExprUnary {
                op: unary.op,
                operand: self.transform_boxed(&unary.operand)?,
                ty: self.resolve(&unary.ty)?,
            }
            .into(),
            Node::Member(access) => {
                let Some(target) = &access.target else {
                    return Err(Error::unsupported_with(
                        "Member",
                        format!("static member {}", access.member),
                    ));
                };
                ExprMember {
                    target: Some(self.transform_boxed(target)?),
                    member: self.member(&access.member)?,
                }
                .into()
            }
            Node::Call(call) => {
                let method = self.method(&call.method)?;
                let target = call
                    .target
                    .as_ref()
                    .map(|target| self.transform_boxed(target))
                    .transpose()?;
                if method.info().is_static == target.is_some() {
                    return Err(Error::unsupported_with(
                        "Call",
                        format!("receiver mismatch calling {}", call.method),
                    ));
                }
                ExprCall {
                    target,
                    method,
                    arguments: self.transform_all(&call.arguments)?,
                    ty: self.resolve(&call.ty)?,
                }
                .into()
            }
            Node::New(new) => {
                let ty = self.resolve(&new.ty)?;
                for member in &new.members {
                    self.ensure_member(&ty, member)?;
                }
                ExprNew {
                    ty,
                    members: new.members.clone(),
                    arguments: self.transform_all(&new.arguments)?,
                }
                .into()
            }
            Node::MemberInit(init) => {
                let ty = self.resolve(&init.ty)?;
                let mut bindings = Vec::with_capacity(init.bindings.len());
                for binding in &init.bindings {
                    self.ensure_member(&ty, &binding.member)?;
                    bindings.push(ExprBinding {
                        member: binding.member.clone(),
                        value: self.transform_node(&binding.value)?,
                    });
                }
                ExprMemberInit { ty, bindings }.into()
            }
            Node::Conditional(conditional) => ExprConditional {
                test: self.transform_boxed(&conditional.test)?,
                if_true: self.transform_boxed(&conditional.if_true)?,
                if_false: self.transform_boxed(&conditional.if_false)?,
                ty: self.resolve(&conditional.ty)?,
            }
            .into(),
            Node::ListInit(list) => ExprListInit {
                element_type: self.resolve(&list.element_type)?,
                items: self.transform_all(&list.items)?,
            }
            .into(),
            Node::Default(default) => ExprDefault {
                ty: self.resolve(&default.ty)?,
            }
            .into(),
            Node::TypeIs(type_is) => ExprTypeIs {
                operand: self.transform_boxed(&type_is.operand)?,
                ty: self.resolve(&type_is.ty)?,
            }
            .into(),
            Node::Resource(resource) => ExprResource {
                element_type: self.resolve(&resource.element_type)?,
            }
            .into(),
            Node::Capture(capture) => {
                let ty = self.resolve(&capture.ty)?;
                let value = self
                    .mapper
                    .to_object(&capture.value, &capture.ty, self.resolver)?;
                Expression::Captured(CapturedCell::new(capture.name.clone(), ty, value))
            }
            Node::Variable(variable) => Expression::Captured(self.variable(variable)?),
        })
    }

    fn transform_boxed(&mut self, node: &Node) -> Result<BExpr> {
        Ok(Box::new(self.transform_node(node)?))
    }

    fn transform_all(&mut self, nodes: &[Node]) -> Result<Vec<Expression>> {
        nodes.iter().map(|node| self.transform_node(node)).collect()
    }

    fn transform_lambda(&mut self, lambda: &NodeLambda) -> Result<ExprLambda> {
        let parameters = lambda
            .parameters
            .iter()
            .map(|parameter| Ok(ParameterRef::new(parameter.name.clone(), self.resolve(&parameter.ty)?)))
            .collect::<Result<Vec<_>>>()?;
        self.scopes.push(parameters.clone());
        let body = self.transform_boxed(&lambda.body);
        self.scopes.pop();
        Ok(ExprLambda {
            parameters,
            body: body?,
        })
    }

    /// Innermost declaration with the parameter's name wins.
    fn lookup_parameter(&self, parameter: &NodeParameter) -> Result<ParameterRef> {
        self.scopes
            .iter()
            .rev()
            .flatten()
            .find(|declared| declared.name() == parameter.name)
            .cloned()
            .ok_or_else(|| {
                Error::unsupported_with(
                    "Parameter",
                    format!("`{}` is not bound by an enclosing lambda", parameter.name),
                )
            })
    }

    fn member(&mut self, descriptor: &MemberDescriptor) -> Result<MemberRef> {
        if let Some(member) = self.members.get(descriptor) {
            return Ok(member.clone());
        }
        let declaring_type = self.resolve(&descriptor.declaring_type)?;
        let member = lookup_member(&declaring_type, &descriptor.name).ok_or_else(|| {
            Error::UnresolvedMember {
                declaring_type: descriptor.declaring_type.without_properties(),
                name: descriptor.name.clone(),
            }
        })?;
        let ty = self.resolve(&member.ty)?;
        let member = MemberRef {
            declaring_type,
            member,
            ty,
        };
        self.members.insert(descriptor.clone(), member.clone());
        Ok(member)
    }

    fn ensure_member(&self, ty: &TypeRef, name: &str) -> Result<()> {
        match ty.member(name) {
            Some(member) if member.writable => {
                self.resolve(&member.ty)?;
                Ok(())
            }
            Some(_) => Err(Error::mapping(format!(
                "member {}::{name} is not writable",
                ty.descriptor()
            ))),
            None => Err(Error::UnresolvedMember {
                declaring_type: ty.descriptor().without_properties(),
                name: name.to_string(),
            }),
        }
    }

    fn method(&mut self, descriptor: &MethodDescriptor) -> Result<MethodRef> {
        if let Some(method) = self.methods.get(descriptor) {
            return Ok(method.clone());
        }
        let info = catalog().resolve(descriptor)?;
        let generic_arguments = descriptor
            .generic_arguments
            .iter()
            .map(|argument| self.resolve(argument))
            .collect::<Result<Vec<_>>>()?;
        let method = MethodRef::new(info, generic_arguments)?;
        self.methods.insert(descriptor.clone(), method.clone());
        Ok(method)
    }

    fn variable(&mut self, variable: &NodeVariable) -> Result<CapturedCell> {
        if let Some(cell) = self.variables.get(&variable.name) {
            return Ok(cell.clone());
        }
        let value = self
            .arguments
            .and_then(|arguments| arguments.get(&variable.name))
            .ok_or_else(|| {
                Error::unsupported_with("Variable", format!("no argument bound to `{}`", variable.name))
            })?;
        let ty = self.resolve(&variable.ty)?;
        let value = self.mapper.to_object(value, &variable.ty, self.resolver)?;
        let cell = CapturedCell::new(variable.name.clone(), ty, value);
        self.variables.insert(variable.name.clone(), cell.clone());
        Ok(cell)
    }
}

/// Raise an AST node to a native expression. `Variable` nodes fail; use
/// [`to_native_with_arguments`] for prepared queries.
pub fn to_native(node: &Node, resolver: &dyn TypeResolver) -> Result<Expression> {
    NativeGenerator::new(resolver).transform_node(node)
}

pub fn to_native_with_arguments(
    node: &Node,
    resolver: &dyn TypeResolver,
    arguments: &BTreeMap<String, DynamicValue>,
) -> Result<Expression> {
    NativeGenerator::new(resolver)
        .with_arguments(arguments)
        .transform_node(node)
}
