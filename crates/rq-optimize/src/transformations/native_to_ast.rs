use rq_core::ast::*;
use rq_core::error::{Error, Result};
use rq_core::expr::*;
use rq_core::value::DynamicValueMapper;

/// Lowers a native expression tree to its wire form. Constants and captured
/// values go through the dynamic value mapper; handles become descriptors.
///
/// Native parameters are identities; on the wire they are names looked up
/// innermost-first. Every parameter therefore gets a name no enclosing or
/// sibling parameter holds, so two distinct parameters both called `v`
/// lower to `v` and `v1`.
pub struct AstGenerator {
    mapper: DynamicValueMapper,
    scopes: Vec<Vec<(ParameterRef, String)>>,
}

impl AstGenerator {
    pub fn new() -> Self {
        Self::with_mapper(DynamicValueMapper::new())
    }

    pub fn with_mapper(mapper: DynamicValueMapper) -> Self {
        Self {
            mapper,
            scopes: Vec::new(),
        }
    }

    pub fn transform_expr(&mut self, expr: &Expression) -> Result<Node> {
        Ok(match expr {
            Expression::Constant(constant) => Node::Constant(NodeConstant {
                ty: constant.ty.descriptor().clone(),
                value: self.mapper.to_dynamic(&constant.value)?,
            }),
            Expression::Parameter(parameter) => {
                let Some(name) = self.bound_name(parameter) else {
                    return Err(Error::unsupported_with(
                        "Parameter",
                        format!("`{}` is not bound by an enclosing lambda", parameter.name()),
                    ));
                };
                Node::Parameter(NodeParameter {
                    name: name.to_string(),
                    ty: parameter.ty().descriptor().clone(),
                })
            }
            Expression::Lambda(lambda) => Node::Lambda(self.transform_lambda(lambda)?),
            Expression::Quote(quote) => Node::Quote(NodeQuote {
                lambda: self.transform_lambda(&quote.lambda)?,
            }),
            Expression::Binary(binary) => Node::Binary(NodeBinary {
                op: binary.op,
                left: self.transform_boxed(&binary.left)?,
                right: self.transform_boxed(&binary.right)?,
                ty: binary.ty.descriptor().clone(),
            }),
            Expression::Unary(unary) => Node::Unary(NodeUnary {
                op: unary.op,
                operand: self.transform_boxed(&unary.operand)?,
                ty: unary.ty.descriptor().clone(),
            }),
            Expression::MemberAccess(access) => Node::Member(NodeMember {
                target: access
                    .target
                    .as_ref()
                    .map(|target| self.transform_boxed(target))
                    .transpose()?,
                member: access.member.descriptor(),
                ty: access.member.ty.descriptor().clone(),
            }),
            Expression::MethodCall(call) => Node::Call(NodeCall {
                target: call
                    .target
                    .as_ref()
                    .map(|target| self.transform_boxed(target))
                    .transpose()?,
                method: call.method.descriptor(),
                arguments: self.transform_all(&call.arguments)?,
                ty: call.ty.descriptor().clone(),
            }),
            Expression::New(new) => Node::New(NodeNew {
                ty: new.ty.descriptor().clone(),
                members: new.members.clone(),
                arguments: self.transform_all(&new.arguments)?,
            }),
            Expression::MemberInit(init) => Node::MemberInit(NodeMemberInit {
                ty: init.ty.descriptor().clone(),
                bindings: init
                    .bindings
                    .iter()
                    .map(|binding| {
                        Ok(NodeBinding {
                            member: binding.member.clone(),
                            value: self.transform_expr(&binding.value)?,
                        })
                    })
                    .collect::<Result<_>>()?,
            }),
            Expression::Conditional(conditional) => Node::Conditional(NodeConditional {
                test: self.transform_boxed(&conditional.test)?,
                if_true: self.transform_boxed(&conditional.if_true)?,
                if_false: self.transform_boxed(&conditional.if_false)?,
                ty: conditional.ty.descriptor().clone(),
            }),
            Expression::ListInit(list) => Node::ListInit(NodeListInit {
                element_type: list.element_type.descriptor().clone(),
                items: self.transform_all(&list.items)?,
            }),
            Expression::Default(default) => Node::Default(NodeDefault {
                ty: default.ty.descriptor().clone(),
            }),
            Expression::TypeIs(type_is) => Node::TypeIs(NodeTypeIs {
                operand: self.transform_boxed(&type_is.operand)?,
                ty: type_is.ty.descriptor().clone(),
            }),
            Expression::Resource(resource) => Node::Resource(NodeResource {
                element_type: resource.element_type.descriptor().clone(),
            }),
            Expression::Captured(cell) => Node::Capture(NodeCapture {
                name: cell.name().to_string(),
                ty: cell.ty().descriptor().clone(),
                value: self.mapper.to_dynamic(&cell.get())?,
            }),
            Expression::Block(_) | Expression::Assign(_) => {
                return Err(Error::unsupported_with(
                    expr.kind_name(),
                    "host-only construct has no wire form",
                ))
            }
        })
    }

    fn transform_boxed(&mut self, expr: &Expression) -> Result<BNode> {
        Ok(Box::new(self.transform_expr(expr)?))
    }

    fn transform_all(&mut self, exprs: &[Expression]) -> Result<Vec<Node>> {
        exprs.iter().map(|expr| self.transform_expr(expr)).collect()
    }

    fn transform_lambda(&mut self, lambda: &ExprLambda) -> Result<NodeLambda> {
        let mut declared: Vec<(ParameterRef, String)> = Vec::with_capacity(lambda.parameters.len());
        for parameter in &lambda.parameters {
            let name = self.unshadowed_name(parameter.name(), &declared);
            declared.push((parameter.clone(), name));
        }
        let parameters = declared
            .iter()
            .map(|(parameter, name)| NodeParameter {
                name: name.clone(),
                ty: parameter.ty().descriptor().clone(),
            })
            .collect();
        self.scopes.push(declared);
        let body = self.transform_boxed(&lambda.body);
        self.scopes.pop();
        Ok(NodeLambda {
            parameters,
            body: body?,
        })
    }

    fn unshadowed_name(&self, base: &str, siblings: &[(ParameterRef, String)]) -> String {
        let taken = |candidate: &str| {
            self.scopes
                .iter()
                .flatten()
                .chain(siblings)
                .any(|(_, name)| name == candidate)
        };
        if !taken(base) {
            return base.to_string();
        }
        let mut suffix = 1usize;
        loop {
            let candidate = format!("{base}{suffix}");
            if !taken(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Wire name of a parameter, if an enclosing lambda binds this identity.
    fn bound_name(&self, parameter: &ParameterRef) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .flatten()
            .find(|(declared, _)| declared.ptr_eq(parameter))
            .map(|(_, name)| name.as_str())
    }
}

impl Default for AstGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower a native expression to an AST node.
pub fn to_ast(expr: &Expression) -> Result<Node> {
    AstGenerator::new().transform_expr(expr)
}

/// Lower a native expression to a query ready for preparation.
pub fn to_query(expr: &Expression) -> Result<Query> {
    Ok(Query::new(to_ast(expr)?))
}
