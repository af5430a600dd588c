use std::sync::Arc;

use rq_core::ast::*;
use rq_core::ops::{self, BinaryOp, UnaryOp};
use rq_core::types::{PrimitiveKind, TypeDescriptor};
use rq_core::value::{DynamicList, DynamicValue, Scalar};
use rq_core::{Query, Result};
use rq_pipeline::{Diagnostic, PipelineDiagnostics};

use super::QueryPass;

pub const PARTIAL_EVALUATION: &str = "partial-eval";

/// Evaluates a closed sub-tree (no free parameters, captures, variables or
/// resources) with the semantics of the executing side.
pub trait ClosedEvaluator: Send + Sync {
    fn evaluate(&self, node: &Node) -> Result<DynamicValue>;
}

impl<F> ClosedEvaluator for F
where
    F: Fn(&Node) -> Result<DynamicValue> + Send + Sync,
{
    fn evaluate(&self, node: &Node) -> Result<DynamicValue> {
        self(node)
    }
}

/// Folds closed sub-trees into constants.
///
/// Scalar operators, string methods and member reads on constants fold
/// in-process with the interpreter's operator semantics. With a
/// [`ClosedEvaluator`] every other closed sub-tree (object construction,
/// operators over constant lists) folds too, except that object instances
/// are not folded inside a lambda body, where each invocation builds a fresh
/// one. A fold that fails leaves the sub-tree for execution to report.
#[derive(Clone, Default)]
pub struct PartialEvaluation {
    evaluator: Option<Arc<dyn ClosedEvaluator>>,
}

impl PartialEvaluation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evaluator(evaluator: Arc<dyn ClosedEvaluator>) -> Self {
        Self {
            evaluator: Some(evaluator),
        }
    }

    fn fold(&self, node: Node, in_lambda: bool, diagnostics: &mut PipelineDiagnostics) -> Result<Node> {
        let in_body = in_lambda || matches!(node, Node::Lambda(_) | Node::Quote(_));
        let node = node.map_children(&mut |child| self.fold(child, in_body, &mut *diagnostics))?;
        let folded = match (try_fold(&node), &self.evaluator) {
            (Ok(None), Some(evaluator)) if is_evaluable(&node) => {
                evaluate(evaluator.as_ref(), &node, in_lambda)
            }
            (folded, _) => folded,
        };
        Ok(match folded {
            Ok(Some(folded)) => folded,
            Ok(None) => node,
            Err(err) => {
                diagnostics.push(Diagnostic::info(format!(
                    "left {} unfolded: {err}",
                    node.kind_name()
                )));
                node
            }
        })
    }
}

impl QueryPass for PartialEvaluation {
    fn name(&self) -> &'static str {
        PARTIAL_EVALUATION
    }

    fn run(&self, query: Query, diagnostics: &mut PipelineDiagnostics) -> Result<Query> {
        let Query { root, arguments } = query;
        let root = self.fold(root, false, diagnostics)?;
        Ok(Query { root, arguments })
    }
}

fn evaluate(evaluator: &dyn ClosedEvaluator, node: &Node, in_lambda: bool) -> Result<Option<Node>> {
    let value = evaluator.evaluate(node)?;
    if in_lambda && holds_instance(&value) {
        return Ok(None);
    }
    Ok(constant(&node.ty(), value))
}

/// Worth handing to an evaluator: a closed computation that is not already a
/// constant, a lambda or a query root.
fn is_evaluable(node: &Node) -> bool {
    match node {
        Node::Constant(_)
        | Node::Parameter(_)
        | Node::Lambda(_)
        | Node::Quote(_)
        | Node::Capture(_)
        | Node::Variable(_)
        | Node::Resource(_) => false,
        _ => !node.ty().is_queryable() && is_closed(node),
    }
}

/// No free parameters, captures, variables, resources or root placeholders.
fn is_closed(node: &Node) -> bool {
    fn visit<'a>(node: &'a Node, bound: &mut Vec<&'a str>) -> bool {
        match node {
            Node::Parameter(parameter) => bound.contains(&parameter.name.as_str()),
            Node::Capture(_) | Node::Variable(_) | Node::Resource(_) => false,
            Node::Constant(constant) => !constant.ty.is_queryable(),
            Node::Lambda(lambda) | Node::Quote(NodeQuote { lambda }) => {
                let depth = bound.len();
                bound.extend(lambda.parameters.iter().map(|parameter| parameter.name.as_str()));
                let closed = visit(&lambda.body, bound);
                bound.truncate(depth);
                closed
            }
            other => other.children().into_iter().all(|child| visit(child, bound)),
        }
    }
    visit(node, &mut Vec::new())
}

fn holds_instance(value: &DynamicValue) -> bool {
    match value {
        DynamicValue::Null | DynamicValue::Scalar(_) => false,
        DynamicValue::Reference(_) => true,
        DynamicValue::List(list) => list.items.iter().any(holds_instance),
        DynamicValue::Object(object) => {
            object.ty.as_ref().map_or(false, |ty| !ty.is_anonymous)
                || object
                    .entries
                    .iter()
                    .any(|entry| holds_instance(&entry.value))
        }
    }
}

fn constant(ty: &TypeDescriptor, value: impl Into<DynamicValue>) -> Option<Node> {
    Some(Node::constant(ty.clone(), value))
}

fn try_fold(node: &Node) -> Result<Option<Node>> {
    Ok(match node {
        Node::Binary(binary) => match (binary.left.as_constant(), binary.right.as_constant()) {
            (Some(left), Some(right)) => fold_binary(binary.op, &left.value, &right.value)?
                .and_then(|value| constant(&binary.ty, value)),
            _ => None,
        },
        Node::Unary(unary) => match unary.operand.as_constant() {
            Some(operand) => fold_unary(unary, &operand.value)?,
            None => None,
        },
        Node::Conditional(conditional) => match conditional.test.as_constant() {
            Some(test) => match test.value.as_scalar().and_then(Scalar::as_bool) {
                Some(true) => Some(conditional.if_true.as_ref().clone()),
                Some(false) => Some(conditional.if_false.as_ref().clone()),
                None => None,
            },
            None => None,
        },
        Node::Call(call) => fold_string_call(call)?,
        Node::Member(access) => fold_member(access)?,
        Node::ListInit(list) => {
            let items: Option<Vec<_>> = list
                .items
                .iter()
                .map(|item| item.as_constant().map(|item| item.value.clone()))
                .collect();
            match items {
                // objects carry per-constant reference ids that would collide
                Some(items) if items.iter().all(is_plain) => constant(
                    &node.ty(),
                    DynamicValue::List(DynamicList {
                        element_type: Some(list.element_type.clone()),
                        items,
                    }),
                ),
                _ => None,
            }
        }
        Node::Default(default) if !default.ty.is_queryable() => {
            let value = PrimitiveKind::from_descriptor(&default.ty)
                .and_then(Scalar::default_of)
                .map(DynamicValue::Scalar)
                .unwrap_or(DynamicValue::Null);
            constant(&default.ty, value)
        }
        Node::TypeIs(type_is) => match type_is.operand.as_constant() {
            Some(operand) if operand.value.is_null() => {
                constant(&TypeDescriptor::bool(), DynamicValue::scalar(false))
            }
            _ => None,
        },
        _ => None,
    })
}

fn fold_binary(op: BinaryOp, left: &DynamicValue, right: &DynamicValue) -> Result<Option<DynamicValue>> {
    Ok(match (op, left, right) {
        (BinaryOp::Coalesce, DynamicValue::Null, right) => Some(right.clone()),
        (BinaryOp::Coalesce, left @ DynamicValue::Scalar(_), _) => Some(left.clone()),
        (BinaryOp::Equal | BinaryOp::NotEqual, DynamicValue::Null, other)
        | (BinaryOp::Equal | BinaryOp::NotEqual, other, DynamicValue::Null)
            if other.is_null() || other.as_scalar().is_some() =>
        {
            let equal = other.is_null();
            Some(DynamicValue::scalar(if op == BinaryOp::Equal { equal } else { !equal }))
        }
        (_, DynamicValue::Scalar(left), DynamicValue::Scalar(right)) => {
            Some(DynamicValue::Scalar(ops::apply_binary(op, left, right)?))
        }
        _ => None,
    })
}

fn fold_unary(unary: &NodeUnary, operand: &DynamicValue) -> Result<Option<Node>> {
    let target = PrimitiveKind::from_descriptor(&unary.ty);
    Ok(match operand {
        DynamicValue::Null => constant(&unary.ty, DynamicValue::Null),
        DynamicValue::Scalar(_) if unary.op == UnaryOp::Convert && target.is_none() => None,
        DynamicValue::Scalar(scalar) => constant(
            &unary.ty,
            DynamicValue::Scalar(ops::apply_unary(unary.op, scalar, target)?),
        ),
        _ => None,
    })
}

fn fold_string_call(call: &NodeCall) -> Result<Option<Node>> {
    if !call.method.declaring_type.is_core("string") {
        return Ok(None);
    }
    let Some(target) = call.target.as_ref().and_then(|target| target.as_constant()) else {
        return Ok(None);
    };
    let Some(text) = target.value.as_scalar().and_then(Scalar::as_str) else {
        return Ok(None);
    };
    let arguments: Option<Vec<Scalar>> = call
        .arguments
        .iter()
        .map(|argument| argument.as_constant()?.value.as_scalar().cloned())
        .collect();
    let Some(arguments) = arguments else {
        return Ok(None);
    };
    let value = ops::call_string_method(&call.method.name, text, &arguments)?;
    Ok(constant(&call.ty, DynamicValue::Scalar(value)))
}

fn fold_member(access: &NodeMember) -> Result<Option<Node>> {
    let Some(target) = access.target.as_ref().and_then(|target| target.as_constant()) else {
        return Ok(None);
    };
    Ok(match &target.value {
        DynamicValue::Scalar(Scalar::String(text)) if access.member.name == "Length" => {
            let value = ops::call_string_method("Length", text, &[])?;
            constant(&access.ty, DynamicValue::Scalar(value))
        }
        DynamicValue::Object(object) => match object.get(&access.member.name) {
            Some(value) if !contains_reference(value) => constant(&access.ty, value.clone()),
            _ => None,
        },
        _ => None,
    })
}

fn is_plain(value: &DynamicValue) -> bool {
    match value {
        DynamicValue::Null | DynamicValue::Scalar(_) => true,
        DynamicValue::List(list) => list.items.iter().all(is_plain),
        DynamicValue::Object(_) | DynamicValue::Reference(_) => false,
    }
}

fn contains_reference(value: &DynamicValue) -> bool {
    match value {
        DynamicValue::Reference(_) => true,
        DynamicValue::Null | DynamicValue::Scalar(_) => false,
        DynamicValue::List(list) => list.items.iter().any(contains_reference),
        DynamicValue::Object(object) => object
            .entries
            .iter()
            .any(|entry| contains_reference(&entry.value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> Node {
        Node::constant(TypeDescriptor::int(), DynamicValue::scalar(value))
    }

    fn binary(op: BinaryOp, left: Node, right: Node, ty: TypeDescriptor) -> Node {
        NodeBinary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ty,
        }
        .into()
    }

    fn run(root: Node) -> (Node, PipelineDiagnostics) {
        let mut diagnostics = PipelineDiagnostics::default();
        let query = PartialEvaluation::new()
            .run(Query::new(root), &mut diagnostics)
            .unwrap();
        (query.root, diagnostics)
    }

    #[test]
    fn folds_nested_arithmetic() {
        let tree = binary(
            BinaryOp::Multiply,
            binary(BinaryOp::Add, int(1), int(2), TypeDescriptor::int()),
            int(4),
            TypeDescriptor::int(),
        );
        assert_eq!(run(tree).0, int(12));
    }

    #[test]
    fn failing_fold_is_left_for_execution() {
        let tree = binary(BinaryOp::Divide, int(1), int(0), TypeDescriptor::int());
        let (folded, diagnostics) = run(tree.clone());
        assert_eq!(folded, tree);
        assert_eq!(diagnostics.items.len(), 1);
    }

    #[test]
    fn parameters_are_not_folded() {
        let x = Node::parameter("x", TypeDescriptor::int());
        let tree = binary(BinaryOp::Add, x, int(1), TypeDescriptor::int());
        assert_eq!(run(tree.clone()).0, tree);
    }

    fn lambda(parameter: &str, body: Node) -> Node {
        NodeLambda {
            parameters: vec![NodeParameter {
                name: parameter.to_string(),
                ty: TypeDescriptor::int(),
            }],
            body: Box::new(body),
        }
        .into()
    }

    #[test]
    fn closedness_tracks_lambda_bindings() {
        let x = || Node::parameter("x", TypeDescriptor::int());
        let bound = lambda("x", binary(BinaryOp::Add, x(), int(1), TypeDescriptor::int()));
        assert!(is_closed(&bound));
        assert!(!is_closed(&binary(BinaryOp::Add, x(), int(1), TypeDescriptor::int())));
        let shadowed = lambda("y", x());
        assert!(!is_closed(&shadowed));
        assert!(!is_closed(&Node::variable("limit", TypeDescriptor::int())));
        assert!(!is_evaluable(&bound));
    }

    #[test]
    fn instances_stay_unfolded_inside_lambdas() {
        let object = DynamicValue::Object(
            rq_core::value::DynamicObject::new(Some(TypeDescriptor::new("shop", "Category")))
                .with_entry("Id", DynamicValue::scalar(1i64)),
        );
        let shape = DynamicValue::Object(
            rq_core::value::DynamicObject::new(Some(TypeDescriptor::anonymous([])))
                .with_entry("Id", DynamicValue::scalar(1i64)),
        );
        assert!(holds_instance(&object));
        assert!(!holds_instance(&shape));
        assert!(holds_instance(&DynamicValue::list(vec![shape.clone(), object])));
        assert!(!holds_instance(&DynamicValue::list(vec![shape])));
    }
}
