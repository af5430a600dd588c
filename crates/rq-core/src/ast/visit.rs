//! Structural traversal. Passes never mutate a tree in place; they rebuild
//! it bottom-up through [`Node::transform_up`].

use super::*;
use crate::error::Result;

impl Node {
    /// Direct children in evaluation order. Lambda parameters are
    /// declarations, not children.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Constant(_)
            | Node::Parameter(_)
            | Node::Default(_)
            | Node::Resource(_)
            | Node::Capture(_)
            | Node::Variable(_) => Vec::new(),
            Node::Lambda(node) => vec![node.body.as_ref()],
            Node::Quote(node) => vec![node.lambda.body.as_ref()],
            Node::Binary(node) => vec![node.left.as_ref(), node.right.as_ref()],
            Node::Unary(node) => vec![node.operand.as_ref()],
            Node::TypeIs(node) => vec![node.operand.as_ref()],
            Node::Member(node) => node.target.iter().map(|target| target.as_ref()).collect(),
            Node::Call(node) => node
                .target
                .iter()
                .map(|target| target.as_ref())
                .chain(node.arguments.iter())
                .collect(),
            Node::New(node) => node.arguments.iter().collect(),
            Node::MemberInit(node) => node.bindings.iter().map(|binding| &binding.value).collect(),
            Node::Conditional(node) => vec![
                node.test.as_ref(),
                node.if_true.as_ref(),
                node.if_false.as_ref(),
            ],
            Node::ListInit(node) => node.items.iter().collect(),
        }
    }

    /// Pre-order walk over this node and every descendant.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    pub fn any(&self, predicate: impl Fn(&Node) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |node| found |= predicate(node));
        found
    }

    /// Rebuild this node with every direct child replaced by `f(child)`.
    pub fn map_children(self, f: &mut impl FnMut(Node) -> Result<Node>) -> Result<Node> {
        Ok(match self {
            Node::Constant(_)
            | Node::Parameter(_)
            | Node::Default(_)
            | Node::Resource(_)
            | Node::Capture(_)
            | Node::Variable(_) => self,
            Node::Lambda(node) => Node::Lambda(NodeLambda {
                parameters: node.parameters,
                body: boxed(node.body, f)?,
            }),
            Node::Quote(node) => Node::Quote(NodeQuote {
                lambda: NodeLambda {
                    parameters: node.lambda.parameters,
                    body: boxed(node.lambda.body, f)?,
                },
            }),
            Node::Binary(node) => Node::Binary(NodeBinary {
                op: node.op,
                left: boxed(node.left, f)?,
                right: boxed(node.right, f)?,
                ty: node.ty,
            }),
            Node::Unary(node) => Node::Unary(NodeUnary {
                op: node.op,
                operand: boxed(node.operand, f)?,
                ty: node.ty,
            }),
            Node::TypeIs(node) => Node::TypeIs(NodeTypeIs {
                operand: boxed(node.operand, f)?,
                ty: node.ty,
            }),
            Node::Member(node) => Node::Member(NodeMember {
                target: node.target.map(|target| boxed(target, f)).transpose()?,
                member: node.member,
                ty: node.ty,
            }),
            Node::Call(node) => Node::Call(NodeCall {
                target: node.target.map(|target| boxed(target, f)).transpose()?,
                method: node.method,
                arguments: node.arguments.into_iter().map(&mut *f).collect::<Result<_>>()?,
                ty: node.ty,
            }),
            Node::New(node) => Node::New(NodeNew {
                ty: node.ty,
                members: node.members,
                arguments: node.arguments.into_iter().map(&mut *f).collect::<Result<_>>()?,
            }),
            Node::MemberInit(node) => Node::MemberInit(NodeMemberInit {
                ty: node.ty,
                bindings: node
                    .bindings
                    .into_iter()
                    .map(|binding| {
                        Ok(NodeBinding {
                            member: binding.member,
                            value: f(binding.value)?,
                        })
                    })
                    .collect::<Result<_>>()?,
            }),
            Node::Conditional(node) => Node::Conditional(NodeConditional {
                test: boxed(node.test, f)?,
                if_true: boxed(node.if_true, f)?,
                if_false: boxed(node.if_false, f)?,
                ty: node.ty,
            }),
            Node::ListInit(node) => Node::ListInit(NodeListInit {
                element_type: node.element_type,
                items: node.items.into_iter().map(&mut *f).collect::<Result<_>>()?,
            }),
        })
    }

    /// Post-order rewrite: children first, then `f` on the rebuilt parent.
    pub fn transform_up(self, f: &mut impl FnMut(Node) -> Result<Node>) -> Result<Node> {
        let node = self.map_children(&mut |child| child.transform_up(f))?;
        f(node)
    }
}

fn boxed(node: BNode, f: &mut impl FnMut(Node) -> Result<Node>) -> Result<BNode> {
    Ok(Box::new(f(*node)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::BinaryOp;
    use crate::types::TypeDescriptor;

    fn int(value: i64) -> Node {
        Node::constant(TypeDescriptor::int(), crate::DynamicValue::scalar(value))
    }

    #[test]
    fn transform_up_visits_children_before_parents() {
        let tree: Node = NodeBinary {
            op: BinaryOp::Add,
            left: Box::new(int(1)),
            right: Box::new(int(2)),
            ty: TypeDescriptor::int(),
        }
        .into();
        let mut order = Vec::new();
        let rebuilt = tree
            .clone()
            .transform_up(&mut |node| {
                order.push(node.kind_name());
                Ok(node)
            })
            .unwrap();
        assert_eq!(order, ["Constant", "Constant", "Binary"]);
        assert_eq!(rebuilt, tree);
    }

    #[test]
    fn walk_skips_lambda_parameters() {
        let x = NodeParameter {
            name: "x".into(),
            ty: TypeDescriptor::int(),
        };
        let lambda: Node = NodeLambda {
            parameters: vec![x.clone()],
            body: Box::new(x.into()),
        }
        .into();
        let mut count = 0;
        lambda.walk(&mut |_| count += 1);
        assert_eq!(count, 2);
    }
}
