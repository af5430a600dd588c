use crate::ops::{BinaryOp, UnaryOp};
use crate::types::{MemberDescriptor, MethodDescriptor, TypeDescriptor};
use crate::value::DynamicValue;
use crate::{common_enum, common_struct};

pub type BNode = Box<Node>;

common_enum! {
    /// Serializable query expression. Carries no runtime handles: every type,
    /// member and method is named structurally, every constant is a
    /// [`DynamicValue`].
    #[derive(derive_more::From)]
    pub enum Node {
        Constant(NodeConstant),
        Parameter(NodeParameter),
        Lambda(NodeLambda),
        Binary(NodeBinary),
        Unary(NodeUnary),
        Member(NodeMember),
        Call(NodeCall),
        New(NodeNew),
        MemberInit(NodeMemberInit),
        Conditional(NodeConditional),
        ListInit(NodeListInit),
        Quote(NodeQuote),
        Default(NodeDefault),
        TypeIs(NodeTypeIs),
        /// Query root: "all entities of this type", bound by the executor.
        Resource(NodeResource),
        /// Closed-over state that has not been extracted yet.
        Capture(NodeCapture),
        /// Placeholder bound from the query argument table at execution.
        Variable(NodeVariable),
    }
}

common_struct! {
    pub struct NodeConstant {
        pub ty: TypeDescriptor,
        pub value: DynamicValue,
    }
}

common_struct! {
    pub struct NodeParameter {
        pub name: String,
        pub ty: TypeDescriptor,
    }
}

common_struct! {
    pub struct NodeLambda {
        pub parameters: Vec<NodeParameter>,
        pub body: BNode,
    }
}

common_struct! {
    pub struct NodeBinary {
        pub op: BinaryOp,
        pub left: BNode,
        pub right: BNode,
        pub ty: TypeDescriptor,
    }
}

common_struct! {
    pub struct NodeUnary {
        pub op: UnaryOp,
        pub operand: BNode,
        /// Result type; the conversion target for `Convert`.
        pub ty: TypeDescriptor,
    }
}

common_struct! {
    pub struct NodeMember {
        /// `None` for static members.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub target: Option<BNode>,
        pub member: MemberDescriptor,
        pub ty: TypeDescriptor,
    }
}

common_struct! {
    pub struct NodeCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub target: Option<BNode>,
        pub method: MethodDescriptor,
        pub arguments: Vec<Node>,
        pub ty: TypeDescriptor,
    }
}

common_struct! {
    /// Object construction assigning `arguments[i]` to `members[i]`.
    pub struct NodeNew {
        pub ty: TypeDescriptor,
        pub members: Vec<String>,
        pub arguments: Vec<Node>,
    }
}

common_struct! {
    pub struct NodeBinding {
        pub member: String,
        pub value: Node,
    }
}

common_struct! {
    pub struct NodeMemberInit {
        pub ty: TypeDescriptor,
        pub bindings: Vec<NodeBinding>,
    }
}

common_struct! {
    pub struct NodeConditional {
        pub test: BNode,
        pub if_true: BNode,
        pub if_false: BNode,
        pub ty: TypeDescriptor,
    }
}

common_struct! {
    pub struct NodeListInit {
        pub element_type: TypeDescriptor,
        pub items: Vec<Node>,
    }
}

common_struct! {
    pub struct NodeQuote {
        pub lambda: NodeLambda,
    }
}

common_struct! {
    pub struct NodeDefault {
        pub ty: TypeDescriptor,
    }
}

common_struct! {
    pub struct NodeTypeIs {
        pub operand: BNode,
        pub ty: TypeDescriptor,
    }
}

common_struct! {
    pub struct NodeResource {
        pub element_type: TypeDescriptor,
    }
}

common_struct! {
    pub struct NodeCapture {
        pub name: String,
        pub ty: TypeDescriptor,
        pub value: DynamicValue,
    }
}

common_struct! {
    pub struct NodeVariable {
        pub name: String,
        pub ty: TypeDescriptor,
    }
}

impl NodeLambda {
    pub fn ty(&self) -> TypeDescriptor {
        TypeDescriptor::func(
            self.parameters.iter().map(|parameter| parameter.ty.clone()),
            self.body.ty(),
        )
    }
}

impl Node {
    pub fn constant(ty: TypeDescriptor, value: impl Into<DynamicValue>) -> Self {
        NodeConstant {
            ty,
            value: value.into(),
        }
        .into()
    }

    pub fn parameter(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        NodeParameter {
            name: name.into(),
            ty,
        }
        .into()
    }

    pub fn resource(element_type: TypeDescriptor) -> Self {
        NodeResource { element_type }.into()
    }

    pub fn variable(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        NodeVariable {
            name: name.into(),
            ty,
        }
        .into()
    }

    /// Static type of the value this node produces.
    pub fn ty(&self) -> TypeDescriptor {
        match self {
            Node::Constant(node) => node.ty.clone(),
            Node::Parameter(node) => node.ty.clone(),
            Node::Lambda(node) => node.ty(),
            Node::Binary(node) => node.ty.clone(),
            Node::Unary(node) => node.ty.clone(),
            Node::Member(node) => node.ty.clone(),
            Node::Call(node) => node.ty.clone(),
            Node::New(node) => node.ty.clone(),
            Node::MemberInit(node) => node.ty.clone(),
            Node::Conditional(node) => node.ty.clone(),
            Node::ListInit(node) => TypeDescriptor::seq(node.element_type.clone()),
            Node::Quote(node) => TypeDescriptor::quoted(node.lambda.ty()),
            Node::Default(node) => node.ty.clone(),
            Node::TypeIs(_) => TypeDescriptor::bool(),
            Node::Resource(node) => TypeDescriptor::queryable(node.element_type.clone()),
            Node::Capture(node) => node.ty.clone(),
            Node::Variable(node) => node.ty.clone(),
        }
    }

    /// Variant name as used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Constant(_) => "Constant",
            Node::Parameter(_) => "Parameter",
            Node::Lambda(_) => "Lambda",
            Node::Binary(_) => "Binary",
            Node::Unary(_) => "Unary",
            Node::Member(_) => "Member",
            Node::Call(_) => "Call",
            Node::New(_) => "New",
            Node::MemberInit(_) => "MemberInit",
            Node::Conditional(_) => "Conditional",
            Node::ListInit(_) => "ListInit",
            Node::Quote(_) => "Quote",
            Node::Default(_) => "Default",
            Node::TypeIs(_) => "TypeIs",
            Node::Resource(_) => "Resource",
            Node::Capture(_) => "Capture",
            Node::Variable(_) => "Variable",
        }
    }

    pub fn as_constant(&self) -> Option<&NodeConstant> {
        match self {
            Node::Constant(node) => Some(node),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Node::Constant(_))
    }
}
