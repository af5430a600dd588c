//! Indented tree rendering of query ASTs for logs and test failures.

use std::fmt::{self, Display, Formatter};

use super::{Node, Query};
use crate::pretty::{pretty, PrettyCtx, PrettyOptions, PrettyPrintable};

impl PrettyPrintable for Node {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        let suffix = if ctx.options.show_types {
            format!(" : {}", self.ty())
        } else {
            String::new()
        };
        let head = match self {
            Node::Constant(node) => format!("const {}", node.value),
            Node::Parameter(node) => format!("param {}", node.name),
            Node::Lambda(node) => format!("lambda |{}|", parameter_list(&node.parameters)),
            Node::Quote(node) => format!("quote |{}|", parameter_list(&node.lambda.parameters)),
            Node::Binary(node) => format!("binary {}", node.op),
            Node::Unary(node) => format!("unary {}", node.op),
            Node::Member(node) => format!("member {}", node.member),
            Node::Call(node) => format!("call {}", node.method),
            Node::New(node) => format!("new {} ({})", node.ty, node.members.join(", ")),
            Node::MemberInit(node) => format!(
                "init {} ({})",
                node.ty,
                node.bindings
                    .iter()
                    .map(|binding| binding.member.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Node::Conditional(_) => "if".to_string(),
            Node::ListInit(node) => format!("list {}", node.element_type),
            Node::Default(node) => format!("default {}", node.ty),
            Node::TypeIs(node) => format!("is {}", node.ty),
            Node::Resource(node) => format!("resource {}", node.element_type),
            Node::Capture(node) => format!("capture {} = {}", node.name, node.value),
            Node::Variable(node) => format!("var {}", node.name),
        };
        ctx.writeln(f, format!("{head}{suffix}"))?;
        let children = self.children();
        if children.is_empty() {
            return Ok(());
        }
        ctx.with_indent(|ctx| {
            for child in &children {
                child.fmt_pretty(f, ctx)?;
            }
            Ok(())
        })
    }
}

fn parameter_list(parameters: &[super::NodeParameter]) -> String {
    parameters
        .iter()
        .map(|parameter| parameter.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pretty(self, PrettyOptions::default()))
    }
}

impl PrettyPrintable for Query {
    fn fmt_pretty(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        self.root.fmt_pretty(f, ctx)?;
        for (name, value) in &self.arguments {
            ctx.writeln(f, format!("where {name} = {value}"))?;
        }
        Ok(())
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pretty(self, PrettyOptions::default()))
    }
}
