mod support;

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use rq_core::ast::{Node, NodeQuote};
use rq_core::expr::methods::{ENUMERABLE, QUERYABLE};
use rq_core::expr::{ExprLambda, Expression, ParameterRef};
use rq_core::ops::BinaryOp;
use rq_core::value::NativeValue;
use rq_core::{DynamicValue, Error, Query, Result, TypeDescriptor};
use rq_optimize::{to_ast, to_native, to_native_with_arguments, to_query};

use support::*;

fn unsupported_kind(err: Error) -> String {
    match err {
        Error::UnsupportedExpression { kind, .. } => kind,
        other => panic!("expected UnsupportedExpression, got {other:?}"),
    }
}

#[test]
fn native_ast_native_is_structurally_stable() -> Result<()> {
    let fixture = Fixture::new();
    let expression: Expression = fixture
        .products()
        .filter(|b, p| {
            b.binary(
                BinaryOp::AndAlso,
                b.binary(BinaryOp::GreaterThan, b.property(&p, "Price")?, b.constant(10.0)?)?,
                b.call_method(b.property(&p, "Name")?, "Contains", vec![b.constant("a")?])?,
            )
        })?
        .group_by(|b, p| b.property(&p, "Id"))?
        .select(|b, g| {
            b.anonymous([
                ("Key", b.property(&g, "Key")?),
                ("Total", b.enumerable_with("Sum", g, |b, p| b.property(&p, "Price"))?),
            ])
        })?
        .into();

    let lowered = to_ast(&expression)?;
    let raised = to_native(&lowered, fixture.resolver.as_ref())?;

    assert_eq!(to_ast(&raised)?, lowered);
    assert_eq!(raised.ty(), expression.ty());
    Ok(())
}

#[test]
fn wire_form_survives_json() -> Result<()> {
    let fixture = Fixture::new();
    let cell = fixture
        .builder
        .capture("limit", &TypeDescriptor::float(), NativeValue::float(12.5))?;
    let query = to_query(
        &fixture
            .products()
            .filter(|b, p| b.binary(BinaryOp::LessThan, b.property(&p, "Price")?, cell.into()))?
            .take(3)?
            .into(),
    )?;

    let json = query.to_json()?;
    let decoded = Query::from_json(&json)?;

    assert_eq!(decoded, query);
    assert_eq!(decoded.root_types().into_iter().collect::<Vec<_>>(), vec![product()]);
    Ok(())
}

#[test]
fn host_only_constructs_have_no_wire_form() {
    let fixture = Fixture::new();
    let b = &fixture.builder;
    let variable = b.parameter(&TypeDescriptor::int()).unwrap();

    let block = b.block(vec![variable.clone()], vec![b.constant(1i64).unwrap()]);
    assert_eq!(unsupported_kind(to_ast(&block).unwrap_err()), "Block");

    let assign = b.assign(Expression::Parameter(variable), b.constant(2i64).unwrap());
    assert_eq!(unsupported_kind(to_ast(&assign).unwrap_err()), "Assign");
}

#[test]
fn parameters_must_be_bound_by_a_lambda() {
    let fixture = Fixture::new();
    let free = Expression::Parameter(fixture.builder.parameter(&TypeDescriptor::int()).unwrap());
    assert_eq!(unsupported_kind(to_ast(&free).unwrap_err()), "Parameter");

    let node = Node::parameter("x", TypeDescriptor::int());
    let err = to_native(&node, fixture.resolver.as_ref()).unwrap_err();
    assert_eq!(unsupported_kind(err), "Parameter");
}

#[test]
fn variables_bind_from_arguments() -> Result<()> {
    let fixture = Fixture::new();
    let node = Node::variable("limit", TypeDescriptor::int());

    let err = to_native(&node, fixture.resolver.as_ref()).unwrap_err();
    assert_eq!(unsupported_kind(err), "Variable");

    let arguments = BTreeMap::from([("limit".to_string(), DynamicValue::scalar(7i64))]);
    match to_native_with_arguments(&node, fixture.resolver.as_ref(), &arguments)? {
        Expression::Captured(cell) => {
            assert_eq!(cell.name(), "limit");
            assert_eq!(cell.get().as_scalar().cloned(), Some(7i64.into()));
        }
        other => panic!("expected a captured cell, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unknown_types_fail_to_raise() {
    let fixture = Fixture::new();
    let node = Node::resource(TypeDescriptor::new("shop", "Invoice"));

    let err = to_native(&node, fixture.resolver.as_ref()).unwrap_err();

    assert!(matches!(err, Error::UnresolvedType(ty) if ty.name == "Invoice"));
}

/// `products.Where(v => new[] { 2 }.Any(v => v == outer.Id))`, where both
/// lambdas declare a parameter literally named `v`.
fn shadowing_filter(fixture: &Fixture) -> Result<Expression> {
    let b = &fixture.builder;
    let outer = ParameterRef::new("v", b.resolve(&product())?);
    let inner = ParameterRef::new("v", b.resolve(&TypeDescriptor::int())?);
    let matches = b.binary(
        BinaryOp::Equal,
        Expression::Parameter(inner.clone()),
        b.property(&Expression::Parameter(outer.clone()), "Id")?,
    )?;
    let any = b.call(
        ENUMERABLE,
        "Any",
        vec![
            b.list(&TypeDescriptor::int(), vec![b.constant(2i64)?])?,
            ExprLambda {
                parameters: vec![inner],
                body: Box::new(matches),
            }
            .into(),
        ],
    )?;
    b.call(
        QUERYABLE,
        "Where",
        vec![
            fixture.products().into_expression(),
            ExprLambda {
                parameters: vec![outer],
                body: Box::new(any),
            }
            .into(),
        ],
    )
}

#[test]
fn parameters_sharing_a_name_keep_their_identity() -> Result<()> {
    let fixture = Fixture::new();
    let expression = shadowing_filter(&fixture)?;

    let lowered = to_ast(&expression)?;
    let mut declared = Vec::new();
    lowered.walk(&mut |node| match node {
        Node::Lambda(lambda) | Node::Quote(NodeQuote { lambda }) => {
            declared.extend(lambda.parameters.iter().map(|parameter| parameter.name.clone()))
        }
        _ => {}
    });
    assert_eq!(declared, vec!["v".to_string(), "v1".to_string()]);

    let raised = to_native(&lowered, fixture.resolver.as_ref())?;
    assert_eq!(to_ast(&raised)?, lowered);
    Ok(())
}
