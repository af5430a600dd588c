mod support;

use pretty_assertions::assert_eq;
use rq_core::ast::Node;
use rq_core::ops::BinaryOp;
use rq_core::types::AllowList;
use rq_core::{DynamicValue, Error, Result, TypeDescriptor};
use rq_interpret::ExecutionEngine;

use support::*;

fn folded(node: &Node) -> &DynamicValue {
    match node {
        Node::Constant(constant) => &constant.value,
        other => panic!("expected a constant, got {}", other.kind_name()),
    }
}

#[test]
fn operators_over_constant_lists_fold() -> Result<()> {
    let shop = Shop::new();
    let b = &shop.builder;
    let numbers = b.list(
        &TypeDescriptor::int(),
        vec![b.constant(1i64)?, b.constant(2i64)?, b.constant(3i64)?],
    )?;
    let above_one = b.enumerable_with("Count", numbers, |b, x| {
        b.binary(BinaryOp::GreaterThan, x, b.constant(1i64)?)
    })?;

    let prepared = shop.engine().prepare(&query(above_one))?;

    assert_eq!(folded(&prepared.root), &DynamicValue::scalar(2i64));
    Ok(())
}

#[test]
fn object_construction_over_constants_folds() -> Result<()> {
    let shop = Shop::new();
    let b = &shop.builder;
    let engine = shop.engine();

    let shape = b.anonymous([
        ("A", b.constant(1i64)?),
        ("B", b.binary(BinaryOp::Add, b.constant(2i64)?, b.constant(3i64)?)?),
    ])?;
    let prepared = engine.prepare(&query(shape))?;
    let value = folded(&prepared.root);
    assert_eq!(value.get("A"), Some(&DynamicValue::scalar(1i64)));
    assert_eq!(value.get("B"), Some(&DynamicValue::scalar(5i64)));

    let fruit = b.member_init(
        &category(),
        [("Id", b.constant(1i64)?), ("Name", b.constant("Fruit")?)],
    )?;
    let prepared = engine.prepare(&query(fruit))?;
    let object = folded(&prepared.root).as_object().expect("an object");
    assert_eq!(object.ty.as_ref().map(TypeDescriptor::without_properties), Some(category()));
    assert_eq!(object.get("Name"), Some(&DynamicValue::scalar("Fruit")));
    Ok(())
}

#[test]
fn folded_sub_trees_inside_lambdas_execute_unchanged() -> Result<()> {
    let shop = Shop::new();
    let expression = shop
        .products()
        .count_where(|b, p| {
            let pair = b.list(&TypeDescriptor::int(), vec![b.constant(1i64)?, b.constant(2i64)?])?;
            b.binary(
                BinaryOp::Equal,
                b.property(&p, "CategoryId")?,
                b.enumerable("Count", pair)?,
            )
        })?;
    let engine = shop.engine();

    let prepared = engine.prepare(&query(expression.clone()))?;
    assert!(!prepared.root.any(|node| matches!(node, Node::ListInit(_))));

    let count = engine.execute(&query(expression), &shop.resources())?;
    assert_eq!(count, DynamicValue::scalar(3i64));
    Ok(())
}

#[test]
fn instances_are_still_built_per_row() -> Result<()> {
    let shop = Shop::new();
    let expression = shop.products().select(|b, _| {
        b.member_init(
            &category(),
            [("Id", b.constant(1i64)?), ("Name", b.constant("Fruit")?)],
        )
    })?;
    let engine = shop.engine();

    let prepared = engine.prepare(&query(expression.clone()))?;
    assert!(prepared.root.any(|node| matches!(node, Node::MemberInit(_))));

    let result = engine.execute(&query(expression), &shop.resources())?;
    let items = &result.as_list().expect("a list").items;
    assert_eq!(items.len(), 5);
    assert!(items.iter().all(|item| item.as_object().is_some()));
    Ok(())
}

#[test]
fn rejected_types_are_left_for_execution_to_report() -> Result<()> {
    let shop = Shop::new();
    let b = &shop.builder;
    let engine = ExecutionEngine::builder()
        .registry(shop.registry.clone())
        .allow_list(AllowList::only([product()]))
        .build();
    let fruit = b.member_init(
        &category(),
        [("Id", b.constant(1i64)?), ("Name", b.constant("Fruit")?)],
    )?;

    let prepared = engine.prepare(&query(fruit.clone()))?;
    assert!(matches!(prepared.root, Node::MemberInit(_)));

    let rejected = engine.execute(&query(fruit), &shop.resources());
    assert!(matches!(rejected, Err(Error::TypeNotAllowed(_))), "{rejected:?}");
    Ok(())
}
