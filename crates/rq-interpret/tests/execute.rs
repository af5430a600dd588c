mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rq_core::expr::methods::{ENUMERABLE, QUERYABLE};
use rq_core::expr::{ExprLambda, ParameterRef};
use rq_core::ops::BinaryOp;
use rq_core::types::AllowList;
use rq_core::value::{NativeValue, Sequence};
use rq_core::{DynamicValue, Error, Expression, Query, Result, Scalar, TypeDescriptor};
use rq_interpret::engine::ResourceRoots;
use rq_interpret::{
    ExecuteRequest, ExecutionEngine, ExecutionResult, InMemoryResources, QueryInterpreter,
    ResourceProvider,
};

use support::*;

fn scalars(value: &DynamicValue) -> Vec<Scalar> {
    value
        .as_list()
        .map(|list| list.items.iter().filter_map(|item| item.as_scalar().cloned()).collect())
        .unwrap_or_default()
}

#[test]
fn groups_filtered_products_into_anonymous_objects() -> Result<()> {
    let shop = Shop::new();
    let expression = shop
        .products()
        .filter(|b, p| b.binary(BinaryOp::GreaterThan, b.property(&p, "Price")?, b.constant(100.0)?))?
        .group_by(|b, p| b.property(&p, "CategoryId"))?
        .select(|b, g| {
            b.anonymous([
                ("Key", b.property(&g, "Key")?),
                ("Products", b.enumerable("ToList", g)?),
            ])
        })?;

    let result = shop.engine().execute(&query(expression), &shop.resources())?;

    let list = result.as_list().expect("a list of groups");
    assert_eq!(list.items.len(), 2);
    let keys: Vec<_> = list
        .items
        .iter()
        .map(|group| group.get("Key").and_then(DynamicValue::as_scalar).cloned())
        .collect();
    assert_eq!(keys, vec![Some(Scalar::Int(1)), Some(Scalar::Int(2))]);
    let sizes: Vec<_> = list
        .items
        .iter()
        .map(|group| {
            group
                .get("Products")
                .and_then(DynamicValue::as_list)
                .map(|products| products.items.len())
        })
        .collect();
    assert_eq!(sizes, vec![Some(1), Some(2)]);

    let first = list.items[0].as_object().expect("an object");
    let anonymous = first.ty.as_ref().expect("emitted type descriptor");
    assert!(!anonymous.properties.is_empty());
    Ok(())
}

#[test]
fn orders_and_pages_through_products() -> Result<()> {
    let shop = Shop::new();
    let expression = shop
        .products()
        .order_by_descending(|b, p| b.property(&p, "Price"))?
        .skip(1)?
        .take(2)?
        .select(|b, p| b.property(&p, "Name"))?;

    let result = shop.engine().execute(&query(expression), &shop.resources())?;

    assert_eq!(
        scalars(&result),
        vec![Scalar::from("Anvil"), Scalar::from("Bolt")]
    );
    Ok(())
}

#[test]
fn aggregates_and_string_methods_evaluate_on_the_host() -> Result<()> {
    let shop = Shop::new();
    let engine = shop.engine();
    let resources = shop.resources();

    let starts_with_a = shop.products().count_where(|b, p| {
        b.call_method(b.property(&p, "Name")?, "StartsWith", vec![b.constant("A")?])
    })?;
    let total = shop.products().sum(|b, p| b.property(&p, "Price"))?;
    let cheapest = shop
        .products()
        .order_by(|b, p| b.property(&p, "Price"))?
        .first()?;

    assert_eq!(
        engine.execute(&query(starts_with_a), &resources)?,
        DynamicValue::scalar(2i64)
    );
    assert_eq!(
        engine.execute(&query(total), &resources)?,
        DynamicValue::scalar(PRICES.iter().sum::<f64>())
    );
    let cheapest = engine.execute(&query(cheapest), &resources)?;
    assert_eq!(cheapest.get("Name"), Some(&DynamicValue::scalar("Apple")));
    Ok(())
}

#[test]
fn member_init_builds_registered_types() -> Result<()> {
    let shop = Shop::new();
    let expression = shop
        .products()
        .filter(|b, p| b.binary(BinaryOp::Equal, b.property(&p, "Id")?, b.constant(3i64)?))?
        .select(|b, p| {
            b.member_init(
                &category(),
                [("Id", b.property(&p, "CategoryId")?), ("Name", b.property(&p, "Name")?)],
            )
        })?;

    let result = shop.engine().execute(&query(expression), &shop.resources())?;

    let list = result.as_list().expect("a list");
    let object = list.items[0].as_object().expect("an object");
    assert_eq!(object.ty.as_ref().map(TypeDescriptor::without_properties), Some(category()));
    assert_eq!(object.get("Id"), Some(&DynamicValue::scalar(2i64)));
    assert_eq!(object.get("Name"), Some(&DynamicValue::scalar("Bench")));
    Ok(())
}

#[test]
fn allow_list_rejects_root_before_any_data_access() {
    let shop = Shop::new();
    let resources = shop.resources();
    let calls = AtomicUsize::new(0);
    let provider = |ty: &TypeDescriptor| -> Result<Sequence> {
        calls.fetch_add(1, Ordering::SeqCst);
        ResourceProvider::provide(&resources, ty)
    };
    let engine = ExecutionEngine::builder()
        .registry(shop.registry.clone())
        .allow_list(AllowList::only([category()]))
        .build();

    let rejected = engine.execute(&query(shop.products().count().unwrap()), &provider);
    assert!(matches!(rejected, Err(Error::TypeNotAllowed(_))), "{rejected:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let names = shop
        .categories()
        .select(|b, c| b.property(&c, "Name"))
        .unwrap();
    let allowed = engine.execute(&query(names), &provider).unwrap();
    assert_eq!(
        scalars(&allowed),
        vec![Scalar::from("Fruit"), Scalar::from("Hardware")]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_resource_is_reported_by_type() {
    let shop = Shop::new();
    let resources = InMemoryResources::new().with(category(), Vec::new());

    let err = shop
        .engine()
        .execute(&query(shop.products().count().unwrap()), &resources)
        .unwrap_err();

    match err {
        Error::UnresolvedResource(ty) => assert_eq!(ty, product()),
        other => panic!("expected UnresolvedResource, got {other:?}"),
    }
}

#[test]
fn evaluation_failures_carry_the_host_error_kind() {
    let shop = Shop::new();
    let expression = shop
        .products()
        .select(|b, p| b.binary(BinaryOp::Divide, b.property(&p, "Id")?, b.constant(0i64)?))
        .unwrap();

    let err = shop
        .engine()
        .execute(&query(expression), &shop.resources())
        .unwrap_err();

    match err {
        Error::ExecutionFailed { kind, .. } => assert_eq!(kind, "DivideByZero"),
        other => panic!("expected ExecutionFailed, got {other:?}"),
    }
}

#[test]
fn raw_mode_and_custom_mappers_replace_default_mapping() -> Result<()> {
    let shop = Shop::new();
    let engine = shop.engine();
    let resources = shop.resources();
    let count = query(shop.products().count()?);

    let raw = engine.execute_with(&count, &resources, ExecuteRequest::raw())?;
    assert!(matches!(raw, ExecutionResult::Raw(NativeValue::Scalar(Scalar::Int(5)))));

    let names = query(shop.products().select(|b, p| b.property(&p, "Name"))?);
    let request = ExecuteRequest::new().with_mapper(Arc::new(|value: &NativeValue| -> Result<DynamicValue> {
        let joined = value
            .as_items()
            .unwrap_or_default()
            .iter()
            .filter_map(|item| match item {
                NativeValue::Scalar(Scalar::String(name)) => Some(name.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(",");
        Ok(DynamicValue::scalar(joined))
    }));
    let mapped = engine
        .execute_with(&names, &resources, request)?
        .into_mapped();
    assert_eq!(
        mapped,
        Some(DynamicValue::scalar("Apple,Anvil,Bench,Bolt,Cable"))
    );
    Ok(())
}

fn above_threshold(shop: &Shop, threshold: f64) -> Result<Query> {
    let cell = shop
        .builder
        .capture("threshold", &TypeDescriptor::float(), NativeValue::float(threshold))?;
    let expression = shop.products().count_where(|b, p| {
        b.binary(BinaryOp::GreaterThan, b.property(&p, "Price")?, Expression::from(cell))
    })?;
    Ok(query(expression))
}

#[test]
fn request_arguments_override_captured_values() -> Result<()> {
    let shop = Shop::new();
    let engine = shop.engine();
    let resources = shop.resources();
    let query = above_threshold(&shop, 100.0)?;

    assert_eq!(engine.execute(&query, &resources)?, DynamicValue::scalar(3i64));

    let request = ExecuteRequest::new().with_argument("threshold", DynamicValue::scalar(1000.0));
    let overridden = engine.execute_with(&query, &resources, request)?.into_mapped();
    assert_eq!(overridden, Some(DynamicValue::scalar(0i64)));
    Ok(())
}

#[test]
fn decoded_wire_form_executes_like_the_sent_query() -> Result<()> {
    let shop = Shop::new();
    let sent = above_threshold(&shop, 60.0)?;

    let received = Query::from_json(&sent.to_json()?)?;

    let engine = shop.engine();
    let resources = shop.resources();
    assert_eq!(
        engine.execute(&received, &resources)?,
        engine.execute(&sent, &resources)?
    );
    Ok(())
}

#[test]
fn concurrent_executions_are_independent() {
    let shop = Shop::new();
    let engine = shop.engine();
    let resources = shop.resources();
    let cases: Vec<(Query, i64)> = (0..100)
        .map(|index| {
            let threshold = (index % 5) as f64 * 50.0;
            let expected = PRICES.iter().filter(|price| **price > threshold).count() as i64;
            (above_threshold(&shop, threshold).unwrap(), expected)
        })
        .collect();

    let results: Vec<(DynamicValue, i64)> = std::thread::scope(|scope| {
        let handles: Vec<_> = cases
            .iter()
            .map(|(query, expected)| {
                let engine = &engine;
                let resources = &resources;
                scope.spawn(move || (engine.execute(query, resources).unwrap(), *expected))
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    for (actual, expected) in results {
        assert_eq!(actual, DynamicValue::scalar(expected));
    }
}

/// `products.Count(v => new[] { 2 }.Any(v => v == outer.CategoryId))`, with
/// both lambdas declaring a parameter literally named `v`.
fn shadowing_count(shop: &Shop) -> Result<Expression> {
    let b = &shop.builder;
    let outer = ParameterRef::new("v", shop.product_type.clone());
    let inner = ParameterRef::new("v", b.resolve(&TypeDescriptor::int())?);
    let matches = b.binary(
        BinaryOp::Equal,
        Expression::Parameter(inner.clone()),
        b.property(&Expression::Parameter(outer.clone()), "CategoryId")?,
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
        "Count",
        vec![
            shop.products().into_expression(),
            ExprLambda {
                parameters: vec![outer],
                body: Box::new(any),
            }
            .into(),
        ],
    )
}

#[test]
fn nested_parameters_with_one_name_bind_by_identity() -> Result<()> {
    let shop = Shop::new();
    let expression = shadowing_count(&shop)?;
    let mut roots = ResourceRoots::new();
    roots.insert(product(), Sequence::new(product(), shop.product_rows()));

    let direct = QueryInterpreter::new(&roots).evaluate(&expression)?;
    assert!(direct.same(&NativeValue::int(3)));

    let raised = rq_optimize::to_native(
        &rq_optimize::to_ast(&expression)?,
        shop.builder.resolver().as_ref(),
    )?;
    let round_tripped = QueryInterpreter::new(&roots).evaluate(&raised)?;
    assert!(round_tripped.same(&NativeValue::int(3)));

    let executed = shop.engine().execute(&query(expression), &shop.resources())?;
    assert_eq!(executed, DynamicValue::scalar(3i64));
    Ok(())
}
