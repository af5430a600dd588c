mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rq_core::types::{
    AllowList, DefaultTypeResolver, GuardedResolver, PropertyDescriptor, RemappingStrategy,
    TypeDescriptor,
};
use rq_core::{Error, TypeResolver};

use support::*;

fn anonymous_pair(second: TypeDescriptor) -> TypeDescriptor {
    TypeDescriptor::anonymous([
        PropertyDescriptor::new("Id", TypeDescriptor::int()),
        PropertyDescriptor::new("Item", second),
    ])
}

#[test]
fn anonymous_shapes_are_emitted_once() {
    let resolver = resolver();
    let shape = anonymous_pair(TypeDescriptor::string());

    let first = resolver.resolve(&shape).unwrap();
    let second = resolver.resolve(&shape).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.member("Item").is_some());
}

#[test]
fn emission_can_be_disabled() {
    let resolver = DefaultTypeResolver::new(registry()).with_type_emission(false);

    let err = resolver
        .resolve(&anonymous_pair(TypeDescriptor::string()))
        .unwrap_err();

    assert!(matches!(err, Error::UnresolvedType(_)), "{err:?}");
}

#[test]
fn remapping_resolves_client_shapes_to_server_types() {
    let client = TypeDescriptor::new("client", "ProductDto");
    let resolver = resolver().with_strategy(Arc::new(RemappingStrategy::new().map(&client, product())));

    let resolved = resolver.resolve(&client).unwrap();

    assert_eq!(resolved.descriptor().without_properties(), product());
}

#[test]
fn allow_list_checks_named_types_inside_generic_shapes() {
    let guarded = GuardedResolver::new(Arc::new(resolver()), Some(AllowList::only([product()])));

    assert!(guarded.resolve(&TypeDescriptor::int()).is_ok());
    assert!(guarded.resolve(&TypeDescriptor::seq(product())).is_ok());

    let rejected = guarded.resolve(&TypeDescriptor::queryable(category()));
    assert!(matches!(rejected, Err(Error::TypeNotAllowed(ty)) if ty == category()));

    let smuggled = guarded.resolve(&anonymous_pair(category()));
    assert!(matches!(smuggled, Err(Error::TypeNotAllowed(_))));
}

#[test]
fn unguarded_resolver_allows_every_known_type() {
    let guarded = GuardedResolver::new(Arc::new(resolver()), None);

    assert!(guarded.resolve(&category()).is_ok());
    assert!(guarded.resolve(&node()).is_ok());
}
