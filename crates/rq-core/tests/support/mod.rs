#![allow(dead_code)]

use std::sync::Arc;

use rq_core::types::{DefaultTypeResolver, TypeBuilder, TypeDescriptor, TypeRef, TypeRegistry};

pub fn node() -> TypeDescriptor {
    TypeDescriptor::new("graph", "Node")
}

pub fn product() -> TypeDescriptor {
    TypeDescriptor::new("shop", "Product")
}

pub fn category() -> TypeDescriptor {
    TypeDescriptor::new("shop", "Category")
}

/// A registry with a self-referencing `graph.Node` and two shop types.
pub fn registry() -> Arc<TypeRegistry> {
    let registry = Arc::new(TypeRegistry::new());
    registry.register(
        TypeBuilder::class("graph", "Node")
            .member("Name", TypeDescriptor::string())
            .member("Next", node())
            .member("Prev", node()),
    );
    registry.register(
        TypeBuilder::class("shop", "Product")
            .member("Id", TypeDescriptor::int())
            .member("Name", TypeDescriptor::string()),
    );
    registry.register(
        TypeBuilder::class("shop", "Category")
            .member("Id", TypeDescriptor::int())
            .member("Name", TypeDescriptor::string()),
    );
    registry
}

pub fn resolver() -> DefaultTypeResolver {
    DefaultTypeResolver::new(registry()).with_type_emission(true)
}

pub fn node_type(resolver: &DefaultTypeResolver) -> TypeRef {
    use rq_core::TypeResolver;
    resolver.resolve(&node()).unwrap()
}
