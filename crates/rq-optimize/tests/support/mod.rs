//! Shop types shared by the translation and preparation tests.
#![allow(dead_code)]

use std::sync::Arc;

use rq_core::expr::{ExprBuilder, Queryable};
use rq_core::types::{DefaultTypeResolver, TypeBuilder, TypeDescriptor, TypeRegistry};

pub fn product() -> TypeDescriptor {
    TypeDescriptor::new("shop", "Product")
}

pub struct Fixture {
    pub resolver: Arc<DefaultTypeResolver>,
    pub builder: ExprBuilder,
}

impl Fixture {
    pub fn new() -> Self {
        let registry = Arc::new(TypeRegistry::new());
        registry.register(
            TypeBuilder::class("shop", "Product")
                .member("Id", TypeDescriptor::int())
                .member("Name", TypeDescriptor::string())
                .member("Price", TypeDescriptor::float()),
        );
        let resolver = Arc::new(DefaultTypeResolver::new(registry));
        let builder = ExprBuilder::new(resolver.clone());
        Self { resolver, builder }
    }

    pub fn products(&self) -> Queryable {
        Queryable::resource(&self.builder, &product()).unwrap()
    }
}
