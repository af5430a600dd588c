//! Shared shop fixture for engine tests: two entity types, five products in
//! two categories and a client-side expression builder.
#![allow(dead_code)]

use std::sync::Arc;

use rq_core::expr::{ExprBuilder, Queryable};
use rq_core::types::{DefaultTypeResolver, TypeBuilder, TypeDescriptor, TypeRef, TypeRegistry};
use rq_core::value::{NativeValue, ObjectRef};
use rq_core::{Expression, Query};
use rq_interpret::{ExecutionEngine, InMemoryResources};

pub const PRICES: [f64; 5] = [50.0, 150.0, 200.0, 120.0, 80.0];

pub fn product() -> TypeDescriptor {
    TypeDescriptor::new("shop", "Product")
}

pub fn category() -> TypeDescriptor {
    TypeDescriptor::new("shop", "Category")
}

pub struct Shop {
    pub registry: Arc<TypeRegistry>,
    pub builder: ExprBuilder,
    pub product_type: TypeRef,
    pub category_type: TypeRef,
}

impl Shop {
    pub fn new() -> Self {
        let registry = Arc::new(TypeRegistry::new());
        let product_type = registry.register(
            TypeBuilder::class("shop", "Product")
                .member("Id", TypeDescriptor::int())
                .member("Name", TypeDescriptor::string())
                .member("Price", TypeDescriptor::float())
                .member("CategoryId", TypeDescriptor::int()),
        );
        let category_type = registry.register(
            TypeBuilder::class("shop", "Category")
                .member("Id", TypeDescriptor::int())
                .member("Name", TypeDescriptor::string()),
        );
        let resolver = Arc::new(DefaultTypeResolver::new(registry.clone()));
        Self {
            registry,
            builder: ExprBuilder::new(resolver),
            product_type,
            category_type,
        }
    }

    pub fn engine(&self) -> ExecutionEngine {
        ExecutionEngine::builder()
            .registry(self.registry.clone())
            .build()
    }

    pub fn products(&self) -> Queryable {
        Queryable::resource(&self.builder, &product()).unwrap()
    }

    pub fn categories(&self) -> Queryable {
        Queryable::resource(&self.builder, &category()).unwrap()
    }

    pub fn product(&self, id: i64, name: &str, price: f64, category_id: i64) -> NativeValue {
        ObjectRef::with_values(
            self.product_type.clone(),
            [
                ("Id", NativeValue::int(id)),
                ("Name", NativeValue::string(name)),
                ("Price", NativeValue::float(price)),
                ("CategoryId", NativeValue::int(category_id)),
            ],
        )
        .unwrap()
        .into()
    }

    pub fn category(&self, id: i64, name: &str) -> NativeValue {
        ObjectRef::with_values(
            self.category_type.clone(),
            [("Id", NativeValue::int(id)), ("Name", NativeValue::string(name))],
        )
        .unwrap()
        .into()
    }

    pub fn product_rows(&self) -> Vec<NativeValue> {
        let names = ["Apple", "Anvil", "Bench", "Bolt", "Cable"];
        let categories = [1, 1, 2, 2, 2];
        (0..5)
            .map(|index| {
                self.product(index as i64 + 1, names[index], PRICES[index], categories[index])
            })
            .collect()
    }

    pub fn resources(&self) -> InMemoryResources {
        InMemoryResources::new()
            .with(product(), self.product_rows())
            .with(
                category(),
                vec![self.category(1, "Fruit"), self.category(2, "Hardware")],
            )
    }
}

pub fn query(expression: impl Into<Expression>) -> Query {
    rq_optimize::to_query(&expression.into()).unwrap()
}
