//! Where query roots get their data.
//!
//! A provider maps the element type of a `Resource` root to the sequence it
//! stands for. Unknown types must fail with `UnresolvedResource` rather than
//! yield an empty sequence.

use async_trait::async_trait;
use dashmap::DashMap;
use rq_core::error::{Error, Result};
use rq_core::types::TypeDescriptor;
use rq_core::value::{NativeValue, Sequence};

pub trait ResourceProvider: Send + Sync {
    fn provide(&self, element_type: &TypeDescriptor) -> Result<Sequence>;
}

impl<F> ResourceProvider for F
where
    F: Fn(&TypeDescriptor) -> Result<Sequence> + Send + Sync,
{
    fn provide(&self, element_type: &TypeDescriptor) -> Result<Sequence> {
        self(element_type)
    }
}

/// Provider that may suspend while materializing, e.g. on I/O. The engine
/// races it against the execution's cancellation signal.
#[async_trait]
pub trait AsyncResourceProvider: Send + Sync {
    async fn provide(&self, element_type: &TypeDescriptor) -> Result<Sequence>;
}

/// Explicitly owned in-memory store. Construct one at setup and hand it to
/// the engine; nothing is global.
#[derive(Debug, Default)]
pub struct InMemoryResources {
    sequences: DashMap<TypeDescriptor, Sequence>,
}

impl InMemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sequence served for `element_type`.
    pub fn insert(&self, element_type: TypeDescriptor, items: Vec<NativeValue>) {
        let key = element_type.without_properties();
        self.sequences
            .insert(key.clone(), Sequence::new(key, items));
    }

    pub fn with(self, element_type: TypeDescriptor, items: Vec<NativeValue>) -> Self {
        self.insert(element_type, items);
        self
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    fn lookup(&self, element_type: &TypeDescriptor) -> Result<Sequence> {
        let key = element_type.without_properties();
        self.sequences
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or(Error::UnresolvedResource(key))
    }
}

impl ResourceProvider for InMemoryResources {
    fn provide(&self, element_type: &TypeDescriptor) -> Result<Sequence> {
        self.lookup(element_type)
    }
}

#[async_trait]
impl AsyncResourceProvider for InMemoryResources {
    async fn provide(&self, element_type: &TypeDescriptor) -> Result<Sequence> {
        self.lookup(element_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_is_not_an_empty_sequence() {
        let store = InMemoryResources::new().with(TypeDescriptor::int(), vec![NativeValue::int(1)]);
        assert_eq!(ResourceProvider::provide(&store, &TypeDescriptor::int()).unwrap().len(), 1);
        let err = ResourceProvider::provide(&store, &TypeDescriptor::string()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedResource(ty) if ty == TypeDescriptor::string()));
    }

    #[test]
    fn closures_are_providers() {
        let provider = |ty: &TypeDescriptor| -> Result<Sequence> { Ok(Sequence::empty(ty.clone())) };
        let sequence = provider.provide(&TypeDescriptor::int()).unwrap();
        assert!(sequence.is_empty());
    }
}
