//! The execution engine: prepare, bind, evaluate, map.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use rq_core::error::{Error, Result};
use rq_core::types::{AllowList, DefaultTypeResolver, GuardedResolver, TypeRegistry, TypeResolver};
use rq_core::value::{DynamicValue, DynamicValueMapper, NativeValue};
use rq_core::{Expression, Query, TypeDescriptor};
use rq_optimize::transformations::ast_to_native::NativeGenerator;
use rq_optimize::Preparer;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::cancel::CancellationSignal;
use crate::engine::{QueryInterpreter, ResourceRoots};
use crate::error::generic_error;
use crate::fold::InterpretingEvaluator;
use crate::options::ExecutionOptions;
use crate::provider::{AsyncResourceProvider, ResourceProvider};

/// Shape of an execution's result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultMode {
    /// Map through the dynamic value mapper or the request's result mapper.
    #[default]
    Mapped,
    /// Hand back the native value unmapped; the caller owns serialization.
    Raw,
}

/// Replaces the default result mapping for one execution, e.g. to project
/// fields server-side.
pub trait ResultMapper: Send + Sync {
    fn map(&self, value: &NativeValue) -> Result<DynamicValue>;
}

impl<F> ResultMapper for F
where
    F: Fn(&NativeValue) -> Result<DynamicValue> + Send + Sync,
{
    fn map(&self, value: &NativeValue) -> Result<DynamicValue> {
        self(value)
    }
}

#[derive(Clone, Default)]
pub struct ExecuteRequest {
    pub mode: ResultMode,
    /// Argument values overriding those carried by the query.
    pub arguments: BTreeMap<String, DynamicValue>,
    pub mapper: Option<Arc<dyn ResultMapper>>,
}

impl ExecuteRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw() -> Self {
        Self {
            mode: ResultMode::Raw,
            ..Self::default()
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: DynamicValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn with_mapper(mut self, mapper: Arc<dyn ResultMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }
}

impl Debug for ExecuteRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteRequest")
            .field("mode", &self.mode)
            .field("arguments", &self.arguments)
            .field("mapper", &self.mapper.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Mapped(DynamicValue),
    Raw(NativeValue),
}

impl ExecutionResult {
    pub fn into_mapped(self) -> Option<DynamicValue> {
        match self {
            ExecutionResult::Mapped(value) => Some(value),
            ExecutionResult::Raw(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<NativeValue> {
        match self {
            ExecutionResult::Raw(value) => Some(value),
            ExecutionResult::Mapped(_) => None,
        }
    }
}

/// A query raised to a native expression, with the root types the provider
/// has to supply.
struct Bound {
    expression: Expression,
    roots: Vec<TypeDescriptor>,
}

/// Executes queries against resource providers. Holds only configuration;
/// every call builds and drops its own bindings, so one engine serves any
/// number of concurrent executions.
pub struct ExecutionEngine {
    resolver: GuardedResolver,
    preparer: Preparer,
    mapper: DynamicValueMapper,
    options: ExecutionOptions,
}

impl ExecutionEngine {
    pub fn builder() -> ExecutionEngineBuilder {
        ExecutionEngineBuilder::default()
    }

    /// The resolver every execution goes through, allow-list included.
    pub fn resolver(&self) -> &GuardedResolver {
        &self.resolver
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    pub fn execute(&self, query: &Query, provider: &dyn ResourceProvider) -> Result<DynamicValue> {
        let _span = tracing::debug_span!("rq.execute").entered();
        let value = self.evaluate(query, provider, &BTreeMap::new())?;
        self.map_result(&value, None)
    }

    pub fn execute_with(
        &self,
        query: &Query,
        provider: &dyn ResourceProvider,
        request: ExecuteRequest,
    ) -> Result<ExecutionResult> {
        let _span = tracing::debug_span!("rq.execute", mode = ?request.mode).entered();
        let value = self.evaluate(query, provider, &request.arguments)?;
        self.finish(value, &request)
    }

    pub async fn execute_async(
        &self,
        query: &Query,
        provider: &dyn AsyncResourceProvider,
        cancellation: CancellationSignal,
    ) -> Result<DynamicValue> {
        let value = self
            .evaluate_async(query, provider, &BTreeMap::new(), cancellation)
            .instrument(tracing::debug_span!("rq.execute", asynchronous = true))
            .await?;
        self.map_result(&value, None)
    }

    pub async fn execute_async_with(
        &self,
        query: &Query,
        provider: &dyn AsyncResourceProvider,
        request: ExecuteRequest,
        cancellation: CancellationSignal,
    ) -> Result<ExecutionResult> {
        let value = self
            .evaluate_async(query, provider, &request.arguments, cancellation)
            .instrument(tracing::debug_span!("rq.execute", asynchronous = true, mode = ?request.mode))
            .await?;
        self.finish(value, &request)
    }

    /// Run the preparation pipeline alone. Closed sub-trees fold with the
    /// interpreter's semantics, so the result shows what execution will bind.
    pub fn prepare(&self, query: &Query) -> Result<Query> {
        self.preparer.prepare(query.clone())
    }

    /// Prepare, resolve every root through the guarded resolver and raise the
    /// query to a native expression. A rejected root type fails here, before
    /// any provider is called.
    fn bind(&self, query: &Query, overrides: &BTreeMap<String, DynamicValue>) -> Result<Bound> {
        let query = if self.options.prepare {
            self.prepare(query)?
        } else {
            query.clone()
        };

        let mut roots = Vec::new();
        for descriptor in query.root_types() {
            let resolved = self.resolver.resolve(&descriptor)?;
            let key = resolved.descriptor().without_properties();
            if !roots.contains(&key) {
                roots.push(key);
            }
        }

        let mut arguments = query.arguments;
        arguments.extend(overrides.iter().map(|(name, value)| (name.clone(), value.clone())));
        let expression = NativeGenerator::new(&self.resolver)
            .with_mapper(self.mapper.clone())
            .with_arguments(&arguments)
            .transform_node(&query.root)?;
        Ok(Bound { expression, roots })
    }

    fn evaluate(
        &self,
        query: &Query,
        provider: &dyn ResourceProvider,
        arguments: &BTreeMap<String, DynamicValue>,
    ) -> Result<NativeValue> {
        let bound = self.bind(query, arguments)?;
        let mut roots = ResourceRoots::new();
        for root in bound.roots {
            rq_core::debug!("requesting resource {}", root);
            let sequence = provider.provide(&root)?;
            roots.insert(root, sequence);
        }
        QueryInterpreter::new(&roots)
            .evaluate(&bound.expression)
            .map_err(Error::into_execution_failed)
    }

    async fn evaluate_async(
        &self,
        query: &Query,
        provider: &dyn AsyncResourceProvider,
        arguments: &BTreeMap<String, DynamicValue>,
        cancellation: CancellationSignal,
    ) -> Result<NativeValue> {
        cancellation.check()?;
        let bound = self.bind(query, arguments)?;
        let mut roots = ResourceRoots::new();
        for root in bound.roots {
            rq_core::debug!("requesting resource {}", root);
            let sequence = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(Error::Cancelled),
                provided = provider.provide(&root) => provided?,
            };
            roots.insert(root, sequence);
        }

        let signal = cancellation.clone();
        let expression = bound.expression;
        let evaluation = tokio::task::spawn_blocking(move || {
            QueryInterpreter::new(&roots)
                .with_cancellation(&signal)
                .evaluate(&expression)
        });
        let evaluated = tokio::select! {
            biased;
            _ = cancellation.cancelled() => return Err(Error::Cancelled),
            joined = evaluation => joined.map_err(generic_error)?,
        };
        evaluated.map_err(Error::into_execution_failed)
    }

    fn finish(&self, value: NativeValue, request: &ExecuteRequest) -> Result<ExecutionResult> {
        match request.mode {
            ResultMode::Raw => Ok(ExecutionResult::Raw(value)),
            ResultMode::Mapped => Ok(ExecutionResult::Mapped(
                self.map_result(&value, request.mapper.as_deref())?,
            )),
        }
    }

    fn map_result(&self, value: &NativeValue, mapper: Option<&dyn ResultMapper>) -> Result<DynamicValue> {
        match mapper {
            Some(mapper) => mapper.map(value),
            None => self.mapper.to_dynamic(value),
        }
    }
}

#[derive(Default)]
pub struct ExecutionEngineBuilder {
    registry: Option<Arc<TypeRegistry>>,
    resolver: Option<Arc<dyn TypeResolver>>,
    allow: Option<AllowList>,
    mapper: Option<DynamicValueMapper>,
    options: ExecutionOptions,
}

impl ExecutionEngineBuilder {
    /// Resolve against `registry` with the default strategy.
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use a custom resolver; takes precedence over [`Self::registry`].
    pub fn resolver(mut self, resolver: Arc<dyn TypeResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn allow_list(mut self, allow: AllowList) -> Self {
        self.allow = Some(allow);
        self
    }

    pub fn mapper(mut self, mapper: DynamicValueMapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> ExecutionEngine {
        let options = self.options;
        let resolver = self.resolver.unwrap_or_else(|| {
            let registry = self.registry.unwrap_or_default();
            Arc::new(DefaultTypeResolver::new(registry).with_type_emission(options.emit_types))
        });
        let mapper = self
            .mapper
            .unwrap_or_else(|| DynamicValueMapper::new().strict(options.strict_mapping));
        let resolver = GuardedResolver::new(resolver, self.allow);
        let evaluator = InterpretingEvaluator::new(resolver.clone(), mapper.clone());
        ExecutionEngine {
            preparer: Preparer::with_evaluator(options.pipeline_options(), Arc::new(evaluator)),
            resolver,
            mapper,
            options,
        }
    }
}
