//! Execution of remote queries.
//!
//! The engine prepares a [`rq_core::Query`], binds its roots through a
//! resource provider, raises it to a native expression and evaluates it
//! with the [`engine::QueryInterpreter`].

pub mod cancel;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fold;
pub mod options;
pub mod provider;

pub use cancel::CancellationSignal;
pub use engine::QueryInterpreter;
pub use fold::InterpretingEvaluator;
pub use executor::{
    ExecuteRequest, ExecutionEngine, ExecutionEngineBuilder, ExecutionResult, ResultMapper,
    ResultMode,
};
pub use options::ExecutionOptions;
pub use provider::{AsyncResourceProvider, InMemoryResources, ResourceProvider};
