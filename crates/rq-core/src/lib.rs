//! RemoteQuery core data model.
//!
//! Holds everything both ends of a remote query share: structural type
//! descriptors and their resolution, the dynamic value graph and its mapper,
//! the serializable query AST and the host-side native expression model.

#[macro_use]
pub mod macros;

pub mod ast;
pub mod config;
pub mod error;
pub mod expr;
pub mod ops;
pub mod pretty;
pub mod types;
pub mod value;

// Re-export commonly used items for convenience
pub use eyre;
pub use tracing;

pub use ast::{Node, Query};
pub use expr::Expression;
pub use types::{TypeDescriptor, TypeRef, TypeResolver};
pub use value::{DynamicValue, NativeValue, Scalar};

// Alias for error types
pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
