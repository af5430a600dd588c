//! Serializable query-expression tree.

mod node;
mod pretty;
mod query;
mod visit;

pub use node::*;
pub use query::*;
