// rq-optimize: translation between native expressions and the query AST,
// and the passes that prepare a query for execution.
//
// Architecture:
// - transformations: native tree <-> wire AST
// - passes: focused `Query -> Query` rewrites implementing QueryPass
// - prepare: the ordered preparation pipeline built from the passes

pub mod passes;
pub mod prepare;
pub mod transformations;

pub use prepare::{prepare, Preparer};
pub use transformations::{to_ast, to_native, to_native_with_arguments, to_query};
