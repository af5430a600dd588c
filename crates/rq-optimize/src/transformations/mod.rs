pub mod ast_to_native;
pub mod native_to_ast;

pub use ast_to_native::*;
pub use native_to_ast::*;
