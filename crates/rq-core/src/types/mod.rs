//! Structural type descriptions and their resolution back to runtime types.

mod allow;
mod concrete;
mod descriptor;
mod registry;
mod resolver;

pub use allow::*;
pub use concrete::*;
pub use descriptor::*;
pub use registry::*;
pub use resolver::*;
