//! Values: scalars, host runtime values and the dynamic value graph.

mod dynamic;
mod mapper;
mod native;
mod scalar;

pub use dynamic::*;
pub use mapper::*;
pub use native::*;
pub use scalar::*;
