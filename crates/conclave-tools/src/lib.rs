pub mod builtin;
pub mod dispatch;
pub mod registry;

pub use dispatch::{ActionDispatcher, Observation};
pub use registry::ToolRegistry;
