//! Model Context Protocol server for Conclave tools.
//!
//! [`ToolServer`] puts any [`conclave_tools::ToolRegistry`] behind MCP's
//! `tools/list` and `tools/call`. [`documentation_server`] is the package
//! documentation provider the demo workflow's agents can be pointed at.

mod documentation;
mod server;

pub use documentation::{documentation_for, DocumentationTool, DOCUMENTATION_TOOL};
pub use server::{documentation_server, serve_stdio, ToolServer};
