//! Tool registry adapter and execution for tandem
//!
//! Bridges the per-server tool registry into the single flat function-calling
//! namespace the model runtime understands, and executes the calls the model
//! requests against the owning live connection.

pub mod connections;
pub mod executor;
pub mod schema;

// Re-export main types
pub use connections::{BoxedServer, ConnectionRegistry, ToolConnections, ToolServer};
pub use executor::ToolExecutor;
pub use schema::{
    decode_tool_name, encode_tool_name, flatten_tools, FlatTool, TOOL_NAME_SEPARATOR,
};
