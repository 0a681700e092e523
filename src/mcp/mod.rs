//! Model Context Protocol (MCP) server implementation
//!
//! This module provides an MCP server over stdio or the Streamable HTTP
//! transport. The server exposes tools, resources and prompts for a
//! journal of entries and tags.
//!
//! # Architecture
//!
//! - **server**: Per-session MCP server coordinator
//! - **tools**: Separate tool structs per entity
//!   - EntryTools: Manages journal entries
//!   - TagTools: Manages tags
//!   - VideoTools: Renders year-in-review videos
//! - **capabilities**: Which tools/resources/prompts are exposed, derived from entity counts
//! - **subscriptions**: Watched resource URIs and their update notifications
//! - **suggest**: Model-generated tag suggestions
//! - **client**: Outbound notifications and requests to the client
//!
//! Each tool struct is generic over `D: Database` (no dynamic dispatch).

pub mod capabilities;
pub mod client;
pub mod prompts;
pub mod resources;
pub mod server;
pub mod service;
pub mod subscriptions;
pub mod suggest;
pub mod tools;
pub mod uri;

#[cfg(test)]
mod capabilities_test;
#[cfg(test)]
mod prompts_test;

pub use server::McpServer;
pub use service::{ServeError, create_mcp_service, serve_stdio};
