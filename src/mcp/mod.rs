pub mod bridge;
pub mod client;
pub mod server;

pub use bridge::{McpTool, RemoteToolOutput, ToolTransport};
pub use client::{McpClient, ToolDescriptor};
pub use server::{serve_stdio, RagToolServer};
