pub mod agent;
pub mod core;
pub mod embedding;
pub mod llm;
pub mod mcp;
pub mod rag;
pub mod store;
