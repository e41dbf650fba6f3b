//! Retrieval pipeline: embed text, store it, and fetch the nearest stored documents.

mod service;

pub use service::{join_contents, RagService};
