pub mod gemini;
pub mod provider;
pub mod types;

pub use gemini::GeminiChat;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};
