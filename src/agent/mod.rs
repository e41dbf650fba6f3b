//! Single-turn ReAct agent.
//!
//! The executor alternates model completions and tool invocations until the model produces a
//! final answer or the iteration cap is reached.

mod executor;
mod react;
mod tool;

pub use executor::{AgentAction, AgentConfig, AgentExecutor, AgentRun, AgentStep, EarlyStopping};
pub use react::{ReactDecision, ReactParseError, ReactParser};
pub use tool::{AgentTool, ToolOutcome};
