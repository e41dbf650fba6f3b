use async_trait::async_trait;
use serde::Serialize;

/// Result of a tool invocation as seen by the agent.
///
/// Failures stay failures: they are reported to the model as such and recorded in the run
/// trace, never passed off as ordinary tool output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(String),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    /// Observation text handed back to the model.
    pub fn observation(&self, tool_name: &str) -> String {
        match self {
            ToolOutcome::Success(output) => output.clone(),
            ToolOutcome::Failure(error) => format!("Tool `{}` failed: {}", tool_name, error),
        }
    }
}

#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    async fn invoke(&self, input: &str) -> ToolOutcome;
}
