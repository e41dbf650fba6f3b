// ReAct prompt and output parsing

use regex::Regex;
use thiserror::Error;

use super::tool::AgentTool;
use crate::core::errors::RagError;

pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
pub const OBSERVATION_STOP: &str = "\nObservation:";

#[derive(Debug, Clone, PartialEq)]
pub enum ReactDecision {
    Action { tool: String, input: String },
    Finish { output: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactParseError {
    #[error("Invalid Format: Missing 'Action:' after 'Thought:'")]
    MissingAction,
    #[error("Invalid Format: Missing 'Action Input:' after 'Action:'")]
    MissingActionInput,
    #[error("Parsing LLM output produced both a final answer and a parse-able action")]
    Ambiguous,
}

pub struct ReactParser {
    action: Regex,
    action_only: Regex,
}

impl ReactParser {
    pub fn new() -> Result<Self, RagError> {
        Ok(Self {
            action: Regex::new(
                r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)",
            )
            .map_err(RagError::internal)?,
            action_only: Regex::new(r"(?s)Action\s*\d*\s*:[\s]*\S").map_err(RagError::internal)?,
        })
    }

    pub fn parse(&self, text: &str) -> Result<ReactDecision, ReactParseError> {
        let has_final = text.contains(FINAL_ANSWER_MARKER);

        if let Some(captures) = self.action.captures(text) {
            if has_final {
                return Err(ReactParseError::Ambiguous);
            }
            let tool = captures
                .get(1)
                .map(|m| m.as_str().trim())
                .unwrap_or_default()
                .to_string();
            let raw_input = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
            let raw_input = raw_input
                .split(OBSERVATION_STOP)
                .next()
                .unwrap_or(raw_input);
            let input = raw_input.trim().trim_matches('"').to_string();
            return Ok(ReactDecision::Action { tool, input });
        }

        if let Some(idx) = text.find(FINAL_ANSWER_MARKER) {
            let output = text[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string();
            return Ok(ReactDecision::Finish { output });
        }

        if !self.action_only.is_match(text) {
            return Err(ReactParseError::MissingAction);
        }
        Err(ReactParseError::MissingActionInput)
    }
}

pub fn build_instructions(tools: &[std::sync::Arc<dyn AgentTool>]) -> String {
    let descriptions = tools
        .iter()
        .map(|tool| format!("{}: {}", tool.name(), tool.description()))
        .collect::<Vec<_>>()
        .join("\n");
    let names = tool_names(tools);

    format!(
        r#"Answer the following questions as best you can. You have access to the following tools:

{descriptions}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question"#
    )
}

pub fn build_turn(input: &str, scratchpad: &str) -> String {
    format!("Begin!\n\nQuestion: {}\nThought:{}", input, scratchpad)
}

pub fn tool_names(tools: &[std::sync::Arc<dyn AgentTool>]) -> String {
    tools
        .iter()
        .map(|tool| tool.name())
        .collect::<Vec<_>>()
        .join(", ")
}
