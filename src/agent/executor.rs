// Agent Executor
// ReAct loop for tool-using agents

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::react::{
    build_instructions, build_turn, tool_names, ReactDecision, ReactParser, OBSERVATION_STOP,
};
use super::tool::{AgentTool, ToolOutcome};
use crate::core::config::AgentSettings;
use crate::core::errors::RagError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";
const FINAL_ANSWER_NUDGE: &str =
    "\n\nI now need to return a final answer based on the previous steps:";
const PARSE_ERROR_TOOL: &str = "_Exception";

/// What to do once `max_iterations` is exhausted without a final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarlyStopping {
    /// Return a fixed message.
    Force,
    /// Ask the model once more for a final answer based on the steps so far.
    Generate,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_iterations: usize,
    pub early_stopping: EarlyStopping,
    pub handle_parsing_errors: bool,
    pub temperature: Option<f64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            early_stopping: EarlyStopping::Generate,
            handle_parsing_errors: true,
            temperature: Some(0.0),
        }
    }
}

impl AgentConfig {
    pub fn from_settings(settings: &AgentSettings, temperature: f64) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            early_stopping: settings.early_stopping,
            handle_parsing_errors: settings.handle_parsing_errors,
            temperature: Some(temperature),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentAction {
    pub tool: String,
    pub input: String,
    /// Raw model output that produced this action.
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    pub action: AgentAction,
    pub outcome: ToolOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    pub output: String,
    pub steps: Vec<AgentStep>,
    /// True when the iteration cap ended the run.
    pub stopped_early: bool,
}

impl AgentRun {
    pub fn failed_steps(&self) -> impl Iterator<Item = &AgentStep> {
        self.steps.iter().filter(|step| !step.outcome.is_success())
    }
}

pub struct AgentExecutor {
    llm: Arc<dyn LlmProvider>,
    tools: Vec<Arc<dyn AgentTool>>,
    config: AgentConfig,
    parser: ReactParser,
}

impl AgentExecutor {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Vec<Arc<dyn AgentTool>>,
        config: AgentConfig,
    ) -> Result<Self, RagError> {
        if tools.is_empty() {
            return Err(RagError::Agent("agent needs at least one tool".to_string()));
        }
        if config.max_iterations == 0 {
            return Err(RagError::Agent("max_iterations must be at least 1".to_string()));
        }

        Ok(Self {
            llm,
            tools,
            config,
            parser: ReactParser::new()?,
        })
    }

    pub async fn run(&self, input: &str) -> Result<AgentRun, RagError> {
        let instructions = build_instructions(&self.tools);
        let mut scratchpad = String::new();
        let mut steps = Vec::new();

        for step in 0..self.config.max_iterations {
            tracing::info!(
                "Reasoning step {}/{}",
                step + 1,
                self.config.max_iterations
            );

            let completion = self.complete(&instructions, input, &scratchpad).await?;

            match self.parser.parse(&completion) {
                Ok(ReactDecision::Finish { output }) => {
                    tracing::info!("Agent produced a final answer");
                    return Ok(AgentRun {
                        output,
                        steps,
                        stopped_early: false,
                    });
                }
                Ok(ReactDecision::Action { tool, input: tool_input }) => {
                    let outcome = self.execute(&tool, &tool_input).await;
                    append_observation(&mut scratchpad, &completion, &outcome.observation(&tool));
                    steps.push(AgentStep {
                        action: AgentAction {
                            tool,
                            input: tool_input,
                            log: completion,
                        },
                        outcome,
                    });
                }
                Err(err) => {
                    if !self.config.handle_parsing_errors {
                        return Err(RagError::Agent(format!(
                            "could not parse model output `{}`: {}",
                            completion.trim(),
                            err
                        )));
                    }
                    tracing::warn!("Unparseable model output, asking again: {}", err);
                    let outcome = ToolOutcome::Failure(err.to_string());
                    append_observation(&mut scratchpad, &completion, &err.to_string());
                    steps.push(AgentStep {
                        action: AgentAction {
                            tool: PARSE_ERROR_TOOL.to_string(),
                            input: completion.clone(),
                            log: completion,
                        },
                        outcome,
                    });
                }
            }
        }

        tracing::warn!(
            "Agent reached the maximum of {} iterations without a final answer",
            self.config.max_iterations
        );

        let output = match self.config.early_stopping {
            EarlyStopping::Force => ITERATION_LIMIT_MESSAGE.to_string(),
            EarlyStopping::Generate => {
                scratchpad.push_str(FINAL_ANSWER_NUDGE);
                let completion = self.complete(&instructions, input, &scratchpad).await?;
                match self.parser.parse(&completion) {
                    Ok(ReactDecision::Finish { output }) => output,
                    _ => completion.trim().to_string(),
                }
            }
        };

        Ok(AgentRun {
            output,
            steps,
            stopped_early: true,
        })
    }

    async fn complete(
        &self,
        instructions: &str,
        input: &str,
        scratchpad: &str,
    ) -> Result<String, RagError> {
        let mut request = ChatRequest::new(vec![
            ChatMessage::system(instructions),
            ChatMessage::user(build_turn(input, scratchpad)),
        ])
        .with_stop(vec![OBSERVATION_STOP.to_string(), "\n\tObservation:".to_string()]);
        request.temperature = self.config.temperature;

        self.llm.chat(request).await
    }

    async fn execute(&self, tool_name: &str, tool_input: &str) -> ToolOutcome {
        let Some(tool) = self.tools.iter().find(|tool| tool.name() == tool_name) else {
            tracing::warn!("Model requested unknown tool `{}`", tool_name);
            return ToolOutcome::Failure(format!(
                "{} is not a valid tool, try one of [{}].",
                tool_name,
                tool_names(&self.tools)
            ));
        };

        tracing::info!("Executing tool `{}`", tool_name);
        let outcome = tool.invoke(tool_input).await;
        if !outcome.is_success() {
            tracing::warn!("Tool `{}` reported a failure", tool_name);
        }
        outcome
    }
}

fn append_observation(scratchpad: &mut String, completion: &str, observation: &str) {
    scratchpad.push_str(completion);
    scratchpad.push_str("\nObservation: ");
    scratchpad.push_str(observation);
    scratchpad.push_str("\nThought: ");
}
