use std::sync::Arc;

use anyhow::Context;

use pgrag::agent::{AgentConfig, AgentExecutor, AgentTool};
use pgrag::core::config::Settings;
use pgrag::core::logging::ConsoleTarget;
use pgrag::core::startup;
use pgrag::llm::GeminiChat;
use pgrag::mcp::{McpClient, McpTool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = startup::init("pgrag-agent.log", ConsoleTarget::Stdout)?;

    let client = Arc::new(
        McpClient::spawn(&settings.mcp)
            .await
            .context("failed to start the MCP tool server")?,
    );

    let result = run_agent(&settings, client.clone()).await;
    if let Err(err) = &result {
        tracing::error!("Agent execution error: {:?}", err);
    }

    match Arc::try_unwrap(client) {
        Ok(client) => {
            if let Err(err) = client.close().await {
                tracing::warn!("{}", err);
            }
        }
        Err(_) => tracing::warn!("MCP client still in use, leaving shutdown to drop"),
    }

    result
}

async fn run_agent(settings: &Settings, client: Arc<McpClient>) -> anyhow::Result<()> {
    let available = client.list_tools().await?;
    tracing::info!(
        "Available tools: {:?}",
        available.iter().map(|tool| tool.name.as_str()).collect::<Vec<_>>()
    );

    let tools: Vec<Arc<dyn AgentTool>> = available
        .into_iter()
        .filter(|tool| tool.name == settings.agent.tool_name)
        .map(|tool| {
            tracing::info!("Created tool: {}", tool.name);
            Arc::new(McpTool::new(client.clone(), tool.name, tool.description).with_k(settings.agent.k))
                as Arc<dyn AgentTool>
        })
        .collect();

    if tools.is_empty() {
        tracing::error!("No suitable tools found");
        return Ok(());
    }

    let llm = Arc::new(GeminiChat::new(&settings.llm)?);
    let config = AgentConfig::from_settings(&settings.agent, settings.llm.temperature);
    let agent = AgentExecutor::new(llm, tools, config)?;

    tracing::info!("Running agent with query: {}", settings.agent.query);
    let run = agent.run(&settings.agent.query).await?;
    for step in run.failed_steps() {
        tracing::warn!("Step `{}` failed: {:?}", step.action.tool, step.outcome);
    }

    println!("Agent response:");
    println!("{}", run.output);
    Ok(())
}
