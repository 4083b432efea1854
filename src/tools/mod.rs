//! Tools the pipeline's agents can call.
//!
//! Tools are exposed to the LLM as function definitions; the executor runs
//! the requested calls and feeds the results back into the conversation.

mod search;
mod web;

pub use search::SerperSearch;
pub use web::ScrapeWebsite;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{FunctionDefinition, ToolDefinition};

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry (no built-in tools).
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry with the web tools used by the news researcher.
    pub fn news_tools(serper_api_key: &str, serper_url: &str) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(SerperSearch::new(
            serper_api_key.to_string(),
            serper_url.to_string(),
        )));
        registry.register(Arc::new(ScrapeWebsite::new()));
        tracing::debug!("Tool registry ready with {} tools", registry.tools.len());
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Schemas for the named tools, in the order given. Unknown names are skipped.
    pub fn schemas_for(&self, names: &[String]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    /// Execute a tool by name.
    pub async fn execute(&self, name: &str, args: Value) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tool.execute(args).await
    }
}

/// Largest byte index `<= max` that falls on a char boundary of `s`.
pub fn safe_truncate_index(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
