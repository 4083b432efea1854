//! The news crew: three agents (researcher, curator/analyst, editor) run in
//! a fixed linear order, each stage reading the previous stage's output.
//!
//! ```text
//!   news_research_task ──▶ news_curator_analyst_task ──▶ review_and_edit_task
//!   (search_web, scrape)        (analysis)                  (markdown newsletter)
//! ```

mod definition;
mod executor;

pub use definition::{interpolate, AgentSpec, CrewDefinition, CrewError, Stage, TaskSpec};
pub use executor::{CrewOutput, SequentialExecutor, StageOutput};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{CrewConfig, CrewVariant};
use crate::gate::LiveKeys;
use crate::llm::OpenAiClient;
use crate::search::NewsPipeline;
use crate::tools::ToolRegistry;

/// The live pipeline: builds API clients from the gate's keys and runs the crew.
pub struct NewsCrew {
    config: CrewConfig,
    definition: CrewDefinition,
}

impl NewsCrew {
    /// Load the crew definition selected by `config.variant`.
    pub fn new(config: CrewConfig) -> Result<Self, CrewError> {
        let definition = match config.variant {
            CrewVariant::Configured => CrewDefinition::configured(config.config_dir.as_deref())?,
            CrewVariant::Inline => CrewDefinition::inline()?,
        };
        tracing::info!(
            "Crew ready: variant={:?}, stages={}, model={}",
            config.variant,
            definition.stages().len(),
            config.model
        );
        Ok(Self { config, definition })
    }

    pub fn definition(&self) -> &CrewDefinition {
        &self.definition
    }
}

#[async_trait]
impl NewsPipeline for NewsCrew {
    async fn kickoff(&self, keys: &LiveKeys, subject: &str) -> anyhow::Result<String> {
        let llm = Arc::new(OpenAiClient::new(
            keys.openai_api_key.clone(),
            self.config.openai_base_url.clone(),
        ));
        let tools = Arc::new(ToolRegistry::news_tools(
            &keys.serper_api_key,
            &self.config.serper_url,
        ));

        let executor = SequentialExecutor::new(llm, tools, self.config.model.clone())
            .with_max_iterations(self.config.max_iterations)
            .with_output_dir(self.config.output_dir.clone());

        let output = executor.run(&self.definition, subject).await?;
        tracing::info!(
            "Crew finished for '{}': {} stages, {} tool calls, {} tokens",
            subject,
            output.stages.len(),
            output.stages.iter().map(|s| s.tool_calls).sum::<usize>(),
            output.total_tokens()
        );
        Ok(output.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_selects_definition() {
        let configured = NewsCrew::new(CrewConfig::default()).unwrap();
        assert_eq!(configured.definition().stages()[0].name, "news_research_task");

        let inline = NewsCrew::new(CrewConfig {
            variant: CrewVariant::Inline,
            ..CrewConfig::default()
        })
        .unwrap();
        assert_eq!(inline.definition().stages()[0].name, "research_task");
    }

    #[tokio::test]
    async fn unreachable_api_surfaces_as_error() {
        let crew = NewsCrew::new(CrewConfig {
            variant: CrewVariant::Inline,
            openai_base_url: "http://127.0.0.1:9".to_string(),
            ..CrewConfig::default()
        })
        .unwrap();
        let keys = LiveKeys {
            serper_api_key: "s".to_string(),
            openai_api_key: "o".to_string(),
        };
        let err = crew.kickoff(&keys, "climate").await.unwrap_err();
        assert!(format!("{:#}", err).contains("Stage 'research_task' failed"));
    }
}
