//! Runs a [`CrewDefinition`] stage by stage, handing each stage the outputs
//! of the tasks it lists as context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tempfile::TempDir;

use super::definition::{interpolate, AgentSpec, CrewDefinition, Stage, TaskSpec};
use crate::llm::{ChatMessage, LlmClient, Role, TokenUsage, ToolCall};
use crate::tools::ToolRegistry;

/// Output of one stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub name: String,
    pub output: String,
    pub tool_calls: usize,
    /// Summed over every LLM call the stage made; `None` if the provider
    /// reported no usage.
    pub usage: Option<TokenUsage>,
}

/// Output of a whole run. `result` is the last stage's output.
#[derive(Debug, Clone)]
pub struct CrewOutput {
    pub stages: Vec<StageOutput>,
    pub result: String,
}

impl CrewOutput {
    /// Tokens used by all stages together.
    pub fn total_tokens(&self) -> u64 {
        self.stages
            .iter()
            .filter_map(|s| s.usage.as_ref())
            .map(|u| u.total_tokens)
            .sum()
    }
}

/// Executes stages in order with an LLM/tool loop per stage.
pub struct SequentialExecutor {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    model: String,
    max_iterations: usize,
    output_dir: Option<PathBuf>,
}

impl SequentialExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        Self {
            llm,
            tools,
            model: model.into(),
            max_iterations: 8,
            output_dir: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Write each stage's `output_file` into a fresh `run-*` directory under
    /// `dir`. The directory is removed when the run ends.
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    /// Run every stage for `topic`.
    pub async fn run(&self, crew: &CrewDefinition, topic: &str) -> anyhow::Result<CrewOutput> {
        crew.check_tools(|name| self.tools.has_tool(name))?;

        let run_dir = match &self.output_dir {
            Some(dir) => Some(create_run_dir(dir)?),
            None => None,
        };

        let mut stages: Vec<StageOutput> = Vec::with_capacity(crew.stages().len());
        let mut last_file: Option<PathBuf> = None;

        for (index, stage) in crew.stages().iter().enumerate() {
            tracing::info!(
                "Stage {}/{} '{}' started (agent: {})",
                index + 1,
                crew.stages().len(),
                stage.name,
                stage.agent_name
            );

            let context: Vec<(&str, &str)> = stage
                .task
                .context
                .iter()
                .filter_map(|name| {
                    stages
                        .iter()
                        .find(|s| &s.name == name)
                        .map(|s| (s.name.as_str(), s.output.as_str()))
                })
                .collect();

            let output = self
                .run_stage(stage, topic, &context)
                .await
                .with_context(|| format!("Stage '{}' failed", stage.name))?;

            tracing::info!(
                "Stage '{}' finished ({} chars, {} tool calls, {} tokens)",
                stage.name,
                output.output.len(),
                output.tool_calls,
                output.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0)
            );

            last_file = match &run_dir {
                Some(dir) => write_output(dir.path(), stage, &output.output).await?,
                None => None,
            };
            stages.push(output);
        }

        let Some(last) = stages.last() else {
            anyhow::bail!("Crew produced no output");
        };
        let result = match &last_file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))
                .unwrap_or_else(|e| {
                    tracing::warn!("{:#}; using in-memory output", e);
                    last.output.clone()
                }),
            None => last.output.clone(),
        };

        if let Some(dir) = run_dir {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }

        Ok(CrewOutput { stages, result })
    }

    /// Run one stage's LLM/tool loop until the agent gives a final answer.
    async fn run_stage(
        &self,
        stage: &Stage,
        topic: &str,
        context: &[(&str, &str)],
    ) -> anyhow::Result<StageOutput> {
        let mut messages = vec![
            ChatMessage::new(Role::System, build_system_prompt(&stage.agent, topic)),
            ChatMessage::new(Role::User, build_task_prompt(&stage.task, topic, context)),
        ];
        let tool_schemas = self.tools.schemas_for(&stage.agent.tools);
        let mut tool_calls_made = 0;
        let mut usage: Option<TokenUsage> = None;

        for iteration in 0..self.max_iterations {
            tracing::debug!("Stage '{}' iteration {}", stage.name, iteration + 1);

            let response = self
                .llm
                .chat_completion(&self.model, &messages, Some(&tool_schemas))
                .await?;

            tracing::debug!(
                "Stage '{}' reply: model={}, finish_reason={}, usage={:?}",
                stage.name,
                response.model.as_deref().unwrap_or(self.model.as_str()),
                response.finish_reason.as_deref().unwrap_or("none"),
                response.usage
            );
            if let Some(step) = &response.usage {
                usage = Some(match usage {
                    Some(total) => total.combined(step),
                    None => step.clone(),
                });
            }
            if response.finish_reason.as_deref() == Some("length") {
                tracing::warn!("Stage '{}' reply was cut off at the token limit", stage.name);
            }

            if let Some(tool_calls) = response.tool_calls.filter(|c| !c.is_empty()) {
                messages.push(ChatMessage::assistant_tool_calls(
                    response.content.clone(),
                    tool_calls.clone(),
                ));

                for tool_call in &tool_calls {
                    tool_calls_made += 1;
                    let result = match self.execute_tool_call(tool_call).await {
                        Ok(output) => output,
                        Err(e) => {
                            tracing::warn!("Tool '{}' failed: {}", tool_call.function.name, e);
                            format!("Error: {}", e)
                        }
                    };
                    messages.push(ChatMessage::tool_result(tool_call.id.clone(), result));
                }

                continue;
            }

            let output = response
                .content
                .as_deref()
                .map(strip_code_fence)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| anyhow::anyhow!("LLM returned empty response"))?;

            return Ok(StageOutput {
                name: stage.name.clone(),
                output,
                tool_calls: tool_calls_made,
                usage,
            });
        }

        Err(anyhow::anyhow!(
            "Max iterations ({}) reached",
            self.max_iterations
        ))
    }

    async fn execute_tool_call(&self, tool_call: &ToolCall) -> anyhow::Result<String> {
        tracing::debug!(
            "Tool: {} Args: {}",
            tool_call.function.name,
            tool_call.function.arguments
        );
        let args: serde_json::Value = if tool_call.function.arguments.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&tool_call.function.arguments)
                .context("Tool arguments are not valid JSON")?
        };

        self.tools.execute(&tool_call.function.name, args).await
    }
}

/// A directory of its own for one run, so concurrent runs never share files.
fn create_run_dir(dir: &Path) -> anyhow::Result<TempDir> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    tempfile::Builder::new()
        .prefix("run-")
        .tempdir_in(dir)
        .with_context(|| format!("Failed to create a run directory in {}", dir.display()))
}

/// Write `stage`'s output file under `dir`, creating any subdirectories the
/// file name contains.
async fn write_output(dir: &Path, stage: &Stage, output: &str) -> anyhow::Result<Option<PathBuf>> {
    let Some(file) = &stage.task.output_file else {
        return Ok(None);
    };

    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(&path, output)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!("Stage '{}' output written to {}", stage.name, path.display());
    Ok(Some(path))
}

fn build_system_prompt(agent: &AgentSpec, topic: &str) -> String {
    format!(
        "You are {role}. {backstory}\n\nYour personal goal is: {goal}\n\n\
         Work only from facts you have found or been given. Never invent sources or links.",
        role = interpolate(&agent.role, topic),
        backstory = interpolate(&agent.backstory, topic),
        goal = interpolate(&agent.goal, topic),
    )
}

fn build_task_prompt(task: &TaskSpec, topic: &str, context: &[(&str, &str)]) -> String {
    let mut prompt = format!(
        "Current Task: {}\n\nThis is the expected criteria for your final answer: {}\n",
        interpolate(&task.description, topic),
        interpolate(&task.expected_output, topic),
    );

    if !context.is_empty() {
        prompt.push_str("\nThis is the context you're working with:\n");
        for (name, output) in context {
            prompt.push_str(&format!("\n### Output of {}\n\n{}\n", name, output));
        }
    }

    prompt.push_str("\nBegin! Respond with your complete final answer.");
    prompt
}

/// Drop a single wrapping ``` fence some models put around markdown.
fn strip_code_fence(content: &str) -> String {
    let trimmed = content.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(body) = rest.strip_suffix("```") {
            let body = match body.find('\n') {
                Some(idx) => &body[idx + 1..],
                None => body,
            };
            return body.trim().to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, FunctionCall, ToolDefinition};
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Replays canned responses and records every request.
    struct ScriptedLlm {
        responses: Mutex<Vec<ChatResponse>>,
        requests: Mutex<Vec<(Vec<ChatMessage>, usize)>>,
    }

    impl ScriptedLlm {
        fn new(mut responses: Vec<ChatResponse>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            tools: Option<&[ToolDefinition]>,
        ) -> anyhow::Result<ChatResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((messages.to_vec(), tools.map(|t| t.len()).unwrap_or(0)));
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("timeout"))
        }
    }

    struct FakeSearch;

    #[async_trait]
    impl Tool for FakeSearch {
        fn name(&self) -> &str {
            "search_web"
        }

        fn description(&self) -> &str {
            "fake"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, args: Value) -> anyhow::Result<String> {
            Ok(format!("results for {}", args["query"].as_str().unwrap_or("?")))
        }
    }

    fn text(content: &str) -> ChatResponse {
        ChatResponse {
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    fn tool_call(name: &str, arguments: &str) -> ChatResponse {
        ChatResponse {
            tool_calls: Some(vec![ToolCall {
                id: "call_1".to_string(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }]),
            ..Default::default()
        }
    }

    /// Answers every request with the same newsletter, yielding first so
    /// concurrent runs interleave.
    struct FixedLlm {
        reply: String,
    }

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn chat_completion(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
            _tools: Option<&[ToolDefinition]>,
        ) -> anyhow::Result<ChatResponse> {
            tokio::task::yield_now().await;
            Ok(text(&self.reply))
        }
    }

    /// One agent, one task writing `output_file`.
    fn single_stage(output_file: Option<&str>) -> CrewDefinition {
        let agents = HashMap::from([(
            "editor".to_string(),
            AgentSpec {
                role: "Editor".to_string(),
                goal: "g".to_string(),
                backstory: "b".to_string(),
                tools: Vec::new(),
            },
        )]);
        let tasks = vec![(
            "edit".to_string(),
            TaskSpec {
                description: "Edit {topic}".to_string(),
                expected_output: "e".to_string(),
                agent: "editor".to_string(),
                context: Vec::new(),
                output_file: output_file.map(str::to_string),
            },
        )];
        CrewDefinition::new(agents, tasks).unwrap()
    }

    fn tools() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(FakeSearch));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn passes_each_output_to_the_next_stage() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call("search_web", r#"{"query":"climate"}"#),
            text("research notes"),
            text("article draft"),
            text("```markdown\n# Final newsletter\n```"),
        ]));
        let executor = SequentialExecutor::new(llm.clone(), tools(), "test-model");
        let crew = CrewDefinition::inline().unwrap();

        let output = executor.run(&crew, "climate").await.unwrap();

        assert_eq!(output.result, "# Final newsletter");
        assert_eq!(output.stages.len(), 3);
        assert_eq!(output.stages[0].tool_calls, 1);
        assert_eq!(output.stages[1].name, "writing_task");
        assert_eq!(output.stages[1].output, "article draft");

        let requests = llm.requests.lock().unwrap();
        assert_eq!(requests.len(), 4);
        // Researcher gets the search tool, the writer gets none.
        assert_eq!(requests[0].1, 1);
        assert_eq!(requests[2].1, 0);

        let tool_msg = requests[1].0.last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.content.as_deref(), Some("results for climate"));

        let writer_prompt = requests[2].0[1].content.clone().unwrap();
        assert!(writer_prompt.contains("write an informative article about climate"));
        assert!(writer_prompt.contains("research notes"));
        let editor_prompt = requests[3].0[1].content.clone().unwrap();
        assert!(editor_prompt.contains("article draft"));
        assert!(!editor_prompt.contains("research notes"));
    }

    #[tokio::test]
    async fn llm_failure_names_the_stage() {
        let llm = Arc::new(ScriptedLlm::new(vec![text("research notes")]));
        let executor = SequentialExecutor::new(llm, tools(), "m");
        let crew = CrewDefinition::inline().unwrap();

        let err = executor.run(&crew, "x").await.unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("Stage 'writing_task' failed"));
        assert!(msg.contains("timeout"));
    }

    #[tokio::test]
    async fn tool_errors_are_fed_back_not_fatal() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call("scrape_website", "{}"),
            text("a"),
            text("b"),
            text("c"),
        ]));
        let executor = SequentialExecutor::new(llm.clone(), tools(), "m");
        let crew = CrewDefinition::inline().unwrap();

        let output = executor.run(&crew, "x").await.unwrap();
        assert_eq!(output.result, "c");
        let requests = llm.requests.lock().unwrap();
        let fed_back = requests[1].0.last().unwrap().content.clone().unwrap();
        assert!(fed_back.starts_with("Error: Unknown tool"));
    }

    #[tokio::test]
    async fn stops_at_iteration_cap() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_call("search_web", "{}"),
            tool_call("search_web", "{}"),
        ]));
        let executor = SequentialExecutor::new(llm, tools(), "m").with_max_iterations(2);
        let crew = CrewDefinition::inline().unwrap();

        let err = executor.run(&crew, "x").await.unwrap_err();
        assert!(format!("{:#}", err).contains("Max iterations (2) reached"));
    }

    #[tokio::test]
    async fn output_files_are_read_back_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let llm = Arc::new(ScriptedLlm::new(vec![text("a"), text("b"), text("# News")]));
        let executor =
            SequentialExecutor::new(llm, tools(), "m").with_output_dir(Some(out.clone()));
        let crew = CrewDefinition::inline().unwrap();

        let output = executor.run(&crew, "x").await.unwrap();
        assert_eq!(output.result, "# News");
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn output_file_may_name_a_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedLlm::new(vec![text("# Nested")]));
        let executor = SequentialExecutor::new(llm, tools(), "m")
            .with_output_dir(Some(dir.path().to_path_buf()));

        let output = executor
            .run(&single_stage(Some("nested/news.md")), "x")
            .await
            .unwrap();
        assert_eq!(output.result, "# Nested");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_runs_sharing_an_output_dir_keep_their_own_results() {
        let dir = tempfile::tempdir().unwrap();
        let crew = Arc::new(CrewDefinition::inline().unwrap());

        let mut handles = Vec::new();
        for i in 0..64 {
            let executor = SequentialExecutor::new(
                Arc::new(FixedLlm {
                    reply: format!("# Newsletter for subject {}", i),
                }),
                tools(),
                "m",
            )
            .with_output_dir(Some(dir.path().to_path_buf()));
            let crew = crew.clone();
            handles.push(tokio::spawn(async move {
                let output = executor.run(&crew, &format!("subject {}", i)).await;
                (i, output)
            }));
        }

        for handle in handles {
            let (i, output) = handle.await.unwrap();
            assert_eq!(output.unwrap().result, format!("# Newsletter for subject {}", i));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn fence_only_reply_is_empty() {
        let llm = Arc::new(ScriptedLlm::new(vec![text("```\n```")]));
        let executor = SequentialExecutor::new(llm, tools(), "m");

        let err = executor.run(&single_stage(None), "x").await.unwrap_err();
        assert!(format!("{:#}", err).contains("LLM returned empty response"));
    }

    #[tokio::test]
    async fn usage_is_summed_per_stage() {
        let with_usage = |response: ChatResponse, prompt: u64, completion: u64| ChatResponse {
            usage: Some(TokenUsage::new(prompt, completion)),
            ..response
        };
        let llm = Arc::new(ScriptedLlm::new(vec![
            with_usage(tool_call("search_web", "{}"), 10, 2),
            with_usage(text("notes"), 20, 5),
            text("draft"),
            with_usage(text("# Done"), 4, 4),
        ]));
        let executor = SequentialExecutor::new(llm, tools(), "m");
        let crew = CrewDefinition::inline().unwrap();

        let output = executor.run(&crew, "x").await.unwrap();
        assert_eq!(output.stages[0].usage, Some(TokenUsage::new(30, 7)));
        assert_eq!(output.stages[1].usage, None);
        assert_eq!(output.total_tokens(), 45);
    }

    #[tokio::test]
    async fn missing_tool_is_rejected_before_any_call() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let executor = SequentialExecutor::new(llm.clone(), Arc::new(ToolRegistry::empty()), "m");
        let crew = CrewDefinition::inline().unwrap();

        assert!(executor.run(&crew, "x").await.is_err());
        assert!(llm.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```md\n# A\n```"), "# A");
        assert_eq!(strip_code_fence("# A"), "# A");
        assert_eq!(strip_code_fence("```# A```"), "# A");
        assert_eq!(strip_code_fence("```\n```"), "");
    }
}
