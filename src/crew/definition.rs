//! Declarative description of the news pipeline: agents, tasks, and the
//! order they run in.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

const AGENTS_FILE: &str = "agents.yaml";
const TASKS_FILE: &str = "tasks.yaml";

const BUILTIN_AGENTS: &str = include_str!("../../config/agents.yaml");
const BUILTIN_TASKS: &str = include_str!("../../config/tasks.yaml");

#[derive(Debug, Error)]
pub enum CrewError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {file}: {source}")]
    Yaml {
        file: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Crew has no tasks")]
    Empty,

    #[error("Task '{task}' references unknown agent '{agent}'")]
    UnknownAgent { task: String, agent: String },

    #[error("Task '{task}' lists '{context}' as context, which is not an earlier task")]
    InvalidContext { task: String, context: String },

    #[error("Agent '{agent}' uses unknown tool '{tool}'")]
    UnknownTool { agent: String, tool: String },
}

/// Persona of one agent. Text fields may contain `{topic}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentSpec {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// One unit of work. `context` names earlier tasks whose output this task reads.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TaskSpec {
    pub description: String,
    pub expected_output: String,
    pub agent: String,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub output_file: Option<String>,
}

/// A task bound to the agent that performs it.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub agent_name: String,
    pub agent: AgentSpec,
    pub task: TaskSpec,
}

/// Validated, ordered list of stages.
#[derive(Debug, Clone)]
pub struct CrewDefinition {
    stages: Vec<Stage>,
}

impl CrewDefinition {
    /// Bind tasks (in run order) to their agents and check the context edges.
    pub fn new(
        agents: HashMap<String, AgentSpec>,
        tasks: Vec<(String, TaskSpec)>,
    ) -> Result<Self, CrewError> {
        if tasks.is_empty() {
            return Err(CrewError::Empty);
        }

        let mut stages: Vec<Stage> = Vec::with_capacity(tasks.len());
        for (name, task) in tasks {
            let agent = agents
                .get(&task.agent)
                .cloned()
                .ok_or_else(|| CrewError::UnknownAgent {
                    task: name.clone(),
                    agent: task.agent.clone(),
                })?;

            for context in &task.context {
                if !stages.iter().any(|s| &s.name == context) {
                    return Err(CrewError::InvalidContext {
                        task: name.clone(),
                        context: context.clone(),
                    });
                }
            }

            stages.push(Stage {
                name,
                agent_name: task.agent.clone(),
                agent,
                task,
            });
        }

        Ok(Self { stages })
    }

    /// Parse the agents and tasks YAML documents.
    ///
    /// Tasks run in the order they appear in the tasks document.
    pub fn from_yaml(agents_yaml: &str, tasks_yaml: &str) -> Result<Self, CrewError> {
        let agents: HashMap<String, AgentSpec> =
            serde_yaml::from_str(agents_yaml).map_err(|source| CrewError::Yaml {
                file: AGENTS_FILE.to_string(),
                source,
            })?;

        let yaml_err = |source: serde_yaml::Error| CrewError::Yaml {
            file: TASKS_FILE.to_string(),
            source,
        };
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(tasks_yaml).map_err(yaml_err)?;
        let mut tasks = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let name: String = serde_yaml::from_value(key).map_err(yaml_err)?;
            let task: TaskSpec = serde_yaml::from_value(value).map_err(yaml_err)?;
            tasks.push((name, task));
        }

        Self::new(agents, tasks)
    }

    /// The YAML-driven crew: `agents.yaml` and `tasks.yaml` from `config_dir`
    /// if given, otherwise the built-in copies.
    pub fn configured(config_dir: Option<&Path>) -> Result<Self, CrewError> {
        match config_dir {
            Some(dir) => {
                let agents = read_file(&dir.join(AGENTS_FILE))?;
                let tasks = read_file(&dir.join(TASKS_FILE))?;
                tracing::info!("Loading crew definition from {}", dir.display());
                Self::from_yaml(&agents, &tasks)
            }
            None => Self::from_yaml(BUILTIN_AGENTS, BUILTIN_TASKS),
        }
    }

    /// The crew defined in code: researcher, writer, editor.
    pub fn inline() -> Result<Self, CrewError> {
        let agents = HashMap::from([
            (
                "researcher".to_string(),
                AgentSpec {
                    role: "AI News Researcher".to_string(),
                    goal: "Find the most relevant and recent information about {topic}".to_string(),
                    backstory: "You are an expert at finding and analyzing news and information from various sources.".to_string(),
                    tools: vec!["search_web".to_string()],
                },
            ),
            (
                "writer".to_string(),
                AgentSpec {
                    role: "AI Content Writer".to_string(),
                    goal: "Write engaging and informative content about {topic}".to_string(),
                    backstory: "You are a skilled writer who can transform research into compelling narratives.".to_string(),
                    tools: Vec::new(),
                },
            ),
            (
                "editor".to_string(),
                AgentSpec {
                    role: "Newsletter Editor".to_string(),
                    goal: "Create a polished final newsletter with proper formatting and structure".to_string(),
                    backstory: "You ensure all content is accurate, well-organized, and ready for distribution.".to_string(),
                    tools: Vec::new(),
                },
            ),
        ]);

        let tasks = vec![
            (
                "research_task".to_string(),
                TaskSpec {
                    description: "Research the latest news and developments about {topic}. Find at least 5 relevant sources.".to_string(),
                    expected_output: "A detailed research report with links to sources and key findings.".to_string(),
                    agent: "researcher".to_string(),
                    context: Vec::new(),
                    output_file: None,
                },
            ),
            (
                "writing_task".to_string(),
                TaskSpec {
                    description: "Based on the research, write an informative article about {topic}. Include analysis of trends and impacts.".to_string(),
                    expected_output: "A well-written article with sections covering different aspects of the subject.".to_string(),
                    agent: "writer".to_string(),
                    context: vec!["research_task".to_string()],
                    output_file: None,
                },
            ),
            (
                "editing_task".to_string(),
                TaskSpec {
                    description: "Review and edit the article into a newsletter format. Ensure proper structure, formatting, and clarity.".to_string(),
                    expected_output: "A polished newsletter ready for distribution.".to_string(),
                    agent: "editor".to_string(),
                    context: vec!["writing_task".to_string()],
                    output_file: Some("newsletter.md".to_string()),
                },
            ),
        ];

        Self::new(agents, tasks)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Check that every tool an agent lists is available.
    pub fn check_tools(&self, is_available: impl Fn(&str) -> bool) -> Result<(), CrewError> {
        for stage in &self.stages {
            if let Some(tool) = stage.agent.tools.iter().find(|t| !is_available(t.as_str())) {
                return Err(CrewError::UnknownTool {
                    agent: stage.agent_name.clone(),
                    tool: tool.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Replace `{topic}` in a template and trim YAML folding whitespace.
pub fn interpolate(template: &str, topic: &str) -> String {
    template.trim().replace("{topic}", topic)
}

fn read_file(path: &Path) -> Result<String, CrewError> {
    std::fs::read_to_string(path).map_err(|source| CrewError::Io {
        path: path.display().to_string(),
        source,
    })
}
