//! Web search through the Serper API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::Tool;

/// Search the web (including news results) via Serper.
pub struct SerperSearch {
    api_key: String,
    url: String,
}

impl SerperSearch {
    pub fn new(api_key: String, url: String) -> Self {
        Self { api_key, url }
    }
}

/// Serper request body.
#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: u32,
}

/// Serper response (only the parts we format).
#[derive(Debug, Default, Deserialize)]
struct SerperResponse {
    #[serde(default, rename = "answerBox")]
    answer_box: Option<AnswerBox>,
    #[serde(default)]
    organic: Vec<SerperResult>,
    #[serde(default)]
    news: Vec<SerperResult>,
}

#[derive(Debug, Deserialize)]
struct AnswerBox {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    title: String,
    link: String,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    source: Option<String>,
}

#[async_trait]
impl Tool for SerperSearch {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the internet for recent news and pages about a query. Returns titles, snippets, dates and links."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 10, max: 20)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;
        let num_results = args["num_results"].as_u64().unwrap_or(10).min(20) as u32;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let response = client
            .post(&self.url)
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest {
                q: query,
                num: num_results,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Serper API error ({}): {}", status, error_text);
        }

        let parsed: SerperResponse = response.json().await?;
        tracing::debug!(
            "Serper returned {} organic and {} news results for '{}'",
            parsed.organic.len(),
            parsed.news.len(),
            query
        );

        Ok(format_results(query, &parsed))
    }
}

fn format_results(query: &str, response: &SerperResponse) -> String {
    if response.organic.is_empty() && response.news.is_empty() {
        return format!("No results found for: {}", query);
    }

    let mut output = String::new();

    if let Some(answer) = response
        .answer_box
        .as_ref()
        .and_then(|a| a.answer.as_deref().or(a.snippet.as_deref()))
    {
        output.push_str("## Quick Answer\n\n");
        output.push_str(answer);
        output.push_str("\n\n");
    }

    if !response.news.is_empty() {
        output.push_str("## News\n\n");
        push_results(&mut output, &response.news);
    }

    if !response.organic.is_empty() {
        output.push_str("## Web\n\n");
        push_results(&mut output, &response.organic);
    }

    output
}

fn push_results(output: &mut String, results: &[SerperResult]) {
    for (i, result) in results.iter().enumerate() {
        output.push_str(&format!("### {}. {}\n**URL:** {}\n", i + 1, result.title, result.link));
        let meta: Vec<&str> = [result.source.as_deref(), result.date.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if !meta.is_empty() {
            output.push_str(&format!("*{}*\n", meta.join(" | ")));
        }
        if let Some(snippet) = &result.snippet {
            output.push('\n');
            output.push_str(snippet);
            output.push('\n');
        }
        output.push('\n');
    }
}
