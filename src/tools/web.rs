//! Website scraping: fetch a page and reduce it to readable text.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{safe_truncate_index, Tool};

const MAX_TEXT_BYTES: usize = 12_000;

/// Fetch a web page and return its text content.
pub struct ScrapeWebsite {
    max_bytes: usize,
}

impl ScrapeWebsite {
    pub fn new() -> Self {
        Self {
            max_bytes: MAX_TEXT_BYTES,
        }
    }
}

impl Default for ScrapeWebsite {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ScrapeWebsite {
    fn name(&self) -> &str {
        "scrape_website"
    }

    fn description(&self) -> &str {
        "Read the text content of a web page. Use it on promising links from search results to get article details."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to read"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<String> {
        let url = args["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'url' argument"))?;

        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; YourNews/0.1)")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let response = client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP error: {}", status));
        }

        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.contains("text/html"))
            .unwrap_or(false);

        let body = response.text().await?;
        let text = if is_html {
            extract_text_from_html(&body)
        } else {
            body
        };

        Ok(truncate(&text, self.max_bytes))
    }
}

fn truncate(text: &str, max_bytes: usize) -> String {
    let end = safe_truncate_index(text, max_bytes);
    if end < text.len() {
        format!("{}\n... (truncated, {} bytes total)", &text[..end], text.len())
    } else {
        text.to_string()
    }
}

/// Extract readable text from HTML (simple approach).
fn extract_text_from_html(html: &str) -> String {
    let mut text = html.to_string();
    for tag in ["script", "style"] {
        let open = format!("<{}", tag);
        let close = format!("</{}>", tag);
        while let Some(start) = text.find(&open) {
            match text[start..].find(&close) {
                Some(end) => text.replace_range(start..start + end + close.len(), ""),
                None => break,
            }
        }
    }

    let mut result = String::new();
    let mut in_tag = false;

    for c in text.chars() {
        if c == '<' {
            in_tag = true;
        } else if c == '>' {
            in_tag = false;
            result.push(' ');
        } else if !in_tag {
            result.push(c);
        }
    }

    let result: String = result.split_whitespace().collect::<Vec<_>>().join(" ");

    html_decode(&result)
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
