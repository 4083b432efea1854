//! Search dispatch: prompt, mock report, or live pipeline.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::config::Credentials;
use crate::gate::{check_credentials, GateDecision, LiveKeys};
use crate::mock::mock_news;

/// Returned verbatim when the subject is empty.
pub const EMPTY_SUBJECT_PROMPT: &str = "Please enter a subject to search for news.";

/// A producer of newsletter markdown for a subject.
#[async_trait]
pub trait NewsPipeline: Send + Sync {
    async fn kickoff(&self, keys: &LiveKeys, subject: &str) -> anyhow::Result<String>;
}

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Empty subject; the text is the input prompt.
    Prompt,
    /// Credentials missing.
    Mock,
    /// Live pipeline output.
    Pipeline,
    /// Live pipeline failed; mock report with the error in the footer.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    pub markdown: String,
    pub source: ResultSource,
}

/// Produce the results markdown for `subject`.
///
/// Never fails: every failure degrades to the mock report.
pub async fn search_news(
    subject: &str,
    credentials: &Credentials,
    pipeline: &dyn NewsPipeline,
    today: NaiveDate,
) -> SearchOutcome {
    let subject = subject.trim();
    if subject.is_empty() {
        return SearchOutcome {
            markdown: EMPTY_SUBJECT_PROMPT.to_string(),
            source: ResultSource::Prompt,
        };
    }

    let keys = match check_credentials(credentials) {
        GateDecision::Live(keys) => keys,
        GateDecision::Mock { missing } => {
            let notes: Vec<String> = missing.iter().map(|n| n.to_string()).collect();
            return SearchOutcome {
                markdown: mock_news(subject, &notes, today),
                source: ResultSource::Mock,
            };
        }
    };

    tracing::info!("Running news pipeline for '{}'", subject);
    match pipeline.kickoff(&keys, subject).await {
        Ok(markdown) => SearchOutcome {
            markdown,
            source: ResultSource::Pipeline,
        },
        Err(e) => {
            tracing::error!("Error using news pipeline: {:#}", e);
            SearchOutcome {
                markdown: mock_news(subject, &[format!("Pipeline error: {:#}", e)], today),
                source: ResultSource::Fallback,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakePipeline {
        result: Result<String, String>,
        calls: AtomicUsize,
    }

    impl FakePipeline {
        fn ok(markdown: &str) -> Self {
            Self {
                result: Ok(markdown.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                result: Err(message.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NewsPipeline for FakePipeline {
        async fn kickoff(&self, _keys: &LiveKeys, _subject: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn live() -> Credentials {
        Credentials::new(Some("serper".to_string()), Some("openai".to_string()))
    }

    #[tokio::test]
    async fn empty_subject_returns_prompt() {
        let pipeline = FakePipeline::ok("unused");
        for subject in ["", "   "] {
            let outcome = search_news(subject, &live(), &pipeline, today()).await;
            assert_eq!(outcome.markdown, EMPTY_SUBJECT_PROMPT);
            assert_eq!(outcome.source, ResultSource::Prompt);
        }
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_credentials_use_mock() {
        let pipeline = FakePipeline::ok("unused");
        let outcome = search_news("climate", &Credentials::default(), &pipeline, today()).await;

        assert_eq!(outcome.source, ResultSource::Mock);
        let headings = outcome
            .markdown
            .lines()
            .filter(|l| l.starts_with('#') && l.contains("climate"))
            .count();
        assert!(headings >= 3);
        let footer = outcome.markdown.lines().last().unwrap();
        assert!(footer.contains("SERPER_API_KEY"));
        assert!(footer.contains("OPENAI_API_KEY"));
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pipeline_result_is_returned() {
        let pipeline = FakePipeline::ok("# Climate Weekly");
        let outcome = search_news("climate", &live(), &pipeline, today()).await;
        assert_eq!(outcome.markdown, "# Climate Weekly");
        assert_eq!(outcome.source, ResultSource::Pipeline);
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pipeline_error_falls_back_with_message() {
        let pipeline = FakePipeline::failing("timeout");
        let outcome = search_news("climate", &live(), &pipeline, today()).await;

        assert_eq!(outcome.source, ResultSource::Fallback);
        let footer = outcome.markdown.lines().last().unwrap();
        assert!(footer.contains("timeout"));
        assert!(outcome.markdown.contains("# News Results for: climate"));
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 1);
    }
}
