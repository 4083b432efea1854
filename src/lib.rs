//! # YourNews
//!
//! A small web service that turns a subject into a newsletter-style
//! markdown report.
//!
//! ## Search Flow
//! 1. The subject arrives from the search page or the JSON API
//! 2. The credential gate checks `SERPER_API_KEY` and `OPENAI_API_KEY`
//! 3. With both present, the news crew runs research → analysis → editing
//! 4. Otherwise, or if the crew fails, a deterministic mock report is returned
//!
//! ## Modules
//! - `config`: Environment-driven configuration
//! - `gate`: Credential gate
//! - `mock`: Mock report generator
//! - `search`: Dispatch between prompt, mock and live paths
//! - `crew`: Pipeline definition and sequential executor
//! - `llm`: Chat completions client
//! - `tools`: Web search and scraping tools for the researcher
//! - `api`: HTTP server and search page

pub mod api;
pub mod config;
pub mod crew;
pub mod gate;
pub mod llm;
pub mod mock;
pub mod search;
pub mod tools;

pub use config::Config;
pub use search::{search_news, NewsPipeline, ResultSource, SearchOutcome};
