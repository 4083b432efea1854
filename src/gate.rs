//! Credential gate: decides between the live pipeline and the mock report.

use std::fmt;

use crate::config::{Credentials, OPENAI_API_KEY, SERPER_API_KEY};

/// A credential the live path depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialName {
    SerperApiKey,
    OpenAiApiKey,
}

impl CredentialName {
    /// The environment variable the credential is read from.
    pub fn env_var(&self) -> &'static str {
        match self {
            CredentialName::SerperApiKey => SERPER_API_KEY,
            CredentialName::OpenAiApiKey => OPENAI_API_KEY,
        }
    }
}

impl fmt::Display for CredentialName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.env_var())
    }
}

/// Keys for a live search. Only constructed by [`check_credentials`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveKeys {
    pub serper_api_key: String,
    pub openai_api_key: String,
}

/// Outcome of the credential check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Both credentials are present.
    Live(LiveKeys),
    /// At least one credential is absent; `missing` lists exactly those.
    Mock { missing: Vec<CredentialName> },
}

impl GateDecision {
    pub fn is_live(&self) -> bool {
        matches!(self, GateDecision::Live(_))
    }

    /// Names of the absent credentials (empty when live).
    pub fn missing(&self) -> &[CredentialName] {
        match self {
            GateDecision::Live(_) => &[],
            GateDecision::Mock { missing } => missing,
        }
    }
}

/// Check which credentials are available.
///
/// A credential counts as present only when it is non-empty.
pub fn check_credentials(credentials: &Credentials) -> GateDecision {
    let serper = present(&credentials.serper_api_key);
    let openai = present(&credentials.openai_api_key);

    if let (Some(serper), Some(openai)) = (serper, openai) {
        tracing::info!("Both {} and {} are set", SERPER_API_KEY, OPENAI_API_KEY);
        return GateDecision::Live(LiveKeys {
            serper_api_key: serper.to_string(),
            openai_api_key: openai.to_string(),
        });
    }

    let mut missing = Vec::new();
    if serper.is_none() {
        missing.push(CredentialName::SerperApiKey);
    }
    if openai.is_none() {
        missing.push(CredentialName::OpenAiApiKey);
    }

    tracing::info!("Missing API keys: {}", join_names(&missing));
    GateDecision::Mock { missing }
}

/// Comma-separated credential names, as shown in the mock footer.
pub fn join_names(names: &[CredentialName]) -> String {
    names
        .iter()
        .map(|n| n.env_var())
        .collect::<Vec<_>>()
        .join(", ")
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
