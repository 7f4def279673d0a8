use thiserror::Error;

/// Failures inside the credential gate, the orchestrator, and the tool invokers.
///
/// None of these reach the rendered conversation: the orchestrator turns them
/// into a generic assistant reply.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("API key was rejected by the provider")]
    CredentialInvalid,

    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("{tool} failed: {reason}")]
    ToolInvocation { tool: String, reason: String },
}

impl ChatError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        ChatError::MalformedResponse(detail.into())
    }

    pub fn tool(tool: &str, reason: impl Into<String>) -> Self {
        ChatError::ToolInvocation {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}
