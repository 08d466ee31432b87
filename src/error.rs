//! Error taxonomy shared by the gateway, scoring engine and HTTP layer.
//!
//! Provider-level failures (`ProviderError`) never leave the gateway raw: it
//! retries them across instances and only surfaces `GatewayError` once every
//! provider is exhausted. `ValidationError` is the only kind that aborts a
//! request outright.

use serde::Serialize;
use thiserror::Error;

/// A single failed call against one upstream provider (instance or tool).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider timed out after {0} ms")]
    Timeout(u64),

    #[error("provider rate limited or blocked the request")]
    RateLimited,

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("provider returned HTTP {0}")]
    Http(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),
}

impl ProviderError {
    /// Short, stable label used for metrics and status output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::RateLimited => "rate_limited",
            Self::MalformedResponse(_) => "malformed",
            Self::Http(_) => "http",
            Self::Transport(_) => "transport",
            Self::ToolUnavailable(_) => "tool_unavailable",
        }
    }
}

/// The only failure that crosses the gateway boundary.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("all providers exhausted (attempted: {}); last error: {last_error}", .attempted.join(", "))]
    AllProvidersExhausted {
        /// Instance URLs tried in order, followed by the secondary tool name if it ran.
        attempted: Vec<String>,
        last_error: ProviderError,
    },
}

impl GatewayError {
    pub fn attempted(&self) -> &[String] {
        match self {
            Self::AllProvidersExhausted { attempted, .. } => attempted,
        }
    }
}

/// Rejected niche input.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("niche text must not be empty")]
    Empty,

    #[error("niche text is longer than {max} characters")]
    TooLong { max: usize },

    #[error("niche text must contain at least one letter or digit")]
    NoSearchableText,
}

/// Failure of a channel-discovery request: bad input, or no provider could
/// answer the search at all.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
