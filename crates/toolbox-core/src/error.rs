//! Toolbox client error types

use thiserror::Error;

/// Error type returned by value and token providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ToolboxError {
    #[error("invalid tool schema: {0}")]
    Schema(String),

    #[error("tool '{name}' not found")]
    ToolNotFound { name: String },

    #[error(
        "validation failed for {subject}: {}",
        describe_unused(.unused_auth_tokens, .unused_bound_params, .across_toolset)
    )]
    UnusedBindings {
        subject: String,
        unused_auth_tokens: Vec<String>,
        unused_bound_params: Vec<String>,
        across_toolset: bool,
    },

    #[error(
        "authentication source(s) `{}` already registered in tool `{tool}`",
        .sources.join(", ")
    )]
    DuplicateAuthSource { tool: String, sources: Vec<String> },

    #[error("authentication source(s) `{}` unused by tool `{tool}`", .sources.join(", "))]
    UnusedAuthSource { tool: String, sources: Vec<String> },

    #[error(
        "client header(s) `{}` already registered in client; cannot register the same headers in the client as well as tool",
        .headers.join(", ")
    )]
    HeaderConflict { headers: Vec<String> },

    #[error("cannot re-bind parameter: parameter '{param}' is already bound")]
    AlreadyBound { param: String },

    #[error("unable to bind parameters: no parameter named {param}")]
    UnknownParameter { param: String },

    #[error(
        "one or more of the following authn services are required to invoke this tool: {}",
        .services.join(",")
    )]
    AuthRequired { services: Vec<String> },

    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("failed to resolve value for '{target}': {source}")]
    Provider {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("session is closed")]
    SessionClosed,

    #[error("API request failed with status {status} ({reason}). Server response: {body}")]
    Api {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("{0}")]
    Invocation(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background executor unavailable: {0}")]
    Executor(String),
}

impl ToolboxError {
    pub(crate) fn provider(target: impl Into<String>, source: BoxError) -> Self {
        Self::Provider {
            target: target.into(),
            source,
        }
    }

    pub(crate) fn invalid_arguments(tool: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before any request left the client.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            Self::Api { .. } | Self::Invocation(_) | Self::Network(_)
        )
    }
}

fn describe_unused(auth: &[String], bound: &[String], across_toolset: &bool) -> String {
    let suffix = if *across_toolset {
        " could not be applied to any tool"
    } else {
        ""
    };

    let mut parts = Vec::new();
    if !auth.is_empty() {
        parts.push(format!("unused auth tokens{suffix}: {}", auth.join(", ")));
    }
    if !bound.is_empty() {
        parts.push(format!(
            "unused bound parameters{suffix}: {}",
            bound.join(", ")
        ));
    }
    parts.join("; ")
}

pub type Result<T> = std::result::Result<T, ToolboxError>;
