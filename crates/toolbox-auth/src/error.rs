use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to validate and cache the new token: {0}")]
    InvalidToken(String),

    #[error(
        "Not authenticating with user credentials. Set the audience to the toolbox service URL to get a Google ID token."
    )]
    AudienceRequired,

    #[error("Failed to fetch Google ID token for audience '{audience}': {reason}")]
    FetchFailed { audience: String, reason: String },

    #[error("Credential command failed: {0}")]
    CommandFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AuthError>;
