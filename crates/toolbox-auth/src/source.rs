//! Where raw ID tokens come from

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{AuthError, Result};

pub const DEFAULT_METADATA_IDENTITY_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/identity";

const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetches a raw (unprefixed) ID token.
#[async_trait]
pub trait IdTokenSource: Send + Sync {
    async fn fetch_id_token(&self, audience: Option<&str>) -> Result<String>;
}

/// User credentials from the local `gcloud` installation.
#[derive(Debug, Clone)]
pub struct GcloudCliSource {
    program: String,
}

impl GcloudCliSource {
    pub fn new() -> Self {
        Self::with_program("gcloud")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GcloudCliSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdTokenSource for GcloudCliSource {
    // User credentials mint tokens for the gcloud client; the audience is not applied.
    async fn fetch_id_token(&self, _audience: Option<&str>) -> Result<String> {
        let output = Command::new(&self.program)
            .args(["auth", "print-identity-token"])
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuthError::CommandFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(AuthError::CommandFailed(format!(
                "{} printed no token",
                self.program
            )));
        }
        Ok(token)
    }
}

/// Identity endpoint of the compute metadata server.
#[derive(Debug, Clone)]
pub struct MetadataServerSource {
    http: reqwest::Client,
    endpoint: String,
}

impl MetadataServerSource {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_METADATA_IDENTITY_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

impl Default for MetadataServerSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdTokenSource for MetadataServerSource {
    async fn fetch_id_token(&self, audience: Option<&str>) -> Result<String> {
        let audience = audience.ok_or(AuthError::AudienceRequired)?;
        let failed = |reason: String| AuthError::FetchFailed {
            audience: audience.to_string(),
            reason,
        };

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("audience", audience), ("format", "full")])
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        if !status.is_success() {
            return Err(failed(format!(
                "metadata server returned {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(body.trim().to_string())
    }
}

/// User credentials first, then the metadata server.
///
/// The metadata server needs an audience; without one a missing user
/// credential is reported as [`AuthError::AudienceRequired`].
pub struct DefaultCredentials {
    user: Box<dyn IdTokenSource>,
    fallback: Box<dyn IdTokenSource>,
}

impl DefaultCredentials {
    pub fn new() -> Self {
        Self::with_sources(GcloudCliSource::new(), MetadataServerSource::new())
    }

    pub fn with_sources(
        user: impl IdTokenSource + 'static,
        fallback: impl IdTokenSource + 'static,
    ) -> Self {
        Self {
            user: Box::new(user),
            fallback: Box::new(fallback),
        }
    }
}

impl Default for DefaultCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DefaultCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultCredentials").finish_non_exhaustive()
    }
}

#[async_trait]
impl IdTokenSource for DefaultCredentials {
    async fn fetch_id_token(&self, audience: Option<&str>) -> Result<String> {
        match self.user.fetch_id_token(audience).await {
            Ok(token) => Ok(token),
            Err(e) => {
                tracing::debug!(error = %e, "user credentials unavailable, trying metadata server");
                let audience = audience.ok_or(AuthError::AudienceRequired)?;
                self.fallback.fetch_id_token(Some(audience)).await
            }
        }
    }
}
