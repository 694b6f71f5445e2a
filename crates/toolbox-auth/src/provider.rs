use once_cell::sync::Lazy;
use std::sync::Arc;
use toolbox_core::{BoxError, TokenGetter};

use crate::cache::IdTokenCache;
use crate::error::Result;
use crate::source::{DefaultCredentials, IdTokenSource};

pub const BEARER_TOKEN_PREFIX: &str = "Bearer ";

static GLOBAL_CACHE: Lazy<Arc<IdTokenCache>> = Lazy::new(|| Arc::new(IdTokenCache::new()));

/// Produces `Bearer <id token>` strings, refreshing through a source when the
/// cached token is missing or close to expiry.
#[derive(Clone)]
pub struct GoogleIdTokenProvider {
    audience: Option<String>,
    source: Arc<dyn IdTokenSource>,
    cache: Arc<IdTokenCache>,
}

impl GoogleIdTokenProvider {
    /// Uses default credentials and the process-wide cache.
    pub fn new(audience: Option<String>) -> Self {
        Self {
            audience,
            source: Arc::new(DefaultCredentials::new()),
            cache: Arc::clone(&GLOBAL_CACHE),
        }
    }

    pub fn with_source(mut self, source: impl IdTokenSource + 'static) -> Self {
        self.source = Arc::new(source);
        self
    }

    pub fn with_cache(mut self, cache: Arc<IdTokenCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    pub async fn token(&self) -> Result<String> {
        if let Some(token) = self.cache.get() {
            return Ok(format!("{BEARER_TOKEN_PREFIX}{token}"));
        }

        tracing::debug!(audience = ?self.audience, "fetching new ID token");
        let token = self
            .source
            .fetch_id_token(self.audience.as_deref())
            .await?;
        self.cache.store(&token)?;
        Ok(format!("{BEARER_TOKEN_PREFIX}{token}"))
    }

    /// Wraps the provider as an async token getter or header value.
    pub fn into_getter(self) -> TokenGetter {
        let provider = Arc::new(self);
        TokenGetter::async_getter(move || {
            let provider = Arc::clone(&provider);
            async move { provider.token().await.map_err(BoxError::from) }
        })
    }
}

impl std::fmt::Debug for GoogleIdTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleIdTokenProvider")
            .field("audience", &self.audience)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Token getter yielding `Bearer <google id token>` for `audience`.
///
/// All getters made this way share one process-wide cache.
pub fn google_id_token(audience: Option<&str>) -> TokenGetter {
    GoogleIdTokenProvider::new(audience.map(str::to_string)).into_getter()
}
