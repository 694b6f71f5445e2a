//! Google ID tokens for toolbox clients
//!
//! Tokens are returned as `Bearer <token>` strings and can be registered as
//! auth token getters or used as an `Authorization` client header.

mod cache;
mod error;
mod provider;
mod source;

pub use cache::{decode_expiry, IdTokenCache, CACHE_REFRESH_MARGIN_SECS};
pub use error::{AuthError, Result};
pub use provider::{google_id_token, GoogleIdTokenProvider, BEARER_TOKEN_PREFIX};
pub use source::{
    DefaultCredentials, GcloudCliSource, IdTokenSource, MetadataServerSource,
    DEFAULT_METADATA_IDENTITY_URL,
};
