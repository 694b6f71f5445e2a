//! Static values and lazily evaluated value providers

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::BoxError;

pub type ProviderFuture<T> = BoxFuture<'static, Result<T, BoxError>>;

type SyncGetter<T> = Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>;
type AsyncGetter<T> = Arc<dyn Fn() -> ProviderFuture<T> + Send + Sync>;

/// A value known up front, or a getter evaluated right before each use.
pub enum ValueSource<T> {
    Static(T),
    Getter(SyncGetter<T>),
    AsyncGetter(AsyncGetter<T>),
}

/// Value (or provider) bound to a tool parameter.
pub type ParamValue = ValueSource<Value>;

/// Token provider registered for an auth source.
pub type TokenGetter = ValueSource<String>;

/// Value (or provider) for a client header.
pub type HeaderValue = ValueSource<String>;

impl<T: 'static> ValueSource<T> {
    pub fn getter<F>(f: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::Getter(Arc::new(f))
    }

    pub fn async_getter<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        Self::AsyncGetter(Arc::new(move || -> ProviderFuture<T> { Box::pin(f()) }))
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }
}

impl<T: Clone> ValueSource<T> {
    /// Produces the current value, calling the getter if there is one.
    pub async fn resolve(&self) -> Result<T, BoxError> {
        match self {
            Self::Static(value) => Ok(value.clone()),
            Self::Getter(getter) => getter(),
            Self::AsyncGetter(getter) => getter().await,
        }
    }
}

impl<T: Clone> Clone for ValueSource<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(value) => Self::Static(value.clone()),
            Self::Getter(getter) => Self::Getter(Arc::clone(getter)),
            Self::AsyncGetter(getter) => Self::AsyncGetter(Arc::clone(getter)),
        }
    }
}

// Values can carry tokens, so only the variant is printed.
impl<T> fmt::Debug for ValueSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("ValueSource::Static(..)"),
            Self::Getter(_) => f.write_str("ValueSource::Getter(..)"),
            Self::AsyncGetter(_) => f.write_str("ValueSource::AsyncGetter(..)"),
        }
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        Self::Static(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Static(Value::String(value.to_string()))
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Static(Value::from(value))
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Static(Value::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Static(Value::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Static(Value::Bool(value))
    }
}

impl From<String> for ValueSource<String> {
    fn from(value: String) -> Self {
        Self::Static(value)
    }
}

impl From<&str> for ValueSource<String> {
    fn from(value: &str) -> Self {
        Self::Static(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_static_values_resolve_to_themselves() {
        let value = ParamValue::from(json!({"a": 1}));
        assert_eq!(value.resolve().await.unwrap(), json!({"a": 1}));
        assert!(value.is_static());
    }

    #[tokio::test]
    async fn test_getters_run_on_every_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let value = ParamValue::getter(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(json!(n))
        });

        assert_eq!(value.resolve().await.unwrap(), json!(1));
        assert_eq!(value.resolve().await.unwrap(), json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_async_getters_are_awaited() {
        let token = TokenGetter::async_getter(|| async { Ok("abc123".to_string()) });
        assert_eq!(token.resolve().await.unwrap(), "abc123");
    }

    #[tokio::test]
    async fn test_getter_errors_propagate() {
        let token = TokenGetter::getter(|| Err("no credentials".into()));
        let err = token.resolve().await.unwrap_err();
        assert_eq!(err.to_string(), "no credentials");
    }

    #[test]
    fn test_debug_output_hides_values() {
        let header = HeaderValue::from("Bearer secret");
        assert!(!format!("{header:?}").contains("secret"));
    }
}
