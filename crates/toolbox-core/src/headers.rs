use reqwest::header::{HeaderMap, HeaderName, HeaderValue as HttpHeaderValue};
use std::collections::BTreeMap;

use crate::error::{Result, ToolboxError};
use crate::value::HeaderValue;

/// Request header that carries the token for an auth source.
pub fn auth_header_name(auth_source: &str) -> String {
    format!("{auth_source}_token")
}

pub(crate) async fn resolve_headers(
    headers: &BTreeMap<String, HeaderValue>,
) -> Result<BTreeMap<String, String>> {
    let mut resolved = BTreeMap::new();
    for (name, value) in headers {
        let value = value
            .resolve()
            .await
            .map_err(|e| ToolboxError::provider(format!("header {name}"), e))?;
        resolved.insert(name.clone(), value);
    }
    Ok(resolved)
}

pub(crate) fn to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ToolboxError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value =
            HttpHeaderValue::from_str(value).map_err(|e| ToolboxError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header_appends_token_suffix() {
        assert_eq!(auth_header_name("cloud-auth"), "cloud-auth_token");
    }

    #[tokio::test]
    async fn test_resolves_static_and_getter_headers() {
        let mut headers = BTreeMap::new();
        headers.insert("x-static".to_string(), HeaderValue::from("one"));
        headers.insert(
            "x-dynamic".to_string(),
            HeaderValue::getter(|| Ok("two".to_string())),
        );

        let resolved = resolve_headers(&headers).await.unwrap();
        assert_eq!(resolved["x-static"], "one");
        assert_eq!(resolved["x-dynamic"], "two");
    }

    #[test]
    fn test_rejects_invalid_header_values() {
        let mut headers = BTreeMap::new();
        headers.insert("x-bad".to_string(), "line\nbreak".to_string());

        let err = to_header_map(&headers).unwrap_err();
        assert!(matches!(err, ToolboxError::InvalidHeader { .. }));
    }
}
