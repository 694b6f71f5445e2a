//! Callable proxy for a single remote tool

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::{Result, ToolboxError};
use crate::headers::{auth_header_name, resolve_headers, to_header_map};
use crate::protocol::ParameterSchema;
use crate::resolver::{identify_auth_requirements, unused_names};
use crate::session::Session;
use crate::value::{HeaderValue, ParamValue, TokenGetter};

/// Everything needed to construct a [`ToolboxTool`].
#[derive(Debug, Clone, Default)]
pub struct ToolParts {
    pub base_url: String,
    pub name: String,
    pub description: String,
    /// Free parameters, in any order.
    pub params: Vec<ParameterSchema>,
    pub required_authn_params: BTreeMap<String, Vec<String>>,
    pub required_authz_tokens: Vec<String>,
    pub auth_token_getters: BTreeMap<String, TokenGetter>,
    pub bound_params: BTreeMap<String, ParamValue>,
    pub client_headers: BTreeMap<String, HeaderValue>,
}

/// Arguments for a single tool call.
///
/// Positional values fill the residual signature in order (required
/// parameters first); named values are matched by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: Map<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn from_named(named: Map<String, Value>) -> Self {
        Self {
            positional: Vec::new(),
            named,
        }
    }
}

impl From<Map<String, Value>> for CallArgs {
    fn from(named: Map<String, Value>) -> Self {
        Self::from_named(named)
    }
}

/// A remote tool with its auth state and bound parameters.
///
/// Instances are immutable; `bind_param(s)` and `add_auth_token_getter(s)`
/// return new tools and leave the receiver untouched.
#[derive(Debug, Clone)]
pub struct ToolboxTool {
    session: Session,
    inner: Arc<ToolParts>,
    invoke_url: String,
}

impl ToolboxTool {
    pub fn new(session: Session, mut parts: ToolParts) -> Result<Self> {
        let conflicts: Vec<String> = parts
            .auth_token_getters
            .keys()
            .map(|source| auth_header_name(source))
            .filter(|header| parts.client_headers.contains_key(header))
            .collect();
        if !conflicts.is_empty() {
            return Err(ToolboxError::HeaderConflict { headers: conflicts });
        }

        // Required parameters come first in the call signature.
        parts.params.sort_by_key(|param| !param.required);

        let invoke_url = format!(
            "{}/api/tool/{}/invoke",
            parts.base_url.trim_end_matches('/'),
            parts.name
        );

        let carries_credentials = !parts.required_authn_params.is_empty()
            || !parts.required_authz_tokens.is_empty()
            || !parts.auth_token_getters.is_empty()
            || !parts.client_headers.is_empty();
        if carries_credentials && !invoke_url.starts_with("https://") {
            tracing::warn!(
                tool = %parts.name,
                "Sending ID token over HTTP. User data may be exposed. Use HTTPS for secure communication."
            );
        }

        Ok(Self {
            session,
            inner: Arc::new(parts),
            invoke_url,
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// Residual parameters in call-signature order.
    pub fn params(&self) -> &[ParameterSchema] {
        &self.inner.params
    }

    pub fn bound_params(&self) -> &BTreeMap<String, ParamValue> {
        &self.inner.bound_params
    }

    pub fn required_authn_params(&self) -> &BTreeMap<String, Vec<String>> {
        &self.inner.required_authn_params
    }

    pub fn required_authz_tokens(&self) -> &[String] {
        &self.inner.required_authz_tokens
    }

    pub fn auth_token_getters(&self) -> &BTreeMap<String, TokenGetter> {
        &self.inner.auth_token_getters
    }

    pub fn client_headers(&self) -> &BTreeMap<String, HeaderValue> {
        &self.inner.client_headers
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Human-readable description with one line per residual parameter.
    pub fn doc(&self) -> String {
        let mut doc = self.inner.description.clone();
        if self.inner.params.is_empty() {
            return doc;
        }

        doc.push_str("\n\nArgs:");
        for param in &self.inner.params {
            let _ = write!(
                doc,
                "\n    {} ({}): {}",
                param.name,
                param.annotation(),
                param.description
            );
        }
        doc
    }

    /// Invokes the tool and returns the server's result.
    pub async fn call(&self, args: CallArgs) -> Result<String> {
        self.ensure_authenticated()?;
        let mut payload = self.bind_arguments(args)?;
        let http = self.session.http()?;

        for (name, value) in &self.inner.bound_params {
            let value = value
                .resolve()
                .await
                .map_err(|e| ToolboxError::provider(name.as_str(), e))?;
            payload.insert(name.clone(), value);
        }
        payload.retain(|_, value| !value.is_null());

        let mut headers = resolve_headers(&self.inner.client_headers).await?;
        for (source, getter) in &self.inner.auth_token_getters {
            let token = getter
                .resolve()
                .await
                .map_err(|e| ToolboxError::provider(format!("auth source {source}"), e))?;
            headers.insert(auth_header_name(source), token);
        }

        tracing::debug!(tool = %self.inner.name, url = %self.invoke_url, "invoking tool");

        let response = http
            .post(&self.invoke_url)
            .headers(to_header_map(&headers)?)
            .json(&Value::Object(payload))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| body.get("error").map(value_text))
                .unwrap_or_else(|| format!("unexpected status from server: {}", status.as_u16()));
            tracing::debug!(tool = %self.inner.name, status = status.as_u16(), "tool invocation failed");
            return Err(ToolboxError::Invocation(message));
        }

        let body: Value = serde_json::from_str(&text)?;
        Ok(match body.get("result") {
            Some(result) => value_text(result),
            None => body.to_string(),
        })
    }

    /// Returns a new tool with `getter` registered for `auth_source`.
    pub fn add_auth_token_getter(
        &self,
        auth_source: impl Into<String>,
        getter: impl Into<TokenGetter>,
    ) -> Result<Self> {
        self.add_auth_token_getters([(auth_source.into(), getter.into())])
    }

    /// Returns a new tool with additional token getters.
    ///
    /// Every new source must satisfy at least one outstanding requirement.
    pub fn add_auth_token_getters<I, K, G>(&self, getters: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, G)>,
        K: Into<String>,
        G: Into<TokenGetter>,
    {
        let incoming: BTreeMap<String, TokenGetter> = getters
            .into_iter()
            .map(|(name, getter)| (name.into(), getter.into()))
            .collect();

        let duplicates: Vec<String> = incoming
            .keys()
            .filter(|name| self.inner.auth_token_getters.contains_key(*name))
            .cloned()
            .collect();
        if !duplicates.is_empty() {
            return Err(ToolboxError::DuplicateAuthSource {
                tool: self.inner.name.clone(),
                sources: duplicates,
            });
        }

        let conflicts: Vec<String> = incoming
            .keys()
            .map(|name| auth_header_name(name))
            .filter(|header| self.inner.client_headers.contains_key(header))
            .collect();
        if !conflicts.is_empty() {
            return Err(ToolboxError::HeaderConflict { headers: conflicts });
        }

        let requirements = identify_auth_requirements(
            &self.inner.required_authn_params,
            &self.inner.required_authz_tokens,
            incoming.keys().map(String::as_str),
        );
        let unused = unused_names(incoming.keys(), &requirements.used_services);
        if !unused.is_empty() {
            return Err(ToolboxError::UnusedAuthSource {
                tool: self.inner.name.clone(),
                sources: unused,
            });
        }

        let mut parts = (*self.inner).clone();
        parts.auth_token_getters.extend(incoming);
        parts.required_authn_params = requirements.authn_params;
        parts.required_authz_tokens = requirements.authz_tokens;
        Self::new(self.session.clone(), parts)
    }

    /// Returns a new tool with `name` bound to `value`.
    pub fn bind_param(&self, name: impl Into<String>, value: impl Into<ParamValue>) -> Result<Self> {
        self.bind_params([(name.into(), value.into())])
    }

    /// Returns a new tool with several parameters bound at once.
    pub fn bind_params<I, K, V>(&self, params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let incoming: BTreeMap<String, ParamValue> = params
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();

        for name in incoming.keys() {
            if self.inner.bound_params.contains_key(name) {
                return Err(ToolboxError::AlreadyBound {
                    param: name.clone(),
                });
            }
            if !self.inner.params.iter().any(|param| &param.name == name) {
                return Err(ToolboxError::UnknownParameter {
                    param: name.clone(),
                });
            }
        }

        let mut parts = (*self.inner).clone();
        parts.params.retain(|param| !incoming.contains_key(&param.name));
        parts.bound_params.extend(incoming);
        Self::new(self.session.clone(), parts)
    }

    fn ensure_authenticated(&self) -> Result<()> {
        if self.inner.required_authn_params.is_empty() && self.inner.required_authz_tokens.is_empty()
        {
            return Ok(());
        }

        let services: BTreeSet<String> = self
            .inner
            .required_authn_params
            .values()
            .flatten()
            .chain(self.inner.required_authz_tokens.iter())
            .cloned()
            .collect();
        Err(ToolboxError::AuthRequired {
            services: services.into_iter().collect(),
        })
    }

    fn bind_arguments(&self, args: CallArgs) -> Result<Map<String, Value>> {
        let tool = self.inner.name.as_str();
        let signature = &self.inner.params;

        if args.positional.len() > signature.len() {
            return Err(ToolboxError::invalid_arguments(
                tool,
                format!(
                    "takes {} positional argument(s) but {} were given",
                    signature.len(),
                    args.positional.len()
                ),
            ));
        }

        let mut bound: Map<String, Value> = signature
            .iter()
            .zip(args.positional)
            .map(|(param, value)| (param.name.clone(), value))
            .collect();

        for (name, value) in args.named {
            if !signature.iter().any(|param| param.name == name) {
                let reason = if self.inner.bound_params.contains_key(&name) {
                    format!("parameter '{name}' is bound and cannot be supplied")
                } else {
                    format!("unexpected argument '{name}'")
                };
                return Err(ToolboxError::invalid_arguments(tool, reason));
            }
            if bound.contains_key(&name) {
                return Err(ToolboxError::invalid_arguments(
                    tool,
                    format!("multiple values for argument '{name}'"),
                ));
            }
            bound.insert(name, value);
        }

        let missing: Vec<&str> = signature
            .iter()
            .filter(|param| param.required && !bound.contains_key(&param.name))
            .map(|param| param.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ToolboxError::invalid_arguments(
                tool,
                format!("missing required argument(s): {}", missing.join(", ")),
            ));
        }

        for param in signature {
            if let Some(value) = bound.get(&param.name) {
                if !param.accepts(value) {
                    return Err(ToolboxError::invalid_arguments(
                        tool,
                        format!(
                            "argument '{}' expected {} but got {}",
                            param.name,
                            param.kind,
                            json_type_name(value)
                        ),
                    ));
                }
            }
        }

        Ok(bound)
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
