//! Async client that loads tools from a toolbox server

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::error::{Result, ToolboxError};
use crate::headers::{resolve_headers, to_header_map};
use crate::protocol::{ManifestSchema, ToolSchema};
use crate::resolver::{identify_auth_requirements, unused_names};
use crate::session::Session;
use crate::tool::{ToolParts, ToolboxTool};
use crate::value::{HeaderValue, ParamValue, TokenGetter};

/// Token getters and bound parameters applied while loading tools.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub auth_token_getters: BTreeMap<String, TokenGetter>,
    pub bound_params: BTreeMap<String, ParamValue>,
    /// Toolsets only: every tool must use every getter and binding.
    pub strict: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auth_token_getter(
        mut self,
        auth_source: impl Into<String>,
        getter: impl Into<TokenGetter>,
    ) -> Self {
        self.auth_token_getters
            .insert(auth_source.into(), getter.into());
        self
    }

    pub fn with_bound_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.bound_params.insert(name.into(), value.into());
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Builder for [`ToolboxClient`].
#[derive(Debug)]
pub struct ToolboxClientBuilder {
    base_url: String,
    session: Option<Session>,
    timeout: Option<Duration>,
    client_headers: BTreeMap<String, HeaderValue>,
}

impl ToolboxClientBuilder {
    /// Uses a caller-managed session. The client will never close it.
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Request timeout for a client-owned session.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.client_headers.insert(name.into(), value.into());
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HeaderValue>,
    {
        self.client_headers.extend(
            headers
                .into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
        self
    }

    pub fn build(self) -> Result<ToolboxClient> {
        let (session, owns_session) = match self.session {
            Some(session) => (session, false),
            None => {
                let session = match self.timeout {
                    Some(timeout) => Session::with_timeout(timeout)?,
                    None => Session::new()?,
                };
                (session, true)
            }
        };

        Ok(ToolboxClient {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            session,
            owns_session,
            client_headers: self.client_headers,
        })
    }
}

/// Loads tool definitions from a toolbox server and turns them into
/// callable [`ToolboxTool`]s.
#[derive(Debug)]
pub struct ToolboxClient {
    base_url: String,
    session: Session,
    owns_session: bool,
    client_headers: BTreeMap<String, HeaderValue>,
}

impl ToolboxClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: impl Into<String>) -> ToolboxClientBuilder {
        ToolboxClientBuilder {
            base_url: base_url.into(),
            session: None,
            timeout: None,
            client_headers: BTreeMap::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client_headers(&self) -> &BTreeMap<String, HeaderValue> {
        &self.client_headers
    }

    /// Closes the session if this client created it.
    ///
    /// Tools loaded through the client stop working afterwards. Calling this
    /// more than once is a no-op.
    pub fn close(&self) {
        if self.owns_session {
            self.session.close();
        }
    }

    /// Loads a single tool by name.
    pub async fn load_tool(&self, name: &str, options: LoadOptions) -> Result<ToolboxTool> {
        let manifest = self
            .fetch_manifest(&format!("{}/api/tool/{}", self.base_url, name))
            .await?;

        let schema = manifest
            .tools
            .get(name)
            .ok_or_else(|| ToolboxError::ToolNotFound {
                name: name.to_string(),
            })?;

        let parsed = self.parse_tool(name, schema, &options)?;

        let unused_auth_tokens =
            unused_names(options.auth_token_getters.keys(), &parsed.used_auth_sources);
        let unused_bound_params =
            unused_names(options.bound_params.keys(), &parsed.used_bound_params);
        if !unused_auth_tokens.is_empty() || !unused_bound_params.is_empty() {
            return Err(ToolboxError::UnusedBindings {
                subject: format!("tool '{name}'"),
                unused_auth_tokens,
                unused_bound_params,
                across_toolset: false,
            });
        }

        Ok(parsed.tool)
    }

    /// Loads every tool in a toolset; `None` loads the default toolset.
    ///
    /// In non-strict mode a getter or binding only has to be used by one tool
    /// of the set. In strict mode the first tool that leaves one unused fails
    /// the load.
    pub async fn load_toolset(
        &self,
        name: Option<&str>,
        options: LoadOptions,
    ) -> Result<Vec<ToolboxTool>> {
        let manifest = self
            .fetch_manifest(&format!(
                "{}/api/toolset/{}",
                self.base_url,
                name.unwrap_or_default()
            ))
            .await?;

        let mut tools = Vec::with_capacity(manifest.tools.len());
        let mut used_auth_sources = BTreeSet::new();
        let mut used_bound_params = BTreeSet::new();

        for (tool_name, schema) in &manifest.tools {
            let parsed = self.parse_tool(tool_name, schema, &options)?;

            if options.strict {
                let unused_auth_tokens =
                    unused_names(options.auth_token_getters.keys(), &parsed.used_auth_sources);
                let unused_bound_params =
                    unused_names(options.bound_params.keys(), &parsed.used_bound_params);
                if !unused_auth_tokens.is_empty() || !unused_bound_params.is_empty() {
                    return Err(ToolboxError::UnusedBindings {
                        subject: format!("tool '{tool_name}'"),
                        unused_auth_tokens,
                        unused_bound_params,
                        across_toolset: false,
                    });
                }
            } else {
                used_auth_sources.extend(parsed.used_auth_sources);
                used_bound_params.extend(parsed.used_bound_params);
            }

            tools.push(parsed.tool);
        }

        if !options.strict {
            let unused_auth_tokens =
                unused_names(options.auth_token_getters.keys(), &used_auth_sources);
            let unused_bound_params = unused_names(options.bound_params.keys(), &used_bound_params);
            if !unused_auth_tokens.is_empty() || !unused_bound_params.is_empty() {
                return Err(ToolboxError::UnusedBindings {
                    subject: format!("toolset '{}'", name.unwrap_or("default")),
                    unused_auth_tokens,
                    unused_bound_params,
                    across_toolset: true,
                });
            }
        }

        Ok(tools)
    }

    async fn fetch_manifest(&self, url: &str) -> Result<ManifestSchema> {
        let headers = resolve_headers(&self.client_headers).await?;
        let http = self.session.http()?;

        tracing::debug!(url = %url, "fetching toolbox manifest");

        let response = http.get(url).headers(to_header_map(&headers)?).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolboxError::Api {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body,
            });
        }

        let body = response.text().await?;
        ManifestSchema::from_json(&body)
    }

    fn parse_tool(
        &self,
        name: &str,
        schema: &ToolSchema,
        options: &LoadOptions,
    ) -> Result<ParsedTool> {
        let mut params = Vec::new();
        let mut authn_params = BTreeMap::new();
        let mut bound_params = BTreeMap::new();

        for param in &schema.parameters {
            if let Some(sources) = param.auth_sources() {
                authn_params.insert(param.name.clone(), sources.to_vec());
            } else if let Some(value) = options.bound_params.get(&param.name) {
                bound_params.insert(param.name.clone(), value.clone());
            } else {
                params.push(param.clone());
            }
        }

        let requirements = identify_auth_requirements(
            &authn_params,
            &schema.auth_required,
            options.auth_token_getters.keys().map(String::as_str),
        );
        let used_bound_params: BTreeSet<String> = bound_params.keys().cloned().collect();

        let tool = ToolboxTool::new(
            self.session.clone(),
            ToolParts {
                base_url: self.base_url.clone(),
                name: name.to_string(),
                description: schema.description.clone(),
                params,
                required_authn_params: requirements.authn_params,
                required_authz_tokens: requirements.authz_tokens,
                auth_token_getters: options.auth_token_getters.clone(),
                bound_params,
                client_headers: self.client_headers.clone(),
            },
        )?;

        Ok(ParsedTool {
            tool,
            used_auth_sources: requirements.used_services,
            used_bound_params,
        })
    }
}

struct ParsedTool {
    tool: ToolboxTool,
    used_auth_sources: BTreeSet<String>,
    used_bound_params: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_trims_trailing_slash() {
        let client = ToolboxClient::new("http://localhost:5000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
    }

    #[test]
    fn test_close_leaves_external_session_open() {
        let session = Session::new().unwrap();
        let client = ToolboxClient::builder("http://localhost:5000")
            .session(session.clone())
            .build()
            .unwrap();

        client.close();
        assert!(!session.is_closed());
    }

    #[test]
    fn test_close_owned_session_is_idempotent() {
        let client = ToolboxClient::new("http://localhost:5000").unwrap();
        client.close();
        client.close();
        assert!(client.session().is_closed());
    }

    #[test]
    fn test_load_options_builder_collects_entries() {
        let options = LoadOptions::new()
            .with_auth_token_getter("google", "token")
            .with_bound_param("limit", 10)
            .with_strict(true);

        assert!(options.strict);
        assert!(options.auth_token_getters.contains_key("google"));
        assert!(options.bound_params.contains_key("limit"));
    }
}
