//! Blocking facade over the async client
//!
//! All async work runs on one process-wide background thread that owns a
//! current-thread tokio runtime. Callers enqueue a job and block until its
//! output comes back. These types must not be used from inside an async
//! context.

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::client::{LoadOptions, ToolboxClient, ToolboxClientBuilder};
use crate::error::{Result, ToolboxError};
use crate::protocol::ParameterSchema;
use crate::tool::{CallArgs, ToolboxTool};
use crate::value::{HeaderValue, ParamValue, TokenGetter};

type Job = BoxFuture<'static, ()>;

static BACKGROUND: Lazy<std::result::Result<BackgroundLoop, String>> =
    Lazy::new(BackgroundLoop::start);

/// Dedicated executor thread with a FIFO job queue.
#[derive(Debug)]
pub struct BackgroundLoop {
    jobs: mpsc::UnboundedSender<Job>,
}

impl BackgroundLoop {
    fn start() -> std::result::Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("failed to build runtime: {e}"))?;
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job>();

        std::thread::Builder::new()
            .name("toolbox-sync".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(job) = queue.recv().await {
                        tokio::spawn(job);
                    }
                });
            })
            .map_err(|e| format!("failed to spawn executor thread: {e}"))?;

        tracing::debug!("started toolbox background executor");
        Ok(Self { jobs })
    }

    /// The shared executor, started on first use.
    pub fn global() -> Result<&'static BackgroundLoop> {
        BACKGROUND
            .as_ref()
            .map_err(|e| ToolboxError::Executor(e.clone()))
    }

    /// Runs `future` on the executor and blocks until it completes.
    pub fn run<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (done, output) = oneshot::channel();
        self.jobs
            .send(Box::pin(async move {
                let _ = done.send(future.await);
            }))
            .map_err(|_| ToolboxError::Executor("executor thread has stopped".to_string()))?;

        output
            .blocking_recv()
            .map_err(|_| ToolboxError::Executor("job dropped before completion".to_string()))?
    }
}

/// Blocking counterpart of [`ToolboxClient`].
#[derive(Debug, Clone)]
pub struct ToolboxSyncClient {
    executor: &'static BackgroundLoop,
    client: Arc<ToolboxClient>,
}

impl ToolboxSyncClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::from_builder(ToolboxClient::builder(base_url))
    }

    pub fn from_builder(builder: ToolboxClientBuilder) -> Result<Self> {
        Ok(Self {
            executor: BackgroundLoop::global()?,
            client: Arc::new(builder.build()?),
        })
    }

    pub fn client(&self) -> &ToolboxClient {
        &self.client
    }

    pub fn load_tool(&self, name: &str, options: LoadOptions) -> Result<ToolboxSyncTool> {
        let client = Arc::clone(&self.client);
        let name = name.to_string();
        let tool = self
            .executor
            .run(async move { client.load_tool(&name, options).await })?;
        Ok(self.wrap(tool))
    }

    pub fn load_toolset(
        &self,
        name: Option<&str>,
        options: LoadOptions,
    ) -> Result<Vec<ToolboxSyncTool>> {
        let client = Arc::clone(&self.client);
        let name = name.map(str::to_string);
        let tools = self
            .executor
            .run(async move { client.load_toolset(name.as_deref(), options).await })?;
        Ok(tools.into_iter().map(|tool| self.wrap(tool)).collect())
    }

    pub fn close(&self) {
        self.client.close();
    }

    fn wrap(&self, tool: ToolboxTool) -> ToolboxSyncTool {
        ToolboxSyncTool {
            executor: self.executor,
            tool,
        }
    }
}

/// Blocking counterpart of [`ToolboxTool`].
#[derive(Debug, Clone)]
pub struct ToolboxSyncTool {
    executor: &'static BackgroundLoop,
    tool: ToolboxTool,
}

impl ToolboxSyncTool {
    pub fn call(&self, args: CallArgs) -> Result<String> {
        let tool = self.tool.clone();
        self.executor.run(async move { tool.call(args).await })
    }

    pub fn bind_param(&self, name: impl Into<String>, value: impl Into<ParamValue>) -> Result<Self> {
        Ok(self.derive(self.tool.bind_param(name, value)?))
    }

    pub fn bind_params<I, K, V>(&self, params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        Ok(self.derive(self.tool.bind_params(params)?))
    }

    pub fn add_auth_token_getter(
        &self,
        auth_source: impl Into<String>,
        getter: impl Into<TokenGetter>,
    ) -> Result<Self> {
        Ok(self.derive(self.tool.add_auth_token_getter(auth_source, getter)?))
    }

    pub fn add_auth_token_getters<I, K, G>(&self, getters: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, G)>,
        K: Into<String>,
        G: Into<TokenGetter>,
    {
        Ok(self.derive(self.tool.add_auth_token_getters(getters)?))
    }

    pub fn name(&self) -> &str {
        self.tool.name()
    }

    pub fn description(&self) -> &str {
        self.tool.description()
    }

    pub fn params(&self) -> &[ParameterSchema] {
        self.tool.params()
    }

    pub fn bound_params(&self) -> &BTreeMap<String, ParamValue> {
        self.tool.bound_params()
    }

    pub fn required_authn_params(&self) -> &BTreeMap<String, Vec<String>> {
        self.tool.required_authn_params()
    }

    pub fn required_authz_tokens(&self) -> &[String] {
        self.tool.required_authz_tokens()
    }

    pub fn auth_token_getters(&self) -> &BTreeMap<String, TokenGetter> {
        self.tool.auth_token_getters()
    }

    pub fn client_headers(&self) -> &BTreeMap<String, HeaderValue> {
        self.tool.client_headers()
    }

    pub fn doc(&self) -> String {
        self.tool.doc()
    }

    pub fn as_async(&self) -> &ToolboxTool {
        &self.tool
    }

    fn derive(&self, tool: ToolboxTool) -> Self {
        Self {
            executor: self.executor,
            tool,
        }
    }
}
