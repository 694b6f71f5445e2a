//! Toolbox client core
//!
//! Loads tool schemas from a toolbox server and exposes them as callable
//! [`ToolboxTool`]s with parameter binding and authentication gating:
//! - [`ToolboxClient`] fetches tools and toolsets
//! - [`ToolboxTool`] validates arguments and invokes the remote tool
//! - [`ToolboxSyncClient`] wraps both behind a blocking API

mod client;
mod error;
mod headers;
mod protocol;
mod resolver;
mod session;
mod sync;
mod tool;
mod value;

pub use client::{LoadOptions, ToolboxClient, ToolboxClientBuilder};
pub use error::{BoxError, Result, ToolboxError};
pub use headers::auth_header_name;
pub use protocol::{ManifestSchema, ParameterSchema, ParameterType, ToolSchema};
pub use resolver::{identify_auth_requirements, unused_names, AuthRequirements};
pub use session::Session;
pub use sync::{BackgroundLoop, ToolboxSyncClient, ToolboxSyncTool};
pub use tool::{CallArgs, ToolParts, ToolboxTool};
pub use value::{HeaderValue, ParamValue, ProviderFuture, TokenGetter, ValueSource};
