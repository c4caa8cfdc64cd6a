//! Export the schema of a GraphQL service as SDL.
//!
//! The source is either the URL of a running GraphQL endpoint or the path of
//! a service executable. In the second case the service is started, polled
//! until its endpoint answers introspection, and killed afterwards whatever
//! the outcome.
//!
//! ```no_run
//! use graphql_sdl_export::{ExportOptions, Exporter};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut options = ExportOptions::new("./bin/Orders.Api.dll");
//! options.service_url = "http://localhost:5000".to_string();
//! options.timeout_secs = 120;
//!
//! let code = Exporter::new(options).execute().await;
//! # let _ = code;
//! # }
//! ```

mod auth;
mod error;
mod exit_code;
mod launcher;
mod options;
mod pipeline;

pub use auth::{AuthError, AuthSpec};
pub use graphql_introspect::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
pub use error::{Cancelled, ConfigError, ExportError, LaunchError};
pub use exit_code::ExitCode;
pub use launcher::{
    LaunchSpec, ServiceHandle, ServiceLauncher, Termination, DEFAULT_STARTUP_PROBE,
    RESTRICTED_ENVIRONMENT_ARG,
};
pub use options::{
    is_url_source, ExportOptions, Target, ValidatedExport, DEFAULT_API_PATH, DEFAULT_SERVICE_URL,
    DEFAULT_URL_OUTPUT,
};
pub use pipeline::{default_http_client, Exporter, HttpClientFactory, QueryRewriter, USER_AGENT};
