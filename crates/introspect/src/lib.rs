//! GraphQL introspection acquisition and SDL rendering.
//!
//! This crate fetches a schema from a GraphQL endpoint via introspection and
//! renders it as Schema Definition Language (SDL). Introspection tries a
//! fixed list of query variants, from the newest introspection features to
//! the oldest, so servers implementing older revisions still answer.
//!
//! # Examples
//!
//! ## One-step introspection to SDL
//!
//! ```no_run
//! use graphql_introspect::{introspect_url_to_sdl, SdlOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let sdl = introspect_url_to_sdl("https://api.example.com/graphql", &SdlOptions::default()).await?;
//!     println!("{}", sdl);
//!     Ok(())
//! }
//! ```
//!
//! ## Polling a service that is still starting
//!
//! ```no_run
//! use graphql_introspect::{
//!     introspection_queries, render_sdl, HttpTransport, IntrospectionPoller,
//!     IntrospectionSchema, PollMode, SdlOptions,
//! };
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let poller = IntrospectionPoller::new(HttpTransport::default(), PollMode::Process)
//!         .with_max_retries(5)
//!         .with_retry_delay(Duration::from_secs(1));
//!
//!     let polled = poller
//!         .poll("http://localhost:8088/graphql", &introspection_queries(None), &CancellationToken::new())
//!         .await?;
//!
//!     if let Some(schema) = polled.schema() {
//!         let schema = IntrospectionSchema::from_value(schema)?;
//!         println!("{}", render_sdl(&schema, &SdlOptions::with_descriptions(true)));
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod poller;
mod query;
mod sdl;
mod transport;
mod types;

pub use error::{PollError, Result, TransportError};
pub use poller::{
    IntrospectionPoller, PollMode, PolledSchema, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY,
};
pub use query::{introspection_queries, IntrospectionQuery, QueryVariant, OPERATION_NAME};
pub use sdl::{render_sdl, SdlOptions};
pub use transport::{HttpTransport, Transport};
pub use types::*;

use tokio_util::sync::CancellationToken;

/// Introspects a reachable GraphQL endpoint and renders the result as SDL.
///
/// Tries every built-in query variant once, without retries or timeout.
///
/// # Errors
///
/// Returns an error if:
/// - The endpoint cannot be reached
/// - No query variant produced a schema
/// - The `__schema` node does not match the introspection model
pub async fn introspect_url_to_sdl(
    url: &str,
    options: &SdlOptions,
) -> std::result::Result<String, Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!(url, "Starting introspection");
    let poller = IntrospectionPoller::new(HttpTransport::default(), PollMode::DirectUrl);
    let polled = poller
        .poll(url, &introspection_queries(None), &CancellationToken::new())
        .await?;

    let schema = polled
        .schema()
        .ok_or("introspection response has no schema")?;
    let schema = IntrospectionSchema::from_value(schema)?;

    tracing::debug!("Converting introspection to SDL");
    let sdl = render_sdl(&schema, options);
    tracing::info!(sdl_length = sdl.len(), "Introspection complete");
    Ok(sdl)
}
