use thiserror::Error;

use crate::GraphQLError;

pub type Result<T, E = TransportError> = std::result::Result<T, E>;

/// Failure of a single GraphQL HTTP exchange.
///
/// Only connection-level problems and malformed bodies end up here; a
/// non-success status with a parseable body is still a response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse GraphQL response (HTTP {status}): {message}")]
    Parse { status: u16, message: String },

    #[error("Invalid endpoint URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Request cancelled")]
    Cancelled,
}

/// Terminal outcome of an introspection polling sequence that produced no schema.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Introspection cancelled")]
    Cancelled,

    #[error("GraphQL endpoint {url} is unreachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("Failed to load data from {url} after {attempts} attempts: {source}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("No introspection query variant produced a usable schema ({} errors)", errors.len())]
    NoUsableResponse { errors: Vec<GraphQLError> },
}

impl PollError {
    /// Whether the sequence stopped because the cancellation token fired.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
