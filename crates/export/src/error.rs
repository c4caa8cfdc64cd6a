use std::path::PathBuf;

use graphql_introspect::PollError;
use thiserror::Error;

use crate::{AuthError, ExitCode};

/// A rejected [`ExportOptions`](crate::ExportOptions) value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Source '{value}' is neither an http(s) URL nor an existing file")]
    UnknownSource { value: String },

    #[error("A service URL (--url) is required when the source is an executable")]
    MissingServiceUrl,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Timeout must not be negative, got {0}")]
    NegativeTimeout(i64),

    #[error("Failed to read introspection query file {}: {source}", path.display())]
    IntrospectionFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Introspection query file {} is empty", path.display())]
    EmptyIntrospectionFile { path: PathBuf },
}

impl ConfigError {
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::UnknownSource { .. } => ExitCode::UnknownSource,
            Self::MissingServiceUrl => ExitCode::MissingServiceUrl,
            Self::Auth(_) => ExitCode::InvalidAuth,
            Self::NegativeTimeout(_) => ExitCode::InvalidTimeout,
            Self::IntrospectionFile { .. } | Self::EmptyIntrospectionFile { .. } => {
                ExitCode::InvalidIntrospectionFile
            }
        }
    }
}

/// Failure to bring up the service process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} exited on start with {}", describe_exit(*code))]
    ExitedOnStart { name: String, code: Option<i32> },

    #[error("Service start cancelled")]
    Cancelled,
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(|| "no exit code".to_string(), |code| format!("exit code {code}"))
}

/// Any reason an export did not produce an SDL file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to get introspection response: {0}")]
    NoIntrospectionResponse(#[source] PollError),

    #[error("Failed to read introspection schema: {0}")]
    SchemaUnreadable(#[source] serde_json::Error),

    #[error("Failed to generate SDL: the schema rendered to an empty document")]
    EmptySdl,

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Export cancelled")]
    Cancelled,
}

impl ExportError {
    /// The exit code reported for this failure. Cancellation has none.
    #[must_use]
    pub const fn exit_code(&self) -> Option<ExitCode> {
        match self {
            Self::Config(err) => Some(err.exit_code()),
            Self::Launch(LaunchError::Cancelled) | Self::Cancelled => None,
            Self::Launch(_) => Some(ExitCode::ServiceStartFailed),
            Self::HttpClient(_) | Self::NoIntrospectionResponse(_) => {
                Some(ExitCode::NoIntrospectionResponse)
            }
            Self::SchemaUnreadable(_) | Self::EmptySdl => Some(ExitCode::SdlGenerationFailed),
            Self::Io { .. } => Some(ExitCode::OutputFailed),
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.exit_code().is_none()
    }
}

impl From<PollError> for ExportError {
    fn from(err: PollError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::NoIntrospectionResponse(err)
        }
    }
}

/// The export was cancelled, normally because its timeout elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Export cancelled")]
pub struct Cancelled;
