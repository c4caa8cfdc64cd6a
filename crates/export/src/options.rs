//! Export configuration and its validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use graphql_introspect::{PollMode, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

use crate::{AuthSpec, ConfigError};

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8088";
pub const DEFAULT_API_PATH: &str = "/graphql";

/// Output file name used when exporting from a URL without `--out`.
pub const DEFAULT_URL_OUTPUT: &str = "service.graphql";

/// Everything an export needs, as given by the user.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// An http(s) URL of a GraphQL endpoint, or the path of a service executable.
    pub source: String,
    /// The URL the started service listens on. Process mode only.
    pub service_url: String,
    /// Path of the GraphQL endpoint relative to `service_url`.
    pub api_path: String,
    /// Arguments appended verbatim to the service command line.
    pub extra_args: Vec<String>,
    /// `scheme|credential`, or the path of a file containing it.
    pub auth: Option<String>,
    pub output: Option<PathBuf>,
    pub include_descriptions: bool,
    pub verbose: bool,
    /// Overall timeout in seconds. 0 means unlimited.
    pub timeout_secs: i64,
    /// File holding a custom introspection query that replaces the built-in variants.
    pub introspection_file: Option<PathBuf>,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_on_graphql_errors: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            source: String::new(),
            service_url: DEFAULT_SERVICE_URL.to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            extra_args: Vec::new(),
            auth: None,
            output: None,
            include_descriptions: false,
            verbose: false,
            timeout_secs: 0,
            introspection_file: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_on_graphql_errors: false,
        }
    }
}

impl ExportOptions {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Checks the options and resolves everything that must be read from disk.
    ///
    /// Rules are checked in order: source, service URL, authentication,
    /// timeout, introspection file. The first violation is returned.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] of the first rule that fails.
    pub fn validate(&self) -> Result<ValidatedExport, ConfigError> {
        let target = if is_url_source(&self.source) {
            Target::Url(self.source.clone())
        } else {
            let executable = PathBuf::from(&self.source);
            if !executable.is_file() {
                return Err(ConfigError::UnknownSource {
                    value: self.source.clone(),
                });
            }
            if self.service_url.trim().is_empty() {
                return Err(ConfigError::MissingServiceUrl);
            }
            Target::Process {
                executable,
                service_url: self.service_url.clone(),
                extra_args: self.extra_args.clone(),
            }
        };

        let auth = self
            .auth
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(AuthSpec::resolve)
            .transpose()?;

        let timeout = match self.timeout_secs {
            secs if secs < 0 => return Err(ConfigError::NegativeTimeout(secs)),
            0 => None,
            secs => Some(Duration::from_secs(secs.unsigned_abs())),
        };

        let custom_query = self
            .introspection_file
            .as_deref()
            .map(read_introspection_file)
            .transpose()?;

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| target.default_output(&self.source));

        Ok(ValidatedExport {
            endpoint: target.endpoint(&self.api_path),
            target,
            auth,
            timeout,
            custom_query,
            output,
        })
    }
}

fn read_introspection_file(path: &Path) -> Result<String, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::IntrospectionFile {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(ConfigError::EmptyIntrospectionFile {
            path: path.to_path_buf(),
        });
    }
    Ok(text)
}

/// Whether `source` selects direct-URL mode. The scheme is matched
/// case-insensitively.
#[must_use]
pub fn is_url_source(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Where the schema comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// An endpoint that is already up.
    Url(String),
    /// An executable to start before introspecting it.
    Process {
        executable: PathBuf,
        service_url: String,
        extra_args: Vec<String>,
    },
}

impl Target {
    /// The GraphQL endpoint to introspect.
    #[must_use]
    pub fn endpoint(&self, api_path: &str) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Process { service_url, .. } => {
                if api_path.starts_with('/') {
                    format!("{}{api_path}", service_url.trim_end_matches('/'))
                } else {
                    format!("{service_url}{api_path}")
                }
            }
        }
    }

    #[must_use]
    pub const fn poll_mode(&self) -> PollMode {
        match self {
            Self::Url(_) => PollMode::DirectUrl,
            Self::Process { .. } => PollMode::Process,
        }
    }

    fn default_output(&self, source: &str) -> PathBuf {
        match self {
            Self::Url(_) => PathBuf::from(DEFAULT_URL_OUTPUT),
            Self::Process { .. } => PathBuf::from(format!("{source}.graphql")),
        }
    }
}

/// Options that passed validation, with files already read.
#[derive(Debug, Clone)]
pub struct ValidatedExport {
    pub target: Target,
    pub endpoint: String,
    pub auth: Option<AuthSpec>,
    pub timeout: Option<Duration>,
    pub custom_query: Option<String>,
    pub output: PathBuf,
}
