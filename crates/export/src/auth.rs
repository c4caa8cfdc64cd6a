//! Authentication spec: `scheme|credential`, given literally or read from a file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use reqwest::header::HeaderValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("The value of the --auth option must be specified in the scheme|parameter format")]
    Malformed,

    #[error("The --auth value cannot be sent as an Authorization header")]
    InvalidHeader,

    #[error("Failed to read authentication file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An `Authorization` scheme and credential, e.g. `bearer|<token>` or
/// `basic|user:secret`.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSpec {
    pub scheme: String,
    pub credential: String,
}

impl AuthSpec {
    /// Resolves an `--auth` value. When the value names an existing file,
    /// the file's content is parsed instead.
    pub fn resolve(value: &str) -> Result<Self, AuthError> {
        let path = Path::new(value);
        if path.is_file() {
            let content = std::fs::read_to_string(path).map_err(|source| AuthError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            return content.trim().parse();
        }
        value.parse()
    }

    /// The `Authorization` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("{} {}", self.scheme, self.credential)
    }
}

impl FromStr for AuthSpec {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('|');
        let (Some(scheme), Some(credential), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed);
        };
        if scheme.is_empty() || credential.is_empty() {
            return Err(AuthError::Malformed);
        }

        let spec = Self {
            scheme: scheme.to_string(),
            credential: credential.to_string(),
        };
        HeaderValue::from_str(&spec.header_value()).map_err(|_| AuthError::InvalidHeader)?;
        Ok(spec)
    }
}

// Keeps credentials out of logs.
impl std::fmt::Debug for AuthSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSpec")
            .field("scheme", &self.scheme)
            .field("credential", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_bearer() {
        let spec: AuthSpec = "bearer|05c9b6cddb96df2bf854d13acc2fcaf85ca181ec".parse().unwrap();
        assert_eq!(spec.scheme, "bearer");
        assert_eq!(spec.header_value(), "bearer 05c9b6cddb96df2bf854d13acc2fcaf85ca181ec");
    }

    #[test]
    fn test_parse_basic_keeps_colon() {
        let spec: AuthSpec = "basic|user:secret".parse().unwrap();
        assert_eq!(spec.credential, "user:secret");
    }

    #[test]
    fn test_malformed_values() {
        for value in ["bearer", "bearer|", "|token", "a|b|c", ""] {
            assert!(
                matches!(value.parse::<AuthSpec>(), Err(AuthError::Malformed)),
                "{value}"
            );
        }
    }

    #[test]
    fn test_header_unsafe_credential() {
        assert!(matches!(
            "bearer|abc\ndef".parse::<AuthSpec>(),
            Err(AuthError::InvalidHeader)
        ));
    }

    #[test]
    fn test_resolve_from_file_trims_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bearer|from-file").unwrap();

        let spec = AuthSpec::resolve(file.path().to_str().unwrap()).unwrap();
        assert_eq!(spec.scheme, "bearer");
        assert_eq!(spec.credential, "from-file");
    }

    #[test]
    fn test_resolve_literal() {
        let spec = AuthSpec::resolve("basic|user:secret").unwrap();
        assert_eq!(spec.scheme, "basic");
    }

    #[test]
    fn test_debug_redacts_credential() {
        let spec: AuthSpec = "bearer|secret-token".parse().unwrap();
        let debug = format!("{spec:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("bearer"));
    }
}
