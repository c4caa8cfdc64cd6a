//! Exit codes for an SDL export.
//!
//! Each failure class gets a distinct code so scripts and CI systems can tell
//! a configuration mistake from an unreachable service or a broken schema.

/// Exit codes produced by [`Exporter::execute`](crate::Exporter::execute).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// SDL was written to the output file
    Success = 0,
    /// The source is neither an http(s) URL nor an existing file
    UnknownSource = 1,
    /// Process mode without a service URL
    MissingServiceUrl = 2,
    /// The authentication spec is not in `scheme|credential` format
    InvalidAuth = 3,
    /// The timeout is negative
    InvalidTimeout = 4,
    /// The custom introspection query file is unreadable or empty
    InvalidIntrospectionFile = 5,
    /// No usable introspection response was obtained
    NoIntrospectionResponse = 100,
    /// The service process could not be started or exited on start
    ServiceStartFailed = 101,
    /// The schema could not be turned into SDL, or the SDL was empty
    SdlGenerationFailed = 200,
    /// The output directory or file could not be written
    OutputFailed = 201,
}

impl ExitCode {
    /// Exit the process with this exit code.
    pub fn exit(self) -> ! {
        std::process::exit(self as i32)
    }

    /// Get the numeric value of this exit code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::UnknownSource => write!(f, "unknown source"),
            Self::MissingServiceUrl => write!(f, "missing service URL"),
            Self::InvalidAuth => write!(f, "invalid authentication"),
            Self::InvalidTimeout => write!(f, "invalid timeout"),
            Self::InvalidIntrospectionFile => write!(f, "invalid introspection file"),
            Self::NoIntrospectionResponse => write!(f, "failed to get introspection response"),
            Self::ServiceStartFailed => write!(f, "service failed to start"),
            Self::SdlGenerationFailed => write!(f, "failed to generate SDL"),
            Self::OutputFailed => write!(f, "failed to write output"),
        }
    }
}
