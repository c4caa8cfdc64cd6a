//! Pipeline Coordinator: validate, launch, introspect, render, write.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use graphql_introspect::{
    introspection_queries, render_sdl, HttpTransport, IntrospectionPoller, IntrospectionQuery,
    IntrospectionSchema, PollError, PolledSchema, SdlOptions,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    AuthSpec, Cancelled, ExitCode, ExportError, ExportOptions, LaunchSpec, ServiceLauncher,
    Target, Termination, ValidatedExport,
};

/// `User-Agent` sent by the default HTTP client.
pub const USER_AGENT: &str = concat!("graphql-sdl-export/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client used for introspection.
pub type HttpClientFactory =
    dyn Fn(&ExportOptions, Option<&AuthSpec>) -> reqwest::Result<reqwest::Client> + Send + Sync;

/// Rewrites an introspection query before it is sent.
pub type QueryRewriter = dyn Fn(&str) -> String + Send + Sync;

/// The default [`HttpClientFactory`]: sets the `User-Agent` and, when given,
/// the `Authorization` header.
pub fn default_http_client(
    _options: &ExportOptions,
    auth: Option<&AuthSpec>,
) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(auth) = auth {
        // AuthSpec parsing already rejected values that are not valid headers.
        if let Ok(mut value) = HeaderValue::from_str(&auth.header_value()) {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
    }

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
}

/// Runs one SDL export.
///
/// # Examples
///
/// ```no_run
/// use graphql_sdl_export::{ExportOptions, Exporter};
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut options = ExportOptions::new("https://api.example.com/graphql");
/// options.output = Some("schema/api.graphql".into());
///
/// match Exporter::new(options).execute().await {
///     Ok(code) => code.exit(),
///     Err(cancelled) => eprintln!("{cancelled}"),
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct Exporter {
    options: ExportOptions,
    client_factory: Arc<HttpClientFactory>,
    query_rewriter: Option<Arc<QueryRewriter>>,
    launcher: ServiceLauncher,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("options", &self.options)
            .field("launcher", &self.launcher)
            .field("query_rewriter", &self.query_rewriter.is_some())
            .finish_non_exhaustive()
    }
}

impl Exporter {
    #[must_use]
    pub fn new(options: ExportOptions) -> Self {
        Self {
            options,
            client_factory: Arc::new(default_http_client),
            query_rewriter: None,
            launcher: ServiceLauncher::default(),
        }
    }

    /// Replaces the HTTP client construction, e.g. to add headers or a proxy.
    #[must_use]
    pub fn with_http_client_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&ExportOptions, Option<&AuthSpec>) -> reqwest::Result<reqwest::Client>
            + Send
            + Sync
            + 'static,
    {
        self.client_factory = Arc::new(factory);
        self
    }

    /// Rewrites every introspection query, the custom one included, before
    /// it is sent.
    #[must_use]
    pub fn with_query_rewriter<F>(mut self, rewriter: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.query_rewriter = Some(Arc::new(rewriter));
        self
    }

    #[must_use]
    pub fn with_launcher(mut self, launcher: ServiceLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    #[must_use]
    pub const fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Runs the export and resolves the outcome to an exit code.
    ///
    /// Failures are logged. Cancellation, normally the timeout elapsing, is
    /// returned as `Err` since it has no exit code of its own.
    pub async fn execute(&self) -> Result<ExitCode, Cancelled> {
        self.execute_with(&CancellationToken::new()).await
    }

    /// Like [`execute`](Self::execute), additionally stopping when `cancel`
    /// fires.
    pub async fn execute_with(&self, cancel: &CancellationToken) -> Result<ExitCode, Cancelled> {
        match self.run(cancel).await {
            Ok(_) => Ok(ExitCode::Success),
            Err(err) => match err.exit_code() {
                Some(code) => {
                    self.report(&err, code);
                    Ok(code)
                }
                None => {
                    tracing::warn!("Export cancelled");
                    Err(Cancelled)
                }
            },
        }
    }

    fn report(&self, err: &ExportError, code: ExitCode) {
        if self.options.verbose {
            let mut message = err.to_string();
            let mut source = std::error::Error::source(err);
            while let Some(cause) = source {
                write!(message, "\n  caused by: {cause}").unwrap();
                source = cause.source();
            }
            tracing::error!(exit_code = code.code(), "{message}");
        } else {
            tracing::error!(exit_code = code.code(), "{err}");
        }
    }

    /// Runs the export and returns the path the SDL was written to.
    ///
    /// # Errors
    ///
    /// Returns the first failure; [`ExportError::exit_code`] classifies it.
    /// No output file is left behind on failure.
    #[tracing::instrument(skip_all, fields(source = %self.options.source))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<PathBuf, ExportError> {
        let started = Instant::now();
        let validated = self.options.validate()?;

        let cancel = cancel.child_token();
        let _deadline = Deadline::start(validated.timeout, &cancel);

        tracing::info!("Start exporting SDL from {}", self.options.source);
        let output_dir = create_output_dir(&validated.output)?;
        tracing::info!("Output directory: {}", output_dir.display());

        let polled = self.introspect(&validated, &cancel).await;
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        let polled = polled?;

        let sdl = self.generate_sdl(&polled)?;

        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        write_sdl(&validated.output, &sdl)?;

        tracing::info!(
            query = %polled.query,
            attempt = polled.attempt,
            "SDL was successfully written to {}, generation completed in {}",
            validated.output.display(),
            format_elapsed(started.elapsed())
        );
        Ok(validated.output)
    }

    async fn introspect(
        &self,
        validated: &ValidatedExport,
        cancel: &CancellationToken,
    ) -> Result<PolledSchema, ExportError> {
        let client = (self.client_factory)(&self.options, validated.auth.as_ref())
            .map_err(ExportError::HttpClient)?;
        let poller = IntrospectionPoller::new(HttpTransport::new(client), validated.target.poll_mode())
            .with_max_retries(self.options.max_retries)
            .with_retry_delay(self.options.retry_delay)
            .with_retry_on_graphql_errors(self.options.retry_on_graphql_errors);
        let queries = self.queries(validated.custom_query.clone());

        match &validated.target {
            Target::Url(_) => Ok(poller.poll(&validated.endpoint, &queries, cancel).await?),
            Target::Process {
                executable,
                service_url,
                extra_args,
            } => {
                let spec = LaunchSpec::for_service(executable, service_url, extra_args)?;
                let service = self.launcher.launch(&spec, cancel).await?;

                let polled = poller.poll(&validated.endpoint, &queries, cancel).await;

                if let Termination::KillFailed(reason) = service.stop().await {
                    tracing::warn!(reason, "Service may still be running");
                }
                Ok(polled?)
            }
        }
    }

    fn queries(&self, custom: Option<String>) -> Vec<IntrospectionQuery> {
        let queries = introspection_queries(custom);
        match &self.query_rewriter {
            Some(rewriter) => queries
                .into_iter()
                .map(|query| query.rewrite(|text| rewriter(text)))
                .collect(),
            None => queries,
        }
    }

    fn generate_sdl(&self, polled: &PolledSchema) -> Result<String, ExportError> {
        let value = polled.schema().ok_or_else(|| {
            ExportError::NoIntrospectionResponse(PollError::NoUsableResponse {
                errors: polled.response.errors().to_vec(),
            })
        })?;
        let schema = IntrospectionSchema::from_value(value).map_err(ExportError::SchemaUnreadable)?;

        if self.options.verbose {
            tracing::info!(
                types = schema.types.len(),
                directives = schema.directives.len(),
                "Introspection response received"
            );
            if let Ok(json) = serde_json::to_string_pretty(value) {
                tracing::info!("Introspection schema:\n{json}");
            }
        }

        let options = SdlOptions::with_descriptions(self.options.include_descriptions);
        let sdl = render_sdl(&schema, &options);
        if sdl.trim().is_empty() {
            return Err(ExportError::EmptySdl);
        }

        if self.options.verbose {
            tracing::info!("SDL:\n{sdl}");
        }
        Ok(sdl)
    }
}

/// Cancels the token once the timeout elapses, unless dropped first.
struct Deadline(Option<JoinHandle<()>>);

impl Deadline {
    fn start(timeout: Option<Duration>, cancel: &CancellationToken) -> Self {
        Self(timeout.map(|timeout| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                tracing::warn!(timeout_secs = timeout.as_secs(), "Timeout elapsed");
                cancel.cancel();
            })
        }))
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        if let Some(timer) = self.0.take() {
            timer.abort();
        }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn create_output_dir(output: &Path) -> Result<PathBuf, ExportError> {
    let dir = parent_dir(output);
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf()))
}

/// Writes through a temporary file in the same directory, so a failed write
/// never leaves a partial schema behind.
fn write_sdl(path: &Path, sdl: &str) -> Result<(), ExportError> {
    let io_error = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tempfile::NamedTempFile::new_in(parent_dir(path)).map_err(io_error)?;
    file.write_all(sdl.as_bytes()).map_err(io_error)?;
    file.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:02} sec.",
        secs / 3600,
        secs / 60 % 60,
        secs % 60,
        elapsed.subsec_millis() / 10
    )
}
