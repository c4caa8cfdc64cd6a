mod export;

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use graphql_sdl_export::{DEFAULT_API_PATH, DEFAULT_MAX_RETRIES, DEFAULT_SERVICE_URL};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::export::ExportArgs;

#[derive(Parser)]
#[command(name = "sdlexport")]
#[command(about = "Export the schema of a GraphQL service as SDL", long_about = None)]
#[command(version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// GraphQL endpoint (http:// or https://) or path of the service executable to start
    #[arg(long, value_name = "URL|FILE")]
    source: String,

    /// URL the started service listens on
    #[arg(long = "url", value_name = "URL", default_value = DEFAULT_SERVICE_URL)]
    service_url: String,

    /// Path of the GraphQL endpoint relative to --url
    #[arg(long, value_name = "PATH", default_value = DEFAULT_API_PATH)]
    api_path: String,

    /// Additional arguments for the started service, separated by whitespace
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    args: Option<String>,

    /// Authentication as scheme|credential, or a file containing it
    #[arg(long, value_name = "AUTH")]
    auth: Option<String>,

    /// Output SDL file [default: service.graphql, or <SOURCE>.graphql for executables]
    #[arg(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Include descriptions in the generated SDL
    #[arg(long)]
    include_descriptions: bool,

    /// Log requests, service output, the introspection response and the SDL
    #[arg(short, long)]
    verbose: bool,

    /// Overall timeout in seconds, 0 for none
    #[arg(long, value_name = "SECONDS", default_value_t = 0, allow_negative_numbers = true)]
    timeout: i64,

    /// File with a custom introspection query replacing the built-in ones
    #[arg(long, value_name = "FILE")]
    introspection_file: Option<PathBuf>,

    /// Introspection attempts while the started service comes up
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..))]
    retries: u32,

    /// Force colored output even when not a TTY
    #[arg(long, conflicts_with = "no_color")]
    color: bool,

    /// Disable colored output
    #[arg(long, conflicts_with = "color")]
    no_color: bool,
}

impl From<Cli> for ExportArgs {
    fn from(cli: Cli) -> Self {
        Self {
            source: cli.source,
            service_url: cli.service_url,
            api_path: cli.api_path,
            args: cli.args,
            auth: cli.auth,
            out: cli.out,
            include_descriptions: cli.include_descriptions,
            verbose: cli.verbose,
            timeout: cli.timeout,
            introspection_file: cli.introspection_file,
            retries: cli.retries,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;
    configure_colors(cli.color, cli.no_color);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling export");
                cancel.cancel();
            }
        }
    });

    let code = export::run(cli.into(), &cancel).await;
    std::process::exit(code);
}

/// Logs to stderr. `RUST_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose))),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,graphql_introspect=debug,graphql_sdl_export=debug,sdlexport=debug"
    } else {
        "info"
    }
}

/// Configure colored output based on flags and environment variables.
///
/// Priority order (highest to lowest):
/// 1. `--color` flag (force colors on)
/// 2. `--no-color` flag (force colors off)
/// 3. `NO_COLOR` environment variable (if set to any value, disable colors)
/// 4. `CLICOLOR_FORCE` environment variable (if set to non-zero, force colors)
/// 5. `CLICOLOR` environment variable (if set to "0", disable colors)
/// 6. Default: colors enabled if stdout is a TTY (handled by `colored` crate)
///
/// See: <https://no-color.org/> and <https://bixense.com/clicolors/>
fn configure_colors(force_color: bool, no_color: bool) {
    if let Some(enabled) = color_override(force_color, no_color, |name| std::env::var_os(name)) {
        colored::control::set_override(enabled);
    }
}

/// The colour override implied by flags and environment, if any.
fn color_override(
    force_color: bool,
    no_color: bool,
    env: impl Fn(&str) -> Option<OsString>,
) -> Option<bool> {
    if force_color {
        return Some(true);
    }
    if no_color || env("NO_COLOR").is_some() {
        return Some(false);
    }
    if let Some(force) = env("CLICOLOR_FORCE") {
        return (!force.is_empty() && force != "0").then_some(true);
    }
    match env("CLICOLOR") {
        Some(value) if value == "0" => Some(false),
        _ => None,
    }
}
