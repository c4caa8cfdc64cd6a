//! The export command: options from arguments, run, summary.

use std::path::PathBuf;
use std::time::Instant;

use colored::Colorize;
use graphql_sdl_export::{Cancelled, ExportOptions, Exporter};
use tokio_util::sync::CancellationToken;

/// Exit status used when the export is cancelled by `--timeout` or Ctrl-C.
pub const CANCELLED_EXIT_CODE: i32 = 124;

/// Export arguments as parsed from the command line.
#[derive(Debug, Clone, Default)]
pub struct ExportArgs {
    pub source: String,
    pub service_url: String,
    pub api_path: String,
    pub args: Option<String>,
    pub auth: Option<String>,
    pub out: Option<PathBuf>,
    pub include_descriptions: bool,
    pub verbose: bool,
    pub timeout: i64,
    pub introspection_file: Option<PathBuf>,
    pub retries: u32,
}

impl ExportArgs {
    pub fn into_options(self) -> ExportOptions {
        ExportOptions {
            extra_args: split_args(self.args.as_deref()),
            service_url: self.service_url,
            api_path: self.api_path,
            auth: self.auth,
            output: self.out,
            include_descriptions: self.include_descriptions,
            verbose: self.verbose,
            timeout_secs: self.timeout,
            introspection_file: self.introspection_file,
            max_retries: self.retries,
            ..ExportOptions::new(self.source)
        }
    }
}

/// Splits `--args` on whitespace. Quoting is not interpreted.
fn split_args(args: Option<&str>) -> Vec<String> {
    args.map(|args| args.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Runs the export and returns the process exit status. Failures are
/// logged by the exporter; this prints the summary line.
#[tracing::instrument(skip_all, fields(source = %args.source))]
pub async fn run(args: ExportArgs, cancel: &CancellationToken) -> i32 {
    let start_time = Instant::now();
    let exporter = Exporter::new(args.into_options());

    match exporter.execute_with(cancel).await {
        Ok(code) if code.is_success() => {
            println!("{} SDL exported", "✓".green());
            println!("  {} {:.2}s", "⏱".dimmed(), start_time.elapsed().as_secs_f64());
            code.code()
        }
        Ok(code) => {
            eprintln!(
                "{} {} (exit code {})",
                "✗".red(),
                code.to_string().red(),
                code.code()
            );
            code.code()
        }
        Err(Cancelled) => {
            eprintln!("{} {}", "✗".red(), "Export cancelled".red());
            CANCELLED_EXIT_CODE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_args() {
        assert_eq!(
            split_args(Some("--environment Test  --seed\t42")),
            vec!["--environment", "Test", "--seed", "42"]
        );
        assert!(split_args(Some("   ")).is_empty());
        assert!(split_args(None).is_empty());
    }

    #[test]
    fn test_into_options() {
        let options = ExportArgs {
            source: "Orders.Api.dll".into(),
            service_url: "http://localhost:5000".into(),
            api_path: "/api/graphql".into(),
            args: Some("--environment Test".into()),
            out: Some("schema.graphql".into()),
            timeout: 60,
            retries: 3,
            ..ExportArgs::default()
        }
        .into_options();

        assert_eq!(options.source, "Orders.Api.dll");
        assert_eq!(options.service_url, "http://localhost:5000");
        assert_eq!(options.api_path, "/api/graphql");
        assert_eq!(options.extra_args, vec!["--environment", "Test"]);
        assert_eq!(options.output, Some(PathBuf::from("schema.graphql")));
        assert_eq!(options.timeout_secs, 60);
        assert_eq!(options.max_retries, 3);
        assert!(!options.retry_on_graphql_errors);
    }

    #[tokio::test]
    async fn test_run_unknown_source() {
        let args = ExportArgs {
            source: "/no/such/service.dll".into(),
            service_url: "http://localhost:8088".into(),
            api_path: "/graphql".into(),
            retries: 1,
            ..ExportArgs::default()
        };
        assert_eq!(run(args, &CancellationToken::new()).await, 1);
    }

    #[tokio::test]
    async fn test_run_unreachable_url() {
        let dir = tempfile::tempdir().unwrap();
        let args = ExportArgs {
            source: "http://127.0.0.1:1/graphql".into(),
            out: Some(dir.path().join("service.graphql")),
            retries: 1,
            ..ExportArgs::default()
        };
        assert_eq!(run(args, &CancellationToken::new()).await, 100);
        assert!(!dir.path().join("service.graphql").exists());
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let args = ExportArgs {
            source: "http://127.0.0.1:1/graphql".into(),
            out: Some(dir.path().join("service.graphql")),
            retries: 1,
            ..ExportArgs::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(run(args, &cancel).await, CANCELLED_EXIT_CODE);
    }
}
