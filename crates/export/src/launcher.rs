//! Service Launcher: starts the service that hosts the GraphQL endpoint.
//!
//! The service runs as a child process whose output is forwarded line by
//! line to `tracing`. A supervisor task owns the child and kills it when the
//! handle is stopped or dropped, or when the cancellation token fires, so the
//! process never outlives the export.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::LaunchError;

/// Tells the service to start without the parts that need a full
/// environment (databases, queues, ...) and only serve its API.
pub const RESTRICTED_ENVIRONMENT_ARG: &str = "API_ONLY_RESTRICTED_ENVIRONMENT";

/// An exit within this window after spawning counts as a failure to start.
pub const DEFAULT_STARTUP_PROBE: Duration = Duration::from_millis(250);

/// How long to wait for output forwarding to finish once the process is gone.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A fully resolved service command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Name used to tag log lines: the executable's file stem.
    pub name: String,
    pub program: OsString,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    pub service_url: String,
}

impl LaunchSpec {
    /// Builds the command line for `executable` listening on `service_url`.
    ///
    /// `.dll` assemblies are run through the `dotnet` host; anything else is
    /// executed directly. The working directory is the executable's directory.
    pub fn for_service(
        executable: &Path,
        service_url: &str,
        extra_args: &[String],
    ) -> Result<Self, LaunchError> {
        let executable = std::fs::canonicalize(executable).map_err(|source| LaunchError::Spawn {
            program: executable.display().to_string(),
            source,
        })?;

        let name = executable
            .file_stem()
            .map_or_else(|| "service".to_string(), |stem| stem.to_string_lossy().into_owned());
        let working_dir = executable.parent().map(Path::to_path_buf);

        let is_assembly = executable
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("dll"));
        let (program, mut args) = if is_assembly {
            (OsString::from("dotnet"), vec![executable.into_os_string()])
        } else {
            (executable.into_os_string(), Vec::new())
        };

        args.extend(
            [
                RESTRICTED_ENVIRONMENT_ARG,
                "--server.urls",
                service_url,
                "--urls",
                service_url,
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.extend(extra_args.iter().map(OsString::from));

        Ok(Self {
            name,
            program,
            args,
            working_dir,
            service_url: service_url.to_string(),
        })
    }

    /// The command line as one string, for logging.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a service process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The process was running and has been killed.
    Killed,
    /// The process had already exited by the time it was stopped.
    AlreadyExited { code: Option<i32> },
    /// Killing the process failed.
    KillFailed(String),
}

#[derive(Debug, Clone)]
pub struct ServiceLauncher {
    startup_probe: Duration,
}

impl Default for ServiceLauncher {
    fn default() -> Self {
        Self {
            startup_probe: DEFAULT_STARTUP_PROBE,
        }
    }
}

enum Probe {
    Running,
    Exited(Option<i32>),
    Cancelled,
}

impl ServiceLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_startup_probe(mut self, probe: Duration) -> Self {
        self.startup_probe = probe;
        self
    }

    /// Starts the service and waits out the startup probe.
    ///
    /// # Errors
    ///
    /// - [`LaunchError::Spawn`] when the process cannot be created
    /// - [`LaunchError::ExitedOnStart`] when it exits during the probe
    /// - [`LaunchError::Cancelled`] when `cancel` fires first; the process is
    ///   killed before returning
    #[tracing::instrument(skip_all, fields(process = %spec.name))]
    pub async fn launch(
        &self,
        spec: &LaunchSpec,
        cancel: &CancellationToken,
    ) -> Result<ServiceHandle, LaunchError> {
        if cancel.is_cancelled() {
            return Err(LaunchError::Cancelled);
        }

        tracing::info!(command = %spec.command_line(), "Executing command");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
            program: spec.program.to_string_lossy().into_owned(),
            source,
        })?;
        let pid = child.id();
        let output = OutputForwarder::attach(&mut child, &spec.name);

        let probe = tokio::select! {
            biased;
            () = cancel.cancelled() => Probe::Cancelled,
            status = child.wait() => Probe::Exited(status.ok().and_then(|status| status.code())),
            () = tokio::time::sleep(self.startup_probe) => Probe::Running,
        };

        match probe {
            Probe::Running => {}
            Probe::Exited(code) => {
                terminate(&mut child, &spec.name).await;
                output.join().await;
                tracing::error!(process = %spec.name, exit_code = ?code, "Process could not start");
                return Err(LaunchError::ExitedOnStart {
                    name: spec.name.clone(),
                    code,
                });
            }
            Probe::Cancelled => {
                terminate(&mut child, &spec.name).await;
                output.join().await;
                return Err(LaunchError::Cancelled);
            }
        }

        tracing::info!(
            process = %spec.name,
            pid = ?pid,
            "The process {} was started at {}",
            spec.name,
            spec.service_url
        );

        let (stop_tx, stop_rx) = oneshot::channel();
        let supervisor = tokio::spawn(supervise(
            child,
            spec.name.clone(),
            output,
            cancel.clone(),
            stop_rx,
        ));

        Ok(ServiceHandle {
            name: spec.name.clone(),
            pid,
            stop: stop_tx,
            supervisor,
        })
    }
}

/// A running service. Dropping the handle kills the process too.
#[derive(Debug)]
pub struct ServiceHandle {
    name: String,
    pid: Option<u32>,
    stop: oneshot::Sender<()>,
    supervisor: JoinHandle<Termination>,
}

impl ServiceHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Kills the process unless it is already gone, then waits for its
    /// output to be drained.
    pub async fn stop(self) -> Termination {
        let Self {
            name,
            stop,
            supervisor,
            ..
        } = self;

        // The supervisor may have finished already; it reports how.
        let _ = stop.send(());
        let termination = supervisor
            .await
            .unwrap_or_else(|err| Termination::KillFailed(err.to_string()));

        match &termination {
            Termination::KillFailed(reason) => {
                tracing::warn!(process = %name, reason, "Failed to stop the process");
            }
            _ => tracing::info!(process = %name, "The process {name} was stopped"),
        }
        termination
    }
}

async fn supervise(
    mut child: Child,
    name: String,
    output: OutputForwarder,
    cancel: CancellationToken,
    stop: oneshot::Receiver<()>,
) -> Termination {
    let termination = tokio::select! {
        status = child.wait() => {
            let code = status.ok().and_then(|status| status.code());
            tracing::info!(process = %name, exit_code = ?code, "The process exited");
            Termination::AlreadyExited { code }
        }
        () = cancel.cancelled() => {
            tracing::warn!(process = %name, "Cancelled, killing the process");
            terminate(&mut child, &name).await
        }
        _ = stop => terminate(&mut child, &name).await,
    };

    output.join().await;
    termination
}

/// Kills `child` once. A process that has already exited is not an error.
async fn terminate(child: &mut Child, name: &str) -> Termination {
    match child.kill().await {
        Ok(()) => {
            let code = child.try_wait().ok().flatten().and_then(|status| status.code());
            tracing::info!(process = %name, exit_code = ?code, "The process was killed");
            Termination::Killed
        }
        Err(err) if err.kind() == std::io::ErrorKind::InvalidInput => {
            let code = child.try_wait().ok().flatten().and_then(|status| status.code());
            tracing::debug!(process = %name, exit_code = ?code, "The process had already exited");
            Termination::AlreadyExited { code }
        }
        Err(err) => Termination::KillFailed(err.to_string()),
    }
}

/// Tasks forwarding the child's stdout and stderr to the log.
#[derive(Debug)]
struct OutputForwarder {
    tasks: Vec<JoinHandle<()>>,
}

impl OutputForwarder {
    fn attach(child: &mut Child, name: &str) -> Self {
        let mut tasks = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            tasks.push(tokio::spawn(forward_lines(stdout, name.to_string(), false)));
        }
        if let Some(stderr) = child.stderr.take() {
            tasks.push(tokio::spawn(forward_lines(stderr, name.to_string(), true)));
        }
        Self { tasks }
    }

    /// Waits for both streams to reach EOF. Streams kept open by a
    /// grandchild are abandoned after a short grace period.
    async fn join(self) {
        for task in self.tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, task).await.is_err() {
                abort.abort();
            }
        }
    }
}

/// Forwards output until EOF. Lines are decoded lossily: the stream must
/// stay open, or the service dies of a broken pipe on its next write.
async fn forward_lines(stream: impl AsyncRead + Unpin, name: String, is_stderr: bool) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(process = %name, error = %err, "Output stream failed");
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if is_stderr {
            tracing::warn!(process = %name, "[{name}] ERROR {line}");
        } else {
            tracing::info!(process = %name, "[{name}] {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_for_assembly_uses_dotnet() {
        let dir = tempfile::tempdir().unwrap();
        let dll = dir.path().join("Orders.Api.dll");
        std::fs::write(&dll, b"").unwrap();

        let spec = LaunchSpec::for_service(
            &dll,
            "http://localhost:8088",
            &["--environment".to_string(), "Test".to_string()],
        )
        .unwrap();

        let dll = std::fs::canonicalize(&dll).unwrap();
        assert_eq!(spec.name, "Orders.Api");
        assert_eq!(spec.program, OsString::from("dotnet"));
        assert_eq!(
            spec.args,
            vec![
                dll.clone().into_os_string(),
                "API_ONLY_RESTRICTED_ENVIRONMENT".into(),
                "--server.urls".into(),
                "http://localhost:8088".into(),
                "--urls".into(),
                "http://localhost:8088".into(),
                "--environment".into(),
                "Test".into(),
            ]
        );
        assert_eq!(spec.working_dir.as_deref(), dll.parent());
    }

    #[test]
    fn test_spec_for_executable_runs_directly() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("orders-api");
        std::fs::write(&exe, b"").unwrap();

        let spec = LaunchSpec::for_service(&exe, "http://localhost:5000", &[]).unwrap();

        assert_eq!(spec.name, "orders-api");
        assert_eq!(spec.program, std::fs::canonicalize(&exe).unwrap().into_os_string());
        assert_eq!(spec.args[0], OsString::from(RESTRICTED_ENVIRONMENT_ARG));
        assert_eq!(spec.args.len(), 5);
        assert!(spec
            .command_line()
            .ends_with("orders-api API_ONLY_RESTRICTED_ENVIRONMENT --server.urls http://localhost:5000 --urls http://localhost:5000"));
    }

    #[test]
    fn test_spec_for_missing_executable() {
        let err = LaunchSpec::for_service(Path::new("/no/such/service"), "http://localhost", &[])
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        // Writing a script while another test forks can leave the script
        // busy (ETXTBSY), so process tests run one at a time.
        static PROCESS_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

        fn script(dir: &Path, name: &str, body: &str) -> LaunchSpec {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            LaunchSpec::for_service(&path, "http://127.0.0.1:1", &[]).unwrap()
        }

        #[tokio::test]
        async fn test_exit_on_start_is_reported() {
            let _guard = PROCESS_LOCK.lock().await;
            let dir = tempfile::tempdir().unwrap();
            let spec = script(dir.path(), "crash", "echo booting\nexit 3");

            let err = ServiceLauncher::new()
                .launch(&spec, &CancellationToken::new())
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                LaunchError::ExitedOnStart { code: Some(3), .. }
            ));
        }

        #[tokio::test]
        async fn test_running_service_is_killed_on_stop() {
            let _guard = PROCESS_LOCK.lock().await;
            let dir = tempfile::tempdir().unwrap();
            let spec = script(dir.path(), "serve", "exec sleep 30");

            let handle = ServiceLauncher::new()
                .launch(&spec, &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(handle.name(), "serve");
            assert!(handle.pid().is_some());
            assert_eq!(handle.stop().await, Termination::Killed);
        }

        #[tokio::test]
        async fn test_stop_after_exit_is_benign() {
            let _guard = PROCESS_LOCK.lock().await;
            let dir = tempfile::tempdir().unwrap();
            let spec = script(dir.path(), "short", "sleep 1");

            let handle = ServiceLauncher::new()
                .with_startup_probe(Duration::from_millis(50))
                .launch(&spec, &CancellationToken::new())
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;

            assert_eq!(
                handle.stop().await,
                Termination::AlreadyExited { code: Some(0) }
            );
        }

        #[tokio::test]
        async fn test_non_utf8_output_keeps_service_alive() {
            let _guard = PROCESS_LOCK.lock().await;
            let dir = tempfile::tempdir().unwrap();
            let spec = script(
                dir.path(),
                "latin1",
                "printf 'caf\\351\\n'\nsleep 0.5\necho still running\nexec sleep 30",
            );

            let handle = ServiceLauncher::new()
                .with_startup_probe(Duration::from_millis(50))
                .launch(&spec, &CancellationToken::new())
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;

            assert_eq!(handle.stop().await, Termination::Killed);
        }

        #[tokio::test]
        async fn test_cancellation_kills_running_service() {
            let _guard = PROCESS_LOCK.lock().await;
            let dir = tempfile::tempdir().unwrap();
            let spec = script(dir.path(), "hang", "exec sleep 30");
            let cancel = CancellationToken::new();

            let handle = ServiceLauncher::new().launch(&spec, &cancel).await.unwrap();
            cancel.cancel();

            assert_eq!(handle.stop().await, Termination::Killed);
        }

        #[tokio::test]
        async fn test_cancelled_before_launch() {
            let dir = tempfile::tempdir().unwrap();
            let spec = script(dir.path(), "never", "exit 0");
            let cancel = CancellationToken::new();
            cancel.cancel();

            let err = ServiceLauncher::new().launch(&spec, &cancel).await.unwrap_err();
            assert!(matches!(err, LaunchError::Cancelled));
        }
    }
}
