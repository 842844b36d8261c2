//! Telemetry process supervision.
//!
//! The [`Supervisor`] is the only owner of the child process. It spawns the
//! probe with the sampling interval, hands out its stdout once, and tears it
//! down with SIGTERM followed by SIGKILL when the grace period runs out.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdout, Command};

use crate::config::ProbeConfig;

/// Buffered stdout of the telemetry process.
pub type TelemetryOutput = BufReader<ChildStdout>;

/// The probe could not be started.
#[derive(Debug)]
pub enum SpawnError {
    /// The OS refused to launch the program (missing binary, permissions).
    Launch { program: String, source: io::Error },
    /// A child is already live; only one may run at a time.
    AlreadyRunning { pid: Option<u32> },
    /// The child started but its stdout was not captured.
    MissingOutput,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::Launch { program, .. } => {
                write!(f, "Failed to start telemetry tool '{program}'")
            }
            SpawnError::AlreadyRunning { pid: Some(pid) } => {
                write!(f, "Telemetry tool is already running (pid {pid})")
            }
            SpawnError::AlreadyRunning { pid: None } => {
                write!(f, "Telemetry tool is already running")
            }
            SpawnError::MissingOutput => write!(f, "Telemetry tool stdout was not captured"),
        }
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpawnError::Launch { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// How the child process ended during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The process had already exited on its own.
    AlreadyExited(ExitStatus),
    /// The process exited within the grace period after SIGTERM.
    Graceful(ExitStatus),
    /// The grace period ran out and the process was killed.
    Killed(ExitStatus),
}

impl ShutdownOutcome {
    pub fn status(&self) -> ExitStatus {
        match *self {
            ShutdownOutcome::AlreadyExited(status)
            | ShutdownOutcome::Graceful(status)
            | ShutdownOutcome::Killed(status) => status,
        }
    }

    pub fn was_forced(&self) -> bool {
        matches!(self, ShutdownOutcome::Killed(_))
    }
}

/// Live handle to the spawned probe.
pub struct TelemetryChild {
    child: Child,
    pid: Option<u32>,
}

/// Owns the telemetry process for its whole lifetime.
pub struct Supervisor {
    probe: ProbeConfig,
    child: Option<TelemetryChild>,
}

impl Supervisor {
    pub fn new(probe: ProbeConfig) -> Self {
        Self { probe, child: None }
    }

    /// The live child, if any.
    pub fn child(&self) -> Option<&TelemetryChild> {
        self.child.as_ref()
    }

    /// Spawns the probe, emitting one sample every `interval_ms`.
    ///
    /// Spawn failures are returned as-is and never retried: a binary that is
    /// missing now will be missing on the next attempt too.
    ///
    /// # Errors
    /// Returns [`SpawnError`] if a child is already live or the OS cannot
    /// launch the program.
    pub fn start(&mut self, interval_ms: u64) -> Result<TelemetryOutput, SpawnError> {
        if let Some(live) = &self.child {
            return Err(SpawnError::AlreadyRunning { pid: live.pid });
        }

        let mut command = Command::new(&self.probe.program);
        command
            .args(build_probe_args(&self.probe, interval_ms))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            // The probe's own diagnostics (e.g. "must be run as root") go
            // straight to the user's terminal.
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| SpawnError::Launch {
            program: self.probe.program.clone(),
            source,
        })?;
        let pid = child.id();
        let stdout = child.stdout.take();

        tracing::info!(
            program = %self.probe.program,
            ?pid,
            interval_ms,
            "telemetry tool started"
        );
        self.child = Some(TelemetryChild { child, pid });

        stdout
            .map(BufReader::new)
            .ok_or(SpawnError::MissingOutput)
    }

    /// Stops the live child, if any.
    ///
    /// Sends SIGTERM, waits up to `grace`, then kills and waits without a
    /// bound. Running out of grace is not an error; it is reported as
    /// [`ShutdownOutcome::Killed`]. Returns `None` when no child was live.
    ///
    /// The handle is moved out before the first await, so a dropped future
    /// still kills the process through `kill_on_drop`.
    ///
    /// # Errors
    /// Returns an error if waiting on or killing the process fails.
    pub async fn shutdown(&mut self, grace: Duration) -> io::Result<Option<ShutdownOutcome>> {
        let Some(mut handle) = self.child.take() else {
            return Ok(None);
        };

        let outcome = terminate(&mut handle.child, grace).await?;
        tracing::info!(
            pid = ?handle.pid,
            ?outcome,
            "telemetry tool stopped"
        );
        Ok(Some(outcome))
    }
}

fn build_probe_args(probe: &ProbeConfig, interval_ms: u64) -> Vec<OsString> {
    let mut args: Vec<OsString> = probe.args.iter().map(OsString::from).collect();
    args.push(OsString::from("-i"));
    args.push(OsString::from(interval_ms.to_string()));
    args
}

async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ShutdownOutcome> {
    if let Some(status) = child.try_wait()? {
        return Ok(ShutdownOutcome::AlreadyExited(status));
    }

    match request_termination(child) {
        Ok(()) => {
            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                return Ok(ShutdownOutcome::Graceful(status?));
            }
            tracing::warn!(
                grace_ms = grace.as_millis(),
                "telemetry tool ignored SIGTERM, killing"
            );
        }
        Err(err) => {
            tracing::warn!(error = %err, "graceful termination failed, killing");
        }
    }

    child.kill().await?;
    let status = child.wait().await?;
    Ok(ShutdownOutcome::Killed(status))
}

#[cfg(unix)]
fn request_termination(child: &Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = libc::pid_t::try_from(pid).map_err(io::Error::other)?;

    // SAFETY: kill(2) only reads its integer arguments. `pid` belongs to a
    // child we have not reaped yet, so it cannot have been recycled.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(program: &str, args: &[&str]) -> ProbeConfig {
        ProbeConfig {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    /// `sh -c <script> sh -i <ms>`: the interval lands in `$1`/`$2`.
    #[cfg(unix)]
    fn script(body: &str) -> ProbeConfig {
        probe("sh", &["-c", body, "sh"])
    }

    #[test]
    fn probe_args_end_with_interval() {
        let args = build_probe_args(&probe("powermetrics", &[]), 1000);
        assert_eq!(args, vec![OsString::from("-i"), OsString::from("1000")]);
    }

    #[test]
    fn probe_args_keep_configured_prefix() {
        let args = build_probe_args(
            &probe("powermetrics", &["--samplers", "cpu_power,gpu_power"]),
            250,
        );
        let args: Vec<String> = args
            .iter()
            .map(|s| s.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec!["--samplers", "cpu_power,gpu_power", "-i", "250"]
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_error() {
        let mut supervisor = Supervisor::new(probe("/nonexistent/aptop-probe", &[]));

        let err = supervisor.start(1000).unwrap_err();
        assert!(matches!(err, SpawnError::Launch { .. }));
        assert!(err.to_string().contains("/nonexistent/aptop-probe"));
        assert!(supervisor.child().is_none());
    }

    #[tokio::test]
    async fn shutdown_without_child_is_noop() {
        let mut supervisor = Supervisor::new(probe("powermetrics", &[]));
        let outcome = supervisor.shutdown(Duration::from_millis(10)).await.unwrap();
        assert!(outcome.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn passes_interval_to_probe() {
        use tokio::io::AsyncReadExt;

        let mut supervisor = Supervisor::new(script(r#"echo "$1 $2""#));
        let mut output = supervisor.start(750).unwrap();

        let mut text = String::new();
        output.read_to_string(&mut text).await.unwrap();
        assert_eq!(text.trim(), "-i 750");

        supervisor.shutdown(Duration::from_secs(2)).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn only_one_child_at_a_time() {
        let mut supervisor = Supervisor::new(script("exec sleep 30"));
        let _output = supervisor.start(1000).unwrap();

        let err = supervisor.start(1000).unwrap_err();
        assert!(matches!(err, SpawnError::AlreadyRunning { .. }));

        supervisor.shutdown(Duration::from_secs(2)).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exited_child_is_reaped_without_signal() {
        use tokio::io::AsyncReadExt;

        let mut supervisor = Supervisor::new(script("echo done"));
        let mut output = supervisor.start(1000).unwrap();
        let mut text = String::new();
        output.read_to_string(&mut text).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let outcome = supervisor
            .shutdown(Duration::from_secs(2))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, ShutdownOutcome::AlreadyExited(_)));
        assert!(outcome.status().success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_stops_cooperative_child() {
        use std::os::unix::process::ExitStatusExt;

        let mut supervisor = Supervisor::new(script("exec sleep 30"));
        let _output = supervisor.start(1000).unwrap();

        let outcome = supervisor
            .shutdown(Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, ShutdownOutcome::Graceful(_)));
        assert_eq!(outcome.status().signal(), Some(libc::SIGTERM));
        assert!(supervisor.child().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn escalates_to_kill_after_grace_period() {
        use std::os::unix::process::ExitStatusExt;

        use tokio::io::AsyncBufReadExt;

        let mut supervisor = Supervisor::new(script("trap '' TERM; echo ready; exec sleep 30"));
        let mut output = supervisor.start(1000).unwrap();

        // Wait until the trap is installed before signalling.
        let mut line = String::new();
        output.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "ready");

        let started = std::time::Instant::now();
        let outcome = supervisor
            .shutdown(Duration::from_millis(200))
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.was_forced());
        assert_eq!(outcome.status().signal(), Some(libc::SIGKILL));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }
}
