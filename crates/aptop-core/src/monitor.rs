//! Monitor lifecycle.
//!
//! Wires the supervisor, segmenter, parser and renderer together and drives
//! them until the probe stops producing output or the run is cancelled:
//!
//! ```text
//! Idle -> Running -> Draining -> Stopped
//! ```
//!
//! Cleanup is not raced against cancellation: once the loop ends for any
//! reason the probe is shut down and reaped before `run` returns.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::parser;
use crate::render::Renderer;
use crate::segmenter;
use crate::supervisor::{ShutdownOutcome, Supervisor};

/// Lifecycle states of a monitor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
    Draining,
    Stopped,
}

impl MonitorState {
    /// Only forward, single-step transitions are allowed.
    pub fn can_transition_to(self, next: MonitorState) -> bool {
        matches!(
            (self, next),
            (MonitorState::Idle, MonitorState::Running)
                | (MonitorState::Running, MonitorState::Draining)
                | (MonitorState::Draining, MonitorState::Stopped)
        )
    }
}

/// Why the frame loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation token fired (Ctrl+C, SIGTERM).
    Cancelled,
    /// The probe closed its stdout.
    SourceEnded,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub reason: StopReason,
    pub shutdown: Option<ShutdownOutcome>,
}

/// Settings for one run, usually derived from [`Config`] and CLI flags.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub interval_ms: u64,
    pub grace_period: Duration,
    pub bar_width: usize,
}

impl MonitorOptions {
    /// Options from `config`, with an optional interval override.
    pub fn from_config(config: &Config, interval_override: Option<u64>) -> Self {
        Self {
            interval_ms: interval_override.unwrap_or(config.interval_ms),
            grace_period: config.grace_period(),
            bar_width: config.bar_width,
        }
    }
}

/// The lifecycle controller.
pub struct Monitor {
    supervisor: Supervisor,
    renderer: Renderer,
    options: MonitorOptions,
    state: MonitorState,
}

impl Monitor {
    pub fn new(supervisor: Supervisor, options: MonitorOptions) -> Self {
        Self {
            supervisor,
            renderer: Renderer::new(options.bar_width),
            options,
            state: MonitorState::Idle,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    fn transition(&mut self, next: MonitorState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(from = ?self.state, to = ?next, "monitor state");
        self.state = next;
    }

    /// Runs until the probe's output ends or `cancel` fires.
    ///
    /// Each frame is parsed and rendered to `out` before the next read.
    /// Cancellation is a normal stop, not an error.
    ///
    /// # Errors
    /// Returns an error if the probe cannot be spawned, reading its output
    /// fails, writing a frame fails, or the probe cannot be reaped. The probe
    /// is shut down before any error after spawning is returned.
    pub async fn run<W: Write>(
        &mut self,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        anyhow::ensure!(
            self.state == MonitorState::Idle,
            "monitor has already run ({:?})",
            self.state
        );

        let output = self.supervisor.start(self.options.interval_ms)?;
        self.transition(MonitorState::Running);

        let mut frames_rendered = 0usize;
        let loop_result = {
            let frames = segmenter::frames(output);
            tokio::pin!(frames);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        tracing::info!(frames = frames_rendered, "cancellation requested");
                        break Ok(StopReason::Cancelled);
                    }
                    next = frames.next() => match next {
                        Some(Ok(frame)) => {
                            let metrics = parser::parse(&frame);
                            tracing::trace!(frame = frames_rendered + 1, %metrics, "frame parsed");
                            if let Err(err) = self.renderer.write_frame(out, &metrics) {
                                break Err(anyhow::Error::new(err).context("write frame"));
                            }
                            frames_rendered += 1;
                        }
                        Some(Err(err)) => {
                            break Err(anyhow::Error::new(err).context("read telemetry output"));
                        }
                        None => {
                            tracing::info!(frames = frames_rendered, "telemetry output ended");
                            break Ok(StopReason::SourceEnded);
                        }
                    }
                }
            }
            // The frame stream (and the child's stdout) is dropped here,
            // before the child is signalled.
        };

        self.transition(MonitorState::Draining);
        let shutdown = self
            .supervisor
            .shutdown(self.options.grace_period)
            .await
            .context("stop telemetry tool");
        self.transition(MonitorState::Stopped);

        let reason = loop_result?;
        let shutdown = shutdown?;
        Ok(RunSummary {
            frames: frames_rendered,
            reason,
            shutdown,
        })
    }
}
