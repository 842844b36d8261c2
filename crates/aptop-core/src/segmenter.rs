//! Stream segmentation.
//!
//! `powermetrics` writes an unbounded stream of text. The segmenter cuts it
//! into frames, one per sampling cycle, using the combined-power line as the
//! frame terminator.

use std::io;

use futures_util::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::rules::FRAME_TERMINATOR;

/// Largest partial frame kept while waiting for a terminator. A real
/// `powermetrics` cycle is a few KiB.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// One sampling cycle of raw telemetry text, terminator line included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(String);

impl RawFrame {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Accumulates lines until a terminator line shows up.
///
/// Holds at most the frame currently being assembled, capped at
/// [`MAX_FRAME_BYTES`].
pub struct Segmenter<R> {
    reader: R,
    line: Vec<u8>,
    pending: String,
    max_frame_bytes: usize,
}

impl<R> Segmenter<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self::with_frame_limit(reader, MAX_FRAME_BYTES)
    }

    fn with_frame_limit(reader: R, max_frame_bytes: usize) -> Self {
        Self {
            reader,
            line: Vec::new(),
            pending: String::new(),
            max_frame_bytes,
        }
    }

    /// Returns the next complete frame, or `None` once the source is exhausted.
    ///
    /// A trailing partial frame (no terminator before end of stream) is
    /// dropped, and so is a partial frame that outgrows the size cap. Cancelling this future between reads loses nothing: bytes of
    /// a half-read line stay in the internal line buffer.
    ///
    /// # Errors
    /// Returns an error if reading from the underlying source fails.
    pub async fn next_frame(&mut self) -> io::Result<Option<RawFrame>> {
        loop {
            let n = self.reader.read_until(b'\n', &mut self.line).await?;
            if n == 0 && self.line.is_empty() {
                if !self.pending.is_empty() {
                    tracing::debug!(
                        bytes = self.pending.len(),
                        "discarding unterminated frame at end of stream"
                    );
                    self.pending.clear();
                }
                return Ok(None);
            }

            let line = String::from_utf8_lossy(&self.line);
            let terminated = line.contains(FRAME_TERMINATOR);
            self.pending.push_str(&line);
            self.line.clear();

            if terminated {
                return Ok(Some(RawFrame(std::mem::take(&mut self.pending))));
            }
            if self.pending.len() > self.max_frame_bytes {
                tracing::warn!(
                    bytes = self.pending.len(),
                    limit = self.max_frame_bytes,
                    "no frame terminator in telemetry output, discarding"
                );
                self.pending.clear();
            }
        }
    }

    /// Turns the segmenter into a lazy stream of frames.
    ///
    /// The stream ends when the source is exhausted and stops after the
    /// first read error.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<RawFrame>> {
        futures_util::stream::unfold(Some(self), |state| async move {
            let mut segmenter = state?;
            match segmenter.next_frame().await {
                Ok(Some(frame)) => Some((Ok(frame), Some(segmenter))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

/// Convenience wrapper for `Segmenter::new(reader).into_stream()`.
pub fn frames<R>(reader: R) -> impl Stream<Item = io::Result<RawFrame>>
where
    R: AsyncBufRead + Unpin,
{
    Segmenter::new(reader).into_stream()
}
