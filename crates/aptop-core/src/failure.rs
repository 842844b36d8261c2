//! Top-level failure filtering.
//!
//! A few failures are an expected part of tearing the monitor down and say
//! nothing about its health. They are listed here explicitly; everything
//! else reaching the top level is reported.

use std::io;

/// I/O error kinds that can surface while the run is being torn down.
///
/// - `BrokenPipe`: the terminal or pipe reading our stdout went away while
///   the last frame or the stop message was being written.
/// - `Interrupted`: a blocking call was interrupted by the very signal that
///   stopped the run.
const IGNORABLE_IO_KINDS: &[io::ErrorKind] =
    &[io::ErrorKind::BrokenPipe, io::ErrorKind::Interrupted];

/// Whether `err` matches one of the known benign teardown failures.
///
/// Walks the whole `anyhow` chain, so context added on the way up does not
/// hide the underlying cause.
pub fn is_ignorable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|io_err| IGNORABLE_IO_KINDS.contains(&io_err.kind()))
    })
}
