//! Channel fabric: one named FIFO per input inside the run workspace.
//!
//! A FIFO couples its writer (the transformer) directly to its reader
//! (the merge process), so no transformed dataset is ever staged on disk.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lanemerge_core::error::{PipelineError, PipelineResult};
use lanemerge_core::naming::InputSpec;
use tokio::net::unix::pipe;

/// Permission bits for channel FIFOs (owner read/write only).
const CHANNEL_MODE: libc::mode_t = 0o600;

/// Delay between attempts to reach a channel's reader.
const READER_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A named, unbuffered byte-stream endpoint with one writer and one reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Base name of the input the channel carries.
    pub id: String,
    pub path: PathBuf,
}

/// Create one channel per input, in input order.
///
/// Channels are named after the input's base name, so two inputs sharing a
/// base name collide and fail here.
pub fn create_channels(dir: &Path, specs: &[InputSpec]) -> PipelineResult<Vec<Channel>> {
    let channels = specs
        .iter()
        .map(|spec| create_channel(dir, spec))
        .collect::<PipelineResult<Vec<_>>>()?;
    tracing::debug!(count = channels.len(), "Channels created");
    Ok(channels)
}

fn create_channel(dir: &Path, spec: &InputSpec) -> PipelineResult<Channel> {
    let path = dir.join(&spec.base_name);
    mkfifo(&path).map_err(|source| PipelineError::Resource {
        action: "create channel",
        path: path.clone(),
        source,
    })?;
    Ok(Channel {
        id: spec.base_name.clone(),
        path,
    })
}

fn mkfifo(path: &Path) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // Safety: `c_path` is a valid NUL-terminated string that outlives the call.
    let ret = unsafe { libc::mkfifo(c_path.as_ptr(), CHANNEL_MODE) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Open a channel's read end without waiting for its writer.
///
/// Used to drain channels whose real reader is gone. On Linux the FIFO is
/// opened read-write, which never blocks and keeps a late-arriving writer
/// from seeing a closed pipe.
pub fn open_drain(path: &Path) -> io::Result<pipe::Receiver> {
    let mut options = pipe::OpenOptions::new();
    #[cfg(any(target_os = "linux", target_os = "android"))]
    options.read_write(true);
    options.open_receiver(path)
}

/// Stand in for a writer that has exited, so the channel's reader sees EOF.
///
/// A transformer that dies before opening its channel leaves the merge
/// process blocked in `open()` on it. This waits until a reader has the
/// channel open (a non-blocking write open fails with `ENXIO` until then),
/// then opens and immediately closes the write end. When the real writer
/// already wrote and closed, this adds nothing to the stream.
///
/// Returns only once a reader was reached; callers race it against the
/// reader going away.
pub async fn close_writer_side(path: &Path) -> io::Result<()> {
    loop {
        match pipe::OpenOptions::new().open_sender(path) {
            Ok(sender) => {
                drop(sender);
                return Ok(());
            }
            Err(error) if error.raw_os_error() == Some(libc::ENXIO) => {
                tokio::time::sleep(READER_POLL_INTERVAL).await;
            }
            Err(error) => return Err(error),
        }
    }
}
