//! Relaying proxy output to the launcher's stdout.
//!
//! The loop waits on two things at once: the next line from the proxy and
//! the shutdown channel. Lines are written and flushed one at a time so log
//! collectors see them as soon as the proxy emits them.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, trace};

use super::error::SupervisorError;

/// Why the relay loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The shutdown channel fired.
    Shutdown {
        /// Lines forwarded before shutdown.
        lines: u64,
    },
    /// The proxy closed its stdout.
    StreamClosed {
        /// Lines forwarded in total.
        lines: u64,
    },
}

impl RelayOutcome {
    /// Number of lines forwarded.
    pub fn lines(&self) -> u64 {
        match *self {
            RelayOutcome::Shutdown { lines } | RelayOutcome::StreamClosed { lines } => lines,
        }
    }
}

/// Forward lines from `reader` to `writer` until end of input or shutdown.
///
/// A dropped shutdown sender is not a shutdown request; relaying continues
/// until the stream ends. Bytes are forwarded as-is, so output that is not
/// UTF-8 passes through unchanged.
pub async fn relay_output<R, W>(
    mut reader: R,
    writer: &mut W,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<RelayOutcome, SupervisorError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = 0u64;
    let mut buf = Vec::with_capacity(1024);
    let mut shutdown_open = true;

    if *shutdown.borrow_and_update() {
        debug!("Shutdown already requested, not relaying");
        return Ok(RelayOutcome::Shutdown { lines });
    }

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed(), if shutdown_open => {
                match changed {
                    Ok(()) if *shutdown.borrow_and_update() => {
                        debug!("Relay received shutdown after {} lines", lines);
                        return Ok(RelayOutcome::Shutdown { lines });
                    }
                    Ok(()) => {}
                    Err(_) => {
                        trace!("Shutdown sender dropped, relaying until end of stream");
                        shutdown_open = false;
                    }
                }
            }

            // read_until keeps partial data in `buf` if the other branch wins.
            read = reader.read_until(b'\n', &mut buf) => {
                let n = read.map_err(SupervisorError::Relay)?;
                if n == 0 {
                    debug!("Proxy output closed after {} lines", lines);
                    return Ok(RelayOutcome::StreamClosed { lines });
                }

                let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
                writer.write_all(line).await.map_err(SupervisorError::Relay)?;
                writer.write_all(b"\n").await.map_err(SupervisorError::Relay)?;
                writer.flush().await.map_err(SupervisorError::Relay)?;

                buf.clear();
                lines += 1;
            }
        }
    }
}
