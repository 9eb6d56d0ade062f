//! Line-streamed subprocess execution shared by the local-executable tools.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::ToolContext;

/// How long to wait for a child to exit after natural end-of-output or a
/// kill; exceeding this is tolerated, not fatal.
const PROCESS_EXIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub(crate) enum StreamError {
    /// The executable is not installed; a configuration gap.
    MissingExecutable,
    /// Anything else; the description becomes an error finding.
    Failed(String),
}

/// Spawn `command`, publish each stdout line tool-tagged to the scan's log
/// channel, and hand it to `on_line` for parsing. Polls the cooperative
/// stop signal per line; on a stop request the child is killed and the
/// stream ends early without error, keeping whatever `on_line` collected.
pub(crate) async fn stream_lines(
    mut command: Command,
    ctx: &ToolContext,
    tool: &str,
    mut on_line: impl FnMut(&str) + Send,
) -> Result<(), StreamError> {
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(tool, "executable not installed, skipping");
            return Err(StreamError::MissingExecutable);
        }
        Err(err) => return Err(StreamError::Failed(err.to_string())),
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| StreamError::Failed("child stdout unavailable".to_string()))?;
    let mut lines = BufReader::new(stdout).lines();

    let mut stopped = false;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    ctx.logs.publish(ctx.scan_id, Some(tool), trimmed);
                    on_line(trimmed);
                }
                if ctx.cancellation.is_stop_requested() {
                    stopped = true;
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                let _ = child.start_kill();
                return Err(StreamError::Failed(err.to_string()));
            }
        }
    }

    if stopped {
        debug!(tool, scan_id = %ctx.scan_id, "stop requested, killing child");
        let _ = child.start_kill();
    }

    if tokio::time::timeout(PROCESS_EXIT_GRACE, child.wait())
        .await
        .is_err()
    {
        warn!(tool, "child did not exit within grace period");
    }

    Ok(())
}
