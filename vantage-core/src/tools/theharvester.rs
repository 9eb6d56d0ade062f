//! theHarvester adapter: local executable, streaming strategy, heuristic
//! line classification into emails and hosts.

use async_trait::async_trait;
use tokio::process::Command;

use vantage_model::{FindingDraft, Severity};

use super::process::{StreamError, stream_lines};
use super::{TargetKind, ToolContext, ToolDescriptor, ToolPlugin};

const DESCRIPTOR: ToolDescriptor = ToolDescriptor {
    id: "theharvester",
    name: "theHarvester",
    supported_targets: &[TargetKind::Domain],
};

#[derive(Debug, Default)]
pub struct TheHarvesterPlugin;

impl TheHarvesterPlugin {
    pub fn new() -> Self {
        Self
    }

    /// Classify one output line. theHarvester's text output has no stable
    /// format, so this mirrors the upstream heuristics: an '@' plus a dot
    /// reads as an email, a dotted token without whitespace as a hostname.
    fn classify_line(line: &str) -> Option<(&'static str, &str)> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('[') || line.starts_with('*') {
            return None;
        }
        if line.contains('@') && line.contains('.') {
            return Some(("email", line));
        }
        if line.contains('.') && !line.contains(char::is_whitespace) {
            return Some(("host", line));
        }
        None
    }
}

#[async_trait]
impl ToolPlugin for TheHarvesterPlugin {
    fn descriptor(&self) -> &ToolDescriptor {
        &DESCRIPTOR
    }

    async fn run(&self, target: &str, ctx: &ToolContext) -> Vec<FindingDraft> {
        if !DESCRIPTOR.accepts(target) {
            return Vec::new();
        }

        let mut command = Command::new("theHarvester");
        command.arg("-d").arg(target).arg("-b").arg("all").arg("-n");

        let mut drafts = Vec::new();
        let outcome = stream_lines(command, ctx, DESCRIPTOR.id, |line| {
            if let Some((category, value)) = Self::classify_line(line) {
                drafts.push(
                    FindingDraft::new(category, value, Severity::Info).with_raw(line),
                );
            }
        })
        .await;

        match outcome {
            Ok(()) => drafts,
            Err(StreamError::MissingExecutable) => Vec::new(),
            Err(StreamError::Failed(message)) => {
                vec![FindingDraft::tool_error(message)]
            }
        }
    }
}
