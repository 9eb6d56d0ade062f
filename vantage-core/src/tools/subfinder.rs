//! ProjectDiscovery subfinder adapter: local executable, streaming
//! strategy, one JSON object per line.

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use vantage_model::{FindingDraft, Severity};

use super::process::{StreamError, stream_lines};
use super::{TargetKind, ToolContext, ToolDescriptor, ToolPlugin};

const DESCRIPTOR: ToolDescriptor = ToolDescriptor {
    id: "subfinder",
    name: "ProjectDiscovery Subfinder",
    supported_targets: &[TargetKind::Domain],
};

#[derive(Debug, Default)]
pub struct SubfinderPlugin;

impl SubfinderPlugin {
    pub fn new() -> Self {
        Self
    }

    fn parse_line(line: &str) -> Option<FindingDraft> {
        let obj: Value = serde_json::from_str(line).ok()?;
        let host = obj
            .get("host")
            .and_then(Value::as_str)
            .or_else(|| obj.get("data").and_then(Value::as_str))?;
        Some(
            FindingDraft::new("subdomain", host, Severity::Info)
                .with_metadata(obj.clone())
                .with_raw(line),
        )
    }
}

#[async_trait]
impl ToolPlugin for SubfinderPlugin {
    fn descriptor(&self) -> &ToolDescriptor {
        &DESCRIPTOR
    }

    async fn run(&self, target: &str, ctx: &ToolContext) -> Vec<FindingDraft> {
        if !DESCRIPTOR.accepts(target) {
            return Vec::new();
        }

        let mut command = Command::new("subfinder");
        command.arg("-d").arg(target).arg("-json").arg("-silent");

        let mut drafts = Vec::new();
        let outcome = stream_lines(command, ctx, DESCRIPTOR.id, |line| {
            if let Some(draft) = Self::parse_line(line) {
                drafts.push(draft);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_field() {
        let draft =
            SubfinderPlugin::parse_line(r#"{"host":"mail.example.com","source":"crtsh"}"#)
                .unwrap();
        assert_eq!(draft.category, "subdomain");
        assert_eq!(draft.value, "mail.example.com");
        assert_eq!(draft.severity, Severity::Info);
    }

    #[test]
    fn falls_back_to_data_field() {
        let draft = SubfinderPlugin::parse_line(r#"{"data":"api.example.com"}"#).unwrap();
        assert_eq!(draft.value, "api.example.com");
    }

    #[test]
    fn ignores_unparseable_lines() {
        assert!(SubfinderPlugin::parse_line("plain text").is_none());
        assert!(SubfinderPlugin::parse_line(r#"{"other":"field"}"#).is_none());
    }
}
