//! OWASP Amass adapter: local executable, streaming strategy, one JSON
//! object per line with source attribution.

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;

use vantage_model::{FindingDraft, Severity};

use super::process::{StreamError, stream_lines};
use super::{TargetKind, ToolContext, ToolDescriptor, ToolPlugin};

const DESCRIPTOR: ToolDescriptor = ToolDescriptor {
    id: "amass",
    name: "OWASP Amass",
    supported_targets: &[TargetKind::Domain],
};

#[derive(Debug, Default)]
pub struct AmassPlugin;

impl AmassPlugin {
    pub fn new() -> Self {
        Self
    }

    fn parse_line(line: &str) -> Option<FindingDraft> {
        let obj: Value = serde_json::from_str(line).ok()?;
        let name = obj.get("name").and_then(Value::as_str)?;
        let metadata = json!({
            "sources": obj.get("sources").cloned().unwrap_or(Value::Array(vec![])),
            "addresses": obj.get("addresses").cloned().unwrap_or(Value::Array(vec![])),
        });
        Some(
            FindingDraft::new("subdomain", name, Severity::Info)
                .with_metadata(metadata)
                .with_raw(line),
        )
    }
}

#[async_trait]
impl ToolPlugin for AmassPlugin {
    fn descriptor(&self) -> &ToolDescriptor {
        &DESCRIPTOR
    }

    async fn run(&self, target: &str, ctx: &ToolContext) -> Vec<FindingDraft> {
        if !DESCRIPTOR.accepts(target) {
            return Vec::new();
        }

        let mut command = Command::new("amass");
        command
            .arg("enum")
            .arg("-d")
            .arg(target)
            .arg("-json")
            .arg("-");

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
    fn parses_name_with_source_metadata() {
        let line = r#"{"name":"vpn.example.com","sources":["crtsh"],"addresses":[{"ip":"203.0.113.9"}]}"#;
        let draft = AmassPlugin::parse_line(line).unwrap();
        assert_eq!(draft.value, "vpn.example.com");
        assert_eq!(draft.metadata["sources"][0], "crtsh");
        assert_eq!(draft.metadata["addresses"][0]["ip"], "203.0.113.9");
    }

    #[test]
    fn skips_lines_without_a_name() {
        assert!(AmassPlugin::parse_line(r#"{"sources":[]}"#).is_none());
        assert!(AmassPlugin::parse_line("12:04 starting enumeration").is_none());
    }
}
