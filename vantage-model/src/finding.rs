use std::str::FromStr;

use serde_json::Value;

use crate::error::ModelError;
use crate::ids::{FindingId, ScanId};

/// Stored raw tool output is truncated to this many bytes.
pub const MAX_RAW_PAYLOAD_BYTES: usize = 8 * 1024;

/// Severity labels attached to findings.
///
/// `Error` marks a tool failure rather than a discovered fact and sits
/// outside the info < low < medium < high ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Error => "error",
        }
    }

    /// Position in the severity ordering; `None` for the error marker.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Severity::Info => Some(0),
            Severity::Low => Some(1),
            Severity::Medium => Some(2),
            Severity::High => Some(3),
            Severity::Error => None,
        }
    }
}

impl FromStr for Severity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "error" => Ok(Severity::Error),
            other => Err(ModelError::UnknownLabel {
                kind: "severity",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized discovered fact produced by a tool during a scan.
///
/// Findings are append-only; they are never mutated after creation and are
/// deleted only by cascading scan deletion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Finding {
    pub id: FindingId,
    pub scan_id: ScanId,
    pub tool: String,
    pub category: String,
    pub value: String,
    pub severity: Severity,
    pub metadata: Value,
    pub raw: Option<String>,
}

/// A finding as produced by a tool plugin, before the executor stamps the
/// owning scan and tool identifier onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct FindingDraft {
    pub category: String,
    pub value: String,
    pub severity: Severity,
    pub metadata: Value,
    pub raw: Option<String>,
}

impl FindingDraft {
    pub fn new(
        category: impl Into<String>,
        value: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
            severity,
            metadata: Value::Null,
            raw: None,
        }
    }

    /// Synthetic finding recording a tool fault.
    pub fn tool_error(message: impl Into<String>) -> Self {
        Self::new("error", message, Severity::Error)
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach raw tool output, truncated to [`MAX_RAW_PAYLOAD_BYTES`].
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        let mut raw = raw.into();
        if raw.len() > MAX_RAW_PAYLOAD_BYTES {
            let mut cut = MAX_RAW_PAYLOAD_BYTES;
            while !raw.is_char_boundary(cut) {
                cut -= 1;
            }
            raw.truncate(cut);
        }
        self.raw = Some(raw);
        self
    }

    pub fn into_finding(self, scan_id: ScanId, tool: impl Into<String>) -> Finding {
        Finding {
            id: FindingId::new(),
            scan_id,
            tool: tool.into(),
            category: self.category,
            value: self.value,
            severity: self.severity,
            metadata: self.metadata,
            raw: self.raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_excludes_error() {
        assert!(Severity::Info.rank() < Severity::Low.rank());
        assert!(Severity::Low.rank() < Severity::Medium.rank());
        assert!(Severity::Medium.rank() < Severity::High.rank());
        assert_eq!(Severity::Error.rank(), None);
    }

    #[test]
    fn raw_payload_is_capped() {
        let oversized = "x".repeat(MAX_RAW_PAYLOAD_BYTES * 2);
        let draft = FindingDraft::new("subdomain", "a.example.com", Severity::Info)
            .with_raw(oversized);
        assert_eq!(draft.raw.unwrap().len(), MAX_RAW_PAYLOAD_BYTES);
    }

    #[test]
    fn raw_payload_cap_respects_char_boundaries() {
        let mut oversized = "y".repeat(MAX_RAW_PAYLOAD_BYTES - 1);
        oversized.push('é');
        oversized.push_str(&"z".repeat(64));
        let draft = FindingDraft::new("host", "example.com", Severity::Info)
            .with_raw(oversized);
        let raw = draft.raw.unwrap();
        assert!(raw.len() <= MAX_RAW_PAYLOAD_BYTES);
        assert!(raw.is_char_boundary(raw.len()));
    }

    #[test]
    fn draft_stamping_preserves_content() {
        let scan_id = ScanId::new();
        let finding = FindingDraft::new("leak", "Adobe", Severity::High)
            .with_metadata(serde_json::json!({"pwn_count": 152445165}))
            .into_finding(scan_id, "hibp");
        assert_eq!(finding.scan_id, scan_id);
        assert_eq!(finding.tool, "hibp");
        assert_eq!(finding.severity, Severity::High);
    }
}
