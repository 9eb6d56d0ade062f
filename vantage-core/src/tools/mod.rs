//! Tool plugin contract and the built-in OSINT tool adapters.
//!
//! A plugin exposes one capability: produce findings for a target, given a
//! cancellation handle. Plugins never fault across this boundary: internal
//! failures become a single error-category draft, and a missing external
//! dependency (executable not installed, credential unset) yields an empty
//! sequence.

pub mod amass;
pub mod hibp;
mod process;
pub mod registry;
pub mod spiderfoot;
pub mod subfinder;
pub mod theharvester;

use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use vantage_model::{FindingDraft, ScanId};

use crate::broker::LogBroker;
use crate::cancel::ScanCancellation;

pub use registry::{ToolRegistry, ToolSettings};

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)+$")
        .expect("domain pattern is valid")
});

/// Kinds of targets a tool can operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Domain,
    Ip,
    Email,
}

impl TargetKind {
    /// Classify a target string; `None` when it is none of the supported
    /// shapes, in which case every plugin skips it.
    pub fn detect(target: &str) -> Option<TargetKind> {
        let target = target.trim();
        if target.is_empty() {
            return None;
        }
        if target.contains('@') {
            return Some(TargetKind::Email);
        }
        if target.parse::<IpAddr>().is_ok() {
            return Some(TargetKind::Ip);
        }
        DOMAIN_RE.is_match(target).then_some(TargetKind::Domain)
    }
}

/// Static identity of a registered tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub supported_targets: &'static [TargetKind],
}

impl ToolDescriptor {
    pub fn supports(&self, kind: TargetKind) -> bool {
        self.supported_targets.contains(&kind)
    }

    /// Whether this tool should run against the given target at all.
    pub fn accepts(&self, target: &str) -> bool {
        TargetKind::detect(target).is_some_and(|kind| self.supports(kind))
    }
}

/// Per-invocation context handed to a plugin: the owning scan, its
/// cooperative stop signal, and the log channel for raw output lines.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub scan_id: ScanId,
    pub cancellation: ScanCancellation,
    pub logs: LogBroker,
}

/// Adapter exposing the capability "produce findings for a target".
#[async_trait]
pub trait ToolPlugin: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Produce a finite sequence of finding drafts for the target.
    ///
    /// Blocking from the caller's point of view; streaming implementations
    /// publish raw lines to `ctx.logs` and poll `ctx.cancellation` per line,
    /// keeping partial results when stopped early.
    async fn run(&self, target: &str, ctx: &ToolContext) -> Vec<FindingDraft>;
}

/// Bound a batch-strategy call; `None` means the limit elapsed and the call
/// is to be recorded as a tool fault.
pub(crate) async fn run_bounded<F, T>(limit: Duration, fut: F) -> Option<T>
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_target_kinds() {
        assert_eq!(TargetKind::detect("example.com"), Some(TargetKind::Domain));
        assert_eq!(
            TargetKind::detect("sub.deep.example.co.uk"),
            Some(TargetKind::Domain)
        );
        assert_eq!(TargetKind::detect("10.0.0.1"), Some(TargetKind::Ip));
        assert_eq!(TargetKind::detect("::1"), Some(TargetKind::Ip));
        assert_eq!(
            TargetKind::detect("alice@example.com"),
            Some(TargetKind::Email)
        );
        assert_eq!(TargetKind::detect(""), None);
        assert_eq!(TargetKind::detect("not a domain"), None);
        assert_eq!(TargetKind::detect("trailing-.com"), None);
    }

    #[test]
    fn descriptor_accepts_only_supported_kinds() {
        let descriptor = ToolDescriptor {
            id: "subfinder",
            name: "Subfinder",
            supported_targets: &[TargetKind::Domain],
        };
        assert!(descriptor.accepts("example.com"));
        assert!(!descriptor.accepts("alice@example.com"));
        assert!(!descriptor.accepts("10.0.0.1"));
    }
}
