//! SpiderFoot aggregator adapter: remote HTTP call, batch strategy,
//! passing through the remote service's own category and severity fields.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use vantage_model::{FindingDraft, Severity};

use super::{
    TargetKind, ToolContext, ToolDescriptor, ToolPlugin, run_bounded,
};
use crate::error::{EngineError, Result};

const DESCRIPTOR: ToolDescriptor = ToolDescriptor {
    id: "spiderfoot",
    name: "SpiderFoot",
    supported_targets: &[TargetKind::Domain, TargetKind::Ip],
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct SpiderfootPlugin {
    base_url: Option<String>,
    client: reqwest::Client,
}

impl SpiderfootPlugin {
    /// `base_url: None` is a configuration gap; the plugin yields nothing.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(EngineError::Http)?;
        Ok(Self {
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string()),
            client,
        })
    }

    fn result_to_draft(item: &Value) -> FindingDraft {
        let category = item
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("info");
        let value = item.get("value").and_then(Value::as_str).unwrap_or("");
        let severity = item
            .get("severity")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<Severity>().ok())
            .unwrap_or(Severity::Info);
        FindingDraft::new(category, value, severity)
            .with_metadata(item.clone())
            .with_raw(item.to_string())
    }

    async fn query(&self, base_url: &str, target: &str) -> Vec<FindingDraft> {
        let url = format!("{base_url}/api/query");
        let response = match self
            .client
            .get(&url)
            .query(&[("target", target)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return vec![FindingDraft::tool_error(err.to_string())],
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return vec![FindingDraft::tool_error(format!("HTTP {status}")).with_raw(body)];
        }

        match response.json::<Value>().await {
            Ok(payload) => payload
                .get("results")
                .and_then(Value::as_array)
                .map(|results| results.iter().map(Self::result_to_draft).collect())
                .unwrap_or_default(),
            Err(err) => vec![FindingDraft::tool_error(err.to_string())],
        }
    }
}

#[async_trait]
impl ToolPlugin for SpiderfootPlugin {
    fn descriptor(&self) -> &ToolDescriptor {
        &DESCRIPTOR
    }

    async fn run(&self, target: &str, _ctx: &ToolContext) -> Vec<FindingDraft> {
        if !DESCRIPTOR.accepts(target) {
            return Vec::new();
        }
        let Some(base_url) = self.base_url.as_deref() else {
            debug!("spiderfoot endpoint unconfigured, skipping");
            return Vec::new();
        };

        match run_bounded(REQUEST_TIMEOUT, self.query(base_url, target)).await {
            Some(drafts) => drafts,
            None => vec![FindingDraft::tool_error("request timed out")],
        }
    }
}
