//! Have I Been Pwned adapter: remote HTTPS call, batch strategy.
//!
//! A 404 from the breach API means "no findings"; any other non-200 status
//! and any transport failure become a single error finding. An unset API
//! key is a configuration gap: the plugin yields nothing.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use vantage_model::{FindingDraft, Severity};

use super::{
    TargetKind, ToolContext, ToolDescriptor, ToolPlugin, run_bounded,
};
use crate::error::{EngineError, Result};

const DESCRIPTOR: ToolDescriptor = ToolDescriptor {
    id: "hibp",
    name: "Have I Been Pwned",
    supported_targets: &[TargetKind::Email],
};

const DEFAULT_BASE_URL: &str = "https://haveibeenpwned.com/api/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const USER_AGENT: &str = "vantage-scanner";

#[derive(Debug)]
pub struct HibpPlugin {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl HibpPlugin {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(
        api_key: Option<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(EngineError::Http)?;
        Ok(Self {
            api_key,
            base_url: base_url.into(),
            client,
        })
    }

    fn breach_to_draft(breach: &Value) -> FindingDraft {
        let name = breach
            .get("Name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        let metadata = json!({
            "domain": breach.get("Domain").cloned().unwrap_or(Value::Null),
            "breach_date": breach.get("BreachDate").cloned().unwrap_or(Value::Null),
            "pwn_count": breach.get("PwnCount").cloned().unwrap_or(Value::Null),
            "data_classes": breach.get("DataClasses").cloned().unwrap_or(Value::Array(vec![])),
        });
        FindingDraft::new("leak", name, Severity::High)
            .with_metadata(metadata)
            .with_raw(breach.to_string())
    }

    async fn query(&self, target: &str, api_key: &str) -> Vec<FindingDraft> {
        let url = format!("{}/breachedaccount/{}", self.base_url, target);
        let response = match self
            .client
            .get(&url)
            .header("hibp-api-key", api_key)
            .query(&[("truncateResponse", "false")])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return vec![FindingDraft::tool_error(err.to_string())],
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Vec::new();
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return vec![FindingDraft::tool_error(format!("HTTP {status}")).with_raw(body)];
        }

        match response.json::<Vec<Value>>().await {
            Ok(breaches) => breaches.iter().map(Self::breach_to_draft).collect(),
            Err(err) => vec![FindingDraft::tool_error(err.to_string())],
        }
    }
}

#[async_trait]
impl ToolPlugin for HibpPlugin {
    fn descriptor(&self) -> &ToolDescriptor {
        &DESCRIPTOR
    }

    async fn run(&self, target: &str, _ctx: &ToolContext) -> Vec<FindingDraft> {
        if !DESCRIPTOR.accepts(target) {
            return Vec::new();
        }
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("hibp api key unset, skipping");
            return Vec::new();
        };

        match run_bounded(REQUEST_TIMEOUT, self.query(target, api_key)).await {
            Some(drafts) => drafts,
            None => vec![FindingDraft::tool_error("request timed out")],
        }
    }
}
