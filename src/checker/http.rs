//! reqwest client for the checker's `init` / `check-status` endpoints.

use super::payload::RawReport;
use super::{AccessibilityChecker, CheckStatus, PollOutcome};
use crate::error::{ConfigError, ServiceError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "accessibility checker";

/// Field names under which `init` has been seen to return the run handle.
const SOURCE_ID_FIELDS: [&str; 3] = ["source_id", "sourceId", "id"];
const STATUS_FIELDS: [&str; 3] = ["status", "Status", "state"];
const REPORT_URL_FIELDS: [&str; 3] = ["report_url", "reportUrl", "downloadUrl"];
const REPORT_FIELDS: [&str; 4] = ["report", "categories", "detailedReport", "Detailed Report"];

pub struct HttpChecker {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpChecker {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ConfigError(format!("checker HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn authorised(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send_json(&self, req: reqwest::RequestBuilder) -> Result<Value, ServiceError> {
        let response = self
            .authorised(req)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP {}", response.status())));
        }

        response.json::<Value>().await.map_err(|e| ServiceError::InvalidResponse {
            service: SERVICE.into(),
            detail: format!("body is not JSON: {e}"),
        })
    }
}

#[async_trait]
impl AccessibilityChecker for HttpChecker {
    async fn submit_for_check(
        &self,
        file: Vec<u8>,
        file_name: &str,
    ) -> Result<String, ServiceError> {
        info!("Submitting '{}' ({} bytes) to checker", file_name, file.len());
        let part = Part::bytes(file)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| unavailable(e.to_string()))?;
        let form = Form::new().part("file", part);

        let body = self
            .send_json(self.client.post(format!("{}/init", self.base_url)).multipart(form))
            .await?;

        extract_source_id(&body).ok_or_else(|| ServiceError::InvalidResponse {
            service: SERVICE.into(),
            detail: format!("no source id in response (expected one of {SOURCE_ID_FIELDS:?})"),
        })
    }

    async fn poll_status(&self, source_id: &str) -> Result<PollOutcome, ServiceError> {
        let body = self
            .send_json(
                self.client
                    .get(format!("{}/check-status", self.base_url))
                    .query(&[("source_id", source_id)]),
            )
            .await?;

        let outcome = parse_poll_body(&body);
        debug!(
            "Checker run {}: {:?} (report present: {})",
            source_id,
            outcome.status,
            outcome.report.is_some()
        );
        Ok(outcome)
    }
}

fn unavailable(detail: String) -> ServiceError {
    ServiceError::ServiceUnavailable {
        service: SERVICE.into(),
        detail,
    }
}

/// First alias present with a non-null value.
fn first_field<'a>(body: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|n| body.get(*n).filter(|v| !v.is_null()))
}

/// Accepts the handle as a non-empty string or as a number.
pub(crate) fn extract_source_id(body: &Value) -> Option<String> {
    match first_field(body, &SOURCE_ID_FIELDS)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn parse_poll_body(body: &Value) -> PollOutcome {
    let status = CheckStatus::from_service(first_field(body, &STATUS_FIELDS).and_then(Value::as_str));
    let report_url = first_field(body, &REPORT_URL_FIELDS)
        .and_then(Value::as_str)
        .map(str::to_string);
    let report = first_field(body, &REPORT_FIELDS)
        .cloned()
        .and_then(|v| serde_json::from_value::<RawReport>(v).ok());

    PollOutcome {
        status,
        report_url,
        report,
    }
}
