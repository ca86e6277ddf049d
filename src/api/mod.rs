use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::stream::event::StatusEvent;

const DEFAULT_API_URL: &str = "http://localhost:8000";

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ResearchRequest {
    pub company: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hq_location: Option<String>,
}

impl ResearchRequest {
    pub fn new(company: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            company_url: None,
            industry: None,
            hq_location: None,
        }
    }

    /// Fill the optional fields from SCOUTBOT_* env vars, normalizing a bare
    /// domain into an https URL the backend accepts.
    pub fn with_env_details(mut self) -> Self {
        self.company_url = std::env::var("SCOUTBOT_COMPANY_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| normalize_company_url(&s));
        self.industry = std::env::var("SCOUTBOT_INDUSTRY")
            .ok()
            .filter(|s| !s.trim().is_empty());
        self.hq_location = std::env::var("SCOUTBOT_HQ")
            .ok()
            .filter(|s| !s.trim().is_empty());
        self
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    job_id: Option<String>,
}

// ── HTTP client builder ───────────────────────────────────────────────────────

pub fn build_http_client() -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    if let Ok(proxy_url) = std::env::var("HTTP_PROXY") {
        builder = builder.proxy(reqwest::Proxy::all(&proxy_url)?);
    }

    if let Ok(ms) = std::env::var("API_TIMEOUT_MS") {
        if let Ok(ms) = ms.parse::<u64>() {
            builder = builder
                .timeout(std::time::Duration::from_millis(ms))
                .connect_timeout(std::time::Duration::from_secs(10));
        }
    }

    builder.build().map_err(Into::into)
}

// ── Job client ────────────────────────────────────────────────────────────────

/// Client for the research backend: job submission, the job-status polling
/// endpoint, and the derived WebSocket address for the event stream.
#[derive(Clone)]
pub struct JobClient {
    http: reqwest::Client,
    base_url: String,
    ws_base: String,
}

impl JobClient {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SCOUTBOT_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let ws_base = match std::env::var("SCOUTBOT_WS_URL") {
            Ok(url) => url.trim_end_matches('/').to_string(),
            Err(_) => derive_ws_base(&base_url)?,
        };
        Ok(Self {
            http: build_http_client()?,
            base_url,
            ws_base,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket address for a job's event stream.
    pub fn stream_url(&self, job_id: &str) -> String {
        format!("{}/research/ws/{job_id}", self.ws_base)
    }

    /// Submit a research job and return its identifier.
    pub async fn submit_research(&self, request: &ResearchRequest) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/research", self.base_url))
            .json(request)
            .send()
            .await
            .context("research request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("research submission failed ({status}): {text}"));
        }

        let parsed: SubmitResponse = resp
            .json()
            .await
            .context("failed to parse research response")?;
        parsed
            .job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("no job ID received"))
    }

    /// Ask the out-of-band status endpoint whether the job finished.
    ///
    /// Returns `Ok(None)` while the job is still running, and the terminal
    /// event (equivalent to the stream's `completed`/`failed`) once it is
    /// done.
    pub async fn check_final_report(&self, job_id: &str) -> Result<Option<StatusEvent>> {
        let resp = self
            .http
            .get(format!("{}/research/status/{job_id}", self.base_url))
            .send()
            .await
            .context("status poll failed")?;

        if !resp.status().is_success() {
            return Err(anyhow!("status poll returned {}", resp.status()));
        }

        let text = resp.text().await.context("failed reading status poll body")?;
        parse_status_payload(&text)
    }
}

/// Parse the polling endpoint's body into a terminal event, if the job is
/// done. The payload mirrors the stream's `data` object.
fn parse_status_payload(text: &str) -> Result<Option<StatusEvent>> {
    #[derive(Deserialize)]
    struct PollResult {
        report: Option<String>,
    }
    #[derive(Deserialize)]
    struct PollBody {
        status: Option<String>,
        error: Option<String>,
        message: Option<String>,
        result: Option<PollResult>,
    }

    let body: PollBody = serde_json::from_str(text).context("malformed status poll payload")?;
    match body.status.as_deref() {
        Some("completed") => Ok(Some(StatusEvent::Completed {
            report: body
                .result
                .and_then(|r| r.report)
                .unwrap_or_default(),
        })),
        Some("failed") | Some("error") => Ok(Some(StatusEvent::Failed {
            message: body
                .error
                .or(body.message)
                .unwrap_or_else(|| "Research failed".to_string()),
        })),
        _ => Ok(None),
    }
}

fn derive_ws_base(base_url: &str) -> Result<String> {
    if let Some(rest) = base_url.strip_prefix("https://") {
        Ok(format!("wss://{rest}"))
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        Ok(format!("ws://{rest}"))
    } else {
        Err(anyhow!("SCOUTBOT_API_URL has no http(s) scheme: {base_url}"))
    }
}

pub fn normalize_company_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::{derive_ws_base, normalize_company_url, parse_status_payload};
    use crate::stream::event::StatusEvent;

    #[test]
    fn ws_base_mirrors_http_scheme() {
        assert_eq!(
            derive_ws_base("https://api.example.com").unwrap(),
            "wss://api.example.com"
        );
        assert_eq!(
            derive_ws_base("http://localhost:8000").unwrap(),
            "ws://localhost:8000"
        );
        assert!(derive_ws_base("ftp://x").is_err());
    }

    #[test]
    fn company_url_gets_https_prefix() {
        assert_eq!(normalize_company_url("acme.com"), "https://acme.com");
        assert_eq!(
            normalize_company_url("http://acme.com"),
            "http://acme.com"
        );
    }

    #[test]
    fn poll_payload_running_job_is_none() {
        let parsed = parse_status_payload(r#"{"status":"processing"}"#).unwrap();
        assert_eq!(parsed, None);
    }

    #[test]
    fn poll_payload_completed_carries_report() {
        let parsed =
            parse_status_payload(r#"{"status":"completed","result":{"report":"FINAL"}}"#).unwrap();
        assert_eq!(parsed, Some(StatusEvent::Completed { report: "FINAL".into() }));
    }

    #[test]
    fn poll_payload_failed_carries_message() {
        let parsed = parse_status_payload(r#"{"status":"failed","error":"boom"}"#).unwrap();
        assert_eq!(parsed, Some(StatusEvent::Failed { message: "boom".into() }));
    }

    #[test]
    fn poll_payload_malformed_is_an_error() {
        assert!(parse_status_payload("{").is_err());
    }
}
