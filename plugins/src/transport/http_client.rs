use async_trait::async_trait;
use qualcode_core::api::{
    paths, CheckBatchRequest, DedupTransport, DeduplicationCheckResult, ResumePayload,
    StatusReport, TaskAccepted, TaskKind, TaskResult, TaskTransport, TransportError,
    TransportErrorKind,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

const BODY_PREVIEW_LIMIT: usize = 512;

fn transport_error_from_reqwest(err: reqwest::Error, path: &str) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_request() {
        TransportErrorKind::Request
    } else if err.is_body() {
        TransportErrorKind::Body
    } else if err.is_decode() {
        TransportErrorKind::Decode
    } else {
        TransportErrorKind::Unknown
    };
    let out = TransportError::new(kind, path, err.to_string());
    match err.status() {
        Some(status) => out.with_status(status.as_u16()),
        None => out,
    }
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let mut out = String::new();
    let mut truncated = false;
    for (idx, ch) in trimmed.chars().enumerate() {
        if idx >= BODY_PREVIEW_LIMIT {
            truncated = true;
            break;
        }
        out.push(ch);
    }

    if truncated {
        out.push_str("...");
    }

    out
}

async fn parse_json_response<T: DeserializeOwned>(
    resp: reqwest::Response,
    path: &str,
) -> Result<T, TransportError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|err| transport_error_from_reqwest(err, path))?;

    if !status.is_success() {
        return Err(TransportError::status_error(
            status.as_u16(),
            path,
            preview_body(&body),
        ));
    }

    let value = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str::<Value>(&body).map_err(|err| {
            TransportError::decode_error(path, &err, &preview_body(&body)).with_status(status.as_u16())
        })?
    };
    serde_json::from_value::<T>(value).map_err(|err| {
        TransportError::decode_error(path, &err, &preview_body(&body)).with_status(status.as_u16())
    })
}

/// reqwest-backed access to the task and dedup endpoints.
#[derive(Clone)]
pub struct HttpTransport {
    api_key: String,
    http: reqwest::Client,
    base: String,
    base_url: reqwest::Url,
    url_execute: String,
    url_resume: String,
    url_check_batch: String,
    url_health: String,
}

impl HttpTransport {
    pub fn new(base_url: String, api_key: String, timeout_ms: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()?;
        let base = base_url.trim_end_matches('/').to_string();
        let parsed = reqwest::Url::parse(&base)?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("backend base url {base} cannot carry a path");
        }
        Ok(Self {
            api_key,
            http,
            url_execute: format!("{}{}", base, paths::EXECUTE),
            url_resume: format!("{}{}", base, paths::RESUME),
            url_check_batch: format!("{}{}", base, paths::CHECK_BATCH),
            url_health: format!("{}{}", base, paths::HEALTH),
            base,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// `{base}/tasks/{endpoint}/{task_id}` with the id percent-encoded as a
    /// single path segment.
    fn task_url(&self, endpoint: &str, task_id: &str) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["tasks", endpoint, task_id]);
        }
        url
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.trim().is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<T, TransportError> {
        let resp = self
            .auth(req)
            .send()
            .await
            .map_err(|err| transport_error_from_reqwest(err, path))?;
        let status = resp.status();
        let out = parse_json_response(resp, path).await;
        tracing::debug!(
            target: "qualcode.http",
            stage = "http.response",
            path = %path,
            status = %status,
            ok = out.is_ok()
        );
        out
    }

    /// Liveness check. A 2xx reply is healthy unless its body carries a
    /// `status` other than `ok`, `healthy` or `up`.
    pub async fn health(&self) -> Result<bool, TransportError> {
        tracing::debug!(target: "qualcode.http", stage = "http.health.in", url = %self.url_health);
        let body: Value = self.send(self.http.get(&self.url_health), paths::HEALTH).await?;
        Ok(health_from_body(&body))
    }
}

fn health_from_body(body: &Value) -> bool {
    match body.get("status").and_then(Value::as_str) {
        Some(status) => matches!(status.to_ascii_lowercase().as_str(), "ok" | "healthy" | "up"),
        None => true,
    }
}

fn execute_body(kind: TaskKind, params: &Value) -> Value {
    let mut body = match params {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("params".to_string(), other.clone());
            map
        }
    };
    body.insert("kind".to_string(), Value::String(kind.as_str().to_string()));
    Value::Object(body)
}

#[async_trait]
impl TaskTransport for HttpTransport {
    async fn execute(&self, kind: TaskKind, params: &Value) -> Result<TaskAccepted, TransportError> {
        tracing::debug!(
            target: "qualcode.http",
            stage = "http.execute.in",
            url = %self.url_execute,
            kind = %kind
        );
        let req = self.http.post(&self.url_execute).json(&execute_body(kind, params));
        self.send(req, paths::EXECUTE).await
    }

    async fn status(&self, task_id: &str) -> Result<StatusReport, TransportError> {
        let path = paths::status(task_id);
        tracing::trace!(target: "qualcode.http", stage = "http.status.in", path = %path);
        let req = self.http.get(self.task_url("status", task_id));
        self.send(req, &path).await
    }

    async fn result(&self, task_id: &str) -> Result<TaskResult, TransportError> {
        let path = paths::result(task_id);
        tracing::debug!(target: "qualcode.http", stage = "http.result.in", path = %path);
        let req = self.http.get(self.task_url("result", task_id));
        self.send(req, &path).await
    }

    async fn resume(&self, task_id: &str) -> Result<TaskAccepted, TransportError> {
        tracing::debug!(
            target: "qualcode.http",
            stage = "http.resume.in",
            url = %self.url_resume,
            task_id = %task_id
        );
        let req = self
            .http
            .post(&self.url_resume)
            .json(&ResumePayload { task_id });
        self.send(req, paths::RESUME).await
    }
}

#[async_trait]
impl DedupTransport for HttpTransport {
    async fn check_batch(
        &self,
        request: &CheckBatchRequest,
    ) -> Result<DeduplicationCheckResult, TransportError> {
        tracing::debug!(
            target: "qualcode.http",
            stage = "http.check_batch.in",
            url = %self.url_check_batch,
            candidates = request.candidates.len(),
            threshold = request.threshold
        );
        let req = self.http.post(&self.url_check_batch).json(request);
        self.send(req, paths::CHECK_BATCH).await
    }
}
