use std::{error::Error as StdError, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    Decode,
    Status,
    Unknown,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Decode => "decode",
            Self::Status => "status",
            Self::Unknown => "unknown",
        }
    }

    /// No response reached the client at all.
    pub fn is_connectivity(self) -> bool {
        matches!(self, Self::Timeout | Self::Connect)
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request that failed between the client and the backend.
///
/// `path` is the logical request identity (e.g. `/tasks/status/abc`), not the
/// full URL, so that notices stay comparable across deployments.
#[derive(Debug, Clone)]
pub struct TransportError {
    kind: TransportErrorKind,
    status: Option<u16>,
    path: String,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status_error(status: u16, path: impl Into<String>, preview: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Status, path, preview).with_status(status)
    }

    pub fn decode_error(path: impl Into<String>, err: &serde_json::Error, preview: &str) -> Self {
        Self::new(
            TransportErrorKind::Decode,
            path,
            format!("failed to decode response body: {} | body={}", err, preview),
        )
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// HTTP status, or 0 when no response was received.
    pub fn status_code(&self) -> u16 {
        self.status.unwrap_or(0)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error kind={}", self.kind)?;
        if let Some(status) = self.status {
            write!(f, " status={}", status)?;
        }
        write!(f, " path={}: {}", self.path, self.message)
    }
}

impl StdError for TransportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_status_and_path() {
        let err = TransportError::status_error(502, "/tasks/status/t1", "bad gateway");
        let msg = err.to_string();
        assert!(msg.contains("kind=status"));
        assert!(msg.contains("status=502"));
        assert!(msg.contains("path=/tasks/status/t1"));
        assert!(msg.contains("bad gateway"));
    }

    #[test]
    fn status_code_is_zero_without_response() {
        let err = TransportError::new(TransportErrorKind::Connect, "/tasks/execute", "refused");
        assert_eq!(err.status_code(), 0);
        assert!(err.kind().is_connectivity());
    }

    #[test]
    fn decode_error_mentions_body() {
        let decode_err = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        let err = TransportError::decode_error("/tasks/result/t1", &decode_err, "nope");
        assert_eq!(err.kind(), TransportErrorKind::Decode);
        assert!(err.to_string().contains("failed to decode response body"));
    }
}
