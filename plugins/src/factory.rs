use std::sync::Arc;

use anyhow::Result;

use qualcode_core::api::{AppConfig, BackendConfig, DedupGate, ErrorBus, TaskKind, TaskOrchestrator};

use crate::transport::HttpTransport;

pub fn build_transport(cfg: &BackendConfig) -> Result<Arc<HttpTransport>> {
    Ok(Arc::new(HttpTransport::new(
        cfg.base_url.clone(),
        cfg.api_key.clone(),
        cfg.timeout_ms,
    )?))
}

pub fn build_orchestrator(
    cfg: &AppConfig,
    kind: TaskKind,
    transport: Arc<HttpTransport>,
    errors: &ErrorBus,
) -> TaskOrchestrator {
    TaskOrchestrator::new(kind, transport, cfg.polling, Some(errors.clone()))
}

pub fn build_dedup_gate(
    cfg: &AppConfig,
    transport: Arc<HttpTransport>,
    errors: &ErrorBus,
) -> DedupGate {
    DedupGate::new(transport)
        .with_error_bus(errors.clone())
        .with_default_threshold(cfg.dedup.threshold)
}
