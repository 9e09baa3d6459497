use std::sync::Arc;

use super::resolve::resolve;
use super::types::{CommitDecision, DeduplicationCheckResult, GateOutcome};
use crate::error::GateError;
use crate::events::{ErrorBus, ErrorEvent, ErrorOrigin};
use crate::transport::{paths, CheckBatchRequest, DedupTransport};

pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// Screens a batch of candidate identifiers for near-duplicates before they
/// are persisted.
#[derive(Clone)]
pub struct DedupGate {
    transport: Arc<dyn DedupTransport>,
    errors: Option<ErrorBus>,
    default_threshold: f32,
}

impl DedupGate {
    pub fn new(transport: Arc<dyn DedupTransport>) -> Self {
        Self {
            transport,
            errors: None,
            default_threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_error_bus(mut self, bus: ErrorBus) -> Self {
        self.errors = Some(bus);
        self
    }

    pub fn with_default_threshold(mut self, threshold: f32) -> Self {
        self.default_threshold = threshold;
        self
    }

    pub fn default_threshold(&self) -> f32 {
        self.default_threshold
    }

    /// Pure query against the backend; nothing is written.
    pub async fn check(
        &self,
        candidates: &[String],
        threshold: f32,
    ) -> Result<DeduplicationCheckResult, GateError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(GateError::Validation(format!(
                "threshold must be within [0, 1], got {threshold}"
            )));
        }
        if candidates.iter().any(|c| c.trim().is_empty()) {
            return Err(GateError::Validation(
                "candidates must not be blank".to_string(),
            ));
        }
        if candidates.is_empty() {
            return Ok(DeduplicationCheckResult::empty());
        }

        tracing::debug!(
            target: "qualcode.dedup",
            stage = "dedup.check.in",
            candidates = candidates.len(),
            threshold = threshold
        );

        let request = CheckBatchRequest {
            candidates: candidates.to_vec(),
            threshold,
        };
        match self.transport.check_batch(&request).await {
            Ok(result) => {
                let result = result.normalized();
                tracing::debug!(
                    target: "qualcode.dedup",
                    stage = "dedup.check.out",
                    has_any_similar = result.has_any_similar,
                    flagged = result.flagged_count()
                );
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(
                    target: "qualcode.dedup",
                    stage = "dedup.check.failed",
                    error = %err,
                    "dedup check inconclusive, write blocked"
                );
                if let Some(bus) = &self.errors {
                    let mut event =
                        ErrorEvent::from_transport(&err).with_origin(ErrorOrigin::DedupCheck);
                    if event.path.is_empty() {
                        event.path = paths::CHECK_BATCH.to_string();
                    }
                    bus.publish(event);
                }
                Err(GateError::Inconclusive(err))
            }
        }
    }

    /// Runs the check and, only when something is similar, asks `decide`.
    ///
    /// A failed check is returned as an error; callers must not write.
    pub async fn guard<F>(
        &self,
        candidates: &[String],
        threshold: f32,
        decide: F,
    ) -> Result<GateOutcome, GateError>
    where
        F: FnOnce(&DeduplicationCheckResult) -> CommitDecision,
    {
        let check = self.check(candidates, threshold).await?;
        if !check.has_any_similar {
            return Ok(GateOutcome {
                decision: None,
                to_commit: candidates.to_vec(),
                check,
            });
        }

        let decision = decide(&check);
        let to_commit = resolve(decision, &check, candidates);
        tracing::info!(
            target: "qualcode.dedup",
            stage = "dedup.resolve",
            decision = %decision,
            candidates = candidates.len(),
            to_commit = to_commit.len()
        );
        Ok(GateOutcome {
            decision: Some(decision),
            to_commit,
            check,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::types::{CandidateCheck, SimilarMatch};
    use crate::error::{TransportError, TransportErrorKind};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDedup {
        calls: AtomicUsize,
        reply: Result<DeduplicationCheckResult, TransportError>,
    }

    #[async_trait]
    impl DedupTransport for FixedDedup {
        async fn check_batch(
            &self,
            _request: &CheckBatchRequest,
        ) -> Result<DeduplicationCheckResult, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn gate(reply: Result<DeduplicationCheckResult, TransportError>) -> (DedupGate, Arc<FixedDedup>) {
        let t = Arc::new(FixedDedup {
            calls: AtomicUsize::new(0),
            reply,
        });
        (DedupGate::new(t.clone()), t)
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn rejects_out_of_range_threshold() {
        let (g, t) = gate(Ok(DeduplicationCheckResult::empty()));
        assert!(matches!(
            g.check(&names(&["a"]), 1.5).await,
            Err(GateError::Validation(_))
        ));
        assert!(g.check(&names(&["a"]), f32::NAN).await.is_err());
        assert_eq!(t.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_batch_skips_backend() {
        let (g, t) = gate(Ok(DeduplicationCheckResult::empty()));
        let r = g.check(&[], 0.85).await.unwrap();
        assert!(!r.has_any_similar);
        assert_eq!(t.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_blocks_write_and_publishes() {
        let err = TransportError::new(TransportErrorKind::Connect, paths::CHECK_BATCH, "refused");
        let (g, _t) = gate(Err(err));
        let bus = ErrorBus::new();
        let (_sub, mut rx) = bus.subscribe_channel();
        let g = g.with_error_bus(bus);

        let mut asked = false;
        let out = g
            .guard(&names(&["a"]), 0.85, |_| {
                asked = true;
                CommitDecision::CommitAll
            })
            .await;
        assert!(matches!(out, Err(GateError::Inconclusive(_))));
        assert!(!asked);
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.status, 0);
        assert_eq!(ev.path, paths::CHECK_BATCH);
        assert_eq!(ev.origin, ErrorOrigin::DedupCheck);
    }

    #[tokio::test]
    async fn nothing_similar_commits_all_without_asking() {
        let (g, _t) = gate(Ok(DeduplicationCheckResult {
            has_any_similar: false,
            results: vec![CandidateCheck {
                candidate: "a".into(),
                has_similar: false,
                similar: vec![],
            }],
        }));
        let out = g
            .guard(&names(&["a"]), 0.85, |_| panic!("should not be asked"))
            .await
            .unwrap();
        assert_eq!(out.decision, None);
        assert_eq!(out.to_commit, names(&["a"]));
    }

    #[tokio::test]
    async fn similar_batch_applies_decision() {
        let (g, _t) = gate(Ok(DeduplicationCheckResult {
            has_any_similar: true,
            results: vec![
                CandidateCheck {
                    candidate: "resiliencia_comunitaria".into(),
                    has_similar: true,
                    similar: vec![SimilarMatch {
                        existing: "resiliencia comunitaria".into(),
                        similarity: 0.93,
                    }],
                },
                CandidateCheck {
                    candidate: "cuidado".into(),
                    has_similar: false,
                    similar: vec![],
                },
            ],
        }));
        let batch = names(&["resiliencia_comunitaria", "cuidado"]);
        let out = g
            .guard(&batch, 0.85, |_| CommitDecision::CommitNonDuplicatesOnly)
            .await
            .unwrap();
        assert_eq!(out.to_commit, names(&["cuidado"]));

        let out = g.guard(&batch, 0.85, |_| CommitDecision::Abort).await.unwrap();
        assert!(out.is_aborted());
        assert!(out.to_commit.is_empty());
    }
}
