//! Process counters exposed on the `/metrics` listener.

use std::sync::atomic::{AtomicU64, Ordering};

/// Request counters for the config endpoint. Lock-free; shared via `Arc`.
#[derive(Debug, Default)]
pub(crate) struct ServerMetrics {
    documents_served: AtomicU64,
    document_failures: AtomicU64,
}

impl ServerMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_served(&self) {
        self.documents_served.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.document_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format.
    pub(crate) fn to_prometheus(&self) -> String {
        let served = self.documents_served.load(Ordering::SeqCst);
        let failures = self.document_failures.load(Ordering::SeqCst);

        format!(
            "# HELP mcs_documents_served_total Provisioning documents served\n\
             # TYPE mcs_documents_served_total counter\n\
             mcs_documents_served_total {served}\n\
             # HELP mcs_document_failures_total Config requests that failed\n\
             # TYPE mcs_document_failures_total counter\n\
             mcs_document_failures_total {failures}\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let text = ServerMetrics::new().to_prometheus();
        assert!(text.contains("mcs_documents_served_total 0\n"));
        assert!(text.contains("mcs_document_failures_total 0\n"));
    }

    #[test]
    fn counts_requests() {
        let metrics = ServerMetrics::new();
        metrics.record_served();
        metrics.record_served();
        metrics.record_failure();

        let text = metrics.to_prometheus();
        assert!(text.contains("mcs_documents_served_total 2\n"));
        assert!(text.contains("mcs_document_failures_total 1\n"));
        assert!(text.contains("# TYPE mcs_documents_served_total counter"));
    }
}
