use metrics_exporter_prometheus::PrometheusHandle;
use scheme_eligibility::eligibility::{
    CitizenSnapshot, IssueReportError, IssueReporter, RuleConfigurationIssue, RuleId,
};
use scheme_eligibility::error::AppError;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) issues: Arc<InMemoryIssueReporter>,
}

/// Keeps the most recent configuration issue per rule version for the admin endpoint.
#[derive(Default, Clone)]
pub(crate) struct InMemoryIssueReporter {
    latest: Arc<Mutex<BTreeMap<RuleId, RuleConfigurationIssue>>>,
}

impl IssueReporter for InMemoryIssueReporter {
    fn report(&self, issue: RuleConfigurationIssue) -> Result<(), IssueReportError> {
        warn!(
            rule_id = %issue.rule_id,
            scheme_id = %issue.scheme_id,
            version = issue.version,
            message = %issue.message,
            "rule needs administrator attention"
        );
        let mut guard = self
            .latest
            .lock()
            .map_err(|_| IssueReportError::Transport("issue log lock poisoned".to_string()))?;
        guard.insert(issue.rule_id.clone(), issue);
        Ok(())
    }
}

impl InMemoryIssueReporter {
    pub(crate) fn issues(&self) -> Vec<RuleConfigurationIssue> {
        self.latest
            .lock()
            .map(|guard| guard.values().cloned().collect())
            .unwrap_or_default()
    }
}

pub(crate) fn load_snapshot(path: &Path) -> Result<CitizenSnapshot, AppError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|err| {
        AppError::Input(format!(
            "snapshot {} is not a valid citizen snapshot: {err}",
            path.display()
        ))
    })
}
