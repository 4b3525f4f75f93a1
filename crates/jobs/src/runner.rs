use crate::RuleReloadJob;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct JobRunner {
    rule_reloads: Vec<RuleReloadJob>,
    shutdown: Option<CancellationToken>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self {
            rule_reloads: Vec::new(),
            shutdown: None,
        }
    }

    pub fn with_rule_reload(mut self, job: RuleReloadJob) -> Self {
        self.rule_reloads.push(job);
        self
    }

    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub fn job_count(&self) -> usize {
        self.rule_reloads.len()
    }

    pub async fn start(self) {
        if self.rule_reloads.is_empty() {
            return;
        }
        info!(jobs = self.rule_reloads.len(), "Starting background job runner");

        for job in self.rule_reloads {
            let job = match &self.shutdown {
                Some(token) => job.with_cancellation(token.clone()),
                None => job,
            };
            Arc::new(job).start().await;
        }
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}
