use splitroute_domain::{DomainError, MembershipKind, RuleSource};
use splitroute_infrastructure::dns::ForwardGroup;
use splitroute_infrastructure::rules::{build_set, RuleLoader};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Periodically rebuilds a rules-backed group's membership set and
/// publishes it with an atomic swap.
///
/// The first tick is consumed immediately: the set was built at startup.
/// A failed rebuild keeps the current set.
pub struct RuleReloadJob {
    group: Arc<ForwardGroup>,
    sources: Vec<RuleSource>,
    kind: MembershipKind,
    loader: RuleLoader,
    interval: Duration,
    shutdown: CancellationToken,
}

impl RuleReloadJob {
    pub fn new(
        group: Arc<ForwardGroup>,
        sources: Vec<RuleSource>,
        kind: MembershipKind,
        loader: RuleLoader,
        interval: Duration,
    ) -> Self {
        Self {
            group,
            sources,
            kind,
            loader,
            interval,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub async fn start(self: Arc<Self>) {
        info!(
            group = self.group.name(),
            interval_secs = self.interval.as_secs(),
            "Starting rule reload job"
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!(group = self.group.name(), "RuleReloadJob: shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        match self.reload_once().await {
                            Ok(count) => info!(
                                group = self.group.name(),
                                count,
                                "RuleReloadJob: rules reloaded"
                            ),
                            Err(e) => warn!(
                                group = self.group.name(),
                                error = %e,
                                "RuleReloadJob: reload failed, keeping current rules"
                            ),
                        }
                    }
                }
            }
        });
    }

    /// Rebuilds and publishes the set once. Returns the number of names in
    /// the new set.
    pub async fn reload_once(&self) -> Result<usize, DomainError> {
        let set = build_set(self.group.name(), &self.sources, self.kind, &self.loader).await?;
        let count = set.approximate_len();
        if !self.group.matcher().replace_set(set) {
            return Err(DomainError::ConfigError(format!(
                "group '{}' is not rules-backed",
                self.group.name()
            )));
        }
        Ok(count)
    }
}
