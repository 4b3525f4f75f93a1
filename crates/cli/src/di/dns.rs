use anyhow::Context;
use splitroute_domain::{Config, DomainError, GroupConfig, MatcherDirective};
use splitroute_infrastructure::dns::transport::build_client_config;
use splitroute_infrastructure::dns::{
    DnsRequestHandler, ForwardGroup, Policy, Proxy, Router, ServFailNext, Upstream,
};
use splitroute_infrastructure::rules::{build_matcher, RuleLoader};
use splitroute_jobs::{JobRunner, RuleReloadJob};
use std::sync::Arc;
use tracing::info;

pub struct DnsServices {
    pub router: Arc<Router>,
    pub handler: Arc<DnsRequestHandler>,
    pub jobs: JobRunner,
}

impl DnsServices {
    /// Builds every group. Any group that fails to build aborts startup.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        info!(groups = config.groups.len(), "Initializing forwarding groups");

        let mut groups = Vec::with_capacity(config.groups.len());
        let mut jobs = JobRunner::new();

        for group_config in &config.groups {
            let (group, directive) = Self::build_group(group_config)
                .await
                .with_context(|| format!("Failed to build group '{}'", group_config.name))?;
            let group = Arc::new(group);

            if let (Some(interval), MatcherDirective::Rules { sources, kind }) =
                (group_config.rules_reload_interval(), directive)
            {
                let loader = RuleLoader::new(group_config.bootstrap_resolvers()?);
                jobs = jobs.with_rule_reload(RuleReloadJob::new(
                    Arc::clone(&group),
                    sources,
                    kind,
                    loader,
                    interval,
                ));
            }

            groups.push(group);
        }

        let router = Arc::new(Router::new(groups));
        let handler = Arc::new(DnsRequestHandler::new(
            Arc::clone(&router),
            Arc::new(ServFailNext),
        ));

        Ok(Self {
            router,
            handler,
            jobs,
        })
    }

    async fn build_group(
        config: &GroupConfig,
    ) -> anyhow::Result<(ForwardGroup, MatcherDirective)> {
        let directive = config.matcher_directive()?;
        let loader = RuleLoader::new(config.bootstrap_resolvers()?);
        let matcher = build_matcher(&config.name, &directive, &loader).await?;

        let upstreams = Self::build_upstreams(config)?;

        let group = ForwardGroup::new(config.name.as_str(), matcher, upstreams)
            .with_policy(Policy::from_config(config.policy))
            .with_max_fails(config.max_fails)
            .with_health_check_interval(config.health_check_interval())
            .with_max_concurrent(config.max_concurrent)
            .with_transport(config.force_tcp, config.prefer_udp)
            .with_client_subnets(config.client_subnets()?);

        info!(
            group = group.name(),
            upstreams = group.upstream_count(),
            policy = group.policy_name(),
            max_fails = config.max_fails,
            "Forwarding group configured"
        );

        Ok((group, directive))
    }

    fn build_upstreams(config: &GroupConfig) -> anyhow::Result<Vec<Arc<dyn Upstream>>> {
        let endpoints = config.endpoints()?;
        let tls_config = if endpoints.iter().any(|endpoint| endpoint.is_tls()) {
            Some(build_client_config(config.tls.as_ref())?)
        } else {
            None
        };

        let upstreams = endpoints
            .into_iter()
            .map(|endpoint| {
                let is_tls = endpoint.is_tls();
                let mut proxy = Proxy::new(endpoint);
                proxy.set_expire(config.expire());
                proxy.set_recursion_desired(!config.health_check_no_rec);
                proxy.set_health_check_tcp(config.force_tcp);
                if let (true, Some(tls_config)) = (is_tls, &tls_config) {
                    proxy.set_tls_config(Arc::clone(tls_config), config.tls_servername.as_deref())?;
                }
                Ok(Arc::new(proxy) as Arc<dyn Upstream>)
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(upstreams)
    }
}
