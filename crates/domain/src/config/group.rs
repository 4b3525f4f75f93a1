use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::errors::ConfigError;
use super::upstream::{MembershipKind, UpstreamPolicy};
use crate::client_subnet::{parse_edns0_subnet, ClientSubnet};
use crate::domain_name::DomainName;
use crate::rule_source::RuleSource;
use crate::upstream_endpoint::{UpstreamEndpoint, UpstreamTransport};

/// Upper bound on upstreams per group.
pub const MAX_UPSTREAMS: usize = 15;

/// Expected cardinality of a rules-backed bloom filter.
pub const DEFAULT_BLOOM_CAPACITY: usize = 50_000;

/// False-positive rate of a rules-backed bloom filter.
pub const DEFAULT_BLOOM_FP_RATE: f64 = 0.001;

/// One forwarding group: which names it owns and where it sends them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,

    /// Suffix this group owns. A group without any matcher directive owns
    /// the root zone and therefore every name.
    #[serde(default)]
    pub from: Option<String>,

    #[serde(default)]
    pub except: Vec<String>,

    /// Inline names, matched exactly (plus wildcard entries).
    #[serde(default)]
    pub domains: Vec<String>,

    #[serde(default)]
    pub rules: Vec<String>,

    #[serde(default)]
    pub membership: Option<MembershipKind>,

    #[serde(default)]
    pub bootstrap_resolvers: Vec<String>,

    #[serde(default)]
    pub rules_reload_secs: u64,

    pub to: Vec<String>,

    #[serde(default)]
    pub policy: UpstreamPolicy,

    #[serde(default = "default_max_fails")]
    pub max_fails: u32,

    #[serde(default = "default_health_check_ms")]
    pub health_check_ms: u64,

    #[serde(default)]
    pub health_check_no_rec: bool,

    #[serde(default)]
    pub force_tcp: bool,

    #[serde(default)]
    pub prefer_udp: bool,

    #[serde(default = "default_expire_secs")]
    pub expire_secs: u64,

    #[serde(default)]
    pub max_concurrent: i64,

    #[serde(default)]
    pub edns_client_subnet: Vec<String>,

    #[serde(default)]
    pub tls: Option<TlsParams>,

    #[serde(default)]
    pub tls_servername: Option<String>,
}

/// Client-side TLS material. `ca` replaces the bundled web roots.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TlsParams {
    #[serde(default)]
    pub cert: Option<PathBuf>,

    #[serde(default)]
    pub key: Option<PathBuf>,

    #[serde(default)]
    pub ca: Option<PathBuf>,
}

/// The single matching rule a group is built from.
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherDirective {
    Suffix {
        from: DomainName,
        except: Vec<DomainName>,
    },
    Inline(Vec<String>),
    Rules {
        sources: Vec<RuleSource>,
        kind: MembershipKind,
    },
}

impl GroupConfig {
    /// A group owning everything under `from`, forwarding to `to`, with
    /// every other option at its default.
    pub fn new(name: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            name: name.into(),
            from: None,
            except: Vec::new(),
            domains: Vec::new(),
            rules: Vec::new(),
            membership: None,
            bootstrap_resolvers: Vec::new(),
            rules_reload_secs: 0,
            to,
            policy: UpstreamPolicy::default(),
            max_fails: default_max_fails(),
            health_check_ms: default_health_check_ms(),
            health_check_no_rec: false,
            force_tcp: false,
            prefer_udp: false,
            expire_secs: default_expire_secs(),
            max_concurrent: 0,
            edns_client_subnet: Vec::new(),
            tls: None,
            tls_servername: None,
        }
    }

    pub fn matcher_directive(&self) -> Result<MatcherDirective, ConfigError> {
        let given = [
            self.from.is_some(),
            !self.domains.is_empty(),
            !self.rules.is_empty(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if given > 1 {
            return Err(self.invalid("only one of from, domains and rules may be set"));
        }
        if !self.except.is_empty() && (!self.domains.is_empty() || !self.rules.is_empty()) {
            return Err(self.invalid("except only applies to from"));
        }
        if self.membership.is_some() && self.rules.is_empty() {
            return Err(self.invalid("membership only applies to rules"));
        }

        if !self.domains.is_empty() {
            return Ok(MatcherDirective::Inline(self.domains.clone()));
        }

        if !self.rules.is_empty() {
            let sources = self
                .rules
                .iter()
                .map(|raw| raw.parse::<RuleSource>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| self.invalid(&e.to_string()))?;
            let kind = self.membership.unwrap_or_default();
            if kind != MembershipKind::Bloom && sources.iter().any(|s| s.is_cache) {
                return Err(self.invalid("cache+ sources require the bloom membership"));
            }
            return Ok(MatcherDirective::Rules { sources, kind });
        }

        let from = match self.from.as_deref() {
            Some(from) => DomainName::parse(from).map_err(|e| self.invalid(&e.to_string()))?,
            None => DomainName::root(),
        };
        let except = self
            .except
            .iter()
            .map(|name| DomainName::parse(name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.invalid(&e.to_string()))?;

        Ok(MatcherDirective::Suffix { from, except })
    }

    pub fn endpoints(&self) -> Result<Vec<UpstreamEndpoint>, ConfigError> {
        if self.to.is_empty() {
            return Err(self.invalid("no upstreams configured in to"));
        }
        if self.to.len() > MAX_UPSTREAMS {
            return Err(self.invalid(&format!(
                "more than {} upstreams configured: {}",
                MAX_UPSTREAMS,
                self.to.len()
            )));
        }

        self.to
            .iter()
            .map(|raw| raw.parse::<UpstreamEndpoint>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.invalid(&e.to_string()))
    }

    pub fn client_subnets(&self) -> Result<Vec<ClientSubnet>, ConfigError> {
        self.edns_client_subnet
            .iter()
            .map(|raw| parse_edns0_subnet(raw))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.invalid(&e.to_string()))
    }

    /// Resolvers used to look up rule source hosts, as `IP` or `IP:PORT`.
    pub fn bootstrap_resolvers(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.bootstrap_resolvers
            .iter()
            .map(|raw| {
                let endpoint = raw
                    .parse::<UpstreamEndpoint>()
                    .map_err(|e| self.invalid(&e.to_string()))?;
                if endpoint.transport != UpstreamTransport::Dns {
                    return Err(self.invalid(&format!(
                        "bootstrap resolver {raw} must be plain DNS"
                    )));
                }
                Ok(endpoint.addr)
            })
            .collect()
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_ms)
    }

    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_secs)
    }

    pub fn rules_reload_interval(&self) -> Option<Duration> {
        (self.rules_reload_secs > 0 && !self.rules.is_empty())
            .then(|| Duration::from_secs(self.rules_reload_secs))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Group name cannot be empty".to_string(),
            ));
        }
        if self.max_concurrent < 0 {
            return Err(self.invalid(&format!(
                "max_concurrent can't be negative: {}",
                self.max_concurrent
            )));
        }
        if let Some(tls) = &self.tls {
            if tls.cert.is_some() != tls.key.is_some() {
                return Err(self.invalid("tls cert and key must be given together"));
            }
        }

        self.matcher_directive()?;
        self.endpoints()?;
        self.client_subnets()?;
        self.bootstrap_resolvers()?;
        Ok(())
    }

    fn invalid(&self, message: &str) -> ConfigError {
        ConfigError::Validation(format!("group '{}': {}", self.name, message))
    }
}

fn default_max_fails() -> u32 {
    2
}

fn default_health_check_ms() -> u64 {
    500
}

fn default_expire_secs() -> u64 {
    10
}
