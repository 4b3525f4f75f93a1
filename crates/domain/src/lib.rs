//! splitroute domain layer
pub mod client_subnet;
pub mod config;
pub mod domain_name;
pub mod errors;
pub mod rule_source;
pub mod upstream_endpoint;

pub use client_subnet::{parse_edns0_subnet, ClientSubnet};
pub use config::{
    CliOverrides, Config, ConfigError, GroupConfig, LogFormat, LoggingConfig, MatcherDirective,
    MembershipKind, ServerConfig, TlsParams, UpstreamPolicy,
};
pub use domain_name::{normalize, wildcard_candidates, DomainName};
pub use errors::DomainError;
pub use rule_source::{RuleLocation, RuleSource};
pub use upstream_endpoint::{UpstreamEndpoint, UpstreamTransport};
