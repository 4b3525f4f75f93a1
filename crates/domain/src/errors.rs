use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DomainError {
    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Invalid client subnet: {0}")]
    InvalidSubnet(String),

    #[error("Invalid upstream endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid DNS response: {0}")]
    InvalidDnsResponse(String),

    #[error("Rule source error: {0}")]
    RuleSource(String),

    #[error("Concurrent queries exceeded maximum {0}")]
    LimitExceeded(i64),

    #[error("Transport timeout connecting to {server}")]
    TransportTimeout { server: String },

    #[error("Transport connection refused by {server}")]
    TransportConnectionRefused { server: String },

    #[error("Transport connection reset by {server}")]
    TransportConnectionReset { server: String },

    #[error("Transport error with {server}: {message}")]
    Transport { server: String, message: String },

    #[error("Cached connection was closed by peer")]
    CachedConnectionClosed,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("No healthy upstream servers available")]
    NoHealthyUpstream,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DomainError {
    /// Errors raised while talking to an upstream. Only these trigger a health
    /// check of the upstream; everything else is a local fault.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            DomainError::TransportTimeout { .. }
                | DomainError::TransportConnectionRefused { .. }
                | DomainError::TransportConnectionReset { .. }
                | DomainError::Transport { .. }
                | DomainError::CachedConnectionClosed
                | DomainError::Tls(_)
                | DomainError::InvalidDnsResponse(_)
        )
    }
}
