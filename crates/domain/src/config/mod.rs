pub mod errors;
pub mod group;
pub mod logging;
pub mod root;
pub mod server;
pub mod upstream;

pub use errors::ConfigError;
pub use group::{
    GroupConfig, MatcherDirective, TlsParams, DEFAULT_BLOOM_CAPACITY, DEFAULT_BLOOM_FP_RATE,
    MAX_UPSTREAMS,
};
pub use logging::{LogFormat, LoggingConfig};
pub use root::{CliOverrides, Config};
pub use server::ServerConfig;
pub use upstream::{MembershipKind, UpstreamPolicy};
