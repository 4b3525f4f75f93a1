pub mod forward_group;
pub mod message_builder;
pub mod metrics;
pub mod response_parser;

pub use forward_group::{ForwardGroup, DEFAULT_FORWARD_TIMEOUT};
pub use message_builder::MessageBuilder;
pub use metrics::{ForwardMetrics, ForwardMetricsSnapshot};
pub use response_parser::ResponseParser;
