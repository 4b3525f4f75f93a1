//! Rule sources: fetching, line parsing and membership set construction.

pub mod builder;
pub mod loader;
pub mod parser;

pub use builder::{build_matcher, build_set, compile_bloom};
pub use loader::RuleLoader;
pub use parser::{parse_rule_line, parse_rule_text};
