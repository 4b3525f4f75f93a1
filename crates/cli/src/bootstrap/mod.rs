use anyhow::Context;
use splitroute_domain::{CliOverrides, Config, LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn load_config(path: Option<&str>, cli_overrides: CliOverrides) -> anyhow::Result<Config> {
    let config = Config::load(path, cli_overrides).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(logging: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&logging.level),
    }
    .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match logging.format {
        LogFormat::Text => registry.with(fmt::layer().with_target(false)).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    installed.context("Failed to install the tracing subscriber")
}
