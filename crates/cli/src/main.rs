use clap::{Args, Parser, Subcommand};
use mimalloc::MiMalloc;
use splitroute_domain::config::{DEFAULT_BLOOM_CAPACITY, DEFAULT_BLOOM_FP_RATE};
use splitroute_domain::{CliOverrides, LoggingConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod bootstrap;
mod compile;
mod di;
mod server;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "splitroute")]
#[command(version)]
#[command(about = "splitroute - conditional DNS forwarder with health-aware upstream groups")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Serve DNS (default)
    Run(RunArgs),

    /// Compile rule sources into a bloom filter blob for `cache+` sources
    CompileRules(CompileRulesArgs),
}

#[derive(Args, Default)]
struct RunArgs {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// DNS server port
    #[arg(short = 'd', long)]
    dns_port: Option<u16>,

    /// Bind address
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Args)]
pub(crate) struct CompileRulesArgs {
    /// Rule source: local path or http(s) URL. Repeatable.
    #[arg(long = "source", value_name = "SRC", required = true)]
    pub sources: Vec<String>,

    /// Output file for the filter blob
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Expected number of names
    #[arg(long, default_value_t = DEFAULT_BLOOM_CAPACITY)]
    pub expected: usize,

    /// Target false-positive rate
    #[arg(long, default_value_t = DEFAULT_BLOOM_FP_RATE)]
    pub fp_rate: f64,

    /// Resolver used to look up source hosts. Repeatable.
    #[arg(long = "bootstrap", value_name = "IP[:PORT]")]
    pub bootstrap_resolvers: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::CompileRules(args)) => {
            let logging = LoggingConfig {
                level: args.log_level.clone().unwrap_or_else(|| "info".to_string()),
                ..LoggingConfig::default()
            };
            bootstrap::init_logging(&logging)?;
            compile::compile_rules(args).await
        }
        Some(Command::Run(args)) => run(args).await,
        None => run(cli.run).await,
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let cli_overrides = CliOverrides {
        dns_port: args.dns_port,
        bind_address: args.bind,
        log_level: args.log_level,
    };

    let config = bootstrap::load_config(args.config.as_deref(), cli_overrides)?;
    bootstrap::init_logging(&config.logging)?;

    info!("Starting splitroute v{}", env!("CARGO_PKG_VERSION"));

    let services = di::DnsServices::new(&config).await?;
    let shutdown = CancellationToken::new();

    services.router.start();
    services
        .jobs
        .with_shutdown_token(shutdown.clone())
        .start()
        .await;

    let listen_addr = config.server.listen_addr();
    let tcp_enabled = config.server.tcp_enabled;
    let handler = Arc::clone(&services.handler);
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        if let Err(e) =
            server::start_dns_server(listen_addr, tcp_enabled, handler, server_shutdown).await
        {
            error!(error = %e, "DNS server error");
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received");
        }
        _ = server => {}
    }

    shutdown.cancel();
    services.router.stop();

    for group in services.router.groups() {
        let metrics = group.metrics();
        info!(
            group = group.name(),
            requests = metrics.requests,
            healthcheck_broken = metrics.healthcheck_broken,
            max_concurrent_rejects = metrics.max_concurrent_rejects,
            upstream_errors = metrics.upstream_errors,
            "Group statistics"
        );
    }

    info!("Server shutdown complete");
    Ok(())
}
