use anyhow::Context;
use splitroute_domain::{RuleSource, UpstreamEndpoint};
use splitroute_infrastructure::rules::{compile_bloom, RuleLoader};
use tracing::info;

use crate::CompileRulesArgs;

/// Writes the bloom filter blob read back by `cache+` rule sources.
pub async fn compile_rules(args: CompileRulesArgs) -> anyhow::Result<()> {
    let sources = args
        .sources
        .iter()
        .map(|raw| raw.parse::<RuleSource>())
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(cached) = sources.iter().find(|source| source.is_cache) {
        anyhow::bail!("{cached} is already a compiled filter");
    }

    let bootstrap = args
        .bootstrap_resolvers
        .iter()
        .map(|raw| raw.parse::<UpstreamEndpoint>().map(|endpoint| endpoint.addr))
        .collect::<Result<Vec<_>, _>>()?;

    let loader = RuleLoader::new(bootstrap);
    let (blob, names) = compile_bloom(&sources, args.expected, args.fp_rate, &loader).await?;

    tokio::fs::write(&args.out, &blob)
        .await
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    info!(
        sources = sources.len(),
        names,
        bytes = blob.len(),
        out = %args.out.display(),
        "Rule filter compiled"
    );
    Ok(())
}
