use splitroute_domain::{DomainError, MatcherDirective, MembershipKind, RuleSource};
use tracing::{info, warn};

use super::loader::RuleLoader;
use super::parser::{parse_rule_line, parse_rule_text};
use crate::dns::membership::{BloomFilter, GroupMatcher, MembershipSet};

/// Builds a group's matcher. Rule sources are fetched through `loader`;
/// any failing source fails the whole build.
pub async fn build_matcher(
    group: &str,
    directive: &MatcherDirective,
    loader: &RuleLoader,
) -> Result<GroupMatcher, DomainError> {
    let matcher = match directive {
        MatcherDirective::Suffix { from, except } => {
            GroupMatcher::suffix(from.clone(), except.clone())
        }
        MatcherDirective::Inline(names) => {
            let mut set = MembershipSet::exact();
            for entry in names {
                match parse_rule_line(entry) {
                    Some(name) => {
                        set.add(&name);
                    }
                    None => warn!(
                        group,
                        entry = %entry,
                        "Ignoring inline entry that is not a domain name"
                    ),
                }
            }
            GroupMatcher::with_set(set)
        }
        MatcherDirective::Rules { sources, kind } => {
            GroupMatcher::with_set(build_set(group, sources, *kind, loader).await?)
        }
    };

    info!(
        group,
        mode = matcher.mode(),
        count = matcher.set_len().unwrap_or(0),
        "Group matcher built"
    );
    Ok(matcher)
}

/// Accumulates every source into one set. A `cache+` source replaces the
/// bloom filter built so far with the serialized one it holds.
pub async fn build_set(
    group: &str,
    sources: &[RuleSource],
    kind: MembershipKind,
    loader: &RuleLoader,
) -> Result<MembershipSet, DomainError> {
    let mut set = MembershipSet::with_kind(kind);
    let mut rejected = 0usize;

    for source in sources {
        if source.is_cache {
            let blob = loader.fetch(source).await?;
            set = MembershipSet::Bloom(BloomFilter::from_bytes(&blob)?);
            continue;
        }

        let text = loader.fetch_text(source).await?;
        for name in parse_rule_text(&text) {
            if !set.add(&name) && kind == MembershipKind::Cuckoo && !set.contains(&name) {
                rejected += 1;
            }
        }
    }

    if rejected > 0 {
        warn!(group, rejected, "Names did not fit in the cuckoo filter");
    }
    Ok(set)
}

/// Compiles rule sources into a bloom filter blob usable as a `cache+`
/// source.
pub async fn compile_bloom(
    sources: &[RuleSource],
    expected: usize,
    fp_rate: f64,
    loader: &RuleLoader,
) -> Result<(Vec<u8>, usize), DomainError> {
    let mut filter = BloomFilter::new(expected, fp_rate);
    let mut names = 0usize;

    for source in sources {
        let text = loader.fetch_text(source).await?;
        for name in parse_rule_text(&text) {
            filter.insert(&name);
            names += 1;
        }
    }

    Ok((filter.to_bytes(), names))
}
