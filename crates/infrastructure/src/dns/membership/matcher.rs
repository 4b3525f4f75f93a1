use arc_swap::ArcSwap;
use splitroute_domain::{normalize, wildcard_candidates, DomainName};
use std::sync::Arc;

use super::set::{is_plausible_name, MembershipSet};

enum Rule {
    Suffix {
        from: DomainName,
        except: Vec<DomainName>,
    },
    Set(ArcSwap<MembershipSet>),
    Never,
}

/// Decides whether a forwarding group owns a query name.
pub struct GroupMatcher {
    rule: Rule,
}

impl GroupMatcher {
    pub fn suffix(from: DomainName, except: Vec<DomainName>) -> Self {
        Self {
            rule: Rule::Suffix { from, except },
        }
    }

    /// Owns every name.
    pub fn catch_all() -> Self {
        Self::suffix(DomainName::root(), Vec::new())
    }

    pub fn with_set(set: MembershipSet) -> Self {
        Self {
            rule: Rule::Set(ArcSwap::from_pointee(set)),
        }
    }

    /// Owns nothing.
    pub fn never() -> Self {
        Self { rule: Rule::Never }
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.rule {
            Rule::Suffix { from, except } => match DomainName::parse(name) {
                Ok(name) => from.zone_of(&name) && is_allowed(&name, from, except),
                Err(_) => false,
            },
            Rule::Set(set) => {
                let name = normalize(name);
                if !is_plausible_name(&name) {
                    return false;
                }
                let set = set.load();
                set.contains_normalized(&name)
                    || wildcard_candidates(&name)
                        .iter()
                        .any(|candidate| set.contains_normalized(candidate))
            }
            Rule::Never => false,
        }
    }

    /// Publishes a rebuilt set. Readers see either the old or the new set,
    /// never a partial one. Returns false for matchers that are not
    /// set-backed.
    pub fn replace_set(&self, set: MembershipSet) -> bool {
        match &self.rule {
            Rule::Set(current) => {
                current.store(Arc::new(set));
                true
            }
            _ => false,
        }
    }

    pub fn mode(&self) -> &'static str {
        match &self.rule {
            Rule::Suffix { .. } => "suffix",
            Rule::Set(set) => set.load().kind().as_str(),
            Rule::Never => "never",
        }
    }

    /// Names held by a set-backed matcher.
    pub fn set_len(&self) -> Option<usize> {
        match &self.rule {
            Rule::Set(set) => Some(set.load().approximate_len()),
            _ => None,
        }
    }
}

fn is_allowed(name: &DomainName, from: &DomainName, except: &[DomainName]) -> bool {
    if name == from {
        return true;
    }
    !except.iter().any(|ignored| ignored.zone_of(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DomainName {
        DomainName::parse(s).unwrap()
    }

    #[test]
    fn suffix_match_honours_except() {
        let matcher = GroupMatcher::suffix(name("example.com"), vec![name("blocked.example.com")]);
        assert!(matcher.matches("example.com"));
        assert!(matcher.matches("exist.example.com."));
        assert!(matcher.matches("WWW.Example.Com"));
        assert!(!matcher.matches("blocked.example.com"));
        assert!(!matcher.matches("a.blocked.example.com"));
        assert!(!matcher.matches("example.org"));
        assert!(!matcher.matches("notexample.com"));
    }

    #[test]
    fn except_cannot_exclude_the_apex() {
        let matcher = GroupMatcher::suffix(name("example.com"), vec![name("example.com")]);
        assert!(matcher.matches("example.com"));
        assert!(!matcher.matches("www.example.com"));
    }

    #[test]
    fn catch_all_owns_everything() {
        let matcher = GroupMatcher::catch_all();
        assert!(matcher.matches("anything.test"));
        assert!(matcher.matches("."));
        assert_eq!(matcher.mode(), "suffix");
    }

    #[test]
    fn exact_set_does_not_imply_subdomains() {
        let mut set = MembershipSet::exact();
        set.add("exist.example.com");
        set.add("example.com");
        let matcher = GroupMatcher::with_set(set);

        assert!(matcher.matches("exist.example.com"));
        assert!(!matcher.matches("not-exist.example.com"));
    }

    #[test]
    fn wildcard_entries_cover_subdomains() {
        let mut set = MembershipSet::exact();
        set.add("*.icloud.com");
        let matcher = GroupMatcher::with_set(set);

        assert!(matcher.matches("p12-caldav.icloud.com"));
        assert!(matcher.matches("a.b.icloud.com"));
        assert!(matcher.matches("*.icloud.com"));
        assert!(!matcher.matches("icloud.com"));
    }

    #[test]
    fn malformed_names_never_match() {
        let matcher = GroupMatcher::with_set(MembershipSet::exact());
        assert!(!matcher.matches(""));
        assert!(!matcher.matches("# https://support.apple.com/en-us/HT210060"));
        assert!(!GroupMatcher::catch_all().matches(""));
    }

    #[test]
    fn replace_set_swaps_atomically() {
        let matcher = GroupMatcher::with_set(MembershipSet::exact());
        assert!(!matcher.matches("a.com"));

        let mut next = MembershipSet::exact();
        next.add("a.com");
        assert!(matcher.replace_set(next));
        assert!(matcher.matches("a.com"));
        assert_eq!(matcher.set_len(), Some(1));
    }

    #[test]
    fn replace_set_is_refused_for_suffix_matchers() {
        let matcher = GroupMatcher::catch_all();
        assert!(!matcher.replace_set(MembershipSet::exact()));
        assert_eq!(matcher.set_len(), None);
    }

    #[test]
    fn never_matcher_owns_nothing() {
        let matcher = GroupMatcher::never();
        assert!(!matcher.matches("example.com"));
        assert_eq!(matcher.mode(), "never");
    }
}
