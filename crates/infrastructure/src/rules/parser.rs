//! Loose parsing of domain lists: plain names, hosts files, adblock-style
//! `||name^` rules and `*.name` wildcards.

const HOSTS_ADDRESSES: [&str; 4] = ["0.0.0.0", "127.0.0.1", "::", "::1"];
const HOSTS_LOCAL_NAMES: [&str; 5] = [
    "localhost",
    "0.0.0.0",
    "broadcasthost",
    "ip6-localhost",
    "ip6-loopback",
];

/// The domain named by one list line, lower-cased. Comments, exception
/// rules and regex rules yield nothing.
pub fn parse_rule_line(line: &str) -> Option<String> {
    let line = line.trim();

    if line.is_empty() || line.starts_with('#') || line.starts_with('!') || line.starts_with("@@")
    {
        return None;
    }

    if line.starts_with('/') && line.ends_with('/') {
        return None;
    }

    if let Some(inner) = line.strip_prefix("||") {
        let domain = match inner.find('^') {
            Some(pos) => &inner[..pos],
            None => inner,
        };
        return domain_token(domain);
    }

    let mut parts = line.split_whitespace();
    let first = parts.next()?;

    if HOSTS_ADDRESSES.contains(&first) {
        let domain = parts.next()?;
        if HOSTS_LOCAL_NAMES.contains(&domain) {
            return None;
        }
        return domain_token(domain);
    }

    // "name # comment" and plain names
    domain_token(first)
}

/// Every domain in `text`, one per line.
pub fn parse_rule_text(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines().filter_map(parse_rule_line)
}

fn domain_token(token: &str) -> Option<String> {
    let token = token.trim().trim_end_matches('.');
    if token.is_empty() || token.starts_with('#') || !token.contains('.') {
        return None;
    }
    if token.contains(['/', ':', '$', '|', '^']) {
        return None;
    }
    Some(token.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_lower_cased() {
        assert_eq!(parse_rule_line("  Apple.COM  "), Some("apple.com".to_string()));
        assert_eq!(parse_rule_line("icloud.com."), Some("icloud.com".to_string()));
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        assert_eq!(parse_rule_line(""), None);
        assert_eq!(parse_rule_line("# https://support.apple.com/en-us/HT210060"), None);
        assert_eq!(parse_rule_line("! Title: list"), None);
        assert_eq!(parse_rule_line("@@||allowed.com^"), None);
        assert_eq!(parse_rule_line("/ads[0-9]+\\.com/"), None);
    }

    #[test]
    fn trailing_comments_are_ignored() {
        assert_eq!(
            parse_rule_line("apple.com # main site"),
            Some("apple.com".to_string())
        );
    }

    #[test]
    fn hosts_lines_yield_the_name() {
        assert_eq!(
            parse_rule_line("0.0.0.0 ads.example.com"),
            Some("ads.example.com".to_string())
        );
        assert_eq!(parse_rule_line("127.0.0.1 localhost"), None);
        assert_eq!(parse_rule_line("::1 ip6-localhost"), None);
    }

    #[test]
    fn adblock_rules_yield_the_name() {
        assert_eq!(
            parse_rule_line("||tracker.example.com^"),
            Some("tracker.example.com".to_string())
        );
        assert_eq!(
            parse_rule_line("||*.cdn.example.com^"),
            Some("*.cdn.example.com".to_string())
        );
        assert_eq!(parse_rule_line("||example.com^$third-party"), Some("example.com".to_string()));
    }

    #[test]
    fn wildcards_are_kept() {
        assert_eq!(parse_rule_line("*.icloud.com"), Some("*.icloud.com".to_string()));
    }

    #[test]
    fn urls_and_single_labels_are_rejected() {
        assert_eq!(parse_rule_line("https://example.com/list"), None);
        assert_eq!(parse_rule_line("localhost"), None);
    }

    #[test]
    fn text_yields_each_domain() {
        let text = "# header\napple.com\n\n0.0.0.0 icloud.com\n||mzstatic.com^\n";
        let names: Vec<String> = parse_rule_text(text).collect();
        assert_eq!(names, vec!["apple.com", "icloud.com", "mzstatic.com"]);
    }
}
