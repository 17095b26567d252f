//! Longest-prefix route matching over (SNI domain, first-message prefix).
//!
//! [`RoutingTable`] is built once from directives and never mutated
//! afterwards. Each domain owns a bucket of `(prefix, entry)` pairs kept
//! in resolution order: longest prefix first, equal lengths in reverse
//! lexicographic order, so the empty catch-all prefix always comes last.
//! The empty domain is the wildcard bucket used for plain connections,
//! unknown SNI names, and as the fallback when a domain bucket has no
//! matching prefix.

use std::collections::HashMap;

use crate::config::directive::Directive;
use crate::error::CentrifugeError;

/// Where a matched connection goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// `host:port` of the backend.
    pub backend: String,
    /// Dial the backend over TLS.
    pub tls: bool,
    /// Inject `X-Forwarded-For` after the first line of the sniffed bytes.
    pub http: bool,
}

impl RouteEntry {
    /// Host part of [`backend`](Self::backend), used as the TLS server name.
    #[must_use]
    pub fn host(&self) -> &str {
        self.backend
            .rsplit_once(':')
            .map_or(self.backend.as_str(), |(host, _)| host)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    buckets: HashMap<String, Vec<(String, RouteEntry)>>,
}

impl RoutingTable {
    /// Parse every directive and build the table.
    ///
    /// A later directive for the same `(domain, prefix)` replaces the
    /// earlier one. The first malformed directive aborts the build.
    pub fn build<S: AsRef<str>>(directives: &[S]) -> Result<Self, CentrifugeError> {
        let mut staged: HashMap<String, HashMap<String, RouteEntry>> = HashMap::new();

        for raw in directives {
            let directive = Directive::parse(raw.as_ref())?;
            let bucket = staged.entry(directive.domain.clone()).or_default();
            if let Some(previous) = bucket.insert(directive.prefix.clone(), directive.entry) {
                tracing::warn!(
                    domain = %directive.domain,
                    prefix = %directive.prefix,
                    replaced = %previous.backend,
                    "duplicate route key, later directive wins"
                );
            }
        }

        let buckets = staged
            .into_iter()
            .map(|(domain, pairs)| {
                let mut pairs: Vec<(String, RouteEntry)> = pairs.into_iter().collect();
                pairs.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| b.cmp(a)));
                (domain, pairs)
            })
            .collect();

        Ok(Self { buckets })
    }

    /// Pick the entry for a connection.
    ///
    /// Scans the bucket for `domain` (if one exists) and then the wildcard
    /// bucket, returning the first pair whose prefix starts `initial`.
    #[must_use]
    pub fn resolve(&self, domain: &str, initial: &[u8]) -> Option<&RouteEntry> {
        let domain = domain.to_ascii_lowercase();
        let domain_match = if domain.is_empty() {
            None
        } else {
            self.buckets
                .get(&domain)
                .and_then(|bucket| first_match(bucket, initial))
        };

        domain_match.or_else(|| {
            self.buckets
                .get("")
                .and_then(|bucket| first_match(bucket, initial))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `(domain, prefix, entry)` in resolution order, domains sorted
    /// alphabetically with the wildcard bucket first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &RouteEntry)> {
        let mut domains: Vec<&String> = self.buckets.keys().collect();
        domains.sort();
        domains.into_iter().flat_map(move |domain| {
            self.buckets[domain]
                .iter()
                .map(move |(prefix, entry)| (domain.as_str(), prefix.as_str(), entry))
        })
    }
}

fn first_match<'a>(bucket: &'a [(String, RouteEntry)], initial: &[u8]) -> Option<&'a RouteEntry> {
    bucket
        .iter()
        .find(|(prefix, _)| initial.starts_with(prefix.as_bytes()))
        .map(|(_, entry)| entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(directives: &[&str]) -> RoutingTable {
        RoutingTable::build(directives).unwrap()
    }

    fn backend<'a>(t: &'a RoutingTable, domain: &str, msg: &[u8]) -> Option<&'a str> {
        t.resolve(domain, msg).map(|e| e.backend.as_str())
    }

    #[test]
    fn longest_prefix_wins() {
        let t = table(&["ab:10.0.0.1:1", "abc:10.0.0.2:2", "10.0.0.3:3"]);
        assert_eq!(backend(&t, "", b"abcX"), Some("10.0.0.2:2"));
        assert_eq!(backend(&t, "", b"abX"), Some("10.0.0.1:1"));
        assert_eq!(backend(&t, "", b"xyz"), Some("10.0.0.3:3"));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let forward = table(&["ab:a:1", "abc:b:2"]);
        let reverse = table(&["abc:b:2", "ab:a:1"]);
        assert_eq!(backend(&forward, "", b"abcd"), backend(&reverse, "", b"abcd"));
    }

    #[test]
    fn no_default_means_not_found() {
        let t = table(&["SSH-:127.0.0.1:22"]);
        assert!(t.resolve("", b"GET /").is_none());
    }

    #[test]
    fn later_directive_overwrites() {
        let t = table(&["GET:a:1", "GET:b:2"]);
        assert_eq!(t.len(), 1);
        assert_eq!(backend(&t, "", b"GET /"), Some("b:2"));
    }

    #[test]
    fn unknown_domain_falls_back_to_wildcard() {
        let t = table(&["a.test::a:1", "w:2"]);
        assert_eq!(backend(&t, "b.test", b"hello"), Some("w:2"));
        assert_eq!(backend(&t, "a.test", b"hello"), Some("a:1"));
    }

    #[test]
    fn domain_bucket_without_match_falls_back_to_wildcard() {
        let t = table(&["a.test:GET:a:1", "w:2"]);
        assert_eq!(backend(&t, "a.test", b"GET /"), Some("a:1"));
        assert_eq!(backend(&t, "a.test", b"SSH-2.0"), Some("w:2"));
    }

    #[test]
    fn domain_lookup_is_case_insensitive() {
        let t = table(&["A.Test::a:1"]);
        assert_eq!(backend(&t, "a.TEST", b"x"), Some("a:1"));
    }

    #[test]
    fn prefix_matches_raw_bytes() {
        let t = table(&["\u{16}\u{3}:tls:443", "plain:80"]);
        assert_eq!(backend(&t, "", &[0x16, 0x03, 0x01, 0xff]), Some("tls:443"));
        assert_eq!(backend(&t, "", &[0xff, 0xfe]), Some("plain:80"));
    }

    #[test]
    fn iter_yields_resolution_order() {
        let t = table(&["b.test::b:1", "x:w:1", "xyz:w:3", "w:9", "xy:w:2"]);
        let keys: Vec<(&str, &str)> = t.iter().map(|(d, p, _)| (d, p)).collect();
        assert_eq!(
            keys,
            vec![("", "xyz"), ("", "xy"), ("", "x"), ("", ""), ("b.test", "")]
        );
    }

    #[test]
    fn equal_length_prefixes_sort_reverse_lexicographic() {
        let t = table(&["aa:a:1", "ab:b:1", "ac:c:1"]);
        let prefixes: Vec<&str> = t.iter().map(|(_, p, _)| p).collect();
        assert_eq!(prefixes, vec!["ac", "ab", "aa"]);
    }

    #[test]
    fn host_strips_port() {
        let entry = RouteEntry {
            backend: "backend.internal:8443".into(),
            tls: true,
            http: false,
        };
        assert_eq!(entry.host(), "backend.internal");
    }
}
