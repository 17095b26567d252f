//! Integration tests for routing table construction and resolution.

use centrifuge::config::directive::Directive;
use centrifuge::proxy::routing::{RouteEntry, RoutingTable};

fn backend(table: &RoutingTable, domain: &str, initial: &[u8]) -> Option<String> {
    table
        .resolve(domain, initial)
        .map(|entry| entry.backend.clone())
}

#[test]
fn directive_shapes_bind_the_documented_keys() {
    let table = RoutingTable::build(&[
        "example.com:GET:10.0.0.1:80/http",
        "SSH-:10.0.0.2:22",
        "10.0.0.3:443/ssl",
    ])
    .unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(
        table.resolve("example.com", b"GET / HTTP/1.1\r\n"),
        Some(&RouteEntry {
            backend: "10.0.0.1:80".into(),
            tls: false,
            http: true,
        })
    );
    assert_eq!(
        backend(&table, "", b"SSH-2.0-OpenSSH_9.6\r\n").as_deref(),
        Some("10.0.0.2:22")
    );
    assert_eq!(
        table.resolve("", b"\x16\x03\x01"),
        Some(&RouteEntry {
            backend: "10.0.0.3:443".into(),
            tls: true,
            http: false,
        })
    );
}

#[test]
fn longest_prefix_wins_regardless_of_order() {
    let forward = ["GET:a:1", "GET /api:b:2", "G:c:3", "d:4"];
    let mut reverse = forward;
    reverse.reverse();

    for directives in [forward, reverse] {
        let table = RoutingTable::build(&directives).unwrap();
        assert_eq!(backend(&table, "", b"GET /api/v1").as_deref(), Some("b:2"));
        assert_eq!(backend(&table, "", b"GET /").as_deref(), Some("a:1"));
        assert_eq!(backend(&table, "", b"GIT").as_deref(), Some("c:3"));
        assert_eq!(backend(&table, "", b"POST /").as_deref(), Some("d:4"));
    }
}

#[test]
fn domain_routes_fall_back_to_wildcard_routes() {
    let table = RoutingTable::build(&["a.test:PI:a:1", "b:2"]).unwrap();

    assert_eq!(backend(&table, "a.test", b"PING").as_deref(), Some("a:1"));
    // a.test has a bucket but nothing in it matches
    assert_eq!(backend(&table, "a.test", b"HELO").as_deref(), Some("b:2"));
    // unknown domain
    assert_eq!(backend(&table, "c.test", b"PING").as_deref(), Some("b:2"));
    // wildcard connections never see domain routes
    assert_eq!(backend(&table, "", b"PING").as_deref(), Some("b:2"));
}

#[test]
fn no_default_route_means_no_match() {
    let table = RoutingTable::build(&["PI:a:1"]).unwrap();
    assert!(table.resolve("", b"HELO").is_none());
    assert!(table.resolve("x.test", b"HELO").is_none());
    assert!(table.resolve("", b"P").is_none());
}

#[test]
fn later_directive_replaces_earlier_key() {
    let table = RoutingTable::build(&["PI:a:1", "PI:b:2/ssl"]).unwrap();
    assert_eq!(table.len(), 1);
    let entry = table.resolve("", b"PING").unwrap();
    assert_eq!(entry.backend, "b:2");
    assert!(entry.tls);
}

#[test]
fn first_malformed_directive_aborts_build() {
    let err = RoutingTable::build(&["a:1", "a:b:c:d:5", "x"]).unwrap_err();
    assert!(err.to_string().contains("a:b:c:d:5"));
}

#[test]
fn iteration_follows_resolution_order() {
    let table = RoutingTable::build(&["z.test::z:1", "x:2", "LONGER:y:3", "m.test:A:m:4"]).unwrap();
    let order: Vec<(&str, &str)> = table.iter().map(|(d, p, _)| (d, p)).collect();
    assert_eq!(
        order,
        vec![
            ("", "LONGER"),
            ("", ""),
            ("m.test", "A"),
            ("z.test", ""),
        ]
    );
}

#[test]
fn parse_then_resolve_agrees_with_directive() {
    let raw = "Example.COM:\x16:backend.internal:8443/http/ssl";
    let directive = Directive::parse(raw).unwrap();
    assert_eq!(directive.domain, "example.com");

    let table = RoutingTable::build(&[raw]).unwrap();
    assert_eq!(table.resolve("EXAMPLE.com", b"\x16\x03"), Some(&directive.entry));
    assert!(directive.entry.tls && directive.entry.http);
}
