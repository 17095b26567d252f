//! End-to-end tests for TLS termination on the listener and TLS to
//! backends, using throwaway certificates from rcgen.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use centrifuge::proxy::dial::Dialer;
use centrifuge::proxy::routing::RoutingTable;
use centrifuge::proxy::ProxyState;
use centrifuge::server::Listener;
use centrifuge::tls::{self, BackendVerification, CertificateStore};

fn store_for(hosts: &[&str]) -> CertificateStore {
    let mut store = CertificateStore::new();
    for host in hosts {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec![(*host).to_string()]).unwrap();
        store
            .insert_pem(
                host,
                cert.pem().as_bytes(),
                key_pair.serialize_pem().as_bytes(),
            )
            .unwrap();
    }
    store
}

async fn start_router(
    directives: &[String],
    acceptor: Option<TlsAcceptor>,
    verification: BackendVerification,
) -> (SocketAddr, oneshot::Sender<()>) {
    let table = RoutingTable::build(directives).unwrap();
    let dialer = Dialer::new(Duration::from_secs(2), verification);
    let state = ProxyState::new(table, dialer);

    let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), acceptor, Arc::new(state))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(listener.run(async {
        let _ = shutdown_rx.await;
    }));
    (addr, shutdown_tx)
}

/// Plain backend that reads until EOF, then answers `<tag>:<everything read>`.
async fn tagged_echo(tag: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut data = Vec::new();
                sock.read_to_end(&mut data).await.unwrap();
                sock.write_all(format!("{tag}:").as_bytes()).await.unwrap();
                sock.write_all(&data).await.unwrap();
                sock.shutdown().await.unwrap();
            });
        }
    });
    addr
}

/// TLS backend with the same behavior, serving a self-signed `localhost`.
async fn tls_tagged_echo(tag: &'static str) -> SocketAddr {
    let acceptor = tls::acceptor(Arc::new(store_for(&["localhost"])));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(mut sock) = acceptor.accept(tcp).await else {
                    return;
                };
                let mut data = Vec::new();
                sock.read_to_end(&mut data).await.unwrap();
                sock.write_all(format!("{tag}:").as_bytes()).await.unwrap();
                sock.write_all(&data).await.unwrap();
                sock.shutdown().await.unwrap();
            });
        }
    });
    addr
}

async fn tls_exchange(router: SocketAddr, sni: &str, payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let connector = TlsConnector::from(Arc::new(tls::client_config(BackendVerification::Skip)));
    let tcp = TcpStream::connect(router).await?;
    let name = ServerName::try_from(sni.to_string()).unwrap();
    let mut stream = connector.connect(name, tcp).await?;
    stream.write_all(payload).await?;
    stream.shutdown().await?;
    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut reply))
        .await
        .expect("reply timed out")?;
    Ok(reply)
}

async fn plain_exchange(router: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(router).await.unwrap();
    client.write_all(payload).await.unwrap();
    client.shutdown().await.unwrap();
    let mut reply = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut reply))
        .await
        .expect("reply timed out");
    reply
}

#[tokio::test]
async fn sni_selects_domain_routes() {
    let a = tagged_echo("A").await;
    let b = tagged_echo("B").await;
    let acceptor = tls::acceptor(Arc::new(store_for(&["a.test", "b.test"])));
    let (router, _shutdown) = start_router(
        &[format!("a.test::{a}"), b.to_string()],
        Some(acceptor),
        BackendVerification::Skip,
    )
    .await;

    let reply = tls_exchange(router, "a.test", b"hello").await.unwrap();
    assert_eq!(reply, b"A:hello");

    // b.test has a certificate but no routes of its own
    let reply = tls_exchange(router, "b.test", b"hello").await.unwrap();
    assert_eq!(reply, b"B:hello");
}

#[tokio::test]
async fn host_outside_whitelist_fails_handshake() {
    let a = tagged_echo("A").await;
    let acceptor = tls::acceptor(Arc::new(store_for(&["a.test"])));
    let (router, _shutdown) = start_router(
        &[a.to_string()],
        Some(acceptor),
        BackendVerification::Skip,
    )
    .await;

    assert!(tls_exchange(router, "c.test", b"hello").await.is_err());
    // the listener keeps serving
    assert_eq!(
        tls_exchange(router, "a.test", b"again").await.unwrap(),
        b"A:again"
    );
}

#[tokio::test]
async fn domain_without_matching_route_is_closed() {
    let a = tagged_echo("A").await;
    let acceptor = tls::acceptor(Arc::new(store_for(&["a.test", "b.test"])));
    let (router, _shutdown) = start_router(
        &[format!("a.test::{a}")],
        Some(acceptor),
        BackendVerification::Skip,
    )
    .await;

    let reply = tls_exchange(router, "b.test", b"hello").await;
    assert!(reply.map_or(true, |r| r.is_empty()));
}

#[tokio::test]
async fn ssl_backend_with_self_signed_certificate() {
    let backend = tls_tagged_echo("S").await;
    let (router, _shutdown) = start_router(
        &[format!("localhost:{}/ssl", backend.port())],
        None,
        BackendVerification::Skip,
    )
    .await;

    assert_eq!(plain_exchange(router, b"PING").await, b"S:PING");
}

#[tokio::test]
async fn verified_backend_rejects_self_signed_certificate() {
    let backend = tls_tagged_echo("S").await;
    let (router, _shutdown) = start_router(
        &[format!("localhost:{}/ssl", backend.port())],
        None,
        BackendVerification::WebPki,
    )
    .await;

    assert!(plain_exchange(router, b"PING").await.is_empty());
}

#[tokio::test]
async fn tls_on_both_legs_with_forwarded_for() {
    let backend = tls_tagged_echo("S").await;
    let acceptor = tls::acceptor(Arc::new(store_for(&["a.test"])));
    let (router, _shutdown) = start_router(
        &[format!("a.test:GET:localhost:{}/http/ssl", backend.port())],
        Some(acceptor),
        BackendVerification::Skip,
    )
    .await;

    let reply = tls_exchange(router, "a.test", b"GET / HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    assert_eq!(
        reply,
        b"S:GET / HTTP/1.1\r\nX-Forwarded-For: 127.0.0.1\r\n\r\n"
    );
}
