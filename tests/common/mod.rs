//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;

use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tokio_rustls::rustls::pki_types::CertificateDer;

use warc_replay_proxy::config::ReplayConfig;
use warc_replay_proxy::lifecycle::{prepare, Shutdown};

/// A gzip-compressed WARC response record.
pub fn warc_response(url: &str, status_line: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut http = format!("{}\r\n", status_line).into_bytes();
    for (name, value) in headers {
        http.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    http.extend_from_slice(b"\r\n");
    http.extend_from_slice(body);

    let mut record = format!(
        "WARC/1.0\r\nWARC-Type: response\r\nWARC-Target-URI: {}\r\nContent-Type: application/http; msgtype=response\r\nContent-Length: {}\r\n\r\n",
        url,
        http.len()
    )
    .into_bytes();
    record.extend_from_slice(&http);
    record.extend_from_slice(b"\r\n\r\n");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&record).unwrap();
    encoder.finish().unwrap()
}

/// A running proxy on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub ca_cert: CertificateDer<'static>,
    shutdown: Shutdown,
    handle: JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestProxy {
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.handle.await;
    }
}

/// Write `records` to an archive, generate a certificate for `hosts`, and
/// start serving.
pub async fn start_proxy(records: &[Vec<u8>], hosts: &[&str]) -> TestProxy {
    let dir = tempfile::tempdir().unwrap();
    let warc = dir.path().join("capture.warc.gz");
    std::fs::write(&warc, records.concat()).unwrap();

    let generated =
        rcgen::generate_simple_self_signed(hosts.iter().map(|h| h.to_string()).collect::<Vec<_>>())
            .unwrap();
    let cert_path = dir.path().join("ca.crt");
    let key_path = dir.path().join("ca.key");
    std::fs::write(&cert_path, generated.cert.pem()).unwrap();
    std::fs::write(&key_path, generated.key_pair.serialize_pem()).unwrap();

    let mut config = ReplayConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.archive.files = vec![warc];
    config.tls.cert_path = cert_path;
    config.tls.key_path = key_path;
    config.timeouts.shutdown_grace_secs = 1;

    let prepared = prepare(&config).await.unwrap();
    let addr = prepared.listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let handle = tokio::spawn(async move {
        prepared.server.run(prepared.listener, signal).await.unwrap();
    });

    TestProxy {
        addr,
        ca_cert: generated.cert.der().clone(),
        shutdown,
        handle,
        _dir: dir,
    }
}

/// Read one response head (byte by byte) and its `Content-Length` body.
pub async fn read_response<S: AsyncRead + Unpin>(stream: &mut S) -> (String, Vec<u8>) {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await.unwrap();
        assert!(n > 0, "connection closed inside response head");
        head.push(byte[0]);
    }
    let head = String::from_utf8(head).unwrap();

    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).await.unwrap();
    (head, body)
}
