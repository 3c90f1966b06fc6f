use piecefetch::observer::NoopObserver;
use piecefetch::retry::{Backoff, RetryPolicy};
use piecefetch::{DownloadConfig, download, prepare_download};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Serves `data` like a static file server: ranged requests get a 206 with
/// the slice, plain requests the whole body. The first `fail_ranged` ranged
/// requests get a 500 instead.
struct FileResponder {
    data: Vec<u8>,
    accept_ranges: bool,
    fail_ranged: u32,
    ranged_calls: AtomicU32,
}

impl FileResponder {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            accept_ranges: true,
            fail_ranged: 0,
            ranged_calls: AtomicU32::new(0),
        }
    }
}

impl Respond for FileResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let range = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.split_once('-'))
            .and_then(|(s, e)| Some((s.parse::<usize>().ok()?, e.parse::<usize>().ok()?)));

        match range {
            Some((start, end)) => {
                if self.ranged_calls.fetch_add(1, Ordering::SeqCst) < self.fail_ranged {
                    return ResponseTemplate::new(500);
                }
                ResponseTemplate::new(206).set_body_bytes(self.data[start..=end].to_vec())
            }
            None => {
                let template = ResponseTemplate::new(200).set_body_bytes(self.data.clone());
                if self.accept_ranges {
                    template.insert_header("Accept-Ranges", "bytes")
                } else {
                    template
                }
            }
        }
    }
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn config(url: String, dir: &TempDir, concurrency: usize) -> DownloadConfig {
    let mut config = DownloadConfig::new(url);
    config.concurrency = concurrency;
    config.output = Some(dir.path().join("out.bin"));
    config.retry = RetryPolicy {
        max_attempts: None,
        backoff: Backoff::Fixed(Duration::from_millis(5)),
    };
    config
}

async fn range_headers(server: &MockServer) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| {
            r.headers
                .get("range")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .collect()
}

#[tokio::test]
async fn test_four_way_download_of_200000_bytes() {
    let server = MockServer::start().await;
    let data = pattern(200_000);
    Mock::given(method("GET"))
        .respond_with(FileResponder::new(data.clone()))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config(format!("{}/file.bin", server.uri()), &dir, 4);

    let prepared = prepare_download(&config).await.unwrap();
    assert_eq!(prepared.concurrency, 4);
    assert_eq!(prepared.store.layout().piece_size(), 50_000);
    assert_eq!(prepared.store.layout().piece_count(), 4);

    let summary = prepared
        .scheduler(&config, Arc::new(NoopObserver))
        .run()
        .await
        .unwrap();
    assert_eq!(summary.pieces, 4);
    assert_eq!(summary.bytes, 200_000);
    assert!(prepared.store.snapshot().all());

    let written = tokio::fs::read(dir.path().join("out.bin")).await.unwrap();
    assert_eq!(written, data);

    let mut ranges: Vec<String> = range_headers(&server).await.into_iter().flatten().collect();
    ranges.sort();
    assert_eq!(
        ranges,
        vec![
            "bytes=0-49999",
            "bytes=100000-149999",
            "bytes=150000-199999",
            "bytes=50000-99999",
        ]
    );
}

#[tokio::test]
async fn test_no_accept_ranges_falls_back_to_one_piece() {
    let server = MockServer::start().await;
    let data = pattern(150_000);
    let mut responder = FileResponder::new(data.clone());
    responder.accept_ranges = false;
    Mock::given(method("GET"))
        .respond_with(responder)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config(server.uri(), &dir, 8);

    let prepared = prepare_download(&config).await.unwrap();
    assert!(!prepared.target.supports_range);
    assert_eq!(prepared.concurrency, 1);
    assert_eq!(prepared.store.layout().piece_count(), 1);

    prepared
        .scheduler(&config, Arc::new(NoopObserver))
        .run()
        .await
        .unwrap();

    assert_eq!(tokio::fs::read(dir.path().join("out.bin")).await.unwrap(), data);
    // Pre-flight plus one whole-body fetch, neither ranged.
    assert_eq!(range_headers(&server).await, vec![None, None]);
}

#[tokio::test]
async fn test_failed_pieces_are_retried_until_complete() {
    let server = MockServer::start().await;
    let data = pattern(300_000);
    let mut responder = FileResponder::new(data.clone());
    responder.fail_ranged = 5;
    Mock::given(method("GET"))
        .respond_with(responder)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = config(server.uri(), &dir, 3);

    let summary = download(&config, Arc::new(NoopObserver)).await.unwrap();
    assert_eq!(summary.failed_attempts, 5);
    assert_eq!(summary.bytes, 300_000);
    assert_eq!(tokio::fs::read(dir.path().join("out.bin")).await.unwrap(), data);
}

#[tokio::test]
async fn test_give_up_when_attempts_are_capped() {
    let server = MockServer::start().await;
    let mut responder = FileResponder::new(pattern(1000));
    responder.fail_ranged = u32::MAX;
    Mock::given(method("GET"))
        .respond_with(responder)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = config(server.uri(), &dir, 2);
    config.retry.max_attempts = Some(2);

    assert!(download(&config, Arc::new(NoopObserver)).await.is_err());
}

#[tokio::test]
async fn test_setup_error_when_host_is_unreachable() {
    let dir = TempDir::new().unwrap();
    let config = config("http://127.0.0.1:1/file.bin".to_string(), &dir, 2);

    assert!(prepare_download(&config).await.is_err());
    assert!(!dir.path().join("out.bin").exists());
}

/// Answers every connection with a body and no `Content-Length`, closing the
/// connection to end it.
async fn serve_without_length(body: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nAccept-Ranges: bytes\r\nConnection: close\r\n\r\n")
                    .await;
                let _ = socket.write_all(body).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}/stream", addr)
}

#[tokio::test]
async fn test_unknown_size_downloads_as_single_piece() {
    let body: &'static [u8] = b"a body whose length nobody announced";
    let url = serve_without_length(body).await;

    let dir = TempDir::new().unwrap();
    let config = config(url, &dir, 4);

    let prepared = prepare_download(&config).await.unwrap();
    assert_eq!(prepared.target.total_size, None);
    assert_eq!(prepared.concurrency, 1);
    assert_eq!(prepared.store.layout().piece_size(), 0);
    assert_eq!(prepared.store.layout().piece_count(), 1);

    prepared
        .scheduler(&config, Arc::new(NoopObserver))
        .run()
        .await
        .unwrap();

    assert_eq!(tokio::fs::read(dir.path().join("out.bin")).await.unwrap(), body);
}
