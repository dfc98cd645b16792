//! Direct HTTP download against a mock server.

use std::time::{Duration, Instant};

use newsacquire::models::{DocumentFormat, SessionCookie, SessionCookies};
use newsacquire::scrapers::{DirectFetcher, Exhaustion, FetchError, RetryPolicy, USER_AGENT};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PDF_BYTES: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF";

fn fetcher() -> DirectFetcher {
    // Zero delays keep retry tests fast
    DirectFetcher::new(
        None,
        Duration::from_secs(2),
        Duration::from_secs(5),
        RetryPolicy::new(3, vec![0, 0, 0]),
    )
}

fn no_cookies() -> SessionCookies {
    SessionCookies::default()
}

#[tokio::test]
async fn test_pdf_saved_with_exact_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/newspaper/download/2024-03-01"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(PDF_BYTES),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("2024-03-01_newspaper");
    let url = format!("{}/newspaper/download/2024-03-01", server.uri());

    let format = fetcher()
        .fetch(&url, &no_cookies(), &stem, false)
        .await
        .unwrap();

    assert_eq!(format, DocumentFormat::Pdf);
    let saved = std::fs::read(dir.path().join("2024-03-01_newspaper.pdf")).unwrap();
    assert_eq!(saved, PDF_BYTES);
    assert!(!dir.path().join("2024-03-01_newspaper.html").exists());
}

#[tokio::test]
async fn test_non_pdf_content_is_saved_as_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string("<html><body>Edition</body></html>"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("edition");

    let format = fetcher()
        .fetch(&server.uri(), &no_cookies(), &stem, false)
        .await
        .unwrap();

    assert_eq!(format, DocumentFormat::Html);
    let saved = std::fs::read_to_string(dir.path().join("edition.html")).unwrap();
    assert!(saved.contains("Edition"));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(PDF_BYTES),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("2024-03-01_newspaper");

    let format = fetcher()
        .fetch(&server.uri(), &no_cookies(), &stem, true)
        .await
        .unwrap();

    assert_eq!(format, DocumentFormat::Pdf);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_existing_file_is_overwritten() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(PDF_BYTES),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("2024-03-01_newspaper");
    std::fs::write(dir.path().join("2024-03-01_newspaper.pdf"), b"stale").unwrap();

    fetcher()
        .fetch(&server.uri(), &no_cookies(), &stem, false)
        .await
        .unwrap();

    let saved = std::fs::read(dir.path().join("2024-03-01_newspaper.pdf")).unwrap();
    assert_eq!(saved, PDF_BYTES);
}

#[tokio::test]
async fn test_permanent_status_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("No edition today"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = fetcher()
        .fetch(&server.uri(), &no_cookies(), &dir.path().join("x"), false)
        .await
        .unwrap_err();

    match err {
        FetchError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "No edition today");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_retryable_status_exhausts_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let err = fetcher()
        .fetch(&server.uri(), &no_cookies(), &dir.path().join("x"), false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FetchError::RetryExhausted {
            attempts: 3,
            exhaustion: Exhaustion::Status(503)
        }
    ));
    assert!(err.to_string().contains("status 503 after 3 attempts"));
}

#[tokio::test]
async fn test_timeouts_exhaust_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let fetcher = DirectFetcher::new(
        None,
        Duration::from_millis(200),
        Duration::from_millis(300),
        RetryPolicy::new(3, vec![0]),
    );
    let dir = tempfile::tempdir().unwrap();
    let err = fetcher
        .fetch(&server.uri(), &no_cookies(), &dir.path().join("x"), false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FetchError::RetryExhausted {
            attempts: 3,
            exhaustion: Exhaustion::TimedOut
        }
    ));
    assert!(err.to_string().contains("timed out repeatedly"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_recovers_after_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(PDF_BYTES),
        )
        .mount(&server)
        .await;

    // The schedule alone would wait far longer than the test allows
    let fetcher = DirectFetcher::new(
        None,
        Duration::from_secs(2),
        Duration::from_secs(5),
        RetryPolicy::new(3, vec![600]),
    );
    let dir = tempfile::tempdir().unwrap();
    let format = tokio::time::timeout(
        Duration::from_secs(10),
        fetcher.fetch(&server.uri(), &no_cookies(), &dir.path().join("x"), false),
    )
    .await
    .expect("Retry-After should override the schedule")
    .unwrap();

    assert_eq!(format, DocumentFormat::Pdf);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_write_failure_is_filesystem_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(PDF_BYTES),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("missing-dir").join("2024-03-01_newspaper");

    let err = fetcher()
        .fetch(&server.uri(), &no_cookies(), &stem, false)
        .await
        .unwrap_err();

    assert!(err.is_filesystem(), "{err:?}");
}

#[tokio::test]
async fn test_session_cookies_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_regex("cookie", "sessionid=abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(PDF_BYTES),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let cookies: SessionCookies = vec![SessionCookie::new("sessionid", "abc123", "")]
        .into_iter()
        .collect();
    let dir = tempfile::tempdir().unwrap();

    let format = fetcher()
        .fetch(&server.uri(), &cookies, &dir.path().join("x"), true)
        .await
        .unwrap();
    assert_eq!(format, DocumentFormat::Pdf);
}

#[tokio::test]
async fn test_fetch_page_is_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch_page(&server.uri(), &no_cookies())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_retries_wait_for_scheduled_delays() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = DirectFetcher::new(
        None,
        Duration::from_secs(2),
        Duration::from_secs(5),
        RetryPolicy::new(3, vec![1, 1]),
    );
    let dir = tempfile::tempdir().unwrap();
    let started = Instant::now();
    let err = fetcher
        .fetch(&server.uri(), &no_cookies(), &dir.path().join("x"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::RetryExhausted { attempts: 3, .. }));
    assert!(
        started.elapsed() >= Duration::from_secs(2),
        "retries did not wait: {:?}",
        started.elapsed()
    );
}

/// Serve one PDF response whose body trickles out in small chunks.
async fn serve_slow_body(chunks: usize, chunk: &'static [u8], gap: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;

        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/pdf\r\n\
             content-length: {}\r\nconnection: close\r\n\r\n",
            chunks * chunk.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        for _ in 0..chunks {
            tokio::time::sleep(gap).await;
            socket.write_all(chunk).await.unwrap();
            socket.flush().await.unwrap();
        }
    });
    format!("http://{}/edition.pdf", addr)
}

#[tokio::test]
async fn test_slow_body_within_read_timeout_completes() {
    // About 3s in total, while no single read waits longer than 300ms
    let url = serve_slow_body(10, &[b'x'; 100], Duration::from_millis(300)).await;

    let fetcher = DirectFetcher::new(
        None,
        Duration::from_secs(1),
        Duration::from_secs(1),
        RetryPolicy::new(1, vec![0]),
    );
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("2024-03-01_newspaper");

    let format = fetcher
        .fetch(&url, &no_cookies(), &stem, false)
        .await
        .unwrap();

    assert_eq!(format, DocumentFormat::Pdf);
    let saved = std::fs::read(dir.path().join("2024-03-01_newspaper.pdf")).unwrap();
    assert_eq!(saved.len(), 1000);
}
