//! HttpFetcher against a one-shot local server.

use prb_core::{Fetch, FetchError, PullRequestRef};
use prb_web::{HttpFetcher, HttpFetcherConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one canned response and hand back the raw request head.
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        String::from_utf8_lossy(&request).into_owned()
    });
    (base, server)
}

fn endpoint() -> prb_core::Endpoint {
    PullRequestRef::parse("/users/alice/repos/myrepo/pull-requests/7/overview")
        .endpoint()
        .unwrap()
}

#[tokio::test]
async fn fetches_vetoes_with_json_content_type() {
    let (base, server) = serve_once(
        "HTTP/1.1 200 OK",
        r#"{"vetoes":[{"summaryMessage":"Not approved","detailedMessage":"needs approval"}]}"#,
    )
    .await;
    let fetcher = HttpFetcher::new(HttpFetcherConfig::new(base)).unwrap();

    let record = fetcher.fetch_blockers(&endpoint()).await.unwrap();
    assert_eq!(record.count(), 1);
    assert_eq!(record.messages().next(), Some("needs approval"));

    let request = server.await.unwrap().to_ascii_lowercase();
    assert!(request.starts_with(
        "get /rest/ui/latest/projects/~alice/repos/myrepo/pull-requests/7/merge http/1.1"
    ));
    assert!(request.contains("content-type: application/json"));
}

#[tokio::test]
async fn remote_errors_surface_even_on_error_status() {
    let (base, server) = serve_once(
        "HTTP/1.1 404 Not Found",
        r#"{"errors":[{"message":"boom"},{"message":"bang"}]}"#,
    )
    .await;
    let fetcher = HttpFetcher::new(HttpFetcherConfig::new(base)).unwrap();

    let err = fetcher.fetch_blockers(&endpoint()).await.unwrap_err();
    assert_eq!(err.causes(), vec!["boom".to_string(), "bang".to_string()]);
    server.await.unwrap();
}

#[tokio::test]
async fn plain_error_status_is_reported_as_status() {
    let (base, server) = serve_once("HTTP/1.1 502 Bad Gateway", "upstream down").await;
    let fetcher = HttpFetcher::new(HttpFetcherConfig::new(base)).unwrap();

    let err = fetcher.fetch_blockers(&endpoint()).await.unwrap_err();
    assert_eq!(err, FetchError::Status { status: 502 });
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let fetcher = HttpFetcher::new(HttpFetcherConfig::new(base)).unwrap();

    let err = fetcher.fetch_blockers(&endpoint()).await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }));
}
