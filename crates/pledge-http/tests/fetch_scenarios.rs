//! End-to-end `fetch` scenarios against a minimal local HTTP server.

use std::io::{Read, Write};
use std::net::TcpListener;

use pledge::{QueueId, ThreadPoolScheduler};
use pledge_http::HttpClient;

/// Serves one canned HTTP/1.1 response on the first connection accepted.
fn one_shot_server(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{addr}")
}

#[test]
fn fetch_json_body() {
    let scheduler = ThreadPoolScheduler::new();
    let client = HttpClient::new(scheduler);
    let url = one_shot_server("HTTP/1.1 200 OK", r#"{"name":"pledge","ok":true}"#);

    let response = client.get(url).queue(QueueId::Background).send().await_result().unwrap();

    assert!(response.ok());
    assert_eq!(response.status(), 200);
    let value: serde_json::Value = response.json().unwrap();
    assert_eq!(value["name"], "pledge");
}

#[test]
fn fetch_error_status_is_not_ok() {
    let scheduler = ThreadPoolScheduler::new();
    let client = HttpClient::new(scheduler);
    let url = one_shot_server("HTTP/1.1 404 Not Found", "missing");

    let response = client.get(url).queue(QueueId::Background).send().await_result().unwrap();

    assert!(!response.ok());
    assert_eq!(response.status(), 404);
    assert!(response.error_for_status().is_err());
}

#[test]
fn fetch_chains_through_then() {
    let scheduler = ThreadPoolScheduler::new();
    let client = HttpClient::new(scheduler);
    let url = one_shot_server("HTTP/1.1 200 OK", r#"{"value":21}"#);

    #[derive(serde::Deserialize)]
    struct Body {
        value: i64,
    }

    let doubled = client
        .get(url)
        .queue(QueueId::Background)
        .send()
        .then(QueueId::Background, None, 0, |response| {
            let body: Body = response.json()?;
            Ok(body.value * 2)
        })
        .await_result()
        .unwrap();

    assert_eq!(doubled, 42);
}
