//! Integration tests for the send protocol and offline queue interplay,
//! using a local one-shot HTTP responder.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use codetick::api::{ApiClient, SendOutcome};
use codetick::config::Settings;
use codetick::heartbeat::Heartbeat;
use codetick::queue::Sleeper;
use codetick::session::SessionState;

struct NoopSleeper;

impl Sleeper for NoopSleeper {
    fn sleep(&self, _duration: Duration) {}
}

/// Spawn a server answering exactly one request with a canned response.
fn serve_once(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut data = Vec::new();
        let mut buf = [0u8; 16384];
        while !request_complete(&data) {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => data.extend_from_slice(&buf[..n]),
            }
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.flush();
    });

    (
        format!("http://{}/api/v1/users/current/heartbeats.bulk", addr),
        handle,
    )
}

fn request_complete(data: &[u8]) -> bool {
    let text = String::from_utf8_lossy(data);
    let Some(pos) = text.find("\r\n\r\n") else {
        return false;
    };
    let body_bytes = data.len() - (pos + 4);
    body_bytes >= content_length(&text[..pos])
}

fn content_length(headers: &str) -> usize {
    for line in headers.lines() {
        let lower = line.to_lowercase();
        if let Some(value) = lower.strip_prefix("content-length:") {
            return value.trim().parse().unwrap_or(0);
        }
    }
    0
}

fn settings(temp: &TempDir, api_url: String) -> Settings {
    Settings {
        api_key: "12345678-1234-4321-8abc-123456789012".to_string(),
        api_url,
        db_file: temp.path().join("test.db"),
        log_file: temp.path().join("test.log"),
        timeout: Duration::from_secs(5),
        offline: true,
        ..Default::default()
    }
}

fn heartbeat(n: u32) -> Heartbeat {
    Heartbeat {
        time: 1700000000.0 + n as f64,
        entity: format!("/projects/demo/file{}.rs", n),
        entity_type: "file".to_string(),
        category: Some("coding".to_string()),
        is_write: false,
        project: Some("demo".to_string()),
        branch: Some("main".to_string()),
        language: Some("Rust".to_string()),
        dependencies: Some(vec!["serde".to_string()]),
        lines: Some(50),
        lineno: Some(1),
        cursorpos: Some(1),
        user_agent: "codetick/test".to_string(),
        project_folder: None,
    }
}

#[test]
fn accepted_batch_saves_session_and_queues_nothing() {
    let temp = TempDir::new().unwrap();
    let (url, server) = serve_once(
        "202 Accepted",
        r#"{"responses": [[{}, 201], [{}, 201]]}"#,
    );
    let settings = settings(&temp, url);
    let client = ApiClient::with_sleeper(&settings, Box::new(NoopSleeper)).unwrap();

    let outcome = client.send_all(&[heartbeat(1), heartbeat(2)]);
    server.join().unwrap();

    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(client.queue().count(), 0);
    assert!(client.session_cache().exists());
}

#[test]
fn partial_results_requeue_failed_item_and_unaccounted_tail() {
    let temp = TempDir::new().unwrap();
    // 4 sent, 2 results, second one failed: requeue index 1 plus tail [2, 3]
    let (url, server) = serve_once(
        "201 Created",
        r#"{"responses": [[{}, 201], [{}, 500]]}"#,
    );
    let settings = settings(&temp, url);
    let client = ApiClient::with_sleeper(&settings, Box::new(NoopSleeper)).unwrap();

    let batch = [heartbeat(1), heartbeat(2), heartbeat(3), heartbeat(4)];
    let outcome = client.send_all(&batch);
    server.join().unwrap();

    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(client.queue().count(), 3);

    // exactly the failed item and the tail, nothing else
    let mut queued: Vec<Heartbeat> = client.queue().pop_many(100).flatten().collect();
    queued.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());
    let entities: Vec<&str> = queued.iter().map(|h| h.entity.as_str()).collect();
    assert_eq!(
        entities,
        vec![
            "/projects/demo/file2.rs",
            "/projects/demo/file3.rs",
            "/projects/demo/file4.rs"
        ]
    );
}

#[test]
fn per_item_bad_request_is_not_requeued() {
    let temp = TempDir::new().unwrap();
    let (url, server) = serve_once(
        "201 Created",
        r#"{"responses": [[{}, 400], [{}, 201]]}"#,
    );
    let settings = settings(&temp, url);
    let client = ApiClient::with_sleeper(&settings, Box::new(NoopSleeper)).unwrap();

    let outcome = client.send_all(&[heartbeat(1), heartbeat(2)]);
    server.join().unwrap();

    // a malformed item would fail forever; it is dropped, not retried
    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(client.queue().count(), 0);
}

#[test]
fn auth_error_deletes_session_and_skips_draining() {
    let temp = TempDir::new().unwrap();
    let (url, server) = serve_once("401 Unauthorized", r#"{"error": "invalid key"}"#);
    let settings = settings(&temp, url);
    let client = ApiClient::with_sleeper(&settings, Box::new(NoopSleeper)).unwrap();

    // a session from an earlier run, and a heartbeat stuck in the queue
    client.session_cache().save(&SessionState::default());
    client.queue().push(&heartbeat(9));
    assert_eq!(client.queue().count(), 1);

    let outcome = client.send_all(&[heartbeat(1)]);
    server.join().unwrap();

    assert_eq!(outcome, SendOutcome::AuthError);
    assert_eq!(outcome.exit_code(), 104);
    assert!(!client.session_cache().exists());

    // the run loop only drains after a success, so with offline mode on
    // the failed batch joins the old record instead of any draining
    assert_eq!(client.queue().count(), 2);
}

#[test]
fn offline_transport_error_loses_nothing() {
    let temp = TempDir::new().unwrap();
    // grab a port and immediately close it so connections are refused
    let dead_url = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}/bulk", listener.local_addr().unwrap())
    };
    let settings = settings(&temp, dead_url);
    let client = ApiClient::with_sleeper(&settings, Box::new(NoopSleeper)).unwrap();

    let batch = [heartbeat(1), heartbeat(2), heartbeat(3)];
    let outcome = client.send_all(&batch);

    assert_eq!(outcome, SendOutcome::ConnectionError);
    assert_eq!(outcome.exit_code(), 107);
    // all 3 present afterward, none lost
    assert_eq!(client.queue().count(), 3);
}

#[test]
fn transport_error_without_offline_mode_drops_batch() {
    let temp = TempDir::new().unwrap();
    let dead_url = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}/bulk", listener.local_addr().unwrap())
    };
    let settings = Settings {
        offline: false,
        ..settings(&temp, dead_url)
    };
    let client = ApiClient::with_sleeper(&settings, Box::new(NoopSleeper)).unwrap();

    let outcome = client.send_all(&[heartbeat(1)]);
    assert_eq!(outcome, SendOutcome::ConnectionError);
    assert_eq!(client.queue().count(), 0);
}

#[test]
fn drain_sends_queued_heartbeats() {
    let temp = TempDir::new().unwrap();
    let (url, server) = serve_once(
        "201 Created",
        r#"{"responses": [[{}, 201], [{}, 201]]}"#,
    );
    let settings = settings(&temp, url);
    let client = ApiClient::with_sleeper(&settings, Box::new(NoopSleeper)).unwrap();

    client.queue().push(&heartbeat(1));
    client.queue().push(&heartbeat(2));

    let outcome = client.drain_offline_queue();
    server.join().unwrap();

    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(client.queue().count(), 0);
}

#[test]
fn drain_disabled_by_zero_sync_amount() {
    let temp = TempDir::new().unwrap();
    let settings = Settings {
        sync_offline_activity: 0,
        ..settings(&temp, "http://127.0.0.1:1/unused".to_string())
    };
    let client = ApiClient::with_sleeper(&settings, Box::new(NoopSleeper)).unwrap();

    client.queue().push(&heartbeat(1));
    assert_eq!(client.drain_offline_queue(), SendOutcome::Sent);
    assert_eq!(client.queue().count(), 1);
}
