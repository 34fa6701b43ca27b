//! Integration tests for the `logbook serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port,
//! makes HTTP requests, and verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Kills the server when the test ends, pass or fail.
struct Server(Child);

impl Drop for Server {
    fn drop(&mut self) {
        self.0.kill().ok();
        self.0.wait().ok();
    }
}

/// Helper: start `logbook serve` with the demo seed on the given port.
fn start_server(port: u16, env: &[(&str, &str)]) -> Server {
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_logbook"));
    cmd.current_dir(workspace_root);
    cmd.args(["serve", "--seed", "fixtures/demo.json", "--port"])
        .arg(port.to_string());
    for var in ["LOGBOOK_API_KEY", "LOGBOOK_ADMIN_API_KEY", "LOGBOOK_RATE_LIMIT"] {
        cmd.env_remove(var);
    }
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());

    let child = cmd.spawn().expect("failed to start logbook serve");
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server(child)
}

/// Helper: make an HTTP request and return (status, body as JSON).
fn http(
    port: u16,
    method: &str,
    path: &str,
    body: Option<&str>,
    extra_headers: &[(&str, &str)],
) -> (u16, serde_json::Value) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in extra_headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }
    let body = body.unwrap_or("");
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        method,
        path,
        port,
        body.len(),
        header_lines,
        body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    let (status, raw) = parse_http_response(&response);
    let json = if raw.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
    };
    (status, json)
}

fn get(port: u16, path: &str) -> (u16, serde_json::Value) {
    http(port, "GET", path, None, &[])
}

fn post(port: u16, path: &str, body: &serde_json::Value) -> (u16, serde_json::Value) {
    http(port, "POST", path, Some(&body.to_string()), &[])
}

/// Parse an HTTP response into (status_code, body).
fn parse_http_response(response: &str) -> (u16, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status = headers
        .lines()
        .next()
        .unwrap_or("")
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    let body = if headers
        .to_ascii_lowercase()
        .contains("transfer-encoding: chunked")
    {
        decode_chunked(&body)
    } else {
        body
    };
    (status, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start + size;
        if chunk_end > remaining.len() {
            result.push_str(&remaining[chunk_start..]);
            break;
        }
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or("");
    }

    result
}

fn new_history(student_id: &str, subject: &str) -> serde_json::Value {
    serde_json::json!({
        "student_id": student_id,
        "book_id": "clinical-2025",
        "course_id": "core",
        "sub_course_id": "history",
        "subject": subject,
        "fields": {"patient_hn": "HN-9000"},
        "approver_role": "APPROVER_IN",
        "approver_name": "Dr. Alice",
    })
}

fn submit(port: u16, student_id: &str, subject: &str) -> String {
    let (status, json) = post(port, "/experiences", &new_history(student_id, subject));
    assert_eq!(status, 201, "{json}");
    json["id"].as_str().expect("record id").to_string()
}

// ──────────────────────────────────────────────
// Basics
// ──────────────────────────────────────────────

#[test]
fn health_returns_200_with_version() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let (status, json) = get(port, "/health");
    assert_eq!(status, 200);
    assert_eq!(json["status"], "ok");
    assert!(json.get("version").is_some());
}

#[test]
fn books_list_seeded_catalog() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let (status, json) = get(port, "/books");
    assert_eq!(status, 200);
    let books = json["books"].as_array().expect("books array");
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["id"], "clinical-2025");
    assert_eq!(books[0]["course_count"], 2);
    assert_eq!(books[0]["sub_course_count"], 3);
}

#[test]
fn not_found_returns_json_404() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let (status, json) = get(port, "/nope");
    assert_eq!(status, 404);
    assert_eq!(json["kind"], "not_found");
}

// ──────────────────────────────────────────────
// Lifecycle
// ──────────────────────────────────────────────

#[test]
fn submit_confirm_and_progress() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let (_, before) = get(port, "/books/clinical-2025/progress/6400002");
    assert_eq!(before["overall_percent"], 20);

    let id = submit(port, "6400002", "medicine");
    let (status, json) = get(port, &format!("/experiences/{}", id));
    assert_eq!(status, 200);
    assert_eq!(json["status"], "PENDING");

    let (status, json) = post(
        port,
        &format!("/experiences/{}/confirm", id),
        &serde_json::json!({"pin": "1234"}),
    );
    assert_eq!(status, 200, "{json}");
    assert_eq!(json["status"], "CONFIRMED");

    let (_, after) = get(port, "/books/clinical-2025/progress/6400002");
    assert_eq!(after["overall_percent"], 40);

    // Terminal now.
    let (status, json) = post(
        port,
        &format!("/experiences/{}/reject", id),
        &serde_json::json!({"pin": "1234"}),
    );
    assert_eq!(status, 409);
    assert_eq!(json["kind"], "invalid_state");
}

#[test]
fn wrong_pin_is_401_with_fixed_message() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let (status, json) = post(
        port,
        "/experiences/exp-demo-0005/confirm",
        &serde_json::json!({"pin": "0000"}),
    );
    assert_eq!(status, 401);
    assert_eq!(json["error"], "approver credentials rejected");
    assert_eq!(json["kind"], "unauthorized");

    let (_, json) = get(port, "/experiences/exp-demo-0005");
    assert_eq!(json["status"], "PENDING");
}

#[test]
fn invalid_submission_is_422() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let (status, json) = post(port, "/experiences", &new_history("6400001", "cardiology"));
    assert_eq!(status, 422);
    assert_eq!(json["kind"], "invalid_subject");

    let (status, json) = post(port, "/experiences", &new_history("5900001", "medicine"));
    assert_eq!(status, 422);
    assert_eq!(json["kind"], "student_not_admitted");

    let (status, json) = post(port, "/experiences", &serde_json::json!({"student_id": 1}));
    assert_eq!(status, 422);
    assert_eq!(json["kind"], "invalid_body");
}

#[test]
fn list_filters_by_status_and_approver() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let (status, json) = get(port, "/experiences?approver_name=Dr.%20Bob&status=pending");
    assert_eq!(status, 200);
    let records = json["experiences"].as_array().expect("experiences array");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r["approver_name"] == "Dr. Bob"));

    let (status, json) = get(port, "/experiences?status=DONE");
    assert_eq!(status, 422);
    assert_eq!(json["kind"], "invalid_request");
}

#[test]
fn owner_edit_cancel_and_delete() {
    let port = next_port();
    let _server = start_server(port, &[]);
    let id = submit(port, "6400001", "medicine");

    let edit = serde_json::json!({
        "student_id": "6400001",
        "subject": "surgery",
        "approver_role": "APPROVER_OUT",
        "approver_name": "Dr. Bob",
    });
    let (status, json) = http(
        port,
        "PUT",
        &format!("/experiences/{}", id),
        Some(&edit.to_string()),
        &[],
    );
    assert_eq!(status, 200, "{json}");
    assert_eq!(json["subject"], "surgery");

    let (status, _) = post(
        port,
        &format!("/experiences/{}/cancel", id),
        &serde_json::json!({"student_id": "6400002"}),
    );
    assert_eq!(status, 403);

    let (status, json) = post(
        port,
        &format!("/experiences/{}/cancel", id),
        &serde_json::json!({"student_id": "6400001"}),
    );
    assert_eq!(status, 200);
    assert_eq!(json["status"], "CANCEL");

    let path = format!("/experiences/{}?student_id=6400001", id);
    let (status, _) = http(port, "DELETE", &path, None, &[]);
    assert_eq!(status, 204);
    let (status, _) = get(port, &format!("/experiences/{}", id));
    assert_eq!(status, 404);
}

#[test]
fn confirmed_records_cannot_be_deleted() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let (status, json) = http(
        port,
        "DELETE",
        "/experiences/exp-demo-0001?student_id=6400001",
        None,
        &[],
    );
    assert_eq!(status, 409);
    assert_eq!(json["kind"], "invalid_state");
}

#[test]
fn admin_key_deletes_cancelled_record() {
    let port = next_port();
    let _server = start_server(port, &[("LOGBOOK_ADMIN_API_KEY", "admin-secret")]);

    let (status, _) = http(port, "DELETE", "/experiences/exp-demo-0009", None, &[]);
    assert_eq!(status, 422);

    let (status, _) = http(
        port,
        "DELETE",
        "/experiences/exp-demo-0009",
        None,
        &[("X-Admin-Key", "admin-secret")],
    );
    assert_eq!(status, 204);
}

// ──────────────────────────────────────────────
// Bulk
// ──────────────────────────────────────────────

#[test]
fn bulk_confirm_reports_per_record_outcome() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let body = serde_json::json!({
        "ids": ["exp-demo-0007", "exp-demo-0008", "exp-demo-missing"],
        "approver_name": "Dr. Bob",
        "pin": "4321",
    });
    let (status, json) = post(port, "/experiences/bulk/confirm", &body);
    assert_eq!(status, 200, "{json}");
    assert_eq!(
        json["succeeded"],
        serde_json::json!(["exp-demo-0007", "exp-demo-0008"])
    );
    assert_eq!(json["failed"][0]["id"], "exp-demo-missing");
    assert_eq!(json["failed"][0]["reason"], "NotFound");
}

#[test]
fn bulk_mixed_approvers_is_422() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let body = serde_json::json!({
        "ids": ["exp-demo-0005", "exp-demo-0007"],
        "approver_name": "Dr. Bob",
        "pin": "4321",
    });
    let (status, json) = post(port, "/experiences/bulk/reject", &body);
    assert_eq!(status, 422);
    assert_eq!(json["kind"], "mixed_approver");
}

// ──────────────────────────────────────────────
// Progress
// ──────────────────────────────────────────────

#[test]
fn progress_modes_and_errors() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let (status, json) = get(port, "/books/clinical-2025/progress/6400001?mode=by_subject");
    assert_eq!(status, 200);
    assert_eq!(json["mode"], "by_subject");
    assert_eq!(json["overall_percent"], 100);

    let (status, json) = get(port, "/books/clinical-2025/progress/6400001?mode=hourly");
    assert_eq!(status, 422);
    assert_eq!(json["kind"], "invalid_request");

    let (status, json) = get(port, "/books/nope/progress/6400001");
    assert_eq!(status, 404);
    assert_eq!(json["kind"], "unknown_reference");
}

#[test]
fn cohort_progress() {
    let port = next_port();
    let _server = start_server(port, &[]);

    let (status, json) = get(port, "/books/clinical-2025/cohort");
    assert_eq!(status, 200);
    assert_eq!(json["student_count"], 2);
    assert_eq!(json["done_student_count"], 0);

    let (_, json) = get(
        port,
        "/books/clinical-2025/cohort?mode=by_subject&student_id=6400001,6400003",
    );
    assert_eq!(json["student_count"], 2);
    assert_eq!(json["done_student_count"], 1);
}

// ──────────────────────────────────────────────
// Middleware
// ──────────────────────────────────────────────

#[test]
fn api_key_required_when_configured() {
    let port = next_port();
    let _server = start_server(port, &[("LOGBOOK_API_KEY", "client-key")]);

    let (status, _) = get(port, "/health");
    assert_eq!(status, 200);

    let (status, json) = get(port, "/books");
    assert_eq!(status, 401);
    assert_eq!(json["error"], "authentication required");

    let (status, _) = http(port, "GET", "/books", None, &[("X-API-Key", "wrong")]);
    assert_eq!(status, 403);

    let (status, _) = http(
        port,
        "GET",
        "/books",
        None,
        &[("Authorization", "Bearer client-key")],
    );
    assert_eq!(status, 200);
}

#[test]
fn rate_limit_returns_429() {
    let port = next_port();
    let _server = start_server(port, &[("LOGBOOK_RATE_LIMIT", "3")]);

    for _ in 0..3 {
        let (status, _) = get(port, "/health");
        assert_eq!(status, 200);
    }
    let (status, json) = get(port, "/health");
    assert_eq!(status, 429);
    assert!(json["retry_after"].as_u64().is_some());
}
