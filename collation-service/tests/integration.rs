//! Integration tests for collation-service.
//!
//! Each test starts the real service binary, pointed at a fake CollateX
//! server that aligns tokens position by position.

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command};
use std::time::Duration;

/// Helper to find a free port
fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn read_body(stream: &mut TcpStream) -> String {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut content_length = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
            break;
        }
        if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = value.trim().parse().unwrap();
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).unwrap();
    String::from_utf8(body).unwrap()
}

fn positional_alignment(body: &str) -> Value {
    if body.is_empty() {
        return json!({});
    }
    let input: Value = serde_json::from_str(body).unwrap();
    let witnesses = input["witnesses"].as_array().unwrap();
    let longest = witnesses
        .iter()
        .map(|w| w["tokens"].as_array().unwrap().len())
        .max()
        .unwrap_or(0);
    let table: Vec<Value> = (0..longest)
        .map(|i| {
            Value::Array(
                witnesses
                    .iter()
                    .map(|w| match w["tokens"].get(i) {
                        Some(token) => json!([token]),
                        None => json!([]),
                    })
                    .collect(),
            )
        })
        .collect();
    let ids: Vec<Value> = witnesses.iter().map(|w| w["id"].clone()).collect();
    json!({ "witnesses": ids, "table": table })
}

/// Fake CollateX server; returns its base URL.
fn spawn_fake_collatex() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            std::thread::spawn(move || {
                let reply = positional_alignment(&read_body(&mut stream)).to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    reply.len(),
                    reply
                );
                let _ = stream.write_all(response.as_bytes());
            });
        }
    });
    format!("http://{}", addr)
}

/// Kills the service when the test ends, pass or fail.
struct Service {
    child: Child,
    base_url: String,
}

impl Drop for Service {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn start_service(engine_url: &str) -> Service {
    let port = free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_collation-service"))
        .args(["--port", &port.to_string(), "--engine-url", engine_url])
        .env_remove("COLLATION_CONFIG")
        .spawn()
        .expect("Failed to start collation-service");
    let service = Service {
        child,
        base_url: format!("http://127.0.0.1:{}", port),
    };
    assert!(
        wait_for_service(&service.base_url, Duration::from_secs(10)),
        "Service failed to start"
    );
    service
}

/// Helper to wait for the service to be ready
fn wait_for_service(base_url: &str, timeout: Duration) -> bool {
    let client = reqwest::blocking::Client::new();
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if client.get(format!("{}/status", base_url)).send().is_ok() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    false
}

fn post_collate(service: &Service, body: Value) -> (u16, Value) {
    let resp = reqwest::blocking::Client::new()
        .post(format!("{}/collate", service.base_url))
        .json(&body)
        .send()
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().unwrap())
}

fn get_json(service: &Service, path: &str) -> Value {
    reqwest::blocking::Client::new()
        .get(format!("{}{}", service.base_url, path))
        .send()
        .unwrap()
        .json()
        .unwrap()
}

#[test]
fn test_collate_lifecycle() {
    let engine_url = spawn_fake_collatex();
    let service = start_service(&engine_url);

    let status = get_json(&service, "/status");
    assert_eq!(status["service"], "collation-service");
    assert_eq!(status["engine"], "collatex-http");
    assert_eq!(status["engine_ready"], true);

    let (code, resp) = post_collate(
        &service,
        json!({
            "title": "AW47 chunk 25",
            "base": "A",
            "witnesses": [
                { "siglum": "A", "title": "Leiden", "text": "This is witness one" },
                { "siglum": "B", "text": "This is witness two" },
                { "siglum": "C", "text": "This is witness" }
            ]
        }),
    );
    assert_eq!(code, 200, "unexpected response: {}", resp);
    assert!(!resp["request_id"].as_str().unwrap().is_empty());
    assert_eq!(resp["sigla"], json!(["A", "B", "C"]));
    assert_eq!(resp["rows"][2]["readings"], json!(["This", "is", "witness", ""]));
    assert_eq!(resp["variants"]["C"], json!([0, 0, 0, -1]));
    assert_eq!(resp["variants"]["B"], json!([0, 0, 0, 1]));
    assert_eq!(resp["apparatus"][3], "one] B:two C om. ");
    assert_eq!(resp["apparatus"][0], "");
    assert_eq!(resp["data"]["title"], "AW47 chunk 25");
    assert_eq!(resp["data"]["collationMatrix"][2][3], -1);
    assert_eq!(resp["engine"]["engine"], "collatex-http");

    // Sigla are generated when omitted; base witness omitting a column.
    let (code, resp) = post_collate(
        &service,
        json!({
            "base": "B",
            "witnesses": [
                { "text": "arma virumque cano" },
                { "text": "arma cano" }
            ]
        }),
    );
    assert_eq!(code, 200, "unexpected response: {}", resp);
    assert_eq!(resp["sigla"], json!(["A", "B"]));
    assert_eq!(resp["apparatus"][2], "om.] A:cano ");

    let metrics = get_json(&service, "/metrics");
    assert_eq!(metrics["collations"], 2);
    assert_eq!(metrics["failures"]["data"], 0);
}

#[test]
fn test_data_errors_are_rejected() {
    let engine_url = spawn_fake_collatex();
    let service = start_service(&engine_url);

    let (code, resp) = post_collate(
        &service,
        json!({ "witnesses": [ { "siglum": "A", "text": "lonely witness" } ] }),
    );
    assert_eq!(code, 400);
    assert_eq!(resp["code"], "not_enough_witnesses");
    assert!(!resp["hint"].as_str().unwrap().is_empty());

    let (code, resp) = post_collate(
        &service,
        json!({ "witnesses": [
            { "siglum": "A", "text": "one" },
            { "siglum": "A", "text": "two" }
        ] }),
    );
    assert_eq!(code, 400);
    assert_eq!(resp["code"], "duplicate_siglum");

    let (code, resp) = post_collate(
        &service,
        json!({ "witnesses": [
            { "siglum": "A", "text": "one" },
            { "siglum": "B", "text": "" }
        ] }),
    );
    assert_eq!(code, 400);
    assert_eq!(resp["code"], "empty_witness");

    let (code, resp) = post_collate(
        &service,
        json!({ "base": "Z", "witnesses": [
            { "siglum": "A", "text": "one" },
            { "siglum": "B", "text": "two" }
        ] }),
    );
    assert_eq!(code, 400);
    assert_eq!(resp["code"], "unknown_siglum");

    let (code, resp) = post_collate(
        &service,
        json!({ "witnesses": [ { "siglum": "A" }, { "siglum": "B", "text": "two" } ] }),
    );
    assert_eq!(code, 400);
    assert_eq!(resp["code"], "invalid_witness");

    let metrics = get_json(&service, "/metrics");
    assert_eq!(metrics["collations"], 0);
    assert_eq!(metrics["failures"]["data"], 5);
}

#[test]
fn test_pre_tokenized_witnesses() {
    let engine_url = spawn_fake_collatex();
    let service = start_service(&engine_url);

    let (code, resp) = post_collate(
        &service,
        json!({ "witnesses": [
            { "siglum": "A", "tokens": [
                { "type": "word", "text": "Arma" },
                { "type": "whitespace", "text": " " },
                { "type": "word", "text": "cano" }
            ] },
            { "siglum": "B", "text": "arma cano" }
        ] }),
    );
    assert_eq!(code, 200, "unexpected response: {}", resp);
    // Default Latin normalization lowercases, so the first column agrees.
    assert_eq!(resp["variants"]["B"], json!([0, 0]));
    assert_eq!(resp["data"]["witnesses"][0]["tokens"][0]["norm"], "arma");
}

#[test]
fn test_unreachable_engine() {
    let engine_url = format!("http://127.0.0.1:{}", free_port());
    let service = start_service(&engine_url);

    let status = get_json(&service, "/status");
    assert_eq!(status["engine_ready"], false);
    assert!(status["engine_error"].is_string());

    let (code, resp) = post_collate(
        &service,
        json!({ "witnesses": [
            { "siglum": "A", "text": "one" },
            { "siglum": "B", "text": "two" }
        ] }),
    );
    assert_eq!(code, 503);
    assert_eq!(resp["code"], "engine_unavailable");

    let metrics = get_json(&service, "/metrics");
    assert_eq!(metrics["failures"]["environment"], 1);
}

#[test]
fn test_invalid_engine_timeout_stops_startup() {
    let output = Command::new(env!("CARGO_BIN_EXE_collation-service"))
        .args([
            "--port",
            &free_port().to_string(),
            "--engine-url",
            "http://127.0.0.1:9",
            "--engine-timeout",
            "10 min",
        ])
        .env_remove("COLLATION_CONFIG")
        .output()
        .expect("Failed to run collation-service");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("timeout"));
}
