use docbot::backend::Client;
use docbot::config::{anchored, Options, Personality};
use docbot::pipeline;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;

/// Serve the given responses to sequential connections on a loopback port,
/// returning the base URL and a handle yielding the raw requests received.
///
/// Every response carries `Connection: close` so the client opens a fresh
/// connection per request.
fn spawn_endpoint(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().unwrap();
            seen.push(read_request(&mut stream));
            let reason = if status == 200 { "OK" } else { "Internal Server Error" };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        }
        seen
    });

    (base_url, handle)
}

/// Read one HTTP request: headers, then Content-Length body bytes.
fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];

    let header_end = loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            return String::from_utf8_lossy(&data).into_owned();
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&data[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < header_end + content_length {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    String::from_utf8_lossy(&data).into_owned()
}

#[test]
fn generate_round_trips_through_a_local_endpoint() {
    let (base_url, handle) =
        spawn_endpoint(vec![(200, r#"{"choices":[{"text":"/** Adds two ints. */"}]}"#)]);

    let client = Client::with_base_url("sk-test-dummy", &base_url);
    let out = client
        .generate(
            "int add(int a, int b) { return a + b; }",
            Personality::Docbot.instruction(),
        )
        .unwrap();
    assert_eq!(out, "/** Adds two ints. */");

    let seen = handle.join().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("POST /edits"), "request: {}", seen[0]);
    assert!(seen[0].contains("Bearer sk-test-dummy"), "request: {}", seen[0]);
    assert!(seen[0].contains("\"input\""), "request: {}", seen[0]);
    assert!(seen[0].contains("\"instruction\""), "request: {}", seen[0]);
}

#[test]
fn list_models_round_trips_through_a_local_endpoint() {
    let (base_url, handle) = spawn_endpoint(vec![(
        200,
        r#"{"object":"list","data":[{"id":"babbage","created":1649358449,"owned_by":"openai"}]}"#,
    )]);

    let client = Client::with_base_url("sk-test-dummy", &base_url);
    let models = client.list_models().unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].id, "babbage");

    let seen = handle.join().unwrap();
    assert!(seen[0].starts_with("GET /models"), "request: {}", seen[0]);
}

#[test]
fn failed_request_does_not_abort_remaining_matches() {
    let tmp = tempfile::TempDir::new().unwrap();
    let src = tmp.path().join("two.c");
    std::fs::write(
        &src,
        "int first(void) { return 1; }\nint second(void) { return 2; }\n",
    )
    .unwrap();

    // The first request dies with a server error, the second succeeds.
    let (base_url, handle) = spawn_endpoint(vec![
        (500, r#"{"error":"boom"}"#),
        (200, r#"{"choices":[{"text":"// test for second"}]}"#),
    ]);

    let opts = Options {
        input_file: src,
        function_name: anchored("first|second").unwrap(),
        api_key: "sk-test-dummy".into(),
        search_paths: vec![],
        personality: Personality::Testbot,
    };
    let client = Client::with_base_url("sk-test-dummy", &base_url);
    let err = pipeline::run_with_client(&opts, &client).unwrap_err();
    assert!(
        err.to_string().contains("1 request(s) failed"),
        "err: {err:#}"
    );

    // Both functions were submitted: the failure only took down its own
    // request, in source order.
    let seen = handle.join().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].contains("first"), "request: {}", seen[0]);
    assert!(seen[1].contains("second"), "request: {}", seen[1]);
}
