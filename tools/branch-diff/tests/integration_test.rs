#![warn(clippy::pedantic)]
// Required due to: https://github.com/rust-lang/rust/issues/95513
#![allow(unused_crate_dependencies)]

use indoc::indoc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;

const SISYPHUS: &str = indoc! {r#"
    {"length": 1, "packages": [
      {"name": "foo", "epoch": 0, "version": "1.2", "release": "1", "arch": "x86_64", "disttag": "sisyphus+1"}
    ]}
"#};

const P10: &str = indoc! {r#"
    {"length": 2, "packages": [
      {"name": "foo", "epoch": 0, "version": "1.1", "release": "1", "arch": "x86_64", "disttag": "p10+1"},
      {"name": "bar", "epoch": 0, "version": "1.0", "release": "1", "arch": "x86_64", "disttag": "p10+2"}
    ]}
"#};

/// Serves `routes` (path -> JSON body) over HTTP until the test process
/// exits, answering 404 for anything else. Returns the base URL and the list
/// of request lines received.
fn serve(routes: &[(&str, &'static str)]) -> (String, Arc<Mutex<Vec<String>>>) {
    let routes: HashMap<String, &'static str> = routes
        .iter()
        .map(|(path, body)| ((*path).to_string(), *body))
        .collect();
    let listener = TcpListener::bind("127.0.0.1:0").expect("couldn't bind fixture server");
    let addr = listener.local_addr().expect("couldn't get fixture address");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if line == "\r\n" => break,
                    Ok(_) => (),
                }
            }
            let path = request_line
                .split_whitespace()
                .nth(1)
                .unwrap_or_default()
                .to_string();
            seen.lock().expect("request log").push(request_line.trim().to_string());

            let (status, body) = match routes.get(path.split('?').next().unwrap_or_default()) {
                Some(body) => ("200 OK", *body),
                None => ("404 Not Found", r#"{"message": "not found"}"#),
            };
            let _ = write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
        }
    });

    (format!("http://{addr}/api/export/branch_binary_packages"), requests)
}

fn branch_diff(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_branch-diff"))
        .args(args)
        .env_remove("BRANCH_DIFF_URL")
        .env_remove("BRANCH_DIFF_ARCH")
        .env_remove("BRANCH_DIFF_TIMEOUT")
        .env_remove("BRANCH_DIFF_CONFIG")
        .env_remove("BRANCH_DIFF_LOG")
        .output()
        .expect("couldn't run branch-diff")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not json ({e}): {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn compares_branches_from_inventory_service() {
    let (url, requests) = serve(&[
        ("/api/export/branch_binary_packages/sisyphus", SISYPHUS),
        ("/api/export/branch_binary_packages/p10", P10),
    ]);

    let output = branch_diff(&["sisyphus", "p10", "--url", &url]);

    assert_eq!(Some(0), output.status.code());
    assert_eq!(
        json!({
            "only in sisyphus": [],
            "only in p10": [
                {"name": "bar", "epoch": 0, "version": "1.0", "release": "1", "arch": "x86_64", "disttag": "p10+2"}
            ],
            "version-release greater in sisyphus": [
                {"name": "foo", "epoch": 0, "version": "1.2", "release": "1", "arch": "x86_64", "disttag": "sisyphus+1"}
            ],
        }),
        stdout_json(&output)
    );

    let mut requests = requests.lock().expect("request log").clone();
    requests.sort();
    assert_eq!(
        vec![
            "GET /api/export/branch_binary_packages/p10 HTTP/1.1",
            "GET /api/export/branch_binary_packages/sisyphus HTTP/1.1",
        ],
        requests
    );
}

#[test]
fn result_keys_keep_their_order() {
    let (url, _requests) = serve(&[
        ("/api/export/branch_binary_packages/sisyphus", SISYPHUS),
        ("/api/export/branch_binary_packages/p10", P10),
    ]);

    let output = branch_diff(&["p10", "sisyphus", "--url", &url]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let positions: Vec<usize> = [
        "\"only in p10\"",
        "\"only in sisyphus\"",
        "\"version-release greater in p10\"",
    ]
    .iter()
    .map(|key| stdout.find(key).unwrap_or_else(|| panic!("{key} missing in {stdout}")))
    .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn arch_filter_is_sent_to_inventory_service() {
    let (url, requests) = serve(&[
        ("/api/export/branch_binary_packages/sisyphus", SISYPHUS),
        ("/api/export/branch_binary_packages/p10", P10),
    ]);

    let output = branch_diff(&["sisyphus", "p10", "--url", &url, "--arch", "x86_64"]);

    assert_eq!(Some(0), output.status.code());
    assert!(requests
        .lock()
        .expect("request log")
        .iter()
        .all(|line| line.contains("?arch=x86_64")));
}

#[test]
fn empty_branch_name_is_reported_without_fetching() {
    let (url, requests) = serve(&[]);

    let output = branch_diff(&["sisyphus", "", "--url", &url]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(Some(2), output.status.code());
    assert!(stderr.contains("second branch"), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
    assert!(requests.lock().expect("request log").is_empty());
}

#[test]
fn missing_branch_arguments_are_reported() {
    let output = branch_diff(&[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(Some(2), output.status.code());
    assert!(stderr.contains("first and second branch"), "stderr: {stderr}");
}

#[test]
fn fetch_failure_is_reported_with_branch_name() {
    let (url, _requests) = serve(&[("/api/export/branch_binary_packages/sisyphus", SISYPHUS)]);

    let output = branch_diff(&["sisyphus", "p11", "--url", &url]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(Some(3), output.status.code());
    assert!(stderr.contains("`p11`"), "stderr: {stderr}");
    assert!(stderr.contains("404"), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn branch_name_cannot_change_request_target() {
    let (url, requests) = serve(&[("/api/export/branch_binary_packages/sisyphus", SISYPHUS)]);

    let output = branch_diff(&["sisyphus", "p10?arch=noarch", "--url", &url]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(Some(3), output.status.code());
    assert!(stderr.contains("p10?arch=noarch"), "stderr: {stderr}");
    assert!(requests
        .lock()
        .expect("request log")
        .iter()
        .all(|line| !line.contains("p10")));
}

#[test]
fn compares_saved_exports() {
    let output = branch_diff(&[
        "sisyphus",
        "p10",
        "--from-dir",
        fixtures_dir().to_str().expect("utf-8 fixtures path"),
    ]);

    assert_eq!(Some(0), output.status.code());
    let result = stdout_json(&output);

    let summary = |key: &str| -> Vec<String> {
        result[key]
            .as_array()
            .unwrap_or_else(|| panic!("{key} is not an array"))
            .iter()
            .map(|package| format!("{} {}", package["name"], package["arch"]).replace('"', ""))
            .collect()
    };
    assert_eq!(vec!["foo i586"], summary("only in sisyphus"));
    assert_eq!(vec!["bar x86_64"], summary("only in p10"));
    assert_eq!(
        vec!["foo x86_64"],
        summary("version-release greater in sisyphus")
    );
    assert_eq!(
        json!("sisyphus+330000.100.1.1"),
        result["version-release greater in sisyphus"][0]["disttag"]
    );
}

#[test]
fn writes_pretty_output_to_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("result.json");

    let output = branch_diff(&[
        "sisyphus",
        "p10",
        "--from-dir",
        fixtures_dir().to_str().expect("utf-8 fixtures path"),
        "--pretty",
        "--output",
        out.to_str().expect("utf-8 output path"),
    ]);

    assert_eq!(Some(0), output.status.code());
    assert!(output.stdout.is_empty());
    let written = std::fs::read_to_string(&out).expect("result file");
    assert!(written.starts_with("{\n  \"only in sisyphus\": ["));
    assert!(serde_json::from_str::<Value>(&written).is_ok());
}

#[test]
fn malformed_package_fails_the_analysis() {
    let output = branch_diff(&[
        "sisyphus",
        "broken",
        "--from-dir",
        fixtures_dir().to_str().expect("utf-8 fixtures path"),
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(Some(4), output.status.code());
    assert!(
        stderr.contains("missing required field `version`"),
        "stderr: {stderr}"
    );
    assert!(output.stdout.is_empty());
}

#[test]
fn config_file_supplies_defaults() {
    let (url, _requests) = serve(&[
        ("/api/export/branch_binary_packages/sisyphus", SISYPHUS),
        ("/api/export/branch_binary_packages/p10", P10),
    ]);
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("branch-diff.toml");
    std::fs::write(&config, format!("url = \"{url}\"\ntimeout_secs = 10\n")).expect("config");

    let output = branch_diff(&[
        "sisyphus",
        "p10",
        "--config",
        config.to_str().expect("utf-8 config path"),
    ]);

    assert_eq!(Some(0), output.status.code());
    assert_eq!(
        1,
        stdout_json(&output)["version-release greater in sisyphus"]
            .as_array()
            .map_or(0, Vec::len)
    );
}

#[test]
fn unreadable_config_file_is_a_config_error() {
    let output = branch_diff(&["sisyphus", "p10", "--config", "does/not/exist.toml"]);
    assert_eq!(Some(1), output.status.code());
}

#[test]
#[ignore = "integration test"]
fn compares_live_branches() {
    let output = branch_diff(&["p10", "p9", "--arch", "noarch", "--timeout", "300"]);

    assert_eq!(Some(0), output.status.code());
    let result = stdout_json(&output);
    for key in [
        "only in p10",
        "only in p9",
        "version-release greater in p10",
    ] {
        assert!(result[key].is_array(), "{key} missing from result");
    }
}
