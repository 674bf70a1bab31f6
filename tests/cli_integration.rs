// CLI integration tests against an in-process coordinator.
mod common;

use std::io::Write;
use std::process::{Command, Output};

use common::{FakeCoordinator, config_bytes, echo_rpc, no_rpc};
use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_coordlink");
    let mut command = Command::new(exe);
    command.env("RUST_LOG", "off");
    command
}

fn run(args: &[&str]) -> Output {
    cmd().args(args).output().expect("run coordlink")
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn json_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_json)
        .collect()
}

fn stderr_error(output: &Output) -> Value {
    let lines = json_lines(&output.stderr);
    lines
        .into_iter()
        .find(|line| line.get("error").is_some())
        .expect("error json on stderr")
}

#[test]
fn version_reports_crate_version() {
    let output = run(&["version"]);
    assert!(output.status.success());
    let value = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(value["name"], "coordlink");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn help_exits_zero_and_triple_dash_is_rejected() {
    let help = run(&["--help"]);
    assert!(help.status.success());
    assert!(String::from_utf8_lossy(&help.stdout).contains("coordlink"));

    let output = run(&["---help"]);
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stderr_error(&output)["error"]["kind"], "Usage");
}

#[test]
fn show_prints_current_configuration() {
    let coordinator = FakeCoordinator::scripted(vec![config_bytes(3)], no_rpc);
    let addr = coordinator.addr();
    let output = run(&["--coordinator", &addr, "show", "--timeout-ms", "5000"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let value = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(value["version"], 3);
    assert_eq!(value["servers"].as_array().map(Vec::len), Some(2));
    assert_eq!(value["spaces"][0]["name"], "kv");
    assert_eq!(value["fingerprint"].as_str().map(str::len), Some(64));
}

#[test]
fn show_reads_coordinator_from_config_file() {
    let coordinator = FakeCoordinator::scripted(vec![config_bytes(8)], no_rpc);
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, "{{\"coordinator\": \"{}\", \"connect_timeout_ms\": 2000}}", coordinator.addr())
        .expect("write config");

    let path = file.path().to_str().expect("path");
    let output = run(&["--config", path, "show", "--timeout-ms", "5000"]);
    assert!(output.status.success());
    let value = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(value["version"], 8);
}

#[test]
fn show_times_out_as_poll_failed() {
    let coordinator = FakeCoordinator::scripted(Vec::new(), no_rpc);
    let addr = coordinator.addr();
    let output = run(&["--coordinator", &addr, "show", "--timeout-ms", "150"]);
    assert_eq!(output.status.code(), Some(5));
    assert_eq!(stderr_error(&output)["error"]["kind"], "PollFailed");
}

#[test]
fn missing_coordinator_is_usage_error() {
    let output = run(&["show"]);
    assert_eq!(output.status.code(), Some(2));
    let err = stderr_error(&output);
    assert_eq!(err["error"]["kind"], "Usage");
    assert!(err["error"]["hint"].as_str().is_some());
}

#[test]
fn unreachable_coordinator_is_coord_fail() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").to_string()
    };
    let output = run(&["--coordinator", &addr, "--connect-timeout-ms", "500", "show"]);
    assert_eq!(output.status.code(), Some(3));
    let err = stderr_error(&output);
    assert_eq!(err["error"]["kind"], "CoordFail");
    assert!(err["error"]["causes"].as_array().is_some());
}

#[test]
fn watch_skips_older_config_with_notice() {
    let coordinator = FakeCoordinator::scripted(
        vec![config_bytes(3), config_bytes(2), config_bytes(5)],
        no_rpc,
    );
    let addr = coordinator.addr();
    let output = run(&["--coordinator", &addr, "watch", "--count", "2"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let lines = json_lines(&output.stdout);
    let versions: Vec<u64> = lines
        .iter()
        .filter_map(|line| line["version"].as_u64())
        .collect();
    assert_eq!(versions, vec![3, 5]);
    assert!(lines.iter().all(|line| line["observed_at"].as_str().is_some()));
    assert_eq!(lines[0]["servers"], 2);

    let notices = json_lines(&output.stderr);
    let notice = notices
        .iter()
        .find_map(|line| line.get("notice"))
        .expect("notice on stderr");
    assert_eq!(notice["kind"], "bad_config");
    assert_eq!(notice["cmd"], "watch");
    assert_eq!(notice["cached_version"], 3);
    assert_eq!(notice["offered_version"], 2);
}

#[test]
fn rpc_prints_text_and_hex_output() {
    let coordinator = FakeCoordinator::scripted(Vec::new(), echo_rpc);
    let addr = coordinator.addr();
    let output = run(&["--coordinator", &addr, "rpc", "echo", "--data", "hello"]);
    assert!(output.status.success());

    let value = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(value["function"], "echo");
    assert_eq!(value["output"], "hello");
    assert_eq!(value["output_hex"], "68656c6c6f");
}

#[test]
fn rpc_binary_output_has_null_text() {
    let coordinator = FakeCoordinator::scripted(Vec::new(), echo_rpc);
    let addr = coordinator.addr();
    let output = run(&["--coordinator", &addr, "rpc", "echo", "--data-hex", "ff00"]);
    assert!(output.status.success());

    let value = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert!(value["output"].is_null());
    assert_eq!(value["output_hex"], "ff00");
}

#[test]
fn rpc_unknown_function_exits_coord_fail() {
    let coordinator = FakeCoordinator::scripted(Vec::new(), echo_rpc);
    let addr = coordinator.addr();
    let output = run(&["--coordinator", &addr, "rpc", "nope"]);
    assert_eq!(output.status.code(), Some(3));
    let err = stderr_error(&output);
    assert_eq!(err["error"]["kind"], "CoordFail");
    assert!(err["error"]["request_id"].as_u64().is_some());
    assert_eq!(coordinator.count("nope"), 1);
}
