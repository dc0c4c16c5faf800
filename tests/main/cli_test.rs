//! CLI contract tests.

use assert_cmd::Command;

fn wa_relay() -> Command {
    match Command::cargo_bin("wa-relay") {
        Ok(cmd) => cmd,
        Err(err) => panic!("wa-relay binary should be built: {err}"),
    }
}

#[test]
fn help_lists_primary_subcommands() {
    let output = wa_relay().arg("--help").output().expect("run wa-relay");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("start"));
    assert!(stdout.contains("status"));
    assert!(stdout.contains("pair"));
}

#[test]
fn unknown_subcommand_fails() {
    wa_relay().arg("frobnicate").assert().failure();
}

#[test]
fn status_reports_unreachable_bridge() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
        listener.local_addr().expect("local_addr").port()
    };
    let tmp = tempfile::tempdir().expect("temp dir");
    wa_relay()
        .arg("status")
        .env("WA_RELAY_CONFIG_PATH", tmp.path().join("absent.toml"))
        .env("WA_RELAY_BRIDGE_URL", format!("http://127.0.0.1:{port}"))
        .assert()
        .failure();
}
