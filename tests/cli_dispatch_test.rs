// tests/cli_dispatch_test.rs

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

// 辅助函数，避免重复
fn main_command(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("SPACES_BACKUP_HOME", home).env_remove("SPACES_SID");
    cmd
}

/// 指向模拟服务器、没有任何延迟的配置目录
fn home_with_config(base_url: &str) -> TempDir {
    let home = tempdir().unwrap();
    let config = serde_json::json!({
        "base_url": base_url,
        "network": { "max_retries": 0, "timeout_secs": 10 },
        "delays": { "between_requests_ms": 0, "between_downloads_ms": 0 }
    });
    fs::write(home.path().join("config.json"), config.to_string()).unwrap();
    home
}

// --- 测试基本 CLI 行为 ---

#[test]
fn test_help_flag() {
    let home = tempdir().unwrap();
    main_command(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("显示此帮助信息并退出"))
        .stdout(predicate::str::contains("--sid-help"));
}

#[test]
fn test_sid_help_command() {
    let home = tempdir().unwrap();
    main_command(home.path())
        .arg("--sid-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("获取 SID 指南"))
        .stdout(predicate::str::contains("--cookies-file"));
}

#[test]
fn test_missing_session_is_reported() {
    let home = home_with_config("http://127.0.0.1:9");
    main_command(home.path())
        .args(["--user", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("未提供会话 Cookie"))
        .stderr(predicate::str::contains("--sid-help"));
}

#[test]
fn test_missing_user_is_reported() {
    let home = home_with_config("http://127.0.0.1:9");
    main_command(home.path())
        .args(["--sid", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("未指定用户名"));
}

#[test]
fn test_unknown_section_is_rejected() {
    let home = home_with_config("http://127.0.0.1:9");
    main_command(home.path())
        .args(["--sid", "abc", "--user", "alice", "--sections", "pictures,nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("无效的分区 'nope'"));
}

#[test]
fn test_cookies_file_without_sid_is_rejected() {
    let home = home_with_config("http://127.0.0.1:9");
    let cookies = home.path().join("cookies.txt");
    fs::write(&cookies, "lang=ru").unwrap();
    main_command(home.path())
        .args(["--user", "alice", "--cookies-file"])
        .arg(&cookies)
        .assert()
        .failure()
        .stderr(predicate::str::contains("没有找到 sid"));
}

// --- 测试完整流程 ---

const FILES_PAGE: &str = r#"
    <div class="list-item" data-nid="1" data-type="5">
        <span class="darkblue break-word">a</span><span class="lightgrey break-word">.txt</span>
        <a class="__adv_download" href="/files/download/1/a.txt">dl</a>
    </div>"#;

#[test]
fn test_dry_run_writes_manifest_and_state() {
    let mut server = mockito::Server::new();
    let listing = server
        .mock("GET", "/files/user/alice/")
        .match_header("cookie", "sid=abc")
        .with_status(200)
        .with_body(FILES_PAGE)
        .create();
    let download = server.mock("GET", "/files/download/1/a.txt").expect(0).create();

    let home = home_with_config(&server.url());
    let manifest = home.path().join("scan.json");
    main_command(home.path())
        .args(["--sid", "abc", "--user", "alice", "-s", "files", "--dry-run", "--manifest"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("共发现 1 个文件"));

    listing.assert();
    download.assert();

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(manifest).unwrap()).unwrap();
    assert_eq!(manifest["user"], "alice");
    assert_eq!(manifest["files"][0]["id"], "1");
    assert_eq!(manifest["files"][0]["logical_path"], "files/a.txt");
    assert_eq!(manifest["root"]["children"][0]["name"], "files");

    // 再次运行时可以直接使用保存的会话和用户
    let state = fs::read_to_string(home.path().join("state.json")).unwrap();
    assert!(state.contains(r#""user": "alice""#));
    assert!(state.contains(r#""sid": "abc""#));
}

#[test]
fn test_full_backup_uses_saved_session() {
    let mut server = mockito::Server::new();
    let _listing = server
        .mock("GET", "/files/user/alice/")
        .match_header("cookie", "sid=saved")
        .with_status(200)
        .with_body(FILES_PAGE)
        .create();
    let download = server
        .mock("GET", "/files/download/1/a.txt")
        .with_status(200)
        .with_body("content of a")
        .create();

    let home = home_with_config(&server.url());
    fs::write(
        home.path().join("state.json"),
        r#"{"cookies":{"sid":"saved"},"user":"alice","sections":[]}"#,
    )
    .unwrap();
    let out = home.path().join("out");

    main_command(home.path())
        .args(["-s", "files", "-o"])
        .arg(&out)
        .assert()
        .success();

    download.assert();
    assert_eq!(
        fs::read_to_string(out.join("alice").join("files").join("a.txt")).unwrap(),
        "content of a"
    );
}
