// tests/scanner_test.rs

use mockito::Matcher;
use spaces_backup::client::{PageFetcher, RobustClient};
use spaces_backup::config::AppConfig;
use spaces_backup::cookies::SessionCookies;
use spaces_backup::extractor::SpacesExtractor;
use spaces_backup::scanner::FolderScanner;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

fn test_config(base_url: &str) -> AppConfig {
    AppConfig {
        base_url: base_url.to_string(),
        ..AppConfig::default()
    }
}

fn scanner_for(config: &AppConfig) -> FolderScanner {
    let fetcher: Arc<dyn PageFetcher> =
        Arc::new(RobustClient::new(Arc::new(config.clone())).expect("Failed to create client"));
    FolderScanner::new(
        fetcher,
        Arc::new(SpacesExtractor::new()),
        config,
        Arc::new(AtomicBool::new(false)),
    )
}

fn file_item(id: &str, name: &str, ext: &str) -> String {
    format!(
        r#"<div class="list-item" data-nid="{id}" data-type="5"><span class="darkblue break-word">{name}</span><span class="lightgrey break-word">{ext}</span></div>"#
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_follows_pages_and_subfolders_with_session_cookies() {
    let mut server = mockito::Server::new_async().await;
    let config = test_config(&server.url());

    // 第 1 页: 一个子文件夹、一个文件、共 2 页，并设置新的 Cookie
    let page1 = format!(
        r#"<a class="js-dir" data-nid="11" href="/files/list/Docs-11/"><span class="js-dir_name">Docs</span></a>
           {}
           <div class="pgn" data-total="2"></div>"#,
        file_item("1", "a", ".txt")
    );
    let page1_mock = server
        .mock("GET", "/files/user/alice/")
        .match_header("cookie", "sid=abc")
        .with_status(200)
        .with_header("set-cookie", "token=t1; Path=/; HttpOnly")
        .with_body(page1)
        .create_async()
        .await;
    let page2_mock = server
        .mock("GET", "/files/user/alice/?P=2")
        .match_header("cookie", Matcher::Regex("token=t1".into()))
        .with_status(200)
        .with_body(file_item("2", "b", ".txt"))
        .create_async()
        .await;
    let docs_mock = server
        .mock("GET", "/files/list/Docs-11/")
        .match_header("cookie", Matcher::Regex("sid=abc".into()))
        .match_header("cookie", Matcher::Regex("token=t1".into()))
        .with_status(200)
        .with_body(file_item("3", "c", ".pdf"))
        .create_async()
        .await;

    let scanner = scanner_for(&config);
    let mut updates = Vec::new();
    let mut on_update = |c: &SessionCookies| updates.push(c.clone());
    let root = scanner
        .scan(
            &format!("{}/files/user/alice/", server.url()),
            &SessionCookies::from_sid("abc"),
            "files",
            &mut on_update,
        )
        .await
        .expect("scan should succeed");

    page1_mock.assert_async().await;
    page2_mock.assert_async().await;
    docs_mock.assert_async().await;

    assert_eq!(root.path, "files");
    let ids: Vec<&str> = root.files.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(root.files[1].logical_path, "files/b.txt");

    assert_eq!(root.children.len(), 1);
    let docs = &root.children[0];
    assert_eq!(docs.id, "11");
    assert_eq!(docs.name, "Docs");
    assert_eq!(docs.path, "files/Docs");
    assert_eq!(docs.files[0].logical_path, "files/Docs/c.pdf");

    assert_eq!(updates.len(), 1, "只有第 1 页改变了 Cookie");
    assert_eq!(updates[0].get("token"), Some("t1"));
    assert_eq!(updates[0].sid(), Some("abc"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_fails_when_subfolder_is_unreachable() {
    let mut server = mockito::Server::new_async().await;
    let config = test_config(&server.url());

    let _root = server
        .mock("GET", "/music/user/bob/")
        .with_status(200)
        .with_body(r#"<a class="js-dir" data-nid="5" href="/music/list/Live-5/"><b>Live</b></a>"#)
        .create_async()
        .await;
    let _missing = server
        .mock("GET", "/music/list/Live-5/")
        .with_status(404)
        .create_async()
        .await;

    let scanner = scanner_for(&config);
    let result = scanner
        .scan(
            &format!("{}/music/user/bob/", server.url()),
            &SessionCookies::from_sid("x"),
            "music",
            &mut |_: &SessionCookies| {},
        )
        .await;

    let err = result.expect_err("subfolder failure should propagate");
    assert!(err.is_fetch_failure(), "unexpected error: {err}");
}
