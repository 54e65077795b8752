#![allow(missing_docs)]

mod common;

use async_trait::async_trait;
use common::{ALICE, BOB, Harness, custom_server_harness};
use homedav::{ServerBuilder, options::Shutdown};
use homedav_core::auth::{UserStore, UserStoreError};
use homedav_sbe_fs::Filesystem;
use pretty_assertions::assert_eq;
use reqwest::{StatusCode, header::WWW_AUTHENTICATE};
use rstest::{fixture, rstest};
use std::{sync::Arc, time::Duration};

#[fixture]
async fn harness() -> Harness {
    custom_server_harness(|builder| builder).await
}

const PROPFIND_ALLPROP: &str = r#"<?xml version="1.0" encoding="utf-8"?><D:propfind xmlns:D="DAV:"><D:allprop/></D:propfind>"#;

async fn propfind(harness: &Harness, path: &str) -> (StatusCode, String) {
    let response = harness
        .as_user("PROPFIND", path, ALICE)
        .header("Depth", "1")
        .header("Content-Type", "application/xml")
        .body(PROPFIND_ALLPROP)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

#[rstest]
#[awt]
#[tokio::test]
async fn unauthenticated_requests_are_challenged(#[future] harness: Harness) {
    let response = harness.request("PROPFIND", "/").send().await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[WWW_AUTHENTICATE], "Basic realm=\"Restricted Access\"");
}

#[rstest]
#[awt]
#[tokio::test]
async fn wrong_passwords_are_challenged(#[future] harness: Harness) {
    for credentials in [("alice", "not-her-password"), ("mallory", "wonderland")] {
        let response = harness.as_user("GET", "/alice/", credentials).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{credentials:?}");
    }
}

#[tokio::test]
async fn the_realm_can_be_configured() {
    let harness = custom_server_harness(|builder| builder.realm("Family Photos")).await;

    let response = harness.request("GET", "/").send().await.unwrap();

    assert_eq!(response.headers()[WWW_AUTHENTICATE], "Basic realm=\"Family Photos\"");
}

#[rstest]
#[awt]
#[tokio::test]
async fn root_lists_own_folder_and_shares(#[future] harness: Harness) {
    let (status, body) = propfind(&harness, "/").await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(body.contains("/alice/"), "{body}");
    assert!(body.contains("/shares/"), "{body}");
    assert!(!body.contains("bob"), "{body}");
}

#[rstest]
#[awt]
#[tokio::test]
async fn own_folder_can_be_listed(#[future] harness: Harness) {
    std::fs::write(harness.root.join("users/alice/notes.txt"), b"remember the milk").unwrap();

    let (status, body) = propfind(&harness, "/alice/").await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(body.contains("/alice/notes.txt"), "{body}");
}

#[rstest]
#[awt]
#[tokio::test]
async fn other_folders_are_forbidden(#[future] harness: Harness) {
    std::fs::write(harness.root.join("users/bob/secret.txt"), b"bob's").unwrap();

    let (status, _) = propfind(&harness, "/bob/").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = harness.as_user("GET", "/bob/secret.txt", ALICE).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = harness.as_user("PUT", "/bob/planted.txt", ALICE).body("x").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!harness.root.join("users/bob/planted.txt").exists());
}

#[rstest]
#[awt]
#[tokio::test]
async fn shares_are_empty(#[future] harness: Harness) {
    let (status, body) = propfind(&harness, "/shares/").await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(body.contains("/shares/"), "{body}");
}

#[rstest]
#[awt]
#[tokio::test]
async fn mkcol_and_delete_inside_own_folder(#[future] harness: Harness) {
    let response = harness.as_user("MKCOL", "/alice/docs", ALICE).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(harness.root.join("users/alice/docs").is_dir());

    std::fs::write(harness.root.join("users/alice/docs/a.txt"), b"a").unwrap();
    let response = harness.as_user("DELETE", "/alice/docs", ALICE).send().await.unwrap();
    assert!(response.status().is_success(), "{}", response.status());
    assert!(!harness.root.join("users/alice/docs").exists());
}

#[rstest]
#[awt]
#[tokio::test]
async fn home_folder_cannot_be_deleted(#[future] harness: Harness) {
    std::fs::create_dir(harness.root.join("users/alice/docs")).unwrap();
    std::fs::write(harness.root.join("users/alice/docs/a.txt"), b"a").unwrap();

    for path in ["/alice", "/alice/", "/", "/shares", "/bob"] {
        let response = harness.as_user("DELETE", path, ALICE).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
    }

    // Nothing below the home folder was touched either.
    assert!(harness.root.join("users/alice/docs/a.txt").exists());
    assert!(harness.root.join("users/bob").is_dir());
}

#[rstest]
#[awt]
#[tokio::test]
async fn put_then_get(#[future] harness: Harness) {
    let response = harness
        .as_user("PUT", "/alice/hello.txt", ALICE)
        .body("hello, world")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "{}", response.status());
    assert_eq!(std::fs::read_to_string(harness.root.join("users/alice/hello.txt")).unwrap(), "hello, world");

    let response = harness.as_user("GET", "/alice/hello.txt", ALICE).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "hello, world");
}

#[rstest]
#[awt]
#[tokio::test]
async fn move_stays_inside_own_folder(#[future] harness: Harness) {
    std::fs::write(harness.root.join("users/alice/a.txt"), b"a").unwrap();

    let response = harness
        .as_user("MOVE", "/alice/a.txt", ALICE)
        .header("Destination", harness.url("/bob/a.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(harness.root.join("users/alice/a.txt").exists());
    assert!(!harness.root.join("users/bob/a.txt").exists());

    let response = harness
        .as_user("MOVE", "/alice", ALICE)
        .header("Destination", harness.url("/alice/moved"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = harness
        .as_user("MOVE", "/alice/a.txt", ALICE)
        .header("Destination", harness.url("/alice/b.txt"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "{}", response.status());
    assert!(harness.root.join("users/alice/b.txt").exists());
}

#[rstest]
#[awt]
#[tokio::test]
async fn copy_inside_own_folder(#[future] harness: Harness) {
    let home = harness.root.join("users/alice");
    std::fs::write(home.join("a.txt"), b"a").unwrap();
    std::fs::create_dir_all(home.join("docs/drafts")).unwrap();
    std::fs::write(home.join("docs/drafts/c.txt"), b"c").unwrap();

    let response = harness
        .as_user("COPY", "/alice/a.txt", ALICE)
        .header("Destination", harness.url("/alice/b.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(std::fs::read(home.join("b.txt")).unwrap(), b"a");
    assert_eq!(std::fs::read(home.join("a.txt")).unwrap(), b"a");

    let response = harness
        .as_user("COPY", "/alice/docs", ALICE)
        .header("Destination", harness.url("/alice/backup"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(std::fs::read(home.join("backup/drafts/c.txt")).unwrap(), b"c");
}

#[rstest]
#[awt]
#[tokio::test]
async fn copy_with_overwrite_replaces_the_destination(#[future] harness: Harness) {
    let home = harness.root.join("users/alice");
    std::fs::write(home.join("a.txt"), b"new contents").unwrap();
    std::fs::create_dir(home.join("docs")).unwrap();
    std::fs::write(home.join("docs/thesis.txt"), b"thesis").unwrap();

    let response = harness
        .as_user("COPY", "/alice/a.txt", ALICE)
        .header("Destination", harness.url("/alice/docs"))
        .header("Overwrite", "T")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success(), "{}", response.status());
    assert_eq!(std::fs::read(home.join("docs")).unwrap(), b"new contents");
}

#[rstest]
#[awt]
#[tokio::test]
async fn refused_copies_leave_the_destination_alone(#[future] harness: Harness) {
    let alice = harness.root.join("users/alice");
    let bob = harness.root.join("users/bob");
    std::fs::write(alice.join("a.txt"), b"a").unwrap();
    std::fs::create_dir(alice.join("docs")).unwrap();
    std::fs::write(alice.join("docs/thesis.txt"), b"thesis").unwrap();
    std::fs::create_dir(bob.join("docs")).unwrap();
    std::fs::write(bob.join("docs/plans.txt"), b"plans").unwrap();

    for (from, to) in [
        ("/alice/a.txt", "/alice"),
        ("/alice/a.txt", "/bob/docs"),
        ("/bob/docs/plans.txt", "/alice/docs"),
        ("/alice/docs", "/alice/docs/inner"),
        ("/", "/alice/docs"),
    ] {
        let response = harness
            .as_user("COPY", from, ALICE)
            .header("Destination", harness.url(to))
            .header("Overwrite", "T")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{from} -> {to}");
    }

    assert_eq!(std::fs::read(alice.join("docs/thesis.txt")).unwrap(), b"thesis");
    assert_eq!(std::fs::read(bob.join("docs/plans.txt")).unwrap(), b"plans");
    assert!(!alice.join("docs/inner").exists());
}

#[rstest]
#[awt]
#[tokio::test]
async fn users_are_isolated_both_ways(#[future] harness: Harness) {
    let response = harness.as_user("PUT", "/bob/todo.txt", BOB).body("build").send().await.unwrap();
    assert!(response.status().is_success(), "{}", response.status());

    let response = harness.as_user("GET", "/bob/todo.txt", ALICE).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = harness.as_user("GET", "/alice/../bob/todo.txt", ALICE).send().await.unwrap();
    assert_ne!(response.status(), StatusCode::OK);
}

#[derive(Debug)]
struct BrokenStore;

#[async_trait]
impl UserStore for BrokenStore {
    async fn check(&self, _username: &str, _password: &str) -> Result<bool, UserStoreError> {
        Err(UserStoreError::ImplPropagated("database unavailable".to_string(), None))
    }

    async fn exists(&self, _username: &str) -> Result<bool, UserStoreError> {
        Ok(false)
    }

    async fn add(&self, _username: &str, _password: &str) -> Result<(), UserStoreError> {
        Ok(())
    }

    async fn update(&self, _username: &str, _password: &str) -> Result<(), UserStoreError> {
        Ok(())
    }

    async fn delete(&self, _username: &str) -> Result<(), UserStoreError> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, UserStoreError> {
        Ok(vec![])
    }
}

#[tokio::test]
async fn user_store_failures_are_server_errors() {
    let addr = common::next_addr();
    let root = tempfile::tempdir().unwrap();
    let server = ServerBuilder::new(Filesystem::new(root.path()).unwrap(), Arc::new(BrokenStore))
        .build()
        .unwrap()
        .listen(addr.clone());
    tokio::spawn(server);
    common::wait_for(&addr).await;

    let response = reqwest::Client::new()
        .get(format!("http://{addr}/alice/"))
        .basic_auth("alice", Some("wonderland"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn shuts_down_when_told_to() {
    let addr = common::next_addr();
    let root = tempfile::tempdir().unwrap();
    let (storage, users) = common::accounts(root.path()).await;
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = ServerBuilder::new(storage, users)
        .shutdown_indicator(async move {
            rx.await.ok();
            Shutdown::new().grace_period(Duration::from_secs(5))
        })
        .build()
        .unwrap()
        .listen(addr.clone());
    let running = tokio::spawn(server);
    common::wait_for(&addr).await;

    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), running).await.unwrap().unwrap();
    assert!(result.is_ok(), "{result:?}");
    assert!(tokio::net::TcpStream::connect(&addr).await.is_err());
}
