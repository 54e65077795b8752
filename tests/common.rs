#![allow(missing_docs, dead_code)]

use homedav::{ServerBuilder, accounts};
use homedav_auth_jsonfile::JsonFileUserStore;
use homedav_sbe_fs::Filesystem;
use std::{
    num::NonZeroU32,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU16, Ordering},
    },
    time::Duration,
};

pub const ALICE: (&str, &str) = ("alice", "wonderland");
pub const BOB: (&str, &str) = ("bob", "the-builder");

static TESTPORT: AtomicU16 = AtomicU16::new(18080);

pub struct Harness {
    pub root: PathBuf,
    _tempdir: tempfile::TempDir,
    pub addr: String,
    pub client: reqwest::Client,
}

impl Harness {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn request(&self, method: &str, path: &str) -> reqwest::RequestBuilder {
        let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap();
        self.client.request(method, self.url(path))
    }

    pub fn as_user(&self, method: &str, path: &str, (username, password): (&str, &str)) -> reqwest::RequestBuilder {
        self.request(method, path).basic_auth(username, Some(password))
    }
}

pub fn next_addr() -> String {
    let port = TESTPORT.fetch_add(1, Ordering::Relaxed);
    format!("127.0.0.1:{port}")
}

pub async fn wait_for(addr: &str) {
    while tokio::net::TcpStream::connect(addr).await.is_err() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// A storage root and user store with alice and bob, each with their home folder.
pub async fn accounts(root: &std::path::Path) -> (Filesystem, Arc<JsonFileUserStore>) {
    let users = JsonFileUserStore::open(root.join("users.json"))
        .unwrap()
        .with_iterations(NonZeroU32::new(1000).unwrap())
        .with_unknown_user_delay(Duration::from_millis(1));
    let storage = Filesystem::new(root).unwrap();
    accounts::ensure_homes(&users, &storage).await.unwrap();
    for (username, password) in [ALICE, BOB] {
        accounts::add_user(&users, &storage, username, password).await.unwrap();
    }
    (storage, Arc::new(users))
}

pub async fn custom_server_harness<F>(configure: F) -> Harness
where
    F: FnOnce(ServerBuilder<Filesystem, JsonFileUserStore>) -> ServerBuilder<Filesystem, JsonFileUserStore>,
{
    let addr = next_addr();
    let tempdir = tempfile::TempDir::new().unwrap();
    let root = tempdir.path().to_path_buf();

    let (storage, users) = accounts(&root).await;
    let server = configure(ServerBuilder::new(storage, users)).build().unwrap().listen(addr.clone());

    tokio::spawn(server);
    wait_for(&addr).await;

    Harness {
        root,
        _tempdir: tempdir,
        addr,
        client: reqwest::Client::new(),
    }
}
