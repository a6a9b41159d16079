use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use content_store::PinningConfig;
use ledger::LedgerConfig;
use serde_json::{json, Value};
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{
    config::ServerConfig,
    routes::{create_routes, RouteState},
    service::Service,
};

pub const TEST_CONTRACT: &str = "0xA07e71aCDF98dd4ddc5C857EB81765a6e2383c91";
pub const TEST_ACCOUNT: &str = "0x90F8bf6A479f320ead074411a4B0e7944Ea8c9C1";

/// Shared state of the fake pinning service and fake ledger node the
/// service under test talks to.
#[derive(Clone)]
pub struct Upstreams {
    pub pinned: Arc<Mutex<Vec<String>>>,
    pub pin_calls: Arc<AtomicUsize>,
    pub fail_pin: Arc<AtomicBool>,
    pub accounts: Arc<Mutex<Vec<String>>>,
    /// account (lowercase) -> registered hash
    pub registered: Arc<Mutex<HashMap<String, String>>>,
    pub revert: Arc<AtomicBool>,
    pub rpc_calls: Arc<AtomicUsize>,
}

impl Default for Upstreams {
    fn default() -> Self {
        Upstreams {
            pinned: Arc::new(Mutex::new(vec![])),
            pin_calls: Arc::new(AtomicUsize::new(0)),
            fail_pin: Arc::new(AtomicBool::new(false)),
            accounts: Arc::new(Mutex::new(vec![TEST_ACCOUNT.to_string()])),
            registered: Arc::new(Mutex::new(HashMap::new())),
            revert: Arc::new(AtomicBool::new(false)),
            rpc_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

async fn pin_handler(State(up): State<Upstreams>) -> impl IntoResponse {
    let n = up.pin_calls.fetch_add(1, Ordering::SeqCst);
    if up.fail_pin.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "pin failed").into_response();
    }
    let ipfs_hash = format!("QmFake{:06}", n);
    up.pinned.lock().unwrap().push(ipfs_hash.clone());
    Json(json!({"IpfsHash": ipfs_hash, "PinSize": 10240})).into_response()
}

fn decode_store_hash_calldata(data: &str) -> String {
    let raw = hex::decode(data.trim_start_matches("0x")).unwrap();
    assert_eq!(&raw[..4], &[0x71, 0xdc, 0x61, 0xcb], "not storeHash calldata");
    let mut len_tail = [0u8; 8];
    len_tail.copy_from_slice(&raw[60..68]);
    let len = u64::from_be_bytes(len_tail) as usize;
    String::from_utf8(raw[68..68 + len].to_vec()).unwrap()
}

fn decode_get_hash_calldata(data: &str) -> String {
    let raw = hex::decode(data.trim_start_matches("0x")).unwrap();
    assert_eq!(&raw[..4], &[0x1d, 0xa0, 0xb8, 0xfc], "not getHash calldata");
    format!("0x{}", hex::encode(&raw[16..36]))
}

fn abi_string(value: &str) -> String {
    let mut raw = vec![0u8; 32];
    raw[31] = 0x20;
    let mut len_word = [0u8; 32];
    len_word[31] = value.len() as u8;
    raw.extend_from_slice(&len_word);
    raw.extend_from_slice(value.as_bytes());
    let padded = raw.len().div_ceil(32) * 32;
    raw.resize(padded, 0);
    format!("0x{}", hex::encode(raw))
}

async fn rpc_handler(State(up): State<Upstreams>, Json(req): Json<Value>) -> Json<Value> {
    up.rpc_calls.fetch_add(1, Ordering::SeqCst);
    let method = req["method"].as_str().unwrap();
    let result = match method {
        "eth_accounts" => json!(*up.accounts.lock().unwrap()),
        "eth_sendTransaction" => {
            let tx = &req["params"][0];
            let from = tx["from"].as_str().unwrap().to_lowercase();
            let hash = decode_store_hash_calldata(tx["data"].as_str().unwrap());
            if !up.revert.load(Ordering::SeqCst) {
                up.registered.lock().unwrap().insert(from, hash);
            }
            json!("0xfaketx")
        }
        "eth_getTransactionReceipt" => {
            let status = if up.revert.load(Ordering::SeqCst) {
                "0x0"
            } else {
                "0x1"
            };
            json!({"status": status, "blockNumber": "0x10"})
        }
        "eth_call" => {
            let account = decode_get_hash_calldata(req["params"][0]["data"].as_str().unwrap());
            let stored = up
                .registered
                .lock()
                .unwrap()
                .get(&account)
                .cloned()
                .unwrap_or_default();
            json!(abi_string(&stored))
        }
        other => panic!("unexpected rpc method {other}"),
    };
    Json(json!({"jsonrpc": "2.0", "id": req["id"], "result": result}))
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Spins up fake upstreams plus the real HTTP surface and exercises it
/// over loopback.
pub struct TestService {
    pub base_url: String,
    pub upstreams: Upstreams,
    _upload_dir: tempfile::TempDir,
}

impl TestService {
    pub async fn new() -> Result<Self> {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let upstreams = Upstreams::default();
        let pin_url = serve(
            Router::new()
                .route("/pinning/pinFileToIPFS", post(pin_handler))
                .with_state(upstreams.clone()),
        )
        .await;
        let rpc_url = serve(
            Router::new()
                .route("/", post(rpc_handler))
                .with_state(upstreams.clone()),
        )
        .await;

        let upload_dir = tempfile::tempdir()?;
        let config = ServerConfig {
            upload_dir: upload_dir.path().to_str().unwrap().to_string(),
            content_store: PinningConfig {
                api_url: pin_url,
                api_key: "test-key".to_string(),
                secret_api_key: "test-secret".to_string(),
                timeout_secs: 5,
                ..Default::default()
            },
            ledger: LedgerConfig {
                rpc_url,
                contract_address: TEST_CONTRACT.to_string(),
                confirm_timeout_secs: 5,
                poll_interval_ms: 10,
                ..Default::default()
            },
            ..Default::default()
        };

        let service = Service::new(config.clone())?;
        let base_url = serve(create_routes(RouteState {
            pipeline: service.pipeline.clone(),
            upload_dir: PathBuf::from(&config.upload_dir),
        }))
        .await;

        Ok(Self {
            base_url,
            upstreams,
            _upload_dir: upload_dir,
        })
    }

    pub async fn upload(
        &self,
        file: Option<(&str, Vec<u8>)>,
        account: Option<&str>,
    ) -> reqwest::Response {
        let mut form = reqwest::multipart::Form::new();
        if let Some((name, bytes)) = file {
            form = form.part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(name.to_string()),
            );
        }
        if let Some(account) = account {
            form = form.text("account", account.to_string());
        }
        reqwest::Client::new()
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub fn registered_hash(&self, account: &str) -> Option<String> {
        self.upstreams
            .registered
            .lock()
            .unwrap()
            .get(&account.to_lowercase())
            .cloned()
    }
}
