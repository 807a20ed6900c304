//! `ExplorerClient` against a local HTTP server

#![cfg(feature = "http")]

mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use incoming_tx_tracker::{
    data_structures::NetworkId,
    events::listeners::{mock_listener::CapturedEvents, MockEventListener},
    scanning::{
        CycleParams, ExplorerClient, IncomingTransactionsTracker, LocalBlockTracker,
        LocalNetworkProvider, LocalPreferences, PreferencesSnapshot, TrackerConfig,
        TransactionSource,
    },
    storage::IncrementalStateStore,
    IncomingTxError,
};

use common::{wait_until, WATCHED};

/// Canned reply served to every connection
#[derive(Clone)]
enum Reply {
    Respond { status: &'static str, body: String },
    Stall(Duration),
}

/// Single-purpose explorer stand-in
struct ExplorerStub {
    base_url: String,
    connections: Arc<AtomicUsize>,
    request_lines: Arc<Mutex<Vec<String>>>,
}

impl ExplorerStub {
    async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));
        let request_lines = Arc::new(Mutex::new(Vec::new()));

        let counter = Arc::clone(&connections);
        let lines = Arc::clone(&request_lines);
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let reply = reply.clone();
                let lines = Arc::clone(&lines);
                tokio::spawn(async move {
                    let head = read_request_head(&mut socket).await;
                    if let Some(line) = head.lines().next() {
                        lines.lock().unwrap().push(line.to_string());
                    }
                    match reply {
                        Reply::Stall(duration) => tokio::time::sleep(duration).await,
                        Reply::Respond { status, body } => {
                            let response = format!(
                                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                                body.len()
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                    }
                });
            }
        });

        Self {
            base_url,
            connections,
            request_lines,
        }
    }

    async fn respond(status: &'static str, body: impl Into<String>) -> Self {
        Self::start(Reply::Respond {
            status,
            body: body.into(),
        })
        .await
    }

    fn client(&self, timeout: Duration) -> ExplorerClient {
        let config = TrackerConfig::new()
            .with_base_url(self.base_url.clone())
            .with_request_timeout(timeout);
        ExplorerClient::new(config).unwrap()
    }

    fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn request_lines(&self) -> Vec<String> {
        self.request_lines.lock().unwrap().clone()
    }
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

const XDC_RECORDS: &str = r#"{
    "status": "1",
    "message": "OK",
    "result": [{
        "hash": "0xfeed",
        "from": "xdcBBB0000000000000000000000000000000000002",
        "to": "xdcAAA0000000000000000000000000000000000001",
        "value": "1000000000000000000",
        "gas": "21000",
        "gasPrice": "250000000",
        "nonce": "7",
        "blockNumber": "1520",
        "timestamp": "2021-03-01T10:00:00.000Z",
        "isError": "0"
    }]
}"#;

#[tokio::test]
async fn test_stalled_request_times_out_without_retry() {
    let stub = ExplorerStub::start(Reply::Stall(Duration::from_secs(5))).await;
    let client = stub.client(Duration::from_millis(100));

    let started = tokio::time::Instant::now();
    let result = client.fetch_transactions(WATCHED, Some(10), "mainnet").await;

    assert!(matches!(result, Err(IncomingTxError::Http(_))), "{result:?}");
    assert!(started.elapsed() < Duration::from_secs(2));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stub.connection_count(), 1);
}

#[tokio::test]
async fn test_server_error_status_is_explorer_error() {
    let stub = ExplorerStub::respond("500 Internal Server Error", r#"{"error":"boom"}"#).await;
    let client = stub.client(Duration::from_secs(2));

    let result = client.fetch_transactions(WATCHED, None, "mainnet").await;

    match result {
        Err(IncomingTxError::Explorer(message)) => assert!(message.contains("500"), "{message}"),
        other => panic!("expected explorer error, got {other:?}"),
    }
    assert_eq!(stub.connection_count(), 1);
}

#[tokio::test]
async fn test_non_json_body_is_explorer_error() {
    let stub = ExplorerStub::respond("200 OK", "<html>maintenance</html>").await;
    let client = stub.client(Duration::from_secs(2));

    let result = client.fetch_transactions(WATCHED, None, "mainnet").await;

    assert!(
        matches!(result, Err(IncomingTxError::Explorer(_))),
        "{result:?}"
    );
}

#[tokio::test]
async fn test_xdc_prefixed_records_are_canonicalized() {
    let stub = ExplorerStub::respond("200 OK", XDC_RECORDS).await;
    let client = stub.client(Duration::from_secs(2));

    let fetch = client
        .fetch_transactions("xdcAAA0000000000000000000000000000000000001", Some(1500), "mainnet")
        .await
        .unwrap();

    assert_eq!(fetch.chain_id, Some(NetworkId::Mainnet.chain_id()));
    let record = &fetch.response.records()[0];
    assert_eq!(record.from, "0xBBB0000000000000000000000000000000000002");
    assert_eq!(record.to, "0xAAA0000000000000000000000000000000000001");

    let lines = stub.request_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("GET /api?module=account&action=txlist"));
    assert!(lines[0].contains("address=0xAAA0000000000000000000000000000000000001"));
    assert!(lines[0].contains("startBlock=1500"));
}

/// Tracker whose explorer is `client`, watching [`WATCHED`] on mainnet
async fn tracker_with(
    client: ExplorerClient,
) -> (
    Arc<IncomingTransactionsTracker>,
    Arc<IncrementalStateStore>,
    CapturedEvents,
) {
    let store = Arc::new(IncrementalStateStore::in_memory().await.unwrap());
    let listener = MockEventListener::new();
    let events = listener.captured();
    let source: Arc<dyn TransactionSource> = Arc::new(client);

    let tracker = IncomingTransactionsTracker::builder()
        .with_source(source)
        .with_store(Arc::clone(&store))
        .with_block_tracker(Arc::new(LocalBlockTracker::new(4)))
        .with_network_provider(Arc::new(LocalNetworkProvider::new("mainnet", 4)))
        .with_preferences(Arc::new(LocalPreferences::new(PreferencesSnapshot::new(
            Some(WATCHED.to_string()),
            true,
        ))))
        .with_event_listener(Box::new(listener))
        .build()
        .await
        .unwrap();

    (tracker, store, events)
}

#[tokio::test]
async fn test_non_json_body_fails_the_cycle() {
    let stub = ExplorerStub::respond("200 OK", "not json at all").await;
    let (tracker, store, events) = tracker_with(stub.client(Duration::from_secs(2))).await;

    let report = tracker
        .run_cycle(CycleParams::new(WATCHED).with_block_number(40))
        .await;

    assert!(report.is_none());
    assert_eq!(store.get_last_fetched_block(NetworkId::Mainnet).await, None);
    assert_eq!(store.transaction_count().await, 0);

    let captured = events.clone();
    wait_until(move || MockEventListener::event_types(&captured).contains(&"CycleFailed")).await;
}

#[tokio::test]
async fn test_xdc_records_flow_into_the_store() {
    let stub = ExplorerStub::respond("200 OK", XDC_RECORDS).await;
    let (tracker, store, _events) = tracker_with(stub.client(Duration::from_secs(2))).await;

    let report = tracker
        .run_cycle(CycleParams::new(WATCHED).with_block_number(1500))
        .await
        .unwrap();

    assert_eq!(report.new_transactions.len(), 1);
    let stored = store.get_transaction("0xfeed").await.unwrap();
    assert_eq!(stored.block_number, Some(1520));
    assert_eq!(stored.tx_params.from, "0xBBB0000000000000000000000000000000000002");
    assert_eq!(stored.tx_params.to, "0xAAA0000000000000000000000000000000000001");
    assert_eq!(
        store.get_last_fetched_block(NetworkId::Mainnet).await,
        Some(1521)
    );
}
