//! `UenRegistry` against a canned JSON-RPC node on a loopback socket.

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use uen_ledger::abi::AbiDescriptor;
use uen_ledger::{
    CancelFlag, JsonRpcClient, LedgerError, LocalSigner, ReceiptWait, RecordLedger, UenRegistry,
};

const CONTRACT: &str = "0x228dfCFf73CcF0a65034aA55621122a5aaD49FE7";
const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const TX_HASH: &str = "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060";

const ABI: &str = r#"{"abi":[
  {"type":"function","name":"add_uens","inputs":[{"type":"string[]"},{"type":"string[]"}],"outputs":[]},
  {"type":"function","name":"get_all_uens","inputs":[],"outputs":[{"type":"string[]"}]},
  {"type":"function","name":"get_name","inputs":[{"type":"string"}],"outputs":[{"type":"string"}]}
]}"#;

fn word(n: usize) -> Vec<u8> {
    let mut w = vec![0u8; 32];
    w[24..].copy_from_slice(&(n as u64).to_be_bytes());
    w
}

fn padded(s: &str) -> Vec<u8> {
    let mut out = word(s.len());
    out.extend_from_slice(s.as_bytes());
    out.resize(32 + s.len().div_ceil(32) * 32, 0);
    out
}

/// ABI return encoding of a single `string[]`.
fn string_array_return(items: &[&str]) -> String {
    let mut out = word(32);
    out.extend(word(items.len()));
    let mut offset = items.len() * 32;
    for item in items {
        out.extend(word(offset));
        offset += padded(item).len();
    }
    for item in items {
        out.extend(padded(item));
    }
    format!("0x{}", hex::encode(out))
}

#[derive(Default)]
struct Node {
    methods: Vec<String>,
    receipt_status: &'static str,
    pending_polls: usize,
}

fn handle(node: &Mutex<Node>, req: &Value) -> Value {
    let method = req["method"].as_str().unwrap_or_default().to_string();
    let mut node = node.lock().unwrap();
    node.methods.push(method.clone());
    let result = match method.as_str() {
        "eth_chainId" => json!("0x15f902"),
        "eth_call" => json!(string_array_return(&["53123456A", "201912345K"])),
        "eth_getTransactionCount" => json!("0x3"),
        "eth_estimateGas" => json!("0x5208"),
        "eth_sendRawTransaction" => {
            let raw = req["params"][0].as_str().unwrap_or_default();
            assert!(raw.starts_with("0x02"), "expected a type-2 envelope");
            json!(TX_HASH)
        }
        "eth_getTransactionReceipt" => {
            if node.pending_polls > 0 {
                node.pending_polls -= 1;
                Value::Null
            } else {
                json!({
                    "transactionHash": TX_HASH,
                    "blockNumber": "0x10",
                    "gasUsed": "0x5208",
                    "status": node.receipt_status,
                })
            }
        }
        other => {
            return json!({"jsonrpc":"2.0","id":req["id"],"error":{"code":-32601,"message":format!("method {other} not found")}})
        }
    };
    json!({"jsonrpc":"2.0","id":req["id"],"result":result})
}

/// Serve HTTP/1.1 JSON-RPC, one request per connection.
fn spawn_node(node: Arc<Mutex<Node>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((k, v)) = line.split_once(':') {
                    if k.eq_ignore_ascii_case("content-length") {
                        content_length = v.trim().parse().unwrap_or(0);
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            if reader.read_exact(&mut body).is_err() {
                continue;
            }
            let req: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            let resp = handle(&node, &req).to_string();
            let _ = write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                resp.len(),
                resp
            );
        }
    });
    format!("http://{addr}")
}

fn registry(node: Arc<Mutex<Node>>) -> UenRegistry {
    let url = spawn_node(node);
    let rpc = JsonRpcClient::new(&url, Duration::from_secs(5)).unwrap();
    let abi = AbiDescriptor::from_json(ABI).unwrap();
    UenRegistry::connect(rpc, CONTRACT.parse().unwrap(), &abi)
        .unwrap()
        .with_signer(LocalSigner::from_hex(KEY).unwrap())
        .with_receipt_wait(ReceiptWait {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
        })
}

fn node(status: &'static str, pending_polls: usize) -> Arc<Mutex<Node>> {
    Arc::new(Mutex::new(Node {
        receipt_status: status,
        pending_polls,
        ..Node::default()
    }))
}

#[test]
fn connect_reads_chain_id_and_lists_identifiers() {
    let node = node("0x1", 0);
    let registry = registry(node.clone());
    assert_eq!(registry.chain_id(), 1_440_002);
    assert_eq!(
        registry.list_all_identifiers().unwrap(),
        vec!["53123456A".to_string(), "201912345K".to_string()]
    );
}

#[test]
fn add_records_waits_for_receipt() {
    let node = node("0x1", 2);
    let registry = registry(node.clone());
    let receipt = registry
        .add_records(
            &["T08LL1234A".to_string()],
            &["Gamma LLP".to_string()],
            &CancelFlag::new(),
        )
        .unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.block_number, 16);

    let methods = node.lock().unwrap().methods.clone();
    assert!(methods.contains(&"eth_getTransactionCount".to_string()));
    assert!(methods.contains(&"eth_sendRawTransaction".to_string()));
    // fixed gas limit by default, no estimate
    assert!(!methods.contains(&"eth_estimateGas".to_string()));
    assert_eq!(
        methods
            .iter()
            .filter(|m| *m == "eth_getTransactionReceipt")
            .count(),
        3
    );
}

#[test]
fn reverted_receipt_is_an_error() {
    let registry = registry(node("0x0", 0));
    let err = registry
        .add_records(&["X".to_string()], &["x".to_string()], &CancelFlag::new())
        .unwrap_err();
    assert!(matches!(err, LedgerError::Reverted { .. }));
}

#[test]
fn cancelled_before_send_touches_nothing() {
    let node = node("0x1", 0);
    let registry = registry(node.clone());
    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = registry
        .add_records(&["X".to_string()], &["x".to_string()], &cancel)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(!node
        .lock()
        .unwrap()
        .methods
        .contains(&"eth_sendRawTransaction".to_string()));
}
