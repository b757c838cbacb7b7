use stacks_node_client::reqwest::ReqwestClient;
use stacks_node_client::StacksNodeClient;
use stacks_signer::{
    BroadcastResponse, NoopObserver, RecoveryResolver, SignedTransaction, SingleSigTemplate,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Offset of the recovery marker inside a single-sig transaction.
const MARKER_OFFSET: usize = 44;

struct MarkerIs(u8);

impl wiremock::Match for MarkerIs {
    fn matches(&self, request: &Request) -> bool {
        request.body.get(MARKER_OFFSET) == Some(&self.0)
    }
}

struct MarkerIsNot(u8);

impl wiremock::Match for MarkerIsNot {
    fn matches(&self, request: &Request) -> bool {
        request.body.get(MARKER_OFFSET) != Some(&self.0)
    }
}

fn unsigned_transfer() -> Vec<u8> {
    let mut bytes = vec![0x80];
    bytes.extend_from_slice(&0x8000_0000u32.to_be_bytes());
    bytes.extend_from_slice(&[0x04, 0x00]);
    bytes.extend_from_slice(&[0x11; 20]);
    bytes.extend_from_slice(&1u64.to_be_bytes());
    bytes.extend_from_slice(&200u64.to_be_bytes());
    bytes.push(0x00);
    bytes.extend_from_slice(&[0u8; 65]);
    bytes.extend_from_slice(&[0x03, 0x02, 0, 0, 0, 0]);
    bytes.extend_from_slice(&[0x00, 0x05, 0x1a]);
    bytes.extend_from_slice(&[0x22; 20]);
    bytes.extend_from_slice(&10_000u64.to_be_bytes());
    bytes.extend_from_slice(&[0u8; 34]);
    bytes
}

fn signature_validation_body() -> serde_json::Value {
    serde_json::json!({
        "error": "transaction rejected",
        "reason": "SignatureValidation",
        "reason_data": { "message": "Signature is not valid" },
        "txid": "0x0b1f"
    })
}

fn node_client(server: &MockServer) -> StacksNodeClient<ReqwestClient> {
    StacksNodeClient::new(ReqwestClient::new(server.uri()))
}

#[tokio::test]
async fn should_post_octet_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/transactions"))
        .and(header("content-type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"0x0b1f\""))
        .expect(1)
        .mount(&server)
        .await;

    let response = node_client(&server)
        .broadcast_transaction(&SignedTransaction::new(vec![0xde, 0xad]))
        .await
        .unwrap();

    assert_eq!(response, BroadcastResponse::accepted("0x0b1f"));
}

#[tokio::test]
async fn should_get_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/accounts/ST2J9WNZV97AJ49ZDR77WGNR3HDHQRSEHZ45JXB21"))
        .and(query_param("proof", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "balance": "0x00000000000000000000000000002710",
            "locked": "0x00000000000000000000000000000000",
            "nonce": 3
        })))
        .mount(&server)
        .await;

    let account = node_client(&server)
        .get_account("ST2J9WNZV97AJ49ZDR77WGNR3HDHQRSEHZ45JXB21")
        .await
        .unwrap();

    assert_eq!(account.nonce, 3);
    assert_eq!(account.balance, "0x00000000000000000000000000002710");
}

#[tokio::test]
async fn should_resolve_marker_against_node() {
    let _ = env_logger::builder().is_test(true).try_init();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/transactions"))
        .and(MarkerIsNot(0))
        .respond_with(ResponseTemplate::new(400).set_body_json(signature_validation_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/transactions"))
        .and(MarkerIs(0))
        .respond_with(ResponseTemplate::new(200).set_body_string("\"0x0b1f\""))
        .expect(1)
        .mount(&server)
        .await;

    let template = SingleSigTemplate::from_bytes(unsigned_transfer()).unwrap();
    let signature = format!("0x{}", "5a".repeat(64));

    let outcome = RecoveryResolver::new(NoopObserver)
        .resolve(&signature, &template, &node_client(&server), "STX-TRANSFER")
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.chosen_candidate.marker().value(), 0);
    assert_eq!(outcome.txid(), Some("0x0b1f"));
    assert_eq!(outcome.attempts.len(), 2);
}

#[tokio::test]
async fn should_stop_on_not_enough_funds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/transactions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "transaction rejected",
            "reason": "NotEnoughFunds",
            "reason_data": { "expected": 10200, "actual": 10 },
            "txid": "0x0b1f"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let template = SingleSigTemplate::from_bytes(unsigned_transfer()).unwrap();
    let outcome = RecoveryResolver::new(NoopObserver)
        .resolve(&"5a".repeat(64), &template, &node_client(&server), "STX-TRANSFER")
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(outcome.attempts_count, 4);
}

#[tokio::test]
async fn should_retry_when_node_is_unreachable() {
    // nothing listens on the discard port
    let client = StacksNodeClient::new(ReqwestClient::new("http://127.0.0.1:9".to_string()));
    let template = SingleSigTemplate::from_bytes(unsigned_transfer()).unwrap();

    let outcome = RecoveryResolver::new(NoopObserver)
        .resolve(&"5a".repeat(64), &template, &client, "STX-TRANSFER")
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.attempts.len(), 4);
    assert_eq!(outcome.chosen_candidate.marker().value(), 1);
}
