//! End-to-end relay exchange tests
//!
//! The full lifecycle against a mock relay:
//! 1. Caller builds an unguessable callback location and embeds it in a
//!    request URI
//! 2. Transport augments the URI with the `post` delivery marker and hands
//!    it to the URI handler
//! 3. Responder encrypts its answer to the caller's public key and posts it
//!    at the callback location
//! 4. Poll loop observes the payload, scrubs the relay entry
//! 5. Caller decrypts the payload

use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use courier_crypto::{
    decrypt_response, encrypt_message, EncryptionKeypair, MaybeEncrypted,
};
use courier_transport::{
    CancelHandle, ExtractCallback, PollOutcome, RelayConfig, RelayTransport,
};

// =============================================================================
// HELPERS
// =============================================================================

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

/// Test request URIs carry their callback as a bare query parameter; real
/// deployments embed it in a signed token instead, which is why extraction
/// is injected.
fn query_extractor() -> impl ExtractCallback {
    |uri: &str| {
        let url = Url::parse(uri).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "callback")
            .map(|(_, value)| value.into_owned())
    }
}

fn relay_config(server: &MockServer) -> RelayConfig {
    RelayConfig {
        relay_url: format!("{}/api/v1/topic/", server.uri()),
        polling_interval: Duration::from_millis(10),
    }
}

/// Split a callback location into the relay-relative topic path
fn topic_path(server: &MockServer, callback: &str) -> String {
    callback.strip_prefix(&server.uri()).unwrap().to_string()
}

// =============================================================================
// 1. Full exchange: encrypted response posted at the callback location
// =============================================================================

#[tokio::test]
async fn test_encrypted_exchange_roundtrip() {
    init_tracing();
    let server = MockServer::start().await;
    let transport = RelayTransport::with_config(query_extractor(), relay_config(&server)).unwrap();

    // Caller side: fresh callback, fresh keypair for the response.
    let caller = EncryptionKeypair::generate();
    let callback = transport.gen_callback();
    let request_uri = format!("https://wallet.example/req?callback={callback}");

    // Responder side: encrypt the answer to the caller's key and "post" it
    // at the callback location (the mock relay serves it on GET).
    let envelope = encrypt_message("the confidential answer", &caller.public).unwrap();
    let topic = topic_path(&server, &callback);
    Mock::given(method("GET"))
        .and(path(topic.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "access_token": serde_json::to_value(&envelope).unwrap() }
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(topic))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let handler = |_: &str, _: CancelHandle| {};
    let handle = transport.dispatch(&handler, &request_uri).unwrap();

    let PollOutcome::Payload(payload) = handle.wait().await.unwrap() else {
        panic!("expected a payload");
    };

    // Relay only ever saw ciphertext; the caller decrypts.
    let received: MaybeEncrypted = serde_json::from_value(payload).unwrap();
    assert!(matches!(received, MaybeEncrypted::Encrypted(_)));
    let message = decrypt_response(received, Some(&caller.secret)).unwrap();
    assert_eq!(message, "the confidential answer");

    server.verify().await;
}

// =============================================================================
// 2. Plaintext tx response passes through undecrypted
// =============================================================================

#[tokio::test]
async fn test_plain_tx_exchange() {
    init_tracing();
    let server = MockServer::start().await;
    let transport = RelayTransport::with_config(query_extractor(), relay_config(&server)).unwrap();

    let callback = transport.gen_callback();
    let request_uri = format!("https://wallet.example/req?callback={callback}");
    let topic = topic_path(&server, &callback);

    // Two "not answered yet" polls before the tx lands.
    Mock::given(method("GET"))
        .and(path(topic.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": {}})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(topic.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "tx": "0xabc123" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(topic))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let handler = |_: &str, _: CancelHandle| {};
    let handle = transport.dispatch(&handler, &request_uri).unwrap();

    let PollOutcome::Payload(payload) = handle.wait().await.unwrap() else {
        panic!("expected a payload");
    };
    let received: MaybeEncrypted = serde_json::from_value(payload).unwrap();
    let message = decrypt_response(received, None).unwrap();
    assert_eq!(message, "0xabc123");

    server.verify().await;
}

// =============================================================================
// 3. Responder declines: relay error propagates, entry still scrubbed
// =============================================================================

#[tokio::test]
async fn test_declined_exchange_propagates_relay_error() {
    init_tracing();
    let server = MockServer::start().await;
    let transport = RelayTransport::with_config(query_extractor(), relay_config(&server)).unwrap();

    let callback = transport.gen_callback();
    let request_uri = format!("https://wallet.example/req?callback={callback}");
    let topic = topic_path(&server, &callback);

    Mock::given(method("GET"))
        .and(path(topic.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "error": "access_denied" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(topic))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let handler = |_: &str, _: CancelHandle| {};
    let handle = transport.dispatch(&handler, &request_uri).unwrap();

    let err = handle.wait().await.unwrap_err();
    assert_eq!(err.to_string(), "Relay reported an error: access_denied");

    server.verify().await;
}

// =============================================================================
// 4. Caller cancels from the handler's cancel switch
// =============================================================================

#[tokio::test]
async fn test_handler_wired_cancel_terminates_exchange() {
    init_tracing();
    let server = MockServer::start().await;
    let transport = RelayTransport::with_config(query_extractor(), relay_config(&server)).unwrap();

    let callback = transport.gen_callback();
    let request_uri = format!("https://wallet.example/req?callback={callback}");

    // No responder ever posts; the only way out is the cancel switch the
    // handler received, as a UI cancel button would use it.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": {}})))
        .mount(&server)
        .await;

    let handler = |uri: &str, cancel: CancelHandle| {
        assert!(uri.contains("type=post"));
        cancel.cancel();
    };
    let handle = transport.dispatch(&handler, &request_uri).unwrap();

    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome, PollOutcome::Cancelled);
}

// =============================================================================
// 5. Transport ownership of callbacks across relays
// =============================================================================

#[tokio::test]
async fn test_is_own_callback_distinguishes_relays() {
    let server = MockServer::start().await;
    let transport = RelayTransport::with_config(query_extractor(), relay_config(&server)).unwrap();

    let own = format!(
        "https://wallet.example/req?callback={}",
        transport.gen_callback()
    );
    let foreign =
        "https://wallet.example/req?callback=https://other.example/api/v1/topic/abc".to_string();

    assert!(transport.is_own_callback(&own));
    assert!(!transport.is_own_callback(&foreign));
}
