//! HTTP-level tests for the Ollama backend against a mock server.

#![cfg(feature = "ollama")]

use consilience_core::{Error, GenerationBackend};
use consilience_inference::OllamaBackend;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> OllamaBackend {
    OllamaBackend::with_timeout(server.uri(), "gpt-oss:20b".to_string(), 10)
}

fn chat_reply(content: &str) -> serde_json::Value {
    json!({
        "model": "gpt-oss:20b",
        "message": {"role": "assistant", "content": content},
        "done": true
    })
}

#[tokio::test]
async fn test_generate_posts_chat_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "gpt-oss:20b",
            "stream": false,
            "messages": [
                {"role": "system", "content": "Be terse."},
                {"role": "user", "content": "Compare the papers."}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("done")))
        .expect(1)
        .mount(&server)
        .await;

    let text = backend_for(&server)
        .generate_with_system("Be terse.", "Compare the papers.")
        .await
        .unwrap();
    assert_eq!(text, "done");
}

#[tokio::test]
async fn test_json_generation_sets_format_and_disables_thinking() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"format": "json", "think": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(r#"{"topic":"x"}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let text = backend_for(&server)
        .generate_json_with_system("", "Return JSON.")
        .await
        .unwrap();
    assert_eq!(text, r#"{"topic":"x"}"#);
}

#[tokio::test]
async fn test_server_error_maps_to_inference_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let err = backend_for(&server).generate("hi").await.unwrap_err();
    match err {
        Error::Inference(msg) => {
            assert!(msg.contains("500"), "unexpected message: {msg}");
            assert!(msg.contains("model not loaded"));
        }
        other => panic!("expected inference error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_body_is_inference_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = backend_for(&server).generate("hi").await.unwrap_err();
    assert!(matches!(err, Error::Inference(ref m) if m.starts_with("Failed to parse response")));
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    assert!(backend_for(&server).health_check().await.unwrap());
}

#[tokio::test]
async fn test_health_check_unreachable_is_false() {
    let backend = OllamaBackend::with_timeout("http://127.0.0.1:9".to_string(), "m".to_string(), 1);
    assert!(!backend.health_check().await.unwrap());
}
