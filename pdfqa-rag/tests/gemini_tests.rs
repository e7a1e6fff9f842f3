//! HTTP contract tests for the Gemini embedder and generator.

#![cfg(feature = "gemini")]

use pdfqa_rag::gemini::{GeminiClient, GeminiEmbedder, GeminiGenerator};
use pdfqa_rag::{Embedder, ErrorKind, Generator, Provider, ProviderConfig};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new("test-key").unwrap().with_base_url(server.uri())
}

async fn last_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    serde_json::from_slice(&requests.last().unwrap().body).unwrap()
}

#[tokio::test]
async fn batch_embedding_sends_document_task_and_keeps_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/embedding-001:batchEmbedContents"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [{ "values": [0.1, 0.2] }, { "values": [0.3, 0.4] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::new(client(&server));
    let vectors = embedder.embed_batch(&["first chunk", "second chunk"]).await.unwrap();
    assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);

    let body = last_body(&server).await;
    let requests = body["requests"].as_array().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["model"], "models/embedding-001");
    assert_eq!(requests[0]["taskType"], "RETRIEVAL_DOCUMENT");
    assert_eq!(requests[1]["content"]["parts"][0]["text"], "second chunk");
}

#[tokio::test]
async fn query_embedding_uses_query_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/embedding-001:embedContent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embedding": { "values": [1.0, 0.0, 0.5] } })),
        )
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::new(client(&server));
    assert_eq!(embedder.embed("where?").await.unwrap(), vec![1.0, 0.0, 0.5]);
    assert_eq!(last_body(&server).await["taskType"], "RETRIEVAL_QUERY");
}

#[tokio::test]
async fn api_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let err = GeminiEmbedder::new(client(&server)).embed_batch(&["x"]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmbeddingService);
    assert!(err.to_string().contains("API key not valid"), "{err}");
}

#[tokio::test]
async fn short_batch_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embeddings": [{ "values": [1.0] }] })),
        )
        .mount(&server)
        .await;

    let err = GeminiEmbedder::new(client(&server)).embed_batch(&["a", "b"]).await.unwrap_err();
    assert!(err.to_string().contains("1 embeddings for 2 inputs"), "{err}");
}

#[tokio::test]
async fn generation_sends_temperature_and_joins_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": "Paris is " }, { "text": "the capital." }]
                },
                "finishReason": "STOP"
            }]
        })))
        .mount(&server)
        .await;

    let generator = GeminiGenerator::new(client(&server));
    let text = generator.generate("Context: ...", 0.3).await.unwrap();
    assert_eq!(text, "Paris is the capital.");

    let body = last_body(&server).await;
    let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
    assert!((temperature - 0.3).abs() < 1e-6);
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Context: ...");
}

#[tokio::test]
async fn blocked_prompt_is_generation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "promptFeedback": { "blockReason": "SAFETY" } })),
        )
        .mount(&server)
        .await;

    let err = GeminiGenerator::new(client(&server)).generate("p", 0.3).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GenerationService);
    assert!(err.to_string().contains("SAFETY"), "{err}");
}

#[tokio::test]
async fn empty_candidate_is_generation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [] }, "finishReason": "MAX_TOKENS" }]
        })))
        .mount(&server)
        .await;

    let err = GeminiGenerator::new(client(&server)).generate("p", 0.3).await.unwrap_err();
    assert!(err.to_string().contains("MAX_TOKENS"), "{err}");
}

#[tokio::test]
async fn provider_config_targets_overridden_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:embedContent"))
        .and(header("x-goog-api-key", "from-env"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embedding": { "values": [0.5] } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (embedder, _) = ProviderConfig::new(Provider::Gemini, "from-env")
        .unwrap()
        .with_embedding_model("text-embedding-004")
        .with_base_url(server.uri())
        .build_services()
        .unwrap();
    assert_eq!(embedder.embed("q").await.unwrap(), vec![0.5]);
}
