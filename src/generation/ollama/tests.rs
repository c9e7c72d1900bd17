use super::*;
use crate::config::OllamaConfig;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn generator_for(server: &MockServer) -> OllamaGenerator {
    let mut config = OllamaConfig {
        temperature: 0.5,
        ..OllamaConfig::default()
    };
    config
        .set_base_url(&server.uri())
        .expect("mock server URI is valid");
    OllamaGenerator::new(&config).expect("generator builds")
}

#[test]
fn generator_configuration() {
    let config = OllamaConfig {
        host: "gen-host".to_string(),
        port: 5678,
        generation_model: "test-generator".to_string(),
        temperature: 0.7,
        max_tokens: 256,
        ..OllamaConfig::default()
    };
    let generator = OllamaGenerator::new(&config).expect("generator builds");

    assert_eq!(generator.model(), "test-generator");
    assert_eq!(generator.max_tokens, 256);
    assert_eq!(generator.base_url.host_str(), Some("gen-host"));
    assert_eq!(generator.base_url.port(), Some(5678));
}

#[tokio::test]
async fn request_carries_model_prompt_and_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "llama3.1:8b",
            "prompt": "Question: why?",
            "stream": false,
            "options": {"temperature": 0.5, "num_predict": 512},
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"response": "Because."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let answer = generator
        .generate("Question: why?")
        .await
        .expect("generation succeeds");

    assert_eq!(answer, "Because.");
}

#[tokio::test]
async fn text_field_is_accepted_as_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"text": "fallback answer"})),
        )
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let answer = generator.generate("q").await.expect("generation succeeds");

    assert_eq!(answer, "fallback answer");
}

#[tokio::test]
async fn missing_answer_text_yields_empty_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let answer = generator.generate("q").await.expect("generation succeeds");

    assert_eq!(answer, "");
}

#[tokio::test]
async fn server_error_detail_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "out of memory"})),
        )
        .mount(&server)
        .await;

    let generator = generator_for(&server);
    let error = generator.generate("q").await.expect_err("HTTP 500 is an error");

    match error {
        RagError::GenerationBackend(message) => {
            assert!(message.contains("out of memory"), "got: {}", message);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn slow_generation_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": "too late"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = OllamaConfig {
        generate_timeout_secs: 1,
        ..OllamaConfig::default()
    };
    config
        .set_base_url(&server.uri())
        .expect("mock server URI is valid");
    let generator = OllamaGenerator::new(&config).expect("generator builds");

    let error = generator.generate("q").await.expect_err("deadline passes");
    assert!(matches!(error, RagError::GenerationBackend(_)));
}
