#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chatbot_ui::provider::ProviderClient;
use chatbot_ui::{Credential, CredentialGate, Settings};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_KEY: &str = "sk-test-key";
pub const IMAGE_URL: &str = "https://images.example/generated.png";

/// Settings pointing every external call at `server`.
pub fn settings(server: &MockServer, data_dir: &Path) -> Settings {
    Settings {
        api_base: server.uri(),
        chat_model: "gpt-4o".to_string(),
        prompt_model: "gpt-4o-mini".to_string(),
        image_model: "dall-e-3".to_string(),
        image_size: "1024x1024".to_string(),
        search_endpoint: format!("{}/search.json", server.uri()),
        search_api_key: "serp-test-key".to_string(),
        credential_file: data_dir.join("credential.json"),
        templates_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/templates")),
        static_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        ..Settings::default()
    }
}

pub async fn mount_models_probe(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "object": "list",
            "data": [{ "id": "gpt-4o", "object": "model", "created": 0, "owned_by": "system" }]
        })))
        .mount(server)
        .await;
}

/// A credential the mock provider has accepted.
pub async fn authorized(server: &MockServer) -> Credential {
    mount_models_probe(server, 200).await;
    CredentialGate::new(ProviderClient::new(server.uri()))
        .authorize(TEST_KEY)
        .await
        .expect("mock provider accepts the test key")
}

fn completion_body(message: Value) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 0,
        "model": "gpt-4o",
        "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }]
    })
}

pub fn text_completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(completion_body(json!({
        "role": "assistant",
        "content": text
    })))
}

pub fn tool_call_completion(name: &str, arguments: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(completion_body(json!({
        "role": "assistant",
        "content": null,
        "tool_calls": [{
            "id": "call_1",
            "type": "function",
            "function": { "name": name, "arguments": arguments.to_string() }
        }]
    })))
}

pub fn image_response(url: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "created": 0,
        "data": [{ "url": url }]
    }))
}

pub fn provider_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": { "message": message, "type": "invalid_request_error" }
    }))
}

/// Paths of the requests the mock received, in order, excluding the key probe.
pub async fn request_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .filter(|p| p != "/models")
        .collect()
}

/// JSON bodies of the chat completion requests, in order.
pub async fn completion_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/chat/completions")
        .map(|request| serde_json::from_slice(&request.body).expect("completion body is JSON"))
        .collect()
}
