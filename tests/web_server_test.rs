mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use chatbot_ui::constants::{CHAT_FAILURE_MESSAGE, CREDENTIAL_KEY, INVALID_KEY_MESSAGE};
use chatbot_ui::web_server::{router, AppState};
use chatbot_ui::CredentialStore;
use common::{image_response, provider_error, text_completion, tool_call_completion, IMAGE_URL, TEST_KEY};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    upstream: MockServer,
    server: TestServer,
    store: CredentialStore,
    _dir: TempDir,
}

async fn harness() -> Harness {
    let upstream = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let settings = common::settings(&upstream, dir.path());
    let store = CredentialStore::new(settings.credential_file.clone());
    let state = AppState::new(&settings).unwrap();
    let server = TestServer::new(router(state)).unwrap();
    Harness {
        upstream,
        server,
        store,
        _dir: dir,
    }
}

async fn logged_in() -> Harness {
    let h = harness().await;
    common::mount_models_probe(&h.upstream, 200).await;
    h.server
        .post("/api/session")
        .json(&json!({ "apiKey": TEST_KEY }))
        .await
        .assert_status_ok();
    h
}

#[tokio::test]
async fn test_landing_page_renders() {
    let h = harness().await;
    let response = h.server.get("/").await;
    response.assert_status_ok();
    assert!(response.text().contains("AI ChatBot UI"));
}

#[tokio::test]
async fn test_chat_page_redirects_without_session() {
    let h = harness().await;
    let response = h.server.get("/chat").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/");
}

#[tokio::test]
async fn test_static_files_are_served() {
    let h = harness().await;
    h.server.get("/static/style.css").await.assert_status_ok();
}

#[tokio::test]
async fn test_login_with_blank_key_is_rejected_without_probe() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.upstream)
        .await;

    h.server
        .post("/api/session")
        .json(&json!({ "apiKey": "   " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[test_log::test(tokio::test)]
async fn test_invalid_key_keeps_existing_session() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", format!("Bearer {}", TEST_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(provider_error(401, "Incorrect API key provided"))
        .mount(&h.upstream)
        .await;

    h.server
        .post("/api/session")
        .json(&json!({ "apiKey": TEST_KEY }))
        .await
        .assert_status_ok();

    let response = h
        .server
        .post("/api/session")
        .json(&json!({ "apiKey": "sk-wrong" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"], INVALID_KEY_MESSAGE);

    assert_eq!(h.store.load().unwrap().as_deref(), Some(TEST_KEY));
    h.server.get("/chat").await.assert_status_ok();
}

#[tokio::test]
async fn test_valid_login_stores_key_and_opens_chat() {
    let h = logged_in().await;

    let stored: Value =
        serde_json::from_str(&std::fs::read_to_string(h.store.path()).unwrap()).unwrap();
    assert_eq!(stored[CREDENTIAL_KEY], TEST_KEY);

    let page = h.server.get("/chat").await;
    page.assert_status_ok();
    assert!(page.text().contains("data-id=\"welcome\""));

    let turns: Vec<Value> = h.server.get("/api/messages").await.json();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0]["id"], "welcome");
    assert_eq!(turns[0]["role"], "assistant");
}

#[tokio::test]
async fn test_state_resumes_from_stored_key() {
    let upstream = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let settings = common::settings(&upstream, dir.path());
    CredentialStore::new(settings.credential_file.clone())
        .save(TEST_KEY)
        .unwrap();

    let server = TestServer::new(router(AppState::new(&settings).unwrap())).unwrap();
    server.get("/chat").await.assert_status_ok();
}

#[tokio::test]
async fn test_send_message_appends_exchange() {
    let h = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(text_completion("반갑습니다!"))
        .expect(1)
        .mount(&h.upstream)
        .await;

    let response = h
        .server
        .post("/api/messages")
        .json(&json!({ "content": "  안녕하세요  " }))
        .await;
    response.assert_status_ok();
    let turn: Value = response.json();
    assert_eq!(turn["role"], "assistant");
    assert_eq!(turn["content"], "반갑습니다!");
    assert!(turn.get("imageUrl").is_none());

    let turns: Vec<Value> = h.server.get("/api/messages").await.json();
    assert_eq!(turns.len(), 3);
    assert_eq!(turns[1]["role"], "user");
    assert_eq!(turns[1]["content"], "안녕하세요");
    assert_eq!(turns[2]["content"], "반갑습니다!");
}

#[tokio::test]
async fn test_send_message_attaches_image() {
    let h = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(tool_call_completion(
            "image_generation",
            json!({ "prompt": "a sunset over the sea", "conversation_context": "" }),
        ))
        .mount(&h.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(image_response(IMAGE_URL))
        .expect(1)
        .mount(&h.upstream)
        .await;

    let turn: Value = h
        .server
        .post("/api/messages")
        .json(&json!({ "content": "draw a sunset" }))
        .await
        .json();
    assert_eq!(turn["imageUrl"], IMAGE_URL);

    let page = h.server.get("/chat").await.text();
    assert!(page.contains(IMAGE_URL));
}

#[tokio::test]
async fn test_send_message_failure_becomes_error_turn() {
    let h = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(provider_error(500, "boom"))
        .mount(&h.upstream)
        .await;

    let turn: Value = h
        .server
        .post("/api/messages")
        .json(&json!({ "content": "hello" }))
        .await
        .json();
    assert_eq!(turn["content"], CHAT_FAILURE_MESSAGE);

    let turns: Vec<Value> = h.server.get("/api/messages").await.json();
    assert_eq!(turns.len(), 3);
}

#[tokio::test]
async fn test_send_message_rejects_blank_content() {
    let h = logged_in().await;
    h.server
        .post("/api/messages")
        .json(&json!({ "content": "   " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let turns: Vec<Value> = h.server.get("/api/messages").await.json();
    assert_eq!(turns.len(), 1);
}

#[tokio::test]
async fn test_messages_require_session() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(text_completion("unreachable"))
        .expect(0)
        .mount(&h.upstream)
        .await;

    h.server
        .get("/api/messages")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .post("/api/messages")
        .json(&json!({ "content": "hello" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_chat_route_points_to_session_chat() {
    let h = harness().await;
    let response = h
        .server
        .post("/api/chat")
        .json(&json!({ "messages": [] }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["redirectToClient"], true);
}

#[tokio::test]
async fn test_search_route_validates_input() {
    let h = logged_in().await;
    h.server
        .post("/api/search")
        .json(&json!({ "messages": [{ "role": "user", "content": "hi" }] }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .post("/api/search")
        .json(&json!({ "messages": [], "apiKey": TEST_KEY }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_route_rejects_unknown_key() {
    let h = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(text_completion("unreachable"))
        .expect(0)
        .mount(&h.upstream)
        .await;

    h.server
        .post("/api/search")
        .json(&json!({
            "messages": [{ "role": "user", "content": "서울 날씨" }],
            "apiKey": "sk-someone-else"
        }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_search_route_returns_cited_answer() {
    let h = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("tool_call_id"))
        .respond_with(text_completion("맑음 [출처: 기상청](https://www.weather.go.kr)"))
        .with_priority(1)
        .expect(1)
        .mount(&h.upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(tool_call_completion("web_search", json!({ "query": "서울 날씨" })))
        .mount(&h.upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organic_results": [{ "title": "기상청", "snippet": "맑음", "link": "https://www.weather.go.kr" }]
        })))
        .expect(1)
        .mount(&h.upstream)
        .await;

    let response = h
        .server
        .post("/api/search")
        .json(&json!({
            "messages": [{ "role": "user", "content": "서울 날씨 알려줘" }],
            "apiKey": TEST_KEY
        }))
        .await;
    response.assert_status_ok();
    assert!(response.json::<Value>()["response"]
        .as_str()
        .unwrap()
        .contains("[출처: 기상청]"));
}

#[tokio::test]
async fn test_search_route_relays_provider_status() {
    let h = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(provider_error(429, "Rate limit reached"))
        .mount(&h.upstream)
        .await;

    let response = h
        .server
        .post("/api/search")
        .json(&json!({
            "messages": [{ "role": "user", "content": "뉴스" }],
            "apiKey": TEST_KEY
        }))
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json::<Value>()["error"], "Rate limit reached");
}

#[tokio::test]
async fn test_image_route_generates_image() {
    let h = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .and(body_partial_json(json!({
            "prompt": "mountain lake, highly detailed, professional photography, beautiful lighting, artistic composition"
        })))
        .respond_with(image_response(IMAGE_URL))
        .expect(1)
        .mount(&h.upstream)
        .await;

    let response = h
        .server
        .post("/api/image")
        .json(&json!({ "prompt": "mountain lake", "apiKey": TEST_KEY }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["imageUrl"], IMAGE_URL);
    assert_eq!(body["prompt"], "mountain lake");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_image_route_requires_prompt_and_matching_key() {
    let h = logged_in().await;
    h.server
        .post("/api/image")
        .json(&json!({ "apiKey": TEST_KEY }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .post("/api/image")
        .json(&json!({ "prompt": "cat", "apiKey": "sk-other" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_image_route_without_url_is_server_error() {
    let h = logged_in().await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "created": 0, "data": [] })))
        .mount(&h.upstream)
        .await;

    h.server
        .post("/api/image")
        .json(&json!({ "prompt": "cat", "apiKey": TEST_KEY }))
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_logout_clears_session_and_key() {
    let h = logged_in().await;

    let response = h.server.delete("/api/session").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["redirect"], "/");

    assert_eq!(h.store.load().unwrap(), None);
    h.server
        .get("/chat")
        .await
        .assert_status(StatusCode::SEE_OTHER);
}
