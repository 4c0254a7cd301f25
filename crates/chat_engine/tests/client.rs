use chat_core::StreamEvent;
use chat_engine::{
    BackendClient, ChatRequest, ClientSettings, EventStream, FailureKind, ReqwestBackend,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> ReqwestBackend {
    let settings = ClientSettings {
        base_url: server.uri(),
        ..ClientSettings::default()
    };
    ReqwestBackend::new(&settings).expect("backend")
}

async fn drain(source: chat_engine::ByteStream) -> Vec<StreamEvent> {
    let mut events = EventStream::new(source);
    let mut out = Vec::new();
    while let Some(event) = events.next_event().await {
        out.push(event);
    }
    out
}

#[tokio::test]
async fn chat_stream_posts_prompt_and_yields_events() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/stream"))
        .and(body_json(serde_json::json!({
            "session_id": "s1",
            "prompt": "hello",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "{\"thought_token\":\"hmm\"}\n{\"token\":\"Hi\"}\n{\"token\":\" there\"}\n",
            "application/x-ndjson",
        ))
        .mount(&server)
        .await;

    let request = ChatRequest {
        session_id: "s1".to_string(),
        prompt: "hello".to_string(),
        regenerate: false,
    };
    let source = backend(&server).open_chat_stream(&request).await.unwrap();

    assert_eq!(
        drain(source).await,
        vec![
            StreamEvent::ThoughtToken("hmm".to_string()),
            StreamEvent::Token("Hi".to_string()),
            StreamEvent::Token(" there".to_string()),
        ]
    );
}

#[tokio::test]
async fn regenerate_flag_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/stream"))
        .and(body_json(serde_json::json!({
            "session_id": "s1",
            "prompt": "again",
            "regenerate": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{\"token\":\"new\"}\n", "application/x-ndjson"))
        .expect(1)
        .mount(&server)
        .await;

    let request = ChatRequest {
        session_id: "s1".to_string(),
        prompt: "again".to_string(),
        regenerate: true,
    };
    let source = backend(&server).open_chat_stream(&request).await.unwrap();
    assert_eq!(drain(source).await, vec![StreamEvent::Token("new".to_string())]);
}

#[tokio::test]
async fn http_error_carries_backend_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/stream"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(serde_json::json!({ "detail": "No model loaded." })),
        )
        .mount(&server)
        .await;

    let request = ChatRequest {
        session_id: "s1".to_string(),
        prompt: "hello".to_string(),
        regenerate: false,
    };
    let err = match backend(&server).open_chat_stream(&request).await {
        Ok(_) => panic!("expected failure"),
        Err(err) => err,
    };

    assert_eq!(err.kind, FailureKind::HttpStatus(503));
    assert_eq!(err.message, "No model loaded.");
}

#[tokio::test]
async fn download_stream_reports_progress() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/models/download"))
        .and(body_json(serde_json::json!({
            "repo_id": "org/repo",
            "filename": "m.gguf",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "{\"status\":\"downloading\",\"progress\":50.0}\n{\"status\":\"complete\",\"progress\":100}\n",
            "application/x-ndjson",
        ))
        .mount(&server)
        .await;

    let source = backend(&server)
        .open_download_stream("org/repo", "m.gguf")
        .await
        .unwrap();
    assert_eq!(
        drain(source).await,
        vec![StreamEvent::Progress(50.0), StreamEvent::Complete]
    );
}

#[tokio::test]
async fn title_is_read_from_json_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/generate-title"))
        .and(body_json(serde_json::json!({ "session_id": "s1" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "title": "Greetings" })),
        )
        .mount(&server)
        .await;

    let title = backend(&server).generate_title("s1").await.unwrap();
    assert_eq!(title, "Greetings");
}

#[tokio::test]
async fn title_without_field_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/generate-title"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let err = backend(&server).generate_title("s1").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidResponse);
}

#[test]
fn invalid_base_url_is_rejected() {
    let settings = ClientSettings {
        base_url: "not a url".to_string(),
        ..ClientSettings::default()
    };
    let err = ReqwestBackend::new(&settings).unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
