//! HTTP-level tests for the Workers AI and Hugging Face clients, using
//! wiremock servers in place of the hosted APIs.

use futures_util::StreamExt;
use ghostwriter_core::{
    ChatMessage, Error, HuggingFaceClient, RoundEvent, RoundOutcome, RoundState, Session,
    WorkersAiClient,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
const RUN_PATH: &str = "/accounts/acc-123/ai/run/test-model";

fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        body.push_str(&format!("data: {}\n\n", json!({ "response": fragment })));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn workers_client(server: &MockServer) -> WorkersAiClient {
    WorkersAiClient::new("acc-123", "cf-token")
        .with_base_url(&server.uri())
        .with_model("test-model")
}

fn hf_client(server: &MockServer) -> HuggingFaceClient {
    HuggingFaceClient::new("hf-token").with_model_url(&format!("{}/models/sd", server.uri()))
}

async fn mount_lyrics(server: &MockServer, fragments: &[&str]) {
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(fragments), "text/event-stream"),
        )
        .mount(server)
        .await;
}

async fn mount_cover(server: &MockServer, status: u16, body: &[u8]) {
    Mock::given(method("POST"))
        .and(path("/models/sd"))
        .respond_with(ResponseTemplate::new(status).set_body_raw(body.to_vec(), "image/png"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_workers_request_shape() {
    let server = MockServer::start().await;
    let messages = vec![
        ChatMessage::user("Write a song in the style of Adele about rain."),
        ChatMessage::assistant("Drip drop"),
        ChatMessage::user("Write a song in the style of Queen about rhapsody."),
    ];

    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .and(header("authorization", "Bearer cf-token"))
        .and(body_json(json!({
            "messages": [
                {"role": "user", "content": "Write a song in the style of Adele about rain."},
                {"role": "assistant", "content": "Drip drop"},
                {"role": "user", "content": "Write a song in the style of Queen about rhapsody."},
            ],
            "stream": true,
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tokens: Vec<String> = workers_client(&server)
        .stream_chat(&messages)
        .await
        .unwrap()
        .map(|t| t.unwrap())
        .collect()
        .await;

    assert_eq!(tokens, vec!["ok"]);
}

#[tokio::test]
async fn test_workers_streams_fragments() {
    let server = MockServer::start().await;
    mount_lyrics(&server, &["Beep", " boop", " love"]).await;

    let tokens: Vec<String> = workers_client(&server)
        .stream_chat(&[ChatMessage::user("hi")])
        .await
        .unwrap()
        .map(|t| t.unwrap())
        .collect()
        .await;

    assert_eq!(tokens, vec!["Beep", " boop", " love"]);
}

#[tokio::test]
async fn test_workers_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("Authentication error"))
        .mount(&server)
        .await;

    let result = workers_client(&server).stream_chat(&[ChatMessage::user("hi")]).await;

    match result {
        Err(Error::Status { service, status, body }) => {
            assert_eq!(service, "Workers AI");
            assert_eq!(status.as_u16(), 403);
            assert_eq!(body, "Authentication error");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an error status"),
    }
}

#[tokio::test]
async fn test_workers_malformed_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"response\":\"a\"}\n\ndata: {oops}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let results: Vec<Result<String, Error>> = workers_client(&server)
        .stream_chat(&[ChatMessage::user("hi")])
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap(), "a");
    assert!(matches!(results[1], Err(Error::Decode(_))));
}

#[tokio::test]
async fn test_huggingface_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/sd"))
        .and(header("authorization", "Bearer hf-token"))
        .and(body_json(json!({ "inputs": "Album cover for X" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG.to_vec(), "image/png"))
        .expect(1)
        .mount(&server)
        .await;

    let bytes = hf_client(&server).text_to_image("Album cover for X").await.unwrap();
    assert_eq!(bytes, PNG);
}

#[tokio::test]
async fn test_huggingface_error_status() {
    let server = MockServer::start().await;
    mount_cover(&server, 503, br#"{"error":"Model is currently loading"}"#).await;

    let err = hf_client(&server).text_to_image("x").await.unwrap_err();
    assert!(matches!(err, Error::Status { service: "Hugging Face", .. }));
}

#[tokio::test]
async fn test_round_against_mock_services() {
    let server = MockServer::start().await;
    mount_lyrics(&server, &["Beep", " boop", " love"]).await;
    mount_cover(&server, 200, PNG).await;

    let lyrics = workers_client(&server);
    let covers = hf_client(&server);
    let mut session = Session::new();
    let mut events: Vec<RoundEvent> = Vec::new();

    let outcome = session
        .submit("Daft Punk", "robots falling in love", &lyrics, &covers, &mut events)
        .await
        .unwrap();

    let RoundOutcome::Completed(round) = outcome else {
        panic!("expected a completed round");
    };
    assert_eq!(round.lyrics, "Beep boop love");
    assert_eq!(round.cover.mime_type(), "image/png");
    assert_eq!(session.log().len(), 2);
    assert_eq!(session.log().messages()[1], ChatMessage::assistant("Beep boop love"));
    assert_eq!(session.state(), RoundState::Idle);
}

#[tokio::test]
async fn test_round_fails_when_cover_service_errors() {
    let server = MockServer::start().await;
    mount_lyrics(&server, &["la"]).await;
    mount_cover(&server, 500, b"boom").await;

    let lyrics = workers_client(&server);
    let covers = hf_client(&server);
    let mut session = Session::new();
    let mut events: Vec<RoundEvent> = Vec::new();

    let err = session
        .submit("Adele", "rain", &lyrics, &covers, &mut events)
        .await
        .unwrap_err();

    assert_eq!(err.stage, RoundState::AwaitingCover);
    assert_eq!(session.state(), RoundState::Failed);
    assert!(matches!(
        events.last(),
        Some(RoundEvent::Failed { stage: RoundState::AwaitingCover, .. })
    ));
}

#[tokio::test]
async fn test_unreachable_service_is_transport_failure() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = WorkersAiClient::new("acc-123", "cf-token")
        .with_base_url(&uri)
        .with_model("test-model");
    let err = match client.stream_chat(&[ChatMessage::user("hi")]).await {
        Err(e) => e,
        Ok(_) => panic!("expected a transport error"),
    };
    assert_eq!(err.kind(), ghostwriter_core::ErrorKind::Transport);
}
