//! Tests for `src/relay/dispatch.rs` against the in-memory client.

use wa_relay::relay::dispatch::{dispatch, SendOutcome, SendRequest, UploadedFile};
use wa_relay::relay::RelayError;
use wa_relay::whatsapp::OutboundContent;

use crate::support::FakeClient;

fn text_request(phone: &str, message: &str) -> SendRequest {
    SendRequest {
        phone: Some(phone.to_owned()),
        message: Some(message.to_owned()),
        ..SendRequest::default()
    }
}

#[tokio::test]
async fn text_dispatch_invokes_send_once() {
    let client = FakeClient::default();
    let outcome = dispatch(&client, text_request("123", "hi"))
        .await
        .expect("dispatch succeeds");

    assert_eq!(outcome, SendOutcome::MessageSent);
    assert_eq!(client.send_calls(), 1);
    let sent = client.sent();
    assert_eq!(sent[0].0.as_str(), "123@c.us");
    assert_eq!(sent[0].1, OutboundContent::Text("hi".to_owned()));
}

#[tokio::test]
async fn validation_failure_never_reaches_client() {
    let client = FakeClient::default();
    let result = dispatch(&client, SendRequest::default()).await;
    assert!(matches!(result, Err(RelayError::Validation(_))));

    let result = dispatch(
        &client,
        SendRequest {
            phone: Some("123".to_owned()),
            ..SendRequest::default()
        },
    )
    .await;
    assert!(matches!(result, Err(RelayError::Validation(_))));
    assert_eq!(client.send_calls(), 0);
}

#[tokio::test]
async fn client_failure_is_a_dispatch_error() {
    let client = FakeClient {
        send_error: Some("session closed".to_owned()),
        ..FakeClient::default()
    };
    let result = dispatch(&client, text_request("123", "hi")).await;
    assert!(matches!(result, Err(RelayError::Dispatch(ref m)) if m == "session closed"));
    assert!(client.sent().is_empty());
}

#[tokio::test]
async fn empty_file_is_still_sent() {
    let client = FakeClient::default();
    let request = SendRequest {
        phone: Some("123".to_owned()),
        file: Some(UploadedFile {
            bytes: Vec::new(),
            filename: Some("empty.txt".to_owned()),
            mimetype: Some("text/plain".to_owned()),
        }),
        ..SendRequest::default()
    };
    let outcome = dispatch(&client, request).await.expect("dispatch succeeds");
    assert_eq!(outcome.status(), "file sent");
    assert_eq!(client.send_calls(), 1);
}
