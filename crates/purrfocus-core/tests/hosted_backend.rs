//! Hosted backend against a mocked Supabase-compatible server.

use mockito::{Matcher, Server};
use purrfocus_core::auth::IdentityProvider;
use purrfocus_core::backend::{HostedBackend, RecordStore};
use purrfocus_core::error::{AuthError, StoreError};
use purrfocus_core::habits::HabitLogEntry;
use purrfocus_core::notes::{NoteDraft, NotePatch};

const ANON_KEY: &str = "anon-test-key";

const TOKEN_BODY: &str = r#"{
    "access_token": "jwt-abc",
    "token_type": "bearer",
    "expires_in": 3600,
    "refresh_token": "refresh-xyz",
    "user": { "id": "user-1", "email": "cat@example.com" }
}"#;

async fn signed_in(server: &mut Server) -> HostedBackend {
    let mock = server
        .mock("POST", "/auth/v1/token")
        .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
        .match_header("apikey", ANON_KEY)
        .match_body(Matcher::PartialJson(serde_json::json!({
            "email": "cat@example.com",
            "password": "hunter22"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .create_async()
        .await;

    let backend = HostedBackend::new(&server.url(), ANON_KEY).unwrap();
    let user = backend.sign_in("cat@example.com", "hunter22").await.unwrap();
    assert_eq!(user.id, "user-1");
    mock.assert_async().await;
    backend
}

#[tokio::test]
async fn sign_in_keeps_tokens_and_publishes_session() {
    let mut server = Server::new_async().await;
    let backend = signed_in(&mut server).await;

    let session = backend.session().unwrap();
    assert_eq!(session.access_token, "jwt-abc");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh-xyz"));
    assert_eq!(
        backend.subscribe().borrow().as_ref().map(|u| u.email.clone()),
        Some("cat@example.com".to_string())
    );
}

#[tokio::test]
async fn provider_error_message_is_passed_through() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/v1/token")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
        .create_async()
        .await;

    let backend = HostedBackend::new(&server.url(), ANON_KEY).unwrap();
    let err = backend.sign_in("cat@example.com", "nope").await.unwrap_err();
    assert_eq!(err, AuthError::Provider("Invalid login credentials".into()));
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert!(backend.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn sign_up_without_confirmation_signs_in() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/v1/signup")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(TOKEN_BODY)
        .create_async()
        .await;

    let backend = HostedBackend::new(&server.url(), ANON_KEY).unwrap();
    let user = backend.sign_up("cat@example.com", "hunter22").await.unwrap();
    assert_eq!(user.id, "user-1");
    assert!(backend.session().is_some());
}

#[tokio::test]
async fn sign_up_awaiting_confirmation_returns_user_only() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/v1/signup")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"user-2","email":"kit@example.com","confirmation_sent_at":"2026-10-19T09:00:00Z"}"#)
        .create_async()
        .await;

    let backend = HostedBackend::new(&server.url(), ANON_KEY).unwrap();
    let user = backend.sign_up("kit@example.com", "hunter22").await.unwrap();
    assert_eq!(user.email, "kit@example.com");
    assert!(backend.session().is_none());
}

#[tokio::test]
async fn expired_token_restores_to_signed_out() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/auth/v1/user")
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .with_body(r#"{"msg":"JWT expired"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/auth/v1/user")
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"user-1","email":"cat@example.com"}"#)
        .create_async()
        .await;

    let backend = HostedBackend::new(&server.url(), ANON_KEY).unwrap();
    assert_eq!(backend.restore("stale", None).await.unwrap(), None);
    let user = backend.restore("fresh", None).await.unwrap().unwrap();
    assert_eq!(user.id, "user-1");
    assert_eq!(backend.session().unwrap().access_token, "fresh");
}

#[tokio::test]
async fn records_are_scoped_by_user() {
    let mut server = Server::new_async().await;
    let backend = signed_in(&mut server).await;

    let list = server
        .mock("GET", "/rest/v1/notes")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("user_id".into(), "eq.user-1".into()),
            Matcher::UrlEncoded("order".into(), "created_at.asc".into()),
        ]))
        .match_header("authorization", "Bearer jwt-abc")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"id":"n1","title":"Groceries","content":"tuna","created_at":"2026-10-19T09:00:00Z","user_id":"user-1"}]"#,
        )
        .create_async()
        .await;

    let notes = backend.list_notes("user-1").await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "Groceries");
    list.assert_async().await;
}

#[tokio::test]
async fn insert_returns_stored_row() {
    let mut server = Server::new_async().await;
    let backend = signed_in(&mut server).await;
    let note = NoteDraft::new("Plan", "write tests").into_note("user-1").unwrap();
    let row = serde_json::to_string(&[&note]).unwrap();

    let insert = server
        .mock("POST", "/rest/v1/notes")
        .match_header("prefer", "return=representation")
        .match_body(Matcher::PartialJson(serde_json::json!([{ "id": note.id, "user_id": "user-1" }])))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(row)
        .create_async()
        .await;

    let stored = backend.insert_note(&note).await.unwrap();
    assert_eq!(stored, note);
    insert.assert_async().await;
}

#[tokio::test]
async fn update_of_missing_note_is_not_found() {
    let mut server = Server::new_async().await;
    let backend = signed_in(&mut server).await;
    server
        .mock("PATCH", "/rest/v1/notes")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("id".into(), "eq.gone".into()),
            Matcher::UrlEncoded("user_id".into(), "eq.user-1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;

    let patch = NotePatch {
        title: Some("New".into()),
        content: None,
    };
    let err = backend.update_note("user-1", "gone", &patch).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "note", .. }));
}

#[tokio::test]
async fn rejected_write_carries_server_message() {
    let mut server = Server::new_async().await;
    let backend = signed_in(&mut server).await;
    server
        .mock("POST", "/rest/v1/habit_logs")
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code":"42501","message":"new row violates row-level security policy"}"#)
        .create_async()
        .await;

    let entry = HabitLogEntry::for_session(
        chrono::NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        25,
    );
    let err = backend.append_habit_log("user-1", &entry).await.unwrap_err();
    match err {
        StoreError::Rejected { operation, message } => {
            assert_eq!(operation, "append habit log");
            assert_eq!(message, "new row violates row-level security policy");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn sign_out_calls_logout_and_clears_session() {
    let mut server = Server::new_async().await;
    let backend = signed_in(&mut server).await;
    let logout = server
        .mock("POST", "/auth/v1/logout")
        .match_header("authorization", "Bearer jwt-abc")
        .with_status(204)
        .create_async()
        .await;

    backend.sign_out().await.unwrap();
    logout.assert_async().await;
    assert!(backend.session().is_none());
}
