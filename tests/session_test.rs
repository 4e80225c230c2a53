// Sign-in flow and typed resource calls against the mock backend

mod common;

use std::sync::Arc;

use common::{MockBackend, EMAIL, PASSWORD};
use coop_client::api::CoopApi;
use coop_client::auth::{
    AuthCoordinator, CoordinatorOptions, CredentialStore, Credentials, FileCredentialStore,
};
use coop_client::error::ApiError;
use coop_client::http_client::HttpTransport;
use coop_client::session::Session;

#[tokio::test]
async fn test_login_then_me_then_logout() {
    let backend = MockBackend::start().await;
    let session = Session::new(backend.coordinator(None));

    let user = session.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(user.full_name(), "Asha Rai");
    assert_eq!(
        session.coordinator().current_credentials().await,
        Some(Credentials::new("tok1").with_refresh_token("ref1"))
    );

    let me = session.current_user().await.unwrap();
    assert_eq!(me.email, EMAIL);

    session.logout().await.unwrap();
    assert!(session.coordinator().access_token().await.is_none());

    let requests = backend.state().requests();
    assert_eq!(requests[0], ("/users/login".to_string(), None));
    assert_eq!(requests[1], ("/users/me".to_string(), Some("tok1".to_string())));
    assert_eq!(
        requests[2],
        ("/users/logout".to_string(), Some("tok1".to_string()))
    );
}

#[tokio::test]
async fn test_wrong_password_is_not_a_session_expiry() {
    let backend = MockBackend::start().await;
    let session = Session::new(backend.coordinator(None));

    let err = session.login(EMAIL, "wrong").await.unwrap_err();

    assert!(matches!(err, ApiError::InvalidCredentials(_)));
    assert!(!err.is_session_expired());
    assert_eq!(backend.state().refresh_count(), 0);
}

#[tokio::test]
async fn test_session_survives_restart_through_file_store() {
    let backend = MockBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");

    let build = || {
        let transport = HttpTransport::new(&backend.url(), 4, 5, 30).unwrap();
        let store = FileCredentialStore::new(path.clone());
        let coordinator = AuthCoordinator::new(
            Arc::new(transport),
            Arc::new(store),
            CoordinatorOptions::default(),
        )
        .unwrap();
        Session::new(coordinator)
    };

    build().login(EMAIL, PASSWORD).await.unwrap();

    // Token expires while the client is not running
    backend.state().expire_token();

    let restored = build().restore().await.unwrap();
    assert_eq!(restored.map(|u| u.email).as_deref(), Some(EMAIL));
    assert_eq!(backend.state().refresh_count(), 1);

    let saved = FileCredentialStore::new(path).load().unwrap();
    assert_eq!(saved, Some(Credentials::new("tok2").with_refresh_token("ref1")));
}

#[tokio::test]
async fn test_api_calls_recover_from_expiry() {
    let backend = MockBackend::start().await;
    backend.state().expire_token();
    let api = CoopApi::new(backend.coordinator(Some(
        Credentials::new("tok1").with_refresh_token("ref1"),
    )));

    let users = api.list_users(0, 2).await.unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.is_admin()));

    let value = api.get_json("/echo/ledger").await.unwrap();
    assert_eq!(value["name"], "ledger");

    assert_eq!(backend.state().refresh_count(), 1);
    assert_eq!(backend.state().valid_token(), "tok2");
}
