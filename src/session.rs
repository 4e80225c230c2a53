// Sign-in lifecycle on top of the coordinator

use crate::auth::{token_prefix, AuthCoordinator, Credentials, LoginRequest};
use crate::error::{ApiError, Result};
use crate::models::{LoginSuccess, NewMember, User};
use crate::request::{ApiRequest, ApiResponse};

/// Sign in, sign out and identify the current user.
///
/// Sign-in and sign-out bypass credential recovery: a 401 from `/users/login` means
/// wrong email or password, not an expired token.
#[derive(Clone)]
pub struct Session {
    coordinator: AuthCoordinator,
}

impl Session {
    pub fn new(coordinator: AuthCoordinator) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &AuthCoordinator {
        &self.coordinator
    }

    /// Authenticate with email and password and store the issued tokens
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let request = ApiRequest::post("/users/login").json(&LoginRequest { email, password })?;
        let response = self.coordinator.transport().execute(&request, None).await?;

        if response.is_unauthorized() {
            tracing::warn!(email = %email, "Sign-in rejected");
            return Err(ApiError::InvalidCredentials(error_detail(&response)));
        }

        let login: LoginSuccess = response.error_for_status()?.json()?;
        let credentials = Credentials {
            access_token: login.token.access_token,
            refresh_token: login.token.refresh_token,
        };

        tracing::info!(
            email = %login.user.email,
            "Signed in (token: {})",
            token_prefix(&credentials.access_token)
        );
        self.coordinator.set_credentials(credentials).await?;

        Ok(login.user)
    }

    /// Create a member account. Does not sign in.
    pub async fn register(&self, member: &NewMember) -> Result<User> {
        let request = ApiRequest::post("/users/register").json(member)?;
        let response = self.coordinator.transport().execute(&request, None).await?;

        if !response.is_success() {
            return Err(ApiError::Http {
                status: response.status.as_u16(),
                message: error_detail(&response),
            });
        }

        response.json()
    }

    /// The signed-in user
    pub async fn current_user(&self) -> Result<User> {
        self.coordinator
            .send_json(ApiRequest::get("/users/me"))
            .await
    }

    /// Sign out. Local credentials are removed even when the backend call fails.
    pub async fn logout(&self) -> Result<()> {
        if let Some(token) = self.coordinator.access_token().await {
            let request = ApiRequest::get("/users/logout");
            match self.coordinator.transport().execute(&request, Some(token.as_str())).await {
                Ok(response) if !response.is_success() => {
                    tracing::warn!(status = %response.status, "Backend sign-out returned an error");
                }
                Err(e) => tracing::warn!("Backend sign-out failed: {}", e),
                Ok(_) => {}
            }
        }

        self.coordinator.clear_credentials().await?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// Resume a persisted session. Returns `None` when there is no usable credential.
    pub async fn restore(&self) -> Result<Option<User>> {
        if self.coordinator.access_token().await.is_none() {
            return Ok(None);
        }

        match self.current_user().await {
            Ok(user) => Ok(Some(user)),
            Err(e) if e.is_session_expired() => Ok(None),
            Err(ApiError::AuthorizationFailed(reason)) => {
                tracing::warn!("Stored session rejected: {}", reason);
                self.coordinator.clear_credentials().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// FastAPI puts the human-readable reason under `detail`
fn error_detail(response: &ApiResponse) -> String {
    serde_json::from_slice::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| response.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CoordinatorOptions, CredentialStore, MemoryCredentialStore};
    use crate::http_client::HttpTransport;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Arc;

    const USER: &str = r#"{"id":"6f1c1f1e-8f43-4d7a-9a56-0c4d3c1f0b11","email":"asha@example.com","first_name":"Asha","last_name":"Rai","access_roles":["member"]}"#;

    fn session(server: &mockito::ServerGuard, store: Arc<MemoryCredentialStore>) -> Session {
        let transport = HttpTransport::new(&server.url(), 2, 5, 5).unwrap();
        let coordinator =
            AuthCoordinator::new(Arc::new(transport), store, CoordinatorOptions::default()).unwrap();
        Session::new(coordinator)
    }

    #[tokio::test]
    async fn test_login_stores_tokens() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/users/login")
            .match_body(Matcher::Json(json!({"email": "asha@example.com", "password": "pw"})))
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(format!(
                r#"{{"token":{{"access_token":"tok1","refresh_token":"ref1","token_type":"bearer"}},"user":{}}}"#,
                USER
            ))
            .create_async()
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let session = session(&server, store.clone());
        let user = session.login("asha@example.com", "pw").await.unwrap();

        assert_eq!(user.first_name, "Asha");
        assert_eq!(
            store.load().unwrap(),
            Some(Credentials::new("tok1").with_refresh_token("ref1"))
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_rejected_does_not_refresh() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/users/login")
            .with_status(401)
            .with_body(r#"{"detail":"Invalid email or password"}"#)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let session = session(&server, store.clone());
        let err = session.login("asha@example.com", "wrong").await.unwrap_err();

        match err {
            ApiError::InvalidCredentials(detail) => assert_eq!(detail, "Invalid email or password"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(store.load().unwrap().is_none());
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_backend_fails() {
        let mut server = mockito::Server::new_async().await;
        let logout = server
            .mock("GET", "/users/logout")
            .match_header("authorization", "Bearer tok1")
            .with_status(500)
            .create_async()
            .await;

        let store = Arc::new(MemoryCredentialStore::with_credentials(Credentials::new("tok1")));
        let session = session(&server, store.clone());
        let mut events = session.coordinator().subscribe();

        session.logout().await.unwrap();

        assert!(store.load().unwrap().is_none());
        assert_eq!(
            events.recv().await.unwrap(),
            crate::auth::SessionEvent::SignedOut
        );
        logout.assert_async().await;
    }

    #[tokio::test]
    async fn test_register_surfaces_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/users/register")
            .with_status(400)
            .with_body(r#"{"detail":"A user with this email already exists."}"#)
            .create_async()
            .await;

        let session = session(&server, Arc::new(MemoryCredentialStore::new()));
        let member = NewMember {
            email: "asha@example.com".to_string(),
            password: "longenough".to_string(),
            first_name: "Asha".to_string(),
            middle_name: None,
            last_name: "Rai".to_string(),
            phone: "9800000000".to_string(),
        };

        match session.register(&member).await.unwrap_err() {
            ApiError::Http { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "A user with this email already exists.");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_restore_without_credentials() {
        let server = mockito::Server::new_async().await;
        let session = session(&server, Arc::new(MemoryCredentialStore::new()));
        assert!(session.restore().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_with_expired_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/me")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .create_async()
            .await;

        let store = Arc::new(MemoryCredentialStore::with_credentials(Credentials::new("tok1")));
        let session = session(&server, store.clone());

        assert!(session.restore().await.unwrap().is_none());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_error_detail_falls_back_to_body() {
        let response = ApiResponse::new(reqwest::StatusCode::BAD_REQUEST, "plain failure");
        assert_eq!(error_detail(&response), "plain failure");
    }
}
