// Token refresh call

use anyhow::{Context, Result};

use super::types::TokenResponse;
use crate::http_client::Transport;
use crate::request::ApiRequest;

/// Default path of the refresh endpoint
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Build the refresh request. It never carries a bearer; the refresh token, when held,
/// travels as the `token` query parameter and a cookie may be used by the deployment.
pub fn refresh_request(path: &str, refresh_token: Option<&str>) -> ApiRequest {
    let request = ApiRequest::post(path);
    match refresh_token {
        Some(token) => request.query("token", token),
        None => request,
    }
}

/// Exchange the current refresh credential for a new access token.
///
/// Any transport failure, non-2xx status or malformed body is an error. Callers treat
/// every error as terminal for the session; nothing here retries.
pub async fn refresh_access_token(
    transport: &dyn Transport,
    path: &str,
    refresh_token: Option<&str>,
) -> Result<TokenResponse> {
    tracing::info!("Refreshing access token via {}...", path);

    let response = transport
        .execute(&refresh_request(path, refresh_token), None)
        .await
        .context("Failed to send refresh request")?;

    let status = response.status;
    if !status.is_success() {
        let error_text = response.text();
        tracing::error!(
            status = status.as_u16(),
            body = %error_text,
            "Token refresh rejected"
        );
        anyhow::bail!("Token refresh failed: {} - {}", status, error_text);
    }

    let data: TokenResponse = serde_json::from_slice(&response.body)
        .context("Failed to parse refresh response")?;

    if data.access_token.is_empty() {
        anyhow::bail!("Refresh response does not contain access_token");
    }

    tracing::info!("Access token refreshed");

    Ok(data)
}
