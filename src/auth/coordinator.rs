use anyhow::Context;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use futures::future;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use super::credentials::{CredentialStore, FileCredentialStore};
use super::queue::{PendingQueue, PendingRequest, RefreshFailure, Resumption};
use super::refresh::{self, DEFAULT_REFRESH_PATH};
use super::types::{token_prefix, Credentials, SessionEvent};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::http_client::{HttpTransport, ResponseFuture, Transport};
use crate::request::{ApiRequest, ApiResponse, Attempt};

/// Upper bound on a single refresh call
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Path of the refresh endpoint relative to the base URL
    pub refresh_path: String,

    /// After this long every request waiting on the refresh fails with `RefreshTimeout`
    pub refresh_timeout: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

/// Credential plus refresh state, guarded together so a refresh outcome is published
/// atomically with the queue drain
struct SessionState {
    credentials: Option<Credentials>,
    /// Bumped on sign-in and sign-out; a refresh started under an older generation
    /// must not publish its result
    generation: u64,
    refresh_in_flight: bool,
    queue: PendingQueue,
}

struct Inner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    state: Mutex<SessionState>,
    options: CoordinatorOptions,
    events: broadcast::Sender<SessionEvent>,
    next_id: AtomicU64,
}

/// Authenticated request coordinator
///
/// Attaches the current bearer credential to every request. A request rejected with 401
/// is retried once after a credential refresh; concurrent 401s share a single refresh and
/// are resumed in arrival order. A failed refresh clears the credential and every waiting
/// request fails with `ReauthenticationRequired`.
///
/// Cloning is cheap and clones share state. Independent instances share nothing.
#[derive(Clone)]
pub struct AuthCoordinator {
    inner: Arc<Inner>,
}

impl AuthCoordinator {
    /// Create a coordinator, loading any persisted credential from `store`
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        options: CoordinatorOptions,
    ) -> anyhow::Result<Self> {
        let credentials = store.load().context("Failed to load stored credentials")?;

        match &credentials {
            Some(creds) => tracing::info!(
                "Loaded stored credentials (token: {})",
                token_prefix(&creds.access_token)
            ),
            None => tracing::info!("No stored credentials, requests are sent unauthenticated"),
        }

        let (events, _) = broadcast::channel(16);

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                store,
                state: Mutex::new(SessionState {
                    credentials,
                    generation: 0,
                    refresh_in_flight: false,
                    queue: PendingQueue::new(),
                }),
                options,
                events,
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Build the HTTP transport and file-backed store described by `config`
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(
            &config.api_base,
            config.http_max_connections,
            config.http_connect_timeout,
            config.http_request_timeout,
        )?;
        let store = FileCredentialStore::new(config.credentials_file.clone());

        Self::new(
            Arc::new(transport),
            Arc::new(store),
            CoordinatorOptions {
                refresh_path: config.refresh_path.clone(),
                refresh_timeout: Duration::from_secs(config.refresh_timeout),
            },
        )
    }

    /// Send a request with the current credential attached.
    ///
    /// Any response other than 401 is returned unchanged, including error statuses.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.send_inner(request, None).await
    }

    /// Like [`send`](Self::send), but gives up with `ApiError::Cancelled` once `cancel`
    /// fires. A cancelled request waiting on a refresh is removed from the queue.
    pub async fn send_with_cancel(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse> {
        self.send_inner(request, Some(cancel)).await
    }

    /// Send and decode a JSON body, mapping non-success statuses to `ApiError::Http`
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.error_for_status()?.json()
    }

    async fn send_inner(
        &self,
        request: ApiRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<ApiResponse> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let bearer = self.access_token().await;

        let mut attempt = Attempt::First;
        let mut dispatched = self.inner.transport.execute(&request, bearer.as_deref());

        loop {
            let response = with_cancel(dispatched, cancel).await??;

            if !response.is_unauthorized() {
                return Ok(response);
            }

            match attempt {
                Attempt::Retry => {
                    tracing::error!(
                        request_id = id,
                        method = %request.method,
                        path = %request.path,
                        "Request rejected with 401 after credential refresh"
                    );
                    return Err(ApiError::AuthorizationFailed(format!(
                        "{} {} rejected with refreshed credential: {}",
                        request.method,
                        request.path,
                        response.text()
                    )));
                }
                Attempt::First => {
                    tracing::warn!(
                        request_id = id,
                        method = %request.method,
                        path = %request.path,
                        "Received 401, recovering credential"
                    );
                    attempt = Attempt::Retry;
                    dispatched = self
                        .acquire_retry(id, &request, bearer.as_deref(), cancel)
                        .await?;
                }
            }
        }
    }

    /// Obtain the retry of a request that failed with 401, starting a refresh or joining
    /// the one in flight
    async fn acquire_retry(
        &self,
        id: u64,
        request: &ApiRequest,
        used: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResponseFuture> {
        let mut receiver = {
            let mut state = self.inner.state.lock().await;

            if state.refresh_in_flight {
                tracing::debug!(
                    request_id = id,
                    queued = state.queue.len(),
                    "Refresh in flight, queueing request"
                );
            } else {
                let current = state.credentials.as_ref().map(|c| c.access_token.clone());
                match (current, used) {
                    // A refresh finished after this request went out with the old token
                    (Some(current), used) if used != Some(current.as_str()) => {
                        tracing::debug!(
                            request_id = id,
                            "Credential already rotated, retrying without refresh"
                        );
                        return Ok(self.inner.transport.execute(request, Some(current.as_str())));
                    }
                    (None, Some(_)) => {
                        return Err(ApiError::ReauthenticationRequired(
                            "stored credentials were cleared".to_string(),
                        ));
                    }
                    _ => {
                        state.refresh_in_flight = true;
                        let refresh_token = state
                            .credentials
                            .as_ref()
                            .and_then(|c| c.refresh_token.clone());
                        tracing::info!(request_id = id, "Starting credential refresh");
                        // Detached: dropping the initiator must not strand the queue
                        tokio::spawn(self.clone().run_refresh(refresh_token, state.generation));
                    }
                }
            }

            let (tx, rx) = oneshot::channel();
            state.queue.push(PendingRequest {
                id,
                request: request.clone(),
                resume: tx,
            });
            rx
        };

        let resumption = match cancel {
            None => receiver.await,
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    let withdrawn = self.inner.state.lock().await.queue.remove(id);
                    tracing::debug!(request_id = id, withdrawn, "Queued request cancelled");
                    return Err(ApiError::Cancelled);
                }
                resumed = &mut receiver => resumed,
            },
        };

        match resumption {
            Ok(Resumption::Retried(result)) => Ok(Box::pin(future::ready(result))),
            Ok(Resumption::Abandoned(failure)) => Err(failure.into()),
            Err(_) => Err(ApiError::Internal(anyhow::anyhow!(
                "Refresh task ended without resuming request {}",
                id
            ))),
        }
    }

    /// Perform the refresh and resume the queue with its outcome
    async fn run_refresh(self, refresh_token: Option<String>, generation: u64) {
        let timeout = self.inner.options.refresh_timeout;
        let refresh = refresh::refresh_access_token(
            self.inner.transport.as_ref(),
            &self.inner.options.refresh_path,
            refresh_token.as_deref(),
        );

        let outcome = match tokio::time::timeout(timeout, refresh).await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(e)) => {
                tracing::error!("Token refresh failed: {:#}", e);
                Err(RefreshFailure::Rejected(format!("{:#}", e)))
            }
            Err(_) => {
                tracing::error!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Token refresh timed out"
                );
                Err(RefreshFailure::TimedOut(timeout))
            }
        };

        let (pending, resumed_with) = {
            let mut state = self.inner.state.lock().await;
            state.refresh_in_flight = false;
            let pending = state.queue.take_all();

            let resumed_with = if state.generation != generation {
                // Signed in or out while refreshing: the refresh belongs to the old session
                tracing::info!("Credentials replaced during refresh, discarding its result");
                match &state.credentials {
                    Some(current) => Ok(current.access_token.clone()),
                    None => Err(RefreshFailure::Rejected(
                        "signed out while refreshing".to_string(),
                    )),
                }
            } else {
                match outcome {
                    Ok(token) => {
                        let credentials = Credentials {
                            access_token: token.access_token,
                            refresh_token: token.refresh_token.or(refresh_token),
                        };
                        if let Err(e) = self.inner.store.save(&credentials) {
                            tracing::warn!("Failed to persist refreshed credentials: {:#}", e);
                        }
                        let access_token = credentials.access_token.clone();
                        state.credentials = Some(credentials);
                        let _ = self.inner.events.send(SessionEvent::Refreshed);
                        Ok(access_token)
                    }
                    Err(failure) => {
                        state.credentials = None;
                        if let Err(e) = self.inner.store.clear() {
                            tracing::warn!("Failed to remove stored credentials: {:#}", e);
                        }
                        let _ = self.inner.events.send(SessionEvent::Expired);
                        Err(failure)
                    }
                }
            };

            (pending, resumed_with)
        };

        match resumed_with {
            Ok(token) => self.resume_queue(pending, &token).await,
            Err(failure) => {
                tracing::warn!(
                    queued = pending.len(),
                    "Rejecting queued requests, re-authentication required"
                );
                for waiting in pending {
                    let _ = waiting
                        .resume
                        .send(Resumption::Abandoned(failure.clone()));
                }
            }
        }
    }

    /// Send the queued retries one at a time, oldest first. Each retry is sent only after
    /// the previous one has been answered, so the backend receives them in queue order.
    async fn resume_queue(&self, pending: VecDeque<PendingRequest>, token: &str) {
        tracing::info!(
            queued = pending.len(),
            "Resuming queued requests with refreshed credential"
        );

        for mut waiting in pending {
            if waiting.is_abandoned() {
                tracing::debug!(request_id = waiting.id, "Skipping abandoned request");
                continue;
            }
            tracing::debug!(
                request_id = waiting.id,
                path = %waiting.request.path,
                "Dispatching retry"
            );

            let retry = self.inner.transport.execute(&waiting.request, Some(token));
            let result = tokio::select! {
                biased;
                _ = waiting.resume.closed() => {
                    tracing::debug!(request_id = waiting.id, "Request abandoned during retry");
                    continue;
                }
                result = retry => result,
            };
            let _ = waiting.resume.send(Resumption::Retried(result));
        }
    }

    /// Current access token, if signed in
    pub async fn access_token(&self) -> Option<String> {
        let state = self.inner.state.lock().await;
        state.credentials.as_ref().map(|c| c.access_token.clone())
    }

    pub async fn current_credentials(&self) -> Option<Credentials> {
        self.inner.state.lock().await.credentials.clone()
    }

    /// Replace the credential after a successful sign-in. A refresh still in flight for
    /// the previous credential is discarded when it completes.
    pub async fn set_credentials(&self, credentials: Credentials) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        self.inner
            .store
            .save(&credentials)
            .context("Failed to persist credentials")?;
        tracing::debug!(
            "Credentials updated (token: {})",
            token_prefix(&credentials.access_token)
        );
        state.credentials = Some(credentials);
        state.generation += 1;
        Ok(())
    }

    /// Remove the credential on explicit sign-out
    pub async fn clear_credentials(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        state.credentials = None;
        state.generation += 1;
        self.inner
            .store
            .clear()
            .context("Failed to remove stored credentials")?;
        let _ = self.inner.events.send(SessionEvent::SignedOut);
        Ok(())
    }

    pub async fn refresh_in_flight(&self) -> bool {
        self.inner.state.lock().await.refresh_in_flight
    }

    /// Ids of requests waiting on the in-flight refresh, in the order they will be retried
    pub async fn pending_requests(&self) -> Vec<u64> {
        self.inner.state.lock().await.queue.ids()
    }

    /// Session lifecycle notifications (refreshed, expired, signed out)
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Raw transport, for calls that must bypass credential recovery (sign-in)
    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }
}

async fn with_cancel<F, T>(future: F, cancel: Option<&CancellationToken>) -> Result<T>
where
    F: Future<Output = T>,
{
    match cancel {
        None => Ok(future.await),
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(ApiError::Cancelled),
            output = future => Ok(output),
        },
    }
}
