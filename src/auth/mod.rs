// Authentication module
// Credential storage, token refresh and the request coordinator

mod coordinator;
mod credentials;
mod queue;
mod refresh;
mod types;

pub use coordinator::{AuthCoordinator, CoordinatorOptions, DEFAULT_REFRESH_TIMEOUT};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use refresh::{refresh_access_token, DEFAULT_REFRESH_PATH};
pub use types::{token_prefix, Credentials, LoginRequest, SessionEvent, TokenResponse};
