//! ops-erp
//!
//! The authenticated HTTPS client for the ERP upsert endpoint, and the
//! `ErpApi` seam the dispatcher routes through so tests can substitute a
//! scripted adapter.

mod client;
mod sign;

pub use client::UpsertClient;
pub use sign::{authorization_header, signature_base_string, OauthCredentials};

use ops_schemas::{ErpEnvironment, ErpUpsertPayload, ErpUpsertResponse};

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

/// How the retry engine should treat a failed upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network-shaped: worth retrying under backoff.
    Transient,
    /// The ERP understood the request and said no. Retry policy is
    /// per-installation (`sync.retry_semantic_rejections`).
    Semantic,
    /// Will never succeed without operator action (missing endpoint or
    /// credentials).
    Permanent,
}

/// Upsert failure surface.
#[derive(Debug, Clone)]
pub enum UpsertError {
    /// Connect / TLS / timeout talking to the ERP.
    Transport(String),
    /// Non-2xx HTTP response.
    Http { status: u16, body: String },
    /// 2xx response whose body carried `success = false` (or an error field).
    Semantic { message: String },
    MissingEndpoint(ErpEnvironment),
    MissingCredentials,
}

impl UpsertError {
    pub fn class(&self) -> FailureClass {
        match self {
            UpsertError::Transport(_) => FailureClass::Transient,
            // 5xx is the ERP having a bad day; 4xx is a rejection.
            UpsertError::Http { status, .. } if *status >= 500 => FailureClass::Transient,
            UpsertError::Http { .. } => FailureClass::Semantic,
            UpsertError::Semantic { .. } => FailureClass::Semantic,
            UpsertError::MissingEndpoint(_) | UpsertError::MissingCredentials => {
                FailureClass::Permanent
            }
        }
    }
}

impl std::fmt::Display for UpsertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsertError::Transport(msg) => write!(f, "erp transport failure: {msg}"),
            UpsertError::Http { status, body } => {
                write!(f, "erp http {status}: {body}")
            }
            UpsertError::Semantic { message } => write!(f, "erp rejected upsert: {message}"),
            UpsertError::MissingEndpoint(env) => {
                write!(f, "no upsert url configured for environment {}", env.as_str())
            }
            UpsertError::MissingCredentials => write!(f, "erp credentials not configured"),
        }
    }
}

impl std::error::Error for UpsertError {}

// ---------------------------------------------------------------------------
// ErpApi
// ---------------------------------------------------------------------------

/// The single seam through which all outbound upsert traffic flows.
///
/// Implemented by [`UpsertClient`] for production and by the testkit's
/// scripted fake for scenario tests. Declared with an explicit `Send`
/// future so generic callers can run inside spawned tasks; implementations
/// still write plain `async fn`.
pub trait ErpApi {
    fn upsert(
        &self,
        payload: &ErpUpsertPayload,
        env_override: Option<ErpEnvironment>,
    ) -> impl std::future::Future<Output = Result<ErpUpsertResponse, UpsertError>> + Send;
}

/// Shared adapters work too (tests keep a handle on their scripted fake).
impl<T: ErpApi + Sync + Send> ErpApi for std::sync::Arc<T> {
    async fn upsert(
        &self,
        payload: &ErpUpsertPayload,
        env_override: Option<ErpEnvironment>,
    ) -> Result<ErpUpsertResponse, UpsertError> {
        (**self).upsert(payload, env_override).await
    }
}
