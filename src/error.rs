use thiserror::Error;
use uuid::Uuid;

use crate::models::Role;

/// BackendError
///
/// A transport-level failure talking to the identity & data backend.
/// "Row not found" is never an error: lookups return `Ok(None)` for that.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("backend responded with status {0}")]
    Status(u16),

    #[error("malformed backend response: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for BackendError {
    fn from(e: sqlx::Error) -> Self {
        BackendError::Database(e.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            BackendError::Status(status.as_u16())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// AccessError
///
/// Why a guarded navigation was denied. All kinds render identically (a redirect to the
/// public fallback route); they only differ in what gets logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("no authenticated principal")]
    Unauthenticated,

    #[error("principal {principal_id} has no recognized role")]
    NoRecognizedRole { principal_id: Uuid },

    #[error("principal {principal_id} has role {role} which is not allowed here")]
    RoleMismatch { principal_id: Uuid, role: Role },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[from] BackendError),

    #[error("session changed while resolving role for {principal_id}")]
    StaleSession { principal_id: Uuid },
}

impl AccessError {
    /// Short, stable label used as the `denial` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AccessError::Unauthenticated => "unauthenticated",
            AccessError::NoRecognizedRole { .. } => "no_recognized_role",
            AccessError::RoleMismatch { .. } => "role_mismatch",
            AccessError::BackendUnavailable(_) => "backend_unavailable",
            AccessError::StaleSession { .. } => "stale_session",
        }
    }

    /// Emits the denial to the log sink. `NoRecognizedRole` is a provisioning gap and
    /// `BackendUnavailable` a degraded backend, so they get their own levels.
    pub fn log(&self) {
        match self {
            AccessError::Unauthenticated => {
                tracing::debug!(denial = self.kind(), "guard denied: {}", self)
            }
            AccessError::NoRecognizedRole { principal_id } => tracing::warn!(
                denial = self.kind(),
                principal_id = %principal_id,
                "guard denied: principal has no role profile (provisioning gap)"
            ),
            AccessError::RoleMismatch { principal_id, role } => tracing::info!(
                denial = self.kind(),
                principal_id = %principal_id,
                role = %role,
                "guard denied: role not allowed for this route"
            ),
            AccessError::BackendUnavailable(e) => {
                tracing::error!(denial = self.kind(), error = %e, "guard denied: {}", self)
            }
            AccessError::StaleSession { principal_id } => tracing::info!(
                denial = self.kind(),
                principal_id = %principal_id,
                "guard denied: discarded resolution for a superseded session"
            ),
        }
    }
}
