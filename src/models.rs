use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{borrow::Cow, fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity ---

/// Principal
///
/// The authenticated identity supplied by Supabase Auth (`auth.users`). The portal never
/// creates or mutates it; it only reads it from the session token or, in local
/// development, from the users table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Principal {
    pub id: Uuid,
    pub email: Option<String>,
    // Only known when the principal came from a session token.
    #[sqlx(default)]
    #[ts(type = "string | null")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: Some(email.into()),
            expires_at: None,
        }
    }
}

/// Role
///
/// The closed set of portal roles. A principal's role is signalled only by which
/// profile table holds a row with its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub enum Role {
    #[serde(rename = "estudiante")]
    Student,
    #[serde(rename = "consejero")]
    Advisor,
    #[serde(rename = "coordinador")]
    Coordinator,
}

impl Role {
    /// Resolution priority. When a principal appears in more than one profile table
    /// the earliest role here wins.
    pub const PRIORITY: [Role; 3] = [Role::Student, Role::Advisor, Role::Coordinator];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "estudiante",
            Role::Advisor => "consejero",
            Role::Coordinator => "coordinador",
        }
    }

    /// The profile table whose rows grant this role.
    pub fn table(self) -> &'static str {
        match self {
            Role::Student => "alumnos",
            Role::Advisor => "consejeros",
            Role::Coordinator => "coordinadores",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown role `{0}`")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "estudiante" => Ok(Role::Student),
            "consejero" => Ok(Role::Advisor),
            "coordinador" => Ok(Role::Coordinator),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// RoleProfile
///
/// A row from one of the three profile tables (`alumnos`, `consejeros`, `coordinadores`).
/// Its presence is what grants the role; the guard only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct RoleProfile {
    pub id: Uuid,
    pub nombre: Option<String>,
    pub correo: Option<String>,
}

// --- Guard Output ---

/// GuardDecision
///
/// The per-navigation outcome handed to UI shells. `role` is only populated when access
/// is granted so a denial never reveals whether the principal holds some other role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GuardDecision {
    pub authorized: bool,
    pub role: Option<Role>,
}

impl GuardDecision {
    pub fn granted(role: Role) -> Self {
        Self {
            authorized: true,
            role: Some(role),
        }
    }

    pub fn denied() -> Self {
        Self {
            authorized: false,
            role: None,
        }
    }
}

// --- Navigation ---

/// NavEntry
///
/// One item of a role's navigation menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavEntry {
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub label: Cow<'static, str>,
    #[ts(type = "string")]
    #[schema(value_type = String)]
    pub path: Cow<'static, str>,
}

impl NavEntry {
    pub const fn new(label: &'static str, path: &'static str) -> Self {
        Self {
            label: Cow::Borrowed(label),
            path: Cow::Borrowed(path),
        }
    }
}

/// NavView
///
/// Everything a navbar needs, derived from `(Principal, Role)` in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavView {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub entries: Vec<NavEntry>,
    pub home: Option<String>,
    // Badge count for the notifications entry.
    pub unread_notifications: i64,
}

// --- Responses & Requests ---

/// MeResponse
///
/// Session summary for the signed-in principal, including where to land after login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub home: Option<String>,
    #[ts(type = "string | null")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// ScopeLanding
///
/// Landing data for a role-scoped layout: the caller's profile row and its menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ScopeLanding {
    pub role: Role,
    pub profile: Option<RoleProfile>,
    pub nav: Vec<NavEntry>,
}

/// AccessCheckRequest
///
/// Input for `POST /access/check`: the roles a client-side route accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AccessCheckRequest {
    pub allowed_roles: Vec<Role>,
}
