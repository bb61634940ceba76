use crate::{
    error::BackendError,
    models::{Principal, Role, RoleProfile},
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use uuid::Uuid;

/// Repository Trait
///
/// The boundary to the identity & data backend. Every lookup distinguishes "row absent"
/// (`Ok(None)`) from "backend failed" (`Err`), which the resolver relies on to keep a
/// degraded backend from looking like a principal without a role.
///
/// **Send + Sync + async_trait** make `Arc<dyn Repository>` shareable across Axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Role Profiles ---
    // Point lookup by primary key in the profile table backing `role`.
    async fn find_role_profile(
        &self,
        role: Role,
        principal_id: Uuid,
    ) -> Result<Option<RoleProfile>, BackendError>;

    // --- Identity ---
    // Reads the auth users table. Only the local development bypass needs it.
    async fn get_principal(&self, principal_id: Uuid) -> Result<Option<Principal>, BackendError>;

    // --- Notifications ---
    // Unread count for the nav badge.
    async fn count_unread_notifications(&self, principal_id: Uuid) -> Result<i64, BackendError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// Reads the Supabase Postgres database directly over a `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// find_role_profile
    ///
    /// The table name comes from the closed `Role` enum, never from input, so it is
    /// interpolated; the id is bound.
    async fn find_role_profile(
        &self,
        role: Role,
        principal_id: Uuid,
    ) -> Result<Option<RoleProfile>, BackendError> {
        let sql = format!(
            "SELECT id, nombre, correo FROM {} WHERE id = $1",
            role.table()
        );

        sqlx::query_as::<_, RoleProfile>(&sql)
            .bind(principal_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(table = role.table(), "find_role_profile error: {:?}", e);
                BackendError::from(e)
            })
    }

    async fn get_principal(&self, principal_id: Uuid) -> Result<Option<Principal>, BackendError> {
        sqlx::query_as::<_, Principal>("SELECT id, email FROM auth.users WHERE id = $1")
            .bind(principal_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("get_principal error: {:?}", e);
                BackendError::from(e)
            })
    }

    async fn count_unread_notifications(&self, principal_id: Uuid) -> Result<i64, BackendError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notificaciones WHERE receptor_id = $1 AND leido = false",
        )
        .bind(principal_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("count_unread_notifications error: {:?}", e);
            BackendError::from(e)
        })
    }
}

/// InMemoryRepository
///
/// A seeded, in-process `Repository` for tests and local demos. Failures can be injected
/// per role table, and an artificial delay makes in-flight resolution observable.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    profiles: HashMap<(Role, Uuid), RoleProfile>,
    principals: HashMap<Uuid, Principal>,
    unread: HashMap<Uuid, i64>,
    failing_roles: HashSet<Role>,
    fail_principals: bool,
    fail_notifications: bool,
    delay: Option<Duration>,
    // Shared between clones so tests can count calls made through an `Arc<dyn Repository>`.
    profile_lookups: Arc<AtomicUsize>,
    principal_lookups: Arc<AtomicUsize>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `role` to `principal_id` by inserting a profile row.
    pub fn with_profile(mut self, role: Role, principal_id: Uuid, nombre: &str) -> Self {
        self.profiles.insert(
            (role, principal_id),
            RoleProfile {
                id: principal_id,
                nombre: Some(nombre.to_string()),
                correo: None,
            },
        );
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.insert(principal.id, principal);
        self
    }

    pub fn with_unread(mut self, principal_id: Uuid, count: i64) -> Self {
        self.unread.insert(principal_id, count);
        self
    }

    /// Every lookup against `role`'s table fails with a transport error.
    pub fn failing_role(mut self, role: Role) -> Self {
        self.failing_roles.insert(role);
        self
    }

    pub fn failing_principals(mut self) -> Self {
        self.fail_principals = true;
        self
    }

    pub fn failing_notifications(mut self) -> Self {
        self.fail_notifications = true;
        self
    }

    /// Each profile lookup sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `find_role_profile` calls served so far.
    pub fn profile_lookups(&self) -> usize {
        self.profile_lookups.load(Ordering::SeqCst)
    }

    /// Number of `get_principal` calls served so far.
    pub fn principal_lookups(&self) -> usize {
        self.principal_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_role_profile(
        &self,
        role: Role,
        principal_id: Uuid,
    ) -> Result<Option<RoleProfile>, BackendError> {
        self.profile_lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_roles.contains(&role) {
            return Err(BackendError::Transport(format!(
                "simulated failure reading {}",
                role.table()
            )));
        }
        Ok(self.profiles.get(&(role, principal_id)).cloned())
    }

    async fn get_principal(&self, principal_id: Uuid) -> Result<Option<Principal>, BackendError> {
        self.principal_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_principals {
            return Err(BackendError::Transport(
                "simulated failure reading auth.users".to_string(),
            ));
        }
        Ok(self.principals.get(&principal_id).cloned())
    }

    async fn count_unread_notifications(&self, principal_id: Uuid) -> Result<i64, BackendError> {
        if self.fail_notifications {
            return Err(BackendError::Transport(
                "simulated failure reading notificaciones".to_string(),
            ));
        }
        Ok(self.unread.get(&principal_id).copied().unwrap_or(0))
    }
}
