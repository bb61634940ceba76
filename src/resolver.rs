use crate::{
    error::BackendError,
    models::{Role, RoleProfile},
    repository::RepositoryState,
};
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

/// LookupMode
///
/// How the three profile probes are issued. Both modes honour `Role::PRIORITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupMode {
    /// One probe at a time, stopping at the first match (usually a single round trip).
    #[default]
    Sequential,
    /// All three probes at once; worst case is one round trip instead of three.
    Concurrent,
}

impl FromStr for LookupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(LookupMode::Sequential),
            "concurrent" => Ok(LookupMode::Concurrent),
            other => Err(format!("unknown lookup mode `{}`", other)),
        }
    }
}

/// RoleResolver
///
/// Answers "which role does this principal hold?" by probing the profile tables.
/// Read-only and uncached: every call asks the backend again.
#[derive(Clone)]
pub struct RoleResolver {
    repo: RepositoryState,
    mode: LookupMode,
}

impl RoleResolver {
    pub fn new(repo: RepositoryState, mode: LookupMode) -> Self {
        Self { repo, mode }
    }

    pub fn mode(&self) -> LookupMode {
        self.mode
    }

    /// resolve
    ///
    /// `Ok(Some(role))` for the highest-priority table holding `principal_id`, `Ok(None)`
    /// when every probe answered "not found".
    ///
    /// A failed probe is logged and skipped, so a lower-priority match is still returned.
    /// When nothing matches and some probe failed, the failure is returned instead of
    /// `Ok(None)`: the principal may well hold a role we could not see.
    pub async fn resolve(&self, principal_id: Uuid) -> Result<Option<Role>, BackendError> {
        let found = self.resolve_profile(principal_id).await?;
        Ok(found.map(|(role, _)| role))
    }

    /// Same as `resolve`, also returning the matching profile row.
    pub async fn resolve_profile(
        &self,
        principal_id: Uuid,
    ) -> Result<Option<(Role, RoleProfile)>, BackendError> {
        let outcomes = match self.mode {
            LookupMode::Sequential => self.probe_sequential(principal_id).await,
            LookupMode::Concurrent => self.probe_concurrent(principal_id).await,
        };

        // Walk every outcome so each failure is logged, even behind a higher-priority match.
        let mut found = None;
        let mut failure = None;
        for (role, outcome) in outcomes {
            match outcome {
                Ok(Some(profile)) => {
                    if found.is_none() {
                        found = Some((role, profile));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        principal_id = %principal_id,
                        table = role.table(),
                        error = %e,
                        "role probe failed; treating as not found"
                    );
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
            }
        }

        match (found, failure) {
            (Some((role, profile)), _) => {
                tracing::debug!(principal_id = %principal_id, role = %role, "role resolved");
                Ok(Some((role, profile)))
            }
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }

    async fn probe_sequential(
        &self,
        principal_id: Uuid,
    ) -> Vec<(Role, Result<Option<RoleProfile>, BackendError>)> {
        let mut outcomes = Vec::with_capacity(Role::PRIORITY.len());
        for role in Role::PRIORITY {
            let outcome = self.repo.find_role_profile(role, principal_id).await;
            let matched = matches!(outcome, Ok(Some(_)));
            outcomes.push((role, outcome));
            if matched {
                break;
            }
        }
        outcomes
    }

    async fn probe_concurrent(
        &self,
        principal_id: Uuid,
    ) -> Vec<(Role, Result<Option<RoleProfile>, BackendError>)> {
        let [first, second, third] = Role::PRIORITY;
        let (a, b, c) = tokio::join!(
            self.repo.find_role_profile(first, principal_id),
            self.repo.find_role_profile(second, principal_id),
            self.repo.find_role_profile(third, principal_id),
        );
        vec![(first, a), (second, b), (third, c)]
    }
}
