use crate::{
    error::BackendError,
    models::{Principal, Role, RoleProfile},
    repository::Repository,
};
use async_trait::async_trait;
use reqwest::{RequestBuilder, header::CONTENT_RANGE};
use serde::Deserialize;
use uuid::Uuid;

/// SupabaseRestRepository
///
/// `Repository` backed by Supabase's PostgREST gateway (`/rest/v1`). Used when the
/// service runs without direct database access. Row-level policies still apply on the
/// Supabase side; this client authenticates with the project's API key.
#[derive(Clone)]
pub struct SupabaseRestRepository {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Minimal row shape for `auth.users` as exposed through the admin API.
#[derive(Deserialize)]
struct SupabaseUser {
    id: Uuid,
    email: Option<String>,
}

impl SupabaseRestRepository {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Sends `request` with the Supabase auth headers, failing on any non-2xx status.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "supabase request rejected");
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(response)
    }

    async fn get(&self, url: String, query: &[(&str, String)]) -> Result<reqwest::Response, BackendError> {
        self.send(self.client.get(url).query(query)).await
    }

    /// Exact row count for a filtered table without transferring the rows: a `HEAD`
    /// with `Prefer: count=exact`, read back from `Content-Range` (`0-4/5` or `*/0`).
    async fn count(&self, table: &str, query: &[(&str, String)]) -> Result<i64, BackendError> {
        let request = self
            .client
            .head(self.rest_url(table))
            .header("Prefer", "count=exact")
            .query(query);
        let response = self.send(request).await?;

        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        content_range
            .rsplit_once('/')
            .and_then(|(_, total)| total.parse::<i64>().ok())
            .ok_or_else(|| {
                BackendError::Decode(format!("unusable Content-Range `{}` for {}", content_range, table))
            })
    }
}

#[async_trait]
impl Repository for SupabaseRestRepository {
    /// find_role_profile
    ///
    /// `GET /rest/v1/{table}?id=eq.{id}&select=id,nombre,correo`. PostgREST answers with
    /// an array; an empty array means the principal is not in that table.
    async fn find_role_profile(
        &self,
        role: Role,
        principal_id: Uuid,
    ) -> Result<Option<RoleProfile>, BackendError> {
        let rows: Vec<RoleProfile> = self
            .get(
                self.rest_url(role.table()),
                &[
                    ("id", format!("eq.{}", principal_id)),
                    ("select", "id,nombre,correo".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?
            .json()
            .await?;

        Ok(rows.into_iter().next())
    }

    /// get_principal
    ///
    /// Uses the Auth admin endpoint; requires a service-role key. A 404 is "no such user".
    async fn get_principal(&self, principal_id: Uuid) -> Result<Option<Principal>, BackendError> {
        let url = format!("{}/auth/v1/admin/users/{}", self.base_url, principal_id);
        match self.get(url, &[]).await {
            Ok(response) => {
                let user: SupabaseUser = response.json().await?;
                Ok(Some(Principal {
                    id: user.id,
                    email: user.email,
                    expires_at: None,
                }))
            }
            Err(BackendError::Status(404)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn count_unread_notifications(&self, principal_id: Uuid) -> Result<i64, BackendError> {
        self.count(
            "notificaciones",
            &[
                ("receptor_id", format!("eq.{}", principal_id)),
                ("leido", "eq.false".to_string()),
            ],
        )
        .await
    }
}
