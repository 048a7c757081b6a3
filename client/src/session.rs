//! Identity and role lookup.
//!
//! The remote access policy is enforced server-side; the client consults
//! the identity lookup before attempting writes so that admin-gated
//! tables are skipped, not failed, for non-admin sessions.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Role carried by the current identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Member,
}

/// The signed-in identity, as far as the sync client cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Source of the current identity. Consulted once per sync cycle.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The current identity, or `None` when unauthenticated.
    async fn current(&self) -> Option<Identity>;
}

/// Fixed identity, used by tests and offline tooling.
#[derive(Debug, Clone)]
pub struct FixedIdentity(pub Option<Identity>);

#[async_trait]
impl IdentityProvider for FixedIdentity {
    async fn current(&self) -> Option<Identity> {
        self.0.clone()
    }
}

/// Identity lookup against the hosted auth endpoint.
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    app_metadata: AppMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    role: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(base_url: &str, api_key: &str, access_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token,
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn current(&self) -> Option<Identity> {
        let token = self.access_token.as_ref()?;
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "identity lookup rejected");
            return None;
        }

        let user: UserResponse = response.json().await.ok()?;
        let role = match user.app_metadata.role.as_deref() {
            Some("admin") => Role::Admin,
            _ => Role::Member,
        };

        Some(Identity {
            user_id: user.id,
            role,
        })
    }
}
