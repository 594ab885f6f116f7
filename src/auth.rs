use crate::errors::AuthError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// An authenticated user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: String,
}

/// Passwordless sign-in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Emails a one-time sign-in link to `email`.
    async fn send_sign_in_link(&self, email: &str) -> Result<(), AuthError>;

    /// Exchanges the access token delivered by the link for a session.
    async fn resolve_session(&self, access_token: &str) -> Result<Session, AuthError>;
}

pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(email.to_string())
        }
        _ => Err(AuthError::InvalidEmail),
    }
}

/// Hosted auth endpoints (`/auth/v1`).
pub struct RestIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    redirect_to: Option<String>,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
    email: Option<String>,
}

impl RestIdentityProvider {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: &str,
        redirect_to: Option<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            redirect_to,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn send_sign_in_link(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email)?;
        let mut request = self
            .http
            .post(format!("{}/auth/v1/otp", self.base_url))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "create_user": true }));
        if let Some(redirect_to) = &self.redirect_to {
            request = request.query(&[("redirect_to", redirect_to.as_str())]);
        }
        Self::check(request.send().await?).await?;
        info!("sign-in link sent");
        Ok(())
    }

    async fn resolve_session(&self, access_token: &str) -> Result<Session, AuthError> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let user: UserResponse = Self::check(response).await?.json().await?;
        Ok(Session {
            user_id: user.id,
            email: user.email,
            access_token: access_token.to_string(),
        })
    }
}
