//! Exchanges the auth provider's identity for a platform session.
//!
//! Registration with the platforms is best effort: a failed registration is
//! logged and the flow still asks for a token. Only a missing token stops
//! sign-in.

use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::{json, Value};
use thiserror::Error;

use super::model::UserId;

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

const DEFAULT_AVATAR: &str = "https://getstream.io/random_png/";
const UNKNOWN_NAME: &str = "Unknown";

/// Identity handed over by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Option<String>,
    /// Whether the platforms already know this user.
    pub registered: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub name: String,
    pub image: String,
    pub token: SecretString,
}

impl Session {
    fn new(user: &AuthUser, token: SecretString) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user
                .email
                .clone()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            image: DEFAULT_AVATAR.to_string(),
            token,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },
    #[error("no token issued for user {0}")]
    MissingToken(UserId),
}

/// Client for the app's own `/api/register-user` and `/api/token` endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: reqwest::Client,
    app_url: String,
}

impl AuthClient {
    pub fn new(client: reqwest::Client, app_url: impl Into<String>) -> Self {
        Self {
            client,
            app_url: app_url.into(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, AuthError> {
        let url = format!("{}{}", self.app_url, path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| AuthError::Http {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status { url, status });
        }
        response
            .json::<Value>()
            .await
            .map_err(|source| AuthError::Http { url, source })
    }

    pub async fn register_user(&self, user_id: &UserId, email: &str) -> Result<(), AuthError> {
        self.post(
            "/api/register-user",
            json!({ "userId": user_id.0, "email": email }),
        )
        .await?;
        tracing::info!(%user_id, "registered user with chat platform");
        Ok(())
    }

    pub async fn fetch_token(&self, user_id: &UserId) -> Result<SecretString, AuthError> {
        let body = self
            .post("/api/token", json!({ "userId": user_id.0 }))
            .await?;
        token_from_response(&body).ok_or_else(|| AuthError::MissingToken(user_id.clone()))
    }

    pub async fn sign_in(&self, user: &AuthUser) -> Result<Session, AuthError> {
        if !user.registered {
            match &user.email {
                Some(email) => {
                    if let Err(e) = self.register_user(&user.id, email).await {
                        tracing::error!(user_id = %user.id, error = %e, "error registering user");
                    }
                }
                None => tracing::error!(user_id = %user.id, "user email is missing, skipping registration"),
            }
        }

        let token = self.fetch_token(&user.id).await.map_err(|e| {
            tracing::error!(user_id = %user.id, error = %e, "could not obtain platform token");
            e
        })?;
        Ok(Session::new(user, token))
    }
}

fn token_from_response(body: &Value) -> Option<SecretString> {
    let token = body.get("token")?.as_str()?;
    if token.is_empty() {
        return None;
    }
    Some(SecretString::from(token.to_string()))
}
