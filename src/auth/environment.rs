//! Service principal credentials from the environment.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use serde::Deserialize;

use crate::auth::{AccessToken, TokenCredential};
use crate::error::{Error, Result};

const TENANT_ID: &str = "AZURE_TENANT_ID";
const CLIENT_ID: &str = "AZURE_CLIENT_ID";
const CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth2 client-credentials grant against Microsoft Entra ID.
pub struct EnvironmentCredential {
    http: reqwest::Client,
    authority_url: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl EnvironmentCredential {
    /// Returns `None` unless all three service principal variables are set.
    pub fn from_env(http: reqwest::Client, authority_url: &str) -> Option<Self> {
        let read = |name: &str| std::env::var(name).ok().filter(|v: &String| !v.is_empty());
        Some(Self::new(
            http,
            authority_url,
            read(TENANT_ID)?,
            read(CLIENT_ID)?,
            read(CLIENT_SECRET)?,
        ))
    }

    pub fn new(
        http: reqwest::Client,
        authority_url: &str,
        tenant_id: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http,
            authority_url: authority_url.trim_end_matches('/').to_string(),
            tenant_id,
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        "EnvironmentCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_url, self.tenant_id
        );
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self.http.post(url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenError>(&body).map_or(body, |err| {
                err.error_description.unwrap_or(err.error)
            });
            return Err(Error::Api {
                status: status.as_u16(),
                code: None,
                message,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        let expires_on = TimeDelta::try_seconds(token.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                Error::InvalidResponse(format!("token lifetime out of range: {}", token.expires_in))
            })?;
        Ok(AccessToken {
            token: token.access_token,
            expires_on,
        })
    }
}
