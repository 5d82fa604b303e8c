//! Managed identity credentials.
//!
//! Uses the `IDENTITY_ENDPOINT`/`IDENTITY_HEADER` pair when the host provides
//! one (App Service, Functions, Azure ML compute), otherwise the instance
//! metadata service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::{AccessToken, TokenCredential, scope_to_resource};
use crate::error::{Error, Result};

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const IDENTITY_API_VERSION: &str = "2019-08-01";
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    Imds { endpoint: String },
    AppService { endpoint: String, header: String },
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds since the epoch, usually as a string.
    expires_on: serde_json::Value,
}

pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    source: IdentitySource,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn from_env() -> Result<Self> {
        let read = |name: &str| std::env::var(name).ok().filter(|v: &String| !v.is_empty());
        let source = match (read("IDENTITY_ENDPOINT"), read("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => IdentitySource::AppService { endpoint, header },
            _ => IdentitySource::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            },
        };
        Self::new(source, read("AZURE_CLIENT_ID"))
    }

    pub fn new(source: IdentitySource, client_id: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(PROBE_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            source,
            client_id,
        })
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "ManagedIdentityCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let resource = scope_to_resource(scope);
        let mut query = vec![("resource", resource)];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let request = match &self.source {
            IdentitySource::Imds { endpoint } => {
                query.push(("api-version", IMDS_API_VERSION));
                self.http
                    .get(endpoint)
                    .header("Metadata", "true")
                    .timeout(PROBE_TIMEOUT)
            }
            IdentitySource::AppService { endpoint, header } => {
                query.push(("api-version", IDENTITY_API_VERSION));
                self.http.get(endpoint).header("X-IDENTITY-HEADER", header)
            }
        };

        let response = request.query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                code: None,
                message: response.text().await?,
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(AccessToken {
            token: token.access_token,
            expires_on: parse_expires_on(&token.expires_on)?,
        })
    }
}

fn parse_expires_on(value: &serde_json::Value) -> Result<DateTime<Utc>> {
    let seconds = match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    };
    seconds
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .ok_or_else(|| Error::InvalidResponse(format!("unexpected expires_on: {value}")))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_parse_expires_on() {
        let expected = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(
            parse_expires_on(&serde_json::json!("1700000000")).unwrap(),
            expected
        );
        assert_eq!(
            parse_expires_on(&serde_json::json!(1_700_000_000)).unwrap(),
            expected
        );
        assert!(parse_expires_on(&serde_json::json!(null)).is_err());
    }

    #[tokio::test]
    async fn test_imds_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Metadata", "true"))
            .and(query_param("resource", "https://management.azure.com"))
            .and(query_param("client_id", "user-assigned"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mi-token",
                "expires_on": "4102444800",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::new(
            IdentitySource::Imds {
                endpoint: server.uri(),
            },
            Some("user-assigned".to_string()),
        )
        .unwrap();

        let token = credential
            .get_token("https://management.azure.com/.default")
            .await
            .unwrap();
        assert_eq!(token.token, "mi-token");
    }

    #[tokio::test]
    async fn test_app_service_request_sends_identity_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("X-IDENTITY-HEADER", "secret-header"))
            .and(query_param("api-version", IDENTITY_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "app-token",
                "expires_on": 4_102_444_800_i64
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::new(
            IdentitySource::AppService {
                endpoint: server.uri(),
                header: "secret-header".to_string(),
            },
            None,
        )
        .unwrap();

        let token = credential.get_token("scope/.default").await.unwrap();
        assert_eq!(token.token, "app-token");
    }
}
