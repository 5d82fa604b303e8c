//! Azure credential acquisition.
//!
//! [`DefaultAzureCredential`] walks a fixed chain of credential sources and
//! uses the first one that yields a token:
//!
//! 1. A service principal from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and
//!    `AZURE_CLIENT_SECRET`.
//! 2. The managed identity of the host.
//! 3. The signed-in Azure CLI account.
//!
//! Tokens are cached until shortly before they expire.

pub mod azure_cli;
pub mod environment;
pub mod managed_identity;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use azure_cli::AzureCliCredential;
pub use environment::EnvironmentCredential;
pub use managed_identity::ManagedIdentityCredential;

use crate::config::AzureConfig;
use crate::error::{Error, Result};

/// Refresh tokens this long before their reported expiry.
const EXPIRY_MARGIN: TimeDelta = TimeDelta::minutes(5);

/// A bearer token and the instant it stops being valid.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + EXPIRY_MARGIN < self.expires_on
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name used when reporting which source failed.
    fn name(&self) -> &'static str;

    async fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

/// Resource URI for sources that take a resource instead of a scope.
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

pub struct DefaultAzureCredential {
    sources: Vec<Box<dyn TokenCredential>>,
    cached: Mutex<Option<(String, AccessToken)>>,
}

impl DefaultAzureCredential {
    pub fn new(config: &AzureConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;

        let mut sources: Vec<Box<dyn TokenCredential>> = Vec::new();
        let environment = EnvironmentCredential::from_env(http.clone(), &config.authority_url);
        if let Some(credential) = environment {
            sources.push(Box::new(credential));
        }
        sources.push(Box::new(ManagedIdentityCredential::from_env()?));
        sources.push(Box::new(AzureCliCredential::new()));

        Ok(Self::with_sources(sources))
    }

    pub fn with_sources(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            cached: Mutex::new(None),
        }
    }

    pub fn into_shared(self) -> Arc<dyn TokenCredential> {
        Arc::new(self)
    }
}

#[async_trait]
impl TokenCredential for DefaultAzureCredential {
    fn name(&self) -> &'static str {
        "DefaultAzureCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut cached = self.cached.lock().await;
        if let Some((cached_scope, token)) = cached.as_ref()
            && cached_scope == scope
            && token.is_fresh(Utc::now())
        {
            return Ok(token.clone());
        }

        let mut attempts = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => {
                    info!(source = source.name(), "Acquired Azure credentials");
                    *cached = Some((scope.to_string(), token.clone()));
                    return Ok(token);
                }
                Err(err) => {
                    debug!(source = source.name(), %err, "Credential source unavailable");
                    attempts.push(format!("    {}: {err}", source.name()));
                }
            }
        }

        Err(Error::Credential { attempts })
    }
}
