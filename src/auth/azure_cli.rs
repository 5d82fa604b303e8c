//! Credentials of the account signed in to the Azure CLI.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::process::Command;

use crate::auth::{AccessToken, TokenCredential, scope_to_resource};
use crate::error::{Error, Result};

#[cfg(windows)]
const AZ_PROGRAM: &str = "az.cmd";
#[cfg(not(windows))]
const AZ_PROGRAM: &str = "az";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Local time, e.g. `2025-01-31 12:34:56.000000`.
    expires_on: Option<String>,
    /// Epoch seconds, only reported by newer CLI versions.
    #[serde(rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

#[derive(Default)]
pub struct AzureCliCredential;

impl AzureCliCredential {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let output = Command::new(AZ_PROGRAM)
            .args([
                "account",
                "get-access-token",
                "--output",
                "json",
                "--resource",
                scope_to_resource(scope),
            ])
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::InvalidResponse(format!(
                "`az account get-access-token` failed: {}",
                stderr.trim()
            )));
        }

        parse_cli_token(&output.stdout)
    }
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken> {
    let token: CliToken = serde_json::from_slice(stdout)?;

    let expires_on = match (token.expires_on_epoch, token.expires_on.as_deref()) {
        (Some(epoch), _) => DateTime::from_timestamp(epoch, 0),
        (None, Some(local)) => NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc)),
        (None, None) => None,
    }
    .ok_or_else(|| Error::InvalidResponse("Azure CLI token has no expiry".to_string()))?;

    Ok(AccessToken {
        token: token.access_token,
        expires_on,
    })
}
