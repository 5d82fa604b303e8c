//! Connection details of a finished deployment.

use tracing::info;

use crate::azureml::{AuthMode, EndpointKeys};

/// Header selecting the deployment that serves a request. Mandatory, since
/// one endpoint can host several deployments.
pub const DEPLOYMENT_HEADER: &str = "azureml-model-deployment";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub endpoint_name: String,
    pub deployment_name: String,
    pub scoring_uri: Option<String>,
    pub auth_mode: AuthMode,
    /// Only populated under key authentication.
    pub keys: Option<EndpointKeys>,
}

impl Report {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("ENDPOINT={} INFORMATION", self.endpoint_name),
            format!(
                "    SCORING URI={}",
                self.scoring_uri.as_deref().unwrap_or("<pending>")
            ),
            format!(
                "    HEADER={{\"{DEPLOYMENT_HEADER}\": {}}}",
                self.deployment_name
            ),
        ];

        if self.auth_mode.is_key()
            && let Some(keys) = &self.keys
        {
            lines.push(format!(
                "    PRIMARY KEY={}",
                keys.primary_key.as_deref().unwrap_or_default()
            ));
            lines.push(format!(
                "    SECONDARY KEY={}",
                keys.secondary_key.as_deref().unwrap_or_default()
            ));
        }

        lines
    }

    pub fn log(&self) {
        for line in self.lines() {
            info!("{line}");
        }
    }
}
