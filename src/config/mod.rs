pub mod environment;
pub mod loader;

use std::time::Duration;

pub use environment::WorkspaceScope;
pub use loader::load;
use serde::Deserialize;

/// Default registry mirroring Hugging Face models on Azure Machine Learning.
pub const HUGGINGFACE_REGISTRY: &str = "HuggingFace";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub resource_manager_url: String,
    pub api_version: String,
    pub registry: String,
    pub registry_discovery_url: String,
    pub authority_url: String,
    pub poll_interval_secs: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            resource_manager_url: "https://management.azure.com".to_string(),
            api_version: "2024-04-01".to_string(),
            registry: HUGGINGFACE_REGISTRY.to_string(),
            registry_discovery_url: "https://eastus.api.azureml.ms".to_string(),
            authority_url: "https://login.microsoftonline.com".to_string(),
            poll_interval_secs: 5,
        }
    }
}

impl AzureConfig {
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// OAuth scope covering the resource manager, e.g.
    /// `https://management.azure.com/.default`.
    pub fn management_scope(&self) -> String {
        format!("{}/.default", self.resource_manager_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub endpoint: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://huggingface.co".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub hub: HubConfig,
}
