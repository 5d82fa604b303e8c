//! Model lookup in a shared Azure ML registry such as `HuggingFace`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::azureml::client::ArmClient;
use crate::azureml::model::ModelVersion;
use crate::azureml::ModelRegistry;
use crate::error::{Error, Result};

pub const LATEST_LABEL: &str = "latest";

/// Where a registry lives, as reported by registry discovery.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDiscovery {
    pub primary_region_resource_provider_uri: String,
    pub subscription_id: String,
    pub resource_group: String,
}

#[derive(Deserialize)]
struct VersionList {
    #[serde(default)]
    value: Vec<VersionResource>,
}

#[derive(Deserialize)]
struct VersionResource {
    id: String,
    name: String,
}

/// Registry client. Distinct from the workspace client: the registry lives
/// in its own subscription and resource group.
#[derive(Clone)]
pub struct RegistryClient {
    arm: ArmClient,
    name: String,
    base_url: String,
}

impl RegistryClient {
    pub async fn connect(arm: ArmClient, discovery_url: &str, registry: &str) -> Result<Self> {
        let url = format!(
            "{}/registrymanagement/v1.0/registries/{registry}/discovery",
            discovery_url.trim_end_matches('/')
        );
        let discovery: RegistryDiscovery = arm.get_unversioned(&url).await?;
        debug!(
            registry,
            resource_provider = %discovery.primary_region_resource_provider_uri,
            "Discovered registry"
        );

        let base_url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/registries/{registry}",
            discovery.primary_region_resource_provider_uri.trim_end_matches('/'),
            discovery.subscription_id,
            discovery.resource_group,
        );

        Ok(Self {
            arm,
            name: registry.to_string(),
            base_url,
        })
    }

    fn not_found(&self, model: &str) -> Error {
        Error::RegistryModelNotFound {
            name: model.to_string(),
            registry: self.name.clone(),
        }
    }
}

#[async_trait]
impl ModelRegistry for RegistryClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_model(&self, name: &str, label: &str) -> Result<ModelVersion> {
        if label != LATEST_LABEL {
            return Err(Error::UnsupportedLabel(label.to_string()));
        }

        let url = format!("{}/models/{name}/versions", self.base_url);
        let versions: VersionList = match self
            .arm
            .get(&url, &[("$orderBy", "createdtime desc"), ("$top", "1")])
            .await
        {
            Err(Error::Api { status: 404, .. }) => return Err(self.not_found(name)),
            result => result?,
        };

        let latest = versions
            .value
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(name))?;
        Ok(ModelVersion {
            id: latest.id,
            name: name.to_string(),
            version: latest.name,
        })
    }
}
