//! Online endpoint, deployment and registry model types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Endpoint property enforcing access control on the workspace's default
/// secret stores. Required to serve gated models.
pub const ENFORCE_SECRET_STORE_ACCESS: &str = "enforce_access_to_default_secret_stores";

/// How clients authenticate against an online endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthMode {
    Key,
    AmlToken,
    AadToken,
    Other(String),
}

impl AuthMode {
    pub const fn is_key(&self) -> bool {
        matches!(self, Self::Key)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Key => "Key",
            Self::AmlToken => "AMLToken",
            Self::AadToken => "AADToken",
            Self::Other(mode) => mode,
        }
    }
}

impl From<String> for AuthMode {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "key" => Self::Key,
            "amltoken" | "aml_token" => Self::AmlToken,
            "aadtoken" | "aad_token" => Self::AadToken,
            _ => Self::Other(value),
        }
    }
}

impl From<AuthMode> for String {
    fn from(mode: AuthMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Managed online endpoint to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineEndpoint {
    pub name: String,
    pub auth_mode: AuthMode,
    pub properties: BTreeMap<String, String>,
}

impl OnlineEndpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auth_mode: AuthMode::Key,
            properties: BTreeMap::new(),
        }
    }

    /// Endpoint serving a model; gated models get secret store enforcement.
    pub fn for_model(name: impl Into<String>, gated: bool) -> Self {
        let mut endpoint = Self::new(name);
        if gated {
            endpoint
                .properties
                .insert(ENFORCE_SECRET_STORE_ACCESS.to_string(), "enabled".to_string());
        }
        endpoint
    }
}

/// Managed online deployment to create under an existing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineDeployment {
    pub name: String,
    pub endpoint_name: String,
    /// Registry model URI, e.g. `azureml://registries/HuggingFace/models/<name>/labels/latest`.
    pub model: String,
    pub instance_type: String,
    pub instance_count: u32,
}

/// Endpoint state as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDetails {
    pub name: String,
    pub scoring_uri: Option<String>,
    pub auth_mode: AuthMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointKeys {
    pub primary_key: Option<String>,
    pub secondary_key: Option<String>,
}

/// A model version resolved from a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVersion {
    pub id: String,
    pub name: String,
    pub version: String,
}

// === Wire format ===

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrackedResource<P> {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    pub properties: P,
}

#[derive(Serialize)]
pub(crate) struct Identity {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Serialize)]
pub(crate) struct Sku {
    pub name: &'static str,
    pub capacity: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EndpointProperties {
    pub auth_mode: AuthMode,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeploymentProperties {
    pub endpoint_compute_type: &'static str,
    pub model: String,
    pub instance_type: String,
    pub scale_settings: ScaleSettings,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScaleSettings {
    pub scale_type: &'static str,
}

impl OnlineEndpoint {
    pub(crate) fn to_resource(&self, location: &str) -> TrackedResource<EndpointProperties> {
        TrackedResource {
            location: location.to_string(),
            identity: Some(Identity {
                kind: "SystemAssigned",
            }),
            sku: None,
            properties: EndpointProperties {
                auth_mode: self.auth_mode.clone(),
                properties: self.properties.clone(),
            },
        }
    }
}

impl OnlineDeployment {
    pub(crate) fn to_resource(&self, location: &str) -> TrackedResource<DeploymentProperties> {
        TrackedResource {
            location: location.to_string(),
            identity: None,
            sku: Some(Sku {
                name: "Default",
                capacity: self.instance_count,
            }),
            properties: DeploymentProperties {
                endpoint_compute_type: "Managed",
                model: self.model.clone(),
                instance_type: self.instance_type.clone(),
                scale_settings: ScaleSettings {
                    scale_type: "Default",
                },
            },
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct EndpointResource {
    pub name: String,
    pub properties: EndpointResourceProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EndpointResourceProperties {
    pub auth_mode: AuthMode,
    #[serde(default)]
    pub scoring_uri: Option<String>,
}

impl From<EndpointResource> for EndpointDetails {
    fn from(resource: EndpointResource) -> Self {
        Self {
            name: resource.name,
            scoring_uri: resource.properties.scoring_uri,
            auth_mode: resource.properties.auth_mode,
        }
    }
}
