//! Azure Machine Learning control plane.
//!
//! Two clients share one [`ArmClient`] configuration but address different
//! scopes: [`WorkspaceClient`] manages endpoints and deployments in the
//! target project, [`RegistryClient`] looks models up in the shared registry.

pub mod client;
pub mod model;
pub mod registry;
pub mod workspace;

use async_trait::async_trait;

pub use client::ArmClient;
pub use model::{
    AuthMode, EndpointDetails, EndpointKeys, ModelVersion, OnlineDeployment, OnlineEndpoint,
};
pub use registry::{LATEST_LABEL, RegistryClient};
pub use workspace::WorkspaceClient;

use crate::error::Result;

#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Registry name as used in `azureml://registries/<name>/...` URIs.
    fn name(&self) -> &str;

    /// Resolve `name` at `label` in the registry.
    async fn get_model(&self, name: &str, label: &str) -> Result<ModelVersion>;
}

/// Endpoint and deployment operations of a workspace.
///
/// Both create-or-update operations return only once the platform reports a
/// terminal state.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_or_update_endpoint(&self, endpoint: &OnlineEndpoint) -> Result<()>;

    async fn create_or_update_deployment(&self, deployment: &OnlineDeployment) -> Result<()>;

    async fn get_endpoint(&self, name: &str) -> Result<EndpointDetails>;

    async fn get_endpoint_keys(&self, name: &str) -> Result<EndpointKeys>;
}
